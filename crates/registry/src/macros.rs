/// Embeds the artifact a build script wrote for collection `$name`.
///
/// Expands to a `&'static [u8]` read from `$OUT_DIR/<name>.roster`.
#[macro_export]
macro_rules! include_registry {
	($name:literal) => {
		include_bytes!(concat!(env!("OUT_DIR"), "/", $name, ".roster")).as_slice()
	};
}
