use roster_spec::compile::{BuildCtx, CompileError};

fn main() -> Result<(), CompileError> {
	let ctx = BuildCtx::new()?;
	ctx.compile("markers", "app")?;
	Ok(())
}
