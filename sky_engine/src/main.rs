use anyhow::Result;

mod app;
mod cli;
mod collaborators;
mod dispatch;
mod events;
mod remote;
mod runtime;

fn main() -> Result<()> {
    let args = cli::parse()?;
    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
    runtime::execute(args)
}
