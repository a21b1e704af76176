use anyhow::Result;
use clap::Parser;

use model_viewer::app::{self, load_model, load_program};
use model_viewer::cli::Cli;
use model_viewer::core::RecordingBackend;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.dry_run {
        return dry_run(&cli);
    }
    app::run(cli)
}

/// Load everything through the recording backend and print what would be drawn
fn dry_run(cli: &Cli) -> Result<()> {
    let mut backend = RecordingBackend::new();
    load_program(cli, &mut backend)?;
    let model = load_model(cli, &mut backend)?;

    println!("{}", serde_json::to_string_pretty(&model.summary())?);
    Ok(())
}
