mod cli;
#[cfg(feature = "gui")]
mod gui;
mod logging;

use autoclicky::{input, ClickError};
use clap::Parser;
use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting with error");
            eprintln!("error: {e:#}");
            let invalid_config = e
                .downcast_ref::<ClickError>()
                .is_some_and(ClickError::is_invalid_config);
            if invalid_config {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let factory = if cli.dry_run {
        input::dry_run_clicker()
    } else {
        input::system_clicker()
    };

    if cli.gui {
        #[cfg(feature = "gui")]
        return gui::run(factory);
        #[cfg(not(feature = "gui"))]
        anyhow::bail!("built without the `gui` feature");
    }

    let config = cli.click_config()?;
    cli::run(cli, config, factory)
}
