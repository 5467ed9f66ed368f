use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod config;
mod logging;
mod pipeline;
mod runner;
mod stage;

use cli::RunArgs;
use config::{RunConfig, StageLayout};
use pipeline::run_pipeline;
use runner::ProcessRunner;

fn main() -> ExitCode {
    let args = RunArgs::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &RunArgs) -> Result<u8> {
    let config = RunConfig::from_args(args);
    let layout = StageLayout::from_args(args)?;
    let runner = ProcessRunner::new(layout.interpreter.clone());
    let today = chrono::Local::now().date_naive();

    let report = run_pipeline(&config, &layout, &runner, today)?;
    if args.json {
        let text = serde_json::to_string_pretty(&report.summary())?;
        println!("{text}");
    }
    Ok(report.verdict.exit_code())
}
