use log::error;
use std::process::ExitCode;

use vcproj2cmake::{convert_all, parse_args};

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    if let Err(e) = stderrlog::new()
        .module("vcproj2cmake")
        .verbosity(args.log_verbosity())
        .quiet(args.quiet)
        .init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let summary = convert_all(&args.jobs(), &settings);
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
