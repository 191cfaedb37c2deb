use log::{debug, error};
use std::process::ExitCode;

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

/// Exit status when the shell cannot set itself up or read its input.
const EXIT_SETUP_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let config = Config::new();
    if let Err(e) = init_logger(&config) {
        eprintln!(
            "{}: logging disabled ({}): {}",
            config.name,
            config.logger_dir.display(),
            e
        );
    }
    debug!("jobsh: config loaded, logs in {}", config.logger_dir.display());

    let mut shell = match Shell::new(&config) {
        Ok(shell) => shell,
        Err(e) => {
            error!("jobsh: setup failed: {}", e);
            eprintln!("{}: {}", config.name, e);
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    match shell.run() {
        Ok(code) => ExitCode::from((code & 0xff) as u8),
        Err(e) => {
            error!("jobsh: {}", e);
            eprintln!("{}: {}", config.name, e);
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}
