//! # Astral
//!
//! A console client for Astral tabletop sessions: live narration, mixed
//! session audio, character updates, and dice prompts.

use log::error;

mod cli;
mod console;
mod controls;
mod logging;
mod runner;

fn main() {
    dotenv::dotenv().ok();
    let log_buffer = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}
