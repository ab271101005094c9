//! eview - Edit scripts for generating graphics and see the results in real-time

use std::process::ExitCode;

fn main() -> ExitCode {
    match eview::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
