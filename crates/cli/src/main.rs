use std::process::ExitCode;

fn main() -> ExitCode {
    vocalkart_cli::run()
}
