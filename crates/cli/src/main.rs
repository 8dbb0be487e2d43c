use std::process::ExitCode;

fn main() -> ExitCode {
    capquote_cli::run()
}
