use std::process::ExitCode;

fn main() -> ExitCode {
    hatchquote_cli::run()
}
