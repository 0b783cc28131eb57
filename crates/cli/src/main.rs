use std::process::ExitCode;

fn main() -> ExitCode {
    aquabot_cli::run()
}
