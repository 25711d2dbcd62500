use std::process::ExitCode;

fn main() -> ExitCode {
    imagenation::cli::main()
}
