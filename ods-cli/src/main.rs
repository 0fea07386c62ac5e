//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = ods_cli::run() {
        eprintln!("ods: {err}");
        std::process::exit(1);
    }
}
