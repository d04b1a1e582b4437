#![forbid(unsafe_code)]

//! Allot kiosk binary entry point.

use std::io;

use allot_kiosk::{app, build, cli, logging};

fn main() {
    let opts = cli::Opts::parse();
    logging::init(opts.log_json);

    tracing::info!(mode = %opts.mode, storage = ?opts.storage, "starting kiosk");

    let mut kiosk = match build(&opts) {
        Ok(kiosk) => kiosk,
        Err(e) => {
            eprintln!("Failed to initialize: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = app::run(&mut kiosk, io::BufReader::new(io::stdin()), io::stdout()) {
        eprintln!("Runtime error: {e}");
        std::process::exit(1);
    }
}
