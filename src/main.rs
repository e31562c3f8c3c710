// src/main.rs

use eolnorm::normalizer::{Target, WORKING_DIR_TARGET};
use eolnorm::run_app;

fn main() {
    if let Err(e) = run_app(Target::working_dir(WORKING_DIR_TARGET)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
