// src/bin/eolnorm-anchored.rs

use eolnorm::normalizer::{Target, ANCHORED_TARGET};
use eolnorm::run_app;

fn main() {
    // crate root at build time
    let anchor = env!("CARGO_MANIFEST_DIR");
    if let Err(e) = run_app(Target::anchored(anchor, ANCHORED_TARGET)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
