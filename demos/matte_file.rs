//! Remove the backdrop from a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example matte_file -- input.jpg output.png
//! ```

use std::env;
use std::process;

use backdrop_matte::MatteEngine;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output.png>", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];

    let engine = MatteEngine::default();
    let result = engine.process_file(input.as_ref(), output.as_ref());

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
