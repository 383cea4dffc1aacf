use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use backdrop_matte::{
    default_output_path, MatteEngine, ProcessOptions, ProcessResult, ToleranceProfile,
};

#[derive(Parser)]
#[command(
    name = "backdrop-matte",
    about = "Strip green screen, blue screen and plain backdrops from character photos",
    version,
    after_help = "Simple usage: backdrop-matte <image>  (writes {name}_matted.png)\n\n\
                  Output is always PNG so the transparent background is preserved."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_matted.png)
    #[arg(short, long)]
    output: Option<String>,

    /// Match tolerance at the image border (L1 color distance)
    #[arg(long, default_value = "85")]
    edge_tolerance: f32,

    /// Match tolerance in the image interior (L1 color distance)
    #[arg(long, default_value = "15")]
    center_tolerance: f32,

    /// Normalized edge distance where tolerance starts to fall
    #[arg(long, default_value = "0.05")]
    feather_start: f32,

    /// Normalized edge distance where tolerance reaches the interior value
    #[arg(long, default_value = "0.30")]
    feather_end: f32,

    /// Print a PNG data URI to stdout instead of writing a file
    #[arg(long, conflicts_with = "output")]
    data_uri: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let tolerance = match ToleranceProfile::new(
        cli.edge_tolerance,
        cli.center_tolerance,
        cli.feather_start,
        cli.feather_end,
    ) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("{e}");
            process::exit(1);
        }
    };

    let engine = MatteEngine::new(ProcessOptions { tolerance });

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        tracing::error!("Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    if cli.data_uri {
        if input_path.is_dir() {
            tracing::error!("--data-uri takes a single image, not a directory");
            process::exit(1);
        }
        print_data_uri(&engine, input_path);
        return;
    }

    let results = if input_path.is_dir() {
        let Some(output_dir) = cli.output.as_ref().map(PathBuf::from) else {
            tracing::error!("Output directory is required for batch processing");
            tracing::error!("Usage: backdrop-matte <input_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 {
        if fail_count > 0 {
            tracing::info!(
                "[Summary] Processed: {success_count}, Failed: {fail_count} (Total: {})",
                results.len()
            );
        } else {
            tracing::info!(
                "[Summary] Processed: {success_count} (Total: {})",
                results.len()
            );
        }
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_data_uri(engine: &MatteEngine, input: &Path) {
    let bytes = match std::fs::read(input) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read {}: {e}", input.display());
            process::exit(1);
        }
    };
    match engine.matte_to_data_uri(&bytes) {
        Ok(uri) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{uri}") {
                tracing::error!("Failed to write data URI: {e}");
                process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("[FAIL] {}: {e}", input.display());
            process::exit(1);
        }
    }
}

fn print_result(result: &ProcessResult) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        let target = result
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        tracing::info!("[OK] {filename} -> {target}");
        tracing::debug!("  -> {}", result.message);
    } else {
        tracing::error!("[FAIL] {filename}: {}", result.message);
    }
}
