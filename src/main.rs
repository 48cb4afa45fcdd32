//! # Application Entry Point
//!
//! ```bash
//! reform ref=ref.vcf.gz gt=target.vcf.gz chrom=22 out=conformed
//! ```

use std::time::Instant;

use reform::config::Config;
use reform::pipelines::ConformPipeline;
use reform::Result;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("{}", Config::usage());
        return;
    }

    if let Err(e) = run(&args) {
        if e.is_config() {
            eprintln!("{}", Config::usage());
        }
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber; verbosity follows RUST_LOG
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &[String]) -> Result<()> {
    let start = Instant::now();

    let config = Config::from_args(args)?;
    config.validate()?;

    init_logging();
    eprintln!("reform v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Reference: {:?}", config.r#ref);
    eprintln!("Target:    {:?}", config.gt);

    ConformPipeline::new(config).run()?;

    eprintln!("Completed in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
