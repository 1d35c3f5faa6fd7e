use anyhow::{Context, Result};
use clap::Parser;
use newsletter_export::config::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "newsletter-export",
    about = "Export accepted Pivotal Tracker stories with a passing newsletter review to CSV"
)]
struct Args {
    /// Config file (defaults to ./newsletter-export.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output CSV path (overrides NEWSLETTER_OUTPUT_PATH and output_path)
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG can live there too; real env vars win
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e).context("Failed to read .env file"),
    }

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Invalid configuration")?;
    if let Some(output) = args.output {
        config.output_path = output;
    }
    let output_path = config.output_path.clone();

    let run = newsletter_export::run_export(config).await?;

    for failure in &run.skipped {
        eprintln!("Warning: story left out of the export: {}", failure);
    }

    tracing::debug!(examined = run.stories_examined, "Accepted stories examined");
    println!(
        "Exported {} stories to {}",
        run.rows.len(),
        output_path.display()
    );
    Ok(())
}
