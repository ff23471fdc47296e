use anyhow::Context;
use clap::Parser;
use create_summary::{ConfigAssembler, Settings, SummaryRequest, create_summary};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "create-summary",
    version,
    about = "Summarize a text file with an LLM via OpenWebUI",
    long_about = "Summarize a text file with an LLM via OpenWebUI.\n\n\
    1. Reads a text from a text file\n\
    2. Creates a summary using an LLM pipeline described by a config file\n\
    3. Writes that summary to <stem>.summary.txt next to the input\n\n\
    OPENWEBUI_URL and OPENWEBUI_API_KEY must be set, either in the \
    environment or in a .env file in the working directory. Set RUST_LOG \
    (e.g. RUST_LOG=create_summary=info) to see progress on stderr.\n\n\
    USAGE EXAMPLES:\n  \
      create-summary notes.txt pipeline.toml"
)]
struct Cli {
    /// Text file that should get summarized
    #[arg(value_name = "TEXT_FILE")]
    text_file: PathBuf,

    /// Pipeline config file describing the LLM pipeline
    #[arg(value_name = "CONFIG_FILE")]
    config_file: PathBuf,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_tracing();

    let settings = Settings::from_env();

    let request = match SummaryRequest::builder()
        .text_file(cli.text_file)
        .config_file(cli.config_file)
        .settings(settings)
        .build()
    {
        Ok(request) => request,
        Err(e) if e.is_precondition() => {
            println!("{e}");
            eprintln!("Aborted!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Failed to validate arguments"),
    };

    let outcome =
        create_summary(&request, &ConfigAssembler).context("Summary creation failed")?;

    tracing::info!(
        "{} chars → {} chars ({:.1}%)",
        outcome.input_chars,
        outcome.summary_chars,
        outcome.compression_ratio() * 100.0
    );

    Ok(ExitCode::SUCCESS)
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("create_summary=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();
}
