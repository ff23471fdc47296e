//! # create-summary
//!
//! Summarizes a text file through an LLM pipeline served by OpenWebUI and
//! writes the result to `<stem>.summary.txt` next to the input.
//!
//! ## Quick Start
//!
//! ```no_run
//! use create_summary::{ConfigAssembler, Settings, SummaryRequest, create_summary};
//!
//! # fn main() -> anyhow::Result<()> {
//! let request = SummaryRequest::builder()
//!     .text_file("notes.txt")
//!     .config_file("pipeline.toml")
//!     .settings(Settings::from_env())
//!     .build()?;
//!
//! create_summary(&request, &ConfigAssembler)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Settings**: credentials read once from the environment (and `.env`)
//! 2. **Request**: preconditions validated in a fixed order
//! 3. **Assembler**: pipeline built from a TOML config with the credentials
//!    injected as overrides
//! 4. **Pipeline**: components annotate a [`Document`]; the LLM component
//!    renders a prompt, calls the backend, and stores the summary
//! 5. **Writer**: the summary is persisted atomically

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod assemble;
mod backend;
mod config;
mod document;
mod error;
mod overrides;
mod pipeline;
mod summarize;
mod task;
mod writer;

pub use assemble::{Assembler, ComponentConfig, ConfigAssembler, NlpSection, PipelineConfig, assemble};
pub use backend::{LlmBackend, ModelConfig, OpenWebUi, OpenWebUiConfig};
pub use config::{
    API_KEY_OVERRIDE, API_KEY_VAR, Settings, SummaryRequest, SummaryRequestBuilder, URL_OVERRIDE,
    URL_VAR, summary_path,
};
pub use document::Document;
pub use error::{Error, Result};
pub use overrides::{Overrides, resolve_references};
pub use pipeline::{Component, LlmComponent, Pipe, Pipeline};
pub use summarize::{SummaryOutcome, create_summary};
pub use task::{SummarizationConfig, SummarizationTask, TaskConfig};

/// Validates, assembles, and summarizes in one call using the environment
/// and the TOML assembler.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns a precondition error if a credential or file is missing, or any
/// error raised while assembling, running, or writing.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// let outcome = create_summary::run("notes.txt", "pipeline.toml")?;
/// println!("{}", outcome.output_path.display());
/// # Ok(())
/// # }
/// ```
pub fn run(
    text_file: impl Into<std::path::PathBuf>,
    config_file: impl Into<std::path::PathBuf>,
) -> Result<SummaryOutcome> {
    let request = SummaryRequest::builder()
        .text_file(text_file)
        .config_file(config_file)
        .settings(Settings::from_env())
        .build()?;

    create_summary(&request, &ConfigAssembler)
}
