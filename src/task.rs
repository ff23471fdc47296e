//! Tasks define what an LLM component asks the model and how the answer is
//! stored on the [`Document`].

use crate::{
    document::Document,
    error::{Error, Result},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{debug, warn};

const BUILTIN_TEMPLATE: &str = "summarization";
const CUSTOM_TEMPLATE: &str = "custom";
const SUMMARY_FIELD: &str = "summary";
const TEXT_FENCE: &str = "'''";
const TEXT_MARKER: &str = "\u{1}\u{2}\u{1}";

static BUILTIN: Lazy<std::result::Result<Tera, tera::Error>> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template(
        BUILTIN_TEMPLATE,
        include_str!("../templates/summarization.tera"),
    )?;
    Ok(tera)
});

/// `[components.<name>.task]` section of a pipeline config.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TaskConfig {
    /// Summarize the whole document
    #[serde(rename = "summarization")]
    Summarization(SummarizationConfig),
}

impl TaskConfig {
    /// Builds the task, resolving relative template paths against
    /// `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is invalid or a custom template
    /// cannot be loaded.
    pub fn build(&self, base_dir: &Path) -> Result<SummarizationTask> {
        match self {
            Self::Summarization(config) => SummarizationTask::new(config, base_dir),
        }
    }
}

/// Settings for the summarization task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizationConfig {
    /// Word budget mentioned in the prompt
    #[serde(default)]
    pub max_n_words: Option<usize>,

    /// Document field the summary is stored under
    #[serde(default)]
    pub field: Option<String>,

    /// Prompt template replacing the built-in one
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Variables available to prompt templates.
#[derive(Serialize)]
struct PromptContext<'a> {
    text: &'a str,
    max_n_words: Option<usize>,
}

enum PromptTemplate {
    Builtin,
    Custom(Box<Tera>),
}

/// Asks the model for a summary and attaches it to the document.
pub struct SummarizationTask {
    max_n_words: Option<usize>,
    template: PromptTemplate,
}

impl std::fmt::Debug for SummarizationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizationTask")
            .field("max_n_words", &self.max_n_words)
            .field(
                "template",
                &match self.template {
                    PromptTemplate::Builtin => BUILTIN_TEMPLATE,
                    PromptTemplate::Custom(_) => CUSTOM_TEMPLATE,
                },
            )
            .finish()
    }
}

impl SummarizationTask {
    /// Creates the task from its config section.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_n_words` is zero, `field` is anything but
    /// `summary`, or the custom template is unreadable or invalid.
    pub fn new(config: &SummarizationConfig, base_dir: &Path) -> Result<Self> {
        if config.max_n_words == Some(0) {
            return Err(Error::config("max_n_words must be greater than 0"));
        }

        if let Some(field) = config.field.as_deref() {
            if field != SUMMARY_FIELD {
                return Err(Error::config(format!(
                    "summarization field must be '{SUMMARY_FIELD}', got '{field}'"
                )));
            }
        }

        let template = match &config.template {
            Some(path) => {
                let tera = load_template(&base_dir.join(path), config.max_n_words)?;
                PromptTemplate::Custom(Box::new(tera))
            }
            None => PromptTemplate::Builtin,
        };

        Ok(Self {
            max_n_words: config.max_n_words,
            template,
        })
    }

    /// Renders the prompt for `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_prompt(&self, text: &str) -> Result<String> {
        let context = Context::from_serialize(PromptContext {
            text,
            max_n_words: self.max_n_words,
        })?;

        match &self.template {
            PromptTemplate::Builtin => {
                let tera = BUILTIN
                    .as_ref()
                    .map_err(|e| Error::template(BUILTIN_TEMPLATE, e))?;
                tera.render(BUILTIN_TEMPLATE, &context)
                    .map_err(|e| Error::template(BUILTIN_TEMPLATE, &e))
            }
            PromptTemplate::Custom(tera) => tera
                .render(CUSTOM_TEMPLATE, &context)
                .map_err(|e| Error::template(CUSTOM_TEMPLATE, &e)),
        }
    }

    /// Stores the model reply on the document.
    ///
    /// Echoed `'''` fences are removed and surrounding whitespace is
    /// trimmed. A reply longer than the word budget is kept but logged.
    pub fn parse_response(&self, doc: &mut Document, reply: &str) {
        let unfenced = reply.replace(TEXT_FENCE, "");
        let summary = unfenced.trim();

        if let Some(limit) = self.max_n_words {
            let words = summary.split_whitespace().count();
            if words > limit {
                warn!(
                    "Summary has {} words, more than the requested {}",
                    words, limit
                );
            }
        }

        debug!("Attached summary of {} chars", summary.chars().count());
        doc.set_summary(summary);
    }
}

fn load_template(path: &Path, max_n_words: Option<usize>) -> Result<Tera> {
    let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    if source.trim().is_empty() {
        return Err(Error::config(format!(
            "prompt template is empty: {}",
            path.display()
        )));
    }

    let mut tera = Tera::default();
    tera.add_raw_template(CUSTOM_TEMPLATE, &source)
        .map_err(|e| Error::template(path.display().to_string(), &e))?;

    // the document text must reach the prompt
    let context = Context::from_serialize(PromptContext {
        text: TEXT_MARKER,
        max_n_words,
    })?;
    let rendered = tera
        .render(CUSTOM_TEMPLATE, &context)
        .map_err(|e| Error::template(path.display().to_string(), &e))?;
    if !rendered.contains(TEXT_MARKER) {
        return Err(Error::config(format!(
            "prompt template never renders {{{{ text }}}}: {}",
            path.display()
        )));
    }

    Ok(tera)
}
