//! Builds a [`Pipeline`] from a TOML config file plus overrides.

use crate::{
    backend::ModelConfig,
    error::{Error, Result},
    overrides::{Overrides, resolve_references},
    pipeline::{LlmComponent, Pipe, Pipeline},
    task::TaskConfig,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const LLM_FACTORY: &str = "llm";

/// Turns a config file into something that can be called on text.
pub trait Assembler {
    /// The pipeline type produced.
    type Pipeline: Pipe;

    /// Reads `config_path`, applies `overrides`, and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read, parsed, or built.
    fn assemble(&self, config_path: &Path, overrides: &Overrides) -> Result<Self::Pipeline>;
}

/// The default assembler for TOML pipeline configs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigAssembler;

impl Assembler for ConfigAssembler {
    type Pipeline = Pipeline;

    fn assemble(&self, config_path: &Path, overrides: &Overrides) -> Result<Pipeline> {
        assemble(config_path, overrides)
    }
}

/// Parsed pipeline config.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// `[nlp]` section
    pub nlp: NlpSection,

    /// `[components.<name>]` sections
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
}

/// `[nlp]` section of a pipeline config.
#[derive(Debug, Clone, Deserialize)]
pub struct NlpSection {
    /// Language code
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Component names in execution order
    pub pipeline: Vec<String>,
}

fn default_lang() -> String {
    "en".to_string()
}

/// `[components.<name>]` section of a pipeline config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    /// Factory that creates the component
    #[serde(default = "default_factory")]
    pub factory: String,

    /// What the component asks the model
    pub task: TaskConfig,

    /// Which model answers
    pub model: ModelConfig,
}

fn default_factory() -> String {
    LLM_FACTORY.to_string()
}

impl PipelineConfig {
    /// Parses config text, applying overrides and resolving references.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on invalid TOML, rejected overrides,
    /// unresolved references, or a schema mismatch.
    pub fn parse(source: &str, overrides: &Overrides) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(source)?;
        overrides.apply(&mut table)?;
        resolve_references(&mut table)?;

        let config: Self = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, otherwise see
    /// [`PipelineConfig::parse`].
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&source, overrides)
    }

    /// Checks that every pipeline entry names a known component.
    ///
    /// # Errors
    ///
    /// Returns an error for empty pipelines, duplicate names, unknown
    /// names, or unsupported factories.
    pub fn validate(&self) -> Result<()> {
        if self.nlp.pipeline.is_empty() {
            return Err(Error::config("nlp.pipeline must list at least one component"));
        }

        let mut seen = Vec::with_capacity(self.nlp.pipeline.len());
        for name in &self.nlp.pipeline {
            if seen.contains(&name) {
                return Err(Error::config(format!(
                    "component '{name}' appears twice in nlp.pipeline"
                )));
            }
            seen.push(name);

            let component = self.components.get(name).ok_or_else(|| {
                Error::config(format!("no [components.{name}] section for pipeline entry"))
            })?;

            if component.factory != LLM_FACTORY {
                return Err(Error::config(format!(
                    "component '{name}' uses unknown factory '{}'",
                    component.factory
                )));
            }
        }

        Ok(())
    }
}

/// Assembles the pipeline described by `config_path`.
///
/// Relative paths inside the config (such as prompt templates) are
/// resolved against the config file's directory.
///
/// # Errors
///
/// Returns an error if the config is unreadable or invalid, or a component
/// cannot be created.
///
/// # Examples
///
/// ```no_run
/// use create_summary::{Overrides, Pipe, assemble};
/// use std::path::Path;
///
/// # fn main() -> create_summary::Result<()> {
/// let overrides = Overrides::new()
///     .with("openwebui.url", "http://localhost:3000")
///     .with("openwebui.api_key", "sk-...");
///
/// let nlp = assemble(Path::new("pipeline.toml"), &overrides)?;
/// let doc = nlp.call("Some long text.")?;
/// println!("{}", doc.summary());
/// # Ok(())
/// # }
/// ```
pub fn assemble(config_path: &Path, overrides: &Overrides) -> Result<Pipeline> {
    info!("Assembling pipeline from {}", config_path.display());

    let config = PipelineConfig::load(config_path, overrides)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new(""));

    let mut pipeline = Pipeline::new(config.nlp.lang.clone());
    for name in &config.nlp.pipeline {
        let section = &config.components[name];
        let task = section.task.build(base_dir)?;
        let backend = section.model.build()?;
        debug!("Built component '{}' ({:?})", name, task);
        pipeline.add(Box::new(LlmComponent::new(name.clone(), task, backend)));
    }

    info!(
        "✓ Pipeline ready: [{}]",
        pipeline.component_names().join(", ")
    );
    Ok(pipeline)
}
