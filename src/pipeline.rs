use crate::{
    backend::LlmBackend,
    document::Document,
    error::Result,
    task::SummarizationTask,
};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Anything that turns text into an annotated [`Document`].
pub trait Pipe {
    /// Runs the text through every processing step.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a step.
    fn call(&self, text: &str) -> Result<Document>;
}

/// A single processing step of a [`Pipeline`].
pub trait Component {
    /// Name the component was registered under.
    fn name(&self) -> &str;

    /// Annotates the document in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the step cannot complete.
    fn process(&self, doc: &mut Document) -> Result<()>;
}

/// Component that delegates a task to an LLM backend.
pub struct LlmComponent {
    name: String,
    task: SummarizationTask,
    backend: Box<dyn LlmBackend>,
}

impl LlmComponent {
    /// Creates the component from a task and the backend that serves it.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        task: SummarizationTask,
        backend: Box<dyn LlmBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            task,
            backend,
        }
    }
}

impl Component for LlmComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, doc: &mut Document) -> Result<()> {
        let prompt = self.task.render_prompt(doc.text())?;
        let reply = self.backend.complete(&prompt)?;
        self.task.parse_response(doc, &reply);
        Ok(())
    }
}

/// Ordered sequence of components assembled from a config file.
#[derive(Default)]
pub struct Pipeline {
    lang: String,
    components: Vec<Box<dyn Component>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("lang", &self.lang)
            .field("components", &self.component_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates an empty pipeline for `lang`.
    #[must_use]
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            components: Vec::new(),
        }
    }

    /// Appends a component.
    pub fn add(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    /// Returns the language code from the config.
    #[must_use]
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Returns the component names in execution order.
    #[must_use]
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }
}

impl Pipe for Pipeline {
    #[instrument(skip_all, fields(lang = %self.lang, chars = text.chars().count()))]
    fn call(&self, text: &str) -> Result<Document> {
        let mut doc = Document::new(text);
        let total = self.components.len();

        for (index, component) in self.components.iter().enumerate() {
            info!("Step {}/{}: {}", index + 1, total, component.name());
            let start = Instant::now();
            component.process(&mut doc)?;
            debug!(
                "✓ {} finished in {:.2}s",
                component.name(),
                start.elapsed().as_secs_f64()
            );
        }

        Ok(doc)
    }
}

impl<F> Pipe for F
where
    F: Fn(&str) -> Result<Document>,
{
    fn call(&self, text: &str) -> Result<Document> {
        self(text)
    }
}
