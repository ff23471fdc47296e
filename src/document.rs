/// The result of running text through a pipeline.
///
/// Components fill in fields as the document passes through them. The
/// summary stays `None` until a summarization component has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    summary: Option<String>,
}

impl Document {
    /// Creates a document with no annotations.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            summary: None,
        }
    }

    /// Returns the source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the generated summary, or an empty string if none was set.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }

    /// Returns true once a summary has been attached.
    #[must_use]
    pub const fn has_summary(&self) -> bool {
        self.summary.is_some()
    }

    /// Attaches a summary, replacing any previous one.
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    /// Builder-style variant of [`Document::set_summary`].
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.set_summary(summary);
        self
    }
}
