use crate::error::{Error, Result};
use crate::overrides::Overrides;
use std::path::{Path, PathBuf};

/// Environment variable holding the OpenWebUI endpoint.
pub const URL_VAR: &str = "OPENWEBUI_URL";

/// Environment variable holding the OpenWebUI API key.
pub const API_KEY_VAR: &str = "OPENWEBUI_API_KEY";

/// Override key the service URL is injected under.
pub const URL_OVERRIDE: &str = "openwebui.url";

/// Override key the API key is injected under.
pub const API_KEY_OVERRIDE: &str = "openwebui.api_key";

const SUMMARY_SUFFIX: &str = "summary.txt";

/// Credentials read once from the process environment.
///
/// Values that are unset or empty are stored as `None`. Whether they are
/// required is decided by [`SummaryRequestBuilder::build`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// OpenWebUI base URL
    pub service_url: Option<String>,

    /// Bearer credential for OpenWebUI
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("service_url", &self.service_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Settings {
    /// Loads `.env` from the working directory (if any) and reads both
    /// credentials from the environment.
    ///
    /// Variables already set in the environment win over `.env` entries.
    #[must_use]
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads both credentials through an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Self {
            service_url: read(URL_VAR),
            api_key: read(API_KEY_VAR),
        }
    }
}

/// A validated summarization request.
///
/// Use [`SummaryRequest::builder()`] to construct one.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SummaryRequest {
    /// Text file to summarize
    pub text_file: PathBuf,

    /// Pipeline config file
    pub config_file: PathBuf,

    /// OpenWebUI base URL
    pub service_url: String,

    /// Bearer credential for OpenWebUI
    pub api_key: String,
}

impl SummaryRequest {
    /// Creates a new request builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use create_summary::{Settings, SummaryRequest};
    ///
    /// let request = SummaryRequest::builder()
    ///     .text_file("notes.txt")
    ///     .config_file("pipeline.toml")
    ///     .settings(Settings::from_env())
    ///     .build()
    ///     .expect("valid request");
    /// ```
    #[must_use]
    pub fn builder() -> SummaryRequestBuilder {
        SummaryRequestBuilder::default()
    }

    /// Returns the path the summary is written to.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        summary_path(&self.text_file)
    }

    /// Returns the overrides injected into pipeline assembly.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides::new()
            .with(URL_OVERRIDE, &self.service_url)
            .with(API_KEY_OVERRIDE, &self.api_key)
    }
}

/// Derives `<stem>.summary.txt` next to the input file.
///
/// Only the last extension is replaced, so `report.v2.txt` becomes
/// `report.v2.summary.txt`.
#[must_use]
pub fn summary_path(text_file: &Path) -> PathBuf {
    text_file.with_extension(SUMMARY_SUFFIX)
}

/// Builder for creating a [`SummaryRequest`].
#[derive(Debug, Default)]
pub struct SummaryRequestBuilder {
    text_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    settings: Settings,
}

impl SummaryRequestBuilder {
    /// Sets the text file to summarize.
    #[must_use]
    pub fn text_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.text_file = Some(path.into());
        self
    }

    /// Sets the pipeline config file.
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Validates the request and builds it.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// service URL, API key, text file, config file. The filesystem is not
    /// touched until both credentials are present.
    ///
    /// # Errors
    ///
    /// Returns the first failed precondition.
    pub fn build(self) -> Result<SummaryRequest> {
        let service_url = self
            .settings
            .service_url
            .ok_or(Error::missing_env(URL_VAR, "URL"))?;

        let api_key = self
            .settings
            .api_key
            .ok_or(Error::missing_env(API_KEY_VAR, "API_KEY"))?;

        let text_file = self.text_file.unwrap_or_default();
        if !text_file.is_file() {
            return Err(Error::MissingTextFile { path: text_file });
        }

        let config_file = self.config_file.unwrap_or_default();
        if !config_file.exists() {
            return Err(Error::MissingConfigFile { path: config_file });
        }

        Ok(SummaryRequest {
            text_file,
            config_file,
            service_url,
            api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::collections::HashMap;

    fn settings(url: Option<&str>, key: Option<&str>) -> Settings {
        let mut env = HashMap::new();
        if let Some(url) = url {
            env.insert(URL_VAR, url.to_string());
        }
        if let Some(key) = key {
            env.insert(API_KEY_VAR, key.to_string());
        }
        Settings::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_settings_treat_empty_as_missing() {
        let s = settings(Some(""), Some("key"));
        assert_eq!(s.service_url, None);
        assert_eq!(s.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let s = settings(Some("http://localhost:3000"), Some("sk-secret"));
        let printed = format!("{s:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("localhost:3000"));
    }

    #[test]
    fn test_missing_url_reported_first() {
        let err = SummaryRequest::builder()
            .text_file("/nonexistent/notes.txt")
            .config_file("/nonexistent/pipeline.toml")
            .settings(settings(None, None))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::MissingEnv { var: URL_VAR, .. }));
        assert_eq!(
            err.to_string(),
            "OpenWebUI URL missing in environment variables."
        );
    }

    #[test]
    fn test_missing_api_key() {
        let err = SummaryRequest::builder()
            .text_file("/nonexistent/notes.txt")
            .config_file("/nonexistent/pipeline.toml")
            .settings(settings(Some("http://localhost:3000"), None))
            .build()
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "OpenWebUI API_KEY missing in environment variables."
        );
    }

    #[test]
    fn test_missing_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = temp.child("pipeline.toml");
        config.write_str("").unwrap();
        let missing = temp.child("missing.txt");

        let err = SummaryRequest::builder()
            .text_file(missing.path())
            .config_file(config.path())
            .settings(settings(Some("http://localhost:3000"), Some("key")))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::MissingTextFile { .. }));
        assert!(err.to_string().contains("missing.txt"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_directory_is_not_a_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = temp.child("pipeline.toml");
        config.write_str("").unwrap();

        let err = SummaryRequest::builder()
            .text_file(temp.path())
            .config_file(config.path())
            .settings(settings(Some("http://localhost:3000"), Some("key")))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::MissingTextFile { .. }));
    }

    #[test]
    fn test_missing_config_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let text = temp.child("notes.txt");
        text.write_str("Hello world.").unwrap();

        let err = SummaryRequest::builder()
            .text_file(text.path())
            .config_file(temp.child("nope.toml").path())
            .settings(settings(Some("http://localhost:3000"), Some("key")))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::MissingConfigFile { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn test_valid_request() {
        let temp = assert_fs::TempDir::new().unwrap();
        let text = temp.child("notes.txt");
        text.write_str("Hello world.").unwrap();
        let config = temp.child("pipeline.toml");
        config.write_str("").unwrap();

        let request = SummaryRequest::builder()
            .text_file(text.path())
            .config_file(config.path())
            .settings(settings(Some("http://localhost:3000"), Some("key")))
            .build()
            .unwrap();

        assert_eq!(request.output_path(), temp.child("notes.summary.txt").path());

        let overrides = request.overrides();
        assert_eq!(overrides.get(URL_OVERRIDE), Some("http://localhost:3000"));
        assert_eq!(overrides.get(API_KEY_OVERRIDE), Some("key"));
    }

    #[test]
    fn test_summary_path() {
        assert_eq!(
            summary_path(Path::new("dir/notes.txt")),
            PathBuf::from("dir/notes.summary.txt")
        );
        assert_eq!(
            summary_path(Path::new("notes")),
            PathBuf::from("notes.summary.txt")
        );
        assert_eq!(
            summary_path(Path::new("report.v2.md")),
            PathBuf::from("report.v2.summary.txt")
        );
    }
}
