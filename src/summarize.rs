use crate::{
    assemble::Assembler,
    config::SummaryRequest,
    error::{Error, Result},
    pipeline::Pipe,
    writer::write_file_atomic,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Statistics collected during one summarization run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    /// Where the summary was written
    pub output_path: PathBuf,

    /// Characters read from the text file
    pub input_chars: usize,

    /// Characters in the written summary
    pub summary_chars: usize,

    /// Time spent assembling the pipeline
    pub assemble_duration: Duration,

    /// Time spent running the pipeline
    pub run_duration: Duration,

    /// Total execution time
    pub duration: Duration,
}

impl SummaryOutcome {
    /// Returns the summary length as a fraction of the input length.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.input_chars == 0 {
            return 0.0;
        }
        self.summary_chars as f64 / self.input_chars as f64
    }

    /// Serializes the statistics as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the output path is not valid UTF-8.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Summarizes the request's text file and writes `<stem>.summary.txt`.
///
/// # Process
///
/// 1. **Assemble**: builds the pipeline from the config file with the
///    service URL and API key injected as overrides
/// 2. **Run**: reads the text file as UTF-8 and calls the pipeline on it
/// 3. **Write**: stores the document's summary verbatim, replacing any
///    previous output
///
/// # Errors
///
/// Returns an error if any stage fails. Nothing is written in that case.
///
/// # Examples
///
/// ```no_run
/// use create_summary::{ConfigAssembler, Settings, SummaryRequest, create_summary};
///
/// # fn main() -> anyhow::Result<()> {
/// let request = SummaryRequest::builder()
///     .text_file("notes.txt")
///     .config_file("pipeline.toml")
///     .settings(Settings::from_env())
///     .build()?;
///
/// let outcome = create_summary(&request, &ConfigAssembler)?;
/// println!("{}", outcome.output_path.display());
/// # Ok(())
/// # }
/// ```
#[instrument(skip_all, fields(text_file = %request.text_file.display()))]
pub fn create_summary<A: Assembler>(
    request: &SummaryRequest,
    assembler: &A,
) -> Result<SummaryOutcome> {
    let start_time = Instant::now();

    info!("Stage 1/3: Assembling pipeline...");
    let nlp = assembler.assemble(&request.config_file, &request.overrides())?;
    let assemble_duration = start_time.elapsed();

    info!("Stage 2/3: Summarizing...");
    let run_start = Instant::now();
    let text = read_text(request)?;
    let doc = nlp.call(&text)?;
    let run_duration = run_start.elapsed();

    if !doc.has_summary() {
        warn!("Pipeline produced no summary; writing an empty file");
    }

    info!("Stage 3/3: Writing summary...");
    let output_path = request.output_path();
    write_file_atomic(&output_path, doc.summary())?;

    let outcome = SummaryOutcome {
        output_path,
        input_chars: text.chars().count(),
        summary_chars: doc.summary().chars().count(),
        assemble_duration,
        run_duration,
        duration: start_time.elapsed(),
    };

    info!(
        "✓ Wrote summary to {} in {:.2}s",
        outcome.output_path.display(),
        outcome.duration.as_secs_f64()
    );
    if let Ok(json) = outcome.to_json() {
        debug!("Run statistics: {}", json);
    }

    Ok(outcome)
}

fn read_text(request: &SummaryRequest) -> Result<String> {
    let path = &request.text_file;
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { path: path.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{API_KEY_OVERRIDE, Settings, URL_OVERRIDE};
    use crate::document::Document;
    use crate::overrides::Overrides;
    use assert_fs::prelude::*;
    use std::cell::RefCell;
    use std::path::Path;

    type StubPipe = Box<dyn Fn(&str) -> Result<Document>>;

    /// Records the overrides it was given and returns a fixed-summary pipe.
    struct StubAssembler {
        summary: &'static str,
        seen: RefCell<Option<Overrides>>,
    }

    impl StubAssembler {
        fn new(summary: &'static str) -> Self {
            Self {
                summary,
                seen: RefCell::new(None),
            }
        }
    }

    impl Assembler for StubAssembler {
        type Pipeline = StubPipe;

        fn assemble(&self, _config_path: &Path, overrides: &Overrides) -> Result<StubPipe> {
            *self.seen.borrow_mut() = Some(overrides.clone());
            let summary = self.summary;
            Ok(Box::new(move |text: &str| -> Result<Document> {
                Ok(Document::new(text).with_summary(summary))
            }))
        }
    }

    struct FailingAssembler;

    impl Assembler for FailingAssembler {
        type Pipeline = StubPipe;

        fn assemble(&self, _config_path: &Path, _overrides: &Overrides) -> Result<StubPipe> {
            Err(Error::config("malformed config"))
        }
    }

    fn request(temp: &assert_fs::TempDir, text: &str) -> SummaryRequest {
        temp.child("notes.txt").write_str(text).unwrap();
        temp.child("pipeline.toml").write_str("").unwrap();

        SummaryRequest::builder()
            .text_file(temp.child("notes.txt").path())
            .config_file(temp.child("pipeline.toml").path())
            .settings(Settings::from_lookup(|name| match name {
                "OPENWEBUI_URL" => Some("http://localhost:3000".to_string()),
                "OPENWEBUI_API_KEY" => Some("sk-test".to_string()),
                _ => None,
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_writes_summary_next_to_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "Hello world.");
        let assembler = StubAssembler::new("Hello.");

        let outcome = create_summary(&request, &assembler).unwrap();

        temp.child("notes.summary.txt").assert("Hello.");
        assert_eq!(outcome.output_path, temp.child("notes.summary.txt").path());
        assert_eq!(outcome.input_chars, 12);
        assert_eq!(outcome.summary_chars, 6);
    }

    #[test]
    fn test_injects_credentials_as_overrides() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "Hello world.");
        let assembler = StubAssembler::new("Hello.");

        create_summary(&request, &assembler).unwrap();

        let seen = assembler.seen.borrow();
        let overrides = seen.as_ref().unwrap();
        assert_eq!(overrides.get(URL_OVERRIDE), Some("http://localhost:3000"));
        assert_eq!(overrides.get(API_KEY_OVERRIDE), Some("sk-test"));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn test_rerun_overwrites_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "Hello world.");
        temp.child("notes.summary.txt")
            .write_str("stale summary")
            .unwrap();

        create_summary(&request, &StubAssembler::new("Hello.")).unwrap();
        create_summary(&request, &StubAssembler::new("Hello.")).unwrap();

        temp.child("notes.summary.txt").assert("Hello.");
    }

    #[test]
    fn test_summary_written_verbatim() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "Hello world.");

        create_summary(&request, &StubAssembler::new("Hello.\n")).unwrap();

        temp.child("notes.summary.txt").assert("Hello.\n");
    }

    #[test]
    fn test_assembly_failure_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "Hello world.");

        let err = create_summary(&request, &FailingAssembler).unwrap_err();

        assert!(err.is_config());
        assert!(!temp.child("notes.summary.txt").exists());
    }

    #[test]
    fn test_invalid_utf8_input() {
        let temp = assert_fs::TempDir::new().unwrap();
        let request = request(&temp, "");
        temp.child("notes.txt")
            .write_binary(&[0xff, 0xfe, 0x00])
            .unwrap();

        let err = create_summary(&request, &StubAssembler::new("Hello.")).unwrap_err();

        assert!(matches!(err, Error::InvalidUtf8 { .. }));
        assert!(!temp.child("notes.summary.txt").exists());
    }

    #[test]
    fn test_compression_ratio() {
        let outcome = SummaryOutcome {
            output_path: PathBuf::from("notes.summary.txt"),
            input_chars: 200,
            summary_chars: 50,
            assemble_duration: Duration::ZERO,
            run_duration: Duration::ZERO,
            duration: Duration::ZERO,
        };
        assert!((outcome.compression_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outcome_as_json() {
        let outcome = SummaryOutcome {
            output_path: PathBuf::from("notes.summary.txt"),
            input_chars: 12,
            summary_chars: 6,
            assemble_duration: Duration::ZERO,
            run_duration: Duration::from_millis(1500),
            duration: Duration::from_secs(2),
        };

        let json: serde_json::Value = serde_json::from_str(&outcome.to_json().unwrap()).unwrap();
        assert_eq!(json["output_path"], "notes.summary.txt");
        assert_eq!(json["input_chars"], 12);
        assert_eq!(json["summary_chars"], 6);
        assert_eq!(json["duration"]["secs"], 2);
    }
}
