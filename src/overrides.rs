//! Dotted-key overrides and `${section.key}` references for pipeline configs.
//!
//! Overrides are applied to the raw TOML table before it is deserialized,
//! so a config can leave credentials blank and reference them from the
//! components that need them:
//!
//! ```toml
//! [components.llm.model]
//! url = "${openwebui.url}"
//!
//! [openwebui]
//! url = ""
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use toml::{Table, Value};

/// Upper bound on nested reference resolution.
const MAX_REFERENCE_DEPTH: usize = 16;

const REFERENCE_OPEN: &str = "${";

/// Ordered set of config overrides keyed by dotted path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    entries: BTreeMap<String, String>,
}

impl Overrides {
    /// Creates an empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override, replacing any previous value for the key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Returns the override for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies every override to `table`.
    ///
    /// Missing intermediate tables are created. An override may replace a
    /// scalar but never a table.
    ///
    /// # Errors
    ///
    /// Returns an error for empty path segments or when a path runs
    /// through a non-table value.
    pub fn apply(&self, table: &mut Table) -> Result<()> {
        for (key, value) in &self.entries {
            apply_one(table, key, value)?;
        }
        Ok(())
    }
}

fn apply_one(table: &mut Table, key: &str, value: &str) -> Result<()> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::override_rejected(key, "empty path segment"));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| Error::override_rejected(key, "empty key"))?;

    let mut current = table;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        current = match entry {
            Value::Table(inner) => inner,
            _ => {
                return Err(Error::override_rejected(
                    key,
                    format!("'{segment}' is not a section"),
                ));
            }
        };
    }

    if matches!(current.get(*last), Some(Value::Table(_))) {
        return Err(Error::override_rejected(
            key,
            "cannot replace a section with a value",
        ));
    }

    current.insert((*last).to_string(), Value::String(value.to_string()));
    Ok(())
}

/// Resolves `${section.key}` references in every string value of `root`.
///
/// A string that is exactly one reference takes the referenced value with
/// its type intact. References embedded in longer strings are substituted
/// as text.
///
/// # Errors
///
/// Returns a configuration error for unknown references, references to
/// sections or arrays, unterminated references, or reference cycles.
pub fn resolve_references(root: &mut Table) -> Result<()> {
    let snapshot = root.clone();
    for (_, value) in root.iter_mut() {
        resolve_value(value, &snapshot, 0)?;
    }
    Ok(())
}

fn resolve_value(value: &mut Value, root: &Table, depth: usize) -> Result<()> {
    match value {
        Value::String(s) if s.contains(REFERENCE_OPEN) => {
            *value = resolve_string(s, root, depth)?;
        }
        Value::Table(table) => {
            for (_, inner) in table.iter_mut() {
                resolve_value(inner, root, depth)?;
            }
        }
        Value::Array(items) => {
            for inner in items {
                resolve_value(inner, root, depth)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn resolve_string(s: &str, root: &Table, depth: usize) -> Result<Value> {
    if depth > MAX_REFERENCE_DEPTH {
        return Err(Error::config(format!(
            "reference nesting too deep while resolving '{s}'"
        )));
    }

    if let Some(path) = whole_reference(s) {
        let mut target = lookup(root, path)?.clone();
        resolve_value(&mut target, root, depth + 1)?;
        return Ok(target);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(REFERENCE_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + REFERENCE_OPEN.len()..];
        let end = after
            .find('}')
            .ok_or_else(|| Error::config(format!("unterminated reference in '{s}'")))?;

        let mut target = lookup(root, &after[..end])?.clone();
        resolve_value(&mut target, root, depth + 1)?;
        match target {
            Value::String(text) => out.push_str(&text),
            Value::Table(_) | Value::Array(_) => {
                return Err(Error::config(format!(
                    "'{}' cannot be embedded in text",
                    &after[..end]
                )));
            }
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(Value::String(out))
}

fn whole_reference(s: &str) -> Option<&str> {
    let inner = s.strip_prefix(REFERENCE_OPEN)?.strip_suffix('}')?;
    (!inner.contains('}')).then_some(inner)
}

fn lookup<'a>(root: &'a Table, path: &str) -> Result<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = root
        .get(first)
        .ok_or_else(|| Error::config(format!("unknown reference '${{{path}}}'")))?;

    for segment in segments {
        current = current
            .as_table()
            .and_then(|t| t.get(segment))
            .ok_or_else(|| Error::config(format!("unknown reference '${{{path}}}'")))?;
    }

    match current {
        Value::Table(_) => Err(Error::config(format!(
            "reference '${{{path}}}' points at a section"
        ))),
        Value::Array(_) => Err(Error::config(format!(
            "reference '${{{path}}}' points at an array"
        ))),
        _ => Ok(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn test_apply_creates_sections() {
        let mut table = Table::new();
        Overrides::new()
            .with("openwebui.url", "http://localhost:3000")
            .apply(&mut table)
            .unwrap();

        assert_eq!(
            table["openwebui"]["url"].as_str(),
            Some("http://localhost:3000")
        );
    }

    #[test]
    fn test_apply_replaces_existing_value() {
        let mut table = parse("[openwebui]\napi_key = \"\"\n");
        Overrides::new()
            .with("openwebui.api_key", "sk-1")
            .apply(&mut table)
            .unwrap();

        assert_eq!(table["openwebui"]["api_key"].as_str(), Some("sk-1"));
    }

    #[test]
    fn test_apply_rejects_section_replacement() {
        let mut table = parse("[openwebui]\nurl = \"\"\n");
        let err = Overrides::new()
            .with("openwebui", "flat")
            .apply(&mut table)
            .unwrap_err();

        assert!(err.is_config());
    }

    #[test]
    fn test_apply_rejects_path_through_scalar() {
        let mut table = parse("openwebui = \"flat\"\n");
        let err = Overrides::new()
            .with("openwebui.url", "x")
            .apply(&mut table)
            .unwrap_err();

        assert!(err.to_string().contains("not a section"));
    }

    #[test]
    fn test_apply_rejects_empty_segment() {
        let mut table = Table::new();
        assert!(
            Overrides::new()
                .with("openwebui..url", "x")
                .apply(&mut table)
                .is_err()
        );
    }

    #[test]
    fn test_whole_reference_keeps_type() {
        let mut table = parse(
            r#"
            [limits]
            words = 50

            [task]
            max_n_words = "${limits.words}"
            "#,
        );
        resolve_references(&mut table).unwrap();

        assert_eq!(table["task"]["max_n_words"].as_integer(), Some(50));
    }

    #[test]
    fn test_embedded_reference_is_textual() {
        let mut table = parse(
            r#"
            [openwebui]
            url = "http://localhost:3000"

            [model]
            endpoint = "${openwebui.url}/api"
            "#,
        );
        resolve_references(&mut table).unwrap();

        assert_eq!(
            table["model"]["endpoint"].as_str(),
            Some("http://localhost:3000/api")
        );
    }

    #[test]
    fn test_overrides_then_references() {
        let mut table = parse(
            r#"
            [components.llm.model]
            url = "${openwebui.url}"
            api_key = "${openwebui.api_key}"

            [openwebui]
            url = ""
            api_key = ""
            "#,
        );

        Overrides::new()
            .with("openwebui.url", "http://host")
            .with("openwebui.api_key", "secret")
            .apply(&mut table)
            .unwrap();
        resolve_references(&mut table).unwrap();

        let model = &table["components"]["llm"]["model"];
        assert_eq!(model["url"].as_str(), Some("http://host"));
        assert_eq!(model["api_key"].as_str(), Some("secret"));
    }

    #[test]
    fn test_unknown_reference() {
        let mut table = parse("key = \"${nowhere.value}\"\n");
        let err = resolve_references(&mut table).unwrap_err();
        assert!(err.to_string().contains("nowhere.value"));
    }

    #[test]
    fn test_reference_cycle_is_bounded() {
        let mut table = parse("a = \"${b}\"\nb = \"${a}\"\n");
        let err = resolve_references(&mut table).unwrap_err();
        assert!(err.to_string().contains("too deep"));
    }

    #[test]
    fn test_unterminated_reference() {
        let mut table = parse("a = \"x ${b\"\nb = \"1\"\n");
        assert!(resolve_references(&mut table).is_err());
    }

    #[test]
    fn test_reference_to_array_rejected() {
        let mut table = parse("a = [1, 2]\nb = \"${a}\"\n");
        let err = resolve_references(&mut table).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_reference_to_section_rejected() {
        let mut table = parse("b = \"${s}\"\n[s]\nk = 1\n");
        let err = resolve_references(&mut table).unwrap_err();
        assert!(err.to_string().contains("section"));
    }
}
