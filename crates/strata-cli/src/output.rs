//! Formatted output helpers for CLI commands.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

/// Renders a value as pretty JSON with a trailing newline.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let mut rendered = serde_json::to_string_pretty(value)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Writes `contents` to `path`, or to stdout when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn emit(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = contents.len(), "wrote output");
        }
        None => print!("{contents}"),
    }
    Ok(())
}

/// Formats names as a numbered list, one per line.
#[must_use]
pub fn numbered(names: &[String]) -> String {
    let width = names.len().to_string().len();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{:>width$}. {name}\n", i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_pads_indices() {
        let names: Vec<String> = (0..10).map(|i| format!("c{i}")).collect();
        let out = numbered(&names);
        assert!(out.starts_with(" 1. c0\n"));
        assert!(out.ends_with("10. c9\n"));
    }

    #[test]
    fn numbered_empty_is_empty() {
        assert_eq!(numbered(&[]), "");
    }

    #[test]
    fn json_ends_with_newline() {
        let out = to_json(&vec!["a"]).expect("json");
        assert_eq!(out, "[\n  \"a\"\n]\n");
    }

    #[test]
    fn emit_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.json");
        emit(Some(&path), "{}\n").expect("emit");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "{}\n");
    }
}
