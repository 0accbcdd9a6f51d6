use anyhow::{Context, Result};
use dbus_api::{Diagnostic, Node, ParseError, Parsed, Parser};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct ParseOutput<'a> {
    root: &'a Node,
    diagnostics: &'a [Diagnostic],
}

fn is_stdin(path: &Path) -> bool {
    path == Path::new("-")
}

/// Read `path`, or stdin for `-`.
pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>> {
    if is_stdin(path) {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

/// Name shown in diagnostics: the file's basename, nothing for stdin.
pub(crate) fn display_name(path: &Path) -> Option<String> {
    if is_stdin(path) {
        return None;
    }
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

pub(crate) fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Parse `path`. Fatal diagnostics go to stderr before the error is returned.
pub(crate) fn parse_file(path: &Path, name: Option<String>) -> Result<Parsed> {
    let bytes = read_input(path)?;
    let mut parser = Parser::new();
    if let Some(name) = name {
        parser = parser.with_filename(name);
    }
    match parser.parse(&bytes) {
        Ok(parsed) => {
            debug!(
                path = %path.display(),
                bytes = bytes.len(),
                diagnostics = parsed.diagnostics.len(),
                "parsed"
            );
            Ok(parsed)
        }
        Err(ParseError::Structural { diagnostics }) => {
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic);
            }
            anyhow::bail!("Error parsing ‘{}’", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("Error parsing ‘{}’", path.display())),
    }
}

pub fn run(file: PathBuf, json: bool, pretty: bool) -> Result<bool> {
    let parsed = parse_file(&file, display_name(&file))?;
    if json {
        let output = ParseOutput {
            root: &parsed.root,
            diagnostics: &parsed.diagnostics,
        };
        println!("{}", to_json(&output, pretty)?);
    } else {
        for diagnostic in &parsed.diagnostics {
            println!("{}", diagnostic);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("-")), None);
        assert_eq!(
            display_name(Path::new("data/org.example.Foo.xml")).as_deref(),
            Some("org.example.Foo.xml")
        );
    }

    #[test]
    fn test_parse_file_with_warnings() {
        let file = write_temp("<node><interface name='org.example.Foo'><foo/></interface></node>");
        let parsed = parse_file(file.path(), Some("foo.xml".to_string())).unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].file.as_deref(), Some("foo.xml"));
    }

    #[test]
    fn test_parse_file_malformed() {
        let file = write_temp("<node><interface name='org.example.Foo'>");
        let err = parse_file(file.path(), None).unwrap_err();
        assert!(err.to_string().starts_with("Error parsing"));
        assert!(err.downcast_ref::<ParseError>().is_some());
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/nonexistent/api.xml"), None).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_json_output_shape() {
        let parsed = dbus_api::parse_str("<node><interface name='org.example.Foo'/></node>").unwrap();
        let output = ParseOutput {
            root: &parsed.root,
            diagnostics: &parsed.diagnostics,
        };
        let value: serde_json::Value = serde_json::from_str(&to_json(&output, false).unwrap()).unwrap();
        assert_eq!(value["root"]["interfaces"][0]["name"], "org.example.Foo");
        assert!(value["diagnostics"].as_array().unwrap().is_empty());
    }
}
