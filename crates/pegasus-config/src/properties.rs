//! Java-style `.properties` files.
//!
//! Supports `#` and `!` comments, `=`, `:` or whitespace separators,
//! backslash line continuations and the `\t \n \r \f \uXXXX` escapes.
//! Keys are kept sorted.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// An ordered set of string properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses properties text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut props = Properties::new();
        let mut lines = text.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            // join continuation lines
            let mut logical = trimmed.to_string();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            let key = unescape(key, index + 1)?;
            let value = unescape(value, index + 1)?;
            props.entries.insert(key, value);
        }
        Ok(props)
    }

    /// Reads and parses a properties file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlays `other` on top of this set.
    pub fn merge(&mut self, other: Properties) {
        self.entries.extend(other.entries);
    }

    /// Properties whose key starts with `prefix`. With `keep_prefix` false
    /// the prefix and the following dot are stripped from the keys.
    pub fn matching_subset(&self, prefix: &str, keep_prefix: bool) -> Properties {
        let dotted = format!("{prefix}.");
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() == prefix || k.starts_with(&dotted))
            .filter_map(|(k, v)| {
                if keep_prefix {
                    Some((k.clone(), v.clone()))
                } else {
                    k.strip_prefix(&dotted).map(|rest| (rest.to_string(), v.clone()))
                }
            })
            .collect();
        Properties { entries }
    }

    /// Renders the set as `key=value` lines preceded by a comment header.
    pub fn to_text(&self, header: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(header) = header {
            for line in header.lines() {
                let _ = writeln!(out, "# {line}");
            }
        }
        for (k, v) in &self.entries {
            let _ = writeln!(out, "{}={}", escape(k, true), escape(v, false));
        }
        out
    }

    /// Writes the set to `path`.
    pub fn store(&self, path: &Path, header: Option<&str>) -> Result<()> {
        std::fs::write(path, self.to_text(header)).map_err(|e| ConfigError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Properties {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Splits at the first unescaped separator.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut split = None;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                split = Some(i);
                break;
            }
            _ => {}
        }
    }

    let Some(at) = split else {
        return (line, "");
    };
    let key = &line[..at];
    let rest = line[at..].trim_start_matches([' ', '\t', '\u{c}']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t', '\u{c}']))
}

fn unescape(raw: &str, line: usize) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| ConfigError::Parse {
                        line,
                        message: format!("malformed \\u escape '\\u{hex}'"),
                    })?;
                out.push(code);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn escape(s: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_separators_and_comments() {
        let props = Properties::parse(
            "# comment\n! also comment\n\na=1\nb : 2\nc 3\n  d=\ne\n",
        )
        .unwrap();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
        assert_eq!(props.get("c"), Some("3"));
        assert_eq!(props.get("d"), Some(""));
        assert_eq!(props.get("e"), Some(""));
        assert_eq!(props.len(), 5);
    }

    #[test]
    fn test_parse_continuation_and_escapes() {
        let props = Properties::parse(
            "list = one,\\\n       two,\\\n       three\npath=C:\\\\dir\nkey\\ with\\ space=x\\ty\nsnow=\\u2603\n",
        )
        .unwrap();
        assert_eq!(props.get("list"), Some("one,two,three"));
        assert_eq!(props.get("path"), Some("C:\\dir"));
        assert_eq!(props.get("key with space"), Some("x\ty"));
        assert_eq!(props.get("snow"), Some("\u{2603}"));
    }

    #[test]
    fn test_bad_unicode_escape() {
        let err = Properties::parse("ok=1\nbad=\\u12\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_matching_subset() {
        let props = Properties::parse("vds.a=1\nvds.b.c=2\nvdsx=3\nvds=4\npegasus.a=5\n").unwrap();

        let kept = props.matching_subset("vds", true);
        assert_eq!(kept.len(), 3);
        assert!(kept.contains("vds"));
        assert!(!kept.contains("vdsx"));

        let stripped = props.matching_subset("vds", false);
        assert_eq!(stripped.get("b.c"), Some("2"));
        assert_eq!(stripped.len(), 2);
    }

    #[test]
    fn test_store_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.properties");

        let mut props = Properties::new();
        props.set("a key", "multi\nline");
        props.set("plain", " leading space");
        props.store(&path, Some("generated")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# generated\n"));
        assert_eq!(Properties::load(&path).unwrap(), props);
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Properties::parse("a=1\nb=2\n").unwrap();
        base.merge(Properties::parse("b=3\nc=4\n").unwrap());
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.len(), 3);
    }
}
