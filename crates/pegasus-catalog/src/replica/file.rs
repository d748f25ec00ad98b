//! The flat-file replica catalog.
//!
//! One replica per line: `lfn pfn key="value" ...`. The lfn and pfn are
//! quoted only when they contain whitespace, quotes, backslashes or `=`;
//! attribute values are always quoted. Lines are sorted on write.

use std::fmt::Write as _;

use super::store::{ReplicaEntry, ReplicaStore};
use crate::error::{CatalogError, Result};

fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '='))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn quote_if_needed(s: &str) -> String {
    if needs_quoting(s) { quote(s) } else { s.to_string() }
}

/// Splits a line into tokens; `key=value` pairs stay together.
fn tokenize(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(n) => current.push(n),
                            None => return Err("dangling escape".into()),
                        },
                        Some(n) => current.push(n),
                        None => return Err("unterminated quote".into()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '=' => {
                // keep the separator visible to the attribute parser
                current.push('\u{0}');
                in_token = true;
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Parses the file format. `path` is only used in error messages.
pub fn parse(text: &str, path: &str) -> Result<Vec<ReplicaEntry>> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let tokens = tokenize(trimmed).map_err(|m| CatalogError::parse(path, line_no, m))?;
        let mut tokens = tokens.into_iter();
        let (Some(lfn), Some(pfn)) = (tokens.next(), tokens.next()) else {
            return Err(CatalogError::parse(path, line_no, "expected lfn and pfn"));
        };
        if lfn.contains('\u{0}') || pfn.contains('\u{0}') {
            return Err(CatalogError::parse(path, line_no, "unquoted '=' in lfn or pfn"));
        }

        let mut entry = ReplicaEntry::new(lfn, pfn);
        for token in tokens {
            let Some((key, value)) = token.split_once('\u{0}') else {
                return Err(CatalogError::parse(
                    path,
                    line_no,
                    format!("attribute '{token}' is not key=\"value\""),
                ));
            };
            entry.attributes.insert(key.to_string(), value.replace('\u{0}', "="));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Renders the store, one sorted line per replica.
pub fn render(store: &ReplicaStore) -> String {
    let mut lines: Vec<String> = store
        .entries()
        .map(|e| {
            let mut line = format!("{} {}", quote_if_needed(&e.lfn), quote_if_needed(&e.pfn));
            for (k, v) in &e.attributes {
                let _ = write!(line, " {}={}", k, quote(v));
            }
            line
        })
        .collect();
    lines.sort();
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let text = "\
# replicas
f.a file:///data/f.a site=\"local\"
\"my file\" \"file:///data/my file\" site=\"isi\" checksum=\"a=b\"
f.c gsiftp://host/f.c
";
        let entries = parse(text, "rc.data").unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].site(), Some("local"));
        assert_eq!(entries[1].lfn, "my file");
        assert_eq!(entries[1].pfn, "file:///data/my file");
        assert_eq!(entries[1].attributes["checksum"], "a=b");
        assert!(entries[2].attributes.is_empty());
    }

    #[test]
    fn test_bad_lines() {
        assert!(matches!(
            parse("f.a\n", "rc").unwrap_err(),
            CatalogError::Parse { line: 1, .. }
        ));
        assert!(parse("f.a pfn \"open\n", "rc").is_err());
        assert!(parse("f.a pfn bare\n", "rc").is_err());
    }

    #[test]
    fn test_render_quotes_and_sorts() {
        let mut store = ReplicaStore::new();
        store.insert(ReplicaEntry::new("z", "file:///z").with_site("local"));
        store.insert(ReplicaEntry::new("a b", "file:///a").with_site("lo\"cal"));
        let text = render(&store);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "\"a b\" file:///a site=\"lo\\\"cal\"");
        assert_eq!(lines[1], "z file:///z site=\"local\"");

        let again = parse(&text, "rc").unwrap();
        assert_eq!(again[0].site(), Some("lo\"cal"));
    }
}
