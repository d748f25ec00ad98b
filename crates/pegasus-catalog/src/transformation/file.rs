//! The single-line, column-based transformation catalog.
//!
//! Each line holds `site lfn pfn type sysinfo [profiles]`, separated by
//! whitespace. `null` marks an absent value. Profiles are written as
//! `ns::key="value",key2="value";ns2::key="value"`.

use std::fmt::Write as _;

use chrono::Local;

use super::entry::TransformationEntry;
use super::store::TransformationStore;
use crate::common::{CatalogProfile, SysInfo};
use crate::error::{CatalogError, Result};

const NULL: &str = "null";

/// Parses the column format. `path` is only used in error messages.
pub fn parse(text: &str, path: &str) -> Result<Vec<TransformationEntry>> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        entries.push(parse_line(line).map_err(|e| match e {
            CatalogError::InvalidEntry(message) => CatalogError::parse(path, line_no, message),
            other => other,
        })?);
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Result<TransformationEntry> {
    // profiles may contain quoted whitespace, so only the first five columns
    // are whitespace-split
    let mut fields = Vec::with_capacity(5);
    let mut rest = line;
    while fields.len() < 5 {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    if fields.len() < 5 {
        return Err(CatalogError::invalid(format!(
            "expected at least 5 columns, found {}",
            fields.len()
        )));
    }

    let site = fields[0];
    let lfn = fields[1];
    let pfn = fields[2];

    let tc_type = match fields[3] {
        NULL => Default::default(),
        t => t.parse()?,
    };
    let sysinfo = match fields[4] {
        NULL => SysInfo::default(),
        s => SysInfo::parse_column(s)?,
    };

    let mut entry = TransformationEntry::new(lfn, site, pfn)
        .with_type(tc_type)
        .with_sysinfo(sysinfo);
    let rest = rest.trim();
    if !rest.is_empty() && rest != NULL {
        for profile in parse_profiles(rest)? {
            entry.add_profile(profile);
        }
    }
    Ok(entry)
}

/// Splits on `delimiter` outside double quotes.
fn split_unquoted(s: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> Result<String> {
    let s = s.trim();
    let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return Ok(s.to_string());
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(n) => out.push(n),
                None => return Err(CatalogError::invalid(format!("dangling escape in {s}"))),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Parses `ns::key="value",key2="value";ns2::key="value"`.
pub fn parse_profiles(s: &str) -> Result<Vec<CatalogProfile>> {
    let mut profiles = Vec::new();
    for group in split_unquoted(s, ';') {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let (namespace, pairs) = group
            .split_once("::")
            .ok_or_else(|| CatalogError::invalid(format!("profile group '{group}' has no namespace")))?;
        for pair in split_unquoted(pairs, ',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CatalogError::invalid(format!("profile '{pair}' is not key=value")))?;
            profiles.push(CatalogProfile::new(namespace.trim(), key.trim(), unquote(value)?));
        }
    }
    Ok(profiles)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders profiles grouped by namespace, in first-seen order.
pub fn render_profiles(profiles: &[CatalogProfile]) -> String {
    let mut namespaces: Vec<&str> = Vec::new();
    for p in profiles {
        if !namespaces.contains(&p.namespace.as_str()) {
            namespaces.push(&p.namespace);
        }
    }
    namespaces
        .iter()
        .map(|ns| {
            let pairs: Vec<String> = profiles
                .iter()
                .filter(|p| p.namespace == *ns)
                .map(|p| format!("{}=\"{}\"", p.key, escape(&p.value)))
                .collect();
            format!("{ns}::{}", pairs.join(","))
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Renders the store in the column format.
pub fn render(store: &TransformationStore) -> String {
    let mut out = format!(
        "#RESOURCE\tLFN\tPFN\tTYPE\tSYSINFO\tPROFILES\n# generated {}\n",
        Local::now().to_rfc3339()
    );
    for e in store.entries() {
        let profiles = if e.profiles.is_empty() {
            NULL.to_string()
        } else {
            render_profiles(&e.profiles)
        };
        let _ = writeln!(out, "{e}\t{profiles}");
    }
    out
}
