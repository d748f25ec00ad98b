//! Quoting helpers shared by the XML and text writers.

use std::borrow::Cow;
use std::fmt::{self, Write};

/// Escapes XML markup characters. Attribute values additionally get their
/// quote characters escaped.
pub fn quote(s: &str, is_attribute: bool) -> Cow<'_, str> {
    let needs = s.chars().any(|c| match c {
        '&' | '<' | '>' => true,
        '"' | '\'' => is_attribute,
        _ => false,
    });
    if !needs {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if is_attribute => out.push_str("&quot;"),
            '\'' if is_attribute => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Backslash-escapes double quotes and backslashes for the text format.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['"', '\\']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Writes ` name="value"` with the value attribute-quoted.
pub fn write_attr<W: Write>(out: &mut W, name: &str, value: &str) -> fmt::Result {
    write!(out, " {}=\"{}\"", name, quote(value, true))
}

/// Writes the attribute only when a value is present.
pub fn write_opt_attr<W: Write>(out: &mut W, name: &str, value: Option<&str>) -> fmt::Result {
    match value {
        Some(v) => write_attr(out, name, v),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_leaves_plain_text_borrowed() {
        assert!(matches!(quote("plain text", true), Cow::Borrowed(_)));
    }

    #[test]
    fn test_quote_attribute_vs_content() {
        assert_eq!(quote("a<b & \"c\"", true), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(quote("a<b & \"c\"", false), "a&lt;b &amp; \"c\"");
    }

    #[test]
    fn test_escape_quotes_and_backslashes() {
        assert_eq!(escape(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }

    #[test]
    fn test_write_opt_attr_skips_none() {
        let mut s = String::new();
        write_opt_attr(&mut s, "varname", None).unwrap();
        write_opt_attr(&mut s, "varname", Some("x")).unwrap();
        assert_eq!(s, " varname=\"x\"");
    }
}
