//! Mixed-content fragments used in argument lines and profile values.

use std::fmt::{self, Write};

use crate::escape::{escape, quote};
use crate::filename::Filename;

/// A literal piece of text inside mixed content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PseudoText {
    content: String,
}

impl PseudoText {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn append(&mut self, more: &str) {
        self.content.push_str(more);
    }
}

impl fmt::Display for PseudoText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape(&self.content))
    }
}

/// One fragment of mixed content: literal text or a file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    Text(PseudoText),
    File(Filename),
}

impl Leaf {
    pub fn text(content: impl Into<String>) -> Self {
        Leaf::Text(PseudoText::new(content))
    }

    pub fn as_filename(&self) -> Option<&Filename> {
        match self {
            Leaf::File(f) => Some(f),
            Leaf::Text(_) => None,
        }
    }

    /// Writes the leaf as element content: escaped text or an inline
    /// `<filename>` element.
    pub fn short_xml<W: Write>(&self, out: &mut W, flags: u8) -> fmt::Result {
        match self {
            Leaf::Text(t) => out.write_str(&quote(t.content(), false)),
            Leaf::File(f) => f.short_xml(out, flags),
        }
    }
}

impl From<PseudoText> for Leaf {
    fn from(t: PseudoText) -> Self {
        Leaf::Text(t)
    }
}

impl From<Filename> for Leaf {
    fn from(f: Filename) -> Self {
        Leaf::File(f)
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Text(t) => t.fmt(f),
            Leaf::File(file) => file.fmt(f),
        }
    }
}

/// Concatenates leaves in their text form.
pub(crate) fn join_leaves(leaves: &[Leaf]) -> String {
    leaves.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::LinkType;

    #[test]
    fn test_text_display_is_quoted() {
        assert_eq!(Leaf::text(r#"-o "x""#).to_string(), r#""-o \"x\"""#);
    }

    #[test]
    fn test_short_xml_mixed() {
        let leaves = [
            Leaf::text("-i "),
            Leaf::File(Filename::with_link("in.txt", LinkType::Input)),
            Leaf::text(" > a&b"),
        ];
        let mut s = String::new();
        for leaf in &leaves {
            leaf.short_xml(&mut s, 0).unwrap();
        }
        assert_eq!(s, r#"-i <filename file="in.txt"/> &gt; a&amp;b"#);
    }
}
