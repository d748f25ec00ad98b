//! Namespaced key/value annotations attached to jobs.

use std::fmt::{self, Write};

use crate::escape::write_opt_attr;
use crate::leaf::{Leaf, join_leaves};

/// A profile whose value is an ordered list of mixed-content leaves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    namespace: Option<String>,
    key: Option<String>,
    origin: Option<String>,
    leaves: Vec<Leaf>,
}

impl Profile {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Convenience constructor for a profile with a single text value.
    pub fn with_text(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut p = Self::new(namespace, key);
        p.add_leaf(Leaf::text(value));
        p
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn set_origin(&mut self, origin: Option<String>) {
        self.origin = origin;
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn add_leaf(&mut self, leaf: impl Into<Leaf>) {
        self.leaves.push(leaf.into());
    }

    /// Replaces the leaf at `index`, returning the old one. Out-of-range
    /// indices leave the list untouched.
    pub fn set_leaf(&mut self, index: usize, leaf: impl Into<Leaf>) -> Option<Leaf> {
        let slot = self.leaves.get_mut(index)?;
        Some(std::mem::replace(slot, leaf.into()))
    }

    pub fn clear_leaves(&mut self) {
        self.leaves.clear();
    }

    /// The concatenated text of all leaves; file leaves contribute their name.
    pub fn value(&self) -> String {
        self.leaves
            .iter()
            .map(|leaf| match leaf {
                Leaf::Text(t) => t.content(),
                Leaf::File(f) => f.name(),
            })
            .collect()
    }

    /// Whether both profiles occupy the same (namespace, key) slot.
    /// Absent values only match other absent values.
    pub fn same_slot(&self, other: &Profile) -> bool {
        self.namespace == other.namespace && self.key == other.key
    }

    pub fn write_xml<W: Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str("<profile")?;
        write_opt_attr(out, "origin", self.origin.as_deref())?;
        write_opt_attr(out, "namespace", self.namespace.as_deref())?;
        write_opt_attr(out, "key", self.key.as_deref())?;
        out.write_char('>')?;
        for leaf in &self.leaves {
            leaf.short_xml(out, 0)?;
        }
        out.write_str("</profile>")
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("profile ")?;
        if let Some(ns) = &self.namespace {
            write!(f, "{}::", ns)?;
        }
        write!(
            f,
            "{} = {}",
            self.key.as_deref().unwrap_or_default(),
            join_leaves(&self.leaves)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::{Filename, LinkType};

    #[test]
    fn test_same_slot_treats_absent_as_distinct_value() {
        let a = Profile::new("env", "PATH");
        let mut b = Profile::new("env", "PATH");
        b.add_leaf(Leaf::text("/bin"));
        assert!(a.same_slot(&b));

        let mut none = Profile::default();
        none.set_key(Some("PATH".into()));
        assert!(!none.same_slot(&a));

        let mut other_none = Profile::default();
        other_none.set_key(Some("PATH".into()));
        assert!(none.same_slot(&other_none));
    }

    #[test]
    fn test_set_leaf_replaces_in_place() {
        let mut p = Profile::with_text("env", "A", "one");
        let old = p.set_leaf(0, Leaf::text("two"));
        assert_eq!(old, Some(Leaf::text("one")));
        assert_eq!(p.value(), "two");
        assert!(p.set_leaf(5, Leaf::text("x")).is_none());
    }

    #[test]
    fn test_xml_with_origin_and_file_leaf() {
        let mut p = Profile::with_text("condor", "arguments", "-f ");
        p.add_leaf(Filename::with_link("x<1", LinkType::Input));
        p.set_origin(Some("dax".into()));

        let mut s = String::new();
        p.write_xml(&mut s).unwrap();
        assert_eq!(
            s,
            r#"<profile origin="dax" namespace="condor" key="arguments">-f <filename file="x&lt;1"/></profile>"#
        );
    }

    #[test]
    fn test_display() {
        let p = Profile::with_text("env", "HOME", "/home/u");
        assert_eq!(p.to_string(), r#"profile env::HOME = "/home/u""#);
    }
}
