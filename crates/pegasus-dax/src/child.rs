//! One-level dependency records: a child job and the jobs it waits for.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write};

use crate::escape::quote;

/// A child job id with its set of parent job ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    child: String,
    parents: BTreeSet<String>,
}

impl Child {
    /// A placeholder record with no parents yet.
    pub fn new(child: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parents: BTreeSet::new(),
        }
    }

    pub fn with_parent(child: impl Into<String>, parent: impl Into<String>) -> Self {
        let mut c = Self::new(child);
        c.add_parent(parent);
        c
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(String::as_str)
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    pub fn has_parent(&self, id: &str) -> bool {
        self.parents.contains(id)
    }

    /// Adds a parent; returns false if it was already present.
    pub fn add_parent(&mut self, id: impl Into<String>) -> bool {
        self.parents.insert(id.into())
    }

    pub fn remove_parent(&mut self, id: &str) -> bool {
        self.parents.remove(id)
    }

    /// Unions another record's parents into this one.
    pub(crate) fn absorb(&mut self, other: Child) {
        self.parents.extend(other.parents);
    }

    /// Returns a copy with the child id and every parent id passed through
    /// `mapping`; ids without a mapping are kept.
    pub fn update_child(&self, mapping: &BTreeMap<String, String>) -> Child {
        let remap = |id: &String| mapping.get(id).unwrap_or(id).clone();
        Child {
            child: remap(&self.child),
            parents: self.parents.iter().map(remap).collect(),
        }
    }

    /// Writes `<child ref=..><parent ref=../>..</child>`; nothing when there
    /// are no parents.
    pub fn write_xml<W: Write>(&self, out: &mut W, indent: &str) -> fmt::Result {
        if self.parents.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}<child ref=\"{}\">", indent, quote(&self.child, true))?;
        for parent in &self.parents {
            writeln!(out, "{}  <parent ref=\"{}\"/>", indent, quote(parent, true))?;
        }
        writeln!(out, "{}</child>", indent)
    }
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parents.is_empty() {
            return Ok(());
        }
        write!(f, "CHILD {} PARENT", self.child)?;
        for parent in &self.parents {
            write!(f, " {}", parent)?;
        }
        Ok(())
    }
}
