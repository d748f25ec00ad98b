//! The abstract workflow container.
//!
//! An [`Adag`] owns three registries keyed by identity: files by logical
//! name, jobs by id and dependency records by child id. Node collapses are
//! expressed with [`Adag::replace_parent`]; the pending renames are folded
//! into the dependency registry by an explicit [`Adag::rebuild`]. Readers
//! never mutate: until `rebuild` runs they see the renames applied to a
//! temporary view.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::child::Child;
use crate::error::{DaxError, Result};
use crate::escape::{escape, write_attr};
use crate::filename::{Filename, LinkType, TransferMode};
use crate::job::Job;

/// XML namespace of DAX documents.
pub const SCHEMA_NAMESPACE: &str = "https://pegasus.isi.edu/schema/DAX";

/// Location of the schema the writer targets.
pub const SCHEMA_LOCATION: &str = "https://pegasus.isi.edu/schema/dax-2.1.xsd";

/// Schema version written into the root element.
pub const SCHEMA_VERSION: &str = "2.1";

/// Name used when a workflow has none.
const DEFAULT_NAME: &str = "test";

/// An abstract workflow: files, jobs and control-flow dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adag {
    name: Option<String>,
    count: u32,
    index: u32,
    version: String,
    files: BTreeMap<String, Filename>,
    jobs: BTreeMap<String, Job>,
    children: BTreeMap<String, Child>,
    replacements: BTreeMap<String, String>,
    pending: bool,
}

impl Default for Adag {
    fn default() -> Self {
        Self::new()
    }
}

impl Adag {
    pub fn new() -> Self {
        Self {
            name: None,
            count: 1,
            index: 0,
            version: SCHEMA_VERSION.to_string(),
            files: BTreeMap::new(),
            jobs: BTreeMap::new(),
            children: BTreeMap::new(),
            replacements: BTreeMap::new(),
            pending: false,
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    // ── Document attributes ──────────────────────────────────────────────

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name used in serialized output.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Number of documents in the batch this one belongs to.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn set_count(&mut self, count: u32) {
        self.count = count;
    }

    /// Position of this document within its batch.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// Declares a file use, merging with an existing declaration of the same
    /// logical name.
    pub fn add_filename(
        &mut self,
        lfn: &str,
        is_input: bool,
        temporary_hint: Option<&str>,
        dont_register: bool,
        transfer: TransferMode,
    ) -> &Filename {
        self.files
            .entry(lfn.to_string())
            .and_modify(|f| f.merge(is_input, temporary_hint, dont_register, transfer))
            .or_insert_with(|| {
                let link = if is_input {
                    LinkType::Input
                } else {
                    LinkType::Output
                };
                let mut f = Filename::with_link(lfn, link);
                f.merge(is_input, temporary_hint, dont_register, transfer);
                f
            })
    }

    /// Stores a fully specified file, replacing any previous declaration.
    pub fn insert_filename(&mut self, file: Filename) -> Option<Filename> {
        self.files.insert(file.name().to_string(), file)
    }

    pub fn filename(&self, lfn: &str) -> Option<&Filename> {
        self.files.get(lfn)
    }

    pub fn filename_mut(&mut self, lfn: &str) -> Option<&mut Filename> {
        self.files.get_mut(lfn)
    }

    pub fn remove_filename(&mut self, lfn: &str) -> Option<Filename> {
        self.files.remove(lfn)
    }

    pub fn filenames(&self) -> impl Iterator<Item = &Filename> {
        self.files.values()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    // ── Jobs ─────────────────────────────────────────────────────────────

    /// Adds a job, replacing any job with the same id. Returns true if the
    /// id was new.
    pub fn add_job(&mut self, job: Job) -> bool {
        self.jobs.insert(job.id().to_string(), job).is_none()
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    pub fn remove_job(&mut self, id: &str) -> Option<Job> {
        self.jobs.remove(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    // ── Dependencies ─────────────────────────────────────────────────────

    /// Adds a dependency record. Returns false, leaving the registry as is,
    /// if a record for the same child already exists.
    pub fn add_child(&mut self, child: Child) -> bool {
        if self.children.contains_key(child.child()) {
            return false;
        }
        self.children.insert(child.child().to_string(), child);
        true
    }

    /// Ensures a (possibly parentless) record exists for `id`.
    pub fn add_child_placeholder(&mut self, id: &str) -> bool {
        if self.children.contains_key(id) {
            return false;
        }
        self.children.insert(id.to_string(), Child::new(id));
        true
    }

    /// Records that `child` depends on `parent`. Returns true if the edge
    /// was not known before.
    pub fn add_child_edge(&mut self, child: &str, parent: &str) -> bool {
        match self.children.get_mut(child) {
            Some(record) => record.add_parent(parent),
            None => {
                self.children
                    .insert(child.to_string(), Child::with_parent(child, parent));
                true
            }
        }
    }

    /// The stored record for `id`, as of the last [`Adag::rebuild`].
    pub fn child(&self, id: &str) -> Option<&Child> {
        self.children.get(id)
    }

    /// Dependency records with pending renames applied.
    pub fn children(&self) -> impl Iterator<Item = Child> + '_ {
        let view = self.resolved_children();
        let records: Vec<Child> = view.values().cloned().collect();
        records.into_iter()
    }

    /// Number of dependency records, placeholders included.
    pub fn child_count(&self) -> usize {
        self.resolved_children().len()
    }

    /// Schedules renaming `old` to `new` in every dependency record.
    /// Returns the previously scheduled target for `old`.
    pub fn replace_parent(&mut self, old: &str, new: &str) -> Option<String> {
        self.pending = true;
        self.replacements.insert(old.to_string(), new.to_string())
    }

    pub fn replacements(&self) -> &BTreeMap<String, String> {
        &self.replacements
    }

    pub fn has_pending_replacements(&self) -> bool {
        self.pending
    }

    /// Folds pending renames into the dependency registry, merging the parent
    /// sets of records that end up with the same child id. A no-op when
    /// nothing is pending.
    pub fn rebuild(&mut self) {
        if !self.pending {
            return;
        }
        self.children = remap_children(&self.children, &self.replacements);
        self.pending = false;
        debug!(
            records = self.children.len(),
            renames = self.replacements.len(),
            "rebuilt dependency records"
        );
    }

    fn resolved_children(&self) -> Cow<'_, BTreeMap<String, Child>> {
        if self.pending {
            Cow::Owned(remap_children(&self.children, &self.replacements))
        } else {
            Cow::Borrowed(&self.children)
        }
    }

    /// Shifts the level of `id` and of every job reachable through its
    /// parents by `distance`. Each job is adjusted once; ids without a job
    /// stop the walk. Returns the number of jobs adjusted.
    pub fn adjust_levels(&mut self, id: &str, distance: i32) -> Result<usize> {
        let reached = self.ancestors_of(id)?;
        for jid in &reached {
            if let Some(job) = self.jobs.get_mut(jid) {
                job.set_level(job.level().saturating_add(distance));
            }
        }
        Ok(reached.len())
    }

    /// Depth-first walk over parents; revisiting a job still on the current
    /// path is a cycle.
    fn ancestors_of(&self, start: &str) -> Result<Vec<String>> {
        if !self.jobs.contains_key(start) {
            return Ok(Vec::new());
        }
        let children = self.resolved_children();
        let parents_of = |id: &str| -> Vec<String> {
            children
                .get(id)
                .map(|c| c.parents().map(str::to_string).collect())
                .unwrap_or_default()
        };

        // false = on the current path, true = finished
        let mut state: HashMap<String, bool> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = vec![(start.to_string(), parents_of(start))];
        state.insert(start.to_string(), false);

        loop {
            let Some((_, pending)) = stack.last_mut() else {
                break;
            };
            if let Some(parent) = pending.pop() {
                if !self.jobs.contains_key(&parent) {
                    continue;
                }
                match state.get(&parent) {
                    Some(false) => return Err(DaxError::CyclicGraph { id: parent }),
                    Some(true) => continue,
                    None => {
                        state.insert(parent.clone(), false);
                        let next = parents_of(&parent);
                        stack.push((parent, next));
                    }
                }
            } else if let Some((node, _)) = stack.pop() {
                state.insert(node.clone(), true);
                order.push(node);
            }
        }
        Ok(order)
    }

    /// Parent or child ids in dependency records that name no known job.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for record in self.resolved_children().values() {
            for id in std::iter::once(record.child()).chain(record.parents()) {
                if !self.jobs.contains_key(id) && !missing.iter().any(|m| m == id) {
                    missing.push(id.to_string());
                }
            }
        }
        missing
    }

    // ── XML ──────────────────────────────────────────────────────────────

    /// Writes the XML declaration, provenance comments and the opening
    /// `<adag>` element.
    pub fn write_xml_header<W: Write>(&self, out: &mut W) -> fmt::Result {
        let generated = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let emitted = self
            .resolved_children()
            .values()
            .filter(|c| c.parent_count() > 0)
            .count();

        out.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        writeln!(out, "<!-- generated: {generated} -->")?;
        writeln!(out, "<!-- generated by: {user} [??] -->")?;
        write!(
            out,
            "<adag xmlns=\"{SCHEMA_NAMESPACE}\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
             xsi:schemaLocation=\"{SCHEMA_NAMESPACE} {SCHEMA_LOCATION}\""
        )?;
        write_attr(out, "version", &self.version)?;
        write_attr(out, "count", &self.count.to_string())?;
        write_attr(out, "index", &self.index.to_string())?;
        write_attr(out, "name", self.label())?;
        write_attr(out, "jobCount", &self.jobs.len().to_string())?;
        write_attr(out, "fileCount", &self.files.len().to_string())?;
        write_attr(out, "childCount", &emitted.to_string())?;
        out.write_str(">\n")
    }

    /// Writes the complete XML document.
    pub fn write_xml<W: Write>(&self, out: &mut W) -> fmt::Result {
        self.write_xml_header(out)?;

        out.write_str("  <!-- part 1: list of all referenced files (may be empty) -->\n")?;
        for file in self.files.values() {
            out.write_str("  ")?;
            file.write_xml(out)?;
            out.write_char('\n')?;
        }

        out.write_str("  <!-- part 2: definition of all jobs (at least one) -->\n")?;
        for job in self.jobs.values() {
            job.write_xml(out, "  ")?;
        }

        out.write_str("  <!-- part 3: list of control-flow dependencies (may be empty) -->\n")?;
        for record in self.resolved_children().values() {
            record.write_xml(out, "  ")?;
        }

        out.write_str("</adag>\n")
    }

    pub fn to_xml(&self) -> String {
        let mut s = String::new();
        // writing into a String cannot fail
        let _ = self.write_xml(&mut s);
        s
    }

    /// Serializes to XML and writes the result to `path`.
    pub fn write_xml_file(&self, path: &Path) -> Result<()> {
        let mut xml = String::new();
        self.write_xml(&mut xml)?;
        std::fs::write(path, xml).map_err(|e| DaxError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Legacy brace-delimited text form.
impl fmt::Display for Adag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "adag {} {{", escape(self.label()))?;
        writeln!(f, "  count={};", self.count)?;
        writeln!(f, "  index={};", self.index)?;

        writeln!(f, "  files {{")?;
        for file in self.files.values() {
            writeln!(f, "    {}", file)?;
        }
        writeln!(f, "  }}")?;

        writeln!(f, "  jobs {{")?;
        for job in self.jobs.values() {
            job.fmt(f)?;
        }
        writeln!(f, "  }}")?;

        writeln!(f, "  dependencies {{")?;
        for record in self.resolved_children().values() {
            if record.parent_count() > 0 {
                writeln!(f, "    {}", record)?;
            }
        }
        writeln!(f, "  }}")?;
        writeln!(f, "}}")
    }
}

/// Passes every record through `mapping`, unioning parent sets of records
/// that collide on the new child id.
fn remap_children(
    children: &BTreeMap<String, Child>,
    mapping: &BTreeMap<String, String>,
) -> BTreeMap<String, Child> {
    let mut out: BTreeMap<String, Child> = BTreeMap::new();
    for record in children.values() {
        let updated = record.update_child(mapping);
        match out.get_mut(updated.child()) {
            Some(existing) => existing.absorb(updated),
            None => {
                out.insert(updated.child().to_string(), updated);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Leaf;

    fn diamond() -> Adag {
        let mut dag = Adag::with_name("diamond");
        for id in ["a", "b", "c", "d"] {
            dag.add_job(Job::new(id, format!("t{id}")));
        }
        dag.add_child_edge("b", "a");
        dag.add_child_edge("c", "a");
        dag.add_child_edge("d", "b");
        dag.add_child_edge("d", "c");
        dag
    }

    #[test]
    fn test_defaults() {
        let dag = Adag::new();
        assert_eq!(dag.count(), 1);
        assert_eq!(dag.index(), 0);
        assert_eq!(dag.version(), "2.1");
        assert_eq!(dag.label(), "test");
    }

    #[test]
    fn test_add_filename_widens_link() {
        let mut dag = Adag::new();
        dag.add_filename("f", false, None, false, TransferMode::Mandatory);
        assert_eq!(dag.filename("f").map(Filename::link), Some(LinkType::Output));
        dag.add_filename("f", true, None, false, TransferMode::Mandatory);
        assert_eq!(dag.filename("f").map(Filename::link), Some(LinkType::InOut));
        assert_eq!(dag.file_count(), 1);
    }

    #[test]
    fn test_add_filename_new_entry_takes_hints() {
        let mut dag = Adag::new();
        let f = dag.add_filename("t", true, Some("tmp"), true, TransferMode::Not);
        assert_eq!(f.link(), LinkType::Input);
        assert!(!f.register());
        assert_eq!(f.transfer(), TransferMode::Not);
        assert_eq!(f.temporary_hint(), Some("tmp"));
    }

    #[test]
    fn test_add_job_reports_new_ids() {
        let mut dag = Adag::new();
        assert!(dag.add_job(Job::new("a", "x")));
        assert!(!dag.add_job(Job::new("a", "y")));
        assert_eq!(dag.job("a").map(Job::name), Some("y"));
    }

    #[test]
    fn test_child_registration_variants() {
        let mut dag = Adag::new();
        assert!(dag.add_child_placeholder("b"));
        assert!(!dag.add_child_placeholder("b"));
        assert!(dag.add_child_edge("b", "a"));
        assert!(dag.add_child_edge("c", "b"));
        assert!(dag.add_child_edge("c", "d"));
        assert!(!dag.add_child_edge("c", "d"));
        assert_eq!(dag.child("c").map(|c| c.parents().count()), Some(2));
        assert!(!dag.add_child(Child::with_parent("c", "z")));
        assert!(!dag.child("c").is_some_and(|c| c.has_parent("z")));
        assert_eq!(dag.child_count(), 2);
    }

    #[test]
    fn test_replace_parent_merges_collapsed_children() {
        let mut dag = Adag::new();
        dag.add_child_edge("b1", "a");
        dag.add_child_edge("b2", "x");
        dag.add_child_edge("c", "b1");
        assert_eq!(dag.replace_parent("b1", "B"), None);
        assert_eq!(dag.replace_parent("b2", "B"), None);
        assert!(dag.has_pending_replacements());

        // readers see the renames without mutating the registry
        assert_eq!(dag.child_count(), 2);
        assert!(dag.child("b1").is_some());

        dag.rebuild();
        assert!(!dag.has_pending_replacements());
        let merged = dag.child("B").unwrap();
        assert!(merged.has_parent("a") && merged.has_parent("x"));
        assert!(dag.child("c").unwrap().has_parent("B"));
        assert!(dag.child("b1").is_none());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut dag = diamond();
        dag.replace_parent("b", "c");
        dag.replace_parent("c", "e");
        dag.rebuild();
        let first = dag.clone();
        dag.rebuild();
        assert_eq!(dag, first);
    }

    #[test]
    fn test_adjust_levels_visits_each_ancestor_once() {
        let mut dag = diamond();
        let adjusted = dag.adjust_levels("d", 2).unwrap();
        assert_eq!(adjusted, 4);
        for id in ["a", "b", "c", "d"] {
            assert_eq!(dag.job(id).unwrap().level(), 1, "job {id}");
        }
        assert_eq!(dag.adjust_levels("missing", 1).unwrap(), 0);
    }

    #[test]
    fn test_adjust_levels_saturates() {
        let mut dag = diamond();
        dag.job_mut("d").unwrap().set_level(i32::MAX - 1);
        dag.adjust_levels("d", 5).unwrap();
        assert_eq!(dag.job("d").unwrap().level(), i32::MAX);
        assert_eq!(dag.job("a").unwrap().level(), 4);
    }

    #[test]
    fn test_adjust_levels_detects_cycle() {
        let mut dag = diamond();
        dag.add_child_edge("a", "d");
        let err = dag.adjust_levels("d", 1).unwrap_err();
        assert!(matches!(err, DaxError::CyclicGraph { .. }));
        // nothing was adjusted
        assert!(dag.jobs().all(|j| j.level() == -1));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut dag = diamond();
        dag.job_mut("a").unwrap().add_argument(Leaf::text("-v"));
        let mut copy = dag.clone();
        copy.job_mut("a").unwrap().add_argument(Leaf::text(" -x"));
        copy.add_child_edge("a", "z");
        copy.add_filename("new", true, None, false, TransferMode::Mandatory);
        copy.replace_parent("a", "aa");

        assert_eq!(dag.job("a").unwrap().arguments().len(), 1);
        assert!(dag.child("a").is_none());
        assert_eq!(dag.file_count(), 0);
        assert!(dag.replacements().is_empty());
    }

    #[test]
    fn test_dangling_references() {
        let mut dag = diamond();
        dag.add_child_edge("d", "ghost");
        assert_eq!(dag.dangling_references(), vec!["ghost".to_string()]);
    }

    #[test]
    fn test_text_form() {
        let mut dag = Adag::with_name("small");
        dag.add_job(Job::new("a", "x"));
        dag.add_filename("f", true, None, false, TransferMode::Mandatory);
        dag.add_child_edge("b", "a");
        dag.add_child_placeholder("a");

        let text = dag.to_string();
        assert!(text.starts_with("adag small {\n  count=1;\n  index=0;\n  files {\n"));
        assert!(text.contains("    @{input:\"f\"}\n"));
        assert!(text.contains("  dependencies {\n    CHILD b PARENT a\n  }\n"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_xml_header_and_sections() {
        let xml = diamond().to_xml();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- generated: "));
        assert!(xml.contains(&format!("xsi:schemaLocation=\"{SCHEMA_NAMESPACE} {SCHEMA_LOCATION}\"")));
        assert!(xml.contains(
            r#" version="2.1" count="1" index="0" name="diamond" jobCount="4" fileCount="0" childCount="3">"#
        ));
        let p1 = xml.find("part 1:").unwrap();
        let p2 = xml.find("part 2:").unwrap();
        let p3 = xml.find("part 3:").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert!(xml.ends_with("</adag>\n"));
    }
}
