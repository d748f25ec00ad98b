//! Jobs: the nodes of an abstract workflow.

use std::fmt::{self, Write};

use crate::escape::{write_attr, write_opt_attr};
use crate::filename::Filename;
use crate::leaf::{Leaf, join_leaves};
use crate::profile::Profile;

/// Level value meaning "not computed".
pub const UNSET_LEVEL: i32 = -1;

/// A single invocation of a logical transformation.
///
/// The id is fixed at construction; renaming the transformation never
/// touches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: String,
    namespace: Option<String>,
    name: String,
    version: Option<String>,
    dv_namespace: Option<String>,
    dv_name: Option<String>,
    dv_version: Option<String>,
    chain: Option<String>,
    level: i32,
    arguments: Vec<Leaf>,
    profiles: Vec<Profile>,
    uses: Vec<Filename>,
    stdin: Option<Filename>,
    stdout: Option<Filename>,
    stderr: Option<Filename>,
}

impl Job {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: None,
            name: name.into(),
            version: None,
            dv_namespace: None,
            dv_name: None,
            dv_version: None,
            chain: None,
            level: UNSET_LEVEL,
            arguments: Vec::new(),
            profiles: Vec::new(),
            uses: Vec::new(),
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }

    /// A job for the fully qualified transformation `namespace::name:version`.
    pub fn with_transformation(
        id: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
        version: Option<&str>,
    ) -> Self {
        let mut job = Self::new(id, name);
        job.namespace = namespace.map(str::to_string);
        job.version = version.map(str::to_string);
        job
    }

    // ── Identity ─────────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    /// The transformation as `namespace::name:version`, omitting absent parts.
    pub fn transformation(&self) -> String {
        let mut s = String::new();
        if let Some(ns) = &self.namespace {
            s.push_str(ns);
            s.push_str("::");
        }
        s.push_str(&self.name);
        if let Some(v) = &self.version {
            s.push(':');
            s.push_str(v);
        }
        s
    }

    pub fn dv_namespace(&self) -> Option<&str> {
        self.dv_namespace.as_deref()
    }

    pub fn dv_name(&self) -> Option<&str> {
        self.dv_name.as_deref()
    }

    pub fn dv_version(&self) -> Option<&str> {
        self.dv_version.as_deref()
    }

    /// Records the derivation this job was produced from.
    pub fn set_derivation(
        &mut self,
        namespace: Option<String>,
        name: Option<String>,
        version: Option<String>,
    ) {
        self.dv_namespace = namespace;
        self.dv_name = name;
        self.dv_version = version;
    }

    pub fn chain(&self) -> Option<&str> {
        self.chain.as_deref()
    }

    pub fn set_chain(&mut self, chain: Option<String>) {
        self.chain = chain;
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    // ── Arguments ────────────────────────────────────────────────────────

    pub fn arguments(&self) -> &[Leaf] {
        &self.arguments
    }

    pub fn add_argument(&mut self, leaf: impl Into<Leaf>) {
        self.arguments.push(leaf.into());
    }

    pub fn insert_argument(&mut self, index: usize, leaf: impl Into<Leaf>) {
        let index = index.min(self.arguments.len());
        self.arguments.insert(index, leaf.into());
    }

    pub fn set_argument(&mut self, index: usize, leaf: impl Into<Leaf>) -> Option<Leaf> {
        let slot = self.arguments.get_mut(index)?;
        Some(std::mem::replace(slot, leaf.into()))
    }

    pub fn remove_argument(&mut self, index: usize) -> Option<Leaf> {
        (index < self.arguments.len()).then(|| self.arguments.remove(index))
    }

    pub fn clear_arguments(&mut self) {
        self.arguments.clear();
    }

    /// The command line with file leaves replaced by their logical names.
    pub fn argument_line(&self) -> String {
        self.arguments
            .iter()
            .map(|leaf| match leaf {
                Leaf::Text(t) => t.content(),
                Leaf::File(f) => f.name(),
            })
            .collect()
    }

    // ── Profiles ─────────────────────────────────────────────────────────

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Adds a profile, replacing any profile in the same (namespace, key)
    /// slot. Returns the replaced profile.
    pub fn add_profile(&mut self, profile: Profile) -> Option<Profile> {
        match self.profiles.iter().position(|p| p.same_slot(&profile)) {
            Some(i) => Some(std::mem::replace(&mut self.profiles[i], profile)),
            None => {
                self.profiles.push(profile);
                None
            }
        }
    }

    pub fn profile(&self, namespace: &str, key: &str) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.namespace() == Some(namespace) && p.key() == Some(key))
    }

    pub fn remove_profile(&mut self, namespace: &str, key: &str) -> Option<Profile> {
        let i = self
            .profiles
            .iter()
            .position(|p| p.namespace() == Some(namespace) && p.key() == Some(key))?;
        Some(self.profiles.remove(i))
    }

    pub fn clear_profiles(&mut self) {
        self.profiles.clear();
    }

    // ── Uses and stdio ───────────────────────────────────────────────────

    pub fn uses(&self) -> &[Filename] {
        &self.uses
    }

    pub fn add_uses(&mut self, file: Filename) {
        self.uses.push(file);
    }

    pub fn remove_uses(&mut self, name: &str) -> Option<Filename> {
        let i = self.uses.iter().position(|f| f.name() == name)?;
        Some(self.uses.remove(i))
    }

    pub fn clear_uses(&mut self) {
        self.uses.clear();
    }

    pub fn stdin(&self) -> Option<&Filename> {
        self.stdin.as_ref()
    }

    pub fn set_stdin(&mut self, file: Option<Filename>) {
        self.stdin = file;
    }

    pub fn stdout(&self) -> Option<&Filename> {
        self.stdout.as_ref()
    }

    pub fn set_stdout(&mut self, file: Option<Filename>) {
        self.stdout = file;
    }

    pub fn stderr(&self) -> Option<&Filename> {
        self.stderr.as_ref()
    }

    pub fn set_stderr(&mut self, file: Option<Filename>) {
        self.stderr = file;
    }

    // ── Serialization ────────────────────────────────────────────────────

    /// Writes the `<job>` element. Element order is fixed: argument,
    /// profiles, stdio, uses.
    pub fn write_xml<W: Write>(&self, out: &mut W, indent: &str) -> fmt::Result {
        let inner = format!("{indent}  ");

        write!(out, "{indent}<job")?;
        write_attr(out, "id", &self.id)?;
        write_opt_attr(out, "namespace", self.namespace.as_deref())?;
        write_attr(out, "name", &self.name)?;
        write_opt_attr(out, "version", self.version.as_deref())?;
        if self.level != UNSET_LEVEL {
            write_attr(out, "level", &self.level.to_string())?;
        }
        if let Some(chain) = self.chain.as_deref().filter(|c| !c.is_empty()) {
            write_attr(out, "compound", chain)?;
        }
        if self.dv_name.is_some() {
            write_opt_attr(out, "dv-namespace", self.dv_namespace.as_deref())?;
            write_opt_attr(out, "dv-name", self.dv_name.as_deref())?;
            write_opt_attr(out, "dv-version", self.dv_version.as_deref())?;
        }
        out.write_str(">\n")?;

        if !self.arguments.is_empty() {
            write!(out, "{inner}<argument>")?;
            for leaf in &self.arguments {
                leaf.short_xml(out, 0)?;
            }
            out.write_str("</argument>\n")?;
        }

        for profile in &self.profiles {
            out.write_str(&inner)?;
            profile.write_xml(out)?;
            out.write_char('\n')?;
        }

        for (tag, file) in [
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ] {
            if let Some(file) = file {
                out.write_str(&inner)?;
                file.write_stdio(out, tag)?;
                out.write_char('\n')?;
            }
        }

        for file in &self.uses {
            out.write_str(&inner)?;
            file.write_uses(out)?;
            out.write_char('\n')?;
        }

        writeln!(out, "{indent}</job>")
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    job {} {{", self.transformation())?;
        writeln!(f, "      id={};", self.id)?;

        if !self.arguments.is_empty() {
            writeln!(f, "      argument={};", join_leaves(&self.arguments))?;
        }
        for profile in &self.profiles {
            writeln!(f, "      {};", profile)?;
        }
        for (tag, file) in [
            ("stdin", &self.stdin),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
        ] {
            if let Some(file) = file {
                writeln!(f, "      {}={};", tag, file)?;
            }
        }
        for file in &self.uses {
            writeln!(f, "      uses={};", file)?;
        }
        writeln!(f, "    }}")
    }
}
