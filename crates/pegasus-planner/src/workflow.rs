//! The executable workflow: jobs bound to sites and executables.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use pegasus_catalog::CatalogProfile;

use crate::error::{PlannerError, Result};

pub const NOOP_PREFIX: &str = "noop_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobKind {
    #[default]
    Compute,
    /// Placeholder that the workflow manager never runs.
    Noop,
    /// Removes a remote working directory.
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableJob {
    /// Id of the abstract job.
    pub id: String,
    /// Unique name used for submit files.
    pub name: String,
    pub transformation: String,
    pub site: String,
    pub executable: String,
    pub arguments: String,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    /// Remote directory the job runs in.
    pub working_dir: Option<String>,
    pub profiles: Vec<CatalogProfile>,
    pub kind: JobKind,
}

impl ExecutableJob {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        site: impl Into<String>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transformation: String::new(),
            site: site.into(),
            executable: executable.into(),
            arguments: String::new(),
            stdin: None,
            stdout: None,
            stderr: None,
            working_dir: None,
            profiles: Vec::new(),
            kind: JobKind::Compute,
        }
    }

    /// The single job of a workflow with nothing left to do.
    pub fn noop(label: &str, index: u32) -> Self {
        let name = format!("{NOOP_PREFIX}{label}_{index}");
        let mut job = Self::new(name.clone(), name, "local", "/bin/true");
        job.transformation = "pegasus::noop:1.0".to_string();
        job.kind = JobKind::Noop;
        job
    }

    /// Profiles of one namespace, in insertion order.
    pub fn profiles_in<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a CatalogProfile> {
        self.profiles.iter().filter(move |p| p.namespace == namespace)
    }
}

/// Jobs and their control-flow dependencies, keyed by abstract job id.
#[derive(Debug, Clone, Default)]
pub struct ExecutableWorkflow {
    pub label: String,
    pub index: u32,
    pub count: u32,
    /// Directory name used below each site's scratch space.
    pub remote_dir: Option<String>,
    jobs: BTreeMap<String, ExecutableJob>,
    parents: BTreeMap<String, BTreeSet<String>>,
}

impl ExecutableWorkflow {
    pub fn new(label: impl Into<String>, index: u32) -> Self {
        Self {
            label: label.into(),
            index,
            count: 1,
            ..Self::default()
        }
    }

    /// Adds a job; returns false if the id was already present.
    pub fn add_job(&mut self, job: ExecutableJob) -> bool {
        self.jobs.insert(job.id.clone(), job).is_none()
    }

    pub fn job(&self, id: &str) -> Option<&ExecutableJob> {
        self.jobs.get(id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &ExecutableJob> {
        self.jobs.values()
    }

    /// Records that `child` runs after `parent`. Both must be jobs.
    pub fn add_edge(&mut self, child: &str, parent: &str) -> bool {
        if !self.jobs.contains_key(child) || !self.jobs.contains_key(parent) {
            return false;
        }
        self.parents
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string())
    }

    pub fn parents(&self, id: &str) -> impl Iterator<Item = &str> {
        self.parents.get(id).into_iter().flatten().map(String::as_str)
    }

    /// `(parent, child)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parents
            .iter()
            .flat_map(|(child, parents)| parents.iter().map(move |p| (p.as_str(), child.as_str())))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Sites any job runs on.
    pub fn sites(&self) -> BTreeSet<&str> {
        self.jobs.values().map(|j| j.site.as_str()).collect()
    }

    /// Jobs ordered so that parents precede children. Ties are broken by id.
    pub fn topological_order(&self) -> Result<Vec<&ExecutableJob>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .jobs
            .keys()
            .map(|id| (id.as_str(), self.parents(id).count()))
            .collect();
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (parent, child) in self.edges() {
            children.entry(parent).or_default().push(child);
        }

        let mut ready: VecDeque<&str> = remaining
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.jobs.len());
        while let Some(id) = ready.pop_front() {
            remaining.remove(id);
            if let Some(job) = self.jobs.get(id) {
                order.push(job);
            }
            for child in children.get(id).into_iter().flatten() {
                if let Some(n) = remaining.get_mut(child) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }

        match remaining.keys().next() {
            Some(stuck) => Err(PlannerError::Cycle(stuck.to_string())),
            None => Ok(order),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> ExecutableJob {
        ExecutableJob::new(id, id, "local", "/bin/echo")
    }

    #[test]
    fn test_edges_need_both_jobs() {
        let mut wf = ExecutableWorkflow::new("w", 0);
        wf.add_job(job("a"));
        wf.add_job(job("b"));
        assert!(wf.add_edge("b", "a"));
        assert!(!wf.add_edge("b", "a"));
        assert!(!wf.add_edge("b", "ghost"));
        assert_eq!(wf.edges().collect::<Vec<_>>(), vec![("a", "b")]);
    }

    #[test]
    fn test_topological_order() {
        let mut wf = ExecutableWorkflow::new("w", 0);
        for id in ["d", "c", "b", "a"] {
            wf.add_job(job(id));
        }
        wf.add_edge("b", "a");
        wf.add_edge("c", "a");
        wf.add_edge("d", "b");
        wf.add_edge("d", "c");
        let order: Vec<&str> = wf.topological_order().unwrap().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut wf = ExecutableWorkflow::new("w", 0);
        wf.add_job(job("a"));
        wf.add_job(job("b"));
        wf.add_edge("a", "b");
        wf.add_edge("b", "a");
        assert!(matches!(wf.topological_order(), Err(PlannerError::Cycle(_))));
    }

    #[test]
    fn test_noop_job() {
        let noop = ExecutableJob::noop("black", 2);
        assert_eq!(noop.name, "noop_black_2");
        assert_eq!(noop.kind, JobKind::Noop);
    }
}
