//! Splitting a DAX into partitions that can be planned separately.
//!
//! Each partition becomes its own DAX, and a PDAX file records which
//! partitions depend on which.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use pegasus_config::{FactoryError, Registration, select};
use pegasus_dax::Adag;
use pegasus_dax::escape::write_attr;

use crate::codegen::write_file;
use crate::error::{PlannerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioner {
    /// One partition per breadth-first level.
    Bfs,
    /// One partition per job.
    One2One,
    /// The whole workflow as a single partition.
    Whole,
}

const MODULE: &str = "partitioner";

const REGISTRY: &[Registration<Partitioner>] = &[
    ("BFS", Partitioner::Bfs),
    ("One2One", Partitioner::One2One),
    ("Whole", Partitioner::Whole),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// `ID<n>`, unique within the graph.
    pub id: String,
    pub index: usize,
    /// Job ids in the partition.
    pub jobs: Vec<String>,
}

/// Partitions and the dependencies between them.
#[derive(Debug, Clone, Default)]
pub struct PartitionGraph {
    pub partitions: Vec<Partition>,
    /// Child partition id to parent partition ids.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl PartitionGraph {
    fn push(&mut self, jobs: Vec<String>) {
        let index = self.partitions.len() + 1;
        self.partitions.push(Partition {
            id: format!("ID{index}"),
            index,
            jobs,
        });
    }

    pub fn partition(&self, id: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.id == id)
    }

    /// Derives partition dependencies from the job dependencies of `dax`.
    fn link(&mut self, dax: &Adag) {
        let owner: BTreeMap<&str, &str> = self
            .partitions
            .iter()
            .flat_map(|p| p.jobs.iter().map(move |j| (j.as_str(), p.id.as_str())))
            .collect();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for child in dax.children() {
            let Some(&child_part) = owner.get(child.child()) else {
                continue;
            };
            for parent in child.parents() {
                if let Some(&parent_part) = owner.get(parent)
                    && parent_part != child_part
                {
                    dependencies
                        .entry(child_part.to_string())
                        .or_default()
                        .insert(parent_part.to_string());
                }
            }
        }
        self.dependencies = dependencies;
    }
}

impl Partitioner {
    pub fn select(name: &str) -> std::result::Result<Self, FactoryError> {
        select(MODULE, name, REGISTRY)
    }

    pub fn partition(self, dax: &Adag) -> Result<PartitionGraph> {
        let mut graph = PartitionGraph::default();
        match self {
            Partitioner::Whole => {
                graph.push(dax.jobs().map(|j| j.id().to_string()).collect());
            }
            Partitioner::One2One => {
                for job in dax.jobs() {
                    graph.push(vec![job.id().to_string()]);
                }
            }
            Partitioner::Bfs => {
                let levels = bfs_levels(dax)?;
                let mut by_level: BTreeMap<i32, Vec<String>> = BTreeMap::new();
                for (id, level) in levels {
                    by_level.entry(level).or_default().push(id);
                }
                for jobs in by_level.into_values() {
                    graph.push(jobs);
                }
            }
        }
        graph.link(dax);
        debug!(partitioner = ?self, partitions = graph.partitions.len(), "partitioned workflow");
        Ok(graph)
    }
}

/// Level of every job: roots are level 1, every other job one below its
/// deepest parent.
pub fn bfs_levels(dax: &Adag) -> Result<BTreeMap<String, i32>> {
    let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for child in dax.children() {
        let list = parents.entry(child.child().to_string()).or_default();
        list.extend(child.parents().filter(|p| dax.job(p).is_some()).map(String::from));
    }

    let mut levels: BTreeMap<String, i32> = BTreeMap::new();
    let mut pending: Vec<&str> = dax.jobs().map(|j| j.id()).collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|id| {
            let deps = parents.get(*id).map(Vec::as_slice).unwrap_or_default();
            let deepest = deps.iter().map(|p| levels.get(p).copied()).try_fold(0, |max, l| {
                l.map(|l| max.max(l))
            });
            match deepest {
                Some(deepest) => {
                    levels.insert(id.to_string(), deepest + 1);
                    false
                }
                None => true,
            }
        });
        if pending.len() == before {
            return Err(PlannerError::Cycle(pending[0].to_string()));
        }
    }
    Ok(levels)
}

/// The sub-workflow holding the jobs of `partition`, with the files they
/// use and the dependencies among them.
pub fn extract(dax: &Adag, partition: &Partition, levels: Option<&BTreeMap<String, i32>>) -> Adag {
    let mut sub = Adag::with_name(format!("{}_{}", dax.label(), partition.id));
    sub.set_index(dax.index());
    sub.set_count(dax.count());
    sub.set_version(dax.version());

    let members: BTreeSet<&str> = partition.jobs.iter().map(String::as_str).collect();
    for id in &partition.jobs {
        let Some(job) = dax.job(id) else {
            continue;
        };
        let mut job = job.clone();
        if let Some(level) = levels.and_then(|l| l.get(id)) {
            job.set_level(*level);
        }
        for file in job.uses() {
            if sub.filename(file.name()).is_none()
                && let Some(declared) = dax.filename(file.name())
            {
                sub.insert_filename(declared.clone());
            }
        }
        sub.add_job(job);
    }
    for child in dax.children() {
        if !members.contains(child.child()) {
            continue;
        }
        for parent in child.parents().filter(|p| members.contains(p)) {
            sub.add_child_edge(child.child(), parent);
        }
    }
    sub
}

/// The PDAX document describing `graph`.
pub fn render_pdax(dax: &Adag, graph: &PartitionGraph) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = write!(out, "<pdag");
    let _ = write_attr(&mut out, "name", dax.label());
    let _ = write_attr(&mut out, "index", &dax.index().to_string());
    let _ = write_attr(&mut out, "count", &dax.count().to_string());
    out.push_str(">\n");

    for partition in &graph.partitions {
        out.push_str("  <partition");
        let _ = write_attr(&mut out, "name", &format!("{}_{}", dax.label(), partition.id));
        let _ = write_attr(&mut out, "id", &partition.id);
        let _ = write_attr(&mut out, "index", &partition.index.to_string());
        out.push_str(">\n");
        for id in &partition.jobs {
            out.push_str("    <job");
            let name = dax.job(id).map(|j| j.name()).unwrap_or_default();
            let _ = write_attr(&mut out, "name", name);
            let _ = write_attr(&mut out, "id", id);
            out.push_str("/>\n");
        }
        out.push_str("  </partition>\n");
    }
    for (child, parents) in &graph.dependencies {
        out.push_str("  <child");
        let _ = write_attr(&mut out, "ref", child);
        out.push_str(">\n");
        for parent in parents {
            out.push_str("    <parent");
            let _ = write_attr(&mut out, "ref", parent);
            out.push_str("/>\n");
        }
        out.push_str("  </child>\n");
    }
    out.push_str("</pdag>\n");
    out
}

/// Writes `<label>_<id>.dax` per partition and `<label>.pdax` into `dir`.
/// Returns the PDAX path followed by the partition files.
pub fn write_partitions(dax: &Adag, partitioner: Partitioner, dir: &Path) -> Result<Vec<PathBuf>> {
    crate::submit_dir::sanity_check(dir)?;
    let graph = partitioner.partition(dax)?;
    let levels = match partitioner {
        Partitioner::Bfs => Some(bfs_levels(dax)?),
        _ => None,
    };

    let pdax = dir.join(format!("{}.pdax", dax.label()));
    write_file(&pdax, &render_pdax(dax, &graph))?;
    let mut written = vec![pdax];
    for partition in &graph.partitions {
        let path = dir.join(format!("{}_{}.dax", dax.label(), partition.id));
        extract(dax, partition, levels.as_ref()).write_xml_file(&path)?;
        written.push(path);
    }
    info!(partitions = graph.partitions.len(), dir = %dir.display(), "wrote partitions");
    Ok(written)
}
