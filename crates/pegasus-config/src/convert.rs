//! Conversion of legacy `vds.*` properties to their `pegasus.*` names.
//!
//! A key is first looked up in a table of direct associations; an empty
//! target there means the property is obsolete and dropped. Keys missing from
//! the table are matched against a list of wildcard patterns for the
//! properties whose names embed a site or implementation name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use regex::{NoExpand, Regex};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::properties::Properties;
use crate::settings::unique_path;

/// Wildcard properties: (full-key pattern, prefix pattern, replacement).
const STAR_PATTERNS: &[(&str, &str, &str)] = &[
    (
        r"(vds.replica.)([a-zA-Z_0-9]*[-]*)+(.prefer.stagein.sites)",
        r"vds.replica.",
        "pegasus.selector.replica.",
    ),
    (
        r"(vds.replica.)([a-zA-Z_0-9]*[-]*)+(.ignore.stagein.sites)",
        r"vds.replica.",
        "pegasus.selector.replica.",
    ),
    (
        r"(vds.site.selector.env.)([a-zA-Z_0-9]*[-]*)+",
        r"vds.site.selector.env.",
        "pegasus.selector.site.env.",
    ),
    (
        r"(vds.exitcode.path.)([a-zA-Z_0-9]*[-]*)+",
        r"vds.exitcode.path.",
        "pegasus.exitcode.path.",
    ),
    (
        r"(vds.partitioner.horizontal.bundle.)([a-zA-Z_0-9]*[-]*)+",
        r"vds.partitioner.horizontal.bundle",
        "pegasus.partitioner.horizontal.bundle.",
    ),
    (
        r"(vds.partitioner.horizontal.collapse.)([a-zA-Z_0-9]*[-]*)+",
        r"vds.partitioner.horizontal.collapse",
        "pegasus.partitioner.horizontal.collapse.",
    ),
    (
        r"(vds.transfer.rft.)([a-zA-Z_0-9]*[-]*)+",
        r"vds.transfer.rft.",
        "pegasus.transfer.rft.",
    ),
    (
        r"(vds.transfer.crft.)([a-zA-Z_0-9]*[-]*)+",
        r"vds.transfer.crft.",
        "pegasus.transfer.crft.",
    ),
    (
        r"(vds.db.tc.driver)[.]+([a-zA-Z_0-9]*[-]*)+",
        r"vds.db.tc.driver.",
        "pegasus.catalog.transformation.db.",
    ),
    (
        r"(vds.db.ptc.driver)[.]+([a-zA-Z_0-9]*[-]*)+",
        r"vds.db.ptc.driver.",
        "pegasus.catalog.provenance.db.",
    ),
    (
        r"(vds.db.\*.driver)[.]+([a-zA-Z_0-9]*[-]*)+",
        r"vds.db.\*.driver.",
        "pegasus.catalog.*.db.",
    ),
];

/// Direct associations. Later entries for the same key win.
const ASSOCIATIONS: &[(&str, &str)] = &[
    // schemas
    ("vds.schema.dax", "pegasus.schema.dax"),
    ("vds.schema.pdax", "pegasus.schema.pdax"),
    ("vds.schema.poolconfig", "pegasus.schema.sc"),
    ("vds.schema.sc", "pegasus.schema.sc"),
    ("vds.db.ptc.schema", "pegasus.catalog.provenance"),
    // directories
    ("vds.dir.exec", "pegasus.dir.exec"),
    ("vds.dir.storage", "pegasus.dir.storage"),
    ("vds.dir.create.mode", "pegasus.dir.create"),
    ("vds.dir.create", "pegasus.dir.create"),
    ("vds.dir.timestamp.extended", "pegasus.dir.timestamp.extended"),
    // transformation catalog
    ("vds.tc.mode", "pegasus.catalog.transformation"),
    ("vds.tc", "pegasus.catalog.transformation"),
    ("vds.tc.file", "pegasus.catalog.transformation.file"),
    ("vds.tc.mapper", "pegasus.catalog.transformation.mapper"),
    // replica catalog
    ("vds.replica.mode", "pegasus.catalog.replica"),
    ("vds.rc", "pegasus.catalog.replica"),
    ("vds.rls.url", "pegasus.catalog.replica.url"),
    ("vds.rc.url", "pegasus.catalog.replica.url"),
    ("vds.rc.lrc.ignore", "pegasus.catalog.replica.lrc.ignore"),
    ("vds.rc.lrc.restrict", "pegasus.catalog.replica.lrc.restrict"),
    ("vds.cache.asrc", "pegasus.catalog.replica.cache.asrc"),
    ("vds.rls.query", ""),
    ("vds.rls.query.attrib", ""),
    ("vds.rls.exit", ""),
    ("vds.rc.rls.timeout", ""),
    // site catalog
    ("vds.pool.mode", "pegasus.catalog.site"),
    ("vds.sc", "pegasus.catalog.site"),
    ("vds.pool.file", "pegasus.catalog.site.file"),
    ("vds.sc.file", "pegasus.catalog.site.file"),
    // selectors
    ("vds.transformation.selector", "pegasus.selector.transformation"),
    ("vds.rc.selector", "pegasus.selector.replica"),
    ("vds.replica.selector", "pegasus.selector.replica"),
    ("vds.rc.restricted.sites", "pegasus.selector.replica.*.ignore.stagein.sites"),
    ("vds.site.selector", "pegasus.selector.site"),
    ("vds.site.selector.path", "pegasus.selector.site.path"),
    ("vds.site.selector.timeout", "pegasus.selector.site.timeout"),
    ("vds.site.selector.keep.tmp", "pegasus.selector.site.keep.tmp"),
    // transfer
    ("vds.transfer.*.impl", "pegasus.transfer.*.impl"),
    ("vds.transfer.stagein.impl", "pegasus.transfer.stagein.impl"),
    ("vds.transfer.stageout.impl", "pegasus.transfer.stageout.impl"),
    ("vds.transfer.stagein.impl", "pegasus.transfer.inter.impl"),
    ("vds.transfer.refiner", "pegasus.transfer.refiner"),
    ("vds.transfer.single.quote", "pegasus.transfer.single.quote"),
    ("vds.transfer.throttle.processes", "pegasus.transfer.throttle.processes"),
    ("vds.transfer.throttle.streams", "pegasus.transfer.throttle.streams"),
    ("vds.transfer.force", "pegasus.transfer.force"),
    ("vds.transfer.mode.links", "pegasus.transfer.links"),
    ("vds.transfer.links", "pegasus.transfer.links"),
    ("vds.transfer.thirdparty.sites", "pegasus.transfer.*.thirdparty.sites"),
    ("vds.transfer.thirdparty.pools", "pegasus.transfer.*.thirdparty.sites"),
    ("vds.transfer.*.thirdparty.sites", "pegasus.transfer.*.thirdparty.sites"),
    ("vds.transfer.stagein.thirdparty.sites", "pegasus.transfer.stagein.thirdparty.sites"),
    ("vds.transfer.stageout.thirdparty.sites", "pegasus.transfer.stageout.thirdparty.sites"),
    ("vds.transfer.inter.thirdparty.sites", "pegasus.transfer.inter.thirdparty.sites"),
    ("vds.transfer.staging.delimiter", "pegasus.transfer.staging.delimiter"),
    ("vds.transfer.disable.chmod.sites", "pegasus.transfer.disable.chmod.sites"),
    ("vds.transfer.proxy", "pegasus.transfer.proxy"),
    ("vds.transfer.arguments", "pegasus.transfer.arguments"),
    ("vds.transfer.*.priority", "pegasus.transfer.*.priority"),
    ("vds.transfer.stagein.priority", "pegasus.transfer.stagein.priority"),
    ("vds.transfer.stageout.priority", "pegasus.transfer.stageout.priority"),
    ("vds.transfer.inter.priority", "pegasus.transfer.inter.priority"),
    ("vds.scheduler.stork.cred", "pegasus.transfer.stork.cred"),
    // gridstart
    ("vds.gridstart", "pegasus.gridstart"),
    ("vds.gridstart.invoke.always", "pegasus.gristart.invoke.always"),
    ("vds.gridstart.invoke.length", "pegasus.gridstart.invoke.length"),
    ("vds.gridstart.kickstart.stat", "pegasus.gridstart.kickstart.stat"),
    ("vds.gridstart.label", "pegasus.gristart.label"),
    // exitcode
    ("vds.exitcode.impl", "pegasus.exitcode.impl"),
    ("vds.exitcode.mode", "pegasus.exitcode.scope"),
    ("vds.exitcode", "pegasus.exitcode.scope"),
    ("vds.exitcode.arguments", "pegasus.exitcode.arguments"),
    ("vds.exitcode.debug", "pegasus.exitcode.debug"),
    ("vds.prescript.arguments", "pegasus.prescript.arguments"),
    // remote scheduler
    ("vds.scheduler.remote.projects", "pegasus.remote.scheduler.projects"),
    ("vds.scheduler.remote.queues", "pegasus.remote.scheduler.queues"),
    ("vds.scheduler.remote.min.maxtime", "pegasus.remote.scheduler.min.maxtime"),
    ("vds.scheduler.remote.min.maxwalltime", "pegasus.remote.scheduler.min.maxwalltime"),
    ("vds.scheduler.remote.min.maxcputime", "pegasus.remote.scheduler.min.maxcputime"),
    // condor and dagman
    ("vds.scheduler.condor.release", "pegasus.condor.release"),
    ("vds.scheduler.condor.remove", "pegasus.condor.remove"),
    ("vds.scheduler.condor.arguments.quote", "pegasus.condor.arguments.quote"),
    ("vds.scheduler.condor.output.stream", "pegasus.condor.output.stream"),
    ("vds.scheduler.condor.error.stream", "pegasus.condor.error.stream"),
    ("vds.scheduler.condor.retry", "pegasus.dagman.retry"),
    // clustering
    ("vds.exec.node.collapse", "pegasus.clusterer.nodes"),
    ("vds.job.aggregator", "pegasus.clusterer.job.aggregator"),
    (
        "vds.job.aggregator.seqexec.isgloballog",
        "pegasus.clusterer.job.aggregator.hasgloballog",
    ),
    ("vds.clusterer.label.key", "pegasus.clusterer.label.key"),
    // miscellaneous
    ("vds.auth.gridftp.timeout", "pegasus.auth.gridftp.timeout"),
    ("vds.submit.mode", "pegasus.submit"),
    ("vds.job.priority", "pegasus.job.priority"),
    ("vds.dax.callback", "pegasus.parser.dax.callback"),
    ("vds.label.key", "pegasus.partitioner.label.key"),
    ("vds.partitioner.label.key", "pegasus.partitioner.label.key"),
    ("vds.partition.parser.mode", "pegasus.partitioner.parser.load"),
    // database drivers
    ("vds.db.*.driver", "pegasus.catalog.*.db.driver"),
    ("vds.db.tc.driver", "pegasus.catalog.transformation.db.driver"),
    ("vds.db.ptc.driver", "pegasus.catalog.provenance.db.driver"),
    // work database
    ("work.db", "pegasus.catalog.work.db"),
    ("work.db.hostname", "pegasus.catalog.work.db.hostname"),
    ("work.db.database", "pegasus.catalog.work.db.database"),
    ("work.db.user", "pegasus.catalog.work.db.user"),
    ("work.db.password", "pegasus.catalog.work.db.password"),
];

struct StarRule {
    matcher: Regex,
    prefix: Regex,
    replacement: &'static str,
}

/// Outcome of converting one property set.
#[derive(Debug, Default)]
pub struct Conversion {
    pub properties: Properties,
    /// Keys with no known counterpart.
    pub unmatched: Vec<String>,
    /// Keys that are obsolete and were dropped.
    pub dropped: Vec<String>,
}

/// Maps legacy property names onto current ones.
pub struct PropertyConverter {
    table: HashMap<&'static str, &'static str>,
    stars: Vec<StarRule>,
}

impl PropertyConverter {
    pub fn new() -> Result<Self> {
        let table = ASSOCIATIONS.iter().copied().collect();
        let stars = STAR_PATTERNS
            .iter()
            .map(|(pattern, prefix, replacement)| {
                Ok(StarRule {
                    matcher: Regex::new(&format!("^(?:{pattern})$"))?,
                    prefix: Regex::new(prefix)?,
                    replacement: *replacement,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { table, stars })
    }

    /// The current name for `key`. `Some("")` means the key is obsolete.
    pub fn rename(&self, key: &str) -> Option<String> {
        if let Some(target) = self.table.get(key) {
            return Some((*target).to_string());
        }
        self.stars
            .iter()
            .find(|rule| rule.matcher.is_match(key))
            .map(|rule| {
                let renamed = rule.prefix.replacen(key, 1, NoExpand(rule.replacement));
                debug!(from = key, to = %renamed, "matched wildcard property");
                renamed.into_owned()
            })
    }

    /// Converts the `vds` subset of `input`.
    pub fn convert(&self, input: &Properties) -> Conversion {
        let mut out = Conversion::default();
        for (key, value) in input.matching_subset("vds", true).iter() {
            match self.rename(key) {
                Some(target) if target.is_empty() => out.dropped.push(key.to_string()),
                Some(target) => {
                    out.properties.set(target, value);
                }
                None => out.unmatched.push(key.to_string()),
            }
        }
        out
    }

    /// Reads `input`, converts it and writes `pegasus.<timestamp>.properties`
    /// into `dir`, creating the directory when needed. Unmatched keys are
    /// reported on stderr.
    pub fn convert_file(&self, input: &Path, dir: &Path) -> Result<PathBuf> {
        sanity_check(dir)?;
        let source = Properties::load(input)?;
        let conversion = self.convert(&source);
        for key in &conversion.unmatched {
            eprintln!("Unable to associate VDS property {key}");
        }

        let now = Local::now();
        let text = render(&conversion.properties, &input.display().to_string(), &now.to_rfc3339());
        let stamp = now.format("%Y%m%dT%H%M%S").to_string();
        let path = unique_path(dir, &format!("pegasus.{stamp}"), "properties");
        std::fs::write(&path, text).map_err(|e| ConfigError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })?;
        info!(output = %path.display(), converted = conversion.properties.len(), "wrote properties");
        Ok(path)
    }
}

/// Sorted `key = value` lines after the generated-file banner.
pub fn render(props: &Properties, input: &str, generated_at: &str) -> String {
    let rule = "#".repeat(76);
    let mut out = format!(
        "{rule}\n# PEGASUS USER PROPERTIES GENERATED FROM VDS PROPERTY FILE \n# ( {input} ) \n# GENERATED AT {generated_at}\n{rule}\n"
    );
    for (key, value) in props.iter() {
        out.push_str(&format!("{key} = {value}\n"));
    }
    out
}

/// Creates `dir` if missing; rejects files and read-only directories.
pub fn sanity_check(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ConfigError::Directory {
                path: dir.display().to_string(),
                message: "is not a directory".into(),
            });
        }
        let readonly = std::fs::metadata(dir)
            .map(|m| m.permissions().readonly())
            .unwrap_or(true);
        if readonly {
            return Err(ConfigError::Directory {
                path: dir.display().to_string(),
                message: "cannot write to directory".into(),
            });
        }
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| ConfigError::Directory {
        path: dir.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn converter() -> PropertyConverter {
        PropertyConverter::new().unwrap()
    }

    #[test]
    fn test_direct_associations() {
        let c = converter();
        assert_eq!(c.rename("vds.tc.file").as_deref(), Some("pegasus.catalog.transformation.file"));
        assert_eq!(c.rename("vds.pool.file").as_deref(), Some("pegasus.catalog.site.file"));
        assert_eq!(c.rename("vds.rls.exit").as_deref(), Some(""));
    }

    #[test]
    fn test_later_association_wins() {
        assert_eq!(
            converter().rename("vds.transfer.stagein.impl").as_deref(),
            Some("pegasus.transfer.inter.impl")
        );
    }

    #[test]
    fn test_star_properties() {
        let c = converter();
        assert_eq!(
            c.rename("vds.replica.isi.prefer.stagein.sites").as_deref(),
            Some("pegasus.selector.replica.isi.prefer.stagein.sites")
        );
        assert_eq!(
            c.rename("vds.site.selector.env.PATH").as_deref(),
            Some("pegasus.selector.site.env.PATH")
        );
        assert_eq!(
            c.rename("vds.db.tc.driver.url").as_deref(),
            Some("pegasus.catalog.transformation.db.url")
        );
        assert_eq!(
            c.rename("vds.db.*.driver.user").as_deref(),
            Some("pegasus.catalog.*.db.user")
        );
        assert_eq!(
            c.rename("vds.partitioner.horizontal.bundle.fft").as_deref(),
            Some("pegasus.partitioner.horizontal.bundle..fft")
        );
        assert_eq!(c.rename("vds.no.such.thing"), None);
    }

    #[test]
    fn test_convert_subset() {
        let input = Properties::parse(
            "vds.tc=File\nvds.rls.query=x\nvds.bogus=1\nwork.db=ignored\npegasus.kept=no\n",
        )
        .unwrap();
        let out = converter().convert(&input);
        assert_eq!(out.properties.get("pegasus.catalog.transformation"), Some("File"));
        assert_eq!(out.properties.len(), 1);
        assert_eq!(out.unmatched, vec!["vds.bogus".to_string()]);
        assert_eq!(out.dropped, vec!["vds.rls.query".to_string()]);
    }

    #[test]
    fn test_render() {
        let mut props = Properties::new();
        props.set("pegasus.b", "2");
        props.set("pegasus.a", "1");
        let text = render(&props, "in.properties", "2024-01-01T00:00:00");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "# PEGASUS USER PROPERTIES GENERATED FROM VDS PROPERTY FILE ");
        assert_eq!(lines[2], "# ( in.properties ) ");
        assert_eq!(lines[5], "pegasus.a = 1");
        assert_eq!(lines[6], "pegasus.b = 2");
    }

    #[test]
    fn test_convert_file_creates_directory() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("vds.properties");
        std::fs::write(&input, "vds.sc.file=/etc/sites.xml\n").unwrap();
        let out_dir = dir.path().join("nested/out");

        let path = converter().convert_file(&input, &out_dir).unwrap();
        assert!(path.starts_with(&out_dir));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("pegasus.catalog.site.file = /etc/sites.xml"));
    }

    #[test]
    fn test_sanity_check_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(sanity_check(&file), Err(ConfigError::Directory { .. })));
    }
}
