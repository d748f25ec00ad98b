//! pegasus-tc-client: add, delete and query transformation catalog entries.
//!
//! The entity an operation works on is picked by the upper-case trigger
//! flags, combined as a bit mask: `-B` 1, `-L` 2, `-P` 4, `-R` 8, `-E` 16,
//! `-T` 32, `-S` 64.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};
use clap::{ArgAction, ArgGroup, Parser};
use tracing::{debug, info};

use pegasus_catalog::transformation::{self, file, split_logical_name, text};
use pegasus_catalog::{CatalogProfile, OpenMode, SysInfo, TcType, TransformationEntry, TransformationStore};
use pegasus_dax::escape::write_attr;

use super::Context;
use crate::cli::{GlobalArgs, Tool};
use crate::exit::usage;

const BULK: u32 = 1;
const LFN: u32 = 2;
const PFN: u32 = 4;
const RESOURCE: u32 = 8;
const PROFILE: u32 = 16;
const TYPE: u32 = 32;
const SYSINFO: u32 = 64;
const ALL: u32 = BULK | LFN | PFN | RESOURCE | PROFILE | TYPE | SYSINFO;

/// Add, delete or query transformation catalog entries
#[derive(Parser, Debug)]
#[command(name = "pegasus-tc-client", author, version, about, long_about = None)]
#[command(group(ArgGroup::new("operation").required(true).args(["add", "delete", "query"])))]
pub struct TcClientArgs {
    /// Add entries
    #[arg(short = 'a', long)]
    pub add: bool,

    /// Delete entries
    #[arg(short = 'd', long)]
    pub delete: bool,

    /// Query entries
    #[arg(short = 'q', long)]
    pub query: bool,

    /// Work on the whole catalog, or on the entries in --file
    #[arg(short = 'B')]
    pub bulk: bool,

    /// Work on logical transformations
    #[arg(short = 'L')]
    pub by_lfn: bool,

    /// Work on physical transformations
    #[arg(short = 'P')]
    pub by_pfn: bool,

    /// Work on resources
    #[arg(short = 'R')]
    pub by_resource: bool,

    /// Work on profiles
    #[arg(short = 'E')]
    pub by_profile: bool,

    /// Work on transformation types
    #[arg(short = 'T')]
    pub by_type: bool,

    /// Work on system information
    #[arg(short = 'S')]
    pub by_sysinfo: bool,

    /// Logical transformation, as NS::NAME:VER
    #[arg(short = 'l', long = "lfn", value_name = "LFN")]
    pub lfn: Option<String>,

    /// Physical transformation path or URL
    #[arg(short = 'p', long = "pfn", value_name = "PFN")]
    pub pfn: Option<String>,

    /// Resource (site) handle
    #[arg(short = 'r', long = "resource", value_name = "SITE")]
    pub resource: Option<String>,

    /// Transformation type: INSTALLED or STAGEABLE
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub tc_type: Option<String>,

    /// System information, as ARCH::OS[:VERSION[:GLIBC]]
    #[arg(short = 's', long = "system", value_name = "SYSINFO")]
    pub sysinfo: Option<String>,

    /// Profiles, as NS::KEY=VALUE[,KEY=VALUE] (repeatable)
    #[arg(short = 'e', long = "profile", value_name = "PROFILES")]
    pub profiles: Vec<String>,

    /// File of entries in the single-line format, for bulk adds
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Print bulk queries as XML
    #[arg(short = 'x', long, conflicts_with = "oldformat")]
    pub xml: bool,

    /// Print bulk queries in the single-line format
    #[arg(short = 'o', long)]
    pub oldformat: bool,

    /// Properties file used instead of ./pegasus.properties
    #[arg(short = 'c', long, value_name = "FILE")]
    pub conf: Option<PathBuf>,

    /// Increase logging verbosity (repeatable)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Decrease logging verbosity (repeatable)
    #[arg(long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Emit log records as JSON lines
    #[arg(long)]
    pub json_log: bool,
}

impl Tool for TcClientArgs {
    const NAME: &'static str = "pegasus-tc-client";

    fn globals(&self) -> GlobalArgs {
        GlobalArgs {
            verbose: self.verbose,
            quiet: self.quiet,
            json_log: self.json_log,
            conf: self.conf.clone(),
        }
    }
}

/// The `-l` value split into its parts.
struct Logical {
    namespace: Option<String>,
    name: String,
    version: Option<String>,
}

impl Logical {
    fn matches(&self, entry: &TransformationEntry) -> bool {
        entry.namespace == self.namespace && entry.name == self.name && entry.version == self.version
    }

    fn display(&self) -> String {
        transformation::logical_name(self.namespace.as_deref(), &self.name, self.version.as_deref())
    }
}

impl TcClientArgs {
    pub fn trigger(&self) -> u32 {
        [
            (self.bulk, BULK),
            (self.by_lfn, LFN),
            (self.by_pfn, PFN),
            (self.by_resource, RESOURCE),
            (self.by_profile, PROFILE),
            (self.by_type, TYPE),
            (self.by_sysinfo, SYSINFO),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, bit)| bit)
        .sum()
    }

    fn logical(&self) -> Option<Logical> {
        self.lfn.as_deref().map(|lfn| {
            let (namespace, name, version) = split_logical_name(lfn);
            Logical {
                namespace,
                name,
                version,
            }
        })
    }

    fn require_logical(&self) -> Result<Logical> {
        self.logical().ok_or_else(|| usage("the logical transformation (-l) is required"))
    }

    fn require_pfn(&self) -> Result<&str> {
        self.pfn.as_deref().ok_or_else(|| usage("the physical transformation (-p) is required"))
    }

    fn require_resource(&self) -> Result<&str> {
        self.resource.as_deref().ok_or_else(|| usage("the resource (-r) is required"))
    }

    fn tc_type(&self) -> Result<Option<TcType>> {
        self.tc_type
            .as_deref()
            .map(|t| t.parse::<TcType>())
            .transpose()
            .map_err(|e| usage(e.to_string()))
    }

    fn sysinfo(&self) -> Result<Option<SysInfo>> {
        self.sysinfo
            .as_deref()
            .map(SysInfo::parse_column)
            .transpose()
            .map_err(|e| usage(e.to_string()))
    }

    fn profiles(&self) -> Result<Vec<CatalogProfile>> {
        if self.profiles.is_empty() {
            return Ok(Vec::new());
        }
        file::parse_profiles(&self.profiles.join(";")).map_err(|e| usage(e.to_string()))
    }
}

/// Run pegasus-tc-client.
pub fn run(args: TcClientArgs, ctx: &Context) -> Result<()> {
    let props = ctx.properties()?;
    let trigger = args.trigger();
    debug!(trigger, "transformation catalog client");

    if args.query {
        let mut tc = transformation::connect(&props, OpenMode::Read).context("unable to open the transformation catalog")?;
        let output = query(&args, trigger, tc.store()?)?;
        print!("{output}");
        tc.close()?;
        return Ok(());
    }

    let mut tc = transformation::connect(&props, OpenMode::Write).context("unable to open the transformation catalog")?;
    let message = if args.add {
        add(&args, trigger, tc.store_mut()?)?
    } else {
        delete(&args, trigger, tc.store_mut()?)?
    };
    tc.close().context("unable to write the transformation catalog")?;
    println!("{message}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Add
// ─────────────────────────────────────────────────────────────────────────────

fn add(args: &TcClientArgs, trigger: u32, store: &mut TransformationStore) -> Result<String> {
    match trigger {
        0 => {
            let logical = args.require_logical()?;
            let mut entry = TransformationEntry::new(&logical.display(), args.require_resource()?, args.require_pfn()?)
                .with_type(args.tc_type()?.unwrap_or_default());
            if let Some(sysinfo) = args.sysinfo()? {
                entry = entry.with_sysinfo(sysinfo);
            }
            for profile in args.profiles()? {
                entry.add_profile(profile);
            }
            let summary = format!("{} on {}", entry.logical_name(), entry.site);
            Ok(if store.insert(entry) {
                format!("Added tc entry for {summary}")
            } else {
                format!("Replaced tc entry for {summary}")
            })
        }
        BULK => {
            let path = args.file.as_ref().ok_or_else(|| usage("bulk add needs an input file (-f)"))?;
            let text = std::fs::read_to_string(path).with_context(|| format!("unable to read '{}'", path.display()))?;
            let entries = file::parse(&text, &path.display().to_string())?;
            let count = entries.len();
            store.extend(entries);
            info!(count, file = %path.display(), "bulk add");
            Ok(format!("Added {count} tc entries from {}", path.display()))
        }
        t if t == LFN | PROFILE => {
            let logical = args.require_logical()?;
            let profiles = require_profiles(args)?;
            let touched = edit_profiles(store, |e| logical.matches(e), |e| {
                for profile in &profiles {
                    e.add_profile(profile.clone());
                }
            });
            no_match(touched, format!("Added lfn profiles to {touched} entries"), format!("lfn {}", logical.display()))
        }
        t if t == PFN | PROFILE => {
            let pfn = args.require_pfn()?;
            let resource = args.resource.as_deref();
            let profiles = require_profiles(args)?;
            let touched = edit_profiles(
                store,
                |e| e.pfn == pfn && resource.is_none_or(|r| r == e.site),
                |e| {
                    for profile in &profiles {
                        e.add_profile(profile.clone());
                    }
                },
            );
            no_match(touched, format!("Added pfn profiles to {touched} entries"), format!("pfn {pfn}"))
        }
        _ => Err(wrong_trigger("add")),
    }
}

fn require_profiles(args: &TcClientArgs) -> Result<Vec<CatalogProfile>> {
    let profiles = args.profiles()?;
    if profiles.is_empty() {
        return Err(usage("at least one profile (-e) is required"));
    }
    Ok(profiles)
}

fn edit_profiles<M, E>(store: &mut TransformationStore, mut matches: M, mut edit: E) -> usize
where
    M: FnMut(&TransformationEntry) -> bool,
    E: FnMut(&mut TransformationEntry),
{
    let mut touched = 0;
    for entry in store.entries_mut() {
        if matches(entry) {
            edit(entry);
            touched += 1;
        }
    }
    touched
}

// ─────────────────────────────────────────────────────────────────────────────
// Delete
// ─────────────────────────────────────────────────────────────────────────────

fn delete(args: &TcClientArgs, trigger: u32, store: &mut TransformationStore) -> Result<String> {
    let (removed, what) = match trigger {
        ALL => {
            let n = store.len();
            store.clear();
            (n, "the whole catalog".to_string())
        }
        LFN => {
            let logical = args.require_logical()?;
            let resource = args.resource.as_deref();
            let n = store.delete(
                logical.namespace.as_deref(),
                &logical.name,
                logical.version.as_deref(),
                resource,
                args.tc_type()?,
            );
            (n, format!("lfn {}", logical.display()))
        }
        PFN => {
            let logical = args.require_logical()?;
            let pfn = args.require_pfn()?;
            let resource = args.resource.as_deref();
            let tc_type = args.tc_type()?;
            let n = store.delete_matching(|e| {
                logical.matches(e)
                    && e.pfn == pfn
                    && resource.is_none_or(|r| r == e.site)
                    && tc_type.is_none_or(|t| t == e.tc_type)
            });
            (n, format!("pfn {pfn} of lfn {}", logical.display()))
        }
        RESOURCE => {
            let resource = args.require_resource()?;
            (store.delete_by_site(resource), format!("resource {resource}"))
        }
        TYPE => {
            let tc_type = args.tc_type()?.ok_or_else(|| usage("the type (-t) is required"))?;
            (store.delete_by_type(tc_type, args.resource.as_deref()), format!("type {tc_type}"))
        }
        SYSINFO => {
            let sysinfo = args.sysinfo()?.ok_or_else(|| usage("the system information (-s) is required"))?;
            let n = store.delete_matching(|e| e.sysinfo == sysinfo);
            (n, format!("sysinfo {}", sysinfo.to_column()))
        }
        t if t == LFN | PROFILE => {
            let logical = args.require_logical()?;
            let profiles = args.profiles()?;
            let n = edit_profiles(store, |e| logical.matches(e), |e| remove_profiles(&mut e.profiles, &profiles));
            (n, format!("profiles of lfn {}", logical.display()))
        }
        t if t == PFN | PROFILE => {
            let pfn = args.require_pfn()?;
            let resource = args.resource.as_deref();
            let profiles = args.profiles()?;
            let n = edit_profiles(
                store,
                |e| e.pfn == pfn && resource.is_none_or(|r| r == e.site),
                |e| remove_profiles(&mut e.profiles, &profiles),
            );
            (n, format!("profiles of pfn {pfn}"))
        }
        _ => return Err(wrong_trigger("delete")),
    };
    no_match(removed, format!("Deleted the TC entries by {what}"), what)
}

/// Drops the named profiles, or all of them when none are named.
fn remove_profiles(profiles: &mut Vec<CatalogProfile>, named: &[CatalogProfile]) {
    if named.is_empty() {
        profiles.clear();
    } else {
        profiles.retain(|p| !named.iter().any(|n| n.namespace == p.namespace && n.key == p.key));
    }
}

fn no_match(count: usize, message: String, what: String) -> Result<String> {
    if count == 0 {
        Ok(format!("No match found for {what}"))
    } else {
        Ok(message)
    }
}

fn wrong_trigger(operation: &str) -> anyhow::Error {
    usage(format!(
        "wrong combination of flags for {operation}; see --help for the supported combinations"
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Query
// ─────────────────────────────────────────────────────────────────────────────

fn query(args: &TcClientArgs, trigger: u32, store: &TransformationStore) -> Result<String> {
    let tc_type = args.tc_type()?;
    let resource = args.resource.as_deref();
    let selected = |e: &&TransformationEntry| {
        resource.is_none_or(|r| r == e.site) && tc_type.is_none_or(|t| t == e.tc_type)
    };

    let output = match trigger {
        BULK => {
            if store.is_empty() {
                return Err(anyhow!("no entries found in the transformation catalog"));
            }
            if args.xml {
                render_xml(store)
            } else if args.oldformat {
                file::render(store)
            } else {
                text::render(store)
            }
        }
        LFN => {
            let rows: BTreeSet<Vec<String>> = store
                .entries()
                .filter(selected)
                .map(|e| vec![e.site.clone(), e.logical_name(), e.tc_type.to_string()])
                .collect();
            columns(&["#RESID", "LTX", "TYPE"], rows.into_iter().collect())
        }
        PFN => {
            let logical = args.require_logical()?;
            let rows: Vec<Vec<String>> = store
                .entries()
                .filter(|e| logical.matches(e))
                .filter(selected)
                .map(|e| {
                    vec![
                        e.site.clone(),
                        e.logical_name(),
                        e.pfn.clone(),
                        e.tc_type.to_string(),
                        e.sysinfo.to_column(),
                    ]
                })
                .collect();
            columns(&["#RESID", "LTX", "PFN", "TYPE", "SYSINFO"], rows)
        }
        RESOURCE => {
            let logical = args.logical();
            let sites: BTreeSet<String> = store
                .entries()
                .filter(|e| logical.as_ref().is_none_or(|l| l.matches(e)))
                .filter(|e| tc_type.is_none_or(|t| t == e.tc_type))
                .map(|e| e.site.clone())
                .collect();
            list("Resources", sites.into_iter().collect())
        }
        t if t == LFN | PROFILE => {
            let logical = args.require_logical()?;
            let profiles = collect_profiles(store.entries().filter(|e| logical.matches(e)).filter(selected));
            list("LFN Profiles", profiles)
        }
        t if t == PFN | PROFILE => {
            let pfn = args.require_pfn()?;
            let profiles = collect_profiles(store.entries().filter(|e| e.pfn == pfn).filter(selected));
            list("PFN Profiles", profiles)
        }
        _ => return Err(wrong_trigger("query")),
    };

    if output.is_empty() {
        return Err(anyhow!("no matching entries found in the transformation catalog"));
    }
    Ok(output)
}

fn collect_profiles<'a, I>(entries: I) -> Vec<String>
where
    I: Iterator<Item = &'a TransformationEntry>,
{
    let profiles: BTreeSet<String> = entries
        .flat_map(|e| e.profiles.iter())
        .map(|p| file::render_profiles(std::slice::from_ref(p)))
        .collect();
    profiles.into_iter().collect()
}

/// Header plus aligned rows; empty when there are no rows.
fn columns(header: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let mut out = String::new();
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header).chain(&rows) {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    out
}

fn list(title: &str, items: Vec<String>) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("{title} :\n");
    for item in items {
        let _ = writeln!(out, "    {item}");
    }
    out
}

/// `transformationcatalog` document, one `lfn` element per logical name.
fn render_xml(store: &TransformationStore) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<!-- generated: {} -->", chrono::Local::now().to_rfc3339());
    out.push_str(
        "<transformationcatalog xmlns=\"http://pegasus.isi.edu/schema/transformationcatalog\" version=\"2.0\">\n",
    );
    for entries in store.by_logical_name().values() {
        let Some(first) = entries.first() else {
            continue;
        };
        out.push_str("\t<lfn");
        let _ = write_attr(&mut out, "namespace", first.namespace.as_deref().unwrap_or_default());
        let _ = write_attr(&mut out, "name", &first.name);
        let _ = write_attr(&mut out, "version", first.version.as_deref().unwrap_or_default());
        out.push_str(">\n");
        for e in entries {
            out.push_str("\t\t<pfn");
            let _ = write_attr(&mut out, "physicalName", &e.pfn);
            let _ = write_attr(&mut out, "siteid", &e.site);
            let _ = write_attr(&mut out, "type", e.tc_type.as_str());
            let _ = write_attr(&mut out, "sysinfo", &e.sysinfo.to_column());
            if e.profiles.is_empty() {
                out.push_str("/>\n");
                continue;
            }
            out.push_str(">\n");
            for p in &e.profiles {
                out.push_str("\t\t\t<profile");
                let _ = write_attr(&mut out, "namespace", &p.namespace);
                let _ = write_attr(&mut out, "key", &p.key);
                let _ = writeln!(out, ">{}</profile>", pegasus_dax::escape::quote(&p.value, false));
            }
            out.push_str("\t\t</pfn>\n");
        }
        out.push_str("\t</lfn>\n");
    }
    out.push_str("</transformationcatalog>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> TcClientArgs {
        let mut argv = vec!["pegasus-tc-client"];
        argv.extend_from_slice(args);
        TcClientArgs::try_parse_from(argv).unwrap()
    }

    fn store() -> TransformationStore {
        let mut store = TransformationStore::new();
        let mut keg = TransformationEntry::new("ex::keg:1.0", "isi", "/bin/keg");
        keg.add_profile(CatalogProfile::new("env", "A", "1"));
        store.insert(keg);
        store.insert(TransformationEntry::new("ex::keg:1.0", "uc", "/opt/keg").with_type(TcType::Stageable));
        store.insert(TransformationEntry::new("findrange", "isi", "/bin/findrange"));
        store
    }

    #[test]
    fn test_trigger_bits() {
        assert_eq!(parse(&["-q", "-B"]).trigger(), BULK);
        assert_eq!(parse(&["-q", "-L", "-E"]).trigger(), LFN | PROFILE);
        assert_eq!(parse(&["-d", "-BLPRETS"]).trigger(), ALL);
    }

    #[test]
    fn test_operation_required_and_exclusive() {
        assert!(TcClientArgs::try_parse_from(["pegasus-tc-client", "-L"]).is_err());
        assert!(TcClientArgs::try_parse_from(["pegasus-tc-client", "-a", "-d"]).is_err());
        assert!(TcClientArgs::try_parse_from(["pegasus-tc-client", "-q", "-B", "-x", "-o"]).is_err());
    }

    #[test]
    fn test_add_entry() {
        let mut store = TransformationStore::new();
        let args = parse(&["-a", "-l", "ex::keg:1.0", "-p", "/bin/keg", "-r", "isi", "-e", "env::A=\"1\"", "-s", "INTEL64::LINUX"]);
        let message = add(&args, args.trigger(), &mut store).unwrap();
        assert_eq!(message, "Added tc entry for ex::keg:1.0 on isi");
        let found = store.lookup(Some("ex"), "keg", Some("1.0"), Some("isi"), None);
        assert_eq!(found[0].profiles[0].key, "A");

        let again = add(&args, args.trigger(), &mut store).unwrap();
        assert!(again.starts_with("Replaced"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_requires_resource() {
        let args = parse(&["-a", "-l", "keg", "-p", "/bin/keg"]);
        assert!(add(&args, args.trigger(), &mut TransformationStore::new()).is_err());
    }

    #[test]
    fn test_deletes() {
        let mut s = store();
        let args = parse(&["-d", "-L", "-l", "ex::keg:1.0", "-r", "uc"]);
        assert_eq!(delete(&args, args.trigger(), &mut s).unwrap(), "Deleted the TC entries by lfn ex::keg:1.0");
        assert_eq!(s.len(), 2);

        let args = parse(&["-d", "-R", "-r", "nowhere"]);
        assert_eq!(delete(&args, args.trigger(), &mut s).unwrap(), "No match found for resource nowhere");

        let args = parse(&["-d", "-P", "-l", "findrange", "-p", "/bin/findrange"]);
        delete(&args, args.trigger(), &mut s).unwrap();
        assert_eq!(s.len(), 1);

        let args = parse(&["-d", "-L", "-E", "-l", "ex::keg:1.0"]);
        delete(&args, args.trigger(), &mut s).unwrap();
        assert!(s.entries().all(|e| e.profiles.is_empty()));
    }

    #[test]
    fn test_wrong_trigger() {
        let args = parse(&["-d", "-B"]);
        let err = delete(&args, args.trigger(), &mut store()).unwrap_err();
        assert!(err.downcast_ref::<crate::exit::UsageError>().is_some());
    }

    #[test]
    fn test_queries() {
        let s = store();
        let args = parse(&["-q", "-L", "-r", "isi"]);
        let out = query(&args, args.trigger(), &s).unwrap();
        assert!(out.starts_with("#RESID"));
        assert!(out.contains("findrange"));
        assert!(!out.contains("uc"));

        let args = parse(&["-q", "-R", "-l", "ex::keg:1.0"]);
        assert_eq!(query(&args, args.trigger(), &s).unwrap(), "Resources :\n    isi\n    uc\n");

        let args = parse(&["-q", "-L", "-E", "-l", "ex::keg:1.0"]);
        assert!(query(&args, args.trigger(), &s).unwrap().contains("env::A=\"1\""));

        let args = parse(&["-q", "-P", "-l", "nothing"]);
        assert!(query(&args, args.trigger(), &s).is_err());
    }

    #[test]
    fn test_bulk_xml() {
        let s = store();
        let args = parse(&["-q", "-B", "-x"]);
        let xml = query(&args, args.trigger(), &s).unwrap();
        assert!(xml.contains("<lfn namespace=\"ex\" name=\"keg\" version=\"1.0\">"));
        assert!(xml.contains("physicalName=\"/opt/keg\""));
        assert!(xml.contains("<profile namespace=\"env\" key=\"A\">1</profile>"));
    }
}
