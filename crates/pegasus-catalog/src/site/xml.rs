//! XML site catalogs.
//!
//! Reads `sitecatalog` documents of schema 4.0 and the older 3.0 layout
//! (`head-fs`/`scratch`/`shared` nesting), and writes either.

use std::collections::HashMap;
use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use pegasus_dax::escape::{quote, write_attr, write_opt_attr};

use super::entry::{Directory, DirectoryType, FileServer, GridGateway, Operation, SiteEntry, SiteStore};
use crate::common::CatalogProfile;
use crate::error::{CatalogError, Result};

const NAMESPACE: &str = "http://pegasus.isi.edu/schema/sitecatalog";
const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Schema revision of a written document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V3,
    V4,
}

impl SchemaVersion {
    fn version(self) -> &'static str {
        match self {
            SchemaVersion::V3 => "3.0",
            SchemaVersion::V4 => "4.0",
        }
    }

    fn location(self) -> &'static str {
        match self {
            SchemaVersion::V3 => "http://pegasus.isi.edu/schema/sc-3.0.xsd",
            SchemaVersion::V4 => "http://pegasus.isi.edu/schema/sc-4.0.xsd",
        }
    }
}

enum Frame {
    Root,
    Site(SiteEntry),
    Directory(Directory),
    /// `head-fs` or `worker-fs` in 3.0 documents.
    FileSystem { worker: bool },
    /// `scratch` or `storage` under a 3.0 file system.
    Area { worker: bool, scratch: bool },
    /// `shared` or `local` under a 3.0 area.
    LegacyDirectory {
        directory: Directory,
        mount_point: Option<String>,
    },
    Profile(CatalogProfile),
    Other,
}

/// Parses a site catalog. `path` is only used in error messages.
pub fn parse(xml: &str, path: &str) -> Result<Vec<SiteEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut stack: Vec<Frame> = Vec::new();
    let mut sites = Vec::new();
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|source| CatalogError::Xml { position, source })?;

        match event {
            Event::Start(e) => {
                let frame = open(&e, &mut stack, xml, path, position, &mut seen_root)?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                let frame = open(&e, &mut stack, xml, path, position, &mut seen_root)?;
                close(frame, &mut stack, &mut sites);
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    close(frame, &mut stack, &mut sites);
                }
            }
            Event::Text(t) => {
                if let Some(Frame::Profile(profile)) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|source| CatalogError::Xml { position, source })?;
                    profile.value.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(Frame::Profile(profile)) = stack.last_mut() {
                    profile.value.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(CatalogError::parse(path, 1, "missing <sitecatalog> root element"));
    }
    Ok(sites)
}

fn line_of(xml: &str, position: usize) -> usize {
    xml.get(..position).unwrap_or(xml).matches('\n').count() + 1
}

fn open(
    e: &BytesStart<'_>,
    stack: &mut [Frame],
    xml: &str,
    path: &str,
    position: usize,
    seen_root: &mut bool,
) -> Result<Frame> {
    let local = e.local_name();
    let tag = String::from_utf8_lossy(local.as_ref()).into_owned();
    let attrs = attributes(e, position)?;
    let fail = |message: String| CatalogError::parse(path, line_of(xml, position), message);
    let required = |key: &str| -> Result<String> {
        attrs
            .get(key)
            .cloned()
            .ok_or_else(|| fail(format!("<{tag}> is missing required attribute '{key}'")))
    };

    let Some(parent) = stack.last_mut() else {
        if tag != "sitecatalog" {
            return Err(fail(format!("unexpected root element <{tag}>")));
        }
        *seen_root = true;
        return Ok(Frame::Root);
    };

    match (tag.as_str(), parent) {
        ("site", Frame::Root) => {
            let mut site = SiteEntry::new(required("handle")?);
            if let Some(arch) = attrs.get("arch") {
                site.arch = arch.parse().map_err(|e: CatalogError| fail(e.to_string()))?;
            }
            if let Some(os) = attrs.get("os") {
                site.os = os.parse().map_err(|e: CatalogError| fail(e.to_string()))?;
            }
            site.os_release = non_empty(attrs.get("osrelease"));
            site.os_version = non_empty(attrs.get("osversion"));
            site.glibc = non_empty(attrs.get("glibc"));
            Ok(Frame::Site(site))
        }
        ("grid", Frame::Site(site)) => {
            site.grids.push(GridGateway {
                grid_type: required("type")?,
                contact: required("contact")?,
                scheduler: required("scheduler")?,
                job_type: non_empty(attrs.get("jobtype")),
            });
            Ok(Frame::Other)
        }
        ("directory", Frame::Site(_)) => {
            let dir_type: DirectoryType = required("type")?
                .parse()
                .map_err(|e: CatalogError| fail(e.to_string()))?;
            Ok(Frame::Directory(Directory::new(dir_type, required("path")?)))
        }
        ("file-server", Frame::Directory(directory)) => {
            let operation = match attrs.get("operation") {
                Some(op) => op.parse().map_err(|e: CatalogError| fail(e.to_string()))?,
                None => Operation::All,
            };
            directory.file_servers.push(FileServer {
                operation,
                url: required("url")?,
            });
            Ok(Frame::Other)
        }
        (
            "file-server",
            Frame::LegacyDirectory {
                directory,
                mount_point,
            },
        ) => {
            let mount = attrs.get("mount-point").cloned().unwrap_or_default();
            directory.file_servers.push(FileServer {
                operation: Operation::All,
                url: format!("{}{}", required("url")?, mount),
            });
            if mount_point.is_none() && !mount.is_empty() {
                *mount_point = Some(mount);
            }
            Ok(Frame::Other)
        }
        ("internal-mount-point", Frame::LegacyDirectory { directory, .. }) => {
            directory.path = required("mount-point")?;
            Ok(Frame::Other)
        }
        ("profile", Frame::Site(_)) => Ok(Frame::Profile(CatalogProfile::new(
            required("namespace")?,
            required("key")?,
            String::new(),
        ))),
        ("head-fs" | "worker-fs", Frame::Site(_)) => Ok(Frame::FileSystem {
            worker: tag == "worker-fs",
        }),
        ("scratch" | "storage", Frame::FileSystem { worker }) => Ok(Frame::Area {
            worker: *worker,
            scratch: tag == "scratch",
        }),
        ("shared" | "local", Frame::Area { worker, scratch }) => {
            // worker-fs directories are node-local whatever they are called
            let shared = tag == "shared" && !*worker;
            let dir_type = match (shared, *scratch) {
                (true, true) => DirectoryType::SharedScratch,
                (true, false) => DirectoryType::SharedStorage,
                (false, true) => DirectoryType::LocalScratch,
                (false, false) => DirectoryType::LocalStorage,
            };
            Ok(Frame::LegacyDirectory {
                directory: Directory::new(dir_type, String::new()),
                mount_point: None,
            })
        }
        _ => {
            warn!(element = %tag, position, "ignoring unexpected element in site catalog");
            Ok(Frame::Other)
        }
    }
}

fn close(frame: Frame, stack: &mut [Frame], sites: &mut Vec<SiteEntry>) {
    match frame {
        Frame::Site(site) => sites.push(site),
        Frame::Directory(directory) => {
            if let Some(Frame::Site(site)) = stack.last_mut() {
                site.directories.push(directory);
            }
        }
        Frame::LegacyDirectory {
            mut directory,
            mount_point,
        } => {
            if directory.path.is_empty() {
                directory.path = mount_point.unwrap_or_default();
            }
            if let Some(site) = enclosing_site(stack) {
                site.directories.push(directory);
            }
        }
        Frame::Profile(mut profile) => {
            profile.value = profile.value.trim().to_string();
            if let Some(Frame::Site(site)) = stack.last_mut() {
                site.add_profile(profile);
            }
        }
        Frame::Root | Frame::FileSystem { .. } | Frame::Area { .. } | Frame::Other => {}
    }
}

fn enclosing_site(stack: &mut [Frame]) -> Option<&mut SiteEntry> {
    stack.iter_mut().rev().find_map(|frame| match frame {
        Frame::Site(site) => Some(site),
        _ => None,
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

fn attributes(e: &BytesStart<'_>, position: usize) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| CatalogError::Xml {
            position,
            source: err.into(),
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| CatalogError::Xml { position, source })?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

/// Writes the store as a `sitecatalog` document.
pub fn render(store: &SiteStore, version: SchemaVersion) -> String {
    let mut out = String::new();
    let _ = write_document(&mut out, store, version);
    out
}

fn write_document(out: &mut String, store: &SiteStore, version: SchemaVersion) -> std::fmt::Result {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    write!(out, "<sitecatalog")?;
    write_attr(out, "xmlns", NAMESPACE)?;
    write_attr(out, "xmlns:xsi", XSI)?;
    write_attr(
        out,
        "xsi:schemaLocation",
        &format!("{NAMESPACE} {}", version.location()),
    )?;
    write_attr(out, "version", version.version())?;
    writeln!(out, ">")?;

    for site in store.entries() {
        write!(out, "  <site")?;
        write_attr(out, "handle", &site.handle)?;
        write_attr(out, "arch", site.arch.as_str())?;
        write_attr(out, "os", &site.os.as_str().to_ascii_uppercase())?;
        write_opt_attr(out, "osrelease", site.os_release.as_deref())?;
        write_opt_attr(out, "osversion", site.os_version.as_deref())?;
        write_opt_attr(out, "glibc", site.glibc.as_deref())?;
        writeln!(out, ">")?;

        for grid in &site.grids {
            write_grid(out, grid)?;
        }
        match version {
            SchemaVersion::V4 => write_directories_v4(out, site)?,
            SchemaVersion::V3 => write_directories_v3(out, site)?,
        }
        for profile in &site.profiles {
            write!(out, "    <profile")?;
            write_attr(out, "namespace", &profile.namespace)?;
            write_attr(out, "key", &profile.key)?;
            writeln!(out, ">{}</profile>", quote(&profile.value, false))?;
        }
        writeln!(out, "  </site>")?;
    }
    writeln!(out, "</sitecatalog>")
}

fn write_grid(out: &mut String, grid: &GridGateway) -> std::fmt::Result {
    write!(out, "    <grid")?;
    write_attr(out, "type", &grid.grid_type)?;
    write_attr(out, "contact", &grid.contact)?;
    write_attr(out, "scheduler", &grid.scheduler)?;
    write_opt_attr(out, "jobtype", grid.job_type.as_deref())?;
    writeln!(out, "/>")
}

fn write_directories_v4(out: &mut String, site: &SiteEntry) -> std::fmt::Result {
    for directory in &site.directories {
        write!(out, "    <directory")?;
        write_attr(out, "type", directory.dir_type.xml_name())?;
        write_attr(out, "path", &directory.path)?;
        if directory.file_servers.is_empty() {
            writeln!(out, "/>")?;
            continue;
        }
        writeln!(out, ">")?;
        for server in &directory.file_servers {
            write!(out, "      <file-server")?;
            write_attr(out, "operation", server.operation.as_str())?;
            write_attr(out, "url", &server.url)?;
            writeln!(out, "/>")?;
        }
        writeln!(out, "    </directory>")?;
    }
    Ok(())
}

/// 3.0 documents nest directories as `head-fs/{scratch,storage}/{shared,local}`
/// and split file server urls into a base url and a mount point.
fn write_directories_v3(out: &mut String, site: &SiteEntry) -> std::fmt::Result {
    if site.directories.is_empty() {
        return Ok(());
    }
    writeln!(out, "    <head-fs>")?;
    for (area, scratch) in [("scratch", true), ("storage", false)] {
        let dirs: Vec<&Directory> = site
            .directories
            .iter()
            .filter(|d| d.dir_type.is_scratch() == scratch)
            .collect();
        if dirs.is_empty() {
            continue;
        }
        writeln!(out, "      <{area}>")?;
        for directory in dirs {
            let kind = if directory.dir_type.is_shared() { "shared" } else { "local" };
            writeln!(out, "        <{kind}>")?;
            for server in &directory.file_servers {
                let (protocol, base, mount) = split_url(&server.url);
                write!(out, "          <file-server")?;
                write_attr(out, "protocol", protocol)?;
                write_attr(out, "url", base)?;
                write_attr(out, "mount-point", mount)?;
                writeln!(out, "/>")?;
            }
            write!(out, "          <internal-mount-point")?;
            write_attr(out, "mount-point", &directory.path)?;
            writeln!(out, "/>")?;
            writeln!(out, "        </{kind}>")?;
        }
        writeln!(out, "      </{area}>")?;
    }
    writeln!(out, "    </head-fs>")
}

/// Splits `scheme://host/path` into `(scheme, scheme://host, /path)`.
fn split_url(url: &str) -> (&str, &str, &str) {
    let Some((scheme, rest)) = url.split_once("://") else {
        return ("file", "", url);
    };
    let authority_end = scheme.len() + 3 + rest.find('/').unwrap_or(rest.len());
    (scheme, &url[..authority_end], &url[authority_end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Arch, Os};

    const V4: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitecatalog xmlns="http://pegasus.isi.edu/schema/sitecatalog" version="4.0">
  <site handle="local" arch="x86_64" os="LINUX">
    <directory type="shared-scratch" path="/tmp/scratch">
      <file-server operation="all" url="file:///tmp/scratch"/>
    </directory>
    <directory type="local-storage" path="/tmp/storage">
      <file-server operation="get" url="file:///tmp/storage"/>
    </directory>
    <profile namespace="env" key="PEGASUS_HOME">/usr/local/pegasus</profile>
  </site>
  <site handle="isi" arch="x86" os="LINUX" osrelease="rhel">
    <grid type="gt5" contact="smarty.isi.edu/jobmanager-pbs" scheduler="PBS" jobtype="compute"/>
    <grid type="gt5" contact="smarty.isi.edu/jobmanager-fork" scheduler="Fork" jobtype="auxillary"/>
  </site>
</sitecatalog>
"#;

    const V3: &str = r#"<sitecatalog version="3.0">
  <site handle="local" arch="x86_64" os="LINUX">
    <grid type="gt2" contact="localhost/jobmanager-fork" scheduler="Fork" jobtype="auxillary"/>
    <head-fs>
      <scratch>
        <shared>
          <file-server protocol="gsiftp" url="gsiftp://host.isi.edu" mount-point="/scratch"/>
          <internal-mount-point mount-point="/nfs/scratch"/>
        </shared>
      </scratch>
      <storage>
        <local>
          <file-server protocol="file" url="file://" mount-point="/storage"/>
        </local>
      </storage>
    </head-fs>
    <replica-catalog type="LRC" url="rlsn://localhost"/>
    <profile namespace="env" key="JAVA_HOME">/usr/java</profile>
  </site>
</sitecatalog>
"#;

    #[test]
    fn test_parse_v4() {
        let sites = parse(V4, "sites.xml").unwrap();
        assert_eq!(sites.len(), 2);

        let local = &sites[0];
        assert_eq!(local.handle, "local");
        assert_eq!(local.arch, Arch::X86_64);
        assert_eq!(local.os, Os::Linux);
        assert_eq!(local.scratch_path(), Some("/tmp/scratch"));
        assert_eq!(local.directories[1].file_servers[0].operation, Operation::Get);
        assert_eq!(local.env("PEGASUS_HOME"), Some("/usr/local/pegasus"));

        let isi = &sites[1];
        assert_eq!(isi.os_release.as_deref(), Some("rhel"));
        assert_eq!(isi.grids.len(), 2);
        assert_eq!(isi.grids[1].job_type.as_deref(), Some("auxillary"));
    }

    #[test]
    fn test_parse_v3_layout() {
        let sites = parse(V3, "sites3.xml").unwrap();
        let local = &sites[0];
        assert_eq!(local.grids.len(), 1);
        let scratch = local.directory(DirectoryType::SharedScratch).unwrap();
        assert_eq!(scratch.path, "/nfs/scratch");
        assert_eq!(scratch.file_servers[0].url, "gsiftp://host.isi.edu/scratch");
        let storage = local.directory(DirectoryType::LocalStorage).unwrap();
        assert_eq!(storage.path, "/storage");
        assert_eq!(local.env("JAVA_HOME"), Some("/usr/java"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("<sites/>", "s.xml").unwrap_err(),
            CatalogError::Parse { line: 1, .. }
        ));
        let missing_handle = "<sitecatalog>\n  <site arch=\"x86\"/>\n</sitecatalog>";
        assert!(matches!(
            parse(missing_handle, "s.xml").unwrap_err(),
            CatalogError::Parse { line: 2, .. }
        ));
        assert!(parse("", "s.xml").is_err());
    }

    #[test]
    fn test_render_v4_reparses() {
        let mut store = SiteStore::new();
        store.extend(parse(V4, "sites.xml").unwrap());
        let text = render(&store, SchemaVersion::V4);
        assert!(text.contains("version=\"4.0\""));
        assert!(text.contains("<directory type=\"shared-scratch\" path=\"/tmp/scratch\">"));

        let again = parse(&text, "out.xml").unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again, store.entries().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_render_v3_nests_directories() {
        let mut store = SiteStore::new();
        store.extend(parse(V4, "sites.xml").unwrap());
        let text = render(&store, SchemaVersion::V3);
        assert!(text.contains("version=\"3.0\""));
        assert!(text.contains("<head-fs>"));
        assert!(text.contains("<internal-mount-point mount-point=\"/tmp/scratch\"/>"));
        assert!(text.contains("protocol=\"file\" url=\"file://\" mount-point=\"/tmp/scratch\""));

        let again = parse(&text, "out.xml").unwrap();
        let local = again.iter().find(|s| s.handle == "local").unwrap();
        assert_eq!(local.scratch_path(), Some("/tmp/scratch"));
        assert_eq!(
            local.directory(DirectoryType::LocalStorage).unwrap().file_servers[0].url,
            "file:///tmp/storage"
        );
    }

    #[test]
    fn test_split_url() {
        assert_eq!(
            split_url("gsiftp://host.isi.edu/data/x"),
            ("gsiftp", "gsiftp://host.isi.edu", "/data/x")
        );
        assert_eq!(split_url("file:///tmp"), ("file", "file://", "/tmp"));
        assert_eq!(split_url("/plain"), ("file", "", "/plain"));
    }
}
