//! The YAML site catalog (`sites:` documents).

use serde::{Deserialize, Serialize};

use super::entry::{Directory, FileServer, GridGateway, SiteEntry, SiteStore};
use crate::error::Result;
use crate::transformation::yaml::{FORMAT_VERSION, ProfileMap, profiles_from_map, profiles_to_map};

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    pegasus: String,
    #[serde(default)]
    sites: Vec<Site>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Site {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arch: Option<String>,
    #[serde(rename = "os.type", default, skip_serializing_if = "Option::is_none")]
    os_type: Option<String>,
    #[serde(rename = "os.release", default, skip_serializing_if = "Option::is_none")]
    os_release: Option<String>,
    #[serde(rename = "os.version", default, skip_serializing_if = "Option::is_none")]
    os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    directories: Vec<YamlDirectory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    grids: Vec<Grid>,
    #[serde(default, skip_serializing_if = "ProfileMap::is_empty")]
    profiles: ProfileMap,
}

#[derive(Debug, Serialize, Deserialize)]
struct YamlDirectory {
    #[serde(rename = "type")]
    dir_type: String,
    path: String,
    #[serde(rename = "fileServers", default, skip_serializing_if = "Vec::is_empty")]
    file_servers: Vec<YamlFileServer>,
}

#[derive(Debug, Serialize, Deserialize)]
struct YamlFileServer {
    url: String,
    #[serde(default = "default_operation")]
    operation: String,
}

fn default_operation() -> String {
    "all".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct Grid {
    #[serde(rename = "type")]
    grid_type: String,
    contact: String,
    scheduler: String,
    #[serde(rename = "jobtype", default, skip_serializing_if = "Option::is_none")]
    job_type: Option<String>,
}

pub fn parse(text: &str) -> Result<Vec<SiteEntry>> {
    let doc: Document = serde_yaml::from_str(text)?;
    doc.sites.into_iter().map(site_from).collect()
}

fn site_from(site: Site) -> Result<SiteEntry> {
    let mut entry = SiteEntry::new(site.name);
    if let Some(arch) = site.arch {
        entry.arch = arch.parse()?;
    }
    if let Some(os) = site.os_type {
        entry.os = os.parse()?;
    }
    entry.os_release = site.os_release;
    entry.os_version = site.os_version;
    for dir in site.directories {
        let mut directory = Directory::new(dir.dir_type.parse()?, dir.path);
        for server in dir.file_servers {
            directory.file_servers.push(FileServer {
                operation: server.operation.parse()?,
                url: server.url,
            });
        }
        entry.directories.push(directory);
    }
    entry.grids = site
        .grids
        .into_iter()
        .map(|g| GridGateway {
            grid_type: g.grid_type,
            contact: g.contact,
            scheduler: g.scheduler,
            job_type: g.job_type,
        })
        .collect();
    for profile in profiles_from_map(&site.profiles) {
        entry.add_profile(profile);
    }
    Ok(entry)
}

pub fn render(store: &SiteStore) -> Result<String> {
    let sites = store
        .entries()
        .map(|s| Site {
            name: s.handle.clone(),
            arch: Some(s.arch.as_str().to_string()),
            os_type: Some(s.os.as_str().to_string()),
            os_release: s.os_release.clone(),
            os_version: s.os_version.clone(),
            directories: s
                .directories
                .iter()
                .map(|d| YamlDirectory {
                    dir_type: d.dir_type.yaml_name().to_string(),
                    path: d.path.clone(),
                    file_servers: d
                        .file_servers
                        .iter()
                        .map(|f| YamlFileServer {
                            url: f.url.clone(),
                            operation: f.operation.as_str().to_string(),
                        })
                        .collect(),
                })
                .collect(),
            grids: s
                .grids
                .iter()
                .map(|g| Grid {
                    grid_type: g.grid_type.clone(),
                    contact: g.contact.clone(),
                    scheduler: g.scheduler.clone(),
                    job_type: g.job_type.clone(),
                })
                .collect(),
            profiles: profiles_to_map(&s.profiles),
        })
        .collect();
    Ok(serde_yaml::to_string(&Document {
        pegasus: FORMAT_VERSION.to_string(),
        sites,
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Arch, Os};
    use crate::error::CatalogError;
    use crate::site::entry::{DirectoryType, Operation};

    const SAMPLE: &str = r#"
pegasus: "5.0"
sites:
  - name: condorpool
    arch: x86_64
    os.type: linux
    directories:
      - type: sharedScratch
        path: /lustre
        fileServers:
          - url: gsiftp://smarty.isi.edu/lustre
            operation: put
          - url: file:///lustre
    grids:
      - type: gt5
        contact: smarty.isi.edu/jobmanager-pbs
        scheduler: pbs
        jobtype: compute
    profiles:
      env:
        JAVA_HOME: /usr/bin/java
      condor:
        priority: 10
"#;

    #[test]
    fn test_parse_sample() {
        let sites = parse(SAMPLE).unwrap();
        let site = &sites[0];
        assert_eq!(site.handle, "condorpool");
        assert_eq!(site.arch, Arch::X86_64);
        assert_eq!(site.os, Os::Linux);
        let scratch = site.directory(DirectoryType::SharedScratch).unwrap();
        assert_eq!(scratch.file_servers[0].operation, Operation::Put);
        assert_eq!(scratch.file_servers[1].operation, Operation::All);
        assert_eq!(site.grids[0].scheduler, "pbs");
        assert_eq!(site.env("JAVA_HOME"), Some("/usr/bin/java"));
        assert!(
            site.profiles
                .iter()
                .any(|p| p.namespace == "condor" && p.key == "priority" && p.value == "10")
        );
    }

    #[test]
    fn test_render_reparses() {
        let mut store = SiteStore::new();
        store.extend(parse(SAMPLE).unwrap());
        let text = render(&store).unwrap();
        assert!(text.contains("type: sharedScratch"));
        assert!(text.contains("fileServers:"));
        let again = parse(&text).unwrap();
        assert_eq!(again, store.entries().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_directory_type() {
        let text = "pegasus: '5.0'\nsites:\n  - name: a\n    directories:\n      - type: attic\n        path: /x\n";
        assert!(matches!(parse(text).unwrap_err(), CatalogError::InvalidEntry(_)));
    }
}
