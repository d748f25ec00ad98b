//! The YAML transformation catalog (`transformations:` documents).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::entry::TransformationEntry;
use super::store::TransformationStore;
use crate::common::{CatalogProfile, SysInfo, upsert_profile};
use crate::error::{CatalogError, Result};

pub(crate) const FORMAT_VERSION: &str = "5.0";

/// `namespace -> key -> value`, as written in YAML catalogs.
pub type ProfileMap = BTreeMap<String, BTreeMap<String, serde_yaml::Value>>;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    pegasus: String,
    #[serde(default)]
    transformations: Vec<Transformation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Transformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    profiles: ProfileMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires: Vec<String>,
    sites: Vec<Site>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Site {
    name: String,
    pfn: String,
    #[serde(rename = "type", default = "default_type")]
    tc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arch: Option<String>,
    #[serde(rename = "os.type", default, skip_serializing_if = "Option::is_none")]
    os_type: Option<String>,
    #[serde(rename = "os.release", default, skip_serializing_if = "Option::is_none")]
    os_release: Option<String>,
    #[serde(rename = "os.version", default, skip_serializing_if = "Option::is_none")]
    os_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    profiles: ProfileMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container: Option<String>,
}

fn default_type() -> String {
    "installed".to_string()
}

/// Flattens a YAML profile map into profiles.
pub fn profiles_from_map(map: &ProfileMap) -> Vec<CatalogProfile> {
    let mut out = Vec::new();
    for (namespace, entries) in map {
        for (key, value) in entries {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                serde_yaml::Value::Null => String::new(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default(),
            };
            out.push(CatalogProfile::new(namespace, key, value));
        }
    }
    out
}

/// Nests profiles back into a YAML profile map.
pub fn profiles_to_map(profiles: &[CatalogProfile]) -> ProfileMap {
    let mut map = ProfileMap::new();
    for p in profiles {
        map.entry(p.namespace.clone())
            .or_default()
            .insert(p.key.clone(), serde_yaml::Value::String(p.value.clone()));
    }
    map
}

/// Parses a YAML transformation catalog.
pub fn parse(text: &str) -> Result<Vec<TransformationEntry>> {
    let doc: Document = serde_yaml::from_str(text)?;
    let mut entries = Vec::new();
    for tr in doc.transformations {
        let common = profiles_from_map(&tr.profiles);
        for site in tr.sites {
            if let Some(container) = &site.container {
                warn!(transformation = %tr.name, site = %site.name, container = %container, "ignoring container");
            }
            let mut sysinfo = SysInfo::default();
            if let Some(arch) = &site.arch {
                sysinfo.arch = arch.parse()?;
            }
            if let Some(os) = &site.os_type {
                sysinfo.os = os.parse()?;
            }
            sysinfo.os_release = site.os_release;
            sysinfo.os_version = site.os_version;

            let mut profiles = common.clone();
            for p in profiles_from_map(&site.profiles) {
                upsert_profile(&mut profiles, p);
            }
            entries.push(TransformationEntry {
                namespace: tr.namespace.clone(),
                name: tr.name.clone(),
                version: tr.version.clone(),
                site: site.name,
                pfn: site.pfn,
                tc_type: site.tc_type.parse()?,
                sysinfo,
                profiles,
            });
        }
    }
    Ok(entries)
}

/// Renders the store as a YAML transformation catalog.
pub fn render(store: &TransformationStore) -> Result<String> {
    let transformations = store
        .by_logical_name()
        .into_values()
        .filter_map(|entries| {
            let first = entries.first()?;
            Some(Transformation {
                namespace: first.namespace.clone(),
                name: first.name.clone(),
                version: first.version.clone(),
                profiles: ProfileMap::new(),
                requires: Vec::new(),
                sites: entries
                    .iter()
                    .map(|e| Site {
                        name: e.site.clone(),
                        pfn: e.pfn.clone(),
                        tc_type: e.tc_type.as_str().to_ascii_lowercase(),
                        arch: Some(e.sysinfo.arch.as_str().to_string()),
                        os_type: Some(e.sysinfo.os.as_str().to_string()),
                        os_release: e.sysinfo.os_release.clone(),
                        os_version: e.sysinfo.os_version.clone(),
                        profiles: profiles_to_map(&e.profiles),
                        container: None,
                    })
                    .collect(),
            })
        })
        .collect();
    let doc = Document {
        pegasus: FORMAT_VERSION.to_string(),
        transformations,
    };
    serde_yaml::to_string(&doc).map_err(CatalogError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Os;
    use crate::transformation::TcType;

    const SAMPLE: &str = r#"
pegasus: "5.0"
transformations:
  - namespace: "example"
    name: "keg"
    version: "1.0"
    profiles:
      env:
        APP_HOME: "/tmp/myscratch"
      pegasus:
        clusters.num: 1
    sites:
      - name: "isi"
        type: "installed"
        pfn: "/path/to/keg"
        arch: "x86_64"
        os.type: "linux"
        os.release: "fc"
        profiles:
          env:
            APP_HOME: "/override"
  - name: anotherTr
    sites:
      - name: isi
        type: stageable
        pfn: /path/to/anotherTr
containers:
  - name: centos-pegasus
    type: docker
"#;

    #[test]
    fn test_parse_sample() {
        let entries = parse(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        let keg = &entries[0];
        assert_eq!(keg.logical_name(), "example::keg:1.0");
        assert_eq!(keg.sysinfo.os, Os::Linux);
        assert_eq!(keg.sysinfo.os_release.as_deref(), Some("fc"));
        let app = keg.profiles.iter().find(|p| p.key == "APP_HOME").unwrap();
        assert_eq!(app.value, "/override");
        let clusters = keg.profiles.iter().find(|p| p.key == "clusters.num").unwrap();
        assert_eq!(clusters.value, "1");

        assert_eq!(entries[1].tc_type, TcType::Stageable);
        assert_eq!(entries[1].namespace, None);
    }

    #[test]
    fn test_render_reparses() {
        let mut store = TransformationStore::new();
        store.extend(parse(SAMPLE).unwrap());
        let text = render(&store).unwrap();
        assert!(text.contains("pegasus: '5.0'") || text.contains("pegasus: \"5.0\""));

        let again = parse(&text).unwrap();
        assert_eq!(again.len(), 2);
        assert!(again.iter().any(|e| e.pfn == "/path/to/anotherTr"));
    }

    #[test]
    fn test_bad_type_is_error() {
        let text = "pegasus: '5.0'\ntransformations:\n  - name: a\n    sites:\n      - name: s\n        pfn: /a\n        type: docker\n";
        assert!(matches!(parse(text), Err(CatalogError::InvalidEntry(_))));
    }
}
