//! The YAML replica catalog (`replicas:` documents).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::store::{ReplicaEntry, ReplicaStore, SITE_ATTRIBUTE};
use crate::error::Result;
use crate::transformation::yaml::FORMAT_VERSION;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    pegasus: String,
    #[serde(default)]
    replicas: Vec<Replica>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Replica {
    lfn: String,
    pfn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    site: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

pub fn parse(text: &str) -> Result<Vec<ReplicaEntry>> {
    let doc: Document = serde_yaml::from_str(text)?;
    Ok(doc
        .replicas
        .into_iter()
        .map(|r| {
            let mut entry = ReplicaEntry::new(r.lfn, r.pfn);
            entry.attributes = r.metadata;
            if let Some(site) = r.site {
                entry.attributes.insert(SITE_ATTRIBUTE.to_string(), site);
            }
            entry
        })
        .collect())
}

pub fn render(store: &ReplicaStore) -> Result<String> {
    let replicas = store
        .entries()
        .map(|e| {
            let mut metadata = e.attributes.clone();
            let site = metadata.remove(SITE_ATTRIBUTE);
            Replica {
                lfn: e.lfn.clone(),
                pfn: e.pfn.clone(),
                site,
                metadata,
            }
        })
        .collect();
    Ok(serde_yaml::to_string(&Document {
        pegasus: FORMAT_VERSION.to_string(),
        replicas,
    })?)
}
