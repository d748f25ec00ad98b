use std::collections::{BTreeMap, BTreeSet};

use glob::Pattern;

use crate::error::{CatalogError, Result};

/// The attribute naming the site a replica lives on.
pub const SITE_ATTRIBUTE: &str = "site";

/// One physical copy of a logical file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplicaEntry {
    pub lfn: String,
    pub pfn: String,
    pub attributes: BTreeMap<String, String>,
}

impl ReplicaEntry {
    pub fn new(lfn: impl Into<String>, pfn: impl Into<String>) -> Self {
        Self {
            lfn: lfn.into(),
            pfn: pfn.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.attributes.insert(SITE_ATTRIBUTE.to_string(), site.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn site(&self) -> Option<&str> {
        self.attributes.get(SITE_ATTRIBUTE).map(String::as_str)
    }
}

/// In-memory replica catalog keyed by logical file name.
#[derive(Debug, Clone, Default)]
pub struct ReplicaStore {
    replicas: BTreeMap<String, Vec<ReplicaEntry>>,
}

impl ReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a replica. A replica with the same pfn and site has its
    /// attributes replaced; returns false in that case.
    pub fn insert(&mut self, entry: ReplicaEntry) -> bool {
        let list = self.replicas.entry(entry.lfn.clone()).or_default();
        match list
            .iter_mut()
            .find(|e| e.pfn == entry.pfn && e.site() == entry.site())
        {
            Some(existing) => {
                *existing = entry;
                false
            }
            None => {
                list.push(entry);
                true
            }
        }
    }

    pub fn lookup(&self, lfn: &str) -> &[ReplicaEntry] {
        self.replicas.get(lfn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replicas for each of `lfns` that has any.
    pub fn lookup_many<'a, I>(&self, lfns: I) -> BTreeMap<String, Vec<&ReplicaEntry>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lfns.into_iter()
            .filter_map(|lfn| {
                let found = self.lookup(lfn);
                (!found.is_empty()).then(|| (lfn.to_string(), found.iter().collect()))
            })
            .collect()
    }

    /// Removes the `lfn`/`pfn` pair; returns the number removed.
    pub fn delete(&mut self, lfn: &str, pfn: &str) -> usize {
        let Some(list) = self.replicas.get_mut(lfn) else {
            return 0;
        };
        let before = list.len();
        list.retain(|e| e.pfn != pfn);
        let removed = before - list.len();
        if list.is_empty() {
            self.replicas.remove(lfn);
        }
        removed
    }

    /// Removes replicas of `entry.lfn` with the same pfn that carry every
    /// attribute of `entry` with the same value.
    pub fn delete_matching(&mut self, entry: &ReplicaEntry) -> usize {
        let Some(list) = self.replicas.get_mut(&entry.lfn) else {
            return 0;
        };
        let before = list.len();
        list.retain(|e| {
            e.pfn != entry.pfn
                || !entry
                    .attributes
                    .iter()
                    .all(|(k, v)| e.attributes.get(k) == Some(v))
        });
        let removed = before - list.len();
        if list.is_empty() {
            self.replicas.remove(&entry.lfn);
        }
        removed
    }

    /// Removes every replica of `lfn`.
    pub fn remove(&mut self, lfn: &str) -> usize {
        self.replicas.remove(lfn).map(|l| l.len()).unwrap_or(0)
    }

    /// Replicas whose lfn and pfn match the glob patterns and, if given,
    /// whose site equals `site`.
    pub fn list(
        &self,
        lfn_glob: Option<&str>,
        pfn_glob: Option<&str>,
        site: Option<&str>,
    ) -> Result<Vec<&ReplicaEntry>> {
        let compile = |p: Option<&str>| -> Result<Option<Pattern>> {
            p.map(|p| {
                Pattern::new(p).map_err(|e| CatalogError::invalid(format!("bad pattern '{p}': {e}")))
            })
            .transpose()
        };
        let lfn_pattern = compile(lfn_glob)?;
        let pfn_pattern = compile(pfn_glob)?;

        Ok(self
            .entries()
            .filter(|e| lfn_pattern.as_ref().is_none_or(|p| p.matches(&e.lfn)))
            .filter(|e| pfn_pattern.as_ref().is_none_or(|p| p.matches(&e.pfn)))
            .filter(|e| site.is_none_or(|s| e.site() == Some(s)))
            .collect())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReplicaEntry> {
        self.replicas.values().flatten()
    }

    pub fn lfns(&self) -> BTreeSet<&str> {
        self.replicas.keys().map(String::as_str).collect()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.len();
        self.replicas.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.replicas.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

impl Extend<ReplicaEntry> for ReplicaStore {
    fn extend<I: IntoIterator<Item = ReplicaEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReplicaStore {
        let mut store = ReplicaStore::new();
        store.insert(ReplicaEntry::new("f.a", "file:///data/f.a").with_site("local"));
        store.insert(ReplicaEntry::new("f.a", "gsiftp://remote/f.a").with_site("isi"));
        store.insert(ReplicaEntry::new("f.b", "file:///data/f.b").with_site("local"));
        store
    }

    #[test]
    fn test_insert_replaces_same_pfn_and_site() {
        let mut s = store();
        assert!(!s.insert(
            ReplicaEntry::new("f.a", "file:///data/f.a")
                .with_site("local")
                .with_attribute("checksum", "abc")
        ));
        assert_eq!(s.len(), 3);
        assert_eq!(s.lookup("f.a")[0].attributes.len(), 2);
        assert!(s.insert(ReplicaEntry::new("f.a", "file:///data/f.a").with_site("other")));
    }

    #[test]
    fn test_lookup_many_skips_unknown() {
        let s = store();
        let found = s.lookup_many(["f.a", "f.z"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found["f.a"].len(), 2);
    }

    #[test]
    fn test_delete_and_remove() {
        let mut s = store();
        assert_eq!(s.delete("f.a", "gsiftp://remote/f.a"), 1);
        assert_eq!(s.delete("f.a", "nope"), 0);
        assert_eq!(s.remove("f.a"), 1);
        assert_eq!(s.remove("f.a"), 0);
        assert_eq!(s.lfns().into_iter().collect::<Vec<_>>(), vec!["f.b"]);
    }

    #[test]
    fn test_delete_matching_attributes() {
        let mut s = store();
        s.insert(ReplicaEntry::new("f.a", "file:///data/f.a").with_site("isi"));
        let wanted = ReplicaEntry::new("f.a", "file:///data/f.a").with_site("isi");
        assert_eq!(s.delete_matching(&wanted), 1);
        assert_eq!(s.lookup("f.a").len(), 2);
        assert_eq!(s.delete_matching(&ReplicaEntry::new("f.b", "file:///data/f.b")), 1);
        assert!(s.lookup("f.b").is_empty());
    }

    #[test]
    fn test_list_with_globs() {
        let s = store();
        assert_eq!(s.list(Some("f.*"), None, Some("local")).unwrap().len(), 2);
        assert_eq!(s.list(None, Some("gsiftp://*"), None).unwrap().len(), 1);
        assert_eq!(s.list(None, None, None).unwrap().len(), 3);
        assert!(s.list(Some("[unclosed"), None, None).is_err());
    }
}
