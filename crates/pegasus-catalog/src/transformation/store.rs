use std::collections::{BTreeMap, BTreeSet};

use super::entry::{TcType, TransformationEntry, logical_name};

/// In-memory transformation catalog, keyed by site then logical name.
#[derive(Debug, Clone, Default)]
pub struct TransformationStore {
    sites: BTreeMap<String, BTreeMap<String, Vec<TransformationEntry>>>,
}

impl TransformationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entry`. An entry for the same site, pfn and type is replaced;
    /// returns false in that case.
    pub fn insert(&mut self, entry: TransformationEntry) -> bool {
        let list = self
            .sites
            .entry(entry.site.clone())
            .or_default()
            .entry(entry.logical_name())
            .or_default();
        match list.iter_mut().find(|e| e.same_slot(&entry)) {
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

    /// Entries for a transformation, optionally restricted to a site and type.
    pub fn lookup(
        &self,
        namespace: Option<&str>,
        name: &str,
        version: Option<&str>,
        site: Option<&str>,
        tc_type: Option<TcType>,
    ) -> Vec<&TransformationEntry> {
        let lfn = logical_name(namespace, name, version);
        self.sites
            .iter()
            .filter(|(s, _)| site.is_none_or(|wanted| wanted == s.as_str()))
            .filter_map(|(_, by_lfn)| by_lfn.get(&lfn))
            .flatten()
            .filter(|e| tc_type.is_none_or(|t| t == e.tc_type))
            .collect()
    }

    /// Sites that carry the transformation.
    pub fn lookup_sites(
        &self,
        namespace: Option<&str>,
        name: &str,
        version: Option<&str>,
        tc_type: Option<TcType>,
    ) -> Vec<String> {
        let sites: BTreeSet<String> = self
            .lookup(namespace, name, version, None, tc_type)
            .into_iter()
            .map(|e| e.site.clone())
            .collect();
        sites.into_iter().collect()
    }

    /// Removes a transformation's entries; returns how many were removed.
    pub fn delete(
        &mut self,
        namespace: Option<&str>,
        name: &str,
        version: Option<&str>,
        site: Option<&str>,
        tc_type: Option<TcType>,
    ) -> usize {
        let lfn = logical_name(namespace, name, version);
        let mut removed = 0;
        for (s, by_lfn) in self.sites.iter_mut() {
            if site.is_some_and(|wanted| wanted != s.as_str()) {
                continue;
            }
            if let Some(list) = by_lfn.get_mut(&lfn) {
                let before = list.len();
                list.retain(|e| tc_type.is_some_and(|t| t != e.tc_type));
                removed += before - list.len();
            }
        }
        self.prune();
        removed
    }

    /// Removes everything on `site`.
    pub fn delete_by_site(&mut self, site: &str) -> usize {
        self.sites
            .remove(site)
            .map(|by_lfn| by_lfn.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Removes every entry of `tc_type`, optionally only on `site`.
    pub fn delete_by_type(&mut self, tc_type: TcType, site: Option<&str>) -> usize {
        let mut removed = 0;
        for (s, by_lfn) in self.sites.iter_mut() {
            if site.is_some_and(|wanted| wanted != s.as_str()) {
                continue;
            }
            for list in by_lfn.values_mut() {
                let before = list.len();
                list.retain(|e| e.tc_type != tc_type);
                removed += before - list.len();
            }
        }
        self.prune();
        removed
    }

    /// Removes every entry `matches` accepts.
    pub fn delete_matching<P>(&mut self, mut matches: P) -> usize
    where
        P: FnMut(&TransformationEntry) -> bool,
    {
        let mut removed = 0;
        for list in self.sites.values_mut().flat_map(|by_lfn| by_lfn.values_mut()) {
            let before = list.len();
            list.retain(|e| !matches(e));
            removed += before - list.len();
        }
        self.prune();
        removed
    }

    /// All entries, ordered by site then logical name.
    pub fn entries(&self) -> impl Iterator<Item = &TransformationEntry> {
        self.sites.values().flat_map(|by_lfn| by_lfn.values()).flatten()
    }

    /// Entries for in-place edits of profiles or sysinfo. Changing the
    /// logical name, site, pfn or type through this breaks lookups.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut TransformationEntry> {
        self.sites
            .values_mut()
            .flat_map(|by_lfn| by_lfn.values_mut())
            .flatten()
    }

    /// Distinct logical names.
    pub fn list_lfns(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .sites
            .values()
            .flat_map(|by_lfn| by_lfn.keys().cloned())
            .collect();
        names.into_iter().collect()
    }

    /// Entries grouped by logical name, for writers that nest sites below
    /// transformations.
    pub fn by_logical_name(&self) -> BTreeMap<String, Vec<&TransformationEntry>> {
        let mut grouped: BTreeMap<String, Vec<&TransformationEntry>> = BTreeMap::new();
        for entry in self.entries() {
            grouped.entry(entry.logical_name()).or_default().push(entry);
        }
        grouped
    }

    pub fn clear(&mut self) {
        self.sites.clear();
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&mut self) {
        for by_lfn in self.sites.values_mut() {
            by_lfn.retain(|_, list| !list.is_empty());
        }
        self.sites.retain(|_, by_lfn| !by_lfn.is_empty());
    }
}

impl Extend<TransformationEntry> for TransformationStore {
    fn extend<I: IntoIterator<Item = TransformationEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}
