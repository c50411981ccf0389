use crate::filter::Filter;
use crate::map::Map;
use crate::node::NodeId;
use crate::refcount::assign;
use crate::unit::{UnitId, UnitRef};
use std::rc::Rc;

/// Counters describing how searches were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub searches: u64,
    pub full_walks: u64,
    pub cache_hits: u64,
    pub snapshot_refreshes: u64,
    pub node_visits: u64,
    pub unit_visits: u64,
}

/// Units found by a search, kept between calls so an unchanged query can be
/// answered without walking the tree again.
///
/// Create one per query site and pass it to every search from that site.
#[derive(Debug, Default)]
pub struct SearchResult {
    pub(crate) units: Vec<UnitRef>,
    pub(crate) filter: Option<Rc<Filter>>,
    pub(crate) tick: u64,
    pub(crate) utick: u64,
    pub(crate) checksum: u64,
    // Occupied nodes the last full walk looked into.
    pub(crate) snap: Vec<NodeId>,
    // Nodes whose update ticks the cached answer was checked against.
    pub(crate) innodes: Vec<NodeId>,
    pub(crate) valid: bool,
}

impl SearchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches in leaf order.
    pub fn units(&self) -> &[UnitRef] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, unit: &UnitRef) -> bool {
        self.units.iter().any(|u| u.ptr_eq(unit))
    }

    pub fn ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id()).collect()
    }

    pub fn filter(&self) -> Option<&Rc<Filter>> {
        self.filter.as_ref()
    }

    /// Replaces the filter used by [`Map::search_from_node`].
    pub fn attach(&mut self, filter: Option<&Rc<Filter>>) {
        assign(&mut self.filter, filter);
    }

    pub fn detach(&mut self) {
        self.filter = None;
    }

    /// Drops the cached matches; the next search walks the tree.
    pub fn clean(&mut self) {
        self.units.clear();
        self.snap.clear();
        self.innodes.clear();
        self.checksum = 0;
        self.tick = 0;
        self.utick = 0;
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Highest management tick seen by the last full walk.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn snapshot(&self) -> &[NodeId] {
        &self.snap
    }

    /// Re-filters the units of the snapshot nodes without walking the tree.
    pub fn refresh_from_snapshot(&mut self, map: &mut Map) -> usize {
        map.refresh_search_result(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_keeps_one_reference() {
        let filter = Rc::new(Filter::id(3));
        let mut result = SearchResult::new();
        result.attach(Some(&filter));
        result.attach(Some(&filter));
        assert_eq!(Rc::strong_count(&filter), 2);
        result.detach();
        assert_eq!(Rc::strong_count(&filter), 1);
    }

    #[test]
    fn clean_releases_units() {
        let unit = UnitRef::new(1, 0.0, 0.0);
        let mut result = SearchResult::new();
        result.units.push(unit.clone());
        result.valid = true;
        assert!(result.contains(&unit));
        assert_eq!(unit.ref_count(), 2);

        result.clean();
        assert!(!result.is_valid());
        assert!(result.is_empty());
        assert_eq!(unit.ref_count(), 1);
    }
}
