use super::*;
use fxhash::FxHasher64;
use std::hash::{Hash, Hasher};

/// Fingerprint of a node list plus the newest ticks found in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeListChecksum {
    pub checksum: u64,
    pub max_tick: u64,
    pub max_utick: u64,
}

// Hashed in place of a node that no longer exists.
const MISSING_NODE: u64 = u64::MAX;

impl Map {
    /// Units intersecting `rect` that also pass `filter`.
    pub fn search_from_rect(
        &mut self,
        rect: &Rect,
        result: &mut SearchResult,
        filter: Option<Rc<Filter>>,
    ) -> usize {
        let mut composite = Filter::rect(*rect);
        if let Some(filter) = filter {
            composite.add(filter);
        }
        self.search_region(*rect, composite, result)
    }

    /// Units within `range` of `pos`.
    pub fn search_from_pos(&mut self, pos: &Pos, result: &mut SearchResult, range: Real) -> usize {
        let bounds = Rect::from_center(pos, range, range);
        self.search_region(bounds, Filter::circle(*pos, range), result)
    }

    /// Units within `range` of `unit`, leaving `unit` itself out.
    pub fn search_from_unit(
        &mut self,
        unit: &UnitRef,
        result: &mut SearchResult,
        range: Real,
    ) -> usize {
        let pos = unit.pos();
        let bounds = Rect::from_center(&pos, range, range);
        let mut filter = Filter::circle(pos, range);
        filter.add(Rc::new(Filter::exclude_id(unit.id())));
        self.search_region(bounds, filter, result)
    }

    fn search_region(&mut self, bounds: Rect, filter: Filter, result: &mut SearchResult) -> usize {
        let mut pool = AutoreleasePool::begin();
        let filter = pool.autorelease(Rc::new(filter));
        result.attach(Some(&filter));

        let margin = if self.radius_aware { self.max_radius } else { 0.0 };
        let innodes = self.search_collect_node(&bounds.expand(margin));
        let count = match self.search_common_parent(&innodes) {
            Some(start) => self.search_from_node(start, result, &innodes),
            None => {
                result.clean();
                0
            }
        };
        pool.end();
        count
    }

    /// Up to four nodes that together cover `rect`, as deep as the tree
    /// currently goes.
    pub fn search_collect_node(&self, rect: &Rect) -> SmallVec<[NodeId; 4]> {
        let mut found = SmallVec::new();
        let bounds = self.bounds();
        if !bounds.intersects(rect) {
            return found;
        }
        let left = rect.left().max(bounds.left());
        let bottom = rect.bottom().max(bounds.bottom());
        let right = rect.right().min(bounds.right());
        let top = rect.top().min(bounds.top());

        // Deepest level whose cell is at least as large as the rect, so the
        // rect spans at most 2x2 cells there.
        let level = (0..=self.divide)
            .rev()
            .find(|&level| {
                let cell = self.node_sizes[level];
                cell.w >= right - left && cell.h >= top - bottom
            })
            .unwrap_or(0);

        for corner in [
            Pos::new(left, bottom),
            Pos::new(right, bottom),
            Pos::new(left, top),
            Pos::new(right, top),
        ] {
            let Ok(code) = self.gen_code(&corner) else {
                continue;
            };
            if let Some(id) = self.get_node(&code, level, FindBehavior::Fuzzy) {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Lowest node having every node of `nodes` in its subtree.
    pub fn search_common_parent(&self, nodes: &[NodeId]) -> Option<NodeId> {
        let (&first, rest) = nodes.split_first()?;
        if !self.nodes.contains_key(first) {
            return None;
        }
        let mut common = first;
        for &id in rest {
            if !self.nodes.contains_key(id) {
                return None;
            }
            let level = self.nodes[common].level.min(self.nodes[id].level);
            let mut a = self.ancestor_at(common, level);
            let mut b = self.ancestor_at(id, level);
            while a != b {
                match (self.nodes[a].parent, self.nodes[b].parent) {
                    (Some(pa), Some(pb)) => {
                        a = pa;
                        b = pb;
                    }
                    _ => return Some(self.root),
                }
            }
            common = a;
        }
        Some(common)
    }

    pub fn checksum_node_list(&self, nodes: &[NodeId]) -> NodeListChecksum {
        let mut hasher = FxHasher64::default();
        let mut sum = NodeListChecksum::default();
        for &id in nodes {
            match self.nodes.get(id) {
                Some(node) => {
                    id.hash(&mut hasher);
                    node.level.hash(&mut hasher);
                    node.tick.hash(&mut hasher);
                    sum.max_tick = sum.max_tick.max(node.tick);
                    sum.max_utick = sum.max_utick.max(node.utick);
                }
                None => MISSING_NODE.hash(&mut hasher),
            }
        }
        sum.checksum = hasher.finish();
        sum
    }

    /// Runs the result's filter over the subtree of `node`.
    ///
    /// `innodes` are the nodes whose ticks decide whether the previous
    /// answer still holds; an empty slice means `node` alone. A result whose
    /// checksum still matches is reused as is, or re-filtered from its
    /// snapshot when units only moved within their cells.
    pub fn search_from_node(
        &mut self,
        node: NodeId,
        result: &mut SearchResult,
        innodes: &[NodeId],
    ) -> usize {
        self.search_stats.searches += 1;
        if !self.nodes.contains_key(node) {
            result.clean();
            return 0;
        }
        let innodes = if innodes.is_empty() {
            std::slice::from_ref(&node)
        } else {
            innodes
        };

        let filter = result.filter.clone();
        let filter_sum = match &filter {
            Some(filter) => filter.checksum(self),
            None => Filter::all().checksum(self),
        };
        let nodes_sum = self.checksum_node_list(innodes);
        let mut hasher = FxHasher64::default();
        filter_sum.hash(&mut hasher);
        nodes_sum.checksum.hash(&mut hasher);
        node.hash(&mut hasher);
        self.max_radius.to_bits().hash(&mut hasher);
        let checksum = hasher.finish();

        if result.valid && result.checksum == checksum {
            if nodes_sum.max_utick > result.utick {
                self.search_stats.snapshot_refreshes += 1;
                self.refresh_search_result(result);
            } else {
                self.search_stats.cache_hits += 1;
                trace!(checksum, units = result.units.len(), "search served from cache");
            }
            return result.units.len();
        }

        self.search_stats.full_walks += 1;
        self.search_walk(node, result, filter.as_deref());
        result.checksum = checksum;
        result.tick = nodes_sum.max_tick;
        result.utick = nodes_sum.max_utick;
        result.innodes.clear();
        result.innodes.extend_from_slice(innodes);
        result.valid = true;
        debug!(
            checksum,
            units = result.units.len(),
            nodes = result.snap.len(),
            "search walked"
        );
        result.units.len()
    }

    // Depth first walk in quadrant order, so matches come out in leaf order.
    fn search_walk(&mut self, start: NodeId, result: &mut SearchResult, filter: Option<&Filter>) {
        let margin = if self.radius_aware { self.max_radius } else { 0.0 };
        result.units.clear();
        result.snap.clear();

        let mut stack = std::mem::take(&mut self.search_stack);
        let mut marked = std::mem::take(&mut self.search_marks);
        stack.clear();
        marked.clear();
        stack.push(start);

        let mut node_visits = 0;
        let mut unit_visits = 0;
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.state.contains(NodeState::SEARCHING) {
                continue;
            }
            node_visits += 1;
            if let Some(filter) = filter {
                if !filter.node_may_match(&self.node_rect_of(node), &node.code, margin) {
                    continue;
                }
            }
            if !node.units.is_empty() {
                result.snap.push(id);
                unit_visits += collect_units(&node.units, filter, self.radius_aware, &mut result.units);
            }
            stack.extend(node.children.iter().rev().flatten().copied());
            self.nodes[id].state.insert(NodeState::SEARCHING);
            marked.push(id);
        }

        for &id in &marked {
            self.nodes[id].state.remove(NodeState::SEARCHING);
        }
        for unit in &result.units {
            unit.borrow_mut().state.remove(UnitState::SEARCHING);
        }
        self.search_stack = stack;
        self.search_marks = marked;
        self.search_stats.node_visits += node_visits;
        self.search_stats.unit_visits += unit_visits;
    }

    /// Rebuilds `result` from the units of its snapshot nodes and marks it
    /// current against the update ticks of its covering nodes.
    pub fn refresh_search_result(&mut self, result: &mut SearchResult) -> usize {
        let filter = result.filter.clone();
        result.units.clear();
        let mut unit_visits = 0;
        for &id in &result.snap {
            if let Some(node) = self.nodes.get(id) {
                unit_visits += collect_units(
                    &node.units,
                    filter.as_deref(),
                    self.radius_aware,
                    &mut result.units,
                );
            }
        }
        for unit in &result.units {
            unit.borrow_mut().state.remove(UnitState::SEARCHING);
        }
        self.search_stats.unit_visits += unit_visits;
        if !result.innodes.is_empty() {
            result.utick = self.checksum_node_list(&result.innodes).max_utick;
        }
        result.units.len()
    }
}

// Appends the matching units of one node, tagging each so a unit reached
// twice is only listed once. Returns how many units were examined.
fn collect_units(
    units: &[UnitRef],
    filter: Option<&Filter>,
    radius_aware: bool,
    out: &mut Vec<UnitRef>,
) -> u64 {
    for unit in units {
        let hit = {
            let inner = unit.borrow();
            !inner.state.contains(UnitState::SEARCHING)
                && filter.map_or(true, |f| f.matches(radius_aware, &inner))
        };
        if hit {
            unit.borrow_mut().state.insert(UnitState::SEARCHING);
            out.push(unit.clone());
        }
    }
    units.len() as u64
}
