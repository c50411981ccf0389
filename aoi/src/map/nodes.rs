use super::*;

/// How [`Map::get_node`] treats a missing node on the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindBehavior {
    /// Only the node at exactly the requested level.
    Accurate,
    /// The deepest existing node on the path.
    Fuzzy,
}

impl Map {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Walks `code` from the root down to `level`.
    pub fn get_node(&self, code: &Code, level: usize, find: FindBehavior) -> Option<NodeId> {
        let level = level.min(code.len()).min(self.divide);
        let mut id = self.root;
        for depth in 0..level {
            match self.nodes[id].children[code.quadrant(depth).index()] {
                Some(child) => id = child,
                None => {
                    return match find {
                        FindBehavior::Accurate => None,
                        FindBehavior::Fuzzy => Some(id),
                    }
                }
            }
        }
        Some(id)
    }

    /// Ancestor of `id` sitting at `level`.
    pub(crate) fn ancestor_at(&self, mut id: NodeId, level: usize) -> NodeId {
        while self.nodes[id].level > level {
            match self.nodes[id].parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        id
    }

    pub(crate) fn child_or_alloc(&mut self, parent: NodeId, quadrant: Quadrant) -> NodeId {
        if let Some(child) = self.nodes[parent].children[quadrant.index()] {
            return child;
        }
        self.alloc_node(parent, quadrant)
    }

    fn alloc_node(&mut self, parent: NodeId, quadrant: Quadrant) -> NodeId {
        let (level, mut code, x, y) = {
            let p = &self.nodes[parent];
            let mut code = p.code;
            code.push(quadrant);
            (
                p.level + 1,
                code,
                p.x * 2 + quadrant.x_high() as u32,
                p.y * 2 + quadrant.y_high() as u32,
            )
        };
        code.pos = self.gen_pos(&code);

        let mut node = self.node_pool.poll();
        node.initialize(Some(parent), level, code, quadrant, x, y);
        if level == self.divide && self.blocks.is_some() {
            node.state.insert(self.block_state_at(x, y).node_state());
        }
        let tick = self.clock;
        node.tick = tick;
        node.utick = tick;

        let id = self.nodes.insert(node);
        let p = &mut self.nodes[parent];
        p.children[quadrant.index()] = Some(id);
        p.child_count += 1;
        self.state.node_count += 1;
        trace!(code = %code, level, "node created");
        id
    }

    fn release_node(&mut self, id: NodeId) {
        debug_assert!(id != self.root, "the root is never recycled");
        debug_assert!(self.nodes[id].is_recyclable(), "recycling a busy node");
        self.clean_neighbors(id);
        if let Some(node) = self.nodes.remove(id) {
            if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(p)) {
                parent.children[node.quadrant.index()] = None;
                parent.child_count -= 1;
            }
            trace!(code = %node.code, level = node.level, "node recycled");
            self.node_pool.push(node);
            self.state.node_count -= 1;
        }
    }

    /// Recycles `id` and then its ancestors while they are empty, stopping at
    /// `stop` (kept even if empty) or the root.
    pub(crate) fn recycle_upward(&mut self, mut id: NodeId, stop: Option<NodeId>) {
        while id != self.root && Some(id) != stop {
            let node = &self.nodes[id];
            if !node.is_recyclable() {
                break;
            }
            let parent = node.parent;
            self.release_node(id);
            match parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
    }

    /// Stamps `tick` on `id` and every ancestor and adjusts their subtree
    /// unit counters. Management ticks move only on structural changes.
    pub(crate) fn propagate(&mut self, id: NodeId, tick: u64, structural: bool, units: isize) {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &mut self.nodes[current];
            node.utick = tick;
            if structural {
                node.tick = tick;
            }
            node.subtree_units = node.subtree_units.wrapping_add_signed(units);
            cursor = node.parent;
        }
    }

    /// Pins or unpins a node. An unpinned empty node is recycled right away.
    pub fn set_node_static(&mut self, id: NodeId, pinned: bool) -> AoiResult<()> {
        let node = self.nodes.get_mut(id).ok_or(AoiError::NodeNotFound)?;
        node.state.set(NodeState::STATIC, pinned);
        if !pinned {
            let tick = self.next_tick();
            if let Some(parent) = self.nodes[id].parent {
                self.propagate(parent, tick, true, 0);
            }
            self.recycle_upward(id, None);
        }
        Ok(())
    }

    /// Allows or forbids units on a node. Units already there stay.
    pub fn set_node_no_unit(&mut self, id: NodeId, no_unit: bool) -> AoiResult<()> {
        let node = self.nodes.get_mut(id).ok_or(AoiError::NodeNotFound)?;
        node.state.set(NodeState::NO_UNIT, no_unit);
        Ok(())
    }

    /// Materializes the node for `code` at `level` and pins it.
    pub fn pin_node(&mut self, code: &Code, level: usize) -> NodeId {
        let level = level.min(code.len()).min(self.divide);
        let mut id = self.root;
        for depth in 0..level {
            id = self.child_or_alloc(id, code.quadrant(depth));
        }
        self.nodes[id].state.insert(NodeState::STATIC);
        let tick = self.next_tick();
        self.propagate(id, tick, true, 0);
        id
    }

    /// Builds every node down to max depth, pins them, and links each
    /// walkable max-depth cell to its walkable 4-neighbors.
    ///
    /// Creates `(4^(divide+1) - 1) / 3` nodes, keep `divide` small.
    pub fn generate(&mut self) {
        let mut stack: SmallVec<[NodeId; 64]> = SmallVec::new();
        let mut cells: Vec<NodeId> = Vec::new();
        stack.push(self.root);
        while let Some(id) = stack.pop() {
            self.nodes[id].state.insert(NodeState::STATIC);
            if self.nodes[id].level == self.divide {
                cells.push(id);
                continue;
            }
            for q in Quadrant::ALL {
                stack.push(self.child_or_alloc(id, q));
            }
        }

        for &id in &cells {
            if self.nodes[id].state.contains(NodeState::NO_WALK) {
                continue;
            }
            for direction in Direction::ALL {
                if let Some(to) = self.adjacent_node(id, direction) {
                    if !self.nodes[to].state.contains(NodeState::NO_WALK) {
                        self.neighbors_add(id, to);
                    }
                }
            }
        }

        let tick = self.next_tick();
        for id in cells {
            self.propagate(id, tick, true, 0);
        }
        debug!(name = %self.name, nodes = self.state.node_count, "static grid generated");
    }

    pub(crate) fn last_leaf_in(&self, id: NodeId) -> Option<NodeId> {
        let node = &self.nodes[id];
        if node.subtree_units == 0 {
            return None;
        }
        for child in node.children.iter().rev().flatten() {
            if let Some(found) = self.last_leaf_in(*child) {
                return Some(found);
            }
        }
        if node.units.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    // Nearest occupied node before `id` in pre-order quadrant traversal.
    fn leaf_predecessor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            let index = self.nodes[current].quadrant.index();
            let siblings = &self.nodes[parent].children[..index];
            for sibling in siblings.iter().rev().flatten() {
                if let Some(found) = self.last_leaf_in(*sibling) {
                    return Some(found);
                }
            }
            if !self.nodes[parent].units.is_empty() {
                return Some(parent);
            }
            current = parent;
        }
        None
    }

    pub(crate) fn leaf_link(&mut self, id: NodeId) {
        debug_assert!(self.nodes[id].prev.is_none() && self.nodes[id].next.is_none());
        let prev = self.leaf_predecessor(id);
        let next = match prev {
            Some(p) => self.nodes[p].next,
            None => self.leaf_head,
        };
        {
            let node = &mut self.nodes[id];
            node.prev = prev;
            node.next = next;
        }
        match prev {
            Some(p) => self.nodes[p].next = Some(id),
            None => self.leaf_head = Some(id),
        }
        if let Some(n) = next {
            self.nodes[n].prev = Some(id);
        }
        self.state.leaf_count += 1;
    }

    pub(crate) fn leaf_unlink(&mut self, id: NodeId) {
        let (prev, next) = {
            let node = &mut self.nodes[id];
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.leaf_head = next,
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        self.state.leaf_count -= 1;
    }

    pub fn first_leaf(&self) -> Option<NodeId> {
        self.leaf_head
    }

    /// Occupied leaves in quadrant order.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            map: self,
            cursor: self.leaf_head,
        }
    }
}

pub struct Leaves<'a> {
    map: &'a Map,
    cursor: Option<NodeId>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = &self.map.nodes[id];
        self.cursor = node.next;
        Some((id, node))
    }
}
