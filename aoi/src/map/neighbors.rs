use super::*;

impl Map {
    /// Adds the directed edge `from -> to`: `to` becomes reachable from
    /// `from`. Adding an existing edge is a no-op.
    pub fn add_neighbor(&mut self, from: NodeId, to: NodeId) -> AoiResult<()> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return Err(AoiError::NodeNotFound);
        }
        self.neighbors_add(from, to);
        Ok(())
    }

    /// Drops the directed edge `from -> to` if present.
    pub fn remove_neighbor(&mut self, from: NodeId, to: NodeId) {
        if let Some(node) = self.nodes.get_mut(from) {
            node.neighbors_walkable.retain(|id| *id != to);
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.neighbors.retain(|id| *id != from);
        }
    }

    pub(crate) fn neighbors_add(&mut self, from: NodeId, to: NodeId) {
        let outgoing = &mut self.nodes[from].neighbors_walkable;
        if outgoing.contains(&to) {
            return;
        }
        outgoing.push(to);
        self.nodes[to].neighbors.push(from);
    }

    /// Removes every edge touching `id`, in both directions.
    pub(crate) fn clean_neighbors(&mut self, id: NodeId) {
        let (incoming, outgoing) = {
            let node = &mut self.nodes[id];
            (
                std::mem::take(&mut node.neighbors),
                std::mem::take(&mut node.neighbors_walkable),
            )
        };
        for from in incoming {
            if let Some(node) = self.nodes.get_mut(from) {
                node.neighbors_walkable.retain(|other| *other != id);
            }
        }
        for to in outgoing {
            if let Some(node) = self.nodes.get_mut(to) {
                node.neighbors.retain(|other| *other != id);
            }
        }
    }

    /// Existing node of the same level next to `id` in `direction`.
    pub fn adjacent_node(&self, id: NodeId, direction: Direction) -> Option<NodeId> {
        let node = self.nodes.get(id)?;
        let mut code = node.code;
        if self.move_code(&mut code, direction) == 0 {
            return None;
        }
        self.get_node(&code, node.level, FindBehavior::Accurate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_directed_and_cleaned_both_ways() {
        let mut map = Map::make(Pos::new(0.0, 0.0), Size::new(64.0, 64.0), 2).unwrap();
        let a = map.pin_node(&map.cell_code(0, 0), 2);
        let b = map.pin_node(&map.cell_code(1, 0), 2);
        let c = map.pin_node(&map.cell_code(2, 0), 2);

        map.add_neighbor(a, b).unwrap();
        map.add_neighbor(a, b).unwrap();
        map.add_neighbor(c, b).unwrap();
        map.add_neighbor(b, c).unwrap();
        assert_eq!(map.node(a).unwrap().walkable_neighbors(), &[b]);
        assert!(map.node(a).unwrap().neighbors().is_empty());
        assert_eq!(map.node(b).unwrap().neighbors(), &[a, c]);

        map.set_node_static(b, false).unwrap();
        assert!(map.node(b).is_none());
        assert!(map.node(a).unwrap().walkable_neighbors().is_empty());
        assert!(map.node(c).unwrap().walkable_neighbors().is_empty());
        assert!(map.node(c).unwrap().neighbors().is_empty());
        assert!(map.check_consistency().is_empty());
    }

    #[test]
    fn adjacent_node_needs_existing_target() {
        let mut map = Map::make(Pos::new(0.0, 0.0), Size::new(64.0, 64.0), 2).unwrap();
        let a = map.pin_node(&map.cell_code(1, 1), 2);
        let b = map.pin_node(&map.cell_code(2, 1), 2);
        assert_eq!(map.adjacent_node(a, Direction::Right), Some(b));
        assert_eq!(map.adjacent_node(b, Direction::Left), Some(a));
        assert_eq!(map.adjacent_node(a, Direction::Up), None);

        let edge = map.pin_node(&map.cell_code(0, 0), 2);
        assert_eq!(map.adjacent_node(edge, Direction::Left), None);
    }
}
