use super::*;

impl Map {
    /// Builds a unit from the map's unit cache.
    pub fn make_unit(&mut self, id: UnitId, x: Real, y: Real) -> UnitRef {
        self.make_unit_with_radius(id, x, y, 0.0)
    }

    pub fn make_unit_with_radius(&mut self, id: UnitId, x: Real, y: Real, radius: Real) -> UnitRef {
        let rc = self.unit_cache.poll();
        {
            let mut unit = rc.borrow_mut();
            unit.id = id;
            unit.pos = Pos::new(x, y);
            unit.radius = radius;
        }
        UnitRef::from_rc(rc)
    }

    /// Detaches `unit` if needed and hands it back to the unit cache.
    ///
    /// The unit is only recycled when `unit` was its last handle.
    pub fn free_unit(&mut self, unit: UnitRef) {
        if let Some(node) = unit.node() {
            self.detach(node, &unit, None);
        }
        self.unit_cache.push(unit.into_rc());
    }

    /// Attaches `unit` to the max-depth leaf covering its position.
    pub fn add_unit(&mut self, unit: &UnitRef) -> AoiResult<()> {
        if unit.is_attached() {
            return Err(AoiError::UnitAlreadyAttached { id: unit.id() });
        }
        let code = self.gen_code(&unit.pos()).map_err(|err| {
            warn!(id = unit.id(), error = %err, "unit rejected");
            err
        })?;
        self.check_accepts_units(&code)?;
        self.attach_from(self.root, unit, code);
        self.raise_radius_hint(unit.radius());
        Ok(())
    }

    /// Detaches `unit` from its leaf, recycling nodes left empty.
    pub fn remove_unit(&mut self, unit: &UnitRef) -> AoiResult<()> {
        let node = unit
            .node()
            .ok_or(AoiError::UnitNotAttached { id: unit.id() })?;
        self.detach(node, unit, None);
        Ok(())
    }

    /// Relocates `unit` after its position changed.
    ///
    /// A unit staying in its cell only bumps the update tick of its branch.
    /// A unit flagged [`UnitState::DEAD`] is removed instead.
    pub fn update_unit(&mut self, unit: &UnitRef) -> AoiResult<()> {
        let node = unit
            .node()
            .ok_or(AoiError::UnitNotAttached { id: unit.id() })?;
        if unit.state().contains(UnitState::DEAD) {
            self.detach(node, unit, None);
            return Ok(());
        }

        let pos = unit.pos();
        let code = self.gen_code(&pos).map_err(|err| {
            warn!(id = unit.id(), error = %err, "unit update rejected");
            err
        })?;
        let previous = unit.code();
        if code == previous {
            let tick = self.next_tick();
            self.propagate(node, tick, false, 0);
            let mut inner = unit.borrow_mut();
            inner.tick = tick;
            inner.code.pos = pos;
            return Ok(());
        }

        self.check_accepts_units(&code)?;
        let ancestor = self.ancestor_at(node, code.common_prefix_len(&previous));
        // Keep the unit alive across the move even if the leaf held the last
        // external reference.
        let held = unit.clone();
        self.detach(node, &held, Some(ancestor));
        self.attach_from(ancestor, &held, code);
        Ok(())
    }

    /// Sets the position of `unit` and relocates it.
    pub fn move_unit(&mut self, unit: &UnitRef, pos: Pos) -> AoiResult<()> {
        let previous = unit.pos();
        unit.set_pos(pos);
        let moved = self.update_unit(unit);
        if moved.is_err() {
            unit.set_pos(previous);
        }
        moved
    }

    /// Publishes a radius change: raises the max radius hint and bumps the
    /// update tick of the unit's branch so cached searches re-filter it.
    ///
    /// The hint only grows; see [`Map::rescan_max_radius`].
    pub fn refresh_unit(&mut self, unit: &UnitRef) {
        self.raise_radius_hint(unit.radius());
        if let Some(node) = unit.node() {
            let tick = self.next_tick();
            self.propagate(node, tick, false, 0);
            unit.borrow_mut().tick = tick;
        }
    }

    fn raise_radius_hint(&mut self, radius: Real) {
        if self.radius_aware && radius > self.max_radius {
            self.max_radius = radius;
        }
    }

    /// Recomputes the max radius hint from every attached unit.
    pub fn rescan_max_radius(&mut self) -> Real {
        let max = self
            .leaves()
            .flat_map(|(_, node)| node.units.iter())
            .map(|unit| unit.radius())
            .fold(0.0, Real::max);
        self.max_radius = if self.radius_aware { max } else { 0.0 };
        self.max_radius
    }

    fn check_accepts_units(&self, code: &Code) -> AoiResult<()> {
        match self.get_node(code, self.divide, FindBehavior::Accurate) {
            Some(id) if self.nodes[id].state.contains(NodeState::NO_UNIT) => {
                Err(AoiError::NodeRejectsUnits)
            }
            _ => Ok(()),
        }
    }

    // Descends from `start` along `code` and attaches at max depth.
    fn attach_from(&mut self, start: NodeId, unit: &UnitRef, code: Code) {
        let mut id = start;
        for level in self.nodes[start].level..self.divide {
            id = self.child_or_alloc(id, code.quadrant(level));
        }

        let tick = self.next_tick();
        let first = {
            let node = &mut self.nodes[id];
            let mut inner = unit.borrow_mut();
            inner.node = Some(id);
            inner.node_slot = node.units.len();
            inner.code = code;
            inner.tick = tick;
            node.units.push(unit.clone());
            node.units.len() == 1
        };
        if first {
            self.leaf_link(id);
        }
        self.propagate(id, tick, true, 1);
        self.state.unit_count += 1;
    }

    // Detaches `unit` from `node` and recycles empty nodes up to `stop`.
    fn detach(&mut self, node: NodeId, unit: &UnitRef, stop: Option<NodeId>) {
        let slot = unit.borrow().node_slot;
        let empty = {
            let units = &mut self.nodes[node].units;
            debug_assert!(
                units.get(slot).is_some_and(|held| held.ptr_eq(unit)),
                "unit slot out of sync with its leaf"
            );
            units.swap_remove(slot);
            if let Some(moved) = units.get(slot) {
                moved.borrow_mut().node_slot = slot;
            }
            units.is_empty()
        };
        {
            let mut inner = unit.borrow_mut();
            inner.node = None;
            inner.node_slot = 0;
        }
        if empty {
            self.leaf_unlink(node);
        }
        let tick = self.next_tick();
        self.propagate(node, tick, true, -1);
        self.state.unit_count -= 1;
        self.recycle_upward(node, stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> Map {
        Map::make(Pos::new(0.0, 0.0), Size::new(512.0, 512.0), 4).unwrap()
    }

    #[test]
    fn add_builds_branch_and_remove_recycles_it() {
        let mut map = map();
        let unit = UnitRef::new(7, 100.0, 100.0);
        map.add_unit(&unit).unwrap();
        assert_eq!(map.state().unit_count, 1);
        assert_eq!(map.state().node_count, 5);
        assert_eq!(map.state().leaf_count, 1);
        assert!(unit.is_attached());
        assert_eq!(unit.ref_count(), 2);

        assert_eq!(
            map.add_unit(&unit),
            Err(AoiError::UnitAlreadyAttached { id: 7 })
        );

        map.remove_unit(&unit).unwrap();
        assert_eq!(map.state(), MapState { node_count: 1, leaf_count: 0, unit_count: 0 });
        assert!(!unit.is_attached());
        assert_eq!(unit.ref_count(), 1);
        assert_eq!(map.remove_unit(&unit), Err(AoiError::UnitNotAttached { id: 7 }));
    }

    #[test]
    fn out_of_bounds_add_changes_nothing() {
        let mut map = map();
        let unit = UnitRef::new(1, -1.0, 10.0);
        assert!(matches!(map.add_unit(&unit), Err(AoiError::OutOfBounds { .. })));
        assert_eq!(map.state().node_count, 1);
        assert!(!unit.is_attached());
    }

    #[test]
    fn update_within_cell_only_bumps_update_tick() {
        let mut map = map();
        let unit = UnitRef::new(1, 10.0, 10.0);
        map.add_unit(&unit).unwrap();
        let leaf = unit.node().unwrap();
        let tick = map.node(leaf).unwrap().tick();

        unit.set_pos(Pos::new(12.0, 11.0));
        map.update_unit(&unit).unwrap();
        assert_eq!(unit.node(), Some(leaf));
        let node = map.node(leaf).unwrap();
        assert_eq!(node.tick(), tick);
        assert!(node.utick() > tick);
        assert_eq!(map.node(map.root()).unwrap().utick(), node.utick());
    }

    #[test]
    fn update_across_cells_keeps_shared_ancestor() {
        let mut map = map();
        let unit = UnitRef::new(1, 10.0, 10.0);
        let other = UnitRef::new(2, 40.0, 40.0);
        map.add_unit(&unit).unwrap();
        map.add_unit(&other).unwrap();

        map.move_unit(&unit, Pos::new(500.0, 490.0)).unwrap();
        assert_eq!(unit.code().to_string(), "DDDD");
        assert_eq!(map.state().unit_count, 2);
        assert_eq!(map.state().leaf_count, 2);
        assert!(map.check_consistency().is_empty());

        let before = unit.pos();
        assert!(map.move_unit(&unit, Pos::new(600.0, 10.0)).is_err());
        assert_eq!(unit.pos(), before);
        assert_eq!(unit.code().to_string(), "DDDD");
    }

    #[test]
    fn dead_units_leave_on_update() {
        let mut map = map();
        let unit = UnitRef::new(1, 10.0, 10.0);
        map.add_unit(&unit).unwrap();
        unit.insert_state(UnitState::DEAD);
        map.update_unit(&unit).unwrap();
        assert!(!unit.is_attached());
        assert_eq!(map.state().unit_count, 0);
    }

    #[test]
    fn no_unit_leaf_rejects_adds() {
        let mut map = map();
        let code = map.gen_code(&Pos::new(10.0, 10.0)).unwrap();
        let leaf = map.pin_node(&code, 4);
        map.set_node_no_unit(leaf, true).unwrap();
        let before = map.state();

        let unit = UnitRef::new(1, 10.0, 10.0);
        assert_eq!(map.add_unit(&unit), Err(AoiError::NodeRejectsUnits));
        assert_eq!(map.state(), before);
    }

    #[test]
    fn swap_remove_keeps_slots_in_sync() {
        let mut map = map();
        let units: Vec<UnitRef> = (0..4).map(|i| UnitRef::new(i, 10.0, 10.0)).collect();
        for unit in &units {
            map.add_unit(unit).unwrap();
        }
        map.remove_unit(&units[0]).unwrap();
        map.remove_unit(&units[2]).unwrap();
        assert!(map.check_consistency().is_empty());
        let leaf = units[1].node().unwrap();
        assert_eq!(map.node(leaf).unwrap().unit_count(), 2);
    }

    #[test]
    fn radius_hint_grows_until_rescan() {
        let mut map = map();
        let big = UnitRef::with_radius(1, 10.0, 10.0, 30.0);
        let small = UnitRef::with_radius(2, 100.0, 10.0, 4.0);
        map.add_unit(&big).unwrap();
        map.add_unit(&small).unwrap();
        assert_eq!(map.max_radius(), 30.0);

        big.set_radius(2.0);
        map.refresh_unit(&big);
        assert_eq!(map.max_radius(), 30.0);
        assert_eq!(map.rescan_max_radius(), 4.0);
    }

    #[test]
    fn pooled_units_are_recycled() {
        let mut map = map();
        let unit = map.make_unit(3, 20.0, 20.0);
        unit.set_name("scout");
        map.add_unit(&unit).unwrap();
        map.free_unit(unit);
        assert_eq!(map.state().unit_count, 0);

        let again = map.make_unit(4, 30.0, 30.0);
        assert_eq!(again.name(), "");
        assert_eq!(again.id(), 4);
        let (_, stats) = map.memory_state()[1];
        assert_eq!(stats.alloced, 1);
    }
}
