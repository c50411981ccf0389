use super::*;
use bitflags::bitflags;
use std::fmt::{self, Write};

bitflags! {
    /// What [`Map::dump`] prints besides the tree shape.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrintOptions: u32 {
        const TICK = 1;
        const UNITS = 1 << 1;
        const MAP = 1 << 2;
        const NODE = Self::TICK.bits() | Self::UNITS.bits();
        const ALL = Self::NODE.bits() | Self::MAP.bits();
    }
}

bitflags! {
    /// Sections of [`Map::state_desc`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapStateFlags: u32 {
        const HEAD = 1;
        const TAIL = 1 << 1;
        const BASIC = 1 << 2;
        const PRECISIONS = 1 << 3;
        const NODE = 1 << 4;
        const UNIT = 1 << 5;
        const ALL = Self::HEAD.bits()
            | Self::TAIL.bits()
            | Self::BASIC.bits()
            | Self::PRECISIONS.bits()
            | Self::NODE.bits()
            | Self::UNIT.bits();
    }
}

/// Human readable tree dump. The layout is for people, not parsers.
pub struct MapDump<'a> {
    map: &'a Map,
    options: PrintOptions,
}

impl fmt::Display for MapDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.map;
        if self.options.contains(PrintOptions::MAP) {
            writeln!(
                f,
                "[{}] origin ({}, {}) size {}x{} divide {}",
                map.name, map.origin.x, map.origin.y, map.size.w, map.size.h, map.divide
            )?;
        }
        self.node(f, map.root, "", "")
    }
}

impl MapDump<'_> {
    fn node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, lead: &str, rest: &str) -> fmt::Result {
        let node = &self.map.nodes[id];
        let code = if node.code.is_empty() {
            String::from("root")
        } else {
            node.code.to_string()
        };
        write!(f, "{lead}{code}")?;
        if self.options.contains(PrintOptions::TICK) {
            write!(f, " tick={} utick={}", node.tick, node.utick)?;
        }
        if !node.state.is_empty() {
            write!(f, " {:?}", node.state)?;
        }
        writeln!(f)?;

        let children: SmallVec<[NodeId; 4]> = node.children().collect();
        if self.options.contains(PrintOptions::UNITS) {
            for (i, unit) in node.units.iter().enumerate() {
                let last = i + 1 == node.units.len() && children.is_empty();
                let unit = unit.borrow();
                writeln!(
                    f,
                    "{rest}{}unit {} ({}, {}) r={} tick={}",
                    if last { "└── " } else { "├── " },
                    unit.id,
                    unit.pos.x,
                    unit.pos.y,
                    unit.radius,
                    unit.tick
                )?;
            }
        }
        for (i, child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let (lead, more) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
            self.node(f, *child, &format!("{rest}{lead}"), &format!("{rest}{more}"))?;
        }
        Ok(())
    }
}

impl Map {
    pub fn dump(&self, options: PrintOptions) -> String {
        MapDump { map: self, options }.to_string()
    }

    pub fn display(&self, options: PrintOptions) -> MapDump<'_> {
        MapDump { map: self, options }
    }

    /// One line per requested section.
    pub fn state_desc(&self, flags: MapStateFlags) -> String {
        let mut out = String::new();
        if flags.contains(MapStateFlags::HEAD) {
            let _ = writeln!(out, "==== map {} ====", self.name);
        }
        if flags.contains(MapStateFlags::BASIC) {
            let _ = writeln!(
                out,
                "origin ({}, {}) size {}x{} divide {} max_radius {} clock {}",
                self.origin.x,
                self.origin.y,
                self.size.w,
                self.size.h,
                self.divide,
                self.max_radius,
                self.clock
            );
        }
        if flags.contains(MapStateFlags::PRECISIONS) {
            let levels: Vec<String> = self
                .node_sizes
                .iter()
                .zip(&self.distances)
                .enumerate()
                .map(|(level, (size, distance))| {
                    format!("{level}:{}x{}/{}", size.w, size.h, distance)
                })
                .collect();
            let _ = writeln!(out, "precisions {}", levels.join(" "));
        }
        if flags.contains(MapStateFlags::NODE) {
            let _ = writeln!(
                out,
                "nodes {} leaves {}",
                self.state.node_count, self.state.leaf_count
            );
        }
        if flags.contains(MapStateFlags::UNIT) {
            let _ = writeln!(out, "units {}", self.state.unit_count);
        }
        if flags.contains(MapStateFlags::TAIL) {
            let _ = writeln!(out, "==== end {} ====", self.name);
        }
        out
    }

    /// Cross-checks every redundant structure of the map. Returns one
    /// message per violation, empty when the map is consistent.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Pre-order traversal gives the expected leaf order.
        let mut expected = Vec::new();
        let mut stack = vec![self.root];
        let mut reached = 0u64;
        let mut units = 0u64;
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                errors.push(format!("dangling child {id:?}"));
                continue;
            };
            reached += 1;
            units += node.units.len() as u64;
            if !node.units.is_empty() {
                expected.push(id);
            }
            self.check_node(id, node, &mut errors);
            stack.extend(node.children.iter().rev().flatten().copied());
        }
        if reached != self.nodes.len() as u64 {
            errors.push(format!(
                "{} nodes reachable from the root, {} allocated",
                reached,
                self.nodes.len()
            ));
        }

        let listed: Vec<NodeId> = self.leaves().map(|(id, _)| id).collect();
        if listed != expected {
            errors.push(format!(
                "leaf list {:?} does not match tree order {:?}",
                listed, expected
            ));
        }
        let mut prev = None;
        for &id in &listed {
            if self.nodes[id].prev != prev {
                errors.push(format!("leaf {id:?} has a stale prev link"));
            }
            prev = Some(id);
        }

        let state = MapState {
            node_count: self.nodes.len() as u64,
            leaf_count: expected.len() as u64,
            unit_count: units,
        };
        if state != self.state {
            errors.push(format!("counters {:?} but found {:?}", self.state, state));
        }
        errors
    }

    fn check_node(&self, id: NodeId, node: &Node, errors: &mut Vec<String>) {
        let code = node.code;
        let mut subtree = node.units.len();
        let mut child_count = 0;
        for (index, child) in node.children.iter().enumerate() {
            let Some(child) = child.and_then(|c| self.nodes.get(c)) else {
                continue;
            };
            child_count += 1;
            subtree += child.subtree_units;
            if child.parent != Some(id) || child.quadrant.index() != index {
                errors.push(format!("{} has a child with a wrong parent link", code));
            }
        }
        if child_count != node.child_count {
            errors.push(format!("{} child count is off", code));
        }
        if subtree != node.subtree_units {
            errors.push(format!(
                "{} counts {} units in its subtree, found {}",
                code, node.subtree_units, subtree
            ));
        }
        if id != self.root && node.is_recyclable() {
            errors.push(format!("{} is empty but was not recycled", code));
        }
        if !node.units.is_empty() && node.level != self.divide {
            errors.push(format!("{} holds units above max depth", code));
        }

        for (slot, unit) in node.units.iter().enumerate() {
            let unit = unit.borrow();
            if unit.node != Some(id) || unit.node_slot != slot {
                errors.push(format!("unit {} has a stale node link", unit.id));
            }
            if !unit.code.starts_with(&code) {
                errors.push(format!("unit {} sits outside {}", unit.id, code));
            }
        }

        for to in &node.neighbors_walkable {
            match self.nodes.get(*to) {
                Some(target) if target.neighbors.contains(&id) => {}
                Some(_) => errors.push(format!("{} -> {:?} has no incoming edge", code, to)),
                None => errors.push(format!("{} links to freed node {:?}", code, to)),
            }
        }
        for from in &node.neighbors {
            match self.nodes.get(*from) {
                Some(source) if source.neighbors_walkable.contains(&id) => {}
                Some(_) => errors.push(format!("{:?} -> {} has no outgoing edge", from, code)),
                None => errors.push(format!("{} is reached from freed node {:?}", code, from)),
            }
        }
    }
}
