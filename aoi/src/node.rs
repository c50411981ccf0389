use crate::code::{Code, Quadrant};
use crate::pool::Resettable;
use crate::unit::UnitRef;
use bitflags::bitflags;
use smallvec::SmallVec;

slotmap::new_key_type! {
    /// Generation checked handle to a quadtree node.
    pub struct NodeId;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeState: u32 {
        /// Briefly set while a search walks the node.
        const SEARCHING = 1 << 5;
        const NO_WALK = 1 << 12;
        const WALKABLE = 1 << 13;
        /// Pinned: never recycled even when empty.
        const STATIC = 1 << 23;
        /// Units may not attach here.
        const NO_UNIT = 1 << 24;
    }
}

pub(crate) type NeighborList = SmallVec<[NodeId; 4]>;

#[derive(Debug, Default)]
pub struct Node {
    pub(crate) level: usize,
    pub(crate) code: Code,
    pub(crate) quadrant: Quadrant,
    // Cell coordinates at this node's level.
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) state: NodeState,
    pub(crate) tick: u64,
    pub(crate) utick: u64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: [Option<NodeId>; 4],
    pub(crate) child_count: usize,
    pub(crate) units: Vec<UnitRef>,
    // Units attached anywhere in this subtree.
    pub(crate) subtree_units: usize,
    // Leaf list threading, in quadrant order.
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    // Nodes that can reach this one.
    pub(crate) neighbors: NeighborList,
    // Nodes this one can reach.
    pub(crate) neighbors_walkable: NeighborList,
}

impl Node {
    pub(crate) fn initialize(
        &mut self,
        parent: Option<NodeId>,
        level: usize,
        code: Code,
        quadrant: Quadrant,
        x: u32,
        y: u32,
    ) {
        self.parent = parent;
        self.level = level;
        self.code = code;
        self.quadrant = quadrant;
        self.x = x;
        self.y = y;
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    /// Slot of this node inside its parent.
    pub fn quadrant(&self) -> Quadrant {
        self.quadrant
    }

    pub fn cell(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Management tick: bumped when units or children come and go.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Update tick: management changes plus unit movement.
    pub fn utick(&self) -> u64 {
        self.utick
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child(&self, quadrant: Quadrant) -> Option<NodeId> {
        self.children[quadrant.index()]
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().flatten().copied()
    }

    pub fn child_count(&self) -> usize {
        self.child_count
    }

    pub fn units(&self) -> &[UnitRef] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn subtree_units(&self) -> usize {
        self.subtree_units
    }

    pub fn is_leaf(&self) -> bool {
        self.child_count == 0
    }

    pub fn prev_leaf(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn next_leaf(&self) -> Option<NodeId> {
        self.next
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn walkable_neighbors(&self) -> &[NodeId] {
        &self.neighbors_walkable
    }

    pub(crate) fn is_recyclable(&self) -> bool {
        self.child_count == 0 && self.units.is_empty() && !self.state.contains(NodeState::STATIC)
    }
}

impl Resettable for Node {
    fn reset(&mut self) {
        self.level = 0;
        self.code = Code::new();
        self.quadrant = Quadrant::A;
        self.x = 0;
        self.y = 0;
        self.state = NodeState::empty();
        self.tick = 0;
        self.utick = 0;
        self.parent = None;
        self.children = [None; 4];
        self.child_count = 0;
        self.units.clear();
        self.subtree_units = 0;
        self.prev = None;
        self.next = None;
        self.neighbors.clear();
        self.neighbors_walkable.clear();
    }
}
