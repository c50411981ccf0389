mod blocks;
mod code;
mod config;
mod dump;
mod neighbors;
mod nodes;
mod search;
mod units;

pub use blocks::BlockState;
pub use config::MapConfig;
pub use dump::{MapDump, MapStateFlags, PrintOptions};
pub use nodes::{FindBehavior, Leaves};
pub use search::NodeListChecksum;

use crate::code::{Code, Direction, Quadrant, MAX_DIVIDE};
use crate::error::{AoiError, AoiResult};
use crate::filter::Filter;
use crate::node::{Node, NodeId, NodeState};
use crate::pool::{ObjectPool, PoolStats};
use crate::refcount::{AutoreleasePool, RefCache};
use crate::search_result::{SearchResult, SearchStats};
use crate::unit::{Unit, UnitId, UnitRef, UnitState};
use common::shapes::{Pos, Real, Rect, Size};
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Aggregate counters kept current by every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapState {
    pub node_count: u64,
    pub leaf_count: u64,
    pub unit_count: u64,
}

/// A quadtree area-of-interest index over a rectangular world.
///
/// Units live in max-depth leaves. Nodes are created on demand as units
/// arrive and go back to the map's node pool once they hold neither units
/// nor children (unless pinned with [`NodeState::STATIC`]).
///
/// A map is single threaded: callers serialize every mutation and search.
pub struct Map {
    name: String,
    origin: Pos,
    size: Size,
    divide: usize,
    // Cell size and squared cell diagonal per level, level 0 is the whole map.
    node_sizes: Vec<Size>,
    distances: Vec<Real>,
    radius_aware: bool,
    max_radius: Real,
    nodes: SlotMap<NodeId, Node>,
    node_pool: ObjectPool<Node>,
    unit_cache: RefCache<RefCell<Unit>>,
    root: NodeId,
    leaf_head: Option<NodeId>,
    state: MapState,
    blocks: Option<Vec<u8>>,
    clock: u64,
    search_stats: SearchStats,
    // Scratch buffers reused across searches.
    search_stack: Vec<NodeId>,
    search_marks: Vec<NodeId>,
}

impl Map {
    pub fn new(config: MapConfig) -> AoiResult<Self> {
        if config.divide == 0 || config.divide > MAX_DIVIDE {
            return Err(AoiError::InvalidDivide {
                divide: config.divide,
                max: MAX_DIVIDE,
            });
        }
        let size = config.size;
        if !(size.w.is_finite() && size.h.is_finite()) || size.w <= 0.0 || size.h <= 0.0 {
            return Err(AoiError::InvalidMapSize {
                w: size.w,
                h: size.h,
            });
        }

        let mut node_sizes = Vec::with_capacity(config.divide + 1);
        let mut distances = Vec::with_capacity(config.divide + 1);
        let mut cell = size;
        for _ in 0..=config.divide {
            node_sizes.push(cell);
            distances.push(cell.w * cell.w + cell.h * cell.h);
            cell = Size::new(cell.w * 0.5, cell.h * 0.5);
        }

        let mut node_pool = ObjectPool::<Node>::with_default("node", config.node_cache_capacity);
        let mut nodes = SlotMap::with_capacity_and_key(config.node_cache_capacity.min(1024));
        let mut root_node = node_pool.poll();
        let mut root_code = Code::new();
        root_code.pos = config.origin;
        root_node.initialize(None, 0, root_code, Quadrant::A, 0, 0);
        let root = nodes.insert(root_node);

        debug!(
            name = %config.name,
            divide = config.divide,
            width = size.w,
            height = size.h,
            "map created"
        );

        Ok(Self {
            name: config.name,
            origin: config.origin,
            size,
            divide: config.divide,
            node_sizes,
            distances,
            radius_aware: config.radius_aware,
            max_radius: 0.0,
            nodes,
            node_pool,
            unit_cache: RefCache::new("unit", config.unit_cache_capacity, || {
                RefCell::new(Unit::default())
            }),
            root,
            leaf_head: None,
            state: MapState {
                node_count: 1,
                leaf_count: 0,
                unit_count: 0,
            },
            blocks: None,
            clock: 0,
            search_stats: SearchStats::default(),
            search_stack: Vec::new(),
            search_marks: Vec::new(),
        })
    }

    /// Map at `origin` spanning `size`, subdivided `divide` times.
    ///
    /// Depths beyond 10 cost a lot of memory for little precision gain.
    pub fn make(origin: Pos, size: Size, divide: usize) -> AoiResult<Self> {
        Self::new(MapConfig {
            origin,
            size,
            divide,
            ..MapConfig::default()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Pos {
        self.origin
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        Rect {
            pos: self.origin,
            size: self.size,
        }
    }

    pub fn divide(&self) -> usize {
        self.divide
    }

    /// Cell size at `level`, level 0 being the whole map.
    pub fn node_size(&self, level: usize) -> Size {
        self.node_sizes[level.min(self.divide)]
    }

    /// Squared cell diagonal per level.
    pub fn precisions(&self) -> &[Real] {
        &self.distances
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    pub fn radius_aware(&self) -> bool {
        self.radius_aware
    }

    /// Largest unit radius seen since the last rescan.
    pub fn max_radius(&self) -> Real {
        self.max_radius
    }

    pub fn search_stats(&self) -> SearchStats {
        self.search_stats
    }

    pub fn take_search_stats(&mut self) -> SearchStats {
        std::mem::take(&mut self.search_stats)
    }

    /// Per-type pool counters.
    pub fn memory_state(&self) -> Vec<(&'static str, PoolStats)> {
        vec![
            (self.node_pool.name(), self.node_pool.stats()),
            (self.unit_cache.name(), self.unit_cache.stats()),
        ]
    }

    /// Drops every idle pooled object.
    pub fn cache_clear(&mut self) {
        self.node_pool.clear();
        self.unit_cache.clear();
    }

    pub(crate) fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Current value of the map's logical clock.
    pub fn clock(&self) -> u64 {
        self.clock
    }
}

impl Drop for Map {
    fn drop(&mut self) {
        // Units may outlive the map through other handles; detach them.
        for (_, node) in self.nodes.iter_mut() {
            for unit in node.units.drain(..) {
                let mut unit = unit.borrow_mut();
                unit.node = None;
                unit.node_slot = 0;
            }
        }
        debug!(
            name = %self.name,
            nodes = self.state.node_count,
            units = self.state.unit_count,
            "map freed"
        );
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("divide", &self.divide)
            .field("state", &self.state)
            .field("max_radius", &self.max_radius)
            .finish()
    }
}
