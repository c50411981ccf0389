use common::shapes::{Pos, Size};

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub name: String,
    pub origin: Pos,
    pub size: Size,
    pub divide: usize,
    pub node_cache_capacity: usize,
    pub unit_cache_capacity: usize,
    /// Account for unit radii when matching and pruning.
    pub radius_aware: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            name: String::from("map"),
            origin: Pos::new(0.0, 0.0),
            size: Size::new(512.0, 512.0),
            divide: 5,
            node_cache_capacity: 4000,
            unit_cache_capacity: 2000,
            radius_aware: true,
        }
    }
}
