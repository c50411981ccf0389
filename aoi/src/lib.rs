pub mod code;
pub mod error;
pub mod filter;
pub mod map;
pub mod node;
pub mod pool;
pub mod refcount;
pub mod search_result;
pub mod unit;

pub use code::{Code, Direction, Quadrant, MAX_DIVIDE};
pub use common::shapes;
pub use error::{AoiError, AoiResult};
pub use filter::{Filter, FilterBehavior, FilterKind};
pub use map::{BlockState, FindBehavior, Map, MapConfig, MapState, PrintOptions};
pub use node::{Node, NodeId, NodeState};
pub use search_result::{SearchResult, SearchStats};
pub use unit::{Unit, UnitId, UnitRef, UnitState, UserData};
