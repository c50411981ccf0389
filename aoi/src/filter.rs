use crate::code::Code;
use crate::map::Map;
use crate::unit::{Unit, UnitId};
use bitflags::bitflags;
use common::shapes::{Circle, Pos, Real, Rect, Shape};
use fxhash::FxHasher64;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FilterBehavior: u32 {
        /// The filter can reject whole nodes, not just units.
        const CHOOSE_RANGE_NODE = 1;
    }
}

pub type UnitPredicate = Rc<dyn Fn(&Unit) -> bool>;

#[derive(Clone)]
pub enum FilterKind {
    /// Passes everything; used for pure composites.
    All,
    Circle(Circle),
    Rect(Rect),
    /// Units whose code starts with the given prefix.
    Code(Code),
    Id(UnitId),
    ExcludeId(UnitId),
    Custom(UnitPredicate),
}

/// A unit predicate, optionally AND-ed with a list of sub filters.
///
/// Filters are shared through `Rc` so that a composite and any number of
/// search results can hold the same one.
#[derive(Clone)]
pub struct Filter {
    kind: FilterKind,
    list: Vec<Rc<Filter>>,
    behavior: FilterBehavior,
}

impl Filter {
    pub fn new(kind: FilterKind) -> Self {
        let behavior = match kind {
            FilterKind::Circle(_) | FilterKind::Rect(_) | FilterKind::Code(_) => {
                FilterBehavior::CHOOSE_RANGE_NODE
            }
            _ => FilterBehavior::empty(),
        };
        Self {
            kind,
            list: Vec::new(),
            behavior,
        }
    }

    /// An empty composite.
    pub fn all() -> Self {
        Self::new(FilterKind::All)
    }

    pub fn circle(pos: Pos, range: Real) -> Self {
        Self::new(FilterKind::Circle(Circle { pos, radius: range }))
    }

    pub fn rect(rect: Rect) -> Self {
        Self::new(FilterKind::Rect(rect))
    }

    pub fn code(code: Code) -> Self {
        Self::new(FilterKind::Code(code))
    }

    pub fn id(id: UnitId) -> Self {
        Self::new(FilterKind::Id(id))
    }

    pub fn exclude_id(id: UnitId) -> Self {
        Self::new(FilterKind::ExcludeId(id))
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Unit) -> bool + 'static,
    {
        Self::new(FilterKind::Custom(Rc::new(predicate)))
    }

    pub fn with_behavior(mut self, behavior: FilterBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn behavior(&self) -> FilterBehavior {
        self.behavior
    }

    pub fn list(&self) -> &[Rc<Filter>] {
        &self.list
    }

    pub fn add(&mut self, filter: Rc<Filter>) {
        self.list.push(filter);
    }

    /// Removes `filter` (by identity). Returns whether it was present.
    pub fn remove(&mut self, filter: &Rc<Filter>) -> bool {
        let before = self.list.len();
        self.list.retain(|f| !Rc::ptr_eq(f, filter));
        self.list.len() != before
    }

    pub fn clean(&mut self) {
        self.list.clear();
    }

    /// Tests `unit` against this filter and its whole list.
    pub fn run(&self, map: &Map, unit: &Unit) -> bool {
        self.matches(map.radius_aware(), unit)
    }

    pub(crate) fn matches(&self, radius_aware: bool, unit: &Unit) -> bool {
        let pass = match &self.kind {
            FilterKind::All => true,
            FilterKind::Circle(circle) => {
                if radius_aware {
                    circle.intersects(&unit.circle())
                } else {
                    circle.contains_point(&unit.pos)
                }
            }
            FilterKind::Rect(rect) => {
                if radius_aware {
                    rect.intersects_circle(&unit.circle())
                } else {
                    rect.contains_point(&unit.pos)
                }
            }
            FilterKind::Code(code) => unit.code.starts_with(code),
            FilterKind::Id(id) => unit.id == *id,
            FilterKind::ExcludeId(id) => unit.id != *id,
            FilterKind::Custom(predicate) => predicate(unit),
        };
        pass && self.list.iter().all(|f| f.matches(radius_aware, unit))
    }

    /// False only when no unit inside `rect` (a node cell grown by `margin`)
    /// can pass. Filters without `CHOOSE_RANGE_NODE` never prune.
    pub(crate) fn node_may_match(&self, rect: &Rect, code: &Code, margin: Real) -> bool {
        if self.behavior.contains(FilterBehavior::CHOOSE_RANGE_NODE) {
            let pass = match &self.kind {
                FilterKind::Circle(circle) => rect.expand(margin).intersects_circle(circle),
                FilterKind::Rect(region) => rect.expand(margin).intersects(region),
                FilterKind::Code(prefix) => code.starts_with(prefix) || prefix.starts_with(code),
                _ => true,
            };
            if !pass {
                return false;
            }
        }
        self.list.iter().all(|f| f.node_may_match(rect, code, margin))
    }

    /// Bounding box of the geometric constraints, if any.
    pub fn region(&self) -> Option<Rect> {
        let own = match &self.kind {
            FilterKind::Circle(circle) => Some(circle.bounding_box()),
            FilterKind::Rect(rect) => Some(*rect),
            _ => None,
        };
        self.list
            .iter()
            .filter_map(|f| f.region())
            .fold(own, |acc, r| match acc {
                Some(acc) => Some(intersection(&acc, &r)),
                None => Some(r),
            })
    }

    /// Fingerprint of the region this filter describes and of the map's
    /// current population.
    pub fn checksum(&self, map: &Map) -> u64 {
        let mut hasher = FxHasher64::default();
        self.hash_region(&mut hasher);
        let state = map.state();
        state.unit_count.hash(&mut hasher);
        state.node_count.hash(&mut hasher);
        state.leaf_count.hash(&mut hasher);
        hasher.finish()
    }

    fn hash_region(&self, hasher: &mut FxHasher64) {
        match &self.kind {
            FilterKind::All => 0u8.hash(hasher),
            FilterKind::Circle(circle) => {
                1u8.hash(hasher);
                hash_pos(&circle.pos, hasher);
                circle.radius.to_bits().hash(hasher);
            }
            FilterKind::Rect(rect) => {
                2u8.hash(hasher);
                hash_pos(&rect.pos, hasher);
                rect.size.w.to_bits().hash(hasher);
                rect.size.h.to_bits().hash(hasher);
            }
            FilterKind::Code(code) => {
                3u8.hash(hasher);
                code.hash(hasher);
            }
            FilterKind::Id(id) => {
                4u8.hash(hasher);
                id.hash(hasher);
            }
            FilterKind::ExcludeId(id) => {
                5u8.hash(hasher);
                id.hash(hasher);
            }
            FilterKind::Custom(predicate) => {
                6u8.hash(hasher);
                (Rc::as_ptr(predicate) as *const () as usize).hash(hasher);
            }
        }
        self.behavior.bits().hash(hasher);
        self.list.len().hash(hasher);
        for f in &self.list {
            f.hash_region(hasher);
        }
    }
}

fn hash_pos(pos: &Pos, hasher: &mut FxHasher64) {
    pos.x.to_bits().hash(hasher);
    pos.y.to_bits().hash(hasher);
}

fn intersection(a: &Rect, b: &Rect) -> Rect {
    let left = a.left().max(b.left());
    let bottom = a.bottom().max(b.bottom());
    let right = a.right().min(b.right()).max(left);
    let top = a.top().min(b.top()).max(bottom);
    Rect::new(left, bottom, right - left, top - bottom)
}

impl fmt::Debug for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::All => write!(f, "All"),
            FilterKind::Circle(c) => f.debug_tuple("Circle").field(c).finish(),
            FilterKind::Rect(r) => f.debug_tuple("Rect").field(r).finish(),
            FilterKind::Code(c) => f.debug_tuple("Code").field(c).finish(),
            FilterKind::Id(id) => f.debug_tuple("Id").field(id).finish(),
            FilterKind::ExcludeId(id) => f.debug_tuple("ExcludeId").field(id).finish(),
            FilterKind::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("kind", &self.kind)
            .field("behavior", &self.behavior)
            .field("list", &self.list)
            .finish()
    }
}
