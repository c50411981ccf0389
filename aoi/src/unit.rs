use crate::code::Code;
use crate::node::NodeId;
use crate::pool::Resettable;
use bitflags::bitflags;
use common::shapes::{Circle, Pos, Real};
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

pub type UnitId = i64;

/// Longest unit name kept, in bytes.
pub const MAX_NAME_LENGTH: usize = 32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UnitState: u32 {
        const DEAD = 1 << 3;
        const FLYING = 1 << 5;
        const MOVING = 1 << 6;
        /// Briefly set while a search collects the unit.
        const SEARCHING = 1 << 10;
    }
}

/// Caller owned data riding along with a unit.
#[derive(Clone, Default)]
pub struct UserData {
    pub slots: [i64; 4],
    pub payload: Option<Rc<dyn Any>>,
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserData")
            .field("slots", &self.slots)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// A tracked entity.
#[derive(Debug, Default)]
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) state: UnitState,
    pub(crate) tick: u64,
    pub(crate) pos: Pos,
    pub(crate) code: Code,
    pub(crate) radius: Real,
    pub(crate) userdata: UserData,
    // Leaf holding this unit and the unit's slot in that leaf.
    pub(crate) node: Option<NodeId>,
    pub(crate) node_slot: usize,
}

impl Unit {
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Map tick of the last add or update.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// Code computed when the unit was last placed on a map.
    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn radius(&self) -> Real {
        self.radius
    }

    pub fn circle(&self) -> Circle {
        Circle {
            pos: self.pos,
            radius: self.radius,
        }
    }

    pub fn userdata(&self) -> &UserData {
        &self.userdata
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }
}

impl Resettable for Unit {
    fn reset(&mut self) {
        self.id = 0;
        self.name.clear();
        self.state = UnitState::empty();
        self.tick = 0;
        self.pos = Pos::default();
        self.code = Code::new();
        self.radius = 0.0;
        self.userdata = UserData::default();
        self.node = None;
        self.node_slot = 0;
    }
}

fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LENGTH {
        return name.to_owned();
    }
    let mut end = MAX_NAME_LENGTH;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

/// Shared handle to a [`Unit`].
///
/// Cloning retains, dropping releases. Maps, search results and callers may
/// hold the same unit at once; it is freed when the last handle goes away.
#[derive(Clone, Debug)]
pub struct UnitRef(Rc<RefCell<Unit>>);

impl UnitRef {
    pub fn new(id: UnitId, x: Real, y: Real) -> Self {
        Self::with_radius(id, x, y, 0.0)
    }

    pub fn with_radius(id: UnitId, x: Real, y: Real, radius: Real) -> Self {
        let unit = Unit {
            id,
            pos: Pos::new(x, y),
            radius,
            ..Unit::default()
        };
        UnitRef(Rc::new(RefCell::new(unit)))
    }

    pub(crate) fn from_rc(rc: Rc<RefCell<Unit>>) -> Self {
        UnitRef(rc)
    }

    pub(crate) fn into_rc(self) -> Rc<RefCell<Unit>> {
        self.0
    }

    pub fn borrow(&self) -> Ref<'_, Unit> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, Unit> {
        self.0.borrow_mut()
    }

    pub fn id(&self) -> UnitId {
        self.0.borrow().id
    }

    pub fn pos(&self) -> Pos {
        self.0.borrow().pos
    }

    /// Stores a new position. The map only sees it after `Map::update_unit`.
    pub fn set_pos(&self, pos: Pos) {
        self.0.borrow_mut().pos = pos;
    }

    pub fn radius(&self) -> Real {
        self.0.borrow().radius
    }

    /// Stores a new radius. Call `Map::refresh_unit` to publish it.
    pub fn set_radius(&self, radius: Real) {
        self.0.borrow_mut().radius = radius;
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.0.borrow_mut().name = truncate_name(name);
    }

    pub fn state(&self) -> UnitState {
        self.0.borrow().state
    }

    pub fn insert_state(&self, state: UnitState) {
        self.0.borrow_mut().state.insert(state);
    }

    pub fn remove_state(&self, state: UnitState) {
        self.0.borrow_mut().state.remove(state);
    }

    pub fn tick(&self) -> u64 {
        self.0.borrow().tick
    }

    pub fn node(&self) -> Option<NodeId> {
        self.0.borrow().node
    }

    pub fn is_attached(&self) -> bool {
        self.0.borrow().node.is_some()
    }

    pub fn code(&self) -> Code {
        self.0.borrow().code
    }

    pub fn with_userdata<R>(&self, f: impl FnOnce(&mut UserData) -> R) -> R {
        f(&mut self.0.borrow_mut().userdata)
    }

    /// Number of live handles, this one included.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &UnitRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for UnitRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for UnitRef {}
