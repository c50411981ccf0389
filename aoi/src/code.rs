use common::shapes::Pos;
use std::fmt;

/// Deepest subdivision a map supports.
pub const MAX_DIVIDE: usize = 32;

/// Child slot of a quadtree node.
///
/// ```text
/// y
/// ^
/// | (B , D)
/// | (A , C)
/// -----------> x
/// ```
///
/// The discriminant packs the x half into bit 0 and the y half into bit 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Quadrant {
    #[default]
    A = 0,
    C = 1,
    B = 2,
    D = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::A, Quadrant::C, Quadrant::B, Quadrant::D];

    #[inline(always)]
    pub fn from_bits(x_high: bool, y_high: bool) -> Self {
        Self::from_index((x_high as usize) | ((y_high as usize) << 1))
    }

    #[inline(always)]
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index & 3]
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub fn x_high(self) -> bool {
        (self as u8) & 1 != 0
    }

    #[inline(always)]
    pub fn y_high(self) -> bool {
        (self as u8) & 2 != 0
    }

    pub fn as_char(self) -> char {
        match self {
            Quadrant::A => 'A',
            Quadrant::B => 'B',
            Quadrant::C => 'C',
            Quadrant::D => 'D',
        }
    }
}

/// Direction for moving a code to the adjacent cell at the same depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Down,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Down,
        Direction::Up,
    ];
}

/// Quadrant path from the root down to a cell, plus the position it was
/// generated from (or the cell origin when rebuilt from a path).
#[derive(Clone, Copy)]
pub struct Code {
    path: [Quadrant; MAX_DIVIDE],
    len: u8,
    pub pos: Pos,
}

impl Code {
    pub fn new() -> Self {
        Self {
            path: [Quadrant::A; MAX_DIVIDE],
            len: 0,
            pos: Pos::default(),
        }
    }

    pub fn from_quadrants(quadrants: &[Quadrant]) -> Self {
        let mut code = Self::new();
        for q in quadrants.iter().take(MAX_DIVIDE) {
            code.push(*q);
        }
        code
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Quadrant chosen at `level` (0 selects the root's child).
    #[inline(always)]
    pub fn quadrant(&self, level: usize) -> Quadrant {
        debug_assert!(level < self.len(), "level {} beyond code length {}", level, self.len);
        self.path[level]
    }

    #[inline(always)]
    pub(crate) fn set_quadrant(&mut self, level: usize, quadrant: Quadrant) {
        debug_assert!(level < self.len());
        self.path[level] = quadrant;
    }

    pub fn quadrants(&self) -> &[Quadrant] {
        &self.path[..self.len()]
    }

    pub fn push(&mut self, quadrant: Quadrant) {
        debug_assert!(self.len() < MAX_DIVIDE, "code is already {} deep", MAX_DIVIDE);
        self.path[self.len()] = quadrant;
        self.len += 1;
    }

    pub fn truncate(&mut self, len: usize) {
        let current = self.len();
        let len = len.min(current);
        for q in &mut self.path[len..current] {
            *q = Quadrant::A;
        }
        self.len = len as u8;
    }

    /// First `len` quadrants of this code.
    pub fn prefix(&self, len: usize) -> Code {
        let mut code = *self;
        code.truncate(len);
        code
    }

    pub fn starts_with(&self, prefix: &Code) -> bool {
        prefix.len() <= self.len() && self.path[..prefix.len()] == prefix.path[..prefix.len()]
    }

    pub fn common_prefix_len(&self, other: &Code) -> usize {
        self.quadrants()
            .iter()
            .zip(other.quadrants())
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl Default for Code {
    fn default() -> Self {
        Self::new()
    }
}

// Codes compare by path only, the cached position is informational.
impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.quadrants() == other.quadrants()
    }
}

impl Eq for Code {}

impl std::hash::Hash for Code {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.quadrants().hash(state);
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in self.quadrants() {
            write!(f, "{}", q.as_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({}, {:?})", self, self.pos)
    }
}
