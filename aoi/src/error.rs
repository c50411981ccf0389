use crate::unit::UnitId;
use common::shapes::Real;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum AoiError {
    #[error("divide depth must be within 1..={max} (divide: {divide})")]
    InvalidDivide { divide: usize, max: usize },
    #[error("map size must be finite and positive (w: {w}, h: {h})")]
    InvalidMapSize { w: Real, h: Real },
    #[error("position is outside the map bounds (x: {x}, y: {y})")]
    OutOfBounds { x: Real, y: Real },
    #[error("unit {id} is already attached to a node")]
    UnitAlreadyAttached { id: UnitId },
    #[error("unit {id} is not attached to this map")]
    UnitNotAttached { id: UnitId },
    #[error("target node does not accept units")]
    NodeRejectsUnits,
    #[error("node does not exist")]
    NodeNotFound,
    #[error("block coordinate is outside the grid (x: {x}, y: {y})")]
    BlockOutOfRange { x: i64, y: i64 },
    #[error("block bitmap has {actual} bytes, expected {expected}")]
    InvalidBlockData { expected: usize, actual: usize },
    #[error("block grid is too large for divide depth {divide}")]
    BlockGridTooLarge { divide: usize },
}

pub type AoiResult<T> = Result<T, AoiError>;
