use super::*;

// A larger grid would need more than 128MiB of bits.
const MAX_BLOCK_DIVIDE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState {
    #[default]
    Walkable,
    Blocked,
}

impl BlockState {
    pub(crate) fn node_state(self) -> NodeState {
        match self {
            BlockState::Walkable => NodeState::WALKABLE,
            BlockState::Blocked => NodeState::NO_WALK,
        }
    }
}

impl Map {
    /// Cells per side of the block grid.
    pub fn block_cells(&self) -> u32 {
        1 << self.divide.min(MAX_BLOCK_DIVIDE)
    }

    fn block_bytes(&self) -> usize {
        let cells = self.block_cells() as usize;
        (cells * cells + 7) / 8
    }

    fn block_index(&self, x: i64, y: i64) -> AoiResult<(u32, u32, usize)> {
        if self.divide > MAX_BLOCK_DIVIDE {
            return Err(AoiError::BlockGridTooLarge {
                divide: self.divide,
            });
        }
        let cells = self.block_cells() as i64;
        if !(0..cells).contains(&x) || !(0..cells).contains(&y) {
            return Err(AoiError::BlockOutOfRange { x, y });
        }
        Ok((x as u32, y as u32, (y * cells + x) as usize))
    }

    /// Marks the max-depth cell at grid coordinates `(x, y)`.
    ///
    /// Blocks only flag nodes, they never affect unit placement.
    pub fn set_block(&mut self, x: i64, y: i64, state: BlockState) -> AoiResult<()> {
        let (cx, cy, index) = self.block_index(x, y)?;
        let bytes = self.block_bytes();
        let blocks = self.blocks.get_or_insert_with(|| vec![0; bytes]);
        let mask = 1u8 << (index % 8);
        match state {
            BlockState::Blocked => blocks[index / 8] |= mask,
            BlockState::Walkable => blocks[index / 8] &= !mask,
        }
        self.apply_block(cx, cy, state);
        Ok(())
    }

    pub fn get_block(&self, x: i64, y: i64) -> AoiResult<BlockState> {
        let (_, _, index) = self.block_index(x, y)?;
        Ok(self.block_state_bit(index))
    }

    /// Replaces the whole grid with `data`, one bit per cell in row order.
    pub fn load_blocks(&mut self, data: &[u8]) -> AoiResult<()> {
        if self.divide > MAX_BLOCK_DIVIDE {
            return Err(AoiError::BlockGridTooLarge {
                divide: self.divide,
            });
        }
        let expected = self.block_bytes();
        if data.len() != expected {
            return Err(AoiError::InvalidBlockData {
                expected,
                actual: data.len(),
            });
        }
        self.blocks = Some(data.to_vec());

        let cells: Vec<(NodeId, u32, u32)> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.level == self.divide)
            .map(|(id, node)| (id, node.x, node.y))
            .collect();
        for (id, x, y) in cells {
            let state = self.block_state_at(x, y).node_state();
            let node = &mut self.nodes[id];
            node.state.remove(NodeState::NO_WALK | NodeState::WALKABLE);
            node.state.insert(state);
        }
        debug!(name = %self.name, bytes = expected, "blocks loaded");
        Ok(())
    }

    fn block_state_bit(&self, index: usize) -> BlockState {
        let blocked = self
            .blocks
            .as_ref()
            .and_then(|blocks| blocks.get(index / 8))
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0);
        if blocked {
            BlockState::Blocked
        } else {
            BlockState::Walkable
        }
    }

    pub(crate) fn block_state_at(&self, x: u32, y: u32) -> BlockState {
        if self.divide > MAX_BLOCK_DIVIDE {
            return BlockState::Walkable;
        }
        let cells = self.block_cells() as usize;
        self.block_state_bit(y as usize * cells + x as usize)
    }

    fn apply_block(&mut self, x: u32, y: u32, state: BlockState) {
        let code = self.cell_code(x, y);
        if let Some(id) = self.get_node(&code, self.divide, FindBehavior::Accurate) {
            let node = &mut self.nodes[id];
            node.state.remove(NodeState::NO_WALK | NodeState::WALKABLE);
            node.state.insert(state.node_state());
        }
    }
}
