use super::*;

impl Map {
    /// Edges are inclusive: a position on the far edge belongs to the last cell.
    pub fn contains_pos(&self, pos: &Pos) -> bool {
        pos.x >= self.origin.x
            && pos.y >= self.origin.y
            && pos.x <= self.origin.x + self.size.w
            && pos.y <= self.origin.y + self.size.h
    }

    /// Quadrant path of `pos` down to max depth.
    pub fn gen_code(&self, pos: &Pos) -> AoiResult<Code> {
        if !self.contains_pos(pos) {
            return Err(AoiError::OutOfBounds { x: pos.x, y: pos.y });
        }
        let mut x = pos.x - self.origin.x;
        let mut y = pos.y - self.origin.y;
        let mut code = Code::new();
        for cell in &self.node_sizes[1..] {
            let x_high = x >= cell.w;
            if x_high {
                x -= cell.w;
            }
            let y_high = y >= cell.h;
            if y_high {
                y -= cell.h;
            }
            code.push(Quadrant::from_bits(x_high, y_high));
        }
        code.pos = *pos;
        Ok(code)
    }

    /// Origin of the cell `code` names, at the code's own depth.
    pub fn gen_pos(&self, code: &Code) -> Pos {
        debug_assert!(code.len() <= self.divide, "code deeper than the map");
        let mut pos = self.origin;
        for (level, q) in code.quadrants().iter().enumerate() {
            let cell = self.node_sizes[level + 1];
            if q.x_high() {
                pos.x += cell.w;
            }
            if q.y_high() {
                pos.y += cell.h;
            }
        }
        pos
    }

    /// Moves `code` to the adjacent cell of the same depth.
    ///
    /// Returns how many levels changed, or 0 when the move would leave the
    /// map, in which case `code` is left untouched.
    pub fn move_code(&self, code: &mut Code, direction: Direction) -> usize {
        let original = *code;
        let mut steps = 0;
        for level in (0..code.len()).rev() {
            let q = code.quadrant(level);
            let (x, y) = (q.x_high(), q.y_high());
            steps += 1;
            let (nx, ny, carry) = match direction {
                Direction::Right => (!x, y, x),
                Direction::Left => (!x, y, !x),
                Direction::Up => (x, !y, y),
                Direction::Down => (x, !y, !y),
            };
            code.set_quadrant(level, Quadrant::from_bits(nx, ny));
            if !carry {
                code.pos = self.gen_pos(code);
                return steps;
            }
        }
        *code = original;
        0
    }

    /// Code of the max-depth cell at grid coordinates `(x, y)`.
    pub fn cell_code(&self, x: u32, y: u32) -> Code {
        let mut code = Code::new();
        for level in 0..self.divide {
            let shift = self.divide - 1 - level;
            let x_high = (x >> shift) & 1 == 1;
            let y_high = (y >> shift) & 1 == 1;
            code.push(Quadrant::from_bits(x_high, y_high));
        }
        code.pos = self.gen_pos(&code);
        code
    }

    pub(crate) fn node_rect_of(&self, node: &Node) -> Rect {
        let cell = self.node_sizes[node.level];
        Rect::new(
            self.origin.x + node.x as Real * cell.w,
            self.origin.y + node.y as Real * cell.h,
            cell.w,
            cell.h,
        )
    }

    /// World rectangle covered by a node.
    pub fn node_rect(&self, id: NodeId) -> Option<Rect> {
        self.nodes.get(id).map(|node| self.node_rect_of(node))
    }
}
