/// Column breakpoints as `(min viewport width, columns)`, widest first.
const BREAKPOINTS: &[(u32, u32)] = &[
    (1280, 4), // xl
    (1024, 3), // lg
    (768, 2),  // md
];

/// Width assumed when none is given.
pub const DEFAULT_WIDTH: u32 = 1280;

/// Grid layout for the stream tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// Number of columns in the grid
    pub cols: u32,
}

impl GridLayout {
    pub fn new(cols: u32) -> Self {
        Self { cols: cols.max(1) }
    }

    /// Pick the column count for a viewport width.
    pub fn for_width(width: u32) -> Self {
        let cols = BREAKPOINTS
            .iter()
            .find(|(min, _)| width >= *min)
            .map(|(_, cols)| *cols)
            .unwrap_or(1);
        Self::new(cols)
    }

    /// Rows needed to show `count` tiles.
    pub fn rows(&self, count: usize) -> usize {
        count.div_ceil(self.cols as usize)
    }

    /// `(row, col)` of tile `index`.
    pub fn position(&self, index: usize) -> (usize, usize) {
        let cols = self.cols as usize;
        (index / cols, index % cols)
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::for_width(DEFAULT_WIDTH)
    }
}
