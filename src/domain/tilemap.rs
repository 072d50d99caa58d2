/// The level grid.
///
/// ## Coordinates
///
/// World space is y-up; grid space is row-down. Tile `(col, row)` covers
///
/// ```text
///   x ∈ [col·ts, (col+1)·ts]      y ∈ [-(row+1)·ts, -row·ts]
/// ```
///
/// so `world_to_tile` floors `x / ts` and `-y / ts`. Every caller goes
/// through this pair of functions; nothing else flips the sign.
///
/// ## Out-of-range policy
///
/// Per-frame queries (`code_at`, `classify`) **clamp** to the nearest edge
/// cell, so the border of the map extends forever. Only the checked
/// accessors (`try_code`, `set_tile`) report `OutOfBoundsQuery`.

use glam::Vec2;

use super::tile::{TileClass, TileCode, TileTable};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap {
    width: usize,
    height: usize,
    tile_size: f32,
    /// Flat row-major buffer: `cells[row * width + col]`.
    cells: Vec<TileCode>,
    table: TileTable,
}

impl Tilemap {
    pub fn new(
        width: usize,
        height: usize,
        tile_size: f32,
        cells: Vec<TileCode>,
        table: TileTable,
    ) -> EngineResult<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::MalformedLevel(format!(
                "grid must be non-empty, got {width}x{height}"
            )));
        }
        if cells.len() != width * height {
            return Err(EngineError::MalformedLevel(format!(
                "expected {} cells for {width}x{height}, got {}",
                width * height,
                cells.len()
            )));
        }
        if !(tile_size > 0.0) {
            return Err(EngineError::MalformedLevel(format!("tile size {tile_size} must be positive")));
        }
        Ok(Tilemap { width, height, tile_size, cells, table })
    }

    /// Build from rows of codes (row 0 first).
    pub fn from_rows(rows: &[Vec<u16>], tile_size: f32, table: TileTable) -> EngineResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(EngineError::MalformedLevel(format!(
                "row {i} has {} columns, expected {width}",
                r.len()
            )));
        }
        let cells = rows.iter().flatten().map(|&c| TileCode(c)).collect();
        Tilemap::new(width, height, tile_size, cells, table)
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn tile_size(&self) -> f32 { self.tile_size }
    pub fn table(&self) -> &TileTable { &self.table }

    /// Raw codes, row-major.
    pub fn cells(&self) -> &[TileCode] {
        &self.cells
    }

    // ── Coordinate conversion ──

    /// World position → grid cell (unclamped; may be negative or past the edge).
    pub fn world_to_tile(&self, x: f32, y: f32) -> (i32, i32) {
        let col = (x / self.tile_size).floor() as i32;
        let row = (-y / self.tile_size).floor() as i32;
        (col, row)
    }

    /// World y of the top edge of `row`.
    pub fn row_top(&self, row: i32) -> f32 {
        -(row as f32) * self.tile_size
    }

    /// World y of the bottom edge of `row`.
    pub fn row_bottom(&self, row: i32) -> f32 {
        -(row as f32 + 1.0) * self.tile_size
    }

    /// World x of the left edge of `col`.
    pub fn col_left(&self, col: i32) -> f32 {
        col as f32 * self.tile_size
    }

    /// World x of the right edge of `col`.
    pub fn col_right(&self, col: i32) -> f32 {
        (col as f32 + 1.0) * self.tile_size
    }

    /// Centre of a cell in world space.
    pub fn tile_center(&self, col: i32, row: i32) -> Vec2 {
        let half = self.tile_size * 0.5;
        Vec2::new(self.col_left(col) + half, self.row_top(row) - half)
    }

    /// World y below which nothing is part of the map.
    pub fn bottom_y(&self) -> f32 {
        self.row_bottom(self.height as i32 - 1)
    }

    // ── Queries ──

    /// Clamp a cell to the grid.
    pub fn clamp(&self, col: i32, row: i32) -> (usize, usize) {
        let c = col.clamp(0, self.width as i32 - 1) as usize;
        let r = row.clamp(0, self.height as i32 - 1) as usize;
        if c as i32 != col || r as i32 != row {
            log::trace!("tile query ({col}, {row}) clamped to ({c}, {r})");
        }
        (c, r)
    }

    pub fn in_bounds(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.width && (row as usize) < self.height
    }

    /// Code at a cell, clamped to the grid.
    pub fn code_at(&self, col: i32, row: i32) -> TileCode {
        let (c, r) = self.clamp(col, row);
        self.cells[r * self.width + c]
    }

    /// Code at a cell, or `OutOfBoundsQuery`.
    pub fn try_code(&self, col: i32, row: i32) -> EngineResult<TileCode> {
        if !self.in_bounds(col, row) {
            return Err(EngineError::OutOfBoundsQuery { col: col as i64, row: row as i64 });
        }
        Ok(self.cells[row as usize * self.width + col as usize])
    }

    /// Classification of a cell, clamped to the grid.
    pub fn classify(&self, col: i32, row: i32) -> TileClass {
        self.table.classify(self.code_at(col, row))
    }

    /// Classification of the cell containing a world point.
    pub fn classify_world(&self, x: f32, y: f32) -> TileClass {
        let (col, row) = self.world_to_tile(x, y);
        self.classify(col, row)
    }

    // ── Mutation ──

    /// Replace a single tile. Visible to the very next query.
    pub fn set_tile(&mut self, col: i32, row: i32, code: TileCode) -> EngineResult<()> {
        if !self.in_bounds(col, row) {
            return Err(EngineError::OutOfBoundsQuery { col: col as i64, row: row as i64 });
        }
        self.cells[row as usize * self.width + col as usize] = code;
        Ok(())
    }

    /// Every cell currently holding `code`.
    pub fn find_all(&self, code: TileCode) -> Vec<(i32, i32)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == code)
            .map(|(i, _)| ((i % self.width) as i32, (i / self.width) as i32))
            .collect()
    }

    /// Replace all cells with those of another map of the same size.
    pub fn restore_cells(&mut self, cells: Vec<TileCode>) -> EngineResult<()> {
        if cells.len() != self.cells.len() {
            return Err(EngineError::SaveFormat(format!(
                "expected {} cells, got {}",
                self.cells.len(),
                cells.len()
            )));
        }
        self.cells = cells;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::TileClass;

    const TS: f32 = 0.25;

    fn map(rows: &[&str]) -> Tilemap {
        let mut table = TileTable::new();
        table.insert(TileCode(1), TileClass::Solid);
        table.insert(TileCode(2), TileClass::Hazard);
        let rows: Vec<Vec<u16>> = rows
            .iter()
            .map(|r| r.chars().map(|ch| match ch { '#' => 1, '^' => 2, _ => 0 }).collect())
            .collect();
        Tilemap::from_rows(&rows, TS, table).unwrap()
    }

    #[test]
    fn world_to_tile_inverts_y() {
        let m = map(&["   ", "   "]);
        assert_eq!(m.world_to_tile(0.1, -0.1), (0, 0));
        assert_eq!(m.world_to_tile(0.3, -0.3), (1, 1));
        // Just above row 0 is row -1.
        assert_eq!(m.world_to_tile(0.1, 0.01), (0, -1));
        assert_eq!(m.world_to_tile(-0.01, -0.1), (-1, 0));
    }

    #[test]
    fn tile_edges_match_world_to_tile() {
        let m = map(&["   ", "   "]);
        let c = m.tile_center(2, 1);
        assert_eq!(m.world_to_tile(c.x, c.y), (2, 1));
        assert!((m.row_top(1) - -0.25).abs() < 1e-6);
        assert!((m.row_bottom(1) - -0.5).abs() < 1e-6);
        assert!((m.col_right(2) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn classify_clamps_out_of_range() {
        let m = map(&["#  ", "  ^"]);
        assert_eq!(m.classify(-5, -5), TileClass::Solid);
        assert_eq!(m.classify(10, 10), TileClass::Hazard);
        assert_eq!(m.classify(1, 0), TileClass::Empty);
    }

    #[test]
    fn checked_access_rejects_out_of_range() {
        let mut m = map(&["   "]);
        assert!(matches!(m.try_code(3, 0), Err(EngineError::OutOfBoundsQuery { col: 3, row: 0 })));
        assert!(m.set_tile(0, 1, TileCode(1)).is_err());
    }

    #[test]
    fn set_tile_is_immediately_visible() {
        let mut m = map(&["   "]);
        m.set_tile(1, 0, TileCode(1)).unwrap();
        assert_eq!(m.classify(1, 0), TileClass::Solid);
    }

    #[test]
    fn ragged_rows_rejected() {
        let rows = vec![vec![0, 0], vec![0]];
        assert!(matches!(
            Tilemap::from_rows(&rows, TS, TileTable::new()),
            Err(EngineError::MalformedLevel(_))
        ));
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(Tilemap::new(0, 3, TS, vec![], TileTable::new()).is_err());
    }

    #[test]
    fn find_all_lists_cells() {
        let m = map(&["# #", " # "]);
        assert_eq!(m.find_all(TileCode(1)), vec![(0, 0), (2, 0), (1, 1)]);
    }
}
