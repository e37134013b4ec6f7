//! Hex territory grid and its majority-rule automaton.
//!
//! Cells use "odd-r" offset coordinates: odd rows are shifted half a hex to the
//! right, which fixes both the neighbour table and [`TerritoryGrid::hex_center`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::GridConfig;
use crate::{ArenaError, Faction, Position, Tick};

const EVEN_ROW_OFFSETS: [(isize, isize); 6] = [(-1, -1), (-1, 0), (0, -1), (0, 1), (1, -1), (1, 0)];
const ODD_ROW_OFFSETS: [(isize, isize); 6] = [(-1, 0), (-1, 1), (0, -1), (0, 1), (1, 0), (1, 1)];

/// Upper bound on `rows * cols`.
pub const MAX_CELLS: usize = 1 << 22;

/// Offset coordinate of a single hex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HexCoord {
    pub row: usize,
    pub col: usize,
}

impl HexCoord {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Ownership state of one hex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub owner: Faction,
    /// Mirrors `owner` after every change; kept for renderers blending colours.
    pub target_owner: Faction,
    /// Resistance to takeover, always within `[0, max_strength]`.
    pub strength: f32,
    /// Colour blend progress in `[0, 1]`; reset to 0 on every ownership change.
    pub color_transition: f32,
    pub last_changed: Tick,
}

impl Cell {
    fn settled(owner: Faction, strength: f32) -> Self {
        Self {
            owner,
            target_owner: owner,
            strength,
            color_transition: 1.0,
            last_changed: Tick::zero(),
        }
    }

    fn take(&mut self, owner: Faction, strength: f32, tick: Tick) {
        self.owner = owner;
        self.target_owner = owner;
        self.strength = strength;
        self.color_transition = 0.0;
        self.last_changed = tick;
    }
}

/// Per-faction cell counts at one instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerritoryStats {
    pub counts: [usize; Faction::COUNT],
    /// Rounded percentage of the board per faction.
    pub percentages: [u32; Faction::COUNT],
    pub total: usize,
}

impl TerritoryStats {
    fn from_counts(counts: [usize; Faction::COUNT]) -> Self {
        let total: usize = counts.iter().sum();
        let mut percentages = [0u32; Faction::COUNT];
        if total > 0 {
            for (pct, count) in percentages.iter_mut().zip(counts) {
                *pct = ((count as f64 / total as f64) * 100.0).round() as u32;
            }
        }
        Self {
            counts,
            percentages,
            total,
        }
    }

    /// Fraction of the board owned by `faction`.
    #[must_use]
    pub fn share(&self, faction: Faction) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts[faction.index()] as f32 / self.total as f32
    }

    /// Every faction tied for the highest percentage.
    #[must_use]
    pub fn leaders(&self) -> SmallVec<[Faction; 3]> {
        let best = self.percentages.iter().copied().max().unwrap_or(0);
        Faction::ALL
            .into_iter()
            .filter(|f| self.percentages[f.index()] == best)
            .collect()
    }
}

/// Hexes needed to span `length` plus the margin. Float-to-int `as` saturates,
/// so oversized or non-finite lengths end up rejected by the cell limit.
fn cells_along(length: f32, pitch: f32) -> usize {
    ((length / pitch).floor().max(0.0) as usize).saturating_add(2)
}

/// Fixed-size hex board of owned cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryGrid {
    rows: usize,
    cols: usize,
    config: GridConfig,
    cells: Vec<Cell>,
    #[serde(skip)]
    scratch: Vec<Cell>,
}

impl TerritoryGrid {
    /// Construct a `rows x cols` grid partitioned into the three starting regions.
    pub fn new(rows: usize, cols: usize, config: &GridConfig) -> Result<Self, ArenaError> {
        if rows == 0 || cols == 0 {
            return Err(ArenaError::EmptyGrid { rows, cols });
        }
        let len = rows
            .checked_mul(cols)
            .filter(|len| *len <= MAX_CELLS)
            .ok_or(ArenaError::GridTooLarge {
                rows,
                cols,
                max: MAX_CELLS,
            })?;
        let placeholder = Cell::settled(Faction::Orange, config.default_strength);
        let mut grid = Self {
            rows,
            cols,
            config: config.clone(),
            cells: vec![placeholder; len],
            scratch: Vec::with_capacity(len),
        };
        grid.initialize();
        Ok(grid)
    }

    /// Size the grid so the board is covered with a one-hex margin on each axis.
    pub fn for_board(width: f32, height: f32, config: &GridConfig) -> Result<Self, ArenaError> {
        let cols = cells_along(width, config.hex_width());
        let rows = cells_along(height, config.row_pitch());
        Self::new(rows, cols, config)
    }

    /// Reset every cell: top band orange, bottom-left gray, bottom-right cyan.
    pub fn initialize(&mut self) {
        let strength = self.config.default_strength;
        for row in 0..self.rows {
            let relative_row = row as f32 / self.rows as f32;
            for col in 0..self.cols {
                let relative_col = col as f32 / self.cols as f32;
                let owner = if relative_row < 0.4 {
                    Faction::Orange
                } else if relative_col < 0.5 {
                    Faction::Gray
                } else {
                    Faction::Cyan
                };
                let idx = self.offset(row, col);
                self.cells[idx] = Cell::settled(owner, strength);
            }
        }
    }

    /// Set every cell to `owner` at default strength, fully settled.
    pub fn fill(&mut self, owner: Faction) {
        self.cells
            .fill(Cell::settled(owner, self.config.default_strength));
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Row-major cell slice.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Flat index for `(row, col)` without bounds checks.
    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Snapshot of one cell, `None` outside the board.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        if self.contains(row, col) {
            Some(&self.cells[self.offset(row, col)])
        } else {
            None
        }
    }

    #[must_use]
    pub fn owner(&self, row: usize, col: usize) -> Option<Faction> {
        self.cell(row, col).map(|cell| cell.owner)
    }

    /// Valid adjacent coordinates (at most six); empty for off-board input.
    #[must_use]
    pub fn neighbors(&self, row: usize, col: usize) -> SmallVec<[HexCoord; 6]> {
        let mut out = SmallVec::new();
        if !self.contains(row, col) {
            return out;
        }
        let offsets = if row % 2 == 0 {
            &EVEN_ROW_OFFSETS
        } else {
            &ODD_ROW_OFFSETS
        };
        for &(dr, dc) in offsets {
            let (Some(r), Some(c)) = (row.checked_add_signed(dr), col.checked_add_signed(dc))
            else {
                continue;
            };
            if self.contains(r, c) {
                out.push(HexCoord::new(r, c));
            }
        }
        out
    }

    /// Pixel centre of a hex.
    #[must_use]
    pub fn hex_center(&self, row: usize, col: usize) -> Position {
        let width = self.config.hex_width();
        let x = col as f32 * width + (row % 2) as f32 * (width / 2.0);
        let y = row as f32 * self.config.row_pitch();
        Position::new(x, y)
    }

    /// Force ownership of one cell. Returns `false` (and changes nothing) off-board.
    pub fn apply_influence(
        &mut self,
        row: usize,
        col: usize,
        faction: Faction,
        strength: f32,
        tick: Tick,
    ) -> bool {
        if !self.contains(row, col) {
            return false;
        }
        let strength = strength.clamp(0.0, self.config.max_strength);
        let idx = self.offset(row, col);
        self.cells[idx].take(faction, strength, tick);
        true
    }

    /// Coordinates whose centre lies strictly within `radius` of `center`.
    #[must_use]
    pub fn cells_within(&self, center: Position, radius: f32) -> Vec<HexCoord> {
        let mut out = Vec::new();
        if !(radius > 0.0) || !center.x.is_finite() || !center.y.is_finite() {
            return out;
        }
        let width = self.config.hex_width();
        let pitch = self.config.row_pitch();
        let last_row = (self.rows - 1) as f32;
        let last_col = (self.cols - 1) as f32;
        let row_min = ((center.y - radius) / pitch).floor().clamp(0.0, last_row) as usize;
        let row_max = ((center.y + radius) / pitch).ceil().clamp(0.0, last_row) as usize;
        let col_min = ((center.x - radius - width / 2.0) / width)
            .floor()
            .clamp(0.0, last_col) as usize;
        let col_max = ((center.x + radius) / width).ceil().clamp(0.0, last_col) as usize;

        for row in row_min..=row_max {
            for col in col_min..=col_max {
                if self.hex_center(row, col).distance_to(center) < radius {
                    out.push(HexCoord::new(row, col));
                }
            }
        }
        out
    }

    /// Claim every cell within `radius` of `center` for `faction` at max strength.
    pub fn claim_radius(
        &mut self,
        center: Position,
        radius: f32,
        faction: Faction,
        tick: Tick,
    ) -> usize {
        let strength = self.config.max_strength;
        let coords = self.cells_within(center, radius);
        for coord in &coords {
            self.apply_influence(coord.row, coord.col, faction, strength, tick);
        }
        coords.len()
    }

    /// One majority-rule pass over the whole board.
    ///
    /// Every cell reads the previous state of its neighbours; the new state is
    /// written to a scratch buffer and swapped in once the pass is complete.
    pub fn advance(&mut self, tick: Tick) {
        let GridConfig {
            decay_rate,
            growth_rate,
            default_strength,
            max_strength,
            transition_speed,
            ..
        } = self.config;

        self.scratch.clone_from(&self.cells);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let idx = self.offset(row, col);
                let current = self.cells[idx];
                let mut counts = [0usize; Faction::COUNT];
                for n in self.neighbors(row, col) {
                    counts[self.cells[self.offset(n.row, n.col)].owner.index()] += 1;
                }

                let own_count = counts[current.owner.index()];
                let mut dominant = None;
                let mut dominant_count = 0;
                for faction in Faction::ALL {
                    let count = counts[faction.index()];
                    if faction != current.owner && count > dominant_count {
                        dominant = Some(faction);
                        dominant_count = count;
                    }
                }

                let next = &mut self.scratch[idx];
                match dominant {
                    Some(invader) if dominant_count > own_count => {
                        next.strength = (current.strength - decay_rate).max(0.0);
                        if next.strength <= 0.0 {
                            next.take(invader, default_strength, tick);
                            continue;
                        }
                    }
                    _ => {
                        next.strength = (current.strength + growth_rate).min(max_strength);
                    }
                }
                if next.color_transition < 1.0 {
                    next.color_transition = (next.color_transition + transition_speed).min(1.0);
                }
            }
        }
        std::mem::swap(&mut self.cells, &mut self.scratch);
        self.debug_assert_coherent();
    }

    /// Per-faction counts and rounded percentages.
    #[must_use]
    pub fn aggregate_stats(&self) -> TerritoryStats {
        let mut counts = [0usize; Faction::COUNT];
        for cell in &self.cells {
            counts[cell.owner.index()] += 1;
        }
        let stats = TerritoryStats::from_counts(counts);
        debug_assert_eq!(stats.total, self.rows * self.cols);
        stats
    }

    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.cells.len(), self.rows * self.cols);
        debug_assert!(self
            .cells
            .iter()
            .all(|cell| (0.0..=self.config.max_strength).contains(&cell.strength)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GridConfig {
        GridConfig::default()
    }

    #[test]
    fn board_sizing_matches_hex_pitch() {
        let grid = TerritoryGrid::for_board(1_000.0, 700.0, &config()).expect("grid");
        assert_eq!(grid.cols(), 40);
        assert_eq!(grid.rows(), 33);
        assert_eq!(grid.len(), 40 * 33);
    }

    #[test]
    fn oversized_boards_are_rejected_without_panicking() {
        for (width, height) in [(f32::INFINITY, 700.0), (1_000.0, f32::MAX), (1.0e9, 1.0e9)] {
            assert!(
                matches!(
                    TerritoryGrid::for_board(width, height, &config()),
                    Err(ArenaError::GridTooLarge { max: MAX_CELLS, .. })
                ),
                "{width}x{height} should not fit"
            );
        }
        assert!(matches!(
            TerritoryGrid::new(usize::MAX, 2, &config()),
            Err(ArenaError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn empty_grid_is_rejected() {
        assert!(matches!(
            TerritoryGrid::new(0, 4, &config()),
            Err(ArenaError::EmptyGrid { rows: 0, cols: 4 })
        ));
    }

    #[test]
    fn initial_partition_has_three_regions() {
        let grid = TerritoryGrid::new(10, 10, &config()).expect("grid");
        assert_eq!(grid.owner(0, 9), Some(Faction::Orange));
        assert_eq!(grid.owner(3, 0), Some(Faction::Orange));
        assert_eq!(grid.owner(4, 0), Some(Faction::Gray));
        assert_eq!(grid.owner(9, 4), Some(Faction::Gray));
        assert_eq!(grid.owner(9, 5), Some(Faction::Cyan));
        let stats = grid.aggregate_stats();
        assert_eq!(stats.counts, [40, 30, 30]);
        assert_eq!(stats.percentages, [40, 30, 30]);
        assert!(grid
            .cells()
            .iter()
            .all(|c| c.strength == 3.0 && c.color_transition == 1.0));
    }

    #[test]
    fn neighbours_are_symmetric_and_one_hex_apart() {
        let grid = TerritoryGrid::new(7, 6, &config()).expect("grid");
        let expected = config().hex_width();
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                let here = grid.hex_center(row, col);
                for n in grid.neighbors(row, col) {
                    let dist = grid.hex_center(n.row, n.col).distance_to(here);
                    assert!(
                        (dist - expected).abs() < 1e-3,
                        "({row},{col}) -> ({},{}) is {dist} apart",
                        n.row,
                        n.col
                    );
                    assert!(grid
                        .neighbors(n.row, n.col)
                        .contains(&HexCoord::new(row, col)));
                }
            }
        }
        assert_eq!(grid.neighbors(3, 3).len(), 6);
        assert_eq!(grid.neighbors(0, 0).len(), 2);
        assert!(grid.neighbors(7, 0).is_empty());
    }

    #[test]
    fn out_of_range_access_is_rejected() {
        let mut grid = TerritoryGrid::new(4, 4, &config()).expect("grid");
        let before = grid.aggregate_stats();
        assert!(grid.cell(4, 0).is_none());
        assert!(!grid.apply_influence(0, 4, Faction::Cyan, 5.0, Tick(1)));
        assert_eq!(grid.aggregate_stats(), before);
    }

    #[test]
    fn apply_influence_resets_transition_and_records_tick() {
        let mut grid = TerritoryGrid::new(4, 4, &config()).expect("grid");
        assert!(grid.apply_influence(1, 1, Faction::Cyan, 9.0, Tick(17)));
        let cell = grid.cell(1, 1).expect("cell");
        assert_eq!(cell.owner, Faction::Cyan);
        assert_eq!(cell.target_owner, Faction::Cyan);
        assert_eq!(cell.strength, 5.0, "strength is clamped to max");
        assert_eq!(cell.color_transition, 0.0);
        assert_eq!(cell.last_changed, Tick(17));
    }

    #[test]
    fn surrounded_cell_flips_exactly_when_strength_runs_out() {
        let mut grid = TerritoryGrid::new(5, 5, &config()).expect("grid");
        grid.fill(Faction::Gray);
        grid.apply_influence(2, 2, Faction::Orange, 3.0, Tick(0));

        let advances = (3.0 / 0.25) as u64;
        for step in 1..advances {
            grid.advance(Tick(step));
            assert_eq!(
                grid.owner(2, 2),
                Some(Faction::Orange),
                "flipped early at advance {step}"
            );
        }
        grid.advance(Tick(advances));
        let cell = grid.cell(2, 2).expect("cell");
        assert_eq!(cell.owner, Faction::Gray);
        assert_eq!(cell.strength, 3.0);
        assert_eq!(cell.last_changed, Tick(advances));
        assert_eq!(cell.color_transition, 0.0);

        grid.advance(Tick(advances + 1));
        assert_eq!(grid.owner(2, 2), Some(Faction::Gray), "flips exactly once");
    }

    #[test]
    fn advance_reads_previous_state_only() {
        // Alternating weak cells on a single row: every cell is outnumbered by the
        // other colour, so a simultaneous pass inverts the whole row. An in-place
        // sweep would let early flips shield later cells.
        let mut grid = TerritoryGrid::new(1, 5, &config()).expect("grid");
        let pattern = [
            Faction::Orange,
            Faction::Gray,
            Faction::Orange,
            Faction::Gray,
            Faction::Orange,
        ];
        for (col, owner) in pattern.iter().enumerate() {
            grid.apply_influence(0, col, *owner, 0.25, Tick(0));
        }
        grid.advance(Tick(1));
        for (col, owner) in pattern.iter().enumerate() {
            let expected = if *owner == Faction::Orange {
                Faction::Gray
            } else {
                Faction::Orange
            };
            assert_eq!(grid.owner(0, col), Some(expected), "column {col}");
        }
    }

    #[test]
    fn dominant_ties_break_toward_lower_index() {
        // Weak cyan cell with three orange and three gray neighbours.
        let mut grid = TerritoryGrid::new(3, 3, &config()).expect("grid");
        grid.fill(Faction::Gray);
        // Odd row 1, col 1 neighbours: (0,1) (0,2) (1,0) (1,2) (2,1) (2,2).
        grid.apply_influence(1, 1, Faction::Cyan, 0.25, Tick(0));
        for (r, c) in [(0, 1), (0, 2), (1, 0)] {
            grid.apply_influence(r, c, Faction::Orange, 5.0, Tick(0));
        }
        grid.advance(Tick(1));
        assert_eq!(grid.owner(1, 1), Some(Faction::Orange));
    }

    #[test]
    fn holding_cells_grow_to_the_cap() {
        let mut grid = TerritoryGrid::new(4, 4, &config()).expect("grid");
        grid.fill(Faction::Cyan);
        for t in 1..=50 {
            grid.advance(Tick(t));
        }
        assert!(grid.cells().iter().all(|c| (c.strength - 5.0).abs() < 1e-6));
    }

    #[test]
    fn partition_invariant_holds_across_advances() {
        let mut grid = TerritoryGrid::for_board(400.0, 300.0, &config()).expect("grid");
        for t in 1..=40 {
            grid.advance(Tick(t));
            let stats = grid.aggregate_stats();
            assert_eq!(stats.counts.iter().sum::<usize>(), grid.rows() * grid.cols());
            assert!(grid
                .cells()
                .iter()
                .all(|c| (0.0..=5.0).contains(&c.strength)));
        }
    }

    #[test]
    fn cells_within_matches_brute_force() {
        let grid = TerritoryGrid::for_board(300.0, 200.0, &config()).expect("grid");
        for (center, radius) in [
            (Position::new(10.0, 10.0), 37.5),
            (Position::new(150.0, 90.0), 60.0),
            (Position::new(299.0, 199.0), 20.0),
        ] {
            let mut fast = grid.cells_within(center, radius);
            let mut brute = Vec::new();
            for row in 0..grid.rows() {
                for col in 0..grid.cols() {
                    if grid.hex_center(row, col).distance_to(center) < radius {
                        brute.push(HexCoord::new(row, col));
                    }
                }
            }
            fast.sort_by_key(|c| (c.row, c.col));
            brute.sort_by_key(|c| (c.row, c.col));
            assert_eq!(fast, brute);
        }
    }

    #[test]
    fn leaders_report_every_tied_faction() {
        let stats = TerritoryStats::from_counts([40, 40, 20]);
        assert_eq!(stats.leaders().as_slice(), &[Faction::Orange, Faction::Gray]);
        assert!((stats.share(Faction::Cyan) - 0.2).abs() < 1e-6);
    }
}
