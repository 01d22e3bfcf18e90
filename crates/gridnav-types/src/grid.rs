//! Static world description: cells, directions, policy labels and the
//! immutable [`GridModel`].
//!
//! Cells are addressed as `(row, col)` with row 0 at the top.  A
//! [`MoveVector`] is a signed `(dr, dc)` offset; only the four cardinal unit
//! vectors are meaningful and each carries a [`Direction`] symbol.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GridNavError;
use crate::config::GridConfig;

// ────────────────────────────────────────────────────────────────────────────
// Cell / MoveVector
// ────────────────────────────────────────────────────────────────────────────

/// A grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Apply `mv` to this cell.  Returns `None` when a coordinate would go
    /// negative; upper bounds are checked by [`GridModel::step`].
    pub fn offset(self, mv: MoveVector) -> Option<Cell> {
        let row = self.row.checked_add_signed(mv.dr as isize)?;
        let col = self.col.checked_add_signed(mv.dc as isize)?;
        Some(Cell { row, col })
    }
}

impl From<[usize; 2]> for Cell {
    fn from(value: [usize; 2]) -> Self {
        Cell::new(value[0], value[1])
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Signed grid offset `(dr, dc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveVector {
    pub dr: i32,
    pub dc: i32,
}

impl MoveVector {
    pub const fn new(dr: i32, dc: i32) -> Self {
        Self { dr, dc }
    }

    /// The vector pointing the opposite way.
    pub const fn negated(self) -> Self {
        Self {
            dr: -self.dr,
            dc: -self.dc,
        }
    }
}

impl From<[i32; 2]> for MoveVector {
    fn from(value: [i32; 2]) -> Self {
        MoveVector::new(value[0], value[1])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Direction
// ────────────────────────────────────────────────────────────────────────────

/// One of the four cardinal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    E,
    S,
    W,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::N, Direction::E, Direction::S, Direction::W];

    /// Unit vector for this direction.
    pub const fn vector(self) -> MoveVector {
        match self {
            Direction::N => MoveVector::new(-1, 0),
            Direction::E => MoveVector::new(0, 1),
            Direction::S => MoveVector::new(1, 0),
            Direction::W => MoveVector::new(0, -1),
        }
    }

    /// Map a unit cardinal vector back to its direction.
    pub fn from_vector(mv: MoveVector) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.vector() == mv)
    }

    pub const fn reverse(self) -> Direction {
        match self {
            Direction::N => Direction::S,
            Direction::E => Direction::W,
            Direction::S => Direction::N,
            Direction::W => Direction::E,
        }
    }

    /// Perpendicular outcome weighted by the `left` action probability.
    ///
    /// For a forward vector `(dr, dc)` this is `(-dc, -dr)`: the vector is
    /// reflected across the anti-diagonal, which is a quarter turn for the
    /// horizontal moves and the opposite quarter turn for the vertical ones.
    pub const fn left_flank(self) -> Direction {
        match self {
            Direction::N => Direction::E,
            Direction::E => Direction::N,
            Direction::S => Direction::W,
            Direction::W => Direction::S,
        }
    }

    /// Perpendicular outcome weighted by the `right` action probability,
    /// `(dc, dr)` for a forward vector `(dr, dc)`.
    pub const fn right_flank(self) -> Direction {
        match self {
            Direction::N => Direction::W,
            Direction::E => Direction::S,
            Direction::S => Direction::E,
            Direction::W => Direction::N,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::E => "E",
            Direction::S => "S",
            Direction::W => "W",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cell classification
// ────────────────────────────────────────────────────────────────────────────

/// Static classification of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    Free,
    Wall,
    Pit,
    Goal,
}

impl CellKind {
    /// Walls, pits and the goal are excluded from value updates.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, CellKind::Free)
    }

    /// Cells the robot can never occupy; they carry no belief mass.
    pub const fn is_blocked(self) -> bool {
        matches!(self, CellKind::Wall | CellKind::Pit)
    }
}

/// Temperature-emitting category of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Hot,
    Neutral,
    Cold,
}

impl Terrain {
    /// Parse a terrain map token: `H`, `-` or `C`.
    pub fn from_label(label: &str) -> Option<Terrain> {
        match label {
            "H" => Some(Terrain::Hot),
            "-" => Some(Terrain::Neutral),
            "C" => Some(Terrain::Cold),
            _ => None,
        }
    }
}

/// Per-cell output of the policy solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PolicyLabel {
    Move(Direction),
    Wall,
    Pit,
    Goal,
}

impl PolicyLabel {
    /// The move this label asks for, if any.
    pub const fn direction(self) -> Option<Direction> {
        match self {
            PolicyLabel::Move(d) => Some(d),
            _ => None,
        }
    }

    /// Terminal tag for a terminal cell kind; `None` for free cells.
    pub const fn terminal(kind: CellKind) -> Option<PolicyLabel> {
        match kind {
            CellKind::Free => None,
            CellKind::Wall => Some(PolicyLabel::Wall),
            CellKind::Pit => Some(PolicyLabel::Pit),
            CellKind::Goal => Some(PolicyLabel::Goal),
        }
    }
}

impl fmt::Display for PolicyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyLabel::Move(d) => f.write_str(d.symbol()),
            PolicyLabel::Wall => f.write_str("WALL"),
            PolicyLabel::Pit => f.write_str("PIT"),
            PolicyLabel::Goal => f.write_str("GOAL"),
        }
    }
}

impl From<PolicyLabel> for String {
    fn from(value: PolicyLabel) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PolicyLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "N" => Ok(PolicyLabel::Move(Direction::N)),
            "E" => Ok(PolicyLabel::Move(Direction::E)),
            "S" => Ok(PolicyLabel::Move(Direction::S)),
            "W" => Ok(PolicyLabel::Move(Direction::W)),
            "WALL" => Ok(PolicyLabel::Wall),
            "PIT" => Ok(PolicyLabel::Pit),
            "GOAL" => Ok(PolicyLabel::Goal),
            other => Err(format!("unknown policy label '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GridModel
// ────────────────────────────────────────────────────────────────────────────

/// Immutable world description shared by the solver and the belief filter.
///
/// Per-cell data is stored row-major; use [`GridModel::index`] to go from a
/// [`Cell`] to a flat index and [`GridModel::cells`] to iterate in the same
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridModel {
    rows: usize,
    cols: usize,
    goal: Cell,
    kinds: Vec<CellKind>,
    terrain: Vec<Terrain>,
    texture: Vec<String>,
}

impl GridModel {
    /// Build a model from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Config`] when the terrain/texture grids do not
    /// match `rows × cols`, a listed cell is out of bounds, or the wall, pit
    /// and goal sets overlap.
    pub fn new(
        rows: usize,
        cols: usize,
        walls: &[Cell],
        pits: &[Cell],
        goal: Cell,
        terrain: Vec<Terrain>,
        texture: Vec<String>,
    ) -> Result<Self, GridNavError> {
        if rows == 0 || cols == 0 {
            return Err(GridNavError::Config(format!(
                "grid must have at least one cell, got {rows}x{cols}"
            )));
        }
        let len = rows.checked_mul(cols).ok_or_else(|| {
            GridNavError::Config(format!("grid {rows}x{cols} is too large"))
        })?;
        if terrain.len() != len {
            return Err(GridNavError::Config(format!(
                "terrain map has {} cells, expected {len}",
                terrain.len()
            )));
        }
        if texture.len() != len {
            return Err(GridNavError::Config(format!(
                "texture map has {} cells, expected {len}",
                texture.len()
            )));
        }

        let mut model = Self {
            rows,
            cols,
            goal,
            kinds: vec![CellKind::Free; len],
            terrain,
            texture,
        };

        let marks = walls
            .iter()
            .map(|c| (*c, CellKind::Wall))
            .chain(pits.iter().map(|c| (*c, CellKind::Pit)))
            .chain(std::iter::once((goal, CellKind::Goal)));
        for (cell, kind) in marks {
            let idx = model.index(cell).ok_or_else(|| {
                GridNavError::Config(format!("{kind:?} cell {cell} lies outside the {rows}x{cols} grid"))
            })?;
            let existing = model.kinds[idx];
            if existing != CellKind::Free && existing != kind {
                return Err(GridNavError::Config(format!(
                    "cell {cell} is marked both {existing:?} and {kind:?}"
                )));
            }
            model.kinds[idx] = kind;
        }
        Ok(model)
    }

    /// Build the model described by a validated configuration.
    pub fn from_config(config: &GridConfig) -> Result<Self, GridNavError> {
        config.validate()?;
        let [rows, cols] = config.map_size;
        let walls: Vec<Cell> = config.walls.iter().copied().map(Cell::from).collect();
        let pits: Vec<Cell> = config.pits.iter().copied().map(Cell::from).collect();
        Self::new(
            rows,
            cols,
            &walls,
            &pits,
            Cell::from(config.goal),
            config.terrain_cells()?,
            config.texture_cells()?,
        )
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Row-major flat index of `cell`, or `None` if it is outside the grid.
    pub fn index(&self, cell: Cell) -> Option<usize> {
        self.contains(cell).then(|| cell.row * self.cols + cell.col)
    }

    /// Inverse of [`index`][Self::index].
    pub fn cell_at(&self, index: usize) -> Cell {
        Cell::new(index / self.cols, index % self.cols)
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.len()).map(|i| self.cell_at(i))
    }

    /// Neighbour of `cell` along `mv`, or `None` if it falls off the grid.
    pub fn step(&self, cell: Cell, mv: MoveVector) -> Option<Cell> {
        cell.offset(mv).filter(|c| self.contains(*c))
    }

    /// Kind of an in-bounds cell.  Out-of-bounds cells report
    /// [`CellKind::Wall`], matching how the solver treats the border.
    pub fn kind(&self, cell: Cell) -> CellKind {
        self.index(cell).map_or(CellKind::Wall, |i| self.kinds[i])
    }

    pub fn kind_at(&self, index: usize) -> CellKind {
        self.kinds[index]
    }

    pub fn terrain_at(&self, index: usize) -> Terrain {
        self.terrain[index]
    }

    pub fn texture_at(&self, index: usize) -> &str {
        &self.texture[index]
    }

    pub fn terrain(&self, cell: Cell) -> Option<Terrain> {
        self.index(cell).map(|i| self.terrain[i])
    }

    pub fn texture(&self, cell: Cell) -> Option<&str> {
        self.index(cell).map(|i| self.texture[i].as_str())
    }

    /// Distinct texture labels present in the grid, sorted.
    pub fn texture_alphabet(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.texture.iter().map(String::as_str).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
