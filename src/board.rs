//! Core domain types: stones, cells, coordinates, and the board grid.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// A stone color. Black moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stone {
    /// Black stones, sensor value 1.
    #[display("Black")]
    Black,
    /// White stones, sensor value 2.
    #[display("White")]
    White,
}

impl Stone {
    /// Returns the opposing color.
    pub fn opponent(self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    /// The integer value this color carries in the sensor file.
    pub fn value(self) -> u8 {
        match self {
            Stone::Black => 1,
            Stone::White => 2,
        }
    }
}

/// One intersection on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// No stone, sensor value 0.
    Empty,
    /// Intersection occupied by a stone.
    Occupied(Stone),
}

impl Cell {
    /// The integer value this cell carries in the sensor file.
    pub fn value(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Occupied(stone) => stone.value(),
        }
    }

    /// Returns the occupying stone, if any.
    pub fn stone(self) -> Option<Stone> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(stone) => Some(stone),
        }
    }
}

/// A 0-based board coordinate. `x` is the column, `y` the row; the sensor
/// file stores row `y`, token `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("({x}, {y})")]
pub struct Point {
    /// Column index.
    pub x: usize,
    /// Row index.
    pub y: usize,
}

impl Point {
    /// Creates a point from column and row indices.
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Rejected sensor-file content.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GridParseError {
    /// Wrong number of rows.
    #[display("expected {expected} rows, found {found}")]
    BadLineCount {
        /// Configured board size.
        expected: usize,
        /// Rows actually present.
        found: usize,
    },
    /// A row with the wrong number of values.
    #[display("row {row}: expected {expected} values, found {found}")]
    BadTokenCount {
        /// 0-based row index.
        row: usize,
        /// Configured board size.
        expected: usize,
        /// Values actually present.
        found: usize,
    },
    /// A value outside `{0, 1, 2}`.
    #[display("row {row}: invalid cell value {token:?}")]
    BadValue {
        /// 0-based row index.
        row: usize,
        /// The offending token.
        token: String,
    },
}

/// An N×N board, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates an all-empty grid of the given size.
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::Empty; size * size],
        }
    }

    /// Board dimension N.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cell at column `x`, row `y`. Both must be below [`Grid::size`].
    pub fn get(&self, x: usize, y: usize) -> Cell {
        debug_assert!(x < self.size && y < self.size);
        self.cells[y * self.size + x]
    }

    /// Places a cell value at column `x`, row `y`. Both must be below
    /// [`Grid::size`].
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        debug_assert!(x < self.size && y < self.size);
        self.cells[y * self.size + x] = cell;
    }

    /// Parses raw sensor-file text into a grid.
    ///
    /// Accepts exactly `size` non-empty rows of `size` whitespace-separated
    /// values in `{0, 1, 2}`. Trailing blank lines are tolerated.
    pub fn parse(text: &str, size: usize) -> Result<Self, GridParseError> {
        let mut lines: Vec<&str> = text.lines().collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        if lines.len() != size {
            return Err(GridParseError::BadLineCount {
                expected: size,
                found: lines.len(),
            });
        }

        let mut grid = Grid::empty(size);
        for (y, line) in lines.iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != size {
                return Err(GridParseError::BadTokenCount {
                    row: y,
                    expected: size,
                    found: tokens.len(),
                });
            }
            for (x, token) in tokens.iter().enumerate() {
                let cell = match *token {
                    "0" => Cell::Empty,
                    "1" => Cell::Occupied(Stone::Black),
                    "2" => Cell::Occupied(Stone::White),
                    other => {
                        return Err(GridParseError::BadValue {
                            row: y,
                            token: other.to_string(),
                        });
                    }
                };
                grid.set(x, y, cell);
            }
        }
        Ok(grid)
    }

    /// Points where `self` and `other` differ, in row-major scan order.
    ///
    /// The scan order fixes the order of the two stones inside a pair
    /// record, so it must stay row-major.
    pub fn diff(&self, other: &Grid) -> Vec<Point> {
        debug_assert_eq!(self.size, other.size);
        let mut changed = Vec::new();
        for y in 0..self.size {
            for x in 0..self.size {
                if self.get(x, y) != other.get(x, y) {
                    changed.push(Point::new(x, y));
                }
            }
        }
        changed
    }

    /// Renders the grid in the sensor-file format, one row per line.
    pub fn to_sensor_text(&self) -> String {
        let mut out = String::new();
        for y in 0..self.size {
            for x in 0..self.size {
                if x > 0 {
                    out.push(' ');
                }
                out.push_str(&self.get(x, y).value().to_string());
            }
            out.push('\n');
        }
        out
    }
}
