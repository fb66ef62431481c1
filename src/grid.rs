//! Number parsing and grid-to-screen mapping.
//!
//! Cells are numbered row by row starting at 1, so with 10 columns the
//! number 23 lands on the third row, third column.

use crate::config::Config;
use std::fmt;

/// A screen coordinate in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Extracts the grid numbers of one line.
///
/// Tokens are separated by any run of commas, semicolons or whitespace.
/// Non-numeric tokens are dropped, as are numbers outside `1..=max`.
/// Order and duplicates are kept.
pub fn parse_numbers(line: &str, max: i32) -> Vec<i32> {
    line.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<i32>().ok())
        .filter(|n| (1..=max).contains(n))
        .collect()
}

/// Geometry of the number grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub origin: Point,
    pub dx: i32,
    pub dy: i32,
    pub cols: i32,
    pub rows: i32,
}

impl Grid {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: Point::new(config.x_start, config.y_start),
            dx: config.dx,
            dy: config.dy,
            cols: config.cols,
            rows: crate::config::GRID_ROWS,
        }
    }

    /// Highest number on the grid.
    pub fn max_number(&self) -> i32 {
        self.cols.saturating_mul(self.rows)
    }

    /// Numbers of `line` that exist on this grid.
    pub fn numbers_in(&self, line: &str) -> Vec<i32> {
        parse_numbers(line, self.max_number())
    }

    /// Screen position of cell `n`, or `None` when `n` is not on the grid.
    pub fn point(&self, n: i32) -> Option<Point> {
        if self.cols <= 0 || n < 1 || n > self.max_number() {
            return None;
        }

        let row = (n - 1) / self.cols;
        let col = (n - 1) % self.cols;
        Some(Point::new(
            self.origin.x.saturating_add(col.saturating_mul(self.dx)),
            self.origin.y.saturating_add(row.saturating_mul(self.dy)),
        ))
    }
}
