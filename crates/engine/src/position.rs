//! Cell positions and grid geometry.
//!
//! A `Position` uniquely identifies a cell in the sheet and doubles as the
//! node key of the dependency graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum number of rows a sheet can address.
pub const MAX_ROWS: usize = 16_384;

/// Maximum number of columns a sheet can address.
pub const MAX_COLS: usize = 16_384;

/// Zero-based cell coordinates.
///
/// Ordering is row-major (`(row, col)` tuple order), which is also the
/// order referenced-cell lists are kept in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl Position {
    /// Create a new position.
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Whether this position lies inside the addressable grid.
    ///
    /// Out-of-range positions are still representable: a formula may
    /// reference one, in which case it evaluates to `#REF!`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Error from parsing an `A1`-style position literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsePositionError {
    input: String,
}

impl fmt::Display for ParsePositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a cell position: {:?}", self.input)
    }
}

impl std::error::Error for ParsePositionError {}

impl FromStr for Position {
    type Err = ParsePositionError;

    /// Parse an `A1`-style literal: one or more letters followed by a
    /// 1-based row number. Letters are case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePositionError { input: s.to_string() };

        let split = s.find(|c: char| !c.is_ascii_alphabetic()).ok_or_else(err)?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let row: usize = digits.parse().map_err(|_| err())?;
        if row == 0 {
            return Err(err());
        }

        Ok(Position {
            row: row - 1,
            col: letters_to_col(letters),
        })
    }
}

/// Convert a 0-based column index to spreadsheet letters: 0=A, 25=Z, 26=AA.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert spreadsheet letters to a 0-based column index: A=0, Z=25, AA=26.
///
/// Saturates instead of overflowing so that absurdly long column names
/// become (invalid) positions rather than panics.
pub fn letters_to_col(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0usize, |acc, b| {
            acc.saturating_mul(26)
                .saturating_add((b.to_ascii_uppercase() - b'A') as usize + 1)
        })
        .saturating_sub(1)
}

/// Dimensions of the printable area: the tight bounding box around every
/// cell whose text is non-empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

impl Size {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}
