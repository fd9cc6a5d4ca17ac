// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Compact sets of table ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest number of table references a single statement may hold.
pub const MAX_TABLES: usize = 64;

/// Bit set over the table references of a statement. Bit `n` stands for the
/// `n`th table reference the analyzer saw, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableSet(u64);

impl TableSet {
    pub const EMPTY: TableSet = TableSet(0);

    /// Set holding only the table at `offset`. Offsets past [`MAX_TABLES`] yield the empty set.
    pub fn single(offset: usize) -> Self {
        if offset >= MAX_TABLES {
            return Self::EMPTY;
        }
        Self(1u64 << offset)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn merge(self, other: TableSet) -> TableSet {
        TableSet(self.0 | other.0)
    }

    pub fn intersect(self, other: TableSet) -> TableSet {
        TableSet(self.0 & other.0)
    }

    /// True when every table of `self` is also in `other`.
    pub fn is_solved_by(self, other: TableSet) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn is_overlapping(self, other: TableSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn num_tables(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Offset of the single table in the set, if it holds exactly one.
    pub fn table_offset(self) -> Option<usize> {
        if self.num_tables() == 1 { Some(self.0.trailing_zeros() as usize) } else { None }
    }

    pub fn constituents(self) -> TableSetIter {
        TableSetIter(self.0)
    }
}

impl FromIterator<usize> for TableSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter().fold(TableSet::EMPTY, |acc, offset| acc.merge(TableSet::single(offset)))
    }
}

pub struct TableSetIter(u64);

impl Iterator for TableSetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let offset = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(offset)
    }
}

impl fmt::Display for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableSet{{")?;
        for (i, offset) in self.constituents().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{offset}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_merge() {
        let a = TableSet::single(0);
        let b = TableSet::single(3);
        let ab = a.merge(b);
        assert_eq!(ab.num_tables(), 2);
        assert_eq!(ab.constituents().collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(a.table_offset(), Some(0));
        assert_eq!(ab.table_offset(), None);
    }

    #[test]
    fn test_solved_by() {
        let a = TableSet::single(1);
        let ab = a.merge(TableSet::single(2));
        assert!(a.is_solved_by(ab));
        assert!(!ab.is_solved_by(a));
        assert!(TableSet::EMPTY.is_solved_by(a));
        assert!(a.is_overlapping(ab));
        assert!(!a.is_overlapping(TableSet::single(2)));
    }

    #[test]
    fn test_out_of_range_offset() {
        assert!(TableSet::single(MAX_TABLES).is_empty());
        assert_eq!(TableSet::single(63).bits(), 1u64 << 63);
    }

    #[test]
    fn test_display() {
        let set: TableSet = [0, 2, 5].into_iter().collect();
        assert_eq!(set.to_string(), "TableSet{0,2,5}");
    }
}
