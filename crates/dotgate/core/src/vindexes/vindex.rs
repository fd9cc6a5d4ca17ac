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

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sharding function families the catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VindexKind {
    Hash,
    Xxhash,
    Numeric,
    /// Identity over keyspace ids.
    Binary,
    LookupUnique,
    Lookup,
}

impl VindexKind {
    pub fn is_unique(self) -> bool {
        !matches!(self, VindexKind::Lookup)
    }

    /// Relative cost of mapping one value, lookups need a round trip.
    pub fn cost(self) -> usize {
        match self {
            VindexKind::Numeric | VindexKind::Binary => 0,
            VindexKind::Hash | VindexKind::Xxhash => 1,
            VindexKind::LookupUnique => 10,
            VindexKind::Lookup => 20,
        }
    }
}

/// A named sharding function. Two vindexes are the same function when they
/// share keyspace and name, which is what co-location proofs compare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vindex {
    pub keyspace: String,
    pub name: String,
    pub kind: VindexKind,
}

impl Vindex {
    pub fn new(keyspace: &str, name: &str, kind: VindexKind) -> Self {
        Self {
            keyspace: keyspace.to_string(),
            name: name.to_string(),
            kind,
        }
    }

    /// The identity vindex used to route pinned tables.
    pub fn binary_identity() -> Self {
        Self::new("", "binary", VindexKind::Binary)
    }

    pub fn is_unique(&self) -> bool {
        self.kind.is_unique()
    }

    pub fn cost(&self) -> usize {
        self.kind.cost()
    }
}

impl PartialEq for Vindex {
    fn eq(&self, other: &Self) -> bool {
        self.keyspace == other.keyspace && self.name == other.name
    }
}

impl Eq for Vindex {}

/// Binding of a vindex to table columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnVindex {
    pub columns: Vec<String>,
    pub vindex: Arc<Vindex>,
}

impl ColumnVindex {
    pub fn new(column: &str, vindex: Arc<Vindex>) -> Self {
        Self {
            columns: vec![column.to_string()],
            vindex,
        }
    }

    /// The bound column, when the vindex maps a single column.
    pub fn single_column(&self) -> Option<&str> {
        match self.columns.as_slice() {
            [column] => Some(column.as_str()),
            _ => None,
        }
    }
}
