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
use std::cmp::Ordering;
use std::fmt;

use crate::vindexes::Vindex;

/// Routing strategy of a route, cheapest class first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RouteOpcode {
    /// Replicated table, any shard will do.
    Reference,
    Unsharded,
    /// The predicates can never match, no shard needs to be asked.
    None,
    EqualUnique,
    Equal,
    In,
    Scatter,
    /// Sequence value generation.
    Next,
    /// Information schema queries.
    Dba,
}

impl RouteOpcode {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteOpcode::Reference => "Reference",
            RouteOpcode::Unsharded => "Unsharded",
            RouteOpcode::None => "None",
            RouteOpcode::EqualUnique => "EqualUnique",
            RouteOpcode::Equal => "Equal",
            RouteOpcode::In => "IN",
            RouteOpcode::Scatter => "Scatter",
            RouteOpcode::Next => "Next",
            RouteOpcode::Dba => "DBA",
        }
    }

    /// Opcodes whose shard set comes from vindex predicates.
    pub fn is_sharded_class(self) -> bool {
        matches!(self, RouteOpcode::EqualUnique | RouteOpcode::Equal | RouteOpcode::In | RouteOpcode::Scatter)
    }

    /// Opcodes that send the whole statement to at most one shard.
    pub fn is_single_shard(self) -> bool {
        matches!(self, RouteOpcode::Reference | RouteOpcode::Unsharded | RouteOpcode::EqualUnique)
    }

    /// Cost of a route with this opcode. Opcodes assigned by rule rather than
    /// by comparison are free since they are never weighed against each other.
    pub fn route_cost(self) -> usize {
        match self {
            RouteOpcode::Reference | RouteOpcode::Unsharded | RouteOpcode::None | RouteOpcode::Next | RouteOpcode::Dba => 0,
            RouteOpcode::EqualUnique => 1,
            RouteOpcode::Equal => 5,
            RouteOpcode::In => 10,
            RouteOpcode::Scatter => 20,
        }
    }
}

impl fmt::Display for RouteOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranking of a vindex option: opcode class first, then unique vindexes,
/// then the vindex's own lookup cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cost {
    pub opcode: RouteOpcode,
    pub vindex_cost: usize,
    pub is_unique: bool,
}

impl Cost {
    pub fn for_opcode(opcode: RouteOpcode) -> Self {
        Self {
            opcode,
            vindex_cost: 0,
            is_unique: false,
        }
    }

    pub fn for_vindex(vindex: &Vindex, opcode: RouteOpcode) -> Self {
        if !opcode.is_sharded_class() || opcode == RouteOpcode::Scatter {
            return Self::for_opcode(opcode);
        }
        Self {
            opcode,
            vindex_cost: vindex.cost(),
            is_unique: vindex.is_unique(),
        }
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.opcode
            .cmp(&other.opcode)
            .then_with(|| other.is_unique.cmp(&self.is_unique))
            .then_with(|| self.vindex_cost.cmp(&other.vindex_cost))
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vindexes::VindexKind;

    #[test]
    fn test_opcode_order() {
        assert!(RouteOpcode::EqualUnique < RouteOpcode::Equal);
        assert!(RouteOpcode::Equal < RouteOpcode::In);
        assert!(RouteOpcode::In < RouteOpcode::Scatter);
        assert!(RouteOpcode::EqualUnique.route_cost() < RouteOpcode::Scatter.route_cost());
    }

    #[test]
    fn test_cost_ordering() {
        let hash = Vindex::new("ks", "hash", VindexKind::Hash);
        let lookup_unique = Vindex::new("ks", "lu", VindexKind::LookupUnique);
        let lookup = Vindex::new("ks", "l", VindexKind::Lookup);

        let cheap = Cost::for_vindex(&hash, RouteOpcode::EqualUnique);
        let pricey = Cost::for_vindex(&lookup_unique, RouteOpcode::EqualUnique);
        assert!(cheap < pricey);
        assert!(pricey < Cost::for_vindex(&lookup, RouteOpcode::Equal));
        assert!(Cost::for_vindex(&hash, RouteOpcode::In) < Cost::for_opcode(RouteOpcode::Scatter));
        assert_eq!(cheap.cmp(&Cost::for_vindex(&hash, RouteOpcode::EqualUnique)), Ordering::Equal);
    }

    #[test]
    fn test_unique_beats_non_unique_in_same_class() {
        let unique = Cost {
            opcode: RouteOpcode::Equal,
            vindex_cost: 20,
            is_unique: true,
        };
        let non_unique = Cost {
            opcode: RouteOpcode::Equal,
            vindex_cost: 1,
            is_unique: false,
        };
        assert!(unique < non_unique);
    }
}
