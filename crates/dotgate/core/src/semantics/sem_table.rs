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

use dotgate_common::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use super::expr::{ColName, Expr};
use super::table_set::{MAX_TABLES, TableSet};

/// Possibly keyspace-qualified table name as written in the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    #[serde(default)]
    pub qualifier: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: &str) -> Self {
        Self { qualifier: None, name: name.to_string() }
    }

    pub fn qualified(qualifier: &str, name: &str) -> Self {
        Self {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub alias: String,
    pub name: TableName,
}

/// Semantic information gathered about one statement: which table each bit of
/// a [`TableSet`] stands for, and which expressions are known to be equal.
///
/// Equalities grow while planning, as column to column comparisons get pushed
/// into routes, so each planning call works on its own copy.
#[derive(Debug, Clone, Default)]
pub struct SemTable {
    tables: Vec<TableInfo>,
    equalities: HashMap<Expr, Vec<Expr>>,
}

impl SemTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the next table reference and returns its id.
    pub fn add_table(&mut self, alias: &str, name: TableName) -> PlannerResult<TableSet> {
        if self.tables.len() >= MAX_TABLES {
            return Err(PlannerError::unsupported(format!("more than {MAX_TABLES} table references in one statement")));
        }
        let id = TableSet::single(self.tables.len());
        self.tables.push(TableInfo { alias: alias.to_string(), name });
        Ok(id)
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn table_info(&self, id: TableSet) -> Option<&TableInfo> {
        id.table_offset().and_then(|offset| self.tables.get(offset))
    }

    /// Every table the column is bound to. Without derived tables this is just the binding.
    pub fn direct_deps(&self, col: &ColName) -> TableSet {
        col.table
    }

    pub fn recursive_deps(&self, expr: &Expr) -> TableSet {
        let mut deps = TableSet::EMPTY;
        expr.walk_columns(&mut |col| deps = deps.merge(self.direct_deps(col)));
        deps
    }

    /// Records that `left` and `right` always hold the same value.
    pub fn add_column_equality(&mut self, left: &Expr, right: &Expr) {
        if left == right {
            return;
        }
        for (from, to) in [(left, right), (right, left)] {
            let known = self.equalities.entry(from.clone()).or_default();
            if !known.contains(to) {
                known.push(to.clone());
            }
        }
    }

    /// `expr` followed by every expression transitively known to equal it, in discovery order.
    pub fn expr_and_equalities(&self, expr: &Expr) -> Vec<Expr> {
        let mut result = vec![expr.clone()];
        let mut seen: HashSet<&Expr> = HashSet::from([expr]);
        let mut queue: VecDeque<&Expr> = VecDeque::from([expr]);
        while let Some(current) = queue.pop_front() {
            let Some(equal) = self.equalities.get(current) else {
                continue;
            };
            for other in equal {
                if seen.insert(other) {
                    result.push(other.clone());
                    queue.push_back(other);
                }
            }
        }
        result
    }
}
