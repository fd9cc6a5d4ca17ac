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
use std::collections::BTreeMap;
use std::sync::Arc;

use super::route::Route;
use crate::query::{Lock, QueryTable};
use crate::semantics::{ColName, Expr, TableSet};
use crate::vindexes::VTable;

/// A table reference with its catalog entry. Only ever found inside a route.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOp {
    pub qtable: QueryTable,
    pub vtable: Arc<VTable>,
}

/// Join executed by the proxy: every row from the left side feeds bind
/// variables into one execution of the right side.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyJoin {
    pub lhs: Box<PhysicalOperator>,
    pub rhs: Box<PhysicalOperator>,
    pub left_join: bool,
    /// Columns the left side must produce for the right side.
    pub lhs_columns: Vec<ColName>,
    /// Bind variable name to offset in `lhs_columns`.
    pub vars: BTreeMap<String, usize>,
    pub predicate: Option<Expr>,
}

impl ApplyJoin {
    pub fn new(lhs: PhysicalOperator, rhs: PhysicalOperator, left_join: bool) -> Self {
        Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            left_join,
            lhs_columns: Vec::new(),
            vars: BTreeMap::new(),
            predicate: None,
        }
    }

    /// Makes the left side produce `col` under `name` and returns its offset.
    pub fn add_join_var(&mut self, name: String, col: &ColName) -> usize {
        let offset = match self.lhs_columns.iter().position(|c| c == col) {
            Some(offset) => offset,
            None => {
                self.lhs_columns.push(col.clone());
                self.lhs_columns.len() - 1
            }
        };
        self.vars.insert(name, offset);
        offset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub source: Box<PhysicalOperator>,
    pub predicates: Vec<Expr>,
}

/// Set union of its sources. Inside a route it is sent down as SQL,
/// elsewhere the proxy concatenates and, when `distinct`, deduplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub sources: Vec<PhysicalOperator>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalOperator {
    Route(Route),
    ApplyJoin(ApplyJoin),
    Union(Union),
    Filter(Filter),
    Table(TableOp),
}

impl PhysicalOperator {
    pub fn table_id(&self) -> TableSet {
        match self {
            PhysicalOperator::Route(route) => route.source.table_id(),
            PhysicalOperator::ApplyJoin(join) => join.lhs.table_id().merge(join.rhs.table_id()),
            PhysicalOperator::Union(union) => union.sources.iter().fold(TableSet::EMPTY, |acc, s| acc.merge(s.table_id())),
            PhysicalOperator::Filter(filter) => filter.source.table_id(),
            PhysicalOperator::Table(table) => table.qtable.id,
        }
    }

    pub fn cost(&self) -> usize {
        match self {
            PhysicalOperator::Route(route) => route.cost(),
            PhysicalOperator::ApplyJoin(join) => join.lhs.cost() + join.rhs.cost(),
            PhysicalOperator::Union(union) => union.sources.iter().map(PhysicalOperator::cost).sum(),
            PhysicalOperator::Filter(filter) => filter.source.cost(),
            PhysicalOperator::Table(_) => 0,
        }
    }

    pub fn as_route(&self) -> Option<&Route> {
        match self {
            PhysicalOperator::Route(route) => Some(route),
            _ => None,
        }
    }

    /// Direct children of the operator.
    pub fn inputs(&self) -> Vec<&PhysicalOperator> {
        match self {
            PhysicalOperator::Route(route) => vec![route.source.as_ref()],
            PhysicalOperator::ApplyJoin(join) => vec![join.lhs.as_ref(), join.rhs.as_ref()],
            PhysicalOperator::Union(union) => union.sources.iter().collect(),
            PhysicalOperator::Filter(filter) => vec![filter.source.as_ref()],
            PhysicalOperator::Table(_) => Vec::new(),
        }
    }

    /// Pre-order walk. Returning `false` from `f` skips the operator's inputs.
    pub fn visit<F: FnMut(&PhysicalOperator) -> bool>(&self, f: &mut F) {
        if !f(self) {
            return;
        }
        for input in self.inputs() {
            input.visit(f);
        }
    }

    pub fn table_ops(&self) -> Vec<&TableOp> {
        let mut tables = Vec::new();
        self.collect_tables(&mut tables);
        tables
    }

    fn collect_tables<'a>(&'a self, out: &mut Vec<&'a TableOp>) {
        match self {
            PhysicalOperator::Table(table) => out.push(table),
            other => other.inputs().into_iter().for_each(|input| input.collect_tables(out)),
        }
    }

    pub fn routes(&self) -> Vec<&Route> {
        let mut routes = Vec::new();
        self.collect_routes(&mut routes);
        routes
    }

    fn collect_routes<'a>(&'a self, out: &mut Vec<&'a Route>) {
        match self {
            PhysicalOperator::Route(route) => out.push(route),
            other => other.inputs().into_iter().for_each(|input| input.collect_routes(out)),
        }
    }

    /// Applies a row lock to every route in the tree.
    pub fn set_lock(&mut self, lock: Lock) {
        match self {
            PhysicalOperator::Route(route) => route.lock = lock,
            PhysicalOperator::ApplyJoin(join) => {
                join.lhs.set_lock(lock);
                join.rhs.set_lock(lock);
            }
            PhysicalOperator::Union(union) => union.sources.iter_mut().for_each(|s| s.set_lock(lock)),
            PhysicalOperator::Filter(filter) => filter.source.set_lock(lock),
            PhysicalOperator::Table(_) => {}
        }
    }

    /// Verifies that no table is covered twice in the tree and returns the covered set.
    pub fn check_disjoint(&self) -> PlannerResult<TableSet> {
        let mut covered = TableSet::EMPTY;
        for input in self.inputs() {
            let solved = input.check_disjoint()?;
            if solved.is_overlapping(covered) {
                return Err(PlannerError::internal(format!("tables {} are covered twice", solved.intersect(covered))));
            }
            covered = covered.merge(solved);
        }
        if let PhysicalOperator::Table(table) = self {
            covered = table.qtable.id;
        }
        Ok(covered)
    }
}
