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

use crate::semantics::{Expr, SemTable, TableName, TableSet, and_expressions};

/// One table reference of the query along with the predicates that only touch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTable {
    pub id: TableSet,
    pub alias: String,
    pub table: TableName,
    pub predicates: Vec<Expr>,
    pub is_inf_schema: bool,
}

impl QueryTable {
    pub fn new(id: TableSet, alias: &str, table: TableName) -> Self {
        let is_inf_schema = table.qualifier.as_deref().is_some_and(|q| q.eq_ignore_ascii_case("information_schema"));
        Self {
            id,
            alias: alias.to_string(),
            table,
            predicates: Vec::new(),
            is_inf_schema,
        }
    }
}

/// Predicates that depend on exactly the tables in `deps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerJoin {
    pub deps: TableSet,
    pub predicates: Vec<Expr>,
}

/// Tables joined by inner joins, with their predicates filed by dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryGraph {
    pub tables: Vec<QueryTable>,
    pub inner_joins: Vec<InnerJoin>,
    /// Predicates that reference no table at all.
    pub no_deps: Option<Expr>,
}

impl QueryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_id(&self) -> TableSet {
        self.tables.iter().fold(TableSet::EMPTY, |acc, t| acc.merge(t.id))
    }

    pub fn add_table(&mut self, table: QueryTable) {
        self.tables.push(table);
    }

    /// Files `expr` under the table or table pair it depends on.
    pub fn collect_predicate(&mut self, expr: Expr, semtable: &SemTable) -> PlannerResult<()> {
        let deps = semtable.recursive_deps(&expr);
        match deps.num_tables() {
            0 => {
                let combined = match self.no_deps.take() {
                    Some(existing) => Expr::and(existing, expr),
                    None => expr,
                };
                self.no_deps = Some(combined);
            }
            1 => {
                let table = self
                    .tables
                    .iter_mut()
                    .find(|t| t.id == deps)
                    .ok_or_else(|| PlannerError::internal(format!("predicate {expr} depends on {deps} which is not part of the query graph")))?;
                table.predicates.push(expr);
            }
            _ => match self.inner_joins.iter_mut().find(|join| join.deps == deps) {
                Some(join) => join.predicates.push(expr),
                None => self.inner_joins.push(InnerJoin { deps, predicates: vec![expr] }),
            },
        }
        Ok(())
    }

    /// Join predicates connecting `lhs` and `rhs`: only those needing tables
    /// from both sides and nothing from outside them.
    pub fn get_predicates(&self, lhs: TableSet, rhs: TableSet) -> Vec<Expr> {
        let both = lhs.merge(rhs);
        self.inner_joins
            .iter()
            .filter(|join| join.deps.is_solved_by(both) && join.deps.is_overlapping(lhs) && join.deps.is_overlapping(rhs))
            .flat_map(|join| join.predicates.iter().cloned())
            .collect()
    }
}

/// Row lock requested by a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lock {
    #[default]
    None,
    ForUpdate,
    ShareMode,
}

impl Lock {
    pub fn as_sql(self) -> &'static str {
        match self {
            Lock::None => "",
            Lock::ForUpdate => " for update",
            Lock::ShareMode => " lock in share mode",
        }
    }
}

/// One arm of a set operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectArm {
    pub operator: LogicalOperator,
    pub columns: usize,
    pub lock: Lock,
    pub calc_found_rows: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concatenate {
    pub distinct: bool,
    /// Name of a `WITH` clause attached to the union, if any.
    pub with: Option<String>,
    pub lock: Lock,
    pub sources: Vec<SelectArm>,
    /// Statement text, reported back with user errors.
    pub sql: String,
}

/// The logical operator tree handed to the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalOperator {
    QueryGraph(QueryGraph),
    Join {
        lhs: Box<LogicalOperator>,
        rhs: Box<LogicalOperator>,
        predicate: Option<Expr>,
        left_join: bool,
    },
    Concatenate(Concatenate),
}

impl LogicalOperator {
    pub fn table_id(&self) -> TableSet {
        match self {
            LogicalOperator::QueryGraph(qg) => qg.table_id(),
            LogicalOperator::Join { lhs, rhs, .. } => lhs.table_id().merge(rhs.table_id()),
            LogicalOperator::Concatenate(concat) => concat.sources.iter().fold(TableSet::EMPTY, |acc, arm| acc.merge(arm.operator.table_id())),
        }
    }

    pub fn join(lhs: LogicalOperator, rhs: LogicalOperator, predicates: &[Expr], left_join: bool) -> LogicalOperator {
        LogicalOperator::Join {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            predicate: and_expressions(predicates),
            left_join,
        }
    }
}
