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

//! Minimal statement analysis.
//!
//! Turns a [`QuerySpec`] document into the logical operator tree the planner
//! consumes: table references get their ids, columns get bound to tables and
//! predicates get filed by the tables they depend on.

use dotgate_common::error::{ER_BAD_FIELD_ERROR, ER_NON_UNIQ_ERROR, ER_NONUNIQ_TABLE, SQLSTATE_BAD_FIELD, SQLSTATE_INTEGRITY_VIOLATION, SQLSTATE_SYNTAX_OR_ACCESS};
use dotgate_common::{PlannerError, PlannerResult, StatementError};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::query_graph::{Concatenate, Lock, LogicalOperator, QueryGraph, QueryTable, SelectArm};
use crate::semantics::{ColName, Expr, SemTable, TableName, TableSet, split_and_expression};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySpec {
    Select(SelectSpec),
    Union(UnionSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectSpec {
    pub from: Vec<TableRef>,
    #[serde(default)]
    pub left_joins: Vec<LeftJoinSpec>,
    #[serde(default)]
    pub predicates: Vec<Expr>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub lock: Lock,
    #[serde(default)]
    pub calc_found_rows: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub keyspace: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keyspace: None,
            alias: None,
        }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            ..Self::new(name)
        }
    }

    pub fn in_keyspace(mut self, keyspace: &str) -> Self {
        self.keyspace = Some(keyspace.to_string());
        self
    }

    fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn table_name(&self) -> TableName {
        TableName {
            qualifier: self.keyspace.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftJoinSpec {
    pub table: TableRef,
    #[serde(default)]
    pub on: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionSpec {
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub with: Option<String>,
    #[serde(default)]
    pub lock: Lock,
    pub arms: Vec<QuerySpec>,
}

/// An analyzed statement, ready for planning.
#[derive(Debug, Clone)]
pub struct Statement {
    pub operator: LogicalOperator,
    pub semtable: SemTable,
    /// Number of result columns, taken from the first arm for unions.
    pub columns: usize,
    /// Row lock of a plain select. Unions carry theirs on the `Concatenate`.
    pub lock: Lock,
    pub sql: String,
}

pub fn analyze(spec: &QuerySpec) -> PlannerResult<Statement> {
    let mut semtable = SemTable::new();
    let sql = spec.to_string();
    let (operator, columns) = Analyzer { semtable: &mut semtable, sql: &sql }.analyze(spec)?;
    let lock = match spec {
        QuerySpec::Select(select) => select.lock,
        QuerySpec::Union(_) => Lock::None,
    };
    Ok(Statement {
        operator,
        semtable,
        columns,
        lock,
        sql,
    })
}

struct Analyzer<'a> {
    semtable: &'a mut SemTable,
    sql: &'a str,
}

type Scope = Vec<(String, TableSet)>;

impl Analyzer<'_> {
    fn analyze(&mut self, spec: &QuerySpec) -> PlannerResult<(LogicalOperator, usize)> {
        match spec {
            QuerySpec::Select(select) => Ok((self.analyze_select(select)?, select.columns.len())),
            QuerySpec::Union(union) => self.analyze_union(union),
        }
    }

    fn analyze_union(&mut self, union: &UnionSpec) -> PlannerResult<(LogicalOperator, usize)> {
        let mut sources = Vec::with_capacity(union.arms.len());
        for arm in &union.arms {
            let (operator, columns) = self.analyze(arm)?;
            let (lock, calc_found_rows) = match arm {
                QuerySpec::Select(select) => (select.lock, select.calc_found_rows),
                QuerySpec::Union(inner) => (inner.lock, false),
            };
            sources.push(SelectArm {
                operator,
                columns,
                lock,
                calc_found_rows,
            });
        }
        let columns = sources.first().map(|arm| arm.columns).unwrap_or(0);
        let concat = Concatenate {
            distinct: union.distinct,
            with: union.with.clone(),
            lock: union.lock,
            sources,
            sql: self.sql.to_string(),
        };
        Ok((LogicalOperator::Concatenate(concat), columns))
    }

    fn analyze_select(&mut self, select: &SelectSpec) -> PlannerResult<LogicalOperator> {
        let mut scope = Scope::new();
        let mut qg = QueryGraph::new();
        for table_ref in &select.from {
            let id = self.declare(&mut scope, table_ref)?;
            qg.add_table(QueryTable::new(id, table_ref.effective_alias(), table_ref.table_name()));
        }

        let mut outer_joined = TableSet::EMPTY;
        let mut joins = Vec::with_capacity(select.left_joins.len());
        for join in &select.left_joins {
            let id = self.declare(&mut scope, &join.table)?;
            outer_joined = outer_joined.merge(id);
            let mut rhs = QueryGraph::new();
            rhs.add_table(QueryTable::new(id, join.table.effective_alias(), join.table.table_name()));
            let on = self.bind_all(&scope, &join.on, "on clause")?;
            joins.push((rhs, on));
        }

        for predicate in self.bind_all(&scope, &select.predicates, "where clause")? {
            if self.semtable.recursive_deps(&predicate).is_overlapping(outer_joined) {
                return Err(PlannerError::unsupported("cross-shard left join and where clause"));
            }
            qg.collect_predicate(predicate, self.semtable)?;
        }

        let mut operator = LogicalOperator::QueryGraph(qg);
        for (rhs, on) in joins {
            operator = LogicalOperator::join(operator, LogicalOperator::QueryGraph(rhs), &on, true);
        }
        Ok(operator)
    }

    fn declare(&mut self, scope: &mut Scope, table_ref: &TableRef) -> PlannerResult<TableSet> {
        let alias = table_ref.effective_alias();
        if scope.iter().any(|(existing, _)| existing == alias) {
            return Err(StatementError::new(ER_NONUNIQ_TABLE, SQLSTATE_SYNTAX_OR_ACCESS, format!("Not unique table/alias: '{alias}'")).with_query(self.sql).into());
        }
        let id = self.semtable.add_table(alias, table_ref.table_name())?;
        scope.push((alias.to_string(), id));
        Ok(id)
    }

    /// Binds the columns of every predicate and splits conjunctions.
    fn bind_all(&self, scope: &Scope, predicates: &[Expr], clause: &str) -> PlannerResult<Vec<Expr>> {
        let mut out = Vec::new();
        for predicate in predicates {
            let mut bound = predicate.clone();
            bound.walk_columns_mut(&mut |col: &mut ColName| self.bind_column(scope, col, clause))?;
            split_and_expression(&mut out, &bound);
        }
        Ok(out)
    }

    fn bind_column(&self, scope: &Scope, col: &mut ColName, clause: &str) -> PlannerResult<()> {
        let found = match &col.qualifier {
            Some(qualifier) => scope.iter().find(|(alias, _)| alias == qualifier).map(|(_, id)| *id),
            None if scope.len() == 1 => scope.first().map(|(_, id)| *id),
            None => {
                let msg = format!("Column '{}' in {} is ambiguous", col.name, clause);
                return Err(StatementError::new(ER_NON_UNIQ_ERROR, SQLSTATE_INTEGRITY_VIOLATION, msg).with_query(self.sql).into());
            }
        };
        match found {
            Some(id) => {
                col.table = id;
                Ok(())
            }
            None => {
                let msg = format!("Unknown column '{}' in '{}'", col, clause);
                Err(StatementError::new(ER_BAD_FIELD_ERROR, SQLSTATE_BAD_FIELD, msg).with_query(self.sql).into())
            }
        }
    }
}

fn write_table_ref(f: &mut fmt::Formatter<'_>, table: &TableRef) -> fmt::Result {
    write!(f, "{}", table.table_name())?;
    if let Some(alias) = &table.alias {
        write!(f, " as {alias}")?;
    }
    Ok(())
}

fn write_conjunction(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, " and ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuerySpec::Select(select) => {
                write!(f, "select ")?;
                if select.calc_found_rows {
                    write!(f, "sql_calc_found_rows ")?;
                }
                if select.columns.is_empty() {
                    write!(f, "*")?;
                } else {
                    write!(f, "{}", select.columns.join(", "))?;
                }
                write!(f, " from ")?;
                for (i, table) in select.from.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_table_ref(f, table)?;
                }
                for join in &select.left_joins {
                    write!(f, " left join ")?;
                    write_table_ref(f, &join.table)?;
                    if !join.on.is_empty() {
                        write!(f, " on ")?;
                        write_conjunction(f, &join.on)?;
                    }
                }
                if !select.predicates.is_empty() {
                    write!(f, " where ")?;
                    write_conjunction(f, &select.predicates)?;
                }
                write!(f, "{}", select.lock.as_sql())
            }
            QuerySpec::Union(union) => {
                if let Some(with) = &union.with {
                    write!(f, "with {with} ")?;
                }
                let separator = if union.distinct { " union " } else { " union all " };
                for (i, arm) in union.arms.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{separator}")?;
                    }
                    match arm {
                        QuerySpec::Union(_) => write!(f, "({arm})")?,
                        QuerySpec::Select(_) => write!(f, "{arm}")?,
                    }
                }
                write!(f, "{}", union.lock.as_sql())
            }
        }
    }
}
