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

//! Predicate pushdown.
//!
//! Outside of routes a predicate travels down to the side of an apply join
//! that can evaluate it. Predicates needing both sides are split: the left
//! side's columns become bind variables and the rewritten predicate goes to
//! the right side, where it may narrow the right route down to one shard.

use dotgate_common::{PlannerError, PlannerResult};
use std::slice;

use super::context::PlanningContext;
use super::merge::{MergeMode, try_merge};
use super::operators::{ApplyJoin, Filter, PhysicalOperator};
use crate::semantics::{ColName, Expr, TableSet};

pub fn push_predicate(ctx: &mut PlanningContext<'_>, expr: Expr, op: PhysicalOperator) -> PlannerResult<PhysicalOperator> {
    match op {
        PhysicalOperator::Route(route) => Ok(PhysicalOperator::Route(route.push_predicate(ctx, expr)?)),
        PhysicalOperator::ApplyJoin(join) => push_into_apply_join(ctx, expr, join),
        PhysicalOperator::Filter(mut filter) => {
            filter.predicates.push(expr);
            Ok(PhysicalOperator::Filter(filter))
        }
        PhysicalOperator::Union(union) => Ok(PhysicalOperator::Filter(Filter {
            source: Box::new(PhysicalOperator::Union(union)),
            predicates: vec![expr],
        })),
        PhysicalOperator::Table(table) => Err(PlannerError::internal(format!("table {} reached outside of a route", table.qtable.alias))),
    }
}

fn push_into_apply_join(ctx: &mut PlanningContext<'_>, expr: Expr, mut join: ApplyJoin) -> PlannerResult<PhysicalOperator> {
    let deps = ctx.semtable.recursive_deps(&expr);
    let lhs_id = join.lhs.table_id();
    let rhs_id = join.rhs.table_id();

    // Outer join conditions never filter the outer side.
    if !join.left_join && deps.is_solved_by(lhs_id) {
        join.lhs = Box::new(push_predicate(ctx, expr, *join.lhs)?);
        return Ok(PhysicalOperator::ApplyJoin(join));
    }
    if deps.is_solved_by(rhs_id) {
        join.rhs = Box::new(push_predicate(ctx, expr, *join.rhs)?);
        return Ok(PhysicalOperator::ApplyJoin(join));
    }
    if !deps.is_solved_by(lhs_id.merge(rhs_id)) {
        return Err(PlannerError::internal(format!("predicate {expr} needs {deps}, the join only covers {}", lhs_id.merge(rhs_id))));
    }

    // A fresh join between two routes may still turn out to be co-located.
    if join.predicate.is_none() && join.lhs.as_route().is_some() && join.rhs.as_route().is_some() {
        if let Some(fused) = try_merge(ctx, &join.lhs, &join.rhs, slice::from_ref(&expr), !join.left_join, MergeMode::Join)? {
            return Ok(fused);
        }
    }

    let (vars, rewritten) = break_expression(ctx, &expr, lhs_id, &join);
    for (name, col) in vars {
        join.add_join_var(name, &col);
    }
    join.rhs = Box::new(push_predicate(ctx, rewritten, *join.rhs)?);
    join.predicate = Some(match join.predicate.take() {
        Some(existing) => Expr::and(existing, expr),
        None => expr,
    });
    Ok(PhysicalOperator::ApplyJoin(join))
}

/// Replaces the columns `lhs` can produce with bind variables. Returns the
/// variables to wire up along with the rewritten predicate.
fn break_expression(ctx: &PlanningContext<'_>, expr: &Expr, lhs: TableSet, join: &ApplyJoin) -> (Vec<(String, ColName)>, Expr) {
    let semtable = &ctx.semtable;
    let mut vars: Vec<(String, ColName)> = Vec::new();
    let rewritten = expr.rewrite_columns(&mut |col| {
        let deps = semtable.direct_deps(col);
        if deps.is_empty() || !deps.is_solved_by(lhs) {
            return None;
        }
        if let Some((name, _)) = vars.iter().find(|(_, c)| c == col) {
            return Some(Expr::Argument(name.clone()));
        }
        let name = unique_var_name(col, join, &vars);
        vars.push((name.clone(), col.clone()));
        Some(Expr::Argument(name))
    });
    (vars, rewritten)
}

fn unique_var_name(col: &ColName, join: &ApplyJoin, pending: &[(String, ColName)]) -> String {
    let base = col.bind_var_name();
    let taken = |name: &str| {
        let by_join = join.vars.get(name).is_some_and(|offset| join.lhs_columns.get(*offset) != Some(col));
        by_join || pending.iter().any(|(n, _)| n == name)
    };
    if !taken(&base) {
        return base;
    }
    (1..).map(|i| format!("{base}{i}")).find(|name| !taken(name)).unwrap_or(base)
}

/// Pushes a predicate into the operators a route sends down as one statement.
pub fn push_into_route_source(ctx: &mut PlanningContext<'_>, expr: Expr, op: PhysicalOperator) -> PlannerResult<PhysicalOperator> {
    match op {
        PhysicalOperator::Table(table) => Ok(PhysicalOperator::Filter(Filter {
            source: Box::new(PhysicalOperator::Table(table)),
            predicates: vec![expr],
        })),
        PhysicalOperator::Filter(mut filter) => {
            filter.predicates.push(expr);
            Ok(PhysicalOperator::Filter(filter))
        }
        PhysicalOperator::ApplyJoin(mut join) => {
            let deps = ctx.semtable.recursive_deps(&expr);
            if !join.left_join && deps.is_solved_by(join.lhs.table_id()) {
                join.lhs = Box::new(push_into_route_source(ctx, expr, *join.lhs)?);
            } else if !deps.is_empty() && deps.is_solved_by(join.rhs.table_id()) {
                join.rhs = Box::new(push_into_route_source(ctx, expr, *join.rhs)?);
            } else {
                join.predicate = Some(match join.predicate.take() {
                    Some(existing) => Expr::and(existing, expr),
                    None => expr,
                });
            }
            Ok(PhysicalOperator::ApplyJoin(join))
        }
        PhysicalOperator::Union(union) => Ok(PhysicalOperator::Filter(Filter {
            source: Box::new(PhysicalOperator::Union(union)),
            predicates: vec![expr],
        })),
        PhysicalOperator::Route(_) => Err(PlannerError::internal("route nested inside another route")),
    }
}
