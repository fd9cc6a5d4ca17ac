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

//! Route fusion.
//!
//! Decides whether two routes can run as one statement. Getting this wrong
//! returns wrong rows, so every rule only fuses when the shards involved are
//! provably the same. The rules are tried in order and the first one that
//! applies has the final say.

use dotgate_common::{PlannerError, PlannerResult};
use metrics::counter;
use std::sync::Arc;

use super::context::PlanningContext;
use super::cost::RouteOpcode;
use super::operators::{ApplyJoin, PhysicalOperator};
use super::pushdown::push_predicate;
use super::route::Route;
use crate::semantics::{ComparisonOp, Expr, split_and_expression};
use crate::vindexes::Vindex;

/// What the fused routes stand for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Two sides of a join. When fusion is refused the proxy joins them.
    Join,
    /// A correlated subquery and its outer query. There is no proxy side
    /// fallback, so a cross-keyspace pair is an error.
    CorrelatedSubquery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionRule {
    ReferenceTable,
    SameUnshardedKeyspace,
    SameShard,
    ColocatedJoin,
}

enum Verdict {
    Skip,
    Refuse,
    Fuse,
}

impl FusionRule {
    pub const ORDERED: [FusionRule; 4] = [FusionRule::ReferenceTable, FusionRule::SameUnshardedKeyspace, FusionRule::SameShard, FusionRule::ColocatedJoin];

    pub fn name(self) -> &'static str {
        match self {
            FusionRule::ReferenceTable => "reference_table",
            FusionRule::SameUnshardedKeyspace => "same_unsharded_keyspace",
            FusionRule::SameShard => "same_shard",
            FusionRule::ColocatedJoin => "colocated_join",
        }
    }

    fn evaluate(self, ctx: &PlanningContext<'_>, a: &Route, b: &Route, predicates: &[Expr], inner: bool, mode: MergeMode) -> PlannerResult<Verdict> {
        let same_keyspace = a.keyspace.name == b.keyspace.name;
        let verdict = match self {
            FusionRule::ReferenceTable => {
                let either_reference = a.opcode == RouteOpcode::Reference || b.opcode == RouteOpcode::Reference;
                // Every shard holds the whole outer side when it is a
                // reference table, so it may only follow the inner side
                // onto a single shard.
                let outer_spread = !inner && b.opcode != RouteOpcode::Reference && !b.is_dual_table() && !b.opcode.is_single_shard();
                if either_reference && !outer_spread && (same_keyspace || a.is_dual_table() || b.is_dual_table()) { Verdict::Fuse } else { Verdict::Skip }
            }
            FusionRule::SameUnshardedKeyspace => {
                if same_keyspace && a.opcode == b.opcode && matches!(a.opcode, RouteOpcode::Unsharded | RouteOpcode::Dba) {
                    Verdict::Fuse
                } else {
                    Verdict::Skip
                }
            }
            FusionRule::SameShard => {
                let both_unique = a.opcode == RouteOpcode::EqualUnique && b.opcode == RouteOpcode::EqualUnique;
                if both_unique && same_keyspace && a.selected_vindex().is_some() && a.selected_vindex() == b.selected_vindex() && values_equal(ctx, a.vindex_expressions(), b.vindex_expressions()) {
                    Verdict::Fuse
                } else {
                    Verdict::Skip
                }
            }
            FusionRule::ColocatedJoin => {
                if !a.opcode.is_sharded_class() && !b.opcode.is_sharded_class() {
                    Verdict::Skip
                } else if predicates.is_empty() {
                    Verdict::Refuse
                } else if !same_keyspace {
                    if mode == MergeMode::CorrelatedSubquery {
                        return Err(PlannerError::unsupported("cross-shard correlated subquery"));
                    }
                    Verdict::Refuse
                } else if a.opcode.is_sharded_class() && b.opcode.is_sharded_class() && can_merge_on_filters(ctx, a, b, predicates) {
                    Verdict::Fuse
                } else {
                    Verdict::Refuse
                }
            }
        };
        Ok(verdict)
    }

    fn fuse(self, ctx: &mut PlanningContext<'_>, a: &Route, b: &Route, predicates: &[Expr], inner: bool) -> PlannerResult<Route> {
        let mut route = build_fused_route(ctx, a, b, predicates, inner)?;
        match self {
            FusionRule::ReferenceTable => {
                // The reference side narrows nothing, the other side decides.
                // `dual` belongs to no keyspace in particular and never decides.
                let other = if b.is_dual_table() || (a.opcode != RouteOpcode::Reference && !a.is_dual_table()) { a } else { b };
                route.opcode = other.opcode;
                route.selected = other.selected.clone();
                route.keyspace = other.keyspace.clone();
            }
            FusionRule::ColocatedJoin => route.pick_best_available_vindex(),
            FusionRule::SameUnshardedKeyspace | FusionRule::SameShard => {}
        }
        Ok(route)
    }
}

/// Tries to fuse `a` and `b` into one route. `Ok(None)` means the two must
/// stay apart; the inputs are never modified.
pub fn try_merge(ctx: &mut PlanningContext<'_>, a: &PhysicalOperator, b: &PhysicalOperator, predicates: &[Expr], inner: bool, mode: MergeMode) -> PlannerResult<Option<PhysicalOperator>> {
    let (Some(a), Some(b)) = (a.as_route(), b.as_route()) else {
        return Ok(None);
    };
    for rule in FusionRule::ORDERED {
        match rule.evaluate(ctx, a, b, predicates, inner, mode)? {
            Verdict::Skip => continue,
            Verdict::Refuse => return Ok(None),
            Verdict::Fuse => {
                let route = rule.fuse(ctx, a, b, predicates, inner)?;
                counter!("dotgate_planner_route_fusions_total", 1, "rule" => rule.name());
                ctx.tracer.routes_fused(rule.name(), &route);
                return Ok(Some(PhysicalOperator::Route(route)));
            }
        }
    }
    Ok(None)
}

/// Combines two operators into one covering both, fusing their routes when
/// sharding allows and joining them at the proxy otherwise.
pub fn merge_or_join(ctx: &mut PlanningContext<'_>, lhs: &PhysicalOperator, rhs: &PhysicalOperator, predicates: &[Expr], inner: bool) -> PlannerResult<PhysicalOperator> {
    let (lhs_id, rhs_id) = (lhs.table_id(), rhs.table_id());
    if lhs_id.is_overlapping(rhs_id) {
        return Err(PlannerError::internal(format!("cannot combine {lhs_id} with {rhs_id}, they share tables")));
    }

    let combined = match try_merge(ctx, lhs, rhs, predicates, inner, MergeMode::Join)? {
        Some(merged) => merged,
        None => {
            let mut join = PhysicalOperator::ApplyJoin(ApplyJoin::new(lhs.clone(), rhs.clone(), !inner));
            for predicate in predicates {
                join = push_predicate(ctx, predicate.clone(), join)?;
            }
            counter!("dotgate_planner_apply_joins_total", 1);
            ctx.tracer.apply_join_built(lhs_id, rhs_id, predicates.len());
            join
        }
    };

    let solved = combined.table_id();
    if solved != lhs_id.merge(rhs_id) {
        return Err(PlannerError::internal(format!("combining {lhs_id} and {rhs_id} produced an operator solving {solved}")));
    }
    Ok(combined)
}

/// One route over the join of both sources. An inner join knows the union of
/// what both sides knew about their vindexes. An outer join keeps every row
/// of `a`, so only `a` may narrow the fused route.
fn build_fused_route(ctx: &mut PlanningContext<'_>, a: &Route, b: &Route, predicates: &[Expr], inner: bool) -> PlannerResult<Route> {
    let source = PhysicalOperator::ApplyJoin(ApplyJoin::new((*a.source).clone(), (*b.source).clone(), !inner));
    let mut route = Route::new(source, a.opcode, a.keyspace.clone());
    route.lock = a.lock;

    if !inner {
        route.vindex_preds = a.vindex_preds.clone();
        route.selected = a.selected.clone();
        for predicate in predicates {
            route = route.push_outer_join_condition(ctx, predicate.clone())?;
        }
        return Ok(route);
    }

    route.vindex_preds = a.vindex_preds.iter().chain(b.vindex_preds.iter()).cloned().collect();
    for predicate in predicates {
        route = route.push_predicate(ctx, predicate.clone())?;
    }
    if route.selected.is_none() && a.selected_vindex() == b.selected_vindex() {
        route.selected = a.selected.clone();
    }
    Ok(route)
}

/// True when both lists hold the same values, either written identically or
/// known equal through column equalities.
pub fn values_equal(ctx: &PlanningContext<'_>, a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a == b || ctx.semtable.expr_and_equalities(a).contains(b))
}

fn can_merge_on_filters(ctx: &PlanningContext<'_>, a: &Route, b: &Route, predicates: &[Expr]) -> bool {
    let mut filters = Vec::new();
    for predicate in predicates {
        split_and_expression(&mut filters, predicate);
    }
    filters.iter().any(|filter| can_merge_on_filter(ctx, a, b, filter))
}

/// A `x = y` filter proves co-location when `x` is bound to a unique vindex
/// on one route and `y` to that very vindex on the other.
fn can_merge_on_filter(ctx: &PlanningContext<'_>, a: &Route, b: &Route, filter: &Expr) -> bool {
    let Expr::Comparison {
        op: ComparisonOp::Equal,
        left,
        right,
    } = filter
    else {
        return false;
    };
    let (mut left, mut right) = (left.as_ref(), right.as_ref());
    let mut lhs_vindex = find_column_vindex(ctx, a, left);
    if lhs_vindex.is_none() {
        (left, right) = (right, left);
        lhs_vindex = find_column_vindex(ctx, a, left);
    }
    let Some(lhs_vindex) = lhs_vindex else {
        return false;
    };
    if !lhs_vindex.is_unique() {
        return false;
    }
    find_column_vindex(ctx, b, right).is_some_and(|rhs_vindex| rhs_vindex == lhs_vindex)
}

/// Single column vindex of `route` bound to `expr` or to a column known equal to it.
fn find_column_vindex(ctx: &PlanningContext<'_>, route: &Route, expr: &Expr) -> Option<Arc<Vindex>> {
    expr.as_column()?;
    let tables = route.source.table_ops();
    for candidate in ctx.semtable.expr_and_equalities(expr) {
        let Some(col) = candidate.as_column() else {
            continue;
        };
        let deps = ctx.semtable.direct_deps(col);
        if deps.is_empty() {
            continue;
        }
        for table in tables.iter().filter(|t| deps.is_solved_by(t.qtable.id)) {
            let found = table
                .vtable
                .column_vindexes
                .iter()
                .find(|cv| cv.single_column().is_some_and(|column| col.name_equals(column)));
            if let Some(cv) = found {
                return Some(cv.vindex.clone());
            }
        }
    }
    None
}
