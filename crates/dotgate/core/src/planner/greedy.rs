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

//! Greedy join ordering.
//!
//! Starts with one route per table and keeps combining the cheapest pair
//! until a single operator is left. Pairs are visited in list order, each in
//! both join orders, so equal costs always resolve to the same plan.

use dotgate_common::{PlannerError, PlannerResult};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::context::PlanningContext;
use super::merge::merge_or_join;
use super::operators::PhysicalOperator;
use super::pushdown::push_predicate;
use super::route::create_route_operator;
use crate::query::QueryGraph;
use crate::semantics::{Expr, TableSet, split_and_expression};

/// Unordered pair of table sets, the key of the join cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableSetPair {
    low: TableSet,
    high: TableSet,
}

impl TableSetPair {
    pub fn new(a: TableSet, b: TableSet) -> Self {
        if a <= b { Self { low: a, high: b } } else { Self { low: b, high: a } }
    }
}

/// Combined operators of one planning call. Dropped with the call.
#[derive(Debug, Default)]
pub struct JoinCache {
    entries: HashMap<TableSetPair, PhysicalOperator>,
}

impl JoinCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, lhs: TableSet, rhs: TableSet) -> Option<&PhysicalOperator> {
        self.entries.get(&TableSetPair::new(lhs, rhs))
    }

    fn insert(&mut self, lhs: TableSet, rhs: TableSet, op: PhysicalOperator) {
        self.entries.insert(TableSetPair::new(lhs, rhs), op);
    }
}

/// Plans the tables of `qg`. Returns `None` for a graph without tables.
pub fn greedy_solve(ctx: &mut PlanningContext<'_>, qg: &QueryGraph) -> PlannerResult<Option<PhysicalOperator>> {
    let mut ops = seed_operators(ctx, qg)?;
    if ops.is_empty() {
        return Ok(None);
    }

    let mut cache = JoinCache::new();
    let mut root = merge_route_ops(ctx, qg, &mut ops, &mut cache)?;

    if let Some(no_deps) = &qg.no_deps {
        let mut conjuncts = Vec::new();
        split_and_expression(&mut conjuncts, no_deps);
        for predicate in conjuncts {
            root = push_predicate(ctx, predicate, root)?;
        }
    }

    let covered = root.check_disjoint()?;
    if covered != qg.table_id() {
        return Err(PlannerError::internal(format!("plan covers {covered} but the query has {}", qg.table_id())));
    }
    debug!(tables = qg.tables.len(), cached_joins = cache.len(), cost = root.cost(), "solved query graph");
    Ok(Some(root))
}

fn seed_operators(ctx: &mut PlanningContext<'_>, qg: &QueryGraph) -> PlannerResult<Vec<PhysicalOperator>> {
    qg.tables.iter().map(|table| create_route_operator(ctx, table).map(PhysicalOperator::Route)).collect()
}

/// Folds `ops` into one operator, cheapest pair first.
pub fn merge_route_ops(ctx: &mut PlanningContext<'_>, qg: &QueryGraph, ops: &mut Vec<PhysicalOperator>, cache: &mut JoinCache) -> PlannerResult<PhysicalOperator> {
    let mut cross_joins_ok = false;
    while ops.len() > 1 {
        match find_best_join_op(ctx, qg, ops, cache, cross_joins_ok)? {
            Some((best, lhs, rhs)) => {
                // lhs < rhs, so removing rhs first keeps lhs valid.
                ops.remove(rhs);
                ops[lhs] = best;
                cross_joins_ok = false;
            }
            None if cross_joins_ok => {
                return Err(PlannerError::internal("no join candidate found even with cross joins allowed, should not happen"));
            }
            None => {
                trace!(remaining = ops.len(), "only cross joins left");
                cross_joins_ok = true;
            }
        }
    }
    ops.pop().ok_or_else(|| PlannerError::internal("no operators left to merge"))
}

fn find_best_join_op(
    ctx: &mut PlanningContext<'_>,
    qg: &QueryGraph,
    ops: &[PhysicalOperator],
    cache: &mut JoinCache,
    cross_joins_ok: bool,
) -> PlannerResult<Option<(PhysicalOperator, usize, usize)>> {
    let mut best: Option<(PhysicalOperator, usize, usize)> = None;
    for i in 0..ops.len() {
        for j in (i + 1)..ops.len() {
            let (lhs, rhs) = (&ops[i], &ops[j]);
            let predicates = qg.get_predicates(lhs.table_id(), rhs.table_id());
            if predicates.is_empty() && !cross_joins_ok {
                continue;
            }
            let candidate = get_join_op_for(ctx, cache, lhs, rhs, &predicates)?;
            let cost = candidate.cost();
            if best.as_ref().is_none_or(|(current, _, _)| cost < current.cost()) {
                ctx.tracer.best_candidate(&candidate, cost);
                best = Some((candidate, i, j));
            }
        }
    }
    Ok(best)
}

fn get_join_op_for(ctx: &mut PlanningContext<'_>, cache: &mut JoinCache, lhs: &PhysicalOperator, rhs: &PhysicalOperator, predicates: &[Expr]) -> PlannerResult<PhysicalOperator> {
    let (lhs_id, rhs_id) = (lhs.table_id(), rhs.table_id());
    if let Some(cached) = cache.get(lhs_id, rhs_id) {
        return Ok(cached.clone());
    }
    let mut joined = merge_or_join(ctx, lhs, rhs, predicates, true)?;
    // A proxy join costs less when the side that binds values for the other
    // runs first, so both orders are weighed. Ties keep list order.
    if joined.as_route().is_none() {
        let flipped = merge_or_join(ctx, rhs, lhs, predicates, true)?;
        if flipped.cost() < joined.cost() {
            joined = flipped;
        }
    }
    cache.insert(lhs_id, rhs_id, joined.clone());
    Ok(joined)
}
