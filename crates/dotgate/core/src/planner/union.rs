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

use dotgate_common::error::{ER_WRONG_NUMBER_OF_COLUMNS_IN_SELECT, SQLSTATE_CARDINALITY_VIOLATION};
use dotgate_common::{PlannerError, PlannerResult, StatementError};
use metrics::counter;

use super::context::PlanningContext;
use super::cost::RouteOpcode;
use super::create_physical_operator;
use super::merge::values_equal;
use super::operators::{PhysicalOperator, Union};
use super::route::Route;
use crate::query::{Concatenate, Lock};

/// Plans a set operation. Arms that can run as one statement on the same
/// shards are sent down together, the rest are concatenated by the proxy.
pub fn plan_union(ctx: &mut PlanningContext<'_>, concat: &Concatenate) -> PlannerResult<PhysicalOperator> {
    if concat.with.is_some() {
        return Err(PlannerError::unsupported("with expression in union statement"));
    }
    if concat.sources.iter().any(|arm| arm.calc_found_rows) {
        return Err(PlannerError::unsupported("SQL_CALC_FOUND_ROWS not supported with union"));
    }
    let expected = concat.sources.first().map(|arm| arm.columns).unwrap_or(0);
    if concat.sources.iter().any(|arm| arm.columns != expected) {
        return Err(StatementError::new(ER_WRONG_NUMBER_OF_COLUMNS_IN_SELECT, SQLSTATE_CARDINALITY_VIOLATION, "The used SELECT statements have a different number of columns")
            .with_query(&concat.sql)
            .into());
    }

    let mut sources: Vec<PhysicalOperator> = Vec::with_capacity(concat.sources.len());
    for arm in &concat.sources {
        let mut planned = create_physical_operator(ctx, &arm.operator)?.ok_or_else(|| PlannerError::internal("union arm without tables"))?;
        if arm.lock != Lock::None {
            planned.set_lock(arm.lock);
        }

        let merged = match sources.last() {
            Some(previous) if ctx.config.union_merge => union_route_merge(ctx, previous, &planned, concat.distinct),
            _ => None,
        };
        match merged {
            Some(route) => {
                counter!("dotgate_planner_route_fusions_total", 1, "rule" => "union");
                ctx.tracer.routes_fused("union", &route);
                if let Some(last) = sources.last_mut() {
                    *last = PhysicalOperator::Route(route);
                }
            }
            None => sources.push(planned),
        }
    }

    let mut plan = if sources.len() == 1 {
        sources.pop().ok_or_else(|| PlannerError::internal("union lost its only arm"))?
    } else {
        PhysicalOperator::Union(Union {
            sources: flatten(sources, concat.distinct),
            distinct: concat.distinct,
        })
    };
    if concat.lock != Lock::None {
        plan.set_lock(concat.lock);
    }
    Ok(plan)
}

/// Inlines nested unions with the same distinct flag.
fn flatten(sources: Vec<PhysicalOperator>, distinct: bool) -> Vec<PhysicalOperator> {
    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        match source {
            PhysicalOperator::Union(inner) if inner.distinct == distinct => out.extend(inner.sources),
            other => out.push(other),
        }
    }
    out
}

/// Fuses two planned arms into one route when both are routes that would
/// hit the same shards with the same lock.
fn union_route_merge(ctx: &PlanningContext<'_>, lhs: &PhysicalOperator, rhs: &PhysicalOperator, distinct: bool) -> Option<Route> {
    let (a, b) = (lhs.as_route()?, rhs.as_route()?);
    if a.keyspace.name != b.keyspace.name || a.lock != b.lock || a.opcode != b.opcode {
        return None;
    }
    let compatible = match a.opcode {
        RouteOpcode::Unsharded | RouteOpcode::Reference | RouteOpcode::Dba => true,
        RouteOpcode::EqualUnique => a.selected_vindex().is_some() && a.selected_vindex() == b.selected_vindex() && values_equal(ctx, a.vindex_expressions(), b.vindex_expressions()),
        // Deduplication needs every row in one place.
        RouteOpcode::Scatter => !distinct,
        RouteOpcode::None | RouteOpcode::Equal | RouteOpcode::In | RouteOpcode::Next => false,
    };
    if !compatible {
        return None;
    }

    let source = PhysicalOperator::Union(Union {
        sources: flatten(vec![(*a.source).clone(), (*b.source).clone()], distinct),
        distinct,
    });
    let mut route = Route::new(source, a.opcode, a.keyspace.clone());
    route.vindex_preds = a.vindex_preds.iter().chain(b.vindex_preds.iter()).cloned().collect();
    route.selected = a.selected.clone();
    route.lock = a.lock;
    Some(route)
}
