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

use tracing::debug;

use super::operators::PhysicalOperator;
use super::route::Route;
use crate::semantics::TableSet;

/// Receives planner decisions as they are made. Passed in by the caller of
/// the planner rather than toggled globally.
#[cfg_attr(test, mockall::automock)]
pub trait PlanTracer: Send + Sync {
    /// Two routes were fused into `route` by the named rule.
    fn routes_fused(&self, rule: &str, route: &Route);

    /// Fusion was refused and the proxy will join the two sides.
    fn apply_join_built(&self, lhs: TableSet, rhs: TableSet, predicates: usize);

    /// The greedy search found a cheaper candidate than any seen so far this round.
    fn best_candidate(&self, candidate: &PhysicalOperator, cost: usize);
}

/// Forwards planner decisions to `tracing` when verbose.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer {
    verbose: bool,
}

impl LogTracer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl PlanTracer for LogTracer {
    fn routes_fused(&self, rule: &str, route: &Route) {
        if self.verbose {
            debug!(rule, tables = %route.table_id(), opcode = %route.opcode, keyspace = %route.keyspace.name, "fused routes");
        }
    }

    fn apply_join_built(&self, lhs: TableSet, rhs: TableSet, predicates: usize) {
        if self.verbose {
            debug!(lhs = %lhs, rhs = %rhs, predicates, "built apply join");
        }
    }

    fn best_candidate(&self, candidate: &PhysicalOperator, cost: usize) {
        if self.verbose {
            debug!(tables = %candidate.table_id(), cost, "new best join candidate");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl PlanTracer for NoopTracer {
    fn routes_fused(&self, _rule: &str, _route: &Route) {}

    fn apply_join_built(&self, _lhs: TableSet, _rhs: TableSet, _predicates: usize) {}

    fn best_candidate(&self, _candidate: &PhysicalOperator, _cost: usize) {}
}
