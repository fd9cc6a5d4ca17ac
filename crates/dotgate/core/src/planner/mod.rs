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

//! Distributed Query Planner
//!
//! Turns an analyzed statement into a tree of physical operators: routes that
//! run on one or more shards, and proxy-side joins, unions and filters that
//! stitch their results together.
//!
//! # Core Components
//!
//! ## Routes and Vindex Selection
//! - One route per table to start with
//! - Pushed predicates offer vindex options, the cheapest wins
//!
//! ## Route Fusion
//! - Ordered rules decide whether two routes can run as one statement
//! - A refused fusion falls back to a proxy-side apply join
//!
//! ## Greedy Join Ordering
//! - Cheapest pairwise combination first, memoized per planning call
//!
//! ## Unions
//! - Compatible arms are sent down together, the rest are concatenated
//!
//! # Usage
//!
//! ```rust,ignore
//! let catalog = VSchemaCatalog::from_json(&vschema_json)?;
//! let statement = analyze(&query)?;
//! if let Some(plan) = QueryPlanner::new(&catalog).plan(&statement)? {
//!     println!("{}", describe(&plan));
//! }
//! ```

pub mod context;
pub mod cost;
pub mod explain;
pub mod greedy;
pub mod merge;
pub mod operators;
pub mod pushdown;
pub mod route;
pub mod tracer;
pub mod union;

pub use context::PlanningContext;
pub use cost::{Cost, RouteOpcode};
pub use explain::{PlanDescription, describe};
pub use greedy::{JoinCache, TableSetPair, greedy_solve};
pub use merge::{FusionRule, MergeMode, merge_or_join, try_merge};
pub use operators::{ApplyJoin, Filter, PhysicalOperator, TableOp, Union};
pub use route::{Route, VindexOption, VindexPlusPredicates, create_route_operator};
pub use tracer::{LogTracer, NoopTracer, PlanTracer};

use dotgate_common::{PlannerError, PlannerResult};
use metrics::counter;
use tracing::{debug, error, info};

use crate::config::PlannerConfig;
use crate::query::{Lock, LogicalOperator, Statement};
use crate::semantics::{Expr, split_and_expression};
use crate::vindexes::VSchema;

/// Plans one logical operator. `None` when it references no table.
pub fn create_physical_operator(ctx: &mut PlanningContext<'_>, op: &LogicalOperator) -> PlannerResult<Option<PhysicalOperator>> {
    match op {
        LogicalOperator::QueryGraph(qg) => greedy::greedy_solve(ctx, qg),
        LogicalOperator::Join { lhs, rhs, predicate, left_join } => {
            let (Some(lhs), Some(rhs)) = (create_physical_operator(ctx, lhs)?, create_physical_operator(ctx, rhs)?) else {
                return Err(PlannerError::internal("join side without tables"));
            };
            let mut predicates = Vec::new();
            if let Some(predicate) = predicate {
                split_and_expression(&mut predicates, predicate);
            }
            merge_or_join(ctx, &lhs, &rhs, &predicates, !left_join).map(Some)
        }
        LogicalOperator::Concatenate(concat) => union::plan_union(ctx, concat).map(Some),
    }
}

/// Entry point of the planner. Holds no state between calls, so one
/// instance can plan any number of statements.
pub struct QueryPlanner<'a> {
    vschema: &'a dyn VSchema,
    config: PlannerConfig,
    tracer: Box<dyn PlanTracer + 'a>,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(vschema: &'a dyn VSchema) -> Self {
        Self::with_config(vschema, PlannerConfig::default())
    }

    pub fn with_config(vschema: &'a dyn VSchema, config: PlannerConfig) -> Self {
        let tracer = Box::new(LogTracer::new(config.verbose));
        Self { vschema, config, tracer }
    }

    pub fn with_tracer(mut self, tracer: impl PlanTracer + 'a) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans `statement` into a physical operator tree covering every table
    /// it references. A statement without tables has nothing to plan and
    /// yields `Ok(None)`.
    pub fn plan(&self, statement: &Statement) -> PlannerResult<Option<PhysicalOperator>> {
        counter!("dotgate_planner_plans_total", 1);
        let result = self.plan_statement(statement);
        match &result {
            Ok(Some(plan)) => info!(tables = %plan.table_id(), cost = plan.cost(), routes = plan.routes().len(), "planned statement"),
            Ok(None) => debug!(query = %statement.sql, "statement references no tables"),
            Err(err) => {
                counter!("dotgate_planner_errors_total", 1, "kind" => format!("{:?}", err.kind()));
                if err.is_internal() {
                    error!(error = %err, query = %statement.sql, "planner invariant violated");
                } else {
                    debug!(error = %err, query = %statement.sql, "statement cannot be planned");
                }
            }
        }
        result
    }

    fn plan_statement(&self, statement: &Statement) -> PlannerResult<Option<PhysicalOperator>> {
        let tables = statement.semtable.num_tables();
        if tables > self.config.max_tables {
            return Err(PlannerError::unsupported(format!("statement references {tables} tables, at most {} are allowed", self.config.max_tables)));
        }

        let mut ctx = PlanningContext::new(self.vschema, statement.semtable.clone(), &self.config, self.tracer.as_ref());
        let Some(mut plan) = create_physical_operator(&mut ctx, &statement.operator)? else {
            return Ok(None);
        };

        let covered = plan.check_disjoint()?;
        let expected = statement.operator.table_id();
        if covered != expected {
            return Err(PlannerError::internal(format!("plan covers {covered} but the statement has {expected}")));
        }
        if statement.lock != Lock::None {
            plan.set_lock(statement.lock);
        }
        Ok(Some(plan))
    }

    /// Tries to run a correlated subquery inside the route of its outer
    /// query. `Ok(None)` means it has to be evaluated separately; routes in
    /// different keyspaces are an error since no such fallback exists for them.
    pub fn merge_correlated_subquery(&self, statement: &Statement, outer: &PhysicalOperator, inner: &PhysicalOperator, predicates: &[Expr]) -> PlannerResult<Option<PhysicalOperator>> {
        let mut ctx = PlanningContext::new(self.vschema, statement.semtable.clone(), &self.config, self.tracer.as_ref());
        try_merge(&mut ctx, outer, inner, predicates, true, MergeMode::CorrelatedSubquery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QuerySpec, SelectSpec, TableRef, analyze};
    use crate::vindexes::VSchemaCatalog;
    use super::tracer::MockPlanTracer;

    const VSCHEMA: &str = r#"{
        "keyspaces": {
            "main": {
                "tables": { "unsharded_a": {}, "unsharded_b": {} }
            },
            "user": {
                "sharded": true,
                "vindexes": { "user_index": { "type": "hash" } },
                "tables": {
                    "user": { "column_vindexes": [{ "column": "id", "name": "user_index" }] },
                    "user_extra": { "column_vindexes": [{ "column": "user_id", "name": "user_index" }] }
                }
            }
        }
    }"#;

    fn select(from: Vec<TableRef>, predicates: Vec<Expr>) -> Statement {
        analyze(&QuerySpec::Select(SelectSpec {
            from,
            predicates,
            columns: vec!["1".into()],
            ..Default::default()
        }))
        .unwrap()
    }

    #[test]
    fn test_unsharded_tables_fuse() {
        let catalog = VSchemaCatalog::from_json(VSCHEMA).unwrap();
        let stmt = select(vec![TableRef::new("unsharded_a"), TableRef::new("unsharded_b")], vec![]);
        let plan = QueryPlanner::new(&catalog).plan(&stmt).unwrap().unwrap();
        let route = plan.as_route().unwrap();
        assert_eq!(route.opcode, RouteOpcode::Unsharded);
        assert_eq!(route.table_id().num_tables(), 2);
    }

    #[test]
    fn test_tracer_sees_fusion() {
        let catalog = VSchemaCatalog::from_json(VSCHEMA).unwrap();
        let stmt = select(vec![TableRef::new("user"), TableRef::new("user_extra")], vec![Expr::eq(Expr::col("user", "id"), Expr::col("user_extra", "user_id"))]);

        let mut tracer = MockPlanTracer::new();
        tracer.expect_routes_fused().withf(|rule, _| rule == "colocated_join").times(1).return_const(());
        tracer.expect_best_candidate().times(1).return_const(());
        tracer.expect_apply_join_built().never();

        let plan = QueryPlanner::new(&catalog).with_tracer(tracer).plan(&stmt).unwrap().unwrap();
        assert_eq!(plan.as_route().unwrap().opcode, RouteOpcode::Scatter);
    }

    #[test]
    fn test_tracer_sees_apply_join() {
        let catalog = VSchemaCatalog::from_json(VSCHEMA).unwrap();
        let stmt = select(vec![TableRef::new("user"), TableRef::new("unsharded_a")], vec![]);

        let mut tracer = MockPlanTracer::new();
        tracer.expect_routes_fused().never();
        tracer.expect_best_candidate().times(1).return_const(());
        // Both join orders are built before the cheaper one is kept.
        tracer.expect_apply_join_built().withf(|_, _, predicates| *predicates == 0).times(2).return_const(());

        let plan = QueryPlanner::new(&catalog).with_tracer(tracer).plan(&stmt).unwrap().unwrap();
        assert!(matches!(plan, PhysicalOperator::ApplyJoin(_)));
    }

    #[test]
    fn test_statement_without_tables_plans_to_nothing() {
        let catalog = VSchemaCatalog::from_json(VSCHEMA).unwrap();
        let stmt = select(vec![], vec![]);
        assert_eq!(QueryPlanner::new(&catalog).plan(&stmt), Ok(None));
    }

    #[test]
    fn test_max_tables_is_enforced() {
        let catalog = VSchemaCatalog::from_json(VSCHEMA).unwrap();
        let stmt = select(vec![TableRef::new("unsharded_a"), TableRef::new("unsharded_b")], vec![]);
        let config = PlannerConfig { max_tables: 1, ..Default::default() };
        let err = QueryPlanner::with_config(&catalog, config).plan(&stmt).unwrap_err();
        assert!(matches!(err, PlannerError::Unsupported(_)));
    }

    #[test]
    fn test_lock_reaches_every_route() {
        let catalog = VSchemaCatalog::from_json(VSCHEMA).unwrap();
        let stmt = analyze(&QuerySpec::Select(SelectSpec {
            from: vec![TableRef::new("user"), TableRef::new("unsharded_a")],
            columns: vec!["1".into()],
            lock: Lock::ForUpdate,
            ..Default::default()
        }))
        .unwrap();
        let plan = QueryPlanner::new(&catalog).plan(&stmt).unwrap().unwrap();
        let routes = plan.routes();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.lock == Lock::ForUpdate));
    }
}
