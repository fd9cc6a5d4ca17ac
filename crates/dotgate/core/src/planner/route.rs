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

//! Routes and vindex selection.
//!
//! A route remembers, per column vindex of its tables, every option a pushed
//! predicate offered for narrowing the shard set. The cheapest option wins and
//! decides the route's opcode. Options are never thrown away except in favour
//! of a cheaper one, so selection only moves towards cheaper opcodes.

use dotgate_common::PlannerResult;
use std::sync::Arc;
use tracing::debug;

use super::context::PlanningContext;
use super::cost::{Cost, RouteOpcode};
use super::operators::{PhysicalOperator, TableOp};
use super::pushdown::push_into_route_source;
use crate::evalengine::{EvalExpr, convert};
use crate::query::{Lock, QueryTable};
use crate::semantics::{ColName, ComparisonOp, Expr, SemTable, TableName, TableSet};
use crate::vindexes::{ColumnVindex, Keyspace, TableType, VTable, Vindex};

/// A way of narrowing a route down to fewer shards.
#[derive(Debug, Clone, PartialEq)]
pub struct VindexOption {
    pub values: Vec<EvalExpr>,
    pub value_exprs: Vec<Expr>,
    pub predicates: Vec<Expr>,
    pub opcode: RouteOpcode,
    pub found_vindex: Arc<Vindex>,
    pub cost: Cost,
}

/// Options found so far for one column vindex of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct VindexPlusPredicates {
    pub table_id: TableSet,
    pub col_vindex: ColumnVindex,
    pub options: Vec<VindexOption>,
}

impl VindexPlusPredicates {
    fn new(table_id: TableSet, col_vindex: ColumnVindex) -> Self {
        Self {
            table_id,
            col_vindex,
            options: Vec::new(),
        }
    }

    /// Cheapest option, first found on ties. Everything else is dropped.
    fn best_option(&mut self) -> Option<VindexOption> {
        let mut best: Option<usize> = None;
        for (idx, option) in self.options.iter().enumerate() {
            if best.is_none_or(|b| option.cost < self.options[b].cost) {
                best = Some(idx);
            }
        }
        let best = self.options.swap_remove(best?);
        self.options = vec![best.clone()];
        Some(best)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub source: Box<PhysicalOperator>,
    pub opcode: RouteOpcode,
    pub keyspace: Arc<Keyspace>,
    pub vindex_preds: Vec<VindexPlusPredicates>,
    pub selected: Option<VindexOption>,
    pub lock: Lock,
}

impl Route {
    pub fn new(source: PhysicalOperator, opcode: RouteOpcode, keyspace: Arc<Keyspace>) -> Self {
        Self {
            source: Box::new(source),
            opcode,
            keyspace,
            vindex_preds: Vec::new(),
            selected: None,
            lock: Lock::None,
        }
    }

    pub fn table_id(&self) -> TableSet {
        self.source.table_id()
    }

    pub fn cost(&self) -> usize {
        self.opcode.route_cost()
    }

    pub fn selected_vindex(&self) -> Option<&Arc<Vindex>> {
        self.selected.as_ref().map(|s| &s.found_vindex)
    }

    pub fn vindex_expressions(&self) -> &[Expr] {
        self.selected.as_ref().map(|s| s.value_exprs.as_slice()).unwrap_or(&[])
    }

    /// True when the route is a lone reference to the `dual` pseudo table.
    pub fn is_dual_table(&self) -> bool {
        match self.source.as_ref() {
            PhysicalOperator::Table(table) => table.vtable.is_dual() && table.qtable.table.qualifier.is_none(),
            _ => false,
        }
    }

    pub fn can_improve(&self) -> bool {
        self.opcode != RouteOpcode::None
    }

    /// Pushes `expr` into the route: first as routing information, then into
    /// the SQL the route will send down.
    pub fn push_predicate(mut self, ctx: &mut PlanningContext<'_>, expr: Expr) -> PlannerResult<Route> {
        self.update_routing_logic(ctx, &expr);
        self.source = Box::new(push_into_route_source(ctx, expr, *self.source)?);
        Ok(self)
    }

    /// Pushes the ON condition of an outer join into the route's SQL. The
    /// condition decides which inner rows match, never which outer rows
    /// exist, so the routing stays as the outer side left it.
    pub fn push_outer_join_condition(mut self, ctx: &mut PlanningContext<'_>, expr: Expr) -> PlannerResult<Route> {
        register_column_equality(&mut ctx.semtable, &expr);
        self.source = Box::new(push_into_route_source(ctx, expr, *self.source)?);
        Ok(self)
    }

    pub fn update_routing_logic(&mut self, ctx: &mut PlanningContext<'_>, expr: &Expr) {
        register_column_equality(&mut ctx.semtable, expr);
        if !self.can_improve() {
            return;
        }
        if self.search_for_new_vindexes(&ctx.semtable, expr) {
            self.pick_best_available_vindex();
        }
    }

    pub fn pick_best_available_vindex(&mut self) {
        if !self.can_improve() {
            return;
        }
        for vpp in &mut self.vindex_preds {
            let Some(option) = vpp.best_option() else {
                continue;
            };
            if self.selected.as_ref().is_none_or(|selected| option.cost < selected.cost) {
                self.opcode = option.opcode;
                self.selected = Some(option);
            }
        }
    }

    fn set_select_none(&mut self) {
        debug!(tables = %self.table_id(), "predicate can never match, route needs no shard");
        self.opcode = RouteOpcode::None;
        self.selected = None;
    }

    fn search_for_new_vindexes(&mut self, semtable: &SemTable, predicate: &Expr) -> bool {
        match predicate {
            Expr::Comparison { op, left, right } => self.plan_comparison(semtable, predicate, *op, left, right),
            Expr::IsNull(inner) => match inner.as_column() {
                Some(column) => self.have_matching_vindex(semtable, predicate, &Expr::Null, column, EvalExpr::Null, equal_or_equal_unique),
                None => false,
            },
            _ => false,
        }
    }

    fn plan_comparison(&mut self, semtable: &SemTable, node: &Expr, op: ComparisonOp, left: &Expr, right: &Expr) -> bool {
        if op != ComparisonOp::NullSafeEqual && (left.is_null() || right.is_null()) {
            self.set_select_none();
            return false;
        }
        match op {
            ComparisonOp::Equal => self.plan_equal_op(semtable, node, left, right),
            ComparisonOp::In => {
                if is_impossible_in(right) {
                    self.set_select_none();
                    return false;
                }
                self.plan_in_op(semtable, node, left, right)
            }
            ComparisonOp::NotIn => {
                if is_impossible_not_in(right) {
                    self.set_select_none();
                }
                false
            }
            _ => false,
        }
    }

    fn plan_equal_op(&mut self, semtable: &SemTable, node: &Expr, left: &Expr, right: &Expr) -> bool {
        let (column, value_expr) = match (left.as_column(), right.as_column()) {
            (Some(column), _) => (column, right),
            (None, Some(column)) => (column, left),
            (None, None) => return false,
        };
        let Some(value) = make_eval_expr(semtable, value_expr) else {
            return false;
        };
        self.have_matching_vindex(semtable, node, value_expr, column, value, equal_or_equal_unique)
    }

    fn plan_in_op(&mut self, semtable: &SemTable, node: &Expr, left: &Expr, right: &Expr) -> bool {
        let Some(column) = left.as_column() else {
            return false;
        };
        if let Expr::Tuple(items) = right {
            if let [single] = items.as_slice() {
                let equal = Expr::eq(left.clone(), single.clone());
                return self.plan_equal_op(semtable, &equal, left, single);
            }
        }
        let Some(value) = make_eval_expr(semtable, right) else {
            return false;
        };
        self.have_matching_vindex(semtable, node, right, column, value, |_| RouteOpcode::In)
    }

    fn have_matching_vindex(&mut self, semtable: &SemTable, node: &Expr, value_expr: &Expr, column: &ColName, value: EvalExpr, opcode: fn(&ColumnVindex) -> RouteOpcode) -> bool {
        let deps = semtable.direct_deps(column);
        if deps.is_empty() {
            return false;
        }
        let mut found = false;
        for vpp in &mut self.vindex_preds {
            if !deps.is_solved_by(vpp.table_id) {
                continue;
            }
            let Some(vindex_column) = vpp.col_vindex.single_column() else {
                continue;
            };
            if !column.name_equals(vindex_column) {
                continue;
            }
            let option_opcode = opcode(&vpp.col_vindex);
            let vindex = vpp.col_vindex.vindex.clone();
            vpp.options.push(VindexOption {
                values: vec![value.clone()],
                value_exprs: vec![value_expr.clone()],
                predicates: vec![node.clone()],
                opcode: option_opcode,
                cost: Cost::for_vindex(&vindex, option_opcode),
                found_vindex: vindex,
            });
            found = true;
        }
        found
    }
}

fn register_column_equality(semtable: &mut SemTable, expr: &Expr) {
    if let Expr::Comparison {
        op: ComparisonOp::Equal,
        left,
        right,
    } = expr
    {
        if left.as_column().is_some() && right.as_column().is_some() {
            semtable.add_column_equality(left, right);
        }
    }
}

fn equal_or_equal_unique(col_vindex: &ColumnVindex) -> RouteOpcode {
    if col_vindex.vindex.is_unique() { RouteOpcode::EqualUnique } else { RouteOpcode::Equal }
}

fn is_impossible_in(right: &Expr) -> bool {
    matches!(right, Expr::Tuple(items) if items.len() == 1 && items[0].is_null())
}

fn is_impossible_not_in(right: &Expr) -> bool {
    matches!(right, Expr::Tuple(items) if items.iter().any(Expr::is_null))
}

/// First routing value derivable from `expr` or anything known equal to it.
fn make_eval_expr(semtable: &SemTable, expr: &Expr) -> Option<EvalExpr> {
    semtable.expr_and_equalities(expr).iter().find_map(|candidate| {
        if candidate.is_null() {
            return Some(EvalExpr::Null);
        }
        convert(candidate, None).ok()
    })
}

/// Builds the route a single table starts out as.
pub fn create_route_operator(ctx: &mut PlanningContext<'_>, table: &QueryTable) -> PlannerResult<Route> {
    if table.is_inf_schema {
        let keyspace = ctx.vschema.any_keyspace()?;
        let vtable = Arc::new(VTable {
            name: table.table.name.clone(),
            keyspace: keyspace.clone(),
            table_type: TableType::Normal,
            column_vindexes: Vec::new(),
            pinned: None,
        });
        let source = PhysicalOperator::Table(TableOp {
            qtable: table.clone(),
            vtable,
        });
        return Ok(Route::new(source, RouteOpcode::Dba, keyspace));
    }

    let vtable = ctx.vschema.find_table(&table.table)?;
    let mut qtable = table.clone();
    if vtable.name != table.table.name {
        debug!(from = %table.table, to = %vtable.name, keyspace = %vtable.keyspace.name, "planning routed table");
        if qtable.alias.is_empty() {
            qtable.alias = table.table.name.clone();
        }
        qtable.table = TableName::qualified(&vtable.keyspace.name, &vtable.name);
    }

    let source = PhysicalOperator::Table(TableOp {
        qtable,
        vtable: vtable.clone(),
    });
    let mut route = Route::new(source, RouteOpcode::Scatter, vtable.keyspace.clone());
    route.vindex_preds = vtable.column_vindexes.iter().map(|cv| VindexPlusPredicates::new(table.id, cv.clone())).collect();

    route.opcode = match (&vtable.table_type, &vtable.pinned) {
        (TableType::Sequence, _) => RouteOpcode::Next,
        (TableType::Reference, _) => RouteOpcode::Reference,
        _ if !vtable.keyspace.sharded => RouteOpcode::Unsharded,
        (_, Some(keyspace_id)) => {
            // Rows of a pinned table all live at one keyspace id, routed
            // through the identity vindex.
            let option = VindexOption {
                values: vec![EvalExpr::KeyspaceId(keyspace_id.clone())],
                value_exprs: Vec::new(),
                predicates: Vec::new(),
                opcode: RouteOpcode::EqualUnique,
                found_vindex: Arc::new(Vindex::binary_identity()),
                cost: Cost {
                    opcode: RouteOpcode::EqualUnique,
                    vindex_cost: 0,
                    is_unique: true,
                },
            };
            let identity = ColumnVindex {
                columns: Vec::new(),
                vindex: option.found_vindex.clone(),
            };
            let mut pinned = VindexPlusPredicates::new(table.id, identity);
            pinned.options.push(option.clone());
            route.vindex_preds.push(pinned);
            route.selected = Some(option);
            RouteOpcode::EqualUnique
        }
        _ => RouteOpcode::Scatter,
    };

    for predicate in &table.predicates {
        route.update_routing_logic(ctx, predicate);
    }
    Ok(route)
}
