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

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::operators::PhysicalOperator;
use crate::query::Lock;

/// Serializable summary of a physical plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanDescription {
    pub operator_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vindex: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub join_vars: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PlanDescription>,
}

impl PlanDescription {
    fn new(operator_type: &str) -> Self {
        Self {
            operator_type: operator_type.to_string(),
            variant: None,
            keyspace: None,
            vindex: None,
            values: Vec::new(),
            tables: Vec::new(),
            predicates: Vec::new(),
            join_vars: BTreeMap::new(),
            lock: None,
            inputs: Vec::new(),
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.operator_type, indent = depth * 2)?;
        if let Some(variant) = &self.variant {
            write!(f, " {variant}")?;
        }
        if let Some(keyspace) = &self.keyspace {
            write!(f, " keyspace={keyspace}")?;
        }
        if let Some(vindex) = &self.vindex {
            write!(f, " vindex={vindex}")?;
        }
        if !self.values.is_empty() {
            write!(f, " values=[{}]", self.values.join(", "))?;
        }
        if !self.tables.is_empty() {
            write!(f, " tables=[{}]", self.tables.join(", "))?;
        }
        if !self.join_vars.is_empty() {
            let vars: Vec<String> = self.join_vars.iter().map(|(name, col)| format!("{name}={col}")).collect();
            write!(f, " vars=[{}]", vars.join(", "))?;
        }
        if !self.predicates.is_empty() {
            write!(f, " where {}", self.predicates.join(" and "))?;
        }
        if let Some(lock) = &self.lock {
            write!(f, " lock={lock}")?;
        }
        writeln!(f)?;
        for input in &self.inputs {
            input.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

/// Describes `op`. Routes are leaves: what runs inside them is summarized by
/// their tables and predicates.
pub fn describe(op: &PhysicalOperator) -> PlanDescription {
    match op {
        PhysicalOperator::Route(route) => {
            let mut desc = PlanDescription::new("Route");
            desc.variant = Some(route.opcode.to_string());
            desc.keyspace = Some(route.keyspace.name.clone());
            if let Some(selected) = &route.selected {
                desc.vindex = Some(selected.found_vindex.name.clone());
                desc.values = selected.values.iter().map(ToString::to_string).collect();
            }
            desc.tables = route.source.table_ops().iter().map(|t| t.qtable.table.to_string()).collect();
            route.source.visit(&mut |inner| {
                match inner {
                    PhysicalOperator::Table(table) => desc.predicates.extend(table.qtable.predicates.iter().map(ToString::to_string)),
                    PhysicalOperator::Filter(filter) => desc.predicates.extend(filter.predicates.iter().map(ToString::to_string)),
                    PhysicalOperator::ApplyJoin(join) => desc.predicates.extend(join.predicate.iter().map(ToString::to_string)),
                    _ => {}
                }
                true
            });
            if route.lock != Lock::None {
                desc.lock = Some(route.lock.as_sql().trim().to_string());
            }
            desc
        }
        PhysicalOperator::ApplyJoin(join) => {
            let mut desc = PlanDescription::new("ApplyJoin");
            desc.variant = Some(if join.left_join { "LeftJoin" } else { "Join" }.to_string());
            desc.join_vars = join.vars.iter().filter_map(|(name, offset)| join.lhs_columns.get(*offset).map(|col| (name.clone(), col.to_string()))).collect();
            desc.predicates = join.predicate.iter().map(ToString::to_string).collect();
            desc.inputs = vec![describe(&join.lhs), describe(&join.rhs)];
            desc
        }
        PhysicalOperator::Union(union) => {
            let mut desc = PlanDescription::new(if union.distinct { "Distinct" } else { "Concatenate" });
            desc.inputs = union.sources.iter().map(describe).collect();
            desc
        }
        PhysicalOperator::Filter(filter) => {
            let mut desc = PlanDescription::new("Filter");
            desc.predicates = filter.predicates.iter().map(ToString::to_string).collect();
            desc.inputs = vec![describe(&filter.source)];
            desc
        }
        PhysicalOperator::Table(table) => {
            let mut desc = PlanDescription::new("Table");
            desc.tables = vec![table.qtable.table.to_string()];
            desc.keyspace = Some(table.vtable.keyspace.name.clone());
            desc
        }
    }
}
