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
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use super::vindex::{ColumnVindex, Vindex, VindexKind};
use crate::semantics::TableName;

pub const DUAL_TABLE: &str = "dual";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyspace {
    pub name: String,
    pub sharded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    #[default]
    Normal,
    Reference,
    Sequence,
}

/// A table as the catalog knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTable {
    pub name: String,
    pub keyspace: Arc<Keyspace>,
    pub table_type: TableType,
    pub column_vindexes: Vec<ColumnVindex>,
    /// Keyspace id every row of the table lives at.
    pub pinned: Option<Vec<u8>>,
}

impl VTable {
    pub fn is_dual(&self) -> bool {
        self.name == DUAL_TABLE
    }
}

/// Catalog lookups the planner depends on. Errors are handed back to the
/// caller unchanged.
pub trait VSchema: Send + Sync {
    fn find_table(&self, name: &TableName) -> PlannerResult<Arc<VTable>>;

    /// Keyspace used for statements that can run anywhere, such as `information_schema` queries.
    fn any_keyspace(&self) -> PlannerResult<Arc<Keyspace>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VSchemaSpec {
    #[serde(default)]
    pub keyspaces: BTreeMap<String, KeyspaceSpec>,
    #[serde(default)]
    pub routing_rules: Vec<RoutingRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyspaceSpec {
    #[serde(default)]
    pub sharded: bool,
    #[serde(default)]
    pub vindexes: BTreeMap<String, VindexSpec>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VindexSpec {
    #[serde(rename = "type")]
    pub kind: VindexKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSpec {
    #[serde(rename = "type", default)]
    pub table_type: TableType,
    #[serde(default)]
    pub column_vindexes: Vec<ColumnVindexSpec>,
    /// Hex encoded keyspace id.
    #[serde(default)]
    pub pinned: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnVindexSpec {
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    pub name: String,
}

/// Redirects `from_table` (optionally keyspace qualified) to `to_table`, which must be `keyspace.table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub from_table: String,
    pub to_table: String,
}

/// In-memory [`VSchema`] built from a [`VSchemaSpec`] document.
#[derive(Debug, Clone, Default)]
pub struct VSchemaCatalog {
    keyspaces: BTreeMap<String, Arc<Keyspace>>,
    tables: BTreeMap<String, BTreeMap<String, Arc<VTable>>>,
    routing_rules: HashMap<String, TableName>,
}

impl VSchemaCatalog {
    pub fn from_json(json: &str) -> PlannerResult<Self> {
        let spec: VSchemaSpec = serde_json::from_str(json).map_err(|e| PlannerError::InvalidVSchema(e.to_string()))?;
        Self::from_spec(&spec)
    }

    pub fn from_spec(spec: &VSchemaSpec) -> PlannerResult<Self> {
        let mut catalog = VSchemaCatalog::default();
        for (ks_name, ks_spec) in &spec.keyspaces {
            let keyspace = Arc::new(Keyspace {
                name: ks_name.clone(),
                sharded: ks_spec.sharded,
            });
            let vindexes: HashMap<&str, Arc<Vindex>> = ks_spec
                .vindexes
                .iter()
                .map(|(name, v)| (name.as_str(), Arc::new(Vindex::new(ks_name, name, v.kind))))
                .collect();

            let mut tables = BTreeMap::new();
            for (table_name, table_spec) in &ks_spec.tables {
                let table = build_table(&keyspace, table_name, table_spec, &vindexes)?;
                tables.insert(table_name.clone(), Arc::new(table));
            }
            tables.entry(DUAL_TABLE.to_string()).or_insert_with(|| {
                Arc::new(VTable {
                    name: DUAL_TABLE.to_string(),
                    keyspace: keyspace.clone(),
                    table_type: TableType::Reference,
                    column_vindexes: Vec::new(),
                    pinned: None,
                })
            });
            debug!(keyspace = %ks_name, sharded = ks_spec.sharded, tables = tables.len(), "loaded keyspace");
            catalog.keyspaces.insert(ks_name.clone(), keyspace);
            catalog.tables.insert(ks_name.clone(), tables);
        }

        for rule in &spec.routing_rules {
            let target = match rule.to_table.split_once('.') {
                Some((ks, table)) if !ks.is_empty() && !table.is_empty() => TableName::qualified(ks, table),
                _ => return Err(PlannerError::InvalidVSchema(format!("routing rule target {} must be keyspace.table", rule.to_table))),
            };
            catalog.routing_rules.insert(rule.from_table.clone(), target);
        }
        Ok(catalog)
    }

    pub fn keyspaces(&self) -> impl Iterator<Item = &Arc<Keyspace>> {
        self.keyspaces.values()
    }

    pub fn tables_in(&self, keyspace: &str) -> impl Iterator<Item = &Arc<VTable>> {
        self.tables.get(keyspace).into_iter().flat_map(|tables| tables.values())
    }

    fn find_direct(&self, name: &TableName) -> PlannerResult<Arc<VTable>> {
        if let Some(ks) = &name.qualifier {
            let tables = self.tables.get(ks).ok_or_else(|| PlannerError::KeyspaceNotFound(ks.clone()))?;
            return tables.get(&name.name).cloned().ok_or_else(|| PlannerError::TableNotFound(name.to_string()));
        }

        if name.name == DUAL_TABLE {
            return self.tables.values().find_map(|tables| tables.get(DUAL_TABLE).cloned()).ok_or_else(|| PlannerError::TableNotFound(name.to_string()));
        }

        let mut found = self.tables.values().filter_map(|tables| tables.get(&name.name));
        match (found.next(), found.next()) {
            (Some(table), None) => Ok(table.clone()),
            (Some(_), Some(_)) => Err(PlannerError::AmbiguousTable(name.name.clone())),
            (None, _) => Err(PlannerError::TableNotFound(name.to_string())),
        }
    }
}

fn build_table(keyspace: &Arc<Keyspace>, name: &str, spec: &TableSpec, vindexes: &HashMap<&str, Arc<Vindex>>) -> PlannerResult<VTable> {
    let mut column_vindexes = Vec::with_capacity(spec.column_vindexes.len());
    for cv in &spec.column_vindexes {
        let vindex = vindexes.get(cv.name.as_str()).cloned().ok_or_else(|| PlannerError::VindexNotFound(format!("{}.{}", keyspace.name, cv.name)))?;
        let mut columns = cv.columns.clone();
        if let Some(column) = &cv.column {
            columns.insert(0, column.clone());
        }
        if columns.is_empty() {
            return Err(PlannerError::InvalidVSchema(format!("column vindex {} on {}.{} binds no columns", cv.name, keyspace.name, name)));
        }
        column_vindexes.push(ColumnVindex { columns, vindex });
    }

    let pinned = match &spec.pinned {
        Some(text) => Some(hex::decode(text).map_err(|e| PlannerError::InvalidVSchema(format!("pinned value {text} for {}.{}: {}", keyspace.name, name, e)))?),
        None => None,
    };

    if keyspace.sharded && spec.table_type == TableType::Normal && column_vindexes.is_empty() && pinned.is_none() {
        return Err(PlannerError::InvalidVSchema(format!("missing primary col vindex for table: {}.{}", keyspace.name, name)));
    }

    Ok(VTable {
        name: name.to_string(),
        keyspace: keyspace.clone(),
        table_type: spec.table_type,
        column_vindexes,
        pinned,
    })
}

impl VSchema for VSchemaCatalog {
    fn find_table(&self, name: &TableName) -> PlannerResult<Arc<VTable>> {
        if let Some(target) = self.routing_rules.get(&name.to_string()) {
            debug!(from = %name, to = %target, "table redirected by routing rule");
            return self.find_direct(target);
        }
        self.find_direct(name)
    }

    fn any_keyspace(&self) -> PlannerResult<Arc<Keyspace>> {
        self.keyspaces.values().next().cloned().ok_or_else(|| PlannerError::KeyspaceNotFound("<any>".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VSCHEMA: &str = r#"{
        "keyspaces": {
            "user": {
                "sharded": true,
                "vindexes": {"hash": {"type": "hash"}, "name_lookup": {"type": "lookup"}},
                "tables": {
                    "user": {"column_vindexes": [{"column": "id", "name": "hash"}, {"column": "name", "name": "name_lookup"}]},
                    "pinned_t": {"pinned": "80"},
                    "country": {"type": "reference"}
                }
            },
            "main": {
                "tables": {"seq": {"type": "sequence"}, "country": {"type": "reference"}, "unsharded_a": {}}
            }
        },
        "routing_rules": [{"from_table": "u", "to_table": "user.user"}]
    }"#;

    fn catalog() -> VSchemaCatalog {
        VSchemaCatalog::from_json(VSCHEMA).unwrap()
    }

    #[test]
    fn test_find_unqualified() {
        let table = catalog().find_table(&TableName::new("user")).unwrap();
        assert_eq!(table.keyspace.name, "user");
        assert_eq!(table.column_vindexes.len(), 2);
        assert!(table.column_vindexes[0].vindex.is_unique());
        assert!(!table.column_vindexes[1].vindex.is_unique());
    }

    #[test]
    fn test_ambiguous_and_missing() {
        let catalog = catalog();
        assert_eq!(catalog.find_table(&TableName::new("country")), Err(PlannerError::AmbiguousTable("country".into())));
        assert_eq!(catalog.find_table(&TableName::qualified("main", "country")).unwrap().table_type, TableType::Reference);
        assert_eq!(catalog.find_table(&TableName::new("nope")), Err(PlannerError::TableNotFound("nope".into())));
        assert_eq!(catalog.find_table(&TableName::qualified("nope", "t")), Err(PlannerError::KeyspaceNotFound("nope".into())));
    }

    #[test]
    fn test_routing_rules() {
        let table = catalog().find_table(&TableName::new("u")).unwrap();
        assert_eq!(table.name, "user");
        assert_eq!(table.keyspace.name, "user");
    }

    #[test]
    fn test_pinned_and_dual() {
        let catalog = catalog();
        assert_eq!(catalog.find_table(&TableName::new("pinned_t")).unwrap().pinned, Some(vec![0x80]));
        let dual = catalog.find_table(&TableName::new("dual")).unwrap();
        assert!(dual.is_dual());
        assert_eq!(dual.table_type, TableType::Reference);
        assert_eq!(catalog.any_keyspace().unwrap().name, "main");
    }

    #[test]
    fn test_invalid_vschemas() {
        let missing_vindex = r#"{"keyspaces": {"ks": {"sharded": true, "tables": {"t": {"column_vindexes": [{"column": "id", "name": "hash"}]}}}}}"#;
        assert_eq!(VSchemaCatalog::from_json(missing_vindex).unwrap_err(), PlannerError::VindexNotFound("ks.hash".into()));

        let no_primary = r#"{"keyspaces": {"ks": {"sharded": true, "tables": {"t": {}}}}}"#;
        assert!(matches!(VSchemaCatalog::from_json(no_primary), Err(PlannerError::InvalidVSchema(_))));

        let bad_rule = r#"{"routing_rules": [{"from_table": "a", "to_table": "b"}]}"#;
        assert!(matches!(VSchemaCatalog::from_json(bad_rule), Err(PlannerError::InvalidVSchema(_))));
    }
}
