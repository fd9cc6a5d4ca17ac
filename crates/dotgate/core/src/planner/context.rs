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

use super::tracer::PlanTracer;
use crate::config::PlannerConfig;
use crate::semantics::SemTable;
use crate::vindexes::VSchema;

/// State of one planning call. Owns its copy of the semantic table since
/// planning records new column equalities as it goes.
pub struct PlanningContext<'a> {
    pub vschema: &'a dyn VSchema,
    pub semtable: SemTable,
    pub config: &'a PlannerConfig,
    pub tracer: &'a dyn PlanTracer,
}

impl<'a> PlanningContext<'a> {
    pub fn new(vschema: &'a dyn VSchema, semtable: SemTable, config: &'a PlannerConfig, tracer: &'a dyn PlanTracer) -> Self {
        Self {
            vschema,
            semtable,
            config,
            tracer,
        }
    }
}
