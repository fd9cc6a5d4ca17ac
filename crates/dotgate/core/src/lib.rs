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

//! Query planning core of the dotgate sharded SQL proxy.
//!
//! Given an analyzed statement and a vindex catalog, the planner decides
//! which shards every part of the statement has to run on and which parts
//! the proxy has to stitch together itself.

pub mod config;
pub mod evalengine;
pub mod planner;
pub mod query;
pub mod semantics;
pub mod vindexes;

pub use config::{ConfigError, PlannerConfig};
pub use planner::{PhysicalOperator, PlanDescription, QueryPlanner, RouteOpcode, describe};
pub use query::{QuerySpec, Statement, analyze};
pub use vindexes::{VSchema, VSchemaCatalog};
