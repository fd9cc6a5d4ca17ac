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

//! Logical query representation.
//!
//! # Core Components
//!
//! - [`QueryGraph`]: inner-joined tables with predicates filed by dependency
//! - [`LogicalOperator`]: query graphs combined by outer joins and unions
//! - [`analyze`]: builds both from a [`QuerySpec`] document

pub mod analyzer;
pub mod query_graph;

pub use analyzer::{LeftJoinSpec, QuerySpec, SelectSpec, Statement, TableRef, UnionSpec, analyze};
pub use query_graph::{Concatenate, InnerJoin, Lock, LogicalOperator, QueryGraph, QueryTable, SelectArm};
