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

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// MySQL error number for `ER_WRONG_NUMBER_OF_COLUMNS_IN_SELECT`.
pub const ER_WRONG_NUMBER_OF_COLUMNS_IN_SELECT: u16 = 1222;
/// MySQL error number for `ER_BAD_FIELD_ERROR`.
pub const ER_BAD_FIELD_ERROR: u16 = 1054;
/// MySQL error number for `ER_NON_UNIQ_ERROR`.
pub const ER_NON_UNIQ_ERROR: u16 = 1052;
/// MySQL error number for `ER_NONUNIQ_TABLE`.
pub const ER_NONUNIQ_TABLE: u16 = 1066;

pub const SQLSTATE_CARDINALITY_VIOLATION: &str = "21000";
pub const SQLSTATE_BAD_FIELD: &str = "42S22";
pub const SQLSTATE_INTEGRITY_VIOLATION: &str = "23000";
pub const SQLSTATE_SYNTAX_OR_ACCESS: &str = "42000";

/// A statement level error, rendered the way a MySQL server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementError {
    pub num: u16,
    pub state: String,
    pub message: String,
    pub query: Option<String>,
}

impl StatementError {
    pub fn new(num: u16, state: &str, message: impl Into<String>) -> Self {
        Self {
            num,
            state: state.to_string(),
            message: message.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {}) (sqlstate {})", self.message, self.num, self.state)?;
        if let Some(query) = &self.query {
            write!(f, " during query: {query}")?;
        }
        Ok(())
    }
}

/// Coarse classification of planner failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The query uses a construct the planner does not implement.
    Unsupported,
    /// The query itself is wrong; report it back to the client.
    UserQuery,
    /// A planner invariant was violated. Alert, do not blame the query.
    Internal,
    /// The vindex catalog could not resolve a name.
    Lookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Statement(StatementError),
    #[error("[BUG] {0}")]
    Internal(String),
    #[error("table {0} not found")]
    TableNotFound(String),
    #[error("keyspace {0} not found in vschema")]
    KeyspaceNotFound(String),
    #[error("ambiguous table reference: {0}")]
    AmbiguousTable(String),
    #[error("vindex {0} not found")]
    VindexNotFound(String),
    #[error("invalid vschema: {0}")]
    InvalidVSchema(String),
}

impl PlannerError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        PlannerError::Unsupported(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PlannerError::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PlannerError::Unsupported(_) => ErrorKind::Unsupported,
            PlannerError::Statement(_) => ErrorKind::UserQuery,
            PlannerError::Internal(_) => ErrorKind::Internal,
            PlannerError::TableNotFound(_)
            | PlannerError::KeyspaceNotFound(_)
            | PlannerError::AmbiguousTable(_)
            | PlannerError::VindexNotFound(_)
            | PlannerError::InvalidVSchema(_) => ErrorKind::Lookup,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

impl From<StatementError> for PlannerError {
    fn from(err: StatementError) -> Self {
        PlannerError::Statement(err)
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
