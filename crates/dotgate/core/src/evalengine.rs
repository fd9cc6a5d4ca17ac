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

//! Conversion of AST expressions into evaluable expressions.
//!
//! Routing only needs values it can compute without touching table data:
//! literals, bind variables and arithmetic over them. Columns become offsets
//! when the caller knows the row layout, otherwise they are not convertible.

use dotgate_common::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::semantics::{ArithmeticOp, ColName, ComparisonOp, Expr, Literal};

const NOT_SUPPORTED: &str = "expr cannot be converted, not supported";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvalExpr {
    Column { offset: usize },
    BindVar(String),
    Int(i64),
    Float(f64),
    Str(String),
    Null,
    /// Raw keyspace id, used by pinned tables.
    KeyspaceId(Vec<u8>),
    Tuple(Vec<EvalExpr>),
    Equals(Box<EvalExpr>, Box<EvalExpr>),
    BinaryOp { op: ArithmeticOp, left: Box<EvalExpr>, right: Box<EvalExpr> },
}

/// Resolves a column to its offset in the row the expression is evaluated against.
pub type ColumnLookup<'a> = &'a dyn Fn(&ColName) -> PlannerResult<usize>;

/// Converts `expr`, failing with [`PlannerError::Unsupported`] for anything
/// outside the evaluable subset.
pub fn convert(expr: &Expr, column_lookup: Option<ColumnLookup<'_>>) -> PlannerResult<EvalExpr> {
    match expr {
        Expr::Column(col) => match column_lookup {
            Some(lookup) => Ok(EvalExpr::Column { offset: lookup(col)? }),
            None => Err(not_supported("column without a row layout")),
        },
        Expr::Comparison { op, left, right } => {
            if *op != ComparisonOp::Equal {
                return Err(not_supported(&format!("comparison with {}", op.as_str())));
            }
            let left = convert(left, column_lookup)?;
            let right = convert(right, column_lookup)?;
            Ok(EvalExpr::Equals(Box::new(left), Box::new(right)))
        }
        Expr::Argument(name) => Ok(EvalExpr::BindVar(name.clone())),
        Expr::Literal(Literal::Int(v)) => Ok(EvalExpr::Int(*v)),
        Expr::Literal(Literal::Float(text)) => text
            .parse::<f64>()
            .map(EvalExpr::Float)
            .map_err(|_| PlannerError::unsupported(format!("{NOT_SUPPORTED}: malformed float literal {text}"))),
        Expr::Literal(Literal::Str(v)) => Ok(EvalExpr::Str(v.clone())),
        Expr::Null => Ok(EvalExpr::Null),
        Expr::Bool(v) => Ok(EvalExpr::Int(i64::from(*v))),
        Expr::Tuple(items) => items.iter().map(|item| convert(item, column_lookup)).collect::<PlannerResult<Vec<_>>>().map(EvalExpr::Tuple),
        Expr::Arithmetic { op, left, right } => {
            let left = convert(left, column_lookup)?;
            let right = convert(right, column_lookup)?;
            Ok(EvalExpr::BinaryOp {
                op: *op,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
        Expr::And(..) => Err(not_supported("AND expression")),
        Expr::Or(..) => Err(not_supported("OR expression")),
        Expr::Not(_) => Err(not_supported("NOT expression")),
        Expr::IsNull(_) => Err(not_supported("IS NULL expression")),
    }
}

fn not_supported(what: &str) -> PlannerError {
    PlannerError::unsupported(format!("{NOT_SUPPORTED}: {what}"))
}

impl fmt::Display for EvalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalExpr::Column { offset } => write!(f, "[COLUMN {offset}]"),
            EvalExpr::BindVar(name) => write!(f, ":{name}"),
            EvalExpr::Int(v) => write!(f, "INT64({v})"),
            EvalExpr::Float(v) => write!(f, "FLOAT64({v})"),
            EvalExpr::Str(v) => write!(f, "VARCHAR(\"{v}\")"),
            EvalExpr::Null => write!(f, "NULL"),
            EvalExpr::KeyspaceId(id) => write!(f, "KEYSPACE_ID({})", hex::encode(id)),
            EvalExpr::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            EvalExpr::Equals(left, right) => write!(f, "{left} = {right}"),
            EvalExpr::BinaryOp { op, left, right } => write!(f, "{} {} {}", left, op.as_str(), right),
        }
    }
}
