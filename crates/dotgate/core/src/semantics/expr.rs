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

use super::table_set::TableSet;

/// Column reference. `table` is filled in by the statement analyzer and is
/// what dependency tracking reads; the qualifier is kept for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColName {
    #[serde(default)]
    pub qualifier: Option<String>,
    pub name: String,
    #[serde(skip)]
    pub table: TableSet,
}

impl ColName {
    pub fn new(qualifier: &str, name: &str) -> Self {
        Self {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
            table: TableSet::EMPTY,
        }
    }

    pub fn unqualified(name: &str) -> Self {
        Self {
            qualifier: None,
            name: name.to_string(),
            table: TableSet::EMPTY,
        }
    }

    /// Column names compare case-insensitively, the way MySQL treats them.
    pub fn name_equals(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// Name of the bind variable that carries this column across a join.
    pub fn bind_var_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}_{}", q, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for ColName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    /// Kept as written so literals stay hashable.
    Float(String),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Str(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<=>")]
    NullSafeEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = "like")]
    Like,
}

impl ComparisonOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::NullSafeEqual => "<=>",
            ComparisonOp::In => "in",
            ComparisonOp::NotIn => "not in",
            ComparisonOp::Like => "like",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "*")]
    Mult,
    #[serde(rename = "/")]
    Div,
}

impl ArithmeticOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Mult => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// The slice of the SQL expression grammar the planner reasons about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Column(ColName),
    Literal(Literal),
    Null,
    Bool(bool),
    /// Bind variable, written `:name`.
    Argument(String),
    Tuple(Vec<Expr>),
    Comparison { op: ComparisonOp, left: Box<Expr>, right: Box<Expr> },
    Arithmetic { op: ArithmeticOp, left: Box<Expr>, right: Box<Expr> },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
}

impl Expr {
    pub fn col(qualifier: &str, name: &str) -> Expr {
        Expr::Column(ColName::new(qualifier, name))
    }

    pub fn int(v: i64) -> Expr {
        Expr::Literal(Literal::Int(v))
    }

    pub fn string(v: &str) -> Expr {
        Expr::Literal(Literal::Str(v.to_string()))
    }

    pub fn arg(name: &str) -> Expr {
        Expr::Argument(name.to_string())
    }

    pub fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::compare(ComparisonOp::Equal, left, right)
    }

    pub fn in_list(left: Expr, values: Vec<Expr>) -> Expr {
        Expr::compare(ComparisonOp::In, left, Expr::Tuple(values))
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expr::Null)
    }

    pub fn as_column(&self) -> Option<&ColName> {
        match self {
            Expr::Column(col) => Some(col),
            _ => None,
        }
    }

    /// Visits every column reference in the expression, left to right.
    pub fn walk_columns<F: FnMut(&ColName)>(&self, f: &mut F) {
        match self {
            Expr::Column(col) => f(col),
            Expr::Literal(_) | Expr::Null | Expr::Bool(_) | Expr::Argument(_) => {}
            Expr::Tuple(items) => items.iter().for_each(|item| item.walk_columns(f)),
            Expr::Comparison { left, right, .. } | Expr::Arithmetic { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
                left.walk_columns(f);
                right.walk_columns(f);
            }
            Expr::Not(inner) | Expr::IsNull(inner) => inner.walk_columns(f),
        }
    }

    /// Mutable variant of [`Expr::walk_columns`], used by the analyzer to bind columns.
    pub fn walk_columns_mut<F, E>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut ColName) -> Result<(), E>,
    {
        match self {
            Expr::Column(col) => f(col),
            Expr::Literal(_) | Expr::Null | Expr::Bool(_) | Expr::Argument(_) => Ok(()),
            Expr::Tuple(items) => items.iter_mut().try_for_each(|item| item.walk_columns_mut(f)),
            Expr::Comparison { left, right, .. } | Expr::Arithmetic { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
                left.walk_columns_mut(f)?;
                right.walk_columns_mut(f)
            }
            Expr::Not(inner) | Expr::IsNull(inner) => inner.walk_columns_mut(f),
        }
    }

    /// Returns a copy where every column for which `f` yields a replacement is swapped out.
    pub fn rewrite_columns<F: FnMut(&ColName) -> Option<Expr>>(&self, f: &mut F) -> Expr {
        match self {
            Expr::Column(col) => f(col).unwrap_or_else(|| self.clone()),
            Expr::Literal(_) | Expr::Null | Expr::Bool(_) | Expr::Argument(_) => self.clone(),
            Expr::Tuple(items) => Expr::Tuple(items.iter().map(|item| item.rewrite_columns(f)).collect()),
            Expr::Comparison { op, left, right } => Expr::Comparison {
                op: *op,
                left: Box::new(left.rewrite_columns(f)),
                right: Box::new(right.rewrite_columns(f)),
            },
            Expr::Arithmetic { op, left, right } => Expr::Arithmetic {
                op: *op,
                left: Box::new(left.rewrite_columns(f)),
                right: Box::new(right.rewrite_columns(f)),
            },
            Expr::And(left, right) => Expr::And(Box::new(left.rewrite_columns(f)), Box::new(right.rewrite_columns(f))),
            Expr::Or(left, right) => Expr::Or(Box::new(left.rewrite_columns(f)), Box::new(right.rewrite_columns(f))),
            Expr::Not(inner) => Expr::Not(Box::new(inner.rewrite_columns(f))),
            Expr::IsNull(inner) => Expr::IsNull(Box::new(inner.rewrite_columns(f))),
        }
    }
}

/// Splits a conjunction into its terms, appending them to `out`.
pub fn split_and_expression(out: &mut Vec<Expr>, expr: &Expr) {
    match expr {
        Expr::And(left, right) => {
            split_and_expression(out, left);
            split_and_expression(out, right);
        }
        other => out.push(other.clone()),
    }
}

/// Inverse of [`split_and_expression`]. `None` for an empty list.
pub fn and_expressions(exprs: &[Expr]) -> Option<Expr> {
    let mut iter = exprs.iter().cloned();
    let first = iter.next()?;
    Some(iter.fold(first, Expr::and))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{col}"),
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Null => write!(f, "null"),
            Expr::Bool(true) => write!(f, "true"),
            Expr::Bool(false) => write!(f, "false"),
            Expr::Argument(name) => write!(f, ":{name}"),
            Expr::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Expr::Comparison { op, left, right } => write!(f, "{} {} {}", left, op.as_str(), right),
            Expr::Arithmetic { op, left, right } => write!(f, "{} {} {}", left, op.as_str(), right),
            Expr::And(left, right) => write!(f, "{left} and {right}"),
            Expr::Or(left, right) => write!(f, "({left} or {right})"),
            Expr::Not(inner) => write!(f, "not {inner}"),
            Expr::IsNull(inner) => write!(f, "{inner} is null"),
        }
    }
}
