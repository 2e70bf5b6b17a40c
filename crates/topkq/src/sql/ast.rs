//! SQL query AST
//!
//! Covers exactly the constructs the top-k renderers emit, including the
//! `OPTIONS (...)` query hints that general-purpose SQL ASTs don't model.
//! Rendering to text is `.to_string()`; identifiers are [Ident]s that were
//! built by [super::gen_expr::translate_ident], so this module never decides
//! about quoting.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
pub use sqlparser::ast::Ident;

use super::dialect::ColumnExclude;
use crate::ir::generic::RankFunction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub body: Select,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Select {
    pub distinct: Option<Distinct>,
    pub projection: Vec<SelectItem>,
    /// Comma-separated `FROM` items.
    pub from: Vec<TableFactor>,
    pub selection: Option<Expr>,
    pub options: Vec<QueryHint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distinct {
    Distinct,
    On(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    Wildcard(Option<ExcludeColumns>),
    QualifiedWildcard(ObjectName),
    UnnamedExpr(Expr),
    ExprWithAlias { expr: Expr, alias: Ident },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeColumns {
    pub kind: ColumnExclude,
    pub columns: Vec<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableFactor {
    Table {
        name: ObjectName,
        alias: Option<Ident>,
    },
    Derived {
        lateral: bool,
        subquery: Box<Query>,
        alias: Ident,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName(pub Vec<Ident>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Identifier(Ident),
    CompoundIdentifier(Vec<Ident>),
    Value(u64),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Window(WindowFunction),
    Function {
        name: Ident,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    /// `=` that treats two NULLs as equal.
    IsNotDistinctFrom,
    LtEq,
    And,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFunction {
    pub func: RankFunction,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByExpr {
    pub expr: Expr,
    /// `None` leaves the direction to the engine's default (ascending).
    pub asc: Option<bool>,
}

/// Engine hints, rendered in an `OPTIONS (...)` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryHint {
    DistinctOnInputGroupSize(u64),
    LimitInputGroupSize(u64),
}

impl Select {
    pub fn from_table(name: ObjectName) -> Self {
        Select {
            projection: vec![SelectItem::Wildcard(None)],
            from: vec![TableFactor::Table { name, alias: None }],
            ..Default::default()
        }
    }
}

impl Query {
    pub fn new(body: Select) -> Self {
        Query {
            body,
            order_by: Vec::new(),
            limit: None,
        }
    }
}

impl Expr {
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Joins `exprs` with `AND`; `None` when there are none.
    pub fn conjunction<I: IntoIterator<Item = Expr>>(exprs: I) -> Option<Expr> {
        exprs
            .into_iter()
            .reduce(|left, right| Expr::binary(left, BinaryOperator::And, right))
    }

    fn binding_strength(&self) -> u8 {
        match self {
            Expr::BinaryOp { op, .. } => op.binding_strength(),
            _ => u8::MAX,
        }
    }
}

impl BinaryOperator {
    fn binding_strength(&self) -> u8 {
        match self {
            BinaryOperator::And => 10,
            BinaryOperator::Eq | BinaryOperator::IsNotDistinctFrom | BinaryOperator::LtEq => 20,
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body)?;
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", self.order_by.iter().join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT")?;
        match &self.distinct {
            Some(Distinct::Distinct) => f.write_str(" DISTINCT")?,
            Some(Distinct::On(exprs)) => write!(f, " DISTINCT ON ({})", exprs.iter().join(", "))?,
            None => {}
        }
        write!(f, " {}", self.projection.iter().join(", "))?;
        if !self.from.is_empty() {
            write!(f, " FROM {}", self.from.iter().join(", "))?;
        }
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {selection}")?;
        }
        if !self.options.is_empty() {
            write!(f, " OPTIONS ({})", self.options.iter().join(", "))?;
        }
        Ok(())
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Wildcard(None) => f.write_str("*"),
            SelectItem::Wildcard(Some(exclude)) => write!(f, "* {exclude}"),
            SelectItem::QualifiedWildcard(name) => write!(f, "{name}.*"),
            SelectItem::UnnamedExpr(expr) => write!(f, "{expr}"),
            SelectItem::ExprWithAlias { expr, alias } => write!(f, "{expr} AS {alias}"),
        }
    }
}

impl Display for ExcludeColumns {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let keyword = match self.kind {
            ColumnExclude::Exclude => "EXCLUDE",
            ColumnExclude::Except => "EXCEPT",
        };
        write!(f, "{keyword} ({})", self.columns.iter().join(", "))
    }
}

impl Display for TableFactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TableFactor::Table { name, alias } => {
                write!(f, "{name}")?;
                if let Some(alias) = alias {
                    write!(f, " AS {alias}")?;
                }
                Ok(())
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
            } => {
                if *lateral {
                    f.write_str("LATERAL ")?;
                }
                write!(f, "({subquery}) AS {alias}")
            }
        }
    }
}

impl Display for ObjectName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("."))
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(ident) => write!(f, "{ident}"),
            Expr::CompoundIdentifier(parts) => write!(f, "{}", parts.iter().join(".")),
            Expr::Value(value) => write!(f, "{value}"),
            Expr::BinaryOp { left, op, right } => {
                let strength = op.binding_strength();
                write_operand(f, left, strength)?;
                write!(f, " {op} ")?;
                write_operand(f, right, strength)
            }
            Expr::Window(window) => write!(f, "{window}"),
            Expr::Function { name, args } => write!(f, "{name}({})", args.iter().join(", ")),
        }
    }
}

fn write_operand(f: &mut Formatter<'_>, operand: &Expr, parent_strength: u8) -> fmt::Result {
    if operand.binding_strength() < parent_strength {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::IsNotDistinctFrom => "IS NOT DISTINCT FROM",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::And => "AND",
        })
    }
}

impl Display for WindowFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let func = match self.func {
            RankFunction::DenseRank => "DENSE_RANK()",
            RankFunction::RowNumber => "ROW_NUMBER()",
        };
        write!(f, "{func} OVER (")?;
        if !self.partition_by.is_empty() {
            write!(f, "PARTITION BY {}", self.partition_by.iter().join(", "))?;
        }
        if !self.order_by.is_empty() {
            if !self.partition_by.is_empty() {
                f.write_str(" ")?;
            }
            write!(f, "ORDER BY {}", self.order_by.iter().join(", "))?;
        }
        f.write_str(")")
    }
}

impl Display for OrderByExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        match self.asc {
            Some(true) => f.write_str(" ASC"),
            Some(false) => f.write_str(" DESC"),
            None => Ok(()),
        }
    }
}

impl Display for QueryHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryHint::DistinctOnInputGroupSize(n) => {
                write!(f, "DISTINCT ON INPUT GROUP SIZE = {n}")
            }
            QueryHint::LimitInputGroupSize(n) => write!(f, "LIMIT INPUT GROUP SIZE = {n}"),
        }
    }
}
