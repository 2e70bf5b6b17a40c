//! Relational Query: a small, composable relation expression.
//!
//! This is what the portable strategy produces. It is independent of any SQL
//! dialect; [RelationExpr::to_sql] lowers it when the caller wants text.

use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::Serialize;

use super::generic::{ColumnSort, RankFunction};
use super::request::TableRef;
use crate::{ErrorMessages, Options};

/// A source table followed by a pipeline of transforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RelationExpr {
    pub from: TableRef,
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, EnumAsInner, JsonSchema)]
pub enum Transform {
    /// Appends column `name`, computed by a ranking window function.
    Window {
        name: String,
        func: RankFunction,
        partition: Vec<String>,
        sort: Vec<ColumnSort<String>>,
    },
    Filter(Expr),
    /// Removes columns from the relation.
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub enum Expr {
    Column(String),
    Integer(u64),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema, strum::Display)]
pub enum BinOp {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = "AND")]
    And,
}

impl RelationExpr {
    pub fn table(from: TableRef) -> Self {
        RelationExpr {
            from,
            transforms: Vec::new(),
        }
    }

    pub fn window<S: Into<String>>(
        mut self,
        name: S,
        func: RankFunction,
        partition: Vec<String>,
        sort: Vec<ColumnSort<String>>,
    ) -> Self {
        self.transforms.push(Transform::Window {
            name: name.into(),
            func,
            partition,
            sort,
        });
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.transforms.push(Transform::Filter(predicate));
        self
    }

    pub fn exclude(mut self, columns: Vec<String>) -> Self {
        self.transforms.push(Transform::Exclude(columns));
        self
    }

    /// Output columns, when the source table's columns are known.
    pub fn columns(&self) -> Option<Vec<String>> {
        let mut columns = self.from.columns.clone()?;
        for transform in &self.transforms {
            match transform {
                Transform::Window { name, .. } => columns.push(name.clone()),
                Transform::Filter(_) => {}
                Transform::Exclude(excluded) => columns.retain(|c| !excluded.contains(c)),
            }
        }
        Some(columns)
    }

    /// Lower into SQL text for the target in `options`.
    pub fn to_sql(&self, options: &Options) -> Result<String, ErrorMessages> {
        crate::sql::compile_relation(self, options).map_err(ErrorMessages::from)
    }
}

impl Expr {
    pub fn column<S: Into<String>>(name: S) -> Self {
        Expr::Column(name.into())
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn lte(self, right: Expr) -> Self {
        Expr::binary(self, BinOp::Lte, right)
    }
}
