use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use sqlparser::keywords::ALL_KEYWORDS;

use super::ast::{self, BinaryOperator, Ident, ObjectName, OrderByExpr};
use super::Context;
use crate::ir::generic::{ColumnSort, SortDirection};
use crate::ir::rq;
use crate::IdentQuoting;

/// The single place where names become SQL identifiers.
///
/// With [IdentQuoting::Verbatim], names are emitted exactly as given and the
/// caller vouches for them. With [IdentQuoting::Auto], names that are not
/// plain lowercase identifiers, or that collide with a keyword, are quoted
/// with the dialect's quote char.
pub(super) fn translate_ident(name: &str, ctx: &Context) -> Ident {
    match ctx.ident_quoting {
        IdentQuoting::Verbatim => Ident::new(name),
        IdentQuoting::Auto => {
            if valid_ident().is_match(name) && !is_keyword(name) {
                Ident::new(name)
            } else {
                Ident::with_quote(ctx.dialect.ident_quote(), name)
            }
        }
    }
}

/// Table names may be qualified with a schema, as in `analytics.events`.
pub(super) fn translate_object_name(name: &str, ctx: &Context) -> ObjectName {
    ObjectName(name.split('.').map(|part| translate_ident(part, ctx)).collect())
}

pub(super) fn translate_column(name: &str, ctx: &Context) -> ast::Expr {
    ast::Expr::Identifier(translate_ident(name, ctx))
}

pub(super) fn translate_qualified(relation: &str, column: &str, ctx: &Context) -> ast::Expr {
    ast::Expr::CompoundIdentifier(vec![
        translate_ident(relation, ctx),
        translate_ident(column, ctx),
    ])
}

/// Sort key with an explicit direction.
pub(super) fn translate_column_sort(sort: &ColumnSort<String>, expr: ast::Expr) -> OrderByExpr {
    OrderByExpr {
        expr,
        asc: Some(matches!(sort.direction, SortDirection::Asc)),
    }
}

/// Sort key that leaves the direction to the engine, for grouping prefixes.
pub(super) fn translate_prefix_sort(expr: ast::Expr) -> OrderByExpr {
    OrderByExpr { expr, asc: None }
}

pub(super) fn translate_rq_expr(expr: &rq::Expr, ctx: &Context) -> ast::Expr {
    match expr {
        rq::Expr::Column(name) => translate_column(name, ctx),
        rq::Expr::Integer(value) => ast::Expr::Value(*value),
        rq::Expr::Binary { left, op, right } => ast::Expr::binary(
            translate_rq_expr(left, ctx),
            translate_binop(*op),
            translate_rq_expr(right, ctx),
        ),
    }
}

fn translate_binop(op: rq::BinOp) -> BinaryOperator {
    match op {
        rq::BinOp::Eq => BinaryOperator::Eq,
        rq::BinOp::Lte => BinaryOperator::LtEq,
        rq::BinOp::And => BinaryOperator::And,
    }
}

fn valid_ident() -> &'static Regex {
    static VALID_IDENT: OnceLock<Regex> = OnceLock::new();
    VALID_IDENT.get_or_init(|| {
        // An ident starting with `a-z_\$` and containing other characters `a-z0-9_\$`
        Regex::new(r"^[a-z_\$][a-z0-9_\$]*$").unwrap()
    })
}

fn is_keyword(name: &str) -> bool {
    static KEYWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    let keywords = KEYWORDS.get_or_init(|| ALL_KEYWORDS.iter().copied().collect());
    keywords.contains(name.to_ascii_uppercase().as_str())
}
