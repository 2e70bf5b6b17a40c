//! Backend for translating top-k requests into SQL.

pub mod ast;
mod dialect;
mod gen_expr;
mod gen_query;
mod gen_relation;

pub use dialect::{ColumnExclude, Dialect};

use std::sync::OnceLock;

use regex::Regex;
use sqlformat::{format, FormatOptions, QueryParams};

use self::dialect::DialectHandler;
use crate::ir::request::TopKRequest;
use crate::ir::rq::RelationExpr;
use crate::strategy::Strategy;
use crate::{compiler_version, Error, IdentQuoting, Options, Result};

/// Translation context, shared by all renderers of one call.
pub(crate) struct Context {
    pub dialect: Box<dyn DialectHandler>,
    pub ident_quoting: IdentQuoting,
}

impl Context {
    fn new(options: &Options) -> Self {
        let dialect = options.target.dialect();
        log::debug!("using dialect {dialect}");

        Context {
            dialect: dialect.handler(),
            ident_quoting: options.ident_quoting,
        }
    }
}

/// Renders a request with one of the native strategies.
pub(crate) fn translate_native(
    request: &TopKRequest,
    strategy: Strategy,
    options: &Options,
) -> Result<ast::Query> {
    let ctx = Context::new(options);

    match strategy {
        Strategy::DistinctPrefix => Ok(gen_query::translate_distinct_on(request, &ctx)),
        Strategy::CorrelatedLimit => Ok(gen_query::translate_lateral(request, &ctx)),
        Strategy::WindowRank => Err(Error::new_assert(
            "window rank is a relation, not a native query",
        )),
    }
}

/// Lowers a relation expression into a query.
pub(crate) fn translate_relation(rel: &RelationExpr, options: &Options) -> Result<ast::Query> {
    let ctx = Context::new(options);
    gen_relation::translate_relation(rel, &ctx)
}

/// Lowers a relation expression into SQL text.
pub(crate) fn compile_relation(rel: &RelationExpr, options: &Options) -> Result<String> {
    let query = translate_relation(rel, options)?;

    Ok(codegen(&query, options))
}

/// Renders a query AST as text, applying formatting and the signature
/// comment as configured.
pub(crate) fn codegen(query: &ast::Query, options: &Options) -> String {
    let sql = query.to_string();
    log::debug!("generated SQL: {sql}");

    let mut sql = if options.format {
        format_sql(&sql) + "\n"
    } else {
        sql
    };

    if options.signature_comment {
        if !sql.ends_with('\n') {
            sql.push('\n');
        }
        sql += &format!("\n-- Generated by topkq version:{}\n", compiler_version());
    }

    sql
}

/// Formats SQL, keeping each `OPTIONS (...)` hint on one line.
fn format_sql(sql: &str) -> String {
    static HINT: OnceLock<Regex> = OnceLock::new();
    let hint = HINT.get_or_init(|| Regex::new(r"OPTIONS \([^)]*\)").unwrap());

    let hints: Vec<&str> = hint.find_iter(sql).map(|m| m.as_str()).collect();
    let mut index = 0;
    let sql = hint.replace_all(sql, |_: &regex::Captures| {
        index += 1;
        hint_placeholder(index - 1)
    });

    let mut formatted = format(&sql, &QueryParams::default(), FormatOptions::default());
    for (i, text) in hints.iter().enumerate() {
        formatted = formatted.replacen(&hint_placeholder(i), text, 1);
    }
    formatted
}

fn hint_placeholder(index: usize) -> String {
    format!("topkq_hint_{index}")
}
