//! Feature map for SQL dialects.
//!
//! The general principle is to render the portable window-function query
//! everywhere, and to use engine-specific top-k constructs only where the
//! engine's optimizer has a dedicated operator for them.
//!
//! Dialect-specifics should be added only if:
//! - the generic rendering is not supported (i.e. `SELECT *, expr` in MySQL),
//! - dialect-specific impl is more performant than generic impl.
use core::fmt::Debug;

use serde::{Deserialize, Serialize};
use strum::VariantNames;

/// SQL dialect.
///
/// This only changes the output for a relatively small subset of features.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Serialize,
    Default,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    Ansi,
    BigQuery,
    ClickHouse,
    DuckDb,
    #[default]
    Generic,
    Materialize,
    MsSql,
    MySql,
    Postgres,
    SQLite,
    Snowflake,
}

impl Dialect {
    pub(crate) fn handler(&self) -> Box<dyn DialectHandler> {
        match self {
            Dialect::MsSql => Box::new(MsSqlDialect),
            Dialect::MySql => Box::new(MySqlDialect),
            Dialect::BigQuery => Box::new(BigQueryDialect),
            Dialect::SQLite => Box::new(SQLiteDialect),
            Dialect::ClickHouse => Box::new(ClickHouseDialect),
            Dialect::Snowflake => Box::new(SnowflakeDialect),
            Dialect::DuckDb => Box::new(DuckDbDialect),
            Dialect::Postgres => Box::new(PostgresDialect),
            Dialect::Materialize => Box::new(MaterializeDialect),
            Dialect::Ansi | Dialect::Generic => Box::new(GenericDialect),
        }
    }

    /// Whether the engine has native top-k operators, i.e. `DISTINCT ON` and
    /// `LATERAL` subqueries with `OPTIONS` group size hints.
    pub fn supports_native_top_k(&self) -> bool {
        self.handler().supports_native_top_k()
    }

    pub fn names() -> &'static [&'static str] {
        Dialect::VARIANTS
    }
}

#[derive(Debug)]
pub struct GenericDialect;
#[derive(Debug)]
pub struct SQLiteDialect;
#[derive(Debug)]
pub struct MySqlDialect;
#[derive(Debug)]
pub struct MsSqlDialect;
#[derive(Debug)]
pub struct BigQueryDialect;
#[derive(Debug)]
pub struct ClickHouseDialect;
#[derive(Debug)]
pub struct SnowflakeDialect;
#[derive(Debug)]
pub struct DuckDbDialect;
#[derive(Debug)]
pub struct PostgresDialect;
#[derive(Debug)]
pub struct MaterializeDialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnExclude {
    Exclude,
    Except,
}

pub(crate) trait DialectHandler: Debug {
    fn ident_quote(&self) -> char {
        '"'
    }

    fn column_exclude(&self) -> Option<ColumnExclude> {
        None
    }

    /// Support for `SELECT *, expr`. When not supported, the wildcard is
    /// qualified with the relation name.
    fn bare_wildcard_with_exprs(&self) -> bool {
        true
    }

    /// Native top-k support: `DISTINCT ON` for k = 1 and `LATERAL` with
    /// `LIMIT` for k > 1, both accepting `OPTIONS (... INPUT GROUP SIZE = n)`.
    fn supports_native_top_k(&self) -> bool {
        false
    }
}

impl DialectHandler for GenericDialect {}

impl DialectHandler for PostgresDialect {}

impl DialectHandler for MaterializeDialect {
    fn supports_native_top_k(&self) -> bool {
        true
    }
}

impl DialectHandler for SQLiteDialect {}

impl DialectHandler for MsSqlDialect {
    fn ident_quote(&self) -> char {
        '['
    }

    fn bare_wildcard_with_exprs(&self) -> bool {
        false
    }
}

impl DialectHandler for MySqlDialect {
    fn ident_quote(&self) -> char {
        '`'
    }

    fn bare_wildcard_with_exprs(&self) -> bool {
        // https://dev.mysql.com/doc/refman/8.0/en/select.html
        false
    }
}

impl DialectHandler for ClickHouseDialect {
    fn ident_quote(&self) -> char {
        '`'
    }
}

impl DialectHandler for BigQueryDialect {
    fn ident_quote(&self) -> char {
        '`'
    }

    fn column_exclude(&self) -> Option<ColumnExclude> {
        // https://cloud.google.com/bigquery/docs/reference/standard-sql/query-syntax#select_except
        Some(ColumnExclude::Except)
    }
}

impl DialectHandler for SnowflakeDialect {
    fn column_exclude(&self) -> Option<ColumnExclude> {
        // https://docs.snowflake.com/en/sql-reference/sql/select.html
        Some(ColumnExclude::Exclude)
    }
}

impl DialectHandler for DuckDbDialect {
    fn column_exclude(&self) -> Option<ColumnExclude> {
        // https://duckdb.org/2022/05/04/friendlier-sql.html#select--exclude
        Some(ColumnExclude::Exclude)
    }
}
