//! # topkq
//!
//! Synthesizes "top-k per group" queries: for every distinct value of the
//! partition columns, the k best rows according to an ordering.
//!
//! You probably want to start with the [compile] function.
//!
//! Which query comes out depends on the target engine:
//! ```ascii
//!     TopKArgs
//!        │
//!        │ normalize
//!        ▼
//!    TopKRequest ───── strategy::select(native top-k?, k)
//!        │
//!        ├── k = 1, native ──► SELECT DISTINCT ON (...)       ─► SQL
//!        ├── k > 1, native ──► LATERAL (... LIMIT k)           ─► SQL
//!        └── otherwise ──────► window rank + filter (RelationExpr)
//!                                   │ RelationExpr::to_sql
//!                                   ▼
//!                                  SQL
//! ```
//!
//! ## Common use-cases
//!
//! - Compile a request to SQL for an engine with native top-k operators:
//!
//!   ```
//!   # fn main() -> Result<(), topkq::ErrorMessages> {
//!   use topkq::{sql::Dialect, Options, Target, TopKArgs};
//!
//!   let opts = Options::default()
//!       .with_target(Target::Sql(Some(Dialect::Materialize)))
//!       .no_format()
//!       .no_signature();
//!   let sql = topkq::compile(TopKArgs::new("sales", 1, "region", "sales"), &opts)?;
//!   assert_eq!(
//!       sql.as_sql().unwrap(),
//!       "SELECT DISTINCT ON (region) * FROM sales ORDER BY region, sales DESC"
//!   );
//!   # Ok(())
//!   # }
//!   ```
//!
//! - Get the portable relation for any other engine, and lower it with the
//!   caller's own tooling or with [ir::rq::RelationExpr::to_sql].
//!
//! ## Feature flags
//!
//! * `cli`: enables the `topkq` CLI binary. This is enabled by default. When
//!   consuming this crate from another rust library, it can be disabled.

#![forbid(unsafe_code)]
// Our error type carries several strings & an Enum, which is above the
// default warning level. Given we're not that performance sensitive, it's fine
// to ignore this.
#![allow(clippy::result_large_err)]

use std::str::FromStr;
use std::sync::OnceLock;

use enum_as_inner::EnumAsInner;
use semver::Version;
use serde::{Deserialize, Serialize};

pub use error::{Error, MessageKind, Reason, WithErrorInfo};
pub use error_message::{ErrorMessage, ErrorMessages};
pub use ir::generic::RankFunction;
pub use ir::request::{TableRef, TopKArgs, TopKRequest};
pub use strategy::Strategy;

mod error;
mod error_message;
pub mod fallback;
pub mod functions;
pub mod ir;
pub mod normalize;
pub mod sql;
pub mod strategy;
#[cfg(test)]
mod test_engine;

use ir::rq::RelationExpr;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Get the version of the crate. This is determined by, in order:
/// - An optional environment variable `TOPKQ_VERSION_OVERRIDE`. Note that this
///   needs to be set the first time this function is called, since it's
///   stored in a static.
/// - The version in the cargo manifest
pub fn compiler_version() -> &'static Version {
    static COMPILER_VERSION: OnceLock<Version> = OnceLock::new();
    COMPILER_VERSION.get_or_init(|| {
        if let Ok(version_override) = std::env::var("TOPKQ_VERSION_OVERRIDE") {
            return Version::parse(&version_override).unwrap_or_else(|e| {
                panic!("Could not parse topkq version {}\n{}", version_override, e)
            });
        }
        let cargo_version = env!("CARGO_PKG_VERSION");
        Version::parse(cargo_version).unwrap_or_else(|e| {
            panic!(
                "Could not parse topkq version number {}\n{}",
                cargo_version, e
            )
        })
    })
}

/// Result of synthesizing a top-k query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, EnumAsInner)]
pub enum TopK {
    /// SQL text using the engine's native top-k operators.
    Sql(String),
    /// The portable window-rank relation, for the caller to lower.
    Relation(RelationExpr),
}

impl TopK {
    /// SQL text either way: a relation is lowered for the target in
    /// `options`.
    pub fn into_sql_text(self, options: &Options) -> Result<String, ErrorMessages> {
        match self {
            TopK::Sql(sql) => Ok(sql),
            TopK::Relation(rel) => rel.to_sql(options),
        }
    }
}

/// A request after strategy selection, before any text is produced.
#[derive(Debug, Clone)]
pub struct Plan {
    pub strategy: Strategy,
    pub request: TopKRequest,
    pub body: PlanBody,
}

#[derive(Debug, Clone, EnumAsInner)]
pub enum PlanBody {
    Native(sql::ast::Query),
    Relation(RelationExpr),
}

impl Plan {
    /// Produces the text of native plans, formatted and signed as configured
    /// in `options`.
    pub fn into_top_k(self, options: &Options) -> TopK {
        match self.body {
            PlanBody::Native(query) => TopK::Sql(sql::codegen(&query, options)),
            PlanBody::Relation(rel) => TopK::Relation(rel),
        }
    }
}

/// Normalize a request, pick a strategy for the target and render it.
pub fn plan(args: TopKArgs, options: &Options) -> Result<Plan, ErrorMessages> {
    plan_request(args, options).map_err(ErrorMessages::from)
}

fn plan_request(args: TopKArgs, options: &Options) -> Result<Plan> {
    let request = normalize::normalize(args)?;

    let dialect = options.target.dialect();
    let strategy = strategy::select(dialect.supports_native_top_k(), request.k());
    log::debug!("strategy for k = {} on {dialect}: {strategy}", request.k());

    let body = match strategy {
        Strategy::WindowRank => {
            PlanBody::Relation(fallback::window_rank(&request, options.rank_function))
        }
        native => PlanBody::Native(sql::translate_native(&request, native, options)?),
    };

    Ok(Plan {
        strategy,
        request,
        body,
    })
}

/// Synthesize a top-k query.
///
/// Native strategies produce SQL text, formatted and signed as configured in
/// `options`. The portable strategy produces a [RelationExpr].
///
/// ```
/// use topkq::{compile, Options, TopK, TopKArgs};
///
/// let args = TopKArgs::new("sales", 3, "region", "sales");
/// let rel = compile(args, &Options::default()).unwrap();
/// assert!(matches!(rel, TopK::Relation(_)));
/// ```
pub fn compile(args: TopKArgs, options: &Options) -> Result<TopK, ErrorMessages> {
    Ok(plan(args, options)?.into_top_k(options))
}

/// Synthesize a top-k query as SQL text, lowering the portable relation when
/// the target has no native top-k operators.
pub fn compile_to_sql(args: TopKArgs, options: &Options) -> Result<String, ErrorMessages> {
    compile(args, options)?.into_sql_text(options)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// If `None` is used, the generic dialect is assumed.
    Sql(Option<sql::Dialect>),
}

impl Default for Target {
    fn default() -> Self {
        Self::Sql(None)
    }
}

impl Target {
    pub fn names() -> Vec<String> {
        let mut names = vec!["sql.any".to_string()];

        let dialects = sql::Dialect::names();
        names.extend(dialects.iter().map(|d| format!("sql.{d}")));

        names
    }

    pub fn dialect(&self) -> sql::Dialect {
        match self {
            Target::Sql(dialect) => dialect.unwrap_or_default(),
        }
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Target, Self::Err> {
        if let Some(dialect) = s.strip_prefix("sql.") {
            if dialect == "any" {
                return Ok(Target::Sql(None));
            }

            if let Ok(dialect) = sql::Dialect::from_str(dialect) {
                return Ok(Target::Sql(Some(dialect)));
            }
        }

        Err(Error::new(Reason::NotFound {
            name: format!("{s:?}"),
            namespace: "target".to_string(),
        }))
    }
}

/// How names from the request become SQL identifiers.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum IdentQuoting {
    /// Emit names as given. The caller guarantees they are valid identifiers.
    #[default]
    Verbatim,
    /// Quote names that are not plain lowercase identifiers or that are
    /// keywords.
    Auto,
}

/// Synthesis options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Pass generated SQL string trough a formatter that splits it
    /// into multiple lines and prettifies indentation and spacing.
    ///
    /// Defaults to true.
    pub format: bool,

    /// Target and dialect to compile to. Decides whether native top-k
    /// operators are available.
    pub target: Target,

    /// Emits the crate signature as a comment after generated SQL
    ///
    /// Defaults to true.
    pub signature_comment: bool,

    pub ident_quoting: IdentQuoting,

    /// Ranking function of the portable strategy. `DenseRank` keeps all rows
    /// that tie at rank k; `RowNumber` keeps exactly k rows per group.
    pub rank_function: RankFunction,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: true,
            target: Target::Sql(None),
            signature_comment: true,
            ident_quoting: IdentQuoting::Verbatim,
            rank_function: RankFunction::DenseRank,
        }
    }
}

impl Options {
    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn no_format(self) -> Self {
        self.with_format(false)
    }

    pub fn with_signature_comment(mut self, signature_comment: bool) -> Self {
        self.signature_comment = signature_comment;
        self
    }

    pub fn no_signature(self) -> Self {
        self.with_signature_comment(false)
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_ident_quoting(mut self, ident_quoting: IdentQuoting) -> Self {
        self.ident_quoting = ident_quoting;
        self
    }

    pub fn with_rank_function(mut self, rank_function: RankFunction) -> Self {
        self.rank_function = rank_function;
        self
    }
}

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
