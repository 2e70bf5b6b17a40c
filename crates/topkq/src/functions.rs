//! SQL functions of the target engine that callers compose into their own
//! queries.

use crate::sql::ast::{Expr, Ident};

/// Materialize's logical timestamp: the time at which the query is
/// evaluated, advancing as the dataflow does. Used in temporal filters, as
/// in `WHERE mz_now() <= valid_until`.
pub fn mz_now() -> Expr {
    Expr::Function {
        name: Ident::new("mz_now"),
        args: Vec::new(),
    }
}
