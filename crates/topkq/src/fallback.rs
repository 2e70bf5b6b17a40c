//! The portable strategy: rank rows with a window function, keep the ones
//! ranked k or better.
//!
//! Besides being the rendering for engines without native top-k operators,
//! this is the reference the native renderings are checked against.

use crate::ir::generic::RankFunction;
use crate::ir::request::TopKRequest;
use crate::ir::rq::{Expr, RelationExpr};

/// Name of the temporary rank column. It never reaches the output.
pub const RANK_COLUMN: &str = "_rank";

pub fn window_rank(request: &TopKRequest, func: RankFunction) -> RelationExpr {
    if let Some(group_size) = request.group_size() {
        log::debug!("ignoring group size hint of {group_size}: no native top-k");
    }

    RelationExpr::table(request.table().clone())
        .window(
            RANK_COLUMN,
            func,
            request.partition().columns().to_vec(),
            request.order().sorts().to_vec(),
        )
        .filter(Expr::column(RANK_COLUMN).lte(Expr::Integer(request.k())))
        .exclude(vec![RANK_COLUMN.to_string()])
}
