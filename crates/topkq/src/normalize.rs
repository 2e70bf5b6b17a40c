//! Turns caller-shaped [TopKArgs] into a canonical [TopKRequest].

use itertools::Itertools;

use crate::ir::generic::{ColumnSort, SortDirection};
use crate::ir::request::{By, OrderBy, OrderByItem, OrderSpec, PartitionSpec, TopKArgs, TopKRequest};
use crate::{Error, Result, WithErrorInfo};

pub fn normalize(args: TopKArgs) -> Result<TopKRequest> {
    let k = normalize_k(args.k)?;
    let partition = normalize_by(args.by)?;
    let order = normalize_order_by(args.order_by, args.desc)?;
    let group_size = args.group_size.map(normalize_group_size).transpose()?;

    let request = TopKRequest {
        table: args.table,
        k,
        partition,
        order,
        group_size,
    };
    log::trace!("normalized request: {request:?}");
    Ok(request)
}

fn normalize_k(k: i64) -> Result<u64> {
    if k < 1 {
        return Err(Error::invalid_argument(
            "k",
            format!("must be at least 1, but found {k}"),
        ));
    }
    Ok(k as u64)
}

fn normalize_group_size(group_size: i64) -> Result<u64> {
    if group_size < 1 {
        return Err(Error::invalid_argument(
            "group_size",
            format!("must be at least 1, but found {group_size}"),
        ))
        .push_hint("omit `group_size` if the expected group size is unknown");
    }
    Ok(group_size as u64)
}

fn normalize_by(by: By) -> Result<PartitionSpec> {
    let columns = match by {
        By::One(column) => vec![column],
        By::Many(columns) => columns,
    };

    if columns.is_empty() {
        return Err(Error::invalid_argument(
            "by",
            "requires at least one partition column",
        ));
    }

    let len = columns.len();
    let columns = columns.into_iter().unique().collect_vec();
    if columns.len() != len {
        log::debug!("dropped repeated partition columns, keeping {columns:?}");
    }

    Ok(PartitionSpec::new(columns))
}

fn normalize_order_by(order_by: OrderBy, desc: bool) -> Result<OrderSpec> {
    let default_direction = SortDirection::from_descending(desc);

    let sorts = match order_by {
        OrderBy::One(column) => vec![ColumnSort {
            direction: default_direction,
            column,
        }],
        OrderBy::Many(items) => {
            let bare = items
                .iter()
                .filter(|i| matches!(i, OrderByItem::Bare(_)))
                .count();
            if bare != 0 && bare != items.len() {
                return Err(Error::invalid_argument(
                    "order_by",
                    "mixes bare column names and (column, descending) pairs",
                ))
                .push_hint("give every entry a direction, or none of them");
            }

            (items.into_iter())
                .map(|item| match item {
                    OrderByItem::Bare(column) => ColumnSort {
                        direction: default_direction,
                        column,
                    },
                    OrderByItem::Directed(column, descending) => ColumnSort {
                        direction: SortDirection::from_descending(descending),
                        column,
                    },
                })
                .collect_vec()
        }
    };

    if sorts.is_empty() {
        return Err(Error::invalid_argument(
            "order_by",
            "requires at least one column to rank by",
        ));
    }

    Ok(OrderSpec::new(sorts))
}
