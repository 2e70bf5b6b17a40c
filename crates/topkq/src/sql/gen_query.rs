//! Renderers for engines with native top-k operators.

use itertools::Itertools;

use super::ast::{
    BinaryOperator, Distinct, Expr, ObjectName, OrderByExpr, Query, QueryHint, Select,
    SelectItem, TableFactor,
};
use super::gen_expr::{
    translate_column, translate_column_sort, translate_ident, translate_object_name,
    translate_prefix_sort, translate_qualified,
};
use super::Context;
use crate::ir::request::TopKRequest;

pub(super) const GROUP_ALIAS: &str = "grp";
pub(super) const LATERAL_ALIAS: &str = "lateral_data";

/// Top-1 per group:
///
/// ```sql
/// SELECT DISTINCT ON (by) * FROM table [OPTIONS (...)] ORDER BY by, order
/// ```
///
/// `DISTINCT ON` keeps the first row of each group in ORDER BY order, so the
/// partition columns must lead the ORDER BY, in the same order as the
/// `DISTINCT ON` list.
pub(super) fn translate_distinct_on(request: &TopKRequest, ctx: &Context) -> Query {
    let partition = request.partition().columns();

    let mut select = Select::from_table(translate_object_name(&request.table().name, ctx));
    select.distinct = Some(Distinct::On(
        partition.iter().map(|c| translate_column(c, ctx)).collect(),
    ));
    select
        .options
        .extend(request.group_size().map(QueryHint::DistinctOnInputGroupSize));

    let prefix = partition
        .iter()
        .map(|c| translate_prefix_sort(translate_column(c, ctx)));
    let sorts = (request.order().sorts().iter())
        .map(|sort| translate_column_sort(sort, translate_column(&sort.column, ctx)));

    let mut query = Query::new(select);
    query.order_by = prefix.chain(sorts).collect();
    query
}

/// Top-k per group for k > 1: a `LATERAL` subquery with `LIMIT k`, evaluated
/// once per distinct partition key.
///
/// ```sql
/// SELECT grp.b, lateral_data.*
/// FROM (SELECT DISTINCT b FROM table) AS grp,
///   LATERAL (SELECT <other columns> FROM table
///            WHERE b IS NOT DISTINCT FROM grp.b
///            [OPTIONS (...)] ORDER BY order LIMIT k) AS lateral_data
/// ORDER BY grp.b, order
/// ```
///
/// When the other columns are unknown (or there are none), the lateral side
/// selects `*` and carries the partition columns itself. The correlation uses
/// `IS NOT DISTINCT FROM` so that a NULL key still finds its rows.
pub(super) fn translate_lateral(request: &TopKRequest, ctx: &Context) -> Query {
    let table = translate_object_name(&request.table().name, ctx);
    let partition = request.partition();

    let other_columns = (request.table().columns.as_ref())
        .map(|columns| {
            (columns.iter())
                .filter(|c| !partition.contains(c))
                .collect_vec()
        })
        .filter(|columns| !columns.is_empty());

    // distinct keys
    let mut groups = Select::from_table(table.clone());
    groups.distinct = Some(Distinct::Distinct);
    groups.projection = (partition.columns().iter())
        .map(|c| SelectItem::UnnamedExpr(translate_column(c, ctx)))
        .collect();

    // the best k rows of one key
    let mut rows = Select::from_table(table);
    if let Some(columns) = &other_columns {
        rows.projection = (columns.iter())
            .map(|c| SelectItem::UnnamedExpr(translate_column(c, ctx)))
            .collect();
    }
    rows.selection = Expr::conjunction(partition.columns().iter().map(|c| {
        Expr::binary(
            translate_column(c, ctx),
            BinaryOperator::IsNotDistinctFrom,
            translate_qualified(GROUP_ALIAS, c, ctx),
        )
    }));
    rows.options
        .extend(request.group_size().map(QueryHint::LimitInputGroupSize));

    let mut rows = Query::new(rows);
    rows.order_by = (request.order().sorts().iter())
        .map(|sort| translate_column_sort(sort, translate_column(&sort.column, ctx)))
        .collect();
    rows.limit = Some(request.k());

    let mut select = Select {
        from: vec![
            TableFactor::Derived {
                lateral: false,
                subquery: Box::new(Query::new(groups)),
                alias: translate_ident(GROUP_ALIAS, ctx),
            },
            TableFactor::Derived {
                lateral: true,
                subquery: Box::new(rows),
                alias: translate_ident(LATERAL_ALIAS, ctx),
            },
        ],
        ..Default::default()
    };
    if other_columns.is_some() {
        select.projection = (partition.columns().iter())
            .map(|c| SelectItem::UnnamedExpr(translate_qualified(GROUP_ALIAS, c, ctx)))
            .collect();
    }
    select
        .projection
        .push(SelectItem::QualifiedWildcard(ObjectName(vec![translate_ident(
            LATERAL_ALIAS,
            ctx,
        )])));

    // A sort column that is also a partition column only exists on the group
    // side when the lateral projection left it out.
    let lateral_has = |column: &str| other_columns.is_none() || !partition.contains(column);

    let prefix = (partition.columns().iter())
        .map(|c| translate_prefix_sort(translate_qualified(GROUP_ALIAS, c, ctx)));
    let sorts = request.order().sorts().iter().map(|sort| {
        let relation = if lateral_has(&sort.column) {
            LATERAL_ALIAS
        } else {
            GROUP_ALIAS
        };
        translate_column_sort(sort, translate_qualified(relation, &sort.column, ctx))
    });

    let mut query = Query::new(select);
    query.order_by = prefix.chain(sorts).collect::<Vec<OrderByExpr>>();
    query
}
