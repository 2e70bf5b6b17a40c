//! Lowering of [RelationExpr] into a SQL query.
//!
//! Transforms are folded into a single `SELECT` for as long as SQL allows it;
//! a filter on a window column needs a subquery, since window results are
//! not visible in `WHERE` of the same `SELECT`.

use super::ast::{
    BinaryOperator, ExcludeColumns, Expr, ObjectName, Query, Select, SelectItem, TableFactor,
    WindowFunction,
};
use super::gen_expr::{
    translate_column, translate_column_sort, translate_ident, translate_object_name,
    translate_rq_expr,
};
use super::Context;
use crate::ir::rq::{self, RelationExpr, Transform};
use crate::{Error, Result, WithErrorInfo};

const SUBQUERY_ALIAS: &str = "ranked";

struct SelectBuilder {
    select: Select,
    /// Name by which the current `FROM` relation can be referenced.
    relation: ObjectName,
    /// Columns computed in this `SELECT`, which `WHERE` can't see.
    computed: Vec<String>,
    projected: bool,
    /// Known columns of the relation, if any.
    columns: Option<Vec<String>>,
    depth: usize,
}

pub(super) fn translate_relation(rel: &RelationExpr, ctx: &Context) -> Result<Query> {
    let relation = translate_object_name(&rel.from.name, ctx);
    let mut builder = SelectBuilder {
        select: Select::from_table(relation.clone()),
        relation,
        computed: Vec::new(),
        projected: false,
        columns: rel.from.columns.clone(),
        depth: 0,
    };

    for transform in &rel.transforms {
        match transform {
            Transform::Window {
                name,
                func,
                partition,
                sort,
            } => {
                if builder.projected || builder.select.selection.is_some() {
                    builder.wrap(ctx);
                }

                let window = WindowFunction {
                    func: *func,
                    partition_by: partition.iter().map(|c| translate_column(c, ctx)).collect(),
                    order_by: (sort.iter())
                        .map(|s| translate_column_sort(s, translate_column(&s.column, ctx)))
                        .collect(),
                };

                if builder.computed.is_empty() && !ctx.dialect.bare_wildcard_with_exprs() {
                    builder.select.projection =
                        vec![SelectItem::QualifiedWildcard(builder.relation.clone())];
                }
                builder.select.projection.push(SelectItem::ExprWithAlias {
                    expr: Expr::Window(window),
                    alias: translate_ident(name, ctx),
                });
                builder.computed.push(name.clone());
                if let Some(columns) = &mut builder.columns {
                    columns.push(name.clone());
                }
            }
            Transform::Filter(predicate) => {
                if references_any(predicate, &builder.computed) || builder.projected {
                    builder.wrap(ctx);
                }

                let predicate = translate_rq_expr(predicate, ctx);
                builder.select.selection = Some(match builder.select.selection.take() {
                    Some(existing) => Expr::binary(existing, BinaryOperator::And, predicate),
                    None => predicate,
                });
            }
            Transform::Exclude(excluded) => {
                if builder.projected || !builder.computed.is_empty() {
                    builder.wrap(ctx);
                }

                builder.select.projection = match &mut builder.columns {
                    Some(columns) => {
                        columns.retain(|c| !excluded.contains(c));
                        columns
                            .iter()
                            .map(|c| SelectItem::UnnamedExpr(translate_column(c, ctx)))
                            .collect()
                    }
                    None => {
                        let kind = ctx.dialect.column_exclude().ok_or_else(|| {
                            Error::new_simple(format!(
                                "cannot drop columns {excluded:?} from a relation of unknown columns"
                            ))
                            .push_hint("this dialect has no `SELECT * EXCLUDE` or `SELECT * EXCEPT`")
                            .push_hint("list the table's columns in the request")
                        })?;
                        vec![SelectItem::Wildcard(Some(ExcludeColumns {
                            kind,
                            columns: excluded.iter().map(|c| translate_ident(c, ctx)).collect(),
                        }))]
                    }
                };
                builder.projected = true;
            }
        }
    }

    Ok(Query::new(builder.select))
}

impl SelectBuilder {
    /// Turns the current `SELECT` into a subquery of a new `SELECT *`.
    fn wrap(&mut self, ctx: &Context) {
        self.depth += 1;
        let alias = if self.depth == 1 {
            SUBQUERY_ALIAS.to_string()
        } else {
            format!("{SUBQUERY_ALIAS}_{}", self.depth)
        };
        let alias = translate_ident(&alias, ctx);

        let inner = std::mem::take(&mut self.select);
        self.select = Select {
            projection: vec![SelectItem::Wildcard(None)],
            from: vec![TableFactor::Derived {
                lateral: false,
                subquery: Box::new(Query::new(inner)),
                alias: alias.clone(),
            }],
            ..Default::default()
        };
        self.relation = ObjectName(vec![alias]);
        self.computed.clear();
        self.projected = false;
    }
}

fn references_any(expr: &rq::Expr, columns: &[String]) -> bool {
    match expr {
        rq::Expr::Column(name) => columns.contains(name),
        rq::Expr::Integer(_) => false,
        rq::Expr::Binary { left, right, .. } => {
            references_any(left, columns) || references_any(right, columns)
        }
    }
}
