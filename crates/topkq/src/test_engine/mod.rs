//! A tiny in-memory SQL evaluator, just big enough for the queries this crate
//! generates. Lets tests compare what the strategies *return*, rather than
//! what they look like.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;

use crate::ir::generic::RankFunction;
use crate::ir::rq::{self, RelationExpr, Transform};
use crate::sql::ast::{
    BinaryOperator, Distinct, Expr, OrderByExpr, Query, SelectItem, TableFactor,
};


type EvalResult<T> = Result<T, String>;

/// A SQL value. `Null` sorts after everything else, so it comes last in
/// ascending order and first in descending order, as in Postgres.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    Null,
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        assert!(rows.iter().all(|r| r.len() == columns.len()));
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }
}

#[derive(Debug, Default)]
pub struct Database {
    tables: HashMap<String, Table>,
}

/// Rows as a multiset of column-name to value maps, so results compare
/// regardless of row and column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet(pub Vec<BTreeMap<String, Value>>);

impl ResultSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Number of rows per distinct value of `columns`.
    pub fn group_sizes(&self, columns: &[String]) -> Vec<usize> {
        (self.0.iter())
            .map(|row| columns.iter().map(|c| row.get(c).cloned()).collect_vec())
            .counts()
            .into_values()
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Field {
    relation: Option<String>,
    name: String,
}

#[derive(Debug, Clone)]
struct Frame {
    fields: Vec<Field>,
    rows: Vec<Vec<Value>>,
}

/// Row of an enclosing query, visible to a correlated subquery.
struct Scope<'a> {
    fields: &'a [Field],
    row: &'a [Value],
    parent: Option<&'a Scope<'a>>,
}

impl Database {
    pub fn with_table(mut self, name: &str, table: Table) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn query(&self, query: &Query) -> EvalResult<ResultSet> {
        let frame = self.eval_query(query, None)?;
        into_result_set(frame)
    }

    /// Reference semantics of a relation expression, without going through
    /// SQL.
    pub fn eval_relation(&self, rel: &RelationExpr) -> EvalResult<ResultSet> {
        let mut frame = self.scan(&rel.from.name)?;
        for field in &mut frame.fields {
            field.relation = None;
        }

        for transform in &rel.transforms {
            match transform {
                Transform::Window {
                    name,
                    func,
                    partition,
                    sort,
                } => {
                    let lookup = |row: &[Value], column: &str| -> EvalResult<Value> {
                        resolve(None, column, &frame.fields, row, None)
                    };
                    let partition_keys: Vec<Vec<Value>> = (frame.rows.iter())
                        .map(|row| partition.iter().map(|c| lookup(row, c)).try_collect())
                        .try_collect()?;
                    let order_keys: Vec<Vec<Value>> = (frame.rows.iter())
                        .map(|row| sort.iter().map(|s| lookup(row, &s.column)).try_collect())
                        .try_collect()?;
                    let ascending = (sort.iter())
                        .map(|s| !s.direction.is_descending())
                        .collect_vec();

                    let ranks = rank_rows(&partition_keys, &order_keys, &ascending, *func);
                    frame.fields.push(Field {
                        relation: None,
                        name: name.clone(),
                    });
                    for (row, rank) in frame.rows.iter_mut().zip(ranks) {
                        row.push(rank);
                    }
                }
                Transform::Filter(predicate) => {
                    let mut kept = Vec::new();
                    for row in frame.rows {
                        if eval_rq(predicate, &frame.fields, &row)? == Value::Bool(true) {
                            kept.push(row);
                        }
                    }
                    frame.rows = kept;
                }
                Transform::Exclude(columns) => {
                    let keep = (frame.fields.iter())
                        .map(|f| !columns.contains(&f.name))
                        .collect_vec();
                    frame.fields = (frame.fields.into_iter().zip(&keep))
                        .filter(|(_, keep)| **keep)
                        .map(|(f, _)| f)
                        .collect();
                    for row in &mut frame.rows {
                        let values = std::mem::take(row);
                        *row = (values.into_iter().zip(&keep))
                            .filter(|(_, keep)| **keep)
                            .map(|(v, _)| v)
                            .collect();
                    }
                }
            }
        }

        into_result_set(frame)
    }

    fn scan(&self, name: &str) -> EvalResult<Frame> {
        let table = (self.tables.get(name)).ok_or_else(|| format!("unknown table {name}"))?;
        let relation = name.rsplit('.').next().map(str::to_string);

        Ok(Frame {
            fields: (table.columns.iter())
                .map(|c| Field {
                    relation: relation.clone(),
                    name: c.clone(),
                })
                .collect(),
            rows: table.rows.clone(),
        })
    }

    fn eval_query(&self, query: &Query, outer: Option<&Scope>) -> EvalResult<Frame> {
        let select = &query.body;

        let mut source = Frame {
            fields: Vec::new(),
            rows: vec![Vec::new()],
        };
        for factor in &select.from {
            source = self.join(source, factor, outer)?;
        }

        if let Some(predicate) = &select.selection {
            let mut kept = Vec::new();
            for row in source.rows {
                if eval_expr(predicate, &source.fields, &row, outer)? == Value::Bool(true) {
                    kept.push(row);
                }
            }
            source.rows = kept;
        }

        // window functions become hidden columns, named after their position
        for (position, item) in select.projection.iter().enumerate() {
            if let SelectItem::ExprWithAlias {
                expr: Expr::Window(window),
                ..
            } = item
            {
                let eval_all = |exprs: &[Expr]| -> EvalResult<Vec<Vec<Value>>> {
                    (source.rows.iter())
                        .map(|row| {
                            (exprs.iter())
                                .map(|e| eval_expr(e, &source.fields, row, outer))
                                .try_collect()
                        })
                        .try_collect()
                };
                let partition_keys = eval_all(&window.partition_by)?;
                let order_exprs = window.order_by.iter().map(|o| o.expr.clone()).collect_vec();
                let order_keys = eval_all(&order_exprs)?;
                let ascending = window.order_by.iter().map(is_ascending).collect_vec();

                let ranks = rank_rows(&partition_keys, &order_keys, &ascending, window.func);
                source.fields.push(Field {
                    relation: None,
                    name: hidden_name(position),
                });
                for (row, rank) in source.rows.iter_mut().zip(ranks) {
                    row.push(rank);
                }
            }
        }

        if !query.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(source.rows.len());
            for row in source.rows {
                let key: Vec<Value> = (query.order_by.iter())
                    .map(|o| eval_expr(&o.expr, &source.fields, &row, outer))
                    .try_collect()?;
                keyed.push((key, row));
            }
            let ascending = query.order_by.iter().map(is_ascending).collect_vec();
            keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &ascending));
            source.rows = keyed.into_iter().map(|(_, row)| row).collect();
        }

        if let Some(Distinct::On(exprs)) = &select.distinct {
            // first row of each key, in ORDER BY order
            let mut seen = HashSet::new();
            let mut kept = Vec::new();
            for row in source.rows {
                let key: Vec<Value> = (exprs.iter())
                    .map(|e| eval_expr(e, &source.fields, &row, outer))
                    .try_collect()?;
                if seen.insert(key) {
                    kept.push(row);
                }
            }
            source.rows = kept;
        }

        let mut output = project(&select.projection, &source, outer)?;

        if let Some(Distinct::Distinct) = &select.distinct {
            output.rows = output.rows.into_iter().unique().collect();
        }

        if let Some(limit) = query.limit {
            output.rows.truncate(limit as usize);
        }

        Ok(output)
    }

    fn join(&self, left: Frame, factor: &TableFactor, outer: Option<&Scope>) -> EvalResult<Frame> {
        match factor {
            TableFactor::Table { name, alias } => {
                let table_name = name.0.iter().map(|i| i.value.clone()).join(".");
                let mut right = self.scan(&table_name)?;
                if let Some(alias) = alias {
                    relabel(&mut right, &alias.value);
                }
                Ok(cross(left, right))
            }
            TableFactor::Derived {
                lateral: false,
                subquery,
                alias,
            } => {
                let mut right = self.eval_query(subquery, outer)?;
                relabel(&mut right, &alias.value);
                Ok(cross(left, right))
            }
            TableFactor::Derived {
                lateral: true,
                subquery,
                alias,
            } => {
                let mut fields = left.fields.clone();
                let mut rows = Vec::new();
                let mut right_fields = None;

                for left_row in &left.rows {
                    let scope = Scope {
                        fields: &left.fields,
                        row: left_row,
                        parent: outer,
                    };
                    let mut right = self.eval_query(subquery, Some(&scope))?;
                    relabel(&mut right, &alias.value);

                    for right_row in right.rows {
                        rows.push(left_row.iter().cloned().chain(right_row).collect());
                    }
                    right_fields.get_or_insert(right.fields);
                }

                fields.extend(right_fields.unwrap_or_default());
                Ok(Frame { fields, rows })
            }
        }
    }
}

fn project(items: &[SelectItem], source: &Frame, outer: Option<&Scope>) -> EvalResult<Frame> {
    // (output name, where the value comes from)
    enum Column<'a> {
        Field(usize),
        Expr(&'a Expr),
    }

    let visible = |i: &usize| !source.fields[*i].name.starts_with('#');

    let mut columns = Vec::new();
    for (position, item) in items.iter().enumerate() {
        match item {
            SelectItem::Wildcard(exclude) => {
                let excluded = (exclude.iter())
                    .flat_map(|e| e.columns.iter().map(|c| c.value.clone()))
                    .collect_vec();
                for i in (0..source.fields.len()).filter(visible) {
                    if !excluded.contains(&source.fields[i].name) {
                        columns.push((source.fields[i].name.clone(), Column::Field(i)));
                    }
                }
            }
            SelectItem::QualifiedWildcard(name) => {
                let relation = name.0.last().map(|i| i.value.as_str());
                for i in (0..source.fields.len()).filter(visible) {
                    if source.fields[i].relation.as_deref() == relation {
                        columns.push((source.fields[i].name.clone(), Column::Field(i)));
                    }
                }
            }
            SelectItem::UnnamedExpr(expr) => {
                let name = match expr {
                    Expr::Identifier(ident) => ident.value.clone(),
                    Expr::CompoundIdentifier(parts) => {
                        parts.last().map(|i| i.value.clone()).unwrap_or_default()
                    }
                    _ => "?column?".to_string(),
                };
                columns.push((name, Column::Expr(expr)));
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let column = match expr {
                    Expr::Window(_) => {
                        let hidden = hidden_name(position);
                        let index = (source.fields.iter())
                            .position(|f| f.name == hidden)
                            .ok_or("window was not computed")?;
                        Column::Field(index)
                    }
                    expr => Column::Expr(expr),
                };
                columns.push((alias.value.clone(), column));
            }
        }
    }

    let mut rows = Vec::with_capacity(source.rows.len());
    for row in &source.rows {
        let values: Vec<Value> = (columns.iter())
            .map(|(_, column)| match column {
                Column::Field(i) => Ok(row[*i].clone()),
                Column::Expr(expr) => eval_expr(expr, &source.fields, row, outer),
            })
            .try_collect()?;
        rows.push(values);
    }

    Ok(Frame {
        fields: (columns.into_iter())
            .map(|(name, _)| Field {
                relation: None,
                name,
            })
            .collect(),
        rows,
    })
}

fn eval_expr(
    expr: &Expr,
    fields: &[Field],
    row: &[Value],
    outer: Option<&Scope>,
) -> EvalResult<Value> {
    match expr {
        Expr::Identifier(ident) => resolve(None, &ident.value, fields, row, outer),
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [relation, column] => resolve(Some(&relation.value), &column.value, fields, row, outer),
            _ => Err(format!("unsupported identifier {expr}")),
        },
        Expr::Value(value) => Ok(Value::Int(*value as i64)),
        Expr::BinaryOp { left, op, right } => {
            let left = eval_expr(left, fields, row, outer)?;
            let right = eval_expr(right, fields, row, outer)?;
            Ok(match op {
                BinaryOperator::Eq => compare(left, right, |l, r| l == r),
                BinaryOperator::IsNotDistinctFrom => Value::Bool(left == right),
                BinaryOperator::LtEq => compare(left, right, |l, r| l <= r),
                BinaryOperator::And => and(left, right),
            })
        }
        Expr::Window(_) | Expr::Function { .. } => Err(format!("cannot evaluate {expr} here")),
    }
}

fn eval_rq(expr: &rq::Expr, fields: &[Field], row: &[Value]) -> EvalResult<Value> {
    match expr {
        rq::Expr::Column(name) => resolve(None, name, fields, row, None),
        rq::Expr::Integer(value) => Ok(Value::Int(*value as i64)),
        rq::Expr::Binary { left, op, right } => {
            let left = eval_rq(left, fields, row)?;
            let right = eval_rq(right, fields, row)?;
            Ok(match op {
                rq::BinOp::Eq => compare(left, right, |l, r| l == r),
                rq::BinOp::Lte => compare(left, right, |l, r| l <= r),
                rq::BinOp::And => and(left, right),
            })
        }
    }
}

/// Comparisons with NULL are NULL.
fn compare(left: Value, right: Value, op: impl Fn(&Value, &Value) -> bool) -> Value {
    if left == Value::Null || right == Value::Null {
        return Value::Null;
    }
    Value::Bool(op(&left, &right))
}

fn and(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
        (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

/// Finds a column in the current row, then in enclosing rows. A name that
/// matches more than one column of the same row is an error, as in SQL.
fn resolve(
    relation: Option<&str>,
    name: &str,
    fields: &[Field],
    row: &[Value],
    outer: Option<&Scope>,
) -> EvalResult<Value> {
    let matches = (fields.iter())
        .positions(|f| {
            f.name == name && relation.map_or(true, |r| f.relation.as_deref() == Some(r))
        })
        .collect_vec();

    match matches.as_slice() {
        [index] => Ok(row[*index].clone()),
        [] => match outer {
            Some(scope) => resolve(relation, name, scope.fields, scope.row, scope.parent),
            None => Err(format!("unknown column {name}")),
        },
        _ => Err(format!("ambiguous column {name}")),
    }
}

fn rank_rows(
    partition_keys: &[Vec<Value>],
    order_keys: &[Vec<Value>],
    ascending: &[bool],
    func: RankFunction,
) -> Vec<Value> {
    let mut ranks = vec![Value::Int(0); partition_keys.len()];

    let groups = (0..partition_keys.len()).into_group_map_by(|i| partition_keys[*i].clone());
    for mut indices in groups.into_values() {
        indices.sort_by(|a, b| compare_keys(&order_keys[*a], &order_keys[*b], ascending));

        let mut rank = 0;
        let mut previous: Option<&Vec<Value>> = None;
        for (position, index) in indices.iter().enumerate() {
            rank = match func {
                RankFunction::RowNumber => position as i64 + 1,
                RankFunction::DenseRank if previous == Some(&order_keys[*index]) => rank,
                RankFunction::DenseRank => rank + 1,
            };
            previous = Some(&order_keys[*index]);
            ranks[*index] = Value::Int(rank);
        }
    }
    ranks
}

fn compare_keys(a: &[Value], b: &[Value], ascending: &[bool]) -> Ordering {
    for ((a, b), asc) in a.iter().zip(b).zip(ascending) {
        let ordering = if *asc { a.cmp(b) } else { b.cmp(a) };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn is_ascending(order: &OrderByExpr) -> bool {
    order.asc.unwrap_or(true)
}

fn hidden_name(position: usize) -> String {
    format!("#{position}")
}

fn relabel(frame: &mut Frame, relation: &str) {
    for field in &mut frame.fields {
        field.relation = Some(relation.to_string());
    }
}

fn cross(left: Frame, right: Frame) -> Frame {
    let mut fields = left.fields;
    fields.extend(right.fields);

    let rows = (left.rows.iter())
        .cartesian_product(right.rows.iter())
        .map(|(l, r)| l.iter().chain(r).cloned().collect())
        .collect();

    Frame { fields, rows }
}

fn into_result_set(frame: Frame) -> EvalResult<ResultSet> {
    let names = frame.fields.iter().map(|f| f.name.clone()).collect_vec();
    if let Some(duplicate) = names.iter().duplicates().next() {
        return Err(format!("duplicate output column {duplicate}"));
    }

    let mut rows = (frame.rows.into_iter())
        .map(|row| names.iter().cloned().zip(row).collect::<BTreeMap<_, _>>())
        .collect_vec();
    rows.sort();
    Ok(ResultSet(rows))
}
