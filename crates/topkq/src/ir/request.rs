//! Request types: the loosely-shaped arguments callers pass in ([TopKArgs])
//! and the canonical request the renderers consume ([TopKRequest]).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::generic::{ColumnSort, SortDirection};

/// A relation the query reads from.
///
/// Schema lookup is the caller's business: `columns` is whatever the host
/// knows about the table, and `None` when it knows nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableRef {
    #[serde(rename = "table")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl TableRef {
    pub fn new<S: Into<String>>(name: S) -> Self {
        TableRef {
            name: name.into(),
            columns: None,
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::new(name)
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::new(name)
    }
}

/// Partition columns, as a single name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum By {
    One(String),
    Many(Vec<String>),
}

/// Ordering columns, as a single name or a list of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OrderBy {
    One(String),
    Many(Vec<OrderByItem>),
}

/// One entry of an order-by list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OrderByItem {
    /// A column sorted in the request's default direction.
    Bare(String),
    /// A column and whether it sorts descending.
    Directed(String, bool),
}

impl From<&str> for By {
    fn from(name: &str) -> Self {
        By::One(name.to_string())
    }
}

impl From<String> for By {
    fn from(name: String) -> Self {
        By::One(name)
    }
}

impl From<Vec<&str>> for By {
    fn from(names: Vec<&str>) -> Self {
        By::Many(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for By {
    fn from(names: Vec<String>) -> Self {
        By::Many(names)
    }
}

impl From<&str> for OrderBy {
    fn from(name: &str) -> Self {
        OrderBy::One(name.to_string())
    }
}

impl From<String> for OrderBy {
    fn from(name: String) -> Self {
        OrderBy::One(name)
    }
}

impl From<Vec<&str>> for OrderBy {
    fn from(names: Vec<&str>) -> Self {
        OrderBy::Many(
            names
                .into_iter()
                .map(|n| OrderByItem::Bare(n.to_string()))
                .collect(),
        )
    }
}

impl From<Vec<(&str, bool)>> for OrderBy {
    fn from(pairs: Vec<(&str, bool)>) -> Self {
        OrderBy::Many(
            pairs
                .into_iter()
                .map(|(n, desc)| OrderByItem::Directed(n.to_string(), desc))
                .collect(),
        )
    }
}

impl From<Vec<OrderByItem>> for OrderBy {
    fn from(items: Vec<OrderByItem>) -> Self {
        OrderBy::Many(items)
    }
}

/// Arguments of a top-k synthesis call, as supplied by the caller.
///
/// Nothing here is validated; [crate::normalize::normalize] turns it into a
/// [TopKRequest] or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TopKArgs {
    #[serde(flatten)]
    pub table: TableRef,

    /// Number of rows to keep per group.
    pub k: i64,

    /// Partition columns.
    pub by: By,

    /// Columns to rank by within each group.
    pub order_by: OrderBy,

    /// Direction used for order-by entries given as bare names.
    #[serde(default = "default_desc")]
    pub desc: bool,

    /// Expected number of rows per group; an optimizer hint for engines that
    /// understand it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_size: Option<i64>,
}

fn default_desc() -> bool {
    true
}

impl TopKArgs {
    pub fn new<T, B, O>(table: T, k: i64, by: B, order_by: O) -> Self
    where
        T: Into<TableRef>,
        B: Into<By>,
        O: Into<OrderBy>,
    {
        TopKArgs {
            table: table.into(),
            k,
            by: by.into(),
            order_by: order_by.into(),
            desc: default_desc(),
            group_size: None,
        }
    }

    pub fn with_desc(mut self, desc: bool) -> Self {
        self.desc = desc;
        self
    }

    pub fn with_group_size(mut self, group_size: i64) -> Self {
        self.group_size = Some(group_size);
        self
    }
}

/// Ordered, non-empty set of partition column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct PartitionSpec(Vec<String>);

/// Ordered, non-empty sequence of sort keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct OrderSpec(Vec<ColumnSort<String>>);

impl PartitionSpec {
    pub(crate) fn new(columns: Vec<String>) -> Self {
        debug_assert!(!columns.is_empty());
        PartitionSpec(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }
}

impl OrderSpec {
    pub(crate) fn new(sorts: Vec<ColumnSort<String>>) -> Self {
        debug_assert!(!sorts.is_empty());
        OrderSpec(sorts)
    }

    pub fn sorts(&self) -> &[ColumnSort<String>] {
        &self.0
    }
}

/// A validated top-k request.
///
/// Only produced by [crate::normalize::normalize], so `k >= 1`, both specs
/// are non-empty and `group_size >= 1` when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct TopKRequest {
    pub(crate) table: TableRef,
    pub(crate) k: u64,
    pub(crate) partition: PartitionSpec,
    pub(crate) order: OrderSpec,
    pub(crate) group_size: Option<u64>,
}

impl TopKRequest {
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn k(&self) -> u64 {
        self.k
    }

    pub fn partition(&self) -> &PartitionSpec {
        &self.partition
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn group_size(&self) -> Option<u64> {
        self.group_size
    }
}

/// The canonical argument shape of a request: every list spelled out, every
/// direction explicit.
impl From<TopKRequest> for TopKArgs {
    fn from(request: TopKRequest) -> Self {
        let order_by = (request.order.0.into_iter())
            .map(|s| OrderByItem::Directed(s.column, s.direction == SortDirection::Desc))
            .collect();

        TopKArgs {
            table: request.table,
            k: request.k as i64,
            by: By::Many(request.partition.0),
            order_by: OrderBy::Many(order_by),
            desc: default_desc(),
            group_size: request.group_size.map(|g| g as i64),
        }
    }
}
