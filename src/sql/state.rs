//! Pending statement description: table, columns, joins, conditions, paging and write fields.

use crate::config::FilterOperator;
use serde_json::{Map, Value};

/// Row limit of a fresh state.
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT",
            JoinKind::Inner => "INNER",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
        }
    }
}

impl From<FilterOperator> for Operator {
    fn from(op: FilterOperator) -> Self {
        match op {
            FilterOperator::Eq => Operator::Eq,
            FilterOperator::NotEq => Operator::NotEq,
            FilterOperator::Lt => Operator::Lt,
            FilterOperator::Lte => Operator::Lte,
            FilterOperator::Gt => Operator::Gt,
            FilterOperator::Gte => Operator::Gte,
            FilterOperator::Contains => Operator::Like,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub table: String,
    pub left_key: String,
    pub operator: Operator,
    pub right_key: String,
    pub kind: JoinKind,
}

/// `table` is `None` when the condition targets the statement's own table.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub table: Option<String>,
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Membership {
    pub table: Option<String>,
    pub column: String,
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Range {
    pub table: Option<String>,
    pub column: String,
    pub low: Value,
    pub high: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub table: Option<String>,
    pub column: String,
    pub regex: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryState {
    pub table: String,
    pub columns: Vec<String>,
    pub joins: Vec<Join>,
    pub wheres: Vec<Comparison>,
    pub where_in: Vec<Membership>,
    pub betweens: Vec<Range>,
    pub regexps: Vec<Pattern>,
    pub group_by: Option<String>,
    pub order_by: Vec<String>,
    pub offset: u64,
    /// `None` renders no LIMIT.
    pub limit: Option<u64>,
    pub fields: Map<String, Value>,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            table: String::new(),
            columns: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            where_in: Vec::new(),
            betweens: Vec::new(),
            regexps: Vec::new(),
            group_by: None,
            order_by: Vec::new(),
            offset: 0,
            limit: Some(DEFAULT_LIMIT),
            fields: Map::new(),
        }
    }
}

impl QueryState {
    pub fn is_default(&self) -> bool {
        *self == QueryState::default()
    }
}
