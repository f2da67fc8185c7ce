use std::cmp::Ordering;
use crate::host::row::Row;
use crate::host::value::{compare_prefix, CellValue};

/// A clustering slice with inclusive prefix bounds; empty bounds are open
#[derive(Debug, Clone, PartialEq)]
pub enum Slice {
    Static,
    Range {
        start: Vec<CellValue>,
        end: Vec<CellValue>,
    },
}

impl Slice {
    pub fn all() -> Self {
        Slice::Range { start: Vec::new(), end: Vec::new() }
    }

    /// The slice selecting exactly the rows under `prefix`
    pub fn prefix(prefix: &[CellValue]) -> Self {
        Slice::Range { start: prefix.to_vec(), end: prefix.to_vec() }
    }

    pub fn contains(&self, clustering: &[CellValue]) -> bool {
        match self {
            Slice::Static => clustering.is_empty(),
            Slice::Range { start, end } => clustering_in_range(clustering, start, end),
        }
    }
}

/// Whether `clustering` lies within the inclusive prefix bounds
pub fn clustering_in_range(clustering: &[CellValue], start: &[CellValue], end: &[CellValue]) -> bool {
    let head = |len: usize| &clustering[..len.min(clustering.len())];
    let after_start = start.is_empty() || compare_prefix(head(start.len()), start) != Ordering::Less;
    let before_end = end.is_empty() || compare_prefix(head(end.len()), end) != Ordering::Greater;
    after_start && before_end
}

/// Which parts of a partition a read returns
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    All,
    Slices(Vec<Slice>),
}

impl ColumnFilter {
    /// Whether any slice of the filter can return rows under `prefix`
    pub fn selects(&self, prefix: &[CellValue]) -> bool {
        match self {
            ColumnFilter::All => true,
            ColumnFilter::Slices(slices) => slices.iter().any(|s| s.contains(prefix)),
        }
    }

    pub fn selects_static(&self) -> bool {
        match self {
            ColumnFilter::All => true,
            ColumnFilter::Slices(slices) => slices.iter().any(|s| matches!(s, Slice::Static)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A `column <op> value` restriction of the host query
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub column: String,
    pub op: Operator,
    pub value: CellValue,
}

impl Expression {
    pub fn new(column: impl Into<String>, op: Operator, value: CellValue) -> Self {
        Expression { column: column.into(), op, value }
    }

    pub fn is_satisfied_by(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.column) else {
            return false;
        };
        let ord = actual.compare(&self.value);
        match self.op {
            Operator::Eq => ord == Ordering::Equal,
            Operator::Ne => ord != Ordering::Equal,
            Operator::Lt => ord == Ordering::Less,
            Operator::Le => ord != Ordering::Greater,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Ge => ord != Ordering::Less,
        }
    }
}

/// The host's read command: column filter, restrictions and row cap
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedFilter {
    pub columns: ColumnFilter,
    pub expressions: Vec<Expression>,
    pub max_rows: Option<usize>,
}

impl ExtendedFilter {
    pub fn new(expressions: Vec<Expression>) -> Self {
        ExtendedFilter {
            columns: ColumnFilter::All,
            expressions,
            max_rows: None,
        }
    }

    pub fn with_columns(mut self, columns: ColumnFilter) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Restriction on `column`, matched case-insensitively
    pub fn expression_on(&self, column: &str) -> Option<&Expression> {
        self.expressions
            .iter()
            .find(|e| e.column.trim().eq_ignore_ascii_case(column.trim()))
    }

    /// Every restriction except those on `skip_column` accepts the row
    pub fn is_satisfied_by(&self, row: &Row, skip_column: &str) -> bool {
        self.expressions
            .iter()
            .filter(|e| !e.column.trim().eq_ignore_ascii_case(skip_column))
            .all(|e| e.is_satisfied_by(row))
    }
}
