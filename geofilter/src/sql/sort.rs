use crate::common::SortOrder;
use crate::filter::ValueReference;

use super::mapper::TableName;

/// One `ORDER BY` key on a mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCriterion {
    pub column: String,
    pub table: TableName,
    pub ascending: bool,
}

impl SortCriterion {
    pub fn new(table: TableName, column: &str, ascending: bool) -> Self {
        SortCriterion {
            column: column.to_string(),
            table,
            ascending,
        }
    }

    pub fn order(&self) -> SortOrder {
        if self.ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }
}

/// A sort key on a filter property, resolved through a
/// [`PropertyNameMapper`](super::PropertyNameMapper) at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortProperty {
    pub reference: ValueReference,
    pub order: SortOrder,
}

impl SortProperty {
    pub fn new(path: &str, order: SortOrder) -> Self {
        SortProperty {
            reference: ValueReference::new(path),
            order,
        }
    }

    pub fn ascending(path: &str) -> Self {
        SortProperty::new(path, SortOrder::Ascending)
    }

    pub fn descending(path: &str) -> Self {
        SortProperty::new(path, SortOrder::Descending)
    }
}
