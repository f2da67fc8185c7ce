use serde::{Deserialize, Serialize};
use crate::host::value::CellType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Static,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub cell_type: CellType,
    pub kind: ColumnKind,
}

/// Shape of a host table as seen by the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub keyspace: String,
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        TableSchema {
            keyspace: keyspace.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, cell_type: CellType, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            cell_type,
            kind,
        });
        self
    }

    pub fn partition_key(self, name: &str, cell_type: CellType) -> Self {
        self.with_column(name, cell_type, ColumnKind::PartitionKey)
    }

    pub fn clustering(self, name: &str, cell_type: CellType) -> Self {
        self.with_column(name, cell_type, ColumnKind::Clustering)
    }

    pub fn static_column(self, name: &str, cell_type: CellType) -> Self {
        self.with_column(name, cell_type, ColumnKind::Static)
    }

    pub fn regular(self, name: &str, cell_type: CellType) -> Self {
        self.with_column(name, cell_type, ColumnKind::Regular)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn partition_key_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns_of(ColumnKind::PartitionKey)
    }

    pub fn clustering_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns_of(ColumnKind::Clustering)
    }

    pub fn partition_key_types(&self) -> Vec<CellType> {
        self.partition_key_columns().map(|c| c.cell_type).collect()
    }

    pub fn clustering_types(&self) -> Vec<CellType> {
        self.clustering_columns().map(|c| c.cell_type).collect()
    }

    pub fn has_static_columns(&self) -> bool {
        self.columns_of(ColumnKind::Static).next().is_some()
    }

    /// A table with clustering columns stores several logical rows per partition
    pub fn is_wide(&self) -> bool {
        self.clustering_columns().next().is_some()
    }

    pub fn is_static(&self, column: &str) -> bool {
        self.column(column).map(|c| c.kind == ColumnKind::Static).unwrap_or(false)
    }

    fn columns_of(&self, kind: ColumnKind) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(move |c| c.kind == kind)
    }
}
