//! Read-only access to the metadata catalog.
//!
//! Language objects never own catalog records: tables, columns and procedures
//! keep a [`MetadataRef`], a weak back-reference used only for name lookups.
//! The catalog itself lives outside this crate; [`Catalog`] is a small
//! in-memory stand-in used by the CLI and by tests.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use super::rewrite::{rewrite, Rewrite, Rewriter};
use super::types::{ColumnReference, NamedTable};

/// A catalog record as seen by translators.
pub trait MetadataRecord: Send + Sync {
    /// Logical name in the federated model.
    fn name(&self) -> &str;

    /// Native name of the object in the source, if it differs.
    fn name_in_source(&self) -> Option<&str> {
        None
    }
}

/// The name a translator should emit for `record`: the source-native name when
/// set and non-empty, otherwise the logical name.
pub fn source_name(record: &dyn MetadataRecord) -> &str {
    match record.name_in_source() {
        Some(native) if !native.is_empty() => native,
        _ => record.name(),
    }
}

/// Non-owning reference from a language object to its catalog record.
#[derive(Clone)]
pub struct MetadataRef(Weak<dyn MetadataRecord>);

impl MetadataRef {
    pub fn new<R: MetadataRecord + 'static>(record: &Arc<R>) -> Self {
        let weak: Weak<R> = Arc::downgrade(record);
        Self(weak)
    }

    pub fn from_shared(record: &Arc<dyn MetadataRecord>) -> Self {
        Self(Arc::downgrade(record))
    }

    /// The record, if the catalog still holds it.
    pub fn get(&self) -> Option<Arc<dyn MetadataRecord>> {
        self.0.upgrade()
    }

    /// Resolved source name, or `None` when the record is gone.
    pub fn source_name(&self) -> Option<String> {
        self.get().map(|record| source_name(record.as_ref()).to_string())
    }
}

impl PartialEq for MetadataRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MetadataRef {}

impl fmt::Debug for MetadataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(record) => write!(f, "MetadataRef({:?})", record.name()),
            None => f.write_str("MetadataRef(<dropped>)"),
        }
    }
}

/// A plain catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub name: String,
    pub name_in_source: Option<String>,
}

impl CatalogRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_in_source: None,
        }
    }

    pub fn with_name_in_source(mut self, native: impl Into<String>) -> Self {
        self.name_in_source = Some(native.into());
        self
    }
}

impl MetadataRecord for CatalogRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn name_in_source(&self) -> Option<&str> {
        self.name_in_source.as_deref()
    }
}

/// In-memory catalog keyed by lower-cased logical name.
///
/// Columns are keyed as `table.column`. The catalog owns its records, so it
/// must outlive any tree it binds.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, Arc<CatalogRecord>>,
    columns: HashMap<String, Arc<CatalogRecord>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, record: CatalogRecord) -> Arc<CatalogRecord> {
        let record = Arc::new(record);
        self.tables
            .insert(record.name.to_lowercase(), Arc::clone(&record));
        record
    }

    /// Register a column of `table`.
    pub fn add_column(&mut self, table: &str, record: CatalogRecord) -> Arc<CatalogRecord> {
        let record = Arc::new(record);
        let key = format!("{}.{}", table, record.name).to_lowercase();
        self.columns.insert(key, Arc::clone(&record));
        record
    }

    pub fn table(&self, name: &str) -> Option<&Arc<CatalogRecord>> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn column(&self, table: &str, name: &str) -> Option<&Arc<CatalogRecord>> {
        self.columns.get(&format!("{}.{}", table, name).to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty()
    }

    /// Attach metadata references to every named table and column reference
    /// in `node` whose logical name is known to the catalog.
    pub fn bind<N: Rewrite + ?Sized>(&self, node: &mut N) {
        let mut binder = Binder {
            catalog: self,
            bound: 0,
        };
        rewrite(node, &mut binder);
        tracing::debug!(bound = binder.bound, "bound metadata references");
    }
}

struct Binder<'c> {
    catalog: &'c Catalog,
    bound: usize,
}

impl Binder<'_> {
    fn bind_table(&mut self, table: &mut NamedTable) {
        if let Some(record) = self.catalog.table(&table.name) {
            table.metadata = Some(MetadataRef::new(record));
            self.bound += 1;
        }
    }
}

impl Rewriter for Binder<'_> {
    fn rewrite_named_table(&mut self, table: &mut NamedTable) {
        self.bind_table(table);
    }

    fn rewrite_column_reference(&mut self, column: &mut ColumnReference) {
        let Some(table) = column.table.as_mut() else {
            return;
        };
        self.bind_table(table);
        if let Some(record) = self.catalog.column(&table.name, &column.name) {
            column.metadata = Some(MetadataRef::new(record));
            self.bound += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::*;

    #[test]
    fn test_source_name_prefers_native_name() {
        let plain = CatalogRecord::new("orders");
        assert_eq!(source_name(&plain), "orders");

        let native = CatalogRecord::new("orders").with_name_in_source("dbo.ORDERS_T");
        assert_eq!(source_name(&native), "dbo.ORDERS_T");

        let empty = CatalogRecord::new("orders").with_name_in_source("");
        assert_eq!(source_name(&empty), "orders");
    }

    #[test]
    fn test_metadata_ref_is_non_owning() {
        let record = Arc::new(CatalogRecord::new("orders").with_name_in_source("ORD"));
        let reference = MetadataRef::new(&record);
        assert_eq!(reference.source_name().as_deref(), Some("ORD"));
        assert_eq!(Arc::strong_count(&record), 1);

        drop(record);
        assert!(reference.get().is_none());
        assert_eq!(format!("{:?}", reference), "MetadataRef(<dropped>)");
    }

    #[test]
    fn test_metadata_ref_equality_is_identity() {
        let a = Arc::new(CatalogRecord::new("t"));
        let b = Arc::new(CatalogRecord::new("t"));
        assert_eq!(MetadataRef::new(&a), MetadataRef::new(&a));
        assert_ne!(MetadataRef::new(&a), MetadataRef::new(&b));
    }

    #[test]
    fn test_catalog_binds_tables_and_columns() {
        let mut catalog = Catalog::new();
        catalog.add_table(CatalogRecord::new("Orders").with_name_in_source("ORD_T"));
        catalog.add_column("orders", CatalogRecord::new("id").with_name_in_source("ORD_ID"));

        let table = NamedTable::new("orders");
        let mut command = Command::from(Select {
            derived_columns: vec![DerivedColumn::new(ColumnReference::qualified(
                table.clone(),
                "id",
            ))],
            from: vec![TableReference::Named(table)],
            ..Default::default()
        });
        catalog.bind(&mut command);

        let Command::Query(QueryExpression::Select(select)) = &command else {
            panic!("expected select");
        };
        let TableReference::Named(from) = &select.from[0] else {
            panic!("expected named table");
        };
        assert_eq!(
            from.metadata.as_ref().and_then(MetadataRef::source_name),
            Some("ORD_T".to_string())
        );
        let Expression::Column(column) = &select.derived_columns[0].expression else {
            panic!("expected column");
        };
        assert_eq!(
            column.metadata.as_ref().and_then(MetadataRef::source_name),
            Some("ORD_ID".to_string())
        );
    }
}
