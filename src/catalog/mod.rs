pub mod columns;
pub mod ingest;
pub mod models;
pub mod pricing;
pub mod transform;

pub use columns::{COLUMN_ALIASES, CatalogField, ColumnAliasTable};
pub use ingest::{IngestError, RowSource, SourceRows, source_for};
pub use models::{ParsedCatalog, Product};
pub use transform::build_catalog;
