//! Read-only access to the image catalog.
//!
//! The catalog knows which files belong to which item and which item belongs
//! to which collection. The tiler only ever asks it one question: "give me
//! the file rows matching this base filter, in your order". How the rows are
//! stored is the catalog's business; [`JsonCatalog`] reads them from an
//! export file:
//!
//! ```json
//! {
//!   "records": [
//!     { "file_id": 7, "item_id": 3, "collection_id": 5, "filename": "2019/a.tif" },
//!     { "file_id": 8, "item_id": 4, "filename": "loose.jpg" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid catalog {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One file row as the catalog exports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub file_id: u64,
    pub item_id: u64,
    #[serde(default)]
    pub collection_id: Option<u64>,
    /// Path relative to the source root.
    pub filename: String,
}

/// Base set requested from the catalog before exclusions are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseFilter {
    Groups(BTreeSet<u64>),
    Records(BTreeSet<u64>),
    All,
}

impl BaseFilter {
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        match self {
            BaseFilter::Groups(ids) => record.collection_id.is_some_and(|id| ids.contains(&id)),
            BaseFilter::Records(ids) => ids.contains(&record.item_id),
            BaseFilter::All => true,
        }
    }
}

/// Read-only tabular query over the catalog.
pub trait Catalog {
    /// Rows matching `filter`, in catalog order.
    fn query(&self, filter: &BaseFilter) -> Result<Vec<CatalogRecord>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    records: Vec<CatalogRecord>,
}

/// Catalog backed by a JSON export, held in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    records: Vec<CatalogRecord>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile =
            serde_json::from_str(&content).map_err(|source| CatalogError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("loaded {} catalog rows from {}", file.records.len(), path.display());
        Ok(Self::from_records(file.records))
    }

    pub fn from_records(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }
}

impl Catalog for JsonCatalog {
    fn query(&self, filter: &BaseFilter) -> Result<Vec<CatalogRecord>, CatalogError> {
        Ok(self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(file_id: u64, item_id: u64, collection_id: Option<u64>, filename: &str) -> CatalogRecord {
        CatalogRecord {
            file_id,
            item_id,
            collection_id,
            filename: filename.to_string(),
        }
    }

    #[test]
    fn load_reads_records_in_file_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"records": [
                {"file_id": 7, "item_id": 3, "collection_id": 5, "filename": "2019/a.tif"},
                {"file_id": 8, "item_id": 4, "filename": "loose.jpg"}
            ]}"#,
        )
        .unwrap();

        let catalog = JsonCatalog::load(&path).unwrap();
        let rows = catalog.query(&BaseFilter::All).unwrap();
        assert_eq!(
            rows,
            vec![
                record(7, 3, Some(5), "2019/a.tif"),
                record(8, 4, None, "loose.jpg")
            ]
        );
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.json");
        assert!(matches!(JsonCatalog::load(&missing), Err(CatalogError::Io { .. })));

        let bad = tmp.path().join("bad.json");
        fs::write(&bad, "{\"rows\": []}").unwrap();
        assert!(matches!(JsonCatalog::load(&bad), Err(CatalogError::Json { .. })));
    }

    #[test]
    fn query_filters_by_group_and_record() {
        let catalog = JsonCatalog::from_records(vec![
            record(1, 10, Some(5), "a.jpg"),
            record(2, 11, Some(6), "b.jpg"),
            record(3, 12, None, "c.jpg"),
            record(4, 10, Some(5), "d.jpg"),
        ]);

        let groups = catalog
            .query(&BaseFilter::Groups(BTreeSet::from([5])))
            .unwrap();
        assert_eq!(
            groups.iter().map(|r| r.file_id).collect::<Vec<_>>(),
            vec![1, 4]
        );

        let items = catalog
            .query(&BaseFilter::Records(BTreeSet::from([11, 12])))
            .unwrap();
        assert_eq!(
            items.iter().map(|r| r.file_id).collect::<Vec<_>>(),
            vec![2, 3]
        );

        assert_eq!(catalog.query(&BaseFilter::All).unwrap().len(), 4);
    }
}
