//! Candidate selection.
//!
//! A selection has one base and any number of exclusions:
//!
//! ```text
//! base:       collections  →  items  →  everything     (first one set wins)
//! exclusions: collections, items, file ids              (always applied)
//! ```
//!
//! The base is a precedence, not a merge: when collections are given, item
//! ids in the criteria are ignored for the base. Exclusions are subtractive
//! and apply to whichever base was used.

use crate::catalog::{BaseFilter, Catalog, CatalogError, CatalogRecord};
use crate::paths::UnsafePath;
use crate::types::Candidate;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("no selection: give collection ids, item ids, or ask for all files")]
    InvalidSelection,
    #[error("catalog file {file_id} has an unsafe path: {source}")]
    UnsafePath { file_id: u64, source: UnsafePath },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Declarative description of what to tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionCriteria {
    pub include_group_ids: BTreeSet<u64>,
    pub include_record_ids: BTreeSet<u64>,
    pub include_all: bool,
    pub exclude_group_ids: BTreeSet<u64>,
    pub exclude_record_ids: BTreeSet<u64>,
    pub exclude_candidate_ids: BTreeSet<u64>,
}

impl SelectionCriteria {
    /// Pick the base filter by precedence: groups, then records, then all.
    pub fn base_filter(&self) -> Result<BaseFilter, SelectError> {
        if !self.include_group_ids.is_empty() {
            Ok(BaseFilter::Groups(self.include_group_ids.clone()))
        } else if !self.include_record_ids.is_empty() {
            Ok(BaseFilter::Records(self.include_record_ids.clone()))
        } else if self.include_all {
            Ok(BaseFilter::All)
        } else {
            Err(SelectError::InvalidSelection)
        }
    }

    /// Whether any exclusion list removes this row.
    pub fn excludes(&self, record: &CatalogRecord) -> bool {
        self.exclude_candidate_ids.contains(&record.file_id)
            || self.exclude_record_ids.contains(&record.item_id)
            || record
                .collection_id
                .is_some_and(|id| self.exclude_group_ids.contains(&id))
    }
}

/// Build the ordered candidate list for a run.
///
/// Fails before touching the catalog when no inclusion mode is set. Order is
/// the catalog's; nothing is re-sorted.
pub fn select(
    criteria: &SelectionCriteria,
    catalog: &impl Catalog,
) -> Result<Vec<Candidate>, SelectError> {
    let filter = criteria.base_filter()?;
    log::debug!("selection base: {:?}", filter);

    let rows = catalog.query(&filter)?;
    let total = rows.len();
    let candidates = rows
        .into_iter()
        .filter(|record| !criteria.excludes(record))
        .map(|record| {
            let file_id = record.file_id;
            Candidate::new(file_id, record.item_id, record.collection_id, record.filename)
                .map_err(|source| SelectError::UnsafePath { file_id, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "selected {} of {} catalog files ({} excluded)",
        candidates.len(),
        total,
        total - candidates.len()
    );
    Ok(candidates)
}
