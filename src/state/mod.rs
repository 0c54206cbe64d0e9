/// State management module
///
/// This module handles all gallery state, including:
/// - Shared data structures from the history store (data.rs)
/// - History curation: dedup, filter, sort, date grouping (history.rs)
/// - Interaction modes and selection (selection.rs)

pub mod data;
pub mod history;
pub mod selection;

pub use data::{EntryStatus, HistoryEntry};
pub use history::{
    curate, CuratedEntry, CuratedView, DateGroup, SeverityBucket, SeverityFilter, SortDirection,
};
pub use selection::{ClickOutcome, InteractionMode, SelectionState, MAX_EDIT_SELECTION};
