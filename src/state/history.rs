/// History curation
///
/// Turns the raw record list from the external history store into the
/// view the gallery renders: deduplicated, filtered by severity bucket,
/// sorted, and bucketed into local-calendar-day groups. The whole
/// derivation is recomputed from scratch whenever its inputs change;
/// nothing here is patched incrementally.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Local, LocalResult, NaiveDate, TimeZone};

use super::data::{EntryStatus, HistoryEntry};
use crate::moderation::{normalize, ModerationInfo, Severity};

/// One severity bucket of the multi-select filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityBucket {
    All,
    /// Severity none (includes entries not yet scored)
    Safe,
    Mild,
    Sensitive,
}

/// Multi-select severity filter.
///
/// Selecting any specific bucket removes `All`; selecting `All` clears
/// the others; an empty selection always collapses back to `All`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityFilter {
    buckets: BTreeSet<SeverityBucket>,
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self {
            buckets: BTreeSet::from([SeverityBucket::All]),
        }
    }
}

impl SeverityFilter {
    /// Toggle one bucket, applying the collapse rules.
    pub fn toggle(&mut self, bucket: SeverityBucket) {
        if bucket == SeverityBucket::All {
            self.buckets = BTreeSet::from([SeverityBucket::All]);
            return;
        }
        self.buckets.remove(&SeverityBucket::All);
        if !self.buckets.remove(&bucket) {
            self.buckets.insert(bucket);
        }
        if self.buckets.is_empty() {
            self.buckets.insert(SeverityBucket::All);
        }
    }

    pub fn is_selected(&self, bucket: SeverityBucket) -> bool {
        self.buckets.contains(&bucket)
    }

    fn matches(&self, severity: Severity) -> bool {
        if self.buckets.contains(&SeverityBucket::All) {
            return true;
        }
        let bucket = match severity {
            Severity::None => SeverityBucket::Safe,
            Severity::Mild => SeverityBucket::Mild,
            Severity::Sensitive => SeverityBucket::Sensitive,
        };
        self.buckets.contains(&bucket)
    }
}

/// Sort direction for the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::NewestFirst => Self::OldestFirst,
            Self::OldestFirst => Self::NewestFirst,
        }
    }
}

/// A history entry decorated with its normalized moderation result.
///
/// `moderation` is `None` for entries the scorer has never seen, which
/// the redaction policy treats differently from a scored-clean result.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedEntry {
    pub entry: HistoryEntry,
    pub moderation: Option<ModerationInfo>,
}

impl CuratedEntry {
    fn decorate(entry: HistoryEntry) -> Self {
        let moderation = entry.moderation_raw.as_ref().map(normalize);
        Self { entry, moderation }
    }

    /// Severity used for filtering; unscored entries count as none.
    pub fn severity(&self) -> Severity {
        self.moderation
            .as_ref()
            .map(|m| m.severity)
            .unwrap_or(Severity::None)
    }
}

/// Entries of one local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup {
    /// Date key, `YYYY-MM-DD` of the local day
    pub id: String,
    /// Human-readable date label
    pub label: String,
    /// Local midnight of that day
    pub timestamp: DateTime<Local>,
    pub items: Vec<CuratedEntry>,
}

/// The fully-derived gallery view.
#[derive(Debug, Clone, Default)]
pub struct CuratedView {
    pub groups: Vec<DateGroup>,
}

impl CuratedView {
    /// Flat ordered identity list, the navigation domain for prev/next.
    pub fn flat_ids(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.items.iter().map(|e| e.entry.prompt_id.clone()))
            .collect()
    }

    pub fn find(&self, prompt_id: &str) -> Option<&CuratedEntry> {
        self.groups
            .iter()
            .flat_map(|g| g.items.iter())
            .find(|e| e.entry.prompt_id == prompt_id)
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Derive the gallery view from the raw store records.
pub fn curate(
    entries: &[HistoryEntry],
    filter: &SeverityFilter,
    direction: SortDirection,
) -> CuratedView {
    // Dedup by identity, last-seen record wins. The store occasionally
    // emits the same entry twice across refreshes.
    let mut by_id: HashMap<&str, &HistoryEntry> = HashMap::new();
    for entry in entries {
        by_id.insert(entry.prompt_id.as_str(), entry);
    }

    let mut curated: Vec<CuratedEntry> = by_id
        .into_values()
        .filter(|e| e.status != EntryStatus::Failed)
        .cloned()
        .map(CuratedEntry::decorate)
        .filter(|e| filter.matches(e.severity()))
        .collect();

    // Identity tie-break keeps the order stable for equal timestamps.
    curated.sort_by(|a, b| {
        let key = |e: &CuratedEntry| (e.entry.sort_timestamp(), e.entry.prompt_id.clone());
        match direction {
            SortDirection::NewestFirst => key(b).cmp(&key(a)),
            SortDirection::OldestFirst => key(a).cmp(&key(b)),
        }
    });

    CuratedView {
        groups: group_by_local_day(curated),
    }
}

/// Bucket sorted entries into local calendar days, preserving order.
fn group_by_local_day(entries: Vec<CuratedEntry>) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for entry in entries {
        let day = local_day(&entry);
        match groups.last_mut() {
            Some(group) if group.id == day.format("%Y-%m-%d").to_string() => {
                group.items.push(entry);
            }
            _ => groups.push(DateGroup {
                id: day.format("%Y-%m-%d").to_string(),
                label: day.format("%B %d, %Y").to_string(),
                timestamp: local_midnight(day),
                items: vec![entry],
            }),
        }
    }
    groups
}

/// The local calendar day of an entry's sort timestamp.
///
/// Grouping is deliberately done in local time so captures shortly
/// before and after a UTC midnight land on the day the user saw them.
fn local_day(entry: &CuratedEntry) -> NaiveDate {
    let millis = entry.entry.sort_timestamp();
    match Local.timestamp_millis_opt(millis) {
        LocalResult::Single(t) => t.date_naive(),
        LocalResult::Ambiguous(t, _) => t.date_naive(),
        LocalResult::None => NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default(),
    }
}

/// Local midnight of a calendar day, tolerant of DST gaps.
fn local_midnight(day: NaiveDate) -> DateTime<Local> {
    let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t,
        LocalResult::None => Local
            .timestamp_millis_opt(0)
            .single()
            .unwrap_or_else(Local::now),
    }
}
