//! Audit domain models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for fields missing from an indexed event
pub const MISSING_FIELD: &str = "N/A";

/// One audit event, flattened from an indexed CloudTrail document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub event_name: String,
    pub user: String,
    pub source_ip: String,
    pub resource: String,
    pub event_type: String,
}

/// Inclusive event-time window; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// What to match against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    MatchAll,
    /// Free text matched against event name, user name and source IP
    Text(String),
}

/// Backend-neutral search request; always sorted by event time, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub filter: SearchFilter,
    pub size: usize,
    pub range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub name: String,
    pub count: u64,
}

/// Raw aggregation result from the audit index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAggregation {
    pub total: u64,
    pub by_event_name: Vec<TermCount>,
    pub by_user: Vec<TermCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStatistics {
    pub total_events: u64,
    pub top_event_names: Vec<TermCount>,
    pub top_users: Vec<TermCount>,
}

/// Query string for `/admin/audit/search`
#[derive(Debug, Deserialize)]
pub struct AuditSearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_search_size")]
    pub size: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn default_search_size() -> usize {
    100
}

/// Query string for the "recent" and "by user" views
#[derive(Debug, Deserialize)]
pub struct AuditLimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}
