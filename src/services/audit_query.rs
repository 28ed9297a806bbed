//! 审计日志查询服务
//!
//! 把文本查询翻译为后端无关的 `SearchRequest`，并把索引文档整理为 `AuditRecord`。

use crate::{
    error::QueryError,
    models::audit::{
        AuditRecord, DateRange, EventStatistics, SearchFilter, SearchRequest, MISSING_FIELD,
    },
    repository::AuditIndex,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_SEARCH_SIZE: usize = 1000;
pub const STATISTICS_TOP_N: usize = 10;

pub struct AuditQuery {
    index: Arc<dyn AuditIndex>,
}

fn text_field(source: &Value, pointer: &str) -> String {
    match source.pointer(pointer) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => MISSING_FIELD.to_string(),
        Some(Value::String(_)) => MISSING_FIELD.to_string(),
        Some(other) => other.to_string(),
    }
}

/// 将一条 CloudTrail 文档整理为审计记录，缺失字段显示为 `N/A`
pub fn record_from_source(source: &Value) -> AuditRecord {
    let timestamp = source
        .get("eventTime")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    AuditRecord {
        timestamp,
        event_name: text_field(source, "/eventName"),
        user: text_field(source, "/userIdentity/userName"),
        source_ip: text_field(source, "/sourceIPAddress"),
        resource: text_field(source, "/resources/0/ARN"),
        event_type: text_field(source, "/eventType"),
    }
}

/// 空串或 `*` 表示匹配全部
fn parse_filter(query_text: &str) -> SearchFilter {
    match query_text.trim() {
        "" | "*" => SearchFilter::MatchAll,
        text => SearchFilter::Text(text.to_string()),
    }
}

impl AuditQuery {
    pub fn new(index: Arc<dyn AuditIndex>) -> Self {
        Self { index }
    }

    /// 搜索审计事件，按事件时间倒序
    pub async fn search(
        &self,
        query_text: &str,
        size: usize,
        range: Option<DateRange>,
    ) -> Result<Vec<AuditRecord>, QueryError> {
        if let Some(DateRange {
            start: Some(start),
            end: Some(end),
        }) = range
        {
            if start > end {
                return Err(QueryError::InvalidRequest(format!(
                    "Start date {} is after end date {}",
                    start, end
                )));
            }
        }

        if size == 0 {
            return Ok(Vec::new());
        }

        let request = SearchRequest {
            filter: parse_filter(query_text),
            size: size.min(MAX_SEARCH_SIZE),
            range: range.filter(|r| !r.is_open()),
        };

        let documents = self.index.search(&request).await.map_err(|e| {
            warn!(error = %e, "Audit search failed");
            e
        })?;

        let mut records: Vec<AuditRecord> = documents.iter().map(record_from_source).collect();
        // 无时间戳的记录排在最后
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(request.size);

        debug!(
            filter = ?request.filter,
            size = request.size,
            hits = records.len(),
            "Audit search completed"
        );
        Ok(records)
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<AuditRecord>, QueryError> {
        self.search("*", limit, None).await
    }

    pub async fn search_by_user(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, QueryError> {
        if username.trim().is_empty() {
            return Err(QueryError::InvalidRequest("Username is required".to_string()));
        }
        self.search(username, limit, None).await
    }

    pub async fn event_statistics(&self) -> Result<EventStatistics, QueryError> {
        let aggregation = self.index.aggregate(STATISTICS_TOP_N).await?;

        Ok(EventStatistics {
            total_events: aggregation.total,
            top_event_names: aggregation
                .by_event_name
                .into_iter()
                .take(STATISTICS_TOP_N)
                .collect(),
            top_users: aggregation
                .by_user
                .into_iter()
                .take(STATISTICS_TOP_N)
                .collect(),
        })
    }
}
