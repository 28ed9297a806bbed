//! OpenSearch 审计索引
//!
//! CloudTrail 事件由外部 Lambda 写入索引，这里只负责查询与聚合。

use super::{sigv4, AuditIndex};
use crate::{
    config::{AuditConfig, AwsConfig, ResolvedCredentials},
    error::QueryError,
    models::audit::{IndexAggregation, SearchFilter, SearchRequest, TermCount},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const SEARCH_FIELDS: [&str; 3] = ["eventName", "userIdentity.userName", "sourceIPAddress"];

enum IndexAuth {
    None,
    Basic { username: String, password: Secret<String> },
    SigV4 { credentials: ResolvedCredentials, region: String },
}

pub struct OpenSearchIndex {
    client: reqwest::Client,
    search_url: reqwest::Url,
    auth: IndexAuth,
}

impl OpenSearchIndex {
    pub fn new(audit: &AuditConfig, aws: &AwsConfig) -> anyhow::Result<Self> {
        let endpoint = if audit.endpoint.starts_with("http://") || audit.endpoint.starts_with("https://")
        {
            audit.endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", audit.endpoint.trim_end_matches('/'))
        };
        let search_url = reqwest::Url::parse(&format!(
            "{}/{}/_search",
            endpoint,
            urlencoding::encode(&audit.index)
        ))?;

        let auth = match (&audit.username, &audit.password) {
            (Some(username), Some(password)) => IndexAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ if audit.sign_requests => {
                let credentials = aws.resolve_credentials().ok_or_else(|| {
                    anyhow::anyhow!(
                        "audit.sign_requests is enabled but no AWS credentials were found \
                         (set aws.access_key_id/aws.secret_access_key or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY)"
                    )
                })?;
                IndexAuth::SigV4 {
                    credentials,
                    region: aws.region.clone(),
                }
            }
            _ => IndexAuth::None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(audit.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            search_url,
            auth,
        })
    }

    async fn post_search(&self, body: &Value) -> Result<Option<Value>, QueryError> {
        let payload = serde_json::to_vec(body).map_err(|e| QueryError::Backend(e.to_string()))?;

        let mut request = self
            .client
            .post(self.search_url.clone())
            .header("content-type", "application/json");

        match &self.auth {
            IndexAuth::None => {}
            IndexAuth::Basic { username, password } => {
                request = request.basic_auth(username, Some(password.expose_secret()));
            }
            IndexAuth::SigV4 {
                credentials,
                region,
            } => {
                let signable = sigv4::SignableRequest {
                    method: "POST",
                    url: &self.search_url,
                    headers: &[("content-type", "application/json")],
                    payload: &payload,
                };
                for (name, value) in
                    sigv4::sign(&signable, credentials, region, "es", chrono::Utc::now())
                {
                    request = request.header(name, value);
                }
            }
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| QueryError::Backend(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| QueryError::Backend(format!("Invalid search response: {}", e)))?;

        if status.is_success() {
            return Ok(Some(body));
        }

        // 索引尚未创建时按空索引处理
        if is_index_not_found(&body) {
            debug!("Audit index does not exist yet");
            return Ok(None);
        }

        let reason = body
            .pointer("/error/reason")
            .and_then(Value::as_str)
            .or_else(|| body.get("message").and_then(Value::as_str))
            .unwrap_or("unknown error");
        Err(QueryError::Backend(format!("HTTP {}: {}", status.as_u16(), reason)))
    }
}

fn is_index_not_found(body: &Value) -> bool {
    body.pointer("/error/type").and_then(Value::as_str) == Some("index_not_found_exception")
}

pub(crate) fn build_search_body(request: &SearchRequest) -> Value {
    let mut must = vec![match &request.filter {
        SearchFilter::MatchAll => json!({ "match_all": {} }),
        SearchFilter::Text(text) => json!({
            "multi_match": { "query": text, "fields": SEARCH_FIELDS }
        }),
    }];

    if let Some(range) = request.range.filter(|r| !r.is_open()) {
        let mut bounds = serde_json::Map::new();
        if let Some(start) = range.start {
            bounds.insert("gte".to_string(), json!(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = range.end {
            // `||/d` 让上界包含整天
            bounds.insert("lte".to_string(), json!(format!("{}||/d", end.format("%Y-%m-%d"))));
        }
        must.push(json!({ "range": { "eventTime": Value::Object(bounds) } }));
    }

    json!({
        "size": request.size,
        // 空索引尚无 eventTime 映射，unmapped_type 避免排序报错
        "sort": [{ "eventTime": { "order": "desc", "unmapped_type": "date" } }],
        "query": { "bool": { "must": must } },
    })
}

pub(crate) fn build_aggregation_body(top_n: usize) -> Value {
    json!({
        "size": 0,
        "track_total_hits": true,
        "aggs": {
            "events_by_name": { "terms": { "field": "eventName.keyword", "size": top_n } },
            "events_by_user": { "terms": { "field": "userIdentity.userName.keyword", "size": top_n } },
        },
    })
}

pub(crate) fn parse_hits(body: &Value) -> Vec<Value> {
    body.pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("_source").cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_buckets(body: &Value, aggregation: &str) -> Vec<TermCount> {
    body.pointer(&format!("/aggregations/{}/buckets", aggregation))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| {
                    let name = match bucket.get("key")? {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let count = bucket.get("doc_count")?.as_u64()?;
                    Some(TermCount { name, count })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_aggregation(body: &Value) -> IndexAggregation {
    // 新版本为 {"value": n}，旧版本直接是数字
    let total = body
        .pointer("/hits/total/value")
        .or_else(|| body.pointer("/hits/total"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    IndexAggregation {
        total,
        by_event_name: parse_buckets(body, "events_by_name"),
        by_user: parse_buckets(body, "events_by_user"),
    }
}

#[async_trait]
impl AuditIndex for OpenSearchIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, QueryError> {
        let body = build_search_body(request);
        Ok(self
            .post_search(&body)
            .await?
            .map(|response| parse_hits(&response))
            .unwrap_or_default())
    }

    async fn aggregate(&self, top_n: usize) -> Result<IndexAggregation, QueryError> {
        let body = build_aggregation_body(top_n);
        Ok(self
            .post_search(&body)
            .await?
            .map(|response| parse_aggregation(&response))
            .unwrap_or_default())
    }
}
