//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `IndexBackend`
//! using the OpenSearch Rust crate. Every batch is sent as one `_bulk` request.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use opensearch::{
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesPutAliasParts},
    BulkParts, DeleteByQueryParts, OpenSearch, SearchParts,
};
use search_sync_shared::IndexEntry;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::IndexError;
use crate::interfaces::IndexBackend;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};

/// Number of ids fetched per `_search` page when listing the index.
const ID_PAGE_SIZE: usize = 1000;

/// A single failed item from a bulk response.
#[derive(Debug, Clone, PartialEq)]
struct BulkItemFailure {
    id: String,
    status: u16,
    reason: String,
}

/// OpenSearch backend implementation.
///
/// # Example
///
/// ```ignore
/// use search_sync_repository::opensearch::{IndexConfig, OpenSearchBackend};
///
/// let config = IndexConfig::new("records", 0);
/// let backend = OpenSearchBackend::new("http://localhost:9200", config).await?;
/// backend.ensure_index_exists().await?;
/// ```
pub struct OpenSearchBackend {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchBackend {
    /// Create a new OpenSearch backend connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing alias and version
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchBackend)` - A new backend instance
    /// * `Err(IndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, IndexError> {
        let parsed_url = Url::parse(url).map_err(|e| IndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            version = index_config.version,
            "Created OpenSearch backend"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Ensure the versioned index and its alias exist, creating them if necessary.
    ///
    /// Call during application startup, before the first publish.
    pub async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        let index_name = self.index_config.versioned_index_name();
        let index_names = [index_name.as_str()];

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&index_names))
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %index_name, "Index already exists");
        } else {
            let response = self
                .client
                .indices()
                .create(IndicesCreateParts::Index(&index_name))
                .body(get_index_settings())
                .send()
                .await
                .map_err(|e| IndexError::index_creation(e.to_string()))?;

            let status = response.status_code();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                error!(status = %status, body = %error_body, "Index creation failed");
                return Err(IndexError::index_creation(format!(
                    "Create index failed with status {}: {}",
                    status, error_body
                )));
            }
            info!(index = %index_name, "Created index");
        }

        let response = self
            .client
            .indices()
            .put_alias(IndicesPutAliasParts::IndexName(
                &index_names,
                &self.index_config.alias,
            ))
            .send()
            .await
            .map_err(|e| IndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(IndexError::index_creation(format!(
                "Put alias failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index_name, alias = %self.index_config.alias, "Alias ready");
        Ok(())
    }

    /// Flatten an entry into the stored document.
    ///
    /// Attributes sit at the top level next to `id`, `expires_at` and
    /// `indexed_at`; the reserved fields win over same-named attributes.
    fn document(entry: &IndexEntry) -> Result<Value, IndexError> {
        let mut doc = Map::new();
        for (key, value) in &entry.attributes {
            let value =
                serde_json::to_value(value).map_err(|e| IndexError::serialization(e.to_string()))?;
            doc.insert(key.clone(), value);
        }
        doc.insert("id".to_string(), json!(entry.id));
        if let Some(expires_at) = entry.expires_at {
            doc.insert("expires_at".to_string(), json!(expires_at));
        }
        doc.insert("indexed_at".to_string(), json!(Utc::now()));
        Ok(Value::Object(doc))
    }

    /// Build the `_bulk` lines that replace each entry.
    fn index_lines(entries: &[IndexEntry]) -> Result<Vec<Value>, IndexError> {
        let mut lines = Vec::with_capacity(entries.len() * 2);
        for entry in entries {
            lines.push(json!({ "index": { "_id": entry.id } }));
            lines.push(Self::document(entry)?);
        }
        Ok(lines)
    }

    /// Build the `_bulk` lines that delete each id.
    fn delete_lines(ids: &[String]) -> Vec<Value> {
        ids.iter()
            .map(|id| json!({ "delete": { "_id": id } }))
            .collect()
    }

    /// Query selecting every entry whose freshness window has elapsed at `now`.
    fn expired_query(now: DateTime<Utc>) -> Value {
        json!({
            "query": {
                "range": {
                    "expires_at": {
                        "lte": now.to_rfc3339_opts(SecondsFormat::Millis, true)
                    }
                }
            }
        })
    }

    /// One page of the id listing, sorted by id and resumed after `after`.
    fn ids_query(after: Option<&str>) -> Value {
        let mut query = json!({
            "size": ID_PAGE_SIZE,
            "_source": false,
            "sort": [{ "id": "asc" }],
            "query": { "match_all": {} }
        });
        if let Some(after) = after {
            query["search_after"] = json!([after]);
        }
        query
    }

    /// Document ids from a `_search` response body.
    fn hit_ids(body: &Value) -> Vec<String> {
        body["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit["_id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Extract failed items from a bulk response body.
    ///
    /// `action` is the bulk action key (`index` or `delete`). A 404 on a delete
    /// means the entry was already gone and is not a failure.
    fn bulk_failures(body: &Value, action: &str) -> Vec<BulkItemFailure> {
        if !body["errors"].as_bool().unwrap_or(false) {
            return Vec::new();
        }

        body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let result = &item[action];
                        let status = result["status"].as_u64().unwrap_or(0) as u16;
                        let ok = (200..300).contains(&status) || (action == "delete" && status == 404);
                        if ok {
                            return None;
                        }
                        Some(BulkItemFailure {
                            id: result["_id"].as_str().unwrap_or_default().to_string(),
                            status,
                            reason: result["error"]["reason"]
                                .as_str()
                                .unwrap_or("unknown")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Send a bulk request and convert item failures into an error.
    async fn send_bulk(&self, lines: Vec<Value>, action: &str) -> Result<(), IndexError> {
        let body: Vec<JsonBody<Value>> = lines.into_iter().map(JsonBody::from).collect();

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.alias))
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::submission(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(IndexError::submission(format!(
                "Bulk {} failed with status {}: {}",
                action, status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::parse(e.to_string()))?;

        let failures = Self::bulk_failures(&body, action);
        if failures.is_empty() {
            return Ok(());
        }

        for failure in &failures {
            warn!(
                id = %failure.id,
                status = failure.status,
                reason = %failure.reason,
                "Bulk item failed"
            );
        }
        Err(IndexError::submission(format!(
            "{} of the bulk {} items failed",
            failures.len(),
            action
        )))
    }
}

#[async_trait]
impl IndexBackend for OpenSearchBackend {
    /// Ping the cluster. Any transport error counts as unavailable.
    async fn is_available(&self) -> bool {
        match self.client.ping().send().await {
            Ok(response) => response.status_code().is_success(),
            Err(e) => {
                debug!(error = %e, "OpenSearch ping failed");
                false
            }
        }
    }

    async fn index_items(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }
        let lines = Self::index_lines(entries)?;
        self.send_bulk(lines, "index").await?;
        debug!(count = entries.len(), "Entries indexed");
        Ok(())
    }

    async fn delete_items(&self, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.send_bulk(Self::delete_lines(ids), "delete").await?;
        debug!(count = ids.len(), "Entries deleted");
        Ok(())
    }

    async fn indexed_ids(&self) -> Result<Vec<String>, IndexError> {
        let mut ids: Vec<String> = Vec::new();

        loop {
            let response = self
                .client
                .search(SearchParts::Index(&[self.index_config.alias.as_str()]))
                .body(Self::ids_query(ids.last().map(String::as_str)))
                .send()
                .await
                .map_err(|e| IndexError::connection(e.to_string()))?;

            let status = response.status_code();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                return Err(IndexError::connection(format!(
                    "Listing ids failed with status {}: {}",
                    status, error_body
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| IndexError::parse(e.to_string()))?;
            let page = Self::hit_ids(&body);
            let last_page = page.len() < ID_PAGE_SIZE;
            ids.extend(page);
            if last_page {
                break;
            }
        }

        debug!(count = ids.len(), "Listed indexed ids");
        Ok(ids)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IndexError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[self.index_config.alias.as_str()]))
            .body(Self::expired_query(now))
            .refresh(true)
            .send()
            .await
            .map_err(|e| IndexError::submission(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Expiry purge failed");
            return Err(IndexError::submission(format!(
                "Delete by query failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::parse(e.to_string()))?;
        let purged = body["deleted"].as_u64().unwrap_or(0) as usize;
        if purged > 0 {
            debug!(purged = purged, "Purged expired entries");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_sync_shared::{Event, Team, CONTENT_URL_ATTRIBUTE};

    #[test]
    fn test_document_flattens_attributes() {
        let expires_at = Utc::now();
        let entry = IndexEntry::from_record(&Team::new(254, "The Cheesy Poofs"), Some(expires_at));

        let doc = OpenSearchBackend::document(&entry).unwrap();

        assert_eq!(doc["id"], "frc254");
        assert_eq!(doc["related_id"], "frc254");
        assert_eq!(doc[CONTENT_URL_ATTRIBUTE], "https://www.thebluealliance.com/team/254");
        assert_eq!(doc["title"], "254 - The Cheesy Poofs");
        assert_eq!(doc["expires_at"], json!(expires_at));
        assert!(doc["indexed_at"].is_string());
    }

    #[test]
    fn test_index_lines_pair_action_and_document() {
        let entries = vec![
            IndexEntry::from_record(&Event::new(2020, "casj", "Silicon Valley Regional"), None),
            IndexEntry::from_record(&Team::new(604, "Quixilver"), None),
        ];

        let lines = OpenSearchBackend::index_lines(&entries).unwrap();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["index"]["_id"], "2020casj");
        assert_eq!(lines[1]["id"], "2020casj");
        assert!(lines[1].get("expires_at").is_none());
        assert_eq!(lines[2]["index"]["_id"], "frc604");
    }

    #[test]
    fn test_delete_lines() {
        let lines = OpenSearchBackend::delete_lines(&["frc254".to_string(), "2020casj".to_string()]);

        assert_eq!(
            lines,
            vec![
                json!({ "delete": { "_id": "frc254" } }),
                json!({ "delete": { "_id": "2020casj" } }),
            ]
        );
    }

    #[test]
    fn test_expired_query() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(
            OpenSearchBackend::expired_query(now),
            json!({ "query": { "range": { "expires_at": { "lte": "2026-03-01T12:00:00.000Z" } } } })
        );
    }

    #[test]
    fn test_ids_query_resumes_after_last_id() {
        let first = OpenSearchBackend::ids_query(None);
        assert_eq!(first["size"], ID_PAGE_SIZE);
        assert_eq!(first["_source"], false);
        assert_eq!(first["sort"], json!([{ "id": "asc" }]));
        assert!(first.get("search_after").is_none());

        let next = OpenSearchBackend::ids_query(Some("frc254"));
        assert_eq!(next["search_after"], json!(["frc254"]));
    }

    #[test]
    fn test_hit_ids() {
        let body = json!({
            "hits": {
                "total": { "value": 2 },
                "hits": [
                    { "_id": "2020casj", "sort": ["2020casj"] },
                    { "_id": "frc254", "sort": ["frc254"] }
                ]
            }
        });

        assert_eq!(
            OpenSearchBackend::hit_ids(&body),
            vec!["2020casj".to_string(), "frc254".to_string()]
        );
        assert!(OpenSearchBackend::hit_ids(&json!({})).is_empty());
    }

    #[test]
    fn test_bulk_failures_none_when_no_errors() {
        let body = json!({ "errors": false, "items": [] });
        assert!(OpenSearchBackend::bulk_failures(&body, "index").is_empty());
    }

    #[test]
    fn test_bulk_failures_reports_failed_items() {
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "frc254", "status": 201 } },
                { "index": { "_id": "frc604", "status": 400, "error": { "reason": "mapper_parsing_exception" } } }
            ]
        });

        let failures = OpenSearchBackend::bulk_failures(&body, "index");

        assert_eq!(
            failures,
            vec![BulkItemFailure {
                id: "frc604".to_string(),
                status: 400,
                reason: "mapper_parsing_exception".to_string(),
            }]
        );
    }

    #[test]
    fn test_bulk_failures_ignores_missing_deletes() {
        let body = json!({
            "errors": true,
            "items": [
                { "delete": { "_id": "frc254", "status": 404 } },
                { "delete": { "_id": "frc604", "status": 200 } }
            ]
        });

        assert!(OpenSearchBackend::bulk_failures(&body, "delete").is_empty());
    }
}
