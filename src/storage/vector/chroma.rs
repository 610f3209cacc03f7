//! `ChromaDB` vector store over the v1 REST API.

use crate::embedding::{HttpConfig, build_http_client, request_error_kind};
use crate::storage::acquire_lock;
use crate::storage::traits::{VectorMatch, VectorRecord, VectorStore};
use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

const BACKEND: &str = "chroma";

/// Vector store backed by a `ChromaDB` server.
///
/// Collections are created with cosine distance. Collection IDs are looked
/// up by name once and cached; a 404 on a cached ID evicts it. Metadata is flattened to Chroma's scalar
/// types: nulls are dropped, arrays and objects are stored as JSON text.
pub struct ChromaVectorStore {
    base_url: String,
    tenant: Option<String>,
    database: Option<String>,
    client: Client,
    collection_ids: Mutex<HashMap<String, String>>,
}

impl ChromaVectorStore {
    /// Default server URL.
    pub const DEFAULT_URL: &'static str = "http://localhost:8000";

    /// Creates a client for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tenant: None,
            database: None,
            client: build_http_client(HttpConfig::default()),
            collection_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Scopes requests to a tenant and database.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>, database: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self.database = Some(database.into());
        self
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Returns the server URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks that the server answers `/api/v1/heartbeat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or unhealthy.
    pub fn heartbeat(&self) -> Result<()> {
        let response = self.send("heartbeat", self.client.get(self.url("/heartbeat")))?;
        Self::expect_success("heartbeat", response).map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    fn collection_url(&self, name: &str) -> String {
        self.url(&format!("/collections/{}", urlencoding::encode(name)))
    }

    fn scoped(&self, builder: RequestBuilder) -> RequestBuilder {
        match (&self.tenant, &self.database) {
            (Some(tenant), Some(database)) => {
                builder.query(&[("tenant", tenant.as_str()), ("database", database.as_str())])
            },
            _ => builder,
        }
    }

    fn send(&self, operation: &str, builder: RequestBuilder) -> Result<Response> {
        builder.send().map_err(|e| {
            let error_kind = request_error_kind(&e);
            tracing::error!(
                backend = BACKEND,
                operation = operation,
                error = %e,
                error_kind = error_kind,
                "Chroma request failed"
            );
            Error::OperationFailed {
                operation: format!("chroma_{operation}"),
                cause: format!("{error_kind} error: {e}"),
            }
        })
    }

    fn expect_success(operation: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        tracing::error!(
            backend = BACKEND,
            operation = operation,
            status = %status,
            body = %body,
            "Chroma returned error status"
        );
        Err(Error::OperationFailed {
            operation: format!("chroma_{operation}"),
            cause: format!("status {status}: {body}"),
        })
    }

    fn json<T: for<'de> Deserialize<'de>>(operation: &str, response: Response) -> Result<T> {
        response.json().map_err(|e| Error::OperationFailed {
            operation: format!("chroma_{operation}_response"),
            cause: e.to_string(),
        })
    }

    /// Looks up a collection ID without creating the collection.
    fn find_collection(&self, name: &str) -> Result<Option<String>> {
        if let Some(id) = acquire_lock(&self.collection_ids).get(name) {
            return Ok(Some(id.clone()));
        }
        let response = self.send(
            "get_collection",
            self.scoped(self.client.get(self.collection_url(name))),
        )?;
        // Older servers answer a missing collection with 500 rather than 404.
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_REQUEST
        ) {
            return Ok(None);
        }
        let info: CollectionInfo =
            Self::json("get_collection", Self::expect_success("get_collection", response)?)?;
        acquire_lock(&self.collection_ids).insert(name.to_string(), info.id.clone());
        Ok(Some(info.id))
    }

    fn get_or_create_collection(&self, name: &str) -> Result<String> {
        if let Some(id) = acquire_lock(&self.collection_ids).get(name) {
            return Ok(id.clone());
        }
        let body = json!({
            "name": name,
            "metadata": {"hnsw:space": "cosine"},
            "get_or_create": true,
        });
        let response = self.send(
            "create_collection",
            self.scoped(self.client.post(self.url("/collections")).json(&body)),
        )?;
        let info: CollectionInfo = Self::json(
            "create_collection",
            Self::expect_success("create_collection", response)?,
        )?;
        acquire_lock(&self.collection_ids).insert(name.to_string(), info.id.clone());
        Ok(info.id)
    }

    fn resolve(&self, name: &str, create: bool) -> Result<Option<String>> {
        if create {
            self.get_or_create_collection(name).map(Some)
        } else {
            self.find_collection(name)
        }
    }

    /// Sends a request against collection `name`'s ID.
    ///
    /// A 404 means the cached ID went stale (the collection was dropped
    /// elsewhere): the entry is evicted and the request is sent once more
    /// against a freshly resolved ID. `Ok(None)` when the collection does
    /// not exist and `create` is false.
    fn collection_request(
        &self,
        operation: &str,
        name: &str,
        create: bool,
        build: impl Fn(&str) -> RequestBuilder,
    ) -> Result<Option<Response>> {
        let Some(collection_id) = self.resolve(name, create)? else {
            return Ok(None);
        };
        let response = self.send(operation, build(&collection_id))?;
        if response.status() != StatusCode::NOT_FOUND {
            return Self::expect_success(operation, response).map(Some);
        }

        tracing::warn!(
            backend = BACKEND,
            operation = operation,
            collection = name,
            "Cached collection id is stale, resolving again"
        );
        acquire_lock(&self.collection_ids).remove(name);
        let Some(collection_id) = self.resolve(name, create)? else {
            return Ok(None);
        };
        let response = self.send(operation, build(&collection_id))?;
        Self::expect_success(operation, response).map(Some)
    }

    fn post(
        &self,
        operation: &str,
        name: &str,
        action: &str,
        body: &Value,
        create: bool,
    ) -> Result<Option<Response>> {
        self.collection_request(operation, name, create, |collection_id| {
            self.client
                .post(self.url(&format!("/collections/{collection_id}/{action}")))
                .json(body)
        })
    }
}

/// Flattens metadata to the scalar types Chroma accepts.
fn sanitize_metadata(metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                Some((key.clone(), value.clone()))
            },
            Value::Array(_) | Value::Object(_) => {
                Some((key.clone(), Value::String(value.to_string())))
            },
        })
        .collect()
}

/// Converts a cosine distance (`0.0..=2.0`) to a `0.0..=1.0` score.
fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    embeddings: Option<Vec<Option<Vec<f32>>>>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Map<String, Value>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
}

fn nth<T: Clone>(column: Option<&Vec<Option<T>>>, i: usize) -> Option<T> {
    column.and_then(|c| c.get(i)).cloned().flatten()
}

impl VectorStore for ChromaVectorStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn upsert(&self, collection: &str, record: VectorRecord) -> Result<()> {
        let body = json!({
            "ids": [record.id],
            "embeddings": [record.embedding],
            "documents": [record.document.unwrap_or_default()],
            "metadatas": [sanitize_metadata(&record.metadata)],
        });
        self.post("upsert", collection, "upsert", &body, true)?;
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<VectorRecord>> {
        let body = json!({
            "ids": [id],
            "include": ["embeddings", "documents", "metadatas"],
        });
        let Some(response) = self.post("get", collection, "get", &body, false)? else {
            return Ok(None);
        };
        let response: GetResponse = Self::json("get", response)?;
        let Some(index) = response.ids.iter().position(|found| found == id) else {
            return Ok(None);
        };
        Ok(Some(VectorRecord {
            id: id.to_string(),
            embedding: nth(response.embeddings.as_ref(), index).unwrap_or_default(),
            document: nth(response.documents.as_ref(), index),
            metadata: nth(response.metadatas.as_ref(), index).unwrap_or_default(),
        }))
    }

    fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        let body = json!({"ids": [id], "include": []});
        let Some(response) = self.post("get", collection, "get", &body, false)? else {
            return Ok(false);
        };
        let response: GetResponse = Self::json("get", response)?;
        Ok(response.ids.iter().any(|found| found == id))
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        if !self.contains(collection, id)? {
            return Ok(false);
        }
        let deleted = self.post("delete", collection, "delete", &json!({"ids": [id]}), false)?;
        Ok(deleted.is_some())
    }

    fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": limit,
            "include": ["documents", "metadatas", "distances"],
        });
        let Some(response) = self.post("query", collection, "query", &body, false)? else {
            return Ok(Vec::new());
        };
        let response: QueryResponse = Self::json("query", response)?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let distances = response.distances.and_then(|d| d.into_iter().next());
        let documents = response.documents.and_then(|d| d.into_iter().next());
        let metadatas = response.metadatas.and_then(|m| m.into_iter().next());

        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| VectorMatch {
                id,
                score: nth(distances.as_ref(), i).map_or(0.0, distance_to_score),
                document: nth(documents.as_ref(), i),
                metadata: nth(metadatas.as_ref(), i).unwrap_or_default(),
            })
            .collect())
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let response = self.collection_request("count", collection, false, |collection_id| {
            self.client
                .get(self.url(&format!("/collections/{collection_id}/count")))
        })?;
        response.map_or(Ok(0), |response| Self::json("count", response))
    }

    fn list_ids(&self, collection: &str) -> Result<Vec<String>> {
        let Some(response) = self.post("get", collection, "get", &json!({"include": []}), false)?
        else {
            return Ok(Vec::new());
        };
        let response: GetResponse = Self::json("get", response)?;
        Ok(response.ids)
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.send(
            "list_collections",
            self.scoped(self.client.get(self.url("/collections"))),
        )?;
        let collections: Vec<CollectionInfo> = Self::json(
            "list_collections",
            Self::expect_success("list_collections", response)?,
        )?;
        let mut cache = acquire_lock(&self.collection_ids);
        Ok(collections
            .into_iter()
            .map(|c| {
                cache.insert(c.name.clone(), c.id);
                c.name
            })
            .collect())
    }

    fn delete_collection(&self, collection: &str) -> Result<bool> {
        if self.find_collection(collection)?.is_none() {
            return Ok(false);
        }
        let response = self.send(
            "delete_collection",
            self.scoped(self.client.delete(self.collection_url(collection))),
        )?;
        Self::expect_success("delete_collection", response)?;
        acquire_lock(&self.collection_ids).remove(collection);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sanitize_metadata() {
        let Value::Object(metadata) = json!({
            "a": null,
            "b": 1,
            "c": "x",
            "d": [1, 2],
            "e": {"k": true},
            "f": false
        }) else {
            unreachable!()
        };
        let sanitized = sanitize_metadata(&metadata);
        assert!(!sanitized.contains_key("a"));
        assert_eq!(sanitized["b"], json!(1));
        assert_eq!(sanitized["d"], json!("[1,2]"));
        assert_eq!(sanitized["e"], json!("{\"k\":true}"));
        assert_eq!(sanitized["f"], json!(false));
    }

    #[test]
    fn test_distance_to_score() {
        assert!((distance_to_score(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((distance_to_score(1.0) - 0.5).abs() < f32::EPSILON);
        assert!(distance_to_score(2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_query_response_parsing() {
        let parsed: QueryResponse = serde_json::from_str(
            r#"{"ids":[["a","b"]],"distances":[[0.1,0.4]],"documents":[[null,"x"]],"metadatas":null,"embeddings":null}"#,
        )
        .unwrap();
        assert_eq!(parsed.ids[0], vec!["a", "b"]);
        assert_eq!(nth(parsed.documents.as_ref().map(|d| &d[0]), 1), Some("x".to_string()));
    }

    #[test]
    fn test_collection_url_encodes_name() {
        let store = ChromaVectorStore::new("http://localhost:8000");
        assert_eq!(
            store.collection_url("team/alpha beta"),
            "http://localhost:8000/api/v1/collections/team%2Falpha%20beta"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_collection_id_is_resolved_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/topics_o1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "old", "name": "topics_o1"})),
            )
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/topics_o1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "new", "name": "topics_o1"})),
            )
            .with_priority(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/old/count"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/new/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(3)))
            .mount(&server)
            .await;

        let uri = server.uri();
        let (first, second) = tokio::task::spawn_blocking(move || {
            let store = ChromaVectorStore::new(uri);
            (store.count("topics_o1"), store.count("topics_o1"))
        })
        .await
        .unwrap();
        assert_eq!(first.unwrap(), 3);
        assert_eq!(second.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_encoded_name_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/team%2Falpha"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "c1", "name": "team/alpha"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/c1/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(7)))
            .mount(&server)
            .await;

        let uri = server.uri();
        let count = tokio::task::spawn_blocking(move || ChromaVectorStore::new(uri).count("team/alpha"))
            .await
            .unwrap();
        assert_eq!(count.unwrap(), 7);
    }

    #[test]
    fn test_unreachable_server_errors() {
        let store = ChromaVectorStore::new("http://127.0.0.1:9/").with_http_config(HttpConfig {
            timeout_ms: 500,
            connect_timeout_ms: 200,
        });
        assert_eq!(store.base_url(), "http://127.0.0.1:9");
        assert!(store.heartbeat().is_err());
        assert!(store.count("entities_o1").is_err());
    }
}
