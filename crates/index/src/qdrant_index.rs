use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{IndexError, IndexResult};
use crate::graph::{NodeId, SearchHit, TieBreak, VectorRecord};
use crate::store::{VectorStore, check_dimension};

const SERVICE: &str = "qdrant";

/// Payload field holding the graph node id of a point
const NODE_ID_FIELD: &str = "node_id";

/// Vector store backed by Qdrant's REST API.
pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct CreateFieldIndex {
    field_name: &'static str,
    field_schema: &'static str,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<Point>,
}

#[derive(Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: HashMap<&'static str, serde_json::Value>,
}

#[derive(Serialize)]
struct GroupSearch<'a> {
    vector: &'a [f32],
    group_by: &'static str,
    limit: usize,
    group_size: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorSize,
}

#[derive(Deserialize)]
struct VectorSize {
    size: usize,
}

#[derive(Deserialize)]
struct GroupsResult {
    groups: Vec<Group>,
}

#[derive(Deserialize)]
struct Group {
    id: serde_json::Value,
    hits: Vec<GroupHit>,
}

#[derive(Deserialize)]
struct GroupHit {
    score: f32,
}

impl QdrantStore {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Stable point id for a (node, passage) pair so re-indexing overwrites
    pub fn point_id(node_id: &NodeId, passage_hash: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(node_id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(passage_hash.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }

    /// Send a request; a 404 on a collection route means the collection is missing
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        collection: Option<&str>,
    ) -> IndexResult<reqwest::Response> {
        let builder = match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| IndexError::from_http(SERVICE, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let (reqwest::StatusCode::NOT_FOUND, Some(name)) = (status, collection) {
            return Err(IndexError::CollectionNotFound(name.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(IndexError::from_status(SERVICE, status, &body))
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> IndexResult<T> {
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| IndexError::backend(SERVICE, format!("Failed to parse Qdrant response: {}", e)))?;
        Ok(envelope.result)
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> IndexResult<()> {
        let url = format!("{}/collections/{}", self.base_url, name);
        let request = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine",
            },
        };
        self.send(self.client.put(&url).json(&request), None).await?;

        let url = format!("{}/collections/{}/index?wait=true", self.base_url, name);
        let request = CreateFieldIndex {
            field_name: NODE_ID_FIELD,
            field_schema: "keyword",
        };
        self.send(self.client.put(&url).json(&request), Some(name)).await?;

        tracing::info!(collection = name, dimension, "Created Qdrant collection");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> IndexResult<()> {
        if dimension == 0 {
            return Err(IndexError::InvalidArgument("dimension must be positive".to_string()));
        }

        match self.dimension(name).await {
            Ok(existing) if existing == dimension => {
                tracing::info!(collection = name, "Collection already exists");
                Ok(())
            }
            Ok(existing) => Err(IndexError::DimensionMismatch {
                expected: existing,
                actual: dimension,
            }),
            Err(IndexError::CollectionNotFound(_)) => self.create_collection(name, dimension).await,
            Err(e) => Err(e),
        }
    }

    async fn dimension(&self, name: &str) -> IndexResult<usize> {
        let url = format!("{}/collections/{}", self.base_url, name);
        let response = self.send(self.client.get(&url), Some(name)).await?;
        let info: CollectionInfo = Self::parse(response).await?;
        Ok(info.config.params.vectors.size)
    }

    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> IndexResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let dimension = self.dimension(name).await?;
        for record in records {
            check_dimension(dimension, &record.vector)?;
        }

        let points = records
            .iter()
            .map(|record| {
                let mut payload = HashMap::new();
                payload.insert(NODE_ID_FIELD, serde_json::json!(record.node_id.as_str()));
                payload.insert("passage_hash", serde_json::json!(record.passage_hash));
                Point {
                    id: Self::point_id(&record.node_id, &record.passage_hash),
                    vector: record.vector.clone(),
                    payload,
                }
            })
            .collect();

        let url = format!("{}/collections/{}/points?wait=true", self.base_url, name);
        self.send(self.client.put(&url).json(&UpsertPoints { points }), Some(name))
            .await?;

        tracing::debug!(collection = name, points = records.len(), "Upserted points");
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> IndexResult<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/collections/{}/points/search/groups", self.base_url, name);
        let request = GroupSearch {
            vector,
            group_by: NODE_ID_FIELD,
            limit,
            group_size: 1,
            with_payload: false,
        };

        let response = self.send(self.client.post(&url).json(&request), Some(name)).await?;
        let result: GroupsResult = Self::parse(response).await?;

        let hits = result
            .groups
            .into_iter()
            .filter_map(|group| {
                let score = group.hits.first()?.score;
                let id = match group.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Some(SearchHit {
                    id: NodeId::new(id),
                    score,
                })
            })
            .take(limit)
            .collect();

        Ok(hits)
    }

    fn tie_break(&self) -> TieBreak {
        TieBreak::Unspecified
    }

    async fn health(&self) -> IndexResult<()> {
        let url = format!("{}/", self.base_url);
        self.send(self.client.get(&url), None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collection_info(size: usize) -> serde_json::Value {
        serde_json::json!({
            "result": {
                "status": "green",
                "config": {"params": {"vectors": {"size": size, "distance": "Cosine"}}}
            },
            "status": "ok",
            "time": 0.001
        })
    }

    #[test]
    fn test_point_id_is_stable_and_distinct() {
        let a = QdrantStore::point_id(&NodeId::new("n1"), "p1");
        assert_eq!(a, QdrantStore::point_id(&NodeId::new("n1"), "p1"));
        assert_ne!(a, QdrantStore::point_id(&NodeId::new("n1"), "p2"));
        assert_ne!(a, QdrantStore::point_id(&NodeId::new("n2"), "p1"));
    }

    #[tokio::test]
    async fn test_dimension_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/graphrag"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection_info(1536)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "status": {"error": "Not found: Collection `missing` doesn't exist!"}
            })))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        assert_eq!(store.dimension("graphrag").await.unwrap(), 1536);
        assert!(matches!(
            store.dimension("missing").await,
            Err(IndexError::CollectionNotFound(name)) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn test_ensure_collection_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/fresh"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/fresh"))
            .and(body_partial_json(serde_json::json!({"vectors": {"size": 4, "distance": "Cosine"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/fresh/index"))
            .and(body_partial_json(serde_json::json!({"field_name": "node_id"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        store.ensure_collection("fresh", 4).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_collection_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/graphrag"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection_info(768)))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        assert!(matches!(
            store.ensure_collection("graphrag", 1536).await,
            Err(IndexError::DimensionMismatch { expected: 768, actual: 1536 })
        ));
    }

    #[tokio::test]
    async fn test_grouped_search_parses_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/graphrag/points/search/groups"))
            .and(body_partial_json(serde_json::json!({"group_by": "node_id", "limit": 2, "group_size": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"groups": [
                    {"id": "4:db:7", "hits": [{"id": 11, "version": 0, "score": 0.93}]},
                    {"id": "4:db:2", "hits": [{"id": 12, "version": 0, "score": 0.71}]}
                ]},
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        let hits = store.search("graphrag", &[0.1, 0.2], 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, NodeId::new("4:db:7"));
        assert!((hits[0].score - 0.93).abs() < 1e-6);
        assert_eq!(store.tie_break(), TieBreak::Unspecified);
    }

    #[tokio::test]
    async fn test_upsert_checks_dimension_before_writing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/graphrag"))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection_info(3)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/graphrag/points"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        let record = VectorRecord {
            node_id: NodeId::new("n1"),
            passage_hash: "p".to_string(),
            vector: vec![1.0, 0.0],
        };

        assert!(matches!(
            store.upsert("graphrag", &[record]).await,
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let store = QdrantStore::new("http://127.0.0.1:9".to_string());
        let err = store.dimension("graphrag").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
