use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
#[cfg(not(target_arch = "wasm32"))]
use reqwest::{Client, Response, StatusCode};
#[cfg(not(target_arch = "wasm32"))]
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::wire::{SchemaDocument, SchemaDraft, SchemaPatch};

/// CRUD access to stored schemas.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    async fn create(&self, draft: &SchemaDraft) -> Result<SchemaDocument, ApiError>;

    async fn list(&self) -> Result<Vec<SchemaDocument>, ApiError>;

    async fn get(&self, schema_id: &str) -> Result<SchemaDocument, ApiError>;

    async fn update(&self, schema_id: &str, patch: &SchemaPatch) -> Result<SchemaDocument, ApiError>;

    async fn delete(&self, schema_id: &str) -> Result<(), ApiError>;
}

/// REST client for `{base}/api/v1/schemas/`.
#[cfg(not(target_arch = "wasm32"))]
pub struct SchemaClient {
    endpoint: String,
    http_client: Client,
}

#[cfg(not(target_arch = "wasm32"))]
impl SchemaClient {
    pub fn new(base_url: &str) -> Self {
        let builder = Client::builder().timeout(std::time::Duration::from_secs(30));

        Self {
            endpoint: format!("{}/api/v1/schemas", base_url.trim_end_matches('/')),
            http_client: builder.build().unwrap_or_default(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/", self.endpoint)
    }

    fn item_url(&self, schema_id: &str) -> String {
        format!("{}/{}", self.endpoint, schema_id)
    }
}

/// Turn a response into its decoded body; `None` for 204.
#[cfg(not(target_arch = "wasm32"))]
async fn handle_response<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let err = ApiError::from_response(status, &body);
        tracing::error!(status = status.as_u16(), error = %err, "schema api request failed");
        return Err(err);
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let body = resp
        .json::<T>()
        .await
        .map_err(|e| ApiError::Deserialize(e.to_string()))?;
    Ok(Some(body))
}

#[cfg(not(target_arch = "wasm32"))]
fn require_body<T>(body: Option<T>) -> Result<T, ApiError> {
    body.ok_or_else(|| ApiError::Deserialize("empty response body".to_string()))
}

// reqwest futures are not `Send` in the browser
#[cfg(not(target_arch = "wasm32"))]
#[async_trait]
impl SchemaBackend for SchemaClient {
    async fn create(&self, draft: &SchemaDraft) -> Result<SchemaDocument, ApiError> {
        let resp = self
            .http_client
            .post(self.collection_url())
            .json(draft)
            .send()
            .await?;
        handle_response(resp).await.and_then(require_body)
    }

    async fn list(&self) -> Result<Vec<SchemaDocument>, ApiError> {
        let resp = self.http_client.get(self.collection_url()).send().await?;
        Ok(handle_response(resp).await?.unwrap_or_default())
    }

    async fn get(&self, schema_id: &str) -> Result<SchemaDocument, ApiError> {
        let resp = self.http_client.get(self.item_url(schema_id)).send().await?;
        handle_response(resp).await.and_then(require_body)
    }

    async fn update(&self, schema_id: &str, patch: &SchemaPatch) -> Result<SchemaDocument, ApiError> {
        let resp = self
            .http_client
            .put(self.item_url(schema_id))
            .json(patch)
            .send()
            .await?;
        handle_response(resp).await.and_then(require_body)
    }

    async fn delete(&self, schema_id: &str) -> Result<(), ApiError> {
        let resp = self.http_client.delete(self.item_url(schema_id)).send().await?;
        handle_response::<serde_json::Value>(resp).await?;
        Ok(())
    }
}

/// Process-local backend with the server's id, version and timestamp rules.
#[derive(Default)]
pub struct InMemorySchemaBackend {
    schemas: Mutex<BTreeMap<String, SchemaDocument>>,
}

impl InMemorySchemaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_schemas<R>(&self, f: impl FnOnce(&mut BTreeMap<String, SchemaDocument>) -> R) -> R {
        let mut guard = self.schemas.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl SchemaBackend for InMemorySchemaBackend {
    async fn create(&self, draft: &SchemaDraft) -> Result<SchemaDocument, ApiError> {
        let now = Utc::now();
        let doc = SchemaDocument {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            tables: draft.tables.clone(),
            relationships: draft.relationships.clone(),
            indexes: draft.indexes.clone(),
            is_public: draft.is_public,
            user_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.with_schemas(|schemas| schemas.insert(doc.id.clone(), doc.clone()));
        Ok(doc)
    }

    async fn list(&self) -> Result<Vec<SchemaDocument>, ApiError> {
        Ok(self.with_schemas(|schemas| schemas.values().cloned().collect()))
    }

    async fn get(&self, schema_id: &str) -> Result<SchemaDocument, ApiError> {
        self.with_schemas(|schemas| schemas.get(schema_id).cloned())
            .ok_or_else(|| ApiError::not_found(schema_id))
    }

    async fn update(&self, schema_id: &str, patch: &SchemaPatch) -> Result<SchemaDocument, ApiError> {
        self.with_schemas(|schemas| {
            let doc = schemas.get_mut(schema_id)?;
            if let Some(name) = &patch.name {
                doc.name = name.clone();
            }
            if let Some(description) = &patch.description {
                doc.description = Some(description.clone());
            }
            if let Some(tables) = &patch.tables {
                doc.tables = tables.clone();
            }
            if let Some(relationships) = &patch.relationships {
                doc.relationships = relationships.clone();
            }
            if let Some(indexes) = &patch.indexes {
                doc.indexes = indexes.clone();
            }
            if let Some(is_public) = patch.is_public {
                doc.is_public = is_public;
            }
            doc.updated_at = Utc::now();
            Some(doc.clone())
        })
        .ok_or_else(|| ApiError::not_found(schema_id))
    }

    async fn delete(&self, schema_id: &str) -> Result<(), ApiError> {
        self.with_schemas(|schemas| schemas.remove(schema_id))
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(schema_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> SchemaDraft {
        SchemaDraft {
            name: name.to_string(),
            description: None,
            tables: vec![],
            relationships: vec![],
            indexes: vec![],
            is_public: false,
        }
    }

    #[test]
    fn test_client_urls() {
        let client = SchemaClient::new("http://localhost:8000/");

        assert_eq!(client.collection_url(), "http://localhost:8000/api/v1/schemas/");
        assert_eq!(client.item_url("abc"), "http://localhost:8000/api/v1/schemas/abc");
    }

    #[tokio::test]
    async fn test_in_memory_crud() {
        let backend = InMemorySchemaBackend::new();

        let created = backend.create(&draft("Blog")).await.unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(backend.list().await.unwrap().len(), 1);

        let patch = SchemaPatch {
            name: Some("Blog v2".to_string()),
            ..Default::default()
        };
        let updated = backend.update(&created.id, &patch).await.unwrap();
        assert_eq!(updated.name, "Blog v2");
        assert_eq!(backend.get(&created.id).await.unwrap().name, "Blog v2");

        backend.delete(&created.id).await.unwrap();
        let err = backend.get(&created.id).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_in_memory_unknown_id() {
        let backend = InMemorySchemaBackend::new();

        assert!(backend.update("missing", &SchemaPatch::default()).await.is_err());
        assert!(backend.delete("missing").await.is_err());
    }
}
