use super::client::{api_error, send, GoogleApiClient};
use crate::ports::outbound::MetadataStore;
use crate::scan_orchestration::domain::{ScanCacheKey, ScanMetadataRecord};
use crate::shared::Result;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const METADATA_COLLECTION: &str = "scan_metadata";

/// Firestore adapter for scan metadata records
///
/// One document per scan in the `scan_metadata` collection, with the scan
/// id as document id. Inserting an id that already exists is treated as a
/// successful repeat of the same write.
///
/// `latest_for` orders by `timestampStr` within a `cacheKey`, which needs
/// a composite index on (`cacheKey` ASC, `timestampStr` DESC).
#[derive(Debug, Clone)]
pub struct FirestoreMetadataStore {
    client: GoogleApiClient,
    project_id: String,
    database: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RunQueryResponseItem {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreMetadataStore {
    const DEFAULT_ENDPOINT: &'static str = "https://firestore.googleapis.com/v1";

    pub fn new(client: GoogleApiClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            database: "(default)".to_string(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Overrides the API endpoint (emulators, tests)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.endpoint, self.project_id, self.database
        )
    }

    fn latest_query(cache_key: &ScanCacheKey) -> Value {
        json!({
            "structuredQuery": {
                "from": [{ "collectionId": METADATA_COLLECTION }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "cacheKey" },
                        "op": "EQUAL",
                        "value": { "stringValue": cache_key.as_str() }
                    }
                },
                "orderBy": [{
                    "field": { "fieldPath": "timestampStr" },
                    "direction": "DESCENDING"
                }],
                "limit": 1
            }
        })
    }
}

#[async_trait]
impl MetadataStore for FirestoreMetadataStore {
    async fn latest_for(&self, cache_key: &ScanCacheKey) -> Result<Option<ScanMetadataRecord>> {
        let operation = format!("query {} for {}", METADATA_COLLECTION, cache_key);
        let url = format!("{}:runQuery", self.documents_root());
        let request = self
            .client
            .post(&url)
            .await?
            .json(&Self::latest_query(cache_key));
        let items: Vec<RunQueryResponseItem> = self.client.send_json(request, &operation).await?;

        let Some(document) = items.into_iter().find_map(|item| item.document) else {
            return Ok(None);
        };
        let record: ScanMetadataRecord = serde_json::from_value(decode_fields(document.fields)?)
            .with_context(|| format!("Failed to decode metadata document {}", document.name))?;
        Ok(Some(record))
    }

    async fn insert(&self, record: &ScanMetadataRecord) -> Result<()> {
        let operation = format!("write {} document {}", METADATA_COLLECTION, record.scan_id);
        let url = format!(
            "{}/{}?documentId={}",
            self.documents_root(),
            METADATA_COLLECTION,
            urlencoding::encode(record.scan_id.as_str())
        );
        let fields = encode_fields(&serde_json::to_value(record)?)?;
        let request = self
            .client
            .post(&url)
            .await?
            .json(&json!({ "fields": fields }));
        let response = send(request, &operation).await?;

        match response.status() {
            StatusCode::CONFLICT => {
                tracing::debug!(scan_id = %record.scan_id, "metadata document already exists");
                Ok(())
            }
            status if status.is_success() => Ok(()),
            _ => Err(api_error(response, &operation).await),
        }
    }
}

/// Encodes a JSON object as Firestore document fields
pub fn encode_fields(value: &Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect()),
        other => anyhow::bail!("Firestore documents must be objects, got {}", other),
    }
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Decodes Firestore document fields back into a plain JSON object
pub fn decode_fields(fields: Map<String, Value>) -> Result<Value> {
    let mut object = Map::new();
    for (key, value) in fields {
        let decoded = decode_value(&value).with_context(|| format!("field '{}'", key))?;
        object.insert(key, decoded);
    }
    Ok(Value::Object(object))
}

fn decode_value(value: &Value) -> Result<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        anyhow::bail!("not a Firestore value: {}", value);
    };
    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue" => {
            inner.clone()
        }
        "integerValue" => match inner {
            Value::String(s) => Value::Number(
                s.parse::<i64>()
                    .with_context(|| format!("invalid integerValue '{}'", s))?
                    .into(),
            ),
            other => other.clone(),
        },
        "arrayValue" => {
            let items = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Value::Array(items)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            decode_fields(fields)?
        }
        other => anyhow::bail!("unsupported Firestore value type '{}'", other),
    })
}
