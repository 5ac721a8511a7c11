use crate::scan_orchestration::domain::{DeploymentEvent, DeploymentMethod, ImageReference};
use crate::shared::error::ScanTriggerError;
use crate::shared::Result;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Maximum accepted envelope size (security limit)
pub const MAX_ENVELOPE_BYTES: usize = 1024 * 1024;

/// Maximum number of container images taken from one event
pub const MAX_IMAGES_PER_EVENT: usize = 16;

const V2_CONTAINERS: &str = "/protoPayload/request/template/containers";
const V1_CONTAINERS: &str = "/protoPayload/request/service/spec/template/spec/containers";

/// Decodes Pub/Sub-delivered Cloud Audit Log entries into [`DeploymentEvent`]s.
///
/// Accepts both the bare message shape (`{"data": .., "attributes": ..}`) and
/// the push-subscription wrapper (`{"message": {..}, "subscription": ..}`).
/// Pure transform: no I/O, every failure is a `MalformedEvent`.
pub struct EventDecoder;

impl EventDecoder {
    pub fn decode(raw: &[u8], received_at: DateTime<Utc>) -> Result<DeploymentEvent> {
        if raw.len() > MAX_ENVELOPE_BYTES {
            return Err(malformed(format!(
                "envelope is too large ({} bytes). Maximum allowed: {} bytes",
                raw.len(),
                MAX_ENVELOPE_BYTES
            )));
        }

        let envelope: Value = serde_json::from_slice(raw)
            .map_err(|e| malformed(format!("envelope is not valid JSON: {}", e)))?;

        let message = match envelope.get("message") {
            Some(inner) if inner.is_object() => inner,
            _ => &envelope,
        };

        let data = message
            .get("data")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| malformed("envelope has no 'data' field"))?;

        let payload = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| malformed(format!("'data' is not valid base64: {}", e)))?;

        let audit_log: Value = serde_json::from_slice(&payload)
            .map_err(|e| malformed(format!("audit log payload is not valid JSON: {}", e)))?;

        let method_name = required_str(&audit_log, "/protoPayload/methodName")?;
        let method = DeploymentMethod::from_method_name(method_name).ok_or_else(|| {
            malformed(format!(
                "method '{}' is not a Cloud Run service create or update",
                method_name
            ))
        })?;

        let project_id = required_str(&audit_log, "/resource/labels/project_id")?;
        let region = required_str(&audit_log, "/resource/labels/location")?;
        let service_name = match optional_str(&audit_log, "/resource/labels/service_name") {
            Some(name) => name.to_string(),
            None => service_from_resource_name(&audit_log)
                .ok_or_else(|| malformed("missing required field resource.labels.service_name"))?,
        };

        let container_images = Self::extract_images(&audit_log)?;

        let revision_id = [
            "/protoPayload/request/template/revision",
            "/protoPayload/response/latestCreatedRevision",
            "/resource/labels/revision_name",
        ]
        .iter()
        .find_map(|pointer| optional_str(&audit_log, pointer))
        .map(|revision| revision.rsplit('/').next().unwrap_or(revision).to_string());

        let event_timestamp = optional_str(&audit_log, "/timestamp")
            .or_else(|| message.get("publishTime").and_then(Value::as_str))
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or(received_at);

        let event_id = message
            .get("messageId")
            .or_else(|| message.get("message_id"))
            .and_then(Value::as_str)
            .or_else(|| optional_str(&audit_log, "/insertId"))
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let event_type = message
            .pointer("/attributes/event_type")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(DeploymentEvent::new(
            event_id,
            event_type,
            project_id.to_string(),
            region.to_string(),
            service_name,
            revision_id,
            method_name.to_string(),
            method,
            container_images,
            event_timestamp,
        ))
    }

    /// Pulls `containers[].image` out of the service template (v2 shape first, then v1).
    ///
    /// References that fail to parse are dropped with a warning; an event with
    /// no usable image at all is malformed.
    fn extract_images(audit_log: &Value) -> Result<Vec<ImageReference>> {
        let containers = audit_log
            .pointer(V2_CONTAINERS)
            .or_else(|| audit_log.pointer(V1_CONTAINERS))
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("service template has no containers"))?;

        let mut images = Vec::new();
        for container in containers {
            let Some(reference) = container.get("image").and_then(Value::as_str) else {
                continue;
            };
            match ImageReference::parse(reference) {
                Ok(image) => images.push(image),
                Err(e) => tracing::warn!(image = reference, error = %e, "dropping unparsable image reference"),
            }
        }

        if images.is_empty() {
            return Err(malformed("no container images found in service definition"));
        }

        let distinct = images
            .iter()
            .map(ImageReference::full_name)
            .collect::<std::collections::HashSet<_>>()
            .len();
        if distinct > MAX_IMAGES_PER_EVENT {
            return Err(malformed(format!(
                "event lists {} distinct images, the limit is {}",
                distinct, MAX_IMAGES_PER_EVENT
            )));
        }

        Ok(images)
    }
}

fn malformed(reason: impl Into<String>) -> anyhow::Error {
    ScanTriggerError::malformed(reason).into()
}

fn optional_str<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    optional_str(value, pointer).ok_or_else(|| {
        let field = pointer.trim_start_matches('/').replace('/', ".");
        malformed(format!("missing required field {}", field))
    })
}

/// `projects/p/locations/l/services/<name>` → `<name>`
fn service_from_resource_name(audit_log: &Value) -> Option<String> {
    let resource_name = optional_str(audit_log, "/protoPayload/resourceName")?;
    let mut segments = resource_name.split('/');
    while let Some(segment) = segments.next() {
        if segment == "services" {
            return segments.next().filter(|s| !s.is_empty()).map(String::from);
        }
    }
    None
}
