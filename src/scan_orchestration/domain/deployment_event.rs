use super::ImageReference;
use chrono::{DateTime, Utc};
use std::fmt;

/// Kind of service mutation that triggered the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMethod {
    CreateService,
    UpdateService,
}

impl DeploymentMethod {
    /// Matches Cloud Run admin API method names such as
    /// `google.cloud.run.v2.Services.CreateService` (v1 and v2).
    pub fn from_method_name(method_name: &str) -> Option<Self> {
        if !method_name.starts_with("google.cloud.run.") {
            return None;
        }
        if method_name.ends_with(".Services.CreateService") {
            Some(DeploymentMethod::CreateService)
        } else if method_name.ends_with(".Services.UpdateService")
            || method_name.ends_with(".Services.ReplaceService")
        {
            Some(DeploymentMethod::UpdateService)
        } else {
            None
        }
    }
}

impl fmt::Display for DeploymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMethod::CreateService => write!(f, "create"),
            DeploymentMethod::UpdateService => write!(f, "update"),
        }
    }
}

/// A decoded Cloud Run deployment notification.
///
/// Immutable once decoded; lives for the duration of one invocation.
#[derive(Debug, Clone)]
pub struct DeploymentEvent {
    event_id: String,
    event_type: Option<String>,
    project_id: String,
    region: String,
    service_name: String,
    revision_id: Option<String>,
    method_name: String,
    method: DeploymentMethod,
    container_images: Vec<ImageReference>,
    event_timestamp: DateTime<Utc>,
}

impl DeploymentEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: String,
        event_type: Option<String>,
        project_id: String,
        region: String,
        service_name: String,
        revision_id: Option<String>,
        method_name: String,
        method: DeploymentMethod,
        container_images: Vec<ImageReference>,
        event_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            event_type,
            project_id,
            region,
            service_name,
            revision_id,
            method_name,
            method,
            container_images,
            event_timestamp,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn revision_id(&self) -> Option<&str> {
        self.revision_id.as_deref()
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn method(&self) -> DeploymentMethod {
        self.method
    }

    /// Images in the order they appear in the service template.
    pub fn container_images(&self) -> &[ImageReference] {
        &self.container_images
    }

    /// Images with duplicates (by normalized name) removed, first occurrence kept.
    pub fn distinct_images(&self) -> Vec<ImageReference> {
        let mut seen = std::collections::HashSet::new();
        self.container_images
            .iter()
            .filter(|image| seen.insert(image.full_name()))
            .cloned()
            .collect()
    }

    pub fn event_timestamp(&self) -> DateTime<Utc> {
        self.event_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_name_v2() {
        assert_eq!(
            DeploymentMethod::from_method_name("google.cloud.run.v2.Services.CreateService"),
            Some(DeploymentMethod::CreateService)
        );
        assert_eq!(
            DeploymentMethod::from_method_name("google.cloud.run.v2.Services.UpdateService"),
            Some(DeploymentMethod::UpdateService)
        );
    }

    #[test]
    fn test_method_from_name_v1() {
        assert_eq!(
            DeploymentMethod::from_method_name("google.cloud.run.v1.Services.ReplaceService"),
            Some(DeploymentMethod::UpdateService)
        );
    }

    #[test]
    fn test_method_from_name_rejects_other_methods() {
        assert_eq!(
            DeploymentMethod::from_method_name("google.cloud.run.v2.Services.DeleteService"),
            None
        );
        assert_eq!(
            DeploymentMethod::from_method_name("google.cloud.run.v2.Jobs.CreateJob"),
            None
        );
        assert_eq!(
            DeploymentMethod::from_method_name("storage.objects.create"),
            None
        );
        assert_eq!(DeploymentMethod::from_method_name(""), None);
    }

    #[test]
    fn test_distinct_images_keeps_first_occurrence() {
        let images = vec![
            ImageReference::parse("gcr.io/p/app:v1").unwrap(),
            ImageReference::parse("nginx").unwrap(),
            ImageReference::parse("docker.io/library/nginx:latest").unwrap(),
        ];
        let event = DeploymentEvent::new(
            "evt".to_string(),
            None,
            "p".to_string(),
            "us-central1".to_string(),
            "svc".to_string(),
            None,
            "google.cloud.run.v2.Services.CreateService".to_string(),
            DeploymentMethod::CreateService,
            images,
            Utc::now(),
        );

        let distinct = event.distinct_images();
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].full_name(), "gcr.io/p/app:v1");
        assert_eq!(distinct[1].full_name(), "docker.io/library/nginx:latest");
    }
}
