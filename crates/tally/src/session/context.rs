//! Who is reviewing and where.

use serde::{Deserialize, Serialize};

/// The reviewer and environment a session runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Reviewer identifier (e.g. "user:jane@example.com").
    pub actor_id: String,

    /// Environment the upload belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
}

impl SessionContext {
    /// Create a context for a reviewer.
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            environment_id: None,
        }
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }
}

/// The document under review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Upload identifier.
    pub id: String,

    /// Reference to the uploaded file.
    pub file: String,

    /// Environment the upload belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,

    /// Extraction method of the tables currently shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
}

impl Upload {
    /// Create an upload.
    pub fn new(id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            environment_id: None,
            extraction_method: None,
        }
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }

    /// Set the extraction method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.extraction_method = Some(method.into());
        self
    }
}
