use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::AssistantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssistantError {
    #[error("assistant name cannot be empty")]
    EmptyName,
}

/// A selectable AI tutor shown on the assistant step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    id: AssistantId,
    name: String,
    avatar_url: Option<String>,
    tagline: Option<String>,
}

impl Assistant {
    /// # Errors
    ///
    /// Returns `AssistantError::EmptyName` if the trimmed name is empty.
    pub fn new(
        id: AssistantId,
        name: impl Into<String>,
        avatar_url: Option<String>,
        tagline: Option<String>,
    ) -> Result<Self, AssistantError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(AssistantError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            avatar_url: avatar_url.filter(|s| !s.trim().is_empty()),
            tagline: tagline.filter(|s| !s.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn id(&self) -> AssistantId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    #[must_use]
    pub fn tagline(&self) -> Option<&str> {
        self.tagline.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_name_and_drops_blank_optionals() {
        let a = Assistant::new(AssistantId::new(1), "  Nova ", Some(" ".into()), None).unwrap();
        assert_eq!(a.name(), "Nova");
        assert_eq!(a.avatar_url(), None);
    }

    #[test]
    fn rejects_blank_name() {
        let err = Assistant::new(AssistantId::new(1), "   ", None, None).unwrap_err();
        assert_eq!(err, AssistantError::EmptyName);
    }
}
