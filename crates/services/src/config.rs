use sprite_core::model::SKILL_ASSESSMENT_TOPIC;

const DEFAULT_DB_URL: &str = "sqlite:sprite.sqlite3";

/// Service configuration loaded from environment variables.
///
/// | Env Var                   | Default                  |
/// |---------------------------|--------------------------|
/// | `SPRITE_DB_URL`           | `sqlite:sprite.sqlite3`  |
/// | `SPRITE_SKILL_QUIZ_TOPIC` | `skill-assessment`       |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database_url: String,
    /// Topic label of the quiz used for the onboarding skill check.
    pub skill_quiz_topic: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.to_owned(),
            skill_quiz_topic: SKILL_ASSESSMENT_TOPIC.to_owned(),
        }
    }
}

impl ServiceConfig {
    /// Load from the process environment, reading a `.env` file first if present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            database_url: read("SPRITE_DB_URL").unwrap_or(defaults.database_url),
            skill_quiz_topic: read("SPRITE_SKILL_QUIZ_TOPIC").unwrap_or(defaults.skill_quiz_topic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_or_blank_values_use_defaults() {
        let env = HashMap::from([("SPRITE_DB_URL", "  ")]);
        let config = ServiceConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn values_override_defaults() {
        let env = HashMap::from([
            ("SPRITE_DB_URL", "sqlite::memory:"),
            ("SPRITE_SKILL_QUIZ_TOPIC", "python-101"),
        ]);
        let config = ServiceConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.skill_quiz_topic, "python-101");
    }
}
