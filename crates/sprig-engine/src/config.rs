//! Engine Configuration

use serde::{Deserialize, Serialize};

/// Engine configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directive attribute prefix (`r-` gives `r-data`, `r-text`, ...)
    pub prefix: String,

    /// Shorthand for `<prefix>bind:` (`:href`)
    pub bind_shorthand: char,

    /// Shorthand for `<prefix>on:` (`@click`)
    pub event_shorthand: char,

    /// Index alias when a list directive names only the item
    pub default_index_alias: String,

    /// Delay before the watcher resumes after a list render (virtual ms)
    pub watcher_grace_ms: u64,

    /// Event a two-way value binding listens to
    pub model_event: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "r-".to_string(),
            bind_shorthand: ':',
            event_shorthand: '@',
            default_index_alias: "index".to_string(),
            watcher_grace_ms: 10,
            model_event: "input".to_string(),
        }
    }
}

impl Config {
    /// Load from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Full attribute name of a directive (`"text"` → `"r-text"`)
    pub fn attribute(&self, directive: &str) -> String {
        format!("{}{}", self.prefix, directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.attribute("data"), "r-data");
        assert_eq!(config.watcher_grace_ms, 10);
        assert_eq!(config.default_index_alias, "index");
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(r#"{ "prefix": "x-", "watcher_grace_ms": 0 }"#).unwrap();
        assert_eq!(config.attribute("for"), "x-for");
        assert_eq!(config.watcher_grace_ms, 0);
        assert_eq!(config.bind_shorthand, ':');
        assert_eq!(config.model_event, "input");
    }

    #[test]
    fn test_bad_json() {
        assert!(Config::from_json("{ prefix: 1 }").is_err());
    }
}
