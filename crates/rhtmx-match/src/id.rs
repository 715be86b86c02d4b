//! Identity of matches and load invocations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Stable key of a route match, derived from the route template and its params
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives a match id by substituting params into a route template
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_match::MatchId;
    /// use std::collections::HashMap;
    ///
    /// let mut params = HashMap::new();
    /// params.insert("id".to_string(), "42".to_string());
    ///
    /// let id = MatchId::from_route("/users/:id", &params);
    /// assert_eq!(id.as_str(), "/users/42");
    /// ```
    pub fn from_route(template: &str, params: &HashMap<String, String>) -> Self {
        let segments: Vec<String> = template
            .split('/')
            .filter(|s| !s.is_empty())
            .filter_map(|segment| match segment.chars().next() {
                // Dynamic parameter: :id or :id?
                Some(':') => {
                    let name = segment.trim_start_matches(':').trim_end_matches('?');
                    match params.get(name) {
                        Some(value) => Some(value.clone()),
                        None if segment.ends_with('?') => None,
                        None => Some(segment.to_string()),
                    }
                }
                // Catch-all parameter: *slug
                Some('*') => {
                    let name = segment.trim_start_matches('*').trim_end_matches('?');
                    params.get(name).filter(|v| !v.is_empty()).cloned()
                }
                _ => Some(segment.to_string()),
            })
            .collect();

        if segments.is_empty() {
            Self("/".to_string())
        } else {
            Self(format!("/{}", segments.join("/")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque token identifying one `load()` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadId(Uuid);

impl LoadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoadId {
    fn default() -> Self {
        Self::new()
    }
}
