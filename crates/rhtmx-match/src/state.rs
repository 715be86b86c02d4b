//! Observable state of a route match

use crate::error::MatchError;
use crate::share::empty_object;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Lifecycle status of a match
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Idle => write!(f, "idle"),
            MatchStatus::Loading => write!(f, "loading"),
            MatchStatus::Success => write!(f, "success"),
            MatchStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of everything the rendering layer may read
#[derive(Debug, Clone)]
pub struct MatchState {
    pub status: MatchStatus,

    /// Last time a load resolved (success or error)
    pub updated_at: Option<DateTime<Utc>>,

    /// Explicitly invalidated; cleared only when a load starts
    pub is_invalid: bool,

    /// The load outlived the pending delay
    pub is_pending: bool,

    /// A load is in flight, possibly behind already-visible content
    pub is_fetching: bool,

    /// This route's own validated search
    pub route_search: Arc<Value>,

    /// Parent search merged with `route_search`
    pub search: Arc<Value>,

    /// This route's loader output
    pub route_loader_data: Arc<Value>,

    /// Loader output merged down the match tree
    pub loader_data: Arc<Value>,

    pub error: Option<Arc<MatchError>>,
}

impl MatchState {
    pub(crate) fn new(status: MatchStatus) -> Self {
        Self {
            status,
            updated_at: None,
            is_invalid: false,
            is_pending: false,
            is_fetching: false,
            route_search: empty_object(),
            search: empty_object(),
            route_loader_data: empty_object(),
            loader_data: empty_object(),
            error: None,
        }
    }

    /// Status after a load begins
    ///
    /// Idle and failed matches go back to loading; resolved ones keep showing
    /// their content while refetching.
    pub(crate) fn begin_load(&mut self) {
        if matches!(self.status, MatchStatus::Idle | MatchStatus::Error) {
            self.status = MatchStatus::Loading;
        }
        self.is_invalid = false;
        self.is_fetching = true;
    }

    pub(crate) fn resolve(&mut self, at: DateTime<Utc>) {
        self.error = None;
        self.status = MatchStatus::Success;
        self.updated_at = Some(at);
    }

    pub(crate) fn fail(&mut self, error: MatchError, at: DateTime<Utc>) {
        self.error = Some(Arc::new(error));
        self.status = MatchStatus::Error;
        self.updated_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MatchStatus::Idle, MatchStatus::Loading)]
    #[case(MatchStatus::Error, MatchStatus::Loading)]
    #[case(MatchStatus::Loading, MatchStatus::Loading)]
    #[case(MatchStatus::Success, MatchStatus::Success)]
    fn test_begin_load_transitions(#[case] from: MatchStatus, #[case] to: MatchStatus) {
        let mut state = MatchState::new(from);
        state.is_invalid = true;

        state.begin_load();

        assert_eq!(state.status, to);
        assert!(!state.is_invalid);
        assert!(state.is_fetching);
    }

    #[test]
    fn test_resolve_clears_error() {
        let mut state = MatchState::new(MatchStatus::Loading);
        let now = Utc::now();
        state.fail(MatchError::Loader(anyhow::anyhow!("down").into()), now);
        assert_eq!(state.status, MatchStatus::Error);

        state.resolve(now);
        assert_eq!(state.status, MatchStatus::Success);
        assert!(state.error.is_none());
        assert_eq!(state.updated_at, Some(now));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MatchStatus::Loading).unwrap(), "\"loading\"");
        assert_eq!(MatchStatus::Error.to_string(), "error");
    }
}
