//! Search resolution: validate a match's search against its parent's

use crate::error::MatchError;
use crate::route_match::RouteMatch;
use crate::share::{merge_objects, replace_equal_deep};
use crate::state::MatchStatus;
use serde_json::{Map, Value};
use std::sync::Arc;

impl RouteMatch {
    /// Validate and stabilize this match's search
    ///
    /// `parent_search` is the parent match's resolved search, or the
    /// location's raw search for a root match. On failure the match goes to
    /// `status == Error` and will not load until validation passes. On
    /// success a changed `route_search` reference marks the match invalid.
    pub fn validate(&self, parent_search: &Arc<Value>) -> Result<(), Arc<MatchError>> {
        let validated = match &self.route().options.validate_search {
            Some(validator) => validator.validate(parent_search),
            None => Ok(Value::Object(Map::new())),
        };
        let has_loaders = self.has_loaders();

        let (outcome, changed) = {
            let mut cell = self.lock();
            cell.facet.parent_search = Some(Arc::clone(parent_search));

            match validated {
                Err(err) => {
                    tracing::error!(match_id = %self.match_id(), error = %err, "invalid search params");
                    let error = Arc::new(MatchError::InvalidSearchParams(err.into()));
                    cell.state.status = MatchStatus::Error;
                    cell.state.error = Some(Arc::clone(&error));
                    cell.facet.search_failed = true;
                    (Err(error), true)
                }
                Ok(next) => {
                    let route_search = replace_equal_deep(&cell.state.route_search, next);
                    let route_changed = !Arc::ptr_eq(&route_search, &cell.state.route_search);
                    if route_changed {
                        cell.state.is_invalid = true;
                    }

                    let merged = merge_objects(parent_search, &route_search);
                    let search = if *cell.state.search == merged {
                        Arc::clone(&cell.state.search)
                    } else {
                        replace_equal_deep(parent_search, merged)
                    };
                    let search_changed = !Arc::ptr_eq(&search, &cell.state.search);

                    cell.state.route_search = route_search;
                    cell.state.search = search;

                    let recovered = std::mem::take(&mut cell.facet.search_failed);
                    if recovered && !has_loaders {
                        cell.state.status = MatchStatus::Success;
                        cell.state.error = None;
                    }

                    (Ok(()), route_changed || search_changed || recovered)
                }
            }
        };

        if changed {
            self.notify();
        }
        outcome
    }

    /// Re-run a failed validation against the last parent search
    ///
    /// Returns whether loading may proceed.
    pub(crate) fn revalidate_if_failed(&self) -> bool {
        let parent_search = {
            let cell = self.lock();
            if !cell.facet.search_failed {
                return true;
            }
            cell.facet.parent_search.clone()
        };

        let parent_search = parent_search.unwrap_or_else(|| self.router().location_search());
        self.validate(&parent_search).is_ok()
    }
}
