//! Arena of live matches
//!
//! The arena is the only owner of match lifetimes. Parent/child edges are
//! stored as ids so re-parenting never creates ownership cycles.

use crate::error::MatchError;
use crate::id::MatchId;
use crate::route_match::RouteMatch;
use crate::router::RouterContext;
use crate::state::MatchStatus;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What happens to children when a parent's search fails validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFailurePolicy {
    /// Children still validate (and load) on their own
    #[default]
    Continue,
    /// Children of a failed match are neither validated nor loaded
    SkipDescendants,
}

/// Outcome of a validation pass over the arena
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub failed: Vec<(MatchId, Arc<MatchError>)>,
    pub skipped: Vec<MatchId>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    fn blocks(&self, id: &MatchId) -> bool {
        self.failed.iter().any(|(failed, _)| failed == id) || self.skipped.contains(id)
    }
}

struct MatchNode {
    route_match: RouteMatch,
    parent: Option<MatchId>,
    children: Vec<MatchId>,
}

/// All matches of the pending and current locations, keyed by id
pub struct MatchArena {
    router: Arc<RouterContext>,
    nodes: HashMap<MatchId, MatchNode>,
    order: Vec<MatchId>,
    policy: ParentFailurePolicy,
}

impl MatchArena {
    pub fn new(router: Arc<RouterContext>) -> Self {
        Self {
            router,
            nodes: HashMap::new(),
            order: Vec::new(),
            policy: ParentFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ParentFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn router(&self) -> &Arc<RouterContext> {
        &self.router
    }

    pub fn policy(&self) -> ParentFailurePolicy {
        self.policy
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Add a match beneath `parent`, or re-parent it if already present
    ///
    /// A different instance under an existing id replaces the old one, which
    /// is cancelled. Children stay attached either way.
    pub fn insert(&mut self, route_match: RouteMatch, parent: Option<&MatchId>) -> Result<(), MatchError> {
        let id = route_match.match_id().clone();

        if let Some(parent) = parent {
            if !self.nodes.contains_key(parent) {
                return Err(MatchError::UnknownMatch(parent.clone()));
            }
            if *parent == id || self.is_descendant(parent, &id) {
                return Err(MatchError::InvalidParent(id));
            }
        }

        let children = match self.nodes.remove(&id) {
            Some(existing) => {
                self.detach(&id, existing.parent.as_ref());
                if !existing.route_match.ptr_eq(&route_match) {
                    tracing::debug!(match_id = %id, "replacing match instance");
                    existing.route_match.cancel();
                }
                existing.children
            }
            None => {
                self.order.push(id.clone());
                Vec::new()
            }
        };

        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.push(id.clone());
            }
        }

        self.nodes.insert(
            id,
            MatchNode {
                route_match,
                parent: parent.cloned(),
                children,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &MatchId) -> Option<&RouteMatch> {
        self.nodes.get(id).map(|node| &node.route_match)
    }

    pub fn contains(&self, id: &MatchId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn parent_of(&self, id: &MatchId) -> Option<&RouteMatch> {
        let parent = self.nodes.get(id)?.parent.as_ref()?;
        self.get(parent)
    }

    pub fn children_of(&self, id: &MatchId) -> Vec<&RouteMatch> {
        self.nodes
            .get(id)
            .map(|node| node.children.iter().filter_map(|child| self.get(child)).collect())
            .unwrap_or_default()
    }

    /// Ids in insertion order
    pub fn ids(&self) -> &[MatchId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove a match and its whole subtree, cancelling each removed match
    pub fn remove(&mut self, id: &MatchId) -> Vec<RouteMatch> {
        let Some(parent) = self.nodes.get(id).map(|node| node.parent.clone()) else {
            return Vec::new();
        };
        self.detach(id, parent.as_ref());

        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                node.route_match.cancel();
                stack.extend(node.children);
                removed.push(node.route_match);
            }
        }

        self.order.retain(|id| self.nodes.contains_key(id));
        removed
    }

    /// Drop every match not in `keep`
    ///
    /// Kept children of a dropped parent become roots.
    pub fn retain(&mut self, keep: &HashSet<MatchId>) -> Vec<RouteMatch> {
        let doomed: Vec<MatchId> = self
            .order
            .iter()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            self.detach(&id, node.parent.as_ref());
            for child in &node.children {
                if let Some(child) = self.nodes.get_mut(child) {
                    child.parent = None;
                }
            }
            node.route_match.cancel();
            removed.push(node.route_match);
        }

        self.order.retain(|id| self.nodes.contains_key(id));
        if !removed.is_empty() {
            tracing::debug!(removed = removed.len(), "pruned stale matches");
        }
        removed
    }

    fn detach(&mut self, id: &MatchId, parent: Option<&MatchId>) {
        if let Some(node) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
            node.children.retain(|child| child != id);
        }
    }

    fn is_descendant(&self, candidate: &MatchId, ancestor: &MatchId) -> bool {
        let mut current = self.nodes.get(candidate).and_then(|node| node.parent.as_ref());
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|node| node.parent.as_ref());
        }
        false
    }

    /// Ids ordered parents-first, roots in insertion order
    pub fn tree_order(&self) -> Vec<MatchId> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&MatchId> = self
            .order
            .iter()
            .rev()
            .filter(|id| self.nodes.get(*id).is_some_and(|node| node.parent.is_none()))
            .collect();

        while let Some(id) = stack.pop() {
            ordered.push(id.clone());
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.children.iter().rev());
            }
        }
        ordered
    }

    // ========================================================================
    // Search resolution
    // ========================================================================

    fn parent_search(&self, id: &MatchId) -> Arc<Value> {
        self.parent_of(id)
            .map(RouteMatch::search)
            .unwrap_or_else(|| self.router.location_search())
    }

    /// Validate one match against its parent's search (or the location's)
    pub fn validate(&self, id: &MatchId) -> Result<(), Arc<MatchError>> {
        let route_match = self
            .get(id)
            .ok_or_else(|| Arc::new(MatchError::UnknownMatch(id.clone())))?;
        route_match.validate(&self.parent_search(id))
    }

    /// Validate every match, parents first
    pub fn validate_all(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for id in self.tree_order() {
            let parent_blocked = self
                .nodes
                .get(&id)
                .and_then(|node| node.parent.as_ref())
                .is_some_and(|parent| report.blocks(parent));

            if parent_blocked && self.policy == ParentFailurePolicy::SkipDescendants {
                report.skipped.push(id);
                continue;
            }

            if let Err(err) = self.validate(&id) {
                report.failed.push((id, err));
            }
        }

        report
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Merge the parent's loader data into this match's `loader_data`
    pub fn sync_loader_data(&self, id: &MatchId) -> Result<(), MatchError> {
        let route_match = self
            .get(id)
            .ok_or_else(|| MatchError::UnknownMatch(id.clone()))?;
        let parent_data = self
            .parent_of(id)
            .map(RouteMatch::loader_data)
            .unwrap_or_else(crate::share::empty_object);

        route_match.set_parent_loader_data(parent_data);
        Ok(())
    }

    /// Validate then load one match
    pub async fn load(&self, id: &MatchId) -> Result<(), MatchError> {
        let route_match = self
            .get(id)
            .ok_or_else(|| MatchError::UnknownMatch(id.clone()))?;

        // A failed validation is recorded on the match itself.
        let _ = self.validate(id);
        route_match.load().await;

        for id in self.tree_order() {
            self.sync_loader_data(&id)?;
        }
        Ok(())
    }

    /// Validate everything, load what is idle or stale, then merge loader data
    pub async fn load_all(&self) -> ValidationReport {
        let report = self.validate_all();

        let due: Vec<&RouteMatch> = self
            .tree_order()
            .iter()
            .filter(|id| !report.blocks(id))
            .filter_map(|id| self.get(id))
            .filter(|m| m.status() == MatchStatus::Idle || m.get_is_invalid())
            .collect();

        tracing::debug!(due = due.len(), "loading matches");
        join_all(due.into_iter().map(|m| m.load())).await;

        for id in self.tree_order() {
            // Every id came from the arena itself.
            let _ = self.sync_loader_data(&id);
        }

        report
    }
}
