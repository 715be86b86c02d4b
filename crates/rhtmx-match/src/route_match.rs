//! The per-route match and its load orchestrator
//!
//! A load runs as one pipeline: import, then content and data in parallel,
//! then the pending-minimum wait, then a final cleanup phase. Every commit is
//! gated by the load token: a pipeline only mutates state while its token is
//! still the latest one. A superseded pipeline defers to the newest
//! pipeline's future instead of applying anything.

use crate::error::MatchError;
use crate::id::{LoadId, MatchId};
use crate::route::{
    ContentKind, ContentSet, ContentSlot, Element, ImportContext, LoaderContext, RouteDefinition,
};
use crate::router::RouterContext;
use crate::share::{empty_object, merge_objects, replace_equal_deep};
use crate::state::{MatchState, MatchStatus};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A settled-once future several waiters can await
pub(crate) type SharedWait = Shared<BoxFuture<'static, ()>>;

/// Internal facet: everything a match owns but never exposes for rendering
pub(crate) struct Facet {
    pub(crate) latest: Option<LoadId>,
    pub(crate) abort: CancellationToken,
    pub(crate) load_promise: Option<SharedWait>,
    pub(crate) pending_timer: Option<JoinHandle<()>>,
    pub(crate) pending_min: Option<SharedWait>,
    pub(crate) pending_min_stop: Option<CancellationToken>,
    pub(crate) content: ContentSet,
    /// Parent search handed to the last `validate()`
    pub(crate) parent_search: Option<Arc<Value>>,
    pub(crate) search_failed: bool,
    pub(crate) parent_loader_data: Arc<Value>,
}

impl Facet {
    fn new() -> Self {
        Self {
            latest: None,
            abort: CancellationToken::new(),
            load_promise: None,
            pending_timer: None,
            pending_min: None,
            pending_min_stop: None,
            content: ContentSet::default(),
            parent_search: None,
            search_failed: false,
            parent_loader_data: empty_object(),
        }
    }
}

pub(crate) struct MatchCell {
    pub(crate) state: MatchState,
    pub(crate) facet: Facet,
}

impl MatchCell {
    pub(crate) fn is_current(&self, token: LoadId) -> bool {
        self.facet.latest == Some(token)
    }

    /// Recomputes `loader_data` from the parent's data and this route's data
    pub(crate) fn refresh_loader_data(&mut self) {
        let merged = merge_objects(&self.facet.parent_loader_data, &self.state.route_loader_data);
        let shared = replace_equal_deep(&self.state.loader_data, merged);
        self.state.loader_data = shared;
    }
}

struct MatchInner {
    match_id: MatchId,
    pathname: String,
    params: HashMap<String, String>,
    route: Arc<RouteDefinition>,
    router: Arc<RouterContext>,
    cell: Mutex<MatchCell>,
}

/// Runtime binding of a route to one resolved path
///
/// Cloning is cheap and every clone refers to the same match.
#[derive(Clone)]
pub struct RouteMatch {
    inner: Arc<MatchInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    /// Keep going with the next step
    Continue,
    /// This load already committed its outcome
    Settled,
    /// A newer load owns the match now
    Superseded,
}

impl RouteMatch {
    /// Create a match; the id is derived from the route template and params
    ///
    /// A route with nothing to load starts out resolved.
    pub fn new(
        router: Arc<RouterContext>,
        route: Arc<RouteDefinition>,
        pathname: impl Into<String>,
        params: HashMap<String, String>,
    ) -> Self {
        let match_id = MatchId::from_route(&route.id, &params);
        Self::with_id(router, route, match_id, pathname, params)
    }

    pub fn with_id(
        router: Arc<RouterContext>,
        route: Arc<RouteDefinition>,
        match_id: MatchId,
        pathname: impl Into<String>,
        params: HashMap<String, String>,
    ) -> Self {
        let status = if route.has_loaders() {
            MatchStatus::Idle
        } else {
            MatchStatus::Success
        };

        Self {
            inner: Arc::new(MatchInner {
                match_id,
                pathname: pathname.into(),
                params,
                route,
                router,
                cell: Mutex::new(MatchCell {
                    state: MatchState::new(status),
                    facet: Facet::new(),
                }),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, MatchCell> {
        self.inner.cell.lock()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.router.clock().now()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// True when both handles refer to the same match
    pub fn ptr_eq(&self, other: &RouteMatch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn match_id(&self) -> &MatchId {
        &self.inner.match_id
    }

    pub fn pathname(&self) -> &str {
        &self.inner.pathname
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.inner.params
    }

    pub fn route(&self) -> &Arc<RouteDefinition> {
        &self.inner.route
    }

    pub fn router(&self) -> &Arc<RouterContext> {
        &self.inner.router
    }

    /// Copy of the observable state
    pub fn snapshot(&self) -> MatchState {
        self.lock().state.clone()
    }

    pub fn status(&self) -> MatchStatus {
        self.lock().state.status
    }

    pub fn is_pending(&self) -> bool {
        self.lock().state.is_pending
    }

    pub fn is_fetching(&self) -> bool {
        self.lock().state.is_fetching
    }

    /// The explicit invalidation flag; see [`RouteMatch::get_is_invalid`]
    pub fn is_invalid(&self) -> bool {
        self.lock().state.is_invalid
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.lock().state.updated_at
    }

    pub fn error(&self) -> Option<Arc<MatchError>> {
        self.lock().state.error.clone()
    }

    pub fn route_search(&self) -> Arc<Value> {
        Arc::clone(&self.lock().state.route_search)
    }

    pub fn search(&self) -> Arc<Value> {
        Arc::clone(&self.lock().state.search)
    }

    pub fn route_loader_data(&self) -> Arc<Value> {
        Arc::clone(&self.lock().state.route_loader_data)
    }

    pub fn loader_data(&self) -> Arc<Value> {
        Arc::clone(&self.lock().state.loader_data)
    }

    /// Resolved content for a slot, if any
    pub fn content(&self, kind: ContentKind) -> Option<Element> {
        self.lock().facet.content.get(kind).cloned()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// True if a loader, an importer or a lazy content slot is configured
    pub fn has_loaders(&self) -> bool {
        self.inner.route.has_loaders()
    }

    /// Whether the match should be reloaded before its data is trusted
    ///
    /// Invalid when flagged explicitly or when `updated_at + max_age` lies in
    /// the past. A match that never resolved has no age and is not stale.
    pub fn get_is_invalid(&self) -> bool {
        let max_age = self
            .inner
            .route
            .options
            .timing
            .loader_max_age(self.inner.router.options());

        let (is_invalid, updated_at) = {
            let cell = self.lock();
            (cell.state.is_invalid, cell.state.updated_at)
        };

        if is_invalid {
            return true;
        }

        match (updated_at, chrono::Duration::from_std(max_age)) {
            (Some(at), Ok(max_age)) => at
                .checked_add_signed(max_age)
                .is_some_and(|expires| expires < self.now()),
            _ => false,
        }
    }

    /// Flag the match for reload; does not load by itself
    pub fn invalidate(&self) {
        self.lock().state.is_invalid = true;
        self.notify();
    }

    /// Abort the loader's signal and clear pending timers
    ///
    /// In-flight work is not stopped; a loader must watch its signal.
    pub fn cancel(&self) {
        let abort = self.lock().facet.abort.clone();
        abort.cancel();
        self.cancel_pending();
    }

    /// Merge the parent's loader data beneath this route's own
    pub(crate) fn set_parent_loader_data(&self, parent: Arc<Value>) {
        let changed = {
            let mut cell = self.lock();
            let before = Arc::clone(&cell.state.loader_data);
            cell.facet.parent_loader_data = parent;
            cell.refresh_loader_data();
            !Arc::ptr_eq(&before, &cell.state.loader_data)
        };

        if changed {
            self.notify();
        }
    }

    /// Broadcast a change of this match to the router's subscribers
    pub fn notify(&self) {
        self.inner.router.notify(&self.inner.match_id);
    }

    /// Load code, content and data for this match
    ///
    /// Resolves once the pipeline settles. If a newer `load()` supersedes this
    /// one, resolves when the newer one does. Never fails: loader, import and
    /// content errors land in `status` and `error`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn load(&self) {
        if !self.has_loaders() {
            return;
        }

        if !self.revalidate_if_failed() {
            tracing::debug!(match_id = %self.match_id(), "search still invalid, skipping load");
            return;
        }

        let token = LoadId::new();
        let abort = CancellationToken::new();
        let pipeline: SharedWait = self
            .clone()
            .run_pipeline(token, abort.clone())
            .boxed()
            .shared();

        {
            let mut cell = self.lock();
            cell.facet.latest = Some(token);
            cell.facet.abort = abort;
            cell.facet.load_promise = Some(pipeline.clone());
            cell.state.begin_load();
        }

        tracing::debug!(match_id = %self.match_id(), "starting load");
        self.notify();
        self.start_pending();

        // Drive the pipeline even if the caller drops this future.
        tokio::spawn(pipeline.clone());
        pipeline.await;
    }

    async fn run_pipeline(self, token: LoadId, abort: CancellationToken) {
        if self.run_steps(token, abort).await == Progress::Superseded {
            tracing::debug!(match_id = %self.match_id(), "load superseded");
        }
        self.finish(token).await;
    }

    async fn run_steps(&self, token: LoadId, abort: CancellationToken) -> Progress {
        match self.import(token).await {
            Progress::Continue => {}
            settled_or_superseded => return settled_or_superseded,
        }

        let (content_error, data) = tokio::join!(
            self.resolve_content(token),
            self.resolve_data(token, abort)
        );

        if data == Progress::Superseded {
            return Progress::Superseded;
        }

        let pending_min = {
            let mut cell = self.lock();
            if !cell.is_current(token) {
                return Progress::Superseded;
            }
            if let Some(err) = content_error {
                tracing::warn!(match_id = %self.match_id(), error = %err, "content resolution failed");
                let now = self.now();
                cell.state.fail(err, now);
            }
            cell.facet.pending_min.clone()
        };

        if let Some(wait) = pending_min {
            wait.await;
        }

        Progress::Settled
    }

    async fn import(&self, token: LoadId) -> Progress {
        let Some(importer) = self.inner.route.options.importer.clone() else {
            return Progress::Continue;
        };

        let result = importer
            .import(ImportContext {
                params: self.params().clone(),
            })
            .await;

        let now = self.now();
        let mut cell = self.lock();
        if !cell.is_current(token) {
            return Progress::Superseded;
        }

        match result {
            Ok(imported) => {
                cell.facet.content.merge(imported);
                Progress::Continue
            }
            Err(err) => {
                tracing::warn!(match_id = %self.match_id(), error = %err, "route import failed");
                cell.state.fail(MatchError::Import(err.into()), now);
                Progress::Settled
            }
        }
    }

    /// Resolves all four content slots concurrently, returning the first failure
    async fn resolve_content(&self, token: LoadId) -> Option<MatchError> {
        let results = join_all(
            ContentKind::ALL.map(|kind| self.resolve_slot(kind, token)),
        )
        .await;

        results.into_iter().find_map(Result::err)
    }

    async fn resolve_slot(&self, kind: ContentKind, token: LoadId) -> Result<(), MatchError> {
        let resolved = self.lock().facet.content.get(kind).is_some();
        if resolved {
            return Ok(());
        }

        let element = match self.inner.route.options.slot(kind) {
            None => return Ok(()),
            Some(ContentSlot::Static(element)) => element.clone(),
            Some(ContentSlot::Lazy(loader)) => loader
                .resolve(self.clone())
                .await
                .map_err(|err| MatchError::Content {
                    slot: kind,
                    source: err.into(),
                })?,
        };

        let mut cell = self.lock();
        if cell.is_current(token) {
            cell.facet.content.set(kind, element);
        }
        Ok(())
    }

    async fn resolve_data(&self, token: LoadId, abort: CancellationToken) -> Progress {
        let outcome = match self.inner.route.options.loader.clone() {
            Some(loader) => {
                let ctx = LoaderContext {
                    params: self.params().clone(),
                    search: self.route_search(),
                    signal: abort,
                };
                Some(loader.load(ctx).await)
            }
            None => None,
        };

        let now = self.now();
        let mut cell = self.lock();
        if !cell.is_current(token) {
            return Progress::Superseded;
        }

        match outcome {
            Some(Ok(data)) => {
                let shared = replace_equal_deep(&cell.state.route_loader_data, data);
                cell.state.route_loader_data = shared;
                cell.refresh_loader_data();
                cell.state.resolve(now);
            }
            Some(Err(err)) => {
                if cfg!(debug_assertions) {
                    tracing::warn!(match_id = %self.match_id(), error = %err, "route loader failed");
                }
                cell.state.fail(MatchError::Loader(err.into()), now);
            }
            None => cell.state.resolve(now),
        }

        Progress::Continue
    }

    /// Final phase, run once per pipeline
    ///
    /// The current load clears pending/fetching flags and notifies; a
    /// superseded one waits for the newest load instead.
    async fn finish(&self, token: LoadId) {
        let newer = {
            let mut cell = self.lock();
            if cell.is_current(token) {
                cell.cancel_pending();
                cell.state.is_fetching = false;
                None
            } else {
                cell.facet.load_promise.clone()
            }
        };

        match newer {
            Some(newer) => newer.await,
            None => self.notify(),
        }
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("match_id", &self.inner.match_id)
            .field("pathname", &self.inner.pathname)
            .field("params", &self.inner.params)
            .field("state", &self.snapshot())
            .finish()
    }
}
