//! Route definitions as seen by a match
//!
//! The matcher owns the route tree; a match only needs the pieces below:
//! the data loader, the lazy importer, four content slots, the search
//! validator and timing overrides.

use crate::config::RouteTiming;
use crate::route_match::RouteMatch;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Collaborator callables
// ============================================================================

/// Input handed to a data loader
#[derive(Debug, Clone)]
pub struct LoaderContext {
    pub params: HashMap<String, String>,
    /// This route's own validated search
    pub search: Arc<Value>,
    /// Fires when the match is cancelled; loaders are expected to check it
    pub signal: CancellationToken,
}

/// Input handed to an importer
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub params: HashMap<String, String>,
}

/// Loads route data
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, ctx: LoaderContext) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> Loader for F
where
    F: Fn(LoaderContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn load(&self, ctx: LoaderContext) -> anyhow::Result<Value> {
        (self)(ctx).await
    }
}

/// Lazily imports additional route content
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, ctx: ImportContext) -> anyhow::Result<ContentSet>;
}

#[async_trait]
impl<F, Fut> Importer for F
where
    F: Fn(ImportContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ContentSet>> + Send + 'static,
{
    async fn import(&self, ctx: ImportContext) -> anyhow::Result<ContentSet> {
        (self)(ctx).await
    }
}

/// Produces a content slot on demand
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn resolve(&self, route_match: RouteMatch) -> anyhow::Result<Element>;
}

#[async_trait]
impl<F, Fut> ContentLoader for F
where
    F: Fn(RouteMatch) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Element>> + Send + 'static,
{
    async fn resolve(&self, route_match: RouteMatch) -> anyhow::Result<Element> {
        (self)(route_match).await
    }
}

/// Schema-style search validator exposing `parse`
pub trait SearchSchema: Send + Sync {
    fn parse(&self, search: &Value) -> anyhow::Result<Value>;
}

type SearchTransform = dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync;

/// A route's search validator: a bare transform or a schema object
#[derive(Clone)]
pub enum SearchValidator {
    Transform(Arc<SearchTransform>),
    Schema(Arc<dyn SearchSchema>),
}

impl SearchValidator {
    pub fn validate(&self, search: &Value) -> anyhow::Result<Value> {
        match self {
            SearchValidator::Transform(transform) => transform(search),
            SearchValidator::Schema(schema) => schema.parse(search),
        }
    }
}

impl fmt::Debug for SearchValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchValidator::Transform(_) => f.write_str("SearchValidator::Transform"),
            SearchValidator::Schema(_) => f.write_str("SearchValidator::Schema"),
        }
    }
}

// ============================================================================
// Content
// ============================================================================

/// Framework-agnostic rendered content
#[derive(Clone)]
pub struct Element(Arc<dyn Any + Send + Sync>);

impl Element {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Element(..)")
    }
}

/// The four named content slots of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Element,
    ErrorElement,
    CatchElement,
    PendingElement,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Element,
        ContentKind::ErrorElement,
        ContentKind::CatchElement,
        ContentKind::PendingElement,
    ];
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Element => write!(f, "element"),
            ContentKind::ErrorElement => write!(f, "error_element"),
            ContentKind::CatchElement => write!(f, "catch_element"),
            ContentKind::PendingElement => write!(f, "pending_element"),
        }
    }
}

/// Configured value of a content slot
#[derive(Clone)]
pub enum ContentSlot {
    Static(Element),
    Lazy(Arc<dyn ContentLoader>),
}

impl ContentSlot {
    pub fn lazy<F, Fut>(resolve: F) -> Self
    where
        F: Fn(RouteMatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Element>> + Send + 'static,
    {
        ContentSlot::Lazy(Arc::new(resolve))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, ContentSlot::Lazy(_))
    }
}

impl fmt::Debug for ContentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSlot::Static(element) => f.debug_tuple("Static").field(element).finish(),
            ContentSlot::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Resolved content, one optional element per slot
///
/// Also the shape an importer returns; merging only overwrites slots the
/// other set actually carries.
#[derive(Debug, Clone, Default)]
pub struct ContentSet {
    pub element: Option<Element>,
    pub error_element: Option<Element>,
    pub catch_element: Option<Element>,
    pub pending_element: Option<Element>,
}

impl ContentSet {
    pub fn get(&self, kind: ContentKind) -> Option<&Element> {
        match kind {
            ContentKind::Element => self.element.as_ref(),
            ContentKind::ErrorElement => self.error_element.as_ref(),
            ContentKind::CatchElement => self.catch_element.as_ref(),
            ContentKind::PendingElement => self.pending_element.as_ref(),
        }
    }

    pub fn set(&mut self, kind: ContentKind, element: Element) {
        let slot = match kind {
            ContentKind::Element => &mut self.element,
            ContentKind::ErrorElement => &mut self.error_element,
            ContentKind::CatchElement => &mut self.catch_element,
            ContentKind::PendingElement => &mut self.pending_element,
        };
        *slot = Some(element);
    }

    pub fn with(mut self, kind: ContentKind, element: Element) -> Self {
        self.set(kind, element);
        self
    }

    pub fn merge(&mut self, imported: ContentSet) {
        if let Some(element) = imported.element {
            self.element = Some(element);
        }
        if let Some(element) = imported.error_element {
            self.error_element = Some(element);
        }
        if let Some(element) = imported.catch_element {
            self.catch_element = Some(element);
        }
        if let Some(element) = imported.pending_element {
            self.pending_element = Some(element);
        }
    }
}

// ============================================================================
// Route definition
// ============================================================================

/// Loading configuration of a route
#[derive(Clone, Default)]
pub struct RouteOptions {
    pub loader: Option<Arc<dyn Loader>>,
    pub importer: Option<Arc<dyn Importer>>,
    pub element: Option<ContentSlot>,
    pub error_element: Option<ContentSlot>,
    pub catch_element: Option<ContentSlot>,
    pub pending_element: Option<ContentSlot>,
    pub validate_search: Option<SearchValidator>,
    pub timing: RouteTiming,
}

impl RouteOptions {
    pub fn slot(&self, kind: ContentKind) -> Option<&ContentSlot> {
        match kind {
            ContentKind::Element => self.element.as_ref(),
            ContentKind::ErrorElement => self.error_element.as_ref(),
            ContentKind::CatchElement => self.catch_element.as_ref(),
            ContentKind::PendingElement => self.pending_element.as_ref(),
        }
    }

    /// True when anything asynchronous has to run before the route is ready
    pub fn has_loaders(&self) -> bool {
        self.loader.is_some()
            || self.importer.is_some()
            || ContentKind::ALL
                .iter()
                .any(|kind| self.slot(*kind).is_some_and(ContentSlot::is_lazy))
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("loader", &self.loader.is_some())
            .field("importer", &self.importer.is_some())
            .field("element", &self.element)
            .field("error_element", &self.error_element)
            .field("catch_element", &self.catch_element)
            .field("pending_element", &self.pending_element)
            .field("validate_search", &self.validate_search)
            .field("timing", &self.timing)
            .finish()
    }
}

/// A route as handed over by the matcher
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    /// Route template like "/users/:id"
    pub id: String,
    pub options: RouteOptions,
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: RouteOptions::default(),
        }
    }

    pub fn with_loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.options.loader = Some(Arc::new(loader));
        self
    }

    pub fn with_loader_impl(mut self, loader: Arc<dyn Loader>) -> Self {
        self.options.loader = Some(loader);
        self
    }

    pub fn with_importer<F, Fut>(mut self, importer: F) -> Self
    where
        F: Fn(ImportContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ContentSet>> + Send + 'static,
    {
        self.options.importer = Some(Arc::new(importer));
        self
    }

    pub fn with_content(mut self, kind: ContentKind, slot: ContentSlot) -> Self {
        let target = match kind {
            ContentKind::Element => &mut self.options.element,
            ContentKind::ErrorElement => &mut self.options.error_element,
            ContentKind::CatchElement => &mut self.options.catch_element,
            ContentKind::PendingElement => &mut self.options.pending_element,
        };
        *target = Some(slot);
        self
    }

    pub fn with_element(self, slot: ContentSlot) -> Self {
        self.with_content(ContentKind::Element, slot)
    }

    pub fn with_search_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.options.validate_search = Some(SearchValidator::Transform(Arc::new(validator)));
        self
    }

    pub fn with_search_schema(mut self, schema: impl SearchSchema + 'static) -> Self {
        self.options.validate_search = Some(SearchValidator::Schema(Arc::new(schema)));
        self
    }

    pub fn with_pending_ms(mut self, delay: Duration) -> Self {
        self.options.timing.pending_ms = Some(delay);
        self
    }

    pub fn with_pending_min_ms(mut self, minimum: Duration) -> Self {
        self.options.timing.pending_min_ms = Some(minimum);
        self
    }

    pub fn with_loader_max_age(mut self, max_age: Duration) -> Self {
        self.options.timing.loader_max_age = Some(max_age);
        self
    }

    pub fn has_loaders(&self) -> bool {
        self.options.has_loaders()
    }
}
