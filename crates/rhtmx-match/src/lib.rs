//! # RHTMX Match - Route match lifecycle
//!
//! Once the router has decided which routes match a location, each match
//! needs its code, content and data loaded. This crate drives that work.
//!
//! ## Features
//!
//! - **Four-state status**: `idle → loading → success | error`, with retries
//!   and background refetches that keep resolved content visible
//! - **Race safety**: overlapping loads are settled by a per-load token; the
//!   newest load always wins and older ones defer to it
//! - **Layered loading**: lazy import, then content slots and data in parallel
//! - **Pending signaling**: a debounced `is_pending` flag with a minimum
//!   display time
//! - **Staleness**: explicit invalidation plus max-age expiry
//! - **Search resolution**: per-route validation with structural sharing
//!
//! ## Example
//!
//! ```rust
//! use rhtmx_match::{RouteDefinition, RouteMatch, RouterContext, RouterOptions, MatchStatus};
//! use serde_json::json;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Arc::new(RouterContext::new(
//!         RouterOptions::default().with_pending_ms(Duration::from_millis(300)),
//!     ));
//!
//!     let route = Arc::new(
//!         RouteDefinition::new("/users/:id")
//!             .with_loader(|ctx| async move { Ok(json!({ "id": ctx.params["id"] })) }),
//!     );
//!
//!     let mut params = HashMap::new();
//!     params.insert("id".to_string(), "42".to_string());
//!
//!     let user = RouteMatch::new(router, route, "/users/42", params);
//!     user.load().await;
//!
//!     assert_eq!(user.status(), MatchStatus::Success);
//!     assert_eq!(*user.route_loader_data(), json!({ "id": "42" }));
//! }
//! ```

pub mod arena;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
mod pending;
pub mod route;
pub mod route_match;
pub mod router;
mod search;
pub mod share;
pub mod state;

pub use arena::{MatchArena, ParentFailurePolicy, ValidationReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MatchConfig, RouteTiming, RouterOptions};
pub use error::MatchError;
pub use id::{LoadId, MatchId};
pub use route::{
    ContentKind, ContentLoader, ContentSet, ContentSlot, Element, ImportContext, Importer,
    Loader, LoaderContext, RouteDefinition, RouteOptions, SearchSchema, SearchValidator,
};
pub use route_match::RouteMatch;
pub use router::{MatchEvent, RouterContext};
pub use state::{MatchState, MatchStatus};
