//! Hierarchical URI-template resource matching for Ariadne.
//!
//! Resources form a tree. Each resource carries a [`PathTemplate`] relative
//! to its parent, a [`MethodRouter`] with its handlers, static children and
//! optionally a locator producing a sub-resource at match time.
//!
//! # Features
//!
//! - **Templates**: literals, `{param}`, regex-constrained `{param: \d+}`,
//!   catch-all `*rest`
//! - **Specificity**: siblings are tried most specific first; equally
//!   specific templates keep declaration order
//! - **Backtracking**: a failed subtree rolls back its captures and the next
//!   sibling is tried
//! - **405 detection**: a path served for other methods reports them
//!
//! # Example
//!
//! ```rust
//! use ariadne_router::{Resource, ResourceRouter};
//! use http::Method;
//!
//! let router = ResourceRouter::new().with_resource(
//!     Resource::builder("/users")
//!         .get("listUsers")
//!         .child(Resource::builder("/me").get("currentUser"))
//!         .child(Resource::builder("/{id}").get("getUser"))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let found = router.route(&Method::GET, "/users/me").into_match().unwrap();
//! assert_eq!(found.handler, "currentUser");
//!
//! let found = router.route(&Method::GET, "/users/123").into_match().unwrap();
//! assert_eq!(found.handler, "getUser");
//! assert_eq!(found.params.get("id"), Some("123"));
//! ```
//!
//! # Matching
//!
//! ```text
//!                 (root resources, most specific first)
//!                    │
//!                 "/users"  ──────────── GET listUsers
//!                    │
//!            ┌───────┴───────┐
//!          "/me"          "/{id}"
//!       GET currentUser  GET getUser
//! ```

#![doc(html_root_url = "https://docs.rs/ariadne-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method_router;
mod params;
mod resource;
mod router;
mod template;

pub use error::{RouteError, RouteResult};
pub use method_router::MethodRouter;
pub use params::Params;
pub use resource::{Locator, Resource, ResourceBuilder};
pub use router::{ResourceRouter, RouteMatch, RouteOutcome, MAX_LOCATOR_DEPTH};
pub use template::{PathTemplate, Segment, Specificity};
