//! # OpenID Connect Authorization Server
//!
//! An embeddable implementation of the protocol endpoints defined by
//! [OpenID Connect Core], [OpenID Connect Discovery], [RFC6749] and
//! [RFC7662]: authorization, token, introspection, userinfo, logout,
//! configuration discovery, and JSON Web Key set.
//!
//! The middleware owns every protocol decision: request decoding, endpoint
//! dispatch, parameter validation, grant processing, token serialization,
//! and response rendering. The host application keeps what is rightfully
//! its own: the login UI, the client store, resource owner credential
//! checks, and consent. The two meet through the
//! [`events::Events`] callback surface and the [`provider::Cache`] storage
//! trait.
//!
//! # Design
//!
//! **Entry points**
//!
//! [`endpoint::handle`] is called for every request the host wants the
//! middleware to see. Requests matching an enabled endpoint are decoded
//! into a [`message::ProtocolMessage`], validated, and either answered
//! directly or handed back to the host as an [`endpoint::Outcome`].
//!
//! Interactive flows resume through [`endpoint::sign_in`] and
//! [`endpoint::sign_out`] once the host has authenticated or signed out the
//! end user. Authorization requests survive the interruption by being
//! parked in the distributed cache under an opaque `unique_id`.
//!
//! **Running**
//!
//! The library works with most Rust HTTP servers with a few lines of
//! wrapper code per endpoint.
//!
//! ```rust,ignore
//! let options = Options::new(&master_key);
//! options.validate()?;
//!
//! // inside the host's request handler
//! match endpoint::handle(&request, &options, &provider).await? {
//!     Outcome::Response(response) => return Ok(response),
//!     Outcome::Continue(message) => {
//!         // authorization endpoint: render the login UI, then
//!         let response = endpoint::sign_in(message, principal, &options, &provider).await?;
//!     }
//!     Outcome::DisplayError(rejection) => { /* render a custom error page */ }
//!     Outcome::Skipped => { /* pass through to the next middleware */ }
//! }
//! ```
//!
//! [OpenID Connect Core]: https://openid.net/specs/openid-connect-core-1_0.html
//! [OpenID Connect Discovery]: https://openid.net/specs/openid-connect-discovery-1_0.html
//! [RFC6749]: https://www.rfc-editor.org/rfc/rfc6749.html
//! [RFC7662]: https://www.rfc-editor.org/rfc/rfc7662.html

pub mod endpoint;
pub mod events;
pub mod message;
pub mod options;
pub mod provider;
pub mod ticket;
pub mod token;
pub mod types;

mod error;
mod handlers;
mod response;
mod state;

pub use error::Error;

/// Result type for protocol processing.
pub type Result<T, E = Error> = std::result::Result<T, E>;
