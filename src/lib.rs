//! An embeddable OpenID Connect 1.0 / OAuth 2.0 authorization server
//! middleware based on [OpenID Connect Core](https://openid.net/specs/openid-connect-core-1_0.html)
//! and [RFC6749](https://www.rfc-editor.org/rfc/rfc6749.html).
//!
//! The crate terminates the protocol endpoints (authorization, token,
//! introspection, userinfo, logout, discovery, and JWKS) on behalf of a
//! host web application, which remains responsible for user
//! authentication, client persistence, and consent. See the [`oidc`]
//! module for the full design.

pub mod core;
pub mod oidc;

/// Re-export basic types.
pub use crate::oidc::{Error, Result};
