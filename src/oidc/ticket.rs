//! # Authentication Tickets
//!
//! A [`Ticket`] is the unit every token serializes from and deserializes to:
//! a claims principal plus an authentication-properties bag carrying the
//! protocol context of the originating request (client, redirect URI,
//! resources, scopes, nonce) and the [`Usage`] tag that disambiguates which
//! token kind the ticket represents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known keys in the ticket properties bag.
pub mod items {
    /// The `client_id` of the originating request.
    pub const CLIENT_ID: &str = "client_id";
    /// The `redirect_uri` of the originating request.
    pub const REDIRECT_URI: &str = "redirect_uri";
    /// The whitespace-separated resources granted to the ticket.
    pub const RESOURCE: &str = "resource";
    /// The whitespace-separated scopes granted to the ticket.
    pub const SCOPE: &str = "scope";
    /// The `nonce` of the originating request.
    pub const NONCE: &str = "nonce";
    /// The token kind the ticket represents. See [`Usage`](super::Usage).
    pub const USAGE: &str = "usage";
    /// Marks a ticket issued to a fully authenticated client.
    pub const CONFIDENTIAL: &str = "confidential";
    /// The whitespace-separated audiences of the ticket.
    pub const AUDIENCE: &str = "audience";
}

/// Well-known claim types.
pub mod claims {
    /// Subject identifier.
    pub const SUB: &str = "sub";
    /// Durable identifier assigned by the host's membership system. Used as
    /// the `sub` fallback and always retained during serialization.
    pub const NAME_IDENTIFIER: &str = "name_identifier";
    /// Display name.
    pub const NAME: &str = "name";
    /// Surname.
    pub const FAMILY_NAME: &str = "family_name";
    /// Given name.
    pub const GIVEN_NAME: &str = "given_name";
    /// Birthdate.
    pub const BIRTHDATE: &str = "birthdate";
    /// Email address.
    pub const EMAIL: &str = "email";
    /// Phone number.
    pub const PHONE_NUMBER: &str = "phone_number";
}

/// Claim destinations gate which serialized tokens carry a claim.
pub mod destinations {
    /// The claim is written into access tokens.
    pub const ACCESS_TOKEN: &str = "token";
    /// The claim is written into identity tokens.
    pub const IDENTITY_TOKEN: &str = "id_token";
}

/// The token kind a ticket represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Usage {
    /// An authorization code.
    Code,
    /// An access token.
    AccessToken,
    /// An identity token.
    IdToken,
    /// A refresh token.
    RefreshToken,
}

impl Usage {
    /// The wire form of the usage tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::AccessToken => "access_token",
            Self::IdToken => "id_token",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parse a wire-form usage tag.
    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "code" => Some(Self::Code),
            "access_token" => Some(Self::AccessToken),
            "id_token" => Some(Self::IdToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// A single claim about the authenticated principal.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Claim {
    /// The claim type.
    #[serde(rename = "type")]
    pub claim_type: String,

    /// The claim value.
    pub value: String,

    /// The token kinds this claim may be serialized into. An empty list
    /// restricts the claim to opaque code and refresh tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,
}

impl Claim {
    /// Create a claim with no destinations.
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self { claim_type: claim_type.into(), value: value.into(), destinations: Vec::new() }
    }

    /// Add serialization destinations to the claim.
    #[must_use]
    pub fn with_destinations<I, S>(mut self, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destinations.extend(destinations.into_iter().map(Into::into));
        self
    }

    /// Whether the claim may be serialized into the given destination.
    #[must_use]
    pub fn has_destination(&self, destination: &str) -> bool {
        self.destinations.iter().any(|d| d == destination)
    }
}

/// The authenticated end user: an ordered set of claims.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Principal {
    /// The principal's claims.
    pub claims: Vec<Claim>,
}

impl Principal {
    /// Create a principal with the durable identifier claim set.
    #[must_use]
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self { claims: vec![Claim::new(claims::NAME_IDENTIFIER, identifier)] }
    }

    /// Append a claim.
    #[must_use]
    pub fn claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    /// The first claim of the given type.
    #[must_use]
    pub fn find(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    /// The subject identifier: the `sub` claim, falling back to the durable
    /// name identifier.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.find(claims::SUB)
            .or_else(|| self.find(claims::NAME_IDENTIFIER))
            .map(|c| c.value.as_str())
    }
}

/// Expiry and protocol context attached to a ticket.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Properties {
    /// When the ticket was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_utc: Option<DateTime<Utc>>,

    /// When the ticket expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_utc: Option<DateTime<Utc>>,

    /// Protocol context carried alongside the principal.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub items: HashMap<String, String>,
}

/// The authentication state a token serializes from and deserializes to.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ticket {
    /// The authenticated principal.
    pub principal: Principal,

    /// Expiry and protocol context.
    pub properties: Properties,

    /// The authentication scheme the host signed the principal in with.
    pub auth_scheme: String,
}

impl Ticket {
    /// Create a ticket for the given principal.
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self { principal, properties: Properties::default(), auth_scheme: "oidc-server".to_string() }
    }

    /// The ticket's usage tag.
    #[must_use]
    pub fn usage(&self) -> Option<Usage> {
        self.properties.items.get(items::USAGE).and_then(|v| Usage::from_str(v))
    }

    /// Set the ticket's usage tag.
    pub fn set_usage(&mut self, usage: Usage) {
        self.properties.items.insert(items::USAGE.to_string(), usage.as_str().to_string());
    }

    /// Whether the ticket represents an authorization code.
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.usage() == Some(Usage::Code)
    }

    /// Whether the ticket represents an access token.
    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.usage() == Some(Usage::AccessToken)
    }

    /// Whether the ticket represents an identity token.
    #[must_use]
    pub fn is_id_token(&self) -> bool {
        self.usage() == Some(Usage::IdToken)
    }

    /// Whether the ticket represents a refresh token.
    #[must_use]
    pub fn is_refresh_token(&self) -> bool {
        self.usage() == Some(Usage::RefreshToken)
    }

    /// Whether the ticket originated from a fully authenticated client.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.properties.items.get(items::CONFIDENTIAL).is_some_and(|v| v == "true")
    }

    /// Mark the ticket as originating from a fully authenticated client.
    pub fn set_confidential(&mut self) {
        self.properties.items.insert(items::CONFIDENTIAL.to_string(), "true".to_string());
    }

    /// The `client_id` stored on the ticket.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.properties.items.get(items::CLIENT_ID).map(String::as_str)
    }

    /// The whitespace-separated values of a properties item.
    #[must_use]
    pub fn item_values(&self, key: &str) -> Vec<&str> {
        self.properties
            .items
            .get(key)
            .map_or_else(Vec::new, |v| v.split_whitespace().collect())
    }

    /// The audiences stored on the ticket.
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        self.item_values(items::AUDIENCE)
    }

    /// The scopes stored on the ticket.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.item_values(items::SCOPE)
    }

    /// Whether the ticket carries the given scope.
    #[must_use]
    pub fn has_scope(&self, value: &str) -> bool {
        self.scopes().contains(&value)
    }

    /// Whether the ticket carries the given audience.
    #[must_use]
    pub fn has_audience(&self, value: &str) -> bool {
        self.audiences().contains(&value)
    }

    /// Whether the ticket has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.properties.expires_utc.is_some_and(|expires| expires <= now)
    }
}
