//! # Protocol Messages
//!
//! A [`ProtocolMessage`] is the canonical decoded form of an incoming
//! request: an ordered bag of lowercase parameter names and string values
//! tagged with the request kind, with typed accessors for the parameters the
//! pipeline inspects.
//!
//! Messages also serialize to a versioned binary frame so that authorization
//! requests can be parked in the distributed cache and resumed by the host's
//! login UI.

use bytes::{Buf, BufMut};

use crate::core::urlencode;
use crate::oidc::{Error, Result};

/// Frame layout version written by [`ProtocolMessage::to_frame`].
const FRAME_VERSION: i32 = 1;

/// The kind of protocol request a message was decoded from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestType {
    /// An authorization (authentication) request.
    #[default]
    Authentication,

    /// A token request.
    Token,

    /// A logout request.
    Logout,
}

/// An ordered mapping from lowercase parameter name to string value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtocolMessage {
    /// The kind of request the message was decoded from.
    pub request_type: RequestType,

    params: Vec<(String, String)>,
}

impl ProtocolMessage {
    /// Create an empty message of the given kind.
    #[must_use]
    pub const fn new(request_type: RequestType) -> Self {
        Self { request_type, params: Vec::new() }
    }

    /// Decode a query string or form body into a message.
    #[must_use]
    pub fn from_form(request_type: RequestType, input: &str) -> Self {
        let mut message = Self::new(request_type);
        for (name, value) in urlencode::parse(input) {
            message.params.push((name.to_lowercase(), value));
        }
        message
    }

    /// The value of the named parameter, when present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Set a parameter, replacing an existing value or appending a new pair.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        if let Some(entry) = self.params.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value.into();
        } else {
            self.params.push((name, value.into()));
        }
    }

    /// Whether the named parameter is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    /// Iterate parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The number of parameters in the message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the message carries no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Overlay stored parameters onto this message, keeping live values for
    /// keys already present.
    pub fn merge_stored(&mut self, stored: &Self) {
        for (name, value) in &stored.params {
            if !self.contains(name) {
                self.params.push((name.clone(), value.clone()));
            }
        }
    }

    /// Serialize the message into the versioned binary frame stored in the
    /// continuation cache: `version: i32`, `count: i32`, then `count`
    /// length-prefixed name/value pairs.
    #[must_use]
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.put_i32(FRAME_VERSION);
        frame.put_i32(i32::try_from(self.params.len()).unwrap_or(i32::MAX));
        for (name, value) in &self.params {
            put_string(&mut frame, name);
            put_string(&mut frame, value);
        }
        frame
    }

    /// Deserialize a binary frame produced by [`Self::to_frame`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` when the frame is truncated, carries
    /// an unknown version, or contains malformed UTF-8.
    pub fn from_frame(request_type: RequestType, mut frame: &[u8]) -> Result<Self> {
        if frame.remaining() < 8 {
            return Err(Error::InvalidRequest("truncated request frame".to_string()));
        }
        let version = frame.get_i32();
        if version != FRAME_VERSION {
            return Err(Error::InvalidRequest(format!("unknown frame version: {version}")));
        }
        let count = frame.get_i32();
        if count < 0 {
            return Err(Error::InvalidRequest("malformed request frame".to_string()));
        }

        let mut message = Self::new(request_type);
        for _ in 0..count {
            let name = get_string(&mut frame)?;
            let value = get_string(&mut frame)?;
            message.params.push((name, value));
        }
        Ok(message)
    }
}

fn put_string(frame: &mut Vec<u8>, value: &str) {
    frame.put_u32(u32::try_from(value.len()).unwrap_or(u32::MAX));
    frame.put_slice(value.as_bytes());
}

fn get_string(frame: &mut &[u8]) -> Result<String> {
    if frame.remaining() < 4 {
        return Err(Error::InvalidRequest("truncated request frame".to_string()));
    }
    let len = frame.get_u32() as usize;
    if frame.remaining() < len {
        return Err(Error::InvalidRequest("truncated request frame".to_string()));
    }
    let bytes = frame.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::InvalidRequest("malformed request frame".to_string()))
}

/// Typed accessors for the parameters the pipeline inspects.
impl ProtocolMessage {
    /// `client_id`
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.get("client_id")
    }

    /// `client_secret`
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.get("client_secret")
    }

    /// `redirect_uri`
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.get("redirect_uri")
    }

    /// `response_type`
    #[must_use]
    pub fn response_type(&self) -> Option<&str> {
        self.get("response_type")
    }

    /// `response_mode`
    #[must_use]
    pub fn response_mode(&self) -> Option<&str> {
        self.get("response_mode")
    }

    /// `scope`
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.get("scope")
    }

    /// `resource`
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.get("resource")
    }

    /// `state`
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.get("state")
    }

    /// `nonce`
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.get("nonce")
    }

    /// `grant_type`
    #[must_use]
    pub fn grant_type(&self) -> Option<&str> {
        self.get("grant_type")
    }

    /// `code`
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.get("code")
    }

    /// `refresh_token`
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.get("refresh_token")
    }

    /// `username`
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    /// `password`
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    /// `id_token_hint`
    #[must_use]
    pub fn id_token_hint(&self) -> Option<&str> {
        self.get("id_token_hint")
    }

    /// `access_token`
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.get("access_token")
    }

    /// `token`
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.get("token")
    }

    /// `token_type_hint`
    #[must_use]
    pub fn token_type_hint(&self) -> Option<&str> {
        self.get("token_type_hint")
    }

    /// `post_logout_redirect_uri`
    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> Option<&str> {
        self.get("post_logout_redirect_uri")
    }

    /// `unique_id`
    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        self.get("unique_id")
    }

    /// The whitespace-separated scope values, in request order.
    #[must_use]
    pub fn scope_values(&self) -> Vec<&str> {
        self.scope().map_or_else(Vec::new, |s| s.split_whitespace().collect())
    }

    /// Whether `scope` contains the given value.
    #[must_use]
    pub fn has_scope(&self, value: &str) -> bool {
        self.scope_values().contains(&value)
    }

    /// The whitespace-separated resource values, in request order.
    #[must_use]
    pub fn resource_values(&self) -> Vec<&str> {
        self.resource().map_or_else(Vec::new, |s| s.split_whitespace().collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_lowercased() {
        let message = ProtocolMessage::from_form(RequestType::Token, "Grant_Type=password");
        assert_eq!(message.grant_type(), Some("password"));
    }

    #[test]
    fn merge_keeps_live_values() {
        let mut live = ProtocolMessage::from_form(
            RequestType::Authentication,
            "unique_id=abc&state=live-state",
        );
        let stored = ProtocolMessage::from_form(
            RequestType::Authentication,
            "response_type=code&state=stored-state&client_id=c1",
        );
        live.merge_stored(&stored);

        assert_eq!(live.state(), Some("live-state"));
        assert_eq!(live.response_type(), Some("code"));
        assert_eq!(live.client_id(), Some("c1"));
    }

    #[test]
    fn frame_round_trip() {
        let message = ProtocolMessage::from_form(
            RequestType::Authentication,
            "response_type=code%20id_token&client_id=c1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=xyz",
        );
        let frame = message.to_frame();
        assert_eq!(&frame[..4], &1i32.to_be_bytes()[..]);
        assert_eq!(&frame[4..8], &5i32.to_be_bytes()[..]);

        let restored =
            ProtocolMessage::from_frame(RequestType::Authentication, &frame).expect("valid frame");
        assert_eq!(restored, message);
    }

    #[test]
    fn frame_rejects_bad_version() {
        let message = ProtocolMessage::new(RequestType::Authentication);
        let mut frame = message.to_frame();
        frame[3] = 9;
        assert!(ProtocolMessage::from_frame(RequestType::Authentication, &frame).is_err());
    }

    #[test]
    fn frame_rejects_truncation() {
        let message =
            ProtocolMessage::from_form(RequestType::Authentication, "client_id=c1&scope=openid");
        let frame = message.to_frame();
        assert!(ProtocolMessage::from_frame(RequestType::Authentication, &frame[..frame.len() - 3])
            .is_err());
    }
}
