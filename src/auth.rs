//! Resolving the acting user of a request.

use base64::Engine;

use crate::{Error, Result};

/// The user on whose behalf a request runs. Anonymous when no username is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Principal {
    username: Option<String>,
}

impl Principal {
    /// The unauthenticated principal.
    pub fn anonymous() -> Self {
        Principal { username: None }
    }

    /// A principal with a known username.
    pub fn named(username: impl Into<String>) -> Self {
        Principal {
            username: Some(username.into()),
        }
    }

    /// Get the username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Whether no username is known.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }
}

/// Authentication facts the transport layer knows about a request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// User already authenticated by the surrounding server, if any.
    pub remote_user: Option<String>,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
}

impl RequestContext {
    /// Create an empty (anonymous) context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transport-authenticated user.
    pub fn with_remote_user(mut self, user: impl Into<String>) -> Self {
        self.remote_user = Some(user.into());
        self
    }

    /// Set the `Authorization` header.
    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    /// Set an `Authorization: Basic` header for the given credentials.
    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        let credentials = format!("{}:{}", username, password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        self.with_authorization(format!("Basic {}", encoded))
    }

    /// Resolve the principal for this request.
    pub fn principal(&self) -> Result<Principal> {
        resolve_principal(self.remote_user.as_deref(), self.authorization.as_deref())
    }
}

/// Resolve the principal from the transport user and the `Authorization` header.
///
/// The transport user wins; the header is only inspected without one.
pub fn resolve_principal(remote_user: Option<&str>, authorization: Option<&str>) -> Result<Principal> {
    if let Some(user) = remote_user {
        return Ok(Principal::named(user));
    }
    match authorization {
        None => Ok(Principal::anonymous()),
        Some(header) if header.trim().is_empty() => Ok(Principal::anonymous()),
        Some(header) => basic_auth_username(header).map(|name| match name {
            Some(name) => Principal::named(name),
            None => Principal::anonymous(),
        }),
    }
}

/// Extract the username from a `Basic` authorization header.
///
/// Returns `None` when the credentials carry an empty username.
fn basic_auth_username(header: &str) -> Result<Option<String>> {
    let header = header.trim();
    let (scheme, credentials) = match header.split_once(' ') {
        Some((scheme, rest)) => (scheme, rest.trim()),
        None => (header, ""),
    };

    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(Error::validation(format!(
            "Only 'Basic' authentication is allowed, not {}",
            scheme
        )));
    }

    let invalid = || Error::validation(format!("Not in valid Base64 scheme: {}", credentials));
    if credentials.is_empty() {
        return Err(invalid());
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(credentials)
        .map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;

    // Passwords may contain ':', usernames may not.
    let username = match decoded.split_once(':') {
        Some((user, _password)) => user,
        None => decoded.as_str(),
    };

    if username.is_empty() {
        Ok(None)
    } else {
        Ok(Some(username.to_string()))
    }
}
