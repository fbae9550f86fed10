//! Explicit credential context for outgoing requests.

use std::fmt;

/// The bearer credential attached to every request made by an
/// [`ApiClient`](crate::ApiClient).
///
/// A session is handed to the client when it is built; there is no ambient
/// token store. An anonymous session sends no `Authorization` header.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    /// A session without credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session carrying the given bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Value of the `Authorization` header, if any.
    pub fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {t}"))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_no_header() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert!(session.authorization().is_none());
    }

    #[test]
    fn test_bearer_header() {
        let session = Session::bearer("abc");
        assert_eq!(session.authorization().as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", Session::bearer("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }
}
