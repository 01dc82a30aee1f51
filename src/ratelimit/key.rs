//! Rate limit key generation and handling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A guarded action. Each action is limited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Creating a note
    Create,
    /// Viewing a note
    View,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::View => "view",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key that uniquely identifies a rate limit window.
///
/// The key is composed of the guarded action and the client identity,
/// typically its network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The action being limited
    pub action: Action,
    /// Who is making the request
    pub client: String,
}

impl RateLimitKey {
    /// Create a new key for `client` performing `action`.
    pub fn new(action: Action, client: impl Into<String>) -> Self {
        Self {
            action,
            client: client.into(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_string() {
        let key = RateLimitKey::new(Action::View, "192.168.1.1");
        assert_eq!(key.to_string(), "view:192.168.1.1");
    }

    #[test]
    fn test_key_equality() {
        let a = RateLimitKey::new(Action::Create, "10.0.0.1");
        let b = RateLimitKey::new(Action::Create, "10.0.0.1".to_string());
        let c = RateLimitKey::new(Action::View, "10.0.0.1");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
