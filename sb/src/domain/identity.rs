//! Customer identity handed to the widget runtime

use serde::{Deserialize, Serialize};

/// Opaque customer access token
///
/// Never interpreted by the core. `Debug` is redacted so the token does not
/// end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerToken(String);

impl CustomerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CustomerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomerToken(***)")
    }
}

impl From<&str> for CustomerToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Argument to the runtime's `updateCore`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

impl IdentityPayload {
    pub fn for_customer(token: Option<&CustomerToken>) -> Self {
        Self {
            customer: token.map(|t| t.expose().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let token = CustomerToken::new("tok123");
        assert_eq!(format!("{:?}", token), "CustomerToken(***)");
        assert_eq!(token.expose(), "tok123");
    }

    #[test]
    fn test_identity_payload_serialization() {
        let token = CustomerToken::new("tok123");
        let payload = IdentityPayload::for_customer(Some(&token));
        assert_eq!(serde_json::to_value(&payload).unwrap(), serde_json::json!({"customer": "tok123"}));

        let anonymous = IdentityPayload::for_customer(None);
        assert_eq!(serde_json::to_string(&anonymous).unwrap(), "{}");
    }
}
