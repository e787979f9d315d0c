//! Session principal.
//!
//! The principal is resolved once when a session starts and passed explicitly
//! to every component that needs it; nothing looks up the current user from
//! ambient state.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::cart::CartMode;

/// The kind of identity a session runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Signed-in shopper; owns a cart on the backend.
    Customer,
    /// Signed-in employee (admin, technician, seller).
    Staff,
    /// Not signed in.
    Anonymous,
}

impl PrincipalKind {
    /// Get the kind as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::Anonymous => "anonymous",
        }
    }
}

impl std::str::FromStr for PrincipalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "cliente" => Ok(Self::Customer),
            "staff" | "admin" | "employee" => Ok(Self::Staff),
            "anonymous" | "guest" | "" => Ok(Self::Anonymous),
            other => Err(format!("unknown principal kind: {other}")),
        }
    }
}

/// Identity under which a session operates.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct Principal {
    kind: PrincipalKind,
    user_id: Option<String>,
    display_name: Option<String>,
    access_token: Option<SecretString>,
}

impl Principal {
    /// An unauthenticated shopper.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            kind: PrincipalKind::Anonymous,
            user_id: None,
            display_name: None,
            access_token: None,
        }
    }

    /// An authenticated customer holding a backend access token.
    #[must_use]
    pub fn customer(user_id: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            kind: PrincipalKind::Customer,
            user_id: Some(user_id.into()),
            display_name: None,
            access_token: Some(access_token),
        }
    }

    /// An authenticated staff member.
    #[must_use]
    pub fn staff(user_id: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            kind: PrincipalKind::Staff,
            user_id: Some(user_id.into()),
            display_name: None,
            access_token: Some(access_token),
        }
    }

    /// Attach a display name used when greeting the user.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Kind of principal.
    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Backend user identifier, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Display name, if known.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Backend access token, if authenticated.
    #[must_use]
    pub const fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    /// Whether this principal may use the remote cart service.
    #[must_use]
    pub const fn is_customer(&self) -> bool {
        matches!(self.kind, PrincipalKind::Customer) && self.access_token.is_some()
    }

    /// Cart mode implied by this principal.
    #[must_use]
    pub const fn cart_mode(&self) -> CartMode {
        if self.is_customer() {
            CartMode::Remote
        } else {
            CartMode::Local
        }
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("kind", &self.kind)
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_mode_follows_principal() {
        let customer = Principal::customer("u1", SecretString::from("tok"));
        assert_eq!(customer.cart_mode(), CartMode::Remote);

        let staff = Principal::staff("u2", SecretString::from("tok"));
        assert_eq!(staff.cart_mode(), CartMode::Local);

        assert_eq!(Principal::anonymous().cart_mode(), CartMode::Local);
    }

    #[test]
    fn test_principal_debug_redacts_token() {
        let customer = Principal::customer("u1", SecretString::from("super_secret_token"));
        let debug_output = format!("{customer:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token"));
    }

    #[test]
    fn test_principal_kind_from_str() {
        assert_eq!("Customer".parse::<PrincipalKind>(), Ok(PrincipalKind::Customer));
        assert_eq!("guest".parse::<PrincipalKind>(), Ok(PrincipalKind::Anonymous));
        assert!("robot".parse::<PrincipalKind>().is_err());
    }
}
