//! Descriptions peers exchange about themselves and their credentials.

use serde::{Deserialize, Serialize};

/// Self-description a peer sends with every named-method call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KiteDescriptor {
    pub username: String,
    pub environment: String,
    pub name: String,
    pub version: String,
    pub region: String,
    pub hostname: String,
    pub id: String,
}

impl std::fmt::Display for KiteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.name, self.version, self.username)
    }
}

/// Credentials sent with every request.
///
/// The core routes on the type string only; `kiteKey` and `token` are the
/// canonical types recognized by the surrounding collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub key: String,
}

impl Authentication {
    pub fn new(auth_type: impl Into<String>, key: impl Into<String>) -> Self {
        Authentication {
            auth_type: auth_type.into(),
            key: key.into(),
        }
    }
}

/// The decoded first argument of a named-method call. The `withArgs` and
/// `responseCallback` members are extracted separately from the stamped
/// argument tree so reconstructed callbacks inside them stay invokable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CallOptions {
    pub kite: KiteDescriptor,
    pub authentication: Option<Authentication>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn authentication_wire_shape() {
        let auth = Authentication::new("token", "abc123");
        assert_eq!(
            serde_json::to_value(&auth).unwrap(),
            json!({"type": "token", "key": "abc123"})
        );
    }

    #[test]
    fn descriptor_tolerates_missing_fields() {
        let kite: KiteDescriptor =
            serde_json::from_value(json!({"name": "mathworker", "username": "alice"})).unwrap();
        assert_eq!(kite.name, "mathworker");
        assert_eq!(kite.username, "alice");
        assert_eq!(kite.version, "");
    }
}
