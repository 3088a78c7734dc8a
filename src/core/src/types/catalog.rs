//! User, role, permission and operation catalog types
//!
//! Field names follow the entitlements service's JSON documents, so a
//! transport can deserialize responses straight into these types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

const RATE_LIMITED: &str = "RATE_LIMITED";
const COUNT_LIMITED: &str = "COUNT_LIMITED";

/// Limiting condition attached to an operation or permission
///
/// Serialized as `{"type": "...", ...}`. Unknown types keep their tag and
/// attributes so they serialize back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RestrictionDocument", into = "RestrictionDocument")]
pub enum Restriction {
    /// Usage is bounded by a time window only the remote service can track
    RateLimited,

    /// Usage is bounded by a ceiling granted by the permission
    ///
    /// `count` is `None` when the document carried no numeric ceiling.
    CountLimited { count: Option<Number> },

    /// Restriction type this client does not know about
    Other { kind: String, attributes: Map<String, Value> },
}

#[derive(Serialize, Deserialize)]
struct RestrictionDocument {
    #[serde(rename = "type")]
    kind: String,

    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl From<RestrictionDocument> for Restriction {
    fn from(document: RestrictionDocument) -> Self {
        match document.kind.as_str() {
            RATE_LIMITED => Restriction::RateLimited,
            COUNT_LIMITED => Restriction::CountLimited {
                count: match document.attributes.get("count") {
                    Some(Value::Number(n)) => Some(n.clone()),
                    _ => None,
                },
            },
            _ => Restriction::Other {
                kind: document.kind,
                attributes: document.attributes,
            },
        }
    }
}

impl From<Restriction> for RestrictionDocument {
    fn from(restriction: Restriction) -> Self {
        match restriction {
            Restriction::RateLimited => RestrictionDocument {
                kind: RATE_LIMITED.to_string(),
                attributes: Map::new(),
            },
            Restriction::CountLimited { count } => {
                let mut attributes = Map::new();
                if let Some(count) = count {
                    attributes.insert("count".to_string(), Value::Number(count));
                }
                RestrictionDocument {
                    kind: COUNT_LIMITED.to_string(),
                    attributes,
                }
            }
            Restriction::Other { kind, attributes } => RestrictionDocument { kind, attributes },
        }
    }
}

impl Restriction {
    pub fn count_limited(count: u64) -> Self {
        Restriction::CountLimited {
            count: Some(count.into()),
        }
    }

    /// Restriction of a type this client does not interpret
    pub fn other(kind: impl Into<String>) -> Self {
        Restriction::Other {
            kind: kind.into(),
            attributes: Map::new(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Restriction::RateLimited)
    }

    pub fn is_count_limited(&self) -> bool {
        matches!(self, Restriction::CountLimited { .. })
    }

    /// Ceiling for count-limited restrictions
    pub fn count(&self) -> Option<&Number> {
        match self {
            Restriction::CountLimited { count } => count.as_ref(),
            _ => None,
        }
    }

    /// Wire tag, e.g. `COUNT_LIMITED`
    pub fn kind(&self) -> &str {
        match self {
            Restriction::RateLimited => RATE_LIMITED,
            Restriction::CountLimited { .. } => COUNT_LIMITED,
            Restriction::Other { kind, .. } => kind,
        }
    }
}

/// Catalog-level definition of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation identifier (e.g. "watchlist.exports.csv")
    #[serde(rename = "operation")]
    pub id: String,

    /// Product the operation belongs to
    pub product: String,

    /// Restriction types that apply regardless of role
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
}

impl Operation {
    pub fn new(id: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            product: product.into(),
            restrictions: Vec::new(),
        }
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }
}

/// Role-level grant of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub operation: Operation,

    #[serde(default)]
    pub restrictions: Vec<Restriction>,
}

impl Permission {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            restrictions: Vec::new(),
        }
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    /// At least one restriction, all of them rate-limited
    pub fn is_rate_limited_only(&self) -> bool {
        !self.restrictions.is_empty() && self.restrictions.iter().all(Restriction::is_rate_limited)
    }

    /// At least one restriction, all of them count-limited
    pub fn is_count_limited_only(&self) -> bool {
        !self.restrictions.is_empty() && self.restrictions.iter().all(Restriction::is_count_limited)
    }
}

/// Role assigned to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "role")]
    pub id: String,

    pub context: String,

    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: context.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }
}

/// User identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "user")]
    pub id: String,

    pub context: String,
}

impl User {
    pub fn new(id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: context.into(),
        }
    }
}

/// User together with assigned roles, as returned by the user read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntitlements {
    #[serde(flatten)]
    pub user: User,

    #[serde(default)]
    pub roles: Vec<Role>,
}

impl UserEntitlements {
    pub fn new(user: User) -> Self {
        Self { user, roles: Vec::new() }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }
}
