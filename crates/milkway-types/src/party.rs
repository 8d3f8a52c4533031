//! Party identifiers and actor roles

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique customer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub Uuid);

impl CustomerId {
    /// Create a new random customer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a customer ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CustomerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique vendor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub Uuid);

impl VendorId {
    /// Create a new random vendor ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a vendor ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for VendorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for VendorId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique milkman identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilkmanId(pub Uuid);

impl MilkmanId {
    /// Create a new random milkman ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a milkman ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for MilkmanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MilkmanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MilkmanId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique product identifier (cow milk, buffalo milk, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub Uuid);

impl ProductId {
    /// Create a new random product ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a product ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProductId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Role of a verified identity
///
/// The fulfillment engine trusts the role it is handed; credential checks
/// happen upstream in the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Subscribes to deliveries
    Customer,
    /// Owns delivery calendars and milkmen
    Vendor,
    /// Reports delivery events from the field
    Milkman,
    /// Full access, including manual reconciliation
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Milkman => write!(f, "milkman"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "milkman" => Ok(Self::Milkman),
            "admin" => Ok(Self::Admin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Error parsing a role string
#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

/// A verified identity acting on the fulfillment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity of the actor in its own directory (customer, vendor, ...)
    pub id: Uuid,
    /// Role the directory vouched for
    pub role: Role,
}

impl Actor {
    /// Construct an actor from a verified identity
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Shorthand for an administrator actor
    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}
