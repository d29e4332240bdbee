//! Authenticated principals and their roles.

use common::PrincipalId;
use serde::{Deserialize, Serialize};

/// Capability attached to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Staff,
    WarehouseAdmin,
    SystemAdmin,
}

impl Role {
    /// Roles allowed to progress and cancel orders.
    pub const STAFF: &'static [Role] = &[Role::Staff, Role::WarehouseAdmin, Role::SystemAdmin];

    pub fn is_staff(&self) -> bool {
        Self::STAFF.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Staff => "staff",
            Role::WarehouseAdmin => "warehouse_admin",
            Role::SystemAdmin => "system_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "staff" => Ok(Role::Staff),
            "warehouse_admin" => Ok(Role::WarehouseAdmin),
            "system_admin" => Ok(Role::SystemAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: PrincipalId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn customer(id: PrincipalId) -> Self {
        Self::new(id, Role::Customer)
    }

    /// Returns true if the principal holds one of `roles`.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Owners may read their own orders; staff may read any order.
    pub fn can_view_order_of(&self, owner: PrincipalId) -> bool {
        self.id == owner || self.role.is_staff()
    }
}
