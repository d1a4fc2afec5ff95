use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buyer" => Some(Role::Buyer),
            "seller" => Some(Role::Seller),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn require_fulfilment_role(&self) -> Result<(), DomainError> {
        match self.role {
            Role::Seller | Role::Admin => Ok(()),
            Role::Buyer => Err(DomainError::forbidden(
                "Only sellers and admins can manage shipments",
            )),
        }
    }

    /// Admins bypass ownership; sellers must own the resource.
    pub fn ensure_owns(&self, seller_id: Uuid) -> Result<(), DomainError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Seller if self.user_id == seller_id => Ok(()),
            _ => Err(DomainError::forbidden(
                "You are not authorised to manage this order",
            )),
        }
    }
}
