//! Use cases, one service per area. Each call is one short unit of work against the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Result, ShopError};

pub mod orders;
pub mod promo;
pub mod publisher;
pub mod reviews;
pub mod support;

pub use orders::{CancelOutcome, OrderService, PlaceOrder, PromoRef, StatusUpdate};
pub use promo::{NewPromo, PromoService};
pub use publisher::EventPublisher;
pub use reviews::ReviewService;
pub use support::{ChatView, SupportService};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "CUSTOMER", Self::Admin => "ADMIN" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Ok(Self::Customer),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown role {other}")),
        }
    }
}

/// The authenticated user behind a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn customer(user_id: Uuid) -> Self { Self { user_id, role: Role::Customer } }
    pub fn admin(user_id: Uuid) -> Self { Self { user_id, role: Role::Admin } }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() { Ok(()) } else { Err(ShopError::forbidden()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
        let c = Caller::customer(Uuid::now_v7());
        assert!(matches!(c.require_admin(), Err(ShopError::Forbidden(_))));
        assert!(Caller::admin(Uuid::now_v7()).require_admin().is_ok());
    }
}
