use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kidbank_core::{ChildId, UserId};

use crate::{Permission, Role};

/// An authenticated caller, as resolved by the identity layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Admin(UserId),
    Parent(UserId),
    Child(ChildId),
}

impl Actor {
    pub fn role(&self) -> Role {
        match self {
            Actor::Admin(_) => Role::Admin,
            Actor::Parent(_) => Role::Parent,
            Actor::Child(_) => Role::Child,
        }
    }

    /// The user id for parent/admin callers.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::Admin(id) | Actor::Parent(id) => Some(*id),
            Actor::Child(_) => None,
        }
    }

    /// Raw identifier recorded as a transaction's `initiator_id`.
    pub fn initiator_uuid(&self) -> Uuid {
        match self {
            Actor::Admin(id) | Actor::Parent(id) => *id.as_uuid(),
            Actor::Child(id) => *id.as_uuid(),
        }
    }
}

/// A parent's link to a child: what they may do for that child.
///
/// Owners implicitly hold every permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildLink {
    pub user_id: UserId,
    pub child_id: ChildId,
    pub permissions: Vec<Permission>,
    pub is_owner: bool,
}

impl ChildLink {
    pub fn owner(user_id: UserId, child_id: ChildId) -> Self {
        Self {
            user_id,
            child_id,
            permissions: Vec::new(),
            is_owner: true,
        }
    }

    pub fn shared(user_id: UserId, child_id: ChildId, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            child_id,
            permissions,
            is_owner: false,
        }
    }

    pub fn grants(&self, required: &Permission) -> bool {
        self.is_owner
            || self
                .permissions
                .iter()
                .any(|p| p.is_wildcard() || p == required)
    }
}
