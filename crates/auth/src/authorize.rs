use std::sync::Arc;

use thiserror::Error;

use kidbank_core::{ChildId, UserId};

use crate::{Actor, ChildLink, Permission};

/// An operation a caller wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ProvisionChild,
    Deposit,
    Debit,
    /// Supply a caller-chosen transaction timestamp.
    Backdate,
    ViewLedger,
    EditTransaction,
    ManageRates,
    ManageWithdrawals,
    RequestWithdrawal,
    CancelWithdrawal,
    FreezeChild,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ProvisionChild => "provision_child",
            Action::Deposit => "deposit",
            Action::Debit => "debit",
            Action::Backdate => "backdate",
            Action::ViewLedger => "view_ledger",
            Action::EditTransaction => "edit_transaction",
            Action::ManageRates => "manage_rates",
            Action::ManageWithdrawals => "manage_withdrawals",
            Action::RequestWithdrawal => "request_withdrawal",
            Action::CancelWithdrawal => "cancel_withdrawal",
            Action::FreezeChild => "freeze_child",
        }
    }

    /// Link permission a non-owner parent needs for this action.
    ///
    /// `None` means any link to the child suffices.
    pub fn required_permission(&self) -> Option<Permission> {
        match self {
            Action::Deposit => Some(Permission::DEPOSIT),
            Action::Debit => Some(Permission::DEBIT),
            Action::ViewLedger => Some(Permission::VIEW_TRANSACTIONS),
            Action::EditTransaction => Some(Permission::EDIT_TRANSACTION),
            Action::ManageRates => Some(Permission::MANAGE_CHILD_SETTINGS),
            Action::ManageWithdrawals => Some(Permission::MANAGE_WITHDRAWALS),
            Action::FreezeChild => Some(Permission::FREEZE_CHILD),
            Action::ProvisionChild | Action::Backdate => None,
            Action::RequestWithdrawal | Action::CancelWithdrawal => None,
        }
    }

    /// Actions only the child themselves may perform.
    pub fn is_child_self_service(&self) -> bool {
        matches!(self, Action::RequestWithdrawal | Action::CancelWithdrawal)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// A child that does not exist yet (provisioning).
    NewChild,
    /// An existing child and everything it owns (accounts, ledger, requests).
    Child(ChildId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The parent has no link to the child; surfaced as not-found by callers.
    #[error("caller is not linked to child {0}")]
    NotLinked(ChildId),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Source of parent/child links (external collaborator).
pub trait AccessDirectory: Send + Sync {
    fn link(&self, user_id: UserId, child_id: ChildId) -> Option<ChildLink>;
}

impl<D> AccessDirectory for Arc<D>
where
    D: AccessDirectory + ?Sized,
{
    fn link(&self, user_id: UserId, child_id: ChildId) -> Option<ChildLink> {
        (**self).link(user_id, child_id)
    }
}

/// Single policy-evaluation seam consumed by every bank operation.
pub trait Policy: Send + Sync {
    fn authorize(&self, actor: &Actor, action: Action, resource: Resource) -> Result<(), AuthzError>;
}

impl<P> Policy for Arc<P>
where
    P: Policy + ?Sized,
{
    fn authorize(&self, actor: &Actor, action: Action, resource: Resource) -> Result<(), AuthzError> {
        (**self).authorize(actor, action, resource)
    }
}

/// Default policy: admins may do everything except child self-service,
/// parents act through their link to the child, children act on themselves.
///
/// - No IO beyond the directory lookup
/// - No panics
/// - No business rules (balances, request state); those live in the ledger
#[derive(Debug, Clone)]
pub struct LinkPolicy<D> {
    directory: D,
}

impl<D> LinkPolicy<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }
}

impl<D> Policy for LinkPolicy<D>
where
    D: AccessDirectory,
{
    fn authorize(&self, actor: &Actor, action: Action, resource: Resource) -> Result<(), AuthzError> {
        let decision = decide(&self.directory, actor, action, resource);
        if let Err(e) = &decision {
            tracing::debug!(role = %actor.role(), action = %action, "authorization denied: {e}");
        }
        decision
    }
}

fn decide<D: AccessDirectory>(
    directory: &D,
    actor: &Actor,
    action: Action,
    resource: Resource,
) -> Result<(), AuthzError> {
    match (actor, resource) {
        (_, Resource::NewChild) => match actor {
            Actor::Admin(_) | Actor::Parent(_) if action == Action::ProvisionChild => Ok(()),
            _ => Err(AuthzError::Forbidden(format!(
                "{} may not {}",
                actor.role(),
                action
            ))),
        },

        (Actor::Child(me), Resource::Child(child_id)) => {
            let allowed = matches!(
                action,
                Action::ViewLedger | Action::RequestWithdrawal | Action::CancelWithdrawal
            );
            if *me == child_id && allowed {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(format!("child may not {action}")))
            }
        }

        (_, Resource::Child(_)) if action.is_child_self_service() => Err(AuthzError::Forbidden(
            format!("only the child may {action}"),
        )),

        (Actor::Admin(_), Resource::Child(_)) => Ok(()),

        (Actor::Parent(user_id), Resource::Child(child_id)) => {
            let link = directory
                .link(*user_id, child_id)
                .ok_or(AuthzError::NotLinked(child_id))?;
            match action.required_permission() {
                Some(required) if !link.grants(&required) => Err(AuthzError::Forbidden(format!(
                    "missing permission '{required}'"
                ))),
                _ => Ok(()),
            }
        }
    }
}
