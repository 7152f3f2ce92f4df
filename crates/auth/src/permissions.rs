use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier carried on a parent/child link.
///
/// Permissions are opaque strings (e.g. "deposit"). The wildcard `"*"` grants
/// everything a parent may do for the linked child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const DEPOSIT: Permission = Permission::from_static("deposit");
    pub const DEBIT: Permission = Permission::from_static("debit");
    pub const VIEW_TRANSACTIONS: Permission = Permission::from_static("view_transactions");
    pub const EDIT_TRANSACTION: Permission = Permission::from_static("edit_transaction");
    pub const MANAGE_WITHDRAWALS: Permission = Permission::from_static("manage_withdrawals");
    pub const MANAGE_CHILD_SETTINGS: Permission = Permission::from_static("manage_child_settings");
    pub const FREEZE_CHILD: Permission = Permission::from_static("freeze_child");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
