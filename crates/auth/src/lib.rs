//! `kidbank-auth`: pure authorization boundary.
//!
//! Identity resolution and parent/child linking live outside this crate; they
//! are consumed through [`Actor`] (an already-authenticated caller) and the
//! [`AccessDirectory`] trait. Every mutating bank operation asks one
//! [`Policy`] for a decision instead of re-deriving role checks inline.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AccessDirectory, Action, AuthzError, LinkPolicy, Policy, Resource};
pub use permissions::Permission;
pub use principal::{Actor, ChildLink};
pub use roles::Role;
