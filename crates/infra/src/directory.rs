use std::collections::HashMap;
use std::sync::RwLock;

use kidbank_auth::{AccessDirectory, ChildLink};
use kidbank_core::{ChildId, UserId};

/// In-memory parent/child link table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccessDirectory {
    links: RwLock<HashMap<(UserId, ChildId), ChildLink>>,
}

impl InMemoryAccessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, link: ChildLink) {
        if let Ok(mut links) = self.links.write() {
            links.insert((link.user_id, link.child_id), link);
        }
    }

    pub fn revoke(&self, user_id: UserId, child_id: ChildId) {
        if let Ok(mut links) = self.links.write() {
            links.remove(&(user_id, child_id));
        }
    }
}

impl AccessDirectory for InMemoryAccessDirectory {
    fn link(&self, user_id: UserId, child_id: ChildId) -> Option<ChildLink> {
        let links = self.links.read().ok()?;
        links.get(&(user_id, child_id)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_links_disappear() {
        let directory = InMemoryAccessDirectory::new();
        let parent = UserId::new();
        let child = ChildId::new();

        directory.grant(ChildLink::owner(parent, child));
        assert!(directory.link(parent, child).is_some_and(|l| l.is_owner));

        directory.revoke(parent, child);
        assert!(directory.link(parent, child).is_none());
    }
}
