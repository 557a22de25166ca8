//! The device registry: authoritative lifecycle state.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use upnp_device::DeviceData;

/// Owns every known root device tree.
///
/// Lookup is a linear scan with recursive descent, the registry never holds
/// more than a handful of devices. The `announced` set remembers which roots
/// have fired their added-notification so readiness rechecks after later
/// SCPD fetches do not announce twice.
pub struct DeviceRegistry {
    roots: Vec<DeviceData>,
    announced: HashSet<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            announced: HashSet::new(),
        }
    }

    pub fn roots(&self) -> &[DeviceData] {
        &self.roots
    }

    /// Find a device by identifier, descending into embedded devices.
    /// With `return_root` a match on an embedded device yields its root.
    pub fn find(&self, uuid: &str, return_root: bool) -> Option<&DeviceData> {
        for root in &self.roots {
            if root.uuid == uuid {
                return Some(root);
            }
            if let Some(embedded) = root.find_embedded(uuid) {
                return Some(if return_root { root } else { embedded });
            }
        }
        None
    }

    /// Mutable root lookup (roots only, not embedded devices).
    pub fn find_root_mut(&mut self, uuid: &str) -> Option<&mut DeviceData> {
        self.roots.iter_mut().find(|root| root.uuid == uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.find(uuid, false).is_some()
    }

    /// Register a new root device shell. Identifiers are unique; a known
    /// identifier is rejected.
    pub fn add(&mut self, device: DeviceData) -> bool {
        if self.contains(&device.uuid) {
            return false;
        }
        self.roots.push(device);
        true
    }

    /// Reset the lease clock of the root owning `uuid`. Returns false when
    /// the identifier is unknown.
    pub fn renew_lease(&mut self, uuid: &str, lease: Duration) -> bool {
        let root_uuid = match self.find(uuid, true) {
            Some(root) => root.uuid.clone(),
            None => return false,
        };
        if let Some(root) = self.find_root_mut(&root_uuid) {
            root.renew_lease(lease);
        }
        true
    }

    /// Detach the subtree rooted at `uuid` (the whole root tree when `uuid`
    /// names a root, otherwise the embedded subtree) and return it.
    pub fn remove(&mut self, uuid: &str) -> Option<DeviceData> {
        let detached = if let Some(pos) = self.roots.iter().position(|root| root.uuid == uuid) {
            Some(self.roots.swap_remove(pos))
        } else {
            self.roots
                .iter_mut()
                .find_map(|root| detach_embedded(root, uuid))
        };

        if let Some(tree) = &detached {
            let mut order = Vec::new();
            tree.visit_root_first(&mut order);
            for device in order {
                self.announced.remove(&device.uuid);
            }
        }
        detached
    }

    /// Root identifiers whose lease has expired twice over.
    pub fn expired(&self, now: Instant) -> Vec<String> {
        self.roots
            .iter()
            .filter(|root| root.lease_expired(now))
            .map(|root| root.uuid.clone())
            .collect()
    }

    /// Record that a root's added-notification has fired. Returns true the
    /// first time only.
    pub fn mark_announced(&mut self, root_uuid: &str) -> bool {
        self.announced.insert(root_uuid.to_string())
    }

    pub fn clear(&mut self) {
        self.roots.clear();
        self.announced.clear();
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn detach_embedded(parent: &mut DeviceData, uuid: &str) -> Option<DeviceData> {
    if let Some(pos) = parent.embedded.iter().position(|child| child.uuid == uuid) {
        return Some(parent.embedded.swap_remove(pos));
    }
    parent
        .embedded
        .iter_mut()
        .find_map(|child| detach_embedded(child, uuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn shell(uuid: &str) -> DeviceData {
        DeviceData::new_shell(
            uuid,
            Url::parse("http://10.0.0.5/desc.xml").unwrap(),
            Duration::from_secs(1800),
        )
    }

    fn tree() -> DeviceData {
        let mut root = shell("root");
        let mut mid = shell("mid");
        mid.embedded.push(shell("leaf"));
        root.embedded.push(mid);
        root
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.add(shell("abc")));
        assert!(!registry.add(shell("abc")));
        assert_eq!(registry.roots().len(), 1);
    }

    #[test]
    fn test_find_with_return_root() {
        let mut registry = DeviceRegistry::new();
        registry.add(tree());

        assert_eq!(registry.find("leaf", false).unwrap().uuid, "leaf");
        assert_eq!(registry.find("leaf", true).unwrap().uuid, "root");
        assert!(registry.find("missing", true).is_none());
        assert_eq!(registry.find("mid", false).unwrap().uuid, "mid");
    }

    #[test]
    fn test_renew_lease_via_embedded_identifier() {
        let mut registry = DeviceRegistry::new();
        registry.add(tree());
        let before = registry.find("root", false).unwrap().last_renewed;

        assert!(registry.renew_lease("leaf", Duration::from_secs(900)));
        let root = registry.find("root", false).unwrap();
        assert!(root.last_renewed >= before);
        assert_eq!(root.lease, Duration::from_secs(900));

        assert!(!registry.renew_lease("missing", Duration::from_secs(900)));
    }

    #[test]
    fn test_remove_root_detaches_tree() {
        let mut registry = DeviceRegistry::new();
        registry.add(tree());
        registry.mark_announced("root");

        let detached = registry.remove("root").unwrap();
        assert_eq!(detached.uuid, "root");
        assert!(registry.find("leaf", false).is_none());
        // a re-added root announces again
        assert!(registry.mark_announced("root"));
    }

    #[test]
    fn test_remove_embedded_subtree() {
        let mut registry = DeviceRegistry::new();
        registry.add(tree());

        let detached = registry.remove("mid").unwrap();
        assert_eq!(detached.uuid, "mid");
        assert_eq!(detached.embedded.len(), 1);
        assert!(registry.find("root", false).is_some());
        assert!(registry.find("leaf", false).is_none());
    }

    #[test]
    fn test_expired_roots() {
        let mut registry = DeviceRegistry::new();
        let mut device = shell("abc");
        device.lease = Duration::from_secs(10);
        let start = device.last_renewed;
        registry.add(device);

        assert!(registry.expired(start + Duration::from_secs(19)).is_empty());
        assert_eq!(
            registry.expired(start + Duration::from_secs(21)),
            vec!["abc".to_string()]
        );
    }

    #[test]
    fn test_mark_announced_once() {
        let mut registry = DeviceRegistry::new();
        registry.add(shell("abc"));
        assert!(registry.mark_announced("abc"));
        assert!(!registry.mark_announced("abc"));
    }
}
