//! Group directory and picker installation.
//!
//! The registry is passed into whatever needs to resolve groups by name (the
//! peer RPC server, the front-end API) instead of living in module scope, so
//! a process can host several independent cache universes (tests do).

use super::{Group, Loader};
use crate::peer::{NoPeers, PeerPicker};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

/// Once-installed slot holding the node's peer picker.
///
/// Shared between the registry and every group it creates, so picker
/// registration works whether it happens before or after group creation;
/// each group resolves the slot lazily on its first operation.
pub struct PickerSlot(OnceLock<Arc<dyn PeerPicker>>);

impl PickerSlot {
    fn new() -> Self {
        Self(OnceLock::new())
    }

    fn install(&self, picker: Arc<dyn PeerPicker>) {
        if self.0.set(picker).is_err() {
            panic!("peer picker registered more than once");
        }
    }

    /// The installed picker, or the standalone fallback.
    pub(crate) fn resolve(&self) -> Arc<dyn PeerPicker> {
        self.0
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(NoPeers))
    }
}

/// Directory of groups hosted by this process, keyed by name.
pub struct Registry {
    groups: DashMap<String, Arc<Group>>,
    picker: Arc<PickerSlot>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            groups: DashMap::new(),
            picker: Arc::new(PickerSlot::new()),
        })
    }

    /// Creates and registers a group. Group names are unique per registry;
    /// registering a name twice is a programmer error and panics.
    pub fn new_group(&self, name: &str, cache_bytes: i64, loader: Arc<dyn Loader>) -> Arc<Group> {
        let group = Arc::new(Group::new(
            name,
            cache_bytes,
            loader,
            Arc::clone(&self.picker),
        ));
        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => panic!("duplicate registration of group {}", name),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&group));
            }
        }
        tracing::info!("registered group {:?}", name);
        group
    }

    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Installs the node's peer picker. Must happen before the first
    /// operation on any group that should see peers; calling it twice is a
    /// programmer error and panics.
    pub fn register_picker(&self, picker: Arc<dyn PeerPicker>) {
        self.picker.install(picker);
    }
}
