// Resource lifecycle management
//
// Display resources (the image preview and the annotated detection output) are
// ephemeral references to in-memory payloads. Every reference is created here,
// owned by exactly one slot or caller, and released exactly once.

use indexmap::IndexMap;
use indexmap::map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Logical places a display resource can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The locally selected image, shown before detection
    Preview,
    /// The annotated image returned by the detection service
    Output,
}

/// Copyable identity of a handle, used for events and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owned reference to a registered payload.
///
/// Not `Clone`: releasing consumes the handle, so the same handle cannot be
/// released twice.
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceHandle {
    id: HandleId,
    url: String,
}

impl ResourceHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Local display URL for the payload, e.g. `blob:ppewatch/3`.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Resource handle {0} has already been released")]
    Released(HandleId),
}

/// Backing store for live payloads plus create/release accounting.
#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    live: HashMap<HandleId, Arc<[u8]>>,
    created: u64,
    released: u64,
}

impl Registry {
    fn create(&mut self, payload: Arc<[u8]>) -> ResourceHandle {
        self.next_id += 1;
        let id = HandleId(self.next_id);
        self.live.insert(id, payload);
        self.created += 1;

        tracing::debug!("Created resource handle {}", id);

        ResourceHandle {
            id,
            url: format!("blob:ppewatch/{}", id.0),
        }
    }

    fn release(&mut self, handle: ResourceHandle) {
        if self.live.remove(&handle.id).is_some() {
            self.released += 1;
            tracing::debug!("Released resource handle {}", handle.id);
        } else {
            // A handle from another manager, or one already revoked
            tracing::warn!("Release of unknown resource handle {} ignored", handle.id);
        }
    }
}

/// Creates and revokes display resources, holding at most one handle per [`Slot`].
///
/// # Usage
///
/// Controllers go through [`replace()`](Self::replace) and [`clear()`](Self::clear)
/// for slotted resources so the previous handle is always revoked in the same
/// step that supersedes it. [`create()`](Self::create) and
/// [`release()`](Self::release) are for transient resources the caller owns.
#[derive(Debug, Default)]
pub struct ResourceLifecycleManager {
    registry: Registry,
    slots: IndexMap<Slot, ResourceHandle>,
}

impl ResourceLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and hand ownership of its handle to the caller.
    #[must_use = "dropping a handle without releasing it leaks the resource"]
    pub fn create(&mut self, payload: impl Into<Arc<[u8]>>) -> ResourceHandle {
        self.registry.create(payload.into())
    }

    /// Revoke a caller-owned handle. Unknown handles are a no-op.
    pub fn release(&mut self, handle: ResourceHandle) {
        self.registry.release(handle);
    }

    /// Install a handle for `payload` in `slot`, revoking the slot's previous handle.
    ///
    /// Old and new handle are never both live, nor both absent, once this returns.
    pub fn replace(&mut self, slot: Slot, payload: impl Into<Arc<[u8]>>) -> &ResourceHandle {
        let handle = self.registry.create(payload.into());

        match self.slots.entry(slot) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(handle);
                self.registry.release(previous);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(handle),
        }
    }

    /// Revoke the slot's handle, if any. Returns whether something was released.
    pub fn clear(&mut self, slot: Slot) -> bool {
        match self.slots.shift_remove(&slot) {
            Some(handle) => {
                self.registry.release(handle);
                true
            }
            None => false,
        }
    }

    /// Revoke every slotted handle. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let handles: Vec<ResourceHandle> = self.slots.drain(..).map(|(_, handle)| handle).collect();
        let count = handles.len();
        for handle in handles {
            self.registry.release(handle);
        }
        count
    }

    pub fn current(&self, slot: Slot) -> Option<&ResourceHandle> {
        self.slots.get(&slot)
    }

    /// Payload behind a handle, for rendering.
    pub fn resolve(&self, handle: &ResourceHandle) -> Result<&[u8], ResourceError> {
        self.registry
            .live
            .get(&handle.id)
            .map(|bytes| bytes.as_ref())
            .ok_or(ResourceError::Released(handle.id))
    }

    /// Payload currently displayed in `slot`.
    pub fn resolve_slot(&self, slot: Slot) -> Option<&[u8]> {
        let handle = self.slots.get(&slot)?;
        self.resolve(handle).ok()
    }

    /// Number of handles created and not yet released.
    pub fn live_count(&self) -> usize {
        self.registry.live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.registry.created
    }

    pub fn released_count(&self) -> u64 {
        self.registry.released
    }
}

impl ResourceLifecycleManager {
    /// Release every slotted handle and report caller-owned handles still live.
    ///
    /// # Returns
    /// `(released, leaked)`
    pub fn shutdown(&mut self) -> (usize, usize) {
        let slotted = self.slots.len();
        let leaked = self.registry.live.len().saturating_sub(slotted);
        if slotted > 0 {
            tracing::debug!("Releasing {} slotted resource(s) on shutdown", slotted);
            self.release_all();
        }
        if leaked > 0 {
            tracing::warn!("{} resource handle(s) were never released", leaked);
        }
        (slotted, leaked)
    }
}

impl Drop for ResourceLifecycleManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
