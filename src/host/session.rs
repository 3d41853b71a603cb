//! Host-side session state
//!
//! A session owns the host object model, the registry of issuer-assigned ids
//! and the current construction target. It lives as long as the daemon and is
//! passed by reference to every handler.
//!
//! Lifecycle of its entries:
//! - the target is replaced by each `init`; the previous context is left as is
//! - registry entries are created by `create` and batch replay (overwriting an
//!   entry with the same id), removed by `remove`, and only read otherwise

use std::collections::HashMap;

use super::error::{DispatchError, DispatchResult};
use super::model::Host;

/// The construction context currently targeted
#[derive(Debug, Clone)]
pub struct Target<C> {
    /// Device name given to `init`
    pub device: String,
    /// Host context handle
    pub context: C,
}

/// Registry plus construction target over a host
pub struct Session<H: Host> {
    host: H,
    target: Option<Target<H::Context>>,
    registry: HashMap<String, H::Object>,
}

impl<H: Host> Session<H> {
    /// Create a session with no target and an empty registry
    pub fn new(host: H) -> Self {
        Self {
            host,
            target: None,
            registry: HashMap::new(),
        }
    }

    /// Host object model
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host object model
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consume the session and return the host
    pub fn into_host(self) -> H {
        self.host
    }

    /// Current target, if `init` has run
    pub fn target(&self) -> Option<&Target<H::Context>> {
        self.target.as_ref()
    }

    /// Current target context, or [`DispatchError::NoContext`]
    pub fn require_context(&self) -> DispatchResult<&H::Context> {
        self.target
            .as_ref()
            .map(|t| &t.context)
            .ok_or(DispatchError::NoContext)
    }

    /// Create a new context and target it
    pub fn open_context(&mut self, device: &str, width: f64, height: f64) -> DispatchResult<()> {
        let context = self.host.create_context(device, width, height)?;
        self.target = Some(Target {
            device: device.to_string(),
            context,
        });
        Ok(())
    }

    /// Instantiate an object in the target context
    pub fn instantiate(
        &mut self,
        class: &str,
        x: f64,
        y: f64,
        args: &[serde_json::Value],
    ) -> DispatchResult<H::Object> {
        let context = self
            .target
            .as_ref()
            .map(|t| &t.context)
            .ok_or(DispatchError::NoContext)?;
        Ok(self.host.instantiate(context, class, x, y, args)?)
    }

    /// Connect two registered objects in the target context
    pub fn connect(
        &mut self,
        source_id: &str,
        outlet: u32,
        dest_id: &str,
        inlet: u32,
    ) -> DispatchResult<()> {
        let (Some(source), Some(dest)) = (self.registry.get(source_id), self.registry.get(dest_id))
        else {
            return Err(DispatchError::WireEndpointMissing);
        };
        let context = self
            .target
            .as_ref()
            .map(|t| &t.context)
            .ok_or(DispatchError::NoContext)?;
        Ok(self.host.connect(context, source, outlet, dest, inlet)?)
    }

    /// Register `object` under `id`, returning any entry it replaced
    pub fn register(&mut self, id: impl Into<String>, object: H::Object) -> Option<H::Object> {
        self.registry.insert(id.into(), object)
    }

    /// Look up a registered object
    pub fn lookup(&self, id: &str) -> Option<&H::Object> {
        self.registry.get(id)
    }

    /// Delete a registered object from the host and drop its entry.
    ///
    /// Returns whether an entry existed. A host that already lost the object
    /// does not stop the entry from being dropped.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(object) = self.registry.remove(id) else {
            return false;
        };
        if let Err(err) = self.host.delete(&object) {
            tracing::warn!(id, error = %err, "host could not delete object");
        }
        true
    }

    /// Number of registered objects
    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// Registered ids, sorted
    pub fn registered_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
