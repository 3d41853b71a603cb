//! Host object model
//!
//! The host application owns the real object graph. The dispatcher only talks
//! to it through the [`Host`] trait: create a construction context,
//! instantiate objects in it, connect, delete and message them.
//!
//! [`MemoryHost`] is a complete in-memory implementation used by the
//! simulated host daemon and by tests.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use super::error::{HostError, HostResult};

/// The host's object graph, as seen by the dispatcher
pub trait Host {
    /// Handle to a construction context (a sub-patcher)
    type Context: Clone + fmt::Debug;

    /// Handle to a host-native object; identifies its own context
    type Object: Clone + fmt::Debug;

    /// Create a named sub-context and bring it to front
    fn create_context(&mut self, name: &str, width: f64, height: f64) -> HostResult<Self::Context>;

    /// Instantiate `class` at (x, y) inside `context`
    fn instantiate(
        &mut self,
        context: &Self::Context,
        class: &str,
        x: f64,
        y: f64,
        args: &[Value],
    ) -> HostResult<Self::Object>;

    /// Connect `source`'s outlet to `dest`'s inlet
    fn connect(
        &mut self,
        context: &Self::Context,
        source: &Self::Object,
        outlet: u32,
        dest: &Self::Object,
        inlet: u32,
    ) -> HostResult<()>;

    /// Delete an object and its connections
    fn delete(&mut self, object: &Self::Object) -> HostResult<()>;

    /// Send a message (`selector args...`) to an object
    fn message(&mut self, object: &Self::Object, selector: &str, args: &[Value]) -> HostResult<()>;
}

/// Index of a patcher inside a [`MemoryHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PatcherId(pub usize);

impl fmt::Display for PatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patcher-{}", self.0)
    }
}

/// Handle to an object inside a [`MemoryHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectRef {
    /// Patcher holding the object
    pub patcher: PatcherId,
    /// Object identity
    pub id: Uuid,
}

/// A message received by an object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedMessage {
    /// Message selector
    pub selector: String,
    /// Message arguments
    pub args: Vec<Value>,
}

/// An object box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryObject {
    /// Object identity
    pub id: Uuid,
    /// Object class
    pub class: String,
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
    /// Creation arguments
    pub args: Vec<Value>,
    /// Messages received since creation, oldest first
    pub messages: Vec<ReceivedMessage>,
}

impl MemoryObject {
    /// Arguments of the most recent message with `selector`
    pub fn last_message(&self, selector: &str) -> Option<&[Value]> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.selector == selector)
            .map(|m| m.args.as_slice())
    }
}

/// A patch cord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Connection {
    /// Source object
    pub source: Uuid,
    /// Source outlet
    pub outlet: u32,
    /// Destination object
    pub dest: Uuid,
    /// Destination inlet
    pub inlet: u32,
}

/// A sub-patcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryPatcher {
    /// Title
    pub name: String,
    /// Window width
    pub width: f64,
    /// Window height
    pub height: f64,
    /// Objects in creation order (first = bottom of the visual stack)
    pub objects: Vec<MemoryObject>,
    /// Patch cords
    pub connections: Vec<Connection>,
}

impl MemoryPatcher {
    /// Look up an object by identity
    pub fn object(&self, id: Uuid) -> Option<&MemoryObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Object classes in creation order
    pub fn classes(&self) -> Vec<&str> {
        self.objects.iter().map(|o| o.class.as_str()).collect()
    }
}

/// In-memory host object graph
#[derive(Debug, Default)]
pub struct MemoryHost {
    patchers: Vec<MemoryPatcher>,
    front: Option<PatcherId>,
    rejected_classes: HashSet<String>,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `class` fail to instantiate, as an unknown class would
    pub fn reject_class(&mut self, class: impl Into<String>) {
        self.rejected_classes.insert(class.into());
    }

    /// All patchers ever created, in creation order
    pub fn patchers(&self) -> &[MemoryPatcher] {
        &self.patchers
    }

    /// Look up a patcher
    pub fn patcher(&self, id: PatcherId) -> Option<&MemoryPatcher> {
        self.patchers.get(id.0)
    }

    /// Patcher currently in front
    pub fn front(&self) -> Option<PatcherId> {
        self.front
    }

    /// Resolve an object handle
    pub fn object(&self, object: &ObjectRef) -> Option<&MemoryObject> {
        self.patcher(object.patcher)?.object(object.id)
    }

    fn patcher_mut(&mut self, id: PatcherId) -> HostResult<&mut MemoryPatcher> {
        self.patchers
            .get_mut(id.0)
            .ok_or_else(|| HostError::UnknownContext(id.to_string()))
    }

    fn object_mut(&mut self, object: &ObjectRef) -> HostResult<&mut MemoryObject> {
        self.patcher_mut(object.patcher)?
            .objects
            .iter_mut()
            .find(|o| o.id == object.id)
            .ok_or_else(|| HostError::StaleObject(object.id.to_string()))
    }
}

impl Host for MemoryHost {
    type Context = PatcherId;
    type Object = ObjectRef;

    fn create_context(&mut self, name: &str, width: f64, height: f64) -> HostResult<PatcherId> {
        let id = PatcherId(self.patchers.len());
        self.patchers.push(MemoryPatcher {
            name: name.to_string(),
            width,
            height,
            objects: Vec::new(),
            connections: Vec::new(),
        });
        self.front = Some(id);
        Ok(id)
    }

    fn instantiate(
        &mut self,
        context: &PatcherId,
        class: &str,
        x: f64,
        y: f64,
        args: &[Value],
    ) -> HostResult<ObjectRef> {
        if class.trim().is_empty() || self.rejected_classes.contains(class) {
            return Err(HostError::Rejected(format!("cannot create object '{class}'")));
        }

        let patcher = self.patcher_mut(*context)?;
        let id = Uuid::new_v4();
        patcher.objects.push(MemoryObject {
            id,
            class: class.to_string(),
            x,
            y,
            args: args.to_vec(),
            messages: Vec::new(),
        });

        Ok(ObjectRef {
            patcher: *context,
            id,
        })
    }

    fn connect(
        &mut self,
        context: &PatcherId,
        source: &ObjectRef,
        outlet: u32,
        dest: &ObjectRef,
        inlet: u32,
    ) -> HostResult<()> {
        if source.patcher != *context || dest.patcher != *context {
            return Err(HostError::Rejected(
                "cannot connect objects outside the target patcher".into(),
            ));
        }

        let patcher = self.patcher_mut(*context)?;
        for end in [source, dest] {
            if patcher.object(end.id).is_none() {
                return Err(HostError::StaleObject(end.id.to_string()));
            }
        }

        patcher.connections.push(Connection {
            source: source.id,
            outlet,
            dest: dest.id,
            inlet,
        });
        Ok(())
    }

    fn delete(&mut self, object: &ObjectRef) -> HostResult<()> {
        let patcher = self.patcher_mut(object.patcher)?;
        let before = patcher.objects.len();
        patcher.objects.retain(|o| o.id != object.id);
        if patcher.objects.len() == before {
            return Err(HostError::StaleObject(object.id.to_string()));
        }
        patcher
            .connections
            .retain(|c| c.source != object.id && c.dest != object.id);
        Ok(())
    }

    fn message(&mut self, object: &ObjectRef, selector: &str, args: &[Value]) -> HostResult<()> {
        self.object_mut(object)?.messages.push(ReceivedMessage {
            selector: selector.to_string(),
            args: args.to_vec(),
        });
        Ok(())
    }
}
