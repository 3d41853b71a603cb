//! Throttled batch replay
//!
//! A batch arrives as one message holding every layer, already Z-sorted by
//! the issuer. Replay materializes one layer per tick so a large batch never
//! floods the host's UI thread; the daemon spaces ticks by a fixed delay.
//!
//! For `n` layers the replay takes `n + 1` ticks: `n` creations, then one
//! tick that reports completion.

use serde_json::Value;

use super::error::DispatchResult;
use super::model::Host;
use super::session::Session;
use crate::bridge::command::LayerDescriptor;

/// Result of one replay tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStep {
    /// A layer was created and registered under this name
    Created(String),
    /// Every layer exists; carries the total
    Finished(usize),
}

/// Replay state: the layers, the next index, and the request's sequence tag
#[derive(Debug, Clone)]
pub struct BatchReplay {
    layers: Vec<LayerDescriptor>,
    next: usize,
    seq: Option<u64>,
}

impl BatchReplay {
    /// Start a replay over `layers`, in the given order
    pub fn new(layers: Vec<LayerDescriptor>, seq: Option<u64>) -> Self {
        Self {
            layers,
            next: 0,
            seq,
        }
    }

    /// Total number of layers
    pub fn total(&self) -> usize {
        self.layers.len()
    }

    /// Layers created so far
    pub fn created(&self) -> usize {
        self.next
    }

    /// Sequence tag to echo on the final reply
    pub fn seq(&self) -> Option<u64> {
        self.seq
    }

    /// Run one tick: create the next layer, or report completion
    pub fn step<H: Host>(&mut self, session: &mut Session<H>) -> DispatchResult<ReplayStep> {
        let Some(layer) = self.layers.get(self.next) else {
            return Ok(ReplayStep::Finished(self.layers.len()));
        };

        let object = session.instantiate(&layer.class, layer.x, layer.y, &layer.args)?;

        let rect = [
            Value::from(layer.x),
            Value::from(layer.y),
            Value::from(layer.width),
            Value::from(layer.height),
        ];
        let host = session.host_mut();
        host.message(&object, "patching_rect", &rect)?;
        host.message(&object, "presentation", &[Value::from(1)])?;
        host.message(&object, "presentation_rect", &rect)?;

        if let Some(attrs) = &layer.attrs {
            for (name, value) in attrs {
                let args = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                host.message(&object, name, &args)?;
            }
        }

        let name = layer.name.clone();
        session.register(name.clone(), object);
        self.next += 1;
        Ok(ReplayStep::Created(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::model::MemoryHost;
    use serde_json::json;

    fn layer(name: &str, class: &str) -> LayerDescriptor {
        LayerDescriptor {
            name: name.to_string(),
            class: class.to_string(),
            x: 5.0,
            y: 6.0,
            width: 40.0,
            height: 20.0,
            args: Vec::new(),
            attrs: None,
        }
    }

    #[test]
    fn test_one_layer_per_tick() {
        let mut session = Session::new(MemoryHost::new());
        session.open_context("dev", 600.0, 400.0).unwrap();
        let mut replay = BatchReplay::new(
            vec![layer("00_bg", "live.panel"), layer("30_dial", "live.dial")],
            Some(9),
        );

        assert_eq!(
            replay.step(&mut session).unwrap(),
            ReplayStep::Created("00_bg".into())
        );
        assert_eq!(session.registry_len(), 1);
        assert_eq!(
            replay.step(&mut session).unwrap(),
            ReplayStep::Created("30_dial".into())
        );
        assert_eq!(replay.step(&mut session).unwrap(), ReplayStep::Finished(2));
        assert_eq!(replay.created(), 2);
        assert_eq!(replay.seq(), Some(9));
    }

    #[test]
    fn test_geometry_presentation_and_attrs() {
        let mut session = Session::new(MemoryHost::new());
        session.open_context("dev", 600.0, 400.0).unwrap();

        let mut styled = layer("50_label", "comment");
        styled.attrs = Some(
            json!({"bgcolor": [0.2, 0.2, 0.2, 1.0], "text": "Rate"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let mut replay = BatchReplay::new(vec![styled], None);
        replay.step(&mut session).unwrap();

        let handle = *session.lookup("50_label").unwrap();
        let object = session.host().object(&handle).unwrap();
        let selectors: Vec<&str> = object.messages.iter().map(|m| m.selector.as_str()).collect();
        assert_eq!(
            &selectors[..3],
            ["patching_rect", "presentation", "presentation_rect"]
        );
        assert_eq!(
            object.last_message("patching_rect"),
            Some(&[json!(5.0), json!(6.0), json!(40.0), json!(20.0)][..])
        );
        assert_eq!(
            object.last_message("bgcolor"),
            Some(&[json!(0.2), json!(0.2), json!(0.2), json!(1.0)][..])
        );
        assert_eq!(object.last_message("text"), Some(&[json!("Rate")][..]));
    }

    #[test]
    fn test_empty_batch_finishes_immediately() {
        let mut session = Session::new(MemoryHost::new());
        let mut replay = BatchReplay::new(Vec::new(), None);
        assert_eq!(replay.step(&mut session).unwrap(), ReplayStep::Finished(0));
    }

    #[test]
    fn test_host_failure_stops_at_failing_layer() {
        let mut host = MemoryHost::new();
        host.reject_class("bogus");
        let mut session = Session::new(host);
        session.open_context("dev", 600.0, 400.0).unwrap();
        let mut replay =
            BatchReplay::new(vec![layer("00_ok", "live.panel"), layer("10_bad", "bogus")], None);

        replay.step(&mut session).unwrap();
        assert!(replay.step(&mut session).is_err());
        assert_eq!(replay.created(), 1);
    }
}
