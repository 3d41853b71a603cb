//! Command payloads and the uniform response envelope
//!
//! Payload structs mirror the JSON documents carried inside the single OSC
//! string argument. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::ADDRESS_PREFIX;

/// Payload key carrying the correlation sequence number
pub const SEQ_KEY: &str = "seq";

/// Address the host replies on
pub const RESPONSE_ADDRESS: &str = "/lofi/response";

/// Supported operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Create and target a new construction context
    Init,
    /// Instantiate one object
    Create,
    /// Connect an outlet to an inlet
    Wire,
    /// Delete an object
    Remove,
    /// Batch-create Z-ordered UI layers
    Ui,
    /// Load engine code from a file into an object
    Inject,
    /// Map a host parameter to an object property
    Map,
}

impl Address {
    /// Every supported address, in dispatch order
    pub const ALL: [Address; 7] = [
        Address::Init,
        Address::Create,
        Address::Wire,
        Address::Remove,
        Address::Ui,
        Address::Inject,
        Address::Map,
    ];

    fn operation(self) -> &'static str {
        match self {
            Address::Init => "init",
            Address::Create => "create",
            Address::Wire => "wire",
            Address::Remove => "remove",
            Address::Ui => "ui",
            Address::Inject => "inject",
            Address::Map => "map",
        }
    }

    /// Full OSC address path (e.g. `/lofi/wire`)
    pub fn path(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ADDRESS_PREFIX}/{}", self.operation())
    }
}

/// Unknown OSC address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAddress(pub String);

impl fmt::Display for UnknownAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown address: {}", self.0)
    }
}

impl std::error::Error for UnknownAddress {}

impl FromStr for Address {
    type Err = UnknownAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(ADDRESS_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|op| Address::ALL.into_iter().find(|a| a.operation() == op))
            .ok_or_else(|| UnknownAddress(s.to_string()))
    }
}

fn default_width() -> f64 {
    600.0
}

fn default_height() -> f64 {
    400.0
}

/// `init` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitDevice {
    /// Name of the device; becomes the sub-context title
    pub device_name: String,
    /// Window width in pixels
    #[serde(default = "default_width")]
    pub width: f64,
    /// Window height in pixels
    #[serde(default = "default_height")]
    pub height: f64,
}

/// `create` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateObject {
    /// Issuer-assigned registry id
    pub id: String,
    /// Host object class (e.g. `cycle~`, `live.dial`)
    pub class: String,
    /// Horizontal position in pixels
    pub x: f64,
    /// Vertical position in pixels
    pub y: f64,
    /// Initialization arguments
    #[serde(default)]
    pub args: Vec<Value>,
}

/// `wire` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireObjects {
    /// Registry id of the source object
    pub source_id: String,
    /// Outlet index on the source (0-based)
    pub outlet: u32,
    /// Registry id of the destination object
    pub dest_id: String,
    /// Inlet index on the destination (0-based)
    pub inlet: u32,
}

/// `remove` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveObject {
    /// Registry id of the object to remove
    pub id: String,
}

/// One UI layer of a batch; `name` may carry a numeric Z-order prefix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Layer name, also used as the registry id
    pub name: String,
    /// Host UI object class
    pub class: String,
    /// Horizontal position in pixels
    pub x: f64,
    /// Vertical position in pixels
    pub y: f64,
    /// Width in pixels
    pub width: f64,
    /// Height in pixels
    pub height: f64,
    /// Initialization arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Attributes applied after creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

/// `ui` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchUi {
    /// Layers in creation order
    #[serde(default)]
    pub layers: Vec<LayerDescriptor>,
}

/// `inject` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectEngine {
    /// Registry id of the script-hosting object
    pub target_id: String,
    /// Absolute path of the code file on the host's disk
    pub file_path: String,
}

/// `map` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapParameter {
    /// Host parameter path
    pub parameter: String,
    /// Registry id of the object to map
    pub object_id: String,
    /// Property name on the object
    pub property: String,
}

/// A typed command: one address plus its payload
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `/lofi/init`
    Init(InitDevice),
    /// `/lofi/create`
    Create(CreateObject),
    /// `/lofi/wire`
    Wire(WireObjects),
    /// `/lofi/remove`
    Remove(RemoveObject),
    /// `/lofi/ui`
    Ui(BatchUi),
    /// `/lofi/inject`
    Inject(InjectEngine),
    /// `/lofi/map`
    Map(MapParameter),
}

impl Command {
    /// Address this command is sent to
    pub fn address(&self) -> Address {
        match self {
            Command::Init(_) => Address::Init,
            Command::Create(_) => Address::Create,
            Command::Wire(_) => Address::Wire,
            Command::Remove(_) => Address::Remove,
            Command::Ui(_) => Address::Ui,
            Command::Inject(_) => Address::Inject,
            Command::Map(_) => Address::Map,
        }
    }

    /// Serialize the payload into a JSON value
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            Command::Init(p) => serde_json::to_value(p),
            Command::Create(p) => serde_json::to_value(p),
            Command::Wire(p) => serde_json::to_value(p),
            Command::Remove(p) => serde_json::to_value(p),
            Command::Ui(p) => serde_json::to_value(p),
            Command::Inject(p) => serde_json::to_value(p),
            Command::Map(p) => serde_json::to_value(p),
        }
    }

    /// Build a typed command from an address and a decoded payload
    pub fn from_parts(address: Address, payload: Value) -> serde_json::Result<Self> {
        Ok(match address {
            Address::Init => Command::Init(serde_json::from_value(payload)?),
            Address::Create => Command::Create(serde_json::from_value(payload)?),
            Address::Wire => Command::Wire(serde_json::from_value(payload)?),
            Address::Remove => Command::Remove(serde_json::from_value(payload)?),
            Address::Ui => Command::Ui(serde_json::from_value(payload)?),
            Address::Inject => Command::Inject(serde_json::from_value(payload)?),
            Address::Map => Command::Map(serde_json::from_value(payload)?),
        })
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Operation succeeded
    Ok,
    /// Operation failed; see `message`
    Error,
}

/// Uniform response envelope emitted once per command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Outcome
    pub status: Status,
    /// Error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Device name (`init`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Object id (`create`, `remove`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Number of layers created (`ui`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<usize>,
    /// Injected object id (`inject`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Injected file path (`inject`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Mapped parameter (`map`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// Echoed correlation sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl Response {
    /// Bare success response
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: None,
            device: None,
            id: None,
            created: None,
            target_id: None,
            file: None,
            parameter: None,
            seq: None,
        }
    }

    /// Error response with a message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// Whether the status is `ok`
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Set the device name
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the object id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the created count
    pub fn with_created(mut self, created: usize) -> Self {
        self.created = Some(created);
        self
    }

    /// Set the injection target and file
    pub fn with_injection(mut self, target_id: impl Into<String>, file: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self.file = Some(file.into());
        self
    }

    /// Set the mapped parameter
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// Set the echoed sequence number
    pub fn with_seq(mut self, seq: Option<u64>) -> Self {
        self.seq = seq;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_address_paths_parse_back() {
        for address in Address::ALL {
            let parsed: Address = address.path().parse().unwrap();
            assert_eq!(parsed, address);
        }
        assert_eq!(Address::Wire.to_string(), "/lofi/wire");
        assert_eq!(Address::Inject.path(), "/lofi/inject");
    }

    #[test]
    fn test_unknown_address() {
        let err = "/lofi/explode".parse::<Address>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown address: /lofi/explode");
        assert!("/other/init".parse::<Address>().is_err());
        assert!("/lofiinit".parse::<Address>().is_err());
    }

    #[test]
    fn test_init_defaults() {
        let command =
            Command::from_parts(Address::Init, json!({"deviceName": "Flutter"})).unwrap();
        match command {
            Command::Init(init) => {
                assert_eq!(init.device_name, "Flutter");
                assert_eq!(init.width, 600.0);
                assert_eq!(init.height, 400.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let command = Command::Wire(WireObjects {
            source_id: "osc".into(),
            outlet: 0,
            dest_id: "dac".into(),
            inlet: 1,
        });
        assert_eq!(
            command.payload().unwrap(),
            json!({"sourceId": "osc", "outlet": 0, "destId": "dac", "inlet": 1})
        );
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let response = Response::ok().with_id("osc");
        let text = serde_json::to_string(&response).unwrap();
        assert_eq!(text, r#"{"status":"ok","id":"osc"}"#);

        let parsed: Response =
            serde_json::from_str(r#"{"status":"error","message":"nope"}"#).unwrap();
        assert!(!parsed.is_ok());
        assert_eq!(parsed.message.as_deref(), Some("nope"));
    }
}
