//! Line-delimited JSON tool service over the bridge.
//!
//! This module exposes the issuer-facing tool catalog: each request line names
//! a tool and its parameters, is translated into exactly one bridge call, and
//! gets exactly one response line. Requests are processed sequentially, so at
//! most one bridge call is in flight.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::bridge::command::{
    BatchUi, Command, CreateObject, InitDevice, InjectEngine, MapParameter, RemoveObject,
    WireObjects,
};
use crate::bridge::error::BridgeError;
use crate::bridge::zorder::sort_by_z_index;
use crate::bridge::Bridge;

/// A tool exposed to the issuer's caller
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolInfo {
    /// Tool name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
}

/// The tool catalog
pub const TOOLS: &[ToolInfo] = &[
    ToolInfo {
        name: "init_device",
        description: "Initialize a new device by creating a named sub-patcher. Must be called before any other tool.",
    },
    ToolInfo {
        name: "max_create_object",
        description: "Create an object at specific coordinates in the target device patcher",
    },
    ToolInfo {
        name: "max_wire_objects",
        description: "Connect two objects in the target patcher with a patch cord",
    },
    ToolInfo {
        name: "max_remove_object",
        description: "Remove an object from the target patcher and delete it from the daemon registry",
    },
    ToolInfo {
        name: "batch_create_ui",
        description: "Batch create Z-sorted UI elements. Layers are sorted by numeric prefix (lowest = bottom of visual stack) and sent as a single payload.",
    },
    ToolInfo {
        name: "import_figma_ui",
        description: "Batch import Z-sorted UI elements from design-tool layer data. Layers are sorted by numeric prefix and sent as a single payload.",
    },
    ToolInfo {
        name: "inject_engine_code",
        description: "Load a JavaScript file from disk into a v8/js object. Sends the file path, never raw code.",
    },
    ToolInfo {
        name: "map_live_api",
        description: "Map a Live API parameter to an object in the target patcher",
    },
];

/// Tool service: wraps a [`Bridge`] and writes responses to a writer.
pub struct ToolService {
    bridge: Bridge,
}

impl ToolService {
    /// Create a new service around an (ideally opened) bridge
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    /// Underlying bridge
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Consume requests from the reader until EOF, writing one response per line
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(&line).await;
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    /// Handle one request line
    pub async fn handle_line(&mut self, line: &str) -> ResponseEnvelope {
        match serde_json::from_str::<RequestEnvelope>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => {
                ResponseEnvelope::from_error(Value::Null, ServiceError::Parse(err.to_string()))
            }
        }
    }

    async fn handle_request(&mut self, request: RequestEnvelope) -> ResponseEnvelope {
        match self.dispatch(&request.command, request.params).await {
            Ok(value) => ResponseEnvelope::success(request.id, value),
            Err(err) => ResponseEnvelope::from_error(request.id, err),
        }
    }

    /// Run a single tool or service command
    pub async fn call(&mut self, command: &str, params: Value) -> Result<Value, ServiceError> {
        self.dispatch(command, params).await
    }

    async fn dispatch(&mut self, command: &str, params: Value) -> Result<Value, ServiceError> {
        let command = match command {
            "list_tools" => return Ok(json!({ "tools": TOOLS })),
            "status" => return Ok(serde_json::to_value(self.bridge.status()).unwrap_or_default()),
            "init_device" => Command::Init(parse_params::<InitDevice>(params)?),
            "max_create_object" => Command::Create(parse_params::<CreateObject>(params)?),
            "max_wire_objects" => Command::Wire(parse_params::<WireObjects>(params)?),
            "max_remove_object" => Command::Remove(parse_params::<RemoveObject>(params)?),
            "batch_create_ui" | "import_figma_ui" => {
                let batch = parse_params::<BatchUi>(params)?;
                Command::Ui(BatchUi {
                    layers: sort_by_z_index(batch.layers),
                })
            }
            "inject_engine_code" => Command::Inject(parse_params::<InjectEngine>(params)?),
            "map_live_api" => Command::Map(parse_params::<MapParameter>(params)?),
            other => return Err(ServiceError::Unsupported(other.to_string())),
        };

        let response = self.bridge.call(&command).await?;
        Ok(serde_json::to_value(response).unwrap_or_default())
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, ServiceError> {
    serde_json::from_value(params).map_err(|err| ServiceError::InvalidParams(err.to_string()))
}

/// Service-level failures
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Request line was not a valid envelope
    #[error("{0}")]
    Parse(String),
    /// Parameters did not match the tool's schema
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// No such tool or command
    #[error("Command '{0}' is not supported")]
    Unsupported(String),
    /// The bridge call failed
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ServiceError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Parse(_) => "parse_error",
            ServiceError::InvalidParams(_) => "invalid_params",
            ServiceError::Unsupported(_) => "unsupported_command",
            ServiceError::Bridge(err) => err.code(),
        }
    }
}

#[derive(Deserialize)]
struct RequestEnvelope {
    #[serde(default)]
    id: Value,
    command: String,
    #[serde(default)]
    params: Value,
}

/// One response line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    /// Echoed request id
    pub id: Value,
    /// Result on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl ResponseEnvelope {
    fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn from_error(id: Value, error: ServiceError) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorEnvelope::from(error)),
        }
    }
}

/// Structured error carried in a response line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl From<ServiceError> for ErrorEnvelope {
    fn from(error: ServiceError) -> Self {
        ErrorEnvelope {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}
