//! Host-side command dispatcher
//!
//! Routes each decoded message by address to its handler and produces exactly
//! one reply per request. Every failure, including undecodable datagrams, is
//! converted into an error reply so malformed input never takes the host down.
//!
//! Batch (`ui`) requests are deferred: the dispatcher starts a
//! [`BatchReplay`] and the final reply is produced by [`Dispatcher::tick`].

use serde_json::Value;

use super::error::{DispatchError, DispatchResult};
use super::model::Host;
use super::replay::{BatchReplay, ReplayStep};
use super::session::Session;
use crate::bridge::codec;
use crate::bridge::command::{
    Address, BatchUi, Command, CreateObject, InitDevice, InjectEngine, MapParameter, RemoveObject,
    Response, SEQ_KEY, WireObjects,
};

/// What the daemon should do after handling a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send this reply now
    Reply(Response),
    /// A batch replay started; its reply comes from a later tick
    Deferred,
}

/// Dispatcher over a session
pub struct Dispatcher<H: Host> {
    session: Session<H>,
    replay: Option<BatchReplay>,
}

impl<H: Host> Dispatcher<H> {
    /// Create a dispatcher with a fresh session over `host`
    pub fn new(host: H) -> Self {
        Self {
            session: Session::new(host),
            replay: None,
        }
    }

    /// Session state
    pub fn session(&self) -> &Session<H> {
        &self.session
    }

    /// Consume the dispatcher and return its session
    pub fn into_session(self) -> Session<H> {
        self.session
    }

    /// Whether a batch replay is running
    pub fn replay_active(&self) -> bool {
        self.replay.is_some()
    }

    /// Handle one raw datagram
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Outcome {
        match codec::decode(bytes) {
            Ok(inbound) => self.handle(&inbound.address, inbound.payload),
            Err(err) => {
                tracing::warn!(error = %err, "undecodable command");
                Outcome::Reply(Response::error(DispatchError::from(err).to_string()))
            }
        }
    }

    /// Handle one decoded message
    pub fn handle(&mut self, address: &str, payload: Value) -> Outcome {
        let seq = payload.get(SEQ_KEY).and_then(Value::as_u64);
        tracing::debug!(address, payload = %payload, "dispatch");

        match self.dispatch(address, payload, seq) {
            Ok(Outcome::Reply(response)) => Outcome::Reply(response.with_seq(seq)),
            Ok(Outcome::Deferred) => Outcome::Deferred,
            Err(err) => {
                tracing::warn!(address, error = %err, "command failed");
                Outcome::Reply(Response::error(err.to_string()).with_seq(seq))
            }
        }
    }

    /// Advance the running replay by one tick.
    ///
    /// Returns the batch's final reply when it completes or fails.
    pub fn tick(&mut self) -> Option<Response> {
        let replay = self.replay.as_mut()?;
        match replay.step(&mut self.session) {
            Ok(ReplayStep::Created(name)) => {
                tracing::debug!(layer = %name, created = replay.created(), total = replay.total(), "layer created");
                None
            }
            Ok(ReplayStep::Finished(created)) => {
                let seq = replay.seq();
                self.replay = None;
                tracing::info!(created, "batch replay finished");
                Some(Response::ok().with_created(created).with_seq(seq))
            }
            Err(err) => {
                let created = replay.created();
                let seq = replay.seq();
                self.replay = None;
                tracing::warn!(created, error = %err, "batch replay aborted");
                Some(
                    Response::error(err.to_string())
                        .with_created(created)
                        .with_seq(seq),
                )
            }
        }
    }

    fn dispatch(
        &mut self,
        address: &str,
        payload: Value,
        seq: Option<u64>,
    ) -> DispatchResult<Outcome> {
        let address: Address = address.parse()?;
        let command = Command::from_parts(address, payload)?;

        let response = match command {
            Command::Init(p) => self.cmd_init(p)?,
            Command::Create(p) => self.cmd_create(p)?,
            Command::Wire(p) => self.cmd_wire(p)?,
            Command::Remove(p) => self.cmd_remove(p),
            Command::Ui(p) => {
                self.cmd_ui(p, seq)?;
                return Ok(Outcome::Deferred);
            }
            Command::Inject(p) => self.cmd_inject(p)?,
            Command::Map(p) => self.cmd_map(p),
        };
        Ok(Outcome::Reply(response))
    }

    fn cmd_init(&mut self, params: InitDevice) -> DispatchResult<Response> {
        self.session
            .open_context(&params.device_name, params.width, params.height)?;
        tracing::info!(device = %params.device_name, "device initialized");
        Ok(Response::ok().with_device(params.device_name))
    }

    fn cmd_create(&mut self, params: CreateObject) -> DispatchResult<Response> {
        let object = self
            .session
            .instantiate(&params.class, params.x, params.y, &params.args)?;
        if self.session.register(params.id.clone(), object).is_some() {
            tracing::debug!(id = %params.id, "registry entry replaced");
        }
        Ok(Response::ok().with_id(params.id))
    }

    fn cmd_wire(&mut self, params: WireObjects) -> DispatchResult<Response> {
        self.session.require_context()?;
        self.session.connect(
            &params.source_id,
            params.outlet,
            &params.dest_id,
            params.inlet,
        )?;
        Ok(Response::ok())
    }

    fn cmd_remove(&mut self, params: RemoveObject) -> Response {
        if !self.session.remove(&params.id) {
            tracing::debug!(id = %params.id, "remove of unknown id");
        }
        Response::ok().with_id(params.id)
    }

    fn cmd_ui(&mut self, params: BatchUi, seq: Option<u64>) -> DispatchResult<()> {
        self.session.require_context()?;
        if self.replay.is_some() {
            return Err(DispatchError::ReplayInProgress);
        }
        tracing::info!(layers = params.layers.len(), "batch replay started");
        self.replay = Some(BatchReplay::new(params.layers, seq));
        Ok(())
    }

    fn cmd_inject(&mut self, params: InjectEngine) -> DispatchResult<Response> {
        let target = self
            .session
            .lookup(&params.target_id)
            .cloned()
            .ok_or(DispatchError::InjectTargetMissing)?;
        self.session
            .host_mut()
            .message(&target, "compile", &[Value::from(params.file_path.as_str())])?;
        Ok(Response::ok().with_injection(params.target_id, params.file_path))
    }

    // Acknowledge-only until mapping semantics are defined.
    fn cmd_map(&mut self, params: MapParameter) -> Response {
        tracing::debug!(parameter = %params.parameter, object = %params.object_id, property = %params.property, "map acknowledged");
        Response::ok().with_parameter(params.parameter)
    }
}
