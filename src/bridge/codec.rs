//! Single-string OSC wire format
//!
//! The host splits OSC arguments on commas, so a structured payload is never
//! spread over several arguments. The whole payload is serialized to JSON and
//! carried as exactly one OSC string argument.

use rosc::{OscMessage, OscPacket, OscType};
use serde::Serialize;
use serde_json::{Number, Value};

use super::error::{CodecError, CodecResult};

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM: usize = 65_507;

/// An outbound message: address plus one JSON text argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// OSC address path
    pub address: String,
    /// Complete JSON serialization of the payload
    pub argument: String,
}

impl WireMessage {
    /// Serialize `payload` into a single-argument message
    pub fn encode<T: Serialize + ?Sized>(address: &str, payload: &T) -> CodecResult<Self> {
        Ok(Self {
            address: address.to_string(),
            argument: serde_json::to_string(payload)?,
        })
    }

    /// Encode as an OSC packet ready for a datagram
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let packet = OscPacket::Message(OscMessage {
            addr: self.address.clone(),
            args: vec![OscType::String(self.argument.clone())],
        });
        rosc::encoder::encode(&packet).map_err(|err| CodecError::Encode(format!("{err:?}")))
    }
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// OSC address path
    pub address: String,
    /// Decoded payload
    pub payload: Value,
}

/// Encode `payload` for `address` straight to datagram bytes
pub fn encode<T: Serialize + ?Sized>(address: &str, payload: &T) -> CodecResult<Vec<u8>> {
    WireMessage::encode(address, payload)?.to_bytes()
}

/// Decode one datagram into its address and payload
pub fn decode(bytes: &[u8]) -> CodecResult<Inbound> {
    let (_rest, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|err| CodecError::Decode(format!("{err:?}")))?;

    match packet {
        OscPacket::Message(message) => Ok(Inbound {
            payload: decode_message(&message)?,
            address: message.addr,
        }),
        OscPacket::Bundle(_) => Err(CodecError::Bundle),
    }
}

/// Decode the payload argument of a message.
///
/// Some hosts emit the JSON text itself as the address with no arguments;
/// that form is accepted too.
pub fn decode_message(message: &OscMessage) -> CodecResult<Value> {
    match message.args.first() {
        Some(argument) => decode_argument(argument),
        None if message.addr.trim_start().starts_with('{') => {
            Ok(serde_json::from_str(&message.addr)?)
        }
        None => Err(CodecError::MissingArgument(message.addr.clone())),
    }
}

/// Decode a single argument.
///
/// JSON text is parsed; scalar arguments that some senders emit unquoted are
/// accepted as already-parsed values.
pub fn decode_argument(argument: &OscType) -> CodecResult<Value> {
    match argument {
        OscType::String(text) => Ok(serde_json::from_str(text)?),
        OscType::Int(n) => Ok(Value::from(*n)),
        OscType::Long(n) => Ok(Value::from(*n)),
        OscType::Float(f) => Ok(float_value(f64::from(*f))),
        OscType::Double(f) => Ok(float_value(*f)),
        OscType::Bool(b) => Ok(Value::Bool(*b)),
        OscType::Nil => Ok(Value::Null),
        other => Err(CodecError::UnsupportedArgument(format!("{other:?}"))),
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delimiters_survive_round_trip() {
        let payload = json!({
            "id": "label,1",
            "class": "comment",
            "args": ["rate: 1/4, dotted", 3, {"k": "a:b,c"}],
            "x": 10.5,
            "y": 20
        });

        let bytes = encode("/lofi/create", &payload).unwrap();
        let inbound = decode(&bytes).unwrap();

        assert_eq!(inbound.address, "/lofi/create");
        assert_eq!(inbound.payload, payload);
    }

    #[test]
    fn test_single_string_argument() {
        let message = WireMessage::encode("/lofi/map", &json!({"a": 1, "b": 2})).unwrap();
        let bytes = message.to_bytes().unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&bytes).unwrap();
        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.args.len(), 1);
                assert_eq!(msg.args[0], OscType::String(message.argument.clone()));
            }
            OscPacket::Bundle(_) => panic!("expected a message"),
        }
    }

    #[test]
    fn test_malformed_text_is_a_decode_error() {
        let packet = OscPacket::Message(OscMessage {
            addr: "/lofi/init".into(),
            args: vec![OscType::String("{not json".into())],
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();
        assert!(matches!(decode(&bytes), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_garbage_bytes_fail_cleanly() {
        assert!(decode(b"\x00\x01garbage").is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_missing_argument() {
        let message = OscMessage {
            addr: "/lofi/status".into(),
            args: vec![],
        };
        assert!(matches!(
            decode_message(&message),
            Err(CodecError::MissingArgument(addr)) if addr == "/lofi/status"
        ));
    }

    #[test]
    fn test_payload_as_bare_address() {
        let message = OscMessage {
            addr: r#"{"status":"ok","id":"osc"}"#.into(),
            args: vec![],
        };
        assert_eq!(
            decode_message(&message).unwrap(),
            json!({"status": "ok", "id": "osc"})
        );
    }

    #[test]
    fn test_pre_parsed_scalars_accepted() {
        assert_eq!(decode_argument(&OscType::Int(7)).unwrap(), json!(7));
        assert_eq!(decode_argument(&OscType::Bool(true)).unwrap(), json!(true));
        assert!(decode_argument(&OscType::Blob(vec![1, 2])).is_err());
    }
}
