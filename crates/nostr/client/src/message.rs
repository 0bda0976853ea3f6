//! Relay protocol frames.
//!
//! Client to relay: `EVENT`, `REQ`, `CLOSE`.
//! Relay to client: `EVENT`, `OK`, `EOSE`, `CLOSED`, `NOTICE`, `AUTH`.

use crate::error::{ClientError, Result};
use nostr::{Event, Filter};
use serde_json::{Value, json};

/// Message sent from client to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `["EVENT", event]`
    Event(Event),
    /// `["REQ", subscription_id, filter...]`
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    /// `["CLOSE", subscription_id]`
    Close(String),
}

impl ClientMessage {
    /// Serialize to the JSON text frame sent to relays.
    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            ClientMessage::Event(event) => json!(["EVENT", event]),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = vec![json!("REQ"), json!(subscription_id)];
                for filter in filters {
                    frame.push(serde_json::to_value(filter)?);
                }
                Value::Array(frame)
            }
            ClientMessage::Close(subscription_id) => json!(["CLOSE", subscription_id]),
        };
        Ok(serde_json::to_string(&value)?)
    }

    /// Parse a client frame; relay-side counterpart of `to_json`.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let array = value
            .as_array()
            .ok_or_else(|| ClientError::Protocol("expected JSON array client message".to_string()))?;
        let kind = array
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Protocol("missing client message kind".to_string()))?;

        match kind {
            "EVENT" => {
                let payload = array
                    .get(1)
                    .ok_or_else(|| ClientError::Protocol("invalid EVENT message".to_string()))?;
                Ok(ClientMessage::Event(serde_json::from_value(payload.clone())?))
            }
            "REQ" => {
                let subscription_id = array
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClientError::Protocol("invalid REQ subscription id".to_string()))?
                    .to_string();
                let filters = array[2..]
                    .iter()
                    .map(|filter| serde_json::from_value(filter.clone()))
                    .collect::<std::result::Result<Vec<Filter>, _>>()?;
                Ok(ClientMessage::Req {
                    subscription_id,
                    filters,
                })
            }
            "CLOSE" => {
                let subscription_id = array
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ClientError::Protocol("invalid CLOSE subscription id".to_string())
                    })?;
                Ok(ClientMessage::Close(subscription_id.to_string()))
            }
            other => Err(ClientError::Protocol(format!(
                "unknown client message kind: {}",
                other
            ))),
        }
    }
}

/// Relay message received from a relay.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    Event(String, Event),
    Ok(String, bool, String),
    Eose(String),
    Closed(String, String),
    Notice(String),
    Auth(String),
}

impl RelayMessage {
    /// Serialize to a relay frame; used by in-process relays.
    pub fn to_json(&self) -> Result<String> {
        let value = match self {
            RelayMessage::Event(subscription_id, event) => json!(["EVENT", subscription_id, event]),
            RelayMessage::Ok(event_id, accepted, message) => {
                json!(["OK", event_id, accepted, message])
            }
            RelayMessage::Eose(subscription_id) => json!(["EOSE", subscription_id]),
            RelayMessage::Closed(subscription_id, message) => {
                json!(["CLOSED", subscription_id, message])
            }
            RelayMessage::Notice(message) => json!(["NOTICE", message]),
            RelayMessage::Auth(challenge) => json!(["AUTH", challenge]),
        };
        Ok(serde_json::to_string(&value)?)
    }
}

/// Parse relay protocol JSON text message into typed relay message.
///
/// Unknown message kinds parse to `None`.
pub fn parse_relay_message(text: &str) -> Result<Option<RelayMessage>> {
    let value: Value = serde_json::from_str(text)?;
    let array = value
        .as_array()
        .ok_or_else(|| ClientError::Protocol("expected JSON array relay message".to_string()))?;
    if array.is_empty() {
        return Ok(None);
    }

    let kind = array[0]
        .as_str()
        .ok_or_else(|| ClientError::Protocol("missing relay message kind".to_string()))?;

    match kind {
        "EVENT" => {
            if array.len() < 3 {
                return Err(ClientError::Protocol("invalid EVENT message".to_string()));
            }
            let subscription_id = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid EVENT subscription id".to_string()))?
                .to_string();
            let event: Event = serde_json::from_value(array[2].clone()).map_err(|error| {
                ClientError::Protocol(format!("invalid EVENT payload: {}", error))
            })?;
            Ok(Some(RelayMessage::Event(subscription_id, event)))
        }
        "OK" => {
            if array.len() < 4 {
                return Err(ClientError::Protocol("invalid OK message".to_string()));
            }
            let event_id = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid OK event id".to_string()))?
                .to_string();
            let accepted = array[2]
                .as_bool()
                .ok_or_else(|| ClientError::Protocol("invalid OK accepted flag".to_string()))?;
            let message = array[3]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid OK message text".to_string()))?
                .to_string();
            Ok(Some(RelayMessage::Ok(event_id, accepted, message)))
        }
        "EOSE" => {
            if array.len() < 2 {
                return Err(ClientError::Protocol("invalid EOSE message".to_string()));
            }
            let subscription_id = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid EOSE subscription id".to_string()))?
                .to_string();
            Ok(Some(RelayMessage::Eose(subscription_id)))
        }
        "CLOSED" => {
            if array.len() < 2 {
                return Err(ClientError::Protocol("invalid CLOSED message".to_string()));
            }
            let subscription_id = array[1]
                .as_str()
                .ok_or_else(|| {
                    ClientError::Protocol("invalid CLOSED subscription id".to_string())
                })?
                .to_string();
            let message = array
                .get(2)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Some(RelayMessage::Closed(subscription_id, message)))
        }
        "NOTICE" => {
            if array.len() < 2 {
                return Err(ClientError::Protocol("invalid NOTICE message".to_string()));
            }
            let message = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid NOTICE message text".to_string()))?
                .to_string();
            Ok(Some(RelayMessage::Notice(message)))
        }
        "AUTH" => {
            if array.len() < 2 {
                return Err(ClientError::Protocol("invalid AUTH message".to_string()));
            }
            let challenge = array[1]
                .as_str()
                .ok_or_else(|| ClientError::Protocol("invalid AUTH challenge".to_string()))?
                .to_string();
            Ok(Some(RelayMessage::Auth(challenge)))
        }
        _ => Ok(None),
    }
}
