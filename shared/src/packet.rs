use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{CodecError, CommError},
    types::{HostType, RemoteId, RequestId},
};

/// Types that can travel through a remote as arguments or results
pub trait Payload: Serialize + DeserializeOwned + Clone + 'static {}

impl<T: Serialize + DeserializeOwned + Clone + 'static> Payload for T {}

/// How the transport should carry a packet
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Delivery {
    #[default]
    Reliable,
    /// May be dropped by the transport, never reordered relative to other
    /// packets from the same sender
    Unreliable,
}

/// Everything that goes over the wire between server and clients
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Server -> Client: a remote now exists and can be looked up
    Announce(RemoteId),
    /// Server -> Client: a remote was torn down
    Retract(RemoteId),
    /// Either direction: an event on a signal or property channel
    Event { remote: RemoteId, payload: Value },
    /// Client -> Server: invoke a bound function
    Request {
        id: RequestId,
        remote: RemoteId,
        payload: Value,
    },
    /// Server -> Client: result of a previous request
    Response {
        id: RequestId,
        result: Result<Value, String>,
    },
}

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Announce(_) => "Announce",
            Packet::Retract(_) => "Retract",
            Packet::Event { .. } => "Event",
            Packet::Request { .. } => "Request",
            Packet::Response { .. } => "Response",
        }
    }

    /// Checks that a host of type `host` may receive this packet
    pub fn check_receiver(&self, host: HostType) -> Result<(), CommError> {
        let allowed = match self {
            Packet::Event { .. } => true,
            Packet::Request { .. } => host == HostType::Server,
            Packet::Announce(_) | Packet::Retract(_) | Packet::Response { .. } => {
                host == HostType::Client
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(CommError::WrongRole {
                operation: self.name(),
                host,
            })
        }
    }

    pub fn encode(&self) -> Result<Box<[u8]>, CodecError> {
        serde_json::to_vec(self)
            .map(Vec::into_boxed_slice)
            .map_err(|error| CodecError::Encode {
                what: "packet",
                reason: error.to_string(),
            })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|error| CodecError::Decode {
            what: "packet",
            reason: error.to_string(),
        })
    }
}

/// Converts typed arguments into a wire payload
pub fn to_payload<T: Serialize>(value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(|error| CodecError::Encode {
        what: "payload",
        reason: error.to_string(),
    })
}

/// Reads typed arguments back out of a wire payload
pub fn from_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, CodecError> {
    T::deserialize(payload).map_err(|error| CodecError::Decode {
        what: "payload",
        reason: error.to_string(),
    })
}
