use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }
}

// ObserverId
/// Identifies one remote peer connected to the authority
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn from_u64(value: u64) -> Self {
        ObserverId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

// RequestId
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn from_u64(value: u64) -> Self {
        RequestId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        RequestId(self.0.wrapping_add(1))
    }
}

// RemoteKind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteKind {
    Event,
    Call,
    Property,
}

impl RemoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Event => "event",
            RemoteKind::Call => "call",
            RemoteKind::Property => "property",
        }
    }
}

// RemoteId
/// The `(namespace, kind, name)` triple every remote object is addressed by
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId {
    pub namespace: String,
    pub kind: RemoteKind,
    pub name: String,
}

impl RemoteId {
    pub fn new(namespace: &str, kind: RemoteKind, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind.as_str(), self.name)
    }
}
