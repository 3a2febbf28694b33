//! # Tether Shared
//! Common functionality shared between tether-server & tether-client crates:
//! the in-process event bus, middleware pipelines, promises, the scheduler
//! everything runs on, and the wire packet format.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod disposable;
mod error;
mod middleware;
mod packet;
mod promise;
mod scheduler;
mod signal;
mod types;

pub use disposable::{Disposable, DisposalBin};
pub use error::{CodecError, CommError};
pub use middleware::{Middleware, MiddlewareContext, Pipeline, Step};
pub use packet::{from_payload, to_payload, Delivery, Packet, Payload};
pub use promise::Promise;
pub use scheduler::Scheduler;
pub use signal::{panic_message, Connection, Signal};
pub use types::{HostType, ObserverId, RemoteId, RemoteKind, RequestId};

pub use serde_json::Value;
pub use smol::Task;
