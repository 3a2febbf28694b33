//! # Tether Server
//! The authority side of tether: binds remote functions, fires remote
//! signals at connected observers and replicates properties to them, over
//! any transport that implements the [`transport`] traits.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use tether_shared::{
        from_payload, panic_message, to_payload, CodecError, CommError, Connection, Delivery,
        Disposable, DisposalBin, Middleware, MiddlewareContext, ObserverId, Payload, Pipeline,
        Promise, RemoteId, RemoteKind, Scheduler, Signal, Step, Value,
    };
}

mod comm;
mod remote;
mod server;

pub use comm::ServerComm;
pub use remote::{
    FunctionOptions, Override, PropertyOptions, RemoteFunction, RemoteProperty, RemoteSignal,
    SignalOptions,
};
pub use server::Server;
