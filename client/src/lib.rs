//! # Tether Client
//! The observer side of tether: discovers the remotes a server announces,
//! calls its functions, listens to and fires its signals, and mirrors its
//! properties, over any transport that implements the [`transport`] traits.

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
        Disposable, DisposalBin, Middleware, MiddlewareContext, Payload, Pipeline, Promise,
        RemoteId, RemoteKind, Scheduler, Signal, Step, Value,
    };
}

mod client;
mod client_config;
mod comm;
mod remote;

pub use client::Client;
pub use client_config::ClientConfig;
pub use comm::ClientComm;
pub use remote::{
    ClientRemoteFunction, ClientRemoteProperty, ClientRemoteSignal, FunctionOptions,
    PropertyOptions, SignalOptions,
};
