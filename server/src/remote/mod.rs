mod options;
mod remote_function;
mod remote_property;
mod remote_signal;

pub use options::{FunctionOptions, PropertyOptions, SignalOptions};
pub use remote_function::RemoteFunction;
pub use remote_property::{Override, RemoteProperty};
pub use remote_signal::RemoteSignal;
