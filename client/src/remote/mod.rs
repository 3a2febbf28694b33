mod options;
mod remote_function;
mod remote_property;
mod remote_signal;

pub use options::{FunctionOptions, PropertyOptions, SignalOptions};
pub use remote_function::ClientRemoteFunction;
pub use remote_property::ClientRemoteProperty;
pub use remote_signal::ClientRemoteSignal;
