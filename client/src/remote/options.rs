use tether_shared::{Delivery, Pipeline};

/// Middleware and delivery mode for a
/// [`ClientRemoteSignal`](super::ClientRemoteSignal) that receives `Out` from
/// the server and fires `In` at it
pub struct SignalOptions<Out, In = Out> {
    /// Applied to messages from the server. A halt drops the message.
    pub inbound: Pipeline<Out>,
    /// Applied before transmission. A halt sends the halted value instead.
    pub outbound: Pipeline<In>,
    pub delivery: Delivery,
}

impl<Out, In> Default for SignalOptions<Out, In> {
    fn default() -> Self {
        Self {
            inbound: Pipeline::new(),
            outbound: Pipeline::new(),
            delivery: Delivery::Reliable,
        }
    }
}

/// Middleware for a [`ClientRemoteFunction`](super::ClientRemoteFunction)
pub struct FunctionOptions<Req, Res> {
    /// Applied to the response. A halt returns the halted value instead.
    pub inbound: Pipeline<Res>,
    /// Applied to the request before transmission. A halt sends the halted
    /// value instead.
    pub outbound: Pipeline<Req>,
}

impl<Req, Res> Default for FunctionOptions<Req, Res> {
    fn default() -> Self {
        Self {
            inbound: Pipeline::new(),
            outbound: Pipeline::new(),
        }
    }
}

/// Middleware for a [`ClientRemoteProperty`](super::ClientRemoteProperty).
/// Inbound middleware sees every value the server sends.
pub struct PropertyOptions<T> {
    pub inbound: Pipeline<Option<T>>,
}

impl<T> Default for PropertyOptions<T> {
    fn default() -> Self {
        Self {
            inbound: Pipeline::new(),
        }
    }
}
