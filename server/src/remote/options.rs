use tether_shared::{Delivery, Pipeline};

/// Middleware and delivery mode for a [`RemoteSignal`](super::RemoteSignal)
/// that fires `Out` to observers and receives `In` from them
pub struct SignalOptions<Out, In = Out> {
    /// Applied to messages arriving from observers. A halt drops the message.
    pub inbound: Pipeline<In>,
    /// Applied before transmission. A halt sends the halted value instead.
    pub outbound: Pipeline<Out>,
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

/// Middleware for a [`RemoteFunction`](super::RemoteFunction)
pub struct FunctionOptions<Req, Res> {
    /// Applied to the request before the handler. A halt skips the handler
    /// and responds with the halted value.
    pub inbound: Pipeline<Req, Res>,
    /// Applied to the handler's result. A halt replaces the result.
    pub outbound: Pipeline<Res>,
}

impl<Req, Res> Default for FunctionOptions<Req, Res> {
    fn default() -> Self {
        Self {
            inbound: Pipeline::new(),
            outbound: Pipeline::new(),
        }
    }
}

/// Middleware and delivery mode for a [`RemoteProperty`](super::RemoteProperty).
///
/// Inbound middleware sees value requests from observers; outbound
/// middleware sees every value sent, where `None` is an explicit nil.
pub struct PropertyOptions<T> {
    pub inbound: Pipeline<()>,
    pub outbound: Pipeline<Option<T>>,
    pub delivery: Delivery,
}

impl<T> Default for PropertyOptions<T> {
    fn default() -> Self {
        Self {
            inbound: Pipeline::new(),
            outbound: Pipeline::new(),
            delivery: Delivery::Reliable,
        }
    }
}
