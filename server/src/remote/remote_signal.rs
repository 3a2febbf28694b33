use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::warn;

use tether_shared::{
    from_payload, to_payload, CommError, Connection, Delivery, Disposable, MiddlewareContext,
    ObserverId, Packet, Payload, Pipeline, RemoteId, Signal, Step, Value,
};

use crate::{remote::SignalOptions, server::Server};

struct RemoteSignalInner<Out: Payload, In: Payload> {
    server: Server,
    remote: RemoteId,
    // transport-level event for this remote, owned by the server's router
    native: Signal<(ObserverId, Value)>,
    // only created once a handler connects through inbound middleware
    relay: RefCell<Option<Signal<(ObserverId, In)>>>,
    inbound: Pipeline<In>,
    outbound: Pipeline<Out>,
    delivery: Delivery,
    destroyed: Cell<bool>,
}

/// Named event channel from the server to its observers, and back.
///
/// `Out` is what the server fires, `In` is what observers fire at it.
pub struct RemoteSignal<Out: Payload, In: Payload = Out> {
    inner: Rc<RemoteSignalInner<Out, In>>,
}

impl<Out: Payload, In: Payload> Clone for RemoteSignal<Out, In> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Out: Payload, In: Payload> RemoteSignal<Out, In> {
    pub(crate) fn new(
        server: &Server,
        remote: RemoteId,
        options: SignalOptions<Out, In>,
    ) -> Result<Self, CommError> {
        let native = server.register_event(&remote)?;
        Ok(Self {
            inner: Rc::new(RemoteSignalInner {
                server: server.clone(),
                remote,
                native,
                relay: RefCell::new(None),
                inbound: options.inbound,
                outbound: options.outbound,
                delivery: options.delivery,
                destroyed: Cell::new(false),
            }),
        })
    }

    pub fn remote(&self) -> &RemoteId {
        &self.inner.remote
    }

    /// True when inbound messages go straight from the transport event to
    /// connected handlers, without an intermediate signal
    pub fn is_direct_connect(&self) -> bool {
        self.inner.inbound.is_passthrough()
    }

    /// Connects a handler for messages fired by observers
    pub fn connect(&self, handler: impl Fn(ObserverId, In) + 'static) -> Connection {
        if self.is_direct_connect() {
            let remote = self.inner.remote.clone();
            return self
                .inner
                .native
                .connect(move |(observer, payload): &(ObserverId, Value)| {
                    match from_payload::<In>(payload) {
                        Ok(args) => handler(*observer, args),
                        Err(error) => {
                            warn!("dropping event on {} from {}: {}", remote, observer, error)
                        }
                    }
                });
        }

        self.relay()
            .connect(move |(observer, args): &(ObserverId, In)| handler(*observer, args.clone()))
    }

    fn relay(&self) -> Signal<(ObserverId, In)> {
        if let Some(relay) = self.inner.relay.borrow().as_ref() {
            return relay.clone();
        }

        let relay = Signal::new();
        if self.inner.native.is_destroyed() {
            relay.destroy();
        }

        let remote = self.inner.remote.clone();
        let inbound = self.inner.inbound.clone();
        let relay_clone = relay.clone();
        self.inner
            .native
            .connect(move |(observer, payload): &(ObserverId, Value)| {
                let args = match from_payload::<In>(payload) {
                    Ok(args) => args,
                    Err(error) => {
                        warn!("dropping event on {} from {}: {}", remote, observer, error);
                        return;
                    }
                };
                let context = MiddlewareContext::new(&remote, Some(*observer));
                match inbound.run(&context, args) {
                    Step::Continue(args) => relay_clone.fire((*observer, args)),
                    Step::Halt(_) => {}
                }
            });

        *self.inner.relay.borrow_mut() = Some(relay.clone());
        relay
    }

    /// Sends `args` to a single observer
    pub fn fire(&self, observer: ObserverId, args: Out) {
        if !self.check_alive("fire") {
            return;
        }
        let context = MiddlewareContext::new(&self.inner.remote, Some(observer));
        let args = self.inner.outbound.run(&context, args).into_inner();
        if let Some(packet) = self.packet(&args) {
            self.inner.server.send(observer, self.inner.delivery, &packet);
        }
    }

    /// Sends `args` to every connected observer. Outbound middleware runs
    /// once, with no observer in its context.
    pub fn fire_all(&self, args: Out) {
        if !self.check_alive("fire_all") {
            return;
        }

        let context = MiddlewareContext::new(&self.inner.remote, None);
        let args = self.inner.outbound.run(&context, args).into_inner();
        if let Some(packet) = self.packet(&args) {
            self.inner
                .server
                .send_to_many(self.inner.server.observers(), self.inner.delivery, &packet);
        }
    }

    /// Sends `args` to every connected observer except `except`
    pub fn fire_except(&self, except: ObserverId, args: Out) {
        self.fire_filter(move |observer, _| observer != except, args)
    }

    /// Sends `args` to every connected observer for which `predicate` holds.
    ///
    /// The predicate sees the arguments before outbound middleware runs;
    /// middleware then runs once per passing observer.
    pub fn fire_filter(&self, predicate: impl Fn(ObserverId, &Out) -> bool, args: Out) {
        if !self.check_alive("fire_filter") {
            return;
        }

        let observers: Vec<ObserverId> = self
            .inner
            .server
            .observers()
            .into_iter()
            .filter(|observer| predicate(*observer, &args))
            .collect();

        if self.inner.outbound.is_passthrough() {
            if let Some(packet) = self.packet(&args) {
                self.inner
                    .server
                    .send_to_many(observers, self.inner.delivery, &packet);
            }
            return;
        }

        for observer in observers {
            let context = MiddlewareContext::new(&self.inner.remote, Some(observer));
            let args = self.inner.outbound.run(&context, args.clone()).into_inner();
            if let Some(packet) = self.packet(&args) {
                self.inner.server.send(observer, self.inner.delivery, &packet);
            }
        }
    }

    /// Disconnects every handler and retracts the remote from observers
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.server.unregister(&self.inner.remote);
        self.inner.native.destroy();
        if let Some(relay) = self.inner.relay.borrow_mut().take() {
            relay.destroy();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    fn check_alive(&self, operation: &str) -> bool {
        if self.is_destroyed() {
            warn!(
                "{}() called on destroyed RemoteSignal {}, ignoring",
                operation, self.inner.remote
            );
            return false;
        }
        true
    }

    fn packet(&self, args: &Out) -> Option<Packet> {
        match to_payload(args) {
            Ok(payload) => Some(Packet::Event {
                remote: self.inner.remote.clone(),
                payload,
            }),
            Err(error) => {
                warn!("cannot fire {}: {}", self.inner.remote, error);
                None
            }
        }
    }
}

impl<Out: Payload, In: Payload> Disposable for RemoteSignal<Out, In> {
    fn dispose(&self) {
        self.destroy();
    }
}
