use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::warn;

use tether_shared::{
    from_payload, to_payload, Connection, Delivery, Disposable, DisposalBin, MiddlewareContext,
    Packet, Payload, Pipeline, RemoteId, Signal, Step, Value,
};

use crate::{client::Client, remote::SignalOptions};

struct ClientRemoteSignalInner<Out: Payload, In: Payload> {
    client: Client,
    remote: RemoteId,
    native: Signal<Value>,
    relay: RefCell<Option<Signal<Out>>>,
    inbound: Pipeline<Out>,
    outbound: Pipeline<In>,
    delivery: Delivery,
    // handlers connected through this handle
    connections: DisposalBin,
    destroyed: Cell<bool>,
}

/// The observer's end of a server `RemoteSignal`: receives `Out` from the
/// server and fires `In` at it.
pub struct ClientRemoteSignal<Out: Payload, In: Payload = Out> {
    inner: Rc<ClientRemoteSignalInner<Out, In>>,
}

impl<Out: Payload, In: Payload> Clone for ClientRemoteSignal<Out, In> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Out: Payload, In: Payload> ClientRemoteSignal<Out, In> {
    pub(crate) fn new(client: &Client, remote: RemoteId, options: SignalOptions<Out, In>) -> Self {
        let native = client.native(&remote);
        Self {
            inner: Rc::new(ClientRemoteSignalInner {
                client: client.clone(),
                remote,
                native,
                relay: RefCell::new(None),
                inbound: options.inbound,
                outbound: options.outbound,
                delivery: options.delivery,
                connections: DisposalBin::new(),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn remote(&self) -> &RemoteId {
        &self.inner.remote
    }

    pub fn is_direct_connect(&self) -> bool {
        self.inner.inbound.is_passthrough()
    }

    /// Connects a handler for messages fired by the server
    pub fn connect(&self, handler: impl Fn(Out) + 'static) -> Connection {
        if self.is_destroyed() {
            warn!(
                "connect() called on destroyed ClientRemoteSignal {}, handler ignored",
                self.inner.remote
            );
            return Connection::empty();
        }

        let connection = if self.is_direct_connect() {
            let remote = self.inner.remote.clone();
            self.inner.native.connect(move |payload: &Value| {
                match from_payload::<Out>(payload) {
                    Ok(args) => handler(args),
                    Err(error) => warn!("dropping event on {}: {}", remote, error),
                }
            })
        } else {
            self.relay().connect(move |args: &Out| handler(args.clone()))
        };

        self.inner.connections.add(connection.clone());
        connection
    }

    fn relay(&self) -> Signal<Out> {
        if let Some(relay) = self.inner.relay.borrow().as_ref() {
            return relay.clone();
        }

        let relay = Signal::new();
        let remote = self.inner.remote.clone();
        let inbound = self.inner.inbound.clone();
        let relay_clone = relay.clone();
        let feed = self.inner.native.connect(move |payload: &Value| {
            let args = match from_payload::<Out>(payload) {
                Ok(args) => args,
                Err(error) => {
                    warn!("dropping event on {}: {}", remote, error);
                    return;
                }
            };
            let context = MiddlewareContext::new(&remote, None);
            if let Step::Continue(args) = inbound.run(&context, args) {
                relay_clone.fire(args);
            }
        });
        self.inner.connections.add(feed);

        *self.inner.relay.borrow_mut() = Some(relay.clone());
        relay
    }

    /// Sends `args` to the server
    pub fn fire(&self, args: In) {
        if self.is_destroyed() {
            warn!(
                "fire() called on destroyed ClientRemoteSignal {}, ignoring",
                self.inner.remote
            );
            return;
        }

        let context = MiddlewareContext::new(&self.inner.remote, None);
        let args = self.inner.outbound.run(&context, args).into_inner();
        let payload = match to_payload(&args) {
            Ok(payload) => payload,
            Err(error) => {
                warn!("cannot fire {}: {}", self.inner.remote, error);
                return;
            }
        };

        let packet = Packet::Event {
            remote: self.inner.remote.clone(),
            payload,
        };
        if let Err(error) = self.inner.client.send(self.inner.delivery, &packet) {
            warn!("cannot fire {}: {}", self.inner.remote, error);
        }
    }

    /// Disconnects every handler connected through this handle. Other
    /// handles to the same remote are unaffected.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.connections.dispose_all();
        if let Some(relay) = self.inner.relay.borrow_mut().take() {
            relay.destroy();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }
}

impl<Out: Payload, In: Payload> Disposable for ClientRemoteSignal<Out, In> {
    fn dispose(&self) {
        self.destroy();
    }
}
