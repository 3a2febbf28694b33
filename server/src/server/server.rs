use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap, HashSet},
    rc::{Rc, Weak},
};

use log::{debug, info, warn};
use smol::{channel::Receiver, Task};

use tether_shared::{
    CommError, Delivery, HostType, ObserverId, Packet, RemoteId, RequestId, Scheduler, Signal,
    Value,
};

use crate::transport::{PacketSender, Socket, SocketEvent};

/// Services a request for a bound function. `Err` carries the failure reason
/// back to the caller.
pub(crate) type CallHandler = Rc<dyn Fn(ObserverId, &Value) -> Result<Value, String>>;

enum Route {
    /// The transport-level event of a signal or property channel
    Event(Signal<(ObserverId, Value)>),
    Call(CallHandler),
}

struct ServerState {
    observers: BTreeSet<ObserverId>,
    routes: HashMap<RemoteId, Route>,
    // creation order, replayed to every observer that connects
    announced: Vec<RemoteId>,
    namespaces: HashSet<String>,
}

struct ServerInner {
    scheduler: Scheduler,
    sender: RefCell<Option<Box<dyn PacketSender>>>,
    state: RefCell<ServerState>,
    observer_added: Signal<ObserverId>,
    observer_removed: Signal<ObserverId>,
    receive_task: RefCell<Option<Task<()>>>,
}

/// The authority endpoint. Tracks connected observers, routes inbound
/// packets to the remote objects registered on it and scopes registry
/// namespaces.
///
/// Cloning a `Server` yields another handle to the same endpoint.
#[derive(Clone)]
pub struct Server {
    inner: Rc<ServerInner>,
}

impl Server {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            inner: Rc::new(ServerInner {
                scheduler: scheduler.clone(),
                sender: RefCell::new(None),
                state: RefCell::new(ServerState {
                    observers: BTreeSet::new(),
                    routes: HashMap::new(),
                    announced: Vec::new(),
                    namespaces: HashSet::new(),
                }),
                observer_added: Signal::new(),
                observer_removed: Signal::new(),
                receive_task: RefCell::new(None),
            }),
        }
    }

    /// Starts servicing the given socket on the server's scheduler
    pub fn listen(&self, socket: Socket) {
        let (sender, events) = socket.into_parts();
        *self.inner.sender.borrow_mut() = Some(sender);

        let server = Rc::downgrade(&self.inner);
        let task = self.inner.scheduler.spawn(receive_loop(server, events));
        *self.inner.receive_task.borrow_mut() = Some(task);

        info!("Server is listening");
    }

    pub fn is_listening(&self) -> bool {
        self.inner.receive_task.borrow().is_some()
    }

    /// Stops receiving, drops the socket and forgets every observer
    pub fn shutdown(&self) {
        self.inner.receive_task.borrow_mut().take();
        self.inner.sender.borrow_mut().take();

        let observers = std::mem::take(&mut self.inner.state.borrow_mut().observers);
        for observer in observers {
            self.inner.observer_removed.fire(observer);
        }
        info!("Server shut down");
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    // Observers

    /// Currently connected observers, in ascending id order
    pub fn observers(&self) -> Vec<ObserverId> {
        self.inner.state.borrow().observers.iter().copied().collect()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.state.borrow().observers.len()
    }

    pub fn is_observer(&self, observer: &ObserverId) -> bool {
        self.inner.state.borrow().observers.contains(observer)
    }

    /// Fires after an observer connects and has been sent the current
    /// directory of remotes
    pub fn observer_added(&self) -> &Signal<ObserverId> {
        &self.inner.observer_added
    }

    /// Fires after an observer has permanently disconnected
    pub fn observer_removed(&self) -> &Signal<ObserverId> {
        &self.inner.observer_removed
    }

    // Crate-public

    pub(crate) fn claim_namespace(&self, namespace: &str) -> Result<(), CommError> {
        let mut state = self.inner.state.borrow_mut();
        if !state.namespaces.insert(namespace.to_string()) {
            return Err(CommError::DuplicateNamespace {
                namespace: namespace.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn release_namespace(&self, namespace: &str) {
        self.inner.state.borrow_mut().namespaces.remove(namespace);
    }

    /// Registers an event route and returns its transport-level signal
    pub(crate) fn register_event(
        &self,
        remote: &RemoteId,
    ) -> Result<Signal<(ObserverId, Value)>, CommError> {
        let native = Signal::new();
        self.register(remote, Route::Event(native.clone()))?;
        Ok(native)
    }

    pub(crate) fn register_call(
        &self,
        remote: &RemoteId,
        handler: CallHandler,
    ) -> Result<(), CommError> {
        self.register(remote, Route::Call(handler))
    }

    fn register(&self, remote: &RemoteId, route: Route) -> Result<(), CommError> {
        let observers = {
            let mut state = self.inner.state.borrow_mut();
            if state.routes.contains_key(remote) {
                return Err(CommError::DuplicateRemote {
                    remote: remote.clone(),
                });
            }
            state.routes.insert(remote.clone(), route);
            state.announced.push(remote.clone());
            state.observers.iter().copied().collect::<Vec<_>>()
        };

        debug!("registered {}", remote);
        self.send_to_many(
            observers,
            Delivery::Reliable,
            &Packet::Announce(remote.clone()),
        );
        Ok(())
    }

    /// Removes a route and tells every observer it is gone
    pub(crate) fn unregister(&self, remote: &RemoteId) {
        let (route, observers) = {
            let mut state = self.inner.state.borrow_mut();
            let route = state.routes.remove(remote);
            state.announced.retain(|announced| announced != remote);
            (route, state.observers.iter().copied().collect::<Vec<_>>())
        };

        let Some(route) = route else {
            return;
        };
        if let Route::Event(native) = route {
            native.destroy();
        }

        debug!("unregistered {}", remote);
        self.send_to_many(
            observers,
            Delivery::Reliable,
            &Packet::Retract(remote.clone()),
        );
    }

    pub(crate) fn send(&self, observer: ObserverId, delivery: Delivery, packet: &Packet) {
        match packet.encode() {
            Ok(bytes) => self.send_bytes(observer, delivery, &bytes),
            Err(error) => warn!(
                "Server Error: Cannot encode {} packet for {}: {}",
                packet.name(),
                observer,
                error
            ),
        }
    }

    /// Encodes `packet` once and sends it to every observer in `observers`
    pub(crate) fn send_to_many(
        &self,
        observers: impl IntoIterator<Item = ObserverId>,
        delivery: Delivery,
        packet: &Packet,
    ) {
        let bytes = match packet.encode() {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(
                    "Server Error: Cannot encode {} packet: {}",
                    packet.name(),
                    error
                );
                return;
            }
        };
        for observer in observers {
            self.send_bytes(observer, delivery, &bytes);
        }
    }

    fn send_bytes(&self, observer: ObserverId, delivery: Delivery, bytes: &[u8]) {
        let sender = self.inner.sender.borrow();
        let Some(sender) = sender.as_ref() else {
            warn!("Server is not listening, dropping packet for {}", observer);
            return;
        };
        if sender.send(&observer, delivery, bytes).is_err() {
            warn!("Server Error: Cannot send packet to {}", observer);
        }
    }

    // Receiving

    fn handle_event(&self, event: SocketEvent) {
        match event {
            SocketEvent::Connected(observer) => self.handle_connect(observer),
            SocketEvent::Disconnected(observer) => self.handle_disconnect(observer),
            SocketEvent::Packet(observer, bytes) => self.handle_packet(observer, &bytes),
        }
    }

    fn handle_connect(&self, observer: ObserverId) {
        let announced = {
            let mut state = self.inner.state.borrow_mut();
            if !state.observers.insert(observer) {
                warn!("{} connected twice, ignoring", observer);
                return;
            }
            state.announced.clone()
        };

        for remote in announced {
            self.send(observer, Delivery::Reliable, &Packet::Announce(remote));
        }

        info!("{} connected", observer);
        self.inner.observer_added.fire(observer);
    }

    fn handle_disconnect(&self, observer: ObserverId) {
        if !self.inner.state.borrow_mut().observers.remove(&observer) {
            return;
        }

        info!("{} disconnected", observer);
        self.inner.observer_removed.fire(observer);
    }

    fn handle_packet(&self, observer: ObserverId, bytes: &[u8]) {
        if !self.is_observer(&observer) {
            warn!("dropping packet from unknown {}", observer);
            return;
        }

        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(error) => {
                warn!("dropping malformed packet from {}: {}", observer, error);
                return;
            }
        };
        if let Err(error) = packet.check_receiver(HostType::Server) {
            warn!("dropping packet from {}: {}", observer, error);
            return;
        }

        match packet {
            Packet::Event { remote, payload } => {
                let native = match self.inner.state.borrow().routes.get(&remote) {
                    Some(Route::Event(native)) => Some(native.clone()),
                    _ => None,
                };
                match native {
                    Some(native) => native.fire((observer, payload)),
                    None => debug!("no event route for {}, dropping", remote),
                }
            }
            Packet::Request {
                id,
                remote,
                payload,
            } => self.handle_request(observer, id, &remote, &payload),
            // rejected by check_receiver
            Packet::Announce(_) | Packet::Retract(_) | Packet::Response { .. } => {}
        }
    }

    fn handle_request(&self, observer: ObserverId, id: RequestId, remote: &RemoteId, payload: &Value) {
        let handler = match self.inner.state.borrow().routes.get(remote) {
            Some(Route::Call(handler)) => Some(handler.clone()),
            _ => None,
        };

        let result = match handler {
            Some(handler) => handler(observer, payload),
            None => Err(format!("no function is bound to {}", remote)),
        };
        if let Err(reason) = &result {
            warn!("call {} from {} failed: {}", remote, observer, reason);
        }

        self.send(observer, Delivery::Reliable, &Packet::Response { id, result });
    }
}

async fn receive_loop(server: Weak<ServerInner>, events: Receiver<SocketEvent>) {
    while let Ok(event) = events.recv().await {
        let Some(inner) = server.upgrade() else {
            break;
        };
        Server { inner }.handle_event(event);
    }
    debug!("server receive loop finished");
}
