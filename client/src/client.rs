use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    future::Future,
    rc::{Rc, Weak},
};

use log::{debug, info, warn};
use smol::{
    channel::{self, Receiver, Sender},
    Task, Timer,
};

use tether_shared::{
    CommError, Delivery, HostType, Packet, RemoteId, RemoteKind, RequestId, Scheduler, Signal,
    Value,
};

use crate::{
    client_config::ClientConfig,
    transport::{PacketSender, Socket},
};

struct ClientState {
    // every remote the server has announced and not retracted
    directory: HashSet<RemoteId>,
    // transport-level event per remote, created when first needed
    natives: HashMap<RemoteId, Signal<Value>>,
    pending: HashMap<RequestId, Sender<Result<Value, String>>>,
    next_request: RequestId,
}

struct ClientInner {
    scheduler: Scheduler,
    config: ClientConfig,
    sender: RefCell<Option<Box<dyn PacketSender>>>,
    state: RefCell<ClientState>,
    connected: Cell<bool>,
    announced: Signal<RemoteId>,
    disconnected: Signal<()>,
    receive_task: RefCell<Option<Task<()>>>,
}

/// The observer endpoint. Keeps the directory of remotes the server has
/// announced, routes inbound events to the remote objects looking at them
/// and matches responses to outstanding calls.
///
/// Cloning a `Client` yields another handle to the same endpoint.
#[derive(Clone)]
pub struct Client {
    inner: Rc<ClientInner>,
}

impl Client {
    pub fn new(scheduler: &Scheduler, config: ClientConfig) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                scheduler: scheduler.clone(),
                config,
                sender: RefCell::new(None),
                state: RefCell::new(ClientState {
                    directory: HashSet::new(),
                    natives: HashMap::new(),
                    pending: HashMap::new(),
                    next_request: RequestId::from_u64(0),
                }),
                connected: Cell::new(false),
                announced: Signal::new(),
                disconnected: Signal::new(),
                receive_task: RefCell::new(None),
            }),
        }
    }

    /// Starts servicing the given socket on the client's scheduler
    pub fn connect(&self, socket: Socket) {
        if self.is_connected() {
            warn!("Client is already connected, dropping the old connection");
            self.disconnect();
        }

        let (sender, packets) = socket.into_parts();
        *self.inner.sender.borrow_mut() = Some(sender);
        self.inner.connected.set(true);

        let client = Rc::downgrade(&self.inner);
        let task = self.inner.scheduler.spawn(receive_loop(client, packets));
        *self.inner.receive_task.borrow_mut() = Some(task);

        info!("Client connected");
    }

    /// Drops the connection. Outstanding calls fail with
    /// [`CommError::Disconnected`].
    pub fn disconnect(&self) {
        self.inner.receive_task.borrow_mut().take();
        self.handle_disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    /// Fires once the connection to the server is lost
    pub fn disconnected(&self) -> &Signal<()> {
        &self.inner.disconnected
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Whether the server has announced `remote`
    pub fn knows(&self, remote: &RemoteId) -> bool {
        self.inner.state.borrow().directory.contains(remote)
    }

    /// Names of every announced remote of `kind` in `namespace`, sorted
    pub fn remote_names(&self, namespace: &str, kind: RemoteKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .state
            .borrow()
            .directory
            .iter()
            .filter(|remote| remote.namespace == namespace && remote.kind == kind)
            .map(|remote| remote.name.clone())
            .collect();
        names.sort();
        names
    }

    // Crate-public

    /// Waits until the server announces `remote`, for at most the configured
    /// discovery timeout
    pub(crate) async fn discover(&self, remote: &RemoteId) -> Result<(), CommError> {
        let waited = self.inner.config.discovery_timeout;
        let announced = self.inner.announced.clone();

        let wait_for = async {
            // announcements can arrive in bursts, so the directory is the
            // source of truth and the signal is only a wake-up
            loop {
                if self.knows(remote) {
                    return Ok(());
                }
                if announced.wait().await.is_err() {
                    return Err(CommError::NotFound {
                        remote: remote.clone(),
                        waited,
                    });
                }
            }
        };
        let deadline = async {
            Timer::after(waited).await;
            Err(CommError::NotFound {
                remote: remote.clone(),
                waited,
            })
        };

        let result = smol::future::or(wait_for, deadline).await;
        if result.is_err() {
            warn!("{} was not announced within {:?}", remote, waited);
        }
        result
    }

    /// The transport-level event for `remote`
    pub(crate) fn native(&self, remote: &RemoteId) -> Signal<Value> {
        self.inner
            .state
            .borrow_mut()
            .natives
            .entry(remote.clone())
            .or_default()
            .clone()
    }

    pub(crate) fn send(&self, delivery: Delivery, packet: &Packet) -> Result<(), CommError> {
        let bytes = packet.encode()?;
        let sender = self.inner.sender.borrow();
        let Some(sender) = sender.as_ref() else {
            return Err(CommError::Disconnected);
        };
        sender
            .send(delivery, &bytes)
            .map_err(|_| CommError::Transport {
                reason: format!("cannot send {} packet", packet.name()),
            })
    }

    /// Sends a request for `remote` and returns a future of its response.
    ///
    /// The request goes out immediately. Dropping the future forgets the
    /// request; a response that arrives later is discarded.
    pub(crate) fn request(
        &self,
        remote: &RemoteId,
        payload: Value,
    ) -> impl Future<Output = Result<Value, CommError>> + 'static {
        let (sender, receiver) = channel::bounded(1);
        let id = {
            let mut state = self.inner.state.borrow_mut();
            let id = state.next_request;
            state.next_request = id.next();
            state.pending.insert(id, sender);
            id
        };
        let guard = PendingGuard {
            client: Rc::downgrade(&self.inner),
            id,
        };

        let sent = self.send(
            Delivery::Reliable,
            &Packet::Request {
                id,
                remote: remote.clone(),
                payload,
            },
        );
        let remote = remote.clone();

        async move {
            let _guard = guard;
            sent?;
            match receiver.recv().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(reason)) => Err(CommError::RemoteCallFailed { remote, reason }),
                Err(_) => Err(CommError::Disconnected),
            }
        }
    }

    // Receiving

    fn handle_packet(&self, bytes: &[u8]) {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(error) => {
                warn!("dropping malformed packet from server: {}", error);
                return;
            }
        };
        if let Err(error) = packet.check_receiver(HostType::Client) {
            warn!("dropping packet from server: {}", error);
            return;
        }

        match packet {
            Packet::Announce(remote) => {
                debug!("server announced {}", remote);
                self.inner
                    .state
                    .borrow_mut()
                    .directory
                    .insert(remote.clone());
                self.inner.announced.fire(remote);
            }
            Packet::Retract(remote) => {
                debug!("server retracted {}", remote);
                let native = {
                    let mut state = self.inner.state.borrow_mut();
                    state.directory.remove(&remote);
                    state.natives.remove(&remote)
                };
                if let Some(native) = native {
                    native.destroy();
                }
            }
            Packet::Event { remote, payload } => {
                let native = self.inner.state.borrow().natives.get(&remote).cloned();
                match native {
                    Some(native) => native.fire(payload),
                    None => debug!("nothing listens to {}, dropping event", remote),
                }
            }
            Packet::Response { id, result } => {
                let pending = self.inner.state.borrow_mut().pending.remove(&id);
                match pending {
                    Some(sender) => {
                        let _ = sender.try_send(result);
                    }
                    None => debug!("response to forgotten request {:?}, dropping", id),
                }
            }
            // rejected by check_receiver
            Packet::Request { .. } => {}
        }
    }

    fn handle_disconnect(&self) {
        self.inner.sender.borrow_mut().take();
        if !self.inner.connected.replace(false) {
            return;
        }

        let natives = {
            let mut state = self.inner.state.borrow_mut();
            // dropping the senders fails every outstanding call
            state.pending.clear();
            state.directory.clear();
            std::mem::take(&mut state.natives)
        };
        for native in natives.values() {
            native.destroy();
        }

        info!("Client disconnected");
        self.inner.disconnected.fire(());
    }
}

struct PendingGuard {
    client: Weak<ClientInner>,
    id: RequestId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some(client) = self.client.upgrade() else {
            return;
        };
        if let Ok(mut state) = client.state.try_borrow_mut() {
            state.pending.remove(&self.id);
        };
    }
}

async fn receive_loop(client: Weak<ClientInner>, packets: Receiver<Box<[u8]>>) {
    while let Ok(bytes) = packets.recv().await {
        let Some(inner) = client.upgrade() else {
            return;
        };
        Client { inner }.handle_packet(&bytes);
    }

    if let Some(inner) = client.upgrade() {
        Client { inner }.handle_disconnect();
    }
}
