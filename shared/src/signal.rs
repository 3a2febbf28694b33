use std::{
    any::Any,
    cell::{Cell, RefCell},
    future::Future,
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use log::{error, warn};

use crate::{disposable::Disposable, error::CommError, scheduler::Scheduler};

struct Slot<T> {
    id: u64,
    once: bool,
    connected: Rc<Cell<bool>>,
    handler: Box<dyn Fn(&T)>,
}

struct SignalState<T> {
    slots: Vec<Rc<Slot<T>>>,
    next_id: u64,
    destroyed: bool,
}

trait Detach {
    fn detach(&self, slot_id: u64);
}

impl<T> Detach for RefCell<SignalState<T>> {
    fn detach(&self, slot_id: u64) {
        // a detach that races a borrow leaves a dead slot behind, which
        // dispatch skips and the next detach sweeps
        if let Ok(mut state) = self.try_borrow_mut() {
            state
                .slots
                .retain(|slot| slot.id != slot_id && slot.connected.get());
        }
    }
}

// Connection

/// Handle returned by [`Signal::connect`]. Cloning it yields another handle
/// to the same subscription.
#[derive(Clone)]
pub struct Connection {
    slot_id: u64,
    connected: Rc<Cell<bool>>,
    owner: Option<Weak<dyn Detach>>,
}

impl Connection {
    /// A handle that is not connected to any signal
    pub fn empty() -> Self {
        Self {
            slot_id: 0,
            connected: Rc::new(Cell::new(false)),
            owner: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Removes the handler from future dispatch. Calling this more than once
    /// is a no-op.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        if let Some(owner) = self.owner.as_ref().and_then(Weak::upgrade) {
            owner.detach(self.slot_id);
        }
    }
}

impl Disposable for Connection {
    fn dispose(&self) {
        self.disconnect();
    }
}

struct DisconnectOnDrop(Connection);

impl Drop for DisconnectOnDrop {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

// Signal

/// In-process publish/subscribe primitive.
///
/// Handlers run in connection order against a snapshot taken when the signal
/// fires, so handlers may connect or disconnect (themselves or others) from
/// inside a dispatch without disturbing it. A panicking handler is logged and
/// does not prevent the remaining handlers from running.
///
/// Once destroyed, `connect` becomes a no-op that returns an already
/// disconnected [`Connection`].
pub struct Signal<T: 'static> {
    state: Rc<RefCell<SignalState<T>>>,
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SignalState {
                slots: Vec::new(),
                next_id: 0,
                destroyed: false,
            })),
        }
    }

    pub fn connect(&self, handler: impl Fn(&T) + 'static) -> Connection {
        self.insert(Box::new(handler), false)
    }

    /// Connects a handler that is disconnected right before its first call
    pub fn connect_once(&self, handler: impl Fn(&T) + 'static) -> Connection {
        self.insert(Box::new(handler), true)
    }

    fn insert(&self, handler: Box<dyn Fn(&T)>, once: bool) -> Connection {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            warn!("connect() called on a destroyed Signal, handler ignored");
            return Connection::empty();
        }

        let slot_id = state.next_id;
        state.next_id += 1;
        let connected = Rc::new(Cell::new(true));
        state.slots.push(Rc::new(Slot {
            id: slot_id,
            once,
            connected: connected.clone(),
            handler,
        }));
        drop(state);

        let owner = Rc::downgrade(&self.state);
        let owner: Weak<dyn Detach> = owner;
        Connection {
            slot_id,
            connected,
            owner: Some(owner),
        }
    }

    /// Synchronously dispatches `value` to every currently connected handler
    pub fn fire(&self, value: T) {
        for slot in self.snapshot() {
            if !slot.connected.get() {
                continue;
            }
            if slot.once {
                slot.connected.set(false);
                self.state.detach(slot.id);
            }
            invoke(&slot, &value);
        }
    }

    /// Like [`Signal::fire`], but every handler call is pushed to the next
    /// tick of `scheduler`. A handler disconnected in the meantime is skipped.
    pub fn fire_deferred(&self, scheduler: &Scheduler, value: T) {
        let value = Rc::new(value);
        for slot in self.snapshot() {
            let value = value.clone();
            let state = Rc::downgrade(&self.state);
            scheduler.defer(move || {
                if !slot.connected.get() {
                    return;
                }
                if slot.once {
                    slot.connected.set(false);
                    if let Some(state) = state.upgrade() {
                        state.detach(slot.id);
                    }
                }
                invoke(&slot, &value);
            });
        }
    }

    /// Resolves with the value of the next `fire`. Every pending waiter gets
    /// its own copy. Resolves to [`CommError::Destroyed`] if the signal is
    /// destroyed first.
    pub fn wait(&self) -> impl Future<Output = Result<T, CommError>>
    where
        T: Clone,
    {
        let (sender, receiver) = smol::channel::bounded(1);
        let connection = self.connect_once(move |value: &T| {
            let _ = sender.try_send(value.clone());
        });

        async move {
            let _guard = DisconnectOnDrop(connection);
            receiver.recv().await.map_err(|_| CommError::Destroyed {
                what: "Signal".to_string(),
            })
        }
    }

    pub fn disconnect_all(&self) {
        let slots = std::mem::take(&mut self.state.borrow_mut().slots);
        for slot in slots.iter() {
            slot.connected.set(false);
        }
    }

    /// Disconnects every handler and rejects future connections
    pub fn destroy(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
        }
        self.disconnect_all();
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    pub fn connection_count(&self) -> usize {
        self.state
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.connected.get())
            .count()
    }

    fn snapshot(&self) -> Vec<Rc<Slot<T>>> {
        self.state.borrow().slots.clone()
    }
}

impl<T: 'static> Disposable for Signal<T> {
    fn dispose(&self) {
        self.destroy();
    }
}

fn invoke<T>(slot: &Slot<T>, value: &T) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| (slot.handler)(value)));
    if let Err(payload) = result {
        error!(
            "Signal handler panicked, continuing dispatch: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// Extracts the message carried by a caught panic
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
