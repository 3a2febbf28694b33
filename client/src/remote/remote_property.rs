use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use tether_shared::{Connection, Disposable, Payload, Promise, RemoteId, Scheduler, Signal};

use crate::{
    client::Client,
    remote::{ClientRemoteSignal, PropertyOptions, SignalOptions},
};

struct Mirror<T> {
    ready: bool,
    // `None` until ready, or when the server sent an explicit nil
    value: Option<T>,
}

/// The observer's copy of a server `RemoteProperty`.
///
/// Becomes ready once the first value arrives; the value is requested from
/// the server as soon as the property is created.
pub struct ClientRemoteProperty<T: Payload + PartialEq> {
    scheduler: Scheduler,
    signal: ClientRemoteSignal<Option<T>, ()>,
    mirror: Rc<RefCell<Mirror<T>>>,
    changed: Signal<Option<T>>,
}

impl<T: Payload + PartialEq> Clone for ClientRemoteProperty<T> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            signal: self.signal.clone(),
            mirror: self.mirror.clone(),
            changed: self.changed.clone(),
        }
    }
}

impl<T: Payload + PartialEq> ClientRemoteProperty<T> {
    pub(crate) fn new(client: &Client, remote: RemoteId, options: PropertyOptions<T>) -> Self {
        let signal = ClientRemoteSignal::new(
            client,
            remote,
            SignalOptions {
                inbound: options.inbound,
                ..SignalOptions::default()
            },
        );
        let mirror = Rc::new(RefCell::new(Mirror {
            ready: false,
            value: None,
        }));
        let changed = Signal::new();

        let update_mirror = mirror.clone();
        let update_changed = changed.clone();
        signal.connect(move |value: Option<T>| {
            let is_change = {
                let mut mirror = update_mirror.borrow_mut();
                let is_change = !mirror.ready || mirror.value != value;
                mirror.ready = true;
                mirror.value = value.clone();
                is_change
            };
            if is_change {
                update_changed.fire(value);
            }
        });

        // ask for the current value
        signal.fire(());

        Self {
            scheduler: client.scheduler().clone(),
            signal,
            mirror,
            changed,
        }
    }

    pub fn remote(&self) -> &RemoteId {
        self.signal.remote()
    }

    pub fn is_ready(&self) -> bool {
        self.mirror.borrow().ready
    }

    /// The last value received. `None` before the property is ready.
    pub fn get(&self) -> Option<T> {
        self.mirror.borrow().value.clone()
    }

    /// Fires with the first value and with every later value that differs
    /// from the one before it
    pub fn changed(&self) -> &Signal<Option<T>> {
        &self.changed
    }

    /// Calls `callback` with every new value. If the property is already
    /// ready, `callback` also gets the current value on the next tick, unless
    /// a newer value has reached it by then.
    pub fn observe(&self, callback: impl Fn(&Option<T>) + 'static) -> Connection {
        let callback = Rc::new(callback);
        // set once `changed` has delivered a newer value than the current one
        let superseded = Rc::new(Cell::new(false));

        let changed_callback = callback.clone();
        let changed_superseded = superseded.clone();
        let connection = self.changed.connect(move |value: &Option<T>| {
            changed_superseded.set(true);
            changed_callback(value);
        });

        if self.is_ready() {
            let mirror = self.mirror.clone();
            let deferred_connection = connection.clone();
            self.scheduler.defer(move || {
                if deferred_connection.is_connected() && !superseded.get() {
                    let value = mirror.borrow().value.clone();
                    callback(&value);
                }
            });
        }

        connection
    }

    /// Resolves with the value once the property is ready, right away if it
    /// already is
    pub fn on_ready(&self) -> Promise<Option<T>> {
        if self.is_ready() {
            return Promise::resolved(self.get());
        }
        Promise::spawn(&self.scheduler, self.changed.wait())
    }

    pub fn destroy(&self) {
        self.signal.destroy();
        self.changed.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.signal.is_destroyed()
    }
}

impl<T: Payload + PartialEq> Disposable for ClientRemoteProperty<T> {
    fn dispose(&self) {
        self.destroy();
    }
}
