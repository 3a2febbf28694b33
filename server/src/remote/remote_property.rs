use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::debug;

use tether_shared::{CommError, Disposable, DisposalBin, ObserverId, Payload, RemoteId};

use crate::{
    remote::{PropertyOptions, RemoteSignal, SignalOptions},
    server::Server,
};

/// What a single observer has been given in place of the top-level value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Override<T> {
    /// No override, the observer sees the top-level value
    Unset,
    /// The observer was explicitly given no value
    Nil,
    Value(T),
}

struct PropertyState<T> {
    top: T,
    // `None` is an explicit nil, distinct from having no entry
    overrides: HashMap<ObserverId, Option<T>>,
}

impl<T: Clone> PropertyState<T> {
    fn effective(&self, observer: &ObserverId) -> Option<T> {
        match self.overrides.get(observer) {
            Some(value) => value.clone(),
            None => Some(self.top.clone()),
        }
    }
}

/// A value owned by the server and replicated to every observer, with
/// optional per-observer overrides.
///
/// Observers ask for their value by firing an empty event on the
/// underlying channel; the server answers with the observer's effective
/// value at that moment.
pub struct RemoteProperty<T: Payload> {
    server: Server,
    signal: RemoteSignal<Option<T>, ()>,
    state: Rc<RefCell<PropertyState<T>>>,
    connections: Rc<DisposalBin>,
}

impl<T: Payload> Clone for RemoteProperty<T> {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
            signal: self.signal.clone(),
            state: self.state.clone(),
            connections: self.connections.clone(),
        }
    }
}

impl<T: Payload> RemoteProperty<T> {
    pub(crate) fn new(
        server: &Server,
        remote: RemoteId,
        initial: T,
        options: PropertyOptions<T>,
    ) -> Result<Self, CommError> {
        let signal = RemoteSignal::new(
            server,
            remote,
            SignalOptions {
                inbound: options.inbound,
                outbound: options.outbound,
                delivery: options.delivery,
            },
        )?;
        let state = Rc::new(RefCell::new(PropertyState {
            top: initial,
            overrides: HashMap::new(),
        }));
        let connections = Rc::new(DisposalBin::new());

        // value requests
        let request_state = state.clone();
        let request_signal = signal.clone();
        connections.add(signal.connect(move |observer, ()| {
            let value = request_state.borrow().effective(&observer);
            request_signal.fire(observer, value);
        }));

        // overrides must not outlive the observer they belong to
        let cleanup_state = state.clone();
        connections.add(server.observer_removed().connect(move |observer: &ObserverId| {
            cleanup_state.borrow_mut().overrides.remove(observer);
        }));

        Ok(Self {
            server: server.clone(),
            signal,
            state,
            connections,
        })
    }

    pub fn remote(&self) -> &RemoteId {
        self.signal.remote()
    }

    /// Sets the top-level value, clears every override and sends the value to
    /// all observers
    pub fn set(&self, value: T) {
        {
            let mut state = self.state.borrow_mut();
            state.top = value.clone();
            state.overrides.clear();
        }
        self.signal.fire_all(Some(value));
    }

    /// Sets the top-level value, keeping overrides. Only observers without
    /// an override are sent the new value.
    pub fn set_top(&self, value: T) {
        self.state.borrow_mut().top = value.clone();
        let state = self.state.clone();
        self.signal.fire_filter(
            move |observer, _| !state.borrow().overrides.contains_key(&observer),
            Some(value),
        );
    }

    /// Overrides the value for one observer. `None` overrides with an
    /// explicit nil.
    ///
    /// The value is always sent, but the override is only kept while the
    /// observer is connected.
    pub fn set_for(&self, observer: ObserverId, value: Option<T>) {
        if self.server.is_observer(&observer) {
            self.state
                .borrow_mut()
                .overrides
                .insert(observer, value.clone());
        } else {
            debug!(
                "{} is not connected, not keeping override for {}",
                observer,
                self.remote()
            );
        }
        self.signal.fire(observer, value);
    }

    /// Calls [`RemoteProperty::set_for`] for every connected observer that
    /// passes `predicate`
    pub fn set_filter(&self, predicate: impl Fn(ObserverId, &Option<T>) -> bool, value: Option<T>) {
        for observer in self.server.observers() {
            if predicate(observer, &value) {
                self.set_for(observer, value.clone());
            }
        }
    }

    /// Removes an observer's override and sends it the top-level value.
    /// Does nothing if the observer has no override.
    pub fn clear_for(&self, observer: ObserverId) {
        let top = {
            let mut state = self.state.borrow_mut();
            if state.overrides.remove(&observer).is_none() {
                return;
            }
            state.top.clone()
        };
        self.signal.fire(observer, Some(top));
    }

    /// The top-level value
    pub fn get(&self) -> T {
        self.state.borrow().top.clone()
    }

    /// The value `observer` sees: its override if it has one, the top-level
    /// value otherwise
    pub fn get_for(&self, observer: ObserverId) -> Option<T> {
        self.state.borrow().effective(&observer)
    }

    pub fn override_for(&self, observer: ObserverId) -> Override<T> {
        match self.state.borrow().overrides.get(&observer) {
            None => Override::Unset,
            Some(None) => Override::Nil,
            Some(Some(value)) => Override::Value(value.clone()),
        }
    }

    pub fn destroy(&self) {
        self.connections.dispose_all();
        self.signal.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.signal.is_destroyed()
    }
}

impl<T: Payload> Disposable for RemoteProperty<T> {
    fn dispose(&self) {
        self.destroy();
    }
}
