use std::{cell::Cell, fmt::Display};

use log::info;

use tether_shared::{
    CommError, Disposable, DisposalBin, ObserverId, Payload, RemoteId, RemoteKind,
};

use crate::{
    remote::{
        FunctionOptions, PropertyOptions, RemoteFunction, RemoteProperty, RemoteSignal,
        SignalOptions,
    },
    server::Server,
};

/// Creates remote objects under a namespace and tears them all down
/// together.
///
/// Only one `ServerComm` may own a namespace on a given [`Server`] at a
/// time. Destroying it releases the namespace.
pub struct ServerComm {
    server: Server,
    namespace: String,
    remotes: DisposalBin,
    destroyed: Cell<bool>,
}

impl ServerComm {
    pub fn new(server: &Server, namespace: &str) -> Result<Self, CommError> {
        server.claim_namespace(namespace)?;
        info!("ServerComm created for namespace `{}`", namespace);

        Ok(Self {
            server: server.clone(),
            namespace: namespace.to_string(),
            remotes: DisposalBin::new(),
            destroyed: Cell::new(false),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Binds `handler` as the function observers reach under `name`.
    /// An `Err` from the handler fails that call for the caller.
    pub fn bind_function<Req, Res, E, F>(
        &self,
        name: &str,
        handler: F,
    ) -> Result<RemoteFunction, CommError>
    where
        Req: Payload,
        Res: Payload,
        E: Display,
        F: Fn(ObserverId, Req) -> Result<Res, E> + 'static,
    {
        self.bind_function_with(name, handler, FunctionOptions::default())
    }

    pub fn bind_function_with<Req, Res, E, F>(
        &self,
        name: &str,
        handler: F,
        options: FunctionOptions<Req, Res>,
    ) -> Result<RemoteFunction, CommError>
    where
        Req: Payload,
        Res: Payload,
        E: Display,
        F: Fn(ObserverId, Req) -> Result<Res, E> + 'static,
    {
        let remote = self.remote_id(RemoteKind::Call, name)?;
        let function = RemoteFunction::bind(&self.server, remote, handler, options)?;
        self.remotes.add(function.clone());
        Ok(function)
    }

    /// Creates a signal that carries `T` in both directions
    pub fn create_signal<T: Payload>(&self, name: &str) -> Result<RemoteSignal<T>, CommError> {
        self.create_signal_with(name, SignalOptions::default())
    }

    pub fn create_signal_with<Out: Payload, In: Payload>(
        &self,
        name: &str,
        options: SignalOptions<Out, In>,
    ) -> Result<RemoteSignal<Out, In>, CommError> {
        let remote = self.remote_id(RemoteKind::Event, name)?;
        let signal = RemoteSignal::new(&self.server, remote, options)?;
        self.remotes.add(signal.clone());
        Ok(signal)
    }

    pub fn create_property<T: Payload>(
        &self,
        name: &str,
        initial: T,
    ) -> Result<RemoteProperty<T>, CommError> {
        self.create_property_with(name, initial, PropertyOptions::default())
    }

    pub fn create_property_with<T: Payload>(
        &self,
        name: &str,
        initial: T,
        options: PropertyOptions<T>,
    ) -> Result<RemoteProperty<T>, CommError> {
        let remote = self.remote_id(RemoteKind::Property, name)?;
        let property = RemoteProperty::new(&self.server, remote, initial, options)?;
        self.remotes.add(property.clone());
        Ok(property)
    }

    /// Destroys every remote created through this registry and releases the
    /// namespace. Calling this more than once is a no-op.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.remotes.dispose_all();
        self.server.release_namespace(&self.namespace);
        info!("ServerComm for namespace `{}` destroyed", self.namespace);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn remote_id(&self, kind: RemoteKind, name: &str) -> Result<RemoteId, CommError> {
        if self.is_destroyed() {
            return Err(CommError::Destroyed {
                what: format!("ServerComm `{}`", self.namespace),
            });
        }
        Ok(RemoteId::new(&self.namespace, kind, name))
    }
}

impl Disposable for ServerComm {
    fn dispose(&self) {
        self.destroy();
    }
}
