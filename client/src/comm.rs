use std::cell::Cell;

use log::info;

use tether_shared::{CommError, Disposable, DisposalBin, Payload, RemoteId, RemoteKind};

use crate::{
    client::Client,
    remote::{
        ClientRemoteFunction, ClientRemoteProperty, ClientRemoteSignal, FunctionOptions,
        PropertyOptions, SignalOptions,
    },
};

/// Looks up the remotes a server created under a namespace.
///
/// Every lookup waits for the server to announce the remote, for at most the
/// client's discovery timeout, and fails with [`CommError::NotFound`] after
/// that. Destroying the registry destroys every signal and property it
/// handed out.
pub struct ClientComm {
    client: Client,
    namespace: String,
    remotes: DisposalBin,
    destroyed: Cell<bool>,
}

impl ClientComm {
    pub fn new(client: &Client, namespace: &str) -> Self {
        Self {
            client: client.clone(),
            namespace: namespace.to_string(),
            remotes: DisposalBin::new(),
            destroyed: Cell::new(false),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Names of every remote of `kind` the server has announced in this
    /// namespace so far
    pub fn remote_names(&self, kind: RemoteKind) -> Vec<String> {
        self.client.remote_names(&self.namespace, kind)
    }

    /// Finds a signal that carries `T` in both directions
    pub async fn get_signal<T: Payload>(
        &self,
        name: &str,
    ) -> Result<ClientRemoteSignal<T>, CommError> {
        self.get_signal_with(name, SignalOptions::default()).await
    }

    pub async fn get_signal_with<Out: Payload, In: Payload>(
        &self,
        name: &str,
        options: SignalOptions<Out, In>,
    ) -> Result<ClientRemoteSignal<Out, In>, CommError> {
        let remote = self.discover(RemoteKind::Event, name).await?;
        let signal = ClientRemoteSignal::new(&self.client, remote, options);
        self.remotes.add(signal.clone());
        Ok(signal)
    }

    pub async fn get_function<Req: Payload, Res: Payload>(
        &self,
        name: &str,
    ) -> Result<ClientRemoteFunction<Req, Res>, CommError> {
        self.get_function_with(name, FunctionOptions::default()).await
    }

    pub async fn get_function_with<Req: Payload, Res: Payload>(
        &self,
        name: &str,
        options: FunctionOptions<Req, Res>,
    ) -> Result<ClientRemoteFunction<Req, Res>, CommError> {
        let remote = self.discover(RemoteKind::Call, name).await?;
        Ok(ClientRemoteFunction::new(&self.client, remote, options))
    }

    pub async fn get_property<T: Payload + PartialEq>(
        &self,
        name: &str,
    ) -> Result<ClientRemoteProperty<T>, CommError> {
        self.get_property_with(name, PropertyOptions::default()).await
    }

    pub async fn get_property_with<T: Payload + PartialEq>(
        &self,
        name: &str,
        options: PropertyOptions<T>,
    ) -> Result<ClientRemoteProperty<T>, CommError> {
        let remote = self.discover(RemoteKind::Property, name).await?;
        let property = ClientRemoteProperty::new(&self.client, remote, options);
        self.remotes.add(property.clone());
        Ok(property)
    }

    /// Destroys every signal and property obtained through this registry.
    /// Calling this more than once is a no-op.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.remotes.dispose_all();
        info!("ClientComm for namespace `{}` destroyed", self.namespace);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    async fn discover(&self, kind: RemoteKind, name: &str) -> Result<RemoteId, CommError> {
        let remote = RemoteId::new(&self.namespace, kind, name);
        self.check_alive()?;
        self.client.discover(&remote).await?;
        // the registry may have been destroyed while waiting
        self.check_alive()?;
        Ok(remote)
    }

    fn check_alive(&self) -> Result<(), CommError> {
        if self.is_destroyed() {
            return Err(CommError::Destroyed {
                what: format!("ClientComm `{}`", self.namespace),
            });
        }
        Ok(())
    }
}

impl Disposable for ClientComm {
    fn dispose(&self) {
        self.destroy();
    }
}
