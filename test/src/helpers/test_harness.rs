use std::{future::Future, time::Duration};

use tether_client::{Client, ClientConfig};
use tether_server::{Server, ServerComm};
use tether_shared::Scheduler;

use crate::{helpers::TestClient, local_socket::LocalHub};

/// A listening server plus the hub its clients connect through, all on one
/// scheduler
pub struct TestHarness {
    pub scheduler: Scheduler,
    pub server: Server,
    pub hub: LocalHub,
}

impl TestHarness {
    pub fn new() -> Self {
        let scheduler = Scheduler::new();
        let server = Server::new(&scheduler);
        let (hub, socket) = LocalHub::new(&scheduler);
        server.listen(socket);

        Self {
            scheduler,
            server,
            hub,
        }
    }

    pub fn server_comm(&self, namespace: &str) -> ServerComm {
        match ServerComm::new(&self.server, namespace) {
            Ok(comm) => comm,
            Err(error) => panic!("cannot create ServerComm: {}", error),
        }
    }

    pub fn connect_client(&self) -> TestClient {
        self.connect_client_with(ClientConfig {
            discovery_timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        })
    }

    pub fn connect_client_with(&self, config: ClientConfig) -> TestClient {
        let client = Client::new(&self.scheduler, config);
        let (observer, socket) = self.hub.connect();
        client.connect(socket);
        self.flush();

        TestClient { observer, client }
    }

    /// Runs every task that can make progress: delivers queued packets in
    /// both directions and the handlers they trigger
    pub fn flush(&self) {
        self.scheduler.flush();
    }

    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        let output = self.scheduler.block_on(future);
        self.flush();
        output
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
