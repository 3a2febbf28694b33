use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// How long a lookup waits for the server to announce a remote before
    /// failing with `NotFound`
    pub discovery_timeout: Duration,
    /// Upper bound on how long a remote function call may take. `None`
    /// waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(60),
            call_timeout: None,
        }
    }
}
