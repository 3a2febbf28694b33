cfg_if! {
    if #[cfg(feature = "transport_channel")] {
        mod channel;
        pub use channel::PacketChannel;
    } else {}
}

use smol::channel::Receiver;

use tether_shared::{Delivery, ObserverId};

#[derive(Debug)]
pub struct SendError;

pub trait PacketSender {
    /// Sends a packet to a single observer
    fn send(&self, observer: &ObserverId, delivery: Delivery, payload: &[u8])
        -> Result<(), SendError>;
}

/// What the transport reports to the server, in arrival order
pub enum SocketEvent {
    Connected(ObserverId),
    Disconnected(ObserverId),
    Packet(ObserverId, Box<[u8]>),
}

/// A listening transport: an outbound sender plus the stream of inbound events.
/// Events from the same observer must arrive in the order they were sent.
pub struct Socket {
    sender: Box<dyn PacketSender>,
    events: Receiver<SocketEvent>,
}

impl Socket {
    pub fn new(sender: Box<dyn PacketSender>, events: Receiver<SocketEvent>) -> Self {
        Self { sender, events }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn PacketSender>, Receiver<SocketEvent>) {
        (self.sender, self.events)
    }
}
