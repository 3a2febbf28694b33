cfg_if! {
    if #[cfg(feature = "transport_channel")] {
        mod channel;
        pub use channel::PacketChannel;
    } else {}
}

use smol::channel::Receiver;

use tether_shared::Delivery;

#[derive(Debug)]
pub struct SendError;

pub trait PacketSender {
    /// Sends a packet to the server
    fn send(&self, delivery: Delivery, payload: &[u8]) -> Result<(), SendError>;
}

/// A connected transport: an outbound sender plus the stream of packets from
/// the server, in the order the server sent them. The connection is over
/// once the stream closes.
pub struct Socket {
    sender: Box<dyn PacketSender>,
    packets: Receiver<Box<[u8]>>,
}

impl Socket {
    pub fn new(sender: Box<dyn PacketSender>, packets: Receiver<Box<[u8]>>) -> Self {
        Self { sender, packets }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn PacketSender>, Receiver<Box<[u8]>>) {
        (self.sender, self.packets)
    }
}
