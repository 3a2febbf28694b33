use smol::channel::{self, Receiver, Sender};

use tether_shared::Delivery;

use super::{PacketSender, SendError};

/// Client-side sender backed by an in-memory queue
pub struct PacketChannel;

impl PacketChannel {
    pub fn unbounded() -> (Box<dyn PacketSender>, Receiver<Box<[u8]>>) {
        let (packet_sender, packet_receiver) = channel::unbounded();
        (Box::new(packet_sender), packet_receiver)
    }
}

impl PacketSender for Sender<Box<[u8]>> {
    fn send(&self, _delivery: Delivery, payload: &[u8]) -> Result<(), SendError> {
        self.try_send(payload.into()).map_err(|_| SendError)
    }
}
