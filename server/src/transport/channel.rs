use smol::channel::{self, Receiver, Sender};

use tether_shared::{Delivery, ObserverId};

use super::{PacketSender, SendError};

/// Server-side sender backed by an in-memory queue. Whatever drains the
/// queue is responsible for routing each packet to its observer.
pub struct PacketChannel;

impl PacketChannel {
    pub fn unbounded() -> (Box<dyn PacketSender>, Receiver<(ObserverId, Box<[u8]>)>) {
        let (packet_sender, packet_receiver) = channel::unbounded();
        (Box::new(packet_sender), packet_receiver)
    }
}

impl PacketSender for Sender<(ObserverId, Box<[u8]>)> {
    // the queue never drops, so both delivery modes are reliable here
    fn send(
        &self,
        observer: &ObserverId,
        _delivery: Delivery,
        payload: &[u8],
    ) -> Result<(), SendError> {
        self.try_send((*observer, payload.into()))
            .map_err(|_| SendError)
    }
}
