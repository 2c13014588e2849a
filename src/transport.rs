use std::{
    collections::VecDeque,
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
};

use anyhow::Result;
use engine::radio::{Packet, Radio, RadioError};

use crate::config;

/// The largest frame the adapter will accept; anything longer than a LoRa
/// payload would never fit the real link anyway.
const MAX_FRAME: usize = 512;

/// UDP-broadcast stand-in for the LoRa driver.
///
/// Bench meshes without radio hardware share one broadcast address, which
/// behaves enough like a shared half-duplex medium to exercise the
/// protocol. Signal strength is not observable on UDP, so every received
/// datagram reports the configured constant. Depending on the host's
/// routing, a node may hear its own broadcasts back; the engine absorbs
/// those through its self checks and duplicate caches.
///
/// Swapping in real hardware means implementing [`Radio`] over the LoRa
/// chip; nothing above this module changes.
pub struct UdpRadio {
    socket: UdpSocket,
    broadcast: SocketAddr,
    rssi: i32,
    pending: VecDeque<Packet>,
    buffer: [u8; MAX_FRAME],
}

impl UdpRadio {
    pub fn bind(config: &config::Radio) -> Result<Self> {
        let socket = UdpSocket::bind(config.listen)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            pending: VecDeque::with_capacity(16),
            broadcast: config.broadcast,
            buffer: [0; MAX_FRAME],
            rssi: config.rssi,
            socket,
        })
    }

    fn fill(&mut self) {
        loop {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, _)) => self.pending.push_back(Packet {
                    payload: self.buffer[..size].to_vec(),
                    rssi: self.rssi,
                }),
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }
}

impl Radio for UdpRadio {
    fn send(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        self.socket
            .send_to(bytes, self.broadcast)
            .map_err(|error| RadioError::new(error.to_string()))?;

        Ok(())
    }

    fn is_packet_ready(&mut self) -> bool {
        self.fill();
        !self.pending.is_empty()
    }

    fn take_packet(&mut self) -> Option<Packet> {
        self.pending.pop_front()
    }
}
