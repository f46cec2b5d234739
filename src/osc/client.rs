/// OSC transport for avatar parameter messages
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use rosc::{encoder, OscMessage, OscPacket, OscType};
use tokio::net::UdpSocket;

use crate::error::RelayError;

const AVATAR_PARAMETER_PREFIX: &str = "/avatar/parameters/";

/// UDP client sending typed avatar parameter messages to a fixed target.
///
/// Only the three wire types this system ever produces are exposed. Each
/// send is one datagram, independent of every other send, so callers may
/// treat delivery as best-effort per message.
pub struct OscClient {
    socket: UdpSocket,
}

impl OscClient {
    /// Bind a local socket and direct all sends at `target`.
    pub async fn connect(target: SocketAddr) -> Result<Self, RelayError> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;

        Ok(Self { socket })
    }

    pub async fn send_int(&self, param: &str, value: i32) -> Result<(), RelayError> {
        self.send(param, OscType::Int(value)).await
    }

    pub async fn send_float(&self, param: &str, value: f32) -> Result<(), RelayError> {
        self.send(param, OscType::Float(value)).await
    }

    pub async fn send_bool(&self, param: &str, value: bool) -> Result<(), RelayError> {
        self.send(param, OscType::Bool(value)).await
    }

    async fn send(&self, param: &str, value: OscType) -> Result<(), RelayError> {
        let packet = OscPacket::Message(OscMessage {
            addr: format!("{}{}", AVATAR_PARAMETER_PREFIX, param),
            args: vec![value],
        });

        let payload = encoder::encode(&packet)?;
        self.socket.send(&payload).await?;

        Ok(())
    }
}
