/// Fire-and-forget UDP datagrams to the display
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("UDP send to {target} failed: {source}")]
    Io {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Sends UTF-8 text to a fixed target from an ephemeral local port
#[derive(Debug, Clone)]
pub struct UdpBroadcaster {
    target: SocketAddr,
}

impl UdpBroadcaster {
    pub fn new(target: SocketAddr) -> Self {
        UdpBroadcaster { target }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one datagram; there is no acknowledgement and no retry
    pub async fn send(&self, message: &str) -> Result<usize, BroadcastError> {
        let local: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let io_error = |source| BroadcastError::Io {
            target: self.target,
            source,
        };

        let socket = UdpSocket::bind(local).await.map_err(io_error)?;
        socket
            .send_to(message.as_bytes(), self.target)
            .await
            .map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn delivers_a_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broadcaster = UdpBroadcaster::new(receiver.local_addr().unwrap());

        let sent = broadcaster.send("pH: 7.00 pH").await.unwrap();
        assert_eq!(sent, 11);

        let mut buf = [0u8; 64];
        let (len, _) = timeout(Duration::from_secs(5), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"pH: 7.00 pH");
    }
}
