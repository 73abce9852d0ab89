//! The single-question exchange with the upstream nameserver.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use dns_wire::types::{Message, UDP_MAX_LEN};

/// Total deadline for one upstream exchange, covering bind, send, and
/// receive.
pub(crate) const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);

/// Send one query to the upstream nameserver and await its response.
///
/// The socket is bound fresh for this exchange and dropped on every
/// exit path.  Any failure - socket errors, the deadline expiring, or
/// an undecodable response - yields `None`: the caller drops the
/// sub-query from its merge and the failure goes no further.
pub(crate) async fn query_upstream(address: SocketAddr, query: Message) -> Option<Message> {
    match timeout(UPSTREAM_TIMEOUT, query_upstream_notimeout(address, query)).await {
        Ok(res) => res,
        Err(_) => {
            tracing::debug!(%address, "upstream query timed out");
            None
        }
    }
}

/// Timeout-less version of `query_upstream`.
async fn query_upstream_notimeout(address: SocketAddr, query: Message) -> Option<Message> {
    let id = query.header.id;

    let serialised = match query.into_octets() {
        Ok(serialised) => serialised,
        Err(error) => {
            tracing::warn!(%id, %error, "could not serialise upstream query");
            return None;
        }
    };

    let sock = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    sock.connect(address).await.ok()?;
    sock.send(&serialised).await.ok()?;

    let mut buf = vec![0u8; UDP_MAX_LEN];
    let size = sock.recv(&mut buf).await.ok()?;

    match Message::from_octets(&buf[..size]) {
        Ok(response) => Some(response),
        Err(error) => {
            tracing::debug!(%id, %error, "could not parse upstream response");
            None
        }
    }
}
