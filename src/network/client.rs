//! One-shot TCP value fetch

use crate::common::{Error, Result};
use crate::wire::{decode_body, DataMessage, Message};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Upper bound on a Data body read from a peer
const MAX_BODY: u64 = 64 * 1024;

/// Connect to a peer and read the single Data body it writes back
pub async fn fetch_value(addr: SocketAddr, timeout: Duration) -> Result<DataMessage> {
    let fetch = async {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("{}: {}", addr, e)))?;

        let mut body = Vec::new();
        stream.take(MAX_BODY).read_to_end(&mut body).await?;

        match decode_body(&body)? {
            Message::Data(data) => Ok(data),
            other => Err(Error::MalformedMessage(format!(
                "expected a data body from {}, got {}",
                addr,
                other.kind()
            ))),
        }
    };

    tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| Error::Timeout(format!("fetching value from {}", addr)))?
}
