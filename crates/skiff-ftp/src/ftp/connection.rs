//! Control-connection establishment.

use crate::ftp::codec::{FtpCodec, Reply};
use skiff_core::{ClientError, ClientResult};
use std::time::Duration;
use tokio::net::TcpStream;

/// Open the control connection and consume the server banner.
pub async fn connect(host: &str, port: u16, timeout_secs: u64) -> ClientResult<(FtpCodec, Reply)> {
    let addr = format!("{}:{}", host, port);
    log::debug!("Connecting control channel to {}", addr);

    let stream = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        TcpStream::connect(&addr),
    )
    .await
    .map_err(|_| ClientError::connection_failed(format!("Connection to {} timed out", addr)))?
    .map_err(|e| ClientError::connection_failed(format!("Could not connect to {}: {}", addr, e)))?;

    stream.set_nodelay(true).ok();

    let mut codec = FtpCodec::from_tcp(stream);
    let banner = codec.read_reply().await?;
    if !banner.is_success() {
        return Err(ClientError::connection_failed(format!(
            "Server rejected the connection: {}",
            banner.text()
        )));
    }
    log::debug!("Server banner: {}", banner.text());
    Ok((codec, banner))
}
