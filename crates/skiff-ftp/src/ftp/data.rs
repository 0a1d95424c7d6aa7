//! Data-channel setup — passive (PASV) and active (PORT) modes.

use crate::ftp::codec::FtpCodec;
use crate::ftp::tls;
use skiff_core::{ClientError, ClientResult};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_native_tls::TlsStream;

/// An open data connection, plain or PROT P protected.
pub enum DataStream {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
}

impl DataStream {
    pub async fn read(&mut self, buf: &mut [u8]) -> ClientResult<usize> {
        let n = match self {
            DataStream::Plain(s) => s.read(buf).await?,
            DataStream::Tls(s) => s.read(buf).await?,
        };
        Ok(n)
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> ClientResult<()> {
        match self {
            DataStream::Plain(s) => s.write_all(buf).await?,
            DataStream::Tls(s) => s.write_all(buf).await?,
        }
        Ok(())
    }

    /// Signal end-of-data to the server. STOR completion replies are
    /// held back until the client closes its side.
    pub async fn shutdown(&mut self) -> ClientResult<()> {
        match self {
            DataStream::Plain(s) => s.shutdown().await?,
            DataStream::Tls(s) => s.shutdown().await?,
        }
        Ok(())
    }
}

/// Open a data connection for the next transfer command.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    passive: bool,
    secured: bool,
    host: &str,
    timeout_secs: u64,
) -> ClientResult<DataStream> {
    let stream = if passive {
        open_passive(codec, host, timeout_secs).await?
    } else {
        open_active(codec, timeout_secs).await?
    };
    stream.set_nodelay(true).ok();

    if secured {
        let tls = tls::wrap_data_stream(stream, host).await?;
        Ok(DataStream::Tls(tls))
    } else {
        Ok(DataStream::Plain(stream))
    }
}

/// PASV: the server names an address, we connect to it. The host part
/// of the reply is ignored in favor of the control-channel host, which
/// sidesteps NAT setups advertising private addresses.
async fn open_passive(
    codec: &mut FtpCodec,
    host: &str,
    timeout_secs: u64,
) -> ClientResult<TcpStream> {
    let reply = codec.execute("PASV").await?;
    if !reply.is_success() {
        return Err(reply.into_error());
    }
    let port = parse_pasv_port(&reply.text())?;

    let addr = format!("{}:{}", host, port);
    log::debug!("Opening passive data connection to {}", addr);
    let stream = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        TcpStream::connect(&addr),
    )
    .await
    .map_err(|_| ClientError::remote(format!("Data connection to {} timed out", addr)))?
    .map_err(|e| ClientError::remote(format!("Data connection to {} failed: {}", addr, e)))?;
    Ok(stream)
}

/// PORT: we listen, the server connects back.
async fn open_active(codec: &mut FtpCodec, timeout_secs: u64) -> ClientResult<TcpStream> {
    let listener = TcpListener::bind("0.0.0.0:0")
        .await
        .map_err(|e| ClientError::remote(format!("Could not bind active-mode listener: {}", e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| ClientError::remote(format!("Active-mode listener has no address: {}", e)))?;

    // The PORT argument wants our address as seen from the control
    // socket, not the wildcard we bound to.
    let our_ip = local_control_ip(codec)?;
    let port = local.port();
    let cmd = format!(
        "PORT {},{},{}",
        our_ip.replace('.', ","),
        port / 256,
        port % 256
    );
    codec.expect_ok(&cmd).await?;

    let (stream, peer) = tokio::time::timeout(Duration::from_secs(timeout_secs), listener.accept())
        .await
        .map_err(|_| ClientError::remote("Timed out waiting for active-mode connection"))?
        .map_err(|e| ClientError::remote(format!("Active-mode accept failed: {}", e)))?;
    log::debug!("Accepted active data connection from {}", peer);
    Ok(stream)
}

fn local_control_ip(codec: &FtpCodec) -> ClientResult<String> {
    use crate::ftp::codec::WriteHalf;
    let addr = match &codec.writer {
        WriteHalf::Plain(w) => w.local_addr(),
        WriteHalf::Tls(_) => {
            return Err(ClientError::remote(
                "Active mode is not available on a TLS control channel",
            ))
        }
    }
    .map_err(|e| ClientError::remote(format!("Could not read local address: {}", e)))?;
    match addr.ip() {
        std::net::IpAddr::V4(v4) => Ok(v4.to_string()),
        std::net::IpAddr::V6(_) => Err(ClientError::remote("Active mode requires IPv4")),
    }
}

/// Extract the data port from a PASV reply such as
/// `227 Entering Passive Mode (192,168,1,2,19,137)`.
pub fn parse_pasv_port(text: &str) -> ClientResult<u16> {
    let re = regex::Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").unwrap();
    let caps = re
        .captures(text)
        .ok_or_else(|| ClientError::remote(format!("Unparseable PASV reply: {}", text)))?;
    let p1: u16 = caps[5]
        .parse()
        .map_err(|_| ClientError::remote("PASV port out of range"))?;
    let p2: u16 = caps[6]
        .parse()
        .map_err(|_| ClientError::remote("PASV port out of range"))?;
    if p1 > 255 || p2 > 255 {
        return Err(ClientError::remote("PASV port out of range"));
    }
    Ok(p1 * 256 + p2)
}
