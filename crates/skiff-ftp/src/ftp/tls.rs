//! TLS negotiation for explicit FTPS (RFC 4217).

use crate::ftp::codec::{FtpCodec, ReadHalf, WriteHalf};
use skiff_core::{ClientError, ClientResult};
use tokio::net::TcpStream;
use tokio_native_tls::{TlsConnector, TlsStream};

/// Build the TLS connector with platform certificate verification.
pub fn build_connector() -> ClientResult<TlsConnector> {
    let inner = native_tls::TlsConnector::builder()
        .build()
        .map_err(|e| ClientError::connection_failed(format!("TLS setup failed: {}", e)))?;
    Ok(TlsConnector::from(inner))
}

/// Upgrade an established plain control connection to TLS after the
/// server accepted `AUTH TLS`. The split halves are reunited into the
/// original stream before the handshake.
pub async fn upgrade(codec: FtpCodec, host: &str) -> ClientResult<FtpCodec> {
    let (reader, writer) = (codec.reader, codec.writer);
    let stream = match (reader, writer) {
        (ReadHalf::Plain(rd), WriteHalf::Plain(wr)) => rd
            .into_inner()
            .reunite(wr)
            .map_err(|e| ClientError::connection_failed(format!("Stream reunite failed: {}", e)))?,
        _ => {
            return Err(ClientError::connection_failed(
                "Control connection is already TLS-wrapped",
            ))
        }
    };

    let connector = build_connector()?;
    let tls = connector
        .connect(host, stream)
        .await
        .map_err(|e| ClientError::connection_failed(format!("TLS handshake failed: {}", e)))?;
    log::debug!("Control channel upgraded to TLS");
    Ok(FtpCodec::from_tls(tls))
}

/// Wrap a freshly opened data connection in TLS (PROT P).
pub async fn wrap_data_stream(stream: TcpStream, host: &str) -> ClientResult<TlsStream<TcpStream>> {
    let connector = build_connector()?;
    connector
        .connect(host, stream)
        .await
        .map_err(|e| ClientError::remote(format!("Data-channel TLS handshake failed: {}", e)))
}
