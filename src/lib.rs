//! # skiff — protocol-agnostic file-transfer core
//!
//! Facade over the workspace crates: one import gives the data model,
//! the protocol clients, the transfer engine, credential storage and
//! saved sites.
//!
//! ```no_run
//! use skiff::{create_client, ConnectionInfo, Protocol, TransferClient};
//!
//! # async fn demo() -> Result<(), skiff::ClientError> {
//! let mut info = ConnectionInfo::default();
//! info.protocol = Protocol::Sftp;
//! info.host = "sftp.example.com".to_string();
//! info.username = "alex".to_string();
//!
//! let mut client = create_client(info)?;
//! client.connect().await?;
//! let entries = client.list_dir(".").await?;
//! # Ok(())
//! # }
//! ```

pub use skiff_core::{
    path, ClientError, ClientResult, ConnectionInfo, ErrorKind, HostKeyPolicy, ProgressFn,
    Protocol, RemoteFile, TransferClient,
};
pub use skiff_credentials::{Availability, CredentialBackend, Tier};
pub use skiff_ftp::{FtpClient, FtpsClient};
pub use skiff_sftp::SftpClient;
pub use skiff_sites::{Settings, Site, SiteManager};
pub use skiff_transfer::{TransferDirection, TransferItem, TransferManager, TransferStatus};

/// Build an unconnected client for the requested protocol. SCP and
/// WebDAV are declared in the profile format but have no client yet.
pub fn create_client(info: ConnectionInfo) -> ClientResult<Box<dyn TransferClient + Send>> {
    log::debug!(
        "Creating {} client for {}",
        info.protocol.as_str(),
        info.host
    );
    match info.protocol {
        Protocol::Ftp => Ok(Box::new(FtpClient::new(info))),
        Protocol::Ftps => Ok(Box::new(FtpsClient::new(info))),
        Protocol::Sftp => Ok(Box::new(SftpClient::new(info))),
        Protocol::Scp | Protocol::Webdav => Err(ClientError::unsupported(format!(
            "No client for protocol '{}'",
            info.protocol.as_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_clients_for_supported_protocols() {
        for protocol in [Protocol::Ftp, Protocol::Ftps, Protocol::Sftp] {
            let info = ConnectionInfo {
                protocol,
                host: "example.com".to_string(),
                ..ConnectionInfo::default()
            };
            let client = create_client(info).unwrap();
            assert!(!client.connected());
        }
    }

    #[test]
    fn rejects_protocols_without_a_client() {
        for protocol in [Protocol::Scp, Protocol::Webdav] {
            let info = ConnectionInfo {
                protocol,
                ..ConnectionInfo::default()
            };
            let err = create_client(info).err().expect("expected an error");
            assert_eq!(err.kind, ErrorKind::Unsupported);
        }
    }
}
