//! Control-channel command/reply codec (RFC 959 §4).
//!
//! Sends commands terminated with `\r\n` and reads single-line and
//! multi-line replies, parsing the 3-digit reply code.

use skiff_core::{ClientError, ClientResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

/// A complete FTP reply (possibly multi-line).
#[derive(Debug, Clone)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    /// Full reply text, all lines joined.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 1xx–3xx.
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    /// 1xx — positive preliminary (data transfer about to start).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 3xx — positive intermediate (more input expected).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Turn a rejection reply into a remote-operation error.
    pub fn into_error(self) -> ClientError {
        ClientError::remote(self.text())
    }
}

/// Abstraction over a plain-TCP or TLS-wrapped read half.
pub enum ReadHalf {
    Plain(BufReader<OwnedReadHalf>),
    Tls(BufReader<tokio::io::ReadHalf<TlsStream<TcpStream>>>),
}

/// Abstraction over a plain-TCP or TLS-wrapped write half.
pub enum WriteHalf {
    Plain(OwnedWriteHalf),
    Tls(tokio::io::WriteHalf<TlsStream<TcpStream>>),
}

/// The command/reply codec operating on split halves.
pub struct FtpCodec {
    pub reader: ReadHalf,
    pub writer: WriteHalf,
}

impl FtpCodec {
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (rd, wr) = stream.into_split();
        Self {
            reader: ReadHalf::Plain(BufReader::new(rd)),
            writer: WriteHalf::Plain(wr),
        }
    }

    pub fn from_tls(stream: TlsStream<TcpStream>) -> Self {
        let (rd, wr) = tokio::io::split(stream);
        Self {
            reader: ReadHalf::Tls(BufReader::new(rd)),
            writer: WriteHalf::Tls(wr),
        }
    }

    /// Send a raw command; the trailing CRLF is added here.
    pub async fn send_command(&mut self, cmd: &str) -> ClientResult<()> {
        let line = format!("{}\r\n", cmd);
        match &mut self.writer {
            WriteHalf::Plain(w) => w.write_all(line.as_bytes()).await?,
            WriteHalf::Tls(w) => w.write_all(line.as_bytes()).await?,
        }
        log::trace!(">>> {}", redact(cmd));
        Ok(())
    }

    async fn read_line_raw(&mut self) -> ClientResult<String> {
        let mut buf = String::new();
        let n = match &mut self.reader {
            ReadHalf::Plain(r) => r.read_line(&mut buf).await?,
            ReadHalf::Tls(r) => r.read_line(&mut buf).await?,
        };
        if n == 0 {
            return Err(ClientError::remote("Server closed the control connection"));
        }
        Ok(buf)
    }

    /// Read one complete reply. Multi-line replies start with `NNN-`
    /// and end at a line starting with `NNN `.
    pub async fn read_reply(&mut self) -> ClientResult<Reply> {
        let first = self.read_line_raw().await?;
        let first_trimmed = first.trim_end_matches(['\r', '\n']);

        let code = parse_code(first_trimmed)?;
        let mut lines = vec![first_trimmed.to_string()];

        let is_multi = first_trimmed.len() >= 4 && first_trimmed.as_bytes()[3] == b'-';
        if is_multi {
            let terminator = format!("{} ", code);
            loop {
                let next = self.read_line_raw().await?;
                let next_trimmed = next.trim_end_matches(['\r', '\n']);
                lines.push(next_trimmed.to_string());
                if next_trimmed.starts_with(&terminator) {
                    break;
                }
            }
        }

        let reply = Reply { code, lines };
        log::trace!("<<< {} {}", reply.code, reply.lines.last().map(String::as_str).unwrap_or(""));
        Ok(reply)
    }

    /// Send a command and read its reply.
    pub async fn execute(&mut self, cmd: &str) -> ClientResult<Reply> {
        self.send_command(cmd).await?;
        self.read_reply().await
    }

    /// Send a command and require a success (1xx–3xx) reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> ClientResult<Reply> {
        let reply = self.execute(cmd).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> ClientResult<u16> {
    if line.len() < 3 {
        return Err(ClientError::remote(format!(
            "Reply too short to contain a code: '{}'",
            line
        )));
    }
    // get() rather than a byte slice: index 3 may not be a char
    // boundary if a broken server replies with non-ASCII bytes.
    line.get(..3)
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(|| ClientError::remote(format!("Invalid reply code in: '{}'", line)))
}

/// Hide the password argument when trace-logging commands.
fn redact(cmd: &str) -> &str {
    if cmd.starts_with("PASS ") {
        "PASS ****"
    } else {
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_classes() {
        let r = Reply {
            code: 150,
            lines: vec!["150 Opening data connection".into()],
        };
        assert!(r.is_preliminary());
        assert!(r.is_success());

        let r = Reply {
            code: 350,
            lines: vec!["350 Ready for RNTO".into()],
        };
        assert!(r.is_intermediate());

        let r = Reply {
            code: 550,
            lines: vec!["550 No such file".into()],
        };
        assert!(!r.is_success());
    }

    #[test]
    fn code_parsing() {
        assert_eq!(parse_code("226 Transfer complete").unwrap(), 226);
        assert!(parse_code("xx").is_err());
        assert!(parse_code("abc def").is_err());
    }

    #[test]
    fn non_ascii_garbage_is_an_error_not_a_panic() {
        // Multi-byte characters put byte index 3 inside a code point.
        assert!(parse_code("ééé").is_err());
        assert!(parse_code("é23 hello").is_err());
        assert!(parse_code("22\u{e9} hello").is_err());
    }
}
