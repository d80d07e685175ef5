use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::address::{self, SENTINEL_ADDRESS};
use crate::capture::Capture;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::line::read_line;
use crate::reputation::Verdict;
use crate::server::Dumptruck;
use crate::sink::{ArtifactName, Stored};

/// What happened to a connection once its handler returned.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Peer was on a blocklist; nothing was sent or stored.
    Blocked { zone: String },
    Finished(Stored),
}

/// Per-connection state.
pub struct SmtpSession {
    pub client_addr: SocketAddr,
    pub sequence: u64,
    pub mail_from: String,
    pub rcpt_to: String,
    pub in_data: bool,
}

impl SmtpSession {
    pub fn new(client_addr: SocketAddr, sequence: u64) -> Self {
        Self {
            client_addr,
            sequence,
            mail_from: SENTINEL_ADDRESS.to_string(),
            rcpt_to: SENTINEL_ADDRESS.to_string(),
            in_data: false,
        }
    }

    /// Applies a dispatched command. Returns `false` once the peer said QUIT.
    pub fn apply(&mut self, command: Command, line: &str) -> bool {
        match command {
            Command::Mail => self.mail_from = address::sanitize(line),
            Command::Rcpt => self.rcpt_to = address::sanitize(line),
            Command::Data => self.in_data = true,
            Command::Quit => return false,
            _ => {}
        }
        true
    }

    /// Drives the connection from banner to stored artifact.
    ///
    /// Every line read is appended to the capture before anything else. While
    /// in DATA no replies are sent; the first line starting with `.` ends
    /// DATA and is then dispatched like a command line. A read failure is
    /// handled like QUIT. Only a failed banner aborts the session; once a
    /// reply write fails no more replies are sent, but lines are still read
    /// and captured until EOF or QUIT.
    pub async fn run<S>(mut self, stream: S, server: &Dumptruck) -> Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let client_addr = self.client_addr;
        let config = &server.config;
        let logger = &server.logger;

        if config.spam_detection {
            let verdict = server.checker.check(&client_addr).await;
            if let Verdict::Listed { zone } = verdict {
                let message = format!("discarding mail from {} (listed in {})", client_addr, zone);
                logger.log(&client_addr, &message).await;
                return Ok(Outcome::Blocked { zone });
            }
        }
        logger
            .log(&client_addr, &format!("receiving mail from {}", client_addr))
            .await;

        let mut capture = Capture::create(&config.temp_dir).await?;

        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let banner = server.protocol.banner();
        send_line(&mut writer, banner).await?;
        logger.log_traffic(&client_addr, "<<", banner.as_bytes()).await;

        let mut buf = vec![0u8; config.line_capacity];
        let mut peer_listening = true;
        loop {
            let length = match read_line(&mut reader, &mut buf).await {
                Ok(length) => length,
                Err(e) => {
                    if logger.is_verbose() {
                        logger.log(&client_addr, &format!("read ended: {}", e)).await;
                    }
                    break;
                }
            };
            let raw = &buf[..length];
            capture.append(raw).await?;
            logger.log_traffic(&client_addr, ">>", raw).await;

            if self.in_data && raw.first() == Some(&b'.') {
                self.in_data = false;
            }
            if self.in_data {
                continue;
            }

            let line = String::from_utf8_lossy(raw);
            let (command, reply) = server.protocol.dispatch(&line);
            if peer_listening {
                match send_line(&mut writer, reply.as_str()).await {
                    Ok(()) => {
                        logger.log_traffic(&client_addr, "<<", reply.as_str().as_bytes()).await;
                    }
                    Err(e) => {
                        logger.log(&client_addr, &format!("reply failed: {}", e)).await;
                        peer_listening = false;
                    }
                }
            }

            if !self.apply(command, &line) {
                break;
            }
        }

        let finished = capture.finish().await?;
        let mut name = ArtifactName::now(&self.mail_from, &self.rcpt_to);
        if config.unique_names {
            name = name.with_sequence(self.sequence);
        }
        let stored = server.sink.store(finished, &name).await?;
        match &stored {
            Stored::Saved { path, size } => {
                logger
                    .log(&client_addr, &format!("saved {} bytes to {:?}", size, path))
                    .await;
            }
            Stored::TooSmall { size } => {
                logger
                    .log(&client_addr, &format!("discarded {} byte capture", size))
                    .await;
            }
        }
        Ok(Outcome::Finished(stored))
    }
}

async fn send_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("{}\n", line).as_bytes())
        .await
        .map_err(Error::Connection)?;
    writer.flush().await.map_err(Error::Connection)
}
