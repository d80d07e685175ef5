use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Keeps printable ASCII and whitespace, drops everything else.
pub fn filter_printable_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_graphic() || c.is_ascii_whitespace())
        .collect()
}

/// Escapes control and non-ASCII characters so a log line stays on one line.
pub fn safe_log_string(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\0' => result.push_str("\\0"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            '\x01'..='\x1f' | '\x7f' => {
                result.push_str(&format!("\\x{:02x}", c as u32));
            }
            _ if c.is_ascii() => result.push(c),
            _ => result.push_str(&format!("\\u{{{:x}}}", c as u32)),
        }
    }
    result
}

/// Timestamped console logger with an optional append-only file.
#[derive(Clone)]
pub struct Logger {
    writer: Option<Arc<Mutex<BufWriter<File>>>>,
    raw_display: bool,
    verbose: bool,
}

impl Logger {
    pub fn new(log_file: Option<&Path>, raw_display: bool, verbose: bool) -> std::io::Result<Self> {
        let writer = if let Some(path) = log_file {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let file = OpenOptions::new().create(true).append(true).open(path)?;

            Some(Arc::new(Mutex::new(BufWriter::new(file))))
        } else {
            None
        };

        Ok(Self {
            writer,
            raw_display,
            verbose,
        })
    }

    /// Console only, nothing written to disk.
    pub fn console() -> Self {
        Self {
            writer: None,
            raw_display: false,
            verbose: false,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub async fn log(&self, client_addr: &SocketAddr, message: &str) {
        self.emit(&client_addr.to_string(), message).await;
    }

    /// Listener-level events that belong to no peer.
    pub async fn log_server(&self, message: &str) {
        self.emit("-", message).await;
    }

    /// One line of protocol traffic, only when verbose.
    pub async fn log_traffic(&self, client_addr: &SocketAddr, direction: &str, line: &[u8]) {
        if !self.verbose {
            return;
        }
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']);
        let message = if self.raw_display {
            format!("{} {}", direction, text)
        } else {
            format!("{} {}", direction, safe_log_string(text))
        };
        self.emit(&client_addr.to_string(), &message).await;
    }

    async fn emit(&self, origin: &str, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let log_line = format!("{} {} {}\n", timestamp, origin, message);

        if self.raw_display {
            print!("{}", log_line);
        } else {
            print!("{}", filter_printable_chars(&log_line));
        }

        if let Some(writer) = &self.writer {
            let mut writer = writer.lock().await;
            let file_line = format!("{} {} {}\n", timestamp, origin, safe_log_string(message));
            let _ = writer.write_all(file_line.as_bytes());
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_filter_drops_control_bytes() {
        assert_eq!(filter_printable_chars("ok\x07 bell\x1b[0m"), "ok bell[0m");
    }

    #[test]
    fn safe_string_escapes() {
        assert_eq!(safe_log_string("a\r\nb"), "a\\r\\nb");
        assert_eq!(safe_log_string("\0\x7f"), "\\0\\x7f");
        assert_eq!(safe_log_string("é"), "\\u{e9}");
    }

    #[tokio::test]
    async fn file_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("dumptruck.log");
        let logger = Logger::new(Some(path.as_path()), false, true).unwrap();
        let peer: SocketAddr = "192.0.2.7:2525".parse().unwrap();

        logger.log(&peer, "receiving mail").await;
        logger.log_traffic(&peer, ">>", b"EHLO x\r\n").await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("192.0.2.7:2525 receiving mail"));
        assert!(lines[1].ends_with(">> EHLO x"));
    }

    #[tokio::test]
    async fn quiet_logger_skips_traffic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.log");
        let logger = Logger::new(Some(path.as_path()), false, false).unwrap();
        let peer: SocketAddr = "192.0.2.7:2525".parse().unwrap();

        logger.log_traffic(&peer, ">>", b"NOOP\r\n").await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
