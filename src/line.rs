use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Default capacity of the per-session line buffer.
pub const DEFAULT_LINE_CAPACITY: usize = 1024;

/// Reads one `\n` terminated line into `buf`, one byte at a time.
///
/// Returns the number of bytes stored, terminator included. Bytes past
/// `buf.len()` are consumed and dropped so the next call starts on a fresh
/// line. A bare `\r` is ordinary data. If the source fails or hits EOF
/// before a terminator, the partial line is discarded.
pub async fn read_line<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut length = 0;
    loop {
        let byte = reader.read_u8().await.map_err(Error::Connection)?;
        if length < buf.len() {
            buf[length] = byte;
            length += 1;
        }
        if byte == b'\n' {
            return Ok(length);
        }
    }
}
