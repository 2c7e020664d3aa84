//! Size-bounded capture of child process streams.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes kept from one stream plus a count of what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    pub dropped: u64,
}

impl CapturedStream {
    /// Lossy text, ending with a truncation marker when bytes were dropped.
    pub fn render(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            if !text.ends_with('\n') && !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("…[truncated {} bytes]", self.dropped));
        }
        text
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Drain `reader` to EOF, keeping at most `limit` bytes.
///
/// The stream is always read to the end so the writer never blocks on a full pipe.
pub async fn capture_bounded<R>(reader: Option<R>, limit: usize) -> std::io::Result<CapturedStream>
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedStream::default();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        let keep = room.min(n);
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.dropped += (n - keep) as u64;
    }
    Ok(captured)
}

/// Truncate already-captured text to `limit` bytes on a char boundary.
pub fn bound_text(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    CapturedStream {
        bytes: text.as_bytes()[..cut].to_vec(),
        dropped: (text.len() - cut) as u64,
    }
    .render()
}
