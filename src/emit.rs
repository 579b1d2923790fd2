//! Line emitter for the bar's wire format.
//!
//! The bar protocol is an infinite, newline-delimited JSON stream: a version
//! header, an opening `[`, then one array of chunk objects per tick, each
//! line after the first prefixed with a comma. The consuming bar process
//! reads line by line, so every line is flushed as it is written.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::chunk::Chunk;

/// The protocol header, declaring version 1 with click events enabled.
pub const PROTOCOL_HEADER: &str = r#"{"version":1,"click_events":true}"#;

/// Writes tick lines to the bar host over any async byte sink.
///
/// Write errors propagate to the caller: an unwritable output stream means
/// the bar host is gone, which is the one fatal condition in the core.
///
/// # Example
///
/// ```
/// use barline::LineEmitter;
///
/// # tokio_test::block_on(async {
/// let mut emitter = LineEmitter::new(Vec::new());
/// emitter.write_header().await.unwrap();
/// emitter.write_line(&[]).await.unwrap();
/// # });
/// ```
#[derive(Debug)]
pub struct LineEmitter<W> {
    writer: W,
    lines_written: u64,
}

impl<W: AsyncWrite + Unpin> LineEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines_written: 0,
        }
    }

    /// Emit the protocol header and open the infinite array.
    pub async fn write_header(&mut self) -> std::io::Result<()> {
        self.writer.write_all(PROTOCOL_HEADER.as_bytes()).await?;
        self.writer.write_all(b"\n[\n").await?;
        self.writer.flush().await
    }

    /// Emit one tick's ordered chunk sequence as a single line.
    pub async fn write_line(&mut self, chunks: &[Chunk]) -> std::io::Result<()> {
        let mut line = String::new();
        if self.lines_written > 0 {
            line.push(',');
        }
        line.push('[');
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&chunk.to_wire());
        }
        line.push_str("]\n");

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        self.lines_written += 1;
        Ok(())
    }

    /// Consume the emitter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
