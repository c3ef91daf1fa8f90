
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Size of the length prefix in front of every record.
pub(crate) const LEN_PREFIX: usize = 4;

/// Reads `[length][bytes]` records from a byte stream.
///
/// The length is a `u32` in native byte order. Records longer than the
/// reader's capacity are skipped without being buffered.
#[derive(Debug)]
pub struct PacketReader<R> {
    inner: R,
    capacity: usize,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        Self { inner, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between records. An
    /// oversized record is consumed and reported as
    /// [OversizedRecord](Error::OversizedRecord), leaving the reader on the
    /// following record. A stream ending mid-record gives
    /// [TruncatedRecord](Error::TruncatedRecord).
    pub async fn read_record(&mut self) -> Result<Option<Bytes>> {
        let mut prefix = [0u8; LEN_PREFIX];
        let mut filled = 0;
        while filled < LEN_PREFIX {
            let n = self.inner.read(&mut prefix[filled..]).await?;
            if n == 0 {
                return match filled {
                    0 => Ok(None),
                    _ => Err(Error::TruncatedRecord),
                };
            }
            filled += n;
        }

        let len = u32::from_ne_bytes(prefix) as usize;
        if len > self.capacity {
            self.skip(len).await?;
            return Err(Error::OversizedRecord {
                len,
                capacity: self.capacity,
            });
        }

        let mut record = BytesMut::with_capacity(len);
        record.resize(len, 0);
        self.inner
            .read_exact(&mut record)
            .await
            .map_err(truncated)?;
        Ok(Some(record.freeze()))
    }

    async fn skip(&mut self, len: usize) -> Result<()> {
        let mut rest = (&mut self.inner).take(len as u64);
        let skipped = io::copy(&mut rest, &mut io::sink()).await?;
        if skipped < len as u64 {
            return Err(Error::TruncatedRecord);
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes `[length][bytes]` records to a byte stream.
#[derive(Debug)]
pub struct PacketWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> PacketWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes one record and flushes it.
    ///
    /// Prefix and payload go out in a single buffer so a reader never sees a
    /// prefix without its payload.
    pub async fn write_record(&mut self, record: &[u8]) -> Result<()> {
        let len = u32::try_from(record.len()).map_err(|_| Error::OversizedRecord {
            len: record.len(),
            capacity: u32::MAX as usize,
        })?;
        let mut frame = BytesMut::with_capacity(LEN_PREFIX + record.len());
        frame.put_u32_ne(len);
        frame.put_slice(record);
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn truncated(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedRecord,
        _ => Error::Io(e),
    }
}
