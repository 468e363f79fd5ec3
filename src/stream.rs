//! Pull-based stream reader feeding stream-backed buffers.
//!
//! A [`StreamReader`] owns a growable backing byte array and exposes it to a
//! [`Buffer`](crate::buffer::Buffer) as a sliding read window. Reads past the
//! filled region trigger [`fill`](StreamReader::fill) from the underlying
//! [`StreamSource`]. The source capability is abstract so that both a
//! blocking `std::io::Read` and a foreign-host callback (`readinto` shape)
//! can back the same reader.
//!
//! Lebensdauer: ein StreamReader ist an höchstens einen Buffer gleichzeitig
//! gebunden; die `&mut`-Leihe erzwingt das. Zwischen zwei Nachrichten auf
//! demselben Stream übernimmt der Reader die Leseposition des Buffers
//! (siehe `Buffer::sync_stream_reader_index`).

use crate::error::{Error, Result};

/// Default backing-array capacity in bytes.
pub const DEFAULT_STREAM_BUFFER_SIZE: u32 = 4096;

/// Ab diesem Auslastungsverhältnis (belegt/kapazität < 1/4) schrumpft
/// `shrink_buffer` das Backing-Array zurück Richtung Initialkapazität.
const SHRINK_UTILIZATION_DENOM: usize = 4;

/// Abstract byte source behind a [`StreamReader`].
///
/// `read_into` reads up to `buf.len()` bytes and reports the count; `Ok(0)`
/// means the source is exhausted. A zero return while a `fill` minimum is
/// still unsatisfied is a terminal under-read.
pub trait StreamSource {
    /// Reads up to `buf.len()` bytes into `buf`, returning the byte count.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Adapter: any blocking [`std::io::Read`] as a [`StreamSource`].
pub struct ReadSource<R> {
    inner: R,
}

impl<R: std::io::Read> ReadSource<R> {
    /// Wraps a blocking reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: std::io::Read> StreamSource for ReadSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf).map_err(Error::io)
    }
}

/// Adapter: a caller-supplied callback as a [`StreamSource`].
///
/// Für Foreign-Host-Einbettungen, deren Quelle kein `std::io::Read` ist
/// (z.B. ein `readinto`-artiges Objekt hinter einem FFI-Callback).
pub struct FnSource<F> {
    read_fn: F,
}

impl<F> FnSource<F>
where
    F: FnMut(&mut [u8]) -> std::io::Result<usize>,
{
    /// Wraps a `readinto`-shaped callback.
    pub fn new(read_fn: F) -> Self {
        Self { read_fn }
    }
}

impl<F> StreamSource for FnSource<F>
where
    F: FnMut(&mut [u8]) -> std::io::Result<usize>,
{
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        (self.read_fn)(buf).map_err(Error::io)
    }
}

/// Pull-based stream reader with a growable backing array.
///
/// Capabilities: `fill(min)` (ensure at least `min` unread bytes),
/// `read_to`, `skip`, `unread` (the only legal rewind), and
/// `shrink_buffer` (compact the consumed prefix).
pub struct StreamReader {
    source: Box<dyn StreamSource>,
    /// Backing-Array. `data[..size]` ist gefüllt, der Rest Schreibreserve.
    data: Vec<u8>,
    /// Anzahl gefüllter Bytes (Buffer sieht genau diesen Präfix).
    size: u32,
    /// Nächste ungelesene Position, 0 ≤ reader_index ≤ size.
    reader_index: u32,
    /// Kapazität bei Konstruktion; Ziel von `shrink_buffer`.
    initial_capacity: u32,
}

impl StreamReader {
    /// Creates a reader over the given source with the default capacity.
    pub fn new(source: impl StreamSource + 'static) -> Self {
        Self::with_capacity(source, DEFAULT_STREAM_BUFFER_SIZE)
    }

    /// Creates a reader over the given source with an explicit initial
    /// backing capacity (minimum 1).
    pub fn with_capacity(source: impl StreamSource + 'static, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            source: Box::new(source),
            data: vec![0u8; capacity as usize],
            size: 0,
            reader_index: 0,
            initial_capacity: capacity,
        }
    }

    /// Creates a reader over any blocking `std::io::Read`.
    pub fn from_reader(reader: impl std::io::Read + 'static) -> Self {
        Self::new(ReadSource::new(reader))
    }

    /// The filled prefix of the backing array.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }

    /// Number of filled bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Current read position within the filled prefix.
    #[inline]
    pub fn reader_index(&self) -> u32 {
        self.reader_index
    }

    /// Moves the read position. `index` must not exceed the filled size.
    pub fn set_reader_index(&mut self, index: u32) {
        assert!(
            index <= self.size,
            "reader_index {index} exceeds stream buffer size {}",
            self.size
        );
        self.reader_index = index;
    }

    /// Unread bytes currently buffered.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.size - self.reader_index
    }

    /// Ensures at least `min` unread bytes are buffered, reading from the
    /// source as needed. A source read of zero bytes before `min` is
    /// satisfied is a terminal under-read ([`Error::BufferOutOfBound`]).
    pub fn fill(&mut self, min: u32) -> Result<()> {
        if min == 0 || self.remaining() >= min {
            return Ok(());
        }
        let deficit = min - self.remaining();
        let required = u64::from(self.size) + u64::from(deficit);
        if required > u64::from(u32::MAX) {
            return Err(Error::out_of_bound("stream buffer size exceeds u32 range"));
        }
        if required > self.data.len() as u64 {
            // Verdopplung, mindestens auf required, gedeckelt bei u32::MAX.
            let new_size = (self.data.len() as u64 * 2)
                .max(required)
                .min(u64::from(u32::MAX));
            self.data.resize(new_size as usize, 0);
        }

        while self.remaining() < min {
            let write_pos = self.size as usize;
            let mut writable = self.data.len() - write_pos;
            if writable == 0 {
                let new_size = (self.data.len() as u64 * 2 + 1).min(u64::from(u32::MAX));
                if new_size == self.data.len() as u64 {
                    return Err(Error::out_of_bound("stream buffer size exceeds u32 range"));
                }
                self.data.resize(new_size as usize, 0);
                writable = self.data.len() - write_pos;
            }
            let read_bytes = self
                .source
                .read_into(&mut self.data[write_pos..write_pos + writable])?;
            if read_bytes == 0 {
                return Err(Error::buffer_out_of_bound(
                    self.reader_index,
                    min,
                    self.remaining(),
                ));
            }
            self.size += read_bytes as u32;
        }
        Ok(())
    }

    /// Copies exactly `dst.len()` bytes into `dst`, refilling as needed.
    pub fn read_to(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut copied = 0usize;
        while copied < dst.len() {
            if self.remaining() == 0 {
                self.fill(1)?;
            }
            let start = self.reader_index as usize;
            let n = (self.remaining() as usize).min(dst.len() - copied);
            dst[copied..copied + n].copy_from_slice(&self.data[start..start + n]);
            self.reader_index += n as u32;
            copied += n;
        }
        Ok(())
    }

    /// Discards exactly `n` bytes, refilling as needed.
    pub fn skip(&mut self, n: u32) -> Result<()> {
        let mut skipped = 0u32;
        while skipped < n {
            if self.remaining() == 0 {
                self.fill(1)?;
            }
            let step = self.remaining().min(n - skipped);
            self.reader_index += step;
            skipped += step;
        }
        Ok(())
    }

    /// Rewinds the read position by `n` bytes. Only consumed bytes can be
    /// unread; this is the single legal way to move backwards.
    pub fn unread(&mut self, n: u32) -> Result<()> {
        if n > self.reader_index {
            return Err(Error::buffer_out_of_bound(self.reader_index, n, self.size));
        }
        self.reader_index -= n;
        Ok(())
    }

    /// Compacts the consumed prefix: unread bytes move to index 0. When the
    /// unread tail occupies less than a quarter of a backing array that has
    /// grown past its initial capacity, the array shrinks back toward the
    /// initial capacity.
    ///
    /// Kopierende GC für langlebige Stream-Reader; zwischen Nachrichten
    /// aufrufen, nie während ein Buffer gebunden ist (die `&mut`-Leihe
    /// verhindert das).
    pub fn shrink_buffer(&mut self) {
        let remaining = self.remaining() as usize;
        let start = self.reader_index as usize;
        self.data.copy_within(start..start + remaining, 0);
        self.reader_index = 0;
        self.size = remaining as u32;

        let initial = self.initial_capacity as usize;
        if self.data.len() > initial && remaining < self.data.len() / SHRINK_UTILIZATION_DENOM {
            let target = initial.max(remaining);
            log::warn!(
                "shrinking stream buffer from {} to {} bytes ({} unread)",
                self.data.len(),
                target,
                remaining
            );
            self.data.truncate(target);
            self.data.shrink_to_fit();
        }
    }
}
