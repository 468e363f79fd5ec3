//! Random-access byte buffer with fixed- and variable-length integer codecs.
//!
//! All multi-byte values are little-endian (xlang spec: byte order). Reads
//! are bounds-checked and return [`Error::BufferOutOfBound`] on under-read;
//! a failed read never advances the reader index. Writes grow the buffer on
//! demand for the owned and vector-wrapped variants; stream-backed buffers
//! are read views and refill from their [`StreamReader`] instead.
//!
//! Heiße Leser verlangen eine "safe zone" ungelesener Bytes für den
//! Bulk-Word-Load; bleiben weniger übrig, läuft ein byteweiser Slow-Path,
//! der bei Stream-Backing nachfüllen darf.

use crate::error::{Error, Result};
use crate::stream::StreamReader;

/// Rundet auf das nächste Vielfache von 8 Bytes (Word-Grenze) auf.
#[inline(always)]
fn round_to_word(n: u64) -> u64 {
    (n + 7) & !7
}

#[inline(always)]
fn load_u16_le(d: &[u8], offset: usize) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&d[offset..offset + 2]);
    u16::from_le_bytes(b)
}

#[inline(always)]
fn load_u32_le(d: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&d[offset..offset + 4]);
    u32::from_le_bytes(b)
}

#[inline(always)]
fn load_u64_le(d: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&d[offset..offset + 8]);
    u64::from_le_bytes(b)
}

/// Storage behind a [`Buffer`]: the three lifecycle variants.
enum Storage<'a> {
    /// Exklusiv besessener Speicher; wächst per Reallokation.
    Owned(Vec<u8>),
    /// Geliehener wachstumsfähiger Container; wächst per `resize` des
    /// Containers (Zero-Copy-Serialisierung in einen Aufrufer-Vec).
    Wrapped(&'a mut Vec<u8>),
    /// Lesefenster über einen Stream-Reader; Lesen hinter `size` füllt nach.
    Stream(&'a mut StreamReader),
}

/// Random-access byte buffer over one of three storage variants.
///
/// Invariants: `0 ≤ reader_index ≤ size`, `0 ≤ writer_index ≤ size`; for
/// stream-backed buffers `writer_index == size` always.
pub struct Buffer<'a> {
    storage: Storage<'a>,
    reader_index: u32,
    writer_index: u32,
}

impl Buffer<'static> {
    /// Creates an empty owned buffer.
    pub fn new() -> Self {
        Self {
            storage: Storage::Owned(Vec::new()),
            reader_index: 0,
            writer_index: 0,
        }
    }

    /// Creates an owned buffer with `capacity` zeroed bytes pre-reserved.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            storage: Storage::Owned(vec![0u8; capacity as usize]),
            reader_index: 0,
            writer_index: 0,
        }
    }

    /// Creates an owned buffer over existing bytes, readable from index 0.
    /// The writer index starts at the end of the data.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        assert!(len <= u32::MAX as usize, "buffer size exceeds u32 range");
        Self {
            storage: Storage::Owned(data),
            reader_index: 0,
            writer_index: len as u32,
        }
    }
}

impl Default for Buffer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Buffer<'a> {
    /// Wraps an external growable byte container for zero-copy writes.
    /// Writing appends after the container's current content; call
    /// [`truncate_to_writer`](Self::truncate_to_writer) when done.
    pub fn wrap(vec: &'a mut Vec<u8>) -> Self {
        let len = vec.len();
        assert!(len <= u32::MAX as usize, "buffer size exceeds u32 range");
        Self {
            storage: Storage::Wrapped(vec),
            reader_index: 0,
            writer_index: len as u32,
        }
    }

    /// Binds a stream reader: the buffer becomes a read view over the
    /// reader's filled window. At most one buffer is bound at a time (the
    /// `&mut` borrow enforces the binding contract).
    pub fn from_stream(stream: &'a mut StreamReader) -> Self {
        let reader_index = stream.reader_index();
        Self {
            storage: Storage::Stream(stream),
            reader_index,
            writer_index: 0, // wird unten auf size gesetzt
        }
        .init_stream_indices()
    }

    fn init_stream_indices(mut self) -> Self {
        if let Storage::Stream(ref s) = self.storage {
            self.writer_index = s.size();
        }
        self
    }

    /// Current buffer contents (the filled region).
    #[inline]
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => v.as_slice(),
            Storage::Wrapped(v) => v.as_slice(),
            Storage::Stream(s) => s.data(),
        }
    }

    #[inline]
    fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Owned(v) => v.as_mut_slice(),
            Storage::Wrapped(v) => v.as_mut_slice(),
            Storage::Stream(_) => panic!("stream-backed buffer is read-only"),
        }
    }

    /// Buffer size in bytes (allocated readable/writable region).
    #[inline]
    pub fn size(&self) -> u32 {
        self.data().len() as u32
    }

    /// True if this buffer refills from a stream reader.
    #[inline]
    pub fn is_stream_backed(&self) -> bool {
        matches!(self.storage, Storage::Stream(_))
    }

    /// Current read position.
    #[inline]
    pub fn reader_index(&self) -> u32 {
        self.reader_index
    }

    /// Current write position.
    #[inline]
    pub fn writer_index(&self) -> u32 {
        self.writer_index
    }

    /// Remaining bytes available for reading without refill.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.size() - self.reader_index
    }

    /// Moves the read position within the current size.
    ///
    /// # Panics
    ///
    /// Panics if `index` exceeds the buffer size (contract violation).
    pub fn set_reader_index(&mut self, index: u32) {
        assert!(
            index <= self.size(),
            "reader_index {index} exceeds buffer size {}",
            self.size()
        );
        self.reader_index = index;
    }

    /// Moves the write position within the current size.
    ///
    /// # Panics
    ///
    /// Panics if `index` exceeds the buffer size (contract violation).
    pub fn set_writer_index(&mut self, index: u32) {
        assert!(
            index <= self.size(),
            "writer_index {index} exceeds buffer size {}",
            self.size()
        );
        self.writer_index = index;
    }

    /// Pushes the buffer's read position back into the bound stream reader.
    /// No-op for non-stream buffers. Call between messages so a following
    /// binding resumes at the right position.
    pub fn sync_stream_reader_index(&mut self) {
        let index = self.reader_index;
        if let Storage::Stream(ref mut s) = self.storage {
            s.set_reader_index(index);
        }
    }

    /// Ensures the buffer can serve reads up to absolute index `target`
    /// (u64, damit Aufrufer Überläufe nicht selbst prüfen müssen).
    fn ensure_size(&mut self, target: u64) -> Result<()> {
        if target <= u64::from(self.size()) {
            return Ok(());
        }
        if target > u64::from(u32::MAX) {
            return Err(Error::out_of_bound("reader index exceeds u32 range"));
        }
        let reader_index = self.reader_index;
        let available = self.remaining();
        match &mut self.storage {
            Storage::Stream(s) => {
                // Leseposition in den Reader spiegeln, dann Defizit füllen.
                s.set_reader_index(reader_index);
                let min = (target - u64::from(reader_index)) as u32;
                s.fill(min)?;
                self.writer_index = s.size();
                Ok(())
            }
            _ => Err(Error::buffer_out_of_bound(
                reader_index,
                (target - u64::from(reader_index)) as u32,
                available,
            )),
        }
    }

    /// Verifies `length` bytes are readable at the reader index, refilling
    /// stream-backed buffers as needed.
    #[inline]
    pub fn ensure_readable(&mut self, length: u32) -> Result<()> {
        let target = u64::from(self.reader_index) + u64::from(length);
        if target <= u64::from(self.size()) {
            return Ok(());
        }
        self.ensure_size(target)
    }

    /// Grows the buffer so at least `min_capacity` bytes are writable at
    /// the writer index. Policy: double to at least the requirement,
    /// rounded up to a word boundary.
    ///
    /// # Panics
    ///
    /// Panics for stream-backed buffers (writes are forbidden there) and
    /// when the requirement exceeds the u32 range.
    pub fn grow(&mut self, min_capacity: u32) {
        let target = u64::from(self.writer_index) + u64::from(min_capacity);
        if target <= u64::from(self.size()) {
            return;
        }
        assert!(target <= u64::from(u32::MAX), "buffer size exceeds u32 range");
        let new_size = round_to_word(target * 2).min(u64::from(u32::MAX)) as usize;
        match &mut self.storage {
            Storage::Owned(v) => v.resize(new_size, 0),
            Storage::Wrapped(v) => v.resize(new_size, 0),
            Storage::Stream(_) => panic!("grow on stream-backed buffer"),
        }
    }

    /// Truncates the underlying container to the writer index. For owned
    /// and wrapped buffers after serialization; the wrapped container then
    /// holds exactly the written message.
    pub fn truncate_to_writer(&mut self) {
        let len = self.writer_index as usize;
        match &mut self.storage {
            Storage::Owned(v) => v.truncate(len),
            Storage::Wrapped(v) => v.truncate(len),
            Storage::Stream(_) => {}
        }
    }

    /// Consumes an owned buffer into its written bytes.
    ///
    /// # Panics
    ///
    /// Panics for wrapped and stream-backed buffers.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.truncate_to_writer();
        match self.storage {
            Storage::Owned(v) => v,
            _ => panic!("into_vec on non-owned buffer"),
        }
    }

    // ========================================================================
    // Offset-based access (random access; no index movement)
    // ========================================================================

    /// Writes one byte at `offset` without growing.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is out of bounds — only legal after [`grow`](Self::grow).
    #[inline(always)]
    pub fn put_u8_at(&mut self, offset: u32, value: u8) {
        self.data_mut()[offset as usize] = value;
    }

    /// Writes a fixed 4-byte little-endian value at `offset` without growing.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds — only legal after [`grow`](Self::grow).
    #[inline(always)]
    pub fn put_i32_at(&mut self, offset: u32, value: i32) {
        let o = offset as usize;
        self.data_mut()[o..o + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Reads one byte at `offset`.
    pub fn get_u8_at(&self, offset: u32) -> Result<u8> {
        self.data()
            .get(offset as usize)
            .copied()
            .ok_or_else(|| Error::buffer_out_of_bound(offset, 1, self.size().saturating_sub(offset)))
    }

    /// Reads a fixed 8-byte little-endian signed value at `offset`.
    pub fn get_i64_at(&self, offset: u32) -> Result<i64> {
        let o = offset as usize;
        let d = self.data();
        if o + 8 > d.len() {
            return Err(Error::buffer_out_of_bound(offset, 8, self.size().saturating_sub(offset)));
        }
        Ok(load_u64_le(d, o) as i64)
    }

    /// Reads `length` (0..=8) little-endian bytes at `offset` into an `i64`
    /// (bit-packed read for sub-word fields).
    pub fn get_bytes_as_i64(&self, offset: u32, length: u32) -> Result<i64> {
        if length == 0 {
            return Ok(0);
        }
        if length > 8 {
            return Err(Error::invalid_data("get_bytes_as_i64 length must be in [0, 8]"));
        }
        let d = self.data();
        let o = offset as usize;
        if o > d.len() || length as usize > d.len() - o {
            return Err(Error::buffer_out_of_bound(offset, length, self.size().saturating_sub(offset)));
        }
        if d.len() - o >= 8 {
            // Bulk-Load + Maske statt Byte-Schleife.
            let mask = u64::MAX >> ((8 - length) * 8);
            Ok((load_u64_le(d, o) & mask) as i64)
        } else {
            let mut result = 0u64;
            for i in 0..length as usize {
                result |= u64::from(d[o + i]) << (i * 8);
            }
            Ok(result as i64)
        }
    }

    // ========================================================================
    // Index-based writes (grow + advance)
    // ========================================================================

    /// Writes one byte at the writer index.
    #[inline(always)]
    pub fn write_u8(&mut self, value: u8) {
        self.grow(1);
        let w = self.writer_index as usize;
        self.data_mut()[w] = value;
        self.writer_index += 1;
    }

    /// Writes one signed byte at the writer index.
    #[inline(always)]
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    /// Writes a fixed 2-byte little-endian value.
    #[inline(always)]
    pub fn write_i16(&mut self, value: i16) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes a fixed 2-byte little-endian unsigned value.
    #[inline(always)]
    pub fn write_u16(&mut self, value: u16) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes a fixed 3-byte little-endian value (low 24 bits; reserved
    /// width, no serializer currently emits it).
    #[inline(always)]
    pub fn write_i24(&mut self, value: i32) {
        let b = value.to_le_bytes();
        self.write_fixed(&[b[0], b[1], b[2]]);
    }

    /// Writes a fixed 4-byte little-endian value.
    #[inline(always)]
    pub fn write_i32(&mut self, value: i32) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes a fixed 4-byte little-endian unsigned value.
    #[inline(always)]
    pub fn write_u32(&mut self, value: u32) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes a fixed 8-byte little-endian value.
    #[inline(always)]
    pub fn write_i64(&mut self, value: i64) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes a fixed 8-byte little-endian unsigned value.
    #[inline(always)]
    pub fn write_u64(&mut self, value: u64) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes an IEEE 754 binary32 value little-endian.
    #[inline(always)]
    pub fn write_f32(&mut self, value: f32) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes an IEEE 754 binary64 value little-endian.
    #[inline(always)]
    pub fn write_f64(&mut self, value: f64) {
        self.write_fixed(&value.to_le_bytes());
    }

    /// Writes raw bytes at the writer index.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        assert!(bytes.len() <= u32::MAX as usize, "write length exceeds u32 range");
        self.grow(bytes.len() as u32);
        let w = self.writer_index as usize;
        self.data_mut()[w..w + bytes.len()].copy_from_slice(bytes);
        self.writer_index += bytes.len() as u32;
    }

    #[inline(always)]
    fn write_fixed<const N: usize>(&mut self, bytes: &[u8; N]) {
        self.grow(N as u32);
        let w = self.writer_index as usize;
        self.data_mut()[w..w + N].copy_from_slice(bytes);
        self.writer_index += N as u32;
    }

    // ========================================================================
    // Variable-length integer writes (xlang spec: varint encodings)
    // ========================================================================

    /// Puts a VarUint32 at `offset`, returning the encoded length (1–5).
    /// Interleaves continuation bits and stores whole words; the caller
    /// must have reserved 8 bytes at `offset` via [`grow`](Self::grow).
    pub fn put_var_uint32(&mut self, offset: u32, value: u32) -> u32 {
        let o = offset as usize;
        if value < 0x80 {
            self.data_mut()[o] = value as u8;
            return 1;
        }
        // Datenbits mit Continuation-Bits verschränkt aufbauen, dann ein
        // einzelner Word-Store.
        let value = u64::from(value);
        let mut encoded: u64 = (value & 0x7F) | 0x80;
        encoded |= (value & 0x3F80) << 1;
        if value < 0x4000 {
            self.data_mut()[o..o + 2].copy_from_slice(&(encoded as u16).to_le_bytes());
            return 2;
        }
        encoded |= ((value & 0x1F_C000) << 2) | 0x8000;
        if value < 0x20_0000 {
            self.data_mut()[o..o + 4].copy_from_slice(&(encoded as u32).to_le_bytes());
            return 3;
        }
        encoded |= ((value & 0xFE0_0000) << 3) | 0x80_0000;
        if value < 0x1000_0000 {
            self.data_mut()[o..o + 4].copy_from_slice(&(encoded as u32).to_le_bytes());
            return 4;
        }
        encoded |= ((value >> 28) << 32) | 0x8000_0000;
        self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
        5
    }

    /// Writes a VarUint32 at the writer index (1–5 bytes).
    #[inline]
    pub fn write_var_uint32(&mut self, value: u32) {
        self.grow(8); // Word-Store des Bulk-Pfads braucht 8 Byte Reserve
        let w = self.writer_index;
        let len = self.put_var_uint32(w, value);
        self.writer_index += len;
    }

    /// Writes an i32 as zig-zag VarUint32.
    #[inline]
    pub fn write_var_int32(&mut self, value: i32) {
        let zigzag = ((value << 1) ^ (value >> 31)) as u32;
        self.write_var_uint32(zigzag);
    }

    /// Puts a VarUint64 at `offset`, returning the encoded length (1–9).
    /// The ninth byte, when present, carries bits 56–63 raw. The caller
    /// must have reserved 9 bytes at `offset` via [`grow`](Self::grow).
    pub fn put_var_uint64(&mut self, offset: u32, value: u64) -> u32 {
        let o = offset as usize;
        if value < 0x80 {
            self.data_mut()[o] = value as u8;
            return 1;
        }
        let mut encoded: u64 = (value & 0x7F) | 0x80;
        encoded |= (value & 0x3F80) << 1;
        if value < 0x4000 {
            self.data_mut()[o..o + 2].copy_from_slice(&(encoded as u16).to_le_bytes());
            return 2;
        }
        encoded |= ((value & 0x1F_C000) << 2) | 0x8000;
        if value < 0x20_0000 {
            self.data_mut()[o..o + 4].copy_from_slice(&(encoded as u32).to_le_bytes());
            return 3;
        }
        encoded |= ((value & 0xFE0_0000) << 3) | 0x80_0000;
        if value < 0x1000_0000 {
            self.data_mut()[o..o + 4].copy_from_slice(&(encoded as u32).to_le_bytes());
            return 4;
        }
        encoded |= ((value & 0x7_F000_0000) << 4) | 0x8000_0000;
        if value < 0x8_0000_0000 {
            self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
            return 5;
        }
        encoded |= ((value & 0x3F8_0000_0000) << 5) | 0x80_0000_0000;
        if value < 0x400_0000_0000 {
            self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
            return 6;
        }
        encoded |= ((value & 0x1_FC00_0000_0000) << 6) | 0x8000_0000_0000;
        if value < 0x2_0000_0000_0000 {
            self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
            return 7;
        }
        encoded |= ((value & 0xFE_0000_0000_0000) << 7) | 0x80_0000_0000_0000;
        if value < 0x100_0000_0000_0000 {
            self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
            return 8;
        }
        // 9 Bytes: 8-Byte-Word plus Roh-Byte für Bits 56–63.
        encoded |= 0x8000_0000_0000_0000;
        self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
        self.data_mut()[o + 8] = (value >> 56) as u8;
        9
    }

    /// Writes a VarUint64 at the writer index (1–9 bytes).
    #[inline]
    pub fn write_var_uint64(&mut self, value: u64) {
        self.grow(9);
        let w = self.writer_index;
        let len = self.put_var_uint64(w, value);
        self.writer_index += len;
    }

    /// Writes an i64 as zig-zag VarUint64.
    #[inline]
    pub fn write_var_int64(&mut self, value: i64) {
        let zigzag = ((value << 1) ^ (value >> 63)) as u64;
        self.write_var_uint64(zigzag);
    }

    /// Writes a VarUint36Small (≤ 5 bytes; bits 28–35 land raw in byte 5).
    /// Used for string and collection length-and-flag headers.
    pub fn write_var_uint36_small(&mut self, value: u64) {
        debug_assert!(value < (1u64 << 36), "var_uint36_small value {value} exceeds 36 bits");
        self.grow(8);
        let o = self.writer_index as usize;
        if value < 0x80 {
            self.data_mut()[o] = value as u8;
            self.writer_index += 1;
            return;
        }
        let mut encoded: u64 = (value & 0x7F) | 0x80;
        encoded |= (value & 0x3F80) << 1;
        if value < 0x4000 {
            self.data_mut()[o..o + 2].copy_from_slice(&(encoded as u16).to_le_bytes());
            self.writer_index += 2;
            return;
        }
        encoded |= ((value & 0x1F_C000) << 2) | 0x8000;
        if value < 0x20_0000 {
            self.data_mut()[o..o + 4].copy_from_slice(&(encoded as u32).to_le_bytes());
            self.writer_index += 3;
            return;
        }
        encoded |= ((value & 0xFE0_0000) << 3) | 0x80_0000;
        if value < 0x1000_0000 {
            self.data_mut()[o..o + 4].copy_from_slice(&(encoded as u32).to_le_bytes());
            self.writer_index += 4;
            return;
        }
        // 5 Bytes: Bits 28–35 roh in Byte 5.
        encoded |= ((value & 0xF_F000_0000) << 4) | 0x8000_0000;
        self.data_mut()[o..o + 8].copy_from_slice(&encoded.to_le_bytes());
        self.writer_index += 5;
    }

    /// Writes an i64 with the tagged encoding: 4 bytes `(value << 1)` when
    /// the value fits in 31 signed bits (low bit clear), otherwise one flag
    /// byte `0x01` plus 8 raw little-endian bytes.
    pub fn write_tagged_int64(&mut self, value: i64) {
        const HALF_MIN: i64 = -1_073_741_824; // -2^30
        const HALF_MAX: i64 = 1_073_741_823; // 2^30 - 1
        if (HALF_MIN..=HALF_MAX).contains(&value) {
            self.write_i32((value as i32) << 1);
        } else {
            self.grow(9);
            let o = self.writer_index as usize;
            self.data_mut()[o] = 0b1;
            self.data_mut()[o + 1..o + 9].copy_from_slice(&value.to_le_bytes());
            self.writer_index += 9;
        }
    }

    /// Writes a u64 with the tagged encoding: 4 bytes `(value << 1)` when
    /// the value fits in [0, 2^31), otherwise flag byte plus 8 raw bytes.
    pub fn write_tagged_uint64(&mut self, value: u64) {
        const MAX_SMALL: u64 = 0x7fff_ffff;
        if value <= MAX_SMALL {
            self.write_i32((value as i32) << 1);
        } else {
            self.grow(9);
            let o = self.writer_index as usize;
            self.data_mut()[o] = 0b1;
            self.data_mut()[o + 1..o + 9].copy_from_slice(&value.to_le_bytes());
            self.writer_index += 9;
        }
    }

    // ========================================================================
    // Index-based reads (bounds-checked, refill-aware)
    // ========================================================================

    /// Reads one byte.
    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_readable(1)?;
        let value = self.data()[self.reader_index as usize];
        self.reader_index += 1;
        Ok(value)
    }

    /// Reads one signed byte.
    #[inline(always)]
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a fixed 2-byte little-endian signed value.
    #[inline(always)]
    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure_readable(2)?;
        let value = load_u16_le(self.data(), self.reader_index as usize) as i16;
        self.reader_index += 2;
        Ok(value)
    }

    /// Reads a fixed 2-byte little-endian unsigned value.
    #[inline(always)]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure_readable(2)?;
        let value = load_u16_le(self.data(), self.reader_index as usize);
        self.reader_index += 2;
        Ok(value)
    }

    /// Reads a fixed 3-byte little-endian value into the low 24 bits of an
    /// i32 (zero-extended; reserved width).
    pub fn read_i24(&mut self) -> Result<i32> {
        self.ensure_readable(3)?;
        let o = self.reader_index as usize;
        let d = self.data();
        let value = i32::from(d[o]) | (i32::from(d[o + 1]) << 8) | (i32::from(d[o + 2]) << 16);
        self.reader_index += 3;
        Ok(value)
    }

    /// Reads a fixed 4-byte little-endian signed value.
    #[inline(always)]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure_readable(4)?;
        let value = load_u32_le(self.data(), self.reader_index as usize) as i32;
        self.reader_index += 4;
        Ok(value)
    }

    /// Reads a fixed 4-byte little-endian unsigned value.
    #[inline(always)]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure_readable(4)?;
        let value = load_u32_le(self.data(), self.reader_index as usize);
        self.reader_index += 4;
        Ok(value)
    }

    /// Reads a fixed 8-byte little-endian signed value.
    #[inline(always)]
    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure_readable(8)?;
        let value = load_u64_le(self.data(), self.reader_index as usize) as i64;
        self.reader_index += 8;
        Ok(value)
    }

    /// Reads a fixed 8-byte little-endian unsigned value.
    #[inline(always)]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure_readable(8)?;
        let value = load_u64_le(self.data(), self.reader_index as usize);
        self.reader_index += 8;
        Ok(value)
    }

    /// Reads an IEEE 754 binary32 value.
    #[inline(always)]
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads an IEEE 754 binary64 value.
    #[inline(always)]
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Reads `length` bytes as a borrowed slice and advances.
    pub fn read_slice(&mut self, length: u32) -> Result<&[u8]> {
        self.ensure_readable(length)?;
        let o = self.reader_index as usize;
        self.reader_index += length;
        Ok(&self.data()[o..o + length as usize])
    }

    /// Reads exactly `dst.len()` bytes into `dst`.
    pub fn read_bytes_into(&mut self, dst: &mut [u8]) -> Result<()> {
        assert!(dst.len() <= u32::MAX as usize, "read length exceeds u32 range");
        let length = dst.len() as u32;
        self.ensure_readable(length)?;
        let o = self.reader_index as usize;
        dst.copy_from_slice(&self.data()[o..o + dst.len()]);
        self.reader_index += length;
        Ok(())
    }

    /// Skips `length` bytes.
    pub fn skip(&mut self, length: u32) -> Result<()> {
        self.ensure_readable(length)?;
        self.reader_index += length;
        Ok(())
    }

    /// Reads a VarUint32 (1–5 bytes). Fast path bulk-loads 4 bytes when a
    /// 5-byte safe zone remains; otherwise the byte-wise slow path runs
    /// (refilling stream-backed buffers).
    pub fn read_var_uint32(&mut self) -> Result<u32> {
        self.ensure_readable(1)?;
        if self.size() - self.reader_index < 5 {
            return self.read_var_uint32_slow();
        }
        let offset = self.reader_index as usize;
        let d = self.data();
        let bulk = load_u32_le(d, offset);

        let mut result = bulk & 0x7F;
        if bulk & 0x80 == 0 {
            self.reader_index += 1;
            return Ok(result);
        }
        result |= (bulk >> 1) & 0x3F80;
        if bulk & 0x8000 == 0 {
            self.reader_index += 2;
            return Ok(result);
        }
        result |= (bulk >> 2) & 0x1F_C000;
        if bulk & 0x80_0000 == 0 {
            self.reader_index += 3;
            return Ok(result);
        }
        result |= (bulk >> 3) & 0xFE0_0000;
        if bulk & 0x8000_0000 == 0 {
            self.reader_index += 4;
            return Ok(result);
        }
        result |= u32::from(d[offset + 4] & 0x7F) << 28;
        self.reader_index += 5;
        Ok(result)
    }

    /// Byteweiser Slow-Path: lässt den reader_index bei Fehler unverändert.
    fn read_var_uint32_slow(&mut self) -> Result<u32> {
        let mut position = self.reader_index;
        let mut result = 0u32;
        for i in 0..5u32 {
            self.ensure_size(u64::from(position) + 1)?;
            let b = self.data()[position as usize];
            position += 1;
            result |= u32::from(b & 0x7F) << (i * 7);
            if b & 0x80 == 0 {
                self.reader_index = position;
                return Ok(result);
            }
        }
        Err(Error::invalid_data("malformed var_uint32 encoding"))
    }

    /// Reads a zig-zag VarInt32.
    #[inline]
    pub fn read_var_int32(&mut self) -> Result<i32> {
        let raw = self.read_var_uint32()?;
        Ok(((raw >> 1) as i32) ^ -((raw & 1) as i32))
    }

    /// Reads a VarUint64 (1–9 bytes). Fast path bulk-loads 8 bytes when a
    /// 9-byte safe zone remains.
    pub fn read_var_uint64(&mut self) -> Result<u64> {
        self.ensure_readable(1)?;
        if self.size() - self.reader_index < 9 {
            return self.read_var_uint64_slow();
        }
        let offset = self.reader_index as usize;
        let d = self.data();
        let bulk = load_u64_le(d, offset);

        let mut result = bulk & 0x7F;
        if bulk & 0x80 == 0 {
            self.reader_index += 1;
            return Ok(result);
        }
        result |= (bulk >> 1) & 0x3F80;
        if bulk & 0x8000 == 0 {
            self.reader_index += 2;
            return Ok(result);
        }
        result |= (bulk >> 2) & 0x1F_C000;
        if bulk & 0x80_0000 == 0 {
            self.reader_index += 3;
            return Ok(result);
        }
        result |= (bulk >> 3) & 0xFE0_0000;
        if bulk & 0x8000_0000 == 0 {
            self.reader_index += 4;
            return Ok(result);
        }
        result |= (bulk >> 4) & 0x7_F000_0000;
        if bulk & 0x80_0000_0000 == 0 {
            self.reader_index += 5;
            return Ok(result);
        }
        result |= (bulk >> 5) & 0x3F8_0000_0000;
        if bulk & 0x8000_0000_0000 == 0 {
            self.reader_index += 6;
            return Ok(result);
        }
        result |= (bulk >> 6) & 0x1_FC00_0000_0000;
        if bulk & 0x80_0000_0000_0000 == 0 {
            self.reader_index += 7;
            return Ok(result);
        }
        result |= (bulk >> 7) & 0xFE_0000_0000_0000;
        if bulk & 0x8000_0000_0000_0000 == 0 {
            self.reader_index += 8;
            return Ok(result);
        }
        // 9. Byte: Bits 56–63 roh.
        result |= u64::from(d[offset + 8]) << 56;
        self.reader_index += 9;
        Ok(result)
    }

    fn read_var_uint64_slow(&mut self) -> Result<u64> {
        let mut position = self.reader_index;
        let mut result = 0u64;
        let mut shift = 0u32;
        for _ in 0..8 {
            self.ensure_size(u64::from(position) + 1)?;
            let b = self.data()[position as usize];
            position += 1;
            result |= u64::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                self.reader_index = position;
                return Ok(result);
            }
            shift += 7;
        }
        self.ensure_size(u64::from(position) + 1)?;
        let last = self.data()[position as usize];
        position += 1;
        result |= u64::from(last) << 56;
        self.reader_index = position;
        Ok(result)
    }

    /// Reads a zig-zag VarInt64.
    #[inline]
    pub fn read_var_int64(&mut self) -> Result<i64> {
        let raw = self.read_var_uint64()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Reads a VarUint36Small (≤ 5 bytes; byte 5 contributes bits 28–35).
    pub fn read_var_uint36_small(&mut self) -> Result<u64> {
        self.ensure_readable(1)?;
        if self.size() - self.reader_index < 8 {
            return self.read_var_uint36_small_slow();
        }
        let offset = self.reader_index as usize;
        let bulk = load_u64_le(self.data(), offset);
        let mut result = bulk & 0x7F;
        if bulk & 0x80 == 0 {
            self.reader_index += 1;
            return Ok(result);
        }
        result |= (bulk >> 1) & 0x3F80;
        if bulk & 0x8000 == 0 {
            self.reader_index += 2;
            return Ok(result);
        }
        result |= (bulk >> 2) & 0x1F_C000;
        if bulk & 0x80_0000 == 0 {
            self.reader_index += 3;
            return Ok(result);
        }
        result |= (bulk >> 3) & 0xFE0_0000;
        if bulk & 0x8000_0000 == 0 {
            self.reader_index += 4;
            return Ok(result);
        }
        result |= (bulk >> 4) & 0xF_F000_0000;
        self.reader_index += 5;
        Ok(result)
    }

    fn read_var_uint36_small_slow(&mut self) -> Result<u64> {
        let mut position = self.reader_index;
        let mut result = 0u64;
        for i in 0..5u32 {
            self.ensure_size(u64::from(position) + 1)?;
            let b = self.data()[position as usize];
            position += 1;
            if i < 4 {
                result |= u64::from(b & 0x7F) << (i * 7);
                if b & 0x80 == 0 {
                    self.reader_index = position;
                    return Ok(result);
                }
            } else {
                // 5. Byte: alle 8 Bits als Bits 28–35.
                result |= u64::from(b) << 28;
                self.reader_index = position;
                return Ok(result);
            }
        }
        unreachable!("var_uint36_small loop bounds")
    }

    /// Reads a tagged i64: low bit of the leading 4 bytes selects the short
    /// form (arithmetic `value >> 1`) or flag byte + 8 raw bytes.
    pub fn read_tagged_int64(&mut self) -> Result<i64> {
        self.ensure_readable(4)?;
        let i = load_u32_le(self.data(), self.reader_index as usize) as i32;
        if i & 0b1 != 0b1 {
            self.reader_index += 4;
            Ok(i64::from(i >> 1)) // arithmetischer Shift
        } else {
            self.ensure_readable(9)?;
            let value = load_u64_le(self.data(), self.reader_index as usize + 1) as i64;
            self.reader_index += 9;
            Ok(value)
        }
    }

    /// Reads a tagged u64 (unsigned counterpart of [`read_tagged_int64`](Self::read_tagged_int64)).
    pub fn read_tagged_uint64(&mut self) -> Result<u64> {
        self.ensure_readable(4)?;
        let i = load_u32_le(self.data(), self.reader_index as usize);
        if i & 0b1 != 0b1 {
            self.reader_index += 4;
            Ok(u64::from(i >> 1))
        } else {
            self.ensure_readable(9)?;
            let value = load_u64_le(self.data(), self.reader_index as usize + 1);
            self.reader_index += 9;
            Ok(value)
        }
    }
}
