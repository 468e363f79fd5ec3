//! Per-message meta-string table (xlang spec: meta string).
//!
//! When a meta-string is emitted, the wire header is a varuint whose LSB
//! signals ref vs. inline: `(id << 1) | 1` references entry `id` (1-based),
//! `(len << 1)` announces an inline string of `len` encoded bytes that is
//! added to the table. IDs are assigned in first-appearance order; the
//! table lives for exactly one message and is cleared by `reset`.
//!
//! Inline-Layout nach Länge: für `len > 16` folgt ein 8-Byte-Diskriminator,
//! dessen niedrigstes Byte das Encoding trägt und dessen obere 56 Bits der
//! FNV-1a-Hash der codierten Bytes sind; für `0 < len ≤ 16` ein einzelnes
//! Encoding-Byte; für `len == 0` nichts (leerer String).

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::hash::fnv1a_64;
use crate::meta_string::{
    meta_encoding_from_byte, EncodedMetaString, MetaEncoding, MetaStringDecoder,
};
use crate::FastHashMap;

/// Above this encoded length the inline layout switches from the single
/// encoding byte to the 8-byte hash discriminator.
pub const SMALL_STRING_THRESHOLD: u32 = 16;

/// A pre-encoded meta-string with its big-string discriminator, cached at
/// type registration so emission never re-encodes or re-hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaStringBytes {
    /// Encoding-Variante der Payload.
    pub encoding: MetaEncoding,
    /// Codierte Payload-Bytes.
    pub bytes: Vec<u8>,
    /// 8-Byte-Diskriminator: Bits 8–63 = untere 56 Bits des FNV-1a-Hashes,
    /// Bits 0–7 = Encoding-Tag.
    pub discriminator: i64,
}

impl MetaStringBytes {
    /// Wraps an encoder result, computing the discriminator.
    pub fn from_encoded(encoded: EncodedMetaString) -> Self {
        let hash = fnv1a_64(&encoded.bytes);
        let discriminator = (((hash & 0x00FF_FFFF_FFFF_FFFF) << 8) | u64::from(encoded.encoding as u8)) as i64;
        Self { encoding: encoded.encoding, bytes: encoded.bytes, discriminator }
    }
}

/// Write-side table: encoded bytes → 1-based id, emitting back-references
/// for repeats within one message.
#[derive(Default)]
pub struct MetaStringWriteTable {
    ids: FastHashMap<Vec<u8>, u32>,
}

impl MetaStringWriteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all entries (message boundary).
    pub fn reset(&mut self) {
        self.ids.clear();
    }

    /// Emits `ms` on the wire: an inline definition on first appearance,
    /// a single varuint back-reference afterwards.
    pub fn write(&mut self, buffer: &mut Buffer<'_>, ms: &MetaStringBytes) {
        if let Some(&id) = self.ids.get(ms.bytes.as_slice()) {
            buffer.write_var_uint32((id << 1) | 1);
            return;
        }
        let id = self.ids.len() as u32 + 1; // 1-basiert
        self.ids.insert(ms.bytes.clone(), id);

        let len = ms.bytes.len() as u32;
        buffer.write_var_uint32(len << 1);
        if len > SMALL_STRING_THRESHOLD {
            buffer.write_i64(ms.discriminator);
        } else if len > 0 {
            buffer.write_i8(ms.encoding as i8);
        }
        if len > 0 {
            buffer.write_bytes(&ms.bytes);
        }
    }
}

/// Read-side table: 1-based id → decoded string, filled in
/// first-appearance order by [`read`](MetaStringReadTable::read).
#[derive(Default)]
pub struct MetaStringReadTable {
    entries: Vec<String>,
}

impl MetaStringReadTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all entries (message boundary).
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Reads one meta-string: resolves back-references against the table,
    /// decodes inline definitions with `decoder` and records them.
    pub fn read(&mut self, buffer: &mut Buffer<'_>, decoder: &MetaStringDecoder) -> Result<String> {
        let header = buffer.read_var_uint32()?;
        let len_or_id = header >> 1;
        let is_ref = header & 1 != 0;

        if is_ref {
            if len_or_id == 0 || len_or_id as usize > self.entries.len() {
                return Err(Error::invalid_data(format!(
                    "invalid meta string reference id: {len_or_id}"
                )));
            }
            return Ok(self.entries[len_or_id as usize - 1].clone());
        }

        let len = len_or_id;
        let decoded = if len == 0 {
            String::new()
        } else if len > SMALL_STRING_THRESHOLD {
            // Diskriminator: unteres Byte Encoding, Rest Hash (wird nicht
            // verifiziert — Fingerabdruck, keine Integritätsprüfung).
            let discriminator = buffer.read_i64()?;
            let encoding = meta_encoding_from_byte((discriminator & 0xFF) as u8)?;
            let bytes = buffer.read_slice(len)?.to_vec();
            decoder.decode(&bytes, encoding)?
        } else {
            let encoding = meta_encoding_from_byte(buffer.read_i8()? as u8)?;
            let bytes = buffer.read_slice(len)?.to_vec();
            decoder.decode(&bytes, encoding)?
        };

        self.entries.push(decoded.clone());
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_string::MetaStringEncoder;

    fn encode(s: &str) -> MetaStringBytes {
        MetaStringBytes::from_encoded(MetaStringEncoder::new('.', '_').encode(s, &[]).unwrap())
    }

    fn decoder() -> MetaStringDecoder {
        MetaStringDecoder::new('.', '_')
    }

    // --- Test 1: inline then back-reference ---

    #[test]
    fn first_write_is_inline_second_is_ref() {
        let ms = encode("org.example");
        let mut table = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        table.write(&mut b, &ms);
        let inline_len = b.writer_index();
        table.write(&mut b, &ms);
        // Back-Ref: (1 << 1) | 1 = 3, ein Byte.
        assert_eq!(b.writer_index(), inline_len + 1);
        let bytes = b.into_vec();
        assert_eq!(bytes[inline_len as usize], 0x03);

        let mut r = Buffer::from_vec(bytes);
        let mut read_table = MetaStringReadTable::new();
        assert_eq!(read_table.read(&mut r, &decoder()).unwrap(), "org.example");
        assert_eq!(read_table.read(&mut r, &decoder()).unwrap(), "org.example");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn ids_assigned_in_first_appearance_order() {
        let a = encode("first.ns");
        let b_ms = encode("second.ns");
        let mut table = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        table.write(&mut b, &a);
        table.write(&mut b, &b_ms);
        table.write(&mut b, &b_ms); // ref auf id 2 → (2<<1)|1 = 5
        table.write(&mut b, &a); // ref auf id 1 → 3
        let bytes = b.into_vec();
        assert_eq!(bytes[bytes.len() - 2], 0x05);
        assert_eq!(bytes[bytes.len() - 1], 0x03);

        let mut r = Buffer::from_vec(bytes);
        let mut rt = MetaStringReadTable::new();
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), "first.ns");
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), "second.ns");
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), "second.ns");
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), "first.ns");
    }

    // --- Test 2: small-string layout (len ≤ 16): encoding byte + bytes ---

    #[test]
    fn small_string_carries_encoding_byte() {
        let ms = encode("abc");
        let mut table = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        table.write(&mut b, &ms);
        let bytes = b.into_vec();
        let len = ms.bytes.len() as u32;
        assert!(len <= SMALL_STRING_THRESHOLD);
        assert_eq!(bytes[0], (len << 1) as u8);
        assert_eq!(bytes[1], ms.encoding as u8);
        assert_eq!(&bytes[2..], ms.bytes.as_slice());
    }

    // --- Test 3: big-string layout (len > 16): 8-byte discriminator ---

    #[test]
    fn big_string_carries_discriminator() {
        // UTF-8 erzwingen damit encoded len > 16.
        let s = "Ein.Sehr.Langer.Namespace.Pfad.Über.Die.Schwelle";
        let ms = encode(s);
        assert!(ms.bytes.len() as u32 > SMALL_STRING_THRESHOLD);

        let mut table = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        table.write(&mut b, &ms);
        let bytes = b.into_vec();

        let mut r = Buffer::from_vec(bytes);
        let header = r.read_var_uint32().unwrap();
        assert_eq!(header >> 1, ms.bytes.len() as u32);
        let discriminator = r.read_i64().unwrap();
        // Niedrigstes Byte ist das Encoding-Tag.
        assert_eq!((discriminator & 0xFF) as u8, ms.encoding as u8);
        assert_eq!(discriminator, ms.discriminator);

        let mut r = Buffer::from_vec({
            let mut b = Buffer::new();
            let mut t = MetaStringWriteTable::new();
            t.write(&mut b, &ms);
            b.into_vec()
        });
        let mut rt = MetaStringReadTable::new();
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), s);
    }

    // --- Test 4: boundary at exactly 16 encoded bytes ---

    #[test]
    fn boundary_length_sixteen_uses_small_layout() {
        // 16 UTF-8-Payload-Bytes: 15 ASCII-Zeichen + Diskriminator-Byte
        // ergäben 16... wir konstruieren direkt über die Byte-Länge.
        let mut s = String::from("Ä"); // non-ASCII → Extended/UTF-8, 2 Bytes + 1 Tag
        s.push_str("0123456789012"); // 13 weitere Bytes → 16 gesamt
        let ms = encode(&s);
        assert_eq!(ms.bytes.len(), 16);

        let mut table = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        table.write(&mut b, &ms);
        let bytes = b.into_vec();
        // Header (1 Byte: 32) + Encoding-Byte + 16 Payload-Bytes.
        assert_eq!(bytes.len(), 1 + 1 + 16);

        let mut r = Buffer::from_vec(bytes);
        let mut rt = MetaStringReadTable::new();
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), s);
    }

    // --- Test 5: empty string ---

    #[test]
    fn empty_string_is_header_only() {
        let ms = encode("");
        let mut table = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        table.write(&mut b, &ms);
        table.write(&mut b, &ms);
        let bytes = b.into_vec();
        // Inline: Header 0x00; danach Back-Ref 0x03.
        assert_eq!(bytes, vec![0x00, 0x03]);

        let mut r = Buffer::from_vec(bytes);
        let mut rt = MetaStringReadTable::new();
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), "");
        assert_eq!(rt.read(&mut r, &decoder()).unwrap(), "");
    }

    // --- Test 6: invalid references and reset ---

    #[test]
    fn ref_to_unknown_id_is_invalid_data() {
        // (5 << 1) | 1 = 11 ohne vorherige Einträge.
        let mut r = Buffer::from_vec(vec![11]);
        let mut rt = MetaStringReadTable::new();
        let err = rt.read(&mut r, &decoder()).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)), "{err}");
    }

    #[test]
    fn ref_id_zero_is_invalid_data() {
        let mut r = Buffer::from_vec(vec![0x01]);
        let mut rt = MetaStringReadTable::new();
        assert!(rt.read(&mut r, &decoder()).is_err());
    }

    #[test]
    fn reset_clears_both_tables() {
        let ms = encode("ns.one");
        let mut wt = MetaStringWriteTable::new();
        let mut b = Buffer::new();
        wt.write(&mut b, &ms);
        wt.reset();
        let mut b2 = Buffer::new();
        wt.write(&mut b2, &ms);
        // Nach Reset wieder inline, nicht Ref.
        assert_eq!(b.into_vec(), b2.into_vec());

        let mut rt = MetaStringReadTable::new();
        rt.entries.push("stale".to_string());
        rt.reset();
        let mut r = Buffer::from_vec(vec![0x03]);
        assert!(rt.read(&mut r, &decoder()).is_err());
    }

    #[test]
    fn truncated_inline_is_out_of_bound() {
        // Header kündigt 5 Bytes an, nur Encoding-Byte folgt.
        let mut r = Buffer::from_vec(vec![10, 0x01]);
        let mut rt = MetaStringReadTable::new();
        let err = rt.read(&mut r, &decoder()).unwrap_err();
        assert!(err.is_out_of_bound(), "{err}");
    }
}
