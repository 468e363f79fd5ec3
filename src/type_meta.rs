//! Full schema descriptions on the wire ("type defs", xlang spec: type meta).
//!
//! A type def is the pre-serialized schema of one user type: an 8-byte
//! header carrying body size and a content hash, followed by a body with
//! registration identity (user id or namespace/type name) and the field
//! list (name, type tag, nullability). Type defs are built once at
//! registration and emitted verbatim by the streaming type-meta protocol;
//! readers cache parsed results by header.
//!
//! Header-Layout (8 Bytes little-endian):
//! - Bits 0–11: Body-Größe in Bytes (0xFFF-Escape: varuint32 des
//!   Überschusses folgt direkt nach dem Header)
//! - Bit 12: has-fields-Flag (immer 1)
//! - Bit 13: compressed-Flag (immer 0, reserviert)
//! - Bits 14–63: untere 50 Bits des FNV-1a-64-Hashes über die Body-Bytes

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::hash::fnv1a_64;
use crate::meta_string::{meta_encoding_from_byte, MetaEncoding, MetaStringDecoder, MetaStringEncoder};
use crate::type_info::type_ids;

/// Body-Größe: Bits 0–11 des Headers.
const META_SIZE_MASK: u64 = 0xFFF;
/// has-fields-Flag.
const HAS_FIELDS_FLAG: u64 = 1 << 12;
/// compressed-Flag (reserviert).
const COMPRESSED_FLAG: u64 = 1 << 13;
/// register-by-name-Flag im Meta-Byte des Bodys.
const REGISTER_BY_NAME_FLAG: u8 = 0b10_0000;
/// Feldanzahl: Bits 0–3 des Meta-Bytes (15 = Escape).
const FIELD_COUNT_MASK: u8 = 0b1111;

/// Maximale Schachtelungstiefe von Feld-Typ-Tags (List/Map-Generics);
/// Schutz gegen Stack-Erschöpfung durch bösartige Eingaben.
const MAX_TYPE_NESTING: u32 = 64;

/// Field-name encodings referenced by the 2-bit index in field headers.
/// Index 0 = raw UTF-8 (tagless), 1 = AllToLowerSpecial, 2 = LowerUpperDigitSpecial.
const FIELD_NAME_ENCODINGS: [MetaEncoding; 2] =
    [MetaEncoding::AllToLowerSpecial, MetaEncoding::LowerUpperDigitSpecial];

/// A field's wire type: tag plus element/key/value tags for containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    /// Type-id tag (see [`type_ids`]).
    pub type_id: u32,
    /// Nullability of this (nested) position.
    pub nullable: bool,
    /// Identity tracking of this (nested) position.
    pub tracking: bool,
    /// LIST/SET: one element type; MAP: key and value types.
    pub generics: Vec<FieldType>,
}

impl FieldType {
    /// A scalar field type.
    pub fn scalar(type_id: u32) -> Self {
        Self { type_id, nullable: false, tracking: false, generics: Vec::new() }
    }

    /// A list of `element`.
    pub fn list_of(element: FieldType) -> Self {
        Self { type_id: type_ids::LIST, nullable: false, tracking: false, generics: vec![element] }
    }

    /// A map from `key` to `value`.
    pub fn map_of(key: FieldType, value: FieldType) -> Self {
        Self {
            type_id: type_ids::MAP,
            nullable: false,
            tracking: false,
            generics: vec![key, value],
        }
    }

    /// Marks this position nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn write(&self, buffer: &mut Buffer<'_>, nested: bool) -> Result<()> {
        let header = if nested {
            (self.type_id << 2) | (u32::from(self.nullable) << 1) | u32::from(self.tracking)
        } else {
            self.type_id
        };
        buffer.write_var_uint32(header);
        match self.type_id {
            type_ids::LIST | type_ids::SET => {
                let element = self.generics.first().ok_or_else(|| {
                    Error::type_error("list/set field type requires an element type")
                })?;
                element.write(buffer, true)?;
            }
            type_ids::MAP => {
                if self.generics.len() != 2 {
                    return Err(Error::type_error("map field type requires key and value types"));
                }
                self.generics[0].write(buffer, true)?;
                self.generics[1].write(buffer, true)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn read(buffer: &mut Buffer<'_>, nested: bool, depth: u32) -> Result<Self> {
        if depth > MAX_TYPE_NESTING {
            return Err(Error::invalid_data("field type nesting exceeds limit"));
        }
        let header = buffer.read_var_uint32()?;
        let (type_id, nullable, tracking) = if nested {
            (header >> 2, header & 0b10 != 0, header & 0b1 != 0)
        } else {
            (header, false, false)
        };
        let generics = match type_id {
            type_ids::LIST | type_ids::SET => {
                vec![Self::read(buffer, true, depth + 1)?]
            }
            type_ids::MAP => {
                let key = Self::read(buffer, true, depth + 1)?;
                let value = Self::read(buffer, true, depth + 1)?;
                vec![key, value]
            }
            _ => Vec::new(),
        };
        Ok(Self { type_id, nullable, tracking, generics })
    }
}

/// One field of a type def.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name (identifier).
    pub name: String,
    /// Wire type of the field value.
    pub field_type: FieldType,
    /// Nullability (bit 1 of the field header).
    pub nullable: bool,
    /// Identity tracking (bit 0 of the field header).
    pub tracking: bool,
    /// Cross-walk result on the read side: index of the matching local
    /// field, `None` when the field exists only on the wire.
    pub local_index: Option<u32>,
}

impl FieldDef {
    /// A non-nullable, untracked field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, nullable: false, tracking: false, local_index: None }
    }

    /// A nullable field.
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, nullable: true, tracking: false, local_index: None }
    }

    fn write(&self, buffer: &mut Buffer<'_>, encoder: &MetaStringEncoder) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::encode_error("field name must not be empty"));
        }
        // Bevorzugt 5-/6-Bit-Packung, sonst rohe UTF-8-Bytes (Index 0).
        let (encoding_idx, name_bytes) = if self.name.is_ascii() {
            match encoder.compute_encoding(&self.name, &FIELD_NAME_ENCODINGS) {
                MetaEncoding::AllToLowerSpecial => {
                    (1u8, encoder.encode_as(&self.name, MetaEncoding::AllToLowerSpecial)?)
                }
                MetaEncoding::LowerUpperDigitSpecial => {
                    (2u8, encoder.encode_as(&self.name, MetaEncoding::LowerUpperDigitSpecial)?)
                }
                _ => (0u8, self.name.as_bytes().to_vec()),
            }
        } else {
            (0u8, self.name.as_bytes().to_vec())
        };

        // header: | encoding:2 | name_size-1:4 | nullable:1 | tracking:1 |
        let name_size = name_bytes.len() - 1;
        let mut header = (name_size.min(0b1111) as u8) << 2;
        if self.tracking {
            header |= 0b1;
        }
        if self.nullable {
            header |= 0b10;
        }
        header |= encoding_idx << 6;
        buffer.write_u8(header);
        if name_size >= 0b1111 {
            buffer.write_var_uint32((name_size - 0b1111) as u32);
        }
        self.field_type.write(buffer, false)?;
        buffer.write_bytes(&name_bytes);
        Ok(())
    }

    fn read(buffer: &mut Buffer<'_>, decoder: &MetaStringDecoder) -> Result<Self> {
        let header = buffer.read_u8()?;
        let tracking = header & 0b1 != 0;
        let nullable = header & 0b10 != 0;
        let encoding_idx = (header >> 6) & 0b11;
        let mut name_size = usize::from((header >> 2) & 0b1111);
        if name_size == 0b1111 {
            name_size += buffer.read_var_uint32()? as usize;
        }
        name_size += 1;

        let field_type = FieldType::read(buffer, false, 0)?;

        let name_bytes = buffer.read_slice(name_size as u32)?.to_vec();
        let name = match encoding_idx {
            0 => String::from_utf8(name_bytes)
                .map_err(|_| Error::encoding_error("invalid UTF-8 in field name"))?,
            1 => decoder.decode(&name_bytes, MetaEncoding::AllToLowerSpecial)?,
            2 => decoder.decode(&name_bytes, MetaEncoding::LowerUpperDigitSpecial)?,
            other => {
                return Err(Error::encoding_error(format!(
                    "unsupported field name encoding index: {other}"
                )))
            }
        };

        Ok(Self { name, field_type, nullable, tracking, local_index: None })
    }
}

/// Parsed full schema description of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMeta {
    /// Category type id (e.g. COMPATIBLE_STRUCT).
    pub type_id: u32,
    /// User type id for by-id registrations.
    pub user_type_id: Option<u32>,
    /// True when registered by (namespace, type name).
    pub register_by_name: bool,
    /// Namespace for by-name registrations.
    pub namespace: String,
    /// Type name for by-name registrations.
    pub type_name: String,
    /// Field list in declaration order.
    pub fields: Vec<FieldDef>,
}

impl TypeMeta {
    /// Schema of a by-id registration.
    pub fn by_id(type_id: u32, user_type_id: u32, fields: Vec<FieldDef>) -> Self {
        Self {
            type_id,
            user_type_id: Some(user_type_id),
            register_by_name: false,
            namespace: String::new(),
            type_name: String::new(),
            fields,
        }
    }

    /// Schema of a by-name registration.
    pub fn by_name(
        type_id: u32,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Self {
        Self {
            type_id,
            user_type_id: None,
            register_by_name: true,
            namespace: namespace.into(),
            type_name: type_name.into(),
            fields,
        }
    }

    /// Meta-String ohne Tabellen-Kontext: varuint Länge, Encoding-Byte,
    /// Bytes. Type defs müssen kontextfrei bleiben (keine Tabellen-Refs).
    fn write_plain_meta_string(
        buffer: &mut Buffer<'_>,
        encoder: &MetaStringEncoder,
        value: &str,
    ) -> Result<()> {
        let encoded = encoder.encode(value, &[])?;
        buffer.write_var_uint32(encoded.bytes.len() as u32);
        buffer.write_u8(encoded.encoding as u8);
        buffer.write_bytes(&encoded.bytes);
        Ok(())
    }

    fn read_plain_meta_string(
        buffer: &mut Buffer<'_>,
        decoder: &MetaStringDecoder,
    ) -> Result<String> {
        let len = buffer.read_var_uint32()?;
        let encoding = meta_encoding_from_byte(buffer.read_u8()?)?;
        let bytes = buffer.read_slice(len)?.to_vec();
        decoder.decode(&bytes, encoding)
    }

    /// Serializes the full type def: 8-byte header plus body.
    pub fn to_bytes(
        &self,
        ns_encoder: &MetaStringEncoder,
        tn_encoder: &MetaStringEncoder,
    ) -> Result<Vec<u8>> {
        // Body zuerst, Header braucht Größe und Hash.
        let mut body = Buffer::new();
        let count = self.fields.len();
        let mut meta_byte = count.min(0b1111) as u8;
        if self.register_by_name {
            meta_byte |= REGISTER_BY_NAME_FLAG;
        }
        body.write_u8(meta_byte);
        if count >= 0b1111 {
            body.write_var_uint32((count - 0b1111) as u32);
        }
        body.write_var_uint32(self.type_id);
        if self.register_by_name {
            Self::write_plain_meta_string(&mut body, ns_encoder, &self.namespace)?;
            Self::write_plain_meta_string(&mut body, tn_encoder, &self.type_name)?;
        } else {
            let user_type_id = self.user_type_id.ok_or_else(|| {
                Error::type_error("user type id is required for by-id type defs")
            })?;
            body.write_var_uint32(user_type_id);
        }
        for field in &self.fields {
            field.write(&mut body, tn_encoder)?;
        }
        let body = body.into_vec();

        let meta_size = body.len() as u64;
        let mut header = meta_size.min(META_SIZE_MASK) | HAS_FIELDS_FLAG;
        let hash = fnv1a_64(&body);
        header |= (hash & ((1 << 50) - 1)) << 14;

        let mut result = Buffer::new();
        result.write_u64(header);
        if meta_size >= META_SIZE_MASK {
            result.write_var_uint32((meta_size - META_SIZE_MASK) as u32);
        }
        result.write_bytes(&body);
        Ok(result.into_vec())
    }

    /// Reads the body size from a header, consuming the escape varuint
    /// when present.
    fn read_body_size(buffer: &mut Buffer<'_>, header: u64) -> Result<u32> {
        let mut size = header & META_SIZE_MASK;
        if size == META_SIZE_MASK {
            size += u64::from(buffer.read_var_uint32()?);
        }
        if size > u64::from(u32::MAX) {
            return Err(Error::out_of_bound("type def body size exceeds u32 range"));
        }
        Ok(size as u32)
    }

    /// Skips a type def body whose header has already been read (cache hit
    /// path of the read context).
    pub fn skip_body(buffer: &mut Buffer<'_>, header: u64) -> Result<()> {
        let size = Self::read_body_size(buffer, header)?;
        buffer.skip(size)
    }

    /// Parses a type def whose 8-byte header has already been read.
    pub fn from_bytes_with_header(
        buffer: &mut Buffer<'_>,
        header: u64,
        ns_decoder: &MetaStringDecoder,
        tn_decoder: &MetaStringDecoder,
    ) -> Result<TypeMeta> {
        if header & HAS_FIELDS_FLAG == 0 {
            return Err(Error::invalid_data("type def header missing has-fields flag"));
        }
        if header & COMPRESSED_FLAG != 0 {
            return Err(Error::invalid_data("compressed type defs are not supported"));
        }
        let size = Self::read_body_size(buffer, header)?;
        let start = buffer.reader_index();

        let meta_byte = buffer.read_u8()?;
        let register_by_name = meta_byte & REGISTER_BY_NAME_FLAG != 0;
        let mut count = u32::from(meta_byte & FIELD_COUNT_MASK);
        if count == u32::from(FIELD_COUNT_MASK) {
            count += buffer.read_var_uint32()?;
        }

        let type_id = buffer.read_var_uint32()?;
        let (user_type_id, namespace, type_name) = if register_by_name {
            let namespace = Self::read_plain_meta_string(buffer, ns_decoder)?;
            let type_name = Self::read_plain_meta_string(buffer, tn_decoder)?;
            (None, namespace, type_name)
        } else {
            let user_type_id = buffer.read_var_uint32()?;
            (Some(user_type_id), String::new(), String::new())
        };

        let mut fields = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            fields.push(FieldDef::read(buffer, tn_decoder)?);
        }

        let consumed = buffer.reader_index() - start;
        if consumed != size {
            return Err(Error::invalid_data(format!(
                "type def body size mismatch: declared {size}, consumed {consumed}"
            )));
        }

        Ok(TypeMeta { type_id, user_type_id, register_by_name, namespace, type_name, fields })
    }

    /// Parses a full type def including its header.
    pub fn from_bytes(
        buffer: &mut Buffer<'_>,
        ns_decoder: &MetaStringDecoder,
        tn_decoder: &MetaStringDecoder,
    ) -> Result<TypeMeta> {
        let header = buffer.read_u64()?;
        Self::from_bytes_with_header(buffer, header, ns_decoder, tn_decoder)
    }

    /// Schema-evolution cross-walk: assigns each wire field the index of
    /// the local field with the same name, or `None` when the field exists
    /// only on the wire. Local fields missing from the wire are the
    /// reader's responsibility (default values).
    pub fn assign_local_indices(&mut self, local: &TypeMeta) {
        for field in &mut self.fields {
            field.local_index = local
                .fields
                .iter()
                .position(|l| l.name == field.name)
                .map(|i| i as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::type_ids::*;

    fn ns_encoder() -> MetaStringEncoder {
        MetaStringEncoder::new('.', '_')
    }

    fn tn_encoder() -> MetaStringEncoder {
        MetaStringEncoder::new('$', '_')
    }

    fn ns_decoder() -> MetaStringDecoder {
        MetaStringDecoder::new('.', '_')
    }

    fn tn_decoder() -> MetaStringDecoder {
        MetaStringDecoder::new('$', '_')
    }

    fn sample_meta() -> TypeMeta {
        TypeMeta::by_id(
            COMPATIBLE_STRUCT,
            7,
            vec![
                FieldDef::new("name", FieldType::scalar(STRING)),
                FieldDef::new("values", FieldType::list_of(FieldType::scalar(VARINT32))),
                FieldDef::new(
                    "metrics",
                    FieldType::map_of(FieldType::scalar(STRING), FieldType::scalar(VARINT64)),
                ),
                FieldDef::nullable("note", FieldType::scalar(STRING)),
            ],
        )
    }

    fn round_trip(meta: &TypeMeta) -> TypeMeta {
        let bytes = meta.to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
        let mut b = Buffer::from_vec(bytes);
        TypeMeta::from_bytes(&mut b, &ns_decoder(), &tn_decoder()).unwrap()
    }

    // --- Test 1: header layout ---

    #[test]
    fn header_carries_size_flag_and_hash() {
        let meta = sample_meta();
        let bytes = meta.to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
        let mut b = Buffer::from_vec(bytes.clone());
        let header = b.read_u64().unwrap();

        let body = &bytes[8..];
        assert_eq!(header & META_SIZE_MASK, body.len() as u64);
        assert_ne!(header & HAS_FIELDS_FLAG, 0);
        assert_eq!(header & COMPRESSED_FLAG, 0);
        assert_eq!(header >> 14, fnv1a_64(body) & ((1 << 50) - 1));
    }

    #[test]
    fn identical_schemas_share_headers() {
        let a = sample_meta().to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
        let b = sample_meta().to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_schemas_differ_in_hash() {
        let a = sample_meta();
        let mut b = sample_meta();
        b.fields[0].name = "renamed".to_string();
        let ha = {
            let bytes = a.to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
            Buffer::from_vec(bytes).read_u64().unwrap()
        };
        let hb = {
            let bytes = b.to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
            Buffer::from_vec(bytes).read_u64().unwrap()
        };
        assert_ne!(ha >> 14, hb >> 14);
    }

    // --- Test 2: by-id round trip ---

    #[test]
    fn by_id_round_trip() {
        let meta = sample_meta();
        let parsed = round_trip(&meta);
        assert_eq!(parsed.type_id, COMPATIBLE_STRUCT);
        assert_eq!(parsed.user_type_id, Some(7));
        assert!(!parsed.register_by_name);
        assert_eq!(parsed.fields.len(), 4);
        assert_eq!(parsed.fields[0].name, "name");
        assert_eq!(parsed.fields[1].field_type, FieldType::list_of(FieldType::scalar(VARINT32)));
        assert_eq!(
            parsed.fields[2].field_type,
            FieldType::map_of(FieldType::scalar(STRING), FieldType::scalar(VARINT64))
        );
        assert!(parsed.fields[3].nullable);
        assert!(!parsed.fields[0].nullable);
    }

    // --- Test 3: by-name round trip ---

    #[test]
    fn by_name_round_trip() {
        let meta = TypeMeta::by_name(
            NAMED_COMPATIBLE_STRUCT,
            "org.example.model",
            "PersonRecord",
            vec![FieldDef::new("age", FieldType::scalar(VARINT32))],
        );
        let parsed = round_trip(&meta);
        assert!(parsed.register_by_name);
        assert_eq!(parsed.namespace, "org.example.model");
        assert_eq!(parsed.type_name, "PersonRecord");
        assert_eq!(parsed.fields.len(), 1);
        assert_eq!(parsed.fields[0].name, "age");
    }

    // --- Test 4: field-count boundaries ---

    #[test]
    fn zero_fields_round_trip() {
        let meta = TypeMeta::by_id(COMPATIBLE_STRUCT, 1, Vec::new());
        let parsed = round_trip(&meta);
        assert!(parsed.fields.is_empty());
    }

    #[test]
    fn many_fields_use_count_escape() {
        let fields: Vec<FieldDef> = (0..20)
            .map(|i| FieldDef::new(format!("field{i}"), FieldType::scalar(VARINT32)))
            .collect();
        let meta = TypeMeta::by_id(COMPATIBLE_STRUCT, 2, fields);
        let parsed = round_trip(&meta);
        assert_eq!(parsed.fields.len(), 20);
        assert_eq!(parsed.fields[19].name, "field19");
    }

    #[test]
    fn exactly_fifteen_fields_round_trip() {
        let fields: Vec<FieldDef> = (0..15)
            .map(|i| FieldDef::new(format!("f{i}"), FieldType::scalar(BOOL)))
            .collect();
        let meta = TypeMeta::by_id(COMPATIBLE_STRUCT, 3, fields);
        assert_eq!(round_trip(&meta).fields.len(), 15);
    }

    // --- Test 5: long and non-ASCII field names ---

    #[test]
    fn long_field_name_uses_size_escape() {
        let name = "averyverylongfieldnamethatexceedstheencodedsizenibble";
        let meta = TypeMeta::by_id(
            COMPATIBLE_STRUCT,
            4,
            vec![FieldDef::new(name, FieldType::scalar(VARINT64))],
        );
        assert_eq!(round_trip(&meta).fields[0].name, name);
    }

    #[test]
    fn non_ascii_field_name_uses_raw_utf8() {
        let meta = TypeMeta::by_id(
            COMPATIBLE_STRUCT,
            5,
            vec![FieldDef::new("größe", FieldType::scalar(FLOAT64))],
        );
        assert_eq!(round_trip(&meta).fields[0].name, "größe");
    }

    #[test]
    fn mixed_case_field_name_round_trips() {
        let meta = TypeMeta::by_id(
            COMPATIBLE_STRUCT,
            6,
            vec![FieldDef::new("innerPoint", FieldType::scalar(STRUCT))],
        );
        assert_eq!(round_trip(&meta).fields[0].name, "innerPoint");
    }

    // --- Test 6: nested container tags ---

    #[test]
    fn nested_list_of_list_round_trips() {
        let ft = FieldType::list_of(FieldType::list_of(FieldType::scalar(VARINT32).nullable()));
        let meta = TypeMeta::by_id(COMPATIBLE_STRUCT, 8, vec![FieldDef::new("grid", ft.clone())]);
        assert_eq!(round_trip(&meta).fields[0].field_type, ft);
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        // Künstlich tief verschachtelte LIST-Tags direkt als Bytes.
        let mut body = Buffer::new();
        body.write_u8(1); // ein Feld
        body.write_var_uint32(COMPATIBLE_STRUCT);
        body.write_var_uint32(9);
        body.write_u8(0b0000_0000); // Feld-Header: raw utf8, len 1
        body.write_var_uint32(LIST); // top-level Tag
        for _ in 0..100 {
            body.write_var_uint32(LIST << 2); // nested Tags ohne Ende
        }
        let body = body.into_vec();
        let mut full = Buffer::new();
        full.write_u64((body.len() as u64) | HAS_FIELDS_FLAG);
        full.write_bytes(&body);
        let mut b = Buffer::from_vec(full.into_vec());
        let err = TypeMeta::from_bytes(&mut b, &ns_decoder(), &tn_decoder()).unwrap_err();
        assert!(err.is_out_of_bound() || matches!(err, Error::InvalidData(_)), "{err}");
    }

    // --- Test 7: skip_body ---

    #[test]
    fn skip_body_lands_after_type_def() {
        let meta = sample_meta();
        let bytes = meta.to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
        let total = bytes.len() as u32;
        let mut b = Buffer::from_vec(bytes);
        let header = b.read_u64().unwrap();
        TypeMeta::skip_body(&mut b, header).unwrap();
        assert_eq!(b.reader_index(), total);
    }

    // --- Test 8: size mismatch detection ---

    #[test]
    fn declared_size_mismatch_is_invalid_data() {
        let meta = TypeMeta::by_id(COMPATIBLE_STRUCT, 1, Vec::new());
        let mut bytes = meta.to_bytes(&ns_encoder(), &tn_encoder()).unwrap();
        // Größe im Header verfälschen (Bits 0–11).
        bytes[0] = bytes[0].wrapping_add(1);
        let mut b = Buffer::from_vec(bytes);
        let err = TypeMeta::from_bytes(&mut b, &ns_decoder(), &tn_decoder()).unwrap_err();
        assert!(
            matches!(err, Error::InvalidData(_)) || err.is_out_of_bound(),
            "{err}"
        );
    }

    // --- Test 9: cross-walk (schema evolution) ---

    #[test]
    fn cross_walk_assigns_matching_indices() {
        let local = TypeMeta::by_id(
            COMPATIBLE_STRUCT,
            7,
            vec![
                FieldDef::new("name", FieldType::scalar(STRING)),
                FieldDef::new("age", FieldType::scalar(VARINT32)),
            ],
        );
        // Wire-Schema: ein gemeinsames, ein nur-Wire, ein fehlendes Feld.
        let mut wire = TypeMeta::by_id(
            COMPATIBLE_STRUCT,
            7,
            vec![
                FieldDef::new("age", FieldType::scalar(VARINT32)),
                FieldDef::new("legacy_flag", FieldType::scalar(BOOL)),
            ],
        );
        wire.assign_local_indices(&local);
        assert_eq!(wire.fields[0].local_index, Some(1));
        assert_eq!(wire.fields[1].local_index, None);
    }

    #[test]
    fn cross_walk_identical_schemas_is_identity() {
        let local = sample_meta();
        let mut wire = sample_meta();
        wire.assign_local_indices(&local);
        for (i, f) in wire.fields.iter().enumerate() {
            assert_eq!(f.local_index, Some(i as u32), "field {}", f.name);
        }
    }
}
