//! Per-type serializers: the collaborator layer on top of buffer and
//! contexts.
//!
//! A [`Serializer`] writes/reads one value kind. `write_data`/`read_data`
//! handle the body only; `write`/`read` are the full value form (ref flag
//! per the declared [`RefMode`], then type info, then body). The contexts'
//! `serialize`/`deserialize` entry points drive the full form for the root
//! value.
//!
//! Feld-Konvention für Structs: skalare Felder, Strings und Container
//! schreiben nur den Body (`write_data`); Struct-Felder und Felder mit
//! Ref-Modus ≠ `None` schreiben die volle Form (`write`), damit
//! Schema-Evolution unbekannte Felder überspringen kann.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::decoder::ReadContext;
use crate::encoder::WriteContext;
use crate::error::{Error, Result};
use crate::ref_tracker::{
    RefMode, NOT_NULL_VALUE_FLAG, NULL_FLAG, REF_FLAG, REF_VALUE_FLAG,
};
use crate::type_info::{is_struct_category, type_ids, Harness};
use crate::type_meta::FieldType;

/// Obergrenze für vorab reservierte Collection-Kapazität; schützt vor
/// Allokations-Bomben durch manipulierte Längen-Header.
const MAX_PREALLOC_LEN: u32 = 4096;

/// One serializable value kind.
pub trait Serializer: Sized + 'static {
    /// Declared reference policy; drives the flag byte of the full form.
    fn ref_mode() -> RefMode {
        RefMode::None
    }

    /// True when values of this type carry their own type-info prefix even
    /// in declared-type positions (struct fields and elements do, so that
    /// schema evolution can skip them; primitives don't).
    fn needs_type_info() -> bool {
        false
    }

    /// True when this value is a null root (only `Option` is).
    fn is_null(&self) -> bool {
        false
    }

    /// The value reconstructed from a null root message.
    fn null_value() -> Result<Self> {
        Err(Error::invalid_data("unexpected null root value"))
    }

    /// Writes the type-info prefix.
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Reads and validates the type-info prefix (the resolved info is
    /// available via `ctx.current_type_info()` afterwards).
    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()>;

    /// Writes the body payload.
    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Reads the body payload.
    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self>;

    /// Full value form: ref flag, type info, body.
    fn write(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if Self::ref_mode() != RefMode::None {
            ctx.buffer.write_i8(NOT_NULL_VALUE_FLAG);
        }
        Self::write_type_info(ctx)?;
        self.write_data(ctx)
    }

    /// Inverse of [`write`](Self::write).
    fn read(ctx: &mut ReadContext<'_>) -> Result<Self> {
        if Self::ref_mode() != RefMode::None {
            let flag = ctx.buffer.read_i8()?;
            match flag {
                NOT_NULL_VALUE_FLAG | REF_VALUE_FLAG => {}
                NULL_FLAG => {
                    return Err(Error::invalid_data("null value for non-nullable field"))
                }
                REF_FLAG => {
                    let ref_id = ctx.buffer.read_var_uint32()?;
                    return Err(Error::invalid_ref(format!(
                        "unexpected reference flag for non-referencable value, ref id: {ref_id}"
                    )));
                }
                other => {
                    return Err(Error::invalid_data(format!("unknown reference flag: {other}")))
                }
            }
        }
        Self::read_type_info(ctx)?;
        Self::read_data(ctx)
    }
}

// ============================================================================
// Primitives
// ============================================================================

impl Serializer for bool {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::BOOL)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::BOOL)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_u8(u8::from(*self));
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        match ctx.buffer.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::invalid_data(format!("invalid bool byte: {other}"))),
        }
    }
}

impl Serializer for i8 {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::INT8)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::INT8)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_i8(*self);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        ctx.buffer.read_i8()
    }
}

impl Serializer for i16 {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::INT16)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::INT16)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_i16(*self);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        ctx.buffer.read_i16()
    }
}

impl Serializer for i32 {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::VARINT32)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::VARINT32)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_var_int32(*self);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        ctx.buffer.read_var_int32()
    }
}

impl Serializer for i64 {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::VARINT64)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::VARINT64)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_var_int64(*self);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        ctx.buffer.read_var_int64()
    }
}

impl Serializer for f32 {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::FLOAT32)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::FLOAT32)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_f32(*self);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        ctx.buffer.read_f32()
    }
}

impl Serializer for f64 {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::FLOAT64)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::FLOAT64)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.buffer.write_f64(*self);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        ctx.buffer.read_f64()
    }
}

// ============================================================================
// Strings (xlang spec: string)
// ============================================================================

/// String-Header: varuint36small `(byte_len << 2) | encoding`.
const STRING_ENCODING_LATIN1: u64 = 0;
const STRING_ENCODING_UTF16LE: u64 = 1;
const STRING_ENCODING_UTF8: u64 = 2;

impl Serializer for String {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::STRING)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::STRING)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if self.len() as u64 >= 1 << 34 {
            return Err(Error::encode_error("string length exceeds the 34-bit header range"));
        }
        let bytes = self.as_bytes();
        // ASCII ⊂ Latin-1: der kompakteste Tag den jeder Peer lesen kann.
        let encoding = if self.is_ascii() { STRING_ENCODING_LATIN1 } else { STRING_ENCODING_UTF8 };
        ctx.buffer.write_var_uint36_small(((bytes.len() as u64) << 2) | encoding);
        ctx.buffer.write_bytes(bytes);
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let header = ctx.buffer.read_var_uint36_small()?;
        let byte_len = header >> 2;
        if byte_len > u64::from(u32::MAX) {
            return Err(Error::out_of_bound("string byte length exceeds u32 range"));
        }
        let encoding = header & 0b11;
        let bytes = ctx.buffer.read_slice(byte_len as u32)?;
        match encoding {
            STRING_ENCODING_LATIN1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            STRING_ENCODING_UTF16LE => {
                if byte_len % 2 != 0 {
                    return Err(Error::invalid_data("odd byte length for UTF-16LE string"));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                char::decode_utf16(units)
                    .collect::<std::result::Result<String, _>>()
                    .map_err(|_| Error::invalid_data("unpaired surrogate in UTF-16LE string"))
            }
            STRING_ENCODING_UTF8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::invalid_data("invalid UTF-8 string payload")),
            other => Err(Error::invalid_data(format!("unknown string encoding tag: {other}"))),
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

impl<T: Serializer> Serializer for Vec<T> {
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::LIST)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::LIST)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if self.len() > u32::MAX as usize {
            return Err(Error::encode_error("collection length exceeds u32 range"));
        }
        ctx.buffer.write_var_uint32(self.len() as u32);
        let full_form = T::needs_type_info() || T::ref_mode() != RefMode::None;
        for item in self {
            // Deklarierte Element-Typen: Body genügt; Structs, nullbare
            // und getrackte Elemente brauchen die volle Form.
            if full_form {
                item.write(ctx)?;
            } else {
                item.write_data(ctx)?;
            }
        }
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let len = ctx.buffer.read_var_uint32()?;
        let full_form = T::needs_type_info() || T::ref_mode() != RefMode::None;
        let mut result = Vec::with_capacity(len.min(MAX_PREALLOC_LEN) as usize);
        for _ in 0..len {
            let item = if full_form { T::read(ctx)? } else { T::read_data(ctx)? };
            result.push(item);
        }
        Ok(result)
    }
}

impl<K, V> Serializer for HashMap<K, V>
where
    K: Serializer + Eq + Hash,
    V: Serializer,
{
    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        ctx.write_type_id(type_ids::MAP)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        ctx.read_type_id_expect(type_ids::MAP)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if self.len() > u32::MAX as usize {
            return Err(Error::encode_error("collection length exceeds u32 range"));
        }
        ctx.buffer.write_var_uint32(self.len() as u32);
        let key_full = K::needs_type_info() || K::ref_mode() != RefMode::None;
        let value_full = V::needs_type_info() || V::ref_mode() != RefMode::None;
        for (key, value) in self {
            if key_full {
                key.write(ctx)?;
            } else {
                key.write_data(ctx)?;
            }
            if value_full {
                value.write(ctx)?;
            } else {
                value.write_data(ctx)?;
            }
        }
        Ok(())
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let len = ctx.buffer.read_var_uint32()?;
        let key_full = K::needs_type_info() || K::ref_mode() != RefMode::None;
        let value_full = V::needs_type_info() || V::ref_mode() != RefMode::None;
        let mut result = HashMap::with_capacity(len.min(MAX_PREALLOC_LEN) as usize);
        for _ in 0..len {
            let key = if key_full { K::read(ctx)? } else { K::read_data(ctx)? };
            let value = if value_full { V::read(ctx)? } else { V::read_data(ctx)? };
            result.insert(key, value);
        }
        Ok(result)
    }
}

// ============================================================================
// Option (NullOnly)
// ============================================================================

impl<T: Serializer> Serializer for Option<T> {
    fn ref_mode() -> RefMode {
        RefMode::NullOnly
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn null_value() -> Result<Self> {
        Ok(None)
    }

    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        T::write_type_info(ctx)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        T::read_type_info(ctx)
    }

    /// Body-only form: flag byte plus inner body (kein Type-Info-Prefix).
    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            None => {
                ctx.buffer.write_i8(NULL_FLAG);
                Ok(())
            }
            Some(value) => {
                ctx.buffer.write_i8(NOT_NULL_VALUE_FLAG);
                value.write_data(ctx)
            }
        }
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let flag = ctx.buffer.read_i8()?;
        match flag {
            NULL_FLAG => Ok(None),
            NOT_NULL_VALUE_FLAG | REF_VALUE_FLAG => Ok(Some(T::read_data(ctx)?)),
            other => Err(Error::invalid_data(format!("unknown reference flag: {other}"))),
        }
    }

    fn write(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        match self {
            None => {
                ctx.buffer.write_i8(NULL_FLAG);
                Ok(())
            }
            Some(value) => {
                ctx.buffer.write_i8(NOT_NULL_VALUE_FLAG);
                T::write_type_info(ctx)?;
                value.write_data(ctx)
            }
        }
    }

    fn read(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let flag = ctx.buffer.read_i8()?;
        match flag {
            NULL_FLAG => Ok(None),
            NOT_NULL_VALUE_FLAG | REF_VALUE_FLAG => {
                T::read_type_info(ctx)?;
                Ok(Some(T::read_data(ctx)?))
            }
            REF_FLAG => {
                let ref_id = ctx.buffer.read_var_uint32()?;
                Err(Error::invalid_ref(format!(
                    "unexpected reference flag for non-referencable value, ref id: {ref_id}"
                )))
            }
            other => Err(Error::invalid_data(format!("unknown reference flag: {other}"))),
        }
    }
}

// ============================================================================
// Shared references (NullAndRef)
// ============================================================================

impl<T: Serializer + Any> Serializer for Rc<T> {
    fn ref_mode() -> RefMode {
        RefMode::NullAndRef
    }

    fn write_type_info(ctx: &mut WriteContext<'_>) -> Result<()> {
        T::write_type_info(ctx)
    }

    fn read_type_info(ctx: &mut ReadContext<'_>) -> Result<()> {
        T::read_type_info(ctx)
    }

    fn write_data(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        self.as_ref().write_data(ctx)
    }

    fn read_data(ctx: &mut ReadContext<'_>) -> Result<Self> {
        Ok(Rc::new(T::read_data(ctx)?))
    }

    /// First occurrence: `RefValue` flag, type info, body (registers the
    /// next ref-id). Repeats: `Ref` flag plus the varuint ref-id.
    fn write(&self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if let Some(ref_id) = ctx.ref_writer.track(self) {
            ctx.buffer.write_i8(REF_FLAG);
            ctx.buffer.write_var_uint32(ref_id);
            return Ok(());
        }
        ctx.buffer.write_i8(REF_VALUE_FLAG);
        T::write_type_info(ctx)?;
        self.as_ref().write_data(ctx)
    }

    fn read(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let flag = ctx.buffer.read_i8()?;
        match flag {
            REF_VALUE_FLAG => {
                // Slot vor dem Body reservieren: Ref-IDs zählen in
                // Schreib-Reihenfolge der RefValue-Flags.
                let ref_id = ctx.ref_reader.reserve();
                T::read_type_info(ctx)?;
                let value = Rc::new(T::read_data(ctx)?);
                ctx.ref_reader.fill(ref_id, value.clone());
                Ok(value)
            }
            REF_FLAG => {
                let ref_id = ctx.buffer.read_var_uint32()?;
                ctx.ref_reader.get::<T>(ref_id)
            }
            NOT_NULL_VALUE_FLAG => {
                T::read_type_info(ctx)?;
                Ok(Rc::new(T::read_data(ctx)?))
            }
            NULL_FLAG => Err(Error::invalid_ref("null value for non-nullable reference")),
            other => Err(Error::invalid_data(format!("unknown reference flag: {other}"))),
        }
    }
}

// ============================================================================
// Harness construction and dynamic dispatch
// ============================================================================

fn harness_write<T: Serializer + Any>(ctx: &mut WriteContext<'_>, value: &dyn Any) -> Result<()> {
    let value = value
        .downcast_ref::<T>()
        .ok_or_else(|| Error::type_error("harness value does not match registered type"))?;
    value.write_data(ctx)
}

fn harness_read<T: Serializer + Any>(ctx: &mut ReadContext<'_>) -> Result<Box<dyn Any>> {
    Ok(Box::new(T::read_data(ctx)?))
}

/// Builds the dispatch handle stored in a `TypeInfo`.
pub fn harness_of<T: Serializer + Any>() -> Harness {
    Harness { write: harness_write::<T>, read: harness_read::<T> }
}

/// Writes a dynamically typed value: type-info prefix via the context,
/// body via the registered harness.
pub fn write_any_value(
    ctx: &mut WriteContext<'_>,
    rust_type: std::any::TypeId,
    value: &dyn Any,
) -> Result<()> {
    ctx.enter_dyn()?;
    let result = (|| {
        let info = ctx.write_any_type_info(rust_type)?;
        let harness = info
            .harness
            .ok_or_else(|| Error::type_error("type has no serializer harness"))?;
        (harness.write)(ctx, value)
    })();
    ctx.exit_dyn();
    result
}

/// Reads a dynamically typed value: type-info prefix decides the harness.
pub fn read_any_value(ctx: &mut ReadContext<'_>) -> Result<Box<dyn Any>> {
    ctx.enter_dyn()?;
    let result = (|| {
        let info = ctx.read_any_type_info()?;
        let harness = info
            .harness
            .ok_or_else(|| Error::type_error("wire type has no local serializer harness"))?;
        (harness.read)(ctx)
    })();
    ctx.exit_dyn();
    result
}

// ============================================================================
// Schema evolution: skipping unknown field values
// ============================================================================

/// Skips one field value described by `field_type` (a wire schema the
/// local side does not know). Nullable fields consume their flag byte
/// first; struct-typed fields consume their own type-info prefix.
pub fn skip_field_value(ctx: &mut ReadContext<'_>, field_type: &FieldType) -> Result<()> {
    if field_type.nullable {
        let flag = ctx.buffer.read_i8()?;
        match flag {
            NULL_FLAG => return Ok(()),
            NOT_NULL_VALUE_FLAG | REF_VALUE_FLAG => {
                // Volle Form: Type-Info-Byte folgt vor dem Body.
                return skip_typed_value(ctx);
            }
            REF_FLAG => {
                ctx.buffer.read_var_uint32()?;
                return Ok(());
            }
            other => {
                return Err(Error::invalid_data(format!("unknown reference flag: {other}")))
            }
        }
    }
    skip_body(ctx, field_type)
}

/// Skips a bare body of the given wire type.
fn skip_body(ctx: &mut ReadContext<'_>, field_type: &FieldType) -> Result<()> {
    match field_type.type_id {
        type_ids::BOOL | type_ids::INT8 => ctx.buffer.skip(1),
        type_ids::INT16 => ctx.buffer.skip(2),
        type_ids::INT32 | type_ids::FLOAT32 => ctx.buffer.skip(4),
        type_ids::INT64 | type_ids::FLOAT64 => ctx.buffer.skip(8),
        type_ids::VARINT32 => ctx.buffer.read_var_uint32().map(|_| ()),
        type_ids::VARINT64 => ctx.buffer.read_var_uint64().map(|_| ()),
        type_ids::TAGGED_INT64 => ctx.buffer.read_tagged_int64().map(|_| ()),
        type_ids::ENUM | type_ids::NAMED_ENUM => ctx.buffer.read_var_uint32().map(|_| ()),
        type_ids::STRING => {
            let header = ctx.buffer.read_var_uint36_small()?;
            ctx.buffer.skip((header >> 2) as u32)
        }
        type_ids::BINARY => {
            let len = ctx.buffer.read_var_uint32()?;
            ctx.buffer.skip(len)
        }
        type_ids::LIST | type_ids::SET => {
            let element = field_type.generics.first().ok_or_else(|| {
                Error::invalid_data("list/set wire type without element type")
            })?;
            let len = ctx.buffer.read_var_uint32()?;
            for _ in 0..len {
                skip_field_value(ctx, element)?;
            }
            Ok(())
        }
        type_ids::MAP => {
            if field_type.generics.len() != 2 {
                return Err(Error::invalid_data("map wire type without key/value types"));
            }
            let len = ctx.buffer.read_var_uint32()?;
            for _ in 0..len {
                skip_field_value(ctx, &field_type.generics[0])?;
                skip_field_value(ctx, &field_type.generics[1])?;
            }
            Ok(())
        }
        id if is_struct_category(id) => skip_typed_value(ctx),
        other => Err(Error::type_error(format!(
            "cannot skip unknown wire field type: {other}"
        ))),
    }
}

/// Skips a value that carries its own type-info prefix (struct fields and
/// non-null nullable fields).
fn skip_typed_value(ctx: &mut ReadContext<'_>) -> Result<()> {
    let info = ctx.read_any_type_info()?;
    match info.type_id {
        type_ids::BOOL | type_ids::INT8 => ctx.buffer.skip(1),
        type_ids::INT16 => ctx.buffer.skip(2),
        type_ids::INT32 | type_ids::FLOAT32 => ctx.buffer.skip(4),
        type_ids::INT64 | type_ids::FLOAT64 => ctx.buffer.skip(8),
        type_ids::VARINT32 => ctx.buffer.read_var_uint32().map(|_| ()),
        type_ids::VARINT64 => ctx.buffer.read_var_uint64().map(|_| ()),
        type_ids::TAGGED_INT64 => ctx.buffer.read_tagged_int64().map(|_| ()),
        type_ids::ENUM | type_ids::NAMED_ENUM => ctx.buffer.read_var_uint32().map(|_| ()),
        type_ids::STRING => {
            let header = ctx.buffer.read_var_uint36_small()?;
            ctx.buffer.skip((header >> 2) as u32)
        }
        id if is_struct_category(id) => {
            let meta = info.type_meta.clone().ok_or_else(|| {
                Error::type_error("cannot skip struct value without schema description")
            })?;
            for field in &meta.fields {
                skip_field_value(ctx, &field.field_type)?;
            }
            Ok(())
        }
        other => Err(Error::type_error(format!("cannot skip value of wire type {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::resolver::TypeResolverBuilder;

    fn write_ctx() -> WriteContext<'static> {
        let resolver = TypeResolverBuilder::new().build().unwrap();
        WriteContext::new(resolver, Config::new())
    }

    fn body_round_trip<T: Serializer>(value: &T) -> T {
        let mut ctx = write_ctx();
        value.write_data(&mut ctx).unwrap();
        let bytes = ctx.buffer.into_vec();
        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx = ReadContext::new(resolver, Config::new(), crate::buffer::Buffer::from_vec(bytes));
        T::read_data(&mut rctx).unwrap()
    }

    // --- Test 1: primitive bodies ---

    #[test]
    fn primitive_bodies_round_trip() {
        assert!(body_round_trip(&true));
        assert!(!body_round_trip(&false));
        assert_eq!(body_round_trip(&-5i8), -5);
        assert_eq!(body_round_trip(&-300i16), -300);
        assert_eq!(body_round_trip(&123456i32), 123456);
        assert_eq!(body_round_trip(&-9_876_543_212_345i64), -9_876_543_212_345);
        assert_eq!(body_round_trip(&1.5f32), 1.5);
        assert_eq!(body_round_trip(&-2.25f64), -2.25);
    }

    #[test]
    fn bool_invalid_byte_is_invalid_data() {
        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx = ReadContext::new(
            resolver,
            Config::new(),
            crate::buffer::Buffer::from_vec(vec![2]),
        );
        assert!(bool::read_data(&mut rctx).is_err());
    }

    // --- Test 2: string encodings ---

    #[test]
    fn ascii_string_uses_latin1_tag() {
        let mut ctx = write_ctx();
        "hello".to_string().write_data(&mut ctx).unwrap();
        let bytes = ctx.buffer.into_vec();
        // Header: (5 << 2) | 0 = 20.
        assert_eq!(bytes[0], 20);
        assert_eq!(&bytes[1..], b"hello");
    }

    #[test]
    fn non_ascii_string_uses_utf8_tag() {
        let s = "stream-hello-世界".to_string();
        let mut ctx = write_ctx();
        s.write_data(&mut ctx).unwrap();
        let bytes = ctx.buffer.into_vec();
        let byte_len = s.len() as u64;
        assert_eq!(bytes[0] as u64, (byte_len << 2) | 2);
        assert_eq!(body_round_trip(&s), s);
    }

    #[test]
    fn utf16le_string_is_readable() {
        // Writer erzeugt nie UTF-16, der Reader akzeptiert es (Peers tun es).
        let s = "héllo";
        let units: Vec<u16> = s.encode_utf16().collect();
        let mut payload = Vec::new();
        for u in &units {
            payload.extend_from_slice(&u.to_le_bytes());
        }
        let mut bytes = Vec::new();
        bytes.push(((payload.len() as u8) << 2) | 1);
        bytes.extend_from_slice(&payload);

        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx =
            ReadContext::new(resolver, Config::new(), crate::buffer::Buffer::from_vec(bytes));
        assert_eq!(String::read_data(&mut rctx).unwrap(), s);
    }

    #[test]
    fn utf16le_odd_length_is_invalid_data() {
        let bytes = vec![(3u8 << 2) | 1, 0x41, 0x00, 0x42];
        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx =
            ReadContext::new(resolver, Config::new(), crate::buffer::Buffer::from_vec(bytes));
        assert!(String::read_data(&mut rctx).is_err());
    }

    #[test]
    fn unknown_string_tag_is_invalid_data() {
        let bytes = vec![(1u8 << 2) | 3, 0x41];
        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx =
            ReadContext::new(resolver, Config::new(), crate::buffer::Buffer::from_vec(bytes));
        assert!(String::read_data(&mut rctx).is_err());
    }

    #[test]
    fn empty_string_round_trips() {
        assert_eq!(body_round_trip(&String::new()), "");
    }

    #[test]
    fn latin1_high_bytes_are_readable() {
        // Reader dekodiert Latin-1 > 0x7F, der Writer erzeugt es nie.
        let bytes = vec![(2u8 << 2) | 0, 0xE9, 0xFC]; // "éü" in Latin-1
        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx =
            ReadContext::new(resolver, Config::new(), crate::buffer::Buffer::from_vec(bytes));
        assert_eq!(String::read_data(&mut rctx).unwrap(), "éü");
    }

    // --- Test 3: collections ---

    #[test]
    fn vec_round_trips() {
        assert_eq!(body_round_trip(&vec![1i32, 3, 5, 7, 9]), vec![1, 3, 5, 7, 9]);
        assert_eq!(body_round_trip(&Vec::<i64>::new()), Vec::<i64>::new());
    }

    #[test]
    fn map_round_trips() {
        let mut m = HashMap::new();
        m.insert("count".to_string(), 5i64);
        m.insert("sum".to_string(), 25i64);
        m.insert("max".to_string(), 9i64);
        assert_eq!(body_round_trip(&m), m);
    }

    #[test]
    fn vec_of_options_round_trips() {
        let v = vec![Some(1i32), None, Some(3)];
        assert_eq!(body_round_trip(&v), v);
    }

    #[test]
    fn huge_declared_length_is_out_of_bound_not_oom() {
        // Länge u32::MAX ohne Daten darf nur einen Fehler kosten.
        let mut bytes = Vec::new();
        let mut b = crate::buffer::Buffer::new();
        b.write_var_uint32(u32::MAX);
        bytes.extend_from_slice(&b.into_vec());
        let resolver = TypeResolverBuilder::new().build().unwrap();
        let mut rctx =
            ReadContext::new(resolver, Config::new(), crate::buffer::Buffer::from_vec(bytes));
        let err = Vec::<i64>::read_data(&mut rctx).unwrap_err();
        assert!(err.is_out_of_bound(), "{err}");
    }

    // --- Test 4: Option bodies ---

    #[test]
    fn option_body_round_trips() {
        assert_eq!(body_round_trip(&Some(42i32)), Some(42));
        assert_eq!(body_round_trip(&None::<i32>), None);
    }
}
