//! On-wire type identity: type ids, categories, and registered type infos
//! (xlang spec: type ids).
//!
//! A typed value on the wire begins with a 1-byte type id whose low byte
//! is a coarse category. What follows depends on the category: a varuint
//! user type id, namespace/type-name meta-strings, or a full inline type
//! meta (see the streaming protocol in the context modules).

use std::any::Any;

use crate::decoder::ReadContext;
use crate::encoder::WriteContext;
use crate::error::Result;
use crate::string_table::MetaStringBytes;
use crate::type_meta::TypeMeta;

/// Wire type-id constants (low byte of a `type_id`).
pub mod type_ids {
    /// 1-byte boolean, 0/1.
    pub const BOOL: u32 = 1;
    /// 1-byte signed integer.
    pub const INT8: u32 = 2;
    /// Fixed 2-byte little-endian signed integer.
    pub const INT16: u32 = 3;
    /// Fixed 4-byte little-endian signed integer.
    pub const INT32: u32 = 4;
    /// Zig-zag varint signed 32-bit integer.
    pub const VARINT32: u32 = 5;
    /// Fixed 8-byte little-endian signed integer.
    pub const INT64: u32 = 6;
    /// Zig-zag varint signed 64-bit integer.
    pub const VARINT64: u32 = 7;
    /// Tagged 64-bit signed integer (4 or 9 bytes).
    pub const TAGGED_INT64: u32 = 8;
    /// IEEE 754 binary32 little-endian.
    pub const FLOAT32: u32 = 19;
    /// IEEE 754 binary64 little-endian.
    pub const FLOAT64: u32 = 20;
    /// Length-and-encoding header plus bytes.
    pub const STRING: u32 = 21;
    /// Homogeneous list.
    pub const LIST: u32 = 22;
    /// Homogeneous set.
    pub const SET: u32 = 23;
    /// Key/value map.
    pub const MAP: u32 = 24;
    /// Enum registered by user type id.
    pub const ENUM: u32 = 25;
    /// Enum registered by namespace/type name.
    pub const NAMED_ENUM: u32 = 26;
    /// Struct registered by user type id, schema-consistent mode.
    pub const STRUCT: u32 = 27;
    /// Struct registered by user type id, compatible (schema evolution) mode.
    pub const COMPATIBLE_STRUCT: u32 = 28;
    /// Struct registered by name, schema-consistent mode.
    pub const NAMED_STRUCT: u32 = 29;
    /// Struct registered by name, compatible mode.
    pub const NAMED_COMPATIBLE_STRUCT: u32 = 30;
    /// Extension type registered by user type id.
    pub const EXT: u32 = 31;
    /// Extension type registered by name.
    pub const NAMED_EXT: u32 = 32;
    /// Untyped union.
    pub const UNION: u32 = 33;
    /// Union registered by user type id.
    pub const TYPED_UNION: u32 = 34;
    /// Union registered by name.
    pub const NAMED_UNION: u32 = 35;
    /// Null/none marker type.
    pub const NONE: u32 = 36;
    /// Raw binary blob.
    pub const BINARY: u32 = 41;
}

/// True for categories whose follow-up is a varuint user type id.
pub fn is_user_id_category(type_id: u32) -> bool {
    matches!(
        type_id,
        type_ids::ENUM | type_ids::STRUCT | type_ids::EXT | type_ids::TYPED_UNION
    )
}

/// True for categories whose follow-up is namespace/type-name (or inline
/// type meta in compatible mode).
pub fn is_named_category(type_id: u32) -> bool {
    matches!(
        type_id,
        type_ids::NAMED_ENUM
            | type_ids::NAMED_EXT
            | type_ids::NAMED_STRUCT
            | type_ids::NAMED_UNION
    )
}

/// True for categories that always carry inline type meta.
pub fn is_compatible_category(type_id: u32) -> bool {
    matches!(
        type_id,
        type_ids::COMPATIBLE_STRUCT | type_ids::NAMED_COMPATIBLE_STRUCT
    )
}

/// True for struct-shaped categories (matching a local STRUCT expectation).
pub fn is_struct_category(type_id: u32) -> bool {
    matches!(
        type_id,
        type_ids::STRUCT
            | type_ids::COMPATIBLE_STRUCT
            | type_ids::NAMED_STRUCT
            | type_ids::NAMED_COMPATIBLE_STRUCT
    )
}

/// True for internal (primitive/collection) ids that need no follow-up.
pub fn is_internal_type(type_id: u32) -> bool {
    !is_user_id_category(type_id) && !is_named_category(type_id) && !is_compatible_category(type_id)
}

/// Opaque per-type serializer handle dispatched by the contexts.
///
/// `write` emits the body payload after the type-info prefix has been
/// written; `read` is the inverse. Beides Funktionszeiger, damit die
/// Dispatch-Tabelle flach bleibt (keine Trait-Objekt-Vtables pro Wert).
#[derive(Clone, Copy)]
pub struct Harness {
    /// Writes the body of `value` (which must downcast to the registered type).
    pub write: fn(&mut WriteContext<'_>, &dyn Any) -> Result<()>,
    /// Reads one body, returning the boxed value.
    pub read: fn(&mut ReadContext<'_>) -> Result<Box<dyn Any>>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Harness")
    }
}

/// Everything the core knows about one registered type.
#[derive(Debug)]
pub struct TypeInfo {
    /// Full type id; the low byte is the category.
    pub type_id: u32,
    /// Caller-supplied integer for non-named categories.
    pub user_type_id: Option<u32>,
    /// Namespace (empty for by-id registrations).
    pub namespace: String,
    /// Type name (empty for by-id registrations).
    pub type_name: String,
    /// True when registered by (namespace, type_name).
    pub register_by_name: bool,
    /// Pre-encoded namespace meta-string with cached discriminator.
    pub encoded_namespace: Option<MetaStringBytes>,
    /// Pre-encoded type-name meta-string with cached discriminator.
    pub encoded_type_name: Option<MetaStringBytes>,
    /// Full schema description; present for compatible and named
    /// categories, used for cross-walking on read.
    pub type_meta: Option<TypeMeta>,
    /// Pre-serialized schema bytes, emitted verbatim by the streaming
    /// type-meta protocol (nie pro Nachricht neu codiert).
    pub type_def: Vec<u8>,
    /// Per-type serializer handle.
    pub harness: Option<Harness>,
    /// Registration-assigned key used instead of pointer identity in the
    /// write-side type-index map.
    pub index_key: u32,
}
