//! Write context: the per-message state machine of the write path.
//!
//! Sequences header, reference flags, type metadata and body payload for
//! one message, and enforces the at-most-one-emission invariant for
//! recurring types: the first occurrence of a type within a message emits
//! its full type def, every further occurrence a one-byte (or varuint)
//! back-reference.
//!
//! Lebenszyklus: einmal erzeugen, pro Nachricht `reset` (bzw. implizit
//! über `serialize`). Die Konfiguration und der Resolver überleben jeden
//! Reset; sämtliche per-Message-Tabellen werden geleert.
//!
//! # Beispiel
//!
//! ```
//! use xwire::config::Config;
//! use xwire::encoder::WriteContext;
//! use xwire::resolver::TypeResolverBuilder;
//!
//! let resolver = TypeResolverBuilder::new().build().unwrap();
//! let mut ctx = WriteContext::new(resolver, Config::new());
//! let bytes = ctx.serialize(&-9_876_543_212_345i64).unwrap();
//! assert_eq!(bytes[0], 0x02); // xlang flag byte
//! ```

use std::rc::Rc;

use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::header::MessageHeader;
use crate::ref_tracker::RefWriter;
use crate::resolver::TypeResolver;
use crate::serializer::Serializer;
use crate::string_table::{MetaStringBytes, MetaStringWriteTable};
use crate::type_info::{
    is_compatible_category, is_named_category, is_struct_category, is_user_id_category, type_ids,
    TypeInfo,
};
use crate::FastIndexMap;

/// Write context; see the module docs.
pub struct WriteContext<'a> {
    /// Output buffer (owned for [`new`](Self::new), caller-supplied for
    /// [`with_buffer`](Self::with_buffer)).
    pub buffer: Buffer<'a>,
    resolver: Rc<TypeResolver>,
    config: Config,
    /// Identity tracker for `NullAndRef` values.
    pub ref_writer: RefWriter,
    meta_string_table: MetaStringWriteTable,
    /// index_key → Wire-Index; Einfüge-Reihenfolge IST die Wire-Ordnung.
    type_info_index_map: FastIndexMap<u32, ()>,
    /// Fast-Slot für den häufigsten Fall eines einzigen dominanten Typs;
    /// die volle Map wird erst beim zweiten distinkten Typ aktiviert.
    first_type_info: Option<u32>,
    index_map_active: bool,
    dyn_depth: u32,
    error: Option<Error>,
}

impl WriteContext<'static> {
    /// Creates a context with its own growable buffer.
    pub fn new(resolver: Rc<TypeResolver>, config: Config) -> Self {
        Self::with_buffer(resolver, config, Buffer::new())
    }
}

impl<'a> WriteContext<'a> {
    /// Creates a context over a caller-supplied buffer (vector-wrapped for
    /// zero-copy serialization into an existing container).
    pub fn with_buffer(resolver: Rc<TypeResolver>, config: Config, buffer: Buffer<'a>) -> Self {
        Self {
            buffer,
            resolver,
            config,
            ref_writer: RefWriter::new(),
            meta_string_table: MetaStringWriteTable::new(),
            type_info_index_map: FastIndexMap::default(),
            first_type_info: None,
            index_map_active: false,
            dyn_depth: 0,
            error: None,
        }
    }

    /// The shared type resolver.
    pub fn resolver(&self) -> &Rc<TypeResolver> {
        &self.resolver
    }

    /// The context configuration.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Resets to initial state: buffer indices to zero and all per-message
    /// state cleared. Resolver and configuration are preserved.
    pub fn reset(&mut self) {
        self.reset_message_state();
        self.buffer.set_writer_index(0);
        self.buffer.set_reader_index(0);
    }

    /// Leert nur den per-Message-Zustand; die Buffer-Position bleibt
    /// stehen (für konkatenierte Nachrichten in einem Buffer).
    fn reset_message_state(&mut self) {
        self.error = None;
        self.ref_writer.reset();
        self.meta_string_table.reset();
        self.type_info_index_map.clear();
        self.first_type_info = None;
        self.index_map_active = false;
        self.dyn_depth = 0;
    }

    /// Short-circuit: once an operation failed, every further operation
    /// returns the first error until `reset`.
    fn check(&self) -> Result<()> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.error.get_or_insert_with(|| e.clone());
        }
        result
    }

    /// Serializes one complete message and returns its bytes. The context
    /// is reset first; the buffer is reused across calls.
    pub fn serialize<T: Serializer>(&mut self, value: &T) -> Result<Vec<u8>> {
        self.reset();
        self.write_message(value)?;
        let end = self.buffer.writer_index() as usize;
        Ok(self.buffer.data()[..end].to_vec())
    }

    /// Serializes one complete message into `out` (appending after its
    /// current content) via a vector-wrapped buffer.
    pub fn serialize_to<T: Serializer>(&mut self, out: &mut Vec<u8>, value: &T) -> Result<()> {
        let mut ctx = WriteContext::with_buffer(self.resolver.clone(), self.config, Buffer::wrap(out));
        let result = ctx.write_message(value);
        ctx.buffer.truncate_to_writer();
        result
    }

    /// Writes one message (header plus root value) at the current buffer
    /// position. Per-message state is cleared first, the buffer position
    /// is kept — the building block for concatenated message streams.
    pub fn write_message<T: Serializer>(&mut self, value: &T) -> Result<()> {
        self.reset_message_state();
        let result = self.write_message_inner(value);
        self.record(result)
    }

    fn write_message_inner<T: Serializer>(&mut self, value: &T) -> Result<()> {
        if value.is_null() {
            self.buffer.write_u8(MessageHeader::xlang_null().encode());
            return Ok(());
        }
        self.buffer.write_u8(MessageHeader::xlang().encode());
        value.write(self)
    }

    /// Writes a bare 1-byte type id (internal/primitive categories).
    pub fn write_type_id(&mut self, type_id: u32) -> Result<()> {
        self.check()?;
        debug_assert!(type_id <= 0xFF, "type id {type_id} exceeds one byte");
        self.buffer.write_u8(type_id as u8);
        Ok(())
    }

    /// Writes the full type-info prefix for an arbitrary registered
    /// language type and returns its info.
    pub fn write_any_type_info(&mut self, rust_type: std::any::TypeId) -> Result<Rc<TypeInfo>> {
        self.check()?;
        let info = self.resolver.get_by_rust(rust_type)?.clone();
        let result = self.write_type_info_dispatch(&info);
        self.record(result)?;
        Ok(info)
    }

    /// Writes the type-info prefix for the registered struct type `T`.
    pub fn write_struct_type_info<T: 'static>(&mut self) -> Result<()> {
        self.check()?;
        let info = self.resolver.get_by_rust(std::any::TypeId::of::<T>())?.clone();
        if !is_struct_category(info.type_id) {
            return self.record(Err(Error::type_error(format!(
                "type registered as {} is not a struct category",
                info.type_id
            ))));
        }
        let result = self.write_type_info_dispatch(&info);
        self.record(result)
    }

    /// Writes the type-info prefix for the registered enum type `T`.
    pub fn write_enum_type_info<T: 'static>(&mut self) -> Result<()> {
        self.check()?;
        let info = self.resolver.get_by_rust(std::any::TypeId::of::<T>())?.clone();
        if !matches!(info.type_id, type_ids::ENUM | type_ids::NAMED_ENUM) {
            return self.record(Err(Error::type_error(format!(
                "type registered as {} is not an enum category",
                info.type_id
            ))));
        }
        let result = self.write_type_info_dispatch(&info);
        self.record(result)
    }

    /// Kategorien-Dispatch nach dem Type-Id-Byte (xlang spec: type info).
    fn write_type_info_dispatch(&mut self, info: &Rc<TypeInfo>) -> Result<()> {
        self.buffer.write_u8(info.type_id as u8);
        match info.type_id {
            id if is_user_id_category(id) => {
                let user_type_id = info.user_type_id.ok_or_else(|| {
                    Error::type_error("user type id is required for this category")
                })?;
                self.buffer.write_var_uint32(user_type_id);
                Ok(())
            }
            id if is_compatible_category(id) => self.write_type_meta(info),
            id if is_named_category(id) => {
                if self.config.compatible {
                    self.write_type_meta(info)
                } else {
                    let namespace = info.encoded_namespace.as_ref().ok_or_else(|| {
                        Error::type_error("encoded namespace missing for named type")
                    })?;
                    let type_name = info.encoded_type_name.as_ref().ok_or_else(|| {
                        Error::type_error("encoded type name missing for named type")
                    })?;
                    self.write_meta_string(namespace);
                    self.write_meta_string(type_name);
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn write_meta_string(&mut self, ms: &MetaStringBytes) {
        self.meta_string_table.write(&mut self.buffer, ms);
    }

    /// Streaming type-meta emission: full type-def bytes on the first
    /// occurrence of a type within the message, `(index << 1) | 1`
    /// back-references afterwards. Index = first-appearance order.
    pub fn write_type_meta(&mut self, info: &TypeInfo) -> Result<()> {
        self.check()?;
        if info.type_def.is_empty() {
            return Err(Error::type_error("type has no serialized type def"));
        }
        let key = info.index_key;

        if !self.index_map_active {
            match self.first_type_info {
                None => {
                    self.first_type_info = Some(key);
                    self.buffer.write_u8(0); // (index << 1), index = 0
                    self.buffer.write_bytes(&info.type_def);
                    return Ok(());
                }
                Some(first) if first == key => {
                    self.buffer.write_u8(1); // (index << 1) | 1, index = 0
                    return Ok(());
                }
                Some(first) => {
                    // Zweiter distinkter Typ: Map nachträglich aufbauen.
                    self.index_map_active = true;
                    self.type_info_index_map.clear();
                    self.type_info_index_map.insert(first, ());
                }
            }
        }

        if let Some(index) = self.type_info_index_map.get_index_of(&key) {
            self.buffer.write_var_uint32(((index as u32) << 1) | 1);
            return Ok(());
        }

        let index = self.type_info_index_map.len() as u32;
        self.type_info_index_map.insert(key, ());
        self.buffer.write_var_uint32(index << 1);
        self.buffer.write_bytes(&info.type_def);
        Ok(())
    }

    /// Enters a polymorphic (dynamically dispatched) value.
    pub fn enter_dyn(&mut self) -> Result<()> {
        self.dyn_depth += 1;
        Ok(())
    }

    /// Leaves a polymorphic value.
    pub fn exit_dyn(&mut self) {
        debug_assert!(self.dyn_depth > 0, "exit_dyn without enter_dyn");
        self.dyn_depth = self.dyn_depth.saturating_sub(1);
    }

    /// Current polymorphic nesting depth.
    pub fn dyn_depth(&self) -> u32 {
        self.dyn_depth
    }

    /// Records an externally detected failure; subsequent operations
    /// short-circuit with it until `reset`.
    pub fn fail(&mut self, error: Error) {
        self.error.get_or_insert(error);
    }

    /// The first recorded error, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}
