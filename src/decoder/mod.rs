//! Read context: the per-message state machine of the read path.
//!
//! Mirrors the write context: header, reference flags, type metadata and
//! body payload are consumed in wire order. Inline type defs are parsed at
//! most once per distinct 8-byte header — a last-header fast slot and a
//! bounded parsed-meta cache make repeated schemas (many messages per
//! session) cheap; back-references resolve against the first-appearance
//! vector of the current message.
//!
//! Schema-Evolution: beim Parsen eines Inline-Type-Defs wird das lokale
//! Schema gesucht und die Wire-Feldliste dagegen gekreuzt
//! (`assign_local_indices`). Nur-Wire-Felder werden beim Lesen
//! übersprungen, nur-lokale erhalten Default-Werte.
//!
//! # Beispiel
//!
//! ```
//! use xwire::buffer::Buffer;
//! use xwire::config::Config;
//! use xwire::decoder::ReadContext;
//! use xwire::encoder::WriteContext;
//! use xwire::resolver::TypeResolverBuilder;
//!
//! let resolver = TypeResolverBuilder::new().build().unwrap();
//! let bytes = WriteContext::new(resolver.clone(), Config::new())
//!     .serialize(&12345i32)
//!     .unwrap();
//! let mut ctx = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
//! assert_eq!(ctx.deserialize::<i32>().unwrap(), 12345);
//! ```

use std::rc::Rc;

use crate::buffer::Buffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::header::MessageHeader;
use crate::ref_tracker::RefReader;
use crate::resolver::TypeResolver;
use crate::serializer::Serializer;
use crate::string_table::MetaStringReadTable;
use crate::type_info::{
    is_compatible_category, is_named_category, is_struct_category, is_user_id_category, type_ids,
    TypeInfo,
};
use crate::type_meta::TypeMeta;
use crate::FastHashMap;

/// Obergrenze des Parsed-Meta-Caches; dahinter werden Einträge nicht mehr
/// indiziert (Schutz gegen Header-Flut aus bösartigen Eingaben).
const MAX_PARSED_TYPE_DEFS: usize = 8192;

/// Obergrenze der polymorphen Schachtelungstiefe beim Lesen.
const MAX_DYN_DEPTH: u32 = 1024;

/// Read context; see the module docs.
pub struct ReadContext<'a> {
    /// Input buffer: in-memory bytes or a stream-backed view.
    pub buffer: Buffer<'a>,
    resolver: Rc<TypeResolver>,
    config: Config,
    /// Slot table for `NullAndRef` values.
    pub ref_reader: RefReader,
    meta_string_table: MetaStringReadTable,
    /// Erstauftritts-Vektor der aktuellen Nachricht; Back-Refs indizieren
    /// hierhin (0-basiert). Besitzt zugleich die aus Inline-Defs
    /// synthetisierten Infos.
    reading_type_infos: Vec<Rc<TypeInfo>>,
    /// Session-Cache geparster Type-Defs, Schlüssel = 8-Byte-Header.
    /// Überlebt `reset` absichtlich (Nachrichten einer Session teilen
    /// Schemata); ein frischer Kontext startet leer.
    parsed_cache: FastHashMap<u64, Rc<TypeInfo>>,
    last_header: Option<u64>,
    last_info: Option<Rc<TypeInfo>>,
    current_type_info: Option<Rc<TypeInfo>>,
    dyn_depth: u32,
    error: Option<Error>,
    cache_overflow_warned: bool,
}

impl<'a> ReadContext<'a> {
    /// Creates a context over the given buffer.
    pub fn new(resolver: Rc<TypeResolver>, config: Config, buffer: Buffer<'a>) -> Self {
        Self {
            buffer,
            resolver,
            config,
            ref_reader: RefReader::new(),
            meta_string_table: MetaStringReadTable::new(),
            reading_type_infos: Vec::new(),
            parsed_cache: FastHashMap::default(),
            last_header: None,
            last_info: None,
            current_type_info: None,
            dyn_depth: 0,
            error: None,
            cache_overflow_warned: false,
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

    /// Clears all per-message state. The parsed-meta cache and its fast
    /// slot survive (session-level), as do resolver and configuration.
    pub fn reset(&mut self) {
        self.error = None;
        self.ref_reader.reset();
        self.meta_string_table.reset();
        self.reading_type_infos.clear();
        self.current_type_info = None;
        self.dyn_depth = 0;
    }

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

    /// Deserializes one complete message at the current buffer position.
    /// Per-message state is cleared first; for stream-backed buffers the
    /// consumed position is pushed back into the stream afterwards, so
    /// the next message continues where this one ended.
    pub fn deserialize<T: Serializer>(&mut self) -> Result<T> {
        self.reset();
        let result = self.deserialize_inner();
        let result = self.record(result);
        self.buffer.sync_stream_reader_index();
        result
    }

    fn deserialize_inner<T: Serializer>(&mut self) -> Result<T> {
        let header = MessageHeader::decode(self.buffer.read_u8()?)?;
        if !header.is_xlang {
            return Err(Error::invalid_data(
                "language-local wire variant is not supported",
            ));
        }
        if header.is_null {
            return T::null_value();
        }
        T::read(self)
    }

    /// Reads a bare 1-byte type id and checks it against `expected`.
    pub fn read_type_id_expect(&mut self, expected: u32) -> Result<()> {
        self.check()?;
        let actual = u32::from(self.buffer.read_u8()?);
        if actual != expected {
            let err = Err(Error::type_mismatch(actual, expected));
            return self.record(err);
        }
        Ok(())
    }

    /// Reads the full type-info prefix of an arbitrarily typed value.
    pub fn read_any_type_info(&mut self) -> Result<Rc<TypeInfo>> {
        self.check()?;
        let result = self.read_any_type_info_inner();
        self.record(result)
    }

    fn read_any_type_info_inner(&mut self) -> Result<Rc<TypeInfo>> {
        let type_id = u32::from(self.buffer.read_u8()?);
        let info = match type_id {
            id if is_user_id_category(id) => {
                let user_type_id = self.buffer.read_var_uint32()?;
                self.resolver.get_by_user_id(id, user_type_id)?.clone()
            }
            id if is_compatible_category(id) => self.read_type_meta()?,
            id if is_named_category(id) => {
                if self.config.compatible {
                    self.read_type_meta()?
                } else {
                    let namespace = self
                        .meta_string_table
                        .read(&mut self.buffer, self.resolver.namespace_decoder())?;
                    let type_name = self
                        .meta_string_table
                        .read(&mut self.buffer, self.resolver.type_name_decoder())?;
                    self.resolver.get_by_name(&namespace, &type_name)?.clone()
                }
            }
            id => self.resolver.get_by_type_id(id)?.clone(),
        };
        self.current_type_info = Some(info.clone());
        Ok(info)
    }

    /// Reads the type-info prefix of a struct value and validates the
    /// category (and, in schema-consistent mode, the identity of `T`).
    pub fn read_struct_type_info<T: 'static>(&mut self) -> Result<Rc<TypeInfo>> {
        self.check()?;
        let result = self.read_struct_type_info_inner::<T>();
        self.record(result)
    }

    fn read_struct_type_info_inner<T: 'static>(&mut self) -> Result<Rc<TypeInfo>> {
        let type_id = u32::from(self.buffer.read_u8()?);
        if !is_struct_category(type_id) {
            return Err(Error::type_mismatch(type_id, type_ids::STRUCT));
        }
        let info = match type_id {
            type_ids::STRUCT => {
                let user_type_id = self.buffer.read_var_uint32()?;
                let info = self.resolver.get_by_user_id(type_id, user_type_id)?.clone();
                let local = self.resolver.get_by_rust(std::any::TypeId::of::<T>())?;
                if info.index_key != local.index_key {
                    return Err(Error::type_error(format!(
                        "stream struct (user id {user_type_id}) does not match the expected type"
                    )));
                }
                info
            }
            type_ids::NAMED_STRUCT if !self.config.compatible => {
                let namespace = self
                    .meta_string_table
                    .read(&mut self.buffer, self.resolver.namespace_decoder())?;
                let type_name = self
                    .meta_string_table
                    .read(&mut self.buffer, self.resolver.type_name_decoder())?;
                self.resolver.get_by_name(&namespace, &type_name)?.clone()
            }
            _ => self.read_type_meta()?,
        };
        self.current_type_info = Some(info.clone());
        Ok(info)
    }

    /// Reads the type-info prefix of an enum value.
    pub fn read_enum_type_info<T: 'static>(&mut self) -> Result<Rc<TypeInfo>> {
        self.check()?;
        let result = self.read_enum_type_info_inner::<T>();
        self.record(result)
    }

    fn read_enum_type_info_inner<T: 'static>(&mut self) -> Result<Rc<TypeInfo>> {
        let type_id = u32::from(self.buffer.read_u8()?);
        let info = match type_id {
            type_ids::ENUM => {
                let user_type_id = self.buffer.read_var_uint32()?;
                self.resolver.get_by_user_id(type_id, user_type_id)?.clone()
            }
            type_ids::NAMED_ENUM => {
                if self.config.compatible {
                    self.read_type_meta()?
                } else {
                    let namespace = self
                        .meta_string_table
                        .read(&mut self.buffer, self.resolver.namespace_decoder())?;
                    let type_name = self
                        .meta_string_table
                        .read(&mut self.buffer, self.resolver.type_name_decoder())?;
                    self.resolver.get_by_name(&namespace, &type_name)?.clone()
                }
            }
            other => return Err(Error::type_mismatch(other, type_ids::ENUM)),
        };
        self.current_type_info = Some(info.clone());
        Ok(info)
    }

    /// Streaming type-meta intake: back-references resolve against the
    /// first-appearance vector; inline defs are parsed (or served from the
    /// header-keyed cache, skipping their bytes) and cross-walked against
    /// the local schema.
    pub fn read_type_meta(&mut self) -> Result<Rc<TypeInfo>> {
        self.check()?;
        let result = self.read_type_meta_inner();
        let result = self.record(result);
        if let Ok(info) = &result {
            self.current_type_info = Some(info.clone());
        }
        result
    }

    fn read_type_meta_inner(&mut self) -> Result<Rc<TypeInfo>> {
        let marker = self.buffer.read_var_uint32()?;
        let index = (marker >> 1) as usize;
        if marker & 1 == 1 {
            // Back-Referenz auf einen bereits gesehenen Typ.
            return self
                .reading_type_infos
                .get(index)
                .cloned()
                .ok_or_else(|| {
                    Error::invalid_data(format!(
                        "meta index out of bounds: {index}, seen: {}",
                        self.reading_type_infos.len()
                    ))
                });
        }
        // Erstauftritt: der Index muss der Erstauftritts-Ordnung folgen.
        if index != self.reading_type_infos.len() {
            return Err(Error::invalid_data(format!(
                "meta index {index} violates first-appearance order (expected {})",
                self.reading_type_infos.len()
            )));
        }

        let header = self.buffer.read_u64()?;

        // Fast-Slot: gleicher Header wie zuletzt.
        if self.last_header == Some(header) {
            if let Some(info) = self.last_info.clone() {
                TypeMeta::skip_body(&mut self.buffer, header)?;
                self.reading_type_infos.push(info.clone());
                return Ok(info);
            }
        }
        // Session-Cache.
        if let Some(info) = self.parsed_cache.get(&header).cloned() {
            TypeMeta::skip_body(&mut self.buffer, header)?;
            self.last_header = Some(header);
            self.last_info = Some(info.clone());
            self.reading_type_infos.push(info.clone());
            return Ok(info);
        }

        // Nicht im Cache: parsen, lokal auflösen, kreuzen.
        let mut wire_meta = TypeMeta::from_bytes_with_header(
            &mut self.buffer,
            header,
            self.resolver.namespace_decoder(),
            self.resolver.type_name_decoder(),
        )?;

        let local = if wire_meta.register_by_name {
            self.resolver.get_by_name(&wire_meta.namespace, &wire_meta.type_name).ok()
        } else {
            wire_meta
                .user_type_id
                .and_then(|uid| self.resolver.get_by_user_id(wire_meta.type_id, uid).ok())
        };

        let info = Rc::new(match local {
            Some(local) => {
                if let Some(local_meta) = &local.type_meta {
                    wire_meta.assign_local_indices(local_meta);
                }
                TypeInfo {
                    type_id: local.type_id,
                    user_type_id: local.user_type_id,
                    namespace: local.namespace.clone(),
                    type_name: local.type_name.clone(),
                    register_by_name: local.register_by_name,
                    encoded_namespace: local.encoded_namespace.clone(),
                    encoded_type_name: local.encoded_type_name.clone(),
                    type_meta: Some(wire_meta),
                    type_def: local.type_def.clone(),
                    harness: local.harness,
                    index_key: local.index_key,
                }
            }
            None => {
                // Unbekannter Wire-Typ: Stub ohne Harness; Werte dieses
                // Typs sind nur überspringbar, nicht materialisierbar.
                TypeInfo {
                    type_id: wire_meta.type_id,
                    user_type_id: wire_meta.user_type_id,
                    namespace: wire_meta.namespace.clone(),
                    type_name: wire_meta.type_name.clone(),
                    register_by_name: wire_meta.register_by_name,
                    encoded_namespace: None,
                    encoded_type_name: None,
                    type_meta: Some(wire_meta),
                    type_def: Vec::new(),
                    harness: None,
                    index_key: u32::MAX,
                }
            }
        });

        if self.parsed_cache.len() < MAX_PARSED_TYPE_DEFS {
            self.parsed_cache.insert(header, info.clone());
            self.last_header = Some(header);
            self.last_info = Some(info.clone());
        } else if !self.cache_overflow_warned {
            self.cache_overflow_warned = true;
            log::warn!(
                "parsed type-def cache reached its cap of {MAX_PARSED_TYPE_DEFS} entries; \
                 further inline schemas will be re-parsed per occurrence"
            );
        }

        self.reading_type_infos.push(info.clone());
        Ok(info)
    }

    /// The info resolved by the most recent `read_*_type_info` call; in
    /// compatible mode it carries the cross-walked wire schema.
    pub fn current_type_info(&self) -> Option<Rc<TypeInfo>> {
        self.current_type_info.clone()
    }

    /// Enters a polymorphic value (guarded against malicious nesting).
    pub fn enter_dyn(&mut self) -> Result<()> {
        if self.dyn_depth >= MAX_DYN_DEPTH {
            return Err(Error::invalid_data("polymorphic nesting exceeds limit"));
        }
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
