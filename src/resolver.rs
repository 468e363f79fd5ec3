//! Type registry: maps language types, wire ids and names to
//! [`TypeInfo`]s.
//!
//! Registration happens once through the builder, before any context is
//! created; afterwards the resolver is shared immutably (`Rc`) by any
//! number of contexts. Beim `build` werden Namespace und Typname
//! vorcodiert und die Type-Def-Bytes vorserialisiert, damit auf dem
//! heißen Pfad weder Encoder noch Hasher laufen.
//!
//! Die beiden Meta-String-Encoder (Namespace `.`/`_`, Typname `$`/`_`)
//! leben im Resolver — einmal pro Resolver konstruiert, keine globalen
//! oder veränderlichen Statics.

use std::any::Any;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::meta_string::{MetaEncoding, MetaStringDecoder, MetaStringEncoder};
use crate::serializer::{harness_of, Serializer};
use crate::string_table::MetaStringBytes;
use crate::type_info::{is_internal_type, is_named_category, type_ids, Harness, TypeInfo};
use crate::type_meta::{FieldDef, TypeMeta};
use crate::FastHashMap;

/// Allowed namespace encodings (no FirstToLowerSpecial: package paths have
/// no leading capital convention).
const NAMESPACE_ENCODINGS: &[MetaEncoding] = &[
    MetaEncoding::Extended,
    MetaEncoding::AllToLowerSpecial,
    MetaEncoding::LowerUpperDigitSpecial,
];

/// Allowed type-name encodings.
const TYPE_NAME_ENCODINGS: &[MetaEncoding] = &[
    MetaEncoding::Extended,
    MetaEncoding::AllToLowerSpecial,
    MetaEncoding::LowerUpperDigitSpecial,
    MetaEncoding::FirstToLowerSpecial,
];

/// One caller-supplied registration: category, identity and field list.
#[derive(Debug, Clone)]
pub struct TypeRegistration {
    /// Category type id (one of the [`type_ids`] user categories).
    pub kind: u32,
    /// User type id for by-id categories.
    pub user_type_id: Option<u32>,
    /// Namespace for by-name categories.
    pub namespace: String,
    /// Type name for by-name categories.
    pub type_name: String,
    /// Field list for struct categories (declaration order).
    pub fields: Vec<FieldDef>,
}

impl TypeRegistration {
    /// A struct registered by user type id (schema-consistent mode).
    pub fn struct_by_id(user_type_id: u32, fields: Vec<FieldDef>) -> Self {
        Self {
            kind: type_ids::STRUCT,
            user_type_id: Some(user_type_id),
            namespace: String::new(),
            type_name: String::new(),
            fields,
        }
    }

    /// A struct registered by user type id, compatible (schema evolution)
    /// mode: its type def travels inline with every message.
    pub fn compatible_struct(user_type_id: u32, fields: Vec<FieldDef>) -> Self {
        Self { kind: type_ids::COMPATIBLE_STRUCT, ..Self::struct_by_id(user_type_id, fields) }
    }

    /// A struct registered by namespace and type name.
    pub fn named_struct(
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Self {
        Self {
            kind: type_ids::NAMED_STRUCT,
            user_type_id: None,
            namespace: namespace.into(),
            type_name: type_name.into(),
            fields,
        }
    }

    /// A named struct in compatible mode.
    pub fn named_compatible_struct(
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Self {
        Self {
            kind: type_ids::NAMED_COMPATIBLE_STRUCT,
            ..Self::named_struct(namespace, type_name, fields)
        }
    }

    /// An enum registered by user type id.
    pub fn enum_by_id(user_type_id: u32) -> Self {
        Self {
            kind: type_ids::ENUM,
            user_type_id: Some(user_type_id),
            namespace: String::new(),
            type_name: String::new(),
            fields: Vec::new(),
        }
    }

    /// An enum registered by namespace and type name.
    pub fn named_enum(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            kind: type_ids::NAMED_ENUM,
            user_type_id: None,
            namespace: namespace.into(),
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// An extension type registered by user type id.
    pub fn ext_by_id(user_type_id: u32) -> Self {
        Self { kind: type_ids::EXT, ..Self::enum_by_id(user_type_id) }
    }
}

struct PendingRegistration {
    rust_type: std::any::TypeId,
    registration: TypeRegistration,
    harness: Harness,
}

/// Builder collecting registrations; [`build`](Self::build) validates and
/// pre-computes everything.
#[derive(Default)]
pub struct TypeResolverBuilder {
    pending: Vec<PendingRegistration>,
}

impl TypeResolverBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under the given registration.
    pub fn register<T: Serializer + Any>(mut self, registration: TypeRegistration) -> Self {
        self.pending.push(PendingRegistration {
            rust_type: std::any::TypeId::of::<T>(),
            registration,
            harness: harness_of::<T>(),
        });
        self
    }

    /// Validates all registrations and builds the immutable resolver.
    pub fn build(self) -> Result<Rc<TypeResolver>> {
        let mut resolver = TypeResolver {
            infos: Vec::new(),
            by_rust: FastHashMap::default(),
            by_type_id: FastHashMap::default(),
            by_user_id: FastHashMap::default(),
            by_name: FastHashMap::default(),
            namespace_encoder: MetaStringEncoder::new('.', '_'),
            type_name_encoder: MetaStringEncoder::new('$', '_'),
            namespace_decoder: MetaStringDecoder::new('.', '_'),
            type_name_decoder: MetaStringDecoder::new('$', '_'),
        };
        resolver.register_internals()?;
        for pending in self.pending {
            resolver.add_user_type(pending)?;
        }
        Ok(Rc::new(resolver))
    }
}

/// Immutable registry shared by contexts.
#[derive(Debug)]
pub struct TypeResolver {
    infos: Vec<Rc<TypeInfo>>,
    by_rust: FastHashMap<std::any::TypeId, u32>,
    by_type_id: FastHashMap<u32, u32>,
    by_user_id: FastHashMap<(u32, u32), u32>,
    by_name: FastHashMap<(String, String), u32>,
    namespace_encoder: MetaStringEncoder,
    type_name_encoder: MetaStringEncoder,
    namespace_decoder: MetaStringDecoder,
    type_name_decoder: MetaStringDecoder,
}

impl TypeResolver {
    /// Interne Typen (Primitive, String) mit Harness registrieren, damit
    /// `read_any_type_info` sie dynamisch lesen kann.
    fn register_internals(&mut self) -> Result<()> {
        self.add_internal::<bool>(type_ids::BOOL)?;
        self.add_internal::<i8>(type_ids::INT8)?;
        self.add_internal::<i16>(type_ids::INT16)?;
        self.add_internal::<i32>(type_ids::VARINT32)?;
        self.add_internal::<i64>(type_ids::VARINT64)?;
        self.add_internal::<f32>(type_ids::FLOAT32)?;
        self.add_internal::<f64>(type_ids::FLOAT64)?;
        self.add_internal::<String>(type_ids::STRING)?;
        Ok(())
    }

    fn add_internal<T: Serializer + Any>(&mut self, type_id: u32) -> Result<()> {
        debug_assert!(is_internal_type(type_id));
        let index_key = self.infos.len() as u32;
        let info = Rc::new(TypeInfo {
            type_id,
            user_type_id: None,
            namespace: String::new(),
            type_name: String::new(),
            register_by_name: false,
            encoded_namespace: None,
            encoded_type_name: None,
            type_meta: None,
            type_def: Vec::new(),
            harness: Some(harness_of::<T>()),
            index_key,
        });
        self.by_rust.insert(std::any::TypeId::of::<T>(), index_key);
        self.by_type_id.insert(type_id, index_key);
        self.infos.push(info);
        Ok(())
    }

    fn add_user_type(&mut self, pending: PendingRegistration) -> Result<()> {
        let reg = pending.registration;
        if is_internal_type(reg.kind) {
            return Err(Error::type_error(format!(
                "registration kind {} is not a user category",
                reg.kind
            )));
        }
        let register_by_name = is_named_category(reg.kind)
            || reg.kind == type_ids::NAMED_COMPATIBLE_STRUCT;

        if register_by_name {
            if reg.type_name.is_empty() {
                return Err(Error::type_error("named registration requires a type name"));
            }
        } else if reg.user_type_id.is_none() {
            return Err(Error::type_error("by-id registration requires a user type id"));
        }

        // Duplikate früh ablehnen; Registrierung ist einmalig pro Resolver.
        if self.by_rust.contains_key(&pending.rust_type) {
            return Err(Error::type_error("language type registered twice"));
        }
        if let Some(user_type_id) = reg.user_type_id {
            if self.by_user_id.contains_key(&(reg.kind, user_type_id)) {
                return Err(Error::type_error(format!(
                    "user type id {user_type_id} registered twice for kind {}",
                    reg.kind
                )));
            }
        }
        if register_by_name {
            let key = (reg.namespace.clone(), reg.type_name.clone());
            if self.by_name.contains_key(&key) {
                return Err(Error::type_error(format!(
                    "type name {}.{} registered twice",
                    reg.namespace, reg.type_name
                )));
            }
        }

        // Schema + Type-Def vorserialisieren (einmalig, nie pro Nachricht).
        let type_meta = if register_by_name {
            TypeMeta::by_name(reg.kind, reg.namespace.clone(), reg.type_name.clone(), reg.fields)
        } else {
            TypeMeta::by_id(reg.kind, reg.user_type_id.unwrap_or(0), reg.fields)
        };
        let type_def = type_meta.to_bytes(&self.namespace_encoder, &self.type_name_encoder)?;

        let (encoded_namespace, encoded_type_name) = if register_by_name {
            let ns = self.namespace_encoder.encode(&reg.namespace, NAMESPACE_ENCODINGS)?;
            let tn = self.type_name_encoder.encode(&reg.type_name, TYPE_NAME_ENCODINGS)?;
            (
                Some(MetaStringBytes::from_encoded(ns)),
                Some(MetaStringBytes::from_encoded(tn)),
            )
        } else {
            (None, None)
        };

        let index_key = self.infos.len() as u32;
        let info = Rc::new(TypeInfo {
            type_id: reg.kind,
            user_type_id: reg.user_type_id,
            namespace: reg.namespace.clone(),
            type_name: reg.type_name.clone(),
            register_by_name,
            encoded_namespace,
            encoded_type_name,
            type_meta: Some(type_meta),
            type_def,
            harness: Some(pending.harness),
            index_key,
        });

        self.by_rust.insert(pending.rust_type, index_key);
        if let Some(user_type_id) = reg.user_type_id {
            self.by_user_id.insert((reg.kind, user_type_id), index_key);
        }
        if register_by_name {
            self.by_name.insert((reg.namespace, reg.type_name), index_key);
        }
        self.infos.push(info);
        Ok(())
    }

    /// Looks up the info registered for the language type `T`.
    pub fn get_by_rust_type<T: Any>(&self) -> Result<&Rc<TypeInfo>> {
        self.by_rust
            .get(&std::any::TypeId::of::<T>())
            .map(|&i| &self.infos[i as usize])
            .ok_or_else(|| {
                Error::type_error(format!(
                    "type {} is not registered",
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Looks up the info registered for a language type id (dynamic
    /// counterpart of [`get_by_rust_type`](Self::get_by_rust_type)).
    pub fn get_by_rust(&self, rust_type: std::any::TypeId) -> Result<&Rc<TypeInfo>> {
        self.by_rust
            .get(&rust_type)
            .map(|&i| &self.infos[i as usize])
            .ok_or_else(|| Error::type_error("language type is not registered"))
    }

    /// Looks up an internal type by its wire type id.
    pub fn get_by_type_id(&self, type_id: u32) -> Result<&Rc<TypeInfo>> {
        self.by_type_id
            .get(&type_id)
            .map(|&i| &self.infos[i as usize])
            .ok_or_else(|| Error::type_error(format!("type id {type_id} is not registered")))
    }

    /// Looks up a user type by (category, user type id).
    pub fn get_by_user_id(&self, type_id: u32, user_type_id: u32) -> Result<&Rc<TypeInfo>> {
        self.by_user_id
            .get(&(type_id, user_type_id))
            .map(|&i| &self.infos[i as usize])
            .ok_or_else(|| {
                Error::type_error(format!(
                    "user type id {user_type_id} (kind {type_id}) is not registered"
                ))
            })
    }

    /// Looks up a named type by (namespace, type name).
    pub fn get_by_name(&self, namespace: &str, type_name: &str) -> Result<&Rc<TypeInfo>> {
        self.by_name
            .get(&(namespace.to_string(), type_name.to_string()))
            .map(|&i| &self.infos[i as usize])
            .ok_or_else(|| {
                Error::type_error(format!("type {namespace}.{type_name} is not registered"))
            })
    }

    /// The namespace meta-string decoder (specials `.` and `_`).
    pub fn namespace_decoder(&self) -> &MetaStringDecoder {
        &self.namespace_decoder
    }

    /// The type-name meta-string decoder (specials `$` and `_`).
    pub fn type_name_decoder(&self) -> &MetaStringDecoder {
        &self.type_name_decoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::type_ids::*;
    use crate::type_meta::FieldType;

    // Ein minimaler Struct-Typ für Registrierungs-Tests; die Serializer-
    // Implementierung lebt in serializer.rs-Tests, hier zählt nur die
    // Registry-Mechanik.
    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        count: i32,
    }

    impl Serializer for Sample {
        fn write_type_info(ctx: &mut crate::encoder::WriteContext<'_>) -> Result<()> {
            ctx.write_struct_type_info::<Self>()
        }

        fn read_type_info(ctx: &mut crate::decoder::ReadContext<'_>) -> Result<()> {
            ctx.read_struct_type_info::<Self>().map(|_| ())
        }

        fn write_data(&self, ctx: &mut crate::encoder::WriteContext<'_>) -> Result<()> {
            self.count.write_data(ctx)
        }

        fn read_data(ctx: &mut crate::decoder::ReadContext<'_>) -> Result<Self> {
            Ok(Self { count: i32::read_data(ctx)? })
        }
    }

    fn sample_fields() -> Vec<FieldDef> {
        vec![FieldDef::new("count", FieldType::scalar(VARINT32))]
    }

    #[test]
    fn internals_are_preregistered() {
        let resolver = TypeResolverBuilder::new().build().unwrap();
        for id in [BOOL, INT8, INT16, VARINT32, VARINT64, FLOAT32, FLOAT64, STRING] {
            let info = resolver.get_by_type_id(id).unwrap();
            assert_eq!(info.type_id, id);
            assert!(info.harness.is_some());
        }
        assert!(resolver.get_by_rust_type::<i64>().is_ok());
        assert!(resolver.get_by_rust_type::<String>().is_ok());
    }

    #[test]
    fn register_struct_by_user_id() {
        let resolver = TypeResolverBuilder::new()
            .register::<Sample>(TypeRegistration::compatible_struct(9, sample_fields()))
            .build()
            .unwrap();
        let info = resolver.get_by_user_id(COMPATIBLE_STRUCT, 9).unwrap();
        assert_eq!(info.type_id, COMPATIBLE_STRUCT);
        assert_eq!(info.user_type_id, Some(9));
        assert!(!info.register_by_name);
        assert!(!info.type_def.is_empty());
        assert!(info.type_meta.is_some());
        assert!(info.encoded_namespace.is_none());
        let by_rust = resolver.get_by_rust_type::<Sample>().unwrap();
        assert_eq!(by_rust.index_key, info.index_key);
    }

    #[test]
    fn register_named_struct_pre_encodes_names() {
        let resolver = TypeResolverBuilder::new()
            .register::<Sample>(TypeRegistration::named_struct(
                "org.example",
                "Sample",
                sample_fields(),
            ))
            .build()
            .unwrap();
        let info = resolver.get_by_name("org.example", "Sample").unwrap();
        assert!(info.register_by_name);
        assert!(info.encoded_namespace.is_some());
        assert!(info.encoded_type_name.is_some());
        // Typname "Sample": ein führender Großbuchstabe → FirstToLowerSpecial.
        assert_eq!(
            info.encoded_type_name.as_ref().unwrap().encoding,
            MetaEncoding::FirstToLowerSpecial
        );
    }

    #[test]
    fn unregistered_lookups_are_type_errors() {
        let resolver = TypeResolverBuilder::new().build().unwrap();
        assert!(matches!(
            resolver.get_by_user_id(STRUCT, 42).unwrap_err(),
            Error::TypeError(_)
        ));
        assert!(matches!(
            resolver.get_by_name("nope", "Nothing").unwrap_err(),
            Error::TypeError(_)
        ));
        assert!(matches!(resolver.get_by_type_id(200).unwrap_err(), Error::TypeError(_)));
        assert!(matches!(
            resolver.get_by_rust_type::<Sample>().unwrap_err(),
            Error::TypeError(_)
        ));
    }

    #[test]
    fn duplicate_user_id_is_rejected() {
        #[derive(Debug, Default)]
        struct Other;
        impl Serializer for Other {
            fn write_type_info(_: &mut crate::encoder::WriteContext<'_>) -> Result<()> {
                Ok(())
            }
            fn read_type_info(_: &mut crate::decoder::ReadContext<'_>) -> Result<()> {
                Ok(())
            }
            fn write_data(&self, _: &mut crate::encoder::WriteContext<'_>) -> Result<()> {
                Ok(())
            }
            fn read_data(_: &mut crate::decoder::ReadContext<'_>) -> Result<Self> {
                Ok(Self)
            }
        }

        let err = TypeResolverBuilder::new()
            .register::<Sample>(TypeRegistration::compatible_struct(3, sample_fields()))
            .register::<Other>(TypeRegistration::compatible_struct(3, Vec::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TypeError(_)), "{err}");
    }

    #[test]
    fn by_id_registration_without_user_id_is_rejected() {
        let mut reg = TypeRegistration::struct_by_id(1, sample_fields());
        reg.user_type_id = None;
        let err = TypeResolverBuilder::new().register::<Sample>(reg).build().unwrap_err();
        assert!(matches!(err, Error::TypeError(_)), "{err}");
    }

    #[test]
    fn named_registration_without_name_is_rejected() {
        let reg = TypeRegistration::named_struct("ns", "", sample_fields());
        let err = TypeResolverBuilder::new().register::<Sample>(reg).build().unwrap_err();
        assert!(matches!(err, Error::TypeError(_)), "{err}");
    }
}
