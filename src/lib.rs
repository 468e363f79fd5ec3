//! xwire – cross-language binary serialization core
//!
//! Encodes and decodes typed values to/from byte streams such that a peer
//! in any supported language reconstructs an equivalent value, preserving
//! object identity for shared references and supporting schema evolution.
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
//!
//! // Encode
//! let mut writer = WriteContext::new(resolver.clone(), Config::new());
//! let bytes = writer.serialize(&"hello".to_string()).unwrap();
//!
//! // Decode
//! let mut reader = ReadContext::new(resolver, Config::new(), Buffer::from_vec(bytes));
//! assert_eq!(reader.deserialize::<String>().unwrap(), "hello");
//! ```

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod hash;
pub mod header;
pub mod meta_string;
pub mod ref_tracker;
pub mod resolver;
pub mod serializer;
pub mod stream;
pub mod string_table;
pub mod type_info;
pub mod type_meta;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent — für interne
/// Datenstrukturen). Nutzt hashbrown direkt.
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Einfüge-Reihenfolge + schnelles
/// Hashing) — die Einfüge-Reihenfolge ist auf dem Wire sichtbar.
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Buffer und Streams
pub use buffer::Buffer;
pub use stream::{FnSource, ReadSource, StreamReader, StreamSource};

// Public API: Kontexte
pub use config::Config;
pub use decoder::ReadContext;
pub use encoder::WriteContext;

// Public API: Typregistrierung
pub use resolver::{TypeRegistration, TypeResolver, TypeResolverBuilder};
pub use serializer::{read_any_value, skip_field_value, write_any_value, Serializer};
pub use type_info::{type_ids, Harness, TypeInfo};
pub use type_meta::{FieldDef, FieldType, TypeMeta};

// Public API: Meta-Strings
pub use meta_string::{EncodedMetaString, MetaEncoding, MetaStringDecoder, MetaStringEncoder};

// Public API: Referenzen
pub use ref_tracker::{RefMode, RefReader, RefWriter};
