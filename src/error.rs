//! Central error types for the xwire serialization core.
//!
//! Every public entry point returns [`Result`]. Contract violations
//! (unsafe puts out of bounds, misuse of the stream binding) panic via
//! `assert!`/`debug_assert!` — those indicate a bug in the caller, not bad
//! input. Malformed wire data never panics.

use core::fmt;
use std::borrow::Cow;

/// All error kinds produced by the serialization core.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A read requested more bytes than remain and refill failed or the
    /// source is exhausted.
    BufferOutOfBound {
        /// Leseposition zum Zeitpunkt des Fehlers.
        read_pos: u32,
        /// Angeforderte Byte-Anzahl.
        requested: u32,
        /// Tatsächlich verfügbare Bytes.
        available: u32,
    },
    /// A computed size or index would overflow the 32-bit buffer range.
    OutOfBound(Cow<'static, str>),
    /// Malformed wire data: invalid varint, impossible header, unknown tag.
    InvalidData(Cow<'static, str>),
    /// A reference id is out of range, or a ref flag appeared where the
    /// declared ref mode does not allow one.
    InvalidRef(Cow<'static, str>),
    /// A type is not registered, the wire type id does not match the
    /// expected category, or required metadata is missing.
    TypeError(Cow<'static, str>),
    /// The wire type id does not match the locally expected one.
    TypeMismatch {
        /// Type-ID aus dem Stream.
        actual: u32,
        /// Lokal erwartete Type-ID.
        expected: u32,
    },
    /// A meta-string encoding value is outside the defined range.
    EncodingError(Cow<'static, str>),
    /// The underlying stream source raised.
    IoError(String),
    /// The caller passed data that cannot be encoded.
    EncodeError(Cow<'static, str>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOutOfBound { read_pos, requested, available } => write!(
                f,
                "buffer out of bound: read at {read_pos}, requested {requested}, available {available}"
            ),
            Self::OutOfBound(msg) => write!(f, "out of bound: {msg}"),
            Self::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Self::InvalidRef(msg) => write!(f, "invalid reference: {msg}"),
            Self::TypeError(msg) => write!(f, "type error: {msg}"),
            Self::TypeMismatch { actual, expected } => {
                write!(f, "type mismatch: stream carries type id {actual}, expected {expected}")
            }
            Self::EncodingError(msg) => write!(f, "meta string encoding error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::EncodeError(msg) => write!(f, "encode error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `BufferOutOfBound` Fehler aus Position, Anforderung
    /// und Verfügbarkeit.
    pub fn buffer_out_of_bound(read_pos: u32, requested: u32, available: u32) -> Self {
        Self::BufferOutOfBound { read_pos, requested, available }
    }

    /// Erstellt einen `OutOfBound` Fehler mit Nachricht.
    pub fn out_of_bound(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::OutOfBound(msg.into())
    }

    /// Erstellt einen `InvalidData` Fehler mit Nachricht.
    pub fn invalid_data(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Erstellt einen `InvalidRef` Fehler mit Nachricht.
    pub fn invalid_ref(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRef(msg.into())
    }

    /// Erstellt einen `TypeError` mit Nachricht.
    pub fn type_error(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Erstellt einen `TypeMismatch` Fehler.
    pub fn type_mismatch(actual: u32, expected: u32) -> Self {
        Self::TypeMismatch { actual, expected }
    }

    /// Erstellt einen `EncodingError` mit Nachricht.
    pub fn encoding_error(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::EncodingError(msg.into())
    }

    /// Erstellt einen `IoError` aus einem `std::io::Error`.
    pub fn io(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }

    /// Erstellt einen `EncodeError` mit Nachricht.
    pub fn encode_error(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::EncodeError(msg.into())
    }

    /// True für Fehler die durch Stream-Nachfüllen behebbar gewesen wären
    /// (Unterscheidung für Aufrufer die bei Nachrichtengrenzen weiterlesen).
    pub fn is_out_of_bound(&self) -> bool {
        matches!(self, Self::BufferOutOfBound { .. } | Self::OutOfBound(_))
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
