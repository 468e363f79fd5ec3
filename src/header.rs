//! Message header encoding/decoding (xlang spec: fory header).
//!
//! Every message begins with one flag byte:
//! - Bit 0: null marker (root value is null, no body follows)
//! - Bit 1: xlang mode (cross-language wire variant)
//! - Bit 2: out-of-band blob mode
//! - Bits 3–7: reserviert, MÜSSEN 0 sein
//!
//! # Beispiel
//!
//! ```
//! use xwire::header::MessageHeader;
//!
//! let header = MessageHeader::xlang();
//! assert_eq!(header.encode(), 0x02);
//! let decoded = MessageHeader::decode(0x02).unwrap();
//! assert!(decoded.is_xlang && !decoded.is_null && !decoded.is_oob);
//! ```

use crate::error::{Error, Result};

const NULL_BIT: u8 = 1 << 0;
const XLANG_BIT: u8 = 1 << 1;
const OOB_BIT: u8 = 1 << 2;
const RESERVED_MASK: u8 = !(NULL_BIT | XLANG_BIT | OOB_BIT);

/// Decoded message flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Root value is null; the body is absent.
    pub is_null: bool,
    /// Cross-language wire variant (the only variant this crate speaks).
    pub is_xlang: bool,
    /// Out-of-band blob mode.
    pub is_oob: bool,
}

impl MessageHeader {
    /// Header for a non-null xlang message.
    pub fn xlang() -> Self {
        Self { is_null: false, is_xlang: true, is_oob: false }
    }

    /// Header for a null xlang message.
    pub fn xlang_null() -> Self {
        Self { is_null: true, is_xlang: true, is_oob: false }
    }

    /// Encodes the flag byte.
    pub fn encode(&self) -> u8 {
        let mut flags = 0u8;
        if self.is_null {
            flags |= NULL_BIT;
        }
        if self.is_xlang {
            flags |= XLANG_BIT;
        }
        if self.is_oob {
            flags |= OOB_BIT;
        }
        flags
    }

    /// Decodes a flag byte; reserved bits must be zero.
    pub fn decode(flags: u8) -> Result<Self> {
        if flags & RESERVED_MASK != 0 {
            return Err(Error::invalid_data(format!(
                "reserved header bits set: {flags:#04x}"
            )));
        }
        Ok(Self {
            is_null: flags & NULL_BIT != 0,
            is_xlang: flags & XLANG_BIT != 0,
            is_oob: flags & OOB_BIT != 0,
        })
    }
}
