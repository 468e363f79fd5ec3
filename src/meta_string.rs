//! Meta-string codec: compact 5-/6-bit encodings of identifier-like strings
//! (xlang spec: meta string).
//!
//! Namespaces and type names are short and drawn from small alphabets; the
//! codec picks the smallest legal encoding per string. The two special
//! characters of the 6-bit alphabet are configured at encoder construction
//! (`.`/`_` for namespaces, `$`/`_` for type names) and are NOT carried on
//! the wire — the decoder must be configured identically.
//!
//! Bit-Packing der 5-/6-Bit-Encodings: Bit 7 des ersten Bytes ist das
//! Strip-Last-Char-Flag (gesetzt wenn der letzte 5-/6-Bit-Slot Padding
//! war); die Zeichen folgen big-endian ab Bit 1.

use crate::error::{Error, Result};

/// Wire values of the meta-string encodings (one byte on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaEncoding {
    /// Extended payload: discriminator byte + UTF-8 bytes or number bytes.
    Extended = 0x00,
    /// 5 bits per char: `a`–`z`, `.`, `_`, `$`, `|`.
    LowerSpecial = 0x01,
    /// 6 bits per char: `a`–`z`, `A`–`Z`, `0`–`9`, two configured specials.
    LowerUpperDigitSpecial = 0x02,
    /// LowerSpecial with the first decoded char re-uppercased.
    FirstToLowerSpecial = 0x03,
    /// LowerSpecial with `|x` expanding to uppercase `X`.
    AllToLowerSpecial = 0x04,
}

/// Discriminator byte of [`MetaEncoding::Extended`] payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaExtended {
    /// Raw UTF-8 bytes.
    Utf8 = 0x00,
    /// Sign-extended two's-complement big-endian integer payload.
    NumberString = 0x01,
}

/// Maps a wire byte to a [`MetaEncoding`].
pub fn meta_encoding_from_byte(value: u8) -> Result<MetaEncoding> {
    match value {
        0x00 => Ok(MetaEncoding::Extended),
        0x01 => Ok(MetaEncoding::LowerSpecial),
        0x02 => Ok(MetaEncoding::LowerUpperDigitSpecial),
        0x03 => Ok(MetaEncoding::FirstToLowerSpecial),
        0x04 => Ok(MetaEncoding::AllToLowerSpecial),
        _ => Err(Error::encoding_error(format!(
            "unsupported meta string encoding value: {value}"
        ))),
    }
}

/// An encoded meta-string: chosen encoding plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMetaString {
    /// Gewählte Encoding-Variante.
    pub encoding: MetaEncoding,
    /// Payload (bei Extended inklusive Diskriminator-Byte).
    pub bytes: Vec<u8>,
}

/// True wenn der String eine (optional negative) Dezimalzahl ist.
fn is_number_string(input: &str) -> bool {
    let digits = input.strip_prefix('-').unwrap_or(input);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Dezimalziffern → big-endian Magnitude zur Basis 256.
fn encode_decimal_to_bytes(digits: &str) -> Vec<u8> {
    let mut magnitude = vec![0u8];
    for c in digits.bytes() {
        let mut carry = u16::from(c - b'0');
        for slot in magnitude.iter_mut().rev() {
            let value = u16::from(*slot) * 10 + carry;
            *slot = (value & 0xFF) as u8;
            carry = value >> 8;
        }
        while carry != 0 {
            magnitude.insert(0, (carry & 0xFF) as u8);
            carry >>= 8;
        }
    }
    while magnitude.len() > 1 && magnitude[0] == 0 {
        magnitude.remove(0);
    }
    magnitude
}

/// Kodiert eine Dezimalzahl als sign-extended Zweierkomplement
/// (big-endian), mit vorangestelltem NumberString-Diskriminator.
fn encode_number_string(input: &str) -> Vec<u8> {
    let mut negative = input.starts_with('-');
    let digits = input.strip_prefix('-').unwrap_or(input);
    let mut magnitude = encode_decimal_to_bytes(digits);
    if is_all_zero(&magnitude) {
        negative = false;
    }
    // Vorzeichenbit freihalten, sonst kippt die Negation den Wert
    // (z.B. 129 → 0x81 → ~+1 = 0x7F = +127).
    if magnitude[0] & 0x80 != 0 {
        magnitude.insert(0, 0x00);
    }

    if negative {
        for b in magnitude.iter_mut() {
            *b = !*b;
        }
        let mut carry = 1u16;
        for slot in magnitude.iter_mut().rev() {
            let sum = u16::from(*slot) + carry;
            *slot = (sum & 0xFF) as u8;
            carry = sum >> 8;
        }
        if carry != 0 {
            magnitude.insert(0, 0xFF);
        }
        // Redundante 0xFF-Präfixe entfernen solange das Vorzeichen erhalten bleibt.
        while magnitude.len() > 1 && magnitude[0] == 0xFF && magnitude[1] & 0x80 != 0 {
            magnitude.remove(0);
        }
    }

    let mut bytes = Vec::with_capacity(magnitude.len() + 1);
    bytes.push(MetaExtended::NumberString as u8);
    bytes.extend_from_slice(&magnitude);
    bytes
}

/// Dekodiert das Zweierkomplement zurück zur Dezimaldarstellung.
fn decode_number_string(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    let mut bytes = data.to_vec();
    let negative = bytes[0] & 0x80 != 0;
    if negative {
        for b in bytes.iter_mut() {
            *b = !*b;
        }
        let mut carry = 1u16;
        for slot in bytes.iter_mut().rev() {
            let sum = u16::from(*slot) + carry;
            *slot = (sum & 0xFF) as u8;
            carry = sum >> 8;
        }
    }
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }

    if is_all_zero(&bytes) {
        return "0".to_string();
    }

    // Wiederholte Division durch 10, Ziffern rückwärts einsammeln.
    let mut digits = Vec::new();
    let mut temp = bytes;
    while !temp.is_empty() {
        let mut remainder = 0u32;
        for slot in temp.iter_mut() {
            let value = (remainder << 8) | u32::from(*slot);
            *slot = (value / 10) as u8;
            remainder = value % 10;
        }
        digits.push(b'0' + remainder as u8);
        while !temp.is_empty() && temp[0] == 0 {
            temp.remove(0);
        }
    }
    digits.reverse();
    let mut result = String::with_capacity(digits.len() + 1);
    if negative {
        result.push('-');
    }
    result.push_str(std::str::from_utf8(&digits).unwrap_or("0"));
    result
}

fn encode_extended_utf8(input: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(input.len() + 1);
    bytes.push(MetaExtended::Utf8 as u8);
    bytes.extend_from_slice(input.as_bytes());
    bytes
}

/// Zeichenstatistik für die Encoding-Wahl.
struct StringStatistics {
    digit_count: usize,
    upper_count: usize,
    can_lower_special: bool,
    can_lower_upper_digit_special: bool,
}

/// Encoder for meta-strings with two configurable special characters
/// (slots 62 and 63 of the 6-bit alphabet).
///
/// Konstruktion einmal pro Resolver; keine veränderlichen Statics.
#[derive(Debug, Clone)]
pub struct MetaStringEncoder {
    special_char1: char,
    special_char2: char,
}

impl MetaStringEncoder {
    /// Creates an encoder with the given special characters.
    pub fn new(special_char1: char, special_char2: char) -> Self {
        Self { special_char1, special_char2 }
    }

    fn compute_statistics(&self, input: &str) -> StringStatistics {
        let mut stats = StringStatistics {
            digit_count: 0,
            upper_count: 0,
            can_lower_special: true,
            can_lower_upper_digit_special: true,
        };
        for c in input.chars() {
            if stats.can_lower_upper_digit_special {
                let valid = c.is_ascii_lowercase()
                    || c.is_ascii_uppercase()
                    || c.is_ascii_digit()
                    || c == self.special_char1
                    || c == self.special_char2;
                if !valid {
                    stats.can_lower_upper_digit_special = false;
                }
            }
            if stats.can_lower_special {
                let valid = c.is_ascii_lowercase() || matches!(c, '.' | '_' | '$' | '|');
                if !valid {
                    stats.can_lower_special = false;
                }
            }
            if c.is_ascii_digit() {
                stats.digit_count += 1;
            }
            if c.is_ascii_uppercase() {
                stats.upper_count += 1;
            }
        }
        stats
    }

    /// Picks the smallest legal encoding for `input`, restricted to
    /// `allowed` (empty slice = all encodings allowed).
    pub fn compute_encoding(&self, input: &str, allowed: &[MetaEncoding]) -> MetaEncoding {
        if is_number_string(input) {
            return MetaEncoding::Extended;
        }
        let allow = |e: MetaEncoding| allowed.is_empty() || allowed.contains(&e);
        let stats = self.compute_statistics(input);

        if stats.can_lower_special && allow(MetaEncoding::LowerSpecial) {
            return MetaEncoding::LowerSpecial;
        }

        if stats.can_lower_upper_digit_special {
            if stats.digit_count != 0 && allow(MetaEncoding::LowerUpperDigitSpecial) {
                return MetaEncoding::LowerUpperDigitSpecial;
            }
            if stats.upper_count == 1
                && input.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                && allow(MetaEncoding::FirstToLowerSpecial)
            {
                return MetaEncoding::FirstToLowerSpecial;
            }
            // AllToLowerSpecial lohnt sich wenn (len + upper) * 5 < len * 6.
            if (input.len() + stats.upper_count) * 5 < input.len() * 6
                && allow(MetaEncoding::AllToLowerSpecial)
            {
                return MetaEncoding::AllToLowerSpecial;
            }
            if allow(MetaEncoding::LowerUpperDigitSpecial) {
                return MetaEncoding::LowerUpperDigitSpecial;
            }
        }

        MetaEncoding::Extended
    }

    fn lower_special_char_value(c: char) -> Option<u8> {
        match c {
            'a'..='z' => Some(c as u8 - b'a'),
            '.' => Some(26),
            '_' => Some(27),
            '$' => Some(28),
            '|' => Some(29),
            _ => None,
        }
    }

    fn lower_upper_digit_special_char_value(&self, c: char) -> Option<u8> {
        match c {
            'a'..='z' => Some(c as u8 - b'a'),
            'A'..='Z' => Some(c as u8 - b'A' + 26),
            '0'..='9' => Some(c as u8 - b'0' + 52),
            _ if c == self.special_char1 => Some(62),
            _ if c == self.special_char2 => Some(63),
            _ => None,
        }
    }

    /// Packt Werte big-endian ab Bit 1; setzt das Strip-Flag wenn der
    /// letzte Slot reines Padding wäre.
    fn pack_bits(values: &[u8], bits_per_char: usize) -> Vec<u8> {
        let total_bits = values.len() * bits_per_char + 1;
        let byte_length = total_bits.div_ceil(8);
        let mut bytes = vec![0u8; byte_length];

        let mut current_bit = 1usize;
        for &value in values {
            for i in (0..bits_per_char).rev() {
                if value & (1 << i) != 0 {
                    bytes[current_bit / 8] |= 1 << (7 - current_bit % 8);
                }
                current_bit += 1;
            }
        }

        if byte_length * 8 >= total_bits + bits_per_char {
            bytes[0] |= 0x80;
        }
        bytes
    }

    fn encode_lower_special(&self, input: &str) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(input.len());
        for c in input.chars() {
            let v = Self::lower_special_char_value(c).ok_or_else(|| {
                Error::encode_error(format!("character {c:?} not in LowerSpecial alphabet"))
            })?;
            values.push(v);
        }
        Ok(Self::pack_bits(&values, 5))
    }

    fn encode_lower_upper_digit_special(&self, input: &str) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(input.len());
        for c in input.chars() {
            let v = self.lower_upper_digit_special_char_value(c).ok_or_else(|| {
                Error::encode_error(format!(
                    "character {c:?} not in LowerUpperDigitSpecial alphabet"
                ))
            })?;
            values.push(v);
        }
        Ok(Self::pack_bits(&values, 6))
    }

    fn encode_first_to_lower_special(&self, input: &str) -> Result<Vec<u8>> {
        let mut modified = String::with_capacity(input.len());
        let mut chars = input.chars();
        if let Some(first) = chars.next() {
            modified.push(first.to_ascii_lowercase());
            modified.extend(chars);
        }
        self.encode_lower_special(&modified)
    }

    fn encode_all_to_lower_special(&self, input: &str) -> Result<Vec<u8>> {
        let mut modified = String::with_capacity(input.len() * 2);
        for c in input.chars() {
            if c.is_ascii_uppercase() {
                modified.push('|');
                modified.push(c.to_ascii_lowercase());
            } else {
                modified.push(c);
            }
        }
        self.encode_lower_special(&modified)
    }

    /// Encodes `input` with a fixed bit-packed encoding (no tag byte).
    /// Used where the encoding is carried out-of-band, e.g. in field-name
    /// headers of type defs.
    pub fn encode_as(&self, input: &str, encoding: MetaEncoding) -> Result<Vec<u8>> {
        match encoding {
            MetaEncoding::LowerSpecial => self.encode_lower_special(input),
            MetaEncoding::LowerUpperDigitSpecial => self.encode_lower_upper_digit_special(input),
            MetaEncoding::FirstToLowerSpecial => self.encode_first_to_lower_special(input),
            MetaEncoding::AllToLowerSpecial => self.encode_all_to_lower_special(input),
            MetaEncoding::Extended => {
                Err(Error::encode_error("extended payloads are built by encode()"))
            }
        }
    }

    /// Encodes `input`, choosing the smallest encoding within `allowed`
    /// (empty slice = all). All-decimal strings become NumberString
    /// payloads, non-ASCII strings UTF-8 payloads.
    pub fn encode(&self, input: &str, allowed: &[MetaEncoding]) -> Result<EncodedMetaString> {
        if input.is_empty() {
            return Ok(EncodedMetaString { encoding: MetaEncoding::Extended, bytes: Vec::new() });
        }
        if is_number_string(input) {
            return Ok(EncodedMetaString {
                encoding: MetaEncoding::Extended,
                bytes: encode_number_string(input),
            });
        }
        if !input.is_ascii() {
            return Ok(EncodedMetaString {
                encoding: MetaEncoding::Extended,
                bytes: encode_extended_utf8(input),
            });
        }

        let encoding = self.compute_encoding(input, allowed);
        let bytes = match encoding {
            MetaEncoding::LowerSpecial => self.encode_lower_special(input)?,
            MetaEncoding::LowerUpperDigitSpecial => self.encode_lower_upper_digit_special(input)?,
            MetaEncoding::FirstToLowerSpecial => self.encode_first_to_lower_special(input)?,
            MetaEncoding::AllToLowerSpecial => self.encode_all_to_lower_special(input)?,
            MetaEncoding::Extended => encode_extended_utf8(input),
        };
        Ok(EncodedMetaString { encoding, bytes })
    }
}

/// Decoder for meta-strings; must be configured with the same special
/// characters as the peer's encoder.
#[derive(Debug, Clone)]
pub struct MetaStringDecoder {
    special_char1: char,
    special_char2: char,
}

impl MetaStringDecoder {
    /// Creates a decoder with the given special characters.
    pub fn new(special_char1: char, special_char2: char) -> Self {
        Self { special_char1, special_char2 }
    }

    /// Decodes `data` according to `encoding`.
    pub fn decode(&self, data: &[u8], encoding: MetaEncoding) -> Result<String> {
        if data.is_empty() {
            return Ok(String::new());
        }
        match encoding {
            MetaEncoding::LowerSpecial => self.decode_lower_special(data),
            MetaEncoding::LowerUpperDigitSpecial => self.decode_lower_upper_digit_special(data),
            MetaEncoding::FirstToLowerSpecial => {
                let base = self.decode_lower_special(data)?;
                let mut chars = base.chars();
                Ok(match chars.next() {
                    Some(first) => {
                        let mut result = String::with_capacity(base.len());
                        result.push(first.to_ascii_uppercase());
                        result.extend(chars);
                        result
                    }
                    None => base,
                })
            }
            MetaEncoding::AllToLowerSpecial => {
                let base = self.decode_lower_special(data)?;
                let mut result = String::with_capacity(base.len());
                let mut upper_next = false;
                for c in base.chars() {
                    if upper_next {
                        result.push(c.to_ascii_uppercase());
                        upper_next = false;
                    } else if c == '|' {
                        upper_next = true;
                    } else {
                        result.push(c);
                    }
                }
                Ok(result)
            }
            MetaEncoding::Extended => {
                let discriminator = data[0];
                let payload = &data[1..];
                match discriminator {
                    x if x == MetaExtended::Utf8 as u8 => {
                        String::from_utf8(payload.to_vec()).map_err(|_| {
                            Error::encoding_error("invalid UTF-8 in extended meta string")
                        })
                    }
                    x if x == MetaExtended::NumberString as u8 => {
                        Ok(decode_number_string(payload))
                    }
                    other => Err(Error::encoding_error(format!(
                        "unsupported extended meta string discriminator: {other}"
                    ))),
                }
            }
        }
    }

    /// Entpackt 5-/6-Bit-Werte: Schleife bis die Restbits (abzüglich
    /// Strip-Padding) aufgebraucht sind.
    fn unpack_bits(data: &[u8], bits_per_char: usize) -> Vec<u8> {
        let total_bits = data.len() * 8;
        let strip_last_char = data[0] & 0x80 != 0;
        let bit_mask = (1usize << bits_per_char) - 1;
        let mut values = Vec::new();
        let mut bit_index = 1usize;

        while bit_index + bits_per_char <= total_bits
            && !(strip_last_char && bit_index + 2 * bits_per_char > total_bits)
        {
            let byte_index = bit_index / 8;
            let intra = bit_index % 8;
            let value = if intra > 8 - bits_per_char {
                // Slot überspannt die Byte-Grenze: zwei Bytes laden.
                let mut two = u16::from(data[byte_index]) << 8;
                if byte_index + 1 < data.len() {
                    two |= u16::from(data[byte_index + 1]);
                }
                (usize::from(two) >> (16 - bits_per_char - intra)) & bit_mask
            } else {
                (usize::from(data[byte_index]) >> (8 - bits_per_char - intra)) & bit_mask
            };
            values.push(value as u8);
            bit_index += bits_per_char;
        }
        values
    }

    fn decode_lower_special(&self, data: &[u8]) -> Result<String> {
        let values = Self::unpack_bits(data, 5);
        let mut decoded = String::with_capacity(values.len());
        for value in values {
            decoded.push(match value {
                0..=25 => (b'a' + value) as char,
                26 => '.',
                27 => '_',
                28 => '$',
                29 => '|',
                other => {
                    return Err(Error::encoding_error(format!(
                        "invalid character value for LowerSpecial decoding: {other}"
                    )))
                }
            });
        }
        Ok(decoded)
    }

    fn decode_lower_upper_digit_special(&self, data: &[u8]) -> Result<String> {
        let values = Self::unpack_bits(data, 6);
        let mut decoded = String::with_capacity(values.len());
        for value in values {
            decoded.push(match value {
                0..=25 => (b'a' + value) as char,
                26..=51 => (b'A' + value - 26) as char,
                52..=61 => (b'0' + value - 52) as char,
                62 => self.special_char1,
                63 => self.special_char2,
                other => {
                    return Err(Error::encoding_error(format!(
                        "invalid character value for LowerUpperDigitSpecial decoding: {other}"
                    )))
                }
            });
        }
        Ok(decoded)
    }
}
