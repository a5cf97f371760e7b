//! Conversions between felt data and common Cairo values.

use std::fmt;

use starknet::core::types::Felt;

/// Bytes held by each full word of a Cairo `ByteArray`.
pub const BYTES_PER_WORD: usize = 31;

pub const U256_TYPE: &str = "core::integer::u256";
pub const BYTE_ARRAY_TYPE: &str = "core::byte_array::ByteArray";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CairoDecodeError {
    #[error("expected at least {expected} felts, got {got}")]
    TooShort { expected: usize, got: usize },

    #[error("felt {0:#x} does not fit in {1} bytes")]
    Overflow(Felt, usize),

    #[error("byte array is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A Cairo `u256`, serialized as `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256 {
    pub low: u128,
    pub high: u128,
}

impl U256 {
    pub fn from_felts(data: &[Felt]) -> Result<Self, CairoDecodeError> {
        match data {
            [low, high, ..] => Ok(Self {
                low: felt_to_u128(low)?,
                high: felt_to_u128(high)?,
            }),
            _ => Err(CairoDecodeError::TooShort {
                expected: 2,
                got: data.len(),
            }),
        }
    }

    pub fn to_felts(&self) -> [Felt; 2] {
        [Felt::from(self.low), Felt::from(self.high)]
    }
}

/// `0x` followed by 64 hex digits, high half first.
impl fmt::LowerHex for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "0x")?;
        }
        write!(f, "{:032x}{:032x}", self.high, self.low)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self)
    }
}

fn felt_to_u128(felt: &Felt) -> Result<u128, CairoDecodeError> {
    let bytes = felt_to_bytes(felt, 16)?;
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes);
    Ok(u128::from_be_bytes(buf))
}

fn felt_to_usize(felt: &Felt) -> Result<usize, CairoDecodeError> {
    let value = felt_to_u128(felt)?;
    usize::try_from(value).map_err(|_| CairoDecodeError::Overflow(*felt, size_of::<usize>()))
}

/// The low `len` big-endian bytes of a felt, failing if higher bytes are set.
fn felt_to_bytes(felt: &Felt, len: usize) -> Result<Vec<u8>, CairoDecodeError> {
    let bytes = felt.to_bytes_be();
    let (high, low) = bytes.split_at(bytes.len() - len);
    if high.iter().any(|b| *b != 0) {
        return Err(CairoDecodeError::Overflow(*felt, len));
    }
    Ok(low.to_vec())
}

/// Decode a serialized `ByteArray`: `[n_words, words.., pending_word, pending_len]`.
pub fn decode_byte_array(data: &[Felt]) -> Result<String, CairoDecodeError> {
    decode_byte_array_prefix(data).map(|(value, _)| value)
}

/// Decode the `ByteArray` at the start of `data`, returning it with the felts it spans.
fn decode_byte_array_prefix(data: &[Felt]) -> Result<(String, usize), CairoDecodeError> {
    let too_short = |expected: usize| CairoDecodeError::TooShort {
        expected,
        got: data.len(),
    };

    let n_words = data.first().ok_or_else(|| too_short(3))?;
    let n_words = felt_to_usize(n_words)?;
    let expected = n_words
        .checked_add(3)
        .ok_or(CairoDecodeError::Overflow(data[0], size_of::<usize>()))?;
    if data.len() < expected {
        return Err(too_short(expected));
    }

    let mut bytes = Vec::with_capacity((n_words + 1) * BYTES_PER_WORD);
    for word in &data[1..=n_words] {
        bytes.extend(felt_to_bytes(word, BYTES_PER_WORD)?);
    }

    let pending_len = felt_to_usize(&data[n_words + 2])?.min(BYTES_PER_WORD);
    if pending_len > 0 {
        bytes.extend(felt_to_bytes(&data[n_words + 1], pending_len)?);
    }

    Ok((String::from_utf8(bytes)?, expected))
}

/// Render the value of Cairo type `ty` found at the start of `data`, along with the
/// number of felts it spans. Types other than `u256` and `ByteArray` take one felt.
pub fn decode_value(ty: &str, data: &[Felt]) -> Result<(String, usize), CairoDecodeError> {
    match ty {
        U256_TYPE => U256::from_felts(data).map(|value| (value.to_string(), 2)),
        BYTE_ARRAY_TYPE => decode_byte_array_prefix(data),
        _ => data
            .first()
            .map(|felt| (format!("{:#x}", felt), 1))
            .ok_or(CairoDecodeError::TooShort {
                expected: 1,
                got: 0,
            }),
    }
}

/// Serialize a string as a `ByteArray`.
pub fn encode_byte_array(value: &str) -> Vec<Felt> {
    let chunks: Vec<&[u8]> = value.as_bytes().chunks(BYTES_PER_WORD).collect();
    let (full, pending): (&[&[u8]], &[u8]) = match chunks.last() {
        Some(last) if last.len() < BYTES_PER_WORD => (&chunks[..chunks.len() - 1], *last),
        _ => (&chunks[..], &[][..]),
    };

    let mut felts = Vec::with_capacity(full.len() + 3);
    felts.push(Felt::from(full.len() as u64));
    felts.extend(full.iter().map(|word| Felt::from_bytes_be_slice(word)));
    felts.push(Felt::from_bytes_be_slice(pending));
    felts.push(Felt::from(pending.len() as u64));
    felts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u256_hex() {
        let value = U256::from_felts(&[Felt::from(0xffu64), Felt::from(1u64)]).unwrap();
        assert_eq!(
            value.to_string(),
            "0x00000000000000000000000000000001000000000000000000000000000000ff"
        );
        assert_eq!(value.to_felts(), [Felt::from(0xffu64), Felt::ONE]);
    }

    #[test]
    fn test_u256_rejects_large_limb() {
        let big = Felt::from_hex_unchecked("0x100000000000000000000000000000000");
        assert!(matches!(
            U256::from_felts(&[big, Felt::ZERO]),
            Err(CairoDecodeError::Overflow(_, 16))
        ));
        assert!(matches!(
            U256::from_felts(&[Felt::ONE]),
            Err(CairoDecodeError::TooShort { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_short_byte_array() {
        // "hello" fits in the pending word.
        let data = [
            Felt::ZERO,
            Felt::from_hex_unchecked("0x68656c6c6f"),
            Felt::from(5u64),
        ];
        assert_eq!(decode_byte_array(&data).unwrap(), "hello");
        assert_eq!(encode_byte_array("hello"), data.to_vec());
    }

    #[test]
    fn test_long_byte_array() {
        let text = "the quick brown fox jumps over the lazy dog";
        let encoded = encode_byte_array(text);
        assert_eq!(encoded[0], Felt::ONE);
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded[3], Felt::from((text.len() - BYTES_PER_WORD) as u64));
        assert_eq!(decode_byte_array(&encoded).unwrap(), text);
    }

    #[test]
    fn test_exact_word_byte_array() {
        let text = "a".repeat(BYTES_PER_WORD);
        let encoded = encode_byte_array(&text);
        assert_eq!(encoded[0], Felt::ONE);
        assert_eq!(encoded[2], Felt::ZERO);
        assert_eq!(encoded[3], Felt::ZERO);
        assert_eq!(decode_byte_array(&encoded).unwrap(), text);
        assert_eq!(encode_byte_array(""), vec![Felt::ZERO, Felt::ZERO, Felt::ZERO]);
    }

    #[test]
    fn test_truncated_byte_array() {
        assert!(matches!(
            decode_byte_array(&[Felt::TWO, Felt::ONE]),
            Err(CairoDecodeError::TooShort { expected: 5, got: 2 })
        ));
    }

    #[test]
    fn test_decode_values_in_sequence() {
        let mut data = vec![Felt::from(0x2au64), Felt::from(7u64), Felt::ZERO];
        data.extend(encode_byte_array("gm"));
        data.push(Felt::from(0xbeefu64));

        let (amount, used) = decode_value(U256_TYPE, &data[1..]).unwrap();
        assert_eq!(used, 2);
        assert_eq!(amount, format!("{:#x}", U256 { low: 7, high: 0 }));

        let address_type = "core::starknet::contract_address::ContractAddress";
        let (owner, used) = decode_value(address_type, &data).unwrap();
        assert_eq!((owner.as_str(), used), ("0x2a", 1));

        let (text, used) = decode_value(BYTE_ARRAY_TYPE, &data[3..]).unwrap();
        assert_eq!((text.as_str(), used), ("gm", 3));
        assert_eq!(decode_value("core::felt252", &data[6..]).unwrap().0, "0xbeef");
        assert!(decode_value("core::felt252", &[]).is_err());
    }

    #[test]
    fn test_huge_word_count_is_error() {
        let data = [Felt::from(u64::MAX), Felt::ZERO, Felt::ZERO];
        assert!(decode_byte_array(&data).is_err());

        let beyond_u64 = Felt::from(u128::from(u64::MAX) + 1);
        let hello = Felt::from_hex_unchecked("0x68656c6c6f");
        let data = [beyond_u64, hello, Felt::from(5u64)];
        assert!(decode_byte_array(&data).is_err());

        let data = [Felt::from(u128::MAX), Felt::ZERO, Felt::ZERO];
        assert!(decode_byte_array(&data).is_err());
    }

    #[test]
    fn test_huge_pending_len_is_error() {
        let hello = Felt::from_hex_unchecked("0x68656c6c6f");
        assert!(matches!(
            decode_byte_array(&[Felt::ZERO, hello, Felt::from(u128::MAX)]),
            Err(CairoDecodeError::Overflow(_, _))
        ));
    }
}
