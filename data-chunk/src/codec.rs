//! Value codec.
//!
//! Each value is encoded as a flag byte followed by the payload. The encoding is
//! deterministic and memory comparable within the same type: comparing two encoded
//! values byte by byte gives the same result as comparing the values. Therefore,
//! the concatenation of the encoded values can be used as a key directly.
//!
//! | Type    | Flag   | Payload                                                    |
//! |---------|--------|------------------------------------------------------------|
//! | Null    | `0x00` | Empty                                                      |
//! | Boolean | `0x01` | 1 byte, `0` or `1`                                         |
//! | Int64   | `0x03` | 8 bytes big endian, sign bit flipped                       |
//! | UInt64  | `0x04` | 8 bytes big endian                                         |
//! | Float64 | `0x05` | 8 bytes big endian, see [`encode_f64`]                     |
//! | String  | `0x06` | Bytes in memory comparable groups, see [`encode_bytes`]    |
//! | Binary  | `0x07` | Bytes in memory comparable groups, see [`encode_bytes`]    |

use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::datum::{Datum, DatumRef, normalize_f64};

/// Flag of the null
pub const NIL_FLAG: u8 = 0x00;
/// Flag of the boolean
pub const BOOL_FLAG: u8 = 0x01;
/// Flag of the signed integer
pub const INT_FLAG: u8 = 0x03;
/// Flag of the unsigned integer
pub const UINT_FLAG: u8 = 0x04;
/// Flag of the float
pub const FLOAT_FLAG: u8 = 0x05;
/// Flag of the string
pub const STRING_FLAG: u8 = 0x06;
/// Flag of the binary
pub const BYTES_FLAG: u8 = 0x07;

const SIGN_MASK: u64 = 0x8000_0000_0000_0000;
const ENC_GROUP_SIZE: usize = 8;
const ENC_MARKER: u8 = 0xFF;
const ENC_PAD: u8 = 0x00;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum CodecError {
    #[snafu(display("Can not decode value from empty bytes"))]
    EmptyInput,
    #[snafu(display("Unknown flag `{flag:#04x}`"))]
    UnknownFlag { flag: u8 },
    #[snafu(display(
        "Value with flag `{flag:#04x}` is truncated, expect at least {expect} bytes, found {actual} bytes"
    ))]
    Truncated {
        flag: u8,
        expect: usize,
        actual: usize,
    },
    #[snafu(display("Invalid boolean byte `{byte}`"))]
    InvalidBoolean { byte: u8 },
    #[snafu(display("Invalid group marker `{marker:#04x}` in the encoded bytes"))]
    InvalidMarker { marker: u8 },
    #[snafu(display("Padding bytes in the encoded bytes group should be zero"))]
    InvalidPadding,
    #[snafu(display("Decoded string is not valid utf-8"))]
    InvalidUtf8 { source: std::string::FromUtf8Error },
    #[snafu(display("{remain} bytes are left after decoding the value"))]
    TrailingBytes { remain: usize },
}

type Result<T> = std::result::Result<T, CodecError>;

/// Encode the datum and append it to the buf
pub fn encode_value(datum: DatumRef<'_>, buf: &mut Vec<u8>) {
    match datum {
        DatumRef::Null => buf.push(NIL_FLAG),
        DatumRef::Boolean(v) => {
            buf.push(BOOL_FLAG);
            buf.push(v as u8);
        }
        DatumRef::Int64(v) => {
            buf.push(INT_FLAG);
            buf.extend_from_slice(&encode_i64(v).to_be_bytes());
        }
        DatumRef::UInt64(v) => {
            buf.push(UINT_FLAG);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        DatumRef::Float64(v) => {
            buf.push(FLOAT_FLAG);
            buf.extend_from_slice(&encode_f64(v).to_be_bytes());
        }
        DatumRef::String(v) => {
            buf.push(STRING_FLAG);
            encode_bytes(v.as_bytes(), buf);
        }
        DatumRef::Binary(v) => {
            buf.push(BYTES_FLAG);
            encode_bytes(v, buf);
        }
    }
}

/// Decode a value from the front of the bytes, returns the value and the remaining bytes
pub fn decode_value(bytes: &[u8]) -> Result<(Datum, &[u8])> {
    let (&flag, payload) = bytes.split_first().context(EmptyInputSnafu)?;
    match flag {
        NIL_FLAG => Ok((Datum::Null, payload)),
        BOOL_FLAG => {
            let (&byte, rest) = payload.split_first().context(TruncatedSnafu {
                flag,
                expect: 1_usize,
                actual: 0_usize,
            })?;
            let v = match byte {
                0 => false,
                1 => true,
                _ => return InvalidBooleanSnafu { byte }.fail(),
            };
            Ok((Datum::Boolean(v), rest))
        }
        INT_FLAG => {
            let (v, rest) = decode_u64(flag, payload)?;
            Ok((Datum::Int64(decode_i64(v)), rest))
        }
        UINT_FLAG => {
            let (v, rest) = decode_u64(flag, payload)?;
            Ok((Datum::UInt64(v), rest))
        }
        FLOAT_FLAG => {
            let (v, rest) = decode_u64(flag, payload)?;
            Ok((Datum::Float64(decode_f64(v)), rest))
        }
        STRING_FLAG => {
            let (v, rest) = decode_bytes(flag, payload)?;
            let v = String::from_utf8(v).context(InvalidUtf8Snafu)?;
            Ok((Datum::String(v), rest))
        }
        BYTES_FLAG => {
            let (v, rest) = decode_bytes(flag, payload)?;
            Ok((Datum::Binary(v), rest))
        }
        _ => UnknownFlagSnafu { flag }.fail(),
    }
}

/// Decode exactly one value, the bytes should not contain anything else
pub fn decode_one(bytes: &[u8]) -> Result<Datum> {
    let (datum, rest) = decode_value(bytes)?;
    ensure!(rest.is_empty(), TrailingBytesSnafu { remain: rest.len() });
    Ok(datum)
}

#[inline]
fn encode_i64(v: i64) -> u64 {
    (v as u64) ^ SIGN_MASK
}

#[inline]
fn decode_i64(v: u64) -> i64 {
    (v ^ SIGN_MASK) as i64
}

/// Encode the float into an u64 whose big endian bytes preserve the order of the
/// floats. Positive floats flip the sign bit, negative floats flip all of the bits.
/// `-0.0` and `NaN` are normalized before encoding, such that equal floats in the
/// group by semantic always have same encoding
#[inline]
pub fn encode_f64(v: f64) -> u64 {
    let bits = normalize_f64(v).to_bits();
    if bits & SIGN_MASK == 0 {
        bits | SIGN_MASK
    } else {
        !bits
    }
}

#[inline]
fn decode_f64(v: u64) -> f64 {
    let bits = if v & SIGN_MASK != 0 { v & !SIGN_MASK } else { !v };
    f64::from_bits(bits)
}

fn decode_u64(flag: u8, payload: &[u8]) -> Result<(u64, &[u8])> {
    ensure!(
        payload.len() >= 8,
        TruncatedSnafu {
            flag,
            expect: 8_usize,
            actual: payload.len()
        }
    );
    let (bytes, rest) = payload.split_at(8);
    let mut buf = [0; 8];
    buf.copy_from_slice(bytes);
    Ok((u64::from_be_bytes(buf), rest))
}

/// Encode the bytes in memory comparable format: the bytes are split into groups of 8
/// bytes, the last group is padded with `0x00`. Each group is followed by a marker
/// `0xFF - pad_count`. An empty group is appended if the length is multiple of 8
pub fn encode_bytes(data: &[u8], buf: &mut Vec<u8>) {
    let len = data.len();
    buf.reserve((len / ENC_GROUP_SIZE + 1) * (ENC_GROUP_SIZE + 1));
    let mut index = 0;
    while index <= len {
        let remain = len - index;
        let pad_count = if remain >= ENC_GROUP_SIZE {
            buf.extend_from_slice(&data[index..index + ENC_GROUP_SIZE]);
            0
        } else {
            buf.extend_from_slice(&data[index..]);
            let pad_count = ENC_GROUP_SIZE - remain;
            buf.extend(std::iter::repeat_n(ENC_PAD, pad_count));
            pad_count
        };
        buf.push(ENC_MARKER - pad_count as u8);
        index += ENC_GROUP_SIZE;
    }
}

fn decode_bytes(flag: u8, mut payload: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    let mut data = Vec::new();
    loop {
        ensure!(
            payload.len() > ENC_GROUP_SIZE,
            TruncatedSnafu {
                flag,
                expect: ENC_GROUP_SIZE + 1,
                actual: payload.len()
            }
        );
        let (group, rest) = payload.split_at(ENC_GROUP_SIZE + 1);
        payload = rest;
        let marker = group[ENC_GROUP_SIZE];
        let pad_count = (ENC_MARKER - marker) as usize;
        ensure!(pad_count <= ENC_GROUP_SIZE, InvalidMarkerSnafu { marker });

        let real_size = ENC_GROUP_SIZE - pad_count;
        data.extend_from_slice(&group[..real_size]);
        if pad_count != 0 {
            ensure!(
                group[real_size..ENC_GROUP_SIZE]
                    .iter()
                    .all(|&byte| byte == ENC_PAD),
                InvalidPaddingSnafu
            );
            return Ok((data, payload));
        }
    }
}
