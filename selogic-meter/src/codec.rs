use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

pub use tokio_modbus::{Address, Quantity};

/// 16-bit value stored in Modbus register.
pub type Word = u16;

/// Order of the two 16-bit halves of a 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrder {
    /// First register holds the high-order half.
    #[default]
    Big,
    /// First register holds the low-order half.
    Little,
}

/// Target type of a register decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Float32,
    Int16,
    Int32,
    Text,
}

impl DataType {
    /// Number of registers one scalar of this type occupies.
    pub fn width(self) -> usize {
        match self {
            DataType::Int16 | DataType::Text => 1,
            DataType::Float32 | DataType::Int32 => 2,
        }
    }
}

/// A scalar produced by [`decode_registers`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Float32(f32),
    IntegerSigned(i64),
    Text(String),
}

/// Decode a value from `Word`s in the given word order.
pub trait Decode: Sized {
    /// Number of registers consumed.
    const WIDTH: usize;

    fn from_words(words: &[Word], order: WordOrder) -> Result<Self, DecodeError>;

    fn from_be_words(words: &[Word]) -> Result<Self, DecodeError> {
        Self::from_words(words, WordOrder::Big)
    }

    fn from_le_words(words: &[Word]) -> Result<Self, DecodeError> {
        Self::from_words(words, WordOrder::Little)
    }
}

macro_rules! impl_decode {
    ($num_type:ty) => {
        impl Decode for $num_type {
            const WIDTH: usize = std::mem::size_of::<$num_type>() / 2;

            fn from_words(words: &[Word], order: WordOrder) -> Result<Self, DecodeError> {
                if words.len() != Self::WIDTH {
                    return Err(DecodeError::LengthMismatch {
                        width: Self::WIDTH,
                        actual: words.len(),
                    });
                }
                let mut ordered = words.to_vec();
                if order == WordOrder::Little {
                    ordered.reverse();
                }
                let bytes = ordered
                    .into_iter()
                    .flat_map(u16::to_be_bytes)
                    .collect::<Vec<u8>>();
                let array = bytes.try_into().map_err(|_| DecodeError::LengthMismatch {
                    width: Self::WIDTH,
                    actual: words.len(),
                })?;
                Ok(<$num_type>::from_be_bytes(array))
            }
        }
    };
}

impl_decode!(i16);
impl_decode!(i32);
impl_decode!(u16);
impl_decode!(u32);
impl_decode!(f32);

/// Encode a value into `Word`s in the given word order.
pub trait Encode {
    fn to_words(self, order: WordOrder) -> Vec<Word>;

    fn to_be_words(self) -> Vec<Word>
    where
        Self: Sized,
    {
        self.to_words(WordOrder::Big)
    }
}

macro_rules! impl_encode {
    ($num_type:ty) => {
        impl Encode for $num_type {
            fn to_words(self, order: WordOrder) -> Vec<Word> {
                let mut words: Vec<Word> = self
                    .to_be_bytes()
                    .chunks_exact(2)
                    .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                    .collect();
                if order == WordOrder::Little {
                    words.reverse();
                }
                words
            }
        }
    };
}

impl_encode!(i16);
impl_encode!(i32);
impl_encode!(u16);
impl_encode!(u32);
impl_encode!(f32);

/// Decode a whole register block into scalars of `ty`.
///
/// `Text` yields a single string; every other type yields one scalar per
/// `ty.width()` registers. The block length must be a multiple of the width.
pub fn decode_registers(
    words: &[Word],
    ty: DataType,
    order: WordOrder,
) -> Result<Vec<DecodedValue>, DecodeError> {
    let width = ty.width();
    if words.len() % width != 0 {
        return Err(DecodeError::LengthMismatch {
            width,
            actual: words.len(),
        });
    }

    match ty {
        DataType::Text => Ok(vec![DecodedValue::Text(decode_text(words))]),
        DataType::Float32 => words
            .chunks_exact(width)
            .map(|chunk| f32::from_words(chunk, order).map(DecodedValue::Float32))
            .collect(),
        DataType::Int16 => words
            .chunks_exact(width)
            .map(|chunk| i16::from_words(chunk, order).map(|v| DecodedValue::IntegerSigned(v.into())))
            .collect(),
        DataType::Int32 => words
            .chunks_exact(width)
            .map(|chunk| i32::from_words(chunk, order).map(|v| DecodedValue::IntegerSigned(v.into())))
            .collect(),
    }
}

/// Decode a block of consecutive `f32` values.
pub fn decode_f32s(words: &[Word], order: WordOrder) -> Result<Vec<f32>, DecodeError> {
    let width = <f32 as Decode>::WIDTH;
    if words.len() % width != 0 {
        return Err(DecodeError::LengthMismatch {
            width,
            actual: words.len(),
        });
    }
    words
        .chunks_exact(width)
        .map(|chunk| f32::from_words(chunk, order))
        .collect()
}

/// Decode a text block: two bytes per register, high byte first,
/// up to the first NUL byte, with surrounding whitespace trimmed.
pub fn decode_text(words: &[Word]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .copied()
        .flat_map(u16::to_be_bytes)
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Encode `text` into exactly `count` registers, NUL padded.
pub fn encode_text(text: &str, count: usize) -> Vec<Word> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(count * 2, 0);
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
