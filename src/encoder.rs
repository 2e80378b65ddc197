//! Symbol encoder — turns input text into the units that get sonified.

use serde::{Deserialize, Serialize};

use crate::config::{CodePointPolicy, EncodingMode, MAX_CODE_POINT};
use crate::error::{Result, TalkwireError};

/// Bits per encoded character.
pub const BITS_PER_CHAR: usize = 8;

/// Lexical class of a character; selects the class-tone band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexicalClass {
    Upper,
    Lower,
    Digit,
    Other,
}

impl LexicalClass {
    pub fn of(ch: char) -> Self {
        if ch.is_ascii_uppercase() {
            LexicalClass::Upper
        } else if ch.is_ascii_lowercase() {
            LexicalClass::Lower
        } else if ch.is_ascii_digit() {
            LexicalClass::Digit
        } else {
            LexicalClass::Other
        }
    }
}

/// One encoded unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbol {
    /// A single binary digit of a character's 8-bit code, MSB first.
    Bit { bit: bool, char_index: usize },
    /// A whole character.
    Char {
        code_point: u8,
        class: LexicalClass,
        char_index: usize,
    },
}

impl Symbol {
    /// Index of the input character this symbol came from.
    pub fn char_index(&self) -> usize {
        match *self {
            Symbol::Bit { char_index, .. } | Symbol::Char { char_index, .. } => char_index,
        }
    }
}

/// Number of symbols each character expands to.
pub fn symbols_per_char(mode: EncodingMode) -> usize {
    match mode {
        EncodingMode::Bit => BITS_PER_CHAR,
        EncodingMode::Char => 1,
    }
}

/// Encode `text` into an ordered symbol sequence.
///
/// Empty text encodes to an empty sequence; callers reject empty input
/// before getting here.
pub fn encode(text: &str, mode: EncodingMode, policy: CodePointPolicy) -> Result<Vec<Symbol>> {
    let mut symbols = Vec::with_capacity(text.len() * symbols_per_char(mode));

    for (char_index, ch) in text.chars().enumerate() {
        let code_point = code_point_of(ch, char_index, policy)?;
        match mode {
            EncodingMode::Bit => {
                symbols.extend(bits_msb_first(code_point).map(|bit| Symbol::Bit { bit, char_index }));
            }
            EncodingMode::Char => symbols.push(Symbol::Char {
                code_point,
                class: LexicalClass::of(ch),
                char_index,
            }),
        }
    }

    Ok(symbols)
}

/// Apply the code-point policy to a single character.
pub fn code_point_of(ch: char, index: usize, policy: CodePointPolicy) -> Result<u8> {
    let cp = ch as u32;
    if cp <= MAX_CODE_POINT {
        return Ok(cp as u8);
    }
    match policy {
        CodePointPolicy::Reject => Err(TalkwireError::UnsupportedCodePoint { ch, index }),
        CodePointPolicy::Wrap => Ok((cp % (MAX_CODE_POINT + 1)) as u8),
    }
}

/// The eight bits of `byte`, most significant first.
pub fn bits_msb_first(byte: u8) -> impl Iterator<Item = bool> {
    (0..BITS_PER_CHAR).rev().map(move |shift| (byte >> shift) & 1 == 1)
}

/// Render bit symbols back into a `0`/`1` string. Char symbols contribute
/// their full 8-bit code.
pub fn to_bit_string(symbols: &[Symbol]) -> String {
    let mut out = String::with_capacity(symbols.len());
    for symbol in symbols {
        match *symbol {
            Symbol::Bit { bit, .. } => out.push(if bit { '1' } else { '0' }),
            Symbol::Char { code_point, .. } => {
                out.extend(bits_msb_first(code_point).map(|b| if b { '1' } else { '0' }));
            }
        }
    }
    out
}
