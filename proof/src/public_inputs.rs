//! Public-input vector of the allocation proof.
//!
//! Wire layout, one 32-byte big-endian word each:
//!
//! | word | meaning |
//! |------|---------|
//! | 0 | validity flag emitted by the circuit (0 or 1) |
//! | 1 | commitment hash |
//! | 2 | commitment hash, echoed |
//! | 3 | allocating member index |
//! | 4 | member count |

use allot_types::CommitmentHash;
use serde::{Deserialize, Serialize};

use crate::error::PublicInputError;

/// One public-input field element, big-endian.
pub type Word = [u8; 32];

/// Number of words in the encoded vector.
pub const PUBLIC_INPUT_WORDS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    pub valid: bool,
    pub commitment: CommitmentHash,
    pub commitment_echo: CommitmentHash,
    pub member_index: u32,
    pub member_count: u32,
}

impl PublicInputs {
    /// The inputs a satisfied circuit emits for this statement.
    pub fn new(commitment: CommitmentHash, member_index: u32, member_count: u32) -> Self {
        Self {
            valid: true,
            commitment,
            commitment_echo: commitment,
            member_index,
            member_count,
        }
    }

    pub fn to_words(&self) -> [Word; PUBLIC_INPUT_WORDS] {
        [
            u32_word(self.valid as u32),
            *self.commitment.as_bytes(),
            *self.commitment_echo.as_bytes(),
            u32_word(self.member_index),
            u32_word(self.member_count),
        ]
    }

    pub fn from_words(words: &[Word]) -> Result<Self, PublicInputError> {
        if words.len() != PUBLIC_INPUT_WORDS {
            return Err(PublicInputError::WrongLength {
                expected: PUBLIC_INPUT_WORDS,
                got: words.len(),
            });
        }
        let valid = match word_u32(&words[0], 0)? {
            0 => false,
            1 => true,
            _ => return Err(PublicInputError::NonBooleanValidity),
        };
        Ok(Self {
            valid,
            commitment: CommitmentHash::new(words[1]),
            commitment_echo: CommitmentHash::new(words[2]),
            member_index: word_u32(&words[3], 3)?,
            member_count: word_u32(&words[4], 4)?,
        })
    }

    /// Flat byte encoding of [`Self::to_words`], as hashed by provers.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words().concat()
    }
}

fn u32_word(value: u32) -> Word {
    let mut word = [0u8; 32];
    word[28..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_u32(word: &Word, position: usize) -> Result<u32, PublicInputError> {
    if word[..28].iter().any(|&b| b != 0) {
        return Err(PublicInputError::WordOverflow { position });
    }
    let mut tail = [0u8; 4];
    tail.copy_from_slice(&word[28..]);
    Ok(u32::from_be_bytes(tail))
}
