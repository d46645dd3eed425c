//! Protection state and the desired-state cell

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Whether the task is protected from scale-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionState {
    /// Protection lease held
    Protected,
    /// No protection lease
    Unprotected,
}

impl ProtectionState {
    /// Whether this is the protected state
    pub fn is_protected(self) -> bool {
        matches!(self, ProtectionState::Protected)
    }

    fn bit(self) -> u64 {
        match self {
            ProtectionState::Protected => 1,
            ProtectionState::Unprotected => 0,
        }
    }

    fn from_bit(bit: u64) -> Self {
        if bit & 1 == 1 {
            ProtectionState::Protected
        } else {
            ProtectionState::Unprotected
        }
    }
}

impl fmt::Display for ProtectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtectionState::Protected => write!(f, "protected"),
            ProtectionState::Unprotected => write!(f, "unprotected"),
        }
    }
}

/// A desired state together with the generation of the write that set it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Desired {
    /// Wanted state
    pub state: ProtectionState,
    /// Monotonic write counter
    pub generation: u64,
}

/// Lock-free last-write-wins cell for the desired state.
///
/// State and generation share one word, so readers never see a state paired
/// with another write's generation.
#[derive(Debug)]
pub(crate) struct DesiredCell {
    word: AtomicU64,
}

impl DesiredCell {
    pub(crate) fn new(state: ProtectionState) -> Self {
        Self {
            word: AtomicU64::new(state.bit()),
        }
    }

    /// Record a new desired state and return its generation
    pub(crate) fn set(&self, state: ProtectionState) -> u64 {
        let previous = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some((((word >> 1) + 1) << 1) | state.bit())
            })
            .unwrap_or_else(|word| word);
        (previous >> 1) + 1
    }

    pub(crate) fn get(&self) -> Desired {
        let word = self.word.load(Ordering::Acquire);
        Desired {
            state: ProtectionState::from_bit(word),
            generation: word >> 1,
        }
    }
}
