//! Room configuration and status state machine.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sentence used when no pool is configured. Matches the browser client.
pub const DEFAULT_SENTENCE: &str = "The quick brown fox jumps over the lazy dog.";

/// Ten short sentences for quick races. Loaded by [`RoomConfig::classic`].
pub const CLASSIC_SENTENCES: [&str; 10] = [
    "The quick brown fox jumps over the lazy dog",
    "Discord API is fun",
    "Golang is fast",
    "Speed typing is challenging",
    "Practice makes perfect",
    "Code with confidence",
    "Discord bots are awesome",
    "Go routines are powerful",
    "Clean code matters",
    "Type fast and accurate",
];

/// Smallest usable outbox: a join enqueues `Joined` and `PlayerJoined`
/// before the writer has started draining.
pub const MIN_OUTBOX_CAPACITY: usize = 2;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Frames a player's outbox can hold before the player is evicted.
    pub outbox_capacity: usize,

    /// Candidate target sentences. A new room draws one at random.
    pub sentences: Vec<String>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 64,
            sentences: vec![DEFAULT_SENTENCE.to_string()],
        }
    }
}

impl RoomConfig {
    /// Default settings with the ten classic sentences as the pool.
    pub fn classic() -> Self {
        Self {
            sentences: CLASSIC_SENTENCES.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Outbox capacity, never below [`MIN_OUTBOX_CAPACITY`].
    pub fn effective_outbox_capacity(&self) -> usize {
        self.outbox_capacity.max(MIN_OUTBOX_CAPACITY)
    }

    /// Draws a target sentence for a new room.
    pub fn pick_sentence(&self) -> String {
        match self.sentences.len() {
            0 => DEFAULT_SENTENCE.to_string(),
            1 => self.sentences[0].clone(),
            n => self.sentences[rand::rng().random_range(0..n)].clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a room.
///
/// ```text
/// Waiting → Playing → Finished
/// ```
///
/// - **Waiting**: room exists, players gather.
/// - **Playing**: someone sent `StartGame`; the sentence is out.
/// - **Finished**: someone reported completion. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns the status that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal single step.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Playing => write!(f, "Playing"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
