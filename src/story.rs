//! Story history types
//!
//! This module defines the core types for story history: turns, actors, and
//! helpers for measuring and rendering a turn list. A `Turn` is immutable
//! once created; the ordered `Vec<Turn>` is the story history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The author of a story turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// The human player's action or dialogue
    Player,
    /// The model's narration
    Narrator,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Player => write!(f, "player"),
            Actor::Narrator => write!(f, "narrator"),
        }
    }
}

/// A single entry in the story history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn
    pub actor: Actor,
    /// The turn text
    pub text: String,
    /// Monotonic position in the story
    pub sequence_id: u64,
    /// When this turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new player turn.
    ///
    /// # Example
    /// ```
    /// use turnforge::story::{Actor, Turn};
    ///
    /// let turn = Turn::player(1, "I open the door.");
    /// assert_eq!(turn.actor, Actor::Player);
    /// ```
    pub fn player(sequence_id: u64, text: &str) -> Self {
        Self {
            actor: Actor::Player,
            text: text.to_string(),
            sequence_id,
            timestamp: Utc::now(),
        }
    }

    /// Create a new narrator turn.
    pub fn narrator(sequence_id: u64, text: &str) -> Self {
        Self {
            actor: Actor::Narrator,
            text: text.to_string(),
            sequence_id,
            timestamp: Utc::now(),
        }
    }

    /// Character length of the turn text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Total character count across a turn list.
///
/// This is the measure the truncation passes shrink against.
pub fn total_chars(turns: &[Turn]) -> usize {
    turns.iter().map(Turn::char_len).sum()
}

/// Render a turn list as a labeled transcript for a provider prompt.
///
/// # Example
/// ```
/// use turnforge::story::{render_transcript, Turn};
///
/// let turns = vec![Turn::player(1, "Hello"), Turn::narrator(2, "A voice answers.")];
/// let text = render_transcript(&turns);
/// assert!(text.contains("player: Hello"));
/// assert!(text.contains("narrator: A voice answers."));
/// ```
pub fn render_transcript(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(&format!("{}: {}\n", turn.actor, turn.text));
    }
    out
}
