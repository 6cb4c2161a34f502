//! Entity tiering engine
//!
//! A long campaign accumulates an unbounded roster of named entities, but the
//! prompt can only carry a bounded payload. Tiering classifies the roster
//! against recent story turns and the player's location:
//!
//! - **Active**: mentioned in the lookback window, kept with full detail.
//! - **Present**: unmentioned but co-located, kept as name/role stubs.
//! - **Dormant**: everything else, excluded from the payload entirely.
//!
//! The payload is bounded by `ACTIVE_MAX + PRESENT_MAX` entries regardless of
//! roster size, which keeps it under the fixed entity reserve the budget
//! subtracts before truncation.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::story::Turn;

/// How many recent turns to scan for entity mentions.
pub const LOOKBACK_TURNS: usize = 5;

/// Maximum entities in the active tier.
pub const ACTIVE_MAX: usize = 6;

/// Maximum entities in the present tier.
pub const PRESENT_MAX: usize = 6;

/// A read-only entity as tracked by the game state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Display name, also the mention-match key
    pub name: String,
    /// Narrative role (e.g. "innkeeper", "antagonist")
    pub role: String,
    /// Disposition toward the player
    pub attitude: String,
    /// Free-form status (e.g. "wounded", "sleeping")
    pub status: String,
    /// Current hit points
    pub hp_current: i32,
    /// Maximum hit points
    pub hp_max: i32,
    /// Where the entity currently is
    pub location: String,
}

/// Tier assigned to an entity for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Recently mentioned; full detail
    Active,
    /// Co-located but unmentioned; name and role only
    Present,
    /// Excluded from the payload
    Dormant,
}

/// An entity reduced to the fields its tier carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrimmedEntity {
    /// Entity name (all tiers)
    pub name: String,
    /// Entity role (all tiers)
    pub role: String,
    /// Attitude (active only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attitude: Option<String>,
    /// Status (active only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// "current/max" hit points (active only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<String>,
    /// Location (active only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// The bounded entity payload sent with each turn.
///
/// Recomputed every turn, never persisted. Dormant entities do not appear.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TieredEntityPayload {
    /// Full-detail entities, most recently mentioned first
    pub active_entities: Vec<TrimmedEntity>,
    /// Co-located stubs in roster order
    pub present_entities: Vec<TrimmedEntity>,
}

impl TieredEntityPayload {
    /// Total entries in the payload.
    pub fn len(&self) -> usize {
        self.active_entities.len() + self.present_entities.len()
    }

    /// Whether the payload carries no entities.
    pub fn is_empty(&self) -> bool {
        self.active_entities.is_empty() && self.present_entities.is_empty()
    }
}

/// Classification result keeping full records per tier.
#[derive(Debug, Clone, Default)]
pub struct TieredRoster {
    /// Top `ACTIVE_MAX` by descending recency, ties broken by roster order
    pub active: Vec<EntityRecord>,
    /// Co-located remainder capped at `PRESENT_MAX`, roster order
    pub present: Vec<EntityRecord>,
    /// Everything else
    pub dormant: Vec<EntityRecord>,
}

/// Classifies a roster into bounded tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityTieringEngine;

impl EntityTieringEngine {
    /// Classify `roster` against the last [`LOOKBACK_TURNS`] turns and the
    /// current location.
    pub fn tier(
        &self,
        roster: &[EntityRecord],
        recent_turns: &[Turn],
        current_location: &str,
    ) -> TieredRoster {
        let window_start = recent_turns.len().saturating_sub(LOOKBACK_TURNS);
        let window = &recent_turns[window_start..];

        // (roster index, recency score). Score is the index of the most
        // recent whole-word match inside the window; higher is fresher.
        let mut scored: Vec<(usize, usize)> = Vec::new();
        for (idx, entity) in roster.iter().enumerate() {
            if let Some(score) = mention_recency(&entity.name, window) {
                scored.push((idx, score));
            }
        }
        // Descending recency; stable sort keeps roster order for ties.
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(ACTIVE_MAX);

        let active_indices: Vec<usize> = scored.iter().map(|&(idx, _)| idx).collect();
        let active: Vec<EntityRecord> = active_indices
            .iter()
            .map(|&idx| roster[idx].clone())
            .collect();

        let location = normalize_location(current_location);
        let mut present = Vec::new();
        let mut dormant = Vec::new();
        for (idx, entity) in roster.iter().enumerate() {
            if active_indices.contains(&idx) {
                continue;
            }
            if present.len() < PRESENT_MAX && normalize_location(&entity.location) == location {
                present.push(entity.clone());
            } else {
                dormant.push(entity.clone());
            }
        }

        TieredRoster {
            active,
            present,
            dormant,
        }
    }

    /// Reduce an entity to the fields its tier carries.
    ///
    /// Dormant entities trim to a bare name/role stub, but callers never put
    /// them in a payload.
    pub fn trim(&self, entity: &EntityRecord, tier: Tier) -> TrimmedEntity {
        match tier {
            Tier::Active => TrimmedEntity {
                name: entity.name.clone(),
                role: entity.role.clone(),
                attitude: Some(entity.attitude.clone()),
                status: Some(entity.status.clone()),
                hp: Some(format!("{}/{}", entity.hp_current, entity.hp_max)),
                location: Some(entity.location.clone()),
            },
            Tier::Present | Tier::Dormant => TrimmedEntity {
                name: entity.name.clone(),
                role: entity.role.clone(),
                attitude: None,
                status: None,
                hp: None,
                location: None,
            },
        }
    }

    /// Full pipeline: classify, trim, and assemble the outgoing payload.
    pub fn payload(
        &self,
        roster: &[EntityRecord],
        recent_turns: &[Turn],
        current_location: &str,
    ) -> TieredEntityPayload {
        let tiers = self.tier(roster, recent_turns, current_location);
        TieredEntityPayload {
            active_entities: tiers
                .active
                .iter()
                .map(|e| self.trim(e, Tier::Active))
                .collect(),
            present_entities: tiers
                .present
                .iter()
                .map(|e| self.trim(e, Tier::Present))
                .collect(),
        }
    }
}

/// Recency score for a name within a turn window: the index of the most
/// recent turn containing a whole-word, case-insensitive match.
///
/// Word-boundary matched, so "King" never matches "Kingsley". Names that
/// fail to compile as a pattern (or are empty) simply never match.
fn mention_recency(name: &str, window: &[Turn]) -> Option<usize> {
    if name.trim().is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    window
        .iter()
        .enumerate()
        .rev()
        .find(|(_, turn)| re.is_match(&turn.text))
        .map(|(i, _)| i)
}

/// Trimmed, case-folded location comparison key.
fn normalize_location(location: &str) -> String {
    location.trim().to_lowercase()
}
