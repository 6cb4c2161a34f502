//! Context budget calculation
//!
//! Turns the static model profile plus the turn's scenario (combat or not)
//! into the numeric plan every other stage obeys: how many tokens the prompt
//! may consume, how many are reserved for output, and how much the truncation
//! stage may hand the provider.
//!
//! Two different windows are in play and must never be conflated:
//!
//! - The **truncation budget** may be bounded by [`COMPACTION_CEILING`] for
//!   very-large-window models, so history does not balloon without bound.
//! - The **output ceiling** is always computed from the model's *true*
//!   context window. Using the compaction ceiling here starves output to
//!   ~1 token whenever the prompt exceeds the ceiling while the true window
//!   still has ample headroom.

pub mod estimator;

pub use estimator::{count_with_adapter, estimate_tokens, CharEstimator, TokenEstimator};

use crate::error::{Result, TurnError};
use crate::models::ModelProfile;

/// Fraction of the nominal context window treated as usable.
///
/// The rest absorbs estimation error between the chars/4 heuristic and the
/// provider's real tokenizer.
pub const SAFETY_RATIO: f64 = 0.9;

/// Fraction of the safe budget reserved for model output.
pub const OUTPUT_RATIO: f64 = 0.2;

/// Minimum output reserve during combat or other complex scenes, which
/// produce long structured replies regardless of input size.
pub const FIXED_COMBAT_RESERVE: u64 = 8_192;

/// Floor on the output ceiling once input fits the budget.
pub const MIN_OUTPUT_RESERVE: u64 = 1_024;

/// Tokens held back for the tiered entity payload, subtracted before
/// truncation ever runs. The tiering bound (ACTIVE_MAX + PRESENT_MAX trimmed
/// entries) must stay under this.
pub const ENTITY_RESERVE: u64 = 1_600;

/// Truncation-side bound for very-large-window models.
///
/// Bounds how much history we ever send, not how much output the model may
/// produce. Never use this in [`BudgetCalculator::compute_output_limit`].
pub const COMPACTION_CEILING: u64 = 300_000;

/// The per-turn token plan.
///
/// Recomputed every turn and never cached: the provider or model may change
/// between turns (user preference edits, fallback hops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPlan {
    /// Usable window for truncation purposes (safety ratio applied, possibly
    /// bounded by the compaction ceiling)
    pub safe_token_budget: u64,
    /// Tokens reserved for the model's reply
    pub output_reserve: u64,
    /// `safe_token_budget − output_reserve`
    pub max_input_allowed: u64,
}

impl BudgetPlan {
    /// Budget available to story history after the fixed entity reserve.
    ///
    /// This is what the truncation stage receives; all fixed reserves are
    /// subtracted before truncation runs, never added after.
    pub fn history_budget(&self) -> u64 {
        self.max_input_allowed.saturating_sub(ENTITY_RESERVE)
    }
}

/// Computes per-turn budget plans and output ceilings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetCalculator;

impl BudgetCalculator {
    /// Compute the truncation-facing budget plan for a model.
    ///
    /// `is_combat_or_complex` widens the output reserve to
    /// [`FIXED_COMBAT_RESERVE`] when the ratio-based reserve is smaller.
    ///
    /// # Example
    /// ```
    /// use turnforge::budget::BudgetCalculator;
    /// use turnforge::models::profile_or_default;
    ///
    /// let profile = profile_or_default("gpt-4o");
    /// let plan = BudgetCalculator.compute(&profile, false);
    /// assert_eq!(plan.max_input_allowed, plan.safe_token_budget - plan.output_reserve);
    /// ```
    pub fn compute(&self, profile: &ModelProfile, is_combat_or_complex: bool) -> BudgetPlan {
        let safe = (profile.context_window_tokens as f64 * SAFETY_RATIO).floor() as u64;
        // Truncation-side bound only. Models with windows at or under the
        // ceiling are unaffected by the min.
        let safe_token_budget = safe.min(COMPACTION_CEILING);

        let ratio_reserve = (safe_token_budget as f64 * OUTPUT_RATIO).floor() as u64;
        let output_reserve = if is_combat_or_complex {
            ratio_reserve.max(FIXED_COMBAT_RESERVE)
        } else {
            ratio_reserve
        };

        BudgetPlan {
            safe_token_budget,
            output_reserve,
            max_input_allowed: safe_token_budget.saturating_sub(output_reserve),
        }
    }

    /// Compute the output-token ceiling for an already-assembled prompt.
    ///
    /// Always measured against the model's **true** context window. Raises
    /// [`TurnError::ContextTooLarge`] when the prompt plus system text exceed
    /// what truncation should have guaranteed; otherwise the ceiling is
    /// `min(requested_cap, model cap, max(remaining, MIN_OUTPUT_RESERVE))`,
    /// independent of input size while input fits the budget.
    pub fn compute_output_limit(
        &self,
        profile: &ModelProfile,
        prompt_tokens: u64,
        system_tokens: u64,
        requested_cap: u64,
    ) -> Result<u64> {
        let safe_context = (profile.context_window_tokens as f64 * SAFETY_RATIO).floor() as u64;
        let output_reserve = (safe_context as f64 * OUTPUT_RATIO).floor() as u64;
        let max_input_allowed = safe_context.saturating_sub(output_reserve);

        let input = prompt_tokens + system_tokens;
        if input > max_input_allowed {
            return Err(TurnError::ContextTooLarge {
                prompt_tokens: input,
                completion_tokens: 0,
                finish_reason: "input exceeds budget".into(),
            });
        }

        let remaining = safe_context - input;
        Ok(requested_cap
            .min(profile.max_output_tokens_cap)
            .min(remaining.max(MIN_OUTPUT_RESERVE)))
    }
}
