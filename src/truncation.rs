//! Story history truncation
//!
//! Reduces a turn list to fit a character/token budget while keeping the
//! opening and the most recent turns verbatim. The middle is shrunk
//! proportionally over a small number of passes.
//!
//! Each pass recomputes its shrink ratio from the **current** measured total,
//! then re-measures before deciding whether another pass is needed. Deriving
//! a pass's target from a stale total, or compounding ratios across passes
//! without re-measuring, shrinks the history far more aggressively than
//! intended; the regression tests below pin the correct arithmetic down.
//!
//! Truncation never errors. If the budget is still exceeded after
//! [`MAX_PASSES`], the best-effort result is returned as-is.

use tracing::debug;

use crate::budget::estimator::CHARS_PER_TOKEN;
use crate::story::{total_chars, Turn};

/// Maximum shrink passes before returning the best-effort result.
pub const MAX_PASSES: usize = 5;

/// Turns at the head of the history always kept verbatim (scene setup).
pub const KEEP_AT_START: usize = 2;

/// Turns at the tail always kept verbatim (immediate context).
pub const KEEP_AT_END: usize = 8;

/// Each pass shrinks over-budget turns to 70% of their proportional target,
/// so the loop converges inside the pass cap instead of asymptotically
/// chasing the budget one percent at a time.
const SHRINK_MARGIN: f64 = 0.7;

/// Shrinks turn histories to fit a budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncationEngine;

impl TruncationEngine {
    /// Reduce `turns` until the whole-list token estimate fits
    /// `max_chars / 4` tokens, keeping the first `keep_at_start` and last
    /// `keep_at_end` turns verbatim.
    ///
    /// Already-fitting histories (or histories no longer than the kept ends)
    /// are returned unchanged. Re-running with the same budget on an
    /// already-truncated result is a no-op.
    pub fn truncate(
        &self,
        turns: &[Turn],
        max_chars: usize,
        keep_at_start: usize,
        keep_at_end: usize,
    ) -> Vec<Turn> {
        // Fast path: nothing in the middle to shrink.
        if turns.len() <= keep_at_start + keep_at_end {
            return turns.to_vec();
        }

        let token_budget = (max_chars / CHARS_PER_TOKEN) as u64;
        let mut result: Vec<Turn> = turns.to_vec();

        for pass in 0..MAX_PASSES {
            let current_total = total_chars(&result);
            let estimate = (current_total / CHARS_PER_TOKEN) as u64;
            if estimate <= token_budget {
                return result;
            }

            // Ratio derives only from the immediately prior pass's measured
            // length, never the original total.
            let ratio = (max_chars as f64 / current_total as f64) * SHRINK_MARGIN;
            debug!(
                pass,
                current_total,
                max_chars,
                ratio,
                "Truncation pass shrinking middle turns"
            );

            let middle_end = result.len() - keep_at_end;
            for turn in &mut result[keep_at_start..middle_end] {
                let len = turn.char_len();
                let target = (len as f64 * ratio).floor() as usize;
                if target < len {
                    turn.text = turn.text.chars().take(target).collect();
                }
            }
        }

        // Still over budget at the cap: degrade gracefully.
        debug!(
            final_chars = total_chars(&result),
            max_chars, "Truncation hit pass cap, returning best effort"
        );
        result
    }

    /// Convenience wrapper using the default kept-end counts, with the
    /// budget given in tokens as the budget planner produces it.
    pub fn truncate_to_tokens(&self, turns: &[Turn], token_budget: u64) -> Vec<Turn> {
        let max_chars = (token_budget as usize).saturating_mul(CHARS_PER_TOKEN);
        self.truncate(turns, max_chars, KEEP_AT_START, KEEP_AT_END)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_of_len(seq: u64, len: usize) -> Turn {
        Turn::narrator(seq, &"x".repeat(len))
    }

    #[test]
    fn test_fast_path_returns_unchanged() {
        let turns: Vec<Turn> = (0..5).map(|i| turn_of_len(i, 1000)).collect();
        let out = TruncationEngine.truncate(&turns, 10, 2, 3);
        assert_eq!(out.len(), 5);
        assert_eq!(total_chars(&out), 5000);
    }

    #[test]
    fn test_within_budget_is_noop() {
        let turns: Vec<Turn> = (0..10).map(|i| turn_of_len(i, 100)).collect();
        let out = TruncationEngine.truncate(&turns, 4000, 2, 2);
        assert_eq!(total_chars(&out), 1000);
    }

    #[test]
    fn test_kept_ends_verbatim() {
        let mut turns: Vec<Turn> = vec![
            Turn::player(0, "opening scene"),
            Turn::narrator(1, "scene reply"),
        ];
        for i in 2..12 {
            turns.push(turn_of_len(i, 2000));
        }
        turns.push(Turn::player(12, "latest action"));

        let out = TruncationEngine.truncate(&turns, 4000, 2, 1);
        assert_eq!(out[0].text, "opening scene");
        assert_eq!(out[1].text, "scene reply");
        assert_eq!(out.last().unwrap().text, "latest action");
        assert!(total_chars(&out) < total_chars(&turns));
    }

    #[test]
    fn test_remeasure_lands_near_seven_hundred_tokens() {
        // Two 2000-char turns: ~1000 tokens. A 999-token budget forces a
        // shrink pass; the re-measure-from-current algorithm lands near 700
        // result tokens. A compounding-ratio implementation would land near
        // 350 — the assertion window rejects it.
        let turns = vec![turn_of_len(0, 2000), turn_of_len(1, 2000)];
        let out = TruncationEngine.truncate(&turns, 3996, 0, 0);

        let result_tokens = (total_chars(&out) / CHARS_PER_TOKEN) as u64;
        assert!(
            (600..=780).contains(&result_tokens),
            "expected ~700 tokens, got {}",
            result_tokens
        );
    }

    #[test]
    fn test_output_never_exceeds_input_estimate() {
        let turns: Vec<Turn> = (0..20).map(|i| turn_of_len(i, 500 + i as usize * 37)).collect();
        let before = (total_chars(&turns) / CHARS_PER_TOKEN) as u64;
        let out = TruncationEngine.truncate(&turns, 2000, 1, 1);
        let after = (total_chars(&out) / CHARS_PER_TOKEN) as u64;
        assert!(after <= before);
    }

    #[test]
    fn test_idempotent_under_same_budget() {
        let turns: Vec<Turn> = (0..10).map(|i| turn_of_len(i, 3000)).collect();
        let once = TruncationEngine.truncate(&turns, 16_000, 2, 2);
        // The first run converged within budget, so a second run under the
        // same budget must change nothing.
        let twice = TruncationEngine.truncate(&once, 16_000, 2, 2);
        assert_eq!(total_chars(&once), total_chars(&twice));
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn test_pass_cap_degrades_gracefully() {
        // Kept ends alone blow the budget: shrinking the middle can never
        // satisfy it, so the engine must stop at the cap, not loop or error.
        let turns: Vec<Turn> = (0..6).map(|i| turn_of_len(i, 5000)).collect();
        let out = TruncationEngine.truncate(&turns, 100, 2, 2);
        assert_eq!(out.len(), 6);
        // Kept ends untouched.
        assert_eq!(out[0].char_len(), 5000);
        assert_eq!(out[5].char_len(), 5000);
        // Middle was shrunk hard.
        assert!(out[2].char_len() < 5000);
    }

    #[test]
    fn test_truncate_to_tokens_wrapper() {
        let turns: Vec<Turn> = (0..12).map(|i| turn_of_len(i, 2000)).collect();
        let out = TruncationEngine.truncate_to_tokens(&turns, 1000);
        let after = (total_chars(&out) / CHARS_PER_TOKEN) as u64;
        assert!(after < (total_chars(&turns) / CHARS_PER_TOKEN) as u64);
        // Default kept ends survive.
        assert_eq!(out[0].char_len(), 2000);
        assert_eq!(out.last().unwrap().char_len(), 2000);
    }

    #[test]
    fn test_multibyte_safe_shrinking() {
        let turns = vec![
            Turn::narrator(0, &"é".repeat(2000)),
            Turn::narrator(1, &"é".repeat(2000)),
        ];
        let out = TruncationEngine.truncate(&turns, 3996, 0, 0);
        // Shrinking operates on chars, never splitting a code point.
        for t in &out {
            assert!(t.text.chars().all(|c| c == 'é'));
        }
        assert!(total_chars(&out) < 4000);
    }
}
