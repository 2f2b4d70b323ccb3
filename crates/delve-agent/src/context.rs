//! Context manager — keeps the transcript inside the context budget.
//!
//! Sizes are estimated at four characters per token. When the estimate goes
//! over budget the transcript is cut down to the instruction turn plus the
//! most recent turns; eviction is destructive.

use tracing::{debug, warn};

use delve_core::types::Turn;

/// Default budget in estimated tokens.
pub const DEFAULT_CONTEXT_BUDGET: usize = 12_000;

/// Default number of recent turns kept when pruning.
pub const DEFAULT_RECENT_WINDOW: usize = 16;

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// Estimated size of one turn.
pub fn estimate_tokens(turn: &Turn) -> usize {
    turn.text().chars().count() / CHARS_PER_TOKEN
}

/// Estimated size of a whole transcript.
pub fn estimate_total(transcript: &[Turn]) -> usize {
    transcript.iter().map(estimate_tokens).sum()
}

// ─────────────────────────────────────────────
// ContextManager
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct ContextManager {
    context_budget: usize,
    recent_window: usize,
}

impl ContextManager {
    pub fn new(context_budget: usize, recent_window: usize) -> Self {
        Self {
            context_budget,
            recent_window,
        }
    }

    pub fn context_budget(&self) -> usize {
        self.context_budget
    }

    pub fn recent_window(&self) -> usize {
        self.recent_window
    }

    /// Whether `transcript` is over budget.
    pub fn needs_pruning(&self, transcript: &[Turn]) -> bool {
        estimate_total(transcript) > self.context_budget
    }

    /// Shrink `transcript` in place if it is over budget.
    ///
    /// Keeps the first (instruction) turn and the last `recent_window` turns,
    /// never fewer than one.
    /// If that is still too large, the oldest kept turns go one by one until
    /// the transcript fits or only the instruction and the newest turn are
    /// left. Returns whether anything was evicted.
    pub fn prune(&self, transcript: &mut Vec<Turn>) -> bool {
        let before = estimate_total(transcript);
        if !self.needs_pruning(transcript) || transcript.len() <= 2 {
            return false;
        }

        let original_len = transcript.len();
        let history = original_len - 1;
        let window = self.recent_window.max(1);
        if history > window {
            transcript.drain(1..1 + history - window);
        }

        while transcript.len() > 2 && estimate_total(transcript) > self.context_budget {
            transcript.remove(1);
        }

        let after = estimate_total(transcript);
        let evicted = original_len - transcript.len();
        if evicted > 0 {
            warn!(
                tokens_before = before,
                tokens_after = after,
                evicted,
                budget = self.context_budget,
                "pruned transcript"
            );
        } else {
            debug!(tokens = before, "transcript over budget but nothing to evict");
        }
        evicted > 0
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_BUDGET, DEFAULT_RECENT_WINDOW)
    }
}
