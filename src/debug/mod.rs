//! Numeric diagnostics gathered during a single criterion evaluation.
//!
//! The parameter transforms and the Luce choice rule both hit recoverable numeric
//! edge cases. They do not fail the evaluation; instead they record a [`Warning`]
//! into a [`Diagnostics`] value owned by the caller. The estimation tracker drains
//! it into `est.log` after every evaluation.

use std::collections::BTreeMap;
use std::fmt;

/// A recoverable numeric event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Warning {
    /// A power of an expected utility overflowed in the Luce rule; the
    /// probabilities were recomputed in log space.
    LuceOverflow,
    /// A value sitting on a finite bound was nudged inward before mapping it to
    /// optimizer space.
    BoundAdjustment,
}

impl Warning {
    pub fn message(self) -> &'static str {
        match self {
            Warning::LuceOverflow => "Overflow in luce_prob(), probabilities recomputed in log space",
            Warning::BoundAdjustment => "small adjustment to bounds in to_optimizer()",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Explicit warning context passed `&mut` through the numeric code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    counts: BTreeMap<Warning, usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, warning: Warning) {
        *self.counts.entry(warning).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn count(&self, warning: Warning) -> usize {
        self.counts.get(&warning).copied().unwrap_or(0)
    }

    pub fn absorb(&mut self, other: Diagnostics) {
        for (warning, n) in other.counts {
            *self.counts.entry(warning).or_insert(0) += n;
        }
    }

    /// Drain the context, emitting one `warn` event per distinct warning.
    pub fn flush(&mut self) -> Vec<Warning> {
        let drained = std::mem::take(&mut self.counts);
        for (warning, occurrences) in &drained {
            tracing::warn!(occurrences, "{warning}");
        }
        drained.into_keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_returns_distinct_warnings_and_clears() {
        let mut diag = Diagnostics::new();
        diag.record(Warning::BoundAdjustment);
        diag.record(Warning::LuceOverflow);
        diag.record(Warning::BoundAdjustment);
        assert_eq!(diag.count(Warning::BoundAdjustment), 2);

        let flushed = diag.flush();
        assert_eq!(flushed, vec![Warning::LuceOverflow, Warning::BoundAdjustment]);
        assert!(diag.is_empty());
    }

    #[test]
    fn absorb_adds_counts() {
        let mut a = Diagnostics::new();
        a.record(Warning::LuceOverflow);
        let mut b = Diagnostics::new();
        b.record(Warning::LuceOverflow);
        a.absorb(b);
        assert_eq!(a.count(Warning::LuceOverflow), 2);
    }
}
