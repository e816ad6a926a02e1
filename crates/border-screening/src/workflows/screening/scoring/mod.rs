//! Threat scoring shared by the applicant questionnaire and the officer assessment.
//!
//! Both scales add fixed points per set criterion and map the sum onto the same
//! [`ThreatTier`] thresholds. Scoring is total and side-effect free.

mod tier;
mod weights;

pub use tier::{ThreatTier, HIGH_THRESHOLD, MEDIUM_THRESHOLD};
pub use weights::{ApplicantFlag, Criterion, OfficerCriterion};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use weights::tally;

/// Set of criteria answered "yes".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet<C: Criterion>(BTreeSet<C>);

impl<C: Criterion> FlagSet<C> {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Every criterion of the scale.
    pub fn all() -> Self {
        C::ALL.iter().copied().collect()
    }

    /// Build a set from criterion keys. Keys outside the scale are ignored.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .filter_map(|key| C::from_key(key.as_ref()))
            .collect()
    }

    pub fn insert(&mut self, criterion: C) -> bool {
        self.0.insert(criterion)
    }

    pub fn set(&mut self, criterion: C, value: bool) {
        if value {
            self.0.insert(criterion);
        } else {
            self.0.remove(&criterion);
        }
    }

    pub fn contains(&self, criterion: C) -> bool {
        self.0.contains(&criterion)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = C> + '_ {
        self.0.iter().copied()
    }
}

impl<C: Criterion> Default for FlagSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Criterion> FromIterator<C> for FlagSet<C> {
    fn from_iter<T: IntoIterator<Item = C>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Derived score; always recomputed from the current flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total_score: u32,
    pub tier: ThreatTier,
}

impl ScoreResult {
    pub const fn from_total(total_score: u32) -> Self {
        Self {
            total_score,
            tier: ThreatTier::from_score(total_score),
        }
    }
}

/// Points contributed by one criterion, kept for audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    pub criterion: &'static str,
    pub points: u32,
}

/// Score together with the components that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    #[serde(flatten)]
    pub result: ScoreResult,
    pub components: Vec<ScoreComponent>,
}

pub fn score<C: Criterion>(flags: &FlagSet<C>) -> ScoreResult {
    score_breakdown(flags).result
}

pub fn score_breakdown<C: Criterion>(flags: &FlagSet<C>) -> ScoreBreakdown {
    let (components, total_score) = tally(flags);
    ScoreBreakdown {
        result: ScoreResult::from_total(total_score),
        components,
    }
}
