//! Per-(framework, strategy) success-rate estimator (§4.9). Scores are an
//! exponential moving average over recent outcomes and bias which
//! strategy the chain-builder tries first for a given site; the policy
//! is always overridable by explicit request options.

use super::StrategyKind;
use std::collections::HashMap;
use std::sync::RwLock;

const DEFAULT_SMOOTHING: f64 = 0.3;
const DEFAULT_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    framework: &'static str,
    strategy: StrategyKindOrd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StrategyKindOrd(u8);

impl From<StrategyKind> for StrategyKindOrd {
    fn from(kind: StrategyKind) -> Self {
        StrategyKindOrd(match kind {
            StrategyKind::StaticFetch => 0,
            StrategyKind::BrowserRender => 1,
            StrategyKind::BrowserJs => 2,
            StrategyKind::Hybrid => 3,
        })
    }
}

/// Tracks a success-rate EMA per (framework, strategy) pair. Cheap to
/// clone the handle; interior state is shared via a lock since the
/// worker pool records outcomes from multiple jobs concurrently.
pub struct Selector {
    smoothing: f64,
    scores: RwLock<HashMap<(&'static str, StrategyKindOrd), f64>>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl Selector {
    pub fn new(smoothing: f64) -> Self {
        Self { smoothing: smoothing.clamp(0.0, 1.0), scores: RwLock::new(HashMap::new()) }
    }

    /// Records an observed outcome (1.0 success, 0.0 failure) for a
    /// (framework, strategy) pair, updating its EMA.
    pub fn record(&self, framework: &'static str, strategy: StrategyKind, success: bool) {
        let key = (framework, strategy.into());
        let observed = if success { 1.0 } else { 0.0 };
        let mut scores = self.scores.write().expect("selector lock poisoned");
        let entry = scores.entry(key).or_insert(DEFAULT_SCORE);
        *entry = self.smoothing * observed + (1.0 - self.smoothing) * *entry;
    }

    /// Current EMA score for a pair, or the neutral default if no
    /// outcomes have been recorded yet.
    pub fn score(&self, framework: &'static str, strategy: StrategyKind) -> f64 {
        let key = (framework, strategy.into());
        *self.scores.read().expect("selector lock poisoned").get(&key).unwrap_or(&DEFAULT_SCORE)
    }

    /// Orders candidate strategies by descending score for a given site's
    /// declared framework, highest-scoring first. Ties keep their
    /// original relative order (a stable sort).
    pub fn rank(&self, framework: &'static str, candidates: &[StrategyKind]) -> Vec<StrategyKind> {
        let mut ranked = candidates.to_vec();
        ranked.sort_by(|a, b| {
            self.score(framework, *b)
                .partial_cmp(&self.score(framework, *a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}
