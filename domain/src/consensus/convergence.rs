//! Convergence analysis over a similarity history
//!
//! Pure, stateless, and deterministic given identical input: the negotiation
//! loop feeds the per-round similarity history in here after every round and
//! branches on the result. Non-finite entries (a round whose measurement was
//! frozen on a bad value upstream) are ignored rather than corrupting the
//! trend.

use serde::{Deserialize, Serialize};

/// Minimum round-over-round change treated as movement
const DELTA_EPSILON: f64 = 0.01;

/// Rounds inspected when classifying deadlock
const DEADLOCK_WINDOW: usize = 3;

/// Agreement below which a deadlock is considered high-risk
const HIGH_RISK_FLOOR: f64 = 0.7;

/// Direction the negotiation is moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Converging,
    Diverging,
    Stagnant,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Converging => write!(f, "converging"),
            TrendDirection::Diverging => write!(f, "diverging"),
            TrendDirection::Stagnant => write!(f, "stagnant"),
        }
    }
}

/// Likelihood that the negotiation is stuck
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlockRisk {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DeadlockRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadlockRisk::Low => write!(f, "low"),
            DeadlockRisk::Medium => write!(f, "medium"),
            DeadlockRisk::High => write!(f, "high"),
        }
    }
}

/// Derived, ephemeral view of where the negotiation is heading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceTrend {
    pub direction: TrendDirection,
    /// Mean round-over-round similarity delta
    pub velocity: f64,
    /// Projected rounds until the agreement threshold; `f64::INFINITY` when
    /// velocity is non-positive
    pub predicted_rounds: f64,
    pub deadlock_risk: DeadlockRisk,
    /// Deterministic guidance keyed by (risk, direction, velocity)
    pub recommendation: &'static str,
}

fn finite(history: &[f64]) -> Vec<f64> {
    history.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Mean round-over-round delta across all finite entries
///
/// Returns 0 when fewer than 2 valid points exist.
pub fn calculate_velocity(history: &[f64]) -> f64 {
    let valid = finite(history);
    if valid.len() < 2 {
        return 0.0;
    }
    let total: f64 = valid.windows(2).map(|w| w[1] - w[0]).sum();
    total / (valid.len() - 1) as f64
}

/// Deadlock check over the default window of 3 rounds
pub fn is_deadlocked(history: &[f64]) -> bool {
    is_deadlocked_with_window(history, DEADLOCK_WINDOW)
}

/// Deadlock check over the last `window` valid rounds
///
/// A single increase larger than the movement epsilon anywhere in the window
/// means progress is still being made. Otherwise the window is deadlocked
/// when it is flat (every |delta| within epsilon) or declining (every delta
/// negative).
pub fn is_deadlocked_with_window(history: &[f64], window: usize) -> bool {
    if window < 2 {
        return false;
    }
    let valid = finite(history);
    if valid.len() < window {
        return false;
    }
    let deltas: Vec<f64> = valid[valid.len() - window..]
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();

    if deltas.iter().any(|d| *d > DELTA_EPSILON) {
        return false;
    }
    let flat = deltas.iter().all(|d| d.abs() <= DELTA_EPSILON);
    let declining = deltas.iter().all(|d| *d < 0.0);
    flat || declining
}

/// Projected rounds until `threshold` at the observed velocity
///
/// 0 when already at or past the threshold; infinite when velocity is
/// non-positive.
pub fn predict_rounds_to_consensus(current: f64, velocity: f64, threshold: f64) -> f64 {
    if current >= threshold {
        return 0.0;
    }
    if velocity <= 0.0 {
        return f64::INFINITY;
    }
    ((threshold - current) / velocity).ceil().max(0.0)
}

/// Full trend classification of a similarity history
pub fn analyze_trend(history: &[f64], agreement_threshold: f64) -> ConvergenceTrend {
    let valid = finite(history);
    if valid.len() < 2 {
        return ConvergenceTrend {
            direction: TrendDirection::Stagnant,
            velocity: 0.0,
            predicted_rounds: 0.0,
            deadlock_risk: DeadlockRisk::Medium,
            recommendation: recommend(DeadlockRisk::Medium, TrendDirection::Stagnant, 0.0),
        };
    }

    let velocity = calculate_velocity(&valid);
    let first = valid[0];
    let last = valid[valid.len() - 1];

    let direction = if last - first > DELTA_EPSILON {
        TrendDirection::Converging
    } else if last - first < -DELTA_EPSILON {
        TrendDirection::Diverging
    } else if velocity > DELTA_EPSILON {
        TrendDirection::Converging
    } else if velocity < -DELTA_EPSILON {
        TrendDirection::Diverging
    } else {
        TrendDirection::Stagnant
    };

    let deadlocked = is_deadlocked(history);
    let deadlock_risk = if deadlocked && last < HIGH_RISK_FLOOR {
        DeadlockRisk::High
    } else if deadlocked || velocity < DELTA_EPSILON {
        DeadlockRisk::Medium
    } else {
        DeadlockRisk::Low
    };

    ConvergenceTrend {
        direction,
        velocity,
        predicted_rounds: predict_rounds_to_consensus(last, velocity, agreement_threshold),
        deadlock_risk,
        recommendation: recommend(deadlock_risk, direction, velocity),
    }
}

/// Fixed recommendation table keyed by (risk, direction, velocity)
fn recommend(risk: DeadlockRisk, direction: TrendDirection, velocity: f64) -> &'static str {
    match (risk, direction) {
        (DeadlockRisk::High, _) => {
            "escalate: negotiation has stalled below a usable agreement level"
        }
        (DeadlockRisk::Medium, TrendDirection::Diverging) => {
            "tighten prompts: positions are drifting apart"
        }
        (DeadlockRisk::Medium, TrendDirection::Stagnant) => {
            "inject exemplars: progress has flattened"
        }
        (DeadlockRisk::Medium, TrendDirection::Converging) => {
            if velocity < DELTA_EPSILON {
                "continue cautiously: convergence is slowing"
            } else {
                "continue: convergence is steady"
            }
        }
        (DeadlockRisk::Low, _) => "continue: negotiation is converging",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_of_short_history_is_zero() {
        assert_eq!(calculate_velocity(&[]), 0.0);
        assert_eq!(calculate_velocity(&[0.5]), 0.0);
    }

    #[test]
    fn test_velocity_is_mean_delta() {
        // Deltas: +0.1, +0.2 -> mean 0.15
        let velocity = calculate_velocity(&[0.5, 0.6, 0.8]);
        assert!((velocity - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_ignores_non_finite_entries() {
        let velocity = calculate_velocity(&[0.5, f64::NAN, 0.7]);
        assert!((velocity - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_of_strictly_increasing_history_is_non_negative() {
        let history = [0.50, 0.52, 0.55, 0.60, 0.66];
        assert!(calculate_velocity(&history) >= -0.05);
        assert!(calculate_velocity(&history) > 0.0);
    }

    #[test]
    fn test_flat_window_is_deadlocked() {
        assert!(is_deadlocked(&[0.6, 0.6, 0.6]));
        assert!(is_deadlocked(&[0.3, 0.9, 0.605, 0.60, 0.606]));
    }

    #[test]
    fn test_declining_window_is_deadlocked() {
        assert!(is_deadlocked(&[0.8, 0.7, 0.6]));
        // Mixed small decline still counts: every delta negative
        assert!(is_deadlocked(&[0.8, 0.795, 0.70]));
    }

    #[test]
    fn test_single_real_increase_defeats_deadlock() {
        assert!(!is_deadlocked(&[0.6, 0.6, 0.65]));
        assert!(!is_deadlocked(&[0.8, 0.5, 0.9]));
    }

    #[test]
    fn test_strictly_increasing_history_is_never_deadlocked() {
        let mut history = vec![0.4];
        for _ in 0..6 {
            history.push(history.last().unwrap() + 0.02);
        }
        assert!(!is_deadlocked(&history));
    }

    #[test]
    fn test_deadlock_requires_enough_valid_points() {
        assert!(!is_deadlocked(&[0.6, 0.6]));
        assert!(!is_deadlocked(&[0.6, f64::NAN, 0.6]));
        assert!(!is_deadlocked_with_window(&[0.6, 0.6, 0.6, 0.6], 5));
    }

    #[test]
    fn test_deadlock_window_filters_non_finite() {
        // Valid entries: [0.6, 0.6, 0.6] -> flat -> deadlocked
        assert!(is_deadlocked(&[0.6, f64::INFINITY, 0.6, f64::NAN, 0.6]));
    }

    #[test]
    fn test_predict_rounds() {
        assert_eq!(predict_rounds_to_consensus(0.9, 0.05, 0.85), 0.0);
        assert_eq!(predict_rounds_to_consensus(0.6, 0.0, 0.85), f64::INFINITY);
        assert_eq!(predict_rounds_to_consensus(0.6, -0.1, 0.85), f64::INFINITY);
        // (0.85 - 0.75) / 0.06 = 1.66.. -> 2 rounds
        assert_eq!(predict_rounds_to_consensus(0.75, 0.06, 0.85), 2.0);
    }

    #[test]
    fn test_trend_short_history_is_stagnant() {
        let trend = analyze_trend(&[0.5], 0.85);
        assert_eq!(trend.direction, TrendDirection::Stagnant);
        assert_eq!(trend.velocity, 0.0);
        assert_eq!(trend.predicted_rounds, 0.0);
    }

    #[test]
    fn test_trend_direction_converging_on_net_gain() {
        // Last exceeds first by more than 0.01
        let trend = analyze_trend(&[0.5, 0.48, 0.55], 0.85);
        assert_eq!(trend.direction, TrendDirection::Converging);
    }

    #[test]
    fn test_trend_direction_diverging_on_net_loss() {
        let trend = analyze_trend(&[0.7, 0.68, 0.62], 0.85);
        assert_eq!(trend.direction, TrendDirection::Diverging);
    }

    #[test]
    fn test_trend_risk_high_when_deadlocked_below_floor() {
        let trend = analyze_trend(&[0.6, 0.6, 0.6], 0.85);
        assert_eq!(trend.deadlock_risk, DeadlockRisk::High);
        assert!(trend.recommendation.starts_with("escalate"));
    }

    #[test]
    fn test_trend_risk_medium_when_deadlocked_above_floor() {
        let trend = analyze_trend(&[0.8, 0.8, 0.8], 0.85);
        assert_eq!(trend.deadlock_risk, DeadlockRisk::Medium);
    }

    #[test]
    fn test_trend_risk_low_when_moving_fast() {
        let trend = analyze_trend(&[0.5, 0.58, 0.67, 0.75], 0.85);
        assert_eq!(trend.deadlock_risk, DeadlockRisk::Low);
        assert_eq!(trend.direction, TrendDirection::Converging);
        assert!(trend.predicted_rounds.is_finite());
    }

    #[test]
    fn test_deadlocked_window_never_contains_a_real_increase() {
        // Property from the deadlock definition: whenever a history is
        // deadlocked, no consecutive pair in the last 3 valid entries rises
        // by more than 0.01.
        let histories: Vec<Vec<f64>> = vec![
            vec![0.6, 0.6, 0.6],
            vec![0.9, 0.8, 0.7],
            vec![0.5, 0.505, 0.51],
            vec![0.2, 0.9, 0.89, 0.88, 0.88],
        ];
        for h in histories {
            if is_deadlocked(&h) {
                let tail = &h[h.len() - 3..];
                assert!(tail.windows(2).all(|w| w[1] - w[0] <= 0.01));
            }
        }
    }
}
