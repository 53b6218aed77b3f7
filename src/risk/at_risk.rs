//! Post-upload screen over the whole vibemeter history.
//!
//! Flags employees whose responses look unusually low or unusually volatile
//! relative to the rest of the workforce. Employees with a single response
//! are compared against the low quantile of single-response scores; repeat
//! responders against the spread of everyone else's history.

use crate::db::VibeSample;
use std::collections::BTreeMap;
use uuid::Uuid;

const LOW_SCORE_QUANTILE: f64 = 0.40;
const SPREAD_QUANTILE: f64 = 0.85;

/// Linear-interpolation quantile over an ascending-sorted sample.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Spread of one employee's scores: absolute difference for a pair, mean
/// absolute deviation around the mean for longer histories.
fn spread(scores: &[f64]) -> f64 {
    if scores.len() == 2 {
        (scores[0] - scores[1]).abs()
    } else {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        scores.iter().map(|s| (s - mean).abs()).sum::<f64>() / scores.len() as f64
    }
}

/// Ids of employees flagged by the screen, deduplicated, in stable order.
pub fn screen(samples: &[VibeSample]) -> Vec<Uuid> {
    let mut by_employee: BTreeMap<Uuid, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        by_employee
            .entry(sample.employee_id)
            .or_default()
            .push(sample.vibe_score);
    }

    let mut singles = Vec::new();
    let mut repeats = Vec::new();
    for (id, scores) in &by_employee {
        if scores.len() == 1 {
            singles.push((*id, scores[0]));
        } else {
            repeats.push((*id, spread(scores)));
        }
    }

    let mut flagged = Vec::new();

    let mut single_scores: Vec<f64> = singles.iter().map(|(_, s)| *s).collect();
    single_scores.sort_by(|a, b| a.total_cmp(b));
    if let Some(cutoff) = quantile(&single_scores, LOW_SCORE_QUANTILE) {
        for (id, score) in &singles {
            if *score < cutoff {
                flagged.push(*id);
            }
        }
    }

    let mut spreads: Vec<f64> = repeats.iter().map(|(_, s)| *s).collect();
    spreads.sort_by(|a, b| a.total_cmp(b));
    if let Some(cutoff) = quantile(&spreads, SPREAD_QUANTILE) {
        for (id, value) in &repeats {
            if *value > cutoff && !flagged.contains(id) {
                flagged.push(*id);
            }
        }
    }

    flagged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u128, score: f64) -> VibeSample {
        VibeSample {
            employee_id: Uuid::from_u128(id),
            vibe_score: score,
        }
    }

    #[test]
    fn quantile_interpolates_linearly() {
        assert_eq!(quantile(&[1.0, 5.0], 0.40), Some(2.6));
        assert_eq!(quantile(&[3.0], 0.85), Some(3.0));
        assert_eq!(quantile(&[], 0.40), None);
    }

    #[test]
    fn spread_of_pair_is_absolute_difference() {
        assert_eq!(spread(&[1.0, 9.0]), 8.0);
        let triple = spread(&[2.0, 2.0, 8.0]);
        assert!((triple - 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn low_single_responders_are_flagged() {
        // Cutoff over [1,2,3,4,5] at the 0.40 quantile is 2.6, so the
        // employees who answered 1 and 2 are below it.
        let samples: Vec<VibeSample> = (1..=5).map(|i| sample(i, i as f64)).collect();
        let flagged = screen(&samples);
        assert_eq!(
            flagged,
            vec![Uuid::from_u128(1), Uuid::from_u128(2)]
        );
    }

    #[test]
    fn volatile_repeat_responders_are_flagged_and_stable_ones_pass() {
        let samples = vec![
            sample(1, 1.0),
            sample(1, 9.0),
            sample(2, 5.0),
            sample(2, 5.0),
            sample(3, 6.0),
            sample(3, 6.0),
        ];
        let flagged = screen(&samples);
        assert_eq!(flagged, vec![Uuid::from_u128(1)]);
    }

    #[test]
    fn identical_scores_flag_no_one() {
        let samples: Vec<VibeSample> = (1..=4).map(|i| sample(i, 7.0)).collect();
        assert!(screen(&samples).is_empty());
    }

    #[test]
    fn empty_history_flags_no_one() {
        assert!(screen(&[]).is_empty());
    }
}
