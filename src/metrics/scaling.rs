//! Progress of funded accounts toward their scaling target.

use crate::types::{Challenge, ChallengeStatus, RecordId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalingProgress {
    pub challenge_id: RecordId,
    /// Required growth in percent.
    pub target_percent: f64,
    /// Balance at which the target is met.
    pub target_balance: f64,
    pub current_gain_percent: f64,
    /// Share of the target achieved, within `[0, 100]`.
    pub progress_percent: f64,
    /// Growth still needed, never negative.
    pub remaining_percent: f64,
    pub reached: bool,
}

/// Scaling progress of a funded challenge with scaling enabled.
///
/// Returns `None` for any other challenge, or when the target or initial
/// balance make the ratios meaningless.
pub fn scaling_progress(challenge: &Challenge) -> Option<ScalingProgress> {
    if challenge.status != ChallengeStatus::Funded || !challenge.has_scaling {
        return None;
    }
    let target = challenge.scaling_target?;
    if target <= 0.0 || challenge.initial_balance <= 0.0 {
        return None;
    }

    let initial = challenge.initial_balance;
    let gain = (challenge.current_balance - initial) * 100.0 / initial;
    let progress = (gain / target * 100.0).clamp(0.0, 100.0);

    Some(ScalingProgress {
        challenge_id: challenge.id.clone(),
        target_percent: target,
        target_balance: initial * (1.0 + target / 100.0),
        current_gain_percent: gain,
        progress_percent: progress,
        remaining_percent: (target - gain).max(0.0),
        reached: gain >= target,
    })
}

/// Scaling progress for every eligible challenge, in collection order.
pub fn all_scaling_progress(challenges: &[Challenge]) -> Vec<ScalingProgress> {
    challenges.iter().filter_map(scaling_progress).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn funded(initial: f64, current: f64, target: Option<f64>) -> Challenge {
        Challenge {
            id: RecordId::from("1"),
            name: "Funded".into(),
            provider: String::new(),
            initial_balance: initial,
            current_balance: current,
            status: ChallengeStatus::Funded,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            created_at: Utc::now(),
            started_as_funded: false,
            has_scaling: target.is_some(),
            scaling_target: target,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_progress_scenario() {
        let progress = scaling_progress(&funded(1000.0, 1200.0, Some(25.0))).unwrap();
        assert!(approx(progress.target_balance, 1250.0));
        assert!(approx(progress.current_gain_percent, 20.0));
        assert!(approx(progress.progress_percent, 80.0));
        assert!(approx(progress.remaining_percent, 5.0));
        assert!(!progress.reached);
    }

    #[test]
    fn test_progress_clamped() {
        let above = scaling_progress(&funded(1000.0, 1400.0, Some(25.0))).unwrap();
        assert_eq!(above.progress_percent, 100.0);
        assert_eq!(above.remaining_percent, 0.0);
        assert!(above.reached);

        let below = scaling_progress(&funded(1000.0, 900.0, Some(25.0))).unwrap();
        assert_eq!(below.progress_percent, 0.0);
        assert!(approx(below.remaining_percent, 35.0));
    }

    #[test]
    fn test_only_funded_with_scaling() {
        assert!(scaling_progress(&funded(1000.0, 1100.0, None)).is_none());

        let mut active = funded(1000.0, 1100.0, Some(10.0));
        active.status = ChallengeStatus::Active;
        assert!(scaling_progress(&active).is_none());

        let mut disabled = funded(1000.0, 1100.0, Some(10.0));
        disabled.has_scaling = false;
        assert!(scaling_progress(&disabled).is_none());
    }
}
