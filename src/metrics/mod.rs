//! Derived metrics over the store's collections.
//!
//! Everything here is a pure function of the collections and a
//! [`MetricsConfig`]. The store recomputes [`DashboardMetrics`] in full after
//! every mutation; collections are small enough that nothing is maintained
//! incrementally.

mod scaling;
mod series;
mod timer;

pub use scaling::{all_scaling_progress, scaling_progress, ScalingProgress};
pub use series::{
    balance_changes, balance_timeline, cumulative_series, payout_series, r_series,
    BalanceChange, BalanceSeries, BalanceTimeline, SeriesLabel, SeriesPoint,
};
pub use timer::{elapsed_since, Elapsed};

use crate::types::{Challenge, ChallengeStatus, Payout, REntry};
use serde::{Deserialize, Serialize};

/// Payout goal used when none is configured.
pub const DEFAULT_PAYOUT_GOAL: f64 = 50_000.0;

/// R-multiple goal used when none is configured.
pub const DEFAULT_R_GOAL: f64 = 100.0;

/// Which challenges contribute to unrealized profit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrealizedProfitPolicy {
    /// Every challenge regardless of status.
    AllChallenges,
    /// Only challenges whose status is funded.
    #[default]
    FundedOnly,
}

impl UnrealizedProfitPolicy {
    fn includes(self, challenge: &Challenge) -> bool {
        match self {
            UnrealizedProfitPolicy::AllChallenges => true,
            UnrealizedProfitPolicy::FundedOnly => challenge.status == ChallengeStatus::Funded,
        }
    }
}

/// Metrics configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsConfig {
    /// Payout total the dashboard works toward.
    pub payout_goal: f64,

    /// Accumulated R-multiple the dashboard works toward.
    pub r_goal: f64,

    pub unrealized_policy: UnrealizedProfitPolicy,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            payout_goal: DEFAULT_PAYOUT_GOAL,
            r_goal: DEFAULT_R_GOAL,
            unrealized_policy: UnrealizedProfitPolicy::default(),
        }
    }
}

pub fn total_payouts(payouts: &[Payout]) -> f64 {
    payouts.iter().map(|p| p.amount).sum()
}

pub fn average_payout(payouts: &[Payout]) -> f64 {
    if payouts.is_empty() {
        0.0
    } else {
        total_payouts(payouts) / payouts.len() as f64
    }
}

/// Sum of positive balance gains over the challenges the policy admits.
pub fn unrealized_profit(challenges: &[Challenge], policy: UnrealizedProfitPolicy) -> f64 {
    challenges
        .iter()
        .filter(|c| policy.includes(c))
        .map(|c| (c.current_balance - c.initial_balance).max(0.0))
        .sum()
}

/// Challenges that count toward the success rate: everything that did not
/// start out as a funded account.
pub fn eligible_challenges(challenges: &[Challenge]) -> impl Iterator<Item = &Challenge> {
    challenges.iter().filter(|c| !c.started_as_funded)
}

/// Completed eligible challenges over all eligible challenges, in percent.
pub fn success_rate(challenges: &[Challenge]) -> f64 {
    let (eligible, completed) = eligible_challenges(challenges).fold((0usize, 0usize), |(e, d), c| {
        (e + 1, d + usize::from(c.status.is_completed()))
    });
    if eligible == 0 {
        0.0
    } else {
        completed as f64 / eligible as f64 * 100.0
    }
}

pub fn total_r(entries: &[REntry]) -> f64 {
    entries.iter().map(|e| e.value).sum()
}

/// Profit of a single challenge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengePerformance {
    pub profit: f64,
    /// Profit relative to the initial balance; zero when that balance is zero.
    pub profit_percent: f64,
}

impl ChallengePerformance {
    pub fn of(challenge: &Challenge) -> Self {
        let profit = challenge.current_balance - challenge.initial_balance;
        let profit_percent = if challenge.initial_balance == 0.0 {
            0.0
        } else {
            profit / challenge.initial_balance * 100.0
        };
        Self {
            profit,
            profit_percent,
        }
    }
}

/// Progress toward a fixed goal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal: f64,
    pub achieved: f64,
    /// `goal - achieved`; negative once the goal is exceeded.
    pub remaining: f64,
    /// Unclamped percentage of the goal achieved.
    pub percent: f64,
    /// `percent` clamped to `[0, 100]`, for progress bars.
    pub bar_percent: f64,
}

impl GoalProgress {
    pub fn new(goal: f64, achieved: f64) -> Self {
        let percent = if goal == 0.0 {
            0.0
        } else {
            achieved / goal * 100.0
        };
        Self {
            goal,
            achieved,
            remaining: goal - achieved,
            percent,
            bar_percent: percent.clamp(0.0, 100.0),
        }
    }
}

/// Everything the dashboard shows, computed from one store snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_payouts: f64,
    pub payout_goal: GoalProgress,
    pub average_payout: f64,
    pub unrealized_profit: f64,
    pub active_challenges: usize,
    pub completed_challenges: usize,
    pub eligible_challenges: usize,
    /// Percent, see [`success_rate`].
    pub success_rate: f64,
    pub total_r: f64,
    pub r_goal: GoalProgress,
    pub payout_series: Vec<SeriesPoint>,
    pub r_series: Vec<SeriesPoint>,
    pub scaling: Vec<ScalingProgress>,
}

impl DashboardMetrics {
    pub fn compute(
        challenges: &[Challenge],
        payouts: &[Payout],
        r_entries: &[REntry],
        config: &MetricsConfig,
    ) -> Self {
        let total = total_payouts(payouts);
        let r_total = total_r(r_entries);

        Self {
            total_payouts: total,
            payout_goal: GoalProgress::new(config.payout_goal, total),
            average_payout: average_payout(payouts),
            unrealized_profit: unrealized_profit(challenges, config.unrealized_policy),
            active_challenges: challenges
                .iter()
                .filter(|c| c.status == ChallengeStatus::Active)
                .count(),
            completed_challenges: eligible_challenges(challenges)
                .filter(|c| c.status.is_completed())
                .count(),
            eligible_challenges: eligible_challenges(challenges).count(),
            success_rate: success_rate(challenges),
            total_r: r_total,
            r_goal: GoalProgress::new(config.r_goal, r_total),
            payout_series: payout_series(payouts, Some(config.payout_goal)),
            r_series: r_series(r_entries, Some(config.r_goal)),
            scaling: all_scaling_progress(challenges),
        }
    }
}
