//! Scaling transition rule
//!
//! Pure function of the observed state so the controller loop stays thin.
//! Scale-up is checked before scale-down and at most one action is taken.

use std::time::Duration;

use crate::config::ScalingPolicy;
use crate::metrics::utilization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDecision {
    Hold,
    ScaleUp(usize),
    ScaleDown(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingInputs {
    pub queued: usize,
    pub capacity: usize,
    pub active_workers: usize,
    pub min_workers: usize,
    pub max_workers: usize,
    /// `None` when the pool has never scaled.
    pub since_last_scaling: Option<Duration>,
}

pub fn decide(inputs: &ScalingInputs, policy: &ScalingPolicy) -> ScalingDecision {
    if let Some(elapsed) = inputs.since_last_scaling {
        if elapsed < policy.cooldown() {
            return ScalingDecision::Hold;
        }
    }

    let load = utilization(inputs.queued, inputs.capacity);
    let active = inputs.active_workers;

    if load >= policy.scale_up_threshold && active < inputs.max_workers {
        let n = (inputs.max_workers - active).min(policy.scale_up_step);
        return ScalingDecision::ScaleUp(n);
    }
    if load <= policy.scale_down_threshold && active > inputs.min_workers {
        let n = (active - inputs.min_workers).min(policy.scale_down_step);
        return ScalingDecision::ScaleDown(n);
    }
    ScalingDecision::Hold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(queued: usize, active: usize) -> ScalingInputs {
        ScalingInputs {
            queued,
            capacity: 10,
            active_workers: active,
            min_workers: 2,
            max_workers: 8,
            since_last_scaling: None,
        }
    }

    #[test]
    fn scales_up_by_two_under_pressure() {
        let policy = ScalingPolicy::default();
        assert_eq!(decide(&inputs(8, 2), &policy), ScalingDecision::ScaleUp(2));
        assert_eq!(decide(&inputs(10, 7), &policy), ScalingDecision::ScaleUp(1));
        assert_eq!(decide(&inputs(10, 8), &policy), ScalingDecision::Hold);
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = ScalingPolicy::default();
        let mut at_edge = inputs(3, 2);
        at_edge.capacity = 4;
        assert_eq!(decide(&at_edge, &policy), ScalingDecision::ScaleUp(2));

        let mut low_edge = inputs(1, 4);
        low_edge.capacity = 4;
        assert_eq!(decide(&low_edge, &policy), ScalingDecision::ScaleDown(1));
    }

    #[test]
    fn scales_down_one_at_a_time() {
        let policy = ScalingPolicy::default();
        assert_eq!(decide(&inputs(0, 8), &policy), ScalingDecision::ScaleDown(1));
        assert_eq!(decide(&inputs(2, 3), &policy), ScalingDecision::ScaleDown(1));
        assert_eq!(decide(&inputs(0, 2), &policy), ScalingDecision::Hold);
    }

    #[test]
    fn middle_band_holds() {
        let policy = ScalingPolicy::default();
        assert_eq!(decide(&inputs(5, 4), &policy), ScalingDecision::Hold);
    }

    #[test]
    fn cooldown_blocks_any_action() {
        let policy = ScalingPolicy::default();
        let mut hot = inputs(10, 2);
        hot.since_last_scaling = Some(Duration::from_secs(4));
        assert_eq!(decide(&hot, &policy), ScalingDecision::Hold);

        hot.since_last_scaling = Some(Duration::from_secs(5));
        assert_eq!(decide(&hot, &policy), ScalingDecision::ScaleUp(2));
    }
}
