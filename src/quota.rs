//! Per-file unit quota evaluation.
//!
//! Pure function, no I/O. The tie rule is load-bearing: a unit count exactly
//! equal to the plan limit is allowed; only strictly greater counts are
//! rejected.

use crate::models::SubscriptionPlan;

#[derive(Debug, Clone, Copy)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: usize,
}

/// Compare an extracted unit count against the plan's per-file limit.
pub fn evaluate(unit_count: usize, plan: &SubscriptionPlan) -> QuotaDecision {
    let limit = plan.units_per_file;
    QuotaDecision {
        allowed: unit_count <= limit,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(name: &str, is_subscribed: bool, units_per_file: usize) -> SubscriptionPlan {
        SubscriptionPlan {
            name: name.to_string(),
            is_subscribed,
            max_files: 10,
            units_per_file,
        }
    }

    #[test]
    fn exact_limit_is_allowed_free_tier() {
        let p = plan("free", false, 5);
        assert!(evaluate(5, &p).allowed);
        assert!(!evaluate(6, &p).allowed);
    }

    #[test]
    fn exact_limit_is_allowed_pro_tier() {
        let p = plan("pro", true, 25);
        assert!(evaluate(25, &p).allowed);
        assert!(!evaluate(26, &p).allowed);
    }

    #[test]
    fn zero_units_always_allowed() {
        assert!(evaluate(0, &plan("free", false, 5)).allowed);
    }

    #[test]
    fn decision_carries_limit() {
        assert_eq!(evaluate(30, &plan("free", false, 5)).limit, 5);
    }
}
