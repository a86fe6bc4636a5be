use crate::models::ReimbursementRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReimburseKind {
    Dinner,
    Night,
    Taxi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Eligibility {
    pub eligible: bool,
    /// Fixed allowance for meals; taxi carries no fixed amount (the receipt does).
    pub amount: f64,
    pub reason: String,
}

fn reason(work_hours: f64, threshold: f64, met: bool) -> String {
    if met {
        format!("工作时长{work_hours}小时，超过{threshold}小时阈值")
    } else {
        format!("工作时长{work_hours}小时，未达到{threshold}小时阈值")
    }
}

/// Meals use `>=`, taxi uses a strict `>`.
pub fn evaluate(kind: ReimburseKind, work_hours: f64, rule: &ReimbursementRule) -> Eligibility {
    let (met, threshold, amount) = match kind {
        ReimburseKind::Dinner => (
            work_hours >= rule.dinner_threshold,
            rule.dinner_threshold,
            rule.dinner_amount,
        ),
        ReimburseKind::Night => (
            work_hours >= rule.night_threshold,
            rule.night_threshold,
            rule.night_amount,
        ),
        ReimburseKind::Taxi => (work_hours > rule.taxi_threshold, rule.taxi_threshold, 0.0),
    };
    Eligibility {
        eligible: met,
        amount: if met { amount } else { 0.0 },
        reason: reason(work_hours, threshold, met),
    }
}

/// Dinner and night allowances for one day. Both are paid once the night
/// threshold is reached.
pub fn meal_allowance(work_hours: f64, rule: &ReimbursementRule) -> (f64, f64) {
    (
        evaluate(ReimburseKind::Dinner, work_hours, rule).amount,
        evaluate(ReimburseKind::Night, work_hours, rule).amount,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> ReimbursementRule {
        ReimbursementRule::default()
    }

    #[test]
    fn test_below_dinner_threshold_nothing_is_eligible() {
        let r = rule();
        for hours in [0.0, 4.0, 8.0, 9.49] {
            assert!(!evaluate(ReimburseKind::Dinner, hours, &r).eligible);
            assert!(!evaluate(ReimburseKind::Night, hours, &r).eligible);
            assert!(!evaluate(ReimburseKind::Taxi, hours, &r).eligible);
            assert_eq!(meal_allowance(hours, &r), (0.0, 0.0));
        }
    }

    #[test]
    fn test_night_threshold_pays_both_meals() {
        let r = rule();
        let dinner = evaluate(ReimburseKind::Dinner, r.night_threshold, &r);
        let night = evaluate(ReimburseKind::Night, r.night_threshold, &r);
        assert!(dinner.eligible && night.eligible);
        assert_eq!(dinner.amount + night.amount, r.dinner_amount + r.night_amount);
        assert_eq!(meal_allowance(12.0, &r), (18.0, 20.0));
    }

    #[test]
    fn test_dinner_only_between_thresholds() {
        let r = rule();
        assert_eq!(meal_allowance(9.5, &r), (18.0, 0.0));
        assert_eq!(meal_allowance(11.99, &r), (18.0, 0.0));
    }

    #[test]
    fn test_taxi_threshold_is_strict() {
        let r = rule();
        assert!(!evaluate(ReimburseKind::Taxi, r.taxi_threshold, &r).eligible);
        assert!(evaluate(ReimburseKind::Taxi, r.taxi_threshold + 0.01, &r).eligible);
    }

    #[test]
    fn test_reason_embeds_values() {
        let r = rule();
        let e = evaluate(ReimburseKind::Taxi, 13.0, &r);
        assert_eq!(e.reason, "工作时长13小时，超过11小时阈值");
        let e = evaluate(ReimburseKind::Dinner, 8.5, &r);
        assert_eq!(e.reason, "工作时长8.5小时，未达到9.5小时阈值");
        assert_eq!(e.amount, 0.0);
    }

    #[test]
    fn test_end_to_end_day_of_thirteen_hours() {
        let r = rule();
        assert_eq!(evaluate(ReimburseKind::Dinner, 13.0, &r).amount, 18.0);
        assert_eq!(evaluate(ReimburseKind::Night, 13.0, &r).amount, 20.0);
        assert!(evaluate(ReimburseKind::Taxi, 13.0, &r).eligible);
    }
}
