//! Point-in-time rule evaluation.
//!
//! Pure functions from (rule, current snapshot, prior snapshot) to bool.
//! Missing data never satisfies a predicate: an unavailable operand makes
//! the enclosing comparison false, and a crossover with no prior snapshot
//! is false. `NOT` still inverts its inner result, so absence can satisfy
//! a negated predicate; rules that must not fire on missing data should
//! gate on the positive form.

use crate::domain::rule::{Operand, Rule};
use crate::domain::snapshot::Snapshot;

pub fn eval_operand(operand: &Operand, snapshot: &Snapshot) -> Option<f64> {
    match operand {
        Operand::Open => Some(snapshot.bar.open),
        Operand::High => Some(snapshot.bar.high),
        Operand::Low => Some(snapshot.bar.low),
        Operand::Close => Some(snapshot.bar.close),
        Operand::Volume => Some(snapshot.bar.volume as f64),
        Operand::Constant(v) => Some(*v),
        Operand::Indicator(r) => snapshot.get(&r.id, r.field),
    }
}

pub fn eval_rule(rule: &Rule, snapshot: &Snapshot, prior: Option<&Snapshot>) -> bool {
    match rule {
        Rule::Compare { left, op, right } => {
            match (eval_operand(left, snapshot), eval_operand(right, snapshot)) {
                (Some(l), Some(r)) => op.compare(l, r),
                _ => false,
            }
        }
        Rule::CrossAbove { left, right } => {
            crossed(left, right, snapshot, prior, |prev_l, prev_r, l, r| {
                prev_l <= prev_r && l > r
            })
        }
        Rule::CrossBelow { left, right } => {
            crossed(left, right, snapshot, prior, |prev_l, prev_r, l, r| {
                prev_l >= prev_r && l < r
            })
        }
        Rule::All(rules) => rules.iter().all(|r| eval_rule(r, snapshot, prior)),
        Rule::Any(rules) => rules.iter().any(|r| eval_rule(r, snapshot, prior)),
        Rule::Not(inner) => !eval_rule(inner, snapshot, prior),
    }
}

fn crossed(
    left: &Operand,
    right: &Operand,
    snapshot: &Snapshot,
    prior: Option<&Snapshot>,
    test: fn(f64, f64, f64, f64) -> bool,
) -> bool {
    let Some(prior) = prior else {
        return false;
    };
    match (
        eval_operand(left, prior),
        eval_operand(right, prior),
        eval_operand(left, snapshot),
        eval_operand(right, snapshot),
    ) {
        (Some(prev_l), Some(prev_r), Some(l), Some(r)) => test(prev_l, prev_r, l, r),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use crate::domain::indicator::{IndicatorField, IndicatorId, IndicatorValue};
    use crate::domain::rule::{CmpOp, IndicatorRef};
    use chrono::NaiveDate;

    fn snapshot_with(close: f64, sma: Option<f64>) -> Snapshot {
        let bar = Bar {
            symbol: "AAPL".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 5000,
        };
        let mut snapshot = Snapshot::new(bar);
        snapshot.insert(IndicatorId::Sma(20), sma.map(IndicatorValue::Simple));
        snapshot
    }

    fn sma20() -> Operand {
        Operand::Indicator(IndicatorRef {
            id: IndicatorId::Sma(20),
            field: IndicatorField::Value,
        })
    }

    #[test]
    fn compare_true_and_false() {
        let snapshot = snapshot_with(100.0, Some(95.0));
        let rule = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Gt,
            right: sma20(),
        };
        assert!(eval_rule(&rule, &snapshot, None));

        let rule = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Lt,
            right: sma20(),
        };
        assert!(!eval_rule(&rule, &snapshot, None));
    }

    #[test]
    fn unavailable_operand_is_false() {
        let snapshot = snapshot_with(100.0, None);
        let rule = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Gt,
            right: sma20(),
        };
        assert!(!eval_rule(&rule, &snapshot, None));
    }

    #[test]
    fn boundary_follows_configured_operator() {
        let snapshot = snapshot_with(100.0, Some(100.0));
        let strict = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Gt,
            right: sma20(),
        };
        let inclusive = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Ge,
            right: sma20(),
        };
        assert!(!eval_rule(&strict, &snapshot, None));
        assert!(eval_rule(&inclusive, &snapshot, None));
    }

    #[test]
    fn crossover_needs_prior() {
        let rule = Rule::CrossAbove {
            left: Operand::Close,
            right: sma20(),
        };
        let current = snapshot_with(101.0, Some(100.0));
        assert!(!eval_rule(&rule, &current, None));

        let prior = snapshot_with(99.0, Some(100.0));
        assert!(eval_rule(&rule, &current, Some(&prior)));
    }

    #[test]
    fn no_cross_when_already_above() {
        let rule = Rule::CrossAbove {
            left: Operand::Close,
            right: sma20(),
        };
        let prior = snapshot_with(101.0, Some(100.0));
        let current = snapshot_with(102.0, Some(100.0));
        assert!(!eval_rule(&rule, &current, Some(&prior)));
    }

    #[test]
    fn cross_below_direction() {
        let rule = Rule::CrossBelow {
            left: Operand::Close,
            right: sma20(),
        };
        let prior = snapshot_with(101.0, Some(100.0));
        let current = snapshot_with(99.0, Some(100.0));
        assert!(eval_rule(&rule, &current, Some(&prior)));
        assert!(!eval_rule(&rule, &prior, Some(&current)));
    }

    #[test]
    fn crossover_unavailable_prior_indicator_is_false() {
        let rule = Rule::CrossAbove {
            left: Operand::Close,
            right: sma20(),
        };
        let prior = snapshot_with(99.0, None);
        let current = snapshot_with(101.0, Some(100.0));
        assert!(!eval_rule(&rule, &current, Some(&prior)));
    }

    #[test]
    fn composites() {
        let snapshot = snapshot_with(100.0, Some(95.0));
        let is_true = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Gt,
            right: Operand::Constant(50.0),
        };
        let is_false = Rule::Compare {
            left: Operand::Close,
            op: CmpOp::Lt,
            right: Operand::Constant(50.0),
        };

        let all = Rule::All(vec![is_true.clone(), is_false.clone()]);
        assert!(!eval_rule(&all, &snapshot, None));

        let any = Rule::Any(vec![is_true.clone(), is_false.clone()]);
        assert!(eval_rule(&any, &snapshot, None));

        let not = Rule::Not(Box::new(is_false));
        assert!(eval_rule(&not, &snapshot, None));
    }

    #[test]
    fn not_inverts_unavailable() {
        // absence makes the comparison false, so NOT of it is true
        let snapshot = snapshot_with(100.0, None);
        let rule = Rule::Not(Box::new(Rule::Compare {
            left: sma20(),
            op: CmpOp::Gt,
            right: Operand::Constant(0.0),
        }));
        assert!(eval_rule(&rule, &snapshot, None));
    }
}
