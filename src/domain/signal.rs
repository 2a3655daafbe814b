//! Signal evaluation: one (strategy, symbol) pair to one decision.
//!
//! Pure function of the inputs; no clock reads, no I/O. With an open
//! position only exits are considered, without one only entries. Exit
//! checks run in a fixed priority order so that capital protection can
//! never be shadowed by a weaker exit firing in the same cycle.

use std::fmt;

use chrono::NaiveDateTime;

use crate::domain::position::Position;
use crate::domain::rule_eval::{eval_operand, eval_rule};
use crate::domain::snapshot::Snapshot;
use crate::domain::strategy::StrategyRule;

/// Why a position is being closed, strongest first. The variant order is
/// the check order in `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Stop,
    Target,
    Signal,
    TrendFilter,
    Deadline,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Stop => "stop",
            ExitReason::Target => "target",
            ExitReason::Signal => "signal",
            ExitReason::TrendFilter => "trend_filter",
            ExitReason::Deadline => "deadline",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Enter { score: f64 },
    Exit(ExitReason),
    Hold,
}

pub fn evaluate(
    strategy: &StrategyRule,
    snapshot: &Snapshot,
    prior: Option<&Snapshot>,
    position: Option<&Position>,
    now: NaiveDateTime,
) -> Decision {
    match position {
        Some(position) => evaluate_exit(strategy, snapshot, prior, position, now),
        None => evaluate_entry(strategy, snapshot, prior, now),
    }
}

fn evaluate_exit(
    strategy: &StrategyRule,
    snapshot: &Snapshot,
    prior: Option<&Snapshot>,
    position: &Position,
    now: NaiveDateTime,
) -> Decision {
    let price = snapshot.bar.close;

    if position.should_stop(price) {
        return Decision::Exit(ExitReason::Stop);
    }
    if position.should_take_profit(price) {
        return Decision::Exit(ExitReason::Target);
    }
    if eval_rule(&strategy.exit_signal, snapshot, prior) {
        return Decision::Exit(ExitReason::Signal);
    }
    if let Some(filter) = &strategy.trend_filter
        && !eval_rule(filter, snapshot, prior)
    {
        return Decision::Exit(ExitReason::TrendFilter);
    }
    if position.past_deadline(now) || now.time() >= strategy.session_end {
        return Decision::Exit(ExitReason::Deadline);
    }
    Decision::Hold
}

fn evaluate_entry(
    strategy: &StrategyRule,
    snapshot: &Snapshot,
    prior: Option<&Snapshot>,
    now: NaiveDateTime,
) -> Decision {
    // no new entries at or past the session deadline; gated on the
    // cycle clock, not the bar timestamp, so a stale snapshot cannot
    // admit a late entry
    if now.time() >= strategy.session_end {
        return Decision::Hold;
    }
    if let Some(filter) = &strategy.trend_filter
        && !eval_rule(filter, snapshot, prior)
    {
        return Decision::Hold;
    }
    if !eval_rule(&strategy.entry, snapshot, prior) {
        return Decision::Hold;
    }
    // a candidate that cannot be ranked is not a candidate
    match eval_operand(&strategy.rank_by, snapshot) {
        Some(score) => Decision::Enter { score },
        None => Decision::Hold,
    }
}
