//! Market data port.

use chrono::NaiveDateTime;

use crate::domain::bar::Bar;
use crate::domain::error::EngineError;

pub trait BarSource {
    /// Bars for `symbol` strictly after `since` (all bars when `None`),
    /// in ascending timestamp order. An empty vec is a normal answer
    /// mid-session, not an error.
    fn fetch_bars(
        &mut self,
        symbol: &str,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, EngineError>;
}
