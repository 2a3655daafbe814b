//! INI configuration adapter.
//!
//! A bot file has one `[run]` section and one `[strategy:<id>]` section
//! per strategy:
//!
//! ```ini
//! [run]
//! data_dir = ./data
//! universe = AAPL, MSFT, NVDA
//! cycle_minutes = 5
//! risk_per_trade_pct = 1.0
//! slippage_pct = 0.05
//!
//! [strategy:crsi_dip]
//! name = Connors RSI dip buyer
//! entry = ALL(CONNORS_RSI(3,2,100) BELOW 10, close ABOVE SMA(200))
//! exit = CONNORS_RSI(3,2,100) AT_LEAST 70
//! rank_by = CONNORS_RSI(3,2,100)
//! rank_order = lowest
//! position_size = 0.25
//! stop_loss_pct = 2.0
//! max_positions = 4
//! session_end = 15:50
//! initial_capital = 25000
//! ```
//!
//! Rule strings use the expression language in `domain::rule_parser`.

use crate::adapters::paper_gateway::FillModel;
use crate::domain::error::EngineError;
use crate::domain::rule::Rule;
use crate::domain::rule_parser;
use crate::domain::strategy::{RankOrder, StopSource, StrategyId, StrategyRule};
use chrono::NaiveTime;
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

const STRATEGY_PREFIX: &str = "strategy:";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub universe: Vec<String>,
    pub cycle_minutes: i64,
    pub risk_per_trade_pct: Option<f64>,
    pub fill_model: FillModel,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub run: RunConfig,
    pub strategies: Vec<StrategyRule>,
}

pub fn load_file<P: AsRef<Path>>(path: P) -> Result<BotConfig, EngineError> {
    let path = path.as_ref();
    let mut ini = Ini::new_cs();
    ini.load(path).map_err(|e| EngineError::ConfigParse {
        file: path.display().to_string(),
        reason: e,
    })?;
    load(&ini)
}

pub fn load_str(content: &str) -> Result<BotConfig, EngineError> {
    let mut ini = Ini::new_cs();
    ini.read(content.to_string())
        .map_err(|e| EngineError::ConfigParse {
            file: "<inline>".to_string(),
            reason: e,
        })?;
    load(&ini)
}

fn load(ini: &Ini) -> Result<BotConfig, EngineError> {
    let run = load_run(ini)?;

    let mut sections: Vec<String> = ini
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(STRATEGY_PREFIX))
        .collect();
    sections.sort();
    if sections.is_empty() {
        return Err(EngineError::ConfigMissing {
            section: "strategy:<id>".to_string(),
            key: "entry".to_string(),
        });
    }

    let mut strategies = Vec::with_capacity(sections.len());
    for section in &sections {
        strategies.push(load_strategy(ini, section)?);
    }
    Ok(BotConfig { run, strategies })
}

fn load_run(ini: &Ini) -> Result<RunConfig, EngineError> {
    let data_dir = require(ini, "run", "data_dir")?;
    let universe: Vec<String> = require(ini, "run", "universe")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if universe.is_empty() {
        return Err(invalid("run", "universe", "no symbols listed"));
    }

    let cycle_minutes = int(ini, "run", "cycle_minutes")?.unwrap_or(5);
    if cycle_minutes <= 0 {
        return Err(invalid("run", "cycle_minutes", "must be positive"));
    }

    let risk_per_trade_pct = float(ini, "run", "risk_per_trade_pct")?;
    if let Some(pct) = risk_per_trade_pct
        && pct <= 0.0
    {
        return Err(invalid("run", "risk_per_trade_pct", "must be positive"));
    }

    let fill_model = FillModel {
        commission_per_trade: float(ini, "run", "commission_per_trade")?.unwrap_or(0.0),
        commission_pct: float(ini, "run", "commission_pct")?.unwrap_or(0.0),
        slippage_pct: float(ini, "run", "slippage_pct")?.unwrap_or(0.0),
    };
    if fill_model.commission_per_trade < 0.0 {
        return Err(invalid("run", "commission_per_trade", "must be non-negative"));
    }
    if fill_model.commission_pct < 0.0 {
        return Err(invalid("run", "commission_pct", "must be non-negative"));
    }
    if fill_model.slippage_pct < 0.0 {
        return Err(invalid("run", "slippage_pct", "must be non-negative"));
    }

    Ok(RunConfig {
        data_dir: PathBuf::from(data_dir),
        universe,
        cycle_minutes,
        risk_per_trade_pct,
        fill_model,
    })
}

fn load_strategy(ini: &Ini, section: &str) -> Result<StrategyRule, EngineError> {
    let id = section[STRATEGY_PREFIX.len()..].to_string();
    if id.is_empty() {
        return Err(invalid(section, "", "empty strategy id"));
    }

    let entry = rule(ini, section, "entry")?;
    let exit_signal = rule(ini, section, "exit")?;
    let trend_filter = match ini.get(section, "trend_filter") {
        Some(text) => Some(
            rule_parser::parse(&text)
                .map_err(|e| invalid(section, "trend_filter", &e.display_with_context(&text)))?,
        ),
        None => None,
    };

    let rank_text = require(ini, section, "rank_by")?;
    let rank_by = rule_parser::parse_operand(&rank_text)
        .map_err(|e| invalid(section, "rank_by", &e.display_with_context(&rank_text)))?;
    let rank_order = match require(ini, section, "rank_order")?.as_str() {
        "lowest" => RankOrder::LowestFirst,
        "highest" => RankOrder::HighestFirst,
        other => {
            return Err(invalid(
                section,
                "rank_order",
                &format!("expected lowest or highest, got {}", other),
            ));
        }
    };

    let stop_source = match (
        int(ini, section, "stop_atr_period")?,
        float(ini, section, "stop_atr_multiple")?,
    ) {
        (Some(period), Some(multiple)) if period > 0 && multiple > 0.0 => {
            StopSource::AtrMultiple {
                period: period as usize,
                multiple,
            }
        }
        (None, None) => StopSource::Percent,
        _ => {
            return Err(invalid(
                section,
                "stop_atr_period",
                "stop_atr_period and stop_atr_multiple must both be set and positive",
            ));
        }
    };

    let session_end_text = require(ini, section, "session_end")?;
    let session_end = NaiveTime::parse_from_str(&session_end_text, "%H:%M")
        .map_err(|e| invalid(section, "session_end", &format!("bad time: {}", e)))?;

    let position_size = float(ini, section, "position_size")?
        .ok_or_else(|| missing(section, "position_size"))?;
    let stop_loss_pct =
        float(ini, section, "stop_loss_pct")?.ok_or_else(|| missing(section, "stop_loss_pct"))?;
    let max_positions =
        int(ini, section, "max_positions")?.ok_or_else(|| missing(section, "max_positions"))?;
    if max_positions <= 0 {
        return Err(invalid(section, "max_positions", "must be positive"));
    }
    let initial_capital = float(ini, section, "initial_capital")?
        .ok_or_else(|| missing(section, "initial_capital"))?;

    let strategy = StrategyRule {
        id: StrategyId(id.clone()),
        name: ini.get(section, "name").unwrap_or(id),
        entry,
        exit_signal,
        trend_filter,
        rank_by,
        rank_order,
        position_size,
        stop_loss_pct,
        take_profit_pct: float(ini, section, "take_profit_pct")?,
        stop_source,
        max_positions: max_positions as usize,
        max_hold_minutes: int(ini, section, "max_hold_minutes")?,
        session_end,
        initial_capital,
    };
    strategy.validate()?;
    Ok(strategy)
}

fn rule(ini: &Ini, section: &str, key: &str) -> Result<Rule, EngineError> {
    let text = require(ini, section, key)?;
    rule_parser::parse(&text).map_err(|e| invalid(section, key, &e.display_with_context(&text)))
}

fn require(ini: &Ini, section: &str, key: &str) -> Result<String, EngineError> {
    ini.get(section, key).ok_or_else(|| missing(section, key))
}

fn int(ini: &Ini, section: &str, key: &str) -> Result<Option<i64>, EngineError> {
    ini.getint(section, key)
        .map_err(|e| invalid(section, key, &e))
}

fn float(ini: &Ini, section: &str, key: &str) -> Result<Option<f64>, EngineError> {
    ini.getfloat(section, key)
        .map_err(|e| invalid(section, key, &e))
}

fn missing(section: &str, key: &str) -> EngineError {
    EngineError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorId;

    const GOOD: &str = r#"
[run]
data_dir = ./data
universe = AAPL, MSFT , NVDA
cycle_minutes = 5
risk_per_trade_pct = 1.0
commission_per_trade = 1.0
slippage_pct = 0.05

[strategy:crsi_dip]
name = Connors RSI dip buyer
entry = ALL(CONNORS_RSI(3,2,100) BELOW 10, close ABOVE SMA(200))
exit = CONNORS_RSI(3,2,100) AT_LEAST 70
trend_filter = close ABOVE EMA(50)
rank_by = CONNORS_RSI(3,2,100)
rank_order = lowest
position_size = 0.25
stop_loss_pct = 2.0
take_profit_pct = 4.0
stop_atr_period = 14
stop_atr_multiple = 2.5
max_positions = 4
max_hold_minutes = 120
session_end = 15:50
initial_capital = 25000
"#;

    #[test]
    fn parses_full_config() {
        let config = load_str(GOOD).unwrap();
        assert_eq!(config.run.universe, vec!["AAPL", "MSFT", "NVDA"]);
        assert_eq!(config.run.cycle_minutes, 5);
        assert_eq!(config.run.risk_per_trade_pct, Some(1.0));
        assert_eq!(config.run.fill_model.commission_per_trade, 1.0);

        assert_eq!(config.strategies.len(), 1);
        let s = &config.strategies[0];
        assert_eq!(s.id.0, "crsi_dip");
        assert_eq!(s.name, "Connors RSI dip buyer");
        assert_eq!(s.rank_order, RankOrder::LowestFirst);
        assert_eq!(s.take_profit_pct, Some(4.0));
        assert_eq!(s.max_hold_minutes, Some(120));
        assert_eq!(
            s.stop_source,
            StopSource::AtrMultiple {
                period: 14,
                multiple: 2.5
            }
        );
        assert_eq!(
            s.session_end,
            NaiveTime::from_hms_opt(15, 50, 0).unwrap()
        );
        assert!(s.indicator_ids().contains(&IndicatorId::Atr(14)));
    }

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let config = load_str(
            "[run]\ndata_dir = ./data\nuniverse = AAA\n\n\
             [strategy:s]\nentry = close ABOVE 10\nexit = close BELOW 5\n\
             rank_by = close\nrank_order = highest\nposition_size = 0.5\n\
             stop_loss_pct = 1.0\nmax_positions = 2\nsession_end = 15:50\n\
             initial_capital = 1000\n",
        )
        .unwrap();
        assert_eq!(config.run.cycle_minutes, 5);
        assert_eq!(config.run.risk_per_trade_pct, None);
        let s = &config.strategies[0];
        assert_eq!(s.stop_source, StopSource::Percent);
        assert_eq!(s.take_profit_pct, None);
        assert_eq!(s.max_hold_minutes, None);
        assert_eq!(s.name, "s");
    }

    #[test]
    fn missing_required_key_is_reported() {
        let err = load_str("[run]\ndata_dir = ./data\nuniverse = AAA\n\n[strategy:s]\nexit = close BELOW 5\n")
            .unwrap_err();
        match err {
            EngineError::ConfigMissing { section, key } => {
                assert_eq!(section, "strategy:s");
                assert_eq!(key, "entry");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn bad_rule_reports_section_and_position() {
        let err = load_str(
            "[run]\ndata_dir = ./data\nuniverse = AAA\n\n\
             [strategy:s]\nentry = close WOBBLE 10\nexit = close BELOW 5\n\
             rank_by = close\nrank_order = lowest\nposition_size = 0.5\n\
             stop_loss_pct = 1.0\nmax_positions = 2\nsession_end = 15:50\n\
             initial_capital = 1000\n",
        )
        .unwrap_err();
        match err {
            EngineError::ConfigInvalid { section, key, .. } => {
                assert_eq!(section, "strategy:s");
                assert_eq!(key, "entry");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn no_strategy_sections_is_an_error() {
        let err = load_str("[run]\ndata_dir = ./data\nuniverse = AAA\n").unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { .. }));
    }

    #[test]
    fn half_specified_atr_stop_is_rejected() {
        let err = load_str(
            "[run]\ndata_dir = ./data\nuniverse = AAA\n\n\
             [strategy:s]\nentry = close ABOVE 10\nexit = close BELOW 5\n\
             rank_by = close\nrank_order = lowest\nposition_size = 0.5\n\
             stop_loss_pct = 1.0\nstop_atr_period = 14\nmax_positions = 2\n\
             session_end = 15:50\ninitial_capital = 1000\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { .. }));
    }

    #[test]
    fn strategies_load_in_section_name_order() {
        let config = load_str(
            "[run]\ndata_dir = ./data\nuniverse = AAA\n\n\
             [strategy:b]\nentry = close ABOVE 10\nexit = close BELOW 5\n\
             rank_by = close\nrank_order = lowest\nposition_size = 0.5\n\
             stop_loss_pct = 1.0\nmax_positions = 2\nsession_end = 15:50\n\
             initial_capital = 1000\n\n\
             [strategy:a]\nentry = close ABOVE 10\nexit = close BELOW 5\n\
             rank_by = close\nrank_order = lowest\nposition_size = 0.5\n\
             stop_loss_pct = 1.0\nmax_positions = 2\nsession_end = 15:50\n\
             initial_capital = 1000\n",
        )
        .unwrap();
        let ids: Vec<&str> = config.strategies.iter().map(|s| s.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
