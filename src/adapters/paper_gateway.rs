//! Paper execution gateway.
//!
//! Simulates a broker against the price board: orders fill immediately
//! at the last posted mark, adjusted for slippage, with commission
//! folded into the effective per-share price. Intent keys are honoured
//! strictly: resubmitting a key returns the original handle and never
//! books a second fill.
//!
//! Fault dials (`reject_symbol`, `defer_symbol`) exist so integration
//! tests can exercise rejection and re-query paths without a live
//! broker.

use crate::adapters::price_board::PriceBoard;
use crate::domain::error::EngineError;
use crate::ports::gateway::{
    ExecutionGateway, GatewayPosition, IntentKey, OrderHandle, OrderIntent, OrderSide, OrderStatus,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct FillModel {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl FillModel {
    fn commission(&self, trade_value: f64) -> f64 {
        self.commission_per_trade + trade_value * (self.commission_pct / 100.0)
    }

    /// Per-share price after slippage and commission. Buys pay up,
    /// sells receive less.
    fn effective_price(&self, mark: f64, side: OrderSide, quantity: i64) -> f64 {
        let slipped = match side {
            OrderSide::Buy => mark * (1.0 + self.slippage_pct / 100.0),
            OrderSide::Sell => mark * (1.0 - self.slippage_pct / 100.0),
        };
        let value = slipped * quantity as f64;
        let commission = self.commission(value);
        match side {
            OrderSide::Buy => (value + commission) / quantity as f64,
            OrderSide::Sell => (value - commission) / quantity as f64,
        }
    }
}

pub struct PaperGateway {
    board: PriceBoard,
    fill_model: FillModel,
    orders: HashMap<IntentKey, OrderHandle>,
    statuses: HashMap<OrderHandle, OrderStatus>,
    positions: HashMap<String, GatewayPosition>,
    /// Deferred intents awaiting a re-query; the bool flips after the
    /// first Unknown answer.
    deferred: HashMap<OrderHandle, (OrderIntent, bool)>,
    reject_symbols: HashSet<String>,
    defer_symbols: HashSet<String>,
    next_handle: u64,
}

impl PaperGateway {
    pub fn new(board: PriceBoard, fill_model: FillModel) -> Self {
        Self {
            board,
            fill_model,
            orders: HashMap::new(),
            statuses: HashMap::new(),
            positions: HashMap::new(),
            deferred: HashMap::new(),
            reject_symbols: HashSet::new(),
            defer_symbols: HashSet::new(),
            next_handle: 1,
        }
    }

    /// Every order for this symbol comes back `Rejected`.
    pub fn reject_symbol(&mut self, symbol: &str) {
        self.reject_symbols.insert(symbol.to_string());
    }

    /// Orders for this symbol answer `Unknown` once, then fill on the
    /// next poll.
    pub fn defer_symbol(&mut self, symbol: &str) {
        self.defer_symbols.insert(symbol.to_string());
    }

    fn fill(&mut self, intent: &OrderIntent) -> OrderStatus {
        let Some(mark) = self.board.last(&intent.symbol) else {
            return OrderStatus::Rejected(format!("no mark for {}", intent.symbol));
        };
        let price = self
            .fill_model
            .effective_price(mark.price, intent.side, intent.quantity);
        let signed = match intent.side {
            OrderSide::Buy => intent.quantity,
            OrderSide::Sell => -intent.quantity,
        };
        self.book(&intent.symbol, signed, price);
        OrderStatus::Filled {
            price,
            quantity: intent.quantity,
            timestamp: mark.timestamp,
        }
    }

    fn book(&mut self, symbol: &str, signed_quantity: i64, price: f64) {
        let entry = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| GatewayPosition {
                symbol: symbol.to_string(),
                quantity: 0,
                entry_price: price,
            });
        if entry.quantity == 0 {
            entry.entry_price = price;
        }
        entry.quantity += signed_quantity;
        if entry.quantity == 0 {
            self.positions.remove(symbol);
        }
    }
}

impl ExecutionGateway for PaperGateway {
    fn submit(&mut self, intent: OrderIntent) -> Result<OrderHandle, EngineError> {
        if let Some(handle) = self.orders.get(&intent.key) {
            return Ok(handle.clone());
        }
        let handle = OrderHandle(self.next_handle);
        self.next_handle += 1;
        self.orders.insert(intent.key.clone(), handle.clone());

        let status = if self.reject_symbols.contains(&intent.symbol) {
            OrderStatus::Rejected("rejected by broker".to_string())
        } else if self.defer_symbols.contains(&intent.symbol) {
            self.deferred.insert(handle.clone(), (intent, false));
            OrderStatus::Unknown
        } else {
            self.fill(&intent)
        };
        self.statuses.insert(handle.clone(), status);
        Ok(handle)
    }

    fn status(&mut self, handle: &OrderHandle) -> Result<OrderStatus, EngineError> {
        let ready = match self.deferred.get_mut(handle) {
            Some((_, polled @ false)) => {
                *polled = true;
                false
            }
            Some((_, true)) => true,
            None => false,
        };
        if ready
            && let Some((intent, _)) = self.deferred.remove(handle)
        {
            let status = self.fill(&intent);
            self.statuses.insert(handle.clone(), status);
        }
        self.statuses
            .get(handle)
            .cloned()
            .ok_or_else(|| EngineError::Gateway {
                reason: format!("unknown order handle {}", handle.0),
            })
    }

    fn open_positions(&mut self) -> Result<Vec<GatewayPosition>, EngineError> {
        let mut positions: Vec<GatewayPosition> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    fn cancel(&mut self, handle: &OrderHandle) -> Result<(), EngineError> {
        match self.statuses.get(handle) {
            Some(OrderStatus::Pending) | Some(OrderStatus::Unknown) => {
                self.deferred.remove(handle);
                self.statuses
                    .insert(handle.clone(), OrderStatus::Rejected("cancelled".to_string()));
                Ok(())
            }
            Some(_) => Err(EngineError::Gateway {
                reason: format!("order {} already final", handle.0),
            }),
            None => Err(EngineError::Gateway {
                reason: format!("unknown order handle {}", handle.0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn buy(key: &str, symbol: &str, quantity: i64) -> OrderIntent {
        OrderIntent {
            key: IntentKey(key.to_string()),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            quantity,
        }
    }

    fn sell(key: &str, symbol: &str, quantity: i64) -> OrderIntent {
        OrderIntent {
            key: IntentKey(key.to_string()),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            quantity,
        }
    }

    fn gateway_with_mark(symbol: &str, price: f64, fill_model: FillModel) -> PaperGateway {
        let board = PriceBoard::new();
        board.post(symbol, price, ts());
        PaperGateway::new(board, fill_model)
    }

    #[test]
    fn fills_at_mark_with_no_frictions() {
        let mut gw = gateway_with_mark("AAA", 10.0, FillModel::default());
        let handle = gw.submit(buy("k1", "AAA", 5)).unwrap();
        match gw.status(&handle).unwrap() {
            OrderStatus::Filled {
                price,
                quantity,
                timestamp,
            } => {
                assert_eq!(price, 10.0);
                assert_eq!(quantity, 5);
                assert_eq!(timestamp, ts());
            }
            other => panic!("unexpected status: {:?}", other),
        }
        let positions = gw.open_positions().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, 5);
    }

    #[test]
    fn buy_pays_slippage_and_commission() {
        let model = FillModel {
            commission_per_trade: 10.0,
            commission_pct: 0.0,
            slippage_pct: 1.0,
        };
        let mut gw = gateway_with_mark("AAA", 100.0, model);
        let handle = gw.submit(buy("k1", "AAA", 10)).unwrap();
        // 100 * 1.01 = 101 per share, plus 10 flat over 10 shares.
        match gw.status(&handle).unwrap() {
            OrderStatus::Filled { price, .. } => assert!((price - 102.0).abs() < 1e-9),
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn sell_receives_less() {
        let model = FillModel {
            commission_per_trade: 0.0,
            commission_pct: 1.0,
            slippage_pct: 0.0,
        };
        let mut gw = gateway_with_mark("AAA", 100.0, model);
        gw.submit(buy("k1", "AAA", 10)).unwrap();
        let handle = gw.submit(sell("k2", "AAA", 10)).unwrap();
        // Value 1000, commission 10, so 99 per share.
        match gw.status(&handle).unwrap() {
            OrderStatus::Filled { price, .. } => assert!((price - 99.0).abs() < 1e-9),
            other => panic!("unexpected status: {:?}", other),
        }
        assert!(gw.open_positions().unwrap().is_empty());
    }

    #[test]
    fn duplicate_key_returns_same_handle_and_books_once() {
        let mut gw = gateway_with_mark("AAA", 10.0, FillModel::default());
        let h1 = gw.submit(buy("k1", "AAA", 5)).unwrap();
        let h2 = gw.submit(buy("k1", "AAA", 5)).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(gw.open_positions().unwrap()[0].quantity, 5);
    }

    #[test]
    fn no_mark_rejects() {
        let board = PriceBoard::new();
        let mut gw = PaperGateway::new(board, FillModel::default());
        let handle = gw.submit(buy("k1", "AAA", 5)).unwrap();
        assert!(matches!(
            gw.status(&handle).unwrap(),
            OrderStatus::Rejected(_)
        ));
    }

    #[test]
    fn rejected_symbol_never_fills() {
        let mut gw = gateway_with_mark("AAA", 10.0, FillModel::default());
        gw.reject_symbol("AAA");
        let handle = gw.submit(buy("k1", "AAA", 5)).unwrap();
        assert!(matches!(
            gw.status(&handle).unwrap(),
            OrderStatus::Rejected(_)
        ));
        assert!(gw.open_positions().unwrap().is_empty());
    }

    #[test]
    fn deferred_symbol_is_unknown_then_fills() {
        let mut gw = gateway_with_mark("AAA", 10.0, FillModel::default());
        gw.defer_symbol("AAA");
        let handle = gw.submit(buy("k1", "AAA", 5)).unwrap();
        assert_eq!(gw.status(&handle).unwrap(), OrderStatus::Unknown);
        assert!(matches!(
            gw.status(&handle).unwrap(),
            OrderStatus::Filled { .. }
        ));
        assert_eq!(gw.open_positions().unwrap()[0].quantity, 5);
    }

    #[test]
    fn cancel_only_applies_to_unfinished_orders() {
        let mut gw = gateway_with_mark("AAA", 10.0, FillModel::default());
        gw.defer_symbol("AAA");
        let handle = gw.submit(buy("k1", "AAA", 5)).unwrap();
        gw.cancel(&handle).unwrap();
        assert!(matches!(
            gw.status(&handle).unwrap(),
            OrderStatus::Rejected(_)
        ));

        let handle2 = gw.submit(buy("k2", "BBB", 1)).unwrap();
        // BBB has no mark so the order is already final.
        assert!(gw.cancel(&handle2).is_err());
    }
}
