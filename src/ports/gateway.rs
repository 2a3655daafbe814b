//! Order execution port.
//!
//! Orders are submitted as intents carrying a caller-chosen idempotency
//! key; submitting the same key twice must not create a second order.
//! Order state is only ever learned by polling: `Unknown` means the
//! gateway could not say, and the caller must ask again rather than
//! assume either outcome.

use chrono::NaiveDateTime;

use crate::domain::error::EngineError;

/// Idempotency key, unique per (strategy, symbol, cycle, intent). The
/// intent tag keeps an exit and a same-cycle re-entry on the same symbol
/// from colliding at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentKey(pub String);

impl IntentKey {
    pub fn entry(strategy: &str, symbol: &str, cycle: u64) -> Self {
        IntentKey(format!("{}:{}:{}:entry", strategy, symbol, cycle))
    }

    pub fn exit(strategy: &str, symbol: &str, cycle: u64) -> Self {
        IntentKey(format!("{}:{}:{}:exit", strategy, symbol, cycle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub key: IntentKey,
    pub symbol: String,
    pub side: OrderSide,
    /// Always positive; direction is carried by `side`.
    pub quantity: i64,
}

/// Opaque handle for polling a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum OrderStatus {
    Pending,
    Filled {
        price: f64,
        quantity: i64,
        timestamp: NaiveDateTime,
    },
    Rejected(String),
    /// The gateway could not report; re-query, never assume.
    Unknown,
}

/// A position as the gateway sees it. During reconciliation this is the
/// source of truth.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPosition {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
}

pub trait ExecutionGateway {
    fn submit(&mut self, intent: OrderIntent) -> Result<OrderHandle, EngineError>;
    fn status(&mut self, handle: &OrderHandle) -> Result<OrderStatus, EngineError>;
    fn open_positions(&mut self) -> Result<Vec<GatewayPosition>, EngineError>;
    fn cancel(&mut self, handle: &OrderHandle) -> Result<(), EngineError>;
}
