//! Order intents, live-order snapshots, diff results, and gateway events.

use crate::core::errors::DomainError;
use crate::core::types::{LiquiditySide, OrderStatus, Side};
use rust_decimal::Decimal;
use std::fmt;

/// Immutable snapshot of an order observed on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveOrder {
    pub client_order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub qty: Decimal,
    pub status: OrderStatus,
}

impl LiveOrder {
    pub fn new(
        client_order_id: impl Into<String>,
        side: Side,
        price: Decimal,
        qty: Decimal,
        status: OrderStatus,
    ) -> Result<Self, DomainError> {
        let client_order_id = client_order_id.into();
        if client_order_id.is_empty() {
            return Err(DomainError::EmptyClientOrderId);
        }
        if price <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice(price));
        }
        if qty <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQty(qty));
        }
        Ok(Self {
            client_order_id,
            side,
            price,
            qty,
            status,
        })
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}

/// Venue order type for a create intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderKind {
    /// Resting limit order.
    #[default]
    Limit,
    /// Stop-market triggered at `trigger_price`.
    StopMarket,
    /// Immediate market order.
    Market,
}

/// Execution flags and free-text tag carried alongside an intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OrderMeta {
    pub kind: OrderKind,
    pub post_only: bool,
    pub reduce_only: bool,
    pub tag: Option<String>,
}

impl OrderMeta {
    /// Grid entries rest as post-only makers.
    pub fn grid(tag: Option<String>) -> Self {
        Self {
            kind: OrderKind::Limit,
            post_only: true,
            reduce_only: false,
            tag,
        }
    }

    /// Take-profit: reduce-only limit.
    pub fn take_profit() -> Self {
        Self {
            kind: OrderKind::Limit,
            post_only: false,
            reduce_only: true,
            tag: None,
        }
    }

    /// Stop-loss: reduce-only stop-market.
    pub fn stop_loss() -> Self {
        Self {
            kind: OrderKind::StopMarket,
            post_only: false,
            reduce_only: true,
            tag: None,
        }
    }

    /// Emergency close: reduce-only market.
    pub fn market_close() -> Self {
        Self {
            kind: OrderKind::Market,
            post_only: false,
            reduce_only: true,
            tag: None,
        }
    }
}

/// A new order to submit.
///
/// `side` identifies the hedge-mode position the order belongs to; for
/// reduce-only intents the venue adapter derives the aggressor side from it.
/// `retry_count` and `original_price` are populated by the post-only retry
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreateIntent {
    pub client_order_id: String,
    pub side: Side,
    pub price: Decimal,
    /// Trigger for `OrderKind::StopMarket`.
    pub trigger_price: Option<Decimal>,
    pub qty: Decimal,
    pub meta: OrderMeta,
    pub retry_count: u32,
    pub original_price: Option<Decimal>,
}

impl CreateIntent {
    pub fn new(
        client_order_id: impl Into<String>,
        side: Side,
        price: Decimal,
        qty: Decimal,
        meta: OrderMeta,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            side,
            price,
            trigger_price: None,
            qty,
            meta,
            retry_count: 0,
            original_price: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Decimal) -> Self {
        self.trigger_price = Some(trigger);
        self
    }

    #[inline]
    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }
}

/// Cancellation of a resting order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelIntent {
    pub client_order_id: String,
}

impl CancelIntent {
    pub fn new(client_order_id: impl Into<String>) -> Self {
        Self {
            client_order_id: client_order_id.into(),
        }
    }
}

/// Atomic cancel-replace: `client_order_id` goes away, `replace_with`
/// carries the new parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplaceIntent {
    pub client_order_id: String,
    pub replace_with: String,
    pub side: Side,
    pub price: Decimal,
    pub qty: Decimal,
    pub meta: OrderMeta,
}

/// An operation the controller may submit to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderIntent {
    Create(CreateIntent),
    Cancel(CancelIntent),
    Replace(ReplaceIntent),
}

impl OrderIntent {
    pub fn client_order_id(&self) -> &str {
        match self {
            OrderIntent::Create(c) => &c.client_order_id,
            OrderIntent::Cancel(c) => &c.client_order_id,
            OrderIntent::Replace(r) => &r.client_order_id,
        }
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderIntent::Create(c) => write!(
                f,
                "CREATE {} {} {}@{}",
                c.client_order_id, c.side, c.qty, c.price
            ),
            OrderIntent::Cancel(c) => write!(f, "CANCEL {}", c.client_order_id),
            OrderIntent::Replace(r) => write!(
                f,
                "REPLACE {} -> {} {}@{}",
                r.client_order_id, r.replace_with, r.qty, r.price
            ),
        }
    }
}

/// Minimal operation set produced by the diff engine.
///
/// The three lists reference disjoint client order ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    pub adds: Vec<CreateIntent>,
    pub cancels: Vec<CancelIntent>,
    pub replaces: Vec<ReplaceIntent>,
}

impl DiffResult {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.cancels.is_empty() && self.replaces.is_empty()
    }

    #[inline]
    pub fn op_count(&self) -> usize {
        self.adds.len() + self.cancels.len() + self.replaces.len()
    }
}

/// Order lifecycle events delivered by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Accepted {
        client_order_id: String,
        ts_event: i64,
    },
    Canceled {
        client_order_id: String,
        ts_event: i64,
    },
    Expired {
        client_order_id: String,
        ts_event: i64,
    },
    Rejected {
        client_order_id: String,
        reason: String,
        ts_event: i64,
    },
    Denied {
        client_order_id: String,
        reason: String,
    },
    CancelRejected {
        client_order_id: String,
        reason: String,
    },
    Filled {
        client_order_id: String,
        last_px: Decimal,
        last_qty: Decimal,
        liquidity: LiquiditySide,
        ts_event: i64,
    },
}

impl OrderEvent {
    pub fn client_order_id(&self) -> &str {
        match self {
            OrderEvent::Accepted {
                client_order_id, ..
            }
            | OrderEvent::Canceled {
                client_order_id, ..
            }
            | OrderEvent::Expired {
                client_order_id, ..
            }
            | OrderEvent::Rejected {
                client_order_id, ..
            }
            | OrderEvent::Denied {
                client_order_id, ..
            }
            | OrderEvent::CancelRejected {
                client_order_id, ..
            }
            | OrderEvent::Filled {
                client_order_id, ..
            } => client_order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn live_order_validation() {
        assert!(LiveOrder::new("", Side::Long, dec!(1), dec!(1), OrderStatus::Open).is_err());
        assert!(LiveOrder::new("x", Side::Long, dec!(0), dec!(1), OrderStatus::Open).is_err());
        assert!(LiveOrder::new("x", Side::Long, dec!(1), dec!(0), OrderStatus::Open).is_err());
        let order = LiveOrder::new("x", Side::Long, dec!(1), dec!(1), OrderStatus::Open).unwrap();
        assert!(order.is_open());
    }

    #[test]
    fn diff_result_emptiness() {
        let mut result = DiffResult::default();
        assert!(result.is_empty());
        result
            .cancels
            .push(CancelIntent::new("HG1-L01-1-1"));
        assert!(!result.is_empty());
        assert_eq!(result.op_count(), 1);
    }

    #[test]
    fn meta_constructors_set_flags() {
        assert!(OrderMeta::grid(None).post_only);
        assert!(OrderMeta::take_profit().reduce_only);
        assert_eq!(OrderMeta::stop_loss().kind, OrderKind::StopMarket);
        assert_eq!(OrderMeta::market_close().kind, OrderKind::Market);
    }
}
