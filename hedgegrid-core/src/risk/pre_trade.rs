//! Pre-submit position-size validation.
//!
//! The last gate before a create reaches the gateway: cumulative exposure
//! on the order's side (existing position + resting grid notional + the
//! new order) must stay under `max_position_pct` of total balance. The
//! path is fail-safe - anything it cannot evaluate, it rejects.

use crate::engine::traits::AccountBalance;
use rust_decimal::Decimal;
use std::fmt;
use tracing::warn;

/// Validation outcome for a proposed create.
#[derive(Debug, Clone, PartialEq)]
pub enum PreTradeResult {
    Allowed,
    Rejected(PreTradeRejection),
}

impl PreTradeResult {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, PreTradeResult::Allowed)
    }
}

/// Reason a create was refused before submission.
#[derive(Debug, Clone, PartialEq)]
pub enum PreTradeRejection {
    /// No account data available from the gateway.
    NoAccount,
    /// Total balance is zero or negative.
    NonPositiveBalance { total: Decimal },
    /// Cumulative side exposure would exceed the cap.
    ExposureLimit { combined: Decimal, limit: Decimal },
}

impl fmt::Display for PreTradeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreTradeRejection::NoAccount => write!(f, "no account for position validation"),
            PreTradeRejection::NonPositiveBalance { total } => {
                write!(f, "total balance non-positive: {total}")
            }
            PreTradeRejection::ExposureLimit { combined, limit } => {
                write!(f, "exposure {combined} exceeds limit {limit}")
            }
        }
    }
}

/// Validates cumulative per-side exposure against the account balance.
#[derive(Debug, Clone)]
pub struct ExposureValidator {
    max_position_pct: Decimal,
    enabled: bool,
}

impl ExposureValidator {
    pub fn new(max_position_pct: Decimal, enabled: bool) -> Self {
        Self {
            max_position_pct,
            enabled,
        }
    }

    /// `existing` is the open position notional on the order's side,
    /// `pending` the resting grid notional on that side, `new_notional`
    /// the proposed order's value.
    pub fn check(
        &self,
        new_notional: Decimal,
        existing: Decimal,
        pending: Decimal,
        balance: Option<&AccountBalance>,
    ) -> PreTradeResult {
        if !self.enabled {
            return PreTradeResult::Allowed;
        }

        let balance = match balance {
            Some(b) => b,
            None => {
                warn!("position validation rejected order: no account data");
                return PreTradeResult::Rejected(PreTradeRejection::NoAccount);
            }
        };
        if balance.total <= Decimal::ZERO {
            return PreTradeResult::Rejected(PreTradeRejection::NonPositiveBalance {
                total: balance.total,
            });
        }

        let limit = balance.total * self.max_position_pct;
        let combined = existing + pending + new_notional;
        if combined > limit {
            warn!(
                %combined, %limit, %existing, %pending, %new_notional,
                "position limit breach - order rejected"
            );
            return PreTradeResult::Rejected(PreTradeRejection::ExposureLimit { combined, limit });
        }
        PreTradeResult::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(total: Decimal) -> AccountBalance {
        AccountBalance { total, free: total }
    }

    #[test]
    fn allows_within_limit() {
        let v = ExposureValidator::new(dec!(0.95), true);
        let b = balance(dec!(10000));
        let result = v.check(dec!(100), dec!(500), dec!(400), Some(&b));
        assert!(result.is_allowed());
    }

    #[test]
    fn rejects_cumulative_breach() {
        let v = ExposureValidator::new(dec!(0.5), true);
        let b = balance(dec!(10000));
        // 3000 + 1500 + 600 = 5100 > 5000
        let result = v.check(dec!(600), dec!(3000), dec!(1500), Some(&b));
        assert_eq!(
            result,
            PreTradeResult::Rejected(PreTradeRejection::ExposureLimit {
                combined: dec!(5100),
                limit: dec!(5000),
            })
        );
    }

    #[test]
    fn rejects_without_account_data() {
        let v = ExposureValidator::new(dec!(0.95), true);
        assert!(!v.check(dec!(1), dec!(0), dec!(0), None).is_allowed());
    }

    #[test]
    fn rejects_non_positive_balance() {
        let v = ExposureValidator::new(dec!(0.95), true);
        let b = balance(dec!(0));
        assert!(!v.check(dec!(1), dec!(0), dec!(0), Some(&b)).is_allowed());
    }

    #[test]
    fn disabled_validator_allows_everything() {
        let v = ExposureValidator::new(dec!(0.01), false);
        assert!(v.check(dec!(1_000_000), dec!(0), dec!(0), None).is_allowed());
    }
}
