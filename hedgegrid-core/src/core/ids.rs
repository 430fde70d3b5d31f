//! Client order id grammar
//!
//! Grid orders:  `{strategy}-{L|S}{level:02}-{ts_ms}-{counter}`
//! Exit orders:  `{strategy}-{TP|SL}-{L|S}{level:02}-{ts_ms}-{counter}`
//! Retries:      base id + `-R{attempt}`
//!
//! The counter is a process-wide atomic rendered in base-36, so
//! `(timestamp, counter)` is strictly monotonic per process and distinct
//! `(side, level, counter)` triples always yield distinct ids. Total length
//! never exceeds the 36-character venue limit; under length pressure the
//! timestamp segment is compressed to its trailing digits - down to the
//! width that fits - before anything else is touched.

use crate::core::errors::{DomainError, IdError};
use crate::core::types::Side;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Venue-imposed cap on client order id length.
pub const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

/// Trailing digits kept when the timestamp segment is compressed.
const TS_COMPACT_WIDTH: usize = 10;

/// Exit order kind embedded in the id (disjoint namespace from grid ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    TakeProfit,
    StopLoss,
}

impl ExitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitKind::TakeProfit => "TP",
            ExitKind::StopLoss => "SL",
        }
    }

    pub fn from_segment(seg: &str) -> Option<ExitKind> {
        match seg {
            "TP" => Some(ExitKind::TakeProfit),
            "SL" => Some(ExitKind::StopLoss),
            _ => None,
        }
    }

    /// The paired exit that OCO cancellation targets.
    pub fn counterpart(&self) -> ExitKind {
        match self {
            ExitKind::TakeProfit => ExitKind::StopLoss,
            ExitKind::StopLoss => ExitKind::TakeProfit,
        }
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured form of a parsed client order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOrderId {
    pub strategy: String,
    pub exit: Option<ExitKind>,
    pub side: Side,
    pub level: u32,
    pub ts_ms: i64,
    pub counter: u64,
    pub retry: Option<u32>,
}

/// Fill-tracking key for a (side, level) pair, e.g. `LONG-3`.
///
/// Level 0 is reserved for positions reconciled from a previous session.
pub fn fill_key(side: Side, level: u32) -> String {
    format!("{side}-{level}")
}

/// True for ids in the exit namespace (`-TP-` / `-SL-` fixed substrings).
#[inline]
pub fn is_exit_order_id(cid: &str) -> bool {
    cid.contains("-TP-") || cid.contains("-SL-")
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for c in s.chars() {
        let digit = c.to_digit(36)?;
        value = value.checked_mul(36)?.checked_add(digit as u64)?;
    }
    Some(value)
}

fn compact_ts(ts_ms: i64) -> String {
    let full = ts_ms.to_string();
    if full.len() > TS_COMPACT_WIDTH {
        full[full.len() - TS_COMPACT_WIDTH..].to_string()
    } else {
        full
    }
}

fn assemble(
    strategy: &str,
    kind: Option<ExitKind>,
    side: Side,
    level: u32,
    ts_seg: &str,
    counter: u64,
) -> String {
    match kind {
        Some(kind) => format!(
            "{strategy}-{kind}-{}{:02}-{}-{}",
            side.abbrev(),
            level,
            ts_seg,
            to_base36(counter)
        ),
        None => format!(
            "{strategy}-{}{:02}-{}-{}",
            side.abbrev(),
            level,
            ts_seg,
            to_base36(counter)
        ),
    }
}

fn format_order_id(
    strategy: &str,
    kind: Option<ExitKind>,
    side: Side,
    level: u32,
    ts_ms: i64,
    counter: u64,
) -> String {
    let full = assemble(strategy, kind, side, level, &ts_ms.to_string(), counter);
    if full.len() <= MAX_CLIENT_ORDER_ID_LEN {
        return full;
    }
    let ts_seg = compact_ts(ts_ms);
    let compact = assemble(strategy, kind, side, level, &ts_seg, counter);
    if compact.len() <= MAX_CLIENT_ORDER_ID_LEN {
        return compact;
    }
    // Still over (wide strategy/level segments): shrink the timestamp to
    // exactly the width that fits, keeping at least one digit so the id
    // stays parseable.
    let overflow = compact.len() - MAX_CLIENT_ORDER_ID_LEN;
    let keep = ts_seg.len().saturating_sub(overflow).max(1);
    assemble(
        strategy,
        kind,
        side,
        level,
        &ts_seg[ts_seg.len() - keep..],
        counter,
    )
}

/// Format a grid order id.
pub fn format_grid_order_id(
    strategy: &str,
    side: Side,
    level: u32,
    ts_ms: i64,
    counter: u64,
) -> String {
    format_order_id(strategy, None, side, level, ts_ms, counter)
}

/// Format a TP/SL exit order id.
pub fn format_exit_order_id(
    strategy: &str,
    kind: ExitKind,
    side: Side,
    level: u32,
    ts_ms: i64,
    counter: u64,
) -> String {
    format_order_id(strategy, Some(kind), side, level, ts_ms, counter)
}

fn strip_retry_suffix(cid: &str) -> &str {
    if let Some(idx) = cid.rfind("-R") {
        let tail = &cid[idx + 2..];
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            return &cid[..idx];
        }
    }
    cid
}

/// Derive the retry id for `attempt`, compressing the timestamp segment
/// before truncating anything else. The `-R{attempt}` marker is always
/// kept whole so the result still parses as a retry.
pub fn retry_order_id(cid: &str, attempt: u32) -> String {
    let base = strip_retry_suffix(cid);
    let suffix = format!("-R{attempt}");
    let candidate = format!("{base}{suffix}");
    if candidate.len() <= MAX_CLIENT_ORDER_ID_LEN {
        return candidate;
    }

    // Compress the timestamp segment (index 2 for grid, 3 for exit ids)
    // to exactly the width that fits.
    let mut segs: Vec<String> = base.split('-').map(str::to_string).collect();
    let ts_idx = if segs.len() >= 2 && ExitKind::from_segment(&segs[1]).is_some() {
        3
    } else {
        2
    };
    let shrunk = segs.get(ts_idx).and_then(|seg| {
        if seg.is_empty() || !seg.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let overflow = candidate.len() - MAX_CLIENT_ORDER_ID_LEN;
        let keep = seg.len().saturating_sub(overflow).max(1);
        (keep < seg.len()).then(|| seg[seg.len() - keep..].to_string())
    });
    if let Some(seg) = shrunk {
        segs[ts_idx] = seg;
    }

    // Under extreme pressure the head gives way, never the suffix.
    let mut head = segs.join("-");
    let budget = MAX_CLIENT_ORDER_ID_LEN - suffix.len();
    if head.len() > budget {
        head.truncate(budget);
    }
    format!("{head}{suffix}")
}

/// Parse a client order id back into its structured form.
pub fn parse_client_order_id(cid: &str) -> Result<ParsedOrderId, IdError> {
    if cid.is_empty() {
        return Err(IdError::Malformed(cid.to_string()));
    }
    let mut segs: Vec<&str> = cid.split('-').collect();

    let retry = match segs.last() {
        Some(last) if last.len() >= 2 && last.starts_with('R') => {
            let digits = &last[1..];
            if digits.chars().all(|c| c.is_ascii_digit()) && segs.len() > 4 {
                let attempt = digits
                    .parse::<u32>()
                    .map_err(|_| IdError::Malformed(cid.to_string()))?;
                segs.pop();
                Some(attempt)
            } else {
                None
            }
        }
        _ => None,
    };

    let (strategy, exit, side_level, ts_seg, ctr_seg) = match segs.as_slice() {
        [strategy, side_level, ts, ctr] => (*strategy, None, *side_level, *ts, *ctr),
        [strategy, kind, side_level, ts, ctr] => {
            let exit =
                ExitKind::from_segment(kind).ok_or_else(|| IdError::Malformed(cid.to_string()))?;
            (*strategy, Some(exit), *side_level, *ts, *ctr)
        }
        _ => return Err(IdError::Malformed(cid.to_string())),
    };

    if strategy.is_empty() {
        return Err(IdError::Malformed(cid.to_string()));
    }

    let mut chars = side_level.chars();
    let side_char = chars
        .next()
        .ok_or_else(|| IdError::BadLevel(side_level.to_string()))?;
    let side = Side::from_abbrev(side_char).ok_or(IdError::BadSide(side_char))?;
    let level_digits = chars.as_str();
    if level_digits.is_empty() || !level_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(IdError::BadLevel(side_level.to_string()));
    }
    let level = level_digits
        .parse::<u32>()
        .map_err(|_| IdError::BadLevel(side_level.to_string()))?;

    let ts_ms = ts_seg
        .parse::<i64>()
        .map_err(|_| IdError::BadTimestamp(ts_seg.to_string()))?;
    let counter = from_base36(ctr_seg).ok_or_else(|| IdError::BadCounter(ctr_seg.to_string()))?;

    Ok(ParsedOrderId {
        strategy: strategy.to_string(),
        exit,
        side,
        level,
        ts_ms,
        counter,
        retry,
    })
}

/// Generates unique client order ids for one strategy instance.
pub struct OrderIdGenerator {
    strategy: String,
    counter: AtomicU64,
}

impl OrderIdGenerator {
    /// `strategy` must be non-empty and must not contain `-` (it is the
    /// first id segment and the parse is separator-based).
    pub fn new(strategy: &str) -> Result<Self, DomainError> {
        if strategy.is_empty() || strategy.contains('-') {
            return Err(DomainError::EmptyStrategyName);
        }
        Ok(Self {
            strategy: strategy.to_string(),
            counter: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    fn next_counter(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn next_grid_id(&self, side: Side, level: u32, ts_ms: i64) -> String {
        format_grid_order_id(&self.strategy, side, level, ts_ms, self.next_counter())
    }

    pub fn next_exit_id(&self, kind: ExitKind, side: Side, level: u32, ts_ms: i64) -> String {
        format_exit_order_id(&self.strategy, kind, side, level, ts_ms, self.next_counter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TS: i64 = 1_717_171_717_171;

    #[test]
    fn grid_id_round_trip() {
        let cid = format_grid_order_id("HG1", Side::Long, 1, TS, 42);
        let parsed = parse_client_order_id(&cid).unwrap();
        assert_eq!(parsed.strategy, "HG1");
        assert_eq!(parsed.exit, None);
        assert_eq!(parsed.side, Side::Long);
        assert_eq!(parsed.level, 1);
        assert_eq!(parsed.ts_ms, TS);
        assert_eq!(parsed.counter, 42);
        assert_eq!(parsed.retry, None);
    }

    #[test]
    fn exit_id_round_trip() {
        let cid = format_exit_order_id("HG1", ExitKind::StopLoss, Side::Short, 5, TS, 7);
        assert!(cid.contains("-SL-S05-"));
        let parsed = parse_client_order_id(&cid).unwrap();
        assert_eq!(parsed.exit, Some(ExitKind::StopLoss));
        assert_eq!(parsed.side, Side::Short);
        assert_eq!(parsed.level, 5);
    }

    #[test]
    fn namespaces_are_disjoint() {
        let grid = format_grid_order_id("HG1", Side::Long, 1, TS, 1);
        let exit = format_exit_order_id("HG1", ExitKind::TakeProfit, Side::Long, 1, TS, 2);
        assert!(!is_exit_order_id(&grid));
        assert!(is_exit_order_id(&exit));
    }

    #[test]
    fn ids_stay_within_venue_limit() {
        for level in [1u32, 99, 12345] {
            let cid = format_grid_order_id("HG1", Side::Short, level, TS, u64::MAX);
            assert!(cid.len() <= MAX_CLIENT_ORDER_ID_LEN, "{cid}");
            let cid = format_exit_order_id("HG1", ExitKind::TakeProfit, Side::Short, level, TS, u64::MAX);
            assert!(cid.len() <= MAX_CLIENT_ORDER_ID_LEN, "{cid}");
        }
    }

    #[test]
    fn generator_ids_are_distinct() {
        let ids = OrderIdGenerator::new("HG1").unwrap();
        let mut seen = std::collections::HashSet::new();
        for level in 1..=10 {
            for side in [Side::Long, Side::Short] {
                let cid = ids.next_grid_id(side, level, TS);
                assert!(cid.len() <= MAX_CLIENT_ORDER_ID_LEN);
                assert!(seen.insert(cid));
            }
        }
    }

    #[test]
    fn generator_rejects_bad_strategy_names() {
        assert!(OrderIdGenerator::new("").is_err());
        assert!(OrderIdGenerator::new("HG-1").is_err());
    }

    #[test]
    fn retry_suffix_appends_and_replaces() {
        let cid = format_grid_order_id("HG1", Side::Long, 1, TS, 3);
        let r1 = retry_order_id(&cid, 1);
        assert!(r1.ends_with("-R1"));
        let r2 = retry_order_id(&r1, 2);
        assert!(r2.ends_with("-R2"));
        assert!(!r2.contains("-R1"));
        assert_eq!(parse_client_order_id(&r2).unwrap().retry, Some(2));
    }

    #[test]
    fn retry_compresses_timestamp_under_length_pressure() {
        // A long strategy segment pushes the id toward the cap.
        let cid = format!("LONGSTRATNAME-L01-{TS}-zzzzzzzz");
        let retried = retry_order_id(&cid, 3);
        assert!(retried.len() <= MAX_CLIENT_ORDER_ID_LEN);
        assert!(retried.ends_with("-R3"));
    }

    #[test]
    fn retry_marker_survives_extreme_length_pressure() {
        // Even when the timestamp alone cannot absorb the overflow, the
        // head is what gives way; the retry marker stays whole.
        let cid = format!("{}-L01-{TS}-zzzzzzzz", "X".repeat(30));
        let retried = retry_order_id(&cid, 9);
        assert!(retried.len() <= MAX_CLIENT_ORDER_ID_LEN);
        assert!(retried.ends_with("-R9"));
    }

    #[test]
    fn unparseable_ids_error() {
        assert!(parse_client_order_id("").is_err());
        assert!(parse_client_order_id("garbage").is_err());
        assert!(parse_client_order_id("HG1-X01-123-1").is_err());
        assert!(parse_client_order_id("HG1-TPX-L01-123-1").is_err());
        assert!(parse_client_order_id("HG1-L-123-1").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            side in prop_oneof![Just(Side::Long), Just(Side::Short)],
            level in 0u32..=999,
            ts in 0i64..=9_999_999_999_999,
            counter in 0u64..=100_000,
        ) {
            let cid = format_grid_order_id("HG1", side, level, ts, counter);
            prop_assert!(cid.len() <= MAX_CLIENT_ORDER_ID_LEN);
            let parsed = parse_client_order_id(&cid).unwrap();
            prop_assert_eq!(parsed.side, side);
            prop_assert_eq!(parsed.level, level);
            prop_assert_eq!(parsed.counter, counter);
        }
    }
}
