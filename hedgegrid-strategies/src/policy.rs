//! Regime-based rung thinning.
//!
//! Trending markets keep filling the counter-trend side; the policy keeps
//! only the first N rungs of that side so losses stay bounded while the
//! trend runs. Truncation preserves level indices, which the diff engine
//! relies on for identity.

use hedgegrid_core::config::PolicySection;
use hedgegrid_core::core::{Ladder, Regime, Side};

pub struct PlacementPolicy;

impl PlacementPolicy {
    pub fn shape_ladders(
        ladders: Vec<Ladder>,
        regime: Regime,
        policy: &PolicySection,
    ) -> Vec<Ladder> {
        ladders
            .into_iter()
            .map(|mut ladder| {
                match (regime, ladder.side()) {
                    (Regime::Up, Side::Short) => ladder.truncate(policy.short_keep_levels),
                    (Regime::Down, Side::Long) => ladder.truncate(policy.long_keep_levels),
                    _ => {}
                }
                ladder
            })
            .collect()
    }
}
