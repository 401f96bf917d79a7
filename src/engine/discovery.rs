//! Triangle discovery.
//!
//! Filters the venue catalog down to base assets that can close a triangle
//! through the configured bridge and settlement assets.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::types::{pair_id, MarketInfo};

/// Base assets `X` for which both `X/bridge` and `X/quote` exist and are
/// active spot markets. Sorted and deduplicated.
///
/// Empty when the `bridge/quote` market itself is missing or not tradable,
/// since every triangle closes through it.
pub fn discover_bases(
    markets: &HashMap<String, MarketInfo>,
    bridge: &str,
    quote: &str,
) -> Vec<String> {
    let tradable = |pair: &str| {
        markets
            .get(pair)
            .map(|m| m.active && m.spot)
            .unwrap_or(false)
    };

    if !tradable(&pair_id(bridge, quote)) {
        debug!(bridge, quote, "Bridge market not tradable, no triangles");
        return Vec::new();
    }

    markets
        .values()
        .filter(|m| m.quote == bridge && m.active && m.spot)
        .map(|m| m.base.as_str())
        .filter(|base| *base != quote && *base != bridge)
        .filter(|base| tradable(&pair_id(base, quote)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}
