//! Share arithmetic for splits and payouts
//!
//! Integer percentages use the largest-remainder method: every entry gets
//! the floor of its exact quota, then the leftover points go to the entries
//! with the largest fractional remainders (earlier entries win ties). The
//! result is never negative and sums to exactly 100 for any non-empty input.

use crate::error::{CoreError, Result};

/// Convert raw weights (e.g. commit counts) into integer percentages
///
/// An all-zero input is split as evenly as possible.
pub fn normalize_percentages(weights: &[u64]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }

    let total: u128 = weights.iter().map(|w| *w as u128).sum();
    if total == 0 {
        return equal_shares(weights.len());
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (index, weight) in weights.iter().enumerate() {
        let scaled = (*weight as u128) * 100;
        shares.push((scaled / total) as u32);
        remainders.push((scaled % total, index));
    }

    let assigned: u32 = shares.iter().sum();
    let leftover = 100u32.saturating_sub(assigned) as usize;

    // Largest remainder first, lower index first on ties
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, index) in remainders.into_iter().take(leftover) {
        shares[index] += 1;
    }

    shares
}

fn equal_shares(count: usize) -> Vec<u32> {
    let base = 100 / count as u32;
    let extra = 100 % count as u32;
    (0..count as u32)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Custom allocations must name at least two shares, each at most 100,
/// summing to 100
pub fn validate_custom_allocation(shares: &[u32]) -> Result<()> {
    if shares.len() < 2 {
        return Err(CoreError::InvalidAllocation {
            message: "Custom allocation needs at least two shares".to_string(),
        });
    }
    if let Some(share) = shares.iter().find(|s| **s > 100) {
        return Err(CoreError::InvalidAllocation {
            message: format!("Custom allocation share {} exceeds 100", share),
        });
    }
    let total: u64 = shares.iter().map(|s| u64::from(*s)).sum();
    if total != 100 {
        return Err(CoreError::InvalidAllocation {
            message: format!("Custom allocation must sum to 100 (got {})", total),
        });
    }
    Ok(())
}

/// Re-express a subset's shares so they sum to 100
///
/// Used when only part of a split is payable. Zero-sum input is split evenly.
pub fn rebalance_shares(percentages: &[f64]) -> Vec<f64> {
    if percentages.is_empty() {
        return Vec::new();
    }
    let total: f64 = percentages.iter().filter(|p| p.is_finite() && **p > 0.0).sum();
    if total <= 0.0 {
        let even = 100.0 / percentages.len() as f64;
        return vec![even; percentages.len()];
    }
    percentages
        .iter()
        .map(|p| if p.is_finite() && *p > 0.0 { p / total * 100.0 } else { 0.0 })
        .collect()
}
