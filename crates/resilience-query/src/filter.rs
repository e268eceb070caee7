//! CRI range filter

use crate::{QueryError, Result};
use resilience_pipeline::CriRecord;

/// All records with `lo <= CRI <= hi`, highest CRI first.
///
/// Ties keep table order. Records without a CRI never match. An inverted
/// range (`lo > hi`) matches nothing; non-finite bounds are rejected.
pub fn filter(records: &[CriRecord], lo: f64, hi: f64) -> Result<Vec<&CriRecord>> {
    if lo.is_nan() || hi.is_nan() {
        return Err(QueryError::InvalidRange { lo, hi });
    }

    let mut hits: Vec<(&CriRecord, f64)> = records
        .iter()
        .filter_map(|r| r.cri.map(|cri| (r, cri)))
        .filter(|(_, cri)| lo <= *cri && *cri <= hi)
        .collect();

    // sort_by is stable
    hits.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(hits.into_iter().map(|(r, _)| r).collect())
}
