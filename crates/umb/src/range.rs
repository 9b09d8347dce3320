//! Row-start (CSR) encoding of contiguous index groups.
//!
//! A partition of `[0, total)` into `n` consecutive groups is stored as
//! `n + 1` offsets: group `i` owns `[row_start[i], row_start[i + 1])` and the
//! last offset is `total`, one past the last valid index.
//!
//! ```text
//! row_start:  [0, 2, 2, 5]
//! ranges:     [0..2) [2..2) [2..5)
//! ```

use crate::error::{Result, UmbError};
use crate::index::IndexRange;

/// Expands `n + 1` row-start offsets into `n` ranges.
///
/// The offsets are taken as-is: a decreasing pair yields an inverted range,
/// which model validation rejects.
///
/// # Errors
///
/// Returns `UmbError::Decode` if an offset does not fit in `usize`.
pub fn row_start_to_ranges<T>(row_start: &[u64]) -> Result<Vec<IndexRange<T>>> {
    let offsets = row_start
        .iter()
        .map(|&offset| {
            usize::try_from(offset)
                .map_err(|_| UmbError::Decode(format!("row start offset {offset} overflows usize")))
        })
        .collect::<Result<Vec<usize>>>()?;

    Ok(offsets
        .windows(2)
        .map(|pair| IndexRange::new(pair[0], pair[1]))
        .collect())
}

/// Compresses consecutive ranges into `n + 1` row-start offsets.
///
/// An empty slice encodes as `[0]`.
///
/// # Errors
///
/// Returns `UmbError::NonContiguousRanges` if a range does not end where its
/// successor starts.
pub fn ranges_to_row_start<T>(ranges: &[IndexRange<T>]) -> Result<Vec<u64>> {
    let Some(last) = ranges.last() else {
        return Ok(vec![0]);
    };

    for (position, pair) in ranges.windows(2).enumerate() {
        if pair[0].end() != pair[1].start() {
            return Err(UmbError::NonContiguousRanges {
                position,
                end: pair[0].end(),
                next_start: pair[1].start(),
            });
        }
    }

    let mut row_start = Vec::with_capacity(ranges.len() + 1);
    row_start.extend(ranges.iter().map(|range| range.start() as u64));
    row_start.push(last.end() as u64);
    Ok(row_start)
}
