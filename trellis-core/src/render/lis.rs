//! Longest increasing subsequence.
//!
//! Patience sorting: `tails[k]` is the index of the smallest value that ends
//! an increasing run of length `k + 1`, and `prev[i]` links each element to
//! the element before it in the run it extended. The run is rebuilt by
//! following those links back from the last tail.

/// Indices of one longest strictly increasing subsequence of `values`, in
/// ascending order.
///
/// When several subsequences have the maximal length, the one ending with the
/// smallest values is returned.
pub fn longest_increasing_subsequence<T: Ord>(values: &[T]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::with_capacity(values.len());
    let mut prev: Vec<Option<usize>> = vec![None; values.len()];

    for (i, value) in values.iter().enumerate() {
        // Leftmost tail whose value is >= `value`.
        let slot = tails.partition_point(|&t| values[t] < *value);
        if slot > 0 {
            prev[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = prev[i];
    }
    result.reverse();
    result
}

/// Like [`longest_increasing_subsequence`], but `None` entries are skipped
/// and never part of the result. Returned indices point into `source`.
pub(crate) fn lis_skipping_gaps(source: &[Option<usize>]) -> Vec<usize> {
    let (positions, values): (Vec<usize>, Vec<usize>) = source
        .iter()
        .enumerate()
        .filter_map(|(pos, value)| value.map(|v| (pos, v)))
        .unzip();

    longest_increasing_subsequence(&values)
        .into_iter()
        .map(|i| positions[i])
        .collect()
}
