//! Reference equi-join implementations
//!
//! Two interchangeable join routines over [`IdTable`]s: a hash join that
//! builds an index over its left input, and a merge join for pre-sorted
//! inputs that uses galloping (exponential search) to skip long runs of
//! non-matching keys. The benchmark driver consumes both through the
//! [`JoinFunction`] signature and treats them as black boxes.
//!
//! A joined row is the left row followed by the right row with its join
//! column removed, so both routines produce the same cardinality and
//! column layout.

use std::collections::HashMap;

use anyhow::ensure;

use super::IdTable;
use crate::Result;

/// The function-object shape the benchmark driver consumes
pub type JoinFunction = dyn Fn(&IdTable, usize, &IdTable, usize) -> Result<IdTable>;

fn joined_columns(left: &IdTable, right: &IdTable) -> usize {
    left.num_columns() + right.num_columns() - 1
}

fn push_joined_row(
    out: &mut IdTable,
    buf: &mut Vec<i64>,
    left: &IdTable,
    left_row: usize,
    right: &IdTable,
    right_row: usize,
    right_col: usize,
) {
    buf.clear();
    buf.extend_from_slice(left.row(left_row));
    for (column, &value) in right.row(right_row).iter().enumerate() {
        if column != right_col {
            buf.push(value);
        }
    }
    out.push_row(buf);
}

/// Equi-join by hashing the left input's join column
pub fn hash_join(
    left: &IdTable,
    left_col: usize,
    right: &IdTable,
    right_col: usize,
) -> Result<IdTable> {
    ensure!(left_col < left.num_columns(), "left join column out of bounds");
    ensure!(right_col < right.num_columns(), "right join column out of bounds");

    let mut index: HashMap<i64, Vec<usize>> = HashMap::new();
    for row in 0..left.num_rows() {
        index.entry(left.get(row, left_col)).or_default().push(row);
    }

    let mut out = IdTable::new(joined_columns(left, right));
    let mut buf = Vec::with_capacity(out.num_columns());
    for right_row in 0..right.num_rows() {
        if let Some(matches) = index.get(&right.get(right_row, right_col)) {
            for &left_row in matches {
                push_joined_row(&mut out, &mut buf, left, left_row, right, right_row, right_col);
            }
        }
    }
    Ok(out)
}

/// First row at or after `start` whose key is at least `target`.
///
/// Exponential probing followed by a binary search over the overshot
/// interval; this is what lets the merge skip long non-matching runs in
/// logarithmic time.
fn gallop_to(table: &IdTable, column: usize, mut low: usize, target: i64) -> usize {
    let rows = table.num_rows();
    if low >= rows || table.get(low, column) >= target {
        return low;
    }
    // Invariant from here on: key(low) < target.
    let mut step = 1;
    while low + step < rows && table.get(low + step, column) < target {
        low += step;
        step *= 2;
    }
    let mut high = (low + step).min(rows);
    while low + 1 < high {
        let mid = low + (high - low) / 2;
        if table.get(mid, column) < target {
            low = mid;
        } else {
            high = mid;
        }
    }
    high
}

/// Past-the-end index of the run of equal keys starting at `start`
fn run_end(table: &IdTable, column: usize, start: usize, key: i64) -> usize {
    let mut end = start + 1;
    while end < table.num_rows() && table.get(end, column) == key {
        end += 1;
    }
    end
}

/// Merge join over inputs sorted ascending by their join columns.
///
/// The caller guarantees sortedness; on unsorted input the result is
/// unspecified but the routine does not panic.
pub fn sorted_merge_join(
    left: &IdTable,
    left_col: usize,
    right: &IdTable,
    right_col: usize,
) -> Result<IdTable> {
    ensure!(left_col < left.num_columns(), "left join column out of bounds");
    ensure!(right_col < right.num_columns(), "right join column out of bounds");

    let mut out = IdTable::new(joined_columns(left, right));
    let mut buf = Vec::with_capacity(out.num_columns());
    let mut i = 0;
    let mut j = 0;
    while i < left.num_rows() && j < right.num_rows() {
        let left_key = left.get(i, left_col);
        let right_key = right.get(j, right_col);
        if left_key < right_key {
            i = gallop_to(left, left_col, i, right_key);
        } else if right_key < left_key {
            j = gallop_to(right, right_col, j, left_key);
        } else {
            let i_end = run_end(left, left_col, i, left_key);
            let j_end = run_end(right, right_col, j, right_key);
            for left_row in i..i_end {
                for right_row in j..j_end {
                    push_joined_row(&mut out, &mut buf, left, left_row, right, right_row, right_col);
                }
            }
            i = i_end;
            j = j_end;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::random::{FastIntStream, RandomSeed, UniformIntStream};

    fn table_from(rows: &[[i64; 2]]) -> IdTable {
        let mut t = IdTable::new(2);
        for row in rows {
            t.push_row(row);
        }
        t
    }

    #[test]
    fn test_simple_join() {
        let left = table_from(&[[1, 10], [2, 20], [3, 30]]);
        let right = table_from(&[[2, 200], [3, 300], [4, 400]]);
        let joined = hash_join(&left, 0, &right, 0).unwrap();
        assert_eq!(joined.num_rows(), 2);
        assert_eq!(joined.num_columns(), 3);

        let merged = sorted_merge_join(&left, 0, &right, 0).unwrap();
        assert_eq!(merged.num_rows(), 2);
        assert_eq!(merged.row(0), &[2, 20, 200]);
        assert_eq!(merged.row(1), &[3, 30, 300]);
    }

    #[test]
    fn test_disjoint_inputs_join_empty() {
        let left = table_from(&[[1, 10], [2, 20]]);
        let right = table_from(&[[5, 50], [6, 60]]);
        assert_eq!(hash_join(&left, 0, &right, 0).unwrap().num_rows(), 0);
        assert_eq!(sorted_merge_join(&left, 0, &right, 0).unwrap().num_rows(), 0);
    }

    #[test]
    fn test_duplicate_keys_cross_product() {
        let left = table_from(&[[1, 10], [1, 11], [2, 20]]);
        let right = table_from(&[[1, 100], [1, 101], [1, 102]]);
        // Key 1: 2 x 3 = 6 combinations.
        assert_eq!(hash_join(&left, 0, &right, 0).unwrap().num_rows(), 6);
        assert_eq!(sorted_merge_join(&left, 0, &right, 0).unwrap().num_rows(), 6);
    }

    #[test]
    fn test_empty_input() {
        let left = IdTable::new(2);
        let right = table_from(&[[1, 100]]);
        assert_eq!(hash_join(&left, 0, &right, 0).unwrap().num_rows(), 0);
        assert_eq!(sorted_merge_join(&left, 0, &right, 0).unwrap().num_rows(), 0);
    }

    #[test]
    fn test_join_column_bounds_checked() {
        let left = table_from(&[[1, 10]]);
        let right = table_from(&[[1, 100]]);
        assert!(hash_join(&left, 2, &right, 0).is_err());
        assert!(sorted_merge_join(&left, 0, &right, 5).is_err());
    }

    #[test]
    fn test_galloping_skips_long_runs() {
        // One match at the far end of a long non-matching stretch.
        let mut left = IdTable::new(2);
        for key in 0..10_000 {
            left.push_row(&[key, key]);
        }
        let right = table_from(&[[9_999, 1]]);
        let joined = sorted_merge_join(&left, 0, &right, 0).unwrap();
        assert_eq!(joined.num_rows(), 1);
        assert_eq!(joined.row(0), &[9_999, 9_999, 1]);
    }

    #[test]
    fn test_hash_and_merge_agree_on_random_input() {
        let seed = RandomSeed::new(42).unwrap();
        let mut keys = UniformIntStream::new(0, 50, seed).unwrap();
        let mut payload = FastIntStream::new(RandomSeed::new(43).unwrap());

        let mut left = IdTable::new(3);
        for _ in 0..200 {
            left.push_row(&[keys.next_int(), payload.next_int(), payload.next_int()]);
        }
        let mut right = IdTable::new(2);
        for _ in 0..400 {
            right.push_row(&[keys.next_int(), payload.next_int()]);
        }
        let hashed = hash_join(&left, 0, &right, 0).unwrap();

        left.sort_by_column(0);
        right.sort_by_column(0);
        let merged = sorted_merge_join(&left, 0, &right, 0).unwrap();
        assert_eq!(hashed.num_rows(), merged.num_rows());
        assert_eq!(hashed.num_columns(), merged.num_columns());
    }
}
