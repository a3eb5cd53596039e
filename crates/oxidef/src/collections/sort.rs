//! In-place quicksort and leftmost binary search.
//!
//! Both take a caller-supplied three-way comparator. The sort is not stable.

use std::cmp::Ordering;

/// Partitions at or below this size are insertion sorted.
pub const INSERTION_SORT_THRESHOLD: usize = 16;

/// Sorts `slice` with `cmp`.
///
/// Middle element as pivot, swapped to the end, Lomuto partition, recursion
/// on the smaller side and iteration on the larger. Partitions of up to
/// [`INSERTION_SORT_THRESHOLD`] elements are finished with insertion sort.
///
/// # Example
///
/// ```rust
/// use oxidef::collections::sort::quicksort;
///
/// let mut values = [5, 3, 9, 1, 3];
/// quicksort(&mut values, |a, b| a.cmp(b));
/// assert_eq!(values, [1, 3, 3, 5, 9]);
/// ```
pub fn quicksort<T, F>(slice: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    sort_range(slice, &mut cmp);
}

fn sort_range<T, F>(mut slice: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    while slice.len() > INSERTION_SORT_THRESHOLD {
        let pivot = partition(slice, cmp);
        let (left, rest) = slice.split_at_mut(pivot);
        let right = &mut rest[1..];
        if left.len() < right.len() {
            sort_range(left, cmp);
            slice = right;
        } else {
            sort_range(right, cmp);
            slice = left;
        }
    }
    insertion_sort(slice, cmp);
}

/// Returns the pivot's final index.
fn partition<T, F>(slice: &mut [T], cmp: &mut F) -> usize
where
    F: FnMut(&T, &T) -> Ordering,
{
    let last = slice.len() - 1;
    slice.swap(slice.len() / 2, last);

    let mut store = 0;
    for i in 0..last {
        if cmp(&slice[i], &slice[last]) == Ordering::Less {
            slice.swap(i, store);
            store += 1;
        }
    }
    slice.swap(store, last);
    store
}

fn insertion_sort<T, F>(slice: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..slice.len() {
        let mut j = i;
        while j > 0 && cmp(&slice[j - 1], &slice[j]) == Ordering::Greater {
            slice.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// Leftmost insertion point for a target in a sorted slice.
///
/// `cmp(element)` orders an element against the target. The result is the
/// first index whose element is not `Less` than the target, so on ties the
/// earliest equal element wins; `slice.len()` if every element is smaller.
///
/// # Example
///
/// ```rust
/// use oxidef::collections::sort::binary_search_by;
///
/// let sorted = [1, 2, 2, 2, 3];
/// assert_eq!(binary_search_by(&sorted, |e| e.cmp(&2)), 1);
/// assert_eq!(binary_search_by(&sorted, |e| e.cmp(&9)), 5);
/// ```
pub fn binary_search_by<T, F>(slice: &[T], mut cmp: F) -> usize
where
    F: FnMut(&T) -> Ordering,
{
    let mut low = 0;
    let mut high = slice.len();
    while low < high {
        let mid = low + (high - low) / 2;
        if cmp(&slice[mid]) == Ordering::Less {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}
