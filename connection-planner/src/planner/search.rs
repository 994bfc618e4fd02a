//! Monotonic search primitives.
//!
//! Both connection searches run over slices sorted by a time key. These
//! helpers wrap `partition_point` so the key extractor is the only thing that
//! differs between the backward (feeder) and forward (bus) searches.

/// Index of the first element whose key is `>= target`.
///
/// `items` must be sorted ascending by `key`. Returns `items.len()` if every
/// key is smaller than `target`.
pub fn lower_bound_by_key<T, K, F>(items: &[T], target: &K, key: F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.partition_point(|item| key(item) < *target)
}

/// Index of the first element whose key is `> target`.
///
/// `items` must be sorted ascending by `key`. Returns `items.len()` if every
/// key is `<= target`.
pub fn upper_bound_by_key<T, K, F>(items: &[T], target: &K, key: F) -> usize
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.partition_point(|item| key(item) <= *target)
}

/// The leftmost element whose key is `>= target`.
///
/// ```
/// use connection_planner::planner::first_at_or_after;
///
/// let departures = [5, 10, 20];
/// assert_eq!(first_at_or_after(&departures, &6, |d| *d), Some(&10));
/// assert_eq!(first_at_or_after(&departures, &10, |d| *d), Some(&10));
/// assert_eq!(first_at_or_after(&departures, &21, |d| *d), None);
/// ```
pub fn first_at_or_after<'a, T, K, F>(items: &'a [T], target: &K, key: F) -> Option<&'a T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    items.get(lower_bound_by_key(items, target, key))
}

/// The rightmost element whose key is `<= target`.
///
/// ```
/// use connection_planner::planner::last_at_or_before;
///
/// let arrivals = [5, 10, 20];
/// assert_eq!(last_at_or_before(&arrivals, &19, |a| *a), Some(&10));
/// assert_eq!(last_at_or_before(&arrivals, &20, |a| *a), Some(&20));
/// assert_eq!(last_at_or_before(&arrivals, &4, |a| *a), None);
/// ```
pub fn last_at_or_before<'a, T, K, F>(items: &'a [T], target: &K, key: F) -> Option<&'a T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    upper_bound_by_key(items, target, key)
        .checked_sub(1)
        .and_then(|idx| items.get(idx))
}
