use std::cmp::Ordering;
use tracing::debug;
use crate::core::config::CollectionConfig;
use crate::parallel::executor::SortExecutor;
use crate::schema::order::{ByteOrder, Probe};
use crate::schema::row::RowSchema;
use crate::storage::arena::swap_records;

/// Everything the engine needs to order a flat slice of records.
/// Only the primary-key sub-range of each record is ever compared.
pub(crate) struct SortContext<'a> {
    pub width: usize,
    pub key_offset: usize,
    pub key_width: usize,
    pub order: &'a dyn ByteOrder,
    pub isort_limit: usize,
    pub split_threshold: usize,
    pub parallel_threshold: usize,
}

impl<'a> SortContext<'a> {
    pub fn new(schema: &'a RowSchema, config: &CollectionConfig) -> Self {
        SortContext {
            width: schema.record_width(),
            key_offset: schema.primary_key_offset(),
            key_width: schema.primary_key_width(),
            order: schema.order().as_ref(),
            isort_limit: config.isort_limit.max(2),
            split_threshold: config.split_threshold,
            parallel_threshold: config.parallel_threshold,
        }
    }

    #[inline]
    fn key<'b>(&self, bytes: &'b [u8], index: usize) -> &'b [u8] {
        let start = index * self.width + self.key_offset;
        &bytes[start..start + self.key_width]
    }

    #[inline]
    fn compare(&self, bytes: &[u8], a: usize, b: usize) -> Ordering {
        self.order.compare(self.key(bytes, a), self.key(bytes, b))
    }

    #[inline]
    fn count(&self, bytes: &[u8]) -> usize {
        bytes.len() / self.width
    }
}

/// Sorts `bytes` (a whole number of records) ascending by primary key.
///
/// Records `[0, sorted_prefix)` are known to be ordered already. A short
/// unsorted tail is merged in by binary insertion; anything larger goes
/// through quicksort, fanned out over `executor` when the range is big
/// enough. Returns once every sub-range is sorted.
pub(crate) fn sort_records(
    bytes: &mut [u8],
    sorted_prefix: usize,
    ctx: &SortContext<'_>,
    executor: Option<&SortExecutor>,
) {
    let n = ctx.count(bytes);
    let sorted = sorted_prefix.min(n);
    if n < 2 || sorted >= n {
        return;
    }
    if n - sorted < ctx.isort_limit {
        insertion_sort(bytes, sorted.max(1), ctx);
        return;
    }

    if let Some(executor) = executor {
        if n >= ctx.parallel_threshold {
            let done = executor.run(|| fan_out(bytes, sorted, ctx, executor, 0));
            if done.is_some() {
                return;
            }
        }
    }

    let p = partition(bytes, sorted, ctx);
    let (left, rest) = bytes.split_at_mut(p * ctx.width);
    sort_sequential(left, ctx);
    sort_sequential(&mut rest[ctx.width..], ctx);
}

/// Partitions once, then sorts both halves on pool workers. One more level
/// is allowed for halves above the split threshold, giving at most four
/// concurrent leaf sorts.
fn fan_out(bytes: &mut [u8], sorted_prefix: usize, ctx: &SortContext<'_>, executor: &SortExecutor, depth: usize) {
    let n = ctx.count(bytes);
    let threshold = if depth == 0 { ctx.parallel_threshold } else { ctx.split_threshold };
    if depth >= 2 || n < threshold.max(ctx.isort_limit) {
        sort_sequential(bytes, ctx);
        return;
    }

    let p = partition(bytes, sorted_prefix, ctx);
    if depth == 0 {
        debug!(records = n, pivot = p, "parallel sort fan-out");
    }
    let (left, rest) = bytes.split_at_mut(p * ctx.width);
    let right = &mut rest[ctx.width..];
    executor.note_dispatch(2);
    rayon::join(
        || fan_out(left, 0, ctx, executor, depth + 1),
        || fan_out(right, 0, ctx, executor, depth + 1),
    );
}

/// Quicksort recursing into the smaller partition and looping on the larger,
/// so stack depth stays logarithmic.
fn sort_sequential(bytes: &mut [u8], ctx: &SortContext<'_>) {
    let mut bytes = bytes;
    loop {
        let n = ctx.count(bytes);
        if n < ctx.isort_limit {
            insertion_sort(bytes, 1, ctx);
            return;
        }
        let p = partition(bytes, 0, ctx);
        let taken = std::mem::take(&mut bytes);
        let (left, rest) = taken.split_at_mut(p * ctx.width);
        let right = &mut rest[ctx.width..];
        if left.len() < right.len() {
            sort_sequential(left, ctx);
            bytes = right;
        } else {
            sort_sequential(right, ctx);
            bytes = left;
        }
    }
}

/// Binary insertion of records `[from, n)` into the ordered run `[0, from)`
pub(crate) fn insertion_sort(bytes: &mut [u8], from: usize, ctx: &SortContext<'_>) {
    let n = ctx.count(bytes);
    let w = ctx.width;
    for i in from.max(1)..n {
        // Already in place: common for nearly-sorted tails
        if ctx.compare(bytes, i - 1, i) != Ordering::Greater {
            continue;
        }
        let probe = Probe::new(ctx.order, ctx.key(bytes, i));
        let (mut lo, mut hi) = (0, i - 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if probe.cmp(ctx.order, ctx.key(bytes, mid)) == Ordering::Less {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        bytes[lo * w..(i + 1) * w].rotate_right(w);
    }
}

/// Hoare-style partition around an approximate median.
///
/// The pivot is parked at slot 0, compared through a probe prepared once,
/// and swapped to its final slot at the end; that slot is returned. Records
/// left of it compare `<=` the pivot, records right of it `>=`.
fn partition(bytes: &mut [u8], sorted_prefix: usize, ctx: &SortContext<'_>) -> usize {
    let n = ctx.count(bytes);
    debug_assert!(n >= 2);
    let hi = n - 1;
    let pivot_at = select_pivot(bytes, sorted_prefix, ctx);
    swap_records(bytes, ctx.width, 0, pivot_at);
    let pivot = Probe::new(ctx.order, ctx.key(bytes, 0));

    let mut i = 0;
    let mut j = n;
    loop {
        loop {
            i += 1;
            if pivot.cmp(ctx.order, ctx.key(bytes, i)) != Ordering::Greater || i == hi {
                break;
            }
        }
        loop {
            j -= 1;
            if pivot.cmp(ctx.order, ctx.key(bytes, j)) != Ordering::Less || j == 0 {
                break;
            }
        }
        if i >= j {
            break;
        }
        swap_records(bytes, ctx.width, i, j);
    }
    swap_records(bytes, ctx.width, 0, j);
    j
}

/// Samples five positions and repeatedly drops the smallest and largest
/// sample until one remains. When a sorted prefix lies inside the range the
/// samples lean on it: its median and its maximum are already known-good
/// order statistics.
fn select_pivot(bytes: &[u8], sorted_prefix: usize, ctx: &SortContext<'_>) -> usize {
    let n = ctx.count(bytes);
    let last = n - 1;
    let mut samples: Vec<usize> = if sorted_prefix > 0 && sorted_prefix < n {
        let s = sorted_prefix;
        vec![0, (s - 1) / 2, s - 1, s + (n - s) / 2, last]
    } else {
        vec![0, n / 4, n / 2, n / 2 + n / 4, last]
    };
    samples.sort_unstable();
    samples.dedup();

    while samples.len() > 2 {
        let (mut min, mut max) = (0, 0);
        for k in 1..samples.len() {
            if ctx.compare(bytes, samples[k], samples[min]) == Ordering::Less {
                min = k;
            }
            if ctx.compare(bytes, samples[k], samples[max]) == Ordering::Greater {
                max = k;
            }
        }
        if min == max {
            // All samples equal
            break;
        }
        let (first, second) = if min > max { (min, max) } else { (max, min) };
        samples.remove(first);
        samples.remove(second);
    }
    samples[samples.len() / 2]
}

/// True when every adjacent pair in `bytes` is non-descending
pub(crate) fn is_ordered(bytes: &[u8], ctx: &SortContext<'_>) -> bool {
    let n = ctx.count(bytes);
    (1..n).all(|i| ctx.compare(bytes, i - 1, i) != Ordering::Greater)
}
