/// Handle returned by `setTimeout`. Distinct type from `IntervalId` so the
/// two handle spaces can never be confused at compile time, even though
/// both are backed by the same counter at runtime (`setTimeout`/
/// `setInterval` share a handle space per the HTML spec).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimeoutId(pub i32);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IntervalId(pub i32);

/// Handle returned by `setImmediate`. Its value space is disjoint from
/// `TimeoutId`/`IntervalId` (§3 invariant): a `clearTimeout` given an
/// immediate's id, or vice versa, must be a silent no-op rather than
/// accidentally cancelling the wrong queue entry.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ImmediateId(pub i32);
