//! Shared primitive types used across the entire simulation.

/// Virtual simulation time. The unit is whatever the model says it is.
pub type SimTime = f64;

/// Name of a variable registered with a `Logger`.
pub type VarName = String;

/// Smallest representable `f64` strictly greater than `t`.
///
/// Used by the event queue to move a colliding event off an occupied
/// time. `t` must be finite.
pub fn next_after(t: SimTime) -> SimTime {
    if t == 0.0 {
        // Covers -0.0 as well: the next value up is the smallest subnormal.
        return f64::from_bits(1);
    }
    let bits = t.to_bits();
    if t > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Returns `Some(t)` if `t` is usable as a point on the time line.
/// `t` if it lies after `floor`, otherwise the first time after `floor`.
///
/// At large magnitudes `floor + dt` can round back to `floor`.
pub(crate) fn strictly_after(t: SimTime, floor: SimTime) -> SimTime {
    if t > floor { t } else { next_after(floor) }
}

pub(crate) fn finite(t: SimTime) -> Option<SimTime> {
    t.is_finite().then_some(t)
}
