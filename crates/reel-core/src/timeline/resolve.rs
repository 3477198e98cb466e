//! Map a time value onto a scene index.

/// Returns the index `i` with `offsets[i] <= time < offsets[i + 1]`.
///
/// `offsets` is the cumulative table (first entry 0, last entry the total).
/// A time exactly on an internal boundary belongs to the scene that starts
/// there; `time == total` resolves to the last scene.
///
/// Callers clamp `time` into `[0, total]` first. Out-of-range input or a
/// table with no scenes is a contract violation (debug-asserted); release
/// builds saturate to the nearest valid index.
pub fn resolve(time: f64, offsets: &[f64]) -> usize {
    debug_assert!(offsets.len() >= 2, "offset table has no scenes");
    debug_assert!(offsets.first() == Some(&0.0), "offset table must start at 0");
    let scenes = offsets.len().saturating_sub(1);
    if scenes == 0 {
        return 0;
    }
    let total = offsets[scenes];
    debug_assert!(
        (0.0..=total).contains(&time),
        "time {time} outside [0, {total}]"
    );
    if time >= total {
        return scenes - 1;
    }
    // Number of scene starts at or before `time`; the boundary tie goes to the
    // scene that starts there.
    offsets[..scenes]
        .partition_point(|&start| start <= time)
        .saturating_sub(1)
}
