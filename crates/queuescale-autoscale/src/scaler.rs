//! Scaling decision — maps backlog and replica count to a target.
//!
//! Pure and deterministic; cooldowns and side effects live in the
//! control loop.

use queuescale_core::ScalerConfig;

/// Decide the replica count the deployment should move to.
///
/// Returns `None` when no change is warranted: the backlog sits in the
/// dead zone `[threshold / 2, threshold]`, or the step would not move the
/// count (already at a bound).
///
/// Scale up by `floor(queue_length * scale_up_factor)` replicas, scale down
/// by `floor(scale_down_factor)`, each at least one. The result is always
/// within `[min_replicas, max_replicas]`, even when another writer moved
/// `current` outside that range.
pub fn compute_target(queue_length: u64, current: u32, config: &ScalerConfig) -> Option<u32> {
    let up_threshold = u64::from(config.threshold);
    let down_threshold = u64::from(config.scale_down_threshold());

    if queue_length > up_threshold {
        let step = scale_step(queue_length as f64 * config.scale_up_factor);
        let target = clamp(u64::from(current).saturating_add(step), config);
        (target > current).then_some(target)
    } else if queue_length < down_threshold {
        let step = scale_step(config.scale_down_factor);
        let target = clamp(u64::from(current).saturating_sub(step), config);
        (target < current).then_some(target)
    } else {
        None
    }
}

/// Whole replicas to move by. Float-to-int casts saturate and map NaN to 0.
fn scale_step(raw: f64) -> u64 {
    (raw.floor() as u64).max(1)
}

fn clamp(replicas: u64, config: &ScalerConfig) -> u32 {
    let clamped = replicas.clamp(
        u64::from(config.min_replicas),
        u64::from(config.max_replicas),
    );
    // In range of u32 because max_replicas is.
    clamped as u32
}
