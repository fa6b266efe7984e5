//! Irrigation decision.
//!
//! Pure and hardware-free: the coordinator gathers the inputs, this
//! module answers yes or no.

/// Why the pump should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterReason {
    /// The remote override flag is on.
    Override,
    /// Soil moisture is below the configured threshold.
    BelowThreshold,
}

/// Decide whether to water.
///
/// The override wins unconditionally.  Without it, watering needs a
/// configured threshold and moisture strictly below it.  There is no
/// hysteresis band.
pub fn should_water(override_on: bool, threshold: Option<f64>, moisture_pct: f64) -> Option<WaterReason> {
    if override_on {
        return Some(WaterReason::Override);
    }
    match threshold {
        Some(t) if moisture_pct < t => Some(WaterReason::BelowThreshold),
        _ => None,
    }
}
