// Threshold estimation - trimmed average of the staircase level history
//
// The first four trial levels come from the coarse bracketing phase and are
// always discarded. The remaining levels are averaged and the noise level
// subtracted, giving the SRT as a signal-to-noise ratio.

use crate::error::SessionError;

/// Number of leading trial levels excluded from the average
pub const BRACKETING_TRIALS: usize = 4;

/// Smallest history the estimator accepts
pub const MIN_TRIALS_FOR_ESTIMATE: usize = BRACKETING_TRIALS + 1;

/// Speech reception threshold in dB SNR.
///
/// # Errors
/// `InsufficientData` when fewer than five levels are available.
pub fn estimate(level_history: &[f64], noise_level_db: f64) -> Result<f64, SessionError> {
    if level_history.len() < MIN_TRIALS_FOR_ESTIMATE {
        return Err(SessionError::InsufficientData {
            required: MIN_TRIALS_FOR_ESTIMATE,
            available: level_history.len(),
        });
    }

    let kept = &level_history[BRACKETING_TRIALS..];
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    let threshold = mean - noise_level_db;

    log::info!(
        "[ThresholdEstimator] Mean of {} levels = {:.2} dB, noise {:.2} dB -> SRT {:.2} dB SNR",
        kept.len(),
        mean,
        noise_level_db,
        threshold
    );
    Ok(threshold)
}
