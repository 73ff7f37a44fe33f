// Calibration offset - maps desired sound pressure levels to digital levels
//
// A calibration tone is played at a known digital level (dB FS) and read off
// a sound level meter (dB SPL). The difference is the system offset; every
// presentation level in dB SPL is converted to dB FS by subtracting it.

use serde::{Deserialize, Serialize};

/// Offset between dB SPL measured at the listener and dB FS at the output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOffset {
    pub slm_offset_db: f64,
}

impl CalibrationOffset {
    /// Derive the offset from a sound level meter reading of the
    /// calibration tone played at `cal_level_dbfs`.
    pub fn from_reading(slm_reading_db: f64, cal_level_dbfs: f64) -> Self {
        let slm_offset_db = slm_reading_db - cal_level_dbfs;
        log::info!(
            "[Calibration] SLM reading {:.1} dB at {:.1} dB FS -> offset {:.1} dB",
            slm_reading_db,
            cal_level_dbfs,
            slm_offset_db
        );
        Self { slm_offset_db }
    }

    /// Digital level (dB FS) that produces `desired_spl_db` at the listener
    pub fn presentation_level_dbfs(&self, desired_spl_db: f64) -> f64 {
        desired_spl_db - self.slm_offset_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_from_reading() {
        let offset = CalibrationOffset::from_reading(70.0, -30.0);
        assert_eq!(offset.slm_offset_db, 100.0);
    }

    #[test]
    fn test_presentation_level() {
        let offset = CalibrationOffset::from_reading(70.0, -30.0);
        assert_eq!(offset.presentation_level_dbfs(65.0), -35.0);
        assert_eq!(offset.presentation_level_dbfs(100.0), 0.0);
    }
}
