use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::utils::IneError;

/// Tunables for extraction. Read-only once the pipeline holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Regions below this confidence are skipped by the address and name readers.
    pub min_confidence: f32,
    /// Lines read below DOMICILIO.
    pub address_lines: usize,
    /// Trailing `<` the MRZ locator may restore on a short line.
    pub max_dropped_filler: usize,
    /// Year used for century resolution and expiry; the current year when unset.
    pub reference_year: Option<i32>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            min_confidence: 0.0,
            address_lines: 3,
            max_dropped_filler: 8,
            reference_year: None,
        }
    }
}

impl ExtractionConfig {
    pub fn from_json(json: &str) -> Result<Self, IneError> {
        let config: ExtractionConfig =
            serde_json::from_str(json).map_err(|e| IneError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, IneError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), IneError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(IneError::InvalidConfig(format!(
                "min_confidence must be within 0..=1, got {}",
                self.min_confidence
            )));
        }
        if self.address_lines == 0 {
            return Err(IneError::InvalidConfig(
                "address_lines must be at least 1".to_string(),
            ));
        }
        if self.max_dropped_filler >= crate::processing::mrz::MRZ_LINE_LEN {
            return Err(IneError::InvalidConfig(format!(
                "max_dropped_filler must be below the MRZ line length, got {}",
                self.max_dropped_filler
            )));
        }
        Ok(())
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
            .unwrap_or_else(|| Local::now().naive_local().date().year())
    }

    /// January 1st of the reference year when it is pinned, otherwise today.
    pub fn reference_date(&self) -> NaiveDate {
        let today = Local::now().naive_local().date();
        self.reference_year
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
            .unwrap_or(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = ExtractionConfig::from_json(r#"{"reference_year": 2024}"#).unwrap();
        assert_eq!(config.reference_year(), 2024);
        assert_eq!(config.address_lines, 3);
        assert_eq!(config.reference_date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let err = ExtractionConfig::from_json(r#"{"min_confidence": 1.5}"#).unwrap_err();
        assert!(matches!(err, IneError::InvalidConfig(_)));
        assert!(ExtractionConfig::from_json(r#"{"address_lines": 0}"#).is_err());
        assert!(ExtractionConfig::from_json("not json").is_err());
    }
}
