use chrono::{Datelike, NaiveDate};

use crate::models::MrzRecord;

pub struct ExpiryValidator;

impl ExpiryValidator {
    /// Whether the last year of a `vigencia` value is not before `reference`.
    pub fn vigencia_current(vigencia: Option<&str>, reference: NaiveDate) -> Option<bool> {
        let end_year = vigencia?
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| part.len() == 4)
            .filter_map(|part| part.parse::<i32>().ok())
            .last()?;
        Some(end_year >= reference.year())
    }

    /// Whether the MRZ expiry date is not before `reference`.
    pub fn mrz_expiry_current(record: &MrzRecord, reference: NaiveDate) -> Option<bool> {
        let expiry = Self::parse_expiry(&record.expiry_date)?;
        Some(expiry >= reference)
    }

    // Expiry dates are always in this century
    fn parse_expiry(yymmdd: &str) -> Option<NaiveDate> {
        if yymmdd.len() != 6 || !yymmdd.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year = 2000 + yymmdd[0..2].parse::<i32>().ok()?;
        let month = yymmdd[2..4].parse::<u32>().ok()?;
        let day = yymmdd[4..6].parse::<u32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}
