use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::rules::CURP_PATTERN;
use crate::models::{CheckDigit, MrzRecord};

/// ICAO Doc 9303 weights, repeated over the input.
pub const WEIGHTS: [u32; 3] = [7, 3, 1];

lazy_static! {
    static ref CURP_GRAMMAR: Regex = Regex::new(CURP_PATTERN).unwrap();
}

pub struct ChecksumValidator;

impl ChecksumValidator {
    /// Digits count as themselves, A-Z as 10-35 and the filler `<` as 0.
    pub fn char_value(c: char) -> Option<u32> {
        match c {
            '0'..='9' => c.to_digit(10),
            'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
            '<' => Some(0),
            _ => None,
        }
    }

    /// `None` if `data` holds a character outside the MRZ alphabet.
    pub fn check_digit(data: &str) -> Option<u32> {
        data.chars()
            .enumerate()
            .try_fold(0u32, |sum, (i, c)| {
                Self::char_value(c).map(|value| sum + value * WEIGHTS[i % WEIGHTS.len()])
            })
            .map(|sum| sum % 10)
    }

    /// A declared `<` stands for 0.
    pub fn verify(data: &str, declared: char) -> bool {
        let declared = match declared {
            '<' => Some(0),
            other => other.to_digit(10),
        };
        match (Self::check_digit(data), declared) {
            (Some(computed), Some(declared)) => computed == declared,
            _ => false,
        }
    }

    /// Data covered by `check`, taken from the corrected fields.
    pub fn checked_data(record: &MrzRecord, check: CheckDigit) -> String {
        match check {
            CheckDigit::DocumentNumber => record.id_number.clone(),
            CheckDigit::BirthDate => record.birth_date.clone(),
            CheckDigit::ExpiryDate => record.expiry_date.clone(),
            CheckDigit::Composite => Self::composite_data(record),
        }
    }

    /// Line 1 from the document number on, birth date and expiry date with
    /// their digits, and the line 2 optional data.
    pub fn composite_data(record: &MrzRecord) -> String {
        format!(
            "{}{}{}{}{}{}{}{}",
            record.id_number,
            record.check_digit_1,
            record.optional_data,
            record.birth_date,
            record.check_digit_2,
            record.expiry_date,
            record.check_digit_3,
            record.optional_data_2
        )
    }

    pub fn validate_mrz(record: &MrzRecord) -> BTreeMap<CheckDigit, bool> {
        CheckDigit::ALL
            .iter()
            .map(|check| {
                let valid =
                    Self::verify(&Self::checked_data(record, *check), record.declared_digit(*check));
                if !valid {
                    log::debug!("{} check digit does not match", check.describe());
                }
                (*check, valid)
            })
            .collect()
    }

    /// CURP carries no check digit here; the full grammar is the check.
    pub fn validate_curp(curp: &str) -> bool {
        CURP_GRAMMAR.is_match(curp)
    }
}
