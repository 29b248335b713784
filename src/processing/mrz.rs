// TD1 machine readable zone of the card back: finding the lines among OCR
// tokens and slicing them into fields.

use std::cmp::Ordering;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::ExtractionConfig;
use crate::models::{MrzRecord, NormalizedToken};
use crate::processing::field_correction::{correct_run, CharClass};
use crate::utils::IneError;

pub const MRZ_LINE_LEN: usize = 30;
pub const DOCUMENT_PREFIX: &str = "IDMEX";
const MIN_DIGITS_WITHOUT_FILLER: usize = 12;
const MAX_NAME_LINE_DIGITS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrzField {
    DocumentType,
    IssuingCountry,
    IdNumber,
    CheckDigit1,
    OptionalData,
    BirthDate,
    CheckDigit2,
    Sex,
    ExpiryDate,
    CheckDigit3,
    Nationality,
    OptionalData2,
    CheckDigit4,
}

/// Position of one field in the two TD1 data lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MrzSlot {
    pub field: MrzField,
    pub line: usize,
    pub start: usize,
    pub len: usize,
    pub class: CharClass,
}

const fn slot(field: MrzField, line: usize, start: usize, len: usize, class: CharClass) -> MrzSlot {
    MrzSlot {
        field,
        line,
        start,
        len,
        class,
    }
}

pub const TD1_LAYOUT: [MrzSlot; 13] = [
    slot(MrzField::DocumentType, 0, 0, 2, CharClass::Filler),
    slot(MrzField::IssuingCountry, 0, 2, 3, CharClass::Filler),
    slot(MrzField::IdNumber, 0, 5, 9, CharClass::Alnum),
    slot(MrzField::CheckDigit1, 0, 14, 1, CharClass::Digit),
    slot(MrzField::OptionalData, 0, 15, 15, CharClass::Alnum),
    slot(MrzField::BirthDate, 1, 0, 6, CharClass::Digit),
    slot(MrzField::CheckDigit2, 1, 6, 1, CharClass::Digit),
    slot(MrzField::Sex, 1, 7, 1, CharClass::Filler),
    slot(MrzField::ExpiryDate, 1, 8, 6, CharClass::Digit),
    slot(MrzField::CheckDigit3, 1, 14, 1, CharClass::Digit),
    slot(MrzField::Nationality, 1, 15, 3, CharClass::Filler),
    slot(MrzField::OptionalData2, 1, 18, 11, CharClass::Alnum),
    slot(MrzField::CheckDigit4, 1, 29, 1, CharClass::Digit),
];

/// Checks that `slots` tile both data lines without gaps or overlaps.
pub fn validate_layout(slots: &[MrzSlot]) -> Result<(), IneError> {
    if let Some(stray) = slots.iter().find(|s| s.line > 1) {
        return Err(IneError::MalformedMrz(format!(
            "layout slot {:?} is on line {}",
            stray.field,
            stray.line + 1
        )));
    }

    for line in 0..2 {
        let mut on_line: Vec<&MrzSlot> = slots.iter().filter(|s| s.line == line).collect();
        on_line.sort_by_key(|s| s.start);

        let mut cursor = 0;
        for slot in on_line {
            if slot.len == 0 || slot.start != cursor {
                return Err(IneError::MalformedMrz(format!(
                    "layout slot {:?} starts at {} but line {} is covered up to {}",
                    slot.field,
                    slot.start,
                    line + 1,
                    cursor
                )));
            }
            cursor += slot.len;
        }
        if cursor != MRZ_LINE_LEN {
            return Err(IneError::MalformedMrz(format!(
                "layout covers {} of {} characters on line {}",
                cursor,
                MRZ_LINE_LEN,
                line + 1
            )));
        }
    }
    Ok(())
}

lazy_static! {
    static ref LAYOUT_CHECK: Result<(), IneError> = validate_layout(&TD1_LAYOUT);
    static ref NAME_SEPARATOR: Regex = Regex::new(r"<{2,}").unwrap();
    // document code, issuer and a number-like run
    static ref DOCUMENT_LINE: Regex = Regex::new(r"^[I1][D0][A-Z]{3}[0-9OIS<]{9}").unwrap();
}

pub fn is_mrz_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '<'
}

/// MRZ lines picked out of the back-face tokens.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MrzLines {
    pub line1: Option<String>,
    pub line2: Option<String>,
    /// TD1 third line, holding the names
    pub name_line: Option<String>,
}

#[derive(Debug, Clone)]
struct MrzCandidate {
    text: String,
    raw_len: usize,
    confidence: f32,
    y: f32,
}

pub struct MrzLocator;

impl MrzLocator {
    pub fn locate(tokens: &[NormalizedToken<'_>], config: &ExtractionConfig) -> MrzLines {
        let (mut names, mut data): (Vec<MrzCandidate>, Vec<MrzCandidate>) =
            Self::candidates(tokens, config)
                .into_iter()
                .partition(|c| Self::is_name_line(&c.text));

        // the data lines are the two longest before padding
        data.sort_by(|a, b| {
            b.raw_len
                .cmp(&a.raw_len)
                .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
                .then(a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
        });
        data.truncate(2);
        data.sort_by(|a, b| {
            a.y.partial_cmp(&b.y)
                .unwrap_or(Ordering::Equal)
                .then(b.text.starts_with(DOCUMENT_PREFIX).cmp(&a.text.starts_with(DOCUMENT_PREFIX)))
        });

        names.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal));
        let below_data = data.last().map(|last| last.y);
        let name_line = names
            .iter()
            .position(|n| below_data.map_or(true, |y| n.y > y))
            .or(if names.is_empty() { None } else { Some(0) })
            .map(|idx| names.swap_remove(idx).text);

        let mut data = data.into_iter().map(|c| c.text);
        let lines = MrzLines {
            line1: data.next(),
            line2: data.next(),
            name_line,
        };
        log::debug!(
            "MRZ lines: line1 {}, line2 {}, name line {}",
            lines.line1.is_some(),
            lines.line2.is_some(),
            lines.name_line.is_some()
        );
        lines
    }

    fn candidates(tokens: &[NormalizedToken<'_>], config: &ExtractionConfig) -> Vec<MrzCandidate> {
        let mut found = Vec::new();
        for token in tokens {
            let compact: String = token.text.chars().filter(|c| !c.is_whitespace()).collect();
            if compact.is_empty() || !compact.chars().all(is_mrz_char) {
                continue;
            }

            let len = compact.len();
            // several lines merged into one region
            let chunks: Vec<&str> = if len > MRZ_LINE_LEN && len % MRZ_LINE_LEN == 0 {
                (0..len / MRZ_LINE_LEN)
                    .map(|i| &compact[i * MRZ_LINE_LEN..(i + 1) * MRZ_LINE_LEN])
                    .collect()
            } else {
                vec![compact.as_str()]
            };
            let step = token.bbox().height / chunks.len() as f32;

            for (i, chunk) in chunks.iter().enumerate() {
                match Self::recover(chunk, config.max_dropped_filler) {
                    Some(text) => found.push(MrzCandidate {
                        text,
                        raw_len: chunk.len(),
                        confidence: token.confidence(),
                        y: token.bbox().y + step * i as f32,
                    }),
                    None => log::trace!("not an MRZ line: {:?}", chunk),
                }
            }
        }
        found
    }

    /// Pads short lines that lost trailing fillers and trims overlong filler runs.
    fn recover(text: &str, max_dropped_filler: usize) -> Option<String> {
        if !Self::looks_like_mrz(text) {
            return None;
        }
        let text = if text.len() > MRZ_LINE_LEN {
            text.trim_end_matches('<')
        } else {
            text
        };
        let len = text.len();
        if len > MRZ_LINE_LEN || MRZ_LINE_LEN - len > max_dropped_filler {
            return None;
        }
        Some(format!("{}{}", text, "<".repeat(MRZ_LINE_LEN - len)))
    }

    fn looks_like_mrz(text: &str) -> bool {
        text.contains('<')
            || text.starts_with(DOCUMENT_PREFIX)
            || text.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_DIGITS_WITHOUT_FILLER
    }

    /// First data line: starts with the document prefix, allowing for OCR
    /// digit-for-letter swaps, or with a document code, issuer and number.
    fn is_document_line(text: &str) -> bool {
        text.get(..DOCUMENT_PREFIX.len())
            .map_or(false, |head| correct_run(head, CharClass::Filler) == DOCUMENT_PREFIX)
            || DOCUMENT_LINE.is_match(text)
    }

    fn is_name_line(text: &str) -> bool {
        text.chars().filter(|c| c.is_ascii_digit()).count() <= MAX_NAME_LINE_DIGITS
            && text.contains("<<")
            && !Self::is_document_line(text)
            && !text.chars().take(6).all(|c| c.is_ascii_digit())
    }
}

pub struct MrzDecoder;

impl MrzDecoder {
    /// Slices two 30-character data lines into an `MrzRecord`. Names are left empty.
    pub fn decode(line1: &str, line2: &str) -> Result<MrzRecord, IneError> {
        LAYOUT_CHECK.clone()?;

        let lines = [line1, line2];
        for (i, line) in lines.iter().enumerate() {
            let len = line.chars().count();
            if len != MRZ_LINE_LEN {
                return Err(IneError::MalformedMrz(format!(
                    "line {} has {} characters, expected {}",
                    i + 1,
                    len,
                    MRZ_LINE_LEN
                )));
            }
            if !line.chars().all(is_mrz_char) {
                return Err(IneError::MalformedMrz(format!(
                    "line {} has characters outside A-Z, 0-9 and <",
                    i + 1
                )));
            }
        }

        let field = |field: MrzField| -> String {
            TD1_LAYOUT
                .iter()
                .find(|s| s.field == field)
                .map(|s| correct_run(&lines[s.line][s.start..s.start + s.len], s.class))
                .unwrap_or_default()
        };
        let digit = |f: MrzField| field(f).chars().next().unwrap_or('<');

        let document_type = field(MrzField::DocumentType);
        let issuing_country = field(MrzField::IssuingCountry);
        let prefix = format!("{}{}", document_type, issuing_country);
        if prefix != DOCUMENT_PREFIX {
            return Err(IneError::MalformedMrz(format!(
                "line 1 starts with {} instead of {}",
                prefix, DOCUMENT_PREFIX
            )));
        }

        let record = MrzRecord {
            line1: line1.to_string(),
            line2: line2.to_string(),
            document_type,
            issuing_country,
            id_number: field(MrzField::IdNumber),
            check_digit_1: digit(MrzField::CheckDigit1),
            optional_data: field(MrzField::OptionalData),
            birth_date: field(MrzField::BirthDate),
            check_digit_2: digit(MrzField::CheckDigit2),
            sex: field(MrzField::Sex),
            expiry_date: field(MrzField::ExpiryDate),
            check_digit_3: digit(MrzField::CheckDigit3),
            nationality: field(MrzField::Nationality),
            optional_data_2: field(MrzField::OptionalData2),
            check_digit_4: digit(MrzField::CheckDigit4),
            apellido_paterno: None,
            apellido_materno: None,
            nombre_reverso: None,
        };
        log::debug!("decoded MRZ for document {}", record.id_number);
        Ok(record)
    }

    /// Fills the names from the TD1 name line.
    pub fn with_names(record: MrzRecord, name_line: &str) -> MrzRecord {
        let zone = correct_run(name_line, CharClass::Filler);
        let (apellido_paterno, apellido_materno, nombre_reverso) = Self::split_names(&zone);
        MrzRecord {
            apellido_paterno,
            apellido_materno,
            nombre_reverso,
            ..record
        }
    }

    /// Paternal surname, maternal surname and given names from a name zone.
    ///
    /// `<<` separates components. With a single `<<` the first part holds both
    /// surnames separated by `<`.
    pub fn split_names(zone: &str) -> (Option<String>, Option<String>, Option<String>) {
        let groups: Vec<String> = NAME_SEPARATOR
            .split(zone)
            .map(|g| g.split('<').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
            .filter(|g| !g.is_empty())
            .collect();

        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        let split_surnames = |primary: &str| -> (Option<String>, Option<String>) {
            let mut words = primary.splitn(2, ' ');
            let paterno = words.next().map(str::to_string);
            let materno = words.next().map(str::to_string);
            (paterno.and_then(non_empty), materno.and_then(non_empty))
        };

        match groups.as_slice() {
            [] => (None, None, None),
            [primary] => {
                let (paterno, materno) = split_surnames(primary);
                (paterno, materno, None)
            }
            [primary, given] => {
                let (paterno, materno) = split_surnames(primary);
                (paterno, materno, Some(given.clone()))
            }
            [paterno, materno, given @ ..] => (
                Some(paterno.clone()),
                Some(materno.clone()),
                Some(given.join(" ")),
            ),
        }
    }
}
