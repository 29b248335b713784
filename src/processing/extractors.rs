// Free-text blocks (address, holder name) and the data encoded inside CURP
// and clave de elector.

use std::cmp::Ordering;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::config::ExtractionConfig;
use crate::models::rules::{
    lookup_state, SearchWindow, CLAVE_ELECTOR_PATTERN, CURP_PATTERN, CURP_STATES,
    DOMICILIO_LABEL, ELECTOR_STATES, FRONT_LABELS, INSTITUTIONAL_HEADERS, NOMBRE_LABEL,
};
use crate::models::{BoundingBox, NormalizedToken};
use crate::processing::field_correction::FreeText;
use crate::processing::locator::window_distance;

const NAME_WINDOW_LINES: f32 = 4.5;
const MAX_NAME_LINES: usize = 4;
const MIN_FREE_TEXT_LETTERS: usize = 3;

lazy_static! {
    static ref DOMICILIO: Regex = Regex::new(DOMICILIO_LABEL).unwrap();
    static ref NOMBRE: Regex = Regex::new(NOMBRE_LABEL).unwrap();
    static ref CURP_GRAMMAR: Regex = Regex::new(CURP_PATTERN).unwrap();
    static ref CLAVE_GRAMMAR: Regex = Regex::new(CLAVE_ELECTOR_PATTERN).unwrap();
}

/// One visual line of free text, joined left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: FreeText,
    pub confidence: f32,
    pub distance: f32,
    pub position: (f32, f32),
}

struct Piece<'t> {
    text: &'t str,
    confidence: f32,
    distance: f32,
    bbox: &'t BoundingBox,
}

/// Plausible address lines under the topmost `anchor` label, stopping at the next label.
pub fn address_lines(
    tokens: &[NormalizedToken<'_>],
    anchor: &Regex,
    window: SearchWindow,
    config: &ExtractionConfig,
) -> Vec<TextLine> {
    let Some((label, end)) = topmost_label(tokens, anchor) else {
        return Vec::new();
    };

    lines_in_window(tokens, label, Some(end), window, config)
        .into_iter()
        .take_while(|line| !FRONT_LABELS.is_match(line.text.as_str()))
        .filter(|line| is_plausible_free_text(line.text.as_str()))
        .take(config.address_lines)
        .collect()
}

/// Holder name: the lines under NOMBRE, or failing that the lines right above DOMICILIO.
/// Needs at least two words.
pub fn holder_name(tokens: &[NormalizedToken<'_>], config: &ExtractionConfig) -> Option<String> {
    let below_label: Vec<TextLine> = topmost_label(tokens, &NOMBRE)
        .map(|(label, end)| {
            lines_in_window(
                tokens,
                label,
                Some(end),
                SearchWindow::Below { lines: NAME_WINDOW_LINES },
                config,
            )
            .into_iter()
            .take_while(|line| !FRONT_LABELS.is_match(line.text.as_str()))
            .filter(|line| is_name_line(line.text.as_str()))
            .take(MAX_NAME_LINES)
            .collect()
        })
        .unwrap_or_default();

    let lines = if below_label.is_empty() {
        let above: Vec<TextLine> = topmost_label(tokens, &DOMICILIO)
            .map(|(label, _)| {
                lines_in_window(
                    tokens,
                    label,
                    None,
                    SearchWindow::Above { lines: NAME_WINDOW_LINES },
                    config,
                )
                .into_iter()
                .filter(|line| is_name_line(line.text.as_str()))
                .collect()
            })
            .unwrap_or_default();
        let skip = above.len().saturating_sub(MAX_NAME_LINES);
        above.into_iter().skip(skip).collect()
    } else {
        below_label
    };

    let name = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if name.split_whitespace().count() >= 2 {
        log::debug!("holder name from {} lines", lines.len());
        Some(name)
    } else {
        None
    }
}

/// Rejects lines that are mostly symbols or too short to be a place name.
pub fn is_plausible_free_text(text: &str) -> bool {
    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let letters = visible.iter().filter(|c| c.is_alphabetic()).count();
    let alphanumeric = visible.iter().filter(|c| c.is_alphanumeric()).count();
    letters >= MIN_FREE_TEXT_LETTERS && alphanumeric * 10 >= visible.len() * 6
}

fn is_name_line(text: &str) -> bool {
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && text
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '.' || c == '\'')
        && !FRONT_LABELS.is_match(text)
        && !INSTITUTIONAL_HEADERS.is_match(text)
}

/// Index of the topmost token matching `anchor` and the end of the match in it.
fn topmost_label(tokens: &[NormalizedToken<'_>], anchor: &Regex) -> Option<(usize, usize)> {
    tokens
        .iter()
        .enumerate()
        .filter_map(|(idx, token)| anchor.find(&token.text).map(|m| (idx, m.end(), token.bbox().y)))
        .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
        .map(|(idx, end, _)| (idx, end))
}

/// Tokens inside `window` around the label token, grouped into visual lines.
/// With `tail` set, text after the label in its own token opens the first line.
fn lines_in_window(
    tokens: &[NormalizedToken<'_>],
    label: usize,
    tail: Option<usize>,
    window: SearchWindow,
    config: &ExtractionConfig,
) -> Vec<TextLine> {
    let label_token = &tokens[label];
    let mut pieces = Vec::new();

    if let Some(end) = tail {
        let rest = label_token.text[end..]
            .trim_start_matches(|c: char| c == ':' || c == '.' || c.is_whitespace());
        if !rest.is_empty() && label_token.confidence() >= config.min_confidence {
            pieces.push(Piece {
                text: rest,
                confidence: label_token.confidence(),
                distance: 0.0,
                bbox: label_token.bbox(),
            });
        }
    }

    for (idx, token) in tokens.iter().enumerate() {
        if idx == label || token.is_empty() || token.confidence() < config.min_confidence {
            continue;
        }
        if let Some(distance) = window_distance(label_token.bbox(), token.bbox(), window) {
            pieces.push(Piece {
                text: &token.text,
                confidence: token.confidence(),
                distance,
                bbox: token.bbox(),
            });
        }
    }

    group_lines(pieces)
}

fn group_lines(mut pieces: Vec<Piece<'_>>) -> Vec<TextLine> {
    pieces.sort_by(|a, b| {
        a.bbox
            .vertical_center()
            .partial_cmp(&b.bbox.vertical_center())
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x.partial_cmp(&b.bbox.x).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<Vec<Piece<'_>>> = Vec::new();
    for piece in pieces {
        match lines.last_mut() {
            Some(line)
                if (piece.bbox.vertical_center() - line[0].bbox.vertical_center()).abs()
                    <= 0.5 * line[0].bbox.line_height() =>
            {
                line.push(piece)
            }
            _ => lines.push(vec![piece]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.bbox.x.partial_cmp(&b.bbox.x).unwrap_or(Ordering::Equal));
            let text = line.iter().map(|p| p.text).collect::<Vec<_>>().join(" ");
            TextLine {
                text: FreeText::new(text),
                confidence: line.iter().map(|p| p.confidence).fold(1.0, f32::min),
                distance: line.iter().map(|p| p.distance).fold(f32::INFINITY, f32::min),
                position: (line[0].bbox.y, line[0].bbox.x),
            }
        })
        .collect()
}

/// What a CURP encodes about its holder.
#[derive(Debug, Clone, PartialEq)]
pub struct CurpData {
    /// YYMMDD as printed
    pub birth_digits: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: char,
    pub state_code: String,
    pub state: Option<&'static str>,
}

impl CurpData {
    /// `None` unless `curp` satisfies the CURP grammar.
    pub fn parse(curp: &str, reference_year: i32) -> Option<CurpData> {
        if !CURP_GRAMMAR.is_match(curp) {
            return None;
        }
        let yy: i32 = curp[4..6].parse().ok()?;
        let month: u32 = curp[6..8].parse().ok()?;
        let day: u32 = curp[8..10].parse().ok()?;

        // position 17 is a digit for holders born before 2000, a letter after
        let year = if curp.as_bytes()[16].is_ascii_digit() {
            1900 + yy
        } else {
            2000 + yy
        };
        let year = if year > reference_year { year - 100 } else { year };

        let state_code = curp[11..13].to_string();
        Some(CurpData {
            birth_digits: curp[4..10].to_string(),
            birth_date: NaiveDate::from_ymd_opt(year, month, day),
            sex: char::from(curp.as_bytes()[10]),
            state: lookup_state(CURP_STATES, &state_code),
            state_code,
        })
    }

    /// Birth date in the card's DD/MM/YYYY form.
    pub fn fecha_nacimiento(&self) -> Option<String> {
        self.birth_date.map(|date| date.format("%d/%m/%Y").to_string())
    }
}

/// What a clave de elector encodes about its holder.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaveElectorData {
    pub birth_digits: String,
    pub state_code: String,
    pub state: Option<&'static str>,
    pub sex: char,
}

impl ClaveElectorData {
    pub fn parse(clave: &str) -> Option<ClaveElectorData> {
        if !CLAVE_GRAMMAR.is_match(clave) {
            return None;
        }
        let state_code = clave[12..14].to_string();
        Some(ClaveElectorData {
            birth_digits: clave[6..12].to_string(),
            state: lookup_state(ELECTOR_STATES, &state_code),
            state_code,
            sex: char::from(clave.as_bytes()[14]),
        })
    }
}
