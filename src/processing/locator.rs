use std::cmp::Ordering;
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::ExtractionConfig;
use crate::models::rules::{
    AnchorPolicy, FieldKind, FieldRule, Grammar, Scan, SearchWindow, TieBreak, FRONT_FIELD_RULES,
    FRONT_LABELS,
};
use crate::models::{BoundingBox, Face, FrontField, NormalizedToken};
use crate::processing::extractors;
use crate::processing::field_correction::{correct_to_shape, CharClass, FreeText, GrammarChecked};
use crate::processing::mrz::{MrzLines, MrzLocator};
use crate::utils::IneError;

// Distance per character between a label and a value in the same token
const SAME_TOKEN_STEP: f32 = 0.01;
// Share of positions that must already fit a shape before correction is tried
const MIN_SHAPE_AGREEMENT: f32 = 0.5;
// Reach to the right of a label on its own row, in line heights per window line
const SAME_LINE_REACH: f32 = 4.0;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\S+").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateValue {
    Checked(GrammarChecked),
    Free(FreeText),
}

impl CandidateValue {
    pub fn as_str(&self) -> &str {
        match self {
            CandidateValue::Checked(value) => value.as_str(),
            CandidateValue::Free(value) => value.as_str(),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            CandidateValue::Checked(value) => value.into_string(),
            CandidateValue::Free(value) => value.into_string(),
        }
    }
}

/// A value proposed for one field, with what the ranking needs to know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCandidate {
    pub value: CandidateValue,
    pub confidence: f32,
    pub anchored: bool,
    /// Distance to the nearest anchor label in label line heights.
    pub distance: f32,
    pub corrected: bool,
    /// (y, x) of the source token
    pub position: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    Front(BTreeMap<FrontField, FieldCandidate>),
    Back(MrzLines),
}

struct RawMatch {
    text: String,
    start: usize,
    corrected: bool,
}

struct LabelHit<'t> {
    token: usize,
    end: usize,
    bbox: &'t BoundingBox,
}

pub struct FieldLocator;

impl FieldLocator {
    pub fn locate(tokens: &[NormalizedToken<'_>], face: Face, config: &ExtractionConfig) -> Located {
        match face {
            Face::Front => Located::Front(Self::locate_front(tokens, config)),
            Face::Back => Located::Back(MrzLocator::locate(tokens, config)),
        }
    }

    /// Evaluates every front rule in table order. Fields without a candidate are absent.
    pub fn locate_front(
        tokens: &[NormalizedToken<'_>],
        config: &ExtractionConfig,
    ) -> BTreeMap<FrontField, FieldCandidate> {
        let reference_year = config.reference_year();
        let mut found: BTreeMap<FrontField, FieldCandidate> = BTreeMap::new();

        for rule in FRONT_FIELD_RULES.iter() {
            let candidate = match &rule.kind {
                FieldKind::Grammar(grammar) => {
                    Self::best_grammar_candidate(tokens, rule, grammar, reference_year)
                }
                FieldKind::FreeTextLine { line } => Self::free_text_line(tokens, rule, *line, config),
                FieldKind::Within { parents, grammar } => {
                    Self::within_parents(&found, parents, grammar, reference_year)
                }
            };

            match candidate {
                Some(candidate) => {
                    log::debug!(
                        "{} = {:?} (confidence {:.2}, anchored {}, corrected {})",
                        rule.field.name(),
                        candidate.value.as_str(),
                        candidate.confidence,
                        candidate.anchored,
                        candidate.corrected
                    );
                    found.insert(rule.field, candidate);
                }
                None => log::debug!("{} not found", rule.field.name()),
            }
        }

        found
    }

    fn best_grammar_candidate(
        tokens: &[NormalizedToken<'_>],
        rule: &FieldRule,
        grammar: &Grammar,
        reference_year: i32,
    ) -> Option<FieldCandidate> {
        let labels = Self::label_hits(tokens, rule.anchor.as_ref());
        let fences: Vec<usize> = if labels.is_empty() {
            Vec::new()
        } else {
            Self::label_tokens(tokens)
        };
        let mut candidates = Vec::new();

        for (idx, token) in tokens.iter().enumerate() {
            if token.is_empty() {
                continue;
            }
            for raw in Self::scan(&token.text, grammar) {
                let (anchored, distance) =
                    Self::anchor_distance(tokens, idx, raw.start, &labels, &fences, rule.window);
                if !anchored && rule.policy == AnchorPolicy::Required {
                    continue;
                }
                if !(grammar.plausible)(&raw.text, anchored, reference_year) {
                    log::trace!("{}: implausible {:?}", rule.field.name(), raw.text);
                    continue;
                }
                let bbox = token.bbox();
                candidates.push(FieldCandidate {
                    value: CandidateValue::Checked(GrammarChecked::new(raw.text)),
                    confidence: token.confidence(),
                    anchored,
                    distance,
                    corrected: raw.corrected,
                    position: (bbox.y, bbox.x),
                });
            }
        }

        Self::pick(rule.field, candidates, rule.tie_break)
    }

    fn scan(text: &str, grammar: &Grammar) -> Vec<RawMatch> {
        match &grammar.scan {
            Scan::Search(pattern) => pattern
                .find_iter(text)
                .filter_map(|m| {
                    let value = (grammar.canonical)(m.as_str());
                    grammar.accepts(&value).then(|| RawMatch {
                        text: value,
                        start: m.start(),
                        corrected: false,
                    })
                })
                .collect(),
            Scan::Words { shape } => WORD
                .find_iter(text)
                .filter_map(|m| {
                    let word = m
                        .as_str()
                        .trim_matches(|c: char| matches!(c, ':' | ';' | ',' | '.'));
                    let value = (grammar.canonical)(word);
                    if grammar.accepts(&value) {
                        return Some(RawMatch {
                            text: value,
                            start: m.start(),
                            corrected: false,
                        });
                    }
                    let shape = (*shape)?;
                    if Self::shape_agreement(&value, shape) < MIN_SHAPE_AGREEMENT {
                        return None;
                    }
                    let fixed = correct_to_shape(&value, shape)?;
                    grammar.accepts(&fixed).then(|| RawMatch {
                        text: fixed,
                        start: m.start(),
                        corrected: true,
                    })
                })
                .collect(),
        }
    }

    /// Fraction of positions whose character already fits the shape.
    fn shape_agreement(text: &str, shape: &str) -> f32 {
        let len = shape.chars().count();
        if len == 0 || text.chars().count() != len {
            return 0.0;
        }
        let fitting = text
            .chars()
            .zip(shape.chars())
            .filter(|(c, s)| CharClass::from_shape(*s).accepts(*c))
            .count();
        fitting as f32 / len as f32
    }

    fn label_hits<'t>(tokens: &'t [NormalizedToken<'_>], anchor: Option<&Regex>) -> Vec<LabelHit<'t>> {
        let Some(anchor) = anchor else {
            return Vec::new();
        };
        tokens
            .iter()
            .enumerate()
            .filter_map(|(idx, token)| {
                anchor.find(&token.text).map(|m| LabelHit {
                    token: idx,
                    end: m.end(),
                    bbox: token.bbox(),
                })
            })
            .collect()
    }

    /// Indices of tokens holding any front label.
    fn label_tokens(tokens: &[NormalizedToken<'_>]) -> Vec<usize> {
        tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| FRONT_LABELS.is_match(&token.text))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// True when a front label lies entirely inside `text[from..to]`.
    fn label_between(text: &str, from: usize, to: usize) -> bool {
        FRONT_LABELS
            .find_iter(text)
            .any(|m| m.start() >= from && m.end() <= to)
    }

    /// True when another label token sits on the label's row between it and `target`.
    fn fenced(
        tokens: &[NormalizedToken<'_>],
        fences: &[usize],
        hit: &LabelHit<'_>,
        target: usize,
    ) -> bool {
        let label = hit.bbox;
        let target_box = tokens[target].bbox();
        if !same_row(label, target_box) {
            return false;
        }
        fences
            .iter()
            .filter(|&&fence| fence != hit.token && fence != target)
            .map(|&fence| tokens[fence].bbox())
            .any(|fence| same_row(label, fence) && fence.x > label.x && fence.x < target_box.x)
    }

    fn anchor_distance(
        tokens: &[NormalizedToken<'_>],
        idx: usize,
        start: usize,
        labels: &[LabelHit<'_>],
        fences: &[usize],
        window: SearchWindow,
    ) -> (bool, f32) {
        let token = &tokens[idx];
        let best = labels
            .iter()
            .filter_map(|hit| {
                if hit.token == idx {
                    // value must follow the label inside the token, with no other label between
                    if start < hit.end || Self::label_between(&token.text, hit.end, start) {
                        return None;
                    }
                    Some((start - hit.end) as f32 * SAME_TOKEN_STEP)
                } else if Self::label_between(&token.text, 0, start)
                    || Self::fenced(tokens, fences, hit, idx)
                {
                    // the value belongs to a nearer label
                    None
                } else {
                    window_distance(hit.bbox, token.bbox(), window)
                }
            })
            .fold(None, |best: Option<f32>, d| Some(best.map_or(d, |b| b.min(d))));

        match best {
            Some(distance) => (true, distance),
            None => (false, f32::INFINITY),
        }
    }

    fn pick(
        field: FrontField,
        mut candidates: Vec<FieldCandidate>,
        tie_break: TieBreak,
    ) -> Option<FieldCandidate> {
        candidates.sort_by(|a, b| Self::rank(a, b, tie_break));

        if let [first, second, ..] = candidates.as_slice() {
            if first.value != second.value
                && first.anchored == second.anchored
                && first.confidence == second.confidence
                && first.distance == second.distance
            {
                let err = IneError::AmbiguousField(format!(
                    "{}: {:?} and {:?} rank equally, keeping the first in reading order",
                    field.name(),
                    first.value.as_str(),
                    second.value.as_str()
                ));
                log::debug!("{}", err);
            }
        }

        candidates.into_iter().next()
    }

    /// Total order over candidates; the smallest wins.
    fn rank(a: &FieldCandidate, b: &FieldCandidate, tie_break: TieBreak) -> Ordering {
        let anchor = b.anchored.cmp(&a.anchored);
        let confidence = b
            .confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal);
        let primary = match tie_break {
            TieBreak::AnchorThenConfidence => anchor.then(confidence),
            TieBreak::ConfidenceThenAnchor => confidence.then(anchor),
        };

        primary
            .then(a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal))
            .then(a.corrected.cmp(&b.corrected))
            .then(a.position.0.partial_cmp(&b.position.0).unwrap_or(Ordering::Equal))
            .then(a.position.1.partial_cmp(&b.position.1).unwrap_or(Ordering::Equal))
            .then_with(|| a.value.as_str().cmp(b.value.as_str()))
    }

    fn free_text_line(
        tokens: &[NormalizedToken<'_>],
        rule: &FieldRule,
        line: usize,
        config: &ExtractionConfig,
    ) -> Option<FieldCandidate> {
        if line >= config.address_lines {
            return None;
        }
        let anchor = rule.anchor.as_ref()?;
        let text_line = extractors::address_lines(tokens, anchor, rule.window, config)
            .into_iter()
            .nth(line)?;

        Some(FieldCandidate {
            value: CandidateValue::Free(text_line.text),
            confidence: text_line.confidence,
            anchored: true,
            distance: text_line.distance,
            corrected: false,
            position: text_line.position,
        })
    }

    fn within_parents(
        found: &BTreeMap<FrontField, FieldCandidate>,
        parents: &[FrontField],
        grammar: &Grammar,
        reference_year: i32,
    ) -> Option<FieldCandidate> {
        parents
            .iter()
            .filter_map(|parent| found.get(parent))
            .find_map(|parent| {
                // house numbers and postal codes close their line
                Self::scan(parent.value.as_str(), grammar)
                    .into_iter()
                    .rev()
                    .find(|m| (grammar.plausible)(&m.text, parent.anchored, reference_year))
                    .map(|m| FieldCandidate {
                        value: CandidateValue::Checked(GrammarChecked::new(m.text)),
                        confidence: parent.confidence,
                        anchored: parent.anchored,
                        distance: parent.distance,
                        corrected: m.corrected,
                        position: parent.position,
                    })
            })
    }
}

fn same_row(label: &BoundingBox, target: &BoundingBox) -> bool {
    (target.vertical_center() - label.vertical_center()).abs() <= label.line_height() * 0.6
}

/// Distance from `label` to `target` in label line heights, if `target` lies in `window`.
pub(crate) fn window_distance(
    label: &BoundingBox,
    target: &BoundingBox,
    window: SearchWindow,
) -> Option<f32> {
    let line = label.line_height();
    let (label_x, label_y) = label.center();
    let (target_x, target_y) = target.center();
    let dy = target.vertical_center() - label.vertical_center();
    let distance = ((target_x - label_x).powi(2) + (target_y - label_y).powi(2)).sqrt() / line;

    let same_line = same_row(label, target);
    let aligned = target.right() >= label.x - 2.0 * line && target.x <= label.right() + 4.0 * line;

    let inside = match window {
        SearchWindow::Near { lines } => {
            let reach = label.right() + lines * SAME_LINE_REACH * line;
            (same_line && target.x >= label.x && target.x <= reach)
                || (dy > 0.0 && dy <= lines * line && aligned)
        }
        SearchWindow::Below { lines } => dy > line * 0.5 && dy <= lines * line && aligned,
        SearchWindow::Above { lines } => -dy > line * 0.5 && -dy <= lines * line && aligned,
    };
    inside.then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OcrTextRegion;
    use crate::processing::TextNormalizer;

    fn region(text: &str, x: f32, y: f32, confidence: f32) -> OcrTextRegion {
        OcrTextRegion::new(text, BoundingBox::new(x, y, 200.0, 20.0), confidence)
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig {
            reference_year: Some(2024),
            ..ExtractionConfig::default()
        }
    }

    fn front(regions: &[OcrTextRegion]) -> BTreeMap<FrontField, FieldCandidate> {
        let tokens = TextNormalizer::normalize(regions);
        FieldLocator::locate_front(&tokens, &config())
    }

    fn value(found: &BTreeMap<FrontField, FieldCandidate>, field: FrontField) -> Option<&str> {
        found.get(&field).map(|c| c.value.as_str())
    }

    #[test]
    fn test_value_in_label_token() {
        let found = front(&[region("CURP GOMA800101HDFRSN09", 10.0, 10.0, 0.9)]);
        let curp = &found[&FrontField::Curp];
        assert_eq!(curp.value.as_str(), "GOMA800101HDFRSN09");
        assert!(curp.anchored);
        assert!(!curp.corrected);
    }

    #[test]
    fn test_value_below_label() {
        let found = front(&[
            region("CLAVE DE ELECTOR", 10.0, 10.0, 0.9),
            region("GMRSJN80010109H100", 10.0, 32.0, 0.9),
        ]);
        assert_eq!(value(&found, FrontField::ClaveElector), Some("GMRSJN80010109H100"));
        assert!(found[&FrontField::ClaveElector].anchored);
    }

    #[test]
    fn test_shape_correction_marks_candidate() {
        let found = front(&[region("CURP GOMA8OO1O1HDFR5N09", 10.0, 10.0, 0.9)]);
        let curp = &found[&FrontField::Curp];
        assert_eq!(curp.value.as_str(), "GOMA800101HDFRSN09");
        assert!(curp.corrected);
    }

    #[test]
    fn test_required_anchor_drops_stray_numbers() {
        // a bare number with no SECCION label nearby is not a seccion
        let found = front(&[region("1234", 10.0, 10.0, 0.99)]);
        assert!(value(&found, FrontField::Seccion).is_none());

        let found = front(&[
            region("SECCIÓN", 10.0, 10.0, 0.9),
            region("1234", 10.0, 32.0, 0.9),
        ]);
        assert_eq!(value(&found, FrontField::Seccion), Some("1234"));
    }

    #[test]
    fn test_anchored_candidate_beats_higher_confidence() {
        let found = front(&[
            region("CURP", 10.0, 10.0, 0.9),
            region("GOMA800101HDFRSN09", 10.0, 32.0, 0.6),
            region("PELJ750505MJCRRN01", 600.0, 400.0, 0.99),
        ]);
        assert_eq!(value(&found, FrontField::Curp), Some("GOMA800101HDFRSN09"));
    }

    #[test]
    fn test_confidence_breaks_ties_regardless_of_order() {
        let low = region("GMRSJN80010109H100", 10.0, 10.0, 0.7);
        let high = region("PRLPJN75050514M200", 10.0, 300.0, 0.95);

        let forward = front(&[low.clone(), high.clone()]);
        let backward = front(&[high, low]);
        assert_eq!(value(&forward, FrontField::ClaveElector), Some("PRLPJN75050514M200"));
        assert_eq!(value(&backward, FrontField::ClaveElector), Some("PRLPJN75050514M200"));
    }

    #[test]
    fn test_address_lines_and_nested_fields() {
        let found = front(&[
            region("DOMICILIO", 10.0, 100.0, 0.9),
            region("C JUAREZ 12", 10.0, 122.0, 0.9),
            region("COL CENTRO 06000", 10.0, 144.0, 0.9),
            region("CUAUHTEMOC, CDMX", 10.0, 166.0, 0.9),
        ]);
        assert_eq!(value(&found, FrontField::Calle), Some("C JUAREZ 12"));
        assert_eq!(value(&found, FrontField::Numero), Some("12"));
        assert_eq!(value(&found, FrontField::Colonia), Some("COL CENTRO 06000"));
        assert_eq!(value(&found, FrontField::CodigoPostal), Some("06000"));
        assert_eq!(value(&found, FrontField::Estado), Some("CUAUHTEMOC, CDMX"));
    }

    #[test]
    fn test_vigencia_and_pais() {
        let found = front(&[
            region("ESTADOS UNIDOS MEXICANOS", 10.0, 10.0, 0.8),
            region("VIGENCIA 2021 - 2031", 10.0, 300.0, 0.9),
        ]);
        assert_eq!(value(&found, FrontField::Vigencia), Some("2021 - 2031"));
        assert_eq!(value(&found, FrontField::Pais), Some("MEX"));
    }

    #[test]
    fn test_window_distance_respects_direction() {
        let label = BoundingBox::new(10.0, 100.0, 200.0, 20.0);
        let below = BoundingBox::new(10.0, 122.0, 200.0, 20.0);
        let above = BoundingBox::new(10.0, 78.0, 200.0, 20.0);
        let far_below = BoundingBox::new(10.0, 300.0, 200.0, 20.0);

        assert!(window_distance(&label, &below, SearchWindow::Below { lines: 4.5 }).is_some());
        assert!(window_distance(&label, &above, SearchWindow::Below { lines: 4.5 }).is_none());
        assert!(window_distance(&label, &far_below, SearchWindow::Near { lines: 2.0 }).is_none());

        let beside = BoundingBox::new(240.0, 100.0, 80.0, 20.0);
        let far_right = BoundingBox::new(600.0, 100.0, 80.0, 20.0);
        assert!(window_distance(&label, &beside, SearchWindow::Near { lines: 1.5 }).is_some());
        assert!(window_distance(&label, &far_right, SearchWindow::Near { lines: 1.5 }).is_none());
    }

    fn narrow(text: &str, x: f32, width: f32, confidence: f32) -> OcrTextRegion {
        OcrTextRegion::new(text, BoundingBox::new(x, 300.0, width, 20.0), confidence)
    }

    #[test]
    fn test_next_label_on_row_closes_the_window() {
        let found = front(&[
            narrow("SECCIÓN", 10.0, 80.0, 0.9),
            narrow("1234", 110.0, 60.0, 0.85),
            narrow("VIGENCIA", 200.0, 90.0, 0.9),
            narrow("2021 - 2031", 300.0, 120.0, 0.95),
        ]);
        assert_eq!(value(&found, FrontField::Seccion), Some("1234"));
        assert_eq!(value(&found, FrontField::Vigencia), Some("2021 - 2031"));

        // a label inside the neighbouring token fences its own value
        let found = front(&[
            narrow("AÑO DE REGISTRO", 10.0, 150.0, 0.9),
            narrow("2010 03", 170.0, 70.0, 0.8),
            narrow("VIGENCIA 2021 - 2031", 250.0, 200.0, 0.95),
        ]);
        assert_eq!(value(&found, FrontField::AnioRegistro), Some("2010 03"));
        assert_eq!(value(&found, FrontField::Vigencia), Some("2021 - 2031"));
    }
}
