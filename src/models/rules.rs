// Declarative field table for the front face: what each field looks like,
// which printed label anchors it, where to look relative to the label and how
// competing candidates are ranked.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::FrontField;

/// Where a value may sit relative to its anchor label, in label line heights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchWindow {
    /// After the label in the same token, to its right on the same line,
    /// or up to `lines` below it.
    Near { lines: f32 },
    /// Strictly below the label, up to `lines`, roughly left-aligned with it.
    Below { lines: f32 },
    /// Strictly above the label, up to `lines`, roughly left-aligned with it.
    Above { lines: f32 },
}

/// Ranking between candidates that satisfy the same grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Label-anchored candidates first, then OCR confidence, then anchor distance.
    AnchorThenConfidence,
    /// OCR confidence first, then label anchoring and distance.
    ConfidenceThenAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// Candidates outside every label window are dropped.
    Required,
    /// Unanchored candidates compete, ranked after anchored ones.
    Preferred,
}

/// How candidate strings are pulled out of a token.
#[derive(Debug)]
pub enum Scan {
    /// Whitespace-delimited words, each tested against the acceptance pattern.
    /// Words of the shape's length may be confusion-corrected first.
    Words { shape: Option<&'static str> },
    /// Every match of a search pattern over the token text.
    Search(Regex),
}

/// Pattern side of a field: a value is grammar-checked once it passes `accept`
/// after `canonical`, and `plausible` agrees.
pub struct Grammar {
    pub scan: Scan,
    pub accept: Regex,
    pub canonical: fn(&str) -> String,
    /// Receives the canonical value, whether it was label-anchored and the reference year.
    pub plausible: fn(&str, bool, i32) -> bool,
}

impl Grammar {
    pub fn accepts(&self, value: &str) -> bool {
        self.accept.is_match(value)
    }
}

pub enum FieldKind {
    /// Value must satisfy a grammar; confusion correction allowed.
    Grammar(Grammar),
    /// The `line`-th plausible free-text line inside the anchor window, in
    /// reading order. Never corrected.
    FreeTextLine { line: usize },
    /// Grammar evaluated inside the values of already-located fields, in order.
    Within {
        parents: &'static [FrontField],
        grammar: Grammar,
    },
}

pub struct FieldRule {
    pub field: FrontField,
    pub kind: FieldKind,
    pub anchor: Option<Regex>,
    pub window: SearchWindow,
    pub policy: AnchorPolicy,
    pub tie_break: TieBreak,
}

pub const CURP_SHAPE: &str = "LLLLDDDDDDLLLLLLAA";
pub const CLAVE_ELECTOR_SHAPE: &str = "LLLLLLDDDDDDDDLAAA";
pub const CURP_PATTERN: &str = r"^[A-Z]{4}[0-9]{6}[HM][A-Z]{5}[A-Z0-9]{2}$";
pub const CLAVE_ELECTOR_PATTERN: &str = r"^[A-Z]{6}[0-9]{8}[HM][A-Z0-9]{3}$";

pub const CURP_LABEL: &str = r"\bCURP\b";
pub const CLAVE_ELECTOR_LABEL: &str = r"\bCLAVE\s*(?:DE\s*)?ELECTOR\b";
pub const FECHA_NACIMIENTO_LABEL: &str = r"\bFECHA\s*(?:DE\s*)?NACIMIENTO\b";
pub const ANIO_REGISTRO_LABEL: &str = r"\bA[ÑN]O\s*(?:DE\s*)?REGISTRO\b";
pub const SECCION_LABEL: &str = r"\bSECCI[OÓ]N\b";
pub const VIGENCIA_LABEL: &str = r"\bVIGENCIA\b";
pub const SEXO_LABEL: &str = r"\bSEXO\b";
pub const DOMICILIO_LABEL: &str = r"\bDOMICILIO\b";
pub const NOMBRE_LABEL: &str = r"\bNOMBRE\b";

fn label(pattern: &str) -> Option<Regex> {
    Some(Regex::new(pattern).unwrap())
}

fn identity(value: &str) -> String {
    value.to_string()
}

fn collapse_spaces(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn always(_: &str, _: bool, _: i32) -> bool {
    true
}

fn canonical_date(value: &str) -> String {
    value.replace(['-', '.'], "/")
}

fn plausible_birth_date(value: &str, _: bool, reference_year: i32) -> bool {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return false;
    }
    match (
        parts[0].parse::<u32>(),
        parts[1].parse::<u32>(),
        parts[2].parse::<i32>(),
    ) {
        (Ok(day), Ok(month), Ok(year)) => {
            year <= reference_year && chrono::NaiveDate::from_ymd_opt(year, month, day).is_some()
        }
        _ => false,
    }
}

fn years(value: &str) -> Vec<i32> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| part.len() == 4)
        .filter_map(|part| part.parse().ok())
        .collect()
}

fn canonical_vigencia(value: &str) -> String {
    match years(value).as_slice() {
        [from, to] => format!("{} - {}", from, to),
        [single] => single.to_string(),
        _ => collapse_spaces(value),
    }
}

fn plausible_vigencia(value: &str, anchored: bool, _: i32) -> bool {
    match years(value).as_slice() {
        [from, to] => (1900..=2099).contains(from) && (1900..=2099).contains(to) && to > from,
        // a lone year is only trusted next to its label
        [single] => anchored && (1900..=2099).contains(single),
        _ => false,
    }
}

fn canonical_anio_registro(value: &str) -> String {
    let value = collapse_spaces(value);
    if value.contains(' ') {
        value
    } else {
        format!("{} 00", value)
    }
}

fn plausible_anio_registro(value: &str, _: bool, reference_year: i32) -> bool {
    value
        .get(0..4)
        .and_then(|year| year.parse::<i32>().ok())
        .map(|year| (1900..=reference_year + 1).contains(&year))
        .unwrap_or(false)
}

fn canonical_pais(_: &str) -> String {
    "MEX".to_string()
}

fn word_grammar(shape: Option<&'static str>, accept: &str) -> Grammar {
    Grammar {
        scan: Scan::Words { shape },
        accept: Regex::new(accept).unwrap(),
        canonical: identity,
        plausible: always,
    }
}

lazy_static! {
    pub static ref FRONT_FIELD_RULES: Vec<FieldRule> = vec![
        FieldRule {
            field: FrontField::Curp,
            kind: FieldKind::Grammar(word_grammar(Some(CURP_SHAPE), CURP_PATTERN)),
            anchor: label(CURP_LABEL),
            window: SearchWindow::Near { lines: 2.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::ClaveElector,
            kind: FieldKind::Grammar(word_grammar(Some(CLAVE_ELECTOR_SHAPE), CLAVE_ELECTOR_PATTERN)),
            anchor: label(CLAVE_ELECTOR_LABEL),
            window: SearchWindow::Near { lines: 2.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::FechaNacimiento,
            kind: FieldKind::Grammar(Grammar {
                scan: Scan::Words { shape: Some("DD/DD/DDDD") },
                accept: Regex::new(r"^(0[1-9]|[12][0-9]|3[01])/(0[1-9]|1[0-2])/(19|20)[0-9]{2}$").unwrap(),
                canonical: canonical_date,
                plausible: plausible_birth_date,
            }),
            anchor: label(FECHA_NACIMIENTO_LABEL),
            window: SearchWindow::Near { lines: 2.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::AnioRegistro,
            kind: FieldKind::Grammar(Grammar {
                scan: Scan::Search(Regex::new(r"\b(?:19|20)[0-9]{2}(?:\s+[0-9]{2})?\b").unwrap()),
                accept: Regex::new(r"^(19|20)[0-9]{2} [0-9]{2}$").unwrap(),
                canonical: canonical_anio_registro,
                plausible: plausible_anio_registro,
            }),
            anchor: label(ANIO_REGISTRO_LABEL),
            window: SearchWindow::Near { lines: 1.5 },
            policy: AnchorPolicy::Required,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Seccion,
            kind: FieldKind::Grammar(word_grammar(None, r"^[0-9]{1,4}$")),
            anchor: label(SECCION_LABEL),
            window: SearchWindow::Near { lines: 1.5 },
            policy: AnchorPolicy::Required,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Vigencia,
            kind: FieldKind::Grammar(Grammar {
                scan: Scan::Search(
                    Regex::new(r"\b(?:19|20)[0-9]{2}(?:\s*[-\s]\s*(?:19|20)[0-9]{2})?\b").unwrap(),
                ),
                accept: Regex::new(r"^(19|20)[0-9]{2}( - (19|20)[0-9]{2})?$").unwrap(),
                canonical: canonical_vigencia,
                plausible: plausible_vigencia,
            }),
            anchor: label(VIGENCIA_LABEL),
            window: SearchWindow::Near { lines: 2.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Sexo,
            kind: FieldKind::Grammar(word_grammar(None, r"^[HM]$")),
            anchor: label(SEXO_LABEL),
            window: SearchWindow::Near { lines: 1.5 },
            policy: AnchorPolicy::Required,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Pais,
            kind: FieldKind::Grammar(Grammar {
                scan: Scan::Search(Regex::new(r"\bM[EÉ]XICO\b|\bMEXICANOS\b").unwrap()),
                accept: Regex::new(r"^MEX$").unwrap(),
                canonical: canonical_pais,
                plausible: always,
            }),
            anchor: None,
            window: SearchWindow::Near { lines: 0.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::ConfidenceThenAnchor,
        },
        FieldRule {
            field: FrontField::Calle,
            kind: FieldKind::FreeTextLine { line: 0 },
            anchor: label(DOMICILIO_LABEL),
            window: SearchWindow::Below { lines: 4.5 },
            policy: AnchorPolicy::Required,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Colonia,
            kind: FieldKind::FreeTextLine { line: 1 },
            anchor: label(DOMICILIO_LABEL),
            window: SearchWindow::Below { lines: 4.5 },
            policy: AnchorPolicy::Required,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Estado,
            kind: FieldKind::FreeTextLine { line: 2 },
            anchor: label(DOMICILIO_LABEL),
            window: SearchWindow::Below { lines: 4.5 },
            policy: AnchorPolicy::Required,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::Numero,
            kind: FieldKind::Within {
                parents: &[FrontField::Calle],
                grammar: Grammar {
                    scan: Scan::Search(
                        Regex::new(r"\b[0-9]{1,5}[A-Z]?(?:\s*INT\.?\s*[0-9]+)?\b").unwrap(),
                    ),
                    accept: Regex::new(r"^[0-9]{1,5}[A-Z]?(?: ?INT\.? ?[0-9]+)?$").unwrap(),
                    canonical: collapse_spaces,
                    plausible: always,
                },
            },
            anchor: None,
            window: SearchWindow::Near { lines: 0.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::AnchorThenConfidence,
        },
        FieldRule {
            field: FrontField::CodigoPostal,
            kind: FieldKind::Within {
                parents: &[FrontField::Colonia, FrontField::Estado],
                grammar: word_grammar(Some("DDDDD"), r"^[0-9]{5}$"),
            },
            anchor: None,
            window: SearchWindow::Near { lines: 0.0 },
            policy: AnchorPolicy::Preferred,
            tie_break: TieBreak::AnchorThenConfidence,
        },
    ];

    /// Every printed label on the front face; free text never contains one.
    pub static ref FRONT_LABELS: Regex = Regex::new(
        r"\b(?:NOMBRE|DOMICILIO|CLAVE\s*(?:DE\s*)?ELECTOR|CURP|FECHA\s*(?:DE\s*)?NACIMIENTO|SECCI[OÓ]N|A[ÑN]O\s*(?:DE\s*)?REGISTRO|VIGENCIA|SEXO|EDAD|EMISI[OÓ]N|LOCALIDAD|MUNICIPIO|FIRMA)\b"
    ).unwrap();

    /// Card headers that are never holder or address data.
    pub static ref INSTITUTIONAL_HEADERS: Regex = Regex::new(
        r"\b(?:INSTITUTO|NACIONAL|FEDERAL|ELECTORAL|CREDENCIAL|PARA\s+VOTAR|M[EÉ]XICO|ESTADOS\s+UNIDOS)\b"
    ).unwrap();
}

/// CURP birth-state codes (positions 12-13).
pub const CURP_STATES: &[(&str, &str)] = &[
    ("AS", "AGUASCALIENTES"),
    ("BC", "BAJA CALIFORNIA"),
    ("BS", "BAJA CALIFORNIA SUR"),
    ("CC", "CAMPECHE"),
    ("CL", "COAHUILA"),
    ("CM", "COLIMA"),
    ("CS", "CHIAPAS"),
    ("CH", "CHIHUAHUA"),
    ("DF", "CIUDAD DE MÉXICO"),
    ("DG", "DURANGO"),
    ("GT", "GUANAJUATO"),
    ("GR", "GUERRERO"),
    ("HG", "HIDALGO"),
    ("JC", "JALISCO"),
    ("MC", "MÉXICO"),
    ("MN", "MICHOACÁN"),
    ("MS", "MORELOS"),
    ("NT", "NAYARIT"),
    ("NL", "NUEVO LEÓN"),
    ("OC", "OAXACA"),
    ("PL", "PUEBLA"),
    ("QT", "QUERÉTARO"),
    ("QR", "QUINTANA ROO"),
    ("SP", "SAN LUIS POTOSÍ"),
    ("SL", "SINALOA"),
    ("SR", "SONORA"),
    ("TC", "TABASCO"),
    ("TS", "TAMAULIPAS"),
    ("TL", "TLAXCALA"),
    ("VZ", "VERACRUZ"),
    ("YN", "YUCATÁN"),
    ("ZS", "ZACATECAS"),
    ("NE", "EXTRANJERO"),
];

/// Electoral registry state codes (clave de elector positions 13-14).
pub const ELECTOR_STATES: &[(&str, &str)] = &[
    ("01", "AGUASCALIENTES"),
    ("02", "BAJA CALIFORNIA"),
    ("03", "BAJA CALIFORNIA SUR"),
    ("04", "CAMPECHE"),
    ("05", "COAHUILA"),
    ("06", "COLIMA"),
    ("07", "CHIAPAS"),
    ("08", "CHIHUAHUA"),
    ("09", "CIUDAD DE MÉXICO"),
    ("10", "DURANGO"),
    ("11", "GUANAJUATO"),
    ("12", "GUERRERO"),
    ("13", "HIDALGO"),
    ("14", "JALISCO"),
    ("15", "MÉXICO"),
    ("16", "MICHOACÁN"),
    ("17", "MORELOS"),
    ("18", "NAYARIT"),
    ("19", "NUEVO LEÓN"),
    ("20", "OAXACA"),
    ("21", "PUEBLA"),
    ("22", "QUERÉTARO"),
    ("23", "QUINTANA ROO"),
    ("24", "SAN LUIS POTOSÍ"),
    ("25", "SINALOA"),
    ("26", "SONORA"),
    ("27", "TABASCO"),
    ("28", "TAMAULIPAS"),
    ("29", "TLAXCALA"),
    ("30", "VERACRUZ"),
    ("31", "YUCATÁN"),
    ("32", "ZACATECAS"),
];

pub fn lookup_state(table: &[(&str, &'static str)], code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, name)| *name)
}
