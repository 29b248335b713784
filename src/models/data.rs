use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Axis-aligned box of a recognized region, in image pixels (x, y, w, h).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        BoundingBox { x, y, width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Height used as the unit for label-relative search windows.
    pub fn line_height(&self) -> f32 {
        self.height.max(1.0)
    }

    pub fn vertical_center(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// One text region as produced by the OCR engine. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrTextRegion {
    pub text: String,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default = "full_confidence", deserialize_with = "clamped_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

// scores outside [0, 1] are clamped, as in OcrTextRegion::new
fn clamped_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let confidence = f32::deserialize(deserializer)?;
    Ok(confidence.clamp(0.0, 1.0))
}

impl OcrTextRegion {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox, confidence: f32) -> Self {
        OcrTextRegion {
            text: text.into(),
            bounding_box,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Regions for one card face, in the engine's scan order (not reading order).
pub type RawOcrResult = Vec<OcrTextRegion>;

/// A region after cleanup. Borrows its source region for geometry and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedToken<'a> {
    pub text: String,
    pub source: &'a OcrTextRegion,
}

impl<'a> NormalizedToken<'a> {
    pub fn confidence(&self) -> f32 {
        self.source.confidence
    }

    pub fn bbox(&self) -> &'a BoundingBox {
        &self.source.bounding_box
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Face {
    Front,
    Back,
}

/// Fields extracted from the front face (anverso).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FrontField {
    Curp,
    ClaveElector,
    FechaNacimiento,
    AnioRegistro,
    Seccion,
    Vigencia,
    Sexo,
    Pais,
    Calle,
    Numero,
    Colonia,
    Estado,
    CodigoPostal,
}

impl FrontField {
    pub const ALL: [FrontField; 13] = [
        FrontField::Curp,
        FrontField::ClaveElector,
        FrontField::FechaNacimiento,
        FrontField::AnioRegistro,
        FrontField::Seccion,
        FrontField::Vigencia,
        FrontField::Sexo,
        FrontField::Pais,
        FrontField::Calle,
        FrontField::Numero,
        FrontField::Colonia,
        FrontField::Estado,
        FrontField::CodigoPostal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FrontField::Curp => "curp",
            FrontField::ClaveElector => "clave_elector",
            FrontField::FechaNacimiento => "fecha_nacimiento",
            FrontField::AnioRegistro => "anio_registro",
            FrontField::Seccion => "seccion",
            FrontField::Vigencia => "vigencia",
            FrontField::Sexo => "sexo",
            FrontField::Pais => "pais",
            FrontField::Calle => "calle",
            FrontField::Numero => "numero",
            FrontField::Colonia => "colonia",
            FrontField::Estado => "estado",
            FrontField::CodigoPostal => "codigo_postal",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FieldValue {
    pub value: Option<String>,
    pub valid: bool,
}

impl FieldValue {
    pub fn missing() -> Self {
        FieldValue::default()
    }

    pub fn found(value: impl Into<String>, valid: bool) -> Self {
        FieldValue {
            value: Some(value.into()),
            valid,
        }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Same value with a different validity flag.
    pub fn with_valid(self, valid: bool) -> Self {
        FieldValue {
            valid: self.value.is_some() && valid,
            ..self
        }
    }
}

/// Every front field, always present. Updates return a new value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedFields {
    values: [FieldValue; 13],
}

impl ExtractedFields {
    pub fn new() -> Self {
        ExtractedFields::default()
    }

    pub fn get(&self, field: FrontField) -> &FieldValue {
        &self.values[field.index()]
    }

    pub fn value(&self, field: FrontField) -> Option<&str> {
        self.get(field).as_deref()
    }

    pub fn with(mut self, field: FrontField, value: FieldValue) -> Self {
        self.values[field.index()] = value;
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrontField, &FieldValue)> {
        FrontField::ALL.iter().map(move |f| (*f, self.get(*f)))
    }

    pub fn validity(&self) -> BTreeMap<String, bool> {
        self.iter()
            .map(|(field, value)| (field.name().to_string(), value.valid))
            .collect()
    }
}

impl Serialize for ExtractedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.name(), &value.value)?;
        }
        map.end()
    }
}

/// The four ICAO check digits of a TD1 MRZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CheckDigit {
    DocumentNumber,
    BirthDate,
    ExpiryDate,
    Composite,
}

impl CheckDigit {
    pub const ALL: [CheckDigit; 4] = [
        CheckDigit::DocumentNumber,
        CheckDigit::BirthDate,
        CheckDigit::ExpiryDate,
        CheckDigit::Composite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CheckDigit::DocumentNumber => "check_digit_1",
            CheckDigit::BirthDate => "check_digit_2",
            CheckDigit::ExpiryDate => "check_digit_3",
            CheckDigit::Composite => "check_digit_4",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            CheckDigit::DocumentNumber => "document number",
            CheckDigit::BirthDate => "birth date",
            CheckDigit::ExpiryDate => "expiry date",
            CheckDigit::Composite => "composite",
        }
    }
}

/// Decoded back-face MRZ (TD1 data lines plus derived names).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MrzRecord {
    pub line1: String,
    pub line2: String,
    pub document_type: String,
    pub issuing_country: String,
    pub id_number: String,
    pub check_digit_1: char,
    pub optional_data: String,
    pub birth_date: String,
    pub check_digit_2: char,
    pub sex: String,
    pub expiry_date: String,
    pub check_digit_3: char,
    pub nationality: String,
    pub optional_data_2: String,
    pub check_digit_4: char,
    pub apellido_paterno: Option<String>,
    pub apellido_materno: Option<String>,
    pub nombre_reverso: Option<String>,
}

impl MrzRecord {
    pub fn declared_digit(&self, check: CheckDigit) -> char {
        match check {
            CheckDigit::DocumentNumber => self.check_digit_1,
            CheckDigit::BirthDate => self.check_digit_2,
            CheckDigit::ExpiryDate => self.check_digit_3,
            CheckDigit::Composite => self.check_digit_4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ValidationReport {
    pub es_ine: bool,
    pub field_validity: BTreeMap<String, bool>,
    pub reasons: Vec<String>,
}

/// Card generation inferred from header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialType {
    /// Older IFE-issued card
    C,
    D,
    GM,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontRecord {
    pub es_ine: bool,
    pub tipo_credencial: Option<CredentialType>,
    pub nombre: Option<String>,
    #[serde(flatten)]
    pub fields: ExtractedFields,
    pub entidad_nacimiento: Option<String>,
    pub entidad_registro: Option<String>,
    pub vigente: Option<bool>,
    pub validacion: ValidationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackRecord {
    pub es_ine: bool,
    pub linea1: Option<String>,
    pub linea2: Option<String>,
    pub linea3: Option<String>,
    pub apellido_paterno: Option<String>,
    pub apellido_materno: Option<String>,
    pub nombre_reverso: Option<String>,
    pub mrz: Option<MrzRecord>,
    pub vigente: Option<bool>,
    pub validacion: ValidationReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_confidence_is_clamped_when_deserialized() {
        let regions: Vec<OcrTextRegion> = serde_json::from_str(
            r#"[
                {"text": "CURP", "bounding_box": {"x": 0, "y": 0, "width": 10, "height": 5}, "confidence": 87.0},
                {"text": "SEXO", "confidence": -0.2},
                {"text": "H"}
            ]"#,
        )
        .unwrap();
        assert_eq!(regions[0].confidence, 1.0);
        assert_eq!(regions[1].confidence, 0.0);
        assert_eq!(regions[2].confidence, 1.0);
    }

    #[test]
    fn test_extracted_fields_always_carry_every_key() {
        let fields = ExtractedFields::new().with(FrontField::Curp, FieldValue::found("X", true));
        let json = serde_json::to_value(&fields).unwrap();
        let map = json.as_object().unwrap();

        assert_eq!(map.len(), 13);
        for field in FrontField::ALL {
            assert!(map.contains_key(field.name()), "missing {}", field.name());
        }
        assert_eq!(map["curp"], "X");
        assert!(map["calle"].is_null());
    }

    #[test]
    fn test_with_valid_never_marks_missing_value_valid() {
        assert!(!FieldValue::missing().with_valid(true).valid);
        assert!(FieldValue::found("H", false).with_valid(true).valid);
    }
}
