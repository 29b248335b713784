use std::collections::BTreeMap;

use crate::config::ExtractionConfig;
use crate::models::*;
use crate::processing::extractors::{self, ClaveElectorData, CurpData};
use crate::processing::*;
use crate::utils::IneError;
use crate::validation::*;

/// Pipeline entry point: OCR regions in, front or back record out.
pub struct IneValidator {
    config: ExtractionConfig,
}

/// Either face's record, as returned by [`IneValidator::process`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FaceRecord {
    Front(FrontRecord),
    Back(BackRecord),
}

impl IneValidator {
    pub fn new() -> Self {
        Self::with_config(ExtractionConfig::default())
    }

    pub fn with_config(config: ExtractionConfig) -> Self {
        IneValidator { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn process(&self, regions: &[OcrTextRegion], face: Face) -> FaceRecord {
        match face {
            Face::Front => FaceRecord::Front(self.process_front(regions)),
            Face::Back => FaceRecord::Back(self.process_back(regions)),
        }
    }

    /// Never fails: problems end up in `validacion.reasons`.
    pub fn process_front(&self, regions: &[OcrTextRegion]) -> FrontRecord {
        // Step 1: Normalize
        let tokens = TextNormalizer::normalize(regions);
        if tokens.iter().all(|t| t.is_empty()) {
            log::warn!("front face: {}", IneError::NoTextDetected);
            return FrontRecord {
                es_ine: false,
                tipo_credencial: None,
                nombre: None,
                fields: ExtractedFields::new(),
                entidad_nacimiento: None,
                entidad_registro: None,
                vigente: None,
                validacion: DocumentClassifier::no_text(Face::Front),
            };
        }

        // Step 2: Locate every field
        let located = FieldLocator::locate_front(&tokens, &self.config);
        let mut fields = located
            .into_iter()
            .fold(ExtractedFields::new(), |fields, (field, candidate)| {
                fields.with(field, FieldValue::found(candidate.value.into_string(), true))
            });

        // Step 3: Data encoded in the CURP and clave fills what the card did not show
        let reference_year = self.config.reference_year();
        let curp = fields
            .value(FrontField::Curp)
            .and_then(|curp| CurpData::parse(curp, reference_year));
        let clave = fields
            .value(FrontField::ClaveElector)
            .and_then(ClaveElectorData::parse);

        if let Some(curp) = &curp {
            if !fields.get(FrontField::Sexo).is_present() {
                fields = fields.with(FrontField::Sexo, FieldValue::found(curp.sex.to_string(), true));
            }
            if !fields.get(FrontField::FechaNacimiento).is_present() {
                if let Some(fecha) = curp.fecha_nacimiento() {
                    fields = fields.with(FrontField::FechaNacimiento, FieldValue::found(fecha, true));
                }
            }
        }

        // Step 4: Validate and classify
        let fields = FormatValidator::validate(fields, curp.as_ref(), clave.as_ref());
        let validacion = DocumentClassifier::classify_front(&fields);
        let vigente = ExpiryValidator::vigencia_current(
            fields.value(FrontField::Vigencia),
            self.config.reference_date(),
        );

        FrontRecord {
            es_ine: validacion.es_ine,
            tipo_credencial: DocumentClassifier::credential_type(&tokens),
            nombre: extractors::holder_name(&tokens, &self.config),
            fields,
            entidad_nacimiento: curp.and_then(|c| c.state).map(str::to_string),
            entidad_registro: clave.and_then(|c| c.state).map(str::to_string),
            vigente,
            validacion,
        }
    }

    /// Never fails: problems end up in `validacion.reasons`.
    pub fn process_back(&self, regions: &[OcrTextRegion]) -> BackRecord {
        let tokens = TextNormalizer::normalize(regions);
        if tokens.iter().all(|t| t.is_empty()) {
            log::warn!("back face: {}", IneError::NoTextDetected);
            return BackRecord {
                es_ine: false,
                linea1: None,
                linea2: None,
                linea3: None,
                apellido_paterno: None,
                apellido_materno: None,
                nombre_reverso: None,
                mrz: None,
                vigente: None,
                validacion: DocumentClassifier::no_text(Face::Back),
            };
        }

        let lines = MrzLocator::locate(&tokens, &self.config);
        let decoded = match (&lines.line1, &lines.line2) {
            (Some(line1), Some(line2)) => {
                MrzDecoder::decode(line1, line2).map(|record| match &lines.name_line {
                    Some(names) => MrzDecoder::with_names(record, names),
                    None => record,
                })
            }
            (None, _) => Err(IneError::MissingField("MRZ line 1".to_string())),
            (Some(_), None) => Err(IneError::MissingField("MRZ line 2".to_string())),
        };
        if let Err(err) = &decoded {
            log::warn!("back face: {}", err);
        }

        let checks: BTreeMap<CheckDigit, bool> = decoded
            .as_ref()
            .map(ChecksumValidator::validate_mrz)
            .unwrap_or_default();
        let validacion = DocumentClassifier::classify_back(&decoded, &checks);
        let record = decoded.ok();
        let vigente = record
            .as_ref()
            .and_then(|r| ExpiryValidator::mrz_expiry_current(r, self.config.reference_date()));

        BackRecord {
            es_ine: validacion.es_ine,
            linea1: lines.line1,
            linea2: lines.line2,
            linea3: lines.name_line,
            apellido_paterno: record.as_ref().and_then(|r| r.apellido_paterno.clone()),
            apellido_materno: record.as_ref().and_then(|r| r.apellido_materno.clone()),
            nombre_reverso: record.as_ref().and_then(|r| r.nombre_reverso.clone()),
            mrz: record,
            vigente,
            validacion,
        }
    }
}

impl Default for IneValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> IneValidator {
        IneValidator::with_config(ExtractionConfig {
            reference_year: Some(2024),
            ..ExtractionConfig::default()
        })
    }

    fn region(text: &str, y: f32) -> OcrTextRegion {
        OcrTextRegion::new(text, BoundingBox::new(10.0, y, 300.0, 20.0), 0.9)
    }

    #[test]
    fn test_front_fills_from_curp() {
        let record = validator().process_front(&[
            region("INSTITUTO NACIONAL ELECTORAL", 0.0),
            region("CURP GOMA800101HDFRSN09", 200.0),
            region("VIGENCIA 2021 - 2031", 260.0),
        ]);

        assert!(record.es_ine);
        assert_eq!(record.fields.value(FrontField::Sexo), Some("H"));
        assert_eq!(record.fields.value(FrontField::FechaNacimiento), Some("01/01/1980"));
        assert_eq!(record.entidad_nacimiento.as_deref(), Some("CIUDAD DE MÉXICO"));
        assert_eq!(record.tipo_credencial, Some(CredentialType::D));
        assert_eq!(record.vigente, Some(true));
    }

    #[test]
    fn test_back_without_second_line() {
        let record = validator().process_back(&[region("IDMEX1786543215<<0543210987654", 100.0)]);
        assert!(!record.es_ine);
        assert!(record.linea1.is_some());
        assert!(record.linea2.is_none());
        assert!(record.validacion.reasons[0].contains("MRZ line 2"));
    }

    #[test]
    fn test_process_dispatches_on_face() {
        let regions = vec![region("CURP GOMA800101HDFRSN09", 0.0)];
        assert!(matches!(validator().process(&regions, Face::Front), FaceRecord::Front(_)));
        assert!(matches!(validator().process(&regions, Face::Back), FaceRecord::Back(_)));
    }
}
