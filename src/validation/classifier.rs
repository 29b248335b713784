use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::rules::CLAVE_ELECTOR_LABEL;
use crate::models::{
    CheckDigit, CredentialType, ExtractedFields, Face, FrontField, MrzRecord, NormalizedToken,
    ValidationReport,
};
use crate::utils::IneError;
use crate::validation::ChecksumValidator;

lazy_static! {
    static ref CLAVE_LABEL: Regex = Regex::new(CLAVE_ELECTOR_LABEL).unwrap();
}

/// Decides whether a face is a genuine INE/IFE credential.
pub struct DocumentClassifier;

impl DocumentClassifier {
    /// A front is genuine with a grammar-valid CURP plus a clave de elector or a vigencia.
    pub fn classify_front(fields: &ExtractedFields) -> ValidationReport {
        let mut reasons = Vec::new();

        let curp_ok = match fields.value(FrontField::Curp) {
            None => {
                reasons.push(IneError::MissingField("curp".to_string()).to_string());
                false
            }
            Some(curp) if !ChecksumValidator::validate_curp(curp) => {
                reasons.push(
                    IneError::ChecksumMismatch(format!("curp {} does not follow the CURP format", curp))
                        .to_string(),
                );
                false
            }
            Some(_) => true,
        };

        let marker_ok = fields.get(FrontField::ClaveElector).is_present()
            || fields.get(FrontField::Vigencia).is_present();
        if !marker_ok {
            reasons.push(IneError::MissingField("clave_elector or vigencia".to_string()).to_string());
        }

        let es_ine = curp_ok && marker_ok;
        log::info!("front classified es_ine={} ({} reasons)", es_ine, reasons.len());
        ValidationReport {
            es_ine,
            field_validity: fields.validity(),
            reasons,
        }
    }

    /// A back is genuine when the MRZ decoded and all four check digits hold.
    pub fn classify_back(
        decoded: &Result<MrzRecord, IneError>,
        checks: &BTreeMap<CheckDigit, bool>,
    ) -> ValidationReport {
        let mut reasons = Vec::new();
        if let Err(err) = decoded {
            reasons.push(err.to_string());
        }
        for check in CheckDigit::ALL {
            if checks.get(&check) == Some(&false) {
                reasons.push(
                    IneError::ChecksumMismatch(format!("{} check digit", check.describe())).to_string(),
                );
            }
        }

        let field_validity: BTreeMap<String, bool> = CheckDigit::ALL
            .iter()
            .map(|check| (check.name().to_string(), checks.get(check) == Some(&true)))
            .collect();
        let es_ine = decoded.is_ok() && field_validity.values().all(|valid| *valid);

        log::info!("back classified es_ine={} ({} reasons)", es_ine, reasons.len());
        ValidationReport {
            es_ine,
            field_validity,
            reasons,
        }
    }

    /// Report for a face whose OCR result held no text at all.
    pub fn no_text(face: Face) -> ValidationReport {
        let field_validity = match face {
            Face::Front => ExtractedFields::new().validity(),
            Face::Back => CheckDigit::ALL
                .iter()
                .map(|check| (check.name().to_string(), false))
                .collect(),
        };
        ValidationReport {
            es_ine: false,
            field_validity,
            reasons: vec![IneError::NoTextDetected.to_string()],
        }
    }

    /// Card generation from the printed headers; `None` without any text.
    pub fn credential_type(tokens: &[NormalizedToken<'_>]) -> Option<CredentialType> {
        let text = tokens
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return None;
        }

        let ine = text.contains("INSTITUTO NACIONAL ELECTORAL");
        let ife = text.contains("INSTITUTO FEDERAL ELECTORAL");
        let voter_card = text.contains("CREDENCIAL PARA VOTAR");

        let kind = if ife {
            CredentialType::C
        } else if ine && voter_card && CLAVE_LABEL.is_match(&text) {
            CredentialType::GM
        } else {
            CredentialType::D
        };
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, FieldValue, OcrTextRegion};
    use crate::processing::{MrzDecoder, TextNormalizer};

    fn front(entries: &[(FrontField, &str)]) -> ExtractedFields {
        entries.iter().fold(ExtractedFields::new(), |fields, (field, value)| {
            fields.with(*field, FieldValue::found(*value, true))
        })
    }

    #[test]
    fn test_front_needs_curp_and_marker() {
        let report = DocumentClassifier::classify_front(&front(&[
            (FrontField::Curp, "GOMA800101HDFRSN09"),
            (FrontField::Vigencia, "2021 - 2031"),
        ]));
        assert!(report.es_ine);
        assert!(report.reasons.is_empty());

        let report =
            DocumentClassifier::classify_front(&front(&[(FrontField::Curp, "GOMA800101HDFRSN09")]));
        assert!(!report.es_ine);
        assert_eq!(report.reasons.len(), 1);
    }

    #[test]
    fn test_front_rejects_malformed_curp() {
        let report = DocumentClassifier::classify_front(&front(&[
            (FrontField::Curp, "GOMA800101HDFRSN0"),
            (FrontField::ClaveElector, "GMRSJN80010109H100"),
        ]));
        assert!(!report.es_ine);
        assert!(report.reasons[0].contains("curp"));
    }

    #[test]
    fn test_back_reports_failed_composite() {
        let decoded = MrzDecoder::decode(
            "IDMEX1786543215<<0543210987654",
            "8001014H3112319MEX<<<<<<<<<<<7",
        );
        let checks = ChecksumValidator::validate_mrz(decoded.as_ref().unwrap());
        let report = DocumentClassifier::classify_back(&decoded, &checks);

        assert!(!report.es_ine);
        assert_eq!(report.reasons.len(), 1);
        assert!(report.reasons[0].contains("composite"));
        assert_eq!(report.field_validity["check_digit_1"], true);
        assert_eq!(report.field_validity["check_digit_4"], false);
    }

    #[test]
    fn test_back_reports_decode_failure() {
        let decoded = MrzDecoder::decode("IDMEX", "800101");
        let report = DocumentClassifier::classify_back(&decoded, &BTreeMap::new());
        assert!(!report.es_ine);
        assert!(report.reasons[0].starts_with("Malformed MRZ"));
    }

    #[test]
    fn test_credential_type_from_headers() {
        let kind = |texts: &[&str]| {
            let regions: Vec<OcrTextRegion> = texts
                .iter()
                .map(|t| OcrTextRegion::new(*t, BoundingBox::default(), 0.9))
                .collect();
            let tokens = TextNormalizer::normalize(&regions);
            DocumentClassifier::credential_type(&tokens)
        };

        assert_eq!(kind(&["INSTITUTO FEDERAL ELECTORAL"]), Some(CredentialType::C));
        assert_eq!(
            kind(&["INSTITUTO NACIONAL ELECTORAL", "CREDENCIAL PARA VOTAR", "CLAVE DE ELECTOR"]),
            Some(CredentialType::GM)
        );
        assert_eq!(kind(&["INSTITUTO NACIONAL ELECTORAL"]), Some(CredentialType::D));
        assert_eq!(kind(&["", "  "]), None);
    }
}
