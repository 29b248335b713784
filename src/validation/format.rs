use crate::models::{ExtractedFields, FrontField};
use crate::processing::extractors::{ClaveElectorData, CurpData};
use crate::validation::ChecksumValidator;

/// Per-field validity flags and the cross-checks between front fields.
pub struct FormatValidator;

impl FormatValidator {
    /// Returns `fields` with validity recomputed. Values are never changed.
    pub fn validate(
        fields: ExtractedFields,
        curp: Option<&CurpData>,
        clave: Option<&ClaveElectorData>,
    ) -> ExtractedFields {
        let curp_valid = fields
            .value(FrontField::Curp)
            .map(ChecksumValidator::validate_curp)
            .unwrap_or(false);
        let fields = Self::set_valid(fields, FrontField::Curp, curp_valid);

        let Some(curp) = curp else {
            return fields;
        };

        // Birth date printed on the card against the one in the CURP
        let fecha_agrees = match (fields.value(FrontField::FechaNacimiento), curp.fecha_nacimiento()) {
            (Some(printed), Some(encoded)) => printed == encoded,
            _ => true,
        };
        if !fecha_agrees {
            log::debug!("fecha_nacimiento disagrees with the CURP");
        }
        let fields = Self::restrict(fields, FrontField::FechaNacimiento, fecha_agrees);

        let sexo_agrees = fields
            .value(FrontField::Sexo)
            .map(|sexo| sexo.chars().eq(std::iter::once(curp.sex)))
            .unwrap_or(true);
        if !sexo_agrees {
            log::debug!("sexo disagrees with the CURP");
        }
        let fields = Self::restrict(fields, FrontField::Sexo, sexo_agrees);

        let clave_agrees = clave
            .map(|clave| clave.birth_digits == curp.birth_digits)
            .unwrap_or(true);
        if !clave_agrees {
            log::debug!("clave_elector birth digits disagree with the CURP");
        }
        Self::restrict(fields, FrontField::ClaveElector, clave_agrees)
    }

    fn set_valid(fields: ExtractedFields, field: FrontField, valid: bool) -> ExtractedFields {
        let value = fields.get(field).clone().with_valid(valid);
        fields.with(field, value)
    }

    /// Clears the flag when `agrees` is false; never raises it.
    fn restrict(fields: ExtractedFields, field: FrontField, agrees: bool) -> ExtractedFields {
        let valid = fields.get(field).valid && agrees;
        Self::set_valid(fields, field, valid)
    }
}
