use ineocr::models::{BoundingBox, CredentialType, FrontField, OcrTextRegion};
use ineocr::{ExtractionConfig, IneValidator};

const LINE1: &str = "IDMEX1786543215<<0543210987654";
const LINE2: &str = "8001014H3112319MEX<<<<<<<<<<<6";
const NAMES: &str = "GOMEZ<MARTINEZ<<JUAN<<<<<<<<<<";

fn validator() -> IneValidator {
    IneValidator::with_config(ExtractionConfig {
        reference_year: Some(2024),
        ..ExtractionConfig::default()
    })
}

fn region(text: &str, x: f32, y: f32, confidence: f32) -> OcrTextRegion {
    OcrTextRegion::new(text, BoundingBox::new(x, y, 300.0, 20.0), confidence)
}

fn full_front() -> Vec<OcrTextRegion> {
    vec![
        region("INSTITUTO NACIONAL ELECTORAL", 200.0, 0.0, 0.95),
        region("MÉXICO", 10.0, 0.0, 0.93),
        region("CREDENCIAL PARA VOTAR", 200.0, 25.0, 0.95),
        region("NOMBRE", 10.0, 60.0, 0.9),
        region("GOMEZ", 10.0, 82.0, 0.9),
        region("MARTINEZ", 10.0, 104.0, 0.9),
        region("JUAN", 10.0, 126.0, 0.9),
        region("DOMICILIO", 10.0, 160.0, 0.9),
        region("C JUAREZ 12", 10.0, 182.0, 0.88),
        region("COL CENTRO 06000", 10.0, 204.0, 0.88),
        region("CUAUHTEMOC, CDMX", 10.0, 226.0, 0.88),
        region("CLAVE DE ELECTOR GMRSJN80010109H100", 10.0, 270.0, 0.92),
        region("CURP GOMA8OO1O1HDFRSN09", 10.0, 295.0, 0.9),
        region("AÑO DE REGISTRO 2010 03", 400.0, 295.0, 0.9),
        region("FECHA DE NACIMIENTO", 10.0, 320.0, 0.9),
        region("01/01/1980", 10.0, 342.0, 0.9),
        region("SECCIÓN 1234", 400.0, 320.0, 0.9),
        region("VIGENCIA 2021 - 2031", 400.0, 345.0, 0.9),
        region("SEXO H", 700.0, 320.0, 0.9),
    ]
}

#[test]
fn test_full_front_face() {
    let record = validator().process_front(&full_front());

    assert!(record.es_ine, "{:?}", record.validacion.reasons);
    assert_eq!(record.tipo_credencial, Some(CredentialType::GM));
    assert_eq!(record.nombre.as_deref(), Some("GOMEZ MARTINEZ JUAN"));

    let fields = &record.fields;
    assert_eq!(fields.value(FrontField::Curp), Some("GOMA800101HDFRSN09"));
    assert_eq!(fields.value(FrontField::ClaveElector), Some("GMRSJN80010109H100"));
    assert_eq!(fields.value(FrontField::FechaNacimiento), Some("01/01/1980"));
    assert_eq!(fields.value(FrontField::AnioRegistro), Some("2010 03"));
    assert_eq!(fields.value(FrontField::Seccion), Some("1234"));
    assert_eq!(fields.value(FrontField::Vigencia), Some("2021 - 2031"));
    assert_eq!(fields.value(FrontField::Sexo), Some("H"));
    assert_eq!(fields.value(FrontField::Pais), Some("MEX"));
    assert_eq!(fields.value(FrontField::Calle), Some("C JUAREZ 12"));
    assert_eq!(fields.value(FrontField::Numero), Some("12"));
    assert_eq!(fields.value(FrontField::Colonia), Some("COL CENTRO 06000"));
    assert_eq!(fields.value(FrontField::CodigoPostal), Some("06000"));
    assert_eq!(fields.value(FrontField::Estado), Some("CUAUHTEMOC, CDMX"));

    assert_eq!(record.entidad_nacimiento.as_deref(), Some("CIUDAD DE MÉXICO"));
    assert_eq!(record.entidad_registro.as_deref(), Some("CIUDAD DE MÉXICO"));
    assert_eq!(record.vigente, Some(true));
    assert!(record.validacion.field_validity.values().all(|valid| *valid));
}

#[test]
fn test_empty_input_yields_all_keys_null() {
    for regions in [vec![], vec![region("   ", 0.0, 0.0, 0.5)]] {
        let record = validator().process_front(&regions);
        assert!(!record.es_ine);
        assert_eq!(record.validacion.reasons, vec!["No text detected in OCR result"]);

        let json = serde_json::to_value(&record).unwrap();
        for field in FrontField::ALL {
            assert!(json[field.name()].is_null(), "{} should be null", field.name());
        }
        assert!(record.validacion.field_validity.values().all(|valid| !*valid));
    }

    let back = validator().process_back(&[]);
    assert!(!back.es_ine);
    assert!(back.linea1.is_none() && back.mrz.is_none());
}

#[test]
fn test_garbage_address_keeps_valid_curp() {
    let record = validator().process_front(&[
        region("CURP ABCD800101HDFLRN09", 10.0, 10.0, 0.9),
        region("VIGENCIA 2020 - 2030", 10.0, 40.0, 0.9),
        region("DOMICILIO", 10.0, 100.0, 0.9),
        region("#@!~ %% ^^", 10.0, 122.0, 0.4),
        region("*** ///", 10.0, 144.0, 0.3),
    ]);

    assert!(record.es_ine);
    assert!(record.fields.get(FrontField::Curp).valid);
    for field in [
        FrontField::Calle,
        FrontField::Numero,
        FrontField::Colonia,
        FrontField::Estado,
        FrontField::CodigoPostal,
    ] {
        assert!(record.fields.value(field).is_none(), "{:?}", field);
        assert!(!record.fields.get(field).valid);
    }
}

#[test]
fn test_short_curp_is_not_a_curp() {
    let record = validator().process_front(&[
        region("CURP ABCD800101HDFLRN0", 10.0, 10.0, 0.9),
        region("VIGENCIA 2020 - 2030", 10.0, 40.0, 0.9),
    ]);
    assert!(!record.es_ine);
    assert!(record.fields.value(FrontField::Curp).is_none());
}

#[test]
fn test_back_face_with_names() {
    let record = validator().process_back(&[
        region("INSTITUTO NACIONAL ELECTORAL", 10.0, 10.0, 0.9),
        region(LINE1, 10.0, 300.0, 0.9),
        region(LINE2, 10.0, 325.0, 0.9),
        region(NAMES, 10.0, 350.0, 0.9),
    ]);

    assert!(record.es_ine, "{:?}", record.validacion.reasons);
    assert_eq!(record.apellido_paterno.as_deref(), Some("GOMEZ"));
    assert_eq!(record.apellido_materno.as_deref(), Some("MARTINEZ"));
    assert_eq!(record.nombre_reverso.as_deref(), Some("JUAN"));
    assert_eq!(record.vigente, Some(true));

    let mrz = record.mrz.unwrap();
    assert_eq!(mrz.id_number, "178654321");
    assert_eq!(mrz.birth_date, "800101");
}

#[test]
fn test_back_face_with_bad_composite() {
    let bad_line2 = "8001014H3112319MEX<<<<<<<<<<<7";
    let record = validator().process_back(&[
        region(LINE1, 10.0, 300.0, 0.9),
        region(bad_line2, 10.0, 325.0, 0.9),
    ]);

    assert!(!record.es_ine);
    assert_eq!(record.linea1.as_deref(), Some(LINE1));
    assert_eq!(record.linea2.as_deref(), Some(bad_line2));
    assert!(record
        .validacion
        .reasons
        .iter()
        .any(|reason| reason.contains("composite")));
    assert_eq!(record.validacion.field_validity["check_digit_4"], false);
    // no name line: names stay null
    assert!(record.apellido_paterno.is_none());
}

#[test]
fn test_back_face_with_foreign_prefix() {
    let foreign = "IDUSA1786543215<<0543210987654";
    let record = validator().process_back(&[
        region(foreign, 10.0, 300.0, 0.9),
        region(LINE2, 10.0, 325.0, 0.9),
        region(NAMES, 10.0, 350.0, 0.9),
    ]);

    assert!(!record.es_ine);
    assert_eq!(record.linea1.as_deref(), Some(foreign));
    assert_eq!(record.linea2.as_deref(), Some(LINE2));
    assert!(record.mrz.is_none());
    assert!(record.apellido_paterno.is_none());
    assert!(record.apellido_materno.is_none());
    assert!(record.nombre_reverso.is_none());
    assert!(record.validacion.reasons[0].starts_with("Malformed MRZ"));
}

#[test]
fn test_back_face_surname_starting_with_id() {
    let record = validator().process_back(&[
        region(LINE1, 10.0, 300.0, 0.9),
        region(LINE2, 10.0, 325.0, 0.9),
        region("IDROGO<PEREZ<<JUAN<<<<<<<<<<<<", 10.0, 350.0, 0.9),
    ]);

    assert!(record.es_ine, "{:?}", record.validacion.reasons);
    assert_eq!(record.apellido_paterno.as_deref(), Some("IDROGO"));
    assert_eq!(record.apellido_materno.as_deref(), Some("PEREZ"));
    assert_eq!(record.nombre_reverso.as_deref(), Some("JUAN"));
}

#[test]
fn test_labels_sharing_a_row_keep_their_own_values() {
    let record = validator().process_front(&[
        region("CURP GOMA800101HDFRSN09", 10.0, 10.0, 0.9),
        region("SECCIÓN", 10.0, 300.0, 0.9),
        region("1234", 110.0, 300.0, 0.85),
        region("VIGENCIA", 300.0, 300.0, 0.9),
        region("2021 - 2031", 420.0, 300.0, 0.95),
    ]);
    assert_eq!(record.fields.value(FrontField::Seccion), Some("1234"));
    assert_eq!(record.fields.value(FrontField::Vigencia), Some("2021 - 2031"));

    let record = validator().process_front(&[
        region("AÑO DE REGISTRO", 10.0, 300.0, 0.9),
        region("2010 03", 180.0, 300.0, 0.8),
        region("VIGENCIA 2021 - 2031", 400.0, 300.0, 0.95),
    ]);
    assert_eq!(record.fields.value(FrontField::AnioRegistro), Some("2010 03"));
    assert_eq!(record.fields.value(FrontField::Vigencia), Some("2021 - 2031"));
}

#[test]
fn test_clave_tie_break_is_order_independent() {
    let low = region("GMRSJN80010109H100", 10.0, 10.0, 0.7);
    let high = region("PRLPJN75050514M200", 10.0, 200.0, 0.95);

    let forward = validator().process_front(&[low.clone(), high.clone()]);
    let backward = validator().process_front(&[high, low]);

    assert_eq!(forward.fields.value(FrontField::ClaveElector), Some("PRLPJN75050514M200"));
    assert_eq!(backward.fields.value(FrontField::ClaveElector), Some("PRLPJN75050514M200"));
}

#[test]
fn test_label_anchor_outranks_confidence() {
    let record = validator().process_front(&[
        region("CLAVE DE ELECTOR", 10.0, 10.0, 0.9),
        region("GMRSJN80010109H100", 10.0, 32.0, 0.6),
        region("PRLPJN75050514M200", 900.0, 600.0, 0.99),
    ]);
    assert_eq!(record.fields.value(FrontField::ClaveElector), Some("GMRSJN80010109H100"));
}

#[test]
fn test_fecha_disagreeing_with_curp_is_flagged() {
    let record = validator().process_front(&[
        region("CURP GOMA800101HDFRSN09", 10.0, 10.0, 0.9),
        region("FECHA DE NACIMIENTO 02/01/1980", 10.0, 40.0, 0.9),
        region("VIGENCIA 2021 - 2031", 10.0, 70.0, 0.9),
    ]);
    assert!(record.es_ine);
    assert_eq!(record.fields.value(FrontField::FechaNacimiento), Some("02/01/1980"));
    assert!(!record.fields.get(FrontField::FechaNacimiento).valid);
}

#[test]
fn test_output_shape() {
    let record = validator().process_front(&full_front());
    let json = serde_json::to_value(&record).unwrap();
    let object = json.as_object().unwrap();

    for key in [
        "es_ine",
        "tipo_credencial",
        "nombre",
        "entidad_nacimiento",
        "entidad_registro",
        "vigente",
        "validacion",
    ] {
        assert!(object.contains_key(key), "missing {}", key);
    }
    assert_eq!(json["tipo_credencial"], "GM");
    assert_eq!(json["validacion"]["es_ine"], true);
}
