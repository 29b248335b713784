use ineocr::models::CheckDigit;
use ineocr::processing::MrzDecoder;
use ineocr::utils::IneError;
use ineocr::validation::ChecksumValidator;

fn main() -> Result<(), IneError> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        println!("Usage: mrz_demo <line1> <line2> [name line]");
        return Ok(());
    }

    println!("INE MRZ Demo");
    println!("------------");

    let record = MrzDecoder::decode(&args[0], &args[1])?;
    let record = match args.get(2) {
        Some(names) => MrzDecoder::with_names(record, names),
        None => record,
    };

    println!("\nDECODED FIELDS:");
    println!("  Document Type: {}", record.document_type);
    println!("  Issuing Country: {}", record.issuing_country);
    println!("  Document Number: {}", record.id_number);
    println!("  Optional Data: {}", record.optional_data);
    println!("  Date of Birth: {}", record.birth_date);
    println!("  Sex: {}", record.sex);
    println!("  Date of Expiry: {}", record.expiry_date);
    println!("  Nationality: {}", record.nationality);
    println!("  Optional Data 2: {}", record.optional_data_2);
    println!("  Paternal surname: {:?}", record.apellido_paterno);
    println!("  Maternal surname: {:?}", record.apellido_materno);
    println!("  Given names: {:?}", record.nombre_reverso);

    println!("\nCHECK DIGITS:");
    let checks = ChecksumValidator::validate_mrz(&record);
    for check in CheckDigit::ALL {
        let data = ChecksumValidator::checked_data(&record, check);
        let computed = ChecksumValidator::check_digit(&data)
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {} ({}): declared {}, computed {} -> {}",
            check.name(),
            check.describe(),
            record.declared_digit(check),
            computed,
            if checks[&check] { "PASSED" } else { "FAILED" }
        );
    }

    Ok(())
}
