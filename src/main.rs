// Command line front end over JSON-encoded OCR results

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use ineocr::{
    models::{BackRecord, FrontField, FrontRecord, OcrTextRegion, ValidationReport},
    utils::IneError,
    ExtractionConfig, IneValidator,
};

#[derive(Parser, Debug)]
#[command(name = "ineocr")]
#[command(version, about = "Field extraction and validation for INE/IFE voter credentials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with extraction settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print a readable report instead of JSON
    #[arg(short, long, global = true)]
    report: bool,

    /// Log candidate selection and validation steps
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process the front face (anverso)
    Front {
        /// JSON array of OCR regions
        input: PathBuf,
    },
    /// Process the back face (reverso)
    Back {
        /// JSON array of OCR regions
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), IneError> {
    let config = match &cli.config {
        Some(path) => ExtractionConfig::from_file(path)?,
        None => ExtractionConfig::default(),
    };
    let validator = IneValidator::with_config(config);

    match &cli.command {
        Commands::Front { input } => {
            let record = validator.process_front(&read_regions(input)?);
            if cli.report {
                print_front_report(&record);
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        Commands::Back { input } => {
            let record = validator.process_back(&read_regions(input)?);
            if cli.report {
                print_back_report(&record);
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
    }
    Ok(())
}

fn read_regions(path: &Path) -> Result<Vec<OcrTextRegion>, IneError> {
    let json = std::fs::read_to_string(path)?;
    let regions: Vec<OcrTextRegion> = serde_json::from_str(&json)?;
    log::info!("read {} regions from {}", regions.len(), path.display());
    Ok(regions)
}

fn show(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn print_front_report(record: &FrontRecord) {
    println!("\n===============================================");
    println!("      INE CREDENTIAL REPORT (FRONT)");
    println!("===============================================\n");

    println!("CREDENTIAL INFORMATION:");
    println!("  Type: {:?}", record.tipo_credencial);
    println!("  Name: {}", show(record.nombre.as_deref()));
    for field in FrontField::ALL {
        let value = record.fields.get(field);
        println!(
            "  {}: {}{}",
            field.name(),
            show(value.as_deref()),
            if value.is_present() && !value.valid { "  (INVALID)" } else { "" }
        );
    }
    println!("  Birth state: {}", show(record.entidad_nacimiento.as_deref()));
    println!("  Registration state: {}", show(record.entidad_registro.as_deref()));
    println!("  Current: {:?}", record.vigente);

    print_verdict(&record.validacion);
}

fn print_back_report(record: &BackRecord) {
    println!("\n===============================================");
    println!("      INE CREDENTIAL REPORT (BACK)");
    println!("===============================================\n");

    println!("MACHINE READABLE ZONE:");
    println!("  Line 1: {}", show(record.linea1.as_deref()));
    println!("  Line 2: {}", show(record.linea2.as_deref()));
    println!("  Line 3: {}", show(record.linea3.as_deref()));
    if let Some(mrz) = &record.mrz {
        println!("  Document Number: {}", mrz.id_number);
        println!("  Date of Birth: {}", mrz.birth_date);
        println!("  Sex: {}", mrz.sex);
        println!("  Date of Expiry: {}", mrz.expiry_date);
        println!("  Nationality: {}", mrz.nationality);
    }
    println!("  Paternal surname: {}", show(record.apellido_paterno.as_deref()));
    println!("  Maternal surname: {}", show(record.apellido_materno.as_deref()));
    println!("  Given names: {}", show(record.nombre_reverso.as_deref()));
    println!("  Current: {:?}", record.vigente);

    println!("\nCHECK DIGITS:");
    for (name, valid) in &record.validacion.field_validity {
        println!("  {}: {}", name, if *valid { "PASSED" } else { "FAILED" });
    }

    print_verdict(&record.validacion);
}

fn print_verdict(report: &ValidationReport) {
    if !report.reasons.is_empty() {
        println!("\nISSUES FOUND:");
        for reason in &report.reasons {
            println!("  - {}", reason);
        }
    }

    println!(
        "\nCredential validation result: {}",
        if report.es_ine { "VALID" } else { "INVALID" }
    );
}
