//! Brokerload CLI - Repair and unify customs broker exports
//!
//! # Main Commands
//!
//! ```bash
//! brokerload repair export.csv --broker dhl -o fixed.csv    # Realign and normalize
//! brokerload unify 2019.csv 2021.csv 2024.csv -o all.csv    # Merge vintages
//! brokerload serve                                          # HTTP server (port 3000)
//! brokerload schema list                                    # Broker layouts
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! brokerload parse export.csv              # Parse CSV to JSON table
//! brokerload audit export.csv -b dachser   # Check the repair is idempotent
//! brokerload classify 85183000             # Which classifiers accept a value
//! ```

use brokerload::api::logs::LOG_BROADCASTER;
use brokerload::{
    audit_idempotence, parse_file_auto, parse_schema_document, parse_str, repair_file, unify_files,
    write_csv, write_csv_file, Broker, Cell, Classifier, PipelineOptions, Row, SchemaOrigin,
    SchemaRegistry, Severity, ValidationReport,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "brokerload")]
#[command(about = "Repair column shifts and unify headers of customs broker exports", long_about = None)]
struct Cli {
    /// Do not echo pipeline logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output it as a JSON table
    Parse {
        /// Input CSV or JSON table
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Repair shifted rows and normalize values
    Repair {
        /// Input CSV or JSON table
        input: PathBuf,

        /// Broker that produced the export (dhl, schenker, kuehne_nagel, dachser)
        #[arg(short, long)]
        broker: Broker,

        /// Use this layout document instead of the registry/built-in one
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Ignore layout overrides stored in the registry
        #[arg(long)]
        no_registry: bool,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the full fix/warning report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Run the repair twice and check the second pass changes nothing
    Audit {
        /// Input CSV or JSON table
        input: PathBuf,

        #[arg(short, long)]
        broker: Broker,

        /// Layout document to audit instead of the registry/built-in one
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Merge files of different vintages onto one canonical header
    Unify {
        /// Input files (CSV or JSON tables)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Repair every file against this broker's layout first
        #[arg(short, long)]
        broker: Option<Broker>,

        /// Synonym table JSON (legacy name -> canonical name)
        #[arg(long)]
        synonyms: Option<PathBuf>,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write header, mappings and reports as JSON
        #[arg(short, long)]
        mapping: Option<PathBuf>,
    },

    /// Show which classifiers accept a value
    Classify {
        value: String,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage broker layouts
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// List brokers and where their layout comes from
    List,

    /// Print the effective layout of a broker as JSON
    Show {
        broker: Broker,

        /// Print the built-in layout even if an override is stored
        #[arg(long)]
        builtin: bool,
    },

    /// Validate a layout document without importing it
    Check {
        file: PathBuf,
    },

    /// Import a layout document as override for its broker
    Import {
        file: PathBuf,
    },

    /// Delete the stored override of a broker
    Delete {
        broker: Broker,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.quiet {
        LOG_BROADCASTER.set_echo(false);
    }

    let result = match cli.command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Repair {
            input,
            broker,
            schema,
            no_registry,
            output,
            report,
        } => cmd_repair(
            &input,
            broker,
            pipeline_options(schema.as_deref(), no_registry, None),
            output.as_deref(),
            report.as_deref(),
        ),

        Commands::Audit {
            input,
            broker,
            schema,
        } => cmd_audit(&input, broker, schema.as_deref()),

        Commands::Unify {
            inputs,
            broker,
            synonyms,
            output,
            mapping,
        } => cmd_unify(
            &inputs,
            broker,
            pipeline_options(None, false, synonyms.as_deref()),
            output.as_deref(),
            mapping.as_deref(),
        ),

        Commands::Classify { value } => cmd_classify(&value),

        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Schema { action } => cmd_schema(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn pipeline_options(schema: Option<&Path>, no_registry: bool, synonyms: Option<&Path>) -> PipelineOptions {
    PipelineOptions {
        schema_path: schema.map(|p| p.to_string_lossy().to_string()),
        use_registry: !no_registry,
        synonyms_path: synonyms.map(|p| p.to_string_lossy().to_string()),
    }
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let mut result = parse_file_auto(input)?;
    if let Some(d) = delimiter.filter(|&d| d != result.delimiter) {
        let bytes = fs::read(input)?;
        let content = brokerload::decode_content(&bytes, &result.encoding);
        result.table = parse_str(&content, d)?;
        result.delimiter = d;
    }

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.table.headers.join(", "));
    eprintln!("✅ Parsed {} rows", result.table.rows.len());

    let json = serde_json::to_string_pretty(&result.table)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_repair(
    input: &Path,
    broker: Broker,
    options: PipelineOptions,
    output: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {} ({})", input.display(), broker.display_name());

    let result = repair_file(input, broker, &options)?;

    print_report(&result.report);

    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(&result.report)?)?;
        eprintln!("   💾 Report saved to: {}", path.display());
    }

    write_table(&result.table.headers, &result.table.rows, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_audit(input: &Path, broker: Broker, schema: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔁 Auditing: {} ({})", input.display(), broker.display_name());

    let schema = match schema {
        Some(path) => parse_schema_document(&fs::read_to_string(path)?)?,
        None => SchemaRegistry::new().resolve(broker).0,
    };
    let table = parse_file_auto(input)?.table;
    let audit = audit_idempotence(&table, &schema)?;

    eprintln!("   First pass fixes:  {}", audit.first_pass_fixes);
    eprintln!("   Second pass fixes: {}", audit.second_pass_fixes);
    eprintln!(
        "   Warnings stable:   {}",
        if audit.warnings_stable { "yes" } else { "no" }
    );

    if audit.is_idempotent() {
        eprintln!("✅ Repair is idempotent");
        Ok(())
    } else {
        for row in audit.rows_changed.iter().take(10) {
            eprintln!("   ❌ Row {} changed on second pass", row);
        }
        Err("repair is not idempotent for this file".into())
    }
}

fn cmd_unify(
    inputs: &[PathBuf],
    broker: Option<Broker>,
    options: PipelineOptions,
    output: Option<&Path>,
    mapping_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🧩 Unifying {} files", inputs.len());

    let dataset = unify_files(inputs, broker, &options)?;

    eprintln!("\n📋 Canonical header ({} columns):", dataset.headers.len());
    eprintln!("   {}", dataset.headers.join(", "));
    for mapping in &dataset.unification.mappings {
        let unmapped: Vec<&str> = mapping.unmapped().map(|(_, name)| name).collect();
        if unmapped.is_empty() {
            eprintln!("   ✓ {}", mapping.file);
        } else {
            eprintln!("   ⚠️  {} (unmapped: {})", mapping.file, unmapped.join(", "));
        }
    }
    for (file, report) in &dataset.repairs {
        eprintln!("   🔧 {}: {}", file, report.summary());
    }

    if let Some(path) = mapping_path {
        let summary = serde_json::json!({
            "headers": &dataset.headers,
            "mappings": &dataset.unification.mappings,
            "warnings": dataset.unification.report.issues(),
            "repairs": &dataset.repairs,
        });
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        eprintln!("   💾 Mapping saved to: {}", path.display());
    }

    write_table(&dataset.headers, &dataset.rows, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_classify(value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cell = Cell::text(value);
    let matching: Vec<&str> = Classifier::all()
        .iter()
        .filter(|c| c.matches(&cell))
        .map(|c| c.name())
        .collect();

    if matching.is_empty() {
        println!("'{}' matches no classifier", value);
    } else {
        println!("'{}' matches: {}", value, matching.join(", "));
    }
    if let Some(n) = brokerload::normalize::parse_number(&cell) {
        println!("   as number: {}", n);
    }
    if let Some(d) = brokerload::normalize::parse_date(&cell) {
        println!("   as date:   {}", brokerload::normalize::canonical_date(d));
    }
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    brokerload::server::start_server(port).await
}

fn cmd_schema(action: SchemaAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = SchemaRegistry::new();

    match action {
        SchemaAction::List => {
            eprintln!("📋 Broker layouts (registry: {}):\n", registry.dir().display());
            for &broker in Broker::all() {
                let (schema, origin) = registry.resolve(broker);
                let origin = match origin {
                    SchemaOrigin::Builtin => "built-in".to_string(),
                    SchemaOrigin::Registry => match registry.get(broker) {
                        Some(stored) => format!("override, imported {}", stored.imported_at),
                        None => "override".to_string(),
                    },
                };
                println!("  📄 {} ({})", broker.display_name(), broker.id());
                println!("     Version: {} [{}]", schema.version, origin);
                println!("     Width: {} columns", schema.width);
                let zones: Vec<&str> = schema.zones.iter().map(|z| z.name.as_str()).collect();
                println!("     Zones: {}", zones.join(", "));
                println!();
            }
        }

        SchemaAction::Show { broker, builtin } => {
            let schema = if builtin {
                broker.builtin_schema()
            } else {
                registry.resolve(broker).0
            };
            println!("{}", schema.to_json()?);
        }

        SchemaAction::Check { file } => {
            eprintln!("✔️  Checking: {}", file.display());
            let schema = parse_schema_document(&fs::read_to_string(&file)?)?;
            eprintln!(
                "✅ Valid {} layout: {} zones, {} anchors",
                schema.broker.display_name(),
                schema.zones.len(),
                schema.anchors().count()
            );
        }

        SchemaAction::Import { file } => {
            eprintln!("📥 Importing layout from: {}", file.display());
            let broker = registry.import(&file)?;
            eprintln!("✅ Layout saved as override for {}", broker.display_name());
        }

        SchemaAction::Delete { broker } => {
            registry.delete(broker)?;
            eprintln!("🗑️  Override deleted: {}", broker.display_name());
        }
    }

    Ok(())
}

fn print_report(report: &ValidationReport) {
    eprintln!("\n📊 {}", report.summary());
    if report.is_clean() {
        eprintln!("   ✅ No rows need review");
        return;
    }

    let rows = report.rows_with_warnings();
    eprintln!("   ⚠️  {} rows need review", rows.len());
    for row in rows.iter().take(5) {
        for issue in report.issues_for_row(*row).filter(|i| i.severity == Severity::Warning) {
            eprintln!("     - {}", issue);
        }
    }
}

fn write_table(headers: &[String], rows: &[Row], output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            write_csv_file(path, headers, rows)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_csv(std::io::stdout().lock(), headers, rows)?,
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
