//! Ledgerxml CLI - Convert legacy CSV exports to cashbook XML
//!
//! # Main Commands
//!
//! ```bash
//! ledgerxml process                       # Convert every CSV in the input directory
//! ledgerxml process --dry-run             # Convert and validate, write nothing
//! ledgerxml convert FIN_checks.csv -d FIN # Convert one file to stdout
//! ledgerxml validate-config               # Check config, departments and templates
//! ```
//!
//! # Reference Commands
//!
//! ```bash
//! ledgerxml schema templates/checks.csv   # Show a parsed template
//! ledgerxml actions                       # Show available transformation actions
//! ledgerxml example-ruleset               # Show an example department ruleset
//! ```

use clap::{Parser, Subcommand};
use ledgerxml::batch::{self, discover_inputs, render_summary, write_reports, RunContext};
use ledgerxml::config::department_by_code;
use ledgerxml::logs::{self, LogConfig, LogFormat};
use ledgerxml::models::{ParentLevel, Schema};
use ledgerxml::transform::pipeline::format_delimiter;
use ledgerxml::{
    actions_description, convert_file, example_ruleset, generate_xsd, read_template, AssembleOptions,
    DepartmentConfig, MainConfig, PipelineError, TemplateRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ledgerxml")]
#[command(about = "Convert legacy cashbook CSV exports to hierarchical XML", long_about = None)]
struct Cli {
    /// Main config file (default: ./ledgerxml.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every CSV file in the input directory
    Process {
        /// Convert and validate without writing output or archiving
        #[arg(long)]
        dry_run: bool,

        /// Process a single file instead of the input directory
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Use this department for every file instead of filename matching
        #[arg(short, long)]
        department: Option<String>,
    },

    /// Convert one CSV file
    Convert {
        /// Input CSV file
        input: PathBuf,

        /// Department code
        #[arg(short, long)]
        department: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load and check the config, every department and every template
    ValidateConfig,

    /// Show a parsed template
    Schema {
        /// Template file (CSV, TSV or JSON)
        template: PathBuf,

        /// Department whose static fields and XML settings apply to the XSD
        #[arg(short, long)]
        department: Option<String>,

        /// Write an XSD for the template
        #[arg(long)]
        xsd: Option<PathBuf>,
    },

    /// Show available transformation actions
    Actions,

    /// Show an example department ruleset
    ExampleRuleset,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match MainConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config, cli.verbose) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Process {
            dry_run,
            file,
            department,
        } => cmd_process(config, dry_run, file, department).await,

        Commands::Convert {
            input,
            department,
            output,
        } => cmd_convert(&config, &input, &department, output.as_deref()),

        Commands::ValidateConfig => cmd_validate_config(&config),

        Commands::Schema {
            template,
            department,
            xsd,
        } => cmd_schema(&config, &template, department.as_deref(), xsd.as_deref()),

        Commands::Actions => cmd_actions(),

        Commands::ExampleRuleset => cmd_example_ruleset(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &MainConfig, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        LogConfig::parse_level(&config.log_level)?
    };
    let format: LogFormat = config.log_format.parse()?;

    let log_config = LogConfig::default()
        .with_level(level)
        .with_format(format)
        .with_log_file(config.log_file.clone());
    logs::init_logging(&log_config)?;
    Ok(())
}

async fn cmd_process(
    config: MainConfig,
    dry_run: bool,
    file: Option<PathBuf>,
    department: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let departments = DepartmentConfig::load_all(&config.configs_dir)?;
    let templates = TemplateRegistry::load_dir(&config.templates_dir)?;
    eprintln!(
        "📋 Loaded {} department(s), {} template(s)",
        departments.len(),
        templates.len()
    );

    if let Some(code) = &department {
        if department_by_code(&departments, code).is_none() {
            return Err(format!("Department not found: {}", code).into());
        }
    }

    let inputs = match file {
        Some(path) => vec![path],
        None => discover_inputs(&config.input_dir)?,
    };
    if inputs.is_empty() {
        eprintln!("📭 No CSV files in {}", config.input_dir.display());
        return Ok(());
    }

    eprintln!(
        "📄 Processing {} file(s){}",
        inputs.len(),
        if dry_run { " (dry run)" } else { "" }
    );

    let output_dir = config.output_dir.clone();
    let ctx = Arc::new(RunContext {
        config,
        departments,
        templates,
        dry_run,
        department_override: department,
    });
    let summary = batch::process(ctx, inputs).await;

    eprintln!("\n{}", render_summary(&summary));

    for path in write_reports(&summary, &output_dir)? {
        eprintln!("💾 Report written to: {}", path.display());
    }

    if summary.failed() > 0 {
        eprintln!("\n❌ {} file(s) failed:", summary.failed());
        for failure in summary.failures() {
            eprintln!(
                "   - {}: {}",
                failure.file_name(),
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
        std::process::exit(1);
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_convert(
    config: &MainConfig,
    input: &Path,
    department_code: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Converting: {}", input.display());

    let departments = DepartmentConfig::load_all(&config.configs_dir)?;
    let department = department_by_code(&departments, department_code)
        .ok_or_else(|| format!("Department not found: {}", department_code))?;
    let templates = TemplateRegistry::load_dir(&config.templates_dir)?;

    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let schema = templates.resolve(
        file_name,
        &department.template_mapping,
        department.default_template.as_deref(),
    )?;
    eprintln!("   Department: {}", department.name());
    eprintln!("   Template: {} ({} fields)", schema.name, schema.len());
    eprintln!(
        "   Delimiter: '{}'",
        department
            .csv_settings
            .delimiter_char()?
            .map(format_delimiter)
            .unwrap_or_else(|| "auto".to_string())
    );

    let output_doc = match convert_file(input, department, &schema, config.continue_on_error) {
        Ok(output) => output,
        Err(PipelineError::ValidationFailed { errors, findings }) => {
            eprintln!("\n✔️  Validation:");
            for finding in findings.iter().take(20) {
                eprintln!("   {}", finding);
            }
            if findings.len() > 20 {
                eprintln!("   ... and {} more", findings.len() - 20);
            }
            return Err(format!("Validation failed with {} error(s)", errors).into());
        }
        Err(e) => return Err(e.into()),
    };

    let stats = output_doc.stats;
    eprintln!("\n⚙️  Rows: {}", stats.rows_processed);
    eprintln!("   Transactions: {}", stats.transactions_created);
    eprintln!("   Line items: {}", stats.line_items_created);
    eprintln!("   Fields transformed: {}", stats.fields_transformed);

    if output_doc.report.findings.is_empty() {
        eprintln!("   ✅ No validation errors");
    } else {
        eprintln!("\n{}", output_doc.report.format());
    }

    write_output(&output_doc.xml, output)?;
    Ok(())
}

fn cmd_validate_config(config: &MainConfig) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating configuration");
    eprintln!("   Input: {}", config.input_dir.display());
    eprintln!("   Output: {}", config.output_dir.display());
    eprintln!("   Templates: {}", config.templates_dir.display());
    eprintln!("   Departments: {}", config.configs_dir.display());
    eprintln!("   Workers: {}", config.concurrency());

    let departments = DepartmentConfig::load_all(&config.configs_dir)?;
    let templates = TemplateRegistry::load_dir(&config.templates_dir)?;
    eprintln!("\n📋 Templates ({}): {}", templates.len(), templates.names().join(", "));

    let mut problems = 0;
    for department in &departments {
        eprintln!(
            "\n🏢 {} ({}): {} pattern(s), {} rule(s)",
            department.name(),
            department.department_code,
            department.file_matching_patterns.len(),
            department.ruleset.transformation_rules.len()
        );

        let referenced = department
            .template_mapping
            .iter()
            .map(|rule| rule.use_template.as_str())
            .chain(department.default_template.as_deref());
        for name in referenced {
            let Some(schema) = templates.get(name) else {
                eprintln!("   ❌ Template not found: {}", name);
                problems += 1;
                continue;
            };
            for field in department.ruleset.referenced_fields() {
                if schema.get(&field).is_none() {
                    eprintln!("   ⚠️  Field '{}' is not mapped by template {}", field, name);
                }
            }
        }
        if department.template_mapping.is_empty() && department.default_template.is_none() {
            eprintln!("   ⚠️  No template mapping; every file will fail");
            problems += 1;
        }
        if department.file_matching_patterns.is_empty() {
            eprintln!("   ⚠️  No file patterns; only usable with --department");
        }
    }

    if problems > 0 {
        eprintln!("\n📊 {} problem(s) found", problems);
        std::process::exit(1);
    }

    eprintln!("\n✅ Configuration OK ({} department(s))", departments.len());
    Ok(())
}

fn cmd_schema(
    config: &MainConfig,
    template: &Path,
    department_code: Option<&str>,
    xsd: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = read_template(template)?;
    print_schema(&schema);

    if let Some(xsd_path) = xsd {
        let departments;
        let department = match department_code {
            Some(code) => {
                departments = DepartmentConfig::load_all(&config.configs_dir)?;
                Some(department_by_code(&departments, code).ok_or_else(|| format!("Department not found: {}", code))?)
            }
            None => None,
        };

        let default_options = AssembleOptions::default();
        let (static_fields, options) = match department {
            Some(d) => (d.ruleset.static_fields.as_slice(), &d.xml),
            None => (&[][..], &default_options),
        };

        let document = generate_xsd(&schema, static_fields, options)?;
        fs::write(xsd_path, document)?;
        eprintln!("💾 XSD written to: {}", xsd_path.display());
    }

    Ok(())
}

fn print_schema(schema: &Schema) {
    println!("📄 Template: {} ({} fields)\n", schema.name, schema.len());
    for level in [ParentLevel::Root, ParentLevel::Transaction, ParentLevel::LineItem] {
        let fields: Vec<_> = schema.fields_at(level).collect();
        if fields.is_empty() {
            continue;
        }
        println!("{}:", level);
        for mapping in fields {
            let mut line = format!(
                "  {:>3}. {} -> <{}> {} {:?}",
                mapping.order, mapping.source_key, mapping.output_tag, mapping.data_type, mapping.requirement
            );
            if mapping.max_length > 0 {
                line.push_str(&format!(" max={}", mapping.max_length));
            }
            if !mapping.condition.is_empty() {
                line.push_str(&format!(" if {}", mapping.condition));
            }
            println!("{}", line);
        }
        println!();
    }
}

fn cmd_actions() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", actions_description());
    Ok(())
}

fn cmd_example_ruleset() -> Result<(), Box<dyn std::error::Error>> {
    let ruleset = example_ruleset();
    println!("{}", ruleset.to_json()?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
