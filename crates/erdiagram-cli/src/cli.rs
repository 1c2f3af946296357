//! Command-line interface for the erd utility
//!
//! Validates, inspects and reformats ER diagram documents.

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::colorizer::{colorize_diagnostic, colorize_status};
use erdiagram::core::logging::init_logging;
use erdiagram::core::ElementRef;
use erdiagram::er::{outline, Diagnostic, ErDatabase, LintConfig, LintRule, Linter, Severity};

/// erd - Validate and inspect entity-relationship diagrams
#[derive(Parser)]
#[command(name = "erd")]
#[command(about = "Validate, inspect and format entity-relationship diagram documents")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Set log level (trace|debug|info|warn|error); defaults to ERD_LOG_LEVEL, RUST_LOG, then warn
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Set log format (compact|pretty|json); defaults to ERD_LOG_FORMAT, then compact
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Log level options
#[derive(Copy, Clone, Debug, clap::ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format options
#[derive(Copy, Clone, Debug, clap::ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a diagram, check its structure and run the modeling lints
    Validate {
        /// Input diagram document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Fail when any warning is reported
        #[arg(long)]
        deny_warnings: bool,

        /// Disable a lint rule (repeatable)
        #[arg(long, value_name = "RULE")]
        allow: Vec<LintRule>,

        /// When to use colors in output
        #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
        color: ColorChoice,
    },

    /// Print an outline of the diagram
    Inspect {
        /// Input diagram document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print element counts as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Describe one element, e.g. entity:1, relationship:2, attribute:3
    Show {
        /// Input diagram document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Element to describe
        element: ElementRef,
    },

    /// Re-serialize a diagram in canonical form
    Format {
        /// Input diagram document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// List the lint rules
    Rules {
        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// When to colorize output
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Use colors if output is a terminal and NO_COLOR is not set
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Outcome of linting one document
#[derive(Debug)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub entities: usize,
    pub relationships: usize,
    pub attributes: usize,
}

impl ValidationReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn summary(&self) -> String {
        let totals = format!(
            "{} entities, {} relationships, {} attributes",
            self.entities, self.relationships, self.attributes
        );
        if self.diagnostics.is_empty() {
            format!("Valid diagram: {}", totals)
        } else {
            format!(
                "Valid diagram with {} warning(s) and {} info: {}",
                self.count(Severity::Warning),
                self.count(Severity::Info),
                totals
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct InspectSummary {
    entities: usize,
    weak_entities: usize,
    relationships: usize,
    attributes: usize,
    composite_attributes: usize,
    diagnostics: usize,
}

#[derive(Debug, Serialize)]
struct RuleInfo {
    name: &'static str,
    severity: String,
    description: &'static str,
}

/// Main CLI application
#[derive(Debug, Default)]
pub struct ErdApp {
    lint_config: LintConfig,
}

impl ErdApp {
    /// Create a new application instance with every lint enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new application instance with a lint config
    pub fn with_config(lint_config: LintConfig) -> Self {
        Self { lint_config }
    }

    /// Run the application with the given CLI arguments
    pub fn run(&mut self, cli: Cli) -> Result<()> {
        // Flags win; otherwise init_logging falls back to the environment
        let log_level = cli.log_level.map(|l| l.as_str());
        let log_format = cli.log_format.map(|f| f.as_str());
        if let Err(e) = init_logging(log_level, log_format) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        if cli.verbose {
            eprintln!("erd v{}", env!("CARGO_PKG_VERSION"));
        }

        match cli.command {
            Commands::Validate {
                input,
                deny_warnings,
                allow,
                color,
            } => {
                let config = allow
                    .into_iter()
                    .fold(self.lint_config.clone(), LintConfig::allow);
                ErdApp::with_config(config).validate_command(
                    input,
                    deny_warnings,
                    color,
                    cli.verbose,
                )
            }
            Commands::Inspect { input, json } => self.inspect_command(input, json, cli.verbose),
            Commands::Show { input, element } => self.show_command(input, element, cli.verbose),
            Commands::Format {
                input,
                output,
                compact,
            } => self.format_command(input, output, compact, cli.verbose),
            Commands::Rules { json } => self.rules_command(json),
        }
    }

    /// Handle the validate command
    fn validate_command(
        &self,
        input: Option<PathBuf>,
        deny_warnings: bool,
        color: ColorChoice,
        verbose: bool,
    ) -> Result<()> {
        let content = self.read_input(input, verbose)?;
        let colorize = should_colorize(color);

        let report = match self.validate(&content) {
            Ok(report) => report,
            Err(e) => {
                let message = format!("Invalid diagram: {}", e);
                println!("{}", colorize_status(false, &message, colorize));
                return Err(e);
            }
        };

        for diagnostic in &report.diagnostics {
            println!("{}", colorize_diagnostic(diagnostic, colorize));
        }

        let warnings = report.count(Severity::Warning);
        if deny_warnings && warnings > 0 {
            let message = format!("{} warning(s) denied", warnings);
            println!("{}", colorize_status(false, &message, colorize));
            bail!(message);
        }

        println!("{}", colorize_status(true, &report.summary(), colorize));
        Ok(())
    }

    /// Load a document and lint it with the app's config
    pub fn validate(&self, content: &str) -> Result<ValidationReport> {
        let db = ErDatabase::from_json(content)?;
        db.check_integrity()?;
        let diagnostics = Linter::with_config(self.lint_config.clone()).check(&db);
        debug!(diagnostics = diagnostics.len(), "Validation finished");
        Ok(ValidationReport {
            diagnostics,
            entities: db.entity_count(),
            relationships: db.relationship_count(),
            attributes: db.attribute_count(),
        })
    }

    /// Handle the inspect command
    fn inspect_command(&self, input: Option<PathBuf>, json: bool, verbose: bool) -> Result<()> {
        let content = self.read_input(input, verbose)?;
        let report = self.inspect(&content, json)?;
        self.write_output(None, &report)
    }

    pub fn inspect(&self, content: &str, json: bool) -> Result<String> {
        let db = ErDatabase::from_json(content)?;
        if !json {
            return Ok(outline(&db));
        }

        let attributes = db.all_attributes();
        let summary = InspectSummary {
            entities: db.entity_count(),
            weak_entities: db.entities().filter(|e| e.is_weak).count(),
            relationships: db.relationship_count(),
            attributes: attributes.len(),
            composite_attributes: attributes.iter().filter(|a| a.is_composite()).count(),
            diagnostics: Linter::with_config(self.lint_config.clone())
                .check(&db)
                .len(),
        };
        Ok(serde_json::to_string_pretty(&summary)?)
    }

    /// Handle the show command
    fn show_command(
        &self,
        input: Option<PathBuf>,
        element: ElementRef,
        verbose: bool,
    ) -> Result<()> {
        let content = self.read_input(input, verbose)?;
        let db = ErDatabase::from_json(&content)?;
        debug!(%element, "Describing element");
        let description = describe(&db, element)?;
        self.write_output(None, &description)
    }

    /// Handle the format command
    fn format_command(
        &self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        compact: bool,
        verbose: bool,
    ) -> Result<()> {
        let content = self.read_input(input, verbose)?;
        let db = ErDatabase::from_json(&content)?;
        let formatted = if compact {
            db.to_json_compact()?
        } else {
            db.to_json()?
        };
        if verbose {
            eprintln!("Formatted {} elements", db.entity_count() + db.relationship_count());
        }
        self.write_output(output, &formatted)
    }

    /// Handle the rules command
    fn rules_command(&self, json: bool) -> Result<()> {
        self.write_output(None, &rules_listing(json)?)
    }

    /// Read input from file or stdin
    pub fn read_input(&self, input: Option<PathBuf>, verbose: bool) -> Result<String> {
        let content = match input {
            Some(path) if path.to_string_lossy() != "-" => fs::read_to_string(&path)
                .map_err(|e| anyhow!("Failed to read input file '{}': {}", path.display(), e))?,
            _ => {
                let mut content = String::new();
                io::stdin().read_to_string(&mut content)?;
                content
            }
        };
        if verbose {
            eprintln!("Read {} bytes of input", content.len());
        }
        Ok(content)
    }

    /// Write output to file or stdout
    pub fn write_output(&self, output: Option<PathBuf>, content: &str) -> Result<()> {
        let content = if content.is_empty() || content.ends_with('\n') {
            content.to_string()
        } else {
            format!("{}\n", content)
        };

        match output {
            Some(path) if path.to_string_lossy() != "-" => {
                fs::write(&path, &content).map_err(|e| {
                    anyhow!("Failed to write output file '{}': {}", path.display(), e)
                })?;
                info!(path = %path.display(), bytes = content.len(), "Output written");
            }
            _ => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(content.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Determine if we should colorize stdout
fn should_colorize(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::env::var_os("NO_COLOR").is_none()
                && crossterm::tty::IsTty::is_tty(&std::io::stdout())
        }
    }
}

/// Human-readable description of one element
pub fn describe(db: &ErDatabase, element: ElementRef) -> Result<String> {
    let mut out = String::new();
    let name_of = |e: ElementRef| db.name_of(e).unwrap_or("?").to_string();

    match element {
        ElementRef::Entity(id) => {
            let entity = db
                .get_entity(id)
                .ok_or_else(|| anyhow!("Not found: {}", element))?;
            writeln!(out, "{} '{}'", element, entity.name)?;
            writeln!(out, "  position: ({}, {})", entity.position.x, entity.position.y)?;
            writeln!(out, "  weak: {}", entity.is_weak)?;
            write_attribute_list(&mut out, db, entity.attribute_ids())?;
            writeln!(out, "  relationships:")?;
            for relationship in db.relationships_of(id)? {
                writeln!(out, "    {} '{}'", ElementRef::from(relationship.id), relationship.name)?;
            }
        }
        ElementRef::Relationship(id) => {
            let relationship = db
                .get_relationship(id)
                .ok_or_else(|| anyhow!("Not found: {}", element))?;
            writeln!(out, "{} '{}'", element, relationship.name)?;
            writeln!(
                out,
                "  from: {} '{}' ({})",
                relationship.from(),
                name_of(relationship.from().into()),
                relationship.from_entity
            )?;
            writeln!(
                out,
                "  to: {} '{}' ({})",
                relationship.to(),
                name_of(relationship.to().into()),
                relationship.to_entity
            )?;
            writeln!(out, "  type: {}", relationship.relationship_type)?;
            if !relationship.has_default_diamond() {
                writeln!(
                    out,
                    "  diamond offset: ({}, {})",
                    relationship.diamond_offset_x.unwrap_or(0.0),
                    relationship.diamond_offset_y.unwrap_or(0.0)
                )?;
            }
            write_attribute_list(&mut out, db, relationship.attribute_ids())?;
        }
        ElementRef::Attribute(id) => {
            let attribute = db
                .get_attribute(id)
                .ok_or_else(|| anyhow!("Not found: {}", element))?;
            writeln!(out, "{} '{}'", element, attribute.name)?;
            writeln!(
                out,
                "  owner: {} '{}'",
                attribute.connected_to,
                name_of(attribute.connected_to)
            )?;
            let root = db.root_owner(id)?;
            if root != attribute.connected_to {
                writeln!(out, "  root owner: {} '{}'", root, name_of(root))?;
            }
            writeln!(out, "  position: ({}, {})", attribute.position.x, attribute.position.y)?;
            writeln!(
                out,
                "  primary: {}, multivalued: {}, calculated: {}",
                attribute.is_primary, attribute.is_multivalue, attribute.is_calculated
            )?;
            if attribute.is_composite() {
                writeln!(out, "  subattributes:")?;
                for child in db.subattributes_of(id)? {
                    writeln!(out, "    {} '{}'", ElementRef::from(child.id), child.name)?;
                }
            }
        }
    }
    Ok(out)
}

fn write_attribute_list(
    out: &mut String,
    db: &ErDatabase,
    ids: &[erdiagram::core::AttributeId],
) -> Result<()> {
    writeln!(out, "  attributes:")?;
    for attribute in ids.iter().filter_map(|id| db.get_attribute(*id)) {
        writeln!(out, "    {} '{}'", ElementRef::from(attribute.id), attribute.name)?;
    }
    Ok(())
}

/// The lint rules, as text or JSON
pub fn rules_listing(json: bool) -> Result<String> {
    if json {
        let rules: Vec<RuleInfo> = LintRule::ALL
            .iter()
            .map(|rule| RuleInfo {
                name: rule.name(),
                severity: rule.severity().to_string(),
                description: rule.description(),
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&rules)?);
    }

    let width = LintRule::ALL
        .iter()
        .map(|rule| rule.name().len())
        .max()
        .unwrap_or(0);
    let mut out = String::from("Lint rules:\n");
    for rule in LintRule::ALL {
        writeln!(
            out,
            "  {:<width$}  {:<7}  {}",
            rule.name(),
            rule.severity().to_string(),
            rule.description(),
            width = width
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use erdiagram::core::{EntityId, RelationshipId};
    use std::fs;
    use tempfile::tempdir;

    const DIAGRAM: &str = r#"{
        "entities": [
            {"id": 1, "name": "Student", "attributes": [
                {"id": 1, "name": "Name", "connectedTo": {"kind": "entity", "id": 1},
                 "subattributes": [
                    {"id": 2, "name": "First", "connectedTo": {"kind": "attribute", "id": 1},
                     "isPrimary": true}
                 ]}
            ]},
            {"id": 2, "name": "Course", "attributes": []}
        ],
        "relationships": [
            {"id": 1, "name": "Enrolls", "entities": [1, 2], "relationship_type": "1-N",
             "from_entity": "can", "to_entity": "must", "diamondOffsetX": 3.0,
             "attributes": [
                {"id": 3, "name": "grade", "connectedTo": {"kind": "relationship", "id": 1}}
             ]}
        ]
    }"#;

    #[test]
    fn test_cli_parsing_validate_command() {
        let args = vec![
            "erd",
            "validate",
            "--input",
            "school.json",
            "--allow",
            "missing-primary-key",
            "--allow",
            "empty-name",
            "--deny-warnings",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Validate {
                input,
                deny_warnings,
                allow,
                color,
            } => {
                assert_eq!(input.unwrap().to_string_lossy(), "school.json");
                assert!(deny_warnings);
                assert_eq!(allow, vec![LintRule::MissingPrimaryKey, LintRule::EmptyName]);
                assert_eq!(color, ColorChoice::Auto);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_rule() {
        let args = vec!["erd", "validate", "--allow", "no-such-rule"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_cli_parsing_show_command() {
        let cli = Cli::try_parse_from(vec!["erd", "show", "-i", "d.json", "r:1"]).unwrap();
        match cli.command {
            Commands::Show { element, .. } => {
                assert_eq!(element, ElementRef::Relationship(RelationshipId(1)));
            }
            _ => panic!("Expected Show command"),
        }
        assert!(Cli::try_parse_from(vec!["erd", "show", "table:1"]).is_err());
    }

    #[test]
    fn test_cli_parsing_logging_flags() {
        let args = vec!["erd", "--verbose", "--log-level", "debug", "rules"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert_eq!(cli.log_format, None);
    }

    #[test]
    fn test_cli_parsing_format_command() {
        let args = vec!["erd", "format", "-i", "-", "-o", "out.json", "--compact"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Format {
                input,
                output,
                compact,
            } => {
                assert_eq!(input.unwrap().to_string_lossy(), "-");
                assert_eq!(output.unwrap().to_string_lossy(), "out.json");
                assert!(compact);
            }
            _ => panic!("Expected Format command"),
        }
    }

    #[test]
    fn test_validate_report() {
        let app = ErdApp::new();
        let report = app.validate(DIAGRAM).unwrap();
        assert_eq!(report.entities, 2);
        assert_eq!(report.attributes, 3);
        // Course has no key and Enrolls is 1-N with an attribute
        assert_eq!(report.count(Severity::Info), 2);
        assert_eq!(report.count(Severity::Warning), 0);
        assert!(report.summary().starts_with("Valid diagram with 0 warning(s) and 2 info"));
    }

    #[test]
    fn test_validate_with_allowed_rules() {
        let config = LintConfig::new()
            .allow(LintRule::MissingPrimaryKey)
            .allow(LintRule::RelationshipAttributeNotManyToMany);
        let report = ErdApp::with_config(config).validate(DIAGRAM).unwrap();
        assert!(report.diagnostics.is_empty());
        assert_eq!(
            report.summary(),
            "Valid diagram: 2 entities, 1 relationships, 3 attributes"
        );
    }

    #[test]
    fn test_validate_rejects_broken_document() {
        let app = ErdApp::new();
        let broken = r#"{"relationships": [{"id": 1, "name": "R", "entities": [1, 2],
            "relationship_type": "1-1"}]}"#;
        let error = app.validate(broken).unwrap_err();
        assert!(error.to_string().contains("Not found: entity 1"));
    }

    #[test]
    fn test_inspect_outline_and_json() {
        let app = ErdApp::new();
        let text = app.inspect(DIAGRAM, false).unwrap();
        assert!(text.contains("Enrolls: Student (can) 1-N Course (must)"));

        let json: serde_json::Value =
            serde_json::from_str(&app.inspect(DIAGRAM, true).unwrap()).unwrap();
        assert_eq!(json["entities"], 2);
        assert_eq!(json["composite_attributes"], 1);
        assert_eq!(json["diagnostics"], 2);
    }

    #[test]
    fn test_describe_elements() {
        let db = ErDatabase::from_json(DIAGRAM).unwrap();

        let entity = describe(&db, EntityId(1).into()).unwrap();
        assert!(entity.starts_with("entity 1 'Student'\n"));
        assert!(entity.contains("    attribute 1 'Name'\n"));
        assert!(entity.contains("    relationship 1 'Enrolls'\n"));

        let relationship = describe(&db, RelationshipId(1).into()).unwrap();
        assert!(relationship.contains("  to: entity 2 'Course' (must)\n"));
        assert!(relationship.contains("  diamond offset: (3, 0)\n"));

        let first = describe(&db, "attribute:2".parse().unwrap()).unwrap();
        assert!(first.contains("  owner: attribute 1 'Name'\n"));
        assert!(first.contains("  root owner: entity 1 'Student'\n"));
        assert!(first.contains("primary: true"));

        assert!(describe(&db, EntityId(9).into()).is_err());
    }

    #[test]
    fn test_rules_listing() {
        let text = rules_listing(false).unwrap();
        for rule in LintRule::ALL {
            assert!(text.contains(rule.name()));
        }

        let json: serde_json::Value = serde_json::from_str(&rules_listing(true).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), LintRule::ALL.len());
        assert_eq!(json[0]["name"], "empty-name");
        assert_eq!(json[0]["severity"], "warning");
    }

    #[test]
    fn test_read_input_from_file() {
        let app = ErdApp::new();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("diagram.json");
        fs::write(&file_path, DIAGRAM).unwrap();

        let content = app.read_input(Some(file_path), false).unwrap();
        assert_eq!(content, DIAGRAM);
    }

    #[test]
    fn test_read_input_missing_file() {
        let app = ErdApp::new();
        let error = app
            .read_input(Some(PathBuf::from("/nonexistent/diagram.json")), false)
            .unwrap_err();
        assert!(error.to_string().contains("Failed to read input file"));
    }

    #[test]
    fn test_write_output_to_file() {
        let app = ErdApp::new();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("output.json");

        app.write_output(Some(file_path.clone()), "{}").unwrap();

        let read_content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(read_content, "{}\n");
    }
}
