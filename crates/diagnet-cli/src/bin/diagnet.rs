//! Diagnet CLI - Command-line interface for the diagnet diagnosis engine
//!
//! Usage:
//!   diagnet diagnose <file> -s "Fever,Cough"      # Rank diseases for observed symptoms
//!   diagnet diagnose <file> -s Fever -o json      # Output the report as JSON
//!   diagnet info <file>                           # Knowledge statistics
//!   diagnet add <file> Measles "Rash, Fever"      # Append a disease line
//!   diagnet check <file>                          # Report unparseable lines
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use diagnet_core::{
    DiagnosisEngine, DiagnosisReport, EngineConfig, KnowledgeBase, KnowledgeStats,
    MaterializedGraph,
};
use diagnet_frontend::{
    parse_knowledge, render_entry, render_knowledge, IngestReport, KnowledgeEntry, KnowledgeFeed,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::io::Write;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diagnet")]
#[command(version)]
#[command(about = "Diagnet - disease diagnosis from symptom knowledge")]
#[command(
    long_about = "Build a noisy-OR disease/symptom network from a knowledge file and rank diseases by exact posterior and by symptom overlap"
)]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the engine configuration.
#[derive(Args)]
struct ModelArgs {
    /// Prior probability of every disease
    #[arg(long, global = true, env = "DIAGNET_PRIOR", value_name = "P")]
    prior: Option<f64>,

    /// Probability a symptom appears with no active cause
    #[arg(long, global = true, env = "DIAGNET_LEAK", value_name = "P")]
    leak: Option<f64>,

    /// Probability one active disease produces a symptom on its own
    #[arg(long, global = true, env = "DIAGNET_ACTIVATION", value_name = "P")]
    activation: Option<f64>,

    /// Minimum overlap score for the graph-match ranking
    #[arg(long, global = true, env = "DIAGNET_THRESHOLD", value_name = "T")]
    threshold: Option<f64>,
}

impl ModelArgs {
    fn config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            disease_prior: self.prior.unwrap_or(defaults.disease_prior),
            leak_probability: self.leak.unwrap_or(defaults.leak_probability),
            activation_probability: self.activation.unwrap_or(defaults.activation_probability),
            match_threshold: self.threshold.unwrap_or(defaults.match_threshold),
            ..defaults
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Rank diseases for a set of observed symptoms
    Diagnose {
        #[arg(value_name = "FILE")]
        file: String,

        /// Comma-separated observed symptoms
        #[arg(short, long, value_delimiter = ',', value_name = "SYMPTOMS")]
        symptoms: Vec<String>,

        /// Number of probabilistic results to show in the summary
        #[arg(long, default_value_t = 3, value_name = "N")]
        top: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        output: OutputFormat,
    },
    /// List every known symptom
    Symptoms {
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Print knowledge statistics
    Info {
        #[arg(value_name = "FILE")]
        file: String,

        #[arg(long, default_value_t = 5, value_name = "N")]
        top: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        output: OutputFormat,
    },
    /// Append a new disease to the knowledge file
    Add {
        #[arg(value_name = "FILE")]
        file: String,
        disease: String,
        /// Comma-separated symptoms
        symptoms: String,
    },
    /// Replace the symptoms of an existing disease
    Update {
        #[arg(value_name = "FILE")]
        file: String,
        disease: String,
        /// Comma-separated symptoms
        symptoms: String,
    },
    /// Remove a disease from the knowledge file
    Remove {
        #[arg(value_name = "FILE")]
        file: String,
        disease: String,
    },
    /// Print the disease/symptom graph as JSON
    Graph {
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Report lines that could not be parsed
    Check {
        #[arg(value_name = "FILE")]
        file: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
    Debug,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.model.config().validate() {
        Ok(c) => c,
        Err(e) => fail(format!("Invalid configuration: {}", e)),
    };

    match cli.command {
        Command::Diagnose {
            file,
            symptoms,
            top,
            output,
        } => {
            let engine = load_engine(&file, config);
            let observed: BTreeSet<String> = symptoms
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if observed.is_empty() {
                fail("No symptoms given; pass them with -s \"Fever, Cough\"");
            }
            match engine.diagnose(&observed) {
                Ok(report) => emit(output, &report, |r| print_report(r, top)),
                Err(e) => fail(format!("Diagnosis failed: {}", e)),
            }
        }
        Command::Symptoms { file } => {
            let kb = load_knowledge(&file);
            for symptom in kb.all_symptoms() {
                println!("{}", symptom);
            }
        }
        Command::Info { file, top, output } => {
            let kb = load_knowledge(&file);
            let stats = KnowledgeStats::compute(&kb, top);
            emit(output, &stats, print_stats);
        }
        Command::Add {
            file,
            disease,
            symptoms,
        } => {
            let entry = parse_entry(&disease, &symptoms);
            let kb = load_knowledge(&file);
            if kb.contains_disease(&entry.disease) {
                fail(format!(
                    "Disease '{}' already exists; use 'update' to change it",
                    entry.disease
                ));
            }
            append_entry(&file, &entry);
            println!("✓ Added '{}' with {} symptoms", entry.disease, entry.symptoms.len());
        }
        Command::Update {
            file,
            disease,
            symptoms,
        } => {
            let entry = parse_entry(&disease, &symptoms);
            let mut kb = load_knowledge(&file);
            if !kb.update_disease_symptoms(&entry.disease, &entry.symptoms) {
                fail(format!("Unknown disease '{}'", entry.disease));
            }
            rewrite_knowledge(&file, &kb);
            println!("✓ Updated '{}'", entry.disease);
        }
        Command::Remove { file, disease } => {
            let mut kb = load_knowledge(&file);
            let disease = disease.trim();
            if !kb.remove_disease(disease) {
                fail(format!("Unknown disease '{}'", disease));
            }
            rewrite_knowledge(&file, &kb);
            println!("✓ Removed '{}'", disease);
        }
        Command::Graph { file } => {
            let kb = load_knowledge(&file);
            let graph = MaterializedGraph::from_knowledge(&kb);
            print_json(&graph);
        }
        Command::Check { file, output } => {
            let feed = parse_knowledge(&read_source(&file));
            emit(output, &feed.report, print_ingest_report);
            if !feed.report.is_clean() {
                process::exit(2);
            }
        }
    }
}

fn fail(message: impl AsRef<str>) -> ! {
    eprintln!("Error: {}", message.as_ref());
    process::exit(1);
}

fn read_source(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => fail(format!("Error reading file '{}': {}", path, e)),
    }
}

fn parse_feed(path: &str) -> KnowledgeFeed {
    let feed = parse_knowledge(&read_source(path));
    for skipped in &feed.report.examples {
        eprintln!(
            "warning: {}:{}: {}",
            path, skipped.position.line, skipped.error
        );
    }
    let hidden = feed.report.skipped - feed.report.examples.len();
    if hidden > 0 {
        eprintln!("warning: {} more unparseable lines in {}", hidden, path);
    }
    feed
}

fn load_knowledge(path: &str) -> KnowledgeBase {
    KnowledgeBase::from_entries(&parse_feed(path).entries)
}

/// Skipped lines are reported through the engine's log output.
fn load_engine(path: &str, config: EngineConfig) -> DiagnosisEngine {
    let feed = parse_knowledge(&read_source(path));
    tracing::debug!("{} entries read from '{}'", feed.entries.len(), path);
    let engine = match DiagnosisEngine::new(config) {
        Ok(e) => e,
        Err(e) => fail(format!("Invalid configuration: {}", e)),
    };
    engine.ingest(&feed);
    if let Err(e) = engine.rebuild() {
        fail(format!("Could not build the model from '{}': {}", path, e));
    }
    engine
}

fn parse_entry(disease: &str, symptoms: &str) -> KnowledgeEntry {
    match KnowledgeEntry::new(disease, symptoms.trim_end_matches('.').split(',')) {
        Ok(entry) => entry,
        Err(e) => fail(e.to_string()),
    }
}

fn append_entry(path: &str, entry: &KnowledgeEntry) {
    let existing = read_source(path);
    let mut line = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        line.push('\n');
    }
    line.push_str(&render_entry(entry));
    line.push('\n');

    let result = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(line.as_bytes()));
    if let Err(e) = result {
        fail(format!("Error writing file '{}': {}", path, e));
    }
}

fn rewrite_knowledge(path: &str, kb: &KnowledgeBase) {
    let mut text = render_knowledge(&kb.to_entries());
    if !text.is_empty() {
        text.push('\n');
    }
    if let Err(e) = std::fs::write(path, text) {
        fail(format!("Error writing file '{}': {}", path, e));
    }
}

fn emit<T: Serialize + Debug>(format: OutputFormat, value: &T, summary: impl FnOnce(&T)) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Debug => println!("{:#?}", value),
        OutputFormat::Summary => summary(value),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("Error serializing to JSON: {}", e)),
    }
}

fn print_report(report: &DiagnosisReport, top: usize) {
    println!("🧠 Bayesian results (top {}):", top);
    if report.probabilistic.is_empty() {
        println!("  (none)");
    }
    for p in report.probabilistic.iter().take(top) {
        println!("  {:<30} {:>8.4}%", p.disease, p.probability * 100.0);
    }

    println!("\n🔗 Symptom matches:");
    if report.graph_matches.is_empty() {
        println!("  (none above threshold)");
    }
    for m in &report.graph_matches {
        let matched: Vec<&str> = m.matched_symptoms.iter().map(String::as_str).collect();
        println!(
            "  {:<30} {:>5.1}%  [{}]",
            m.disease,
            m.score * 100.0,
            matched.join(", ")
        );
    }

    if !report.unknown_symptoms.is_empty() {
        let unknown: Vec<&str> = report.unknown_symptoms.iter().map(String::as_str).collect();
        println!("\nUnknown symptoms (ignored): {}", unknown.join(", "));
    }
    if !report.failures.is_empty() {
        println!("\nCould not compute ({}):", report.failures.len());
        for f in &report.failures {
            println!("  {}", f);
        }
    }
}

fn print_stats(stats: &KnowledgeStats) {
    println!("Diseases:      {}", stats.disease_count);
    println!("Symptoms:      {}", stats.symptom_count);
    println!("Relationships: {}", stats.relationship_count);

    if !stats.top_diseases.is_empty() {
        println!("\nDiseases with most symptoms:");
        for r in &stats.top_diseases {
            println!("  {:<30} {}", r.name, r.count);
        }
    }
    if !stats.common_symptoms.is_empty() {
        println!("\nMost common symptoms:");
        for r in &stats.common_symptoms {
            println!("  {:<30} {}", r.name, r.count);
        }
    }
}

fn print_ingest_report(report: &IngestReport) {
    println!(
        "{} lines read, {} accepted, {} skipped",
        report.lines_read, report.accepted, report.skipped
    );
    for s in &report.examples {
        println!("  line {}: {} ({:?})", s.position.line, s.error, s.text);
    }
    if report.is_clean() {
        println!("✓ Knowledge file is clean");
    }
}
