//! # edi-cli
//!
//! Command-line front end for the EDI interchange reader.
//!
//! `edi parse` reads an interchange and writes the event stream as XML or
//! as a JSON element tree; `edi models` lists the mapping models found in
//! a directory.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use edi_adapter_edifact::{InterchangeParser, ParseReport, ReaderConfig};
use edi_ir::{TreeBuilder, XmlWriter};
use edi_schema::{EdimapLoader, MappingsRegistry, StaticMappingsRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edi")]
#[command(about = "Read UN/EDIFACT interchanges into structured documents")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an interchange and write its document
    Parse {
        /// Input file path
        input: PathBuf,

        /// Directory with mapping models (repeatable)
        #[arg(short, long = "models")]
        models: Vec<PathBuf>,

        /// Reader configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Validate field values and treat unknown messages as fatal
        #[arg(long)]
        validate: bool,

        /// Turn validation and control count diagnostics into errors
        #[arg(long)]
        strict: bool,

        /// Skip CR/LF between segments
        #[arg(long)]
        ignore_newlines: bool,

        /// Indent XML output
        #[arg(long)]
        indent: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Xml)]
        format: Format,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the mapping models in a directory
    Models {
        /// Model directory
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Xml,
    Json,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Parse {
            input,
            models,
            config,
            validate,
            strict,
            ignore_newlines,
            indent,
            format,
            output,
        } => {
            let mut reader_config = match config {
                Some(path) => ReaderConfig::from_file(&path)
                    .with_context(|| format!("loading configuration {}", path.display()))?,
                None => ReaderConfig::default(),
            };
            // Flags only switch options on; the file decides the rest
            reader_config.validate |= validate;
            reader_config.strict |= strict;
            reader_config.ignore_newlines |= ignore_newlines;
            reader_config.indent |= indent;

            let registry = load_registry(&models)?;
            let report = parse(&input, registry, reader_config, format, output.as_deref())?;
            Ok(exit_code(&report))
        }
        Commands::Models { dir } => {
            let registry = StaticMappingsRegistry::from_dir(&dir)
                .with_context(|| format!("loading models from {}", dir.display()))?;
            let mut descriptions = registry.descriptions();
            descriptions.sort_by_key(ToString::to_string);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for description in descriptions {
                writeln!(out, "{description}")?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_registry(dirs: &[PathBuf]) -> anyhow::Result<Arc<dyn MappingsRegistry>> {
    let loader = EdimapLoader::new();
    let mut registry = StaticMappingsRegistry::new();
    for dir in dirs {
        let models = loader
            .load_dir(dir)
            .with_context(|| format!("loading models from {}", dir.display()))?;
        for model in models {
            registry.register(model);
        }
    }
    tracing::debug!(models = registry.len(), "Mapping registry ready");
    Ok(Arc::new(registry))
}

fn parse(
    input: &Path,
    registry: Arc<dyn MappingsRegistry>,
    config: ReaderConfig,
    format: Format,
    output: Option<&Path>,
) -> anyhow::Result<ParseReport> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let reader = BufReader::new(file);
    let parser = InterchangeParser::new(registry)?.with_config(config);

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let report = match format {
        Format::Xml => {
            let mut writer = XmlWriter::new(&mut out);
            parser
                .parse(reader, &mut writer)
                .with_context(|| format!("parsing {}", input.display()))?
        }
        Format::Json => {
            let mut tree = TreeBuilder::new();
            let report = parser
                .parse(reader, &mut tree)
                .with_context(|| format!("parsing {}", input.display()))?;
            serde_json::to_writer_pretty(&mut out, &tree.finish()?)?;
            writeln!(out)?;
            report
        }
    };
    out.flush()?;

    for issue in report.diagnostics.issues() {
        eprintln!("{issue}");
    }
    tracing::info!(
        interchanges = report.interchanges.len(),
        messages = report.messages().count(),
        segments = report.segment_count,
        "Parsed {}",
        input.display()
    );
    Ok(report)
}

fn exit_code(report: &ParseReport) -> ExitCode {
    if report.diagnostics.has_fatal() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
