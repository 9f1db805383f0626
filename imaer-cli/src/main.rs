use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imaer::model::receptor::RECEPTOR_ATTRIBUTE_FIELDS;
use imaer::{Document, ImaerVersion, ParseMode, ParseOptions, ParseReport, WriteOptions, ZipHandler};
use rayon::ThreadPoolBuilder;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of worker threads (default: number of CPU cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// Fail on unknown elements and broken records instead of skipping them
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise GML files, ZIP archives or a directory of both
    Inspect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Parse a GML file and write it again
    Convert {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output GML file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// IMAER version to write (default: the version read)
        #[arg(long, value_name = "VERSION")]
        imaer_version: Option<ImaerVersion>,

        /// Write without indentation
        #[arg(long)]
        compact: bool,
    },

    /// Write the receptor attribute table as tab separated values
    Receptors {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy)]
enum FileType {
    Gml,
    Zip,
}

struct Summary {
    name: String,
    version: ImaerVersion,
    sources: usize,
    buildings: usize,
    receptors: usize,
    definitions: usize,
    report: ParseReport,
}

fn main() -> Result<()> {
    // Logging
    tracing_subscriber::fmt::init();

    // Command line
    let args = Args::parse();

    // Start of processing
    let start_time = std::time::Instant::now();

    // Thread pool
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    // Parse mode shared by every subcommand
    let options = ParseOptions {
        mode: if args.strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        },
    };

    match &args.command {
        Command::Inspect { input } => inspect(input, &options)?,
        Command::Convert {
            input,
            output,
            imaer_version,
            compact,
        } => convert(input, output, *imaer_version, *compact, &options)?,
        Command::Receptors { input, output } => receptors(input, output.as_deref(), &options)?,
    }

    // Elapsed time
    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

fn file_type(path: &Path) -> Option<FileType> {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("gml") => Some(FileType::Gml),
        Some(ext) if ext.eq_ignore_ascii_case("zip") => Some(FileType::Zip),
        _ => None,
    }
}

fn collect_input_files(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            // walk subdirectories too
            files.extend(collect_input_files(&path)?);
        } else if let Some(file_type) = file_type(&path) {
            files.push((path, file_type));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn inspect(input: &Path, options: &ParseOptions) -> Result<()> {
    use rayon::prelude::*;

    // Collect GML/ZIP inputs, recursing into directories
    let inputs = if input.is_dir() {
        info!("Processing directory: {:?}", input);
        collect_input_files(input)?
    } else if let Some(file_type) = file_type(input) {
        vec![(input.to_path_buf(), file_type)]
    } else {
        error!("Unsupported input: {:?}", input);
        anyhow::bail!("Input must be a .gml file, a .zip file or a directory");
    };
    info!("Found {} input files (GML/ZIP)", inputs.len());

    // Parse in parallel; an archive yields one summary per entry
    let results: Vec<Result<Vec<Summary>>> = inputs
        .par_iter()
        .map(|(path, file_type)| match file_type {
            FileType::Gml => inspect_file(path, options).map(|summary| vec![summary]),
            FileType::Zip => inspect_zip(path, options),
        })
        .collect();

    // Print in input order and gather the failures
    let mut errors = Vec::new();
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(summaries) => summaries.iter().for_each(print_summary),
            Err(e) => errors.push(format!("{}: {:#}", inputs[i].0.display(), e)),
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }
    Ok(())
}

fn summarise(name: String, document: &Document, report: ParseReport) -> Summary {
    Summary {
        name,
        version: document.version,
        sources: document.sources().count(),
        buildings: document.buildings().count(),
        receptors: document.receptors().count(),
        definitions: document.definitions.len(),
        report,
    }
}

fn inspect_file(path: &Path, options: &ParseOptions) -> Result<Summary> {
    let (document, report) = Document::parse_from_file_with(path, options)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(summarise(path.display().to_string(), &document, report))
}

fn inspect_zip(path: &Path, options: &ParseOptions) -> Result<Vec<Summary>> {
    let entries = ZipHandler::new(path)
        .with_options(*options)
        .process_all_documents()
        .with_context(|| format!("Failed to read archive {:?}", path))?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let name = format!("{}!{}", path.display(), entry.name);
            summarise(name, &entry.document, entry.report)
        })
        .collect())
}

fn print_summary(summary: &Summary) {
    println!(
        "{}\tIMAER {}\t{} sources\t{} buildings\t{} receptors\t{} definitions",
        summary.name,
        summary.version,
        summary.sources,
        summary.buildings,
        summary.receptors,
        summary.definitions
    );
    for skipped in &summary.report.skipped {
        println!("  skipped {}", skipped);
    }
    for rejected in &summary.report.rejected {
        println!("  rejected <{}>: {}", rejected.element, rejected.reason);
    }
}

fn convert(
    input: &Path,
    output: &Path,
    version: Option<ImaerVersion>,
    compact: bool,
    options: &ParseOptions,
) -> Result<()> {
    let (mut document, report) = Document::parse_from_file_with(input, options)
        .with_context(|| format!("Failed to parse {:?}", input))?;
    if !report.is_complete() {
        warn!(
            "{:?}: {} elements skipped, {} records rejected",
            input,
            report.skipped.len(),
            report.rejected.len()
        );
    }
    // Write as another IMAER version when asked
    if let Some(version) = version {
        document.version = version;
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    document
        .serialize_to_file_with(output, &WriteOptions { indent: !compact })
        .with_context(|| format!("Failed to write {:?}", output))?;
    Ok(())
}

fn receptors(input: &Path, output: Option<&Path>, options: &ParseOptions) -> Result<()> {
    let (document, _) = Document::parse_from_file_with(input, options)
        .with_context(|| format!("Failed to parse {:?}", input))?;

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    // Header: coordinates, then the attribute table columns
    writeln!(out, "x\ty\t{}", RECEPTOR_ATTRIBUTE_FIELDS.join("\t"))?;
    let mut rows = 0;
    for receptor in document.receptors() {
        let attributes = receptor.get_attributes_dict();
        let (x, y) = receptor
            .point
            .as_ref()
            .map(|p| (p.x.to_string(), p.y.to_string()))
            .unwrap_or_default();
        let values: Vec<String> = RECEPTOR_ATTRIBUTE_FIELDS
            .iter()
            .map(|field| attributes.get(*field).map(ToString::to_string).unwrap_or_default())
            .collect();
        writeln!(out, "{}\t{}\t{}", x, y, values.join("\t"))?;
        rows += 1;
    }
    out.flush()?;
    info!("Written {} receptors", rows);
    Ok(())
}
