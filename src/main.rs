use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use wiki_dump_csv::{convert_file, ConvertOptions, OutputPaths};

/// Convert MediaWiki XML history dumps to one row per revision.
///
/// For every `NAME.xml` (optionally `.zst` or `.bz2` compressed) this writes `NAME.csv` with all
/// revisions and `error_NAME.csv` with the rows that failed validation.
#[derive(Debug, clap::Parser)]
#[command(version)]
struct CommandLine {
    /// Dump files to convert, processed one after another
    #[arg(required = true)]
    input_files: Vec<PathBuf>,

    /// Column delimiter
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// Directory for the output files, defaults to the directory of each input file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// More output, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args: CommandLine = CommandLine::parse();

    let log_level = match (args.quiet, args.verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.delimiter == wiki_dump_csv::row::FIELD_MARKER {
        anyhow::bail!(
            "the delimiter must differ from the field marker `{}`",
            wiki_dump_csv::row::FIELD_MARKER
        );
    }

    let options = ConvertOptions {
        delimiter: args.delimiter,
    };
    tracing::info!(message = "Dump files to process", files = ?args.input_files);

    let mut failed = 0;
    for input in &args.input_files {
        let tick = Instant::now();
        tracing::info!(message = "Starting to parse file", file = %input.display());

        let result = convert_file(input, args.output_dir.as_deref(), &options)
            .with_context(|| format!("failed to convert {}", input.display()));

        match result {
            Ok(stats) => {
                let minutes = tick.elapsed().as_secs_f64() / 60.0;
                let paths = OutputPaths::for_input(input, args.output_dir.as_deref());
                tracing::info!(
                    message = "Data dump parsed successfully",
                    file = %input.display(),
                    minutes,
                    pages = stats.pages,
                    revisions = stats.revisions,
                    flagged = stats.flagged,
                    output = %paths.main.display(),
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!(message = "Conversion failed", error = ?e);
            }
        }
    }

    if failed > 0 {
        tracing::error!(
            message = "Some dump files could not be converted",
            failed,
            total = args.input_files.len()
        );
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
