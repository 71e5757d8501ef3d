use std::io::{self, BufRead, Write};

use tracing::instrument;

use crate::{
    dump_parser::{DumpReader, ParsingError, StreamDriver},
    emitter::RowEmitter,
    row::{classify, Field},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Separator between columns, in both sinks.
    pub delimiter: char,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Counters collected during one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionStats {
    pub pages: u64,
    /// Rows written to the main sink.
    pub revisions: u64,
    /// Rows also written to the diagnostic sink.
    pub flagged: u64,
    pub nan: u64,
    pub empty: u64,
    /// Skipped `<upload>` elements.
    pub uploads: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("failed to parse the dump")]
    Parsing(#[from] ParsingError),
    #[error("failed to write output")]
    Io(#[from] io::Error),
}

/// Converts one dump in a single forward pass.
///
/// Every revision is written to `main`. Revisions with a non-numeric value in a numeric field
/// or an empty required field are additionally written to `diagnostics`, together with their
/// flags. Both sinks are flushed before returning.
///
/// Any XML or I/O error aborts the conversion; whatever was written before stays in the sinks.
#[instrument(skip_all)]
pub fn convert<R: BufRead, M: Write, D: Write>(
    reader: R,
    main: M,
    diagnostics: D,
    options: &ConvertOptions,
) -> Result<ConversionStats, ConversionError> {
    let mut main = RowEmitter::main(main, options.delimiter)?;
    let mut diagnostics = RowEmitter::diagnostics(diagnostics, options.delimiter)?;
    let mut driver = StreamDriver::new();
    let mut stats = ConversionStats::default();

    let mut dump_reader = DumpReader::new(reader);
    let result = dump_reader.read_events(|event| {
        let Some(row) = driver.handle(event) else {
            return Ok(());
        };

        let classification = classify(&row);
        if classification.is_flagged() {
            tracing::debug!(
                message = "Flagged revision",
                nan = classification.nan,
                empty = classification.empty,
                page_id = row.value(Field::PageId),
                revision_id = row.value(Field::RevisionId),
            );
            diagnostics.write_flagged_row(&row, &classification)?;
            stats.nan += u64::from(classification.nan);
            stats.empty += u64::from(classification.empty);
        }
        main.write_row(&row)?;

        Ok::<_, ConversionError>(())
    });

    if let Err(e) = result {
        tracing::error!(
            message = "Aborting conversion",
            error = %e,
            position = dump_reader.position(),
            revisions = main.rows_written()
        );
        return Err(e);
    }

    stats.pages = driver.pages();
    stats.uploads = driver.uploads();
    stats.revisions = main.rows_written();
    stats.flagged = diagnostics.rows_written();

    main.finish()?;
    diagnostics.finish()?;

    if stats.uploads > 1 {
        tracing::warn!(
            message = "Skipped <upload> elements",
            count = stats.uploads
        );
    }

    Ok(stats)
}
