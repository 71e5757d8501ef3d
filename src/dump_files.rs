use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter},
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::converter::{convert, ConversionError, ConversionStats, ConvertOptions};

const DIAGNOSTICS_PREFIX: &str = "error_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Zstd,
    Bzip2,
}

impl Compression {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("zst") => Compression::Zstd,
            Some("bz2") => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// Opens a dump for reading. `.zst` and `.bz2` files are decompressed on the fly.
pub fn open_dump(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let reader: Box<dyn BufRead> = match Compression::from_path(path) {
        Compression::None => Box::new(reader),
        Compression::Zstd => Box::new(BufReader::new(zstd::stream::Decoder::with_buffer(
            reader,
        )?)),
        // dumps are usually multistream archives
        Compression::Bzip2 => Box::new(BufReader::new(bzip2::bufread::MultiBzDecoder::new(
            reader,
        ))),
    };

    Ok(reader)
}

/// Where the two sinks of a conversion are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub main: PathBuf,
    pub diagnostics: PathBuf,
}

impl OutputPaths {
    /// `pages.xml` becomes `pages.csv` and `error_pages.csv`, placed next to the input unless
    /// `output_dir` is given. A compression suffix is dropped together with `.xml`.
    pub fn for_input(input: &Path, output_dir: Option<&Path>) -> Self {
        let mut stem = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        for suffix in [".zst", ".bz2", ".xml"] {
            if let Some(stripped) = stem.strip_suffix(suffix) {
                stem = stripped.to_string();
            }
        }

        let directory = match output_dir {
            Some(directory) => directory.to_path_buf(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        Self {
            main: directory.join(format!("{stem}.csv")),
            diagnostics: directory.join(format!("{DIAGNOSTICS_PREFIX}{stem}.csv")),
        }
    }
}

/// Converts the dump at `input`, writing both sinks as described by [`OutputPaths::for_input`].
#[instrument(skip(input, options), fields(input = %input.display()))]
pub fn convert_file(
    input: &Path,
    output_dir: Option<&Path>,
    options: &ConvertOptions,
) -> Result<ConversionStats, ConversionError> {
    let paths = OutputPaths::for_input(input, output_dir);
    tracing::debug!(main = %paths.main.display(), diagnostics = %paths.diagnostics.display());

    let reader = open_dump(input)?;
    let main = BufWriter::new(File::create(&paths.main)?);
    let diagnostics = BufWriter::new(File::create(&paths.diagnostics)?);

    convert(reader, main, diagnostics, options)
}
