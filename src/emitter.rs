use std::io::{self, Write};

use crate::row::{Classification, Field, RevisionRow, FIELD_MARKER};

/// Trailing columns of the diagnostic sink.
pub const FLAG_COLUMNS: [&str; 2] = ["nAn", "empty"];

/// Writes rows as delimited text. The header is written on construction.
///
/// Values are written as they are, without quoting. Free-text fields are surrounded by
/// [`FIELD_MARKER`] instead, see [`Field::is_marked`].
#[derive(Debug)]
pub struct RowEmitter<W: Write> {
    writer: W,
    delimiter: char,
    rows_written: u64,
}

impl<W: Write> RowEmitter<W> {
    /// Sink receiving every row.
    pub fn main(writer: W, delimiter: char) -> io::Result<Self> {
        Self::with_header(writer, delimiter, &[])
    }

    /// Sink receiving flagged rows, followed by their two flag columns.
    pub fn diagnostics(writer: W, delimiter: char) -> io::Result<Self> {
        Self::with_header(writer, delimiter, &FLAG_COLUMNS)
    }

    fn with_header(writer: W, delimiter: char, extra_columns: &[&'static str]) -> io::Result<Self> {
        let mut emitter = Self {
            writer,
            delimiter,
            rows_written: 0,
        };

        let columns = Field::ALL
            .iter()
            .map(|field| field.name())
            .chain(extra_columns.iter().copied());
        emitter.write_line(columns)?;

        Ok(emitter)
    }

    fn write_line<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) -> io::Result<()> {
        let mut delimiter = [0; 4];
        let delimiter = self.delimiter.encode_utf8(&mut delimiter).as_bytes();

        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.writer.write_all(delimiter)?;
            }
            self.writer.write_all(value.as_bytes())?;
        }
        self.writer.write_all(b"\n")
    }

    fn write_fields(&mut self, row: &RevisionRow) -> io::Result<()> {
        let mut marker = [0; 4];
        let marker = FIELD_MARKER.encode_utf8(&mut marker).as_bytes();
        let mut delimiter = [0; 4];
        let delimiter = self.delimiter.encode_utf8(&mut delimiter).as_bytes();

        for (i, field) in Field::ALL.into_iter().enumerate() {
            if i > 0 {
                self.writer.write_all(delimiter)?;
            }

            let marked = row.is_marked(field);
            if marked {
                self.writer.write_all(marker)?;
            }
            self.writer.write_all(row.value(field).as_bytes())?;
            if marked {
                self.writer.write_all(marker)?;
            }
        }
        Ok(())
    }

    pub fn write_row(&mut self, row: &RevisionRow) -> io::Result<()> {
        self.write_fields(row)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_flagged_row(
        &mut self,
        row: &RevisionRow,
        classification: &Classification,
    ) -> io::Result<()> {
        self.write_fields(row)?;
        for flag in classification.flags() {
            write!(self.writer, "{}{}", self.delimiter, flag)?;
        }
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Data rows written so far, the header not included.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
