// SPDX-License-Identifier: MPL-2.0
//! # wiki_dump_csv
//!
//! A streaming converter from MediaWiki XML history dumps to flat, delimited text with one row per revision.
//!
//! ## Overview
//!
//! `wiki_dump_csv` reads a `pages-meta-history` dump (page → revision → contributor) in a single forward pass and writes
//! every revision as one row, with the fields of its page and its contributor copied onto that row. The dump is never
//! held in memory, so dumps of any size can be processed.
//!
//! **Key Features:**
//!
//! - **Single Pass**: Every event is looked at exactly once, memory usage is independent of the dump size.
//! - **Partial Failure Tolerance**: Rows with non-numeric ids or missing required values do not abort the run, they are
//!   copied to a separate diagnostic output together with the reason.
//! - **Compressed Input**: `.zst` and `.bz2` dumps are decompressed on the fly by the file helpers.
//!
//! ## Output Format
//!
//! The main output starts with the header
//!
//! ```text
//! page_id,page_title,page_ns,revision_id,timestamp,contributor_id,contributor_name,comment,minor,bytes
//! ```
//!
//! followed by one row per revision in document order. Title, comment and contributor name are free text and are
//! surrounded by `|` on both sides instead of being quoted. Values are written exactly as they appear in the dump.
//!
//! - `minor` is `1` if the revision contains a `<minor/>` element, `0` otherwise.
//! - `bytes` is the `bytes` attribute of `<text>`, or `-1` if the attribute is missing (deleted revision text).
//! - Anonymous edits (`<ip>` instead of `<username>`) get the IP address as `contributor_id` and `Anonymous` as name.
//!
//! The diagnostic output uses the same header with two more columns, `nAn` and `empty`. It receives a copy of every
//! row where a numeric field (`page_id`, `page_ns`, `revision_id`, `minor`, `bytes`) is not made of decimal digits or
//! a required field (`page_title`, `timestamp`, `contributor_id`, `contributor_name`) is empty, flagged with `0`/`1`.
//!
//! ## Getting Started
//!
//! ### Converting a Dump
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wiki_dump_csv::{convert_file, ConvertOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // writes eswiki-history.csv and error_eswiki-history.csv next to the input
//!     let stats = convert_file(Path::new("eswiki-history.xml.bz2"), None, &ConvertOptions::default())?;
//!     println!("{} revisions, {} flagged", stats.revisions, stats.flagged);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Custom Readers and Writers
//!
//! [`convert`] works on any `BufRead` input and any two `Write` outputs:
//!
//! ```rust
//! use wiki_dump_csv::{convert, ConvertOptions};
//!
//! let xml = "<mediawiki><page><title>Main</title><ns>0</ns><id>1</id>\
//!            <revision><id>10</id><timestamp>2001-01-15T13:15:00Z</timestamp>\
//!            <contributor><username>Ann</username><id>4</id></contributor>\
//!            <text bytes=\"12\">Hello world!</text></revision></page></mediawiki>";
//!
//! let mut rows = Vec::new();
//! let mut flagged = Vec::new();
//! let stats = convert(xml.as_bytes(), &mut rows, &mut flagged, &ConvertOptions::default()).unwrap();
//!
//! assert_eq!(stats.revisions, 1);
//! assert_eq!(
//!     String::from_utf8(rows).unwrap().lines().nth(1),
//!     Some("1,|Main|,0,10,2001-01-15T13:15:00Z,4,|Ann|,||,0,12")
//! );
//! ```
//!
//! ### Driving the State Machine Directly
//!
//! The parsing state machine ([`dump_parser::StreamDriver`]) does no I/O. It can be fed with events from any XML
//! tokenizer and returns a [`row::RevisionRow`] whenever a revision closes:
//!
//! ```rust
//! use wiki_dump_csv::dump_parser::{StreamDriver, XmlEvent};
//!
//! let mut driver = StreamDriver::new();
//! driver.handle(XmlEvent::Open { name: "page", attributes: Vec::new() });
//! driver.handle(XmlEvent::Open { name: "revision", attributes: Vec::new() });
//! let row = driver.handle(XmlEvent::Close { name: "revision" });
//! assert!(row.is_some());
//! ```
//!
//! ## Modules and API
//!
//! - [`dump_parser`]: element classification, the ancestor tracker, the stream driver and the quick-xml event reader.
//! - [`accumulator`]: the values of the row currently being assembled.
//! - [`row`]: the revision row and its validation.
//! - [`emitter`]: delimited text output.
//! - [`converter`]: the end-to-end conversion of one dump.
//! - [`dump_files`]: opening dumps and naming the output files.
//!
//! ## Logging and Error Handling
//!
//! - Uses the `tracing` crate. Skipped `<upload>` elements are reported as warnings, flagged rows at debug level.
//! - Malformed XML and I/O errors abort the conversion of that dump with a [`ConversionError`]. Data quality problems
//!   inside a row never do.
//!
//! ## Limitations
//!
//! - **No Schema Validation**: Unknown elements are skipped silently, only `<upload>` triggers a warning.
//! - **Revision Text**: The text of revisions is never interpreted, only the size attribute is used.

pub mod accumulator;
pub mod converter;
pub mod dump_files;
pub mod dump_parser;
pub mod emitter;
pub mod row;
#[cfg(test)]
mod test_support;

pub use converter::{convert, ConversionError, ConversionStats, ConvertOptions};
pub use dump_files::{convert_file, open_dump, OutputPaths};
