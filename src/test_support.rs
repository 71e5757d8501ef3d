use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};

use crate::converter::{convert, ConversionStats, ConvertOptions};

pub mod prelude {
    pub(crate) use super::proptest as proptest_support;
    pub(crate) use super::{
        capture_warnings, convert_str, dummy_revision, dump_to_compact_xml, dump_to_xml, expected_diagnostic_line, expected_main_line,
        Converted, TestContributor, TestPage, TestRevision,
    };
    pub(crate) use proptest::prelude::*;
}

#[derive(Debug, Clone)]
pub enum TestContributor {
    Registered { id: String, username: String },
    Anonymous { ip: String },
}

#[derive(Debug, Clone)]
pub struct TestRevision {
    pub id: String,
    pub timestamp: String,
    pub contributor: TestContributor,
    pub minor: bool,
    pub comment: Option<String>,
    // `None` writes <text> without a size attribute
    pub bytes: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TestPage {
    pub id: String,
    pub title: String,
    pub ns: String,
    pub revisions: Vec<TestRevision>,
}

pub fn dummy_revision() -> TestRevision {
    TestRevision {
        id: "1".into(),
        timestamp: "2001-01-15T13:15:00Z".into(),
        contributor: TestContributor::Registered {
            id: "1".into(),
            username: "Dummy".into(),
        },
        minor: false,
        comment: None,
        bytes: Some("0".into()),
        text: String::new(),
    }
}

fn write_leaf(writer: &mut quick_xml::Writer<Cursor<&mut Vec<u8>>>, name: &str, text: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .unwrap();
    // always write the text, even if empty, or the indenting writer puts whitespace before the end tag
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .unwrap();
    writer.write_event(Event::End(BytesEnd::new(name))).unwrap();
}

/// Renders pages as an indented dump, including the parts the converter has to skip
/// (siteinfo, sha1, model, format, redirect).
pub fn dump_to_xml(pages: &[TestPage]) -> String {
    render_dump(pages, Some(2))
}

/// Same as [`dump_to_xml`], without any whitespace between elements.
pub fn dump_to_compact_xml(pages: &[TestPage]) -> String {
    render_dump(pages, None)
}

fn render_dump(pages: &[TestPage], indent: Option<usize>) -> String {
    let mut xml = Vec::new();
    let mut writer = match indent {
        Some(indent) => quick_xml::Writer::new_with_indent(Cursor::new(&mut xml), b' ', indent),
        None => quick_xml::Writer::new(Cursor::new(&mut xml)),
    };

    writer
        .write_event(Event::Start(
            BytesStart::new("mediawiki").with_attributes([("version", "0.11"), ("xml:lang", "en")]),
        ))
        .unwrap();

    writer
        .write_event(Event::Start(BytesStart::new("siteinfo")))
        .unwrap();
    write_leaf(&mut writer, "sitename", "Wikipedia");
    write_leaf(&mut writer, "dbname", "enwiki");
    writer
        .write_event(Event::Start(BytesStart::new("namespaces")))
        .unwrap();
    writer
        .write_event(Event::Empty(
            BytesStart::new("namespace").with_attributes([("key", "0"), ("case", "first-letter")]),
        ))
        .unwrap();
    writer
        .write_event(Event::Start(
            BytesStart::new("namespace").with_attributes([("key", "1"), ("case", "first-letter")]),
        ))
        .unwrap();
    writer
        .write_event(Event::Text(BytesText::new("Talk")))
        .unwrap();
    writer
        .write_event(Event::End(BytesEnd::new("namespace")))
        .unwrap();
    writer
        .write_event(Event::End(BytesEnd::new("namespaces")))
        .unwrap();
    writer
        .write_event(Event::End(BytesEnd::new("siteinfo")))
        .unwrap();

    for page in pages {
        writer
            .write_event(Event::Start(BytesStart::new("page")))
            .unwrap();
        write_leaf(&mut writer, "title", &page.title);
        write_leaf(&mut writer, "ns", &page.ns);
        write_leaf(&mut writer, "id", &page.id);
        writer
            .write_event(Event::Empty(
                BytesStart::new("redirect").with_attributes([("title", "Elsewhere")]),
            ))
            .unwrap();

        for revision in &page.revisions {
            writer
                .write_event(Event::Start(BytesStart::new("revision")))
                .unwrap();
            write_leaf(&mut writer, "id", &revision.id);
            write_leaf(&mut writer, "parentid", "1234");
            write_leaf(&mut writer, "timestamp", &revision.timestamp);

            writer
                .write_event(Event::Start(BytesStart::new("contributor")))
                .unwrap();
            match &revision.contributor {
                TestContributor::Registered { id, username } => {
                    write_leaf(&mut writer, "username", username);
                    write_leaf(&mut writer, "id", id);
                }
                TestContributor::Anonymous { ip } => {
                    write_leaf(&mut writer, "ip", ip);
                }
            }
            writer
                .write_event(Event::End(BytesEnd::new("contributor")))
                .unwrap();

            if revision.minor {
                writer
                    .write_event(Event::Empty(BytesStart::new("minor")))
                    .unwrap();
            }
            if let Some(comment) = &revision.comment {
                write_leaf(&mut writer, "comment", comment);
            }
            write_leaf(&mut writer, "model", "wikitext");
            write_leaf(&mut writer, "format", "text/x-wiki");

            let mut text = BytesStart::new("text").with_attributes([("xml:space", "preserve")]);
            if let Some(bytes) = &revision.bytes {
                text.push_attribute(("bytes", bytes.as_str()));
            }
            writer.write_event(Event::Start(text)).unwrap();
            writer
                .write_event(Event::Text(BytesText::new(&revision.text)))
                .unwrap();
            writer
                .write_event(Event::End(BytesEnd::new("text")))
                .unwrap();
            write_leaf(&mut writer, "sha1", "phoiac9h4m842xq45sp7s6u21eteeq1");

            writer
                .write_event(Event::End(BytesEnd::new("revision")))
                .unwrap();
        }

        writer
            .write_event(Event::End(BytesEnd::new("page")))
            .unwrap();
    }

    writer
        .write_event(Event::End(BytesEnd::new("mediawiki")))
        .unwrap();

    String::from_utf8(xml).unwrap()
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn contributor_columns(revision: &TestRevision) -> (String, String) {
    match &revision.contributor {
        TestContributor::Registered { id, username } => (id.clone(), format!("|{username}|")),
        TestContributor::Anonymous { ip } => (ip.clone(), "Anonymous".to_string()),
    }
}

pub fn expected_main_line(page: &TestPage, revision: &TestRevision) -> String {
    let (contributor_id, contributor_name) = contributor_columns(revision);
    format!(
        "{},|{}|,{},{},{},{},{},|{}|,{},{}",
        page.id,
        page.title,
        page.ns,
        revision.id,
        revision.timestamp,
        contributor_id,
        contributor_name,
        revision.comment.as_deref().unwrap_or(""),
        if revision.minor { "1" } else { "0" },
        revision.bytes.as_deref().unwrap_or("-1"),
    )
}

/// The line expected in the diagnostic sink, `None` if the revision is valid.
pub fn expected_diagnostic_line(page: &TestPage, revision: &TestRevision) -> Option<String> {
    let bytes = revision.bytes.as_deref().unwrap_or("-1");
    let nan = [&page.id, &page.ns, &revision.id]
        .into_iter()
        .any(|value| !is_number(value))
        || !is_number(bytes);

    let (contributor_id, contributor_name) = contributor_columns(revision);
    let empty = page.title.is_empty()
        || revision.timestamp.is_empty()
        || contributor_id.is_empty()
        || contributor_name == "||";

    (nan || empty).then(|| {
        format!(
            "{},{},{}",
            expected_main_line(page, revision),
            u8::from(nan),
            u8::from(empty)
        )
    })
}

#[derive(Debug)]
pub struct Converted {
    pub main: String,
    pub diagnostics: String,
    pub stats: ConversionStats,
}

impl Converted {
    /// Data rows of the main sink, header skipped.
    pub fn main_rows(&self) -> Vec<&str> {
        self.main.lines().skip(1).collect()
    }

    /// Data rows of the diagnostic sink, header skipped.
    pub fn diagnostic_rows(&self) -> Vec<&str> {
        self.diagnostics.lines().skip(1).collect()
    }
}

pub fn convert_str(xml: &str) -> Converted {
    let mut main = Vec::new();
    let mut diagnostics = Vec::new();
    let stats = convert(
        xml.as_bytes(),
        &mut main,
        &mut diagnostics,
        &ConvertOptions::default(),
    )
    .unwrap();

    Converted {
        main: String::from_utf8(main).unwrap(),
        diagnostics: String::from_utf8(diagnostics).unwrap(),
        stats,
    }
}

// collects the formatted output of a test subscriber
#[derive(Debug, Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber that records every warning and error, returns its result
/// together with the recorded log lines.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    (result, output)
}

pub mod proptest {
    use super::{TestContributor, TestPage, TestRevision};
    use proptest::prelude::*;

    // mostly valid digits, sometimes garbage
    pub fn numeric() -> impl Strategy<Value = String> {
        prop_oneof![
            8 => "[0-9]{1,7}",
            1 => "[0-9a-z-]{0,4}",
        ]
    }

    // free text including delimiter, marker and characters that need escaping;
    // leading and trailing spaces are kept
    pub fn free_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ,.;:!?<>&'\"|_()-]{0,24}"
    }

    pub fn timestamp() -> impl Strategy<Value = String> {
        prop_oneof![
            10 => "20[0-2][0-9]-[01][0-9]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9]Z",
            1 => Just(String::new()),
        ]
    }

    pub fn contributor() -> impl Strategy<Value = TestContributor> {
        prop_oneof![
            3 => (prop_oneof![8 => "[0-9]{1,7}", 1 => Just(String::new())], free_text())
                .prop_map(|(id, username)| TestContributor::Registered { id, username }),
            1 => "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}"
                .prop_map(|ip| TestContributor::Anonymous { ip }),
        ]
    }

    prop_compose! {
        pub fn revision()
                (id in numeric(), timestamp in timestamp(), contributor in contributor(),
                 minor in proptest::bool::weighted(0.2),
                 comment in proptest::option::weighted(0.6, free_text()),
                 bytes in proptest::option::weighted(0.9, numeric()),
                 text in free_text())
                -> TestRevision {
            TestRevision { id, timestamp, contributor, minor, comment, bytes, text }
        }
    }

    prop_compose! {
        pub fn page(max_revisions: usize)
                (id in numeric(), title in free_text(), ns in "[0-9]{1,3}",
                 revisions in proptest::collection::vec(revision(), 0..=max_revisions))
                -> TestPage {
            TestPage { id, title, ns, revisions }
        }
    }

    pub fn pages(max_pages: usize, max_revisions: usize) -> impl Strategy<Value = Vec<TestPage>> {
        proptest::collection::vec(page(max_revisions), 0..=max_pages)
    }
}
