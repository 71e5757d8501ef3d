use std::{any::type_name_of_val, fmt::Debug, io::BufRead};

use compact_str::CompactString;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::{accumulator::FieldAccumulator, row::RevisionRow};

// list of all tags that are relevant for our use case
// i.e. the tags of which we need a value and their parent tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Page,        // <page>...tags are (title, ns, id, revision)</page>
    Revision,    // <revision>...tags are (id, timestamp, contributor, minor, comment, text)</revision>
    Contributor, // <contributor><username>blah</username><id>500</id></contributor> or <contributor><ip>..</ip></contributor>
    Title,       // <title>blah</title>
    Id,          // <id>500</id>, meaning depends on the enclosing element
    Ns,          // <ns>0</ns>
    Timestamp,   // <timestamp>2003-12-05T06:41:50Z</timestamp>
    Comment,     // <comment>blah</comment>
    Username,    // <username>blah</username>
    Ip,          // <ip>127.0.0.1</ip>
    Minor,       // <minor />
    Text,        // <text bytes="20" ...>blah</text> or <text deleted="deleted" />
    Upload,      // <upload>...</upload>, not modelled
    Other,       // any other tag
}

impl Tag {
    /// Leaf tags whose text can end up in a row, depending on the enclosing element.
    pub fn carries_value(&self) -> bool {
        matches!(
            self,
            Tag::Title
                | Tag::Id
                | Tag::Ns
                | Tag::Timestamp
                | Tag::Comment
                | Tag::Username
                | Tag::Ip
        )
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "page" => Tag::Page,
            "revision" => Tag::Revision,
            "contributor" => Tag::Contributor,
            "title" => Tag::Title,
            "id" => Tag::Id,
            "ns" => Tag::Ns,
            "timestamp" => Tag::Timestamp,
            "comment" => Tag::Comment,
            "username" => Tag::Username,
            "ip" => Tag::Ip,
            "minor" => Tag::Minor,
            "text" => Tag::Text,
            "upload" => Tag::Upload,
            _ => Tag::Other,
        }
    }
}

/// Structural elements that decide what a leaf tag such as `<id>` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestor {
    Page,
    Revision,
    Contributor,
}

impl Ancestor {
    fn from_tag(tag: &Tag) -> Option<Self> {
        match tag {
            Tag::Page => Some(Ancestor::Page),
            Tag::Revision => Some(Ancestor::Revision),
            Tag::Contributor => Some(Ancestor::Contributor),
            _ => None,
        }
    }
}

// `<upload>` can appear once per file revision, so only the first one per document is logged
#[derive(Debug, Default)]
struct UploadReporter {
    num_uploads: u64,
}

impl UploadReporter {
    fn register(&mut self) {
        self.num_uploads += 1;

        if self.num_uploads == 1 {
            tracing::warn!(
                message = "<upload> element is not handled, its contents are skipped. Further <upload> elements in this document will not be reported."
            );
        }
    }
}

/// Remembers the innermost open page, revision or contributor element.
#[derive(Debug, Default)]
pub struct AncestorTracker {
    current: Option<Ancestor>,
    upload_reporter: UploadReporter,
}

impl AncestorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Ancestor> {
        self.current
    }

    pub fn on_open(&mut self, tag: &Tag) {
        if let Some(ancestor) = Ancestor::from_tag(tag) {
            self.current = Some(ancestor);
        } else if *tag == Tag::Upload {
            self.upload_reporter.register();
        }
    }

    pub fn on_close(&mut self, tag: &Tag) {
        match tag {
            Tag::Page => self.current = None,
            Tag::Revision => self.current = Some(Ancestor::Page),
            Tag::Contributor => self.current = Some(Ancestor::Revision),
            _ => {}
        }
    }

    /// Number of `<upload>` elements seen so far.
    pub fn uploads(&self) -> u64 {
        self.upload_reporter.num_uploads
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: CompactString,
    pub value: CompactString,
}

/// One step of the element stream, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent<'a> {
    Open {
        name: &'a str,
        attributes: Vec<Attribute>,
    },
    Text(&'a str),
    Close {
        name: &'a str,
    },
}

/// The per-document state machine turning element events into revision rows.
///
/// It performs no I/O: every event is handed to [`StreamDriver::handle`], which returns the
/// finished row whenever a `</revision>` is seen. Events may come from [`DumpReader`] or
/// from any other tokenizer, as long as they arrive in document order.
#[derive(Debug, Default)]
pub struct StreamDriver {
    ancestors: AncestorTracker,
    fields: FieldAccumulator,
    // innermost open element, `None` right after any element closed
    leaf: Option<Tag>,
    pages: u64,
}

impl StreamDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: XmlEvent<'_>) -> Option<RevisionRow> {
        match event {
            XmlEvent::Open { name, attributes } => {
                self.open(Tag::from_name(name), &attributes);
                None
            }
            XmlEvent::Text(data) => {
                self.text(data);
                None
            }
            XmlEvent::Close { name } => self.close(Tag::from_name(name)),
        }
    }

    fn open(&mut self, tag: Tag, attributes: &[Attribute]) {
        match tag {
            Tag::Page => self.pages += 1,
            // anything read outside of a revision must not end up in its row
            Tag::Revision => self.fields.reset_revision_scope(),
            Tag::Minor => self.fields.set_minor(),
            Tag::Text => {
                let bytes = attributes
                    .iter()
                    .find(|attribute| attribute.key == "bytes")
                    .map(|attribute| attribute.value.as_str());
                self.fields.set_bytes(bytes);
            }
            _ => {}
        }

        self.ancestors.on_open(&tag);
        self.fields.begin_leaf(self.ancestors.current(), &tag);
        self.leaf = Some(tag);
    }

    fn text(&mut self, data: &str) {
        // text between elements (usually indentation) belongs to no field
        if let Some(tag) = &self.leaf {
            self.fields.on_text(self.ancestors.current(), tag, data);
        }
    }

    fn close(&mut self, tag: Tag) -> Option<RevisionRow> {
        let row = (tag == Tag::Revision).then(|| self.fields.take_row());

        self.ancestors.on_close(&tag);
        self.leaf = None;

        row
    }

    pub fn context(&self) -> Option<Ancestor> {
        self.ancestors.current()
    }

    /// Number of `<page>` elements opened so far.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn uploads(&self) -> u64 {
        self.ancestors.uploads()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    #[error("XML error")]
    XmlError(#[from] quick_xml::Error),
    #[error("non-UTF-8 content")]
    NonUtf8(#[from] std::str::Utf8Error),
    #[error("unexpected end of file")]
    Eof,
    #[error("no root element")]
    NoRootElement,
    #[error("content outside of the root element at byte {position}")]
    OutsideRootElement { position: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    Expected,
    Open,
    Closed,
}

/// Pulls events from a quick-xml reader and pushes them, translated to [`XmlEvent`]s,
/// into a handler.
///
/// Text is only unescaped and passed on inside elements that can carry a row value
/// (see [`Tag::carries_value`]); revision bodies are checked for UTF-8 and skipped.
pub struct DumpReader<R: BufRead> {
    xml_parser: quick_xml::Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    root: RootState,
    // whether the innermost open element is a leaf whose text may end up in a row
    text_wanted: bool,
}

impl<R: BufRead> Debug for DumpReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpReader")
            .field("xml_parser", &type_name_of_val(&self.xml_parser))
            // print buffer length and capacity
            .field("buf.len", &self.buf.len())
            .field("buf.capacity", &self.buf.capacity())
            .field("depth", &self.depth)
            .field("root", &self.root)
            .finish()
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(reader: R) -> Self {
        let mut xml_parser = quick_xml::Reader::from_reader(reader);
        // <minor/> and <text bytes=".." /> are reported as a start and an end event
        xml_parser.config_mut().expand_empty_elements = true;

        Self {
            xml_parser,
            // preallocate 1 MiB for the buffer
            buf: Vec::with_capacity(1024 * 1024),
            depth: 0,
            root: RootState::Expected,
            text_wanted: false,
        }
    }

    /// Position in the input, in bytes.
    pub fn position(&self) -> u64 {
        self.xml_parser.buffer_position()
    }

    fn open_event<'a>(e: &'a BytesStart<'a>) -> Result<XmlEvent<'a>, ParsingError> {
        let name = std::str::from_utf8(e.name().into_inner())?;

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            attributes.push(Attribute {
                key: CompactString::from(std::str::from_utf8(attr.key.as_ref())?),
                value: CompactString::from(attr.unescape_value()?.as_ref()),
            });
        }

        Ok(XmlEvent::Open { name, attributes })
    }

    fn close_event<'a>(e: &'a BytesEnd<'a>) -> Result<XmlEvent<'a>, ParsingError> {
        Ok(XmlEvent::Close {
            name: std::str::from_utf8(e.name().into_inner())?,
        })
    }

    /// Reads the whole input, calling `handler` for every element and for the text of
    /// value-carrying leaves.
    ///
    /// Stops at the first error, whether it comes from the XML or from the handler. Besides
    /// quick-xml's own checks, the input must consist of exactly one root element with
    /// nothing but whitespace, comments, declarations and processing instructions around it.
    pub fn read_events<E, F>(&mut self, mut handler: F) -> Result<(), E>
    where
        E: From<ParsingError>,
        F: FnMut(XmlEvent<'_>) -> Result<(), E>,
    {
        loop {
            self.buf.clear();
            let event = self
                .xml_parser
                .read_event_into(&mut self.buf)
                .map_err(ParsingError::from)?;

            match event {
                Event::Start(ref e) => {
                    if self.depth == 0 {
                        if self.root == RootState::Closed {
                            let position = self.xml_parser.buffer_position();
                            tracing::error!(message = "Second root element", position);
                            return Err(ParsingError::OutsideRootElement { position }.into());
                        }
                        self.root = RootState::Open;
                    }
                    self.depth += 1;

                    let event = Self::open_event(e)?;
                    if let XmlEvent::Open { name, .. } = &event {
                        self.text_wanted = Tag::from_name(name).carries_value();
                    }
                    handler(event)?;
                }
                Event::End(ref e) => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        self.root = RootState::Closed;
                    }
                    self.text_wanted = false;
                    handler(Self::close_event(e)?)?;
                }
                Event::Text(e) => {
                    if self.depth == 0 {
                        if e.iter().all(u8::is_ascii_whitespace) {
                            continue;
                        }
                        let position = self.xml_parser.buffer_position();
                        tracing::error!(message = "Text outside of the root element", position);
                        return Err(ParsingError::OutsideRootElement { position }.into());
                    }

                    if self.text_wanted {
                        let text = e.unescape().map_err(ParsingError::from)?;
                        handler(XmlEvent::Text(&text))?;
                    } else {
                        std::str::from_utf8(&e).map_err(ParsingError::from)?;
                    }
                }
                Event::CData(e) => {
                    if self.depth == 0 {
                        let position = self.xml_parser.buffer_position();
                        tracing::error!(message = "CDATA outside of the root element", position);
                        return Err(ParsingError::OutsideRootElement { position }.into());
                    }

                    let data = e.into_inner();
                    let text = std::str::from_utf8(&data).map_err(ParsingError::from)?;
                    if self.text_wanted {
                        handler(XmlEvent::Text(text))?;
                    }
                }
                Event::Eof => {
                    if self.depth > 0 {
                        tracing::error!(
                            message = "Input ended inside an open element",
                            depth = self.depth,
                            position = self.xml_parser.buffer_position()
                        );
                        return Err(ParsingError::Eof.into());
                    }
                    if self.root == RootState::Expected {
                        tracing::error!(message = "Input contains no root element");
                        return Err(ParsingError::NoRootElement.into());
                    }
                    return Ok(());
                }
                // declarations, comments, processing instructions and doctype
                _ => {}
            }
        }
    }
}
