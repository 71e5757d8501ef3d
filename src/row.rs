use std::fmt::Debug;

use compact_str::CompactString;

/// Character written on both sides of free-text fields (title, comment, contributor name).
pub const FIELD_MARKER: char = '|';

/// Name written for contributors that are only known by their IP address.
pub const ANONYMOUS: &str = "Anonymous";

// output columns, in the order they are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PageId,
    PageTitle,
    PageNs,
    RevisionId,
    Timestamp,
    ContributorId,
    ContributorName,
    Comment,
    Minor,
    Bytes,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::PageId,
        Field::PageTitle,
        Field::PageNs,
        Field::RevisionId,
        Field::Timestamp,
        Field::ContributorId,
        Field::ContributorName,
        Field::Comment,
        Field::Minor,
        Field::Bytes,
    ];

    /// Column name used in the header row.
    pub fn name(self) -> &'static str {
        match self {
            Field::PageId => "page_id",
            Field::PageTitle => "page_title",
            Field::PageNs => "page_ns",
            Field::RevisionId => "revision_id",
            Field::Timestamp => "timestamp",
            Field::ContributorId => "contributor_id",
            Field::ContributorName => "contributor_name",
            Field::Comment => "comment",
            Field::Minor => "minor",
            Field::Bytes => "bytes",
        }
    }

    /// Free-text fields are surrounded by [`FIELD_MARKER`] when written.
    pub fn is_marked(self) -> bool {
        matches!(
            self,
            Field::PageTitle | Field::ContributorName | Field::Comment
        )
    }
}

/// Fields that must consist of decimal digits only.
pub const NUMERIC_FIELDS: &[Field] = &[
    Field::PageId,
    Field::PageNs,
    Field::RevisionId,
    Field::Minor,
    Field::Bytes,
];

/// Fields that must not be empty. The comment is allowed to be empty.
pub const REQUIRED_FIELDS: &[Field] = &[
    Field::PageTitle,
    Field::Timestamp,
    Field::ContributorId,
    Field::ContributorName,
];

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ContributorName {
    Registered(CompactString),
    // contributor given by <ip>
    Anonymous,
}

impl Default for ContributorName {
    fn default() -> Self {
        ContributorName::Registered(CompactString::default())
    }
}

impl Debug for ContributorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContributorName::Registered(name) => write!(f, "{:?}", name),
            ContributorName::Anonymous => write!(f, "Anonymous"),
        }
    }
}

/// One output record, corresponding to exactly one `<revision>` element.
///
/// All values are kept exactly as they appeared in the dump. Nothing is parsed or
/// coerced here; see [`classify`] for the data quality checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionRow {
    pub page_id: CompactString,
    pub page_title: CompactString,
    pub page_ns: CompactString,
    pub revision_id: CompactString,
    pub timestamp: CompactString,
    pub contributor_id: CompactString,
    pub contributor_name: ContributorName,
    pub comment: CompactString,
    pub minor: bool,
    /// Value of the `bytes` attribute of `<text>`, `-1` if it was absent.
    pub bytes: CompactString,
}

impl RevisionRow {
    /// Raw value of a field, without markers.
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::PageId => self.page_id.as_str(),
            Field::PageTitle => self.page_title.as_str(),
            Field::PageNs => self.page_ns.as_str(),
            Field::RevisionId => self.revision_id.as_str(),
            Field::Timestamp => self.timestamp.as_str(),
            Field::ContributorId => self.contributor_id.as_str(),
            Field::ContributorName => match &self.contributor_name {
                ContributorName::Registered(name) => name.as_str(),
                ContributorName::Anonymous => ANONYMOUS,
            },
            Field::Comment => self.comment.as_str(),
            Field::Minor => {
                if self.minor {
                    "1"
                } else {
                    "0"
                }
            }
            Field::Bytes => self.bytes.as_str(),
        }
    }

    /// Whether the field gets surrounded by [`FIELD_MARKER`] on output.
    ///
    /// The anonymous contributor name is a fixed word and not free text, so it stays bare.
    pub fn is_marked(&self, field: Field) -> bool {
        field.is_marked()
            && !(field == Field::ContributorName
                && self.contributor_name == ContributorName::Anonymous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    /// A numeric field contains something other than decimal digits.
    pub nan: bool,
    /// A required field is empty.
    pub empty: bool,
}

impl Classification {
    pub fn is_flagged(&self) -> bool {
        self.nan || self.empty
    }

    /// The two trailing columns of the diagnostic sink.
    pub fn flags(&self) -> [&'static str; 2] {
        [flag(self.nan), flag(self.empty)]
    }
}

fn flag(set: bool) -> &'static str {
    if set {
        "1"
    } else {
        "0"
    }
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

pub fn classify(row: &RevisionRow) -> Classification {
    Classification {
        nan: NUMERIC_FIELDS
            .iter()
            .any(|&field| !is_number(row.value(field))),
        empty: REQUIRED_FIELDS
            .iter()
            .any(|&field| row.value(field).is_empty()),
    }
}
