use compact_str::CompactString;

use crate::{
    dump_parser::{Ancestor, Tag},
    row::{ContributorName, RevisionRow},
};

/// Value written for `bytes` when `<text>` carries no size attribute (deleted or hidden body).
pub const MISSING_BYTES: &str = "-1";

// the field a leaf's text is written into, depending on the enclosing element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    PageTitle,
    PageId,
    PageNs,
    RevisionId,
    Timestamp,
    Comment,
    ContributorId,
    ContributorName,
    // <ip> fills the contributor id and marks the contributor as anonymous
    IpAddress,
}

impl Slot {
    pub fn select(context: Option<Ancestor>, tag: &Tag) -> Option<Slot> {
        use Ancestor::*;

        match (context?, tag) {
            (Page, Tag::Title) => Some(Slot::PageTitle),
            (Page, Tag::Id) => Some(Slot::PageId),
            (Page, Tag::Ns) => Some(Slot::PageNs),
            (Revision, Tag::Id) => Some(Slot::RevisionId),
            (Revision, Tag::Timestamp) => Some(Slot::Timestamp),
            (Revision, Tag::Comment) => Some(Slot::Comment),
            (Contributor, Tag::Id) => Some(Slot::ContributorId),
            (Contributor, Tag::Username) => Some(Slot::ContributorName),
            (Contributor, Tag::Ip) => Some(Slot::IpAddress),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PageScope {
    id: CompactString,
    title: CompactString,
    ns: CompactString,
}

#[derive(Debug, Default)]
struct RevisionScope {
    id: CompactString,
    timestamp: CompactString,
    contributor_id: CompactString,
    contributor_name: ContributorName,
    comment: CompactString,
    minor: bool,
    bytes: Option<CompactString>,
}

/// Holds the values of the row currently being assembled.
///
/// Page-scoped values survive until the next page replaces them, revision-scoped
/// values are cleared whenever a row is taken.
#[derive(Debug, Default)]
pub struct FieldAccumulator {
    page: PageScope,
    revision: RevisionScope,
}

impl FieldAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a leaf element opens. Clears the field the leaf is going to fill, so the
    /// value of a leaf is exactly its own text, however many chunks it arrives in.
    pub fn begin_leaf(&mut self, context: Option<Ancestor>, tag: &Tag) {
        let Some(slot) = Slot::select(context, tag) else {
            return;
        };

        match slot {
            Slot::PageTitle => self.page.title.clear(),
            Slot::PageId => self.page.id.clear(),
            Slot::PageNs => self.page.ns.clear(),
            Slot::RevisionId => self.revision.id.clear(),
            Slot::Timestamp => self.revision.timestamp.clear(),
            Slot::Comment => self.revision.comment.clear(),
            Slot::ContributorId => self.revision.contributor_id.clear(),
            // an empty <ip/> still marks the edit as anonymous
            Slot::IpAddress => {
                self.revision.contributor_id.clear();
                self.revision.contributor_name = ContributorName::Anonymous;
            }
            Slot::ContributorName => {
                self.revision.contributor_name = ContributorName::default();
            }
        }
    }

    /// Writes a chunk of leaf text into the field selected by `(context, tag)`.
    /// Combinations without a field are ignored.
    pub fn on_text(&mut self, context: Option<Ancestor>, tag: &Tag, data: &str) {
        let Some(slot) = Slot::select(context, tag) else {
            return;
        };

        match slot {
            Slot::PageTitle => self.page.title.push_str(data),
            Slot::PageId => self.page.id.push_str(data),
            Slot::PageNs => self.page.ns.push_str(data),
            Slot::RevisionId => self.revision.id.push_str(data),
            Slot::Timestamp => self.revision.timestamp.push_str(data),
            Slot::Comment => self.revision.comment.push_str(data),
            Slot::ContributorId | Slot::IpAddress => self.revision.contributor_id.push_str(data),
            Slot::ContributorName => {
                if let ContributorName::Registered(name) = &mut self.revision.contributor_name {
                    name.push_str(data);
                } else {
                    self.revision.contributor_name =
                        ContributorName::Registered(CompactString::from(data));
                }
            }
        }
    }

    pub fn set_minor(&mut self) {
        self.revision.minor = true;
    }

    /// Records the size attribute of `<text>`; `None` stands for an absent attribute.
    pub fn set_bytes(&mut self, bytes: Option<&str>) {
        self.revision.bytes = Some(CompactString::from(bytes.unwrap_or(MISSING_BYTES)));
    }

    pub fn reset_revision_scope(&mut self) {
        self.revision = RevisionScope::default();
    }

    /// Assembles the row from the current page and revision values and resets the revision scope.
    pub fn take_row(&mut self) -> RevisionRow {
        let revision = std::mem::take(&mut self.revision);

        RevisionRow {
            page_id: self.page.id.clone(),
            page_title: self.page.title.clone(),
            page_ns: self.page.ns.clone(),
            revision_id: revision.id,
            timestamp: revision.timestamp,
            contributor_id: revision.contributor_id,
            contributor_name: revision.contributor_name,
            comment: revision.comment,
            minor: revision.minor,
            // stays empty if the revision had no <text> element at all
            bytes: revision.bytes.unwrap_or_default(),
        }
    }
}
