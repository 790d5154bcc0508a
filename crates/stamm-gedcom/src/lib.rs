//! GEDCOM-style codec for Stamm.
//!
//! Converts a line-oriented genealogy file into typed records, and
//! normalises the free-text dates and places those records carry. Pure
//! synchronous; no I/O, HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use stamm_gedcom::parse;
//!
//! let input = b"0 HEAD\n0 @I1@ INDI\n1 NAME Ada /Byron/\n0 TRLR\n";
//! let doc = parse(input).unwrap();
//! for person in doc.individuals() {
//!   println!("{} {:?}", person.xref, person.given_name());
//! }
//! ```

pub mod date;
pub mod error;
mod parse;
pub mod place;

pub use date::normalize_date;
pub use error::{Error, Result};
pub use place::normalize_place;
use stamm_core::{event::EventKind, person::Sex};

// ─── Raw tree ────────────────────────────────────────────────────────────────

/// One source line and the lines nested under it. `CONC`/`CONT` lines are
/// already folded into `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  /// 1-based source line.
  pub line:     usize,
  pub level:    u32,
  pub xref:     Option<String>,
  pub tag:      String,
  pub value:    String,
  pub children: Vec<Node>,
}

impl Node {
  /// Value of the first child with `tag`, trimmed. Empty values count as
  /// absent.
  pub fn child_value(&self, tag: &str) -> Option<&str> {
    self
      .children
      .iter()
      .find(|c| c.tag == tag)
      .map(|c| c.value.trim())
      .filter(|v| !v.is_empty())
  }
}

// ─── Typed records ───────────────────────────────────────────────────────────

/// A level-0 record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  Individual(Individual),
  Family(FamilyRecord),
  /// HEAD, TRLR, SOUR, NOTE and anything else, kept verbatim.
  Other(Node),
}

/// An `INDI` record: its sub-records in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
  pub xref:  String,
  pub line:  usize,
  pub items: Vec<IndividualItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndividualItem {
  Name(NameRecord),
  Sex(Sex),
  Event(EventRecord),
  /// `FAMS`: the person is a spouse in this family.
  SpouseIn(String),
  /// `FAMC`: the person is a child in this family.
  ChildIn { family_xref: String, pedigree: Option<String> },
  Unknown(Node),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameRecord {
  /// The `NAME` line value, e.g. `John /Smith/`.
  pub value:     String,
  pub given:     Option<String>,
  pub surname:   Option<String>,
  /// `TYPE` sub-line, lowercased (`birth`, `maiden`, `married`, ...).
  pub name_type: Option<String>,
}

impl NameRecord {
  fn is_birth_name(&self) -> bool {
    matches!(self.name_type.as_deref(), Some("maiden" | "birth"))
  }
}

/// An event sub-record on an individual or a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
  pub line:        usize,
  pub tag:         String,
  pub kind:        EventKind,
  pub date:        Option<String>,
  pub place:       Option<String>,
  pub description: Option<String>,
  /// Sub-lines other than DATE, PLAC and TYPE.
  pub other:       Vec<Node>,
}

/// A `FAM` record: its sub-records in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRecord {
  pub xref:  String,
  pub line:  usize,
  pub items: Vec<FamilyItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyItem {
  Husband(String),
  Wife(String),
  Child(String),
  Event(EventRecord),
  Unknown(Node),
}

// ─── Accessors ───────────────────────────────────────────────────────────────

impl Individual {
  fn names(&self) -> impl Iterator<Item = &NameRecord> {
    self.items.iter().filter_map(|i| match i {
      IndividualItem::Name(n) => Some(n),
      _ => None,
    })
  }

  /// The first name that is not explicitly a birth/maiden name, falling back
  /// to the first name of any kind.
  pub fn primary_name(&self) -> Option<&NameRecord> {
    self.names().find(|n| !n.is_birth_name()).or_else(|| self.names().next())
  }

  pub fn given_name(&self) -> Option<&str> { self.primary_name()?.given.as_deref() }

  pub fn surname(&self) -> Option<&str> { self.primary_name()?.surname.as_deref() }

  /// Surname of a `TYPE maiden`/`TYPE birth` name; otherwise a woman's
  /// primary surname.
  pub fn maiden_name(&self) -> Option<&str> {
    if let Some(birth) = self.names().find(|n| n.is_birth_name()) {
      return birth.surname.as_deref();
    }
    match self.sex() {
      Sex::Female => self.surname(),
      _ => None,
    }
  }

  pub fn sex(&self) -> Sex {
    self
      .items
      .iter()
      .find_map(|i| match i {
        IndividualItem::Sex(s) => Some(*s),
        _ => None,
      })
      .unwrap_or_default()
  }

  pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
    self.items.iter().filter_map(|i| match i {
      IndividualItem::Event(e) => Some(e),
      _ => None,
    })
  }

  pub fn spouse_families(&self) -> impl Iterator<Item = &str> {
    self.items.iter().filter_map(|i| match i {
      IndividualItem::SpouseIn(f) => Some(f.as_str()),
      _ => None,
    })
  }

  /// `(family xref, pedigree)` for every `FAMC` link.
  pub fn child_families(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
    self.items.iter().filter_map(|i| match i {
      IndividualItem::ChildIn { family_xref, pedigree } => {
        Some((family_xref.as_str(), pedigree.as_deref()))
      }
      _ => None,
    })
  }
}

impl FamilyRecord {
  pub fn husband(&self) -> Option<&str> {
    self.items.iter().find_map(|i| match i {
      FamilyItem::Husband(x) => Some(x.as_str()),
      _ => None,
    })
  }

  pub fn wife(&self) -> Option<&str> {
    self.items.iter().find_map(|i| match i {
      FamilyItem::Wife(x) => Some(x.as_str()),
      _ => None,
    })
  }

  pub fn children(&self) -> impl Iterator<Item = &str> {
    self.items.iter().filter_map(|i| match i {
      FamilyItem::Child(x) => Some(x.as_str()),
      _ => None,
    })
  }

  pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
    self.items.iter().filter_map(|i| match i {
      FamilyItem::Event(e) => Some(e),
      _ => None,
    })
  }
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A parsed file: its level-0 records in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
  pub records: Vec<Record>,
}

impl Document {
  pub fn individuals(&self) -> impl Iterator<Item = &Individual> {
    self.records.iter().filter_map(|r| match r {
      Record::Individual(i) => Some(i),
      _ => None,
    })
  }

  pub fn families(&self) -> impl Iterator<Item = &FamilyRecord> {
    self.records.iter().filter_map(|r| match r {
      Record::Family(f) => Some(f),
      _ => None,
    })
  }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse a file's bytes. The input must be UTF-8; a leading byte-order mark
/// is ignored.
pub fn parse(input: &[u8]) -> Result<Document> { parse::parse_bytes(input) }

/// Parse already-decoded text.
pub fn parse_str(input: &str) -> Result<Document> { parse::parse_text(input) }
