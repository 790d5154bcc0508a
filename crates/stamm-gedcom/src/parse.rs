//! Line-oriented GEDCOM parser.
//!
//! Pipeline:
//!   raw &[u8]
//!     └─ decode()             → &str
//!          └─ lex_line()      → Line
//!               └─ build_tree()  → Vec<Node>
//!                    └─ type_record() → Vec<Record>

use stamm_core::{event::EventKind, person::Sex};

use crate::{
  Document, EventRecord, FamilyItem, FamilyRecord, Individual, IndividualItem, NameRecord,
  Node, Record,
  error::{Error, Result},
};

const BOM: &[u8] = b"\xEF\xBB\xBF";

const INDIVIDUAL_EVENTS: [&str; 16] = [
  "BIRT", "DEAT", "BURI", "BAPM", "CHR", "IMMI", "EMIG", "NATU", "CENS", "RESI", "OCCU",
  "GRAD", "RETI", "PROB", "WILL", "EVEN",
];

const FAMILY_EVENTS: [&str; 3] = ["MARR", "DIV", "EVEN"];

// ─── Decoding ────────────────────────────────────────────────────────────────

fn decode(input: &[u8]) -> Result<&str> {
  let input = input.strip_prefix(BOM).unwrap_or(input);
  std::str::from_utf8(input).map_err(|e| {
    let valid = &input[..e.valid_up_to()];
    Error::Encoding { line: valid.iter().filter(|&&b| b == b'\n').count() + 1 }
  })
}

pub(crate) fn parse_bytes(input: &[u8]) -> Result<Document> { parse_text(decode(input)?) }

pub(crate) fn parse_text(input: &str) -> Result<Document> {
  let input = input.strip_prefix('\u{feff}').unwrap_or(input);
  let roots = build_tree(input)?;
  let records = roots.into_iter().map(type_record).collect::<Result<_>>()?;
  Ok(Document { records })
}

// ─── Lexing ──────────────────────────────────────────────────────────────────

struct Line<'a> {
  number: usize,
  level:  u32,
  xref:   Option<&'a str>,
  tag:    &'a str,
  value:  &'a str,
}

/// Split `LEVEL [@XREF@] TAG [VALUE]`. The value keeps its inner spacing.
fn lex_line(number: usize, text: &str) -> Result<Line<'_>> {
  let text = text.trim_start();
  let (level, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
  let level = Some(level)
    .filter(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit()))
    .and_then(|l| l.parse::<u32>().ok())
    .ok_or_else(|| Error::InvalidLevel { line: number, text: text.to_string() })?;

  let rest = rest.trim_start();
  let (first, after) = rest.split_once(' ').unwrap_or((rest, ""));
  let (xref, rest) = if first.len() > 2 && first.starts_with('@') && first.ends_with('@') {
    (Some(first), after.trim_start())
  } else {
    (None, rest)
  };

  let (tag, value) = rest.split_once(' ').unwrap_or((rest, ""));
  let tag = tag.trim();
  if tag.is_empty() {
    return Err(Error::MissingTag { line: number });
  }
  Ok(Line { number, level, xref, tag, value })
}

// ─── Tree building ───────────────────────────────────────────────────────────

fn close(stack: &mut Vec<Node>, roots: &mut Vec<Node>) {
  if let Some(node) = stack.pop() {
    match stack.last_mut() {
      Some(parent) => parent.children.push(node),
      None => roots.push(node),
    }
  }
}

/// Nest lines by level. `stack[i]` is the open node at level `i`.
fn build_tree(input: &str) -> Result<Vec<Node>> {
  let mut roots = Vec::new();
  let mut stack: Vec<Node> = Vec::new();

  for (idx, raw) in input.split('\n').enumerate() {
    let raw = raw.strip_suffix('\r').unwrap_or(raw);
    if raw.trim().is_empty() {
      continue;
    }
    let line = lex_line(idx + 1, raw)?;
    let depth = line.level as usize;

    if depth > stack.len() {
      return Err(Error::BadNesting {
        line:  line.number,
        level: line.level,
        max:   stack.len() as u32,
      });
    }
    while stack.len() > depth {
      close(&mut stack, &mut roots);
    }

    let tag = line.tag.to_ascii_uppercase();
    if depth > 0
      && (tag == "CONC" || tag == "CONT")
      && let Some(parent) = stack.last_mut()
    {
      if tag == "CONT" {
        parent.value.push('\n');
      }
      parent.value.push_str(line.value);
      continue;
    }

    stack.push(Node {
      line: line.number,
      level: line.level,
      xref: line.xref.map(str::to_string),
      tag,
      value: line.value.to_string(),
      children: Vec::new(),
    });
  }

  while !stack.is_empty() {
    close(&mut stack, &mut roots);
  }
  Ok(roots)
}

// ─── Typing ──────────────────────────────────────────────────────────────────

fn type_record(node: Node) -> Result<Record> {
  match node.tag.as_str() {
    "INDI" | "FAM" => {
      let Some(xref) = node.xref.clone() else {
        return Err(Error::MissingXref { line: node.line, tag: node.tag });
      };
      if node.tag == "INDI" {
        let items = node.children.into_iter().map(individual_item).collect();
        Ok(Record::Individual(Individual { xref, line: node.line, items }))
      } else {
        let items = node.children.into_iter().map(family_item).collect();
        Ok(Record::Family(FamilyRecord { xref, line: node.line, items }))
      }
    }
    _ => Ok(Record::Other(node)),
  }
}

fn individual_item(node: Node) -> IndividualItem {
  let is_event = INDIVIDUAL_EVENTS.contains(&node.tag.as_str());
  match node.tag.as_str() {
    "NAME" => IndividualItem::Name(name_record(&node)),
    "SEX" => IndividualItem::Sex(Sex::from_code(&node.value)),
    "FAMS" => IndividualItem::SpouseIn(node.value.trim().to_string()),
    "FAMC" => IndividualItem::ChildIn {
      family_xref: node.value.trim().to_string(),
      pedigree:    node.child_value("PEDI").map(str::to_string),
    },
    _ if is_event => IndividualItem::Event(event_record(node)),
    _ => IndividualItem::Unknown(node),
  }
}

fn family_item(node: Node) -> FamilyItem {
  let is_event = FAMILY_EVENTS.contains(&node.tag.as_str());
  match node.tag.as_str() {
    "HUSB" => FamilyItem::Husband(node.value.trim().to_string()),
    "WIFE" => FamilyItem::Wife(node.value.trim().to_string()),
    "CHIL" => FamilyItem::Child(node.value.trim().to_string()),
    _ if is_event => FamilyItem::Event(event_record(node)),
    _ => FamilyItem::Unknown(node),
  }
}

/// `Given /Surname/ suffix`. Without a slash pair the whole value is the
/// given name.
fn split_name(value: &str) -> (Option<String>, Option<String>) {
  let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
  if let Some((given, rest)) = value.split_once('/')
    && let Some((surname, _suffix)) = rest.split_once('/')
  {
    return (non_empty(given), non_empty(surname));
  }
  (non_empty(value), None)
}

fn name_record(node: &Node) -> NameRecord {
  let (given, surname) = split_name(&node.value);
  NameRecord {
    value:     node.value.trim().to_string(),
    given:     node.child_value("GIVN").map(str::to_string).or(given),
    surname:   node.child_value("SURN").map(str::to_string).or(surname),
    name_type: node.child_value("TYPE").map(str::to_ascii_lowercase),
  }
}

fn event_record(node: Node) -> EventRecord {
  let kind = EventKind::from_code(&node.tag).unwrap_or(EventKind::Other);
  // "1 DEAT Y" only asserts the event happened.
  let value = node.value.trim();
  let mut description =
    (!value.is_empty() && !value.eq_ignore_ascii_case("Y")).then(|| value.to_string());

  let mut date = None;
  let mut place = None;
  let mut other = Vec::new();
  for child in node.children {
    let text = child.value.trim().to_string();
    match (child.tag.as_str(), text.is_empty()) {
      ("DATE", false) => date = Some(text),
      ("PLAC", false) => place = Some(text),
      ("TYPE", false) => {
        description.get_or_insert(text);
      }
      _ => other.push(child),
    }
  }

  EventRecord { line: node.line, tag: node.tag, kind, date, place, description, other }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn doc(input: &str) -> Document { parse_text(input).unwrap() }

  const SAMPLE: &str = "\
0 HEAD
1 CHAR UTF-8
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 BIRT
2 DATE 12 JUN 1776
2 PLAC Boston, Suffolk, Massachusetts, USA
1 FAMS @F1@
1 _MILT Served 1798
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
1 FAMS @F1@
0 @I3@ INDI
1 NAME Tom /Smith/
1 FAMC @F1@
2 PEDI adopted
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
1 MARR
2 DATE ABT 1800
0 TRLR
";

  // ── Structure ─────────────────────────────────────────────────────────

  #[test]
  fn records_keep_source_order() {
    let d = doc(SAMPLE);
    assert_eq!(d.records.len(), 6);
    assert!(matches!(&d.records[0], Record::Other(n) if n.tag == "HEAD"));
    let xrefs: Vec<_> = d.individuals().map(|i| i.xref.as_str()).collect();
    assert_eq!(xrefs, ["@I1@", "@I2@", "@I3@"]);
    assert!(matches!(d.records.last(), Some(Record::Other(n)) if n.tag == "TRLR"));
  }

  #[test]
  fn individual_fields() {
    let d = doc(SAMPLE);
    let john = d.individuals().next().unwrap();
    assert_eq!(john.given_name(), Some("John"));
    assert_eq!(john.surname(), Some("Smith"));
    assert_eq!(john.maiden_name(), None);
    assert_eq!(john.sex(), Sex::Male);
    assert_eq!(john.spouse_families().collect::<Vec<_>>(), ["@F1@"]);

    let birth = john.events().next().unwrap();
    assert_eq!(birth.kind, EventKind::Birth);
    assert_eq!(birth.date.as_deref(), Some("12 JUN 1776"));
    assert_eq!(birth.place.as_deref(), Some("Boston, Suffolk, Massachusetts, USA"));
  }

  #[test]
  fn unknown_tags_are_preserved() {
    let d = doc(SAMPLE);
    let john = d.individuals().next().unwrap();
    let unknown = john
      .items
      .iter()
      .find_map(|i| match i {
        IndividualItem::Unknown(n) => Some(n),
        _ => None,
      })
      .unwrap();
    assert_eq!(unknown.tag, "_MILT");
    assert_eq!(unknown.value, "Served 1798");
  }

  #[test]
  fn family_links_and_pedigree() {
    let d = doc(SAMPLE);
    let fam = d.families().next().unwrap();
    assert_eq!(fam.husband(), Some("@I1@"));
    assert_eq!(fam.wife(), Some("@I2@"));
    assert_eq!(fam.children().collect::<Vec<_>>(), ["@I3@"]);
    assert_eq!(fam.events().next().unwrap().kind, EventKind::Marriage);

    let tom = d.individuals().nth(2).unwrap();
    assert_eq!(tom.child_families().collect::<Vec<_>>(), [("@F1@", Some("adopted"))]);
  }

  #[test]
  fn female_surname_is_maiden_name() {
    let d = doc(SAMPLE);
    let mary = d.individuals().nth(1).unwrap();
    assert_eq!(mary.maiden_name(), Some("Jones"));
  }

  #[test]
  fn typed_birth_name_wins() {
    let d = doc(
      "0 @I1@ INDI\n1 NAME Anne /Baker/\n1 NAME Anne /Fletcher/\n2 TYPE maiden\n1 SEX F\n",
    );
    let anne = d.individuals().next().unwrap();
    assert_eq!(anne.surname(), Some("Baker"));
    assert_eq!(anne.maiden_name(), Some("Fletcher"));
  }

  #[test]
  fn givn_and_surn_override_name_value() {
    let d = doc("0 @I1@ INDI\n1 NAME J. /Smyth/\n2 GIVN Jonathan\n2 SURN Smith\n");
    let p = d.individuals().next().unwrap();
    assert_eq!(p.given_name(), Some("Jonathan"));
    assert_eq!(p.surname(), Some("Smith"));
  }

  #[test]
  fn name_without_slashes_is_given_name() {
    let d = doc("0 @I1@ INDI\n1 NAME Cher\n");
    let p = d.individuals().next().unwrap();
    assert_eq!(p.given_name(), Some("Cher"));
    assert_eq!(p.surname(), None);
  }

  #[test]
  fn continuation_lines_fold_into_parent() {
    let d = doc("0 @N1@ NOTE First part\n1 CONC  and more\n1 CONT second line\n");
    let Record::Other(note) = &d.records[0] else { panic!("expected NOTE") };
    assert_eq!(note.value, "First part and more\nsecond line");
    assert!(note.children.is_empty());
  }

  #[test]
  fn event_type_and_value_become_description() {
    let d = doc("0 @I1@ INDI\n1 EVEN\n2 TYPE Military service\n1 OCCU Blacksmith\n1 DEAT Y\n");
    let events: Vec<_> = d.individuals().next().unwrap().events().cloned().collect();
    assert_eq!(events[0].kind, EventKind::Other);
    assert_eq!(events[0].description.as_deref(), Some("Military service"));
    assert_eq!(events[1].description.as_deref(), Some("Blacksmith"));
    assert_eq!(events[2].description, None);
  }

  #[test]
  fn crlf_blank_lines_and_bom() {
    let d = parse_bytes(b"\xEF\xBB\xBF0 HEAD\r\n\r\n0 @I1@ INDI\r\n1 NAME A /B/\r\n").unwrap();
    assert_eq!(d.individuals().count(), 1);
  }

  // ── Errors ────────────────────────────────────────────────────────────

  #[test]
  fn non_numeric_level_reports_line() {
    let err = parse_text("0 HEAD\nX @I1@ INDI\n").unwrap_err();
    assert!(matches!(err, Error::InvalidLevel { line: 2, .. }));
    assert_eq!(err.line(), 2);
  }

  #[test]
  fn signed_level_is_invalid() {
    let err = parse_text("0 HEAD\n0 @I1@ INDI\n+1 NAME A /B/\n").unwrap_err();
    assert!(matches!(err, Error::InvalidLevel { line: 3, .. }));
  }

  #[test]
  fn missing_tag_reports_line() {
    let err = parse_text("0 HEAD\n0 @I1@\n").unwrap_err();
    assert_eq!(err, Error::MissingTag { line: 2 });
  }

  #[test]
  fn level_jump_is_bad_nesting() {
    let err = parse_text("0 @I1@ INDI\n2 DATE 1900\n").unwrap_err();
    assert_eq!(err, Error::BadNesting { line: 2, level: 2, max: 1 });

    let err = parse_text("1 NAME Orphan\n").unwrap_err();
    assert_eq!(err.line(), 1);
  }

  #[test]
  fn indi_without_xref_fails() {
    let err = parse_text("0 HEAD\n0 INDI\n1 NAME A /B/\n").unwrap_err();
    assert!(matches!(err, Error::MissingXref { line: 2, .. }));
  }

  #[test]
  fn invalid_utf8_reports_line() {
    let err = parse_bytes(b"0 HEAD\n0 @I1@ INDI\n1 NAME \xFF\n").unwrap_err();
    assert_eq!(err, Error::Encoding { line: 3 });
  }
}
