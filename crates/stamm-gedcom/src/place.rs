//! Free-text place names → [`PlaceParts`].
//!
//! GEDCOM places run from most to least specific, comma separated
//! (`City, County, State, Country`). The split here is positional and
//! best-effort; it never fails.

use stamm_core::location::PlaceParts;

const COUNTRIES: [&str; 10] = [
  "usa",
  "united states",
  "us",
  "canada",
  "england",
  "france",
  "germany",
  "ireland",
  "scotland",
  "wales",
];

const US_STATES: [(&str, &str); 50] = [
  ("AL", "Alabama"),
  ("AK", "Alaska"),
  ("AZ", "Arizona"),
  ("AR", "Arkansas"),
  ("CA", "California"),
  ("CO", "Colorado"),
  ("CT", "Connecticut"),
  ("DE", "Delaware"),
  ("FL", "Florida"),
  ("GA", "Georgia"),
  ("HI", "Hawaii"),
  ("ID", "Idaho"),
  ("IL", "Illinois"),
  ("IN", "Indiana"),
  ("IA", "Iowa"),
  ("KS", "Kansas"),
  ("KY", "Kentucky"),
  ("LA", "Louisiana"),
  ("ME", "Maine"),
  ("MD", "Maryland"),
  ("MA", "Massachusetts"),
  ("MI", "Michigan"),
  ("MN", "Minnesota"),
  ("MS", "Mississippi"),
  ("MO", "Missouri"),
  ("MT", "Montana"),
  ("NE", "Nebraska"),
  ("NV", "Nevada"),
  ("NH", "New Hampshire"),
  ("NJ", "New Jersey"),
  ("NM", "New Mexico"),
  ("NY", "New York"),
  ("NC", "North Carolina"),
  ("ND", "North Dakota"),
  ("OH", "Ohio"),
  ("OK", "Oklahoma"),
  ("OR", "Oregon"),
  ("PA", "Pennsylvania"),
  ("RI", "Rhode Island"),
  ("SC", "South Carolina"),
  ("SD", "South Dakota"),
  ("TN", "Tennessee"),
  ("TX", "Texas"),
  ("UT", "Utah"),
  ("VT", "Vermont"),
  ("VA", "Virginia"),
  ("WA", "Washington"),
  ("WV", "West Virginia"),
  ("WI", "Wisconsin"),
  ("WY", "Wyoming"),
];

fn is_country(s: &str) -> bool { COUNTRIES.contains(&s.to_lowercase().as_str()) }

/// The full state name for a US abbreviation or a differently-cased name.
fn us_state(s: &str) -> Option<&'static str> {
  US_STATES
    .iter()
    .find(|(abbr, name)| abbr.eq_ignore_ascii_case(s) || name.eq_ignore_ascii_case(s))
    .map(|(_, name)| *name)
}

/// Split `raw` into components. `raw_text` is the trimmed input and is the
/// location's deduplication key.
pub fn normalize_place(raw: &str) -> PlaceParts {
  let raw = raw.trim();
  let segments: Vec<&str> =
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();

  let mut parts = PlaceParts { raw_text: raw.to_string(), ..PlaceParts::default() };
  let own = |s: &str| Some(s.to_string());

  match segments[..] {
    [] => {}
    [only] => {
      if is_country(only) {
        parts.country = own(only);
      } else if us_state(only).is_some() {
        parts.state = own(only);
      } else {
        parts.city = own(only);
      }
    }
    [city, last] => {
      parts.city = own(city);
      if is_country(last) {
        parts.country = own(last);
      } else {
        parts.state = own(last);
      }
    }
    [city, middle, last] => {
      parts.city = own(city);
      if is_country(last) {
        parts.state = own(middle);
        parts.country = own(last);
      } else {
        parts.county = own(middle);
        parts.state = own(last);
      }
    }
    [.., city, county, state, country] => {
      parts.city = own(city);
      parts.county = own(county);
      parts.state = own(state);
      parts.country = own(country);
    }
  }

  if let Some(full) = parts.state.as_deref().and_then(us_state) {
    parts.state = own(full);
  }

  let components: Vec<&str> = [&parts.city, &parts.county, &parts.state, &parts.country]
    .into_iter()
    .flatten()
    .map(String::as_str)
    .collect();
  parts.normalized = if components.is_empty() { raw.to_string() } else { components.join(", ") };
  parts
}

#[cfg(test)]
mod tests {
  use super::*;

  fn split(raw: &str) -> [Option<String>; 4] {
    let p = normalize_place(raw);
    [p.city, p.county, p.state, p.country]
  }

  fn s(v: &str) -> Option<String> { Some(v.to_string()) }

  #[test]
  fn four_segments() {
    assert_eq!(
      split("Boston, Suffolk, Massachusetts, USA"),
      [s("Boston"), s("Suffolk"), s("Massachusetts"), s("USA")]
    );
  }

  #[test]
  fn five_segments_keep_the_rightmost_four() {
    assert_eq!(
      split("St. Mary's Church, Boston, Suffolk, MA, USA"),
      [s("Boston"), s("Suffolk"), s("Massachusetts"), s("USA")]
    );
  }

  #[test]
  fn three_segments_use_country_heuristic() {
    assert_eq!(split("Toronto, Ontario, Canada"), [s("Toronto"), None, s("Ontario"), s("Canada")]);
    assert_eq!(split("Springfield, Sangamon, IL"), [s("Springfield"), s("Sangamon"), s("Illinois"), None]);
  }

  #[test]
  fn two_and_one_segments() {
    assert_eq!(split("Dublin, Ireland"), [s("Dublin"), None, None, s("Ireland")]);
    assert_eq!(split("Albany, ny"), [s("Albany"), None, s("New York"), None]);
    assert_eq!(split("England"), [None, None, None, s("England")]);
    assert_eq!(split("Ohio"), [None, None, s("Ohio"), None]);
    assert_eq!(split("Paris"), [s("Paris"), None, None, None]);
  }

  #[test]
  fn raw_text_is_the_key_and_normalized_is_rejoined() {
    let p = normalize_place("  Albany ,NY,  USA ");
    assert_eq!(p.raw_text, "Albany ,NY,  USA");
    assert_eq!(p.normalized, "Albany, New York, USA");
  }

  #[test]
  fn empty_input_is_tolerated() {
    let p = normalize_place("   ");
    assert_eq!(p.raw_text, "");
    assert_eq!(p.normalized, "");
    assert_eq!(split(", ,"), [None, None, None, None]);
  }

  #[test]
  fn case_differences_are_distinct_keys() {
    assert_ne!(normalize_place("boston, ma").raw_text, normalize_place("Boston, MA").raw_text);
  }
}
