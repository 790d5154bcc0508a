//! Data-quality rules over one person's loaded events.
//!
//! [`check_person`] is pure: it reads events and returns conflicts, never
//! failing. A rule that fires is data, not an error. Persisting the result
//! and updating event statuses is the store's job
//! ([`GenealogyStore::record_validation`](crate::store::GenealogyStore::record_validation)).

use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};

use crate::{
  conflict::{ConflictType, NewConflict},
  date::CalendarDate,
  event::{Event, EventKind},
  person::{FamilyId, Person, PersonId},
};

/// The other spouse's earliest death in a family the person married into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpouseDeath {
  pub family_id: FamilyId,
  pub spouse_id: PersonId,
  pub death:     Option<CalendarDate>,
}

/// Event kinds expected on or after a death.
const POSTHUMOUS: [EventKind; 4] =
  [EventKind::Death, EventKind::Burial, EventKind::Probate, EventKind::Will];

fn earliest<'a>(events: &[&'a Event]) -> Option<(&'a Event, CalendarDate)> {
  events
    .iter()
    .filter_map(|e| e.date.sort.map(|d| (*e, d)))
    .min_by_key(|(e, d)| (*d, e.id))
}

fn fmt_date(date: Option<CalendarDate>) -> String {
  date.map_or_else(|| "undated".to_string(), |d| d.to_string())
}

/// Run every rule for one person. `events` should be that person's events
/// in load order; `today` bounds the future-date rule.
pub fn check_person(
  person: &Person,
  events: &[Event],
  spouse_deaths: &[SpouseDeath],
  today: CalendarDate,
) -> Vec<NewConflict> {
  let name = person.display_name();
  let mut out = Vec::new();
  let mut push = |ty, event: &Event, related: Option<&Event>, description: String| {
    out.push(NewConflict::new(
      person.id,
      ty,
      Some(event.id),
      related.map(|r| r.id),
      description,
    ));
  };

  let of_kind = |kind: EventKind| -> Vec<&Event> {
    events.iter().filter(|e| e.kind == kind).collect()
  };
  let births = of_kind(EventKind::Birth);
  let deaths = of_kind(EventKind::Death);
  let marriages = of_kind(EventKind::Marriage);
  let divorces = of_kind(EventKind::Divorce);

  let birth = earliest(&births);
  let death = earliest(&deaths);

  if deaths.len() > 1 {
    push(
      ConflictType::MultipleDeaths,
      deaths[0],
      Some(deaths[1]),
      format!("{name} has {} death records", deaths.len()),
    );
  }

  if let Some((birth_event, birth_date)) = birth
    && let Some((death_event, death_date)) = death
    && death_date < birth_date
  {
    push(
      ConflictType::DeathBeforeBirth,
      death_event,
      Some(birth_event),
      format!("{name}: death ({death_date}) is before birth ({birth_date})"),
    );
  }

  if let Some((death_event, death_date)) = death {
    for e in events.iter().filter(|e| !POSTHUMOUS.contains(&e.kind)) {
      if let Some(d) = e.date.sort
        && d > death_date
      {
        push(
          ConflictType::EventAfterDeath,
          e,
          Some(death_event),
          format!("{name}: {} ({d}) occurs after death ({death_date})", e.kind.label()),
        );
      }
    }
  }

  for e in events {
    let bad = [e.date.sort, e.date.end].into_iter().flatten().find(|d| !d.is_valid());
    if let Some(d) = bad {
      push(
        ConflictType::ImpossibleDate,
        e,
        None,
        format!("{name}: {} date {d} is not a real calendar date", e.kind.label()),
      );
    }
  }

  for e in events {
    if let Some(d) = e.date.sort
      && d > today
    {
      push(
        ConflictType::FutureDate,
        e,
        None,
        format!("{name}: {} date {d} is in the future", e.kind.label()),
      );
    }
  }

  if let Some((birth_event, birth_date)) = birth {
    for e in events.iter().filter(|e| !matches!(e.kind, EventKind::Birth | EventKind::Death)) {
      if let Some(d) = e.date.sort
        && d < birth_date
      {
        push(
          ConflictType::NegativeAge,
          e,
          Some(birth_event),
          format!(
            "{name}: age at {} ({d}) is negative ({} years)",
            e.kind.label(),
            birth_date.years_until(&d)
          ),
        );
      }
    }
  }

  if marriages.len() > 1 {
    let mut sorted = marriages.clone();
    sorted.sort_by_key(|e| (e.date.sort, e.id));
    let divorce_dates: Vec<CalendarDate> = divorces.iter().filter_map(|e| e.date.sort).collect();
    for pair in sorted.windows(2) {
      let (m1, m2) = (pair[0], pair[1]);
      if m1.family_id.is_some() && m1.family_id == m2.family_id {
        continue;
      }
      let between = |d: CalendarDate| m1.date.sort <= Some(d) && Some(d) <= m2.date.sort;
      let divorced = divorce_dates.iter().any(|d| between(*d));
      let widowed = spouse_deaths.iter().any(|sd| {
        Some(sd.family_id) == m1.family_id && sd.death.is_some_and(between)
      });
      if !divorced && !widowed {
        push(
          ConflictType::MarriageWithoutDivorce,
          m2,
          Some(m1),
          format!(
            "{name}: marriage ({}) without divorce after prior marriage ({})",
            fmt_date(m2.date.sort),
            fmt_date(m1.date.sort)
          ),
        );
      }
    }
  }

  let mut seen: HashMap<(EventKind, CalendarDate, Option<i64>), &Event> = HashMap::new();
  for e in events {
    let Some(d) = e.date.sort else { continue };
    match seen.entry((e.kind, d, e.location_id)) {
      Entry::Occupied(first) => push(
        ConflictType::DuplicateEvent,
        e,
        Some(*first.get()),
        format!("{name}: duplicate {} event on {d}", e.kind.label()),
      ),
      Entry::Vacant(slot) => {
        slot.insert(e);
      }
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    date::{DatePrecision, NormalizedDate},
    event::ValidationStatus,
    person::Sex,
  };

  fn person() -> Person {
    Person {
      id:           1,
      xref:         "@I1@".into(),
      given_name:   Some("Ada".into()),
      family_name:  Some("Lovelace".into()),
      maiden_name:  None,
      sex:          Sex::Female,
      needs_review: false,
      notes:        None,
      biography:    None,
    }
  }

  fn event(id: i64, kind: EventKind, sort: Option<(i32, u32, u32)>) -> Event {
    Event {
      id,
      person_id: 1,
      family_id: None,
      kind,
      location_id: None,
      date: NormalizedDate {
        raw:       None,
        sort:      sort.map(|(y, m, d)| CalendarDate::new(y, m, d)),
        end:       None,
        precision: if sort.is_some() { DatePrecision::Exact } else { DatePrecision::Unknown },
      },
      validation_status: ValidationStatus::Unvalidated,
      description: None,
    }
  }

  fn marriage(id: i64, family: FamilyId, year: i32) -> Event {
    Event { family_id: Some(family), ..event(id, EventKind::Marriage, Some((year, 1, 1))) }
  }

  fn today() -> CalendarDate { CalendarDate::new(2024, 1, 1) }

  fn types(conflicts: &[NewConflict]) -> Vec<ConflictType> {
    conflicts.iter().map(|c| c.conflict_type).collect()
  }

  #[test]
  fn clean_person_has_no_conflicts() {
    let events = [
      event(1, EventKind::Birth, Some((1900, 1, 1))),
      event(2, EventKind::Residence, Some((1930, 1, 1))),
      event(3, EventKind::Death, Some((1960, 1, 1))),
      event(4, EventKind::Burial, Some((1960, 1, 5))),
    ];
    assert!(check_person(&person(), &events, &[], today()).is_empty());
  }

  #[test]
  fn early_death_and_second_death() {
    let events = [
      event(1, EventKind::Birth, Some((1900, 1, 1))),
      event(2, EventKind::Death, Some((1890, 1, 1))),
      event(3, EventKind::Death, Some((1960, 1, 1))),
    ];
    let found = check_person(&person(), &events, &[], today());
    let found = types(&found);
    assert!(found.contains(&ConflictType::DeathBeforeBirth));
    assert!(found.contains(&ConflictType::MultipleDeaths));
  }

  #[test]
  fn multiple_deaths_triggers_on_the_first_death() {
    let events = [
      event(1, EventKind::Death, Some((1950, 1, 1))),
      event(2, EventKind::Death, Some((1951, 6, 1))),
    ];
    let found = check_person(&person(), &events, &[], today());
    let c = found
      .iter()
      .find(|c| c.conflict_type == ConflictType::MultipleDeaths)
      .unwrap();
    assert_eq!(c.event_id, Some(1));
    assert_eq!(c.related_event_id, Some(2));
  }

  #[test]
  fn death_before_birth_points_at_both_events() {
    let events = [
      event(1, EventKind::Birth, Some((1900, 1, 1))),
      event(2, EventKind::Death, Some((1890, 1, 1))),
    ];
    let found = check_person(&person(), &events, &[], today());
    let c = found
      .iter()
      .find(|c| c.conflict_type == ConflictType::DeathBeforeBirth)
      .unwrap();
    assert_eq!(c.event_id, Some(2));
    assert_eq!(c.related_event_id, Some(1));
    assert_eq!(c.severity, crate::conflict::Severity::Error);
  }

  #[test]
  fn burial_after_death_is_expected() {
    let events = [
      event(1, EventKind::Death, Some((1960, 1, 1))),
      event(2, EventKind::Burial, Some((1960, 2, 1))),
      event(3, EventKind::Census, Some((1970, 1, 1))),
    ];
    let found = check_person(&person(), &events, &[], today());
    assert_eq!(types(&found), [ConflictType::EventAfterDeath]);
    assert_eq!(found[0].event_id, Some(3));
  }

  #[test]
  fn impossible_and_future_dates() {
    let events = [
      event(1, EventKind::Birth, Some((1900, 2, 30))),
      event(2, EventKind::Residence, Some((2090, 1, 1))),
    ];
    let found = types(&check_person(&person(), &events, &[], today()));
    assert_eq!(found, [ConflictType::ImpossibleDate, ConflictType::FutureDate]);
  }

  #[test]
  fn event_before_birth_is_negative_age() {
    let events = [
      event(1, EventKind::Birth, Some((1900, 6, 1))),
      event(2, EventKind::Census, Some((1890, 6, 1))),
    ];
    let found = check_person(&person(), &events, &[], today());
    assert_eq!(types(&found), [ConflictType::NegativeAge]);
    assert!(found[0].description.contains("-10 years"));
  }

  #[test]
  fn second_marriage_needs_divorce_or_widowhood() {
    let events = [marriage(1, 10, 1920), marriage(2, 11, 1930)];
    let found = check_person(&person(), &events, &[], today());
    assert_eq!(types(&found), [ConflictType::MarriageWithoutDivorce]);
    assert_eq!(found[0].event_id, Some(2));

    let divorced = [
      marriage(1, 10, 1920),
      Event { family_id: Some(10), ..event(3, EventKind::Divorce, Some((1925, 1, 1))) },
      marriage(2, 11, 1930),
    ];
    assert!(check_person(&person(), &divorced, &[], today()).is_empty());

    let widowed = [SpouseDeath {
      family_id: 10,
      spouse_id: 7,
      death:     Some(CalendarDate::new(1926, 3, 1)),
    }];
    assert!(check_person(&person(), &events, &widowed, today()).is_empty());
  }

  #[test]
  fn spouse_death_in_the_later_family_does_not_count() {
    let events = [marriage(1, 10, 1920), marriage(2, 11, 1930)];
    let other = [SpouseDeath {
      family_id: 11,
      spouse_id: 8,
      death:     Some(CalendarDate::new(1926, 3, 1)),
    }];
    let found = check_person(&person(), &events, &other, today());
    assert_eq!(types(&found), [ConflictType::MarriageWithoutDivorce]);
  }

  #[test]
  fn duplicates_need_a_date() {
    let events = [
      event(1, EventKind::Residence, Some((1930, 1, 1))),
      event(2, EventKind::Residence, Some((1930, 1, 1))),
      event(3, EventKind::Occupation, None),
      event(4, EventKind::Occupation, None),
    ];
    let found = check_person(&person(), &events, &[], today());
    assert_eq!(types(&found), [ConflictType::DuplicateEvent]);
    assert_eq!(found[0].event_id, Some(2));
    assert_eq!(found[0].related_event_id, Some(1));
  }
}
