//! Interactive conflict decisions on the terminal.

use std::io::{self, BufRead, Write};

use stamm_core::{
  conflict::{Conflict, Resolution},
  resolve::{DecisionError, DecisionSource},
};

/// Asks the operator about each conflict on stdin. End of input or a read
/// error leaves the conflict for review.
pub struct Prompt {
  operator: String,
}

impl Prompt {
  pub fn new(operator: impl Into<String>) -> Self { Self { operator: operator.into() } }
}

/// Map one line of operator input to a decision. `None` asks again.
fn parse_answer(line: &str) -> Option<Resolution> {
  match line.trim().to_ascii_lowercase().as_str() {
    "c" | "confirm" => Some(Resolution::Confirmed),
    "r" | "reject" => Some(Resolution::Rejected),
    "" | "s" | "skip" | "review" => Some(Resolution::NeedsReview),
    _ => None,
  }
}

fn ask(conflict: &Conflict) -> io::Result<Option<Resolution>> {
  let stdin = io::stdin();
  let mut out = io::stdout().lock();
  writeln!(
    out,
    "\n[{}] {} (person {})\n  {}",
    conflict.severity, conflict.conflict_type, conflict.person_id, conflict.description
  )?;
  loop {
    write!(out, "  confirm / reject / skip [c/r/S]: ")?;
    out.flush()?;
    let mut line = String::new();
    if stdin.lock().read_line(&mut line)? == 0 {
      return Ok(None);
    }
    if let Some(answer) = parse_answer(&line) {
      return Ok(Some(answer));
    }
    writeln!(out, "  please answer c, r or s")?;
  }
}

impl DecisionSource for Prompt {
  fn name(&self) -> &str { &self.operator }

  fn decide(&mut self, conflict: &Conflict) -> Result<Resolution, DecisionError> {
    match tokio::task::block_in_place(|| ask(conflict)) {
      Ok(Some(resolution)) => Ok(resolution),
      Ok(None) => Err(DecisionError::new("end of input")),
      Err(e) => Err(DecisionError::new(format!("reading answer: {e}"))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn answers() {
    assert_eq!(parse_answer("c\n"), Some(Resolution::Confirmed));
    assert_eq!(parse_answer(" Reject "), Some(Resolution::Rejected));
    assert_eq!(parse_answer("\n"), Some(Resolution::NeedsReview));
    assert_eq!(parse_answer("maybe"), None);
  }
}
