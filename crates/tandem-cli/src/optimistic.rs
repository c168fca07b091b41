//! A local boolean that predicts a remote one.
//!
//! Toggles show their new value immediately; the server response then
//! confirms it or the prediction is rolled back.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Optimistic {
  confirmed: bool,
  pending:   Option<bool>,
}

impl Optimistic {
  pub fn new(confirmed: bool) -> Self { Self { confirmed, pending: None } }

  /// The value to display: the prediction while a request is out, otherwise
  /// the last confirmed value.
  pub fn value(&self) -> bool { self.pending.unwrap_or(self.confirmed) }

  pub fn is_pending(&self) -> bool { self.pending.is_some() }

  /// Predict the flip of the displayed value and return the prediction.
  pub fn begin_toggle(&mut self) -> bool {
    let next = !self.value();
    self.pending = Some(next);
    next
  }

  /// Adopt the server's answer, whatever the prediction was.
  pub fn confirm(&mut self, remote: bool) {
    self.confirmed = remote;
    self.pending = None;
  }

  /// Drop the prediction after a failed request.
  pub fn rollback(&mut self) { self.pending = None; }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toggle_shows_prediction_until_confirmed() {
    let mut flag = Optimistic::new(false);
    assert!(flag.begin_toggle());
    assert!(flag.value());
    assert!(flag.is_pending());

    flag.confirm(true);
    assert!(flag.value());
    assert!(!flag.is_pending());
  }

  #[test]
  fn rollback_restores_confirmed_value() {
    let mut flag = Optimistic::new(true);
    assert!(!flag.begin_toggle());
    flag.rollback();
    assert!(flag.value());
  }

  #[test]
  fn server_answer_wins_over_prediction() {
    let mut flag = Optimistic::new(false);
    flag.begin_toggle();
    // Someone else's toggle raced ours; the server says it is still off.
    flag.confirm(false);
    assert!(!flag.value());
  }
}
