//! Quiz session: the questions on screen, the learner's picks, and the grade.
//!
//! A session is a plain value. Every transition consumes it and hands back the
//! next state, so callers never share or mutate a session behind each other's back.
//!
//! ```text
//! Unstarted --start--> Displaying --select--> Answered --grade--> Graded
//!     ^                                                            |
//!     +---------------------------- reset -------------------------+
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::domain::{normalize_label, Question};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
  Unstarted,
  Displaying,
  Answered,
  Graded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
  Excellent,
  Good,
  Fair,
  Poor,
}

impl ScoreBand {
  pub fn from_percentage(percentage: u32) -> Self {
    if percentage >= 90 {
      ScoreBand::Excellent
    } else if percentage >= 70 {
      ScoreBand::Good
    } else if percentage >= 50 {
      ScoreBand::Fair
    } else {
      ScoreBand::Poor
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      ScoreBand::Excellent => "Excellent work!",
      ScoreBand::Good => "Well done!",
      ScoreBand::Fair => "Good effort!",
      ScoreBand::Poor => "Keep practicing!",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Correct,
  Incorrect,
  Unanswered,
  /// No answer key; excluded from the score.
  Unscored,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionResult {
  pub index: usize,
  pub selected: Option<String>,
  pub correct: Option<String>,
  pub outcome: Outcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
  pub correct_count: usize,
  pub scored_count: usize,
  pub total_count: usize,
  pub percentage: u32,
  pub band: ScoreBand,
  pub message: &'static str,
  pub results: Vec<QuestionResult>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QuizSession {
  #[default]
  Unstarted,
  Active {
    questions: Vec<Question>,
    selections: BTreeMap<usize, String>,
  },
  Graded {
    questions: Vec<Question>,
    selections: BTreeMap<usize, String>,
    report: GradeReport,
  },
}

impl QuizSession {
  /// A fresh session displaying `questions`.
  pub fn start(questions: Vec<Question>) -> Self {
    QuizSession::Active { questions, selections: BTreeMap::new() }
  }

  /// Replace whatever is loaded with a new question set.
  #[allow(dead_code)]
  pub fn load(self, questions: Vec<Question>) -> Self { Self::start(questions) }

  pub fn phase(&self) -> QuizPhase {
    match self {
      QuizSession::Unstarted => QuizPhase::Unstarted,
      QuizSession::Active { selections, .. } if selections.is_empty() => QuizPhase::Displaying,
      QuizSession::Active { .. } => QuizPhase::Answered,
      QuizSession::Graded { .. } => QuizPhase::Graded,
    }
  }

  #[allow(dead_code)]
  pub fn questions(&self) -> &[Question] {
    match self {
      QuizSession::Unstarted => &[],
      QuizSession::Active { questions, .. } | QuizSession::Graded { questions, .. } => questions,
    }
  }

  #[allow(dead_code)]
  pub fn selection(&self, index: usize) -> Option<&str> {
    match self {
      QuizSession::Unstarted => None,
      QuizSession::Active { selections, .. } | QuizSession::Graded { selections, .. } => {
        selections.get(&index).map(String::as_str)
      }
    }
  }

  pub fn selection_count(&self) -> usize {
    match self {
      QuizSession::Unstarted => 0,
      QuizSession::Active { selections, .. } | QuizSession::Graded { selections, .. } => selections.len(),
    }
  }

  pub fn report(&self) -> Option<&GradeReport> {
    match self {
      QuizSession::Graded { report, .. } => Some(report),
      _ => None,
    }
  }

  /// Pick `label` for question `index`, replacing an earlier pick.
  /// Ignored once graded, before start, or when the question has no such option.
  pub fn record_selection(self, index: usize, label: &str) -> Self {
    match self {
      QuizSession::Active { questions, mut selections } => {
        let offered = normalize_label(label)
          .filter(|l| questions.get(index).is_some_and(|q| q.offers_label(l)));
        match offered {
          Some(l) => {
            selections.insert(index, l);
          }
          None => debug!(target: "quiz", index, %label, "Ignoring selection for unknown question/option"),
        }
        QuizSession::Active { questions, selections }
      }
      other => other,
    }
  }

  /// Score the picks. Only questions with an answer key count.
  pub fn grade(self) -> Self {
    match self {
      QuizSession::Active { questions, selections } => {
        let report = grade_report(&questions, &selections);
        debug!(target: "quiz", correct = report.correct_count, scored = report.scored_count, percentage = report.percentage, "Quiz graded");
        QuizSession::Graded { questions, selections, report }
      }
      other => other,
    }
  }

  #[allow(dead_code)]
  pub fn reset(self) -> Self { QuizSession::Unstarted }
}

/// `round(100 * correct / scored)`, half up, 0 when nothing is scorable.
pub fn percentage(correct: usize, scored: usize) -> u32 {
  if scored == 0 {
    return 0;
  }
  ((200 * correct + scored) / (2 * scored)) as u32
}

fn grade_report(questions: &[Question], selections: &BTreeMap<usize, String>) -> GradeReport {
  let results: Vec<QuestionResult> = questions
    .iter()
    .enumerate()
    .map(|(index, q)| {
      let selected = selections.get(&index).cloned();
      let correct = q.correct_label().map(str::to_string);
      let outcome = match (&correct, &selected) {
        (None, _) => Outcome::Unscored,
        (Some(_), None) => Outcome::Unanswered,
        (Some(c), Some(s)) if c == s => Outcome::Correct,
        (Some(_), Some(_)) => Outcome::Incorrect,
      };
      QuestionResult { index, selected, correct, outcome }
    })
    .collect();

  let scored_count = results.iter().filter(|r| r.outcome != Outcome::Unscored).count();
  let correct_count = results.iter().filter(|r| r.outcome == Outcome::Correct).count();
  let percentage = percentage(correct_count, scored_count);
  let band = ScoreBand::from_percentage(percentage);

  GradeReport {
    correct_count,
    scored_count,
    total_count: questions.len(),
    percentage,
    band,
    message: band.message(),
    results,
  }
}
