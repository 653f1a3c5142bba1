//! Domain models: proficiency levels, question types, and the quiz question itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// CEFR learner levels accepted by story generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proficiency {
  A1,
  A2,
  B1,
  B2,
  C1,
  C2,
}

impl Proficiency {
  pub fn as_str(&self) -> &'static str {
    match self {
      Proficiency::A1 => "A1",
      Proficiency::A2 => "A2",
      Proficiency::B1 => "B1",
      Proficiency::B2 => "B2",
      Proficiency::C1 => "C1",
      Proficiency::C2 => "C2",
    }
  }
}

impl fmt::Display for Proficiency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Proficiency {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "A1" => Ok(Proficiency::A1),
      "A2" => Ok(Proficiency::A2),
      "B1" => Ok(Proficiency::B1),
      "B2" => Ok(Proficiency::B2),
      "C1" => Ok(Proficiency::C1),
      "C2" => Ok(Proficiency::C2),
      _ => Err(()),
    }
  }
}

/// What the generated quiz should test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  Comprehension,
  Grammar,
}

impl QuestionType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionType::Comprehension => "comprehension",
      QuestionType::Grammar => "grammar",
    }
  }
}

impl FromStr for QuestionType {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "comprehension" => Ok(QuestionType::Comprehension),
      "grammar" => Ok(QuestionType::Grammar),
      _ => Err(()),
    }
  }
}

/// One labelled answer of a structured multiple-choice question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
  pub label: String,
  pub text: String,
}

/// A quiz item. The variant is decided once by the parser; consumers match on it
/// instead of inspecting the shape of `options`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Question {
  /// Labelled options with a known correct label. The only scorable kind.
  MultipleChoiceStructured {
    question: String,
    options: Vec<AnswerOption>,
    correct: String,
  },
  /// Options kept as the raw `"А) ..."` lines the model produced. No answer key.
  MultipleChoiceLines {
    question: String,
    options: Vec<String>,
  },
  PlainText {
    question: String,
  },
  /// Whatever could not be parsed, shown verbatim.
  OpenEnded {
    question: String,
  },
}

impl Question {
  pub fn prompt(&self) -> &str {
    match self {
      Question::MultipleChoiceStructured { question, .. }
      | Question::MultipleChoiceLines { question, .. }
      | Question::PlainText { question }
      | Question::OpenEnded { question } => question,
    }
  }

  pub fn kind_name(&self) -> &'static str {
    match self {
      Question::MultipleChoiceStructured { .. } => "multiple-choice-structured",
      Question::MultipleChoiceLines { .. } => "multiple-choice-lines",
      Question::PlainText { .. } => "plain-text",
      Question::OpenEnded { .. } => "open-ended",
    }
  }

  /// Correct label, present only for scorable questions.
  pub fn correct_label(&self) -> Option<&str> {
    match self {
      Question::MultipleChoiceStructured { correct, .. } => Some(correct),
      _ => None,
    }
  }

  pub fn is_scorable(&self) -> bool { self.correct_label().is_some() }

  /// Whether `label` names one of this question's options.
  /// For line options the label is read from the line prefix.
  pub fn offers_label(&self, label: &str) -> bool {
    match self {
      Question::MultipleChoiceStructured { options, .. } => options.iter().any(|o| o.label == label),
      Question::MultipleChoiceLines { options, .. } => options
        .iter()
        .filter_map(|line| option_line_label(line))
        .any(|l| l == label),
      _ => false,
    }
  }
}

/// Option labels: Latin A–D and Cyrillic А–Г.
pub const OPTION_LABELS: [char; 8] = ['A', 'B', 'C', 'D', 'А', 'Б', 'В', 'Г'];

/// Upper-case a candidate label and check it against the fixed alphabet.
pub fn normalize_label(raw: &str) -> Option<String> {
  let mut chars = raw.trim().chars();
  let first = chars.next()?;
  if chars.next().is_some() {
    return None;
  }
  let upper = first.to_uppercase().next()?;
  OPTION_LABELS.contains(&upper).then(|| upper.to_string())
}

/// Label of a `"X) text"` line, upper-cased, if the line has that shape.
pub fn option_line_label(line: &str) -> Option<String> {
  let mut chars = line.trim_start().chars();
  let first = chars.next()?;
  if chars.next()? != ')' {
    return None;
  }
  normalize_label(&first.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn proficiency_parses_case_insensitively() {
    assert_eq!("b2".parse::<Proficiency>(), Ok(Proficiency::B2));
    assert_eq!(" C1 ".parse::<Proficiency>(), Ok(Proficiency::C1));
    assert!("D1".parse::<Proficiency>().is_err());
    assert!("beginner".parse::<Proficiency>().is_err());
  }

  #[test]
  fn option_line_labels_cover_both_alphabets() {
    assert_eq!(option_line_label("A) x").as_deref(), Some("A"));
    assert_eq!(option_line_label("г) слово").as_deref(), Some("Г"));
    assert_eq!(option_line_label("E) nope"), None);
    assert_eq!(option_line_label("A. dotted"), None);
    assert_eq!(option_line_label("Answer) text"), None);
  }

  #[test]
  fn question_serializes_with_kebab_kind_tag() {
    let q = Question::PlainText { question: "Why?".into() };
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(v["kind"], "plain-text");
    assert_eq!(v["question"], "Why?");
  }

  #[test]
  fn only_structured_questions_are_scorable() {
    let structured = Question::MultipleChoiceStructured {
      question: "q".into(),
      options: vec![AnswerOption { label: "A".into(), text: "x".into() }],
      correct: "A".into(),
    };
    let lines = Question::MultipleChoiceLines { question: "q".into(), options: vec!["А) x".into()] };
    assert!(structured.is_scorable());
    assert!(!lines.is_scorable());
    assert!(lines.offers_label("А"));
    assert!(!lines.offers_label("A"));
  }
}
