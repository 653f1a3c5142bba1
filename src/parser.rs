//! Turns a raw quiz completion into ordered `Question`s.
//!
//! Two upstream shapes are understood:
//!   - a JSON object `{"questions": [{"question", "options": {label: text}, "correct"}]}`
//!   - a numbered text list (`1. prompt` followed by `А) ...` option lines)
//!
//! Parsing never fails. Anything that does not fit degrades to an `open-ended`
//! question that reproduces the text, so one bad item never drops the batch.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::{normalize_label, option_line_label, AnswerOption, Question};

/// Fewer detected option lines than this and the block is shown as raw text.
pub const MIN_OPTION_LINES: usize = 4;

#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn parse_questions(raw: &str) -> Vec<Question> {
  if let Some(entries) = structured_entries(raw) {
    debug!(target: "quiz", entries = entries.len(), "Parsing structured quiz payload");
    return entries.iter().map(structured_question).collect();
  }

  let questions: Vec<Question> = split_numbered_blocks(raw)
    .iter()
    .filter_map(|block| block_question(block))
    .collect();
  debug!(target: "quiz", count = questions.len(), "Parsed numbered quiz text");
  questions
}

// ---- structured JSON ----

fn structured_entries(raw: &str) -> Option<Vec<Value>> {
  let body = strip_code_fence(raw.trim());
  match serde_json::from_str::<Value>(body).ok()? {
    Value::Object(mut map) => match map.remove("questions")? {
      Value::Array(items) => Some(items),
      _ => None,
    },
    Value::Array(items) => Some(items),
    _ => None,
  }
}

/// Models like to wrap JSON in ```json fences even when told not to.
fn strip_code_fence(s: &str) -> &str {
  let Some(rest) = s.strip_prefix("```") else { return s };
  let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn structured_question(entry: &Value) -> Question {
  let obj = match entry {
    Value::String(s) => return Question::PlainText { question: s.trim().to_string() },
    Value::Object(obj) => obj,
    other => return Question::OpenEnded { question: other.to_string() },
  };

  let question = obj
    .get("question")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .trim()
    .to_string();

  match obj.get("options") {
    Some(Value::Object(opts)) => {
      let options = opts
        .iter()
        .map(|(k, v)| AnswerOption { label: k.clone(), text: value_text(v) })
        .collect();
      scorable_or_open(question, options, obj.get("correct").and_then(Value::as_str))
    }
    Some(Value::Array(lines)) => Question::MultipleChoiceLines {
      question,
      options: lines.iter().map(value_text).collect(),
    },
    _ if !question.is_empty() => Question::PlainText { question },
    _ => Question::OpenEnded { question: entry.to_string() },
  }
}

/// Normalize option labels and keep the question scorable only when the labels
/// are unique and `correct` names one of them. Otherwise the question and its
/// options become one `open-ended` text.
pub fn scorable_or_open(question: String, options: Vec<AnswerOption>, correct: Option<&str>) -> Question {
  let options: Vec<AnswerOption> = options
    .into_iter()
    .map(|o| AnswerOption {
      label: normalize_label(&o.label).unwrap_or_else(|| o.label.trim().to_string()),
      text: o.text,
    })
    .collect();

  let unique = options
    .iter()
    .enumerate()
    .all(|(i, o)| options[..i].iter().all(|earlier| earlier.label != o.label));
  let correct = correct
    .and_then(normalize_label)
    .filter(|c| unique && options.iter().any(|o| &o.label == c));

  match correct {
    Some(correct) => Question::MultipleChoiceStructured { question, options, correct },
    None => {
      debug!(target: "quiz", %question, unique, "Structured entry without a usable answer key; unscored");
      let mut text = question;
      for o in &options {
        text.push_str(&format!("\n{}) {}", o.label, o.text));
      }
      Question::OpenEnded { question: text }
    }
  }
}

/// Re-check a question that arrived from a client before grading it.
pub fn revalidate(question: Question) -> Question {
  match question {
    Question::MultipleChoiceStructured { question, options, correct } => {
      scorable_or_open(question, options, Some(correct.as_str()))
    }
    other => other,
  }
}

fn value_text(v: &Value) -> String {
  match v {
    Value::String(s) => s.trim().to_string(),
    other => other.to_string(),
  }
}

// ---- numbered text ----

/// Split on `<digits>.` markers that open a line. Text before the first marker
/// is preamble and dropped; without any marker the whole input is one block.
fn split_numbered_blocks(raw: &str) -> Vec<String> {
  let mut blocks: Vec<String> = Vec::new();
  let mut current: Option<String> = None;

  for line in raw.lines() {
    if let Some(rest) = strip_number_marker(line) {
      if let Some(done) = current.take() {
        blocks.push(done);
      }
      current = Some(rest.to_string());
    } else if let Some(block) = current.as_mut() {
      block.push('\n');
      block.push_str(line);
    }
  }
  if let Some(done) = current {
    blocks.push(done);
  }

  if blocks.is_empty() {
    blocks.push(raw.to_string());
  }

  blocks
    .into_iter()
    .map(|b| b.trim().to_string())
    .filter(|b| !b.is_empty())
    .collect()
}

/// `"  12. Who?"` -> `Some(" Who?")`. A decimal like `3.5` is not a marker.
/// Markdown emphasis and heading marks around the number are skipped, so
/// `**2.** Who?` and `### 2. Who?` count too.
fn strip_number_marker(line: &str) -> Option<&str> {
  let s = line.trim_start_matches(|c: char| c.is_whitespace() || is_markdown_mark(c));
  let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
  if digits == 0 {
    return None;
  }
  let rest = s[digits..].strip_prefix('.')?;
  match rest.chars().next() {
    Some(c) if c.is_ascii_digit() => None,
    _ => Some(rest.trim_start_matches(is_markdown_mark)),
  }
}

fn is_markdown_mark(c: char) -> bool { matches!(c, '*' | '#' | '_') }

fn block_question(block: &str) -> Option<Question> {
  let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
  let (first, rest) = lines.split_first()?;

  let options: Vec<String> = rest
    .iter()
    .filter(|l| option_line_label(l).is_some())
    .map(|l| l.to_string())
    .collect();

  if options.len() >= MIN_OPTION_LINES {
    Some(Question::MultipleChoiceLines { question: first.to_string(), options })
  } else if rest.is_empty() {
    Some(Question::PlainText { question: first.to_string() })
  } else {
    debug!(target: "quiz", options = options.len(), "Too few option lines; keeping block as open-ended");
    Some(Question::OpenEnded { question: block.to_string() })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn two_numbered_items_with_four_options_each() {
    let raw = "1. Q1\nA) x\nB) y\nC) z\nD) w\n2. Q2\nA) x\nB) y\nC) z\nD) w";
    let qs = parse_questions(raw);
    assert_eq!(qs.len(), 2);
    for (q, prompt) in qs.iter().zip(["Q1", "Q2"]) {
      match q {
        Question::MultipleChoiceLines { question, options } => {
          assert_eq!(question, prompt);
          assert_eq!(options, &vec!["A) x", "B) y", "C) z", "D) w"]);
        }
        other => panic!("unexpected kind {}", other.kind_name()),
      }
    }
  }

  #[test]
  fn cyrillic_indented_options_and_preamble() {
    let raw = "Вот вопросы:\n\n1. Кто является главным героем рассказа?\n   А) Молодой студент\n   Б) Пожилой профессор\n   В) Школьный учитель\n   Г) Маленький мальчик\n\n2. Где происходит действие?\n   а) В парке\n   б) В деревне\n   в) В музее\n   г) В школе\n";
    let qs = parse_questions(raw);
    assert_eq!(qs.len(), 2);
    assert_eq!(qs[0].prompt(), "Кто является главным героем рассказа?");
    match &qs[1] {
      Question::MultipleChoiceLines { options, .. } => {
        assert_eq!(options.len(), 4);
        assert_eq!(options[0], "а) В парке");
      }
      other => panic!("unexpected kind {}", other.kind_name()),
    }
  }

  #[test]
  fn unnumbered_input_is_a_single_unscored_question() {
    let raw = "  Describe the main character.\nUse two sentences.  ";
    let qs = parse_questions(raw);
    assert_eq!(qs, vec![Question::OpenEnded {
      question: "Describe the main character.\nUse two sentences.".into()
    }]);

    let single = parse_questions("What happened next?");
    assert_eq!(single, vec![Question::PlainText { question: "What happened next?".into() }]);
  }

  #[test]
  fn short_option_block_keeps_whole_block_and_rest_still_parse() {
    let raw = "1. Broken\nA) only\nB) two\n2. Fine\nA) a\nB) b\nC) c\nD) d";
    let qs = parse_questions(raw);
    assert_eq!(qs.len(), 2);
    assert_eq!(qs[0], Question::OpenEnded { question: "Broken\nA) only\nB) two".into() });
    assert_eq!(qs[1].kind_name(), "multiple-choice-lines");
  }

  #[test]
  fn decimals_and_inline_numbers_do_not_split() {
    let raw = "1. The trip took 2.5 hours. Why? It ended in 1990. Right?\nA) a\nB) b\nC) c\nD) d";
    let qs = parse_questions(raw);
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].prompt(), "The trip took 2.5 hours. Why? It ended in 1990. Right?");
  }

  #[test]
  fn structured_payload_maps_directly() {
    let raw = r#"{"questions":[{"question":"Who?","options":{"A":"Ann","B":"Bob","C":"Cid","D":"Dan"},"correct":"A"}]}"#;
    let qs = parse_questions(raw);
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].correct_label(), Some("A"));
    match &qs[0] {
      Question::MultipleChoiceStructured { options, .. } => {
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["A", "B", "C", "D"]);
      }
      other => panic!("unexpected kind {}", other.kind_name()),
    }
  }

  #[test]
  fn structured_option_order_is_preserved() {
    let raw = r#"{"questions":[{"question":"Q","options":{"D":"4","A":"1","C":"3","B":"2"},"correct":"c"}]}"#;
    let qs = parse_questions(raw);
    match &qs[0] {
      Question::MultipleChoiceStructured { options, correct, .. } => {
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["D", "A", "C", "B"]);
        assert_eq!(correct, "C");
      }
      other => panic!("unexpected kind {}", other.kind_name()),
    }
  }

  #[test]
  fn structured_entry_with_unknown_answer_is_unscored() {
    let raw = "```json\n{\"questions\":[{\"question\":\"Q\",\"options\":{\"A\":\"x\",\"B\":\"y\"},\"correct\":\"E\"},\"Free text\"]}\n```";
    let qs = parse_questions(raw);
    assert_eq!(qs.len(), 2);
    assert_eq!(qs[0], Question::OpenEnded { question: "Q\nA) x\nB) y".into() });
    assert_eq!(qs[1], Question::PlainText { question: "Free text".into() });
  }

  #[test]
  fn bold_and_heading_numbers_still_split() {
    let bold = "**1.** Q1\nA) x\nB) y\nC) z\nD) w\n**2.** Q2\nA) x\nB) y\nC) z\nD) w";
    let heading = "### 1. Q1\nA) x\nB) y\nC) z\nD) w\n### 2. Q2\nA) x\nB) y\nC) z\nD) w";
    for raw in [bold, heading] {
      let qs = parse_questions(raw);
      assert_eq!(qs.len(), 2, "{raw}");
      assert_eq!(qs[0].prompt(), "Q1");
      assert_eq!(qs[1].prompt(), "Q2");
      assert!(qs.iter().all(|q| q.kind_name() == "multiple-choice-lines"));
    }
  }

  #[test]
  fn case_duplicate_option_keys_are_not_scorable() {
    let raw = r#"{"questions":[{"question":"Q","options":{"a":"1","A":"2","B":"3"},"correct":"A"}]}"#;
    let qs = parse_questions(raw);
    assert_eq!(qs, vec![Question::OpenEnded { question: "Q\nA) 1\nA) 2\nB) 3".into() }]);
  }

  #[test]
  fn revalidate_normalizes_or_demotes_client_questions() {
    let opts = |labels: &[&str]| -> Vec<AnswerOption> {
      labels.iter().map(|l| AnswerOption { label: l.to_string(), text: format!("t{l}") }).collect()
    };

    let fixed = revalidate(Question::MultipleChoiceStructured { question: "Q".into(), options: opts(&["a", "b"]), correct: "a".into() });
    assert_eq!(fixed.correct_label(), Some("A"));
    assert!(fixed.offers_label("B"));

    let demoted = revalidate(Question::MultipleChoiceStructured { question: "Q".into(), options: opts(&["a", "b"]), correct: "Z".into() });
    assert_eq!(demoted, Question::OpenEnded { question: "Q\nA) ta\nB) tb".into() });

    let lines = Question::PlainText { question: "Why?".into() };
    assert_eq!(revalidate(lines.clone()), lines);
  }

  #[test]
  fn degenerate_inputs_do_not_panic() {
    assert!(parse_questions("").is_empty());
    assert!(parse_questions("1.\n2.\n   \n").is_empty());
    assert_eq!(parse_questions("{not json").len(), 1);
    assert_eq!(parse_questions(r#"{"other": 1}"#).len(), 1);
  }
}
