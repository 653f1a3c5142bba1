//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Unknown placeholders are left as they are.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Strip the quote marks models like to wrap titles in.
pub fn clean_title(raw: &str) -> String {
  raw
    .chars()
    .filter(|c| !matches!(c, '"' | '\'' | '“' | '”' | '«' | '»' | '„'))
    .collect::<String>()
    .trim()
    .to_string()
}

/// Log-safe preview: the first `max` characters.
pub fn preview(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}
