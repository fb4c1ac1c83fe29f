//! Small utility helpers used across modules.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn placeholder_regex() -> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok()).as_ref()
}

/// Very small and safe string templating.
/// Replaces `{key}` placeholders with the provided values in one pass over
/// the template; substituted text is never expanded again. Unknown
/// placeholders and JSON braces are left untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let Some(re) = placeholder_regex() else {
    return tpl.to_string();
  };
  re.replace_all(tpl, |caps: &Captures| {
    let key = &caps[1];
    match pairs.iter().find(|(k, _)| *k == key) {
      Some((_, v)) => v.to_string(),
      None => caps[0].to_string(),
    }
  })
  .into_owned()
}

/// Log-safe truncation for large strings (model output can be huge).
/// Cuts on a char boundary at or below `max` bytes.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence_and_leaves_json_braces() {
    let out = fill_template("{count} items\n{\n  \"n\": {count}\n}", &[("count", "3")]);
    assert_eq!(out, "3 items\n{\n  \"n\": 3\n}");
  }

  #[test]
  fn fill_template_does_not_expand_placeholders_inside_values() {
    let out = fill_template(
      "{specs}\n{constraints}\n{unknown}",
      &[("specs", "topic: {constraints} {examples}"), ("constraints", "RULE")],
    );
    assert_eq!(out, "topic: {constraints} {examples}\nRULE\n{unknown}");
  }

  #[test]
  fn trunc_for_log_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let out = trunc_for_log("café au lait", 4);
    assert!(out.starts_with("caf…"));
    assert!(out.ends_with("(13 bytes total)"));
  }
}
