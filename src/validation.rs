//! Input rules shared by the create and patch handlers, plus the free-text sanitizer.

use crate::error::{AppError, FieldError};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_URL_LEN: usize = 2048;
pub const MAX_CATEGORY_NAME_LEN: usize = 80;
pub const MAX_COLOR_NAME_LEN: usize = 50;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=80;
pub const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=128;

/// Violations
///
/// Collects every failed rule of one payload so the client sees all of them in a single
/// `validation_error` response instead of fixing fields one round-trip at a time.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: &str) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn check(&mut self, field: &str, ok: bool, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }

    /// Required text: sanitized, non-empty, at most `max` characters.
    pub fn required_text(&mut self, field: &str, value: &str, max: usize) -> String {
        let clean = sanitize_text(value);
        if clean.is_empty() {
            self.push(field, "is required");
        } else if clean.chars().count() > max {
            self.push(field, &format!("must be at most {max} characters"));
        }
        clean
    }

    pub fn url(&mut self, field: &str, value: &str) -> String {
        let trimmed = value.trim().to_string();
        if trimmed.len() > MAX_URL_LEN {
            self.push(field, &format!("must be at most {MAX_URL_LEN} characters"));
        } else if has_script_scheme(&trimmed) {
            self.push(field, "must not use a script URL scheme");
        }
        trimmed
    }

    pub fn hex_color(&mut self, field: &str, value: &str) -> String {
        let trimmed = value.trim().to_string();
        self.check(field, is_hex_color(&trimmed), "must be a hex color like #1A2B3C");
        trimmed
    }

    // Blank optional inputs collapse to `None` in the three helpers below.

    pub fn optional_url(&mut self, field: &str, value: Option<String>) -> Option<String> {
        value.map(|v| self.url(field, &v)).filter(|v| !v.is_empty())
    }

    pub fn optional_hex_color(&mut self, field: &str, value: Option<String>) -> Option<String> {
        value
            .filter(|v| !v.trim().is_empty())
            .map(|v| self.hex_color(field, &v))
    }

    pub fn optional_text(&mut self, field: &str, value: Option<String>, max: usize) -> Option<String> {
        let clean = optional_text(value);
        if clean.as_ref().is_some_and(|text| text.chars().count() > max) {
            self.push(field, &format!("must be at most {max} characters"));
        }
        clean
    }
}

/// `^#[0-9A-Fa-f]{6}$`
pub fn is_hex_color(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit)
}

/// has_script_scheme
///
/// True for `javascript:` and `vbscript:` URLs. Browsers ignore whitespace and control
/// characters inside the scheme, so those are skipped before comparing.
pub fn has_script_scheme(url: &str) -> bool {
    let scheme: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take_while(|c| *c != ':')
        .collect::<String>()
        .to_ascii_lowercase();
    let has_colon = url.contains(':');
    has_colon && matches!(scheme.as_str(), "javascript" | "vbscript")
}

/// normalize_username
///
/// Trims and lowercases, then checks length and the `[A-Za-z0-9_-]` alphabet.
pub fn normalize_username(raw: &str) -> Result<String, &'static str> {
    let name = raw.trim().to_lowercase();
    if !USERNAME_LEN.contains(&name.chars().count()) {
        return Err("must be between 3 and 80 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("may only contain letters, digits, '-' and '_'");
    }
    Ok(name)
}

pub fn check_password(password: &str) -> Result<(), &'static str> {
    if PASSWORD_LEN.contains(&password.chars().count()) {
        Ok(())
    } else {
        Err("must be between 6 and 128 characters")
    }
}

/// Optional free text: sanitized, and empty results collapse to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| sanitize_text(&v))
        .filter(|v| !v.is_empty())
}

// --- Sanitizer ---

/// sanitize_text
///
/// Strips `<script>` and `<iframe>` blocks, `javascript:` URIs and inline `on*=` event
/// handlers from user-supplied text, then trims it. Matching is ASCII case-insensitive.
/// An opening tag with no closing tag drops the remainder of the input. Passes repeat until
/// nothing changes, so removals cannot splice a new match together.
pub fn sanitize_text(input: &str) -> String {
    let mut current = strip_once(input);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current.trim().to_string();
        }
        current = next;
    }
}

fn strip_once(input: &str) -> String {
    let without_scripts = strip_blocks(input, "<script", "</script>");
    let without_frames = strip_blocks(&without_scripts, "<iframe", "</iframe>");
    let without_uris = strip_all(&without_frames, "javascript:");
    strip_event_handlers(&without_uris)
}

// ASCII lowercasing keeps byte offsets aligned with the original string.
fn strip_blocks(input: &str, open: &str, close: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(open).map(|i| pos + i) {
        out.push_str(&input[pos..start]);
        match lower[start..].find(close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                pos = input.len();
                break;
            }
        }
    }
    out.push_str(&input[pos..]);
    out
}

fn strip_all(input: &str, needle: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(needle).map(|i| pos + i) {
        out.push_str(&input[pos..start]);
        pos = start + needle.len();
    }
    out.push_str(&input[pos..]);
    out
}

// Removes `on<word><spaces>=` where `on` starts a word.
fn strip_event_handlers(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut i = 0;

    while i + 2 < bytes.len() {
        let starts_word = i == 0 || !is_word_byte(bytes[i - 1]);
        if starts_word && bytes[i].eq_ignore_ascii_case(&b'o') && bytes[i + 1].eq_ignore_ascii_case(&b'n') {
            let mut j = i + 2;
            while j < bytes.len() && is_word_byte(bytes[j]) {
                j += 1;
            }
            let name_len = j - (i + 2);
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if name_len > 0 && j < bytes.len() && bytes[j] == b'=' {
                out.push_str(&input[copied..i]);
                copied = j + 1;
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&input[copied..]);
    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#1a2B3c"));
        assert!(!is_hex_color("1a2b3c"));
        assert!(!is_hex_color("#1a2b3"));
        assert!(!is_hex_color("#1a2b3g"));
        assert!(!is_hex_color("#1a2b3c0"));
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(normalize_username("  Alice_01 ").as_deref(), Ok("alice_01"));
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("bad name").is_err());
        assert!(normalize_username(&"x".repeat(81)).is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(check_password("12345").is_err());
        assert!(check_password("123456").is_ok());
        assert!(check_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_sanitizer_strips_scripts_and_handlers() {
        assert_eq!(sanitize_text("Hi <SCRIPT>alert(1)</script>there"), "Hi there");
        assert_eq!(sanitize_text("<iframe src=x></iframe>Docs"), "Docs");
        assert_eq!(sanitize_text("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_text("<img onerror = x>"), "<img  x>");
        assert_eq!(sanitize_text("  condition=ok  "), "condition=ok");
        assert_eq!(sanitize_text("tail <script>never closed"), "tail");
    }

    #[test]
    fn test_sanitizer_repeats_until_clean() {
        assert_eq!(sanitize_text("javajavascript:script:alert(1)"), "alert(1)");
        assert_eq!(sanitize_text("<scr<script>x</script>ipt>y</script>z"), "z");
    }

    #[test]
    fn test_script_url_schemes_rejected() {
        assert!(has_script_scheme("javascript:alert(1)"));
        assert!(has_script_scheme(" JaVa\tScRiPt:alert(1)"));
        assert!(has_script_scheme("vbscript:msgbox"));
        assert!(!has_script_scheme("https://intranet.example/javascript:docs"));
        assert!(!has_script_scheme("/api/files/plan.pdf"));

        let mut v = Violations::new();
        assert_eq!(v.url("url", "  javascript:alert(1) "), "javascript:alert(1)");
        v.url("image_url", "https://ok.example/a.png");
        match v.finish() {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "url");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_sanitizer_keeps_unicode() {
        assert_eq!(sanitize_text("Horário ônibus"), "Horário ônibus");
    }

    #[test]
    fn test_violations_collect_every_field() {
        let mut v = Violations::new();
        v.required_text("title", "   ", MAX_TITLE_LEN);
        v.hex_color("color", "red");
        match v.finish() {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["title", "color"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
