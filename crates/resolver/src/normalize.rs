/// Normalize raw command text per spec.md §4.2 step 3: trim, lowercase the
/// leading token, strip a configured prefix. Returns the normalized leading
/// token and the remaining context text.
#[must_use]
pub fn normalize_command(raw: &str, prefixes: &[String]) -> (String, String) {
    let trimmed = raw.trim();
    let mut rest = trimmed;
    for prefix in prefixes {
        if let Some(stripped) = rest.strip_prefix(prefix.as_str()) {
            rest = stripped;
            break;
        }
    }
    let mut parts = rest.splitn(2, char::is_whitespace);
    let token = parts.next().unwrap_or("").to_lowercase();
    let context_text = parts.next().unwrap_or("").trim().to_string();
    (token, context_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_configured_prefix_and_lowercases_token() {
        let (token, rest) = normalize_command("  !Weather London ", &["!".to_string()]);
        assert_eq!(token, "weather");
        assert_eq!(rest, "London");
    }

    #[test]
    fn no_prefix_configured_keeps_leading_char() {
        let (token, rest) = normalize_command("weather London", &[]);
        assert_eq!(token, "weather");
        assert_eq!(rest, "London");
    }

    #[test]
    fn single_token_has_empty_context() {
        let (token, rest) = normalize_command("!ping", &["!".to_string()]);
        assert_eq!(token, "ping");
        assert_eq!(rest, "");
    }
}
