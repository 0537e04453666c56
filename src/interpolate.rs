//! Environment-variable interpolation for configuration values.
//!
//! Supports `${VAR}` and `${VAR:-default}`. A default starting with `~` is
//! expanded to the home directory.

/// Replace `${VAR}` and `${VAR:-default}` in a string.
pub fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_expr.push(c);
            }
            if closed {
                result.push_str(&resolve_var_expr(&var_expr));
            } else {
                // Unterminated: keep the text as written.
                result.push_str("${");
                result.push_str(&var_expr);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        match std::env::var(var_name) {
            Ok(value) if !value.is_empty() => value,
            _ => expand_tilde(default),
        }
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
///
/// Uses `dirs::home_dir()` for cross-platform support (works on macOS,
/// Linux, and Windows where `$HOME` may not be set).
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__RELAY_TEST_UNSET_VAR__");
        let input = "${__RELAY_TEST_UNSET_VAR__:-/fallback/path}";
        assert_eq!(interpolate_env_vars(input), "/fallback/path");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__RELAY_TEST_SET_VAR__", "/custom/path");
        let input = "prefix:${__RELAY_TEST_SET_VAR__:-/fallback/path}:suffix";
        assert_eq!(interpolate_env_vars(input), "prefix:/custom/path:suffix");
        std::env::remove_var("__RELAY_TEST_SET_VAR__");
    }

    #[test]
    fn test_interpolate_unset_without_default_is_empty() {
        std::env::remove_var("__RELAY_TEST_MISSING__");
        assert_eq!(interpolate_env_vars("a${__RELAY_TEST_MISSING__}b"), "ab");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with $dollar and no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_interpolate_unterminated_is_kept() {
        assert_eq!(interpolate_env_vars("${OOPS"), "${OOPS");
    }

    #[test]
    fn test_expand_tilde() {
        let result = expand_tilde("~/Documents");
        assert!(!result.starts_with('~'), "tilde should be expanded");
        assert!(result.ends_with("/Documents"));
    }
}
