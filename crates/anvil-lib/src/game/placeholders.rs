//! Template interpolation shared by the processor pipeline and the launcher.
//!
//! Unknown tokens are left in place verbatim. Interpolation never fails.

use std::collections::HashMap;

/// Symbolic name to concrete value.
pub type PlaceholderMap = HashMap<String, String>;

/// Placeholder delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `{TOKEN}`, used by installer processors.
    Braces,
    /// `${token}`, used by launch argument templates.
    Dollar,
}

impl Syntax {
    fn opener(self) -> &'static str {
        match self {
            Syntax::Braces => "{",
            Syntax::Dollar => "${",
        }
    }
}

/// Substitute every known token in `template`.
pub fn interpolate(template: &str, map: &PlaceholderMap, syntax: Syntax) -> String {
    interpolate_with(template, map, syntax, |v| v.to_string())
}

/// Substitute every known token, wrapping values that contain a space in
/// double quotes.
pub fn interpolate_quoted(template: &str, map: &PlaceholderMap, syntax: Syntax) -> String {
    interpolate_with(template, map, syntax, quote_if_spaced)
}

fn interpolate_with(
    template: &str,
    map: &PlaceholderMap,
    syntax: Syntax,
    render: impl Fn(&str) -> String,
) -> String {
    let opener = syntax.opener();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(opener) {
        out.push_str(&rest[..start]);
        let after = &rest[start + opener.len()..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match map.get(key) {
                    Some(value) => out.push_str(&render(value)),
                    None => {
                        out.push_str(opener);
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Wrap `value` in double quotes when it contains a space and is not quoted already.
pub fn quote_if_spaced(value: &str) -> String {
    let already_quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if value.contains(' ') && !already_quoted {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Strip a surrounding `'...'` literal marker.
pub fn strip_literal(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> PlaceholderMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn braces_substitution() {
        let vars = map(&[("SIDE", "client"), ("MINECRAFT_JAR", "/v/1.20.1.jar")]);
        assert_eq!(
            interpolate("--side={SIDE} --jar {MINECRAFT_JAR}", &vars, Syntax::Braces),
            "--side=client --jar /v/1.20.1.jar"
        );
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let vars = map(&[("known", "x")]);
        assert_eq!(
            interpolate("${unknown} ${known}", &vars, Syntax::Dollar),
            "${unknown} x"
        );
        assert_eq!(interpolate("{MISSING}", &vars, Syntax::Braces), "{MISSING}");
        assert_eq!(interpolate("open { only", &vars, Syntax::Braces), "open { only");
    }

    #[test]
    fn dollar_syntax_ignores_bare_braces() {
        let vars = map(&[("a", "1")]);
        assert_eq!(interpolate("{a}-${a}", &vars, Syntax::Dollar), "{a}-1");
    }

    #[test]
    fn quoting_only_when_spaced() {
        let vars = map(&[("game_directory", "/home/me/My Games"), ("user", "Steve")]);
        assert_eq!(
            interpolate_quoted("${game_directory}", &vars, Syntax::Dollar),
            "\"/home/me/My Games\""
        );
        assert_eq!(interpolate_quoted("${user}", &vars, Syntax::Dollar), "Steve");
        assert_eq!(quote_if_spaced("\"already quoted\""), "\"already quoted\"");
    }

    #[test]
    fn literal_markers_are_stripped() {
        assert_eq!(strip_literal("'abc'"), "abc");
        assert_eq!(strip_literal("abc"), "abc");
        assert_eq!(strip_literal("'"), "'");
    }
}
