//! `${VAR}` expansion for raw config text.
//!
//! Supported forms:
//! - `${VAR}`: value of `VAR`; left untouched when unset
//! - `${VAR:-fallback}`: value of `VAR`, or `fallback` when unset or empty
//! - `$${`: a literal `${`
//!
//! An unterminated placeholder is copied through verbatim.

pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find("${") {
        let (before, after) = rest.split_at(pos);
        if let Some(prefix) = before.strip_suffix('$') {
            out.push_str(prefix);
            out.push_str("${");
            rest = &after[2..];
            continue;
        }
        out.push_str(before);

        let body = &after[2..];
        let Some(end) = body.find('}') else {
            out.push_str(after);
            return out;
        };
        let inner = &body[..end];
        rest = &body[end + 1..];

        let (name, fallback) = match inner.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (inner, None),
        };
        if name.is_empty() {
            out.push_str(&after[..end + 3]);
            continue;
        }

        match (lookup(name), fallback) {
            (Some(value), Some(fallback)) if value.is_empty() => out.push_str(fallback),
            (Some(value), _) => out.push_str(&value),
            (None, Some(fallback)) => out.push_str(fallback),
            (None, None) => out.push_str(&after[..end + 3]),
        }
    }

    out.push_str(rest);
    out
}
