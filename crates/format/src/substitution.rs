// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `$ENV{VAR}` substitution, applied to every field read out of a workflow
//! file. An unset variable is a hard parse error rather than an empty
//! string, so a missing secret fails the load instead of silently becoming
//! blank.

use regex::Regex;

use crate::FormatError;

fn pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\$ENV\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
    })
}

pub fn substitute_env(input: &str) -> Result<String, FormatError> {
    let re = pattern();
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in re.captures_iter(input) {
        #[allow(clippy::unwrap_used)]
        let whole = caps.get(0).unwrap();
        #[allow(clippy::unwrap_used)]
        let var_name = caps.get(1).unwrap().as_str();
        out.push_str(&input[last..whole.start()]);
        let value = std::env::var(var_name)
            .map_err(|_| FormatError::MissingEnvVar(var_name.to_string()))?;
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

#[cfg(test)]
#[path = "substitution_tests.rs"]
mod tests;
