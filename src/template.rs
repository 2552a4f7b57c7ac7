//! Marker substitution for generated-source templates.
//!
//! Markers are whole `// {{KEY}}` tokens matched literally. All positions are
//! located in the original template before anything is spliced, so generated
//! text is never rescanned and key order cannot change the result.
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Marker key to the aggregate text that replaces it.
pub type ReplacementMap = BTreeMap<String, String>;

const MARKER_PATTERN: &str = r"//[ \t]*\{\{([A-Za-z0-9_]+)\}\}";

/// Substituted text plus what did not line up between template and map.
#[derive(Debug, Default)]
pub struct Substitution {
    pub text: String,
    /// Keys with no marker in the template; their content is dropped.
    pub unused_keys: Vec<String>,
    /// Keys whose marker appears more than once; only the first is replaced.
    pub repeated_keys: Vec<String>,
    /// Marker-shaped tokens with no replacement; left untouched.
    pub unknown_markers: Vec<String>,
}

/// Literal marker token for `key`.
pub fn marker(key: &str) -> String {
    format!("// {{{{{key}}}}}")
}

pub fn substitute(template: &str, replacements: &ReplacementMap) -> Result<Substitution> {
    let mut spans: Vec<(usize, usize, &str)> = Vec::new();
    let mut unused_keys = Vec::new();
    let mut repeated_keys = Vec::new();
    for (key, value) in replacements {
        let token = marker(key);
        let mut found = template.match_indices(token.as_str());
        match found.next() {
            Some((start, _)) => {
                spans.push((start, start + token.len(), value.as_str()));
                if found.next().is_some() {
                    repeated_keys.push(key.clone());
                }
            }
            None => unused_keys.push(key.clone()),
        }
    }
    spans.sort_by_key(|(start, _, _)| *start);

    let mut text = String::with_capacity(
        template.len() + spans.iter().map(|(_, _, value)| value.len()).sum::<usize>(),
    );
    let mut cursor = 0;
    for (start, end, value) in spans {
        text.push_str(&template[cursor..start]);
        text.push_str(value);
        cursor = end;
    }
    text.push_str(&template[cursor..]);

    Ok(Substitution {
        text,
        unused_keys,
        repeated_keys,
        unknown_markers: unknown_markers(template, replacements)?,
    })
}

fn unknown_markers(template: &str, replacements: &ReplacementMap) -> Result<Vec<String>> {
    let pattern = Regex::new(MARKER_PATTERN).context("compile marker pattern")?;
    let unknown: BTreeSet<String> = pattern
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|key| key.as_str())
        .filter(|key| !replacements.contains_key(*key))
        .map(str::to_string)
        .collect();
    Ok(unknown.into_iter().collect())
}
