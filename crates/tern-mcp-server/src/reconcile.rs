//! Name reconciliation
//!
//! Binds a declared name (snake_case preferred) to a class member whose
//! name may use another convention. Search order: exact, snake_case,
//! camelCase, PascalCase, kebab-case. Non-exact matches warn; no match
//! raises a configuration error listing every variant tried, the members
//! present, and lexically similar candidates.

use tracing::warn;

use tern_mcp_protocol::{McpError, McpResult};

/// Which variant produced the binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameVariant {
    Exact,
    Snake,
    Camel,
    Pascal,
    Kebab,
}

impl NameVariant {
    pub fn label(&self) -> &'static str {
        match self {
            NameVariant::Exact => "exact",
            NameVariant::Snake => "snake_case",
            NameVariant::Camel => "camelCase",
            NameVariant::Pascal => "PascalCase",
            NameVariant::Kebab => "kebab-case",
        }
    }
}

/// A successful binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub member: String,
    pub variant: NameVariant,
}

/// Split an identifier into lowercase words on `_`, `-`, and case/digit
/// boundaries
fn words(name: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    let mut prev_digit = false;

    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            prev_digit = false;
            continue;
        }
        let boundary = (ch.is_uppercase() && prev_lower)
            || (ch.is_ascii_digit() != prev_digit && !current.is_empty() && ch.is_ascii_digit());
        if boundary && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
        prev_lower = ch.is_lowercase();
        prev_digit = ch.is_ascii_digit();
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn to_snake_case(name: &str) -> String {
    words(name).join("_")
}

pub fn to_kebab_case(name: &str) -> String {
    words(name).join("-")
}

pub fn to_camel_case(name: &str) -> String {
    let parts = words(name);
    let mut out = String::new();
    for (i, word) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

pub fn to_pascal_case(name: &str) -> String {
    words(name).iter().map(|w| capitalize(w)).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Bind a declared name against the available members.
///
/// Exact match wins even when other variants also exist; any non-exact
/// match emits a warning naming the preferred spelling.
pub fn reconcile(declared: &str, members: &[String]) -> McpResult<Reconciled> {
    let attempts = [
        (NameVariant::Exact, declared.to_string()),
        (NameVariant::Snake, to_snake_case(declared)),
        (NameVariant::Camel, to_camel_case(declared)),
        (NameVariant::Pascal, to_pascal_case(declared)),
        (NameVariant::Kebab, to_kebab_case(declared)),
    ];

    for (variant, candidate) in &attempts {
        if members.iter().any(|m| m == candidate) {
            if *variant != NameVariant::Exact {
                warn!(
                    declared,
                    member = %candidate,
                    "bound '{}' via {} variant; prefer renaming the member to '{}'",
                    declared,
                    variant.label(),
                    declared
                );
            }
            return Ok(Reconciled {
                member: candidate.clone(),
                variant: *variant,
            });
        }
    }

    let tried: Vec<String> = attempts
        .iter()
        .map(|(v, c)| format!("{} ({})", c, v.label()))
        .collect();
    let mut similar: Vec<(usize, &String)> = members
        .iter()
        .map(|m| (levenshtein(declared, m), m))
        .filter(|(d, _)| *d <= 3)
        .collect();
    similar.sort();
    let suggestions: Vec<String> = similar.iter().take(3).map(|(_, m)| (*m).clone()).collect();

    let mut message = format!(
        "no member binds the declared name '{}'; tried {}; members present: [{}]",
        declared,
        tried.join(", "),
        members.join(", ")
    );
    if !suggestions.is_empty() {
        message.push_str(&format!("; did you mean {}?", suggestions.join(" or ")));
    }
    Err(McpError::configuration(message))
}

/// Plain Levenshtein distance, for the suggestion list
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_snake_case("createUser"), "create_user");
        assert_eq!(to_camel_case("create_user"), "createUser");
        assert_eq!(to_pascal_case("create_user"), "CreateUser");
        assert_eq!(to_kebab_case("createUser"), "create-user");
        assert_eq!(to_camel_case("get-weather"), "getWeather");
    }

    #[test]
    fn test_digit_boundaries() {
        assert_eq!(to_kebab_case("readFile2"), "read-file-2");
        assert_eq!(to_snake_case("read-file-2"), "read_file_2");
    }

    #[test]
    fn test_exact_match_wins_over_variants() {
        let members = vec!["create_user".to_string(), "createUser".to_string()];
        let bound = reconcile("create_user", &members).unwrap();
        assert_eq!(bound.member, "create_user");
        assert_eq!(bound.variant, NameVariant::Exact);
    }

    #[test]
    fn test_camel_variant_binds() {
        let members = vec!["createUser".to_string()];
        let bound = reconcile("create_user", &members).unwrap();
        assert_eq!(bound.member, "createUser");
        assert_eq!(bound.variant, NameVariant::Camel);
    }

    #[test]
    fn test_pascal_and_kebab_variants() {
        let members = vec!["CreateUser".to_string()];
        assert_eq!(
            reconcile("create_user", &members).unwrap().variant,
            NameVariant::Pascal
        );
        let members = vec!["create-user".to_string()];
        assert_eq!(
            reconcile("create_user", &members).unwrap().variant,
            NameVariant::Kebab
        );
    }

    #[test]
    fn test_missing_binding_lists_variants_and_suggestions() {
        let members = vec!["createUsr".to_string(), "deleteUser".to_string()];
        let err = reconcile("create_user", &members).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("create_user"));
        assert!(message.contains("camelCase"));
        assert!(message.contains("createUsr"));
        assert!(message.contains("did you mean"));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
    }
}
