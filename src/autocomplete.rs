//! Placeholder word completion for partially typed input

/// Number of options offered per request
pub const OPTION_COUNT: usize = 3;

/// Expand `input` into `OPTION_COUNT` placeholder completions
#[must_use]
pub fn expand(input: &str) -> Vec<String> {
    (1..=OPTION_COUNT).map(|i| format!("{input}word {i}")).collect()
}
