//! Approximate token counting for the context budget.
//!
//! The budget is a word count: cheap, deterministic, and close enough to
//! keep the prompt inside the model's window.

/// Count whitespace-separated words.
pub fn count(text: &str) -> usize {
    text.split_whitespace().count()
}
