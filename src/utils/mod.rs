//! Project-specific utilities live here.

use serde_json::json;
use shelf_http::error::AppError;

/// Case-folded form of `text` used for case-insensitive matching.
///
/// SQLite only folds ASCII, so folded copies are stored next to the
/// original and compared against folded search terms.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Turn free text into an FTS5 query matching rows containing every word.
///
/// Each word is quoted, so FTS5 operators in user input are taken literally.
/// Returns `None` when the text has no words at all.
pub fn fts_query(text: &str) -> Option<String> {
    let words: Vec<String> = text
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{word}\""))
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Trimmed value of a required text field, or a validation error naming it.
pub fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(
            vec![json!({"field": field, "error": "may not be blank"})],
            format!("{field} may not be blank"),
        ));
    }
    Ok(trimmed.to_string())
}
