//! Text normalization shared by retrieval and the embedder.

/// Lowercase, trim, strip punctuation and split on whitespace.
///
/// Word characters (alphanumerics and `_`) and whitespace survive; everything
/// else is removed, so `"Red-backpack!"` becomes the single token
/// `"redbackpack"`. Empty tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let stripped: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().map(str::to_string).collect()
}
