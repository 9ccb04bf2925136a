/// Lowercase, trim and collapse internal whitespace runs to single spaces.
///
/// ```
/// use seeker_perception::normalize_goal_text;
///
/// assert_eq!(normalize_goal_text("  Red \t  BACKPACK\n"), "red backpack");
/// assert_eq!(normalize_goal_text(""), "");
/// ```
pub fn normalize_goal_text(goal_text: &str) -> String {
    goal_text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(normalize_goal_text("Red  Backpack"), "red backpack");
        assert_eq!(normalize_goal_text("\n red\n\nbackpack "), "red backpack");
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(normalize_goal_text("   \t "), "");
    }

    #[test]
    fn punctuation_is_kept() {
        assert_eq!(normalize_goal_text("Mug (blue)"), "mug (blue)");
    }
}
