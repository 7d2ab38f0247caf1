//! Interpretation of yes/no answers.

/// Return true for `y` or `yes` (case-insensitive, surrounding whitespace ignored).
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_ascii_lowercase();
    answer == "y" || answer == "yes"
}
