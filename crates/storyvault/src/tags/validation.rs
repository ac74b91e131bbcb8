//! Tag name validation and normalization.
//!
//! Tag names are free text (a writer tags things `Main cast` or `Act two`), so the rules
//! are looser than identifier rules:
//! - Must not be empty after trimming
//! - No control characters
//! - At most [`MAX_TAG_NAME_LEN`] characters
//!
//! Stored names are normalized: first letter upper case, the rest lower case.

pub const MAX_TAG_NAME_LEN: usize = 50;

/// Trims and validates a tag name, returning its normalized form.
///
/// # Examples
/// ```
/// use storyvault::tags::validation::validate_tag_name;
///
/// assert_eq!(validate_tag_name("  villain ").unwrap(), "Villain");
/// assert_eq!(validate_tag_name("MAIN CAST").unwrap(), "Main cast");
/// assert!(validate_tag_name("   ").is_err());
/// ```
pub fn validate_tag_name(name: &str) -> Result<String, TagValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TagValidationError::Empty);
    }
    if let Some(ch) = trimmed.chars().find(|c| c.is_control()) {
        return Err(TagValidationError::InvalidCharacter(ch));
    }
    let len = trimmed.chars().count();
    if len > MAX_TAG_NAME_LEN {
        return Err(TagValidationError::TooLong(len));
    }
    Ok(normalize_tag_name(trimmed))
}

/// First character upper case, everything after it lower case. Inner whitespace is kept.
pub fn normalize_tag_name(name: &str) -> String {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Error type for tag name validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValidationError {
    /// Tag name is empty or whitespace
    Empty,
    /// Tag name contains a control character
    InvalidCharacter(char),
    /// Tag name is longer than [`MAX_TAG_NAME_LEN`]
    TooLong(usize),
}

impl std::fmt::Display for TagValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValidationError::Empty => write!(f, "tag name cannot be empty"),
            TagValidationError::InvalidCharacter(ch) => {
                write!(f, "tag name contains invalid character {:?}", ch)
            }
            TagValidationError::TooLong(len) => write!(
                f,
                "tag name is {} characters long (at most {} allowed)",
                len, MAX_TAG_NAME_LEN
            ),
        }
    }
}

impl std::error::Error for TagValidationError {}
