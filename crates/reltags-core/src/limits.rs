//! Input validation limits for tag names

/// Maximum length for tag names (256 bytes)
pub const MAX_TAG_NAME_LEN: usize = 256;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    TagNameTooLong { len: usize, max: usize },
    EmptyTagName,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TagNameTooLong { len, max } => {
                write!(f, "Tag name too long: {} bytes (max {})", len, max)
            }
            Self::EmptyTagName => write!(f, "Tag name cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate tag name
pub fn validate_tag_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyTagName);
    }
    if name.len() > MAX_TAG_NAME_LEN {
        return Err(ValidationError::TagNameTooLong {
            len: name.len(),
            max: MAX_TAG_NAME_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tag_name() {
        assert!(validate_tag_name("fruit").is_ok());
        assert_eq!(validate_tag_name(""), Err(ValidationError::EmptyTagName));
        assert!(validate_tag_name(&"x".repeat(300)).is_err());
        assert!(validate_tag_name(&"x".repeat(MAX_TAG_NAME_LEN)).is_ok());
    }
}
