//! Input validation helpers shared by the state machines and the API layer.

use crate::error::ValidationError;

/// Reject empty or whitespace-only text.
pub fn non_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Reject text longer than `max` characters.
pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let count = value.chars().count();
    if count > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters, got {count}"),
        ));
    }
    Ok(())
}

/// Reject values outside `min..=max`.
pub fn in_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), ValidationError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
    Ok(())
}

/// Unwrap a required optional field.
pub fn required<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T, ValidationError> {
    value
        .as_ref()
        .ok_or_else(|| ValidationError::new(field, "is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blank_rejects_whitespace() {
        assert!(non_blank("body", "hi").is_ok());
        assert!(non_blank("body", "  \n\t").is_err());
    }

    #[test]
    fn max_chars_counts_characters_not_bytes() {
        assert!(max_chars("comment", "ééé", 3).is_ok());
        assert!(max_chars("comment", "éééé", 3).is_err());
    }

    #[test]
    fn in_range_is_inclusive() {
        assert!(in_range("rating", 1u8, 1, 5).is_ok());
        assert!(in_range("rating", 5u8, 1, 5).is_ok());
        let err = in_range("rating", 6u8, 1, 5).unwrap_err();
        assert_eq!(err.reason, "must be between 1 and 5, got 6");
    }

    #[test]
    fn required_names_the_field() {
        let missing: Option<u32> = None;
        assert_eq!(required("scheduled_for", &missing).unwrap_err().field, "scheduled_for");
        assert_eq!(required("scheduled_for", &Some(3)).unwrap(), &3);
    }
}
