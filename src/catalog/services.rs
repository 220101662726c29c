use lazy_static::lazy_static;
use regex::Regex;

use crate::catalog::dto::NewTag;
use crate::error::ValidationError;

const NAME_MAX_LEN: usize = 200;

lazy_static! {
    static ref HEX_COLOR_RE: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
    static ref SLUG_RE: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap();
}

/// `LIKE` pattern matching names that start with `prefix`, case-insensitively.
/// The caller compares against `lower(name)`.
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn validate_new_tag(tag: &NewTag) -> Result<(), ValidationError> {
    let name_len = tag.name.trim().chars().count();
    if name_len == 0 || name_len > NAME_MAX_LEN {
        return Err(ValidationError::field(
            "name",
            format!("must be between 1 and {NAME_MAX_LEN} characters"),
        ));
    }
    if !HEX_COLOR_RE.is_match(&tag.color) {
        return Err(ValidationError::field("color", "expected a #RRGGBB hex color"));
    }
    if tag.slug.len() > NAME_MAX_LEN || !SLUG_RE.is_match(&tag.slug) {
        return Err(ValidationError::field(
            "slug",
            "may contain only letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(color: &str, slug: &str) -> NewTag {
        NewTag {
            name: "Breakfast".into(),
            color: color.into(),
            slug: slug.into(),
        }
    }

    #[test]
    fn prefix_pattern_lowercases_and_escapes() {
        assert_eq!(prefix_pattern(" Sal "), "sal%");
        assert_eq!(prefix_pattern("50%_x"), "50\\%\\_x%");
        assert_eq!(prefix_pattern(""), "%");
    }

    #[test]
    fn tag_color_must_be_hex() {
        assert!(validate_new_tag(&tag("#E26C2D", "breakfast")).is_ok());
        assert!(validate_new_tag(&tag("orange", "breakfast")).is_err());
        assert!(validate_new_tag(&tag("#E26C2", "breakfast")).is_err());
    }

    #[test]
    fn tag_slug_charset() {
        assert!(validate_new_tag(&tag("#000000", "late-night_snack")).is_ok());
        assert!(validate_new_tag(&tag("#000000", "late night")).is_err());
    }
}
