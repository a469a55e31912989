//! Centralized validation and helper functions.

use crate::core::requirement::{Requirement, RequirementSet};

/// Maximum number of requirement nodes (components included) in one set
pub const MAX_REQUIREMENTS: usize = 10_000;

/// Maximum number of direct components a single requirement may list
pub const MAX_COMPONENTS_PER_REQUIREMENT: usize = 1_000;

/// Maximum number of capabilities a single provider may declare
pub const MAX_CAPABILITIES: usize = 100_000;

/// Hard cap on the configurable decomposition depth
pub const MAX_DEPTH_LIMIT: usize = 64;

/// Maximum identifier length
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Clamp a confidence into [0.0, 1.0]. NaN becomes 0.0.
///
/// # Examples
///
/// ```
/// use supply_solver::utils::validation::clamp_confidence;
///
/// assert_eq!(clamp_confidence(1.5), 1.0);
/// assert_eq!(clamp_confidence(-0.2), 0.0);
/// assert_eq!(clamp_confidence(f64::NAN), 0.0);
/// ```
#[must_use]
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Safely convert usize to f64 for averaging
#[inline]
#[must_use]
pub fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Validate that a string is usable as an identifier: non-empty, bounded, and made of
/// alphanumerics plus `-`, `_` and `.`.
#[must_use]
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_IDENTIFIER_LENGTH
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Turn a free-form name into an identifier.
///
/// Lower-cases, replaces runs of non-alphanumeric characters with a single `-`,
/// and trims leading/trailing dashes.
///
/// ```
/// use supply_solver::utils::validation::slugify;
///
/// assert_eq!(slugify("CNC Machining"), "cnc-machining");
/// assert_eq!(slugify("  3D  Printing (FDM) "), "3d-printing-fdm");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Check if adding another capability would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new capability.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_capability_limit(count: usize) -> Option<String> {
    if count >= MAX_CAPABILITIES {
        Some(format!(
            "Too many capabilities: adding another would exceed maximum of {MAX_CAPABILITIES}"
        ))
    } else {
        None
    }
}

/// Input validation error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Requirement set has {0} requirements, exceeding the maximum of {MAX_REQUIREMENTS}")]
    TooManyRequirements(usize),
    #[error("Requirement '{id}' lists {count} components, exceeding the maximum of {MAX_COMPONENTS_PER_REQUIREMENT}")]
    TooManyComponents { id: String, count: usize },
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("Depth limit {0} exceeds the maximum of {MAX_DEPTH_LIMIT}")]
    DepthLimitTooLarge(usize),
}

/// Validate the shape of a requirement set before matching.
///
/// # Errors
///
/// Returns an error if the set or any requirement is oversized, or an id is invalid.
pub fn validate_requirement_set(set: &RequirementSet) -> Result<(), ValidationError> {
    if !is_valid_identifier(&set.id) {
        return Err(ValidationError::InvalidIdentifier(set.id.clone()));
    }

    let total = set.total_requirements();
    if total > MAX_REQUIREMENTS {
        return Err(ValidationError::TooManyRequirements(total));
    }

    set.requirements
        .iter()
        .chain(set.library.iter().map(|entry| &entry.requirement))
        .try_for_each(validate_requirement)
}

fn validate_requirement(requirement: &Requirement) -> Result<(), ValidationError> {
    if !is_valid_identifier(&requirement.id) {
        return Err(ValidationError::InvalidIdentifier(requirement.id.clone()));
    }
    if requirement.components.len() > MAX_COMPONENTS_PER_REQUIREMENT {
        return Err(ValidationError::TooManyComponents {
            id: requirement.id.clone(),
            count: requirement.components.len(),
        });
    }
    requirement.components.iter().try_for_each(validate_requirement)
}

/// Validate a configured depth limit.
///
/// # Errors
///
/// Returns `ValidationError::DepthLimitTooLarge` if the depth exceeds [`MAX_DEPTH_LIMIT`].
pub fn validate_depth_limit(depth: usize) -> Result<usize, ValidationError> {
    if depth > MAX_DEPTH_LIMIT {
        Err(ValidationError::DepthLimitTooLarge(depth))
    } else {
        Ok(depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_confidence() {
        assert!((clamp_confidence(0.42) - 0.42).abs() < f64::EPSILON);
        assert!((clamp_confidence(2.0) - 1.0).abs() < f64::EPSILON);
        assert!(clamp_confidence(-1.0).abs() < f64::EPSILON);
        assert!(clamp_confidence(f64::NAN).abs() < f64::EPSILON);
        assert!((clamp_confidence(f64::INFINITY) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("design-123"));
        assert!(is_valid_identifier("fab_lab.v2"));
        assert!(is_valid_identifier("sauté"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("../etc"));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Wood Frame"), "wood-frame");
        assert_eq!(slugify("--Laser   Cutting--"), "laser-cutting");
        assert_eq!(slugify("Sauté"), "sauté");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_check_capability_limit() {
        assert!(check_capability_limit(100).is_none());
        assert!(check_capability_limit(MAX_CAPABILITIES - 1).is_none());
        assert!(check_capability_limit(MAX_CAPABILITIES).is_some());
    }

    #[test]
    fn test_validate_requirement_set() {
        let set = RequirementSet::new("chair-design", vec![Requirement::new("Chair")]);
        assert!(validate_requirement_set(&set).is_ok());

        let bad = RequirementSet::new("chair design", vec![Requirement::new("Chair")]);
        assert_eq!(
            validate_requirement_set(&bad),
            Err(ValidationError::InvalidIdentifier("chair design".to_string()))
        );

        let bad_child = RequirementSet::new(
            "chair",
            vec![Requirement::new("Chair").with_component(Requirement::new("Leg").with_id("leg 1"))],
        );
        assert!(validate_requirement_set(&bad_child).is_err());
    }

    #[test]
    fn test_validate_depth_limit() {
        assert_eq!(validate_depth_limit(5), Ok(5));
        assert_eq!(
            validate_depth_limit(MAX_DEPTH_LIMIT + 1),
            Err(ValidationError::DepthLimitTooLarge(MAX_DEPTH_LIMIT + 1))
        );
    }
}
