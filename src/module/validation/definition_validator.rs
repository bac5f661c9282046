//! Module definition validation
//!
//! Checks the identity fields a definition must carry before the registry
//! accepts it: a non-empty name and a non-empty version. Everything else is
//! advisory. Unconventional names, non-semver versions and unparsable
//! requirements only produce a warning. Requirements themselves are checked
//! by the registry's dependency pass.

use tracing::{debug, warn};

use crate::module::traits::ModuleMetadata;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Definition is valid
    Valid,
    /// Definition is invalid with specific errors
    Invalid(Vec<String>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Definition validator
pub struct DefinitionValidator {
    max_name_len: usize,
}

impl DefinitionValidator {
    /// Create a new definition validator
    pub fn new() -> Self {
        Self { max_name_len: 64 }
    }

    /// Validate module metadata
    pub fn validate(&self, metadata: &ModuleMetadata) -> ValidationResult {
        let mut errors = Vec::new();

        if metadata.name.trim().is_empty() {
            errors.push("Module name cannot be empty".to_string());
        } else if !self.is_conventional_name(&metadata.name) {
            warn!(
                "Module name {} is unconventional (expected up to {} alphanumerics, dashes or underscores)",
                metadata.name, self.max_name_len
            );
        }

        if metadata.version.trim().is_empty() {
            errors.push("Module version cannot be empty".to_string());
        } else if !is_valid_version(&metadata.version) {
            warn!(
                "Module {} declares non-semver version {}",
                metadata.name, metadata.version
            );
        }

        for (dep_name, requirement) in metadata
            .dependencies
            .iter()
            .chain(metadata.requires.modules.iter())
        {
            if !is_valid_version_or_range(requirement) {
                warn!(
                    "Module {} has unparsable version requirement {} for {}",
                    metadata.name, requirement, dep_name
                );
            }
        }

        if errors.is_empty() {
            debug!("Definition validation passed for module: {}", metadata.name);
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(errors)
        }
    }

    /// Alphanumeric start, then alphanumerics, dashes, underscores
    #[inline]
    fn is_conventional_name(&self, name: &str) -> bool {
        if name.is_empty() || name.len() > self.max_name_len {
            return false;
        }

        if !name.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }

        name.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for DefinitionValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// major.minor[.patch][-prerelease][+build]
fn is_valid_version(version: &str) -> bool {
    let base = version.split('+').next().unwrap_or(version);
    let version_part = base.split('-').next().unwrap_or(base);

    let nums: Vec<&str> = version_part.split('.').collect();
    if nums.len() < 2 || nums.len() > 3 {
        return false;
    }

    nums.iter()
        .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && n.parse::<u32>().is_ok())
}

/// A version, optionally prefixed with a range operator; `*` and `latest` are accepted
fn is_valid_version_or_range(requirement: &str) -> bool {
    let requirement = requirement.trim();
    if requirement == "*" || requirement == "latest" {
        return true;
    }
    let version_part = requirement
        .trim_start_matches(|c: char| matches!(c, '>' | '<' | '=' | '^' | '~'))
        .trim();
    is_valid_version(version_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_definition() {
        let metadata = ModuleMetadata::new("blog", "1.0.0").with_dependency("users", "^1.2");
        assert_eq!(DefinitionValidator::new().validate(&metadata), ValidationResult::Valid);
    }

    #[test]
    fn test_empty_name_and_version_rejected() {
        let result = DefinitionValidator::new().validate(&ModuleMetadata::new("", " "));
        match result {
            ValidationResult::Invalid(errors) => assert_eq!(errors.len(), 2),
            ValidationResult::Valid => panic!("expected invalid"),
        }
    }

    #[test]
    fn test_unconventional_names_accepted() {
        let validator = DefinitionValidator::new();
        let too_long = "x".repeat(65);
        for name in ["blog.v2", "-blog", "blog/admin", too_long.as_str()] {
            assert!(validator.validate(&ModuleMetadata::new(name, "1.0.0")).is_valid());
            assert!(!validator.is_conventional_name(name));
        }
        assert!(validator.is_conventional_name("core-auth_2"));
        assert!(!validator.validate(&ModuleMetadata::new("  ", "1.0.0")).is_valid());
    }

    #[test]
    fn test_dependency_names_left_to_dependency_check() {
        let metadata = ModuleMetadata::new("blog", "1.0.0")
            .with_dependency("blog", "1.0.0")
            .with_dependency("@press/users", "^1.0");
        assert!(DefinitionValidator::new().validate(&metadata).is_valid());
    }

    #[test]
    fn test_non_semver_version_is_only_a_warning() {
        let metadata = ModuleMetadata::new("blog", "nightly").with_dependency("users", "latest");
        assert!(DefinitionValidator::new().validate(&metadata).is_valid());
    }

    #[test]
    fn test_version_formats() {
        assert!(is_valid_version("1.0"));
        assert!(is_valid_version("1.2.3-beta.1+build5"));
        assert!(!is_valid_version("1"));
        assert!(!is_valid_version("1.x.0"));
        assert!(is_valid_version_or_range(">=2.0.0"));
        assert!(is_valid_version_or_range("~1.4"));
        assert!(!is_valid_version_or_range(">=two"));
    }
}
