//! Environment variable and home directory expansion for config values.

use crate::ConfigError;

/// Expand `~`, `$VAR`, `${VAR}` and `${VAR:-default}` in `value`.
///
/// `field` names the config entry in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: e.to_string(),
        })
}

/// Expand every element of an argv template.
pub(crate) fn expand_argv(argv: &[String], field: &str) -> Result<Vec<String>, ConfigError> {
    argv.iter().map(|arg| expand_env(arg, field)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(expand_env("inkscape", "f").unwrap(), "inkscape");
        assert_eq!(expand_env("-t{format}", "f").unwrap(), "-t{format}");
    }

    #[test]
    fn test_default_value() {
        let value = expand_env("${MARKR_TEST_SURELY_UNSET_VAR:-java}", "f").unwrap();
        assert_eq!(value, "java");
    }

    #[test]
    fn test_unset_variable_is_error() {
        let err = expand_env("$MARKR_TEST_SURELY_UNSET_VAR/plantuml.jar", "tools.plantuml.command")
            .unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::EnvVar { field, .. } if field == "tools.plantuml.command"
        ));
    }

    #[test]
    fn test_home_expansion() {
        if std::env::var_os("HOME").is_none() {
            return;
        }
        let value = expand_env("~/.cache/markr/plantuml.jar", "f").unwrap();
        assert!(!value.starts_with('~'));
        assert!(value.ends_with("/.cache/markr/plantuml.jar"));
    }

    #[test]
    fn test_expand_argv() {
        let argv = vec!["${MARKR_TEST_SURELY_UNSET_VAR:-pandoc}".to_owned(), "-o".to_owned()];
        assert_eq!(expand_argv(&argv, "f").unwrap(), vec!["pandoc", "-o"]);
    }
}
