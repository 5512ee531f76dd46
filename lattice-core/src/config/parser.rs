// Configuration Parser
// Loads and validates matrix description YAML files

use crate::config::models::MatrixConfig;
use crate::error::{CoreError, CoreResult};

use std::fs;
use std::path::Path;

/// Parser for matrix description YAML files.
pub struct ConfigParser;

impl ConfigParser {
    /// Parse a matrix description from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<MatrixConfig> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a matrix description from a YAML string.
    pub fn parse(content: &str) -> CoreResult<MatrixConfig> {
        let config: MatrixConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Parse and validate a matrix description.
    pub fn parse_and_validate(content: &str) -> CoreResult<MatrixConfig> {
        let config = Self::parse(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a parsed description for semantic correctness.
    ///
    /// Entry-level checks (missing os/channel, env key collisions) are the
    /// expander's responsibility; this catches description-level mistakes
    /// before any expansion is attempted.
    pub fn validate(config: &MatrixConfig) -> CoreResult<()> {
        if config.project.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "'project' must be a non-empty name".to_string(),
            ));
        }

        if config.matrix.is_empty() {
            return Err(CoreError::InvalidConfig(
                "'matrix' must declare at least one entry".to_string(),
            ));
        }

        if let Some(deploy) = &config.deploy {
            if deploy.provider != "github" {
                return Err(CoreError::InvalidConfig(format!(
                    "unknown deploy provider '{}', expected 'github'",
                    deploy.provider
                )));
            }
            if deploy.api_key_env.as_deref().unwrap_or("").trim().is_empty() {
                return Err(CoreError::InvalidConfig(
                    "deploy requires 'api_key_env' naming the API key variable".to_string(),
                ));
            }
            if !deploy.on.tags {
                return Err(CoreError::InvalidConfig(
                    "only tag-gated deploys are supported ('on.tags' must be true)".to_string(),
                ));
            }
        }

        // Conditions must at least parse; unbound variables are a runtime
        // concern, syntax errors are a configuration mistake. Entry-level
        // install/script overrides carry conditions too.
        for step in config
            .before_install
            .iter()
            .chain(&config.install)
            .chain(&config.script)
            .chain(&config.before_deploy)
            .chain(config.matrix.iter().flat_map(|entry| {
                entry
                    .install
                    .iter()
                    .flatten()
                    .chain(entry.script.iter().flatten())
            }))
        {
            if let Some(when) = step.when() {
                crate::expression::ExprParser::parse(when).map_err(|e| {
                    CoreError::InvalidConfig(format!("bad condition '{}': {}", when, e))
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
project: myproj
matrix:
  - os: linux
    channel: stable
script:
  - cargo test
"#;

    #[test]
    fn test_parse_minimal() {
        let config = ConfigParser::parse_and_validate(MINIMAL).unwrap();
        assert_eq!(config.project, "myproj");
        assert_eq!(config.matrix.len(), 1);
        assert_eq!(config.script.len(), 1);
        assert_eq!(config.script[0].run(), "cargo test");
    }

    #[test]
    fn test_parse_full_description() {
        let yaml = r#"
project: myproj
env:
  HOST: x86_64-unknown-linux-gnu
matrix:
  - os: linux
    channel: stable
    target: x86_64-unknown-linux-musl
    install:
      - cargo build --target $TARGET
  - os: osx
    channel: stable
    target: x86_64-apple-darwin
before_install:
  - run: rustup target add $TARGET
    when: "$CI_OS_NAME = linux && $HOST != $TARGET"
install:
  - cargo build
script:
  - cargo test
deploy:
  provider: github
  api_key_env: GITHUB_TOKEN
  on:
    channel: stable
    tags: true
"#;
        let config = ConfigParser::parse_and_validate(yaml).unwrap();
        assert_eq!(config.matrix.len(), 2);
        assert_eq!(config.env.get("HOST").unwrap(), "x86_64-unknown-linux-gnu");
        assert_eq!(
            config.before_install[0].when(),
            Some("$CI_OS_NAME = linux && $HOST != $TARGET")
        );
        let deploy = config.deploy.unwrap();
        assert_eq!(deploy.api_key_env.as_deref(), Some("GITHUB_TOKEN"));
        assert!(deploy.on.tags);
    }

    #[test]
    fn test_validate_rejects_empty_project() {
        let yaml = "project: ''\nmatrix:\n  - os: linux\n    channel: stable\n";
        let err = ConfigParser::parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_empty_matrix() {
        let yaml = "project: myproj\nmatrix: []\n";
        let err = ConfigParser::parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let yaml = r#"
project: myproj
matrix:
  - os: linux
    channel: stable
deploy:
  provider: s3
  api_key_env: KEY
"#;
        let err = ConfigParser::parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_bad_condition_syntax() {
        let yaml = r#"
project: myproj
matrix:
  - os: linux
    channel: stable
script:
  - run: cargo test
    when: "$HOST != "
"#;
        let err = ConfigParser::parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_bad_condition_in_entry_override() {
        let yaml = r#"
project: myproj
matrix:
  - os: linux
    channel: stable
    script:
      - run: cargo test
        when: "$HOST != "
script:
  - echo ok
"#;
        let err = ConfigParser::parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_yaml_error_surfaces() {
        let err = ConfigParser::parse("project: [unclosed").unwrap_err();
        assert!(matches!(err, CoreError::Yaml(_)));
    }
}
