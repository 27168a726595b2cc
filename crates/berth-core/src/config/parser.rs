//! berth.toml parsing with helpful error messages

use std::path::Path;

use super::{Credentials, ProjectConfig};
use crate::error::{DeployError, Result};

/// Load and validate berth.toml, resolving credentials in the same pass
/// so a missing key fails before any remote call is attempted.
pub fn load_project_config(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DeployError::configuration(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let mut config = parse_project_config_str(&content)?;
    config.credentials = Credentials::resolve()?;
    Ok(config)
}

/// Parse berth.toml content from a string. Credentials are left at their
/// default and must be resolved by the caller.
pub fn parse_project_config_str(content: &str) -> Result<ProjectConfig> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    config.validate()?;
    Ok(config)
}

/// Enhance TOML parsing errors with surrounding line context
fn enhance_toml_error(error: toml::de::Error, content: &str) -> DeployError {
    let error_msg = error.to_string();

    let line_hint = error_msg
        .lines()
        .find(|line| line.contains("line "))
        .and_then(|line| {
            line.split("line ")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(',').parse::<usize>().ok())
        });

    if let Some(line_num) = line_hint {
        let context = get_line_context(content, line_num);
        DeployError::configuration(format!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num, context, error_msg
        ))
    } else {
        DeployError::configuration(format!("TOML parsing error: {}", error_msg))
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2).min(lines.len());
    let end = (line_num + 2).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[project]
application = "hello"
region = "eu-central"
bucket = "hello-artifacts"

[environments.production]
description = "Production environment"
cname_prefix = "hello-prod"
platform = "64bit linux running Docker"

[environments.production.options."platform:autoscaling"]
MinSize = "1"
MaxSize = "4"
"#;

    #[test]
    fn parses_a_complete_config() {
        let config = parse_project_config_str(SAMPLE).unwrap();
        assert_eq!(config.project.application, "hello");
        assert_eq!(config.project.poll_interval_secs, 3);
        assert!(config.project.poll_timeout_secs.is_none());
        assert!(!config.project.wait_on_create);

        let spec = config.environment("production").unwrap();
        assert_eq!(spec.cname_prefix, "hello-prod");
        assert_eq!(spec.flattened_options().len(), 2);
    }

    #[test]
    fn rejects_empty_application_name() {
        let content = SAMPLE.replace("application = \"hello\"", "application = \"\"");
        let err = parse_project_config_str(&content).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }

    #[test]
    fn syntax_errors_carry_line_context() {
        let err = parse_project_config_str("[project\napplication = \"x\"").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("TOML parsing error"), "got: {}", msg);
    }

    #[test]
    fn line_context_tolerates_out_of_range_hints() {
        let context = get_line_context("application = \"x\"", 40);
        assert!(context.is_empty());
    }
}
