//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::P21Config;
use super::secret::secret_string;
use crate::domain::errors::ExportError;
use crate::domain::result::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into P21Config
/// 4. Applies environment variable overrides (P21_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`ExportError::Configuration`] if the file cannot be read, a
/// referenced variable is unset, parsing fails, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use p21_export::config::loader::load_config;
///
/// let config = load_config("p21.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<P21Config> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ExportError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ExportError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration text
///
/// # Errors
///
/// Same as [`load_config`], minus the file access.
pub fn parse_config(contents: &str) -> Result<P21Config> {
    let contents = substitute_env_vars(contents)?;

    let mut config: P21Config = toml::from_str(&contents)
        .map_err(|e| ExportError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ExportError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ExportError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ExportError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ExportError::Configuration(format!("Invalid value '{value}' for environment variable {name}"))
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Applies environment variable overrides using the P21_* prefix
///
/// Environment variables follow the pattern: P21_<SECTION>_<KEY>
/// For example: P21_CONNECTION_BASE_URL, P21_ENGINE_WORKER_LIMIT.
fn apply_env_overrides(config: &mut P21Config) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("P21_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("P21_APPLICATION_DEBUG") {
        config.application.debug = parse_env("P21_APPLICATION_DEBUG", &val)?;
    }

    // Connection overrides
    if let Some(val) = var("P21_CONNECTION_BASE_URL") {
        config.connection.base_url = val;
    }
    if let Some(val) = var("P21_CONNECTION_USERNAME") {
        config.connection.username = val;
    }
    if let Some(val) = var("P21_CONNECTION_PASSWORD") {
        config.connection.password = secret_string(val);
    }
    if let Some(val) = var("P21_CONNECTION_TIMEOUT_SECONDS") {
        config.connection.timeout_seconds = parse_env("P21_CONNECTION_TIMEOUT_SECONDS", &val)?;
    }
    if let Some(val) = var("P21_CONNECTION_PAGE_SIZE") {
        config.connection.page_size = parse_env("P21_CONNECTION_PAGE_SIZE", &val)?;
    }
    if let Some(val) = var("P21_CONNECTION_RETRY_MAX_ATTEMPTS") {
        config.connection.retry.max_attempts =
            parse_env("P21_CONNECTION_RETRY_MAX_ATTEMPTS", &val)?;
    }

    // Report selection overrides
    if let Some(val) = var("P21_REPORTS_GROUPS") {
        config.reports.groups = split_list(&val);
    }
    if let Some(val) = var("P21_REPORTS_NAMES") {
        config.reports.names = split_list(&val);
    }
    if let Some(val) = var("P21_REPORTS_START_DATE") {
        config.reports.start_date = Some(parse_env::<NaiveDate>("P21_REPORTS_START_DATE", &val)?);
    }
    if let Some(val) = var("P21_REPORTS_END_DATE") {
        config.reports.end_date = Some(parse_env::<NaiveDate>("P21_REPORTS_END_DATE", &val)?);
    }
    if let Some(val) = var("P21_REPORTS_OUTPUT_FOLDER") {
        config.reports.output_folder = val;
    }

    // Engine overrides
    if let Some(val) = var("P21_ENGINE_WORKER_LIMIT") {
        config.engine.worker_limit = parse_env("P21_ENGINE_WORKER_LIMIT", &val)?;
    }
    if let Some(val) = var("P21_ENGINE_REPORT_TIMEOUT_SECS") {
        config.engine.report_timeout_secs =
            Some(parse_env("P21_ENGINE_REPORT_TIMEOUT_SECS", &val)?);
    }
    if let Some(val) = var("P21_ENGINE_BATCH_TIMEOUT_SECS") {
        config.engine.batch_timeout_secs = Some(parse_env("P21_ENGINE_BATCH_TIMEOUT_SECS", &val)?);
    }

    // Logging overrides
    if let Some(val) = var("P21_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("P21_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("P21_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[connection]
base_url = "https://p21.example.com"
username = "api"
password = "pass"
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("P21_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${P21_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("P21_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("P21_LOADER_MISSING_VAR");
        let input = "password = \"${P21_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("P21_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        let input = "# password = \"${P21_LOADER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("monthly, po,,inventory "),
            vec!["monthly", "po", "inventory"]
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(ExportError::Configuration(_))));
    }

    #[test]
    fn test_load_config_minimal_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.connection.base_url, "https://p21.example.com");
        assert_eq!(config.connection.password.expose_secret().as_str(), "pass");
        assert_eq!(config.reports.groups, vec!["monthly".to_string()]);
        assert_eq!(config.engine.worker_limit, 5);
    }

    #[test]
    fn test_parse_config_rejects_invalid_section() {
        let contents = format!("{MINIMAL}\n[engine]\nworker_limit = 0\n");
        let err = parse_config(&contents).unwrap_err();
        assert!(err.to_string().contains("worker_limit"));
    }
}
