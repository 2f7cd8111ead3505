//! Environment variable substitution

use once_cell::sync::Lazy;
use querygate_core::GatewayError;
use regex::{Captures, Regex};

/// Regex pattern for environment variable placeholders: {{ env.VAR_NAME }}
static ENV_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid regex"));

/// Environment variable substitutor
pub struct EnvSubstitutor {
    /// Whether to fail on missing environment variables
    strict: bool,
    /// Whether to read a `.env` file before substituting
    load_dotenv: bool,
}

impl EnvSubstitutor {
    /// Strict substitutor: any missing variable is an error.
    pub fn new() -> Self {
        Self {
            strict: true,
            load_dotenv: true,
        }
    }

    /// Lenient substitutor: placeholders for missing variables are left as-is.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            load_dotenv: true,
        }
    }

    /// Skip loading `.env`
    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    /// Replace every placeholder outside YAML comment lines.
    ///
    /// In strict mode the error names every missing variable once, in order
    /// of first appearance.
    pub fn substitute(&self, content: &str) -> Result<String, GatewayError> {
        if self.load_dotenv {
            let _ = dotenvy::dotenv();
        }

        let mut missing: Vec<String> = Vec::new();
        let mut lines = Vec::new();

        for line in content.split('\n') {
            if line.trim_start().starts_with('#') {
                lines.push(line.to_string());
                continue;
            }
            let replaced = ENV_PATTERN.replace_all(line, |cap: &Captures| {
                let name = &cap[1];
                match std::env::var(name) {
                    Ok(value) => value,
                    Err(_) => {
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.to_string());
                        }
                        cap[0].to_string()
                    }
                }
            });
            lines.push(replaced.into_owned());
        }

        if self.strict && !missing.is_empty() {
            return Err(GatewayError::EnvVarNotFound(missing.join(", ")));
        }

        Ok(lines.join("\n"))
    }

    /// Check if a string contains environment variable placeholders
    pub fn has_placeholders(content: &str) -> bool {
        ENV_PATTERN.is_match(content)
    }

    /// Distinct variable names referenced by `content`
    pub fn extract_var_names(content: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for cap in ENV_PATTERN.captures_iter(content) {
            if !names.iter().any(|n| n == &cap[1]) {
                names.push(cap[1].to_string());
            }
        }
        names
    }
}

impl Default for EnvSubstitutor {
    fn default() -> Self {
        Self::new()
    }
}
