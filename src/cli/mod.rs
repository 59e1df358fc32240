//! peggd command line interface.
//!
//! Operator tools for replaying scenario files against a local engine.

pub mod config;
pub mod scenario;

pub use config::*;
pub use scenario::*;

use std::path::{Path, PathBuf};

use crate::core::config::ProtocolParams;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(CliError::InvalidArgument(format!("Unknown format: {}", s))),
        }
    }
}

/// A CLI command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replay a scenario file
    Simulate {
        /// Scenario file
        path: PathBuf,
        /// Report format
        format: OutputFormat,
        /// Apply `PEGGD_*` parameter overrides
        env_overrides: bool,
    },
    /// Show effective protocol parameters
    Params {
        /// Read parameters from this scenario instead of the defaults
        scenario: Option<PathBuf>,
    },
    /// Write the sample scenario
    InitScenario {
        /// Destination
        path: PathBuf,
        /// Overwrite an existing file
        force: bool,
    },
}

impl Command {
    /// Execute the command
    pub fn execute(&self) -> CliResult<CommandOutput> {
        match self {
            Command::Simulate {
                path,
                format,
                env_overrides,
            } => simulate(path, *format, *env_overrides),
            Command::Params { scenario } => params(scenario.as_deref()),
            Command::InitScenario { path, force } => init_scenario(path, *force),
        }
    }
}

fn simulate(path: &Path, format: OutputFormat, env_overrides: bool) -> CliResult<CommandOutput> {
    let mut config = ScenarioConfig::load(path).map_err(|e| CliError::Config(e.to_string()))?;
    if env_overrides {
        config.params = config
            .params
            .with_env_overrides()
            .map_err(|e| CliError::Config(e.to_string()))?;
    }

    tracing::info!(scenario = %config.name, steps = config.steps.len(), "Replaying scenario");
    let mut runner =
        ScenarioRunner::new(config).map_err(|e| CliError::Execution(e.to_string()))?;
    let report = runner.run();

    // Amounts exceed u64, so the full report only goes through the string serializer
    let message = match format {
        OutputFormat::Text => report.render(),
        OutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Execution(e.to_string()))?,
    };
    let data = serde_json::json!({
        "name": report.name,
        "passed": report.passed(),
        "steps": report.steps.len(),
        "mismatches": report.mismatches().len(),
        "liquidations": report.liquidations,
        "state_hash": report.state_hash.to_hex(),
    });

    let mut output = if report.passed() {
        CommandOutput::success_with_data(message, data)
    } else {
        let mut output = CommandOutput::error(message);
        output.data = Some(data);
        output
    };
    for step in report.mismatches() {
        output = output.with_warning(format!(
            "step {} expected {:?}, got {:?}",
            step.index, step.expected_error, step.error
        ));
    }
    Ok(output)
}

fn params(scenario: Option<&Path>) -> CliResult<CommandOutput> {
    let params = match scenario {
        Some(path) => {
            ScenarioConfig::load(path)
                .map_err(|e| CliError::Config(e.to_string()))?
                .params
        }
        None => ProtocolParams::default(),
    }
    .with_env_overrides()
    .map_err(|e| CliError::Config(e.to_string()))?;

    let message =
        serde_json::to_string_pretty(&params).map_err(|e| CliError::Execution(e.to_string()))?;
    Ok(CommandOutput::success(message))
}

fn init_scenario(path: &Path, force: bool) -> CliResult<CommandOutput> {
    if path.exists() && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    ScenarioConfig::sample()
        .save(path)
        .map_err(|e| CliError::Io(e.to_string()))?;
    Ok(CommandOutput::success(format!(
        "Sample scenario written to {}",
        path.display()
    )))
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLI RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Error types
#[derive(Debug, Clone)]
pub enum CliError {
    /// Configuration error
    Config(String),
    /// Command execution error
    Execution(String),
    /// Invalid argument
    InvalidArgument(String),
    /// IO error
    Io(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Execution(msg) => write!(f, "Execution error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

/// CLI Result type
pub type CliResult<T> = Result<T, CliError>;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Command execution output
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Success status
    pub success: bool,
    /// Output message
    pub message: String,
    /// Structured data (JSON serializable)
    pub data: Option<serde_json::Value>,
    /// Warnings
    pub warnings: Vec<String>,
}

impl CommandOutput {
    /// Create success output
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            warnings: Vec::new(),
        }
    }

    /// Create success with data
    pub fn success_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            warnings: Vec::new(),
        }
    }

    /// Create error output
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            warnings: Vec::new(),
        }
    }

    /// Add warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_init_then_simulate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");

        let init = Command::InitScenario {
            path: path.clone(),
            force: false,
        };
        assert!(init.execute().unwrap().success);
        assert!(init.execute().is_err());

        let output = Command::Simulate {
            path: path.clone(),
            format: OutputFormat::Text,
            env_overrides: false,
        }
        .execute()
        .unwrap();
        assert!(output.success, "{}", output.message);
        assert!(output.warnings.is_empty());
        assert!(output.message.contains("Invariants:   ok"));

        let json = Command::Simulate {
            path,
            format: OutputFormat::Json,
            env_overrides: false,
        }
        .execute()
        .unwrap();
        let data = json.data.unwrap();
        assert_eq!(data["liquidations"], 1);
    }

    #[test]
    fn test_simulate_missing_file() {
        let result = Command::Simulate {
            path: PathBuf::from("/nonexistent/scenario.json"),
            format: OutputFormat::Text,
            env_overrides: false,
        }
        .execute();
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_command_output_with_warning() {
        let output = CommandOutput::success("OK")
            .with_warning("Warning 1")
            .with_warning("Warning 2");
        assert_eq!(output.warnings.len(), 2);
    }

    #[test]
    fn test_cli_error_display() {
        let err = CliError::Config("bad config".into());
        assert!(err.to_string().contains("Configuration error"));
    }
}
