//! Configuration loader with multi-source merging

use crate::{FathomConfig, Paths, Settings, keys};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "FATHOM".to_string(),
            include_user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "FATHOM")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip `~/.config/fathom/config.toml`, so results depend only on the project.
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<Settings> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = FathomConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/fathom/config.toml)
        if self.include_user_config {
            let paths = Paths::new();
            if let Ok(user_config_file) = paths.user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Project config (fathom.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (fathom.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (FATHOM_WORKER__INITIAL_BIT_PORT, ...)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        let settings = Settings::from_config(config);

        // Validate the known sections and resolve relative paths
        let mut typed: FathomConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        typed.resolve_paths(&self.project_dir);

        let mut settings = settings.with_value(
            keys::HARNESS_TEST_DIR,
            typed.harness.test_dir.to_string_lossy().into_owned(),
        )?;
        if let Some(program) = typed.worker.program {
            settings =
                settings.with_value(keys::WORKER_PROGRAM, program.to_string_lossy().into_owned())?;
        }

        Ok(settings)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> Result<Settings> {
        match self.load() {
            Ok(settings) => Ok(settings),
            Err(_) => Ok(Settings::defaults()?),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let settings = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .without_user_config()
            .with_env_prefix("FATHOM_TEST_DEFAULTS")
            .load()
            .expect("Failed to load config");

        assert_eq!(settings.get_int(keys::INITIAL_USER_PORT).unwrap(), 31010);
        assert_eq!(
            settings.get_string(keys::COORDINATION_CONNECT).unwrap(),
            "localhost:2181"
        );
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[worker]
initial_bit_port = 41000
initial_user_port = 40000
program = "fathomd"
args = ["--config", "{config}"]

[coordination]
connect = "127.0.0.1:2999"
"#;
        fs::write(project_dir.join("fathom.toml"), config_content)
            .expect("Failed to write config");

        let settings = ConfigLoader::new()
            .with_project_dir(project_dir)
            .without_user_config()
            .with_env_prefix("FATHOM_TEST_PROJECT")
            .load()
            .expect("Failed to load config");

        assert_eq!(settings.get_int(keys::INITIAL_BIT_PORT).unwrap(), 41000);
        assert_eq!(settings.get_int(keys::INITIAL_USER_PORT).unwrap(), 40000);
        assert_eq!(
            settings.get_string(keys::COORDINATION_CONNECT).unwrap(),
            "127.0.0.1:2999"
        );
        assert_eq!(settings.get_string(keys::WORKER_PROGRAM).unwrap(), "fathomd");
        let args: Vec<String> = settings.get(keys::WORKER_ARGS).unwrap();
        assert_eq!(args, vec!["--config", "{config}"]);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("fathom.toml"),
            r#"
[coordination]
connect = "127.0.0.1:2181"
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("fathom.local.toml"),
            r#"
[coordination]
connect = "localhost:9999"
"#,
        )
        .expect("Failed to write local config");

        let settings = ConfigLoader::new()
            .with_project_dir(project_dir)
            .without_user_config()
            .with_env_prefix("FATHOM_TEST_LOCAL")
            .load()
            .expect("Failed to load config");

        // Local config should override project config
        assert_eq!(
            settings.get_string(keys::COORDINATION_CONNECT).unwrap(),
            "localhost:9999"
        );
    }

    // Environment overrides are not exercised here: mutating the process
    // environment races with other tests. The mapping is
    //
    // FATHOM_WORKER__INITIAL_BIT_PORT=40000  -> worker.initial_bit_port
    // FATHOM_COORDINATION__CONNECT=zk:2181   -> coordination.connect

    #[test]
    fn test_test_dir_resolved_against_project() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let settings = ConfigLoader::new()
            .with_project_dir(project_dir)
            .without_user_config()
            .with_env_prefix("FATHOM_TEST_PATHS")
            .load()
            .expect("Failed to load config");

        let test_dir = PathBuf::from(settings.get_string(keys::HARNESS_TEST_DIR).unwrap());
        assert!(test_dir.is_absolute());
        assert_eq!(test_dir, project_dir.join("target/test-data"));
    }

    #[test]
    fn test_malformed_project_config_falls_back_to_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("fathom.toml"), "[worker\nbroken")
            .expect("Failed to write config");

        let loader = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .without_user_config();
        let settings = loader.load_or_default().unwrap();

        assert_eq!(settings.get_int(keys::INITIAL_BIT_PORT).unwrap(), 32010);
    }
}
