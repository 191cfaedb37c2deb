use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

/// Longest input line the shell reads, in bytes.
pub const MAX_LINE_LEN: usize = 4096;

pub struct Config {
    pub name: String,
    pub theme: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub log_to_stderr: bool,
    pub max_line_len: usize,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/jobsh")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from(env!("CARGO_PKG_NAME")),
            theme: String::from("default"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            log_to_stderr: false,
            max_line_len: MAX_LINE_LEN,
        }
    }

    pub fn new() -> Self {
        // .env first, real environment variables override it
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();
        config.apply(|key| env::var(key).ok());
        config
    }

    fn apply(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(theme) = lookup("JOBSH_THEME") {
            self.theme = theme;
        }

        if let Some(level) = lookup("JOBSH_LOG_LEVEL") {
            self.logger_level = level;
        }

        if let Some(dir) = lookup("JOBSH_LOG_DIR") {
            self.logger_dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
        }

        if let Some(flag) = lookup("JOBSH_LOG_STDERR") {
            self.log_to_stderr = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("JOBSH_THEME", "plain"),
            ("JOBSH_LOG_LEVEL", "debug"),
            ("JOBSH_LOG_DIR", "/var/tmp/jobsh"),
            ("JOBSH_LOG_STDERR", "TRUE"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.theme, "plain");
        assert_eq!(config.logger_level, "debug");
        assert_eq!(config.logger_dir, PathBuf::from("/var/tmp/jobsh"));
        assert!(config.log_to_stderr);
        assert_eq!(config.max_line_len, MAX_LINE_LEN);
    }

    #[test]
    fn test_defaults_survive_empty_env() {
        let mut config = Config::default();
        config.apply(|_| None);
        assert_eq!(config.name, "jobsh");
        assert_eq!(config.theme, "default");
        assert_eq!(config.logger_level, "info");
        assert!(config.logger_dir.ends_with("logs"));
        assert!(!config.log_to_stderr);
    }
}
