//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The login password
//! comes from REGISTRY_PASSWORD or `password_file`, never from the TOML
//! itself, so the file can be shared without leaking it.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file used when neither `--config` nor CONFIG_PATH is given.
pub const DEFAULT_CONFIG_PATH: &str = "registry-cli.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Registry API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub refresh_timeout_secs: u64,
}

/// Where the session lives and who logs in
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// Default account for `login` when `--email` is omitted
    #[serde(default)]
    pub email: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the password (alternative to REGISTRY_PASSWORD)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            refresh_timeout_secs: default_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            email: None,
            password: None,
            password_file: None,
        }
    }
}

fn default_base_url() -> String {
    registry_auth::DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_token_file() -> PathBuf {
    PathBuf::from("registry-credentials.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.resolve()
    }

    /// Like `load`, but a missing file means built-in defaults.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Config::default().resolve()
        }
    }

    /// Apply environment overrides and validate.
    ///
    /// Password resolution order:
    /// 1. REGISTRY_PASSWORD env var
    /// 2. password_file path from config
    fn resolve(mut self) -> common::Result<Self> {
        if let Ok(base_url) = std::env::var("REGISTRY_API_BASE") {
            self.api.base_url = base_url;
        }
        self.api.base_url = self.api.base_url.trim_end_matches('/').to_string();

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.api.refresh_timeout_secs == 0 {
            return Err(common::Error::Config(
                "refresh_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Ok(password) = std::env::var("REGISTRY_PASSWORD") {
            self.session.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = self.session.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim_end_matches(['\r', '\n']).to_owned();
            if !password.is_empty() {
                self.session.password = Some(Secret::new(password));
            }
        }

        Ok(self)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that read or mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_overrides() {
        unsafe {
            remove_env("REGISTRY_API_BASE");
            remove_env("REGISTRY_PASSWORD");
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("registry-cli.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://registry.example.go/api/"
timeout_secs = 30
refresh_timeout_secs = 5

[session]
token_file = "/var/lib/registry/credentials.json"
email = "amina@registry.go"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://registry.example.go/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.refresh_timeout_secs, 5);
        assert_eq!(
            config.session.token_file,
            PathBuf::from("/var/lib/registry/credentials.json")
        );
        assert_eq!(config.session.email.as_deref(), Some("amina@registry.go"));
        assert!(config.session.password.is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.api.refresh_timeout_secs, 15);
        assert_eq!(
            config.session.token_file,
            PathBuf::from("registry-credentials.json")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/registry-cli.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let config = Config::load_or_default(Path::new("/nonexistent/registry-cli.toml")).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_base_url_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"http://file.example/api\"\n");

        unsafe { set_env("REGISTRY_API_BASE", "http://127.0.0.1:8200/api") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("REGISTRY_API_BASE") };

        assert_eq!(config.api.base_url, "http://127.0.0.1:8200/api");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"localhost:8000/api\"\n");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(&dir, "[api]\ntimeout_secs = 0\n");
        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");

        let path = write_config(&dir, "[api]\nrefresh_timeout_secs = 0\n");
        assert!(
            Config::load(&path).is_err(),
            "refresh_timeout_secs = 0 must be rejected"
        );
    }

    #[test]
    fn test_password_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        unsafe { set_env("REGISTRY_PASSWORD", "s3cret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("REGISTRY_PASSWORD") };

        assert_eq!(config.session.password.unwrap().expose(), "s3cret");
    }

    #[test]
    fn test_password_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let password_path = dir.path().join("password");
        std::fs::write(&password_path, "from-file\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[session]\npassword_file = \"{}\"\n",
                password_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.session.password.unwrap().expose(), "from-file");
    }

    #[test]
    fn test_password_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[session]\npassword_file = \"/nonexistent/path/password\"\n",
        );

        unsafe { set_env("REGISTRY_PASSWORD", "env-wins") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("REGISTRY_PASSWORD") };

        assert_eq!(
            config.session.password.unwrap().expose(),
            "env-wins",
            "REGISTRY_PASSWORD must take precedence over password_file"
        );
    }

    #[test]
    fn test_missing_password_file_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[session]\npassword_file = \"/nonexistent/path/password\"\n",
        );

        assert!(matches!(
            Config::load(&path),
            Err(common::Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_password_file_yields_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overrides();
        let dir = tempfile::tempdir().unwrap();
        let password_path = dir.path().join("password");
        std::fs::write(&password_path, "\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[session]\npassword_file = \"{}\"\n",
                password_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert!(config.session.password.is_none());
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/env/path.toml"));
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
