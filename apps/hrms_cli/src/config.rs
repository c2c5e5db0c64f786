use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub session_path: PathBuf,
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/".into(),
            session_path: PathBuf::from("./data/session.json"),
            page_size: client_core::DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    session_path: Option<PathBuf>,
    page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new("hrms.toml"), |name| std::env::var(name).ok())
}

/// Defaults, then the file at `path` when present, then environment variables.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    if let Some(v) = env("HRMS_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("HRMS_SESSION_PATH") {
        settings.session_path = PathBuf::from(v);
    }
    if let Some(v) = env("APP__SESSION_PATH") {
        settings.session_path = PathBuf::from(v);
    }

    if let Some(v) = env("APP__PAGE_SIZE") {
        settings.page_size = v
            .parse::<u32>()
            .with_context(|| format!("APP__PAGE_SIZE must be a number, got '{v}'"))?
            .max(1);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .parse::<u64>()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS must be a number, got '{v}'"))?;
    }

    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file_cfg.session_path {
        settings.session_path = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v.max(1);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

pub fn normalize_api_url(raw_api_url: &str) -> anyhow::Result<Url> {
    let raw_api_url = raw_api_url.trim();
    let raw_api_url = if raw_api_url.is_empty() {
        Settings::default().api_url
    } else if raw_api_url.contains("://") {
        raw_api_url.to_string()
    } else {
        format!("http://{raw_api_url}")
    };

    let mut url = Url::parse(&raw_api_url)
        .with_context(|| format!("invalid api url '{raw_api_url}'"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings =
            load_settings_from(&dir.path().join("missing.toml"), env_from(&[])).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.page_size, 5);
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hrms.toml");
        fs::write(
            &path,
            "api_url = \"http://hr.internal/api\"\npage_size = 10\nrequest_timeout_secs = 5\n",
        )
        .expect("write");

        let settings = load_settings_from(
            &path,
            env_from(&[
                ("HRMS_API_URL", "http://ignored"),
                ("APP__API_URL", "http://hr.example.com/api/"),
                ("APP__SESSION_PATH", "/tmp/hrms-session.json"),
            ]),
        )
        .expect("load");

        assert_eq!(settings.api_url, "http://hr.example.com/api/");
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(
            settings.session_path,
            PathBuf::from("/tmp/hrms-session.json")
        );
    }

    #[test]
    fn rejects_non_numeric_page_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_settings_from(
            &dir.path().join("missing.toml"),
            env_from(&[("APP__PAGE_SIZE", "many")]),
        )
        .expect_err("bad page size");
        assert!(err.to_string().contains("APP__PAGE_SIZE"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn normalizes_api_url_with_trailing_slash() {
        assert_eq!(
            normalize_api_url("http://127.0.0.1:8000/api")
                .expect("url")
                .as_str(),
            "http://127.0.0.1:8000/api/"
        );
        assert_eq!(
            normalize_api_url("localhost:8000").expect("url").as_str(),
            "http://localhost:8000/"
        );
        assert_eq!(
            normalize_api_url("  ").expect("url").as_str(),
            "http://127.0.0.1:8000/"
        );
    }
}
