use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::util::strip_quotes;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    verify: Option<bool>,
    cache_dir: Option<PathBuf>,
    cache_ttl: Option<u64>,
    timeout: Option<u64>,
}

pub(crate) fn load_config(url: Option<String>, verify: Option<bool>) -> Result<ClientConfig> {
    let env = |name: &str| std::env::var(name).ok();
    let candidates = rc_candidates(&env);
    resolve_config(url, verify, env, &candidates)
}

/// Merges explicit arguments, `SDMX_*` variables from `env`, the first
/// existing file among `rc_candidates`, and defaults, in that order.
fn resolve_config(
    url: Option<String>,
    verify: Option<bool>,
    env: impl Fn(&str) -> Option<String>,
    rc_candidates: &[PathBuf],
) -> Result<ClientConfig> {
    let env_secs = |name: &str| -> Result<Option<u64>> {
        match env(name) {
            Some(v) => parse_secs(&v)
                .map(Some)
                .ok_or_else(|| Error::config(format!("{name} must be a number of seconds, got '{v}'"))),
            None => Ok(None),
        }
    };
    let from_env = RcConfig {
        url: env("SDMX_URL"),
        verify: env("SDMX_VERIFY").map(|v| parse_bool(&v)),
        cache_dir: env("SDMX_CACHE_DIR").map(PathBuf::from),
        cache_ttl: env_secs("SDMX_CACHE_TTL")?,
        timeout: env_secs("SDMX_TIMEOUT")?,
    };

    let mut file = RcConfig::default();
    for rc_path in rc_candidates {
        if rc_path.exists() {
            file = read_rc(rc_path).map_err(|e| {
                Error::config(format!(
                    "failed to read configuration file {}: {}",
                    rc_path.display(),
                    e
                ))
            })?;
            break;
        }
    }

    let url = match url.or(from_env.url).or(file.url) {
        Some(v) => v,
        None => {
            if !rc_candidates.is_empty() {
                return Err(Error::config(format!(
                    "missing url (set SDMX_URL or put `url:` in one of: {})",
                    rc_candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
            return Err(Error::config("missing url (set SDMX_URL or create .sdmxrc)"));
        }
    };

    Ok(ClientConfig {
        url,
        verify: verify.or(from_env.verify).or(file.verify).unwrap_or(true),
        cache_dir: from_env.cache_dir.or(file.cache_dir),
        cache_ttl: from_env
            .cache_ttl
            .or(file.cache_ttl)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL),
        timeout: from_env
            .timeout
            .or(file.timeout)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT),
    })
}

fn parse_secs(v: &str) -> Option<u64> {
    v.trim().parse().ok()
}

fn parse_bool(v: &str) -> bool {
    !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    parse_rc(&text)
}

fn parse_rc(text: &str) -> Result<RcConfig> {
    let mut cfg = RcConfig::default();

    // `url:` may be followed by its value on the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') || line.contains("://") {
                set_rc_value(&mut cfg, pk, strip_quotes(line))?;
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                pending_key = Some(k);
            } else {
                set_rc_value(&mut cfg, k, v)?;
            }
        }
    }

    Ok(cfg)
}

fn set_rc_value(cfg: &mut RcConfig, key: &str, value: &str) -> Result<()> {
    let secs = |v: &str| {
        parse_secs(v)
            .ok_or_else(|| Error::config(format!("`{key}` must be a number of seconds, got '{v}'")))
    };
    match key {
        "url" => cfg.url = Some(value.to_string()),
        "verify" => cfg.verify = Some(parse_bool(value)),
        "cache_dir" => cfg.cache_dir = Some(PathBuf::from(value)),
        "cache_ttl" => cfg.cache_ttl = Some(secs(value)?),
        "timeout" => cfg.timeout = Some(secs(value)?),
        _ => {}
    }
    Ok(())
}

fn rc_candidates(env: &impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    // 1) SDMX_RC (explicit)
    // 2) ./.sdmxrc
    // 3) ~/.sdmxrc
    if let Some(p) = env("SDMX_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".sdmxrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".sdmxrc"));
    }
    v
}
