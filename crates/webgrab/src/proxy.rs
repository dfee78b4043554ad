//! Outbound proxy resolution
//!
//! Resolves the proxy for a request through an ordered chain of sources:
//! the caller's explicit value, the process environment, and a best-effort
//! login-shell probe for environments where proxy variables are only set in
//! shell init files. Probe failures never fail the request.

use tracing::{debug, warn};

/// Environment variables consulted, in order
const PROXY_ENV_VARS: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "http_proxy",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
];

/// Resolve the proxy URL for one request.
///
/// Precedence, first non-empty wins:
/// 1. the explicit caller-supplied proxy
/// 2. process environment variables (when `use_system_proxy`)
/// 3. a shell-environment probe (when `use_system_proxy`)
///
/// `NO_PROXY` is logged for visibility but no bypass-list evaluation is
/// performed.
pub async fn resolve(explicit: Option<&str>, use_system_proxy: bool) -> Option<String> {
    if let Some(proxy) = explicit.filter(|p| !p.is_empty()) {
        debug!(proxy, "using explicit proxy");
        return Some(proxy.to_string());
    }

    if !use_system_proxy {
        return None;
    }

    if let Ok(no_proxy) = std::env::var("NO_PROXY").or_else(|_| std::env::var("no_proxy")) {
        if !no_proxy.is_empty() {
            debug!(no_proxy, "NO_PROXY is set but bypass lists are not evaluated");
        }
    }

    for var in PROXY_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                debug!(var, proxy = %value, "using proxy from environment");
                return Some(value);
            }
        }
    }

    match probe_shell_environment().await {
        Some(proxy) => {
            debug!(proxy = %proxy, "using proxy from shell environment probe");
            Some(proxy)
        }
        None => None,
    }
}

/// Ask a login shell for its environment and scan it for proxy variables.
///
/// Some desktop setups export `HTTP_PROXY` only from shell profiles, so the
/// variable is invisible to this process. Any failure here degrades to "no
/// proxy".
async fn probe_shell_environment() -> Option<String> {
    let output = shell_env_command().output().await;
    let output = match output {
        Ok(out) => out,
        Err(err) => {
            warn!(error = %err, "shell environment probe failed");
            return None;
        }
    };
    if !output.status.success() {
        debug!(status = ?output.status, "shell environment probe exited nonzero");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    parse_proxy_assignment(&text)
}

#[cfg(unix)]
fn shell_env_command() -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.args(["-lc", "env"]);
    cmd
}

#[cfg(windows)]
fn shell_env_command() -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.args(["/C", "set"]);
    cmd
}

/// Scan `KEY=value` lines for an `HTTP_PROXY`/`HTTPS_PROXY` assignment
fn parse_proxy_assignment(text: &str) -> Option<String> {
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_uppercase();
        if (key == "HTTP_PROXY" || key == "HTTPS_PROXY") && !value.trim().is_empty() {
            return Some(value.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_proxy_wins() {
        let proxy = resolve(Some("http://proxy.local:8080"), true).await;
        assert_eq!(proxy, Some("http://proxy.local:8080".to_string()));
    }

    #[tokio::test]
    async fn test_empty_explicit_proxy_is_skipped() {
        // An empty explicit value falls through the chain rather than
        // producing an empty proxy URL
        let proxy = resolve(Some(""), false).await;
        assert_eq!(proxy, None);
    }

    #[tokio::test]
    async fn test_system_proxy_disabled() {
        let proxy = resolve(None, false).await;
        assert_eq!(proxy, None);
    }

    #[test]
    fn test_parse_proxy_assignment() {
        assert_eq!(
            parse_proxy_assignment("PATH=/usr/bin\nHTTP_PROXY=http://p:3128\nHOME=/root"),
            Some("http://p:3128".to_string())
        );
        assert_eq!(
            parse_proxy_assignment("https_proxy=http://s:3128"),
            Some("http://s:3128".to_string())
        );
        assert_eq!(parse_proxy_assignment("PATH=/usr/bin\nHOME=/root"), None);
        assert_eq!(parse_proxy_assignment("HTTP_PROXY="), None);
        assert_eq!(parse_proxy_assignment(""), None);
    }
}
