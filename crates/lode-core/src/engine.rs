//! Name of the engine build side effects are cached for.
//!
//! Format: `<os>-<arch>-node-v<major>`, using Node's platform and arch
//! spellings (`darwin`, `win32`, `x64`, `arm64`, ...) so that caches written
//! by other tools for the same machine match.

use std::process::Command;

/// Environment variable overriding the detected Node.js version.
pub const NODE_VERSION_ENV: &str = "LODE_NODE_VERSION";

/// The engine name of this machine.
#[must_use]
pub fn engine_name() -> String {
    let runtime = std::env::var(NODE_VERSION_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(detect_node_version)
        .and_then(|v| node_major(&v))
        .map_or_else(|| "unknown".to_string(), |major| format!("node-v{major}"));

    format!(
        "{}-{}-{runtime}",
        node_platform(std::env::consts::OS),
        node_arch(std::env::consts::ARCH)
    )
}

fn detect_node_version() -> Option<String> {
    let output = Command::new("node").arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Major version from `v20.11.1`, `20.11.1` or `20`.
fn node_major(version: &str) -> Option<u32> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    version.split('.').next()?.parse().ok()
}

fn node_platform(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn node_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        "powerpc64" => "ppc64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_node_major() {
        assert_eq!(node_major("v20.11.1"), Some(20));
        assert_eq!(node_major("18.0.0\n"), Some(18));
        assert_eq!(node_major("22"), Some(22));
        assert_eq!(node_major("nightly"), None);
    }

    #[test]
    fn test_node_spellings() {
        assert_eq!(node_platform("macos"), "darwin");
        assert_eq!(node_platform("windows"), "win32");
        assert_eq!(node_platform("linux"), "linux");
        assert_eq!(node_arch("x86_64"), "x64");
        assert_eq!(node_arch("aarch64"), "arm64");
    }

    #[test]
    #[serial]
    fn test_engine_name_from_env() {
        std::env::set_var(NODE_VERSION_ENV, "v20.1.0");
        let name = engine_name();
        std::env::remove_var(NODE_VERSION_ENV);

        assert!(name.ends_with("-node-v20"), "{name}");
        assert!(name.starts_with(node_platform(std::env::consts::OS)));
    }
}
