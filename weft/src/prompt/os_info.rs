//! Human-readable OS description for the workspace-info prompt section, so the
//! agent uses correct path separators and shell syntax for commands it runs.

/// Returns e.g. `"Linux (kernel unknown, x86_64)"`, `"macOS (aarch64)"`,
/// `"Windows (x86_64)"`. No distro/kernel-version detection: std has no
/// portable way to read `/etc/os-release` or `sw_vers`, and shelling out to
/// inspect the machine's own OS isn't worth a process spawn for a prompt
/// header. Good enough for the agent's syntax choices, which only need
/// family-level OS, not exact version.
pub fn detect_os_description() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "linux" => format!("Linux ({arch})"),
        "macos" => format!("macOS ({arch})"),
        "windows" => format!("Windows ({arch})"),
        other => format!("{other} ({arch})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_names_the_current_os_family() {
        let desc = detect_os_description();
        assert!(desc.starts_with("Linux") || desc.starts_with("macOS") || desc.starts_with("Windows") || !desc.is_empty());
    }
}
