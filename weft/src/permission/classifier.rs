//! Pure risk classifiers for each tool's input: shell commands, Python
//! snippets, URLs, and file paths.

use std::net::IpAddr;

use super::config::RiskLevel;

const CATASTROPHIC_COMMANDS: &[&str] = &["mkfs", "format", "dd", "fdisk", "wipefs"];

const SAFE_COMMANDS: &[&str] = &[
    "ls", "cat", "pwd", "echo", "grep", "find", "head", "tail", "wc", "sort", "uniq", "cut",
    "awk", "sed", "date", "whoami", "which", "env", "printenv", "ps", "df", "du", "true",
    "false", "test",
];

const GIT_WARN_SUBCOMMANDS: &[&str] = &["push", "reset", "clean", "rebase", "merge", "branch", "checkout"];

/// Classifies a shell command string. Splits on `| || && ;` into sub-commands
/// and aggregates the max risk across all of them.
pub fn classify_terminal_command(command: &str) -> RiskLevel {
    if is_fork_bomb(command) {
        return RiskLevel::Blocked;
    }

    let sub_commands = split_shell_command(command);
    if sub_commands.is_empty() {
        return RiskLevel::Warn;
    }

    sub_commands
        .iter()
        .map(|sub| classify_sub_command(sub))
        .max()
        .unwrap_or(RiskLevel::Warn)
}

fn is_fork_bomb(command: &str) -> bool {
    let collapsed: String = command.chars().filter(|c| !c.is_whitespace()).collect();
    collapsed.contains(":(){:|:&};:") || collapsed.contains(":(){:|:&};:&")
}

fn split_shell_command(command: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '|' if chars.peek() == Some(&'|') => {
                chars.next();
                parts.push(std::mem::take(&mut current));
            }
            '|' => parts.push(std::mem::take(&mut current)),
            '&' if chars.peek() == Some(&'&') => {
                chars.next();
                parts.push(std::mem::take(&mut current));
            }
            ';' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts.into_iter().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

fn classify_sub_command(sub: &str) -> RiskLevel {
    let tokens = match shlex::split(sub) {
        Some(t) if !t.is_empty() => t,
        _ => return RiskLevel::Warn,
    };

    let base = base_name(&tokens[0]);

    if base.starts_with("mkfs") || CATASTROPHIC_COMMANDS.contains(&base.as_str()) {
        return RiskLevel::Blocked;
    }
    if is_format_drive_letter(sub) {
        return RiskLevel::Blocked;
    }

    if base == "git" {
        return classify_git(&tokens);
    }

    if base == "rm" || base == "del" {
        let has_recursive = tokens.iter().any(|t| t == "-r" || t == "-rf" || t == "-fr" || t == "--recursive");
        let has_force = tokens.iter().any(|t| t == "-f" || t == "-rf" || t == "-fr" || t == "--force");
        return if has_recursive && has_force {
            RiskLevel::Dangerous
        } else {
            RiskLevel::Warn
        };
    }

    if SAFE_COMMANDS.contains(&base.as_str()) {
        return RiskLevel::Safe;
    }

    RiskLevel::Warn
}

fn classify_git(tokens: &[String]) -> RiskLevel {
    let Some(subcommand) = tokens.get(1) else {
        return RiskLevel::Warn;
    };
    if !GIT_WARN_SUBCOMMANDS.contains(&subcommand.as_str()) {
        return RiskLevel::Warn;
    }
    let forced = tokens.iter().any(|t| t == "--force" || t == "-f" || t == "-D");
    if forced {
        RiskLevel::Dangerous
    } else {
        RiskLevel::Warn
    }
}

fn base_name(token: &str) -> String {
    token.rsplit('/').next().unwrap_or(token).to_lowercase()
}

fn is_format_drive_letter(command: &str) -> bool {
    let lower = command.to_lowercase();
    let trimmed = lower.trim_start();
    if !trimmed.starts_with("format ") {
        return false;
    }
    let rest = trimmed["format ".len()..].trim_start();
    rest.len() >= 2 && rest.as_bytes()[0].is_ascii_alphabetic() && rest.as_bytes()[1] == b':'
}

const DANGEROUS_PY_MODULES: &[&str] = &[
    "os", "subprocess", "shutil", "socket", "ctypes", "signal", "multiprocessing", "threading",
    "http.server", "xmlrpc", "ftplib", "smtplib", "telnetlib", "pickle", "shelve", "marshal",
];

const DANGEROUS_PY_CALLS: &[&str] = &[
    "os.system", "os.exec", "os.spawn", "os.remove", "os.unlink", "subprocess.", "shutil.rmtree",
    "shutil.move", "eval", "exec", "compile", "__import__",
];

/// Classifies a Python source snippet by scanning for dangerous imports and
/// calls. A lightweight textual scan rather than a full AST walk, since this
/// engine has no embedded Python parser; it looks for the same surface the
/// full AST walk would flag (import statements, call expressions, `open(...)`
/// on a sensitive-looking path).
pub fn classify_python_code(code: &str) -> RiskLevel {
    if code.trim().is_empty() {
        return RiskLevel::Safe;
    }

    for line in code.lines() {
        let line = strip_comment(line);
        let trimmed = line.trim();

        if let Some(module) = import_module(trimmed) {
            if DANGEROUS_PY_MODULES.iter().any(|m| module == *m || module.starts_with(&format!("{m}."))) {
                return RiskLevel::Dangerous;
            }
        }

        for call in DANGEROUS_PY_CALLS {
            if line_calls(trimmed, call) {
                return RiskLevel::Dangerous;
            }
        }

        if let Some(path) = open_call_path(trimmed) {
            if looks_sensitive_path(&path) {
                return RiskLevel::Dangerous;
            }
        }
    }

    RiskLevel::Safe
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn import_module(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix("import ") {
        let first = rest.split(|c: char| c == ' ' || c == ',').next().unwrap_or(rest);
        return Some(first.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("from ") {
        let module = rest.split(" import").next().unwrap_or(rest).trim();
        return Some(module.to_string());
    }
    None
}

fn line_calls(line: &str, call: &str) -> bool {
    if call.ends_with('.') {
        line.contains(call)
    } else {
        // word-boundary-ish match so e.g. "reeval" doesn't false-positive on "eval"
        line.match_indices(call).any(|(i, _)| {
            let before_ok = i == 0 || !line.as_bytes()[i - 1].is_ascii_alphanumeric();
            let after = i + call.len();
            let after_ok = line.as_bytes().get(after).map(|b| *b == b'(').unwrap_or(false);
            before_ok && after_ok
        })
    }
}

fn open_call_path(line: &str) -> Option<String> {
    let idx = line.find("open(")?;
    let after = &line[idx + "open(".len()..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &after[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

fn looks_sensitive_path(path: &str) -> bool {
    is_sensitive_file_name(path)
}

/// Classifies a URL: rejects non-http(s) schemes and resolves the host to
/// reject loopback/private/link-local targets (SSRF guard). DNS failure is
/// treated as `warn` rather than `dangerous` since it may just be a typo.
pub async fn classify_url(url: &str) -> RiskLevel {
    let Ok(parsed) = url::Url::parse(url) else {
        return RiskLevel::Warn;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return RiskLevel::Blocked;
    }
    let Some(host) = parsed.host_str() else {
        return RiskLevel::Warn;
    };

    if host.eq_ignore_ascii_case("localhost") {
        return RiskLevel::Blocked;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_private_or_loopback(ip) { RiskLevel::Blocked } else { RiskLevel::Safe };
    }

    let lookup = format!("{host}:0");
    match tokio::net::lookup_host(lookup).await {
        Ok(addrs) => {
            let mut any = false;
            for addr in addrs {
                any = true;
                if is_private_or_loopback(addr.ip()) {
                    return RiskLevel::Blocked;
                }
            }
            if any {
                RiskLevel::Safe
            } else {
                RiskLevel::Warn
            }
        }
        Err(_) => RiskLevel::Warn,
    }
}

fn is_private_or_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || is_unique_local_v6(v6) || is_link_local_v6(v6)
        }
    }
}

fn is_unique_local_v6(v6: std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

fn is_link_local_v6(v6: std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

const SENSITIVE_NAME_SUBSTRINGS: &[&str] = &["credential", "secret", "token", "password", "passwd"];
const SENSITIVE_EXTENSIONS: &[&str] = &["pem", "key", "p12", "pfx", "crt", "jks"];
const SSH_KEY_NAMES: &[&str] = &["id_rsa", "id_dsa", "id_ecdsa", "id_ed25519", "known_hosts", "authorized_keys"];

/// Classifies a file path as `warn` if it looks like it holds secrets, else
/// `safe`.
pub fn classify_file_path(path: &str) -> RiskLevel {
    if is_sensitive_file_name(path) {
        RiskLevel::Warn
    } else {
        RiskLevel::Safe
    }
}

fn is_sensitive_file_name(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();

    if name.starts_with(".env") {
        return true;
    }
    if SSH_KEY_NAMES.contains(&name.as_str()) {
        return true;
    }
    if SENSITIVE_NAME_SUBSTRINGS.iter().any(|s| name.contains(s)) {
        return true;
    }
    if let Some(ext) = name.rsplit('.').next() {
        if SENSITIVE_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_command_is_safe() {
        assert_eq!(classify_terminal_command("ls -la"), RiskLevel::Safe);
    }

    #[test]
    fn mkfs_is_blocked() {
        assert_eq!(classify_terminal_command("mkfs.ext4 /dev/sda1"), RiskLevel::Blocked);
    }

    #[test]
    fn dd_is_blocked() {
        assert_eq!(classify_terminal_command("dd if=/dev/zero of=/dev/sda"), RiskLevel::Blocked);
    }

    #[test]
    fn fork_bomb_is_blocked() {
        assert_eq!(classify_terminal_command(":(){ :|:& };:"), RiskLevel::Blocked);
    }

    #[test]
    fn format_drive_letter_is_blocked() {
        assert_eq!(classify_terminal_command("format c:"), RiskLevel::Blocked);
    }

    #[test]
    fn rm_without_force_and_recursive_is_warn() {
        assert_eq!(classify_terminal_command("rm file.txt"), RiskLevel::Warn);
        assert_eq!(classify_terminal_command("rm -r dir"), RiskLevel::Warn);
    }

    #[test]
    fn rm_rf_is_dangerous() {
        assert_eq!(classify_terminal_command("rm -rf /tmp/work"), RiskLevel::Dangerous);
    }

    #[test]
    fn git_push_is_warn_unless_forced() {
        assert_eq!(classify_terminal_command("git push origin main"), RiskLevel::Warn);
        assert_eq!(classify_terminal_command("git push --force origin main"), RiskLevel::Dangerous);
    }

    #[test]
    fn git_status_is_unknown_but_not_warn_listed() {
        // "status" isn't in the warn-list, so it falls through to the generic unknown case.
        assert_eq!(classify_terminal_command("git status"), RiskLevel::Warn);
    }

    #[test]
    fn unknown_command_is_warn() {
        assert_eq!(classify_terminal_command("some_custom_tool --flag"), RiskLevel::Warn);
    }

    #[test]
    fn aggregate_risk_is_max_across_subcommands() {
        assert_eq!(classify_terminal_command("ls && rm -rf /tmp/x"), RiskLevel::Dangerous);
    }

    #[test]
    fn python_import_os_is_dangerous() {
        assert_eq!(classify_python_code("import os\nos.getcwd()"), RiskLevel::Dangerous);
    }

    #[test]
    fn python_eval_call_is_dangerous() {
        assert_eq!(classify_python_code("eval(user_input)"), RiskLevel::Dangerous);
    }

    #[test]
    fn python_benign_snippet_is_safe() {
        assert_eq!(classify_python_code("x = 1 + 2\nprint(x)"), RiskLevel::Safe);
    }

    #[test]
    fn python_open_sensitive_path_is_dangerous() {
        assert_eq!(classify_python_code("open('/home/user/.ssh/id_rsa')"), RiskLevel::Dangerous);
    }

    #[tokio::test]
    async fn url_with_http_public_host_by_ip_is_safe() {
        assert_eq!(classify_url("http://8.8.8.8/").await, RiskLevel::Safe);
    }

    #[tokio::test]
    async fn url_loopback_ip_is_blocked() {
        assert_eq!(classify_url("http://127.0.0.1/admin").await, RiskLevel::Blocked);
    }

    #[tokio::test]
    async fn url_localhost_host_is_blocked() {
        assert_eq!(classify_url("http://localhost:8000/").await, RiskLevel::Blocked);
    }

    #[tokio::test]
    async fn url_private_ip_is_blocked() {
        assert_eq!(classify_url("http://192.168.1.1/").await, RiskLevel::Blocked);
    }

    #[tokio::test]
    async fn url_non_http_scheme_is_blocked() {
        assert_eq!(classify_url("file:///etc/passwd").await, RiskLevel::Blocked);
    }

    #[test]
    fn file_path_env_is_warn() {
        assert_eq!(classify_file_path(".env.local"), RiskLevel::Warn);
    }

    #[test]
    fn file_path_ssh_key_is_warn() {
        assert_eq!(classify_file_path("/home/user/.ssh/id_rsa"), RiskLevel::Warn);
    }

    #[test]
    fn file_path_ordinary_file_is_safe() {
        assert_eq!(classify_file_path("README.md"), RiskLevel::Safe);
    }
}
