//! Best-effort text file reading for prompt sources: missing files read as empty,
//! invalid UTF-8 is lossily repaired rather than erroring the whole prompt.

use std::path::Path;

/// Reads `path` as UTF-8 text, falling back to lossy decoding on invalid bytes.
/// Returns an empty string if the file doesn't exist or can't be read. When
/// `max_chars` is set and the content exceeds it, truncates with a trailing
/// marker (the caller already has budget-aware truncation for the memory
/// section; this is the per-file variant used for workspace files and skills).
pub async fn read_file_smart(path: &Path, max_chars: Option<usize>) -> String {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return String::new();
    };

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };

    match max_chars {
        Some(max) if content.chars().count() > max => {
            let truncated: String = content.chars().take(max).collect();
            format!("{truncated}\n\n...[truncated]")
        }
        _ => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let content = read_file_smart(Path::new("/nonexistent/file/path.md"), None).await;
        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn reads_plain_utf8_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SOUL.md");
        tokio::fs::write(&path, "hello world").await.unwrap();
        assert_eq!(read_file_smart(&path, None).await, "hello world");
    }

    #[tokio::test]
    async fn invalid_utf8_is_lossily_repaired_not_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.md");
        let mut bytes = b"before ".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b" after");
        tokio::fs::write(&path, &bytes).await.unwrap();

        let content = read_file_smart(&path, None).await;
        assert!(content.contains("before"));
        assert!(content.contains("after"));
    }

    #[tokio::test]
    async fn long_content_is_truncated_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.md");
        tokio::fs::write(&path, "x".repeat(100)).await.unwrap();

        let content = read_file_smart(&path, Some(10)).await;
        assert!(content.starts_with(&"x".repeat(10)));
        assert!(content.ends_with("...[truncated]"));
    }
}
