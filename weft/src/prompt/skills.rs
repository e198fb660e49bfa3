//! Skills snapshot: an XML listing of discovered skills for the system prompt.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::io::read_file_smart;

#[derive(Debug, Clone, Default, Deserialize)]
struct SkillFrontmatter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// Scans each directory in `skills_dirs` for immediate subdirectories containing a
/// `SKILL.md`, and renders `<available_skills>` XML with name/description/location
/// per skill. Directories that don't exist are skipped silently.
pub async fn generate_skills_snapshot(skills_dirs: &[PathBuf], data_dir: &Path, project_root: &Path) -> String {
    let mut xml = String::from("<available_skills>\n");

    for base_dir in skills_dirs {
        let Ok(mut entries) = tokio::fs::read_dir(base_dir).await else {
            continue;
        };

        let mut skill_dirs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                skill_dirs.push(entry.path());
            }
        }
        skill_dirs.sort();

        for skill_dir in skill_dirs {
            let skill_md = skill_dir.join("SKILL.md");
            if tokio::fs::metadata(&skill_md).await.is_err() {
                continue;
            }

            let (name, description) = parse_skill_frontmatter(&skill_md).await;
            let name = if name.is_empty() {
                skill_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            } else {
                name
            };

            let rel_path = skill_md
                .strip_prefix(data_dir)
                .or_else(|_| skill_md.strip_prefix(project_root))
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|_| skill_md.clone());

            xml.push_str("  <skill>\n");
            xml.push_str(&format!("    <name>{name}</name>\n"));
            xml.push_str(&format!("    <description>{description}</description>\n"));
            xml.push_str(&format!("    <location>./{}</location>\n", rel_path.display()));
            xml.push_str("  </skill>\n");
        }
    }

    xml.push_str("</available_skills>");
    xml
}

/// Parses the YAML frontmatter block (`---\n...\n---`) at the top of a SKILL.md.
/// Returns empty strings on any read or parse failure rather than erroring the
/// whole snapshot.
async fn parse_skill_frontmatter(skill_md: &Path) -> (String, String) {
    let content = read_file_smart(skill_md, None).await;
    let Some(rest) = content.strip_prefix("---") else {
        return (String::new(), String::new());
    };
    let Some(end) = rest.find("\n---") else {
        return (String::new(), String::new());
    };
    let yaml = &rest[..end];

    match serde_yaml::from_str::<SkillFrontmatter>(yaml) {
        Ok(fm) => (fm.name, fm.description),
        Err(_) => (String::new(), String::new()),
    }
}
