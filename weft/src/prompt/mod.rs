//! System prompt assembly: skills snapshot, static workspace files, workspace
//! info, and the unified memory projection, cached by workspace-file fingerprint.

mod builder;
mod io;
mod os_info;
mod skills;

pub use builder::{
    build_implicit_recall_context, build_system_prompt, substitute_placeholders,
    PromptBuilderConfig, SESSION_ID_PLACEHOLDER, WORKING_DIR_PLACEHOLDER,
};
pub use skills::generate_skills_snapshot;
