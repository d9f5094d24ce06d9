//! Prompt construction from the master plan, the task, and the active format.
//!
//! Pure string assembly apart from [`MasterPlan::load`]. The response-format
//! block is taken from [`Format::schema`] so the instructions and the parser
//! can never disagree about field names.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::Format;

// ---------------------------------------------------------------------------
// Master plan
// ---------------------------------------------------------------------------

/// The design document a run is generated from. Read once, never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPlan {
    path: Option<PathBuf>,
    text: String,
}

/// The master plan file could not be read.
#[derive(Debug, Error)]
#[error("master plan not readable at {}: {source}", path.display())]
pub struct MasterPlanError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl MasterPlan {
    /// Read the whole file as UTF-8 text.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MasterPlanError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MasterPlanError {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
        })
    }

    /// Wrap text that did not come from a file.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// System instruction plus user message for a single generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Build the prompt for one run.
    pub fn build(master_plan: &MasterPlan, task: &str, format: Format) -> Self {
        Self {
            system: build_system_prompt(format),
            user: build_user_prompt(master_plan, task, format),
        }
    }
}

/// Role and working rules for the build agent. Format-independent.
const AGENT_RULES: &str = r#"You are a build agent. Generate production-grade code for the project described by the MASTER PLAN.

Rules:
1. Implement exactly what the TASK asks for, consistent with the MASTER PLAN.
2. Every file you return is written verbatim to the given path, overwriting any existing file. Return complete file contents, never fragments or diffs.
3. Paths are relative to the project root. Never use absolute paths or `..` segments.
4. Never put secrets or credentials in generated files.
5. Database migrations and scripts are written, not executed.
"#;

/// Build the system instruction, including the exact response shape.
pub fn build_system_prompt(format: Format) -> String {
    let name = format.display_name();
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(AGENT_RULES);
    prompt.push('\n');
    prompt.push_str(&format!("RETURN ONLY a {name} object of shape:\n"));
    prompt.push_str(format.schema());
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "No markdown, no prose, no code fences. If unsure, return a minimal valid {name} \
         object with an empty \"files\" list and a diagnostic \"notes\".\n"
    ));

    prompt
}

/// Build the user message: master plan verbatim, task, and response format.
pub fn build_user_prompt(master_plan: &MasterPlan, task: &str, format: Format) -> String {
    let name = format.display_name();
    let mut prompt = String::with_capacity(master_plan.text().len() + task.len() + 512);

    prompt.push_str("MASTER PLAN:\n");
    prompt.push_str(master_plan.text());
    prompt.push_str("\n\nTASK:\n");
    prompt.push_str(task);
    prompt.push_str("\n\nRESPONSE FORMAT (STRICT):\n");
    prompt.push_str(format.schema());
    prompt.push_str(&format!("\nReturn ONLY this {name}.\n"));

    prompt
}
