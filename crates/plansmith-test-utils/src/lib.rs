//! Shared test utilities for plansmith integration tests.
//!
//! Provides:
//! - [`ScriptedGenerator`]: a [`TextGenerator`] that replays canned replies
//!   and counts how often it was called, so tests can assert on fallback
//!   order without any network.
//! - [`TempProject`]: a temporary project root with a master plan on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;

use plansmith_core::provider::{ProviderError, TextGenerator};

/// One canned behaviour for a [`ScriptedGenerator`] call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text.
    Text(String),
    /// Fail as if the credential were rejected.
    AuthFailure,
    /// Fail as if the provider were rate limiting.
    RateLimited,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// A generator that replays [`Reply`] values in order.
///
/// When the script runs out, the last reply repeats. Cloning shares the call
/// counter and the record of received prompts, so a clone kept by the test
/// observes what the pipeline did with the original.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    name: String,
    replies: Arc<Vec<Reply>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedGenerator {
    pub fn new(name: &str, replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "a scripted generator needs at least one reply");
        Self {
            name: name.to_string(),
            replies: Arc::new(replies),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shorthand for a generator that always returns `text`.
    pub fn replying(name: &str, text: impl Into<String>) -> Self {
        Self::new(name, vec![Reply::text(text)])
    }

    /// Shorthand for a generator whose every call fails with an auth error.
    pub fn failing(name: &str) -> Self {
        Self::new(name, vec![Reply::AuthFailure])
    }

    /// How many times `generate` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `(system, prompt)` pair received, in call order.
    pub async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .await
            .push((system.to_string(), prompt.to_string()));

        let reply = &self.replies[index.min(self.replies.len() - 1)];
        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::AuthFailure => Err(ProviderError::Authentication("invalid x-api-key".to_string())),
            Reply::RateLimited => Err(ProviderError::RateLimited("slow down".to_string())),
        }
    }
}

/// A throwaway project directory, removed on drop.
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    /// Create an empty project root.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Create a project root with `docs/MASTER_PLAN.md` containing `text`.
    pub fn with_master_plan(text: &str) -> Self {
        let project = Self::new();
        project.write("docs/MASTER_PLAN.md", text);
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn master_plan_path(&self) -> PathBuf {
        self.root().join("docs/MASTER_PLAN.md")
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
    }

    /// Read a file relative to the root, or `None` if it does not exist.
    pub fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.root().join(relative)).ok()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root().join(relative).exists()
    }

    /// Every regular file under the root, as sorted root-relative paths.
    pub fn files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_files(self.root(), self.root(), &mut out);
        out.sort();
        out
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}
