//! Built-in tools available to every planner

use std::path::PathBuf;

use futures::FutureExt;
use serde_json::{Value, json};

use super::ToolRegistry;
use crate::{Error, Result};

/// Maximum directory entries returned by `list_directory`
const MAX_DIR_ENTRIES: usize = 100;

/// Register `current_time` and `list_directory`
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(
        "current_time",
        "Get the current local date and time",
        json!({ "type": "object", "properties": {} }),
        |_| async { Ok(current_time()) }.boxed(),
    );

    registry.register(
        "list_directory",
        "List the names of files and folders in a directory",
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory path; ~ expands to home" }
            },
            "required": ["path"]
        }),
        |args| async move { list_directory(&args).await }.boxed(),
    );
}

fn current_time() -> String {
    chrono::Local::now()
        .format("%A, %B %-d, %Y at %-I:%M %p")
        .to_string()
}

async fn list_directory(args: &Value) -> Result<String> {
    let raw = args["path"].as_str().unwrap_or_default();
    let path = expand_home(raw);

    let mut entries = tokio::fs::read_dir(&path)
        .await
        .map_err(|e| Error::Tool(format!("cannot read {}: {e}", path.display())))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let total = names.len();
    if total == 0 {
        return Ok(format!("{} is empty", path.display()));
    }

    names.truncate(MAX_DIR_ENTRIES);
    let mut out = names.join("\n");
    if total > MAX_DIR_ENTRIES {
        out.push_str(&format!("\n... and {} more", total - MAX_DIR_ENTRIES));
    }
    Ok(out)
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix('~') {
        Some(rest) => directories::BaseDirs::new().map_or_else(
            || PathBuf::from(raw),
            |d| d.home_dir().join(rest.trim_start_matches('/')),
        ),
        None => PathBuf::from(raw),
    }
}
