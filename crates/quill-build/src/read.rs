use std::path::PathBuf;

use quill_syntax::ModuleLocation;

use crate::config::{Config, SOURCE_EXTENSION};

/// Relative path of a module's source file below a `src` directory.
pub fn module_path(location: &ModuleLocation) -> PathBuf {
    let mut path: PathBuf = location.parts.iter().map(|part| part.as_str()).collect();
    path.set_extension(SOURCE_EXTENSION);
    path
}

/// Load the text of `location` from the first source root that has it.
/// A module found nowhere reads as empty text, leaving the parser to
/// report whatever is missing.
pub async fn read_module(config: &Config, location: &ModuleLocation) -> String {
    let relative = module_path(location);
    for root in config.source_roots() {
        let path = root.join(&relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::debug!(module = %location, path = %path.display(), "read module");
                return text;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                tracing::warn!(module = %location, path = %path.display(), %err, "unreadable module");
            }
        }
    }
    tracing::debug!(module = %location, "module not found, reading as empty");
    String::new()
}

/// Every module under the project's `src` directory, sorted.
pub async fn project_modules(config: &Config) -> Vec<ModuleLocation> {
    let src = config.root.join("src");
    let mut modules = Vec::new();
    let mut pending = vec![src.clone()];
    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(path = %dir.display(), %err, "skipping directory");
                continue;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
                if let Ok(relative) = path.with_extension("").strip_prefix(&src) {
                    let parts: Vec<String> = relative
                        .components()
                        .map(|part| part.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    modules.push(ModuleLocation::new(parts));
                }
            }
        }
    }
    modules.sort();
    modules
}
