use ignore::WalkBuilder;
use log::warn;
use std::fs;
use std::path::Path;

use crate::chat::{ ChatClient, ChatError };
use crate::session::SessionState;

/// Instruction opening a training conversation. The model is told to hold
/// its answer until the upload terminator arrives.
pub const START_QUESTION: &str =
    "I'm going to paste the content of the files in my project and their filepaths. Wait for me to say UPLOAD_COMPLETED before you start answering. I'll ask you questions after that.";

pub const UPLOAD_COMPLETED: &str = "UPLOAD_COMPLETED";

/// Directory names skipped on top of gitignore rules and hidden entries.
const IGNORED_NAMES: &[&str] = &[".git", ".idea", "node_modules", "target"];

/// Walk a project tree and return (relative path, content) pairs in
/// traversal order. Hidden entries, gitignored paths, and the fixed
/// deny-list are skipped; files that are unreadable or not UTF-8 are
/// skipped with a warning.
pub fn collect_files(root: impl AsRef<Path>) -> Vec<(String, String)> {
    let root = root.as_ref();
    let mut files = Vec::new();

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !IGNORED_NAMES.contains(&name))
                .unwrap_or(true)
        });

    for entry in builder.build().flatten() {
        if entry.depth() == 0 {
            continue;
        }
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        match fs::read_to_string(path) {
            Ok(content) => files.push((relative.to_string_lossy().into_owned(), content)),
            Err(e) => warn!("Skipping unreadable file {}: {}", path.display(), e),
        }
    }

    files
}

fn file_block(path: &str, content: &str) -> String {
    format!("# File: {}\n\n{}\n\n# end of file: {}", path, content, path)
}

fn upload_block(path: &str, content: &str) -> String {
    format!("# File: {}\n\n{}\n\n# End of file: {}", path, content, path)
}

/// Serialize a project snapshot into one delimited prompt: the question (or
/// the training instruction when absent) followed by a block per file, in
/// snapshot order, content inserted verbatim.
pub fn build_prompt(files: &[(String, String)], question: Option<&str>) -> String {
    let question = question.unwrap_or(START_QUESTION);
    if files.is_empty() {
        return question.to_string();
    }
    let blocks = files
        .iter()
        .map(|(path, content)| file_block(path, content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{}\n\n{}", question, blocks)
}

/// Upload a project as conversation context, one turn per file.
///
/// Opens with the training instruction, submits each file's block as its own
/// turn so a large tree never produces one oversized request, and closes
/// with the literal upload terminator. Returns the answer to the terminator
/// turn.
pub async fn train_project(
    client: &ChatClient,
    state: &mut SessionState,
    root: impl AsRef<Path>
) -> Result<String, ChatError> {
    let files = collect_files(root);

    client.ask(state, START_QUESTION).await?;
    for (path, content) in &files {
        client.ask(state, &upload_block(path, content)).await?;
    }
    client.ask(state, UPLOAD_COMPLETED).await
}
