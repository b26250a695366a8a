pub mod console;

use clap::{ Parser, Subcommand };
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

use crate::chat::{ DEFAULT_BASE_URL, DEFAULT_MODEL };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Use ChatGPT to ask questions about your project", long_about = None)]
pub struct Args {
    // --- Credential Args ---
    /// Bearer token lifted from an authenticated ChatGPT browser session
    #[arg(long, env = "OPENAI_BEARER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Cookie header lifted from the same browser session
    #[arg(long, env = "OPENAI_COOKIE", hide_env_values = true)]
    pub cookie: String,

    // --- Backend Args ---
    /// Base URL of the ChatGPT web backend
    #[arg(long, env = "CHATGPT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model slug submitted with every turn
    #[arg(long, env = "CHATGPT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read all the files in a folder and train ChatGPT on them via a prompt
    Train {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Ask a question about the project, then keep the conversation going
    Ask {
        question: Option<String>,
    },
    /// List the conversations stored remotely
    List,
    /// Soft-delete conversations by id
    Delete {
        conversation_ids: Vec<String>,
    },
    /// Select the conversation that later questions continue
    Select {
        selector: Option<String>,
    },
    /// Print every message in a conversation
    ListMessages {
        conversation_id: Option<String>,
    },
}

/// One line of interactive input, `None` on EOF or interrupt.
pub fn read_line(editor: &mut DefaultEditor, prompt: &str) -> rustyline::Result<Option<String>> {
    match editor.readline(prompt) {
        Ok(line) => {
            let line = line.trim().to_string();
            if !line.is_empty() {
                let _ = editor.add_history_entry(&line);
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Print a notice and wait for the user to press enter.
pub fn confirm(editor: &mut DefaultEditor, prompt: &str) -> bool {
    matches!(read_line(editor, prompt), Ok(Some(_)))
}
