pub mod chat;
pub mod cli;
pub mod models;
pub mod project;
pub mod session;

use log::warn;
use rustyline::DefaultEditor;
use std::error::Error;
use std::path::Path;

use chat::{ ChatClient, Verbosity };
use cli::console;
use cli::{ Args, Commands };
use models::chat::ConversationPage;
use project::train_project;
use session::{ SessionState, STATE_PATH };

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let client = ChatClient::from_args(&args)?;
    let mut state = SessionState::load(STATE_PATH);
    if state.conversation_id.is_none() {
        console::notice("No conversation selected. Select one or create a new one.\n");
    }

    match args.command {
        Commands::Train { path } => train(&client, &mut state, &path).await,
        Commands::Ask { question } => ask(client, &mut state, question).await,
        Commands::List => list(&client, &mut state).await,
        Commands::Delete { conversation_ids } => {
            client.delete_conversations(&conversation_ids).await?;
            Ok(())
        }
        Commands::Select { selector } => select(&client, &mut state, selector).await,
        Commands::ListMessages { conversation_id } => {
            list_messages(&client, &state, conversation_id).await
        }
    }
}

async fn train(
    client: &ChatClient,
    state: &mut SessionState,
    path: &Path
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut editor = DefaultEditor::new()?;
    console::plain("This command opens a new chat and trains ChatGPT on the project you're listing.");
    if !cli::confirm(&mut editor, "Do you want to continue? (Press enter to continue) ") {
        return Ok(());
    }

    train_project(client, state, path).await?;
    console::plain("Training done! Now you can ask questions about your project.");
    if let Some(id) = state.conversation_id.clone() {
        open_chat_page(client, &id);
    }
    Ok(())
}

async fn ask(
    mut client: ChatClient,
    state: &mut SessionState,
    question: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    client.verbosity = Verbosity::AnswersOnly;
    let mut editor = DefaultEditor::new()?;

    match question {
        Some(question) => {
            client.ask(state, &question).await?;
        }
        None => {
            console::plain("You can now start a conversation with ChatGPT.");
            console::notice("Write stop or exit to stop the conversation.");
        }
    }

    while let Some(line) = cli::read_line(&mut editor, "You: ")? {
        if line.is_empty() {
            continue;
        }
        if line == "stop" || line == "exit" {
            break;
        }
        client.ask(state, &line).await?;
    }
    Ok(())
}

async fn list(
    client: &ChatClient,
    state: &mut SessionState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let page = client.list_conversations().await?;
    render_listing(&page, state.conversation_id.as_deref());

    if state.conversation_id.is_none() {
        println!();
        choose_conversation(client, state, &page).await?;
    }
    Ok(())
}

async fn select(
    client: &ChatClient,
    state: &mut SessionState,
    selector: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let page = client.list_conversations().await?;

    if let Some(token) = selector {
        if seed_from_token(client, state, &page, &token).await? {
            return Ok(());
        }
        console::notice("No conversation matches that selection.");
    } else {
        render_listing(&page, state.conversation_id.as_deref());
        println!();
    }
    choose_conversation(client, state, &page).await
}

async fn list_messages(
    client: &ChatClient,
    state: &SessionState,
    conversation_id: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(id) = conversation_id.or_else(|| state.conversation_id.clone()) else {
        console::notice("No conversation selected. Select one or create a new one.");
        return Ok(());
    };

    let detail = client.fetch_conversation(&id).await?;
    console::assistant_speaks(&format!("Here's the list of messages in {}:", detail.title));
    for entry in chat::transcript(&detail) {
        console::transcript_row(
            &console::format_message_time(entry.create_time),
            &entry.role,
            &entry.text
        );
    }
    Ok(())
}

fn render_listing(page: &ConversationPage, active: Option<&str>) {
    console::assistant_speaks("Here's the list of our conversations:");
    for (i, item) in page.items.iter().enumerate() {
        console::listing_row(
            i + 1,
            &console::format_listing_time(&item.create_time),
            &item.id,
            &item.title,
            active == Some(item.id.as_str())
        );
    }
    console::plain(
        &format!("Total: {}, Limit: {}, Offset: {}", page.total, page.limit, page.offset)
    );
}

/// Interactive selector: number, id prefix, or `new` for a fresh chat.
/// Unresolvable tokens prompt again; EOF leaves the session untouched.
async fn choose_conversation(
    client: &ChatClient,
    state: &mut SessionState,
    page: &ConversationPage
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut editor = DefaultEditor::new()?;
    loop {
        console::assistant_speaks(
            "You must select a conversation. Select with the number (e.g. 1), passing a part or the full chat id (e.g. a63fe212), or enter 'new' to create a new one"
        );
        let Some(token) = cli::read_line(&mut editor, "> ")? else {
            return Ok(());
        };
        if token.is_empty() {
            continue;
        }
        if seed_from_token(client, state, page, &token).await? {
            return Ok(());
        }
        console::notice("No conversation matches that selection, try again.");
    }
}

/// Apply one selector token; `Ok(false)` means it resolved to nothing.
async fn seed_from_token(
    client: &ChatClient,
    state: &mut SessionState,
    page: &ConversationPage,
    token: &str
) -> Result<bool, Box<dyn Error + Send + Sync>> {
    if token == "new" {
        client.reset_session(state)?;
        client.ask(state, "Creating a new chat").await?;
        if let Some(id) = state.conversation_id.clone() {
            open_chat_page(client, &id);
        }
        return Ok(true);
    }

    match chat::resolve_selector(token, &page.items) {
        Some(id) => {
            client.seed_from_conversation(state, &id).await?;
            console::plain(&format!("Selected conversation {}", id));
            Ok(true)
        }
        None => Ok(false),
    }
}

fn open_chat_page(client: &ChatClient, conversation_id: &str) {
    let url = client.chat_page_url(conversation_id);
    if let Err(e) = webbrowser::open(&url) {
        warn!("Could not open a browser for {}: {}", url, e);
        console::plain(&url);
    }
}
