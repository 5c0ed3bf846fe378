use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use verdant_session::account::AuthError;
use verdant_session::config::Config;
use verdant_session::models::ChatRole;
use verdant_session::session::{GenerationStatus, Panel, SearchSession};
use verdant_session::state::ClientState;

const HELP: &str = "\
commands:
  search <text>            run a new search
  type <text>              show typeahead suggestions
  page <n>                 go to page n
  image <path>             search by image file
  pick <n> / related <n>   branch into a suggested question / related search
  back                     return to the query before the last branch
  regen                    regenerate the AI summary
  ask <n>                  send suggested question n to the assistant
  chat <text>              talk to the assistant
  open | close | min | restore | expand
  refine                   rewrite the query from the conversation
  login <email> <password>
  register <name> <email> <password>
  logout
  history [clear | rm <id>]
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    tracing::info!("Search backend: {}", config.search_base_url);
    tracing::info!("Account backend: {}", config.account_base_url);

    let state = ClientState::new(config)?;
    state.init().await;
    let session = state.session();

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match cmd {
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            "search" => {
                session.submit(rest).await;
            }
            "type" => {
                session.type_query(rest);
                session.settle().await;
                for suggestion in session.suggestions() {
                    println!("  > {suggestion}");
                }
                continue;
            }
            "page" => match rest.parse::<u32>() {
                Ok(page) => {
                    session.change_page(page).await;
                }
                Err(_) => println!("usage: page <n>"),
            },
            "image" => {
                let path = Path::new(rest);
                match tokio::fs::read(path).await {
                    Ok(bytes) => {
                        if let Err(e) = session.search_by_image(&bytes, mime_for(path)).await {
                            println!("Image search failed: {e:#}");
                        }
                    }
                    Err(e) => println!("Cannot read {}: {e}", path.display()),
                }
            }
            "pick" => match nth(&session.questions().questions, rest) {
                Some(question) => {
                    session.select_question(&question).await;
                }
                None => println!("no such question"),
            },
            "related" => match nth(&session.summary().related, rest) {
                Some(keywords) => {
                    session.select_related_search(&keywords).await;
                }
                None => println!("no such related search"),
            },
            "back" => {
                if session.go_back().await.is_none() {
                    println!("nothing to go back to");
                }
            }
            "regen" => {
                session.regenerate_summary().await;
            }
            "ask" => match nth(&session.questions().questions, rest) {
                Some(question) => session.ask_assistant(&question),
                None => println!("no such question"),
            },
            "chat" => {
                session.open_assistant();
                session.send_chat(rest).await;
            }
            "open" => session.open_assistant(),
            "close" => session.close_assistant(),
            "min" => session.minimize_assistant(),
            "restore" => session.restore_assistant(),
            "expand" => session.toggle_assistant_expanded(),
            "refine" => {
                session.refine_query().await;
            }
            "login" => {
                let mut parts = rest.split_whitespace();
                let (email, password) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
                report_auth(state.auth.login(email, password).await.map(|u| u.name));
                state.history.refresh().await;
                continue;
            }
            "register" => {
                let mut parts = rest.split_whitespace();
                let name = parts.next().unwrap_or("");
                let email = parts.next().unwrap_or("");
                let password = parts.next().unwrap_or("");
                report_auth(state.auth.register(name, email, password).await.map(|u| u.name));
                continue;
            }
            "logout" => {
                state.auth.logout();
                state.history.forget();
                println!("Logged out");
                continue;
            }
            "history" => {
                let mut parts = rest.split_whitespace();
                match (parts.next(), parts.next().and_then(|id| id.parse::<u64>().ok())) {
                    (Some("clear"), _) => state.history.clear().await,
                    (Some("rm"), Some(id)) => state.history.remove(id).await,
                    _ => state.history.refresh().await,
                }
                if !state.auth.is_authenticated() {
                    println!("Log in to see your search history");
                }
                for entry in state.history.entries() {
                    println!("  [{}] {} ({})", entry.id, entry.query, entry.timestamp.format("%Y-%m-%d %H:%M"));
                }
                continue;
            }
            other => {
                println!("unknown command {other:?}, try `help`");
                continue;
            }
        }

        session.settle().await;
        print_session(&session);
    }

    session.shutdown().await;
    Ok(())
}

fn nth(items: &[String], index: &str) -> Option<String> {
    let n = index.parse::<usize>().ok()?;
    items.get(n.checked_sub(1)?).cloned()
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn report_auth(result: Result<String, AuthError>) {
    match result {
        Ok(name) => println!("Welcome, {name}"),
        Err(AuthError::Validation(errors)) => println!("{errors}"),
        Err(e) => println!("{e:#}"),
    }
}

fn print_session(session: &SearchSession) {
    let Some(query) = session.query() else {
        return;
    };
    let state = session.fetch_state();
    let results = &state.results;

    println!();
    println!(
        "── {:?} page {}/{} ({} results) ──",
        query.text,
        query.page,
        results.total_pages.max(1),
        results.total
    );
    if results.is_empty() {
        println!("  No results found.");
    }
    for (i, item) in results.items.iter().enumerate() {
        let url = item.display_url.as_deref().or(item.url.as_deref()).unwrap_or("");
        println!("  {:>2}. {}  {}", i + 1, item.title, url);
    }

    let summary = session.summary();
    match &summary.status {
        GenerationStatus::Ready => {
            if let Some(text) = &summary.summary {
                println!("\nAI summary:\n  {text}");
            }
        }
        GenerationStatus::Failed(message) => println!("\nAI summary: {message}"),
        GenerationStatus::Loading => println!("\nAI summary: generating..."),
        GenerationStatus::Idle => {}
    }
    for (i, related) in summary.related.iter().enumerate() {
        println!("  related {}: {related}", i + 1);
    }

    let questions = session.questions();
    if let GenerationStatus::Failed(message) = &questions.status {
        println!("\nPeople also ask: {message}");
    } else if !questions.questions.is_empty() {
        println!("\nPeople also ask:");
        for (i, question) in questions.questions.iter().enumerate() {
            println!("  {}. {question}", i + 1);
        }
    }

    let assistant = session.assistant();
    if assistant.panel == Panel::Open {
        println!("\nAssistant:");
        for message in &assistant.transcript {
            let who = match message.role {
                ChatRole::User => "you",
                ChatRole::Assistant => "ai",
            };
            println!("  {who}: {}", message.content);
        }
    }
    if session.can_go_back() {
        println!("\n(type `back` to return to the previous search)");
    }
}
