use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use termsai_app::terminal::{describe_graph, TerminalView};
use termsai_app::Controller;
use termsai_client::HttpBackend;
use termsai_core::config::ClientConfig;

const HELP: &str = "\
commands:
  topic <text>     set the topic
  count <n> | + | -  set, increase or decrease the concept count (5-20)
  gen              generate, regenerate, or abort while generating
  abort            abort the running session
  like | dislike   feedback on the displayed graph
  add <concept>    merge a new concept into the graph
  search <id>      load a saved graph
  get <id>         print a saved graph without displaying it
  node [<id>]      inspect a node, or clear the selection
  quit";

type App = Controller<HttpBackend, TerminalView>;

struct Args {
    graph_id: Option<String>,
    base_url: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        graph_id: None,
        base_url: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--graph-id" => args.graph_id = Some(iter.next().ok_or("--graph-id needs a value")?),
            "--base-url" => args.base_url = Some(iter.next().ok_or("--base-url needs a value")?),
            "-h" | "--help" => {
                println!("usage: termsai [--base-url URL] [--graph-id ID]\n\n{HELP}");
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(args)
}

/// Run a session in the background so the prompt stays responsive.
fn spawn_session<F>(fut: F)
where
    F: std::future::Future<Output = termsai_app::GenerationState> + Send + 'static,
{
    tokio::spawn(async move {
        let state = fut.await;
        tracing::debug!(%state, "session returned");
    });
}

fn dispatch(app: &App, line: &str) -> bool {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "help" => println!("{HELP}"),
        "topic" => app.set_topic(rest),
        "count" => match rest.parse::<u32>() {
            Ok(n) => println!("count = {}", app.set_count(n).get()),
            Err(_) => println!("count = {}", app.count().get()),
        },
        "+" => println!("count = {}", app.increment_count().get()),
        "-" => println!("count = {}", app.decrement_count().get()),
        "gen" => {
            let app = app.clone();
            spawn_session(async move { app.click_generate().await });
        }
        "abort" => {
            if !app.abort() {
                println!("nothing to abort");
            }
        }
        "like" => {
            let app = app.clone();
            spawn_session(async move { app.like().await });
        }
        "dislike" => {
            let app = app.clone();
            spawn_session(async move { app.regenerate().await });
        }
        "add" => {
            let app = app.clone();
            let concept = rest.to_string();
            spawn_session(async move { app.add_concept(&concept).await });
        }
        "search" => {
            let app = app.clone();
            let id = rest.to_string();
            spawn_session(async move { app.search_graph(&id).await });
        }
        "get" => {
            let app = app.clone();
            let id = rest.to_string();
            tokio::spawn(async move {
                match app.get_graph(&id).await {
                    Ok(payload) => {
                        println!(
                            "{} ({} concepts)",
                            payload.topic.as_deref().unwrap_or("?"),
                            payload.concept_count.unwrap_or_default()
                        );
                        for line in describe_graph(&payload.network_data) {
                            println!("{line}");
                        }
                    }
                    Err(e) => println!("!! {e}"),
                }
            });
        }
        "node" => {
            let id = (!rest.is_empty()).then_some(rest);
            app.select_node(id);
        }
        other => println!("unknown command '{other}', try 'help'"),
    }
    true
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "termsai=info".into()),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("termsai: {e}");
            std::process::exit(2);
        }
    };

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("termsai: {e}");
            std::process::exit(2);
        }
    };
    if let Some(url) = args.base_url {
        config = config.with_base_url(url);
    }
    tracing::info!(base_url = %config.base_url, "Starting TermsAI client");

    let backend = match HttpBackend::new(config.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("termsai: {e}");
            std::process::exit(1);
        }
    };
    let view = Arc::new(TerminalView::new());
    let app: App = Controller::new(backend, Arc::clone(&view), config);

    match args.graph_id {
        Some(id) => {
            app.load_graph_by_id(&id).await;
        }
        None => {
            app.load_default_graph().await;
        }
    }

    let ctrl_c_app = app.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !ctrl_c_app.abort() {
                std::process::exit(130);
            }
        }
    });

    view.prompt();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !dispatch(&app, line.trim()) {
            break;
        }
        view.prompt();
    }
    app.abort();
}
