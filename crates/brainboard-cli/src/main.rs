use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use brainboard_chat::{rehydrate_message, ChatService};
use brainboard_client::{ApiConfig, BrainClient};
use brainboard_graph::{build_graph, node_neighbors, search_nodes, stats, Graph};
use brainboard_schema::{ChatMessage, MessagePayload, NotificationKind};
use config::load_config;

#[derive(Parser)]
#[command(name = "brainboard", version, about = "Operator console for the brain backend")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.brainboard",
        help = "Config root directory (contains config/ and logs/)"
    )]
    config_root: PathBuf,

    #[arg(long, help = "Override the configured org id")]
    org: Option<String>,

    #[arg(long, help = "Override the configured user id")]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive chat against the brain backend")]
    Chat,
    #[command(subcommand, about = "Chat session management")]
    Session(SessionCommands),
    #[command(subcommand, about = "Knowledge graph inspection")]
    Graph(GraphCommands),
}

#[derive(Subcommand)]
enum SessionCommands {
    #[command(about = "List recent sessions")]
    List {
        #[arg(long, default_value = "20", help = "Maximum sessions to fetch")]
        limit: u32,
    },
    #[command(about = "Show a session's messages")]
    Show {
        #[arg(help = "Session ID")]
        session_id: String,
    },
    #[command(about = "Delete a session")]
    Delete {
        #[arg(help = "Session ID")]
        session_id: String,
    },
}

#[derive(Subcommand)]
enum GraphCommands {
    #[command(about = "Node/link counts and degree for the org graph")]
    Stats,
    #[command(about = "Search nodes by name substring")]
    Search {
        #[arg(help = "Query string")]
        query: String,
    },
    #[command(about = "List nodes connected to a node")]
    Neighbors {
        #[arg(help = "Node ID")]
        node_id: String,
    },
}

const GRAPH_PAGE_SIZE: u32 = 200;

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "brainboard.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let mut config = load_config(&cli.config_root)?;
    if let Some(org) = cli.org {
        config.identity.org_id = org;
    }
    if let Some(user) = cli.user {
        config.identity.user_id = user;
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    tracing::debug!(api_base = %config.api.base_url, org = %config.identity.org_id, "configured");
    let client = BrainClient::from_config(&ApiConfig {
        base_url: config.api.base_url.clone(),
    });

    match command {
        Commands::Chat => {
            let service = ChatService::new(
                client,
                config.identity.user_id.clone(),
                config.identity.org_id.clone(),
            )
            .with_max_context_items(config.chat.max_context_items);
            run_chat_repl(service).await?;
        }
        Commands::Session(cmd) => match cmd {
            SessionCommands::List { limit } => {
                let sessions = client
                    .list_sessions(&config.identity.user_id, &config.identity.org_id, limit)
                    .await?;
                if sessions.is_empty() {
                    println!("No sessions.");
                } else {
                    println!("{:<38} {:<10} {:<8} {:<30}", "ID", "STATUS", "MSGS", "TITLE");
                    println!("{}", "-".repeat(88));
                    for session in &sessions {
                        println!(
                            "{:<38} {:<10} {:<8} {:<30}",
                            session.id, session.status, session.message_count, session.title
                        );
                    }
                }
            }
            SessionCommands::Show { session_id } => {
                let history = client.get_session(&session_id).await?;
                println!("{} ({} messages)", history.title, history.messages.len());
                println!("{}", "-".repeat(60));
                for stored in &history.messages {
                    print_message(&rehydrate_message(stored));
                }
            }
            SessionCommands::Delete { session_id } => {
                client.delete_session(&session_id).await?;
                println!("Session '{session_id}' deleted.");
            }
        },
        Commands::Graph(cmd) => {
            let graph = load_org_graph(&client, &config.identity.org_id).await?;
            match cmd {
                GraphCommands::Stats => {
                    let s = stats(&graph);
                    println!("Nodes: {}", s.node_count);
                    println!("Links: {}", s.link_count);
                    println!("Average degree: {:.2}", s.avg_degree);
                    let mut by_type: Vec<_> = s.by_type.iter().collect();
                    by_type.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
                    for (entity_type, count) in by_type {
                        println!("  {entity_type:<24} {count}");
                    }
                }
                GraphCommands::Search { query } => {
                    let hits = search_nodes(&graph, &query);
                    if hits.is_empty() {
                        println!("No matching nodes.");
                    } else {
                        for node in hits {
                            println!("{:<38} {:<20} {}", node.id, node.entity_type, node.name);
                        }
                    }
                }
                GraphCommands::Neighbors { node_id } => {
                    let neighbors = node_neighbors(&graph, &node_id);
                    if neighbors.is_empty() {
                        println!("No neighbors.");
                    } else {
                        for id in &neighbors {
                            let name = graph
                                .nodes
                                .iter()
                                .find(|n| &n.id == id)
                                .map(|n| n.name.as_str())
                                .unwrap_or("?");
                            println!("{id:<38} {name}");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

async fn load_org_graph(client: &BrainClient, org_id: &str) -> Result<Graph> {
    let entities = client.fetch_all_entities(org_id, GRAPH_PAGE_SIZE).await?;
    let edges = client.fetch_all_edges(org_id, GRAPH_PAGE_SIZE).await?;
    Ok(build_graph(&entities, &edges))
}

async fn run_chat_repl(mut service: ChatService) -> Result<()> {
    println!("brainboard chat. '/quit' to exit, '/new' for a fresh session,");
    println!("'/sessions' to list history, '/load <id>' to resume one.");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                service.new_chat();
                println!("Started a new conversation.");
                continue;
            }
            "/sessions" => {
                for session in service.list_sessions(20).await {
                    println!("{:<38} {}", session.id, session.title);
                }
                print_notifications(&mut service);
                continue;
            }
            _ => {}
        }
        if let Some(session_id) = input.strip_prefix("/load ") {
            service.load_session(session_id.trim()).await;
            println!(
                "Loaded '{}' ({} messages).",
                service.store().session().title,
                service.store().messages.len()
            );
            print_notifications(&mut service);
            continue;
        }

        service.send_message(input).await;
        if let Some(reply) = service.store().messages.last() {
            print_message(reply);
        }
        print_notifications(&mut service);
    }

    Ok(())
}

fn print_message(msg: &ChatMessage) {
    let role = match msg.role {
        brainboard_schema::ChatRole::User => "you",
        brainboard_schema::ChatRole::Assistant => "brain",
    };
    match &msg.payload {
        MessagePayload::Text => println!("[{role}] {}", msg.content),
        MessagePayload::ActionPlan(plan) => {
            println!("[{role}] {}", msg.content);
            println!(
                "  plan: {} (risk: {}, {}/{} steps{})",
                plan.goal,
                plan.risk_level.as_str(),
                plan.steps_completed,
                plan.steps_total,
                if plan.requires_approval {
                    ", approval required"
                } else {
                    ""
                }
            );
            for step in &plan.steps {
                println!("    - {}", step.description);
            }
        }
        MessagePayload::Insight(insight) => {
            println!("[{role}] insight: {}", insight.title);
            println!("  {}", insight.body);
        }
        MessagePayload::Task(task) => {
            println!(
                "[{role}] task '{}': {} ({:.0}%)",
                task.title,
                task.status,
                task.progress * 100.0
            );
        }
        MessagePayload::SystemEvent(event) => {
            println!("[{role}] system: {} ({:?})", event.event, event.severity);
        }
        MessagePayload::Reflection(reflection) => {
            println!(
                "[{role}] {} (confidence {:.2})",
                reflection.content, reflection.confidence
            );
        }
    }
    if !msg.context.is_empty() {
        println!("  sources:");
        for item in &msg.context {
            println!("    {}: {}", item.source, item.snippet);
        }
    }
}

fn print_notifications(service: &mut ChatService) {
    let pending: Vec<_> = service.store().notifications.to_vec();
    for notification in pending {
        let tag = match notification.kind {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        };
        println!("! [{tag}] {}", notification.message);
        if notification.auto_dismiss {
            service.dismiss_notification(notification.id);
        }
    }
}
