use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing_subscriber::EnvFilter;
use tripmate_client::config::ClientConfig;
use tripmate_client::http::HttpChatApi;
use tripmate_client::link::{LinkEvent, WsLink};
use tripmate_client::{ChatController, ClientError};
use tripmate_domain::identity::ActorIdentity;
use tripmate_domain::messages::MessageKind;

type Inbound = mpsc::UnboundedReceiver<LinkEvent>;

const HELP: &str = "commands: /chats  /open <n>  /dm <user_id>  /group <trip_id>  /typing  /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::load()?;
    let filter =
        EnvFilter::try_new(config.log_level.clone()).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!("install tracing subscriber: {err}"))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("build http client")?;
    let api = Arc::new(HttpChatApi::new(
        http,
        config.api_base_url()?,
        config.token.clone(),
    ));
    let link = Arc::new(WsLink::new(config.realtime_url()?, config.token.clone()));
    let mut controller = ChatController::new(
        ActorIdentity::new(config.user_id.clone(), config.user_name.clone()),
        api,
        link.clone(),
        Box::new(config.backoff()),
    );

    if let Err(err) = controller.refresh_chats().await {
        report(&err);
    }
    print_chats(&controller);
    println!("{HELP}");

    let (mut inbound, mut retry_at) = connect(&mut controller, &link).await;
    let mut printed = HashSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !run_command(&mut controller, line.trim(), &mut printed).await {
                    break;
                }
            }
            event = recv(&mut inbound) => match event {
                LinkEvent::Server(event) => controller.handle_server_event(event),
                LinkEvent::Closed { reason } => {
                    inbound = None;
                    println!("-- disconnected ({reason})");
                    retry_at = controller
                        .connection_lost(&reason)
                        .map(|delay| Instant::now() + delay);
                }
            },
            _ = wait(retry_at) => {
                (inbound, retry_at) = connect(&mut controller, &link).await;
            }
        }
        render(&controller, &mut printed);
        if controller.state().session_expired {
            eprintln!("session expired; sign in again");
            break;
        }
    }

    link.disconnect();
    Ok(())
}

async fn connect(
    controller: &mut ChatController,
    link: &WsLink,
) -> (Option<Inbound>, Option<Instant>) {
    match link.connect().await {
        Ok(inbound) => {
            controller.connection_established();
            println!("-- connected");
            (Some(inbound), None)
        }
        Err(err) => {
            let retry = controller.connection_failed(&err);
            if retry.is_none() && !err.is_auth_failure() {
                println!("-- giving up on realtime; messages go over http");
            }
            (None, retry.map(|delay| Instant::now() + delay))
        }
    }
}

async fn recv(inbound: &mut Option<Inbound>) -> LinkEvent {
    match inbound {
        Some(receiver) => receiver.recv().await.unwrap_or(LinkEvent::Closed {
            reason: "link dropped".to_string(),
        }),
        None => std::future::pending().await,
    }
}

async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Returns false when the user asked to quit.
async fn run_command(
    controller: &mut ChatController,
    line: &str,
    printed: &mut HashSet<String>,
) -> bool {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };
    let result = match command {
        "" => Ok(()),
        "/quit" => return false,
        "/chats" => {
            let result = controller.refresh_chats().await;
            if result.is_ok() {
                print_chats(controller);
            }
            result
        }
        "/open" => match argument
            .parse::<usize>()
            .ok()
            .and_then(|index| controller.state().chats.get(index).cloned())
        {
            Some(chat) => {
                printed.clear();
                controller.open_chat(chat).await
            }
            None => Err(ClientError::Validation(format!("no chat numbered {argument:?}"))),
        },
        "/dm" => {
            printed.clear();
            controller.start_private_chat(argument).await
        }
        "/group" => {
            printed.clear();
            controller.start_group_chat(argument).await
        }
        "/typing" => {
            controller.start_typing();
            Ok(())
        }
        _ if command.starts_with('/') => {
            println!("{HELP}");
            Ok(())
        }
        _ => {
            controller.stop_typing();
            controller.send(line, MessageKind::Text).await
        }
    };
    if let Err(err) = result {
        report(&err);
    }
    true
}

fn print_chats(controller: &ChatController) {
    let viewer = controller.identity().user_id.as_str();
    for (index, chat) in controller.state().chats.iter().enumerate() {
        let preview = chat
            .last_message
            .as_ref()
            .map(|message| message.content.as_str())
            .unwrap_or("");
        println!("[{index}] {}  {preview}", chat.title_for(viewer));
    }
}

fn render(controller: &ChatController, printed: &mut HashSet<String>) {
    let state = controller.state();
    for message in &state.messages {
        if printed.insert(message.message_id.clone()) {
            println!("{}: {}", message.sender.display_name(), message.content);
        }
    }
    if !state.typing_peers.is_empty() {
        let names: Vec<&str> = state.typing_peers.values().map(String::as_str).collect();
        println!("   ({} typing)", names.join(", "));
    }
}

fn report(err: &ClientError) {
    eprintln!("error: {err}");
}
