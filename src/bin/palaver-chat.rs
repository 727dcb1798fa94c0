//! Interactive chat application for a streaming chat service.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the service on the default address
//! palaver-chat
//!
//! # Point at another deployment
//! palaver-chat --endpoint https://chat.example.com --timeout-secs 60
//!
//! # Read settings from a YAML file
//! palaver-chat --config ~/.config/palaver.yaml
//!
//! # Disable colors (useful for piping output)
//! palaver-chat --no-color
//! ```
//!
//! Set `PALAVER_LOG` (e.g. `PALAVER_LOG=palaver=debug`) to see protocol logs
//! on stderr.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use palaver::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, TerminalView,
    help_text, parse_command, should_send,
};
use palaver::copy::{Clipboard, CopyTracker, code_blocks, copy_from_message};
use palaver::render::copied_marker;
use palaver::{Attachment, ChatClient, Error, segment};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PALAVER_LOG";

/// The system clipboard.
struct SystemClipboard(arboard::Clipboard);

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> palaver::Result<()> {
        self.0.set_text(text.to_string()).map_err(|err| {
            Error::io("failed to set clipboard", io::Error::other(err.to_string()))
        })
    }
}

/// Prints the block when no clipboard is available, e.g. over ssh.
struct PrintClipboard;

impl Clipboard for PrintClipboard {
    fn set_text(&mut self, text: &str) -> palaver::Result<()> {
        println!("{text}");
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_clipboard() -> Box<dyn Clipboard> {
    match arboard::Clipboard::new() {
        Ok(clipboard) => Box::new(SystemClipboard(clipboard)),
        Err(err) => {
            tracing::info!(error = %err, "no system clipboard; copied blocks will be printed");
            Box::new(PrintClipboard)
        }
    }
}

/// Main entry point for the palaver-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let (args, _) = ChatArgs::from_command_line_relaxed("palaver-chat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    let use_color = config.use_color;

    let client = ChatClient::from_config(&config)?;
    let chat_url = client.chat_url().to_string();

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::SeqCst);
    })?;

    let mut session = ChatSession::new(Box::new(client)).with_interrupt(interrupted.clone());
    session.subscribe(Box::new(TerminalView::new(PlainTextRenderer::with_color(
        use_color,
    ))));
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut clipboard = open_clipboard();
    let mut copies = CopyTracker::new();
    let mut attachment: Option<Attachment> = None;
    let mut rl = DefaultEditor::new()?;

    println!("palaver chat ({chat_url})");
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let prompt = match &attachment {
            Some(attachment) => format!("You [{}]: ", attachment.name),
            None => "You: ".to_string(),
        };
        let readline = rl.readline(&prompt);

        match readline {
            Ok(line) => {
                let line = line.trim();
                if !should_send(line, attachment.is_some()) {
                    continue;
                }

                if !line.is_empty() {
                    let _ = rl.add_history_entry(line);
                }

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => match session.clear() {
                            Ok(()) => {
                                copies.clear();
                                renderer.print_info("Conversation cleared.");
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Attach(path) => match Attachment::from_path(&path) {
                            Ok(file) => {
                                renderer.print_info(&format!(
                                    "Attached {} ({} bytes, {})",
                                    file.name, file.size, file.file_data.mime_type
                                ));
                                attachment = Some(file);
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Cannot attach {path}: {err}"))
                            }
                        },
                        ChatCommand::Detach => match attachment.take() {
                            Some(file) => renderer.print_info(&format!("Detached {}.", file.name)),
                            None => renderer.print_info("No file attached."),
                        },
                        ChatCommand::Blocks => {
                            print_blocks(&session, &mut copies, use_color);
                        }
                        ChatCommand::Copy(number) => {
                            let Some(message) = session.conversation().last_assistant() else {
                                renderer.print_error("No answer to copy from yet.");
                                continue;
                            };
                            match copy_from_message(
                                &mut copies,
                                clipboard.as_mut(),
                                message,
                                number,
                                Instant::now(),
                            ) {
                                Ok(key) => renderer
                                    .print_info(&format!("Copied block #{}.", key.ordinal + 1)),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Stats => {
                            print_stats(&session);
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&config, &chat_url, attachment.as_ref());
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                println!();
                let pending = attachment.take();
                match session.send(line, pending.as_ref()).await {
                    Ok(outcome) => {
                        if outcome.interrupted {
                            renderer.print_info("[interrupted]");
                        }
                    }
                    Err(err) => renderer.print_error(&err.to_string()),
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn print_blocks(session: &ChatSession, copies: &mut CopyTracker, use_color: bool) {
    let Some(message) = session.conversation().last_assistant() else {
        println!("    No answer yet.");
        return;
    };
    let segments = segment(&message.text);
    let blocks = code_blocks(&segments);
    if blocks.is_empty() {
        println!("    The last answer has no code blocks.");
        return;
    }
    let now = Instant::now();
    copies.prune(now);
    for (ordinal, language, body) in blocks {
        let label = if language.is_empty() { "code" } else { language };
        let first_line = body.lines().next().unwrap_or("");
        let key = palaver::CodeBlockKey {
            message: message.id,
            ordinal,
        };
        let marker = if copies.is_copied(key, now) {
            format!(" {}", copied_marker(use_color))
        } else {
            String::new()
        };
        println!(
            "    #{} [{label}] {first_line} ({} lines){marker}",
            ordinal + 1,
            body.lines().count()
        );
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!("      Exchanges: {}", stats.total_exchanges);
    println!("      Failed: {}", stats.failed_exchanges);
    println!("      Interrupted: {}", stats.interrupted_exchanges);
    match stats.last_exchange {
        Some(duration) => println!("      Last exchange: {:.2}s", duration.as_secs_f64()),
        None => println!("      Last exchange: (none)"),
    }
}

fn print_config(config: &ChatConfig, chat_url: &str, attachment: Option<&Attachment>) {
    println!("    Current Configuration:");
    println!("      Base URL: {}", config.base_url);
    println!("      Chat endpoint: {chat_url}");
    println!("      Timeout: {}s", config.timeout.as_secs());
    println!(
        "      Colors: {}",
        if config.use_color { "on" } else { "off" }
    );
    match attachment {
        Some(file) => println!("      Attachment: {}", file.name),
        None => println!("      Attachment: (none)"),
    }
}
