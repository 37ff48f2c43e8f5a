//! Interactive CLI session
//!
//! Connects to a device, activates the session, prints notifications as
//! they arrive, and maps stdin lines to library operations. Output is
//! human-readable by default or JSON with `--json`.

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::common::{Config, Error, Result};
use crate::telnet::{DebugSession, EvaluateContainer, Event};

/// Run the interactive session against `host` (falling back to the
/// configured default device)
pub async fn run(host: Option<String>, config: &Config, json: bool) -> Result<()> {
    let host = host
        .or_else(|| config.device.host.clone())
        .ok_or_else(|| {
            Error::Config("no device host given and none configured".to_string())
        })?;

    println!("Connecting to {host}...");
    let session = DebugSession::connect(&host).await?;
    println!("Connected. Type 'help' for commands.");

    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::Suspend { thread_id: Some(id) } => {
                    println!("** suspended (thread {id})")
                }
                Event::Suspend { thread_id: None } => println!("** suspended"),
                Event::CompileError { path, line } => {
                    println!("** compile error in {path}({line})")
                }
                Event::Closed => {
                    println!("** connection closed");
                    break;
                }
            }
        }
    });

    session.activate().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Ok(Some(line)) = lines.next_line().await else {
            break;
        };
        let line = line.trim();
        let (command, argument) = match line.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        let outcome = match command {
            "" => Ok(()),
            "help" => {
                print_help();
                Ok(())
            }
            "bt" => match session.get_stack_trace().await {
                Ok(frames) => print_result(&frames, json, |frames| {
                    for frame in frames {
                        println!(
                            "#{} {} {}({})",
                            frame.frame_id,
                            frame.function_identifier,
                            frame.file_path,
                            frame.line_number
                        );
                    }
                }),
                Err(e) => Err(e),
            },
            "threads" => match session.get_threads().await {
                Ok(threads) => print_result(&threads, json, |threads| {
                    for thread in threads {
                        let marker = if thread.is_selected { "*" } else { " " };
                        println!(
                            "{:>2}{} {}({}) {}",
                            thread.thread_id,
                            marker,
                            thread.file_path,
                            thread.line_number,
                            thread.line_contents
                        );
                    }
                }),
                Err(e) => Err(e),
            },
            "print" | "p" => match session.get_variable(argument).await {
                Ok(container) => print_result(&container, json, print_container),
                Err(e) => Err(e),
            },
            "type" => match session.get_type(argument).await {
                Ok(Some(type_name)) => {
                    println!("{type_name}");
                    Ok(())
                }
                Ok(None) => {
                    println!("(no type)");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "over" => session.step_over().await,
            "step" => session.step_into().await,
            "out" => session.step_out().await,
            "c" | "continue" => session.continue_execution().await,
            "pause" => session.pause().await,
            "quit" | "exit" => break,
            other => {
                println!("unknown command '{other}'; type 'help'");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            eprintln!("Error: {e}");
        }
    }

    session.destroy();
    printer.abort();
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  bt              print the backtrace");
    println!("  threads         list threads (selected thread first)");
    println!("  print <expr>    evaluate an expression (alias: p)");
    println!("  type <expr>     print an expression's type");
    println!("  over/step/out   step over / into / out");
    println!("  c               continue");
    println!("  pause           break into the debugger");
    println!("  quit            disconnect and exit");
}

fn print_result<T: Serialize>(value: &T, json: bool, plain: impl Fn(&T)) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Internal(format!("JSON serialization failed: {e}")))?;
        println!("{rendered}");
    } else {
        plain(value);
    }
    Ok(())
}

fn print_container(container: &EvaluateContainer) {
    println!(
        "{}: {} = {}",
        container.evaluate_name, container.type_name, container.value
    );
    for child in &container.children {
        println!(
            "  {}: {} = {}",
            child.evaluate_name, child.type_name, child.value
        );
    }
}
