//! End-to-end tests for the debug session
//!
//! These drive the real pipeline and session against an in-process fake
//! device: a plain TCP peer that the tests script line by line, so every
//! test pins both what the client writes to the wire and how it parses
//! what comes back.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use roku_debugger::telnet::{DebugSession, Event, HighLevelType};

const PROMPT: &str = "\r\nBrightscript Debugger> ";

/// Scripted peer standing in for the device
struct FakeDevice {
    stream: TcpStream,
    buffer: String,
}

impl FakeDevice {
    /// Read the next newline-terminated command off the wire
    async fn expect_command(&mut self) -> String {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(pos) = self.buffer.find('\n') {
                let line = self.buffer[..pos].trim().to_string();
                self.buffer.drain(..=pos);
                return line;
            }
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
                .await
                .expect("timed out waiting for a command")
                .expect("device read failed");
            assert!(n > 0, "client closed the connection");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
    }

    /// Send raw text to the client
    async fn send(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).await.unwrap();
    }

    /// Send a command response followed by the idle prompt
    async fn respond(&mut self, body: &str) {
        self.send(&format!("{body}{PROMPT}")).await;
    }
}

/// Connect a session to a fresh fake device.
///
/// The device greets immediately, which settles the session's connect
/// call; the greeting itself is consumed and never prompt-scanned.
async fn connect_pair() -> (DebugSession, FakeDevice) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (session, stream) = tokio::join!(DebugSession::connect_to("127.0.0.1", port), async {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"Roku mock console\r\n").await.unwrap();
        stream
    });

    (
        session.expect("connect failed"),
        FakeDevice {
            stream,
            buffer: String::new(),
        },
    )
}

#[tokio::test]
async fn test_stack_trace_roundtrip() {
    let (session, mut device) = connect_pair().await;

    let (frames, ()) = tokio::join!(session.get_stack_trace(), async {
        assert_eq!(device.expect_command().await, "bt");
        device
            .respond("#0  function main  file/line: pkg:/source/main.brs(12)")
            .await;
    });

    let frames = frames.unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_id, 0);
    assert_eq!(frames[0].function_identifier, "main");
    assert_eq!(frames[0].file_path, "pkg:/source/main.brs");
    assert_eq!(frames[0].line_number, 12);
}

#[tokio::test]
async fn test_get_type_trims_and_caches() {
    let (session, mut device) = connect_pair().await;

    let (type_name, ()) = tokio::join!(session.get_type("counter"), async {
        assert_eq!(device.expect_command().await, "print Type(counter)");
        device.respond("Integer").await;
    });
    assert_eq!(type_name.unwrap().as_deref(), Some("Integer"));

    // Served from cache: no device interaction, so this would hang on a miss
    let again = timeout(Duration::from_secs(1), session.get_type("counter"))
        .await
        .expect("type lookup should be served from cache")
        .unwrap();
    assert_eq!(again.as_deref(), Some("Integer"));
}

#[tokio::test]
async fn test_string_variable_escapes_embedded_quotes() {
    let (session, mut device) = connect_pair().await;

    let (container, ()) = tokio::join!(session.get_variable("title"), async {
        assert_eq!(device.expect_command().await, "print Type(title)");
        device.respond("String").await;
        assert_eq!(
            device.expect_command().await,
            r#"print "--string-wrap--" + title + "--string-wrap--""#
        );
        device
            .respond("--string-wrap--Hello \"Roku\"--string-wrap--")
            .await;
    });

    let container = container.unwrap();
    assert_eq!(container.type_name, "String");
    assert_eq!(container.high_level_type, HighLevelType::Primitive);
    assert_eq!(container.value, "\"Hello \\\"Roku\\\"\"");
    assert!(container.children.is_empty());
}

#[tokio::test]
async fn test_object_variable_parses_children() {
    let (session, mut device) = connect_pair().await;

    let (container, ()) = tokio::join!(session.get_variable("config"), async {
        assert_eq!(device.expect_command().await, "print Type(config)");
        device.respond("roAssociativeArray").await;
        assert_eq!(device.expect_command().await, "print config");
        device
            .respond("roAssociativeArray\r\n{\r\n  width: 1280\r\n  height: 720.5\r\n}")
            .await;
    });

    let container = container.unwrap();
    assert_eq!(container.high_level_type, HighLevelType::Object);
    assert_eq!(container.children.len(), 2);
    assert_eq!(container.children[0].name, "width");
    assert_eq!(container.children[0].evaluate_name, "config.width");
    assert_eq!(container.children[0].value, "1280");
    assert_eq!(container.children[1].name, "height");
    // The inverted decimal heuristic: "height: 720.5" classifies Integer
    assert_eq!(container.children[1].type_name, "Integer");
}

#[tokio::test]
async fn test_threads_selected_first_and_guard_released() {
    let (session, mut device) = connect_pair().await;
    let mut events = session.subscribe();
    session.activate().await.unwrap();

    let (threads, ()) = tokio::join!(session.get_threads(), async {
        assert_eq!(device.expect_command().await, "threads");
        device
            .respond(
                "ID    Location                Source Code\r\n 1  pkg:/source/main.brs(10) print 1\r\n 2* pkg:/source/main.brs(20) print 2",
            )
            .await;
    });

    let threads = threads.unwrap();
    assert_eq!(threads.len(), 2);
    assert!(threads[0].is_selected);
    assert_eq!(threads[0].thread_id, 2);
    assert_eq!(threads[1].thread_id, 1);

    // The suppression scope must be gone: an unsolicited prompt now
    // raises a suspend as usual
    device.send(PROMPT).await;
    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expected a suspend after the prompt")
        .unwrap();
    assert_eq!(event, Event::Suspend { thread_id: None });
}

#[tokio::test]
async fn test_suspend_is_edge_triggered() {
    let (session, mut device) = connect_pair().await;
    let mut events = session.subscribe();
    session.activate().await.unwrap();

    device.send(PROMPT).await;
    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expected first suspend")
        .unwrap();
    assert_eq!(event, Event::Suspend { thread_id: None });

    // A repeated prompt sighting without intervening output is no edge
    sleep(Duration::from_millis(50)).await;
    device.send(PROMPT).await;
    sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err(), "duplicate suspend raised");

    // Fresh output clears the flag; the next prompt is a new edge
    device.send("app output\r\n").await;
    sleep(Duration::from_millis(50)).await;
    device.send(PROMPT).await;
    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expected second suspend")
        .unwrap();
    assert_eq!(event, Event::Suspend { thread_id: None });
}

#[tokio::test]
async fn test_activate_at_prompt_synthesizes_suspend() {
    let (session, mut device) = connect_pair().await;
    let mut events = session.subscribe();

    // Device reaches the prompt before anyone activates the session
    device.send(PROMPT).await;
    sleep(Duration::from_millis(50)).await;

    let (activated, ()) = tokio::join!(session.activate(), async {
        assert_eq!(device.expect_command().await, "threads");
        device
            .respond(" 1  pkg:/source/tasks.brs(8) run()\r\n 2* pkg:/source/main.brs(20) print 2")
            .await;
    });
    activated.unwrap();

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expected synthesized suspend")
        .unwrap();
    assert_eq!(event, Event::Suspend { thread_id: Some(2) });
}

#[tokio::test]
async fn test_step_clears_cache_before_dispatch() {
    let (session, mut device) = connect_pair().await;

    let (frames, ()) = tokio::join!(session.get_stack_trace(), async {
        assert_eq!(device.expect_command().await, "bt");
        device
            .respond("#0  function main  file/line: pkg:/source/main.brs(12)")
            .await;
    });
    assert_eq!(frames.unwrap()[0].line_number, 12);

    // Cached: resolves with no device involvement
    let cached = timeout(Duration::from_secs(1), session.get_stack_trace())
        .await
        .expect("stack trace should be served from cache")
        .unwrap();
    assert_eq!(cached[0].line_number, 12);

    // Stepping wipes the cache before the control command dispatches
    let (stepped, ()) = tokio::join!(session.step_over(), async {
        assert_eq!(device.expect_command().await, "over");
    });
    stepped.unwrap();

    let (frames, ()) = tokio::join!(session.get_stack_trace(), async {
        assert_eq!(device.expect_command().await, "bt");
        device
            .respond("#0  function main  file/line: pkg:/source/main.brs(13)")
            .await;
    });
    assert_eq!(frames.unwrap()[0].line_number, 13);
}

#[tokio::test]
async fn test_pause_sends_interrupt_byte() {
    let (session, mut device) = connect_pair().await;

    let (paused, ()) = tokio::join!(session.pause(), async {
        assert_eq!(device.expect_command().await, "\x03;");
    });
    paused.unwrap();
}

#[tokio::test]
async fn test_compile_error_event() {
    let (session, mut device) = connect_pair().await;
    let mut events = session.subscribe();

    device
        .send("Compile error &h02 in pkg:/source/main.brs(3)\r\nSyntax Error.\r\n")
        .await;

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expected a compile-error event")
        .unwrap();
    assert_eq!(
        event,
        Event::CompileError {
            path: "pkg:/source/main.brs".to_string(),
            line: 3,
        }
    );
}

#[tokio::test]
async fn test_remote_close_raises_event() {
    let (session, device) = connect_pair().await;
    let mut events = session.subscribe();

    drop(device);

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("expected a close event")
        .unwrap();
    assert_eq!(event, Event::Closed);
}
