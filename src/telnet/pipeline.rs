//! Request pipeline over the raw telnet socket
//!
//! The debug console streams free-form text with no framing; the only
//! synchronization signal is the idle-prompt banner it prints once a
//! command's output is complete. This module turns that stream into a
//! disciplined request/response protocol: commands go out strictly FIFO,
//! at most one response-awaiting command is in flight at a time, and the
//! in-flight command's future resolves with everything received up to the
//! next prompt boundary. Output that arrives while the queue is idle is
//! forwarded as-is so the session layer can watch for spontaneous
//! suspends and compile errors.
//!
//! Known limitation: a prompt-shaped substring in the middle of real
//! output is indistinguishable from the true idle boundary and will
//! terminate the response early.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::{Error, Result};
use crate::telnet::parser;

/// The well-known port of the BrightScript debug console
pub const DEBUG_PORT: u16 = 8085;

/// A queued command and its completion
struct PendingCommand {
    text: String,
    wait_for_response: bool,
    completion: oneshot::Sender<Result<Option<String>>>,
}

/// Output the pipeline could not attribute to any in-flight command
#[derive(Debug)]
pub enum PipelineEvent {
    /// Out-of-band text from the device: spontaneous suspends, compile
    /// output, print statements from the running channel
    UnhandledData(String),
    /// The device closed the connection
    Closed,
}

/// Handle to the pipeline task that owns the socket
pub struct RequestPipeline {
    cmd_tx: mpsc::UnboundedSender<PendingCommand>,
    event_rx: Option<mpsc::UnboundedReceiver<PipelineEvent>>,
    task: JoinHandle<()>,
    destroyed: AtomicBool,
}

impl RequestPipeline {
    /// Connect to the device's debug console and start the pipeline task
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::connect_failed(host, port, e))?;
        tracing::debug!(host, port, "connected to debug console");

        let (read_half, write_half) = stream.into_split();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(
            PipelineTask {
                read_half,
                write_half,
                cmd_rx,
                event_tx,
                queue: VecDeque::new(),
                in_flight: None,
                buffer: String::new(),
                closed: false,
            }
            .run(),
        );

        Ok(Self {
            cmd_tx,
            event_rx: Some(event_rx),
            task,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Take the pipeline event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<PipelineEvent>> {
        self.event_rx.take()
    }

    /// Schedule a command and wait for its completion.
    ///
    /// With `wait_for_response` the future resolves with all text received
    /// between dispatch and the next prompt boundary; without it, the
    /// future resolves with `None` as soon as the command is written.
    /// Commands dispatch strictly in `execute_command` call order.
    ///
    /// No timeout is applied: a command whose output never reaches a
    /// prompt stalls the queue indefinitely.
    ///
    /// # Panics
    ///
    /// Panics when called after [`destroy`](Self::destroy); using a
    /// destroyed pipeline is a programming error.
    pub async fn execute_command(
        &self,
        command: &str,
        wait_for_response: bool,
    ) -> Result<Option<String>> {
        assert!(
            !self.destroyed.load(Ordering::SeqCst),
            "RequestPipeline::execute_command called after destroy()"
        );

        let (completion, rx) = oneshot::channel();
        let pending = PendingCommand {
            text: command.to_string(),
            wait_for_response,
            completion,
        };

        if self.cmd_tx.send(pending).is_err() {
            return Err(Error::PipelineDestroyed);
        }

        rx.await.unwrap_or(Err(Error::PipelineDestroyed))
    }

    /// Tear down the pipeline: stops the socket task and fails all
    /// outstanding command futures with [`Error::PipelineDestroyed`].
    /// The pipeline is unusable afterwards.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.task.abort();
        tracing::debug!("pipeline destroyed");
    }
}

impl Drop for RequestPipeline {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The task that owns both socket halves, the queue, and the buffer
struct PipelineTask {
    read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    cmd_rx: mpsc::UnboundedReceiver<PendingCommand>,
    event_tx: mpsc::UnboundedSender<PipelineEvent>,
    queue: VecDeque<PendingCommand>,
    in_flight: Option<PendingCommand>,
    buffer: String,
    closed: bool,
}

impl PipelineTask {
    async fn run(mut self) {
        let mut chunk = [0u8; 4096];
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        self.queue.push_back(cmd);
                        self.dispatch_ready().await;
                    }
                    // All handles dropped; nothing can enqueue anymore
                    None => break,
                },
                read = self.read_half.read(&mut chunk), if !self.closed => match read {
                    Ok(0) | Err(_) => self.handle_close(),
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&chunk[..n]).into_owned();
                        tracing::trace!(chunk = %text.escape_debug(), "telnet <<<");
                        self.handle_chunk(text).await;
                    }
                },
            }
        }
    }

    /// Dispatch queued commands until one is left awaiting a response
    async fn dispatch_ready(&mut self) {
        while self.in_flight.is_none() {
            let Some(cmd) = self.queue.pop_front() else {
                break;
            };

            if self.closed {
                let _ = cmd.completion.send(Err(Error::ConnectionClosed));
                continue;
            }

            tracing::debug!(command = %cmd.text.escape_debug(), "telnet >>>");
            let wire = format!("{}\r\n", cmd.text);
            let written = self.write_half.write_all(wire.as_bytes()).await;
            if written.is_err() || self.write_half.flush().await.is_err() {
                let _ = cmd.completion.send(Err(Error::ConnectionClosed));
                continue;
            }

            if cmd.wait_for_response {
                self.in_flight = Some(cmd);
            } else {
                // Fire-and-forget: complete as soon as the write lands
                let _ = cmd.completion.send(Ok(None));
            }
        }
    }

    /// Append an inbound chunk and either flush it as unhandled data or
    /// check the accumulated buffer for the prompt boundary
    async fn handle_chunk(&mut self, chunk: String) {
        self.buffer.push_str(&chunk);

        if self.in_flight.is_none() {
            let data = std::mem::take(&mut self.buffer);
            let _ = self.event_tx.send(PipelineEvent::UnhandledData(data));
        } else if parser::ends_with_prompt(&self.buffer) {
            let data = std::mem::take(&mut self.buffer);
            if let Some(cmd) = self.in_flight.take() {
                let _ = cmd.completion.send(Ok(Some(data)));
            }
            self.dispatch_ready().await;
        }
    }

    /// Fail everything outstanding and notify the session of the close
    fn handle_close(&mut self) {
        self.closed = true;
        tracing::debug!("debug console connection closed");

        if let Some(cmd) = self.in_flight.take() {
            let _ = cmd.completion.send(Err(Error::ConnectionClosed));
        }
        for cmd in self.queue.drain(..) {
            let _ = cmd.completion.send(Err(Error::ConnectionClosed));
        }

        let _ = self.event_tx.send(PipelineEvent::Closed);
    }
}
