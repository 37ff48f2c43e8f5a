//! Debug session over the telnet pipeline
//!
//! Tracks whether the device is running or halted at the debugger prompt,
//! raises suspend/compile-error/close events, and exposes the typed query
//! operations. All idempotent queries are memoized per suspended state;
//! every control command wipes the caches before it hits the wire so a
//! racing reader can never observe a value from the previous run state.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use crate::common::{Error, Result};
use crate::telnet::cache::ResponseCache;
use crate::telnet::parser;
use crate::telnet::pipeline::{PipelineEvent, RequestPipeline, DEBUG_PORT};
use crate::telnet::types::{EvaluateContainer, HighLevelType, StackFrame, Thread};

/// Sentinel wrapped around string prints so leading/trailing whitespace
/// and prompt-like substrings inside the value survive extraction
const STRING_SENTINEL: &str = "--string-wrap--";

/// Notifications raised by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The device halted at the debugger prompt. Carries the selected
    /// thread id when the suspend was synthesized by [`DebugSession::activate`]
    Suspend { thread_id: Option<i64> },
    /// The channel failed to compile; path and line of the offending file
    CompileError { path: String, line: u32 },
    /// The connection to the device ended
    Closed,
}

/// Run/suspend bookkeeping, owned exclusively by the session
#[derive(Default)]
struct SessionState {
    is_activated: bool,
    is_at_prompt: bool,
    suppress_unsolicited: bool,
    /// Present until the first inbound data settles the connect call
    first_data: Option<oneshot::Sender<()>>,
}

struct SessionInner {
    pipeline: RequestPipeline,
    state: Mutex<SessionState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
    // One typed cache per operation kind; all cleared together
    types: ResponseCache<Option<String>>,
    variables: ResponseCache<EvaluateContainer>,
    stack_trace: ResponseCache<Vec<StackFrame>>,
    threads: ResponseCache<Vec<Thread>>,
}

/// A debug session attached to one device's BrightScript debug console
pub struct DebugSession {
    inner: Arc<SessionInner>,
}

impl DebugSession {
    /// Connect to the device's debug console on the well-known port.
    ///
    /// Resolves once the first data from the device has settled; a
    /// transport failure before then fails the connect call. Connect
    /// before the channel launches so the entry breakpoint is caught.
    pub async fn connect(host: &str) -> Result<Self> {
        Self::connect_to(host, DEBUG_PORT).await
    }

    /// Connect on a non-standard port (tunnels, tests)
    pub async fn connect_to(host: &str, port: u16) -> Result<Self> {
        let mut pipeline = RequestPipeline::connect(host, port).await?;
        let events = pipeline
            .take_event_receiver()
            .ok_or_else(|| Error::Internal("pipeline event receiver already taken".into()))?;

        let (settled_tx, settled_rx) = oneshot::channel();
        let inner = Arc::new(SessionInner {
            pipeline,
            state: Mutex::new(SessionState {
                first_data: Some(settled_tx),
                ..Default::default()
            }),
            subscribers: Mutex::new(Vec::new()),
            types: ResponseCache::new(),
            variables: ResponseCache::new(),
            stack_trace: ResponseCache::new(),
            threads: ResponseCache::new(),
        });

        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                match event {
                    PipelineEvent::UnhandledData(data) => inner.handle_unhandled_data(&data),
                    PipelineEvent::Closed => {
                        // A close before the first data fails the connect
                        inner.state.lock().unwrap().first_data.take();
                        inner.emit(Event::Closed);
                    }
                }
            }
        });

        settled_rx.await.map_err(|_| Error::ConnectionClosed)?;
        Ok(Self { inner })
    }

    /// Subscribe to session events; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Mark the session live (call once the channel has been deployed).
    ///
    /// If the device is already sitting at the prompt there is no edge
    /// left to observe, so the first suspend is synthesized here, carrying
    /// the currently selected thread.
    pub async fn activate(&self) -> Result<()> {
        let already_at_prompt = {
            let mut state = self.inner.state.lock().unwrap();
            state.is_activated = true;
            state.is_at_prompt
        };

        if already_at_prompt {
            let threads = self.get_threads().await?;
            self.inner.emit(Event::Suspend {
                thread_id: threads.first().map(|t| t.thread_id),
            });
        }
        Ok(())
    }

    /// Step over the current line
    pub async fn step_over(&self) -> Result<()> {
        self.control_command("over").await
    }

    /// Step into the current line
    pub async fn step_into(&self) -> Result<()> {
        self.control_command("step").await
    }

    /// Step out of the current function
    pub async fn step_out(&self) -> Result<()> {
        self.control_command("out").await
    }

    /// Resume the program
    pub async fn continue_execution(&self) -> Result<()> {
        self.control_command("c").await
    }

    /// Break into the debugger by sending the interrupt byte
    pub async fn pause(&self) -> Result<()> {
        self.control_command("\x03;").await
    }

    /// Drop all cached query results and reset the at-prompt flag, so
    /// everything is fetched fresh for the next suspended state
    pub fn clear_state(&self) {
        self.inner.clear_state();
    }

    /// Fetch the current backtrace, innermost frame first
    pub async fn get_stack_trace(&self) -> Result<Vec<StackFrame>> {
        let inner = self.inner.clone();
        self.inner
            .stack_trace
            .resolve("stack-trace", move || inner.fetch_stack_trace())
            .await
    }

    /// Resolve the BrightScript type of an expression; `None` when the
    /// console reports nothing for it
    pub async fn get_type(&self, expression: &str) -> Result<Option<String>> {
        self.inner.clone().fetch_type(expression.to_string()).await
    }

    /// Evaluate an expression on the device.
    ///
    /// Object and array results carry children parsed from the dump, each
    /// with an `evaluate_name` path suitable for recursive expansion
    /// through another `get_variable` call.
    pub async fn get_variable(&self, expression: &str) -> Result<EvaluateContainer> {
        let key = format!("variable: {expression}");
        let inner = self.inner.clone();
        let expression = expression.to_string();
        self.inner
            .variables
            .resolve(&key, move || inner.fetch_variable(expression))
            .await
    }

    /// Fetch the thread list; the selected thread is sorted to the front
    pub async fn get_threads(&self) -> Result<Vec<Thread>> {
        let inner = self.inner.clone();
        self.inner
            .threads
            .resolve("threads", move || inner.fetch_threads())
            .await
    }

    /// Tear down the session and the underlying pipeline. Outstanding
    /// operations fail with [`Error::PipelineDestroyed`]; any further use
    /// of the session is a programming error.
    pub fn destroy(&self) {
        self.inner.subscribers.lock().unwrap().clear();
        self.inner.clear_state();
        self.inner.pipeline.destroy();
    }

    /// Clear caches, reset the prompt flag, then fire the control command.
    ///
    /// Control commands are fire-and-forget: their real completion signal
    /// is the next detected prompt, not the command echo.
    async fn control_command(&self, command: &str) -> Result<()> {
        self.inner.clear_state();
        self.inner.pipeline.execute_command(command, false).await?;
        Ok(())
    }
}

impl SessionInner {
    fn clear_state(&self) {
        self.types.clear();
        self.variables.clear();
        self.stack_trace.clear();
        self.threads.clear();
        self.state.lock().unwrap().is_at_prompt = false;
    }

    fn emit(&self, event: Event) {
        tracing::debug!(?event, "session event");
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// React to output the pipeline could not attribute to a command:
    /// settle the connect call on first data, report compile errors, and
    /// track the prompt edge that signals a suspend.
    fn handle_unhandled_data(&self, data: &str) {
        let mut state = self.state.lock().unwrap();
        if state.suppress_unsolicited {
            return;
        }
        if let Some(settled) = state.first_data.take() {
            let _ = settled.send(());
            return;
        }

        // Compile errors surface regardless of activation or prompt state
        if let Some((path, line)) = parser::parse_compile_error(data) {
            self.emit(Event::CompileError { path, line });
        }

        // The prompt flag is tracked even before activation, so that
        // activate() can tell whether the device is already suspended;
        // the suspend event itself only fires while activated.
        if parser::ends_with_prompt(data) {
            // Rising edge only; repeated prompt sightings stay silent
            if state.is_activated && !state.is_at_prompt {
                self.emit(Event::Suspend { thread_id: None });
            }
            state.is_at_prompt = true;
        } else {
            state.is_at_prompt = false;
        }
    }

    async fn fetch_stack_trace(self: Arc<Self>) -> Result<Vec<StackFrame>> {
        let data = self
            .pipeline
            .execute_command("bt", true)
            .await?
            .unwrap_or_default();
        Ok(parser::parse_stack_trace(&data))
    }

    async fn fetch_type(self: Arc<Self>, expression: String) -> Result<Option<String>> {
        let wrapped = format!("Type({expression})");
        let key = wrapped.clone();
        let inner = self.clone();
        self.types
            .resolve(&key, move || async move {
                let command = format!("print {wrapped}");
                let data = inner
                    .pipeline
                    .execute_command(&command, true)
                    .await?
                    .unwrap_or_default();
                Ok(parser::capture_expression_output(&data)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()))
            })
            .await
    }

    async fn fetch_variable(self: Arc<Self>, expression: String) -> Result<EvaluateContainer> {
        let type_name = self.clone().fetch_type(expression.clone()).await?;
        let is_string = type_name
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("string"));

        // String values get sentinel-wrapped so embedded whitespace or
        // prompt-like substrings cannot corrupt extraction
        let command = if is_string {
            format!(r#"print "{STRING_SENTINEL}" + {expression} + "{STRING_SENTINEL}""#)
        } else {
            format!("print {expression}")
        };
        let data = self
            .pipeline
            .execute_command(&command, true)
            .await?
            .unwrap_or_default();

        let captured = parser::capture_expression_output(&data)
            .ok_or_else(|| Error::unrecognized_response(&command))?;
        let value = if is_string {
            let stripped = captured.trim().replace(STRING_SENTINEL, "");
            format!("\"{}\"", stripped.replace('"', "\\\""))
        } else {
            captured.trim().to_string()
        };

        let type_name = type_name.ok_or_else(|| Error::UnknownType(expression.clone()))?;
        let high_level_type = parser::high_level_type(&type_name);
        let children = match high_level_type {
            HighLevelType::Object => parser::parse_object_children(&expression, &value)?,
            HighLevelType::Array => parser::parse_array_children(&expression, &value)?,
            _ => Vec::new(),
        };

        Ok(EvaluateContainer {
            name: expression.clone(),
            evaluate_name: expression,
            type_name,
            value,
            high_level_type,
            children,
        })
    }

    async fn fetch_threads(self: Arc<Self>) -> Result<Vec<Thread>> {
        // The listing ends at a prompt of its own; suppress the
        // unsolicited handler so it cannot double-fire a suspend while
        // this fetch is outstanding. Released on drop, error paths too.
        let _guard = SuppressGuard::engage(&self.state);

        let data = self
            .pipeline
            .execute_command("threads", true)
            .await?
            .unwrap_or_default();
        Ok(parser::parse_threads(&data))
    }
}

/// Scoped suppression of unsolicited-output handling
struct SuppressGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl<'a> SuppressGuard<'a> {
    fn engage(state: &'a Mutex<SessionState>) -> Self {
        state.lock().unwrap().suppress_unsolicited = true;
        Self { state }
    }
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().unwrap().suppress_unsolicited = false;
    }
}
