//! Live command execution over the backend's push-event stream.
//!
//! One [`StreamController`] manages at most one open stream at a time: it
//! opens the realtime-run connection, classifies incoming `stdout` /
//! `stderr` / `result` events into output lines, and reports terminal
//! success or failure exactly once per invocation. Events from a superseded
//! stream are fenced off by an invocation id, so a caller that restarts
//! quickly never sees a late line or a duplicate completion.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use futures::future;
use futures::stream;
use futures::stream::BoxStream;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::client::BackendClient;
use crate::client::CommandArgs;
use crate::error::OpsdeckErr;
use crate::error::Result;
use crate::lines;
use crate::lines::OutputLine;

/// Lifecycle stage of the active invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Ready,
    Connecting,
    Running,
    Error,
}

impl StreamState {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamState::Ready => "ready",
            StreamState::Connecting => "connecting",
            StreamState::Running => "running",
            StreamState::Error => "error",
        }
    }
}

/// Raw events a transport delivers to the controller, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established; the backend will start emitting events.
    Opened,
    /// One named event with its payload.
    Message { event: String, data: String },
    /// The transport failed (connect error, HTTP error status, mid-stream
    /// error).
    Failed { reason: String },
    /// The stream ended without a transport error.
    Closed,
}

/// Seam between the controller and the wire. The default implementation is
/// [`SseTransport`]; substitutes (e.g. long-polling) inherit the ordering
/// and at-most-once-completion guarantees because both are enforced on the
/// controller side.
#[async_trait]
pub trait RunTransport: Send + Sync {
    async fn open(
        &self,
        command_id: &str,
        args: &CommandArgs,
    ) -> Result<BoxStream<'static, TransportEvent>>;
}

/// Server-sent-events transport over the realtime-run endpoint.
pub struct SseTransport {
    client: BackendClient,
}

impl SseTransport {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RunTransport for SseTransport {
    async fn open(
        &self,
        command_id: &str,
        args: &CommandArgs,
    ) -> Result<BoxStream<'static, TransportEvent>> {
        let url = self.client.run_realtime_url(command_id, args)?;
        let response = self
            .client
            .http()
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return Err(OpsdeckErr::NotAnEventStream(content_type));
        }

        let events = response.bytes_stream().eventsource().map(|event| match event {
            Ok(event) => TransportEvent::Message {
                event: event.event,
                data: event.data,
            },
            Err(err) => TransportEvent::Failed {
                reason: err.to_string(),
            },
        });
        Ok(stream::once(future::ready(TransportEvent::Opened))
            .chain(events)
            .boxed())
    }
}

/// Viewer-facing updates, emitted in the exact order the underlying events
/// arrived. `Finished` is the completion signal and fires at most once per
/// invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    LineAppended(OutputLine),
    StateChanged(StreamState),
    Finished { success: bool },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RunResultPayload {
    success: bool,
    #[serde(rename = "exitCode", default)]
    exit_code: Option<i32>,
    #[serde(default)]
    error: Option<String>,
}

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

pub struct StreamController {
    transport: Arc<dyn RunTransport>,
    persist_output: bool,
    state: StreamState,
    lines: Vec<OutputLine>,
    pending: VecDeque<StreamUpdate>,
    events_tx: UnboundedSender<(Uuid, TransportEvent)>,
    events_rx: UnboundedReceiver<(Uuid, TransportEvent)>,
    active: Option<ActiveRun>,
}

impl StreamController {
    pub fn new(transport: Arc<dyn RunTransport>, persist_output: bool) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            transport,
            persist_output,
            state: StreamState::Ready,
            lines: Vec::new(),
            pending: VecDeque::new(),
            events_tx,
            events_rx,
            active: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == StreamState::Ready
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Open a new stream for `command_id`. Any previous stream is torn down
    /// first; there is never more than one open connection per controller.
    pub fn start(&mut self, command_id: &str, args: CommandArgs) -> Result<()> {
        if command_id.trim().is_empty() {
            return Err(OpsdeckErr::EmptyCommandId);
        }

        self.close_active();
        if !self.persist_output {
            self.lines.clear();
        }
        self.set_state(StreamState::Connecting);
        self.push_line(lines::starting_notice(command_id));

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let events_tx = self.events_tx.clone();
        let transport = Arc::clone(&self.transport);
        let command_id = command_id.to_string();
        let reader = tokio::spawn(async move {
            let mut events = match transport.open(&command_id, &args).await {
                Ok(events) => events,
                Err(err) => {
                    let _ = events_tx.send((
                        id,
                        TransportEvent::Failed {
                            reason: err.to_string(),
                        },
                    ));
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.next() => match event {
                        Some(event) => {
                            if events_tx.send((id, event)).is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = events_tx.send((id, TransportEvent::Closed));
                            break;
                        }
                    },
                }
            }
        });
        self.active = Some(ActiveRun { id, cancel, reader });
        Ok(())
    }

    /// Close the open stream, if any. Idempotent; calling with nothing open
    /// appends no line and fires no completion.
    pub fn stop(&mut self) {
        if self.active.is_none() {
            return;
        }
        self.close_active();
        self.set_state(StreamState::Ready);
        self.push_line(lines::stopped_notice());
    }

    /// Empty the output sequence without touching stream state.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn has_pending_update(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Next viewer-facing update, in exact arrival order. `start`/`stop`
    /// queue their own notices through the same channel, so a renderer needs
    /// only this one stream of updates.
    pub async fn next_update(&mut self) -> StreamUpdate {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return update;
            }
            // `events_tx` is held by self, so recv() never sees a closed
            // channel; it parks until a reader task forwards an event.
            if let Some((id, event)) = self.events_rx.recv().await {
                self.apply_transport_event(id, event);
            }
        }
    }

    fn apply_transport_event(&mut self, id: Uuid, event: TransportEvent) {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.id == id);
        if !is_current {
            debug!("dropping event from superseded stream {id}");
            return;
        }
        match event {
            TransportEvent::Opened => {
                self.set_state(StreamState::Running);
                self.push_line(lines::connected_notice());
            }
            TransportEvent::Message { event, data } => self.apply_message(&event, &data),
            TransportEvent::Failed { reason } => {
                self.push_line(lines::connection_error_notice(&reason));
                self.set_state(StreamState::Error);
                self.finish(false);
            }
            TransportEvent::Closed => {
                self.push_line(lines::connection_error_notice(
                    "stream closed before completion",
                ));
                self.set_state(StreamState::Error);
                self.finish(false);
            }
        }
    }

    fn apply_message(&mut self, event: &str, data: &str) {
        match event {
            "stdout" => self.push_line(lines::stdout_line(data)),
            "stderr" => self.push_line(lines::stderr_line(data)),
            "result" => match serde_json::from_str::<RunResultPayload>(data) {
                Ok(result) => {
                    if result.success {
                        self.push_line(lines::completed_notice(result.exit_code.unwrap_or(0)));
                    } else {
                        self.push_line(lines::failed_notice(result.error.as_deref()));
                    }
                    self.set_state(StreamState::Ready);
                    self.finish(result.success);
                }
                Err(err) => {
                    debug!("unparseable result payload: {err}");
                    self.push_line(lines::result_parse_failure_notice());
                    self.set_state(StreamState::Ready);
                    self.finish(false);
                }
            },
            other => debug!("ignoring unknown stream event `{other}`"),
        }
    }

    /// Close the stream and queue the completion signal. Clearing `active`
    /// here is what makes the signal at-most-once: any event still in flight
    /// for this invocation no longer matches and is dropped.
    fn finish(&mut self, success: bool) {
        self.close_active();
        self.pending.push_back(StreamUpdate::Finished { success });
    }

    fn close_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.reader.abort();
        }
    }

    fn set_state(&mut self, state: StreamState) {
        if self.state != state {
            self.state = state;
            self.pending.push_back(StreamUpdate::StateChanged(state));
        }
    }

    fn push_line(&mut self, line: OutputLine) {
        self.pending
            .push_back(StreamUpdate::LineAppended(line.clone()));
        self.lines.push(line);
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.close_active();
    }
}
