use std::collections::BTreeSet;
use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use futures::StreamExt;
use opsdeck_core::OutputLine;
use opsdeck_core::Session;
use opsdeck_core::SessionGuard;
use opsdeck_core::StreamController;
use opsdeck_core::StreamState;
use opsdeck_core::StreamUpdate;
use opsdeck_core::interactive::parse_command_line;
use ratatui::Terminal;
use ratatui::backend::Backend;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use crate::viewer;

pub struct App {
    guard: Arc<SessionGuard>,
    session_rx: watch::Receiver<Session>,
    controller: StreamController,
    read_only_args: BTreeSet<String>,
    input: String,
    status_note: Option<String>,
    done: bool,
}

impl App {
    pub fn new(
        guard: Arc<SessionGuard>,
        controller: StreamController,
        read_only_args: BTreeSet<String>,
    ) -> Self {
        let session_rx = guard.subscribe();
        Self {
            guard,
            session_rx,
            controller,
            read_only_args,
            input: String::new(),
            status_note: None,
            done: false,
        }
    }

    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        if self.guard.has_api_key() && !self.guard.check_status().await.authenticated {
            if !self.guard.login().await {
                self.status_note = Some("login failed; check the API key".to_string());
            }
        }

        let mut term_events = EventStream::new();
        while !self.done {
            terminal.draw(|frame| viewer::draw(frame, self))?;
            tokio::select! {
                maybe_event = term_events.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_terminal_event(event).await,
                    Some(Err(err)) => warn!("terminal event error: {err}"),
                    None => break,
                },
                update = self.controller.next_update() => self.handle_update(update),
                changed = self.session_rx.changed() => {
                    if changed.is_ok() && !self.session_rx.borrow().authenticated {
                        self.status_note = Some("not authenticated".to_string());
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_terminal_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            self.handle_key(key).await;
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => self.done = true,
                KeyCode::Char('l') => self.controller.clear(),
                KeyCode::Char('x') => self.controller.stop(),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Esc => self.done = true,
            KeyCode::Enter => self.submit_input().await,
            KeyCode::Backspace => {
                self.input.pop();
            }
            // The prompt is disabled while a command is in flight, the same
            // duplicate-submission guard the forms use.
            KeyCode::Char(c) if self.controller.is_ready() => self.input.push(c),
            _ => {}
        }
    }

    async fn submit_input(&mut self) {
        if !self.controller.is_ready() {
            self.status_note =
                Some("a command is already running (Ctrl+X to stop)".to_string());
            return;
        }
        let Some(mut parsed) = parse_command_line(&self.input) else {
            return;
        };
        let dropped = parsed.apply_read_only(&self.read_only_args);
        if !dropped.is_empty() {
            self.status_note = Some(format!(
                "ignored read-only arguments: {}",
                dropped.join(", ")
            ));
        } else {
            self.status_note = None;
        }

        if !self.ensure_session().await {
            self.status_note = Some("not authenticated; login failed".to_string());
            return;
        }

        info!("starting command {}", parsed.command_id);
        match self
            .controller
            .start(&parsed.command_id, parsed.arguments)
        {
            Ok(()) => self.input.clear(),
            Err(err) => self.status_note = Some(err.to_string()),
        }
    }

    async fn ensure_session(&self) -> bool {
        if self.guard.session().authenticated {
            return true;
        }
        self.guard.login().await
    }

    fn handle_update(&mut self, update: StreamUpdate) {
        if let StreamUpdate::Finished { success } = update {
            info!("command finished, success: {success}");
        }
        // Lines and state are read straight from the controller at draw
        // time; updates only wake the loop and carry the completion signal.
    }

    pub(crate) fn state(&self) -> StreamState {
        self.controller.state()
    }

    pub(crate) fn session(&self) -> Session {
        self.guard.session()
    }

    pub(crate) fn lines(&self) -> &[OutputLine] {
        self.controller.lines()
    }

    pub(crate) fn input(&self) -> &str {
        &self.input
    }

    pub(crate) fn input_enabled(&self) -> bool {
        self.controller.is_ready()
    }

    pub(crate) fn status_note(&self) -> Option<&str> {
        self.status_note.as_deref()
    }
}
