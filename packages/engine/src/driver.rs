//! Tokio driver: runs a [`Form`] against real time.
//!
//! The driver owns the form and reacts to three things: commands from the
//! host, the form's next debounce/retry deadline, and a polling interval
//! for pending computes and, in uncontrolled mode, the change channel. Elapsed time since start is fed to
//! [`Form::advance_to`], so virtual and real clocks agree.
//!
//! The form holds `!Send` compute futures; run the driver on a
//! current-thread runtime or inside a `LocalSet`.

use crate::events::FormEvent;
use crate::form::Form;
use crate::guards::Breakpoint;
use crate::{FormError, Result};
use formloom_document::StoreMode;
use serde_json::Value;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Host → form requests, fields addressed by name
#[derive(Debug, Clone, PartialEq)]
pub enum FormCommand {
    Change { name: String, value: Value },
    Focus { name: String },
    Blur { name: String },
    FlushAll,
    SetDocument(Value),
    SetBreakpoint(Breakpoint),
    Unmount,
}

pub struct FormDriver {
    form: Form,
    started: Instant,
}

impl FormDriver {
    pub fn new(form: Form) -> Self {
        Self {
            form,
            started: Instant::now(),
        }
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Run until the command channel closes or an unmount arrives; hands
    /// the form back
    pub async fn run(
        mut self,
        mut commands: UnboundedReceiver<FormCommand>,
        events: UnboundedSender<FormEvent>,
    ) -> Result<Form> {
        let mut poll = time::interval(self.form.config().compute_poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Form driver started");

        loop {
            self.forward(&events);
            let deadline = self.form.next_deadline().map(|at| self.started + at);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(FormCommand::Unmount) => {
                        self.form.unmount();
                        break;
                    }
                    Some(command) => {
                        self.sync_clock()?;
                        self.apply(command)?;
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => self.sync_clock()?,
                _ = poll.tick() => {
                    if self.form.pending_computes() > 0 || self.listens_for_documents() {
                        self.form.pump()?;
                    }
                }
            }
        }

        // Documents pushed right before shutdown
        if self.listens_for_documents() {
            self.form.pump()?;
        }
        self.forward(&events);
        info!("Form driver stopped");
        Ok(self.form)
    }

    /// Uncontrolled forms take host documents over the change channel
    fn listens_for_documents(&self) -> bool {
        self.form.is_mounted() && self.form.mode() == StoreMode::Uncontrolled
    }

    fn sync_clock(&mut self) -> Result<()> {
        self.form.advance_to(self.started.elapsed())
    }

    fn apply(&mut self, command: FormCommand) -> Result<()> {
        debug!(?command, "Driver command");
        match command {
            FormCommand::Change { name, value } => {
                let id = self.resolve(&name, Some(&value))?;
                self.form.on_change(id, value)
            }
            FormCommand::Focus { name } => {
                let id = self.resolve(&name, None)?;
                self.form.on_focus(id)
            }
            FormCommand::Blur { name } => {
                let id = self.resolve(&name, None)?;
                self.form.on_blur(id)
            }
            FormCommand::FlushAll => self.form.flush_all(),
            FormCommand::SetDocument(document) => self.form.receive_document(document),
            FormCommand::SetBreakpoint(breakpoint) => self.form.set_breakpoint(breakpoint),
            FormCommand::Unmount => {
                self.form.unmount();
                Ok(())
            }
        }
    }

    fn resolve(&self, name: &str, value: Option<&Value>) -> Result<formloom_descriptor::NodeId> {
        self.form
            .target(name, value)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    fn forward(&mut self, events: &UnboundedSender<FormEvent>) {
        for event in self.form.drain_events() {
            if events.send(event).is_err() {
                debug!("Event receiver dropped");
                break;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
