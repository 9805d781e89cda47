//! The control surface: the short-lived settings panel.
//!
//! It edits a form of raw text fields, validates on save, persists the
//! merged preferences and pushes them to every open page. Speed presets
//! go to the focused page only.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vidpace_config::VidpaceConfig;
use vidpace_contracts::command::{PageCommand, PageResponse, SpeedOutcome};
use vidpace_contracts::messaging::PageMessenger;
use vidpace_contracts::store::{PreferenceStore, StoreError};
use vidpace_model::{
    Language, PreferencePatch, PreferenceSet, ResolvedLanguage, SeekSlot, Seconds,
};

use crate::i18n::Message;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("control surface is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient message in the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// The panel's form. Duration fields hold whatever the user typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub rewind_primary: String,
    pub rewind_secondary: String,
    pub forward_secondary: String,
    pub forward_primary: String,
    pub language: Language,
}

impl From<&PreferenceSet> for SettingsForm {
    fn from(preferences: &PreferenceSet) -> Self {
        Self {
            rewind_primary: preferences.rewind_primary.to_string(),
            rewind_secondary: preferences.rewind_secondary.to_string(),
            forward_secondary: preferences.forward_secondary.to_string(),
            forward_primary: preferences.forward_primary.to_string(),
            language: preferences.language,
        }
    }
}

impl SettingsForm {
    pub fn field(&self, slot: SeekSlot) -> &str {
        match slot {
            SeekSlot::RewindPrimary => &self.rewind_primary,
            SeekSlot::RewindSecondary => &self.rewind_secondary,
            SeekSlot::ForwardSecondary => &self.forward_secondary,
            SeekSlot::ForwardPrimary => &self.forward_primary,
        }
    }

    /// Stores the text exactly as typed.
    pub fn set_field(&mut self, slot: SeekSlot, raw: impl Into<String>) {
        let field = match slot {
            SeekSlot::RewindPrimary => &mut self.rewind_primary,
            SeekSlot::RewindSecondary => &mut self.rewind_secondary,
            SeekSlot::ForwardSecondary => &mut self.forward_secondary,
            SeekSlot::ForwardPrimary => &mut self.forward_primary,
        };
        *field = raw.into();
    }

    /// Parsed value of a field; anything that is not an integer in range
    /// becomes that field's default.
    pub fn seconds(&self, slot: SeekSlot) -> Seconds {
        Seconds::parse_or(self.field(slot), PreferenceSet::default_seconds(slot))
    }

    /// The form validated on top of `base`, which supplies the fields the
    /// form does not edit.
    pub fn to_preferences(&self, base: &PreferenceSet) -> PreferenceSet {
        let mut next = base.clone();
        next.apply(&PreferencePatch {
            rewind_primary: Some(self.seconds(SeekSlot::RewindPrimary)),
            rewind_secondary: Some(self.seconds(SeekSlot::RewindSecondary)),
            forward_secondary: Some(self.seconds(SeekSlot::ForwardSecondary)),
            forward_primary: Some(self.seconds(SeekSlot::ForwardPrimary)),
            language: Some(self.language),
            schema_version: None,
        });
        next
    }
}

/// Control surface state and operations.
pub struct ControlSurface {
    store: Arc<dyn PreferenceStore>,
    messenger: Arc<dyn PageMessenger>,
    preferences: PreferenceSet,
    form: SettingsForm,
    speed_presets: Vec<f64>,
    active_preset: Option<f64>,
    ui_locale: String,
    notification: Option<(Notification, Instant)>,
    notification_interval: Duration,
}

impl fmt::Debug for ControlSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSurface")
            .field("preferences", &self.preferences)
            .field("form", &self.form)
            .field("active_preset", &self.active_preset)
            .field("notification", &self.notification())
            .finish()
    }
}

impl ControlSurface {
    /// Opens the panel and fills the form from the store. A failed read
    /// keeps the defaults and leaves an error notification up.
    pub async fn open(
        store: Arc<dyn PreferenceStore>,
        messenger: Arc<dyn PageMessenger>,
        config: &VidpaceConfig,
    ) -> Self {
        let loaded = store.load().await;
        let mut surface = Self {
            store,
            messenger,
            preferences: PreferenceSet::default(),
            form: SettingsForm::from(&PreferenceSet::default()),
            speed_presets: config.speed_presets.clone(),
            active_preset: None,
            ui_locale: config.ui_locale.clone(),
            notification: None,
            notification_interval: config.notification_interval,
        };
        match loaded {
            Ok(preferences) => {
                surface.form = SettingsForm::from(&preferences);
                surface.preferences = preferences;
            }
            Err(err) => {
                warn!(target: "vidpace::surface", error = %err, "failed to load preferences; showing defaults");
                surface.notify(NotificationKind::Error, Message::LoadFailed);
            }
        }
        surface
    }

    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    /// Last persisted preferences.
    pub fn preferences(&self) -> &PreferenceSet {
        &self.preferences
    }

    pub fn speed_presets(&self) -> &[f64] {
        &self.speed_presets
    }

    pub fn active_preset(&self) -> Option<f64> {
        self.active_preset
    }

    /// Language the panel renders in.
    pub fn language(&self) -> ResolvedLanguage {
        self.form.language.resolve(&self.ui_locale)
    }

    /// The notification on screen, if it has not been dismissed yet.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification
            .as_ref()
            .filter(|(_, until)| Instant::now() < *until)
            .map(|(notification, _)| notification)
    }

    pub fn edit_field(&mut self, slot: SeekSlot, raw: impl Into<String>) {
        self.form.set_field(slot, raw);
    }

    /// "Rewind N seconds" / "Forward N seconds" for the four slots.
    pub fn helper_lines(&self) -> Vec<String> {
        let language = self.language();
        SeekSlot::ALL
            .into_iter()
            .map(|slot| {
                let seconds = self.form.seconds(slot).get();
                let line = if slot.is_rewind() {
                    Message::RewindSeconds(seconds)
                } else {
                    Message::ForwardSeconds(seconds)
                };
                line.render(language)
            })
            .collect()
    }

    /// Switching language saves straight away.
    pub async fn set_language(&mut self, language: Language) -> Result<PreferenceSet, StoreError> {
        let previous = self.form.language;
        self.form.language = language;
        let saved = self.save().await;
        if saved.is_err() {
            self.form.language = previous;
        }
        saved
    }

    /// Validates the form, persists every user-editable preference and
    /// pushes them to every open page. On a store failure nothing changes
    /// but the notification.
    ///
    /// `schemaVersion` belongs to the coordinator and is never written here.
    pub async fn save(&mut self) -> Result<PreferenceSet, StoreError> {
        let next = self.form.to_preferences(&self.preferences);
        let settings = PreferencePatch {
            schema_version: None,
            ..PreferencePatch::from(&next)
        };
        if let Err(err) = self.store.set(settings.to_record()).await {
            warn!(target: "vidpace::surface", error = %err, "failed to save preferences");
            self.notify(NotificationKind::Error, Message::SaveFailed);
            return Err(err);
        }

        self.form = SettingsForm::from(&next);
        self.preferences = next.clone();
        self.notify(NotificationKind::Success, Message::SettingsSaved);
        info!(target: "vidpace::surface", preferences = ?next, "preferences saved");

        let delivered = self
            .messenger
            .broadcast(PageCommand::UpdateSettings { settings })
            .await;
        debug!(target: "vidpace::surface", delivered, "settings pushed to pages");
        Ok(next)
    }

    /// Restores compiled-in defaults and saves them.
    pub async fn reset(&mut self) -> Result<PreferenceSet, StoreError> {
        let previous = std::mem::replace(&mut self.form, SettingsForm::from(&PreferenceSet::default()));
        let saved = self.save().await;
        if saved.is_err() {
            self.form = previous;
        }
        saved
    }

    /// Sends a speed preset to the focused page and reports the outcome.
    pub async fn press_speed_preset(&mut self, speed: f64) -> Notification {
        self.active_preset = Some(speed);

        let response = match self.messenger.active_tab() {
            Some(tab) => self
                .messenger
                .send(tab, PageCommand::SetSpeed { speed })
                .await
                .map_err(|err| {
                    debug!(target: "vidpace::surface", error = %err, "speed preset not delivered");
                }),
            None => Err(()),
        };

        let (kind, message) = match response {
            Ok(PageResponse::Speed(SpeedOutcome::Applied { count })) => {
                (NotificationKind::Success, Message::SpeedApplied { speed, count })
            }
            Ok(PageResponse::Speed(SpeedOutcome::NoMedia)) => {
                (NotificationKind::Error, Message::NoMediaFound)
            }
            Ok(PageResponse::Speed(SpeedOutcome::NotReady { .. })) => {
                (NotificationKind::Error, Message::MediaNotReady)
            }
            Ok(other) => {
                warn!(target: "vidpace::surface", response = ?other, "unexpected answer to a speed preset");
                (NotificationKind::Error, Message::ControllerMissing)
            }
            Err(()) => (NotificationKind::Error, Message::ControllerMissing),
        };
        self.notify(kind, message)
    }

    fn notify(&mut self, kind: NotificationKind, message: Message) -> Notification {
        let notification = Notification {
            kind,
            message: message.render(self.language()),
        };
        let until = Instant::now() + self.notification_interval;
        self.notification = Some((notification.clone(), until));
        notification
    }

    /// Runs the surface as its own task.
    pub fn spawn(self, capacity: usize) -> SurfaceHandle {
        let (events, queue) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(queue));
        SurfaceHandle { events, task }
    }

    async fn run(mut self, mut queue: mpsc::Receiver<SurfaceEvent>) {
        while let Some(event) = queue.recv().await {
            match event {
                SurfaceEvent::Edit(slot, raw) => self.edit_field(slot, raw),
                SurfaceEvent::SetLanguage(language, reply) => {
                    let _ = reply.send(self.set_language(language).await);
                }
                SurfaceEvent::Save(reply) => {
                    let _ = reply.send(self.save().await);
                }
                SurfaceEvent::Reset(reply) => {
                    let _ = reply.send(self.reset().await);
                }
                SurfaceEvent::PressPreset(speed, reply) => {
                    let _ = reply.send(self.press_speed_preset(speed).await);
                }
                SurfaceEvent::View(reply) => {
                    let _ = reply.send(self.view());
                }
                SurfaceEvent::Close => break,
            }
        }
        debug!(target: "vidpace::surface", "control surface closed");
    }

    pub fn view(&self) -> SurfaceView {
        SurfaceView {
            form: self.form.clone(),
            preferences: self.preferences.clone(),
            active_preset: self.active_preset,
            notification: self.notification().cloned(),
            helper_lines: self.helper_lines(),
        }
    }
}

/// What the panel currently renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceView {
    pub form: SettingsForm,
    pub preferences: PreferenceSet,
    pub active_preset: Option<f64>,
    pub notification: Option<Notification>,
    pub helper_lines: Vec<String>,
}

type SaveReply = oneshot::Sender<Result<PreferenceSet, StoreError>>;

enum SurfaceEvent {
    Edit(SeekSlot, String),
    SetLanguage(Language, SaveReply),
    Save(SaveReply),
    Reset(SaveReply),
    PressPreset(f64, oneshot::Sender<Notification>),
    View(oneshot::Sender<SurfaceView>),
    Close,
}

/// Handle to a spawned [`ControlSurface`].
pub struct SurfaceHandle {
    events: mpsc::Sender<SurfaceEvent>,
    task: JoinHandle<()>,
}

impl fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

impl SurfaceHandle {
    pub async fn edit_field(&self, slot: SeekSlot, raw: impl Into<String>) -> Result<(), SurfaceError> {
        self.events
            .send(SurfaceEvent::Edit(slot, raw.into()))
            .await
            .map_err(|_| SurfaceError::Closed)
    }

    pub async fn set_language(&self, language: Language) -> Result<PreferenceSet, SurfaceError> {
        let (reply, answer) = oneshot::channel();
        self.ask(SurfaceEvent::SetLanguage(language, reply), answer)
            .await?
            .map_err(SurfaceError::from)
    }

    pub async fn save(&self) -> Result<PreferenceSet, SurfaceError> {
        let (reply, answer) = oneshot::channel();
        self.ask(SurfaceEvent::Save(reply), answer)
            .await?
            .map_err(SurfaceError::from)
    }

    pub async fn reset(&self) -> Result<PreferenceSet, SurfaceError> {
        let (reply, answer) = oneshot::channel();
        self.ask(SurfaceEvent::Reset(reply), answer)
            .await?
            .map_err(SurfaceError::from)
    }

    pub async fn press_speed_preset(&self, speed: f64) -> Result<Notification, SurfaceError> {
        let (reply, answer) = oneshot::channel();
        self.ask(SurfaceEvent::PressPreset(speed, reply), answer).await
    }

    pub async fn view(&self) -> Result<SurfaceView, SurfaceError> {
        let (reply, answer) = oneshot::channel();
        self.ask(SurfaceEvent::View(reply), answer).await
    }

    async fn ask<T>(
        &self,
        event: SurfaceEvent,
        answer: oneshot::Receiver<T>,
    ) -> Result<T, SurfaceError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SurfaceError::Closed)?;
        answer.await.map_err(|_| SurfaceError::Closed)
    }

    pub async fn close(self) {
        let _ = self.events.send(SurfaceEvent::Close).await;
        let _ = self.task.await;
    }
}
