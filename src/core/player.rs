/// The narrative playback state machine.
///
/// Drives scenes, lines, choices and endings over a `Renderer`, records a
/// rewindable history, persists to a `KeyValueStore`, and forwards scene
/// metadata to the ambient audio engine. All timing goes through a
/// virtual-time scheduler advanced by the caller.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::engine::AudioEngine;
use crate::audio::host::{AudioHost, UnsupportedHost};
use crate::core::config::{ConfigError, PlayerConfig};
use crate::core::history::History;
use crate::core::input::{Command, Input};
use crate::core::renderer::{Renderer, View};
use crate::core::scheduler::{Scheduler, TaskId};
use crate::core::storage::{self, KeyValueStore, StorageError};
use crate::core::typewriter::{Tick, Typewriter};
use crate::schema::snapshot::{HistoryEntry, PlaybackState, Snapshot};
use crate::schema::story::{Choice, Continuation, Line, Story, StoryError, StoryIssue};
use crate::schema::tags::Effect;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("player builder is missing a {0}")]
    Missing(&'static str),
}

/// Toast messages shown by the player.
pub mod toasts {
    pub const AT_START: &str = "At start";
    pub const SAVED: &str = "Saved";
    pub const LOADED: &str = "Loaded";
    pub const AUTO_ON: &str = "Auto ON";
    pub const AUTO_OFF: &str = "Auto OFF";
}

/// Where the player is in the title → game → ending cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Title,
    /// A line is typing or fully shown.
    Playing,
    /// The scene's choices are on screen.
    Choosing,
    /// An ending was reached; the ending screen is on its way.
    EndingPending,
    Ending,
}

/// Work the player schedules for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Timer {
    RevealTick,
    AutoAdvance,
    HideChapterBanner,
    HideToast,
    ShowEnding(String),
}

/// Pending handle per kind of timer. Scheduling into a slot cancels
/// whatever it held.
#[derive(Debug, Default)]
struct Slots {
    reveal: Option<TaskId>,
    auto: Option<TaskId>,
    banner: Option<TaskId>,
    toast: Option<TaskId>,
    ending: Option<TaskId>,
}

/// What `next()` does once it has stepped past a line.
enum Step {
    Line,
    Choices(Vec<Choice>),
    Scene(String),
    Ending(String),
    Stop,
}

/// A visual-novel player. Built via `NovelPlayer::builder()`.
pub struct NovelPlayer<R: Renderer, S: KeyValueStore> {
    story: Story,
    config: PlayerConfig,
    renderer: R,
    store: S,
    audio: AudioEngine,
    state: PlaybackState,
    history: History,
    typewriter: Option<Typewriter>,
    phase: Phase,
    choices: Vec<Choice>,
    log_open: bool,
    timers: Scheduler<Timer>,
    slots: Slots,
}

/// Builder for constructing a `NovelPlayer`.
pub struct NovelPlayerBuilder<R, S> {
    story: Option<Story>,
    story_path: Option<PathBuf>,
    config: Option<PlayerConfig>,
    config_path: Option<PathBuf>,
    renderer: Option<R>,
    store: Option<S>,
    audio_host: Option<Box<dyn AudioHost>>,
}

impl<R: Renderer, S: KeyValueStore> NovelPlayer<R, S> {
    pub fn builder() -> NovelPlayerBuilder<R, S> {
        NovelPlayerBuilder {
            story: None,
            story_path: None,
            config: None,
            config_path: None,
            renderer: None,
            store: None,
            audio_host: None,
        }
    }

    // --- accessors ---

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_typing(&self) -> bool {
        self.typewriter.is_some()
    }

    /// Choices currently on screen. Empty outside `Phase::Choosing`.
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn log_open(&self) -> bool {
        self.log_open
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioEngine {
        &mut self.audio
    }

    /// Virtual milliseconds elapsed since the player was built.
    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    /// True when the game view is the active screen.
    pub fn game_active(&self) -> bool {
        matches!(
            self.phase,
            Phase::Playing | Phase::Choosing | Phase::EndingPending
        )
    }

    fn current_line(&self) -> Option<&Line> {
        let scene = self.story.scene(self.state.scene.as_deref()?)?;
        scene.lines.get(self.state.line_index)
    }

    // --- session ---

    /// Begin a new game from the story's start scene.
    pub fn start(&mut self) {
        self.audio.unlock();
        self.audio.play(Effect::Page);
        self.cancel_line_timers();

        let start = self.story.start.clone();
        self.state = PlaybackState {
            scene: Some(start.clone()),
            ..PlaybackState::default()
        };
        self.history.clear();
        self.renderer.set_auto_indicator(false);
        self.renderer.show_view(View::Game);
        tracing::debug!(scene = %start, "new game");
        self.load_scene(&start);
    }

    /// Return to the title screen, silencing audio and dropping every
    /// pending line or ending timer.
    pub fn to_title(&mut self) {
        self.audio.stop_ambient();
        self.cancel_line_timers();
        self.state.auto = false;
        self.phase = Phase::Title;
        self.choices.clear();
        if self.log_open {
            self.hide_log();
        }
        self.renderer.set_auto_indicator(false);
        self.renderer.show_view(View::Title);
        self.check_save();
    }

    /// Enable the title screen's continue button iff a save exists.
    pub fn check_save(&mut self) {
        let has_save = self.store.get(&self.config.save_key).is_some();
        self.renderer.set_continue_enabled(has_save);
    }

    /// Ending ids unlocked in this or any earlier session.
    pub fn unlocked_endings(&self) -> Vec<String> {
        storage::read_endings(&self.store, &self.config.endings_key)
    }

    // --- scenes and lines ---

    /// Enter a scene: chapter banner, ambient bed, scene sfx, first line.
    pub fn load_scene(&mut self, id: &str) {
        let Some(scene) = self.story.scene(id) else {
            tracing::error!(scene = %id, "scene not found");
            return;
        };
        let (chapter, ambient, sfx) = (scene.chapter, scene.ambient, scene.sfx);

        self.state.scene = Some(id.to_string());
        self.state.line_index = 0;
        self.phase = Phase::Playing;
        self.choices.clear();

        if let Some(chapter) = chapter.filter(|&c| c != 0 && c != self.state.chapter) {
            self.state.chapter = chapter;
            self.show_chapter_banner(chapter);
            self.audio.play(Effect::Chapter);
        }
        if let Some(preset) = ambient {
            self.audio.play_ambient(preset);
        }
        if let Some(effect) = sfx {
            self.audio.play(effect);
        }

        self.renderer.hide_choices();
        self.renderer.set_continue_visible(true);
        tracing::debug!(scene = %id, "scene loaded");
        self.show_line(false);
    }

    /// Display the line at the current position, recording it in the
    /// history unless `skip_history` is set.
    pub fn show_line(&mut self, skip_history: bool) {
        let Some(line) = self.current_line().cloned() else {
            return;
        };
        let Some(scene) = self.state.scene.clone() else {
            return;
        };

        self.renderer.set_speaker(line.speaker.as_deref());
        if !skip_history {
            self.history.record(HistoryEntry {
                scene,
                line_index: self.state.line_index,
                speaker: line.speaker.clone(),
                text: line.text.clone(),
            });
        }
        self.type_text(&line.text);
    }

    fn type_text(&mut self, text: &str) {
        self.timers.cancel_slot(&mut self.slots.reveal);
        self.typewriter = Some(Typewriter::new(text));
        self.renderer.set_dialogue("");
        self.renderer.set_continue_visible(false);
        self.slots.reveal = Some(
            self.timers
                .schedule(self.config.type_interval_ms, Timer::RevealTick),
        );
    }

    fn reveal_tick(&mut self) {
        let Some(typewriter) = self.typewriter.as_mut() else {
            return;
        };
        match typewriter.tick() {
            Tick::Reveal(c) => {
                self.renderer.append_dialogue(c);
                self.slots.reveal = Some(
                    self.timers
                        .schedule(self.config.type_interval_ms, Timer::RevealTick),
                );
            }
            Tick::Done => self.finish_typing(),
        }
    }

    fn skip_typing(&mut self) {
        if let Some(typewriter) = self.typewriter.take() {
            self.renderer.set_dialogue(&typewriter.full_text());
        }
        self.finish_typing();
    }

    fn finish_typing(&mut self) {
        self.timers.cancel_slot(&mut self.slots.reveal);
        self.typewriter = None;
        self.renderer.set_continue_visible(true);
        if self.state.auto {
            self.schedule_auto();
        }
    }

    fn schedule_auto(&mut self) {
        self.timers.cancel_slot(&mut self.slots.auto);
        self.slots.auto = Some(
            self.timers
                .schedule(self.config.auto_delay_ms, Timer::AutoAdvance),
        );
    }

    /// Drop the ticker, the autoplay delay and any pending ending screen.
    fn cancel_line_timers(&mut self) {
        self.timers.cancel_slot(&mut self.slots.reveal);
        self.timers.cancel_slot(&mut self.slots.auto);
        self.timers.cancel_slot(&mut self.slots.ending);
        self.typewriter = None;
    }

    /// Advance: finish the reveal if one is running, otherwise move to the
    /// next line or resolve the end of the scene.
    pub fn next(&mut self) {
        self.timers.cancel_slot(&mut self.slots.auto);
        if self.phase != Phase::Playing {
            return;
        }
        if self.typewriter.is_some() {
            self.skip_typing();
            return;
        }

        let step = {
            let Some(scene) = self
                .state
                .scene
                .as_deref()
                .and_then(|id| self.story.scene(id))
            else {
                return;
            };
            if self.state.line_index + 1 < scene.lines.len() {
                Step::Line
            } else {
                match scene.continuation() {
                    Continuation::Choices(choices) => Step::Choices(choices.to_vec()),
                    Continuation::Next(next) => Step::Scene(next.to_string()),
                    Continuation::Ending(ending) => Step::Ending(ending.to_string()),
                    Continuation::Stop => Step::Stop,
                }
            }
        };

        match step {
            Step::Line => {
                self.state.line_index += 1;
                self.audio.play(Effect::Page);
                self.show_line(false);
            }
            step => {
                // Past the last line.
                if let Some(line_count) = self
                    .state
                    .scene
                    .as_deref()
                    .and_then(|id| self.story.scene(id))
                    .map(|s| s.lines.len())
                {
                    self.state.line_index = line_count;
                }
                match step {
                    Step::Choices(choices) => self.show_choices(choices),
                    Step::Scene(next) => self.load_scene(&next),
                    Step::Ending(ending) => self.show_ending(&ending),
                    _ => tracing::debug!(scene = ?self.state.scene, "scene has no continuation"),
                }
            }
        }
    }

    /// Step back one history entry and show it instantly.
    pub fn prev(&mut self) {
        if !matches!(self.phase, Phase::Playing | Phase::Choosing) {
            return;
        }
        self.timers.cancel_slot(&mut self.slots.auto);
        if self.typewriter.take().is_some() {
            self.timers.cancel_slot(&mut self.slots.reveal);
        }

        match self.history.rewind().cloned() {
            Some(entry) => {
                self.restore_entry(&entry);
                self.audio.play(Effect::Page);
            }
            None => self.toast(toasts::AT_START),
        }
    }

    /// Put a recorded line back on screen with no reveal animation.
    fn restore_entry(&mut self, entry: &HistoryEntry) {
        self.state.scene = Some(entry.scene.clone());
        self.state.line_index = entry.line_index;
        self.phase = Phase::Playing;
        self.choices.clear();

        self.renderer.hide_choices();
        self.renderer.set_speaker(entry.speaker.as_deref());
        self.renderer.set_dialogue(&entry.text);
        self.renderer.set_continue_visible(true);
    }

    // --- choices and endings ---

    pub fn show_choices(&mut self, choices: Vec<Choice>) {
        self.renderer.show_choices(&choices);
        self.renderer.set_continue_visible(false);
        self.choices = choices;
        self.phase = Phase::Choosing;
    }

    /// Pick one of the choices on screen. Ignored outside
    /// `Phase::Choosing` or for an out-of-range index.
    pub fn select_choice(&mut self, index: usize) {
        if self.phase != Phase::Choosing {
            return;
        }
        let Some(next) = self.choices.get(index).map(|c| c.next.clone()) else {
            return;
        };
        self.audio.play(Effect::Page);
        self.load_scene(&next);
    }

    /// Unlock an ending and, after a short delay, show the ending screen.
    pub fn show_ending(&mut self, id: &str) {
        if self.story.ending(id).is_none() {
            tracing::error!(ending = %id, "ending not found");
            return;
        }

        match storage::unlock_ending(&mut self.store, &self.config.endings_key, id) {
            Ok(true) => tracing::info!(ending = %id, "ending unlocked"),
            Ok(false) => {}
            Err(e) => tracing::warn!(ending = %id, error = %e, "failed to persist ending"),
        }

        self.cancel_line_timers();
        self.audio.stop_ambient();
        self.audio.play(Effect::Chapter);
        self.phase = Phase::EndingPending;
        self.slots.ending = Some(self.timers.schedule(
            self.config.ending_delay_ms,
            Timer::ShowEnding(id.to_string()),
        ));
    }

    fn reveal_ending(&mut self, id: &str) {
        let Some(ending) = self.story.ending(id).cloned() else {
            return;
        };
        self.phase = Phase::Ending;
        self.renderer.show_ending(&ending);
        self.renderer.show_view(View::Ending);
    }

    // --- log ---

    pub fn show_log(&mut self) {
        self.renderer.show_log(self.history.entries());
        self.log_open = true;
    }

    pub fn hide_log(&mut self) {
        self.renderer.hide_log();
        self.log_open = false;
    }

    /// Jump straight to a history entry picked from the log. Only a game in
    /// progress can jump; on the title or once an ending is under way the
    /// log is read-only.
    pub fn jump_to_log(&mut self, idx: usize) {
        if !matches!(self.phase, Phase::Playing | Phase::Choosing) {
            return;
        }
        let Some(entry) = self.history.jump(idx).cloned() else {
            return;
        };
        self.timers.cancel_slot(&mut self.slots.auto);
        self.timers.cancel_slot(&mut self.slots.reveal);
        self.typewriter = None;
        self.hide_log();
        self.restore_entry(&entry);
    }

    // --- persistence ---

    fn write_snapshot(&mut self) -> Result<(), StorageError> {
        let snapshot = Snapshot::new(
            self.state.clone(),
            self.history.entries().to_vec(),
            self.history.cursor(),
        );
        let json = serde_json::to_string(&snapshot)?;
        self.store.set(&self.config.save_key, &json)
    }

    /// Write the current position and history to the save slot.
    pub fn save(&mut self) {
        if let Err(e) = self.write_snapshot() {
            tracing::warn!(error = %e, "save failed");
            return;
        }
        self.audio.play(Effect::Save);
        self.toast(toasts::SAVED);
    }

    fn read_snapshot(&self) -> Option<Snapshot> {
        let raw = self.store.get(&self.config.save_key)?;
        let snapshot: Snapshot = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "save slot is corrupt; ignoring");
                return None;
            }
        };
        match snapshot.state.scene.as_deref() {
            Some(scene) if self.story.scene(scene).is_none() => {
                tracing::warn!(scene = %scene, "save refers to an unknown scene; ignoring");
                None
            }
            _ => Some(snapshot),
        }
    }

    /// Restore the save slot. Does nothing when there is no usable save.
    pub fn load(&mut self) {
        let Some(snapshot) = self.read_snapshot() else {
            return;
        };

        self.audio.unlock();
        self.cancel_line_timers();
        if self.log_open {
            self.hide_log();
        }

        let cursor = snapshot.cursor();
        self.state = snapshot.state;
        self.history = History::restore(snapshot.history, cursor);
        self.phase = Phase::Playing;
        self.choices.clear();

        self.audio.play(Effect::Page);
        if let Some(preset) = self
            .state
            .scene
            .as_deref()
            .and_then(|id| self.story.scene(id))
            .and_then(|s| s.ambient)
        {
            self.audio.play_ambient(preset);
        }
        self.renderer.show_view(View::Game);
        self.renderer.set_auto_indicator(self.state.auto);
        if let Some(entry) = self.history.current().cloned() {
            self.renderer.hide_choices();
            self.renderer.set_speaker(entry.speaker.as_deref());
            self.renderer.set_dialogue(&entry.text);
            self.renderer.set_continue_visible(true);
        }
        if self.state.auto {
            self.schedule_auto();
        }
        tracing::debug!(scene = ?self.state.scene, line = self.state.line_index, "save loaded");
        self.toast(toasts::LOADED);
    }

    // --- autoplay, toasts, banners ---

    pub fn toggle_auto(&mut self) {
        self.state.auto = !self.state.auto;
        self.renderer.set_auto_indicator(self.state.auto);
        self.toast(if self.state.auto {
            toasts::AUTO_ON
        } else {
            toasts::AUTO_OFF
        });

        if !self.state.auto {
            self.timers.cancel_slot(&mut self.slots.auto);
        } else if self.typewriter.is_none() && self.phase == Phase::Playing {
            self.schedule_auto();
        }
    }

    fn toast(&mut self, message: &str) {
        self.renderer.show_toast(message);
        self.timers.cancel_slot(&mut self.slots.toast);
        self.slots.toast = Some(self.timers.schedule(self.config.toast_ms, Timer::HideToast));
    }

    fn show_chapter_banner(&mut self, chapter: u32) {
        let label = self.story.chapter_label(chapter).to_string();
        self.renderer.show_chapter_banner(&label);
        self.timers.cancel_slot(&mut self.slots.banner);
        self.slots.banner = Some(
            self.timers
                .schedule(self.config.chapter_banner_ms, Timer::HideChapterBanner),
        );
    }

    // --- audio ---

    pub fn set_bgm_volume(&mut self, volume: u8) {
        self.audio.set_bgm_volume(volume);
    }

    pub fn set_sfx_volume(&mut self, volume: u8) {
        self.audio.set_sfx_volume(volume);
    }

    // --- event loop ---

    /// Route a raw input. Every input counts as a user gesture for audio.
    pub fn handle_input(&mut self, input: Input) {
        self.audio.unlock();
        match input.command(self.game_active(), self.log_open) {
            Command::Advance => self.next(),
            Command::Rewind => self.prev(),
            Command::CloseLog => self.hide_log(),
            Command::Ignore => {}
        }
    }

    /// Let `elapsed_ms` of wall time pass, firing due timers in order.
    pub fn advance(&mut self, elapsed_ms: u64) {
        let until = self.timers.now().saturating_add(elapsed_ms);
        while let Some((_, timer)) = self.timers.pop_due(until) {
            self.fire(timer);
        }
        self.timers.advance_to(until);
        self.audio.advance(elapsed_ms);
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::RevealTick => {
                self.slots.reveal = None;
                self.reveal_tick();
            }
            Timer::AutoAdvance => {
                self.slots.auto = None;
                if self.state.auto {
                    self.next();
                }
            }
            Timer::HideChapterBanner => {
                self.slots.banner = None;
                self.renderer.hide_chapter_banner();
            }
            Timer::HideToast => {
                self.slots.toast = None;
                self.renderer.hide_toast();
            }
            Timer::ShowEnding(id) => {
                self.slots.ending = None;
                self.reveal_ending(&id);
            }
        }
    }
}

impl<R: Renderer, S: KeyValueStore> NovelPlayerBuilder<R, S> {
    pub fn story(mut self, story: Story) -> Self {
        self.story = Some(story);
        self
    }

    /// Load the story from a RON file at build time.
    pub fn story_file(mut self, path: impl AsRef<Path>) -> Self {
        self.story_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the config from a RON file at build time.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn renderer(mut self, renderer: R) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    /// Audio output. Without one the player runs silent.
    pub fn audio_host(mut self, host: impl AudioHost + 'static) -> Self {
        self.audio_host = Some(Box::new(host));
        self
    }

    pub fn build(self) -> Result<NovelPlayer<R, S>, PlayerError> {
        let story = match (self.story, self.story_path) {
            (Some(story), _) => story,
            (None, Some(path)) => Story::load_from_ron(&path)?,
            (None, None) => return Err(PlayerError::Missing("story")),
        };
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => PlayerConfig::load_from_ron(&path)?,
            (None, None) => PlayerConfig::default(),
        };
        let renderer = self.renderer.ok_or(PlayerError::Missing("renderer"))?;
        let store = self.store.ok_or(PlayerError::Missing("store"))?;

        for issue in story.validate() {
            if let StoryIssue::MissingStart(start) = issue {
                return Err(StoryError::UnknownStart(start).into());
            }
            tracing::warn!(%issue, "story issue");
        }

        let host: Box<dyn AudioHost> = match self.audio_host {
            Some(host) => host,
            None => Box::new(UnsupportedHost),
        };
        let audio = AudioEngine::new(host)
            .with_seed(config.audio_seed)
            .with_volumes(config.bgm_volume, config.sfx_volume);

        let mut player = NovelPlayer {
            story,
            config,
            renderer,
            store,
            audio,
            state: PlaybackState::default(),
            history: History::new(),
            typewriter: None,
            phase: Phase::Title,
            choices: Vec::new(),
            log_open: false,
            timers: Scheduler::new(),
            slots: Slots::default(),
        };
        player.renderer.show_view(View::Title);
        player.check_save();
        Ok(player)
    }
}
