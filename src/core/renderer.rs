/// Presentation seam — everything the player asks of the screen.

use crate::schema::snapshot::HistoryEntry;
use crate::schema::story::{Choice, Ending};

/// Full-screen views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum View {
    #[default]
    Title,
    Game,
    Ending,
}

/// Operations the player drives on whatever draws the game.
///
/// Choice buttons and log rows are addressed by index; the front-end routes
/// activations back through `NovelPlayer::select_choice` and
/// `NovelPlayer::jump_to_log`.
pub trait Renderer {
    fn show_view(&mut self, view: View);

    /// `None` hides the speaker plate.
    fn set_speaker(&mut self, speaker: Option<&str>);
    fn set_dialogue(&mut self, text: &str);
    fn append_dialogue(&mut self, c: char);
    fn set_continue_visible(&mut self, visible: bool);

    fn show_choices(&mut self, choices: &[Choice]);
    fn hide_choices(&mut self);

    fn show_log(&mut self, entries: &[HistoryEntry]);
    fn hide_log(&mut self);

    fn show_toast(&mut self, message: &str);
    fn hide_toast(&mut self);

    fn show_chapter_banner(&mut self, label: &str);
    fn hide_chapter_banner(&mut self);

    fn show_ending(&mut self, ending: &Ending);

    /// The title screen's "continue" button.
    fn set_continue_enabled(&mut self, enabled: bool);
    fn set_auto_indicator(&mut self, on: bool);
}

/// A renderer that keeps the screen as plain data.
///
/// Used by tests and by terminal front-ends that print the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlessRenderer {
    pub view: View,
    pub speaker: Option<String>,
    pub dialogue: String,
    pub continue_visible: bool,
    /// `Some` while the choice list is visible.
    pub choices: Option<Vec<Choice>>,
    /// `Some` while the log overlay is open.
    pub log: Option<Vec<HistoryEntry>>,
    pub toast: Option<String>,
    pub chapter_banner: Option<String>,
    pub ending: Option<Ending>,
    pub continue_enabled: bool,
    pub auto_indicator: bool,
    /// Every toast ever shown, oldest first.
    pub toasts: Vec<String>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_open(&self) -> bool {
        self.log.is_some()
    }
}

impl Renderer for HeadlessRenderer {
    fn show_view(&mut self, view: View) {
        self.view = view;
    }

    fn set_speaker(&mut self, speaker: Option<&str>) {
        self.speaker = speaker.map(str::to_string);
    }

    fn set_dialogue(&mut self, text: &str) {
        self.dialogue = text.to_string();
    }

    fn append_dialogue(&mut self, c: char) {
        self.dialogue.push(c);
    }

    fn set_continue_visible(&mut self, visible: bool) {
        self.continue_visible = visible;
    }

    fn show_choices(&mut self, choices: &[Choice]) {
        self.choices = Some(choices.to_vec());
    }

    fn hide_choices(&mut self) {
        self.choices = None;
    }

    fn show_log(&mut self, entries: &[HistoryEntry]) {
        self.log = Some(entries.to_vec());
    }

    fn hide_log(&mut self) {
        self.log = None;
    }

    fn show_toast(&mut self, message: &str) {
        self.toast = Some(message.to_string());
        self.toasts.push(message.to_string());
    }

    fn hide_toast(&mut self) {
        self.toast = None;
    }

    fn show_chapter_banner(&mut self, label: &str) {
        self.chapter_banner = Some(label.to_string());
    }

    fn hide_chapter_banner(&mut self) {
        self.chapter_banner = None;
    }

    fn show_ending(&mut self, ending: &Ending) {
        self.ending = Some(ending.clone());
    }

    fn set_continue_enabled(&mut self, enabled: bool) {
        self.continue_enabled = enabled;
    }

    fn set_auto_indicator(&mut self, on: bool) {
        self.auto_indicator = on;
    }
}
