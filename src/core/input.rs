/// Input events the front-end forwards to the player.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Enter,
    ArrowUp,
    ArrowLeft,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// Pointer activation on the dialogue box.
    Pointer,
    Key(Key),
}

/// What an input means once the overlays have had their say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Advance,
    Rewind,
    CloseLog,
    Ignore,
}

impl Input {
    /// Map an input to a command. While the log is open only Escape does
    /// anything; otherwise advance/rewind need the game view.
    pub fn command(self, game_active: bool, log_open: bool) -> Command {
        if log_open {
            return match self {
                Input::Key(Key::Escape) => Command::CloseLog,
                _ => Command::Ignore,
            };
        }
        if !game_active {
            return Command::Ignore;
        }
        match self {
            Input::Pointer | Input::Key(Key::Space) | Input::Key(Key::Enter) => Command::Advance,
            Input::Key(Key::ArrowUp) | Input::Key(Key::ArrowLeft) => Command::Rewind,
            Input::Key(_) => Command::Ignore,
        }
    }
}
