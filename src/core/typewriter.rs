/// Character-by-character reveal of a single line.

/// Result of one reveal tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The next character became visible.
    Reveal(char),
    /// Everything is visible; the reveal is over.
    Done,
}

/// Transient reveal state for the line currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typewriter {
    chars: Vec<char>,
    revealed: usize,
}

impl Typewriter {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            revealed: 0,
        }
    }

    /// Advance by one character. The tick after the last character reports
    /// `Done`, so a reveal of n characters takes n + 1 ticks.
    pub fn tick(&mut self) -> Tick {
        match self.chars.get(self.revealed) {
            Some(&c) => {
                self.revealed += 1;
                Tick::Reveal(c)
            }
            None => Tick::Done,
        }
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The visible prefix.
    pub fn shown(&self) -> String {
        self.chars[..self.revealed].iter().collect()
    }

    /// The whole line.
    pub fn full_text(&self) -> String {
        self.chars.iter().collect()
    }
}
