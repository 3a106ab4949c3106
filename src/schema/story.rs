/// Story graph — scenes, lines, choices, endings, and RON loading.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use super::tags::{AmbientPreset, Effect};

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("start scene not found: {0}")]
    UnknownStart(String),
}

/// One piece of dialogue or narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
}

/// A branching option shown at the end of a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub next: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ending {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub quote: String,
}

/// A named unit of story content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub chapter: Option<u32>,
    pub ambient: Option<AmbientPreset>,
    pub sfx: Option<Effect>,
    pub lines: Vec<Line>,
    pub choices: Vec<Choice>,
    pub next: Option<String>,
    pub ending: Option<String>,
}

/// What happens once a scene runs out of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation<'a> {
    Choices(&'a [Choice]),
    Next(&'a str),
    Ending(&'a str),
    /// Dead end; advancing does nothing.
    Stop,
}

impl Scene {
    /// Resolve the end-of-lines continuation. Choices win over `next`,
    /// which wins over `ending`.
    pub fn continuation(&self) -> Continuation<'_> {
        if !self.choices.is_empty() {
            Continuation::Choices(&self.choices)
        } else if let Some(ref next) = self.next {
            Continuation::Next(next)
        } else if let Some(ref ending) = self.ending {
            Continuation::Ending(ending)
        } else {
            Continuation::Stop
        }
    }

    fn continuation_count(&self) -> usize {
        usize::from(!self.choices.is_empty())
            + usize::from(self.next.is_some())
            + usize::from(self.ending.is_some())
    }
}

/// The complete, read-only story graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub start: String,
    pub scenes: HashMap<String, Scene>,
    pub endings: HashMap<String, Ending>,
    pub chapters: HashMap<u32, String>,
}

// The RON shape keys scenes and endings by id, so the id lives only in the
// map key. These intermediate structs are folded into the public types.

#[derive(Debug, Deserialize)]
struct RonScene {
    #[serde(default)]
    chapter: Option<u32>,
    #[serde(default)]
    ambient: Option<AmbientPreset>,
    #[serde(default)]
    sfx: Option<Effect>,
    #[serde(default)]
    lines: Vec<Line>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    ending: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RonEnding {
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    quote: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Story")]
struct RonStory {
    start: String,
    #[serde(default)]
    chapters: HashMap<u32, String>,
    scenes: HashMap<String, RonScene>,
    #[serde(default)]
    endings: HashMap<String, RonEnding>,
}

impl Story {
    /// Load a story from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Story, StoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a story from a RON string.
    pub fn parse_ron(input: &str) -> Result<Story, StoryError> {
        let raw: RonStory = ron::from_str(input)?;

        let scenes = raw
            .scenes
            .into_iter()
            .map(|(id, s)| {
                let scene = Scene {
                    id: id.clone(),
                    chapter: s.chapter,
                    ambient: s.ambient,
                    sfx: s.sfx,
                    lines: s.lines,
                    choices: s.choices,
                    next: s.next,
                    ending: s.ending,
                };
                (id, scene)
            })
            .collect();

        let endings = raw
            .endings
            .into_iter()
            .map(|(id, e)| {
                let ending = Ending {
                    id: id.clone(),
                    title: e.title,
                    subtitle: e.subtitle,
                    quote: e.quote,
                };
                (id, ending)
            })
            .collect();

        Ok(Story {
            start: raw.start,
            scenes,
            endings,
            chapters: raw.chapters,
        })
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn ending(&self, id: &str) -> Option<&Ending> {
        self.endings.get(id)
    }

    /// Display label for a chapter number; empty when the story has none.
    pub fn chapter_label(&self, chapter: u32) -> &str {
        self.chapters.get(&chapter).map(String::as_str).unwrap_or("")
    }

    /// Check the graph for broken references and ambiguous continuations.
    ///
    /// Issues are sorted so reports are stable across runs.
    pub fn validate(&self) -> Vec<StoryIssue> {
        let mut issues = Vec::new();

        if !self.scenes.contains_key(&self.start) {
            issues.push(StoryIssue::MissingStart(self.start.clone()));
        }

        for scene in self.scenes.values() {
            if scene.lines.is_empty() {
                issues.push(StoryIssue::NoLines(scene.id.clone()));
            }

            match scene.continuation_count() {
                0 => issues.push(StoryIssue::DeadEnd(scene.id.clone())),
                1 => {}
                _ => issues.push(StoryIssue::AmbiguousContinuation(scene.id.clone())),
            }

            for choice in &scene.choices {
                if !self.scenes.contains_key(&choice.next) {
                    issues.push(StoryIssue::DanglingScene {
                        from: scene.id.clone(),
                        target: choice.next.clone(),
                    });
                }
            }
            if let Some(ref next) = scene.next {
                if !self.scenes.contains_key(next) {
                    issues.push(StoryIssue::DanglingScene {
                        from: scene.id.clone(),
                        target: next.clone(),
                    });
                }
            }
            if let Some(ref ending) = scene.ending {
                if !self.endings.contains_key(ending) {
                    issues.push(StoryIssue::DanglingEnding {
                        from: scene.id.clone(),
                        target: ending.clone(),
                    });
                }
            }
            if let Some(chapter) = scene.chapter {
                if chapter != 0 && !self.chapters.contains_key(&chapter) {
                    issues.push(StoryIssue::UnlabeledChapter {
                        scene: scene.id.clone(),
                        chapter,
                    });
                }
            }
        }

        issues.sort_by_key(|issue| issue.to_string());
        issues
    }
}

/// A problem found by [`Story::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryIssue {
    MissingStart(String),
    DanglingScene { from: String, target: String },
    DanglingEnding { from: String, target: String },
    AmbiguousContinuation(String),
    DeadEnd(String),
    NoLines(String),
    UnlabeledChapter { scene: String, chapter: u32 },
}

impl StoryIssue {
    /// Errors make the story unplayable along some path; the rest are
    /// warnings the player tolerates.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::MissingStart(_) | Self::DanglingScene { .. } | Self::DanglingEnding { .. }
        )
    }
}

impl fmt::Display for StoryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStart(id) => write!(f, "start scene '{}' does not exist", id),
            Self::DanglingScene { from, target } => {
                write!(f, "scene '{}' points to unknown scene '{}'", from, target)
            }
            Self::DanglingEnding { from, target } => {
                write!(f, "scene '{}' points to unknown ending '{}'", from, target)
            }
            Self::AmbiguousContinuation(id) => write!(
                f,
                "scene '{}' declares more than one of choices/next/ending",
                id
            ),
            Self::DeadEnd(id) => write!(f, "scene '{}' has no continuation", id),
            Self::NoLines(id) => write!(f, "scene '{}' has no lines", id),
            Self::UnlabeledChapter { scene, chapter } => write!(
                f,
                "scene '{}' opens chapter {} which has no label",
                scene, chapter
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_STORY: &str = r#"Story(
        start: "s0",
        chapters: { 1: "Chapter One" },
        scenes: {
            "s0": (
                chapter: Some(1),
                ambient: Some("rain"),
                lines: [
                    (speaker: Some("Ada"), text: "Hello."),
                    (text: "The rain keeps falling."),
                ],
                choices: [
                    (text: "Go inside", next: "s1"),
                ],
            ),
            "s1": (
                sfx: Some("resonance"),
                lines: [(text: "Warm light.")],
                ending: Some("e1"),
            ),
        },
        endings: {
            "e1": (title: "Home", subtitle: "Ending 1", quote: "At last."),
        },
    )"#;

    #[test]
    fn parse_small_story() {
        let story = Story::parse_ron(SMALL_STORY).unwrap();
        assert_eq!(story.start, "s0");
        assert_eq!(story.scenes.len(), 2);

        let s0 = story.scene("s0").unwrap();
        assert_eq!(s0.id, "s0");
        assert_eq!(s0.chapter, Some(1));
        assert_eq!(s0.ambient, Some(AmbientPreset::Rain));
        assert_eq!(s0.lines.len(), 2);
        assert_eq!(s0.lines[0].speaker.as_deref(), Some("Ada"));
        assert_eq!(s0.lines[1].speaker, None);

        let s1 = story.scene("s1").unwrap();
        assert_eq!(s1.sfx, Some(Effect::Resonance));

        let e1 = story.ending("e1").unwrap();
        assert_eq!(e1.id, "e1");
        assert_eq!(e1.title, "Home");
        assert_eq!(story.chapter_label(1), "Chapter One");
        assert_eq!(story.chapter_label(9), "");
    }

    #[test]
    fn small_story_validates_clean() {
        let story = Story::parse_ron(SMALL_STORY).unwrap();
        assert!(story.validate().is_empty(), "{:?}", story.validate());
    }

    #[test]
    fn unknown_sfx_is_a_parse_error() {
        let bad = r#"Story(
            start: "a",
            scenes: { "a": (sfx: Some("kazoo"), lines: [(text: "x")]) },
        )"#;
        assert!(Story::parse_ron(bad).is_err());
    }

    #[test]
    fn continuation_priority() {
        let mut scene = Scene {
            id: "x".to_string(),
            chapter: None,
            ambient: None,
            sfx: None,
            lines: Vec::new(),
            choices: vec![Choice {
                text: "a".to_string(),
                next: "a".to_string(),
            }],
            next: Some("b".to_string()),
            ending: Some("c".to_string()),
        };
        assert!(matches!(scene.continuation(), Continuation::Choices(c) if c.len() == 1));

        scene.choices.clear();
        assert_eq!(scene.continuation(), Continuation::Next("b"));

        scene.next = None;
        assert_eq!(scene.continuation(), Continuation::Ending("c"));

        scene.ending = None;
        assert_eq!(scene.continuation(), Continuation::Stop);
    }

    #[test]
    fn validate_reports_problems() {
        let broken = r#"Story(
            start: "nowhere",
            scenes: {
                "a": (
                    chapter: Some(3),
                    lines: [(text: "x")],
                    next: Some("b"),
                    ending: Some("missing"),
                ),
                "c": (lines: []),
            },
        )"#;
        let story = Story::parse_ron(broken).unwrap();
        let issues = story.validate();

        assert!(issues.contains(&StoryIssue::MissingStart("nowhere".to_string())));
        assert!(issues.contains(&StoryIssue::DanglingScene {
            from: "a".to_string(),
            target: "b".to_string(),
        }));
        assert!(issues.contains(&StoryIssue::DanglingEnding {
            from: "a".to_string(),
            target: "missing".to_string(),
        }));
        assert!(issues.contains(&StoryIssue::AmbiguousContinuation("a".to_string())));
        assert!(issues.contains(&StoryIssue::DeadEnd("c".to_string())));
        assert!(issues.contains(&StoryIssue::NoLines("c".to_string())));
        assert!(issues.contains(&StoryIssue::UnlabeledChapter {
            scene: "a".to_string(),
            chapter: 3,
        }));

        assert!(StoryIssue::MissingStart("x".to_string()).is_error());
        assert!(!StoryIssue::DeadEnd("x".to_string()).is_error());
    }
}
