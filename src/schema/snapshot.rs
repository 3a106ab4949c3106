use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Mutable playback position owned by the player.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Current scene id; `None` before the first `start()`.
    pub scene: Option<String>,
    pub line_index: usize,
    /// Last chapter number shown. Zero means no chapter yet.
    pub chapter: u32,
    pub auto: bool,
}

/// One displayed line, as recorded in the dialogue history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub scene: String,
    pub line_index: usize,
    /// Narration has no speaker. Older saves wrote it as `""`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub speaker: Option<String>,
    pub text: String,
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let speaker = Option::<String>::deserialize(deserializer)?;
    Ok(speaker.filter(|s| !s.is_empty()))
}

impl HistoryEntry {
    /// True when both entries refer to the same line of the same scene.
    pub fn same_position(&self, other: &HistoryEntry) -> bool {
        self.scene == other.scene && self.line_index == other.line_index
    }
}

/// The persisted save slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub state: PlaybackState,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Cursor into `history`; -1 when nothing has been shown.
    #[serde(default)]
    pub history_index: Option<i64>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, rename = "ts")]
    pub timestamp: i64,
}

impl Snapshot {
    pub fn new(state: PlaybackState, history: Vec<HistoryEntry>, cursor: Option<usize>) -> Self {
        Self {
            state,
            history,
            history_index: Some(cursor.map_or(-1, |c| c as i64)),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// The cursor to restore. A missing cursor points at the last entry;
    /// a negative or out-of-range one is clamped the same way.
    pub fn cursor(&self) -> Option<usize> {
        let last = self.history.len().checked_sub(1);
        match self.history_index {
            Some(i) if i < 0 => None,
            Some(i) if (i as usize) < self.history.len() => Some(i as usize),
            _ => last,
        }
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(scene: &str, line_index: usize) -> HistoryEntry {
        HistoryEntry {
            scene: scene.to_string(),
            line_index,
            speaker: None,
            text: format!("{}:{}", scene, line_index),
        }
    }

    #[test]
    fn same_position_ignores_text() {
        let mut a = entry("s0", 1);
        let b = entry("s0", 1);
        a.text = "different".to_string();
        assert!(a.same_position(&b));
        assert!(!a.same_position(&entry("s0", 2)));
        assert!(!a.same_position(&entry("s1", 1)));
    }

    #[test]
    fn json_field_names() {
        let snap = Snapshot::new(
            PlaybackState {
                scene: Some("s0".to_string()),
                line_index: 1,
                chapter: 2,
                auto: true,
            },
            vec![entry("s0", 0), entry("s0", 1)],
            Some(1),
        );
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"lineIndex\":1"));
        assert!(json.contains("\"historyIndex\":1"));
        assert!(json.contains("\"ts\":"));
        assert!(snap.saved_at().is_some());
    }

    #[test]
    fn missing_cursor_defaults_to_last_entry() {
        let json = r#"{
            "state": {"scene": "s0", "lineIndex": 2, "chapter": 1, "auto": false},
            "history": [
                {"scene": "s0", "lineIndex": 0, "speaker": null, "text": "a"},
                {"scene": "s0", "lineIndex": 1, "speaker": "Ada", "text": "b"},
                {"scene": "s0", "lineIndex": 2, "text": "c"}
            ]
        }"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.history_index, None);
        assert_eq!(snap.cursor(), Some(2));
        assert_eq!(snap.history[1].speaker.as_deref(), Some("Ada"));
        assert_eq!(snap.timestamp, 0);
    }

    #[test]
    fn cursor_zero_is_kept() {
        let snap = Snapshot::new(PlaybackState::default(), vec![entry("a", 0), entry("a", 1)], Some(0));
        assert_eq!(snap.cursor(), Some(0));
    }

    #[test]
    fn empty_history_has_no_cursor() {
        let snap = Snapshot::new(PlaybackState::default(), Vec::new(), None);
        assert_eq!(snap.history_index, Some(-1));
        assert_eq!(snap.cursor(), None);
    }

    #[test]
    fn out_of_range_cursor_is_clamped() {
        let mut snap = Snapshot::new(PlaybackState::default(), vec![entry("a", 0)], Some(0));
        snap.history_index = Some(7);
        assert_eq!(snap.cursor(), Some(0));
    }

    #[test]
    fn empty_speaker_reads_as_narration() {
        let json = r#"{"scene":"s0","lineIndex":0,"speaker":"","text":"Rain."}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.speaker, None);

        let json = r#"{"scene":"s0","lineIndex":1,"speaker":"Ada","text":"Hello."}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.speaker.as_deref(), Some("Ada"));

        let json = r#"{"scene":"s0","lineIndex":2,"text":"Quiet."}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.speaker, None);
    }
}
