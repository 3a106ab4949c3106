/// Player integration tests — full sessions over the fixture story.

use novel_player::audio::engine::AudioStatus;
use novel_player::audio::host::{OfflineHost, UnsupportedHost};
use novel_player::core::config::PlayerConfig;
use novel_player::core::input::{Input, Key};
use novel_player::core::player::toasts;
use novel_player::core::renderer::{HeadlessRenderer, View};
use novel_player::core::storage::{FileStore, KeyValueStore, MemoryStore};
use novel_player::schema::snapshot::Snapshot;
use novel_player::schema::story::Story;
use novel_player::schema::tags::AmbientPreset;
use novel_player::{NovelPlayer, Phase};
use std::path::Path;

const STORY: &str = "tests/fixtures/test_story.ron";

type Player<S> = NovelPlayer<HeadlessRenderer, S>;

fn story() -> Story {
    Story::load_from_ron(Path::new(STORY)).unwrap()
}

fn player_with<S: KeyValueStore>(store: S) -> Player<S> {
    NovelPlayer::builder()
        .story(story())
        .renderer(HeadlessRenderer::new())
        .store(store)
        .audio_host(OfflineHost::new(8_000))
        .build()
        .unwrap()
}

fn player() -> Player<MemoryStore> {
    player_with(MemoryStore::new())
}

/// Let the reveal run out on its own.
fn finish_line<S: KeyValueStore>(p: &mut Player<S>) {
    let step = p.config().type_interval_ms;
    while p.is_typing() {
        p.advance(step);
    }
}

/// Show the next line in full, or resolve the end of the scene.
fn step<S: KeyValueStore>(p: &mut Player<S>) {
    finish_line(p);
    p.next();
    finish_line(p);
}

fn assert_line_in_range<S: KeyValueStore>(p: &Player<S>) {
    let scene = p.state().scene.as_deref().unwrap();
    let lines = p.story().scene(scene).unwrap().lines.len();
    assert!(p.state().line_index < lines, "line index out of range in {}", scene);
}

/// Play s0 → choose "Go on" → ending e1 at the end of s1.
fn play_to_ending<S: KeyValueStore>(p: &mut Player<S>) {
    p.start();
    step(p); // s0 line 1
    step(p); // choices
    p.select_choice(0);
    finish_line(p);
    step(p); // s1 line 1
    p.next(); // ending
    p.advance(p.config().ending_delay_ms);
}

// --- scenarios ---

#[test]
fn two_lines_then_choice_then_scene_change() {
    let mut p = player();
    p.start();
    assert_eq!(p.state().scene.as_deref(), Some("s0"));

    // Each advance lands on a line mid-reveal; the next one skips it.
    p.next();
    assert_eq!(p.renderer().dialogue, "abcdefghij");
    p.next();
    assert_eq!(p.state().line_index, 1);
    p.next();
    assert_eq!(p.renderer().dialogue, "Second line.");
    assert_eq!(p.phase(), Phase::Playing);

    p.next();
    assert_eq!(p.phase(), Phase::Choosing);
    assert_eq!(p.state().scene.as_deref(), Some("s0"));
    let shown = p.renderer().choices.as_ref().unwrap();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].next, "s1");
    assert!(!p.renderer().continue_visible);

    p.select_choice(0);
    assert_eq!(p.state().scene.as_deref(), Some("s1"));
    assert_eq!(p.state().line_index, 0);
    assert_eq!(p.phase(), Phase::Playing);
    assert!(p.renderer().choices.is_none());
}

#[test]
fn skip_mid_reveal_shows_exact_full_text() {
    let mut p = player();
    p.start();
    p.advance(75);
    assert_eq!(p.renderer().dialogue, "abc");

    p.next();
    assert_eq!(p.renderer().dialogue, "abcdefghij");
    assert!(!p.is_typing());
    assert!(p.renderer().continue_visible);

    // The cancelled ticker must not append anything later.
    p.advance(1_000);
    assert_eq!(p.renderer().dialogue, "abcdefghij");
    assert_eq!(p.state().line_index, 0);
}

#[test]
fn ending_unlocked_once_across_sessions() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = player_with(FileStore::open(dir.path()).unwrap());
    play_to_ending(&mut first);
    assert_eq!(first.phase(), Phase::Ending);
    assert_eq!(first.renderer().view, View::Ending);
    assert_eq!(first.renderer().ending.as_ref().unwrap().title, "First Light");
    assert_eq!(first.unlocked_endings(), vec!["e1".to_string()]);

    let mut second = player_with(FileStore::open(dir.path()).unwrap());
    assert_eq!(second.unlocked_endings(), vec!["e1".to_string()]);
    play_to_ending(&mut second);
    assert_eq!(second.phase(), Phase::Ending);
    assert_eq!(second.unlocked_endings(), vec!["e1".to_string()]);
}

#[test]
fn dead_end_choice_path_reaches_same_ending() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(1);
    assert_eq!(p.state().scene.as_deref(), Some("s2"));
    finish_line(&mut p);
    p.next();
    assert_eq!(p.state().scene.as_deref(), Some("s3"));
    finish_line(&mut p);
    step(&mut p);
    p.next();
    assert_eq!(p.phase(), Phase::EndingPending);
    assert_eq!(p.unlocked_endings(), vec!["e1".to_string()]);
}

// --- history ---

#[test]
fn rewind_at_start_reports_and_stays() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.prev();
    assert_eq!(p.renderer().toast.as_deref(), Some(toasts::AT_START));
    assert_eq!(p.history().cursor(), Some(0));
    assert_eq!(p.state().line_index, 0);
}

#[test]
fn rewind_restores_previous_entry_exactly() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    assert_eq!(p.history().cursor(), Some(2));

    p.prev();
    let entry = p.history().get(1).unwrap().clone();
    assert_eq!(p.history().cursor(), Some(1));
    assert_eq!(p.state().scene.as_deref(), Some(entry.scene.as_str()));
    assert_eq!(p.state().line_index, entry.line_index);
    assert_eq!(p.renderer().speaker, entry.speaker);
    assert_eq!(p.renderer().dialogue, entry.text);
    assert!(!p.is_typing());
    assert!(p.renderer().continue_visible);
    // The log is untouched by rewinding.
    assert_eq!(p.history().len(), 3);
}

#[test]
fn rewind_while_typing_cancels_reveal() {
    let mut p = player();
    p.start();
    step(&mut p);
    p.next(); // end of s0
    assert_eq!(p.phase(), Phase::Choosing);
    p.select_choice(0);
    p.advance(30);
    assert!(p.is_typing());

    p.prev();
    assert!(!p.is_typing());
    assert_eq!(p.state().scene.as_deref(), Some("s0"));
    assert_eq!(p.renderer().dialogue, "Second line.");
    p.advance(1_000);
    assert_eq!(p.renderer().dialogue, "Second line.");
}

#[test]
fn rewind_from_choices_hides_them() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    assert_eq!(p.phase(), Phase::Choosing);

    p.prev();
    assert_eq!(p.phase(), Phase::Playing);
    assert!(p.renderer().choices.is_none());
    assert_eq!(p.renderer().dialogue, "abcdefghij");
}

#[test]
fn replaying_recorded_path_does_not_fork() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    finish_line(&mut p);
    let before = p.history().entries().to_vec();

    p.prev();
    p.prev();
    assert_eq!(p.history().cursor(), Some(0));
    step(&mut p);
    assert_eq!(p.history().cursor(), Some(1));
    assert_eq!(p.history().entries(), before.as_slice());
}

#[test]
fn diverging_after_rewind_truncates_then_appends() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    finish_line(&mut p);
    step(&mut p); // s1 line 1
    assert_eq!(p.history().len(), 4);

    // Back to s0 line 1, then take the other branch.
    p.prev();
    p.prev();
    assert_eq!(p.history().cursor(), Some(1));
    step(&mut p);
    assert_eq!(p.phase(), Phase::Choosing);
    p.select_choice(1);

    let scenes: Vec<&str> = p
        .history()
        .entries()
        .iter()
        .map(|e| e.scene.as_str())
        .collect();
    assert_eq!(scenes, vec!["s0", "s0", "s2"]);
    assert_eq!(p.history().cursor(), Some(2));
}

#[test]
fn line_index_stays_in_range_while_lines_show() {
    let mut p = player();
    p.start();
    for _ in 0..3 {
        assert_line_in_range(&p);
        step(&mut p);
        if p.phase() == Phase::Choosing {
            p.select_choice(0);
        }
    }
    assert_line_in_range(&p);
}

// --- log ---

#[test]
fn log_lists_history_and_jumps() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);

    p.show_log();
    assert_eq!(p.renderer().log.as_ref().unwrap().len(), 3);
    assert!(p.log_open());

    p.jump_to_log(0);
    assert!(!p.log_open());
    assert!(p.renderer().log.is_none());
    assert_eq!(p.history().cursor(), Some(0));
    assert_eq!(p.state().scene.as_deref(), Some("s0"));
    assert_eq!(p.renderer().dialogue, "abcdefghij");
    assert!(!p.is_typing());
}

#[test]
fn jump_to_invalid_log_entry_is_ignored() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.show_log();
    p.jump_to_log(9);
    assert!(p.log_open());
    assert_eq!(p.history().cursor(), Some(0));
}

#[test]
fn jump_from_title_does_not_revive_game() {
    let mut p = player();
    p.start();
    step(&mut p);
    let cursor = p.history().cursor();
    p.to_title();

    p.show_log();
    p.jump_to_log(0);
    assert_eq!(p.phase(), Phase::Title);
    assert_eq!(p.renderer().view, View::Title);
    assert!(!p.game_active());
    assert_eq!(p.history().cursor(), cursor);

    // Space on the title does nothing to the hidden game.
    p.handle_input(Input::Key(Key::Space));
    assert_eq!(p.phase(), Phase::Title);
}

#[test]
fn jump_while_ending_pending_keeps_the_ending() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    finish_line(&mut p);
    step(&mut p);
    p.next();
    assert_eq!(p.phase(), Phase::EndingPending);

    p.show_log();
    p.jump_to_log(0);
    assert_eq!(p.phase(), Phase::EndingPending);
    assert_eq!(p.state().scene.as_deref(), Some("s1"));

    p.advance(p.config().ending_delay_ms);
    assert_eq!(p.phase(), Phase::Ending);
    assert_eq!(p.renderer().view, View::Ending);
}

#[test]
fn keys_are_ignored_while_log_is_open() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.show_log();
    p.handle_input(Input::Key(Key::Space));
    p.handle_input(Input::Key(Key::ArrowUp));
    assert_eq!(p.state().line_index, 0);
    p.handle_input(Input::Key(Key::Escape));
    assert!(!p.log_open());
    p.handle_input(Input::Key(Key::Enter));
    assert_eq!(p.state().line_index, 1);
}

// --- persistence ---

#[test]
fn save_load_round_trip_is_exact() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    finish_line(&mut p);
    p.prev();

    let state = p.state().clone();
    let entries = p.history().entries().to_vec();
    let cursor = p.history().cursor();
    p.save();
    assert_eq!(p.renderer().toast.as_deref(), Some(toasts::SAVED));

    // Move on, then come back.
    step(&mut p);
    step(&mut p);
    assert_ne!(p.state(), &state);

    p.load();
    assert_eq!(p.state(), &state);
    assert_eq!(p.history().entries(), entries.as_slice());
    assert_eq!(p.history().cursor(), cursor);
    assert_eq!(p.renderer().toast.as_deref(), Some(toasts::LOADED));
    assert_eq!(p.renderer().dialogue, entries[cursor.unwrap()].text);
    assert_eq!(p.phase(), Phase::Playing);
}

#[test]
fn save_uses_browser_compatible_keys() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.save();

    let raw = p.store().get("novelSave").unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["state"]["scene"], "s0");
    assert_eq!(json["state"]["lineIndex"], 0);
    assert_eq!(json["historyIndex"], 0);
    assert!(json["ts"].as_i64().unwrap() > 0);

    let snapshot: Snapshot = serde_json::from_str(&raw).unwrap();
    assert!(snapshot.saved_at().is_some());
}

#[test]
fn load_without_save_does_nothing() {
    let mut p = player();
    p.load();
    assert_eq!(p.phase(), Phase::Title);
    assert_eq!(p.renderer().view, View::Title);
    assert!(p.renderer().toasts.is_empty());
}

#[test]
fn corrupt_save_is_ignored() {
    let mut store = MemoryStore::new();
    store.set("novelSave", "{ not json").unwrap();
    let mut p = player_with(store);
    // A slot exists, so the title offers to continue.
    assert!(p.renderer().continue_enabled);
    p.load();
    assert_eq!(p.phase(), Phase::Title);
    assert!(p.renderer().toasts.is_empty());
}

#[test]
fn save_without_history_index_resumes_at_last_entry() {
    let mut store = MemoryStore::new();
    store
        .set(
            "novelSave",
            r#"{"state":{"scene":"s0","lineIndex":1,"chapter":1,"auto":false},
                "history":[
                    {"scene":"s0","lineIndex":0,"speaker":"Ada","text":"abcdefghij"},
                    {"scene":"s0","lineIndex":1,"speaker":null,"text":"Second line."}
                ]}"#,
        )
        .unwrap();
    let mut p = player_with(store);
    p.load();
    assert_eq!(p.history().cursor(), Some(1));
    assert_eq!(p.renderer().dialogue, "Second line.");
    assert_eq!(p.renderer().speaker, None);
}

#[test]
fn title_continue_tracks_save_slot() {
    let mut p = player();
    assert!(!p.renderer().continue_enabled);
    p.start();
    finish_line(&mut p);
    p.save();
    p.to_title();
    assert!(p.renderer().continue_enabled);
    assert_eq!(p.renderer().view, View::Title);
}

// --- autoplay ---

#[test]
fn autoplay_advances_after_delay() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.toggle_auto();
    assert!(p.state().auto);
    assert!(p.renderer().auto_indicator);
    assert_eq!(p.renderer().toast.as_deref(), Some(toasts::AUTO_ON));

    p.advance(1_999);
    assert_eq!(p.state().line_index, 0);
    p.advance(1);
    assert_eq!(p.state().line_index, 1);
    assert!(p.is_typing());

    // Finishing the reveal re-arms autoplay, which resolves into choices.
    finish_line(&mut p);
    p.advance(2_000);
    assert_eq!(p.phase(), Phase::Choosing);
}

#[test]
fn manual_advance_cancels_pending_autoplay() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.toggle_auto();
    p.advance(1_000);
    p.next(); // to line 1, typing
    finish_line(&mut p);
    let now_on_line = p.state().line_index;
    // Only the timer armed by the new reveal is pending.
    p.advance(1_500);
    assert_eq!(p.state().line_index, now_on_line);
}

#[test]
fn autoplay_off_cancels_timer() {
    let mut p = player();
    p.start();
    finish_line(&mut p);
    p.toggle_auto();
    p.advance(1_000);
    p.toggle_auto();
    assert_eq!(p.renderer().toast.as_deref(), Some(toasts::AUTO_OFF));
    p.advance(5_000);
    assert_eq!(p.state().line_index, 0);
}

#[test]
fn to_title_clears_autoplay_and_ambient() {
    let mut p = player();
    p.start();
    p.toggle_auto();
    p.to_title();
    assert!(!p.state().auto);
    assert!(!p.renderer().auto_indicator);
    assert_eq!(p.audio().current_ambient(), None);
    p.advance(10_000);
    assert_eq!(p.phase(), Phase::Title);
}

// --- audio wiring ---

#[test]
fn scenes_drive_ambient_presets() {
    let mut p = player();
    p.start();
    assert_eq!(p.audio().status(), AudioStatus::Ready);
    assert_eq!(p.audio().current_ambient(), Some(AmbientPreset::Rain));
    let rain_nodes = p.audio().ambient_nodes().to_vec();

    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    assert_eq!(p.audio().current_ambient(), Some(AmbientPreset::Factory));
    let graph = p.audio().graph().unwrap();
    assert!(rain_nodes.iter().all(|&n| !graph.contains(n)));
}

#[test]
fn unknown_ambient_tag_falls_back_to_dark() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(1);
    assert_eq!(p.audio().current_ambient(), Some(AmbientPreset::Dark));
}

#[test]
fn rewind_keeps_current_ambient() {
    let mut p = player();
    p.start();
    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    let nodes = p.audio().ambient_nodes().len();
    p.prev();
    assert_eq!(p.audio().current_ambient(), Some(AmbientPreset::Factory));
    assert!(p.audio().ambient_nodes().len() >= nodes);
}

#[test]
fn ending_stops_ambient() {
    let mut p = player();
    play_to_ending(&mut p);
    assert_eq!(p.audio().current_ambient(), None);
    assert!(p.audio().ambient_nodes().is_empty());
}

#[test]
fn chapter_banner_per_new_chapter() {
    let mut p = player();
    p.start();
    assert_eq!(p.renderer().chapter_banner.as_deref(), Some("One"));
    p.advance(3_000);
    assert!(p.renderer().chapter_banner.is_none());

    step(&mut p);
    step(&mut p);
    p.select_choice(0);
    assert_eq!(p.state().chapter, 2);
    assert_eq!(p.renderer().chapter_banner.as_deref(), Some("Two"));
}

#[test]
fn silent_host_still_plays() {
    let mut p: Player<MemoryStore> = NovelPlayer::builder()
        .story(story())
        .renderer(HeadlessRenderer::new())
        .store(MemoryStore::new())
        .audio_host(UnsupportedHost)
        .build()
        .unwrap();
    p.start();
    assert_eq!(p.audio().status(), AudioStatus::Unsupported);
    step(&mut p);
    step(&mut p);
    assert_eq!(p.phase(), Phase::Choosing);
}

#[test]
fn volumes_reach_audio_engine() {
    let mut p = player();
    p.set_bgm_volume(10);
    p.set_sfx_volume(150);
    p.start();
    assert_eq!(p.audio().bgm_volume(), 10);
    assert_eq!(p.audio().sfx_volume(), 100);
    assert!((p.audio().bgm_gain().unwrap() - 0.1).abs() < 1e-6);
}

// --- configuration ---

#[test]
fn config_file_sets_timings_and_keys() {
    let mut p: Player<MemoryStore> = NovelPlayer::builder()
        .story_file(STORY)
        .config_file("tests/fixtures/test_config.ron")
        .renderer(HeadlessRenderer::new())
        .store(MemoryStore::new())
        .build()
        .unwrap();
    assert_eq!(p.config().type_interval_ms, 10);
    assert_eq!(p.config().auto_delay_ms, 500);
    assert_eq!(p.config().toast_ms, PlayerConfig::default().toast_ms);

    p.start();
    p.advance(30);
    assert_eq!(p.renderer().dialogue, "abc");

    p.save();
    assert!(p.store().get("testSave").is_some());
    assert!(p.store().get("novelSave").is_none());
}

#[test]
fn unreadable_endings_list_is_left_alone() {
    let mut store = MemoryStore::new();
    store.set("novelEndings", r#"["e0","e9""#).unwrap();
    let mut p = player_with(store);
    play_to_ending(&mut p);
    assert_eq!(p.phase(), Phase::Ending);
    assert_eq!(p.store().get("novelEndings").as_deref(), Some(r#"["e0","e9""#));
}
