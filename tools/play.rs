/// Play — interactive terminal player for testing stories.
///
/// Usage: play [--story <path>] [--config <path>] [--save-dir <dir>] [--mute]
///
/// Commands:
///   (empty line) / next   — advance (skips the reveal if still typing)
///   prev                  — rewind one line
///   choose <n>            — pick choice n (1-based)
///   log / hide            — show or hide the dialogue log
///   jump <n>              — jump to log entry n (1-based)
///   save / load           — write or restore the save slot
///   auto                  — toggle autoplay
///   wait <ms>             — let time pass (muted mode only)
///   volume <bgm|sfx> <v>  — set a volume, 0-100
///   start / title         — new game / back to title
///   endings               — list unlocked endings
///   help                  — list commands
///   quit                  — exit
///
/// Built with the `device` feature the player runs on the wall clock and
/// plays its ambience and effects on the default output. Without it, or
/// with `--mute`, time only moves on commands and `wait`.
///
/// Set RUST_LOG=debug to see transitions.

use novel_player::audio::host::{AudioHost, OfflineHost};
use novel_player::core::config::PlayerConfig;
use novel_player::core::renderer::{HeadlessRenderer, View};
use novel_player::core::storage::FileStore;
use novel_player::{NovelPlayer, Phase};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

type Player = NovelPlayer<HeadlessRenderer, FileStore>;

/// Sample rate for the muted host; nobody listens, so keep it cheap.
const MUTED_RATE: u32 = 8_000;

/// How a command left the screen.
enum Flow {
    Redraw,
    Stay,
    Quit,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut story_path = "story_data/demo/story.ron".to_string();
    let mut config_path = None;
    let mut save_dir = ".novel_save".to_string();
    let mut mute = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--story" if i + 1 < args.len() => {
                i += 1;
                story_path = args[i].clone();
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--save-dir" if i + 1 < args.len() => {
                i += 1;
                save_dir = args[i].clone();
            }
            "--mute" => mute = true,
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let store = match FileStore::open(&save_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("ERROR: cannot open save dir '{}': {}", save_dir, e);
            process::exit(1);
        }
    };

    let config = match config_path {
        Some(ref path) => match PlayerConfig::load_from_ron(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => PlayerConfig::default(),
    };

    let realtime = cfg!(feature = "device") && !mute;

    let mut player: Player = match NovelPlayer::builder()
        .story_file(&story_path)
        .config(config)
        .renderer(HeadlessRenderer::new())
        .store(store)
        .audio_host(output_host(realtime))
        .build()
    {
        Ok(player) => player,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    println!("Story: {} ({} scenes)", story_path, player.story().scenes.len());
    println!("Type 'help' for commands.\n");
    print_screen(&player);

    if realtime {
        run_realtime(&mut player);
    } else {
        run_stepped(&mut player);
    }
}

#[cfg(feature = "device")]
fn output_host(realtime: bool) -> Box<dyn AudioHost> {
    if realtime {
        Box::new(novel_player::audio::device::DeviceHost::default())
    } else {
        Box::new(OfflineHost::new(MUTED_RATE))
    }
}

#[cfg(not(feature = "device"))]
fn output_host(_realtime: bool) -> Box<dyn AudioHost> {
    Box::new(OfflineHost::new(MUTED_RATE))
}

/// Time moves only when a command or `wait` moves it.
fn run_stepped(player: &mut Player) {
    let stdin = io::stdin();
    loop {
        prompt();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match run_command(player, &line, false) {
            Flow::Quit => break,
            Flow::Stay => {}
            Flow::Redraw => {
                finish_reveal(player);
                print_screen(player);
            }
        }
    }
}

#[cfg(not(feature = "device"))]
fn run_realtime(player: &mut Player) {
    run_stepped(player);
}

/// Time follows the wall clock: lines type themselves out, autoplay and
/// endings fire on their own, and audio streams to the device.
#[cfg(feature = "device")]
fn run_realtime(player: &mut Player) {
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;
    use std::time::{Duration, Instant};

    const TICK: Duration = Duration::from_millis(20);

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut clock = Instant::now();
    let mut catch_up = |player: &mut Player| {
        let elapsed = clock.elapsed().as_millis() as u64;
        if elapsed > 0 {
            player.advance(elapsed);
            clock += Duration::from_millis(elapsed);
        }
    };

    let mut shown = screen_key(player);
    prompt();
    loop {
        match rx.recv_timeout(TICK) {
            Ok(line) => {
                catch_up(player);
                match run_command(player, &line, true) {
                    Flow::Quit => break,
                    Flow::Redraw => print_screen(player),
                    Flow::Stay => {}
                }
                shown = screen_key(player);
                prompt();
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        catch_up(player);
        // Redraw once a line has finished typing or a timer changed the view.
        let key = screen_key(player);
        if key != shown && !player.is_typing() {
            print_screen(player);
            prompt();
            shown = key;
        }
    }
}

#[cfg(feature = "device")]
fn screen_key(player: &Player) -> (Phase, View, String, bool) {
    let screen = player.renderer();
    (
        player.phase(),
        screen.view,
        screen.dialogue.clone(),
        screen.choices.is_some(),
    )
}

fn prompt() {
    print!("play> ");
    io::stdout().flush().ok();
}

fn run_command(player: &mut Player, line: &str, realtime: bool) -> Flow {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let cmd = parts.first().map(|c| c.to_lowercase()).unwrap_or_default();

    match cmd.as_str() {
        "quit" | "exit" | "q" => {
            println!("Goodbye.");
            return Flow::Quit;
        }
        "help" | "h" | "?" => {
            print_usage();
            return Flow::Stay;
        }
        "" | "next" | "n" => {
            if player.phase() == Phase::Title {
                player.start();
            } else {
                player.next();
            }
        }
        "prev" | "p" => player.prev(),
        "start" => player.start(),
        "title" => player.to_title(),
        "save" => player.save(),
        "load" => player.load(),
        "auto" => player.toggle_auto(),
        "log" => player.show_log(),
        "hide" => player.hide_log(),
        "choose" | "c" => match parse_index(parts.get(1)) {
            Some(idx) => player.select_choice(idx),
            None => {
                println!("Usage: choose <n>");
                return Flow::Stay;
            }
        },
        "jump" => match parse_index(parts.get(1)) {
            Some(idx) => player.jump_to_log(idx),
            None => {
                println!("Usage: jump <n>");
                return Flow::Stay;
            }
        },
        "wait" | "w" if realtime => {
            println!("Time runs on its own here; 'wait' is for --mute.");
            return Flow::Stay;
        }
        "wait" | "w" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
            Some(ms) => player.advance(ms),
            None => {
                println!("Usage: wait <ms>");
                return Flow::Stay;
            }
        },
        "volume" | "vol" => {
            let value = parts.get(2).and_then(|s| s.parse::<u8>().ok());
            match (parts.get(1).copied(), value) {
                (Some("bgm"), Some(v)) => player.set_bgm_volume(v),
                (Some("sfx"), Some(v)) => player.set_sfx_volume(v),
                _ => {
                    println!("Usage: volume <bgm|sfx> <0-100>");
                    return Flow::Stay;
                }
            }
            println!(
                "bgm {} / sfx {}",
                player.audio().bgm_volume(),
                player.audio().sfx_volume()
            );
            return Flow::Stay;
        }
        "endings" => {
            let endings = player.unlocked_endings();
            if endings.is_empty() {
                println!("No endings unlocked yet.");
            }
            for id in endings {
                let title = player.story().ending(&id).map_or("?", |e| e.title.as_str());
                println!("  {}: {}", id, title);
            }
            return Flow::Stay;
        }
        other => {
            println!("Unknown command: {}. Type 'help' for commands.", other);
            return Flow::Stay;
        }
    }

    Flow::Redraw
}

/// Run the clock until the current line is fully revealed.
fn finish_reveal(player: &mut Player) {
    let step = player.config().type_interval_ms.max(1);
    while player.is_typing() {
        player.advance(step);
    }
}

/// Parse a 1-based index argument.
fn parse_index(arg: Option<&&str>) -> Option<usize> {
    arg.and_then(|s| s.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
}

fn print_screen(player: &Player) {
    let screen = player.renderer();
    println!();
    match screen.view {
        View::Title => {
            println!("[ TITLE ]  start | {}", if screen.continue_enabled { "load" } else { "(no save)" });
        }
        View::Ending => {
            if let Some(ref ending) = screen.ending {
                println!("[ ENDING ] {}", ending.title);
                println!("           {}", ending.subtitle);
                println!("           \"{}\"", ending.quote);
            }
        }
        View::Game => {
            if let Some(ref banner) = screen.chapter_banner {
                println!("~~ {} ~~", banner);
            }
            if let Some(ref speaker) = screen.speaker {
                println!("{}:", speaker);
            }
            println!("  {}", screen.dialogue);
            if let Some(ref choices) = screen.choices {
                for (i, choice) in choices.iter().enumerate() {
                    println!("  [{}] {}", i + 1, choice.text);
                }
            } else if screen.continue_visible {
                println!("  ▼");
            }
            if screen.auto_indicator {
                println!("  (auto)");
            }
            if player.phase() == Phase::EndingPending {
                println!("  ... (wait for the ending)");
            }
        }
    }
    if let Some(ref log) = screen.log {
        println!("--- log ---");
        for (i, entry) in log.iter().enumerate() {
            let marker = if player.history().cursor() == Some(i) { ">" } else { " " };
            match entry.speaker {
                Some(ref speaker) => println!("{}{:>3}. {}: {}", marker, i + 1, speaker, entry.text),
                None => println!("{}{:>3}. {}", marker, i + 1, entry.text),
            }
        }
        println!("--- end ---");
    }
    if let Some(ref toast) = screen.toast {
        println!("  <{}>", toast);
    }
    if let Some(preset) = player.audio().current_ambient() {
        println!("  ♪ {}", preset);
    }
    println!();
}

fn print_usage() {
    println!("Usage: play [--story <path>] [--config <path>] [--save-dir <dir>] [--mute]");
    println!();
    println!("Commands:");
    println!("  (enter) / next        advance");
    println!("  prev                  rewind one line");
    println!("  choose <n>            pick choice n");
    println!("  log / hide            show or hide the dialogue log");
    println!("  jump <n>              jump to log entry n");
    println!("  save / load           write or restore the save slot");
    println!("  auto                  toggle autoplay");
    println!("  wait <ms>             let time pass (muted mode)");
    println!("  volume <bgm|sfx> <v>  set a volume, 0-100");
    println!("  start / title         new game / back to title");
    println!("  endings               list unlocked endings");
    println!("  quit                  exit");
}
