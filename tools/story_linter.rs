/// Story Linter — validates story graphs before they ship.
///
/// Usage: story_linter <story.ron | story_dir> [--strict]
///
/// Broken references are errors. Dead ends, ambiguous continuations, empty
/// scenes, unlabeled chapters, unreachable scenes and unused endings are
/// warnings; `--strict` makes warnings fail the run too.

use novel_player::schema::story::{Continuation, Story};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story.ron | story_dir> [--strict]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let strict = args[2..].iter().any(|a| a == "--strict");

    let files = if target.is_file() {
        vec![target.to_path_buf()]
    } else if target.is_dir() {
        let mut files = Vec::new();
        collect_ron_files(target, &mut files);
        files.sort();
        files
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    };

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for path in &files {
        let story = match Story::load_from_ron(path) {
            Ok(story) => story,
            Err(e) => {
                println!("ERROR: {}: failed to load: {}", path.display(), e);
                total_errors += 1;
                continue;
            }
        };

        let (errors, warnings) = lint_story(&story);

        println!("\n=== {} ===", path.display());
        println!(
            "{} scenes, {} endings, {} chapters\n",
            story.scenes.len(),
            story.endings.len(),
            story.chapters.len()
        );

        if errors.is_empty() && warnings.is_empty() {
            println!("All checks passed!");
        }
        for warning in &warnings {
            println!("WARNING: {}", warning);
        }
        for error in &errors {
            println!("ERROR: {}", error);
        }

        total_errors += errors.len();
        total_warnings += warnings.len();
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        total_errors,
        total_warnings
    );

    if total_errors > 0 || (strict && total_warnings > 0) {
        process::exit(1);
    }
}

fn lint_story(story: &Story) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for issue in story.validate() {
        if issue.is_error() {
            errors.push(issue.to_string());
        } else {
            warnings.push(issue.to_string());
        }
    }

    let mut unreachable: Vec<&str> = {
        let reached = reachable_scenes(story);
        story
            .scenes
            .keys()
            .map(String::as_str)
            .filter(|id| !reached.contains(id))
            .collect()
    };
    unreachable.sort_unstable();
    for id in unreachable {
        warnings.push(format!("scene '{}' is unreachable from '{}'", id, story.start));
    }

    let mut unused: Vec<&str> = {
        let targeted: FxHashSet<&str> = story
            .scenes
            .values()
            .filter_map(|s| s.ending.as_deref())
            .collect();
        story
            .endings
            .keys()
            .map(String::as_str)
            .filter(|id| !targeted.contains(id))
            .collect()
    };
    unused.sort_unstable();
    for id in unused {
        warnings.push(format!("ending '{}' is never reached", id));
    }

    (errors, warnings)
}

/// Scenes reachable from the start by following the continuation the
/// player would actually take.
fn reachable_scenes(story: &Story) -> FxHashSet<&str> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![story.start.as_str()];

    while let Some(id) = stack.pop() {
        let Some(scene) = story.scene(id) else {
            continue;
        };
        if !seen.insert(scene.id.as_str()) {
            continue;
        }
        match scene.continuation() {
            Continuation::Choices(choices) => {
                stack.extend(choices.iter().map(|c| c.next.as_str()));
            }
            Continuation::Next(next) => stack.push(next),
            Continuation::Ending(_) | Continuation::Stop => {}
        }
    }

    seen
}

fn collect_ron_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_ron_files(&path, files);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                files.push(path);
            }
        }
    }
}
