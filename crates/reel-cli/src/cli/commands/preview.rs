//! `reel preview` – play a script's timeline in the terminal.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use reel_core::config::ReelConfig;
use reel_core::store::{Action, Store};
use reel_core::timeline::{EndBehavior, Timeline, TimelineClock};

use super::load_script;

const FRAME: Duration = Duration::from_millis(50);

pub async fn run_preview(cfg: &ReelConfig, script_path: &Path, from: f64) -> Result<()> {
    let script = load_script(script_path)?;
    let timeline = Timeline::from_script(&script).context("script has an unplayable scene")?;
    if timeline.is_empty() {
        println!("script has no scenes");
        return Ok(());
    }
    let from = start_offset(from, timeline.total())?;
    let mut store = Store::new();
    store.dispatch(Action::ScriptLoaded(script));

    println!("{} scenes, {:.1}s", timeline.len(), timeline.total());
    let scenes = timeline.scenes().to_vec();
    let mut clock = TimelineClock::new(timeline, cfg.end_of_timeline);
    clock.on_scene_change(move |index| {
        if let Some(scene) = scenes.get(index) {
            println!("[{:>2}] {:>5.1}s  {}", index, scene.duration, scene.content.text);
        }
    });

    let start = clock.timeline().scene_at(from).unwrap_or(0);
    clock.jump_to_scene(start);
    clock.seek_to(from);
    clock.play();

    let mut frames = tokio::time::interval(FRAME);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = frames.tick() => {
                clock.tick(Instant::now());
                store.dispatch(Action::PlaybackChanged(clock.state()));
                if !clock.state().is_playing {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                clock.pause();
                break;
            }
        }
    }

    let state = store.state().playback;
    match cfg.end_of_timeline {
        EndBehavior::Hold | EndBehavior::Loop => {
            println!("stopped at {:.1}s", state.current_time)
        }
        EndBehavior::Stop => println!("done"),
    }
    Ok(())
}

/// Validate `--from`. Playing from the very end would rewind to 0, so the
/// offset must lie strictly before it.
fn start_offset(from: f64, total: f64) -> Result<f64> {
    if !from.is_finite() || from < 0.0 || from >= total {
        bail!("--from must be in 0..{total:.1} seconds, got {from}");
    }
    Ok(from)
}
