//! Playback clock for the preview timeline.
//!
//! The clock integrates measured wall-clock deltas between ticks (never a
//! fixed step), clamps the playhead into `[0, total]`, and publishes the
//! resolved scene index edge-triggered: listeners hear about index changes,
//! not every frame. Timestamps are injected so hosts can drive it from any
//! frame source and tests can drive it deterministically.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::Timeline;

/// What the clock does when playback reaches the end of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndBehavior {
    /// Pause and rewind to 0.
    #[default]
    Stop,
    /// Wrap around and keep playing.
    Loop,
    /// Pause with the playhead left at the end.
    Hold,
}

/// Snapshot of the clock. Only [`TimelineClock`] mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Seconds from the start of the timeline, always within `[0, total]`.
    pub current_time: f64,
    pub is_playing: bool,
    /// User is dragging the playhead; autonomous advancement is suspended.
    pub is_seeking: bool,
    pub current_scene_index: usize,
}

type SceneListener = Box<dyn FnMut(usize)>;
type TimeListener = Box<dyn FnMut(f64)>;

pub struct TimelineClock {
    timeline: Timeline,
    end_behavior: EndBehavior,
    state: PlaybackState,
    /// Timestamp of the previous tick while playing; None until the first
    /// tick after play/resume establishes a baseline.
    last_tick: Option<Instant>,
    /// Last index handed to the scene listener.
    published_scene: Option<usize>,
    on_scene_change: Option<SceneListener>,
    on_time: Option<TimeListener>,
}

impl fmt::Debug for TimelineClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineClock")
            .field("scenes", &self.timeline.len())
            .field("total", &self.timeline.total())
            .field("end_behavior", &self.end_behavior)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TimelineClock {
    /// Create a paused clock at time 0. An empty timeline is valid: the clock
    /// stays paused at 0 forever.
    pub fn new(timeline: Timeline, end_behavior: EndBehavior) -> Self {
        let published_scene = if timeline.is_empty() { None } else { Some(0) };
        Self {
            timeline,
            end_behavior,
            state: PlaybackState::default(),
            last_tick: None,
            published_scene,
            on_scene_change: None,
            on_time: None,
        }
    }

    /// Register the scene-change listener (replaces any previous one).
    pub fn on_scene_change(&mut self, f: impl FnMut(usize) + 'static) {
        self.on_scene_change = Some(Box::new(f));
    }

    /// Register the time listener, fired whenever the playhead moves,
    /// including every step of a drag.
    pub fn on_time(&mut self, f: impl FnMut(f64) + 'static) {
        self.on_time = Some(Box::new(f));
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn total(&self) -> f64 {
        self.timeline.total()
    }

    pub fn end_behavior(&self) -> EndBehavior {
        self.end_behavior
    }

    pub fn set_end_behavior(&mut self, end_behavior: EndBehavior) {
        self.end_behavior = end_behavior;
    }

    /// Start playing. Returns false (and stays paused) for an empty timeline
    /// or while the user is dragging.
    pub fn play(&mut self) -> bool {
        if self.timeline.is_empty() || self.state.is_seeking {
            return false;
        }
        if self.state.current_time >= self.total() {
            // Held at the end: playing again starts over.
            self.state.current_time = 0.0;
            self.emit_time();
            self.publish_scene_if_changed();
        }
        self.state.is_playing = true;
        self.last_tick = None;
        true
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
        self.last_tick = None;
    }

    pub fn toggle_play(&mut self) -> bool {
        if self.state.is_playing {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    /// Advance by the wall-clock delta since the previous tick.
    ///
    /// The first tick after play establishes the baseline and does not move
    /// the playhead. Ticks while paused or seeking are ignored.
    pub fn tick(&mut self, now: Instant) {
        if !self.state.is_playing || self.state.is_seeking {
            return;
        }
        let Some(prev) = self.last_tick.replace(now) else {
            return;
        };
        let dt = now.saturating_duration_since(prev).as_secs_f64();
        if dt > 0.0 {
            self.advance(dt);
        }
    }

    fn advance(&mut self, dt: f64) {
        let total = self.total();
        let next = self.state.current_time + dt;
        if next < total {
            self.state.current_time = next;
        } else {
            match self.end_behavior {
                EndBehavior::Stop => {
                    tracing::debug!(total, "end of timeline, rewinding");
                    self.state.current_time = 0.0;
                    self.pause();
                }
                EndBehavior::Hold => {
                    self.state.current_time = total;
                    self.pause();
                }
                EndBehavior::Loop => {
                    self.state.current_time = next % total;
                }
            }
        }
        self.emit_time();
        self.publish_scene_if_changed();
    }

    /// The user grabbed the playhead. Playback pauses and ticks stop moving
    /// the playhead until [`end_seek`](Self::end_seek).
    pub fn begin_seek(&mut self) {
        self.state.is_seeking = true;
        self.pause();
    }

    /// Move the playhead to `time` (clamped into range).
    ///
    /// During a drag only the time listener fires; the scene index is held
    /// back until the drag ends. Outside a drag this is a discrete seek and
    /// the scene listener fires if the index changed.
    pub fn seek_to(&mut self, time: f64) {
        if time.is_nan() {
            tracing::warn!("ignoring seek to NaN");
            return;
        }
        self.state.current_time = time.clamp(0.0, self.total());
        self.emit_time();
        if !self.state.is_seeking {
            self.publish_scene_if_changed();
        }
    }

    /// The drag ended: resolve once from the final time and notify only if
    /// the index differs from the last published one.
    pub fn end_seek(&mut self) {
        if !self.state.is_seeking {
            return;
        }
        self.state.is_seeking = false;
        self.publish_scene_if_changed();
    }

    pub fn next_scene(&mut self) {
        if let Some(idx) = self.timeline.scene_at(self.state.current_time) {
            self.jump_to_scene(idx + 1);
        }
    }

    pub fn previous_scene(&mut self) {
        if let Some(idx) = self.timeline.scene_at(self.state.current_time) {
            self.jump_to_scene(idx.saturating_sub(1));
        }
    }

    /// Jump to the start of scene `index` (clamped) and publish it
    /// immediately, even if it is the same index as before.
    pub fn jump_to_scene(&mut self, index: usize) {
        if self.timeline.is_empty() {
            return;
        }
        let index = index.min(self.timeline.len() - 1);
        self.state.current_time = self.timeline.scene_start(index);
        self.emit_time();
        self.publish_scene(index);
    }

    pub fn jump_to_start(&mut self) {
        self.jump_to_scene(0);
    }

    /// Move to the very end and pause; there is nothing left to play.
    pub fn jump_to_end(&mut self) {
        if self.timeline.is_empty() {
            return;
        }
        self.pause();
        self.state.current_time = self.total();
        self.emit_time();
        self.publish_scene(self.timeline.len() - 1);
    }

    fn emit_time(&mut self) {
        let time = self.state.current_time;
        if let Some(cb) = self.on_time.as_mut() {
            cb(time);
        }
    }

    fn publish_scene(&mut self, index: usize) {
        self.state.current_scene_index = index;
        self.published_scene = Some(index);
        if let Some(cb) = self.on_scene_change.as_mut() {
            cb(index);
        }
    }

    fn publish_scene_if_changed(&mut self) {
        let Some(index) = self.timeline.scene_at(self.state.current_time) else {
            return;
        };
        if self.published_scene == Some(index) {
            self.state.current_scene_index = index;
            return;
        }
        self.publish_scene(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::tests::scene;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn clock(durations: &[f64], end: EndBehavior) -> TimelineClock {
        let scenes = durations.iter().map(|d| scene(*d)).collect();
        TimelineClock::new(Timeline::new(scenes).unwrap(), end)
    }

    fn record_scenes(c: &mut TimelineClock) -> Rc<RefCell<Vec<usize>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        c.on_scene_change(move |i| sink.borrow_mut().push(i));
        seen
    }

    fn record_times(c: &mut TimelineClock) -> Rc<RefCell<Vec<f64>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        c.on_time(move |t| sink.borrow_mut().push(t));
        seen
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_paused_at_zero() {
        let c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let s = c.state();
        assert_eq!(s.current_time, 0.0);
        assert!(!s.is_playing);
        assert!(!s.is_seeking);
        assert_eq!(s.current_scene_index, 0);
    }

    #[test]
    fn advances_by_measured_delta() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let t0 = Instant::now();
        assert!(c.play());
        c.tick(t0);
        assert_eq!(c.state().current_time, 0.0);
        // Irregular frame cadence.
        c.tick(t0 + ms(16));
        c.tick(t0 + ms(50));
        c.tick(t0 + ms(1_250));
        assert!((c.state().current_time - 1.25).abs() < 1e-9);
    }

    #[test]
    fn huge_delta_never_overshoots_total() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let t0 = Instant::now();
        c.play();
        c.tick(t0);
        c.tick(t0 + Duration::from_secs(3_600));
        let s = c.state();
        assert_eq!(s.current_time, 0.0);
        assert!(!s.is_playing);
        assert_eq!(s.current_scene_index, 0);

        let mut held = clock(&[5.0, 3.0, 2.0], EndBehavior::Hold);
        held.play();
        held.tick(t0);
        held.tick(t0 + Duration::from_secs(3_600));
        assert_eq!(held.state().current_time, 10.0);
        assert!(!held.state().is_playing);
        assert_eq!(held.state().current_scene_index, 2);
    }

    #[test]
    fn current_time_stays_in_range_for_any_delta() {
        for end in [EndBehavior::Stop, EndBehavior::Loop, EndBehavior::Hold] {
            let mut c = clock(&[5.0, 3.0, 2.0], end);
            let t0 = Instant::now();
            c.play();
            c.tick(t0);
            let mut now = t0;
            for step in [1u64, 7_000, 3, 250_000, 9_999, 10_000, 42] {
                now += ms(step);
                c.tick(now);
                let t = c.state().current_time;
                assert!((0.0..=10.0).contains(&t), "{end:?}: {t} out of range");
                if !c.state().is_playing {
                    c.play();
                    c.tick(now);
                }
            }
        }
    }

    #[test]
    fn loop_wraps_and_keeps_playing() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Loop);
        let t0 = Instant::now();
        c.play();
        c.tick(t0);
        c.tick(t0 + ms(12_500));
        let s = c.state();
        assert!(s.is_playing);
        assert!((s.current_time - 2.5).abs() < 1e-9);
        assert_eq!(s.current_scene_index, 0);
    }

    #[test]
    fn scene_change_fires_once_per_transition_during_play() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let seen = record_scenes(&mut c);
        let t0 = Instant::now();
        c.play();
        c.tick(t0);
        // ~60fps up to just before the end.
        for frame in 1..=620u64 {
            c.tick(t0 + ms(frame * 16));
        }
        assert!(c.state().is_playing);
        assert_eq!(*seen.borrow(), vec![1, 2]);

        // Running off the end rewinds, which is one more transition.
        c.tick(t0 + ms(10_500));
        assert_eq!(*seen.borrow(), vec![1, 2, 0]);
    }

    #[test]
    fn ticks_do_not_move_playhead_while_seeking() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let t0 = Instant::now();
        c.play();
        c.tick(t0);
        c.tick(t0 + ms(1_000));
        c.begin_seek();
        c.seek_to(6.0);
        c.tick(t0 + ms(2_000));
        c.tick(t0 + ms(3_000));
        assert_eq!(c.state().current_time, 6.0);
        assert!(c.state().is_seeking);
        assert!(!c.play(), "play is refused mid-drag");
        c.seek_to(7.0);
        assert_eq!(c.state().current_time, 7.0);
    }

    #[test]
    fn drag_publishes_time_continuously_and_scene_once() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let scenes = record_scenes(&mut c);
        let times = record_times(&mut c);
        c.begin_seek();
        for t in [1.0, 4.0, 6.0, 9.0, 7.0] {
            c.seek_to(t);
        }
        assert!(scenes.borrow().is_empty());
        assert_eq!(*times.borrow(), vec![1.0, 4.0, 6.0, 9.0, 7.0]);
        assert_eq!(c.state().current_scene_index, 0);
        c.end_seek();
        assert_eq!(*scenes.borrow(), vec![1]);
        assert_eq!(c.state().current_scene_index, 1);
        assert!(!c.state().is_seeking);
    }

    #[test]
    fn drag_ending_in_same_scene_is_silent() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let scenes = record_scenes(&mut c);
        c.begin_seek();
        c.seek_to(9.0);
        c.seek_to(2.0);
        c.end_seek();
        assert!(scenes.borrow().is_empty());
    }

    #[test]
    fn seek_clamps_into_range() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        c.seek_to(-3.0);
        assert_eq!(c.state().current_time, 0.0);
        c.seek_to(99.0);
        assert_eq!(c.state().current_time, 10.0);
        assert_eq!(c.state().current_scene_index, 2);
        c.seek_to(f64::NAN);
        assert_eq!(c.state().current_time, 10.0);
    }

    #[test]
    fn navigation_publishes_immediately() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let scenes = record_scenes(&mut c);
        c.next_scene();
        assert_eq!(c.state().current_time, 5.0);
        c.next_scene();
        c.next_scene();
        assert_eq!(c.state().current_time, 8.0);
        c.previous_scene();
        assert_eq!(c.state().current_time, 5.0);
        c.jump_to_start();
        c.previous_scene();
        // Explicit actions publish even when the index did not change.
        assert_eq!(*scenes.borrow(), vec![1, 2, 2, 1, 0, 0]);
    }

    #[test]
    fn jump_to_end_pauses_on_last_scene() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let scenes = record_scenes(&mut c);
        c.play();
        c.jump_to_end();
        let s = c.state();
        assert_eq!(s.current_time, 10.0);
        assert!(!s.is_playing);
        assert_eq!(*scenes.borrow(), vec![2]);
        // Playing from the end starts over.
        assert!(c.play());
        assert_eq!(c.state().current_time, 0.0);
        assert_eq!(*scenes.borrow(), vec![2, 0]);
    }

    #[test]
    fn resume_after_pause_does_not_count_paused_time() {
        let mut c = clock(&[5.0, 3.0, 2.0], EndBehavior::Stop);
        let t0 = Instant::now();
        c.play();
        c.tick(t0);
        c.tick(t0 + ms(1_000));
        c.pause();
        c.tick(t0 + ms(4_000));
        c.play();
        c.tick(t0 + ms(5_000));
        c.tick(t0 + ms(5_500));
        assert!((c.state().current_time - 1.5).abs() < 1e-9);
    }

    #[test]
    fn empty_timeline_stays_paused_at_zero() {
        let mut c = TimelineClock::new(Timeline::empty(), EndBehavior::Loop);
        let scenes = record_scenes(&mut c);
        assert!(!c.play());
        let t0 = Instant::now();
        c.tick(t0);
        c.tick(t0 + ms(500));
        c.next_scene();
        c.jump_to_end();
        c.seek_to(4.0);
        let s = c.state();
        assert_eq!(s.current_time, 0.0);
        assert!(!s.is_playing);
        assert!(scenes.borrow().is_empty());
    }
}
