use std::fmt;
use std::sync::Arc;

use crate::assets::skeletal::SkeletalClip;
use crate::callbacks::CallbackRef;

/// How the scripting layer asked a clip to repeat. Playback itself is driven
/// by the play count; the mode is kept for callers that inspect the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    NoRepeat,
    #[default]
    Repeat,
    Yoyo,
    Reverse,
    ReverseRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayDirection {
    #[default]
    Forward,
    Reverse,
}

impl PlayDirection {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            PlayDirection::Reverse
        } else {
            PlayDirection::Forward
        }
    }

    pub fn speed(self) -> f32 {
        match self {
            PlayDirection::Forward => 1.0,
            PlayDirection::Reverse => -1.0,
        }
    }
}

/// A request to play one clip.
#[derive(Debug, Clone)]
pub struct AnimationDescriptor {
    pub clip_id: String,
    pub repeat: RepeatMode,
    /// Negative means loop forever.
    pub play_count: i32,
    pub direction: PlayDirection,
    pub on_complete: Option<CallbackRef>,
}

impl AnimationDescriptor {
    pub fn new(clip_id: impl Into<String>) -> Self {
        Self {
            clip_id: clip_id.into(),
            repeat: RepeatMode::default(),
            play_count: 1,
            direction: PlayDirection::Forward,
            on_complete: None,
        }
    }

    pub fn repeat(mut self, repeat: RepeatMode) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn count(mut self, play_count: i32) -> Self {
        self.play_count = play_count;
        self
    }

    pub fn reversed(mut self, reverse: bool) -> Self {
        self.direction = PlayDirection::from_reverse(reverse);
        self
    }

    pub fn on_complete(mut self, callback: Option<CallbackRef>) -> Self {
        self.on_complete = callback;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Playing,
    FinishedPendingCallback,
    /// Finished with nothing left to dispatch; the last pose is held.
    Holding,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriverState::Idle => "idle",
            DriverState::Playing => "playing",
            DriverState::FinishedPendingCallback => "finished (callback pending)",
            DriverState::Holding => "holding",
        };
        f.write_str(label)
    }
}

/// What happened to the playhead during one advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverSignal {
    Advanced,
    Looped,
    Ended,
}

struct ActiveClip {
    clip: Arc<SkeletalClip>,
    repeat: RepeatMode,
    direction: PlayDirection,
    remaining: i32,
    time: f32,
}

/// Single-clip playback state machine.
///
/// Completion never runs a callback: it only marks the stored callback as
/// pending, and the owner drains it with [`AnimationDriver::take_pending`] at
/// the start of its next update.
#[derive(Default)]
pub struct AnimationDriver {
    active: Option<ActiveClip>,
    callback: Option<CallbackRef>,
    pending: bool,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `clip`, discarding whatever was playing and its callback.
    pub fn play(&mut self, clip: Arc<SkeletalClip>, descriptor: AnimationDescriptor) {
        let time = match descriptor.direction {
            PlayDirection::Forward => 0.0,
            PlayDirection::Reverse => clip.duration,
        };
        self.active = Some(ActiveClip {
            clip,
            repeat: descriptor.repeat,
            direction: descriptor.direction,
            remaining: descriptor.play_count,
            time,
        });
        self.callback = descriptor.on_complete;
        self.pending = false;
    }

    pub fn state(&self) -> DriverState {
        if self.pending {
            return DriverState::FinishedPendingCallback;
        }
        match &self.active {
            None => DriverState::Idle,
            Some(active) if active.remaining != 0 => DriverState::Playing,
            Some(_) => DriverState::Holding,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.as_ref().map(|active| active.remaining != 0).unwrap_or(false)
    }

    pub fn current_clip(&self) -> Option<&Arc<SkeletalClip>> {
        self.active.as_ref().map(|active| &active.clip)
    }

    pub fn current_clip_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.clip.name.as_ref())
    }

    pub fn time(&self) -> f32 {
        self.active.as_ref().map(|active| active.time).unwrap_or(0.0)
    }

    pub fn remaining(&self) -> Option<i32> {
        self.active.as_ref().map(|active| active.remaining)
    }

    pub fn repeat_mode(&self) -> Option<RepeatMode> {
        self.active.as_ref().map(|active| active.repeat)
    }

    pub fn direction(&self) -> Option<PlayDirection> {
        self.active.as_ref().map(|active| active.direction)
    }

    pub fn callback(&self) -> Option<&CallbackRef> {
        self.callback.as_ref()
    }

    pub fn has_pending_callback(&self) -> bool {
        self.pending
    }

    /// Reinstates a callback read back from a save.
    pub fn restore_callback(&mut self, callback: Option<CallbackRef>, pending: bool) {
        self.pending = pending && callback.is_some();
        self.callback = callback;
    }

    /// Hands over the callback of an animation that finished during an
    /// earlier advance, clearing the pending flag.
    pub fn take_pending(&mut self) -> Option<CallbackRef> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        self.callback.take()
    }

    /// Moves the playhead by `dt` seconds. Returns `None` when nothing is
    /// playing.
    pub fn advance(&mut self, dt: f32) -> Option<DriverSignal> {
        if !dt.is_finite() {
            log::warn!("ignoring non-finite animation step {dt}");
            return None;
        }
        let active = self.active.as_mut()?;
        if active.remaining == 0 {
            return None;
        }
        let duration = active.clip.duration;
        let signal = if duration <= f32::EPSILON {
            if active.remaining < 0 {
                return None;
            }
            active.remaining = 0;
            active.time = 0.0;
            DriverSignal::Ended
        } else {
            active.time += dt * active.direction.speed();
            step_playhead(active, duration)
        };

        if signal == DriverSignal::Ended && self.callback.is_some() {
            self.pending = true;
        }
        Some(signal)
    }
}

fn step_playhead(active: &mut ActiveClip, duration: f32) -> DriverSignal {
    let forward = active.direction == PlayDirection::Forward;
    let crossed = |time: f32| if forward { time > duration } else { time < 0.0 };
    if !crossed(active.time) {
        return DriverSignal::Advanced;
    }
    if active.remaining < 0 {
        active.time = active.time.rem_euclid(duration);
        return DriverSignal::Looped;
    }
    // Whole clip boundaries crossed by this step, at least one.
    let overshoot = if forward { active.time - duration } else { -active.time };
    let crossings = (overshoot / duration).ceil().max(1.0);
    if crossings >= active.remaining as f32 {
        active.remaining = 0;
        active.time = if forward { duration } else { 0.0 };
        return DriverSignal::Ended;
    }
    active.remaining -= crossings as i32;
    let wrapped = if forward { active.time - crossings * duration } else { active.time + crossings * duration };
    active.time = wrapped.clamp(0.0, duration);
    DriverSignal::Looped
}
