//! Script player: paces dispatch against the host frame loop, owns the
//! play/pause state machine, the speed multiplier, and the recorder.
//!
//! Timing is always a relative wait-countdown set at dispatch and
//! decremented per tick, never an absolute deadline, so pausing the
//! player implicitly pauses every pending wait. A tick whose elapsed
//! time overshoots the remaining wait dispatches as many commands as
//! the deficit allows ("catch-up" under slow frame rates).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::queue::{ScriptQueue, Token};

/// Idle seconds after which the recorder synthesizes a pacing line.
pub const RECORD_IDLE_GAP: f64 = 0.1;

/// Fastest playback multiplier (power-of-two steps from 1).
const MAX_MULTIPLIER: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayState {
    None,
    Playing,
    Paused,
}

/// Read-only snapshot handed to the dispatcher while it runs, so
/// handlers can branch on playback state without borrowing the player.
#[derive(Debug, Clone, Copy)]
pub struct PlayerView {
    pub state: PlayState,
    pub multiplier: u32,
}

/// Player mutations requested by a dispatched command. The player
/// applies these itself; collaborator side effects come back to the
/// host as [`SideEffect`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerControl {
    Play,
    End,
    Pause,
    Resume,
    Faster,
    Slower,
    DefaultSpeed,
    Record(PathBuf),
    CancelRecord,
}

/// Collaborator calls the host must make after a player transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    AudioPause,
    AudioResume,
    AudioMute,
    AudioUnmute,
    SimulationTimePause(bool),
    /// Script terminated: queue and loop capture are already cleared;
    /// the host drops conditional state and stops script media.
    ScriptEnded,
}

/// Result of dispatching one command line.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOutcome {
    pub ok: bool,
    /// Seconds the queue must stay idle after this command.
    pub wait: Option<f64>,
    pub control: Option<PlayerControl>,
    /// Whether a recorder should persist this line.
    pub recordable: bool,
    /// Host shutdown requested.
    pub quit: bool,
    pub error: Option<String>,
}

impl ExecuteOutcome {
    pub fn success() -> Self {
        ExecuteOutcome {
            ok: true,
            recordable: true,
            ..Default::default()
        }
    }

    /// Success that a recorder should skip (no-ops, suppressed lines,
    /// `wait` itself, whose pacing is reproduced by synthesized waits).
    pub fn silent() -> Self {
        ExecuteOutcome {
            ok: true,
            ..Default::default()
        }
    }

    pub fn failure(error: String) -> Self {
        ExecuteOutcome {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_wait(mut self, wait: f64) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn with_control(mut self, control: PlayerControl) -> Self {
        self.control = Some(control);
        self
    }
}

/// What one tick did.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub dispatched: usize,
    /// Elapsed seconds scaled by the multiplier, for synchronized
    /// audio/video collaborators.
    pub effective_elapsed: f64,
    pub effects: Vec<SideEffect>,
}

/// Serializable status for reports and the TUI.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatus {
    pub state: PlayState,
    pub multiplier: u32,
    pub wait_remaining: f64,
    pub recording: bool,
}

pub struct Player {
    state: PlayState,
    multiplier: u32,
    wait_remaining: f64,
    idle: f64,
    recorder: Option<Recorder>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Player {
            state: PlayState::None,
            multiplier: 1,
            wait_remaining: 0.0,
            idle: 0.0,
            recorder: None,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            state: self.state,
            multiplier: self.multiplier,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            multiplier: self.multiplier,
            wait_remaining: self.wait_remaining,
            recording: self.recorder.is_some(),
        }
    }

    /// Advance one tick. Dispatches exactly the commands whose
    /// accumulated wait is satisfied, possibly several when the frame
    /// ran long, never any while the countdown is positive.
    pub fn update(
        &mut self,
        elapsed: f64,
        queue: &mut ScriptQueue,
        dispatch: &mut dyn FnMut(&mut ScriptQueue, PlayerView, &Token) -> ExecuteOutcome,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        if self.recorder.is_some() {
            self.idle += elapsed;
        }
        if self.state != PlayState::Playing {
            return report;
        }

        report.effective_elapsed = elapsed * f64::from(self.multiplier);
        self.wait_remaining -= report.effective_elapsed;
        while self.state == PlayState::Playing && self.wait_remaining <= 0.0 {
            let token = queue.get_first();
            queue.note_dispatched(&token);
            let outcome = dispatch(queue, self.view(), &token);
            report.dispatched += 1;
            if let Some(wait) = outcome.wait {
                self.wait_remaining += wait.max(0.0);
            }
            if outcome.ok && outcome.recordable {
                self.record_line(&token.line);
            }
            if let Some(control) = outcome.control {
                self.apply_into(control, queue, &mut report.effects);
            }
        }
        report
    }

    /// Apply a control requested outside a tick (UI, remote command).
    pub fn apply_control(&mut self, control: PlayerControl, queue: &mut ScriptQueue) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        self.apply_into(control, queue, &mut effects);
        effects
    }

    fn apply_into(
        &mut self,
        control: PlayerControl,
        queue: &mut ScriptQueue,
        effects: &mut Vec<SideEffect>,
    ) {
        match control {
            PlayerControl::Play => {
                self.state = PlayState::Playing;
                self.wait_remaining = 0.0;
            }
            PlayerControl::End => {
                // Queue, loop capture, and conditional state go as one
                // step; the host handles the conditional part.
                queue.clear();
                self.wait_remaining = 0.0;
                self.set_multiplier(1, effects);
                if self.state != PlayState::None {
                    self.state = PlayState::None;
                    effects.push(SideEffect::ScriptEnded);
                }
            }
            PlayerControl::Pause => match self.state {
                PlayState::Playing => {
                    self.state = PlayState::Paused;
                    effects.push(SideEffect::AudioPause);
                    effects.push(SideEffect::SimulationTimePause(true));
                }
                _ => log::debug!("script pause ignored; nothing is playing"),
            },
            PlayerControl::Resume => match self.state {
                PlayState::Paused => {
                    self.state = PlayState::Playing;
                    effects.push(SideEffect::AudioResume);
                    effects.push(SideEffect::SimulationTimePause(false));
                }
                _ => log::debug!("script resume ignored; nothing is paused"),
            },
            PlayerControl::Faster => {
                let next = (self.multiplier * 2).min(MAX_MULTIPLIER);
                self.set_multiplier(next, effects);
            }
            PlayerControl::Slower => {
                let next = (self.multiplier / 2).max(1);
                self.set_multiplier(next, effects);
            }
            PlayerControl::DefaultSpeed => self.set_multiplier(1, effects),
            PlayerControl::Record(path) => self.start_recording(&path),
            PlayerControl::CancelRecord => {
                if self.recorder.take().is_none() {
                    log::error!("cancelrecord ignored; no recording in progress");
                }
                self.idle = 0.0;
            }
        }
    }

    /// A multiplier other than 1 mutes the audio channel; returning to
    /// 1 restores it.
    fn set_multiplier(&mut self, next: u32, effects: &mut Vec<SideEffect>) {
        if next == self.multiplier {
            return;
        }
        if self.multiplier == 1 {
            effects.push(SideEffect::AudioMute);
        } else if next == 1 {
            effects.push(SideEffect::AudioUnmute);
        }
        self.multiplier = next;
    }

    fn start_recording(&mut self, path: &Path) {
        match Recorder::create(path) {
            Ok(recorder) => {
                log::info!("recording script to {}", path.display());
                self.recorder = Some(recorder);
                self.idle = 0.0;
            }
            Err(err) => log::error!("cannot record to {}: {err}", path.display()),
        }
    }

    /// Append a successfully dispatched line to the recording, with a
    /// synthesized `wait duration` line when idle time accumulated.
    pub fn record_line(&mut self, line: &str) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if let Err(err) = recorder.record(line, self.idle) {
            log::error!(
                "recording to {} failed: {err}; recording cancelled",
                recorder.path.display()
            );
            self.recorder = None;
        }
        self.idle = 0.0;
    }
}

struct Recorder {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Recorder {
    fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Recorder {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn record(&mut self, line: &str, idle: f64) -> io::Result<()> {
        if idle > RECORD_IDLE_GAP {
            writeln!(self.writer, "wait duration {idle:.2}")?;
        }
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{
        ExecuteOutcome, PlayState, Player, PlayerControl, PlayerView, SideEffect,
    };
    use crate::parser::parse_line;
    use crate::queue::{ScriptQueue, Token, SCRIPT_END_LINE};

    /// Dispatcher stand-in understanding just enough of the surface.
    fn test_dispatch(
        log: &mut Vec<String>,
    ) -> impl FnMut(&mut ScriptQueue, PlayerView, &Token) -> ExecuteOutcome + '_ {
        move |_queue, _view, token| {
            log.push(token.line.clone());
            let parsed = parse_line(&token.line);
            match parsed.name.as_str() {
                "wait" => {
                    let duration: f64 = parsed
                        .args
                        .get("duration")
                        .and_then(|value| value.parse().ok())
                        .unwrap_or(0.0);
                    ExecuteOutcome::silent().with_wait(duration)
                }
                "script" => ExecuteOutcome::silent().with_control(PlayerControl::End),
                _ => ExecuteOutcome::success(),
            }
        }
    }

    fn playing_player() -> Player {
        let mut player = Player::new();
        let mut queue = ScriptQueue::new();
        player.apply_control(PlayerControl::Play, &mut queue);
        player
    }

    #[test]
    fn wait_holds_dispatch_until_countdown_expires() {
        let mut player = playing_player();
        let mut queue = ScriptQueue::new();
        queue.add_first(
            "flag fog on\nwait duration 2\nflag fog off",
            Path::new("."),
        );

        let mut log = Vec::new();
        let mut dispatch = test_dispatch(&mut log);
        let report = player.update(0.5, &mut queue, &mut dispatch);
        assert_eq!(report.dispatched, 2);
        drop(dispatch);
        assert_eq!(log, vec!["flag fog on", "wait duration 2"]);

        // 1.5s of countdown remain; these ticks dispatch nothing.
        for _ in 0..2 {
            let mut dispatch = test_dispatch(&mut log);
            let report = player.update(0.5, &mut queue, &mut dispatch);
            assert_eq!(report.dispatched, 0);
        }

        // The satisfying tick releases the next command.
        let mut dispatch = test_dispatch(&mut log);
        let report = player.update(0.5, &mut queue, &mut dispatch);
        assert!(report.dispatched >= 1);
        drop(dispatch);
        assert!(log.contains(&"flag fog off".to_string()));
    }

    #[test]
    fn slow_frame_catches_up_with_multiple_dispatches() {
        let mut player = playing_player();
        let mut queue = ScriptQueue::new();
        queue.add_first(
            "wait duration 1\nflag fog on\nwait duration 1\nflag fog off",
            Path::new("."),
        );

        let mut log = Vec::new();
        let mut dispatch = test_dispatch(&mut log);
        player.update(5.0, &mut queue, &mut dispatch);
        drop(dispatch);
        // Everything owed dispatches in the single long tick, including
        // the end-of-script sentinel.
        assert_eq!(log.last().map(String::as_str), Some(SCRIPT_END_LINE));
        assert_eq!(player.state(), PlayState::None);
    }

    #[test]
    fn empty_queue_ends_playback_via_the_sentinel() {
        let mut player = playing_player();
        let mut queue = ScriptQueue::new();
        let mut log = Vec::new();
        let mut dispatch = test_dispatch(&mut log);
        let report = player.update(0.1, &mut queue, &mut dispatch);
        drop(dispatch);
        assert_eq!(log, vec![SCRIPT_END_LINE]);
        assert_eq!(player.state(), PlayState::None);
        assert!(report.effects.contains(&SideEffect::ScriptEnded));
    }

    #[test]
    fn paused_player_freezes_pending_waits() {
        let mut player = playing_player();
        let mut queue = ScriptQueue::new();
        queue.add_first("wait duration 1\nflag fog on", Path::new("."));

        let mut log = Vec::new();
        let mut dispatch = test_dispatch(&mut log);
        player.update(0.1, &mut queue, &mut dispatch);
        drop(dispatch);

        let effects = player.apply_control(PlayerControl::Pause, &mut queue);
        assert!(effects.contains(&SideEffect::AudioPause));
        assert!(effects.contains(&SideEffect::SimulationTimePause(true)));

        // An hour of paused ticks must not release the countdown.
        let mut log = Vec::new();
        let mut dispatch = test_dispatch(&mut log);
        for _ in 0..10 {
            let report = player.update(360.0, &mut queue, &mut dispatch);
            assert_eq!(report.dispatched, 0);
        }
        drop(dispatch);
        assert!(log.is_empty());

        let effects = player.apply_control(PlayerControl::Resume, &mut queue);
        assert!(effects.contains(&SideEffect::AudioResume));
        assert!(effects.contains(&SideEffect::SimulationTimePause(false)));
        assert_eq!(player.state(), PlayState::Playing);
    }

    #[test]
    fn multiplier_steps_are_powers_of_two_with_clamps() {
        let mut player = Player::new();
        let mut queue = ScriptQueue::new();

        let effects = player.apply_control(PlayerControl::Faster, &mut queue);
        assert_eq!(player.multiplier(), 2);
        assert!(effects.contains(&SideEffect::AudioMute));

        for _ in 0..5 {
            player.apply_control(PlayerControl::Faster, &mut queue);
        }
        assert_eq!(player.multiplier(), 8);

        player.apply_control(PlayerControl::Slower, &mut queue);
        assert_eq!(player.multiplier(), 4);

        let effects = player.apply_control(PlayerControl::DefaultSpeed, &mut queue);
        assert_eq!(player.multiplier(), 1);
        assert!(effects.contains(&SideEffect::AudioUnmute));

        let effects = player.apply_control(PlayerControl::Slower, &mut queue);
        assert_eq!(player.multiplier(), 1);
        assert!(effects.is_empty());
    }

    #[test]
    fn multiplier_scales_effective_elapsed_time() {
        let mut player = playing_player();
        let mut queue = ScriptQueue::new();
        queue.add_first("wait duration 4\nflag fog on", Path::new("."));
        player.apply_control(PlayerControl::Faster, &mut queue);
        player.apply_control(PlayerControl::Faster, &mut queue);
        assert_eq!(player.multiplier(), 4);

        let mut log = Vec::new();
        let mut dispatch = test_dispatch(&mut log);
        let report = player.update(0.5, &mut queue, &mut dispatch);
        assert_eq!(report.effective_elapsed, 2.0);
        let report = player.update(0.5, &mut queue, &mut dispatch);
        assert!(report.dispatched >= 1);
        drop(dispatch);
        assert!(log.contains(&"flag fog on".to_string()));
    }

    #[test]
    fn recording_inserts_exactly_one_wait_line_after_idle() {
        let record = tempfile::NamedTempFile::new().expect("temp record file");
        let mut player = Player::new();
        let mut queue = ScriptQueue::new();
        player.apply_control(
            PlayerControl::Record(record.path().to_path_buf()),
            &mut queue,
        );

        let mut noop = |_: &mut ScriptQueue, _: PlayerView, _: &Token| ExecuteOutcome::silent();
        player.record_line("flag fog on");
        // 0.75s of idle ticks accumulate before the next command.
        for _ in 0..3 {
            player.update(0.25, &mut queue, &mut noop);
        }
        player.record_line("flag fog off");
        player.record_line("flag atmosphere on");

        let contents = fs::read_to_string(record.path()).expect("read recording");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "flag fog on",
                "wait duration 0.75",
                "flag fog off",
                "flag atmosphere on"
            ]
        );
    }

    #[test]
    fn cancel_record_stops_persisting_lines() {
        let record = tempfile::NamedTempFile::new().expect("temp record file");
        let mut player = Player::new();
        let mut queue = ScriptQueue::new();
        player.apply_control(
            PlayerControl::Record(record.path().to_path_buf()),
            &mut queue,
        );
        player.record_line("flag fog on");
        player.apply_control(PlayerControl::CancelRecord, &mut queue);
        assert!(!player.recording());
        player.record_line("flag fog off");

        let contents = fs::read_to_string(record.path()).expect("read recording");
        assert_eq!(contents, "flag fog on\n");
    }

    #[test]
    fn end_resets_speed_and_clears_the_queue() {
        let mut player = playing_player();
        let mut queue = ScriptQueue::new();
        queue.add_first("flag fog on", Path::new("."));
        player.apply_control(PlayerControl::Faster, &mut queue);

        let effects = player.apply_control(PlayerControl::End, &mut queue);
        assert_eq!(player.state(), PlayState::None);
        assert_eq!(player.multiplier(), 1);
        assert!(queue.is_empty());
        assert!(effects.contains(&SideEffect::ScriptEnded));
        assert!(effects.contains(&SideEffect::AudioUnmute));
    }
}
