//! Collaborator seams for the dispatcher.
//!
//! The simulation, media, and UI subsystems live outside this crate;
//! handlers reach them through these traits. The recording
//! implementations used by the headless host append one trace line per
//! call, which doubles as the test double and feeds the report dump.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sky_script::{ArgMap, ColorPropertyId, FlagId, SetPropertyId};

/// Shared, ordered trace of collaborator calls.
#[derive(Debug, Default, Clone)]
pub struct EventTrace {
    events: Rc<RefCell<Vec<String>>>,
}

impl EventTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    On,
    Off,
    Toggle,
}

impl FlagAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on" | "true" | "1" => Some(FlagAction::On),
            "off" | "false" | "0" => Some(FlagAction::Off),
            "toggle" => Some(FlagAction::Toggle),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlagAction::On => "on",
            FlagAction::Off => "off",
            FlagAction::Toggle => "toggle",
        }
    }
}

/// RGB triple parsed from the `r,g,b` surface form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(',').map(|part| part.trim().parse::<f64>());
        let r = parts.next()?.ok()?;
        let g = parts.next()?.ok()?;
        let b = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Color { r, g, b })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateSpec {
    Julian(f64),
    Local(String),
    Utc(String),
    Relative(f64),
    Sidereal(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAction {
    Pause,
    Resume,
    Increment,
    Decrement,
}

impl TimeAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pause" => Some(TimeAction::Pause),
            "resume" => Some(TimeAction::Resume),
            "increment" => Some(TimeAction::Increment),
            "decrement" => Some(TimeAction::Decrement),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TimeAction::Pause => "pause",
            TimeAction::Resume => "resume",
            TimeAction::Increment => "increment",
            TimeAction::Decrement => "decrement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomRequest {
    AutoIn,
    AutoOut,
    Fov(f64),
    Delta(f64),
}

/// Observer relocation; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Load,
    Save,
}

/// Simulation/state collaborator: flags, colors, properties, selection,
/// time, and the observer.
pub trait Simulation {
    fn set_flag(&mut self, flag: FlagId, action: FlagAction);
    fn set_color(&mut self, property: ColorPropertyId, color: Color);
    fn set_property(&mut self, property: SetPropertyId, value: &str);
    fn set_date(&mut self, date: DateSpec);
    fn set_time_rate(&mut self, rate: f64);
    fn time_action(&mut self, action: TimeAction);
    /// Freezing simulation time so every time-dependent state holds
    /// still, e.g. while the script player is paused.
    fn set_time_pause(&mut self, paused: bool);
    fn select(&mut self, object_type: &str, name: &str, pointer: bool);
    fn deselect(&mut self);
    fn zoom(&mut self, request: ZoomRequest, duration: f64);
    fn move_observer(&mut self, request: MoveRequest, duration: f64);
    fn observer_home(&mut self);
    fn observer_change(&mut self, body: &str);
    fn set_altitude(&mut self, altitude: f64);
    fn load_landscape(&mut self, args: &ArgMap);
    fn set_meteors_zhr(&mut self, zhr: i64);
    fn clear_state(&mut self, natural: bool);
}

/// Audio/image/video collaborator.
pub trait Media {
    fn audio_play(&mut self, path: &Path, loop_playback: bool, volume: Option<f64>);
    fn audio_pause(&mut self);
    fn audio_resume(&mut self);
    fn audio_sync(&mut self);
    fn audio_drop(&mut self);
    fn audio_mute(&mut self, muted: bool);
    fn image_load(&mut self, path: &Path, name: &str, args: &ArgMap);
    fn image_drop(&mut self, name: &str);
    fn video_control(&mut self, action: &str);
    /// Per-tick advance with multiplier-scaled elapsed seconds so
    /// synchronized playback follows the script speed.
    fn update(&mut self, effective_elapsed: f64);
}

/// UI collaborator: on-screen text, faders, save-screen, tui.
pub trait Ui {
    fn text_display(&mut self, name: &str, text: &str, args: &ArgMap);
    fn text_drop(&mut self, name: &str);
    fn fader_change(&mut self, target: &str, value: f64);
    fn fader_interlude(&mut self, duration: f64);
    fn save_screen(&mut self, action: &str);
    fn update_fps(&mut self, fps: f64);
    fn after_one_second(&mut self);
}

/// Path resolution and configuration boundary.
pub trait Settings {
    fn scripts_root(&self) -> &Path;
    /// Resolve a script name against the loading script's directory
    /// first, then the configured scripts root.
    fn resolve_script(&self, name: &str, base_dir: &Path) -> PathBuf;
    /// Same order for media assets, falling back to the media root.
    fn resolve_media(&self, name: &str, base_dir: &Path) -> PathBuf;
    fn configuration(&mut self, action: ConfigAction);
}

pub struct RecordingSimulation {
    trace: EventTrace,
}

impl RecordingSimulation {
    pub fn new(trace: EventTrace) -> Self {
        RecordingSimulation { trace }
    }
}

impl Simulation for RecordingSimulation {
    fn set_flag(&mut self, flag: FlagId, action: FlagAction) {
        self.trace
            .push(format!("flag.{} {}", flag.name(), action.as_str()));
    }

    fn set_color(&mut self, property: ColorPropertyId, color: Color) {
        self.trace.push(format!(
            "color.{} {},{},{}",
            property.name(),
            color.r,
            color.g,
            color.b
        ));
    }

    fn set_property(&mut self, property: SetPropertyId, value: &str) {
        self.trace.push(format!("set.{} {value}", property.name()));
    }

    fn set_date(&mut self, date: DateSpec) {
        let rendered = match date {
            DateSpec::Julian(day) => format!("jday {day}"),
            DateSpec::Local(value) => format!("local {value}"),
            DateSpec::Utc(value) => format!("utc {value}"),
            DateSpec::Relative(days) => format!("relative {days}"),
            DateSpec::Sidereal(days) => format!("sidereal {days}"),
        };
        self.trace.push(format!("date.{rendered}"));
    }

    fn set_time_rate(&mut self, rate: f64) {
        self.trace.push(format!("time.rate {rate}"));
    }

    fn time_action(&mut self, action: TimeAction) {
        self.trace.push(format!("time.action {}", action.as_str()));
    }

    fn set_time_pause(&mut self, paused: bool) {
        self.trace.push(format!("time.pause {paused}"));
    }

    fn select(&mut self, object_type: &str, name: &str, pointer: bool) {
        let pointer = if pointer { "on" } else { "off" };
        self.trace
            .push(format!("select.{object_type} {name} pointer={pointer}"));
    }

    fn deselect(&mut self) {
        self.trace.push("select.none");
    }

    fn zoom(&mut self, request: ZoomRequest, duration: f64) {
        let rendered = match request {
            ZoomRequest::AutoIn => "auto in".to_string(),
            ZoomRequest::AutoOut => "auto out".to_string(),
            ZoomRequest::Fov(fov) => format!("fov {fov}"),
            ZoomRequest::Delta(delta) => format!("delta {delta}"),
        };
        self.trace
            .push(format!("zoom.{rendered} duration={duration}"));
    }

    fn move_observer(&mut self, request: MoveRequest, duration: f64) {
        let part = |label: &str, value: Option<f64>| match value {
            Some(value) => format!(" {label}={value}"),
            None => String::new(),
        };
        self.trace.push(format!(
            "observer.move{}{}{} duration={duration}",
            part("lat", request.latitude),
            part("lon", request.longitude),
            part("alt", request.altitude),
        ));
    }

    fn observer_home(&mut self) {
        self.trace.push("observer.home");
    }

    fn observer_change(&mut self, body: &str) {
        self.trace.push(format!("observer.body {body}"));
    }

    fn set_altitude(&mut self, altitude: f64) {
        self.trace.push(format!("observer.altitude {altitude}"));
    }

    fn load_landscape(&mut self, args: &ArgMap) {
        let name = args.get("name").unwrap_or("custom");
        self.trace.push(format!("landscape.load {name}"));
    }

    fn set_meteors_zhr(&mut self, zhr: i64) {
        self.trace.push(format!("meteors.zhr {zhr}"));
    }

    fn clear_state(&mut self, natural: bool) {
        self.trace.push(format!("state.clear natural={natural}"));
    }
}

pub struct RecordingMedia {
    trace: EventTrace,
}

impl RecordingMedia {
    pub fn new(trace: EventTrace) -> Self {
        RecordingMedia { trace }
    }
}

impl Media for RecordingMedia {
    fn audio_play(&mut self, path: &Path, loop_playback: bool, volume: Option<f64>) {
        let loop_playback = if loop_playback { "on" } else { "off" };
        let volume = volume
            .map(|volume| format!(" volume={volume}"))
            .unwrap_or_default();
        self.trace.push(format!(
            "audio.play {} loop={loop_playback}{volume}",
            path.display()
        ));
    }

    fn audio_pause(&mut self) {
        self.trace.push("audio.pause");
    }

    fn audio_resume(&mut self) {
        self.trace.push("audio.resume");
    }

    fn audio_sync(&mut self) {
        self.trace.push("audio.sync");
    }

    fn audio_drop(&mut self) {
        self.trace.push("audio.drop");
    }

    fn audio_mute(&mut self, muted: bool) {
        self.trace.push(format!("audio.mute {muted}"));
    }

    fn image_load(&mut self, path: &Path, name: &str, _args: &ArgMap) {
        self.trace
            .push(format!("image.load {name} {}", path.display()));
    }

    fn image_drop(&mut self, name: &str) {
        self.trace.push(format!("image.drop {name}"));
    }

    fn video_control(&mut self, action: &str) {
        self.trace.push(format!("video.{action}"));
    }

    fn update(&mut self, _effective_elapsed: f64) {}
}

pub struct RecordingUi {
    trace: EventTrace,
}

impl RecordingUi {
    pub fn new(trace: EventTrace) -> Self {
        RecordingUi { trace }
    }
}

impl Ui for RecordingUi {
    fn text_display(&mut self, name: &str, text: &str, _args: &ArgMap) {
        self.trace.push(format!("text.load {name} \"{text}\""));
    }

    fn text_drop(&mut self, name: &str) {
        self.trace.push(format!("text.drop {name}"));
    }

    fn fader_change(&mut self, target: &str, value: f64) {
        self.trace.push(format!("fader.{target} {value}"));
    }

    fn fader_interlude(&mut self, duration: f64) {
        self.trace.push(format!("fader.interlude {duration}"));
    }

    fn save_screen(&mut self, action: &str) {
        self.trace.push(format!("save_screen.{action}"));
    }

    fn update_fps(&mut self, fps: f64) {
        self.trace.push(format!("ui.fps {fps:.0}"));
    }

    fn after_one_second(&mut self) {
        self.trace.push("ui.second");
    }
}

/// Directory-backed settings used by the headless host.
pub struct DirSettings {
    scripts_root: PathBuf,
    media_root: PathBuf,
    trace: EventTrace,
}

impl DirSettings {
    pub fn new(scripts_root: PathBuf, media_root: PathBuf, trace: EventTrace) -> Self {
        DirSettings {
            scripts_root,
            media_root,
            trace,
        }
    }
}

impl Settings for DirSettings {
    fn scripts_root(&self) -> &Path {
        &self.scripts_root
    }

    fn resolve_script(&self, name: &str, base_dir: &Path) -> PathBuf {
        resolve(name, base_dir, &self.scripts_root)
    }

    fn resolve_media(&self, name: &str, base_dir: &Path) -> PathBuf {
        resolve(name, base_dir, &self.media_root)
    }

    fn configuration(&mut self, action: ConfigAction) {
        let action = match action {
            ConfigAction::Load => "load",
            ConfigAction::Save => "save",
        };
        self.trace.push(format!("configuration.{action}"));
    }
}

/// Script-relative paths win; anything else falls back to the
/// configured root. Absolute names pass through untouched.
fn resolve(name: &str, base_dir: &Path, root: &Path) -> PathBuf {
    let name_path = Path::new(name);
    if name_path.is_absolute() {
        return name_path.to_path_buf();
    }
    let relative = base_dir.join(name);
    if relative.exists() {
        relative
    } else {
        root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{Color, DirSettings, EventTrace, FlagAction, Settings};

    #[test]
    fn flag_action_parses_surface_forms() {
        assert_eq!(FlagAction::parse("on"), Some(FlagAction::On));
        assert_eq!(FlagAction::parse("0"), Some(FlagAction::Off));
        assert_eq!(FlagAction::parse("toggle"), Some(FlagAction::Toggle));
        assert_eq!(FlagAction::parse("maybe"), None);
    }

    #[test]
    fn color_parses_comma_triples() {
        assert_eq!(
            Color::parse("1,0.5,0"),
            Some(Color {
                r: 1.0,
                g: 0.5,
                b: 0.0
            })
        );
        assert_eq!(Color::parse("1, 0.5, 0"), Color::parse("1,0.5,0"));
        assert_eq!(Color::parse("1,2"), None);
        assert_eq!(Color::parse("1,2,3,4"), None);
        assert_eq!(Color::parse("red"), None);
    }

    #[test]
    fn script_relative_paths_win_over_the_root() {
        let dir = tempfile::tempdir().expect("temp dir");
        let base = dir.path().join("show");
        fs::create_dir_all(&base).expect("mkdir");
        fs::write(base.join("theme.ogg"), b"").expect("write");
        let settings = DirSettings::new(
            dir.path().join("scripts"),
            dir.path().join("media"),
            EventTrace::new(),
        );

        assert_eq!(
            settings.resolve_media("theme.ogg", &base),
            base.join("theme.ogg")
        );
        assert_eq!(
            settings.resolve_media("missing.ogg", &base),
            dir.path().join("media").join("missing.ogg")
        );
        assert_eq!(
            settings.resolve_script("/abs/path.sts", &base),
            Path::new("/abs/path.sts")
        );
    }

    #[test]
    fn trace_preserves_order_across_clones() {
        let trace = EventTrace::new();
        let clone = trace.clone();
        trace.push("first");
        clone.push("second");
        assert_eq!(trace.snapshot(), vec!["first", "second"]);
        assert_eq!(trace.len(), 2);
    }
}
