//! Application context: the interpreter state plus the collaborator
//! seams, constructed explicitly at startup and passed by reference
//! into whatever needs it. No ambient globals.

use std::path::PathBuf;

use sky_script::{CommandRegistry, SideEffect, SuppressionState, VariableTable};

use crate::collaborators::{
    DirSettings, EventTrace, Media, RecordingMedia, RecordingSimulation, RecordingUi, Settings,
    Simulation, Ui,
};

pub struct AppContext {
    pub registry: CommandRegistry,
    pub vars: VariableTable,
    pub suppression: SuppressionState,
    pub sim: Box<dyn Simulation>,
    pub media: Box<dyn Media>,
    pub ui: Box<dyn Ui>,
    pub settings: Box<dyn Settings>,
    trace: EventTrace,
}

impl AppContext {
    pub fn new(
        sim: Box<dyn Simulation>,
        media: Box<dyn Media>,
        ui: Box<dyn Ui>,
        settings: Box<dyn Settings>,
        trace: EventTrace,
    ) -> Self {
        AppContext {
            registry: CommandRegistry::new(),
            vars: VariableTable::new(),
            suppression: SuppressionState::new(),
            sim,
            media,
            ui,
            settings,
            trace,
        }
    }

    /// Headless context with trace-recording collaborators.
    pub fn recording(scripts_root: PathBuf, media_root: PathBuf) -> Self {
        let trace = EventTrace::new();
        AppContext::new(
            Box::new(RecordingSimulation::new(trace.clone())),
            Box::new(RecordingMedia::new(trace.clone())),
            Box::new(RecordingUi::new(trace.clone())),
            Box::new(DirSettings::new(scripts_root, media_root, trace.clone())),
            trace,
        )
    }

    pub fn log_event(&self, event: impl Into<String>) {
        self.trace.push(event);
    }

    pub fn trace(&self) -> &EventTrace {
        &self.trace
    }

    /// Carry out collaborator calls requested by a player transition.
    pub fn apply_side_effects(&mut self, effects: &[SideEffect]) {
        for effect in effects {
            match effect {
                SideEffect::AudioPause => self.media.audio_pause(),
                SideEffect::AudioResume => self.media.audio_resume(),
                SideEffect::AudioMute => self.media.audio_mute(true),
                SideEffect::AudioUnmute => self.media.audio_mute(false),
                SideEffect::SimulationTimePause(paused) => self.sim.set_time_pause(*paused),
                SideEffect::ScriptEnded => {
                    // The queue and loop capture were cleared by the
                    // player; conditional state goes with them.
                    self.suppression.clear();
                    self.media.audio_drop();
                    self.log_event("script.ended");
                }
            }
        }
    }
}
