//! Headless frame loop: drains the event queue, ticks the player, and
//! routes side effects back to the collaborators.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use sky_script::{PlayState, Player, PlayerControl, PlayerStatus, ScriptQueue, Token};

use crate::app::AppContext;
use crate::cli::Args;
use crate::collaborators::FlagAction;
use crate::dispatch;
use crate::events::{Event, EventKind, EventQueue, HandlerRegistry};
use crate::remote::RemoteListener;

pub struct Engine {
    pub ctx: AppContext,
    pub queue: ScriptQueue,
    pub player: Player,
    pub quit: bool,
}

impl Engine {
    pub fn new(ctx: AppContext) -> Self {
        Engine {
            ctx,
            queue: ScriptQueue::new(),
            player: Player::new(),
            quit: false,
        }
    }

    /// Dispatch one line immediately, outside player pacing. Used for
    /// remote commands and UI-originated lines; they still record and
    /// may steer the player.
    pub fn run_line(&mut self, line: &str) {
        let base_dir = self.ctx.settings.scripts_root().to_path_buf();
        let token = Token::new(line, base_dir);
        let outcome = dispatch::execute(&mut self.ctx, &mut self.queue, self.player.view(), &token);
        if outcome.ok && outcome.recordable {
            self.player.record_line(&token.line);
        }
        if let Some(control) = outcome.control {
            let effects = self.player.apply_control(control, &mut self.queue);
            self.ctx.apply_side_effects(&effects);
        }
        if outcome.quit {
            self.quit = true;
        }
    }

    /// Start (or append, if already playing) a script by path.
    pub fn play_script(&mut self, path: &Path) {
        if self.player.state() == PlayState::Playing {
            if let Err(err) = self.queue.load(path) {
                log::error!("cannot queue {}: {err}", path.display());
            }
            return;
        }
        self.queue.clear();
        match self.queue.load(path) {
            Ok(count) => {
                log::info!("playing {} ({count} lines)", path.display());
                let effects = self.player.apply_control(PlayerControl::Play, &mut self.queue);
                self.ctx.apply_side_effects(&effects);
            }
            Err(err) => log::error!("cannot play {}: {err}", path.display()),
        }
    }

    /// Advance one frame of `elapsed` seconds.
    pub fn tick(&mut self, elapsed: f64) -> usize {
        let ctx = &mut self.ctx;
        let mut quit = false;
        let report = self.player.update(elapsed, &mut self.queue, &mut |queue, view, token| {
            let outcome = dispatch::execute(ctx, queue, view, token);
            if outcome.quit {
                quit = true;
            }
            outcome
        });
        ctx.apply_side_effects(&report.effects);
        ctx.media.update(report.effective_elapsed);
        if quit {
            self.quit = true;
        }
        report.dispatched
    }
}

/// Bind every event kind its collaborator call. Registration happens
/// once here; kinds left out would be dropped silently.
pub fn handler_registry() -> HandlerRegistry<Engine> {
    let mut handlers = HandlerRegistry::new();
    handlers.register(EventKind::ScriptLoad, |engine: &mut Engine, event| {
        if let Event::ScriptLoad { path } = event {
            engine.play_script(&path);
        }
    });
    handlers.register(EventKind::Command, |engine: &mut Engine, event| {
        if let Event::Command { line } = event {
            engine.run_line(&line);
        }
    });
    handlers.register(EventKind::FlagSet, |engine: &mut Engine, event| {
        if let Event::FlagSet { name, value } = event {
            match engine.ctx.registry.flag(&name) {
                Ok(flag) => {
                    let action = if value { FlagAction::On } else { FlagAction::Off };
                    engine.ctx.sim.set_flag(flag, action);
                }
                Err(err) => log::warn!("{err}"),
            }
        }
    });
    handlers.register(EventKind::FaderChange, |engine: &mut Engine, event| {
        if let Event::FaderChange { target, value } = event {
            engine.ctx.ui.fader_change(&target, value);
        }
    });
    handlers.register(EventKind::FaderInterlude, |engine: &mut Engine, event| {
        if let Event::FaderInterlude { duration } = event {
            engine.ctx.ui.fader_interlude(duration);
        }
    });
    handlers.register(EventKind::SaveScreen, |engine: &mut Engine, event| {
        if let Event::SaveScreen { action } = event {
            engine.ctx.ui.save_screen(&action);
        }
    });
    handlers.register(EventKind::FpsTick, |engine: &mut Engine, event| {
        if let Event::FpsTick { fps } = event {
            engine.ctx.ui.update_fps(fps);
        }
    });
    handlers.register(EventKind::AfterOneSecond, |engine: &mut Engine, _| {
        engine.ctx.ui.after_one_second();
    });
    handlers.register(EventKind::AltitudeChange, |engine: &mut Engine, event| {
        if let Event::AltitudeChange { altitude } = event {
            engine.ctx.sim.set_altitude(altitude);
        }
    });
    handlers.register(EventKind::ObserverChange, |engine: &mut Engine, event| {
        if let Event::ObserverChange { body } = event {
            engine.ctx.sim.observer_change(&body);
        }
    });
    handlers.register(EventKind::VideoControl, |engine: &mut Engine, event| {
        if let Event::VideoControl { action } = event {
            engine.ctx.media.video_control(&action);
        }
    });
    handlers
}

/// Fixed-step frame loop. Events queued during a frame are handled at
/// the top of the next one. With `stay_alive` the loop survives the end
/// of the script (remote listener mode); otherwise it exits when the
/// player comes to rest.
fn run_loop(
    engine: &mut Engine,
    handlers: &mut HandlerRegistry<Engine>,
    events: &mut EventQueue,
    fps: f64,
    max_seconds: Option<f64>,
    stay_alive: bool,
    realtime: bool,
) {
    let producer = events.producer();
    let step = 1.0 / fps;
    let mut clock = 0.0_f64;
    let mut next_second = 1.0_f64;
    loop {
        for event in events.drain() {
            handlers.dispatch(engine, event);
        }
        if engine.quit {
            break;
        }

        engine.tick(step);
        clock += step;
        producer.send(Event::FpsTick { fps });
        if clock + 1e-9 >= next_second {
            producer.send(Event::AfterOneSecond);
            next_second += 1.0;
        }

        if engine.quit {
            break;
        }
        if let Some(max) = max_seconds {
            if clock + 1e-9 >= max {
                break;
            }
        }
        if engine.player.state() == PlayState::None && !stay_alive {
            break;
        }
        if realtime {
            thread::sleep(Duration::from_secs_f64(step));
        }
    }
}

#[derive(Serialize)]
struct TraceReport {
    status: PlayerStatus,
    events: Vec<String>,
}

fn write_trace(engine: &Engine, path: &Path) -> Result<()> {
    let report = TraceReport {
        status: engine.player.status(),
        events: engine.ctx.trace().snapshot(),
    };
    let json = serde_json::to_string_pretty(&report).context("serializing trace report")?;
    fs::write(path, json).with_context(|| format!("writing trace to {}", path.display()))?;
    Ok(())
}

pub fn execute(args: Args) -> Result<()> {
    let Args {
        script,
        fps,
        speed,
        record,
        listen,
        trace_json,
        scripts_root,
        media_root,
        max_seconds,
        verbose: _,
    } = args;

    let mut engine = Engine::new(AppContext::recording(scripts_root, media_root));
    let mut handlers = handler_registry();
    let mut events = EventQueue::new();
    let remote = match listen.as_deref() {
        Some(addr) => {
            let listener = RemoteListener::bind(addr, events.producer())
                .with_context(|| format!("listening on {addr}"))?;
            log::info!("remote commands accepted on {}", listener.local_addr());
            Some(listener)
        }
        None => None,
    };

    if let Some(path) = record {
        let effects = engine
            .player
            .apply_control(PlayerControl::Record(path), &mut engine.queue);
        engine.ctx.apply_side_effects(&effects);
    }
    let mut multiplier = 1;
    while multiplier < speed {
        let effects = engine
            .player
            .apply_control(PlayerControl::Faster, &mut engine.queue);
        engine.ctx.apply_side_effects(&effects);
        multiplier *= 2;
    }

    events.producer().send(Event::ScriptLoad { path: script });
    run_loop(
        &mut engine,
        &mut handlers,
        &mut events,
        fps,
        max_seconds,
        remote.is_some(),
        true,
    );

    if let Some(path) = trace_json.as_ref() {
        write_trace(&engine, path)?;
    }
    Ok(())
}
