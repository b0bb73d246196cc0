//! Command dispatcher: resolves one parsed line against the registry
//! and routes it to a collaborator handler.
//!
//! Structural commands (`comment`, `uncomment`, `struct`) bypass the
//! suppression check entirely so control flow itself is never skipped.
//! Every failure is recoverable: the line degrades to a logged no-op
//! and the script keeps playing.

use sky_script::{
    evaluate_condition, parse_line, ArithmeticOp, CommandId, ExecuteOutcome, ParsedCommand,
    PlayState, PlayerControl, PlayerView, ScriptError, ScriptQueue, Suppression, Token,
};

use crate::app::AppContext;
use crate::collaborators::{
    Color, ConfigAction, DateSpec, FlagAction, MoveRequest, TimeAction, ZoomRequest,
};

/// Wait applied to timed camera actions when no duration is given.
const DEFAULT_MOVE_DURATION: f64 = 1.0;

/// Execute one raw line against the context and queue.
pub fn execute(
    ctx: &mut AppContext,
    queue: &mut ScriptQueue,
    view: PlayerView,
    token: &Token,
) -> ExecuteOutcome {
    let parsed = parse_line(&token.line);
    if parsed.is_empty() {
        return ExecuteOutcome::silent();
    }

    // Control flow must run even inside a suppressed branch.
    match parsed.name.as_str() {
        "comment" => {
            ctx.suppression.set_comment(true);
            return ExecuteOutcome::silent();
        }
        "uncomment" => {
            ctx.suppression.set_comment(false);
            return ExecuteOutcome::silent();
        }
        "struct" => return handle_struct(ctx, queue, &parsed).unwrap_or_else(fail),
        _ => {}
    }

    let suppression = ctx.suppression.suppression();
    if suppression != Suppression::Run {
        log::debug!("skipping \"{}\" ({suppression:?})", token.line);
        return ExecuteOutcome::silent();
    }

    let id = match ctx.registry.command(&parsed.name) {
        Ok(id) => id,
        Err(err) => return fail(err),
    };

    let result = match id {
        CommandId::Add => handle_arithmetic(ctx, &parsed, ArithmeticOp::Add),
        CommandId::Audio => handle_audio(ctx, token, &parsed),
        CommandId::Clear => handle_clear(ctx, &parsed),
        CommandId::Color => handle_color(ctx, &parsed),
        CommandId::Comment | CommandId::Uncomment | CommandId::Struct => {
            unreachable!("structural commands are handled before resolution")
        }
        CommandId::Configuration => handle_configuration(ctx, &parsed),
        CommandId::Date => handle_date(ctx, &parsed),
        CommandId::Define => handle_define(ctx, &parsed),
        CommandId::Deselect => {
            ctx.sim.deselect();
            Ok(ExecuteOutcome::success())
        }
        CommandId::Divide => handle_arithmetic(ctx, &parsed, ArithmeticOp::Divide),
        CommandId::Flag => handle_flag(ctx, &parsed),
        CommandId::Image => handle_image(ctx, token, &parsed),
        CommandId::Landscape => handle_landscape(ctx, &parsed),
        CommandId::Meteors => handle_meteors(ctx, &parsed),
        CommandId::Moveto => handle_moveto(ctx, &parsed),
        CommandId::Multiply => handle_arithmetic(ctx, &parsed, ArithmeticOp::Multiply),
        CommandId::Observer => handle_observer(ctx, &parsed),
        CommandId::Print => handle_print(ctx, &parsed),
        CommandId::Script => handle_script(ctx, queue, view, token, &parsed),
        CommandId::Select => handle_select(ctx, &parsed),
        CommandId::Set => handle_set(ctx, &parsed),
        CommandId::Shutdown => handle_shutdown(&parsed),
        CommandId::Sinus => handle_arithmetic(ctx, &parsed, ArithmeticOp::Sinus),
        CommandId::Sub => handle_arithmetic(ctx, &parsed, ArithmeticOp::Sub),
        CommandId::Tangent => handle_arithmetic(ctx, &parsed, ArithmeticOp::Tangent),
        CommandId::Text => handle_text(ctx, &parsed),
        CommandId::Timerate => handle_timerate(ctx, &parsed),
        CommandId::Trunc => handle_arithmetic(ctx, &parsed, ArithmeticOp::Trunc),
        CommandId::Wait => handle_wait(ctx, &parsed),
        CommandId::Zoom => handle_zoom(ctx, &parsed),
    };
    result.unwrap_or_else(fail)
}

fn fail(err: ScriptError) -> ExecuteOutcome {
    log::error!("{err}");
    ExecuteOutcome::failure(err.to_string())
}

type HandlerResult = Result<ExecuteOutcome, ScriptError>;

fn handle_struct(
    ctx: &mut AppContext,
    queue: &mut ScriptQueue,
    parsed: &ParsedCommand,
) -> HandlerResult {
    let (kind, value) = parsed.args.first().ok_or(ScriptError::MissingArgument {
        command: "struct",
        key: "if|else|end|loop|comment",
    })?;
    match kind {
        "if" => {
            let met = evaluate_condition(&ctx.vars, &parsed.args);
            ctx.suppression.push_if(met);
        }
        "else" => ctx.suppression.else_branch()?,
        "end" => ctx.suppression.end_branch()?,
        "loop" => match value {
            "end" => queue.end_loop(),
            "break" => queue.break_loop(),
            count => {
                let count = ctx.vars.eval_int(count).max(0) as u32;
                queue.begin_loop(count);
            }
        },
        "comment" => {
            let on = FlagAction::parse(value) == Some(FlagAction::On);
            ctx.suppression.set_comment(on);
        }
        other => {
            return Err(ScriptError::BadArgument {
                command: "struct",
                key: other.to_string(),
                value: value.to_string(),
            })
        }
    }
    Ok(ExecuteOutcome::silent())
}

fn handle_flag(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    if parsed.args.is_empty() {
        return Err(ScriptError::MissingArgument {
            command: "flag",
            key: "name",
        });
    }
    for (name, value) in parsed.args.iter() {
        let flag = ctx.registry.flag(name)?;
        let action = FlagAction::parse(value).ok_or_else(|| ScriptError::BadArgument {
            command: "flag",
            key: name.to_string(),
            value: value.to_string(),
        })?;
        ctx.sim.set_flag(flag, action);
    }
    Ok(ExecuteOutcome::success())
}

fn handle_set(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    if parsed.args.is_empty() {
        return Err(ScriptError::MissingArgument {
            command: "set",
            key: "property",
        });
    }
    for (name, value) in parsed.args.iter() {
        let property = ctx.registry.set_property(name)?;
        let resolved = ctx.vars.eval_string(value);
        ctx.sim.set_property(property, &resolved);
    }
    Ok(ExecuteOutcome::success())
}

fn handle_color(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let name = parsed
        .args
        .get("property")
        .ok_or(ScriptError::MissingArgument {
            command: "color",
            key: "property",
        })?;
    let property = ctx.registry.color_property(name)?;
    let color = match parsed.args.get("value") {
        Some(value) => {
            let resolved = ctx.vars.eval_string(value);
            Color::parse(&resolved).ok_or_else(|| ScriptError::BadArgument {
                command: "color",
                key: "value".to_string(),
                value: resolved.clone(),
            })?
        }
        // Alternate surface form with separate channel keys.
        None => {
            let channel = |key: &'static str| -> Result<f64, ScriptError> {
                let value = parsed.args.get(key).ok_or(ScriptError::MissingArgument {
                    command: "color",
                    key: "value",
                })?;
                Ok(ctx.vars.eval_double(value))
            };
            Color {
                r: channel("r")?,
                g: channel("g")?,
                b: channel("b")?,
            }
        }
    };
    ctx.sim.set_color(property, color);
    Ok(ExecuteOutcome::success())
}

fn handle_date(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let (kind, value) = parsed.args.first().ok_or(ScriptError::MissingArgument {
        command: "date",
        key: "jday|local|utc|relative|sidereal",
    })?;
    let date = match kind {
        "jday" => DateSpec::Julian(ctx.vars.eval_double(value)),
        "local" => DateSpec::Local(ctx.vars.eval_string(value)),
        "utc" => DateSpec::Utc(ctx.vars.eval_string(value)),
        "relative" => DateSpec::Relative(ctx.vars.eval_double(value)),
        "sidereal" => DateSpec::Sidereal(ctx.vars.eval_double(value)),
        other => {
            return Err(ScriptError::BadArgument {
                command: "date",
                key: other.to_string(),
                value: value.to_string(),
            })
        }
    };
    ctx.sim.set_date(date);
    Ok(ExecuteOutcome::success())
}

fn handle_timerate(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    if let Some(rate) = parsed.args.get("rate") {
        ctx.sim.set_time_rate(ctx.vars.eval_double(rate));
        return Ok(ExecuteOutcome::success());
    }
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "timerate",
        key: "rate",
    })?;
    let action = TimeAction::parse(action).ok_or_else(|| ScriptError::BadArgument {
        command: "timerate",
        key: "action".to_string(),
        value: action.to_string(),
    })?;
    ctx.sim.time_action(action);
    Ok(ExecuteOutcome::success())
}

fn handle_select(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let pointer = parsed
        .args
        .get("pointer")
        .and_then(FlagAction::parse)
        .map(|action| action == FlagAction::On)
        .unwrap_or(false);
    let (object_type, name) = parsed
        .args
        .iter()
        .find(|(key, _)| *key != "pointer")
        .ok_or(ScriptError::MissingArgument {
            command: "select",
            key: "object",
        })?;
    let name = ctx.vars.eval_string(name);
    ctx.sim.select(object_type, &name, pointer);
    Ok(ExecuteOutcome::success())
}

fn handle_zoom(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let duration = parsed
        .args
        .get("duration")
        .map(|value| ctx.vars.eval_double(value))
        .unwrap_or(DEFAULT_MOVE_DURATION);
    if let Some(auto) = parsed.args.get("auto") {
        let request = match auto {
            "in" => ZoomRequest::AutoIn,
            "out" => ZoomRequest::AutoOut,
            other => {
                return Err(ScriptError::BadArgument {
                    command: "zoom",
                    key: "auto".to_string(),
                    value: other.to_string(),
                })
            }
        };
        ctx.sim.zoom(request, duration);
        return Ok(ExecuteOutcome::success().with_wait(duration));
    }
    if let Some(fov) = parsed.args.get("fov") {
        let request = ZoomRequest::Fov(ctx.vars.eval_double(fov));
        ctx.sim.zoom(request, duration);
        return Ok(ExecuteOutcome::success().with_wait(duration));
    }
    if let Some(delta) = parsed.args.get("delta") {
        // Per-frame manual zoom; not a timed move, so no wait.
        let request = ZoomRequest::Delta(ctx.vars.eval_double(delta));
        ctx.sim.zoom(request, 0.0);
        return Ok(ExecuteOutcome::success());
    }
    Err(ScriptError::MissingArgument {
        command: "zoom",
        key: "auto|fov|delta",
    })
}

fn handle_moveto(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let coordinate = |key: &str| {
        parsed
            .args
            .get(key)
            .map(|value| ctx.vars.eval_double(value))
    };
    let request = MoveRequest {
        latitude: coordinate("lat"),
        longitude: coordinate("lon"),
        altitude: coordinate("alt"),
    };
    if request == MoveRequest::default() {
        return Err(ScriptError::MissingArgument {
            command: "moveto",
            key: "lat|lon|alt",
        });
    }
    let duration = parsed
        .args
        .get("duration")
        .map(|value| ctx.vars.eval_double(value))
        .unwrap_or(DEFAULT_MOVE_DURATION);
    ctx.sim.move_observer(request, duration);
    Ok(ExecuteOutcome::success().with_wait(duration))
}

fn handle_observer(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "observer",
        key: "action",
    })?;
    match action {
        "home" => {
            ctx.sim.observer_home();
            Ok(ExecuteOutcome::success())
        }
        other => Err(ScriptError::BadArgument {
            command: "observer",
            key: "action".to_string(),
            value: other.to_string(),
        }),
    }
}

fn handle_landscape(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "landscape",
        key: "action",
    })?;
    match action {
        "load" => {
            ctx.sim.load_landscape(&parsed.args);
            Ok(ExecuteOutcome::success())
        }
        other => Err(ScriptError::BadArgument {
            command: "landscape",
            key: "action".to_string(),
            value: other.to_string(),
        }),
    }
}

fn handle_audio(ctx: &mut AppContext, token: &Token, parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "audio",
        key: "action",
    })?;
    match action {
        "play" => {
            let filename = parsed
                .args
                .get("filename")
                .ok_or(ScriptError::MissingArgument {
                    command: "audio",
                    key: "filename",
                })?;
            let filename = ctx.vars.eval_string(filename);
            let path = ctx.settings.resolve_media(&filename, &token.base_dir);
            let loop_playback = parsed
                .args
                .get("loop")
                .and_then(FlagAction::parse)
                .map(|action| action == FlagAction::On)
                .unwrap_or(false);
            let volume = parsed
                .args
                .get("volume")
                .and_then(|value| ctx.vars.try_eval_double(value));
            ctx.media.audio_play(&path, loop_playback, volume);
            Ok(ExecuteOutcome::success())
        }
        "pause" => {
            ctx.media.audio_pause();
            Ok(ExecuteOutcome::success())
        }
        "sync" => {
            ctx.media.audio_sync();
            Ok(ExecuteOutcome::success())
        }
        "drop" => {
            ctx.media.audio_drop();
            Ok(ExecuteOutcome::success())
        }
        other => Err(ScriptError::BadArgument {
            command: "audio",
            key: "action".to_string(),
            value: other.to_string(),
        }),
    }
}

fn handle_image(ctx: &mut AppContext, token: &Token, parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "image",
        key: "action",
    })?;
    let name = parsed.args.get("name").ok_or(ScriptError::MissingArgument {
        command: "image",
        key: "name",
    })?;
    match action {
        "load" => {
            let filename = parsed
                .args
                .get("filename")
                .ok_or(ScriptError::MissingArgument {
                    command: "image",
                    key: "filename",
                })?;
            let filename = ctx.vars.eval_string(filename);
            let path = ctx.settings.resolve_media(&filename, &token.base_dir);
            ctx.media.image_load(&path, name, &parsed.args);
            Ok(ExecuteOutcome::success())
        }
        "drop" => {
            ctx.media.image_drop(name);
            Ok(ExecuteOutcome::success())
        }
        other => Err(ScriptError::BadArgument {
            command: "image",
            key: "action".to_string(),
            value: other.to_string(),
        }),
    }
}

fn handle_text(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "text",
        key: "action",
    })?;
    let name = parsed.args.get("name").ok_or(ScriptError::MissingArgument {
        command: "text",
        key: "name",
    })?;
    match action {
        "load" => {
            let text = parsed.args.get("string").ok_or(ScriptError::MissingArgument {
                command: "text",
                key: "string",
            })?;
            let text = ctx.vars.eval_string(text);
            ctx.ui.text_display(name, &text, &parsed.args);
            Ok(ExecuteOutcome::success())
        }
        "drop" => {
            ctx.ui.text_drop(name);
            Ok(ExecuteOutcome::success())
        }
        other => Err(ScriptError::BadArgument {
            command: "text",
            key: "action".to_string(),
            value: other.to_string(),
        }),
    }
}

fn handle_meteors(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let zhr = parsed.args.get("zhr").ok_or(ScriptError::MissingArgument {
        command: "meteors",
        key: "zhr",
    })?;
    ctx.sim.set_meteors_zhr(ctx.vars.eval_int(zhr));
    Ok(ExecuteOutcome::success())
}

fn handle_clear(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let natural = parsed.args.get("state") == Some("natural");
    ctx.sim.clear_state(natural);
    Ok(ExecuteOutcome::success())
}

fn handle_configuration(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "configuration",
        key: "action",
    })?;
    match action {
        "load" => {
            ctx.settings.configuration(ConfigAction::Load);
            // Config reload is the variable-lifetime boundary.
            ctx.vars.clear();
            Ok(ExecuteOutcome::success())
        }
        "save" => {
            ctx.settings.configuration(ConfigAction::Save);
            Ok(ExecuteOutcome::success())
        }
        other => Err(ScriptError::BadArgument {
            command: "configuration",
            key: "action".to_string(),
            value: other.to_string(),
        }),
    }
}

fn handle_print(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let value = parsed.args.get("value").ok_or(ScriptError::MissingArgument {
        command: "print",
        key: "value",
    })?;
    let resolved = ctx.vars.eval_string(value);
    match parsed.args.get("name") {
        Some(name) => {
            log::info!("script print {name}: {resolved}");
            ctx.log_event(format!("print.{name} {resolved}"));
        }
        None => {
            log::info!("script print: {resolved}");
            ctx.log_event(format!("print {resolved}"));
        }
    }
    Ok(ExecuteOutcome::silent())
}

fn handle_wait(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    let duration = parsed
        .args
        .get("duration")
        .ok_or(ScriptError::MissingArgument {
            command: "wait",
            key: "duration",
        })?;
    let duration = ctx.vars.eval_double(duration).max(0.0);
    // Pacing is reproduced by synthesized waits, so the recorder skips
    // the literal line.
    Ok(ExecuteOutcome::silent().with_wait(duration))
}

fn handle_define(ctx: &mut AppContext, parsed: &ParsedCommand) -> HandlerResult {
    if parsed.args.is_empty() {
        return Err(ScriptError::MissingArgument {
            command: "define",
            key: "name",
        });
    }
    for (name, value) in parsed.args.iter() {
        ctx.vars.define(name, value);
    }
    Ok(ExecuteOutcome::success())
}

fn handle_arithmetic(
    ctx: &mut AppContext,
    parsed: &ParsedCommand,
    op: ArithmeticOp,
) -> HandlerResult {
    let (name, operand) = parsed.args.first().ok_or(ScriptError::MissingArgument {
        command: "add",
        key: "name",
    })?;
    ctx.vars.apply(op, name, operand);
    Ok(ExecuteOutcome::success())
}

fn handle_shutdown(parsed: &ParsedCommand) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "shutdown",
        key: "action",
    })?;
    if action != "now" {
        return Err(ScriptError::BadArgument {
            command: "shutdown",
            key: "action".to_string(),
            value: action.to_string(),
        });
    }
    let mut outcome = ExecuteOutcome::silent();
    outcome.quit = true;
    Ok(outcome)
}

fn handle_script(
    ctx: &mut AppContext,
    queue: &mut ScriptQueue,
    view: PlayerView,
    token: &Token,
    parsed: &ParsedCommand,
) -> HandlerResult {
    let action = parsed.args.get("action").ok_or(ScriptError::MissingArgument {
        command: "script",
        key: "action",
    })?;
    let control = match action {
        "play" => {
            let filename = parsed
                .args
                .get("filename")
                .ok_or(ScriptError::MissingArgument {
                    command: "script",
                    key: "filename",
                })?;
            let filename = ctx.vars.eval_string(filename);
            let path = ctx.settings.resolve_script(&filename, &token.base_dir);
            if view.state == PlayState::None {
                queue.clear();
                queue.load(&path)?;
                ctx.log_event(format!("script.play {}", path.display()));
                Some(PlayerControl::Play)
            } else {
                // Loaded behind everything already queued; plays once
                // the current content drains.
                queue.load(&path)?;
                ctx.log_event(format!("script.queue {}", path.display()));
                None
            }
        }
        "end" => Some(PlayerControl::End),
        "pause" => Some(PlayerControl::Pause),
        "resume" => Some(PlayerControl::Resume),
        "faster" => Some(PlayerControl::Faster),
        "slower" => Some(PlayerControl::Slower),
        "default" => Some(PlayerControl::DefaultSpeed),
        "record" => {
            let filename = parsed
                .args
                .get("filename")
                .ok_or(ScriptError::MissingArgument {
                    command: "script",
                    key: "filename",
                })?;
            let filename = ctx.vars.eval_string(filename);
            let path = ctx.settings.resolve_script(&filename, &token.base_dir);
            Some(PlayerControl::Record(path))
        }
        "cancelrecord" => Some(PlayerControl::CancelRecord),
        other => {
            return Err(ScriptError::BadArgument {
                command: "script",
                key: "action".to_string(),
                value: other.to_string(),
            })
        }
    };
    let mut outcome = ExecuteOutcome::silent();
    outcome.control = control;
    Ok(outcome)
}
