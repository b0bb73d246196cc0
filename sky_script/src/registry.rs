//! Static name tables for commands, flags, and scriptable properties.
//!
//! Each table is a bijection between a surface name and an enumerated
//! id, built once at startup. A lookup miss computes the nearest known
//! name by edit distance and reports it as an advisory suggestion; an
//! obsolete-token list intercepts renamed commands with a specific
//! deprecation message instead of the generic unknown-name error.

use std::collections::BTreeMap;

use crate::error::ScriptError;

/// Command verbs accepted by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommandId {
    Add,
    Audio,
    Clear,
    Color,
    Comment,
    Configuration,
    Date,
    Define,
    Deselect,
    Divide,
    Flag,
    Image,
    Landscape,
    Meteors,
    Moveto,
    Multiply,
    Observer,
    Print,
    Script,
    Select,
    Set,
    Shutdown,
    Sinus,
    Struct,
    Sub,
    Tangent,
    Text,
    Timerate,
    Trunc,
    Uncomment,
    Wait,
    Zoom,
}

/// Boolean feature toggles exposed to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlagId {
    Atmosphere,
    AzimuthalGrid,
    CardinalPoints,
    ConstellationArt,
    ConstellationDrawing,
    ConstellationNames,
    EclipticLine,
    EquatorialGrid,
    Fog,
    Landscape,
    MeridianLine,
    MilkyWay,
    MoonScaled,
    Nebulae,
    NebulaNames,
    ObjectTrails,
    Planets,
    PlanetNames,
    PlanetOrbits,
    PointStar,
    ShowTuiMenu,
    StarNames,
    StarTwinkle,
    TrackObject,
}

/// Colors scripts may override on the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorPropertyId {
    AzimuthalGrid,
    CardinalPoints,
    ConstellationLines,
    ConstellationNames,
    EclipticLine,
    EquatorialGrid,
    MeridianLine,
    NebulaCircles,
    NebulaNames,
    ObjectTrails,
    PlanetNames,
    PlanetOrbits,
}

/// Scalar and string properties reachable through `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SetPropertyId {
    AmbientLight,
    AtmosphereFadeDuration,
    AutoMoveDuration,
    ConstellationArtFadeDuration,
    ConstellationArtIntensity,
    HomePlanet,
    LandscapeName,
    LightPollutionLimitingMagnitude,
    MaxMagNebulaName,
    MaxMagStarName,
    MilkyWayIntensity,
    MoonScale,
    SkyCulture,
    SkyLocale,
    StarMagScale,
    StarScale,
    StarTwinkleAmount,
    TimeZone,
    ZoomOffset,
}

const COMMAND_NAMES: &[(&str, CommandId)] = &[
    ("add", CommandId::Add),
    ("audio", CommandId::Audio),
    ("clear", CommandId::Clear),
    ("color", CommandId::Color),
    ("comment", CommandId::Comment),
    ("configuration", CommandId::Configuration),
    ("date", CommandId::Date),
    ("define", CommandId::Define),
    ("deselect", CommandId::Deselect),
    ("divide", CommandId::Divide),
    ("flag", CommandId::Flag),
    ("image", CommandId::Image),
    ("landscape", CommandId::Landscape),
    ("meteors", CommandId::Meteors),
    ("moveto", CommandId::Moveto),
    ("multiply", CommandId::Multiply),
    ("observer", CommandId::Observer),
    ("print", CommandId::Print),
    ("script", CommandId::Script),
    ("select", CommandId::Select),
    ("set", CommandId::Set),
    ("shutdown", CommandId::Shutdown),
    ("sinus", CommandId::Sinus),
    ("struct", CommandId::Struct),
    ("sub", CommandId::Sub),
    ("tangent", CommandId::Tangent),
    ("text", CommandId::Text),
    ("timerate", CommandId::Timerate),
    ("trunc", CommandId::Trunc),
    ("uncomment", CommandId::Uncomment),
    ("wait", CommandId::Wait),
    ("zoom", CommandId::Zoom),
];

const FLAG_NAMES: &[(&str, FlagId)] = &[
    ("atmosphere", FlagId::Atmosphere),
    ("azimuthal_grid", FlagId::AzimuthalGrid),
    ("cardinal_points", FlagId::CardinalPoints),
    ("constellation_art", FlagId::ConstellationArt),
    ("constellation_drawing", FlagId::ConstellationDrawing),
    ("constellation_names", FlagId::ConstellationNames),
    ("ecliptic_line", FlagId::EclipticLine),
    ("equatorial_grid", FlagId::EquatorialGrid),
    ("fog", FlagId::Fog),
    ("landscape", FlagId::Landscape),
    ("meridian_line", FlagId::MeridianLine),
    ("milky_way", FlagId::MilkyWay),
    ("moon_scaled", FlagId::MoonScaled),
    ("nebulae", FlagId::Nebulae),
    ("nebula_names", FlagId::NebulaNames),
    ("object_trails", FlagId::ObjectTrails),
    ("planets", FlagId::Planets),
    ("planet_names", FlagId::PlanetNames),
    ("planet_orbits", FlagId::PlanetOrbits),
    ("point_star", FlagId::PointStar),
    ("show_tui_menu", FlagId::ShowTuiMenu),
    ("star_names", FlagId::StarNames),
    ("star_twinkle", FlagId::StarTwinkle),
    ("track_object", FlagId::TrackObject),
];

const COLOR_PROPERTY_NAMES: &[(&str, ColorPropertyId)] = &[
    ("azimuthal_grid", ColorPropertyId::AzimuthalGrid),
    ("cardinal_points", ColorPropertyId::CardinalPoints),
    ("constellation_lines", ColorPropertyId::ConstellationLines),
    ("constellation_names", ColorPropertyId::ConstellationNames),
    ("ecliptic_line", ColorPropertyId::EclipticLine),
    ("equatorial_grid", ColorPropertyId::EquatorialGrid),
    ("meridian_line", ColorPropertyId::MeridianLine),
    ("nebula_circles", ColorPropertyId::NebulaCircles),
    ("nebula_names", ColorPropertyId::NebulaNames),
    ("object_trails", ColorPropertyId::ObjectTrails),
    ("planet_names", ColorPropertyId::PlanetNames),
    ("planet_orbits", ColorPropertyId::PlanetOrbits),
];

const SET_PROPERTY_NAMES: &[(&str, SetPropertyId)] = &[
    ("ambient_light", SetPropertyId::AmbientLight),
    ("atmosphere_fade_duration", SetPropertyId::AtmosphereFadeDuration),
    ("auto_move_duration", SetPropertyId::AutoMoveDuration),
    (
        "constellation_art_fade_duration",
        SetPropertyId::ConstellationArtFadeDuration,
    ),
    (
        "constellation_art_intensity",
        SetPropertyId::ConstellationArtIntensity,
    ),
    ("home_planet", SetPropertyId::HomePlanet),
    ("landscape_name", SetPropertyId::LandscapeName),
    (
        "light_pollution_limiting_magnitude",
        SetPropertyId::LightPollutionLimitingMagnitude,
    ),
    ("max_mag_nebula_name", SetPropertyId::MaxMagNebulaName),
    ("max_mag_star_name", SetPropertyId::MaxMagStarName),
    ("milky_way_intensity", SetPropertyId::MilkyWayIntensity),
    ("moon_scale", SetPropertyId::MoonScale),
    ("sky_culture", SetPropertyId::SkyCulture),
    ("sky_locale", SetPropertyId::SkyLocale),
    ("star_mag_scale", SetPropertyId::StarMagScale),
    ("star_scale", SetPropertyId::StarScale),
    ("star_twinkle_amount", SetPropertyId::StarTwinkleAmount),
    ("time_zone", SetPropertyId::TimeZone),
    ("zoom_offset", SetPropertyId::ZoomOffset),
];

/// Commands renamed or removed in earlier releases. Scripts using them
/// get a targeted deprecation message rather than a fuzzy suggestion.
const OBSOLETE_COMMANDS: &[(&str, &str)] = &[
    ("body", "select"),
    ("look", "moveto"),
    ("multiplier", "script action faster|slower"),
    ("multiply_rate", "timerate"),
    ("sky_culture", "set sky_culture"),
    ("sky_locale", "set sky_locale"),
];

impl CommandId {
    pub fn name(self) -> &'static str {
        name_of(COMMAND_NAMES, self)
    }
}

impl FlagId {
    pub fn name(self) -> &'static str {
        name_of(FLAG_NAMES, self)
    }
}

impl ColorPropertyId {
    pub fn name(self) -> &'static str {
        name_of(COLOR_PROPERTY_NAMES, self)
    }
}

impl SetPropertyId {
    pub fn name(self) -> &'static str {
        name_of(SET_PROPERTY_NAMES, self)
    }
}

fn name_of<T: Copy + PartialEq>(table: &'static [(&'static str, T)], id: T) -> &'static str {
    table
        .iter()
        .find(|(_, candidate)| *candidate == id)
        .map(|(name, _)| *name)
        .unwrap_or("?")
}

/// The four lookup tables, built once at startup.
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, CommandId>,
    flags: BTreeMap<&'static str, FlagId>,
    color_properties: BTreeMap<&'static str, ColorPropertyId>,
    set_properties: BTreeMap<&'static str, SetPropertyId>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry {
            commands: COMMAND_NAMES.iter().copied().collect(),
            flags: FLAG_NAMES.iter().copied().collect(),
            color_properties: COLOR_PROPERTY_NAMES.iter().copied().collect(),
            set_properties: SET_PROPERTY_NAMES.iter().copied().collect(),
        }
    }

    pub fn command(&self, name: &str) -> Result<CommandId, ScriptError> {
        if let Some(id) = self.commands.get(name) {
            return Ok(*id);
        }
        if let Some((_, replacement)) = OBSOLETE_COMMANDS
            .iter()
            .find(|(obsolete, _)| *obsolete == name)
        {
            return Err(ScriptError::ObsoleteName {
                name: name.to_string(),
                replacement,
            });
        }
        Err(ScriptError::UnknownCommand {
            name: name.to_string(),
            suggestion: suggest(name, self.commands.keys().copied()),
        })
    }

    pub fn flag(&self, name: &str) -> Result<FlagId, ScriptError> {
        lookup(&self.flags, name, "flag")
    }

    pub fn color_property(&self, name: &str) -> Result<ColorPropertyId, ScriptError> {
        lookup(&self.color_properties, name, "color property")
    }

    pub fn set_property(&self, name: &str) -> Result<SetPropertyId, ScriptError> {
        lookup(&self.set_properties, name, "set property")
    }
}

fn lookup<T: Copy>(
    table: &BTreeMap<&'static str, T>,
    name: &str,
    kind: &'static str,
) -> Result<T, ScriptError> {
    table
        .get(name)
        .copied()
        .ok_or_else(|| ScriptError::UnknownName {
            table: kind,
            name: name.to_string(),
            suggestion: suggest(name, table.keys().copied()),
        })
}

/// Distance above which a candidate is too different to suggest.
const SUGGESTION_THRESHOLD: usize = 3;

/// Nearest known name by Levenshtein distance, if close enough.
fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    candidates
        .map(|candidate| (candidate, levenshtein_distance(name, candidate)))
        .filter(|(_, distance)| *distance <= SUGGESTION_THRESHOLD)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.to_string())
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
