//! Per-image processing settings and the path-based classifier.
//!
//! Texture packs follow directory conventions: blocks tile seamlessly,
//! entity and model skins get their blocky silhouette back via relayering,
//! and fonts or colormaps must not be touched at all. [`Classifier`] turns
//! an asset path into [`ProcessSettings`] using those conventions.

use serde::{Deserialize, Serialize};

/// Compass direction of an image edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All four directions, in assembly order.
    pub const ALL: [Direction; 4] =
        [Direction::North, Direction::South, Direction::East, Direction::West];

    /// The direction on the other side of the image.
    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// North and south strips are stacked vertically.
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }
}

/// How the border strip on one edge is synthesized before upscaling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    /// Transparent border
    #[default]
    Void,
    /// Continue with the opposite edge (seamless tiling)
    Wrap,
    /// Repeat the outermost row/column
    Extend,
    /// Reflect the pixels nearest the edge
    Mirror,
}

impl std::fmt::Display for EdgeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeMode::Void => "void",
            EdgeMode::Wrap => "wrap",
            EdgeMode::Extend => "extend",
            EdgeMode::Mirror => "mirror",
        };
        f.write_str(s)
    }
}

/// Edge mode for each of the four edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileSettings {
    #[serde(default, alias = "n")]
    pub north: EdgeMode,
    #[serde(default, alias = "s")]
    pub south: EdgeMode,
    #[serde(default, alias = "e")]
    pub east: EdgeMode,
    #[serde(default, alias = "w")]
    pub west: EdgeMode,
}

impl TileSettings {
    /// Same mode on every edge.
    pub fn uniform(mode: EdgeMode) -> Self {
        Self { north: mode, south: mode, east: mode, west: mode }
    }

    pub fn get(&self, direction: Direction) -> EdgeMode {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }
}

/// Everything the pipeline needs to know about one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSettings {
    #[serde(default)]
    pub tile: TileSettings,
    /// Snap alpha to 0/255 after scaling (only if the source had no translucency)
    #[serde(default = "default_true")]
    pub cull_translucent: bool,
    /// Composite the nearest-neighbor original under transparent gaps
    #[serde(default)]
    pub relayer: bool,
    /// Return the source unchanged
    #[serde(default)]
    pub skip: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self { tile: TileSettings::default(), cull_translucent: true, relayer: false, skip: false }
    }
}

/// Path markers used by [`Classifier`].
///
/// Markers are matched against the lower-cased, `/`-separated path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Directories whose textures tile on all sides
    #[serde(default = "default_block_markers")]
    pub block: Vec<String>,
    /// Directories holding paintings
    #[serde(default = "default_painting_markers")]
    pub painting: Vec<String>,
    /// Edge mode applied to paintings
    #[serde(default = "default_painting_mode")]
    pub painting_mode: EdgeMode,
    /// Directories whose textures are relayered
    #[serde(default = "default_relayer_markers")]
    pub relayer: Vec<String>,
    /// Directories that are passed through unchanged
    #[serde(default = "default_skip_markers")]
    pub skip: Vec<String>,
    /// Path suffixes that are passed through unchanged
    #[serde(default = "default_skip_suffixes")]
    pub skip_suffixes: Vec<String>,
}

fn default_block_markers() -> Vec<String> {
    vec!["/block/".to_string()]
}

fn default_painting_markers() -> Vec<String> {
    vec!["/painting/".to_string()]
}

/// Paintings wrap rather than extend.
pub const DEFAULT_PAINTING_MODE: EdgeMode = EdgeMode::Wrap;

fn default_painting_mode() -> EdgeMode {
    DEFAULT_PAINTING_MODE
}

fn default_relayer_markers() -> Vec<String> {
    vec!["/model/".to_string(), "/entity/".to_string()]
}

fn default_skip_markers() -> Vec<String> {
    vec!["/font/".to_string(), "/colormap/".to_string()]
}

fn default_skip_suffixes() -> Vec<String> {
    vec!["pack.png".to_string(), "title/minecraft.png".to_string()]
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            block: default_block_markers(),
            painting: default_painting_markers(),
            painting_mode: default_painting_mode(),
            relayer: default_relayer_markers(),
            skip: default_skip_markers(),
            skip_suffixes: default_skip_suffixes(),
        }
    }
}

/// Maps asset paths to [`ProcessSettings`].
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifyConfig,
}

impl Classifier {
    pub fn new(config: ClassifyConfig) -> Self {
        let lower =
            |v: Vec<String>| -> Vec<String> { v.into_iter().map(|m| separators(&m)).collect() };
        Self {
            config: ClassifyConfig {
                block: lower(config.block),
                painting: lower(config.painting),
                painting_mode: config.painting_mode,
                relayer: lower(config.relayer),
                skip: lower(config.skip),
                skip_suffixes: lower(config.skip_suffixes),
            },
        }
    }

    pub fn config(&self) -> &ClassifyConfig {
        &self.config
    }

    /// Derive settings for `path`. First matching rule wins.
    pub fn classify(&self, path: &str) -> ProcessSettings {
        let path = normalize(path);
        let contains_any = |markers: &Vec<String>| markers.iter().any(|m| path.contains(m.as_str()));
        let ends_with_any =
            |suffixes: &Vec<String>| suffixes.iter().any(|s| path.ends_with(s.as_str()));

        let mut settings = ProcessSettings::default();
        if contains_any(&self.config.block) {
            settings.tile = TileSettings::uniform(EdgeMode::Wrap);
        } else if contains_any(&self.config.painting) {
            settings.tile = TileSettings::uniform(self.config.painting_mode);
        } else if contains_any(&self.config.relayer) {
            settings.relayer = true;
        } else if contains_any(&self.config.skip) || ends_with_any(&self.config.skip_suffixes) {
            settings.skip = true;
        }
        settings
    }
}

fn separators(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Lower-case, `/`-separated, and rooted so a leading directory matches.
fn normalize(path: &str) -> String {
    let path = separators(path);
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// Classify with the default markers.
pub fn classify(path: &str) -> ProcessSettings {
    Classifier::default().classify(path)
}
