//! # Kernel Configuration
//!
//! Session settings every peer must agree on, plus a handful of purely
//! local knobs (observer channel size, slow-dispatch logging).
//!
//! Loaded once at session start from TOML:
//!
//! ```toml
//! random_seed = 42
//! timestep_ms = 40
//! world_kind = "regular"
//! shroud_enabled = true
//!
//! [map]
//! width = 64
//! height = 64
//! position_bin_size = 8
//!
//! [screen]
//! tile_size = 24
//! bin_size = 256
//! ```

use serde::{Deserialize, Serialize};

use phalanx_shared::{DEFAULT_TILE_SIZE, DEFAULT_TIMESTEP_MS, EDITOR_WORLD_ENTITY_TYPE, WORLD_ENTITY_TYPE};

use crate::error::{KernelError, KernelResult};

/// What kind of world the session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldKind {
    /// A normal match.
    #[default]
    Regular,
    /// Menu background map. Only ticks when `show_shellmap` is set.
    Shellmap,
    /// Map editor.
    Editor,
}

impl WorldKind {
    /// Type name of the world entity created for this kind of world.
    #[must_use]
    pub const fn world_entity_type(self) -> &'static str {
        match self {
            Self::Editor => EDITOR_WORLD_ENTITY_TYPE,
            Self::Regular | Self::Shellmap => WORLD_ENTITY_TYPE,
        }
    }
}

/// How the render viewpoint behaves once its player's outcome is decided.
///
/// This is a presentation concern. It never influences the sync hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewpointPolicy {
    /// Drop the viewpoint (reveal everything) once the player won or lost.
    #[default]
    ClearWhenOutcomeDecided,
    /// Keep rendering from the player's perspective.
    Persist,
}

/// Map dimensions and proximity-bin layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map title (informational).
    pub title: String,
    /// Width in cells.
    pub width: i32,
    /// Height in cells.
    pub height: i32,
    /// Edge length of a proximity bin in cells.
    pub position_bin_size: i32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: String::from("Untitled"),
            width: 64,
            height: 64,
            position_bin_size: 8,
        }
    }
}

/// Screen projection and screen-index layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Screen pixels along one cell edge.
    pub tile_size: i32,
    /// Edge length of a screen-index bin in pixels.
    pub bin_size: i32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            bin_size: 256,
        }
    }
}

/// Configuration for a simulation session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Seed of the shared random stream. Must match on every peer.
    pub random_seed: u64,
    /// Simulation timestep in milliseconds.
    pub timestep_ms: u32,
    /// Kind of world.
    pub world_kind: WorldKind,
    /// Whether a shellmap world ticks.
    pub show_shellmap: bool,
    /// When false every player starts with the whole map explored.
    pub shroud_enabled: bool,
    /// Render viewpoint behaviour.
    pub viewpoint_policy: ViewpointPolicy,
    /// Capacity of each observer channel.
    pub event_capacity: usize,
    /// Trait ticks slower than this are logged. `0` disables the check.
    pub slow_dispatch_threshold_us: u64,
    /// Map layout.
    pub map: MapConfig,
    /// Screen layout.
    pub screen: ScreenConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            timestep_ms: DEFAULT_TIMESTEP_MS,
            world_kind: WorldKind::Regular,
            show_shellmap: false,
            shroud_enabled: true,
            viewpoint_policy: ViewpointPolicy::ClearWhenOutcomeDecided,
            event_capacity: 1024,
            slow_dispatch_threshold_us: 0,
            map: MapConfig::default(),
            screen: ScreenConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Default configuration with the given seed.
    #[must_use]
    pub fn with_seed(random_seed: u64) -> Self {
        Self {
            random_seed,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::InvalidConfig` if the document does not parse
    /// or a value is out of range.
    pub fn from_toml_str(source: &str) -> KernelResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| KernelError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> KernelResult<String> {
        toml::to_string(self).map_err(|e| KernelError::InvalidConfig(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::InvalidConfig` naming the first bad value.
    pub fn validate(&self) -> KernelResult<()> {
        if self.timestep_ms == 0 {
            return Err(KernelError::InvalidConfig("timestep_ms must be positive".into()));
        }
        if self.map.width <= 0 || self.map.height <= 0 {
            return Err(KernelError::InvalidConfig(format!(
                "map size must be positive, got {}x{}",
                self.map.width, self.map.height
            )));
        }
        if self.map.position_bin_size <= 0 {
            return Err(KernelError::InvalidConfig("map.position_bin_size must be positive".into()));
        }
        if self.screen.tile_size <= 0 || self.screen.bin_size <= 0 {
            return Err(KernelError::InvalidConfig("screen sizes must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(KernelError::InvalidConfig("event_capacity must be positive".into()));
        }
        Ok(())
    }
}
