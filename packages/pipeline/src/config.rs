//! Runtime configuration.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file,
//! 3. `MICROCLIMATE_*` environment variables.
//!
//! The merged configuration is validated before any work starts; an
//! out-of-range value is a fatal [`ConfigError`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use microclimate_features::DEFAULT_STREET_WIDTH_M;
use microclimate_geocoder::nominatim::DEFAULT_BASE_URL as DEFAULT_NOMINATIM_URL;
use microclimate_provider::era5_land::DEFAULT_ERA5_URL;
use microclimate_provider::mapillary::DEFAULT_MAPILLARY_URL;
use microclimate_provider::osm_buildings::DEFAULT_OVERPASS_URL;
use microclimate_provider::registry::ProviderOptions;
use microclimate_provider::stac::DEFAULT_STAC_URL;
use serde::{Deserialize, Serialize};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "MICROCLIMATE_";

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`RuntimeConfig`].
    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A field is out of range or could not be parsed.
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Settings of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Root of the content-addressed cache.
    pub cache_dir: PathBuf,
    /// Run seed mixed into every synthetic fallback.
    pub seed: u64,
    /// Edge length of a tile in meters (50..=2000).
    pub tile_size_m: u32,
    /// Raster resolution in meters (1..=250).
    pub resolution_m: u32,
    /// Concurrent per-tile tasks (1..=64).
    pub workers: usize,
    /// Neighbors each tile links to in the airflow graph (at least 1).
    pub k_neighbors: usize,
    /// Street width used for canyon proxies, in meters.
    pub street_width_m: f64,
    /// Enables geocoding and live provider calls.
    pub enable_optional_live_calls: bool,
    /// Timeout of every HTTP request, in seconds (1..=300).
    pub request_timeout_secs: u64,
    /// User agent sent to Nominatim and data APIs.
    pub geocoder_user_agent: String,
    /// Nominatim search endpoint.
    pub nominatim_url: String,
    /// STAC API root.
    pub stac_url: String,
    /// ERA5-Land archive endpoint.
    pub era5_url: String,
    /// Overpass interpreter endpoint.
    pub overpass_url: String,
    /// Mapillary images endpoint.
    pub mapillary_url: String,
    /// Mapillary access token.
    pub mapillary_access_token: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            seed: 42,
            tile_size_m: 300,
            resolution_m: 10,
            workers: 4,
            k_neighbors: 4,
            street_width_m: DEFAULT_STREET_WIDTH_M,
            enable_optional_live_calls: false,
            request_timeout_secs: 20,
            geocoder_user_agent: concat!("microclimate/", env!("CARGO_PKG_VERSION")).to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            stac_url: DEFAULT_STAC_URL.to_string(),
            era5_url: DEFAULT_ERA5_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            mapillary_url: DEFAULT_MAPILLARY_URL.to_string(),
            mapillary_access_token: None,
        }
    }
}

/// `$HOME/.cache/microclimate`, or `.cache/microclimate` when `HOME` is
/// unset.
fn default_cache_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from(".cache"), |home| PathBuf::from(home).join(".cache"))
        .join("microclimate")
}

impl RuntimeConfig {
    /// Loads defaults, then `path` (if any), then the process environment,
    /// and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// environment value cannot be parsed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML; absent fields take their defaults. Not validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed input or unknown fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `MICROCLIMATE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value cannot be parsed.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(value) = var("CACHE_DIR") {
            self.cache_dir = PathBuf::from(value);
        }
        override_parsed(&mut self.seed, var("SEED"), "seed")?;
        override_parsed(&mut self.tile_size_m, var("TILE_SIZE_M"), "tile_size_m")?;
        override_parsed(&mut self.resolution_m, var("RESOLUTION_M"), "resolution_m")?;
        override_parsed(&mut self.workers, var("WORKERS"), "workers")?;
        override_parsed(&mut self.k_neighbors, var("K_NEIGHBORS"), "k_neighbors")?;
        override_parsed(&mut self.street_width_m, var("STREET_WIDTH_M"), "street_width_m")?;
        if let Some(value) = var("ENABLE_OPTIONAL_LIVE_CALLS") {
            self.enable_optional_live_calls = parse_bool(&value)?;
        }
        override_parsed(
            &mut self.request_timeout_secs,
            var("REQUEST_TIMEOUT_SECS"),
            "request_timeout_secs",
        )?;
        for (suffix, field) in [
            ("GEOCODER_USER_AGENT", &mut self.geocoder_user_agent),
            ("NOMINATIM_URL", &mut self.nominatim_url),
            ("STAC_URL", &mut self.stac_url),
            ("ERA5_URL", &mut self.era5_url),
            ("OVERPASS_URL", &mut self.overpass_url),
            ("MAPILLARY_URL", &mut self.mapillary_url),
        ] {
            if let Some(value) = var(suffix) {
                *field = value;
            }
        }
        if let Some(value) = var("MAPILLARY_ACCESS_TOKEN") {
            self.mapillary_access_token = Some(value);
        }
        Ok(())
    }

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("tile_size_m", self.tile_size_m, 50..=2000)?;
        check_range("resolution_m", self.resolution_m, 1..=250)?;
        check_range("workers", self.workers, 1..=64)?;
        check_range("request_timeout_secs", self.request_timeout_secs, 1..=300)?;
        if self.k_neighbors == 0 {
            return Err(invalid("k_neighbors", "must be at least 1"));
        }
        if !(self.street_width_m.is_finite() && self.street_width_m > 0.0) {
            return Err(invalid(
                "street_width_m",
                format!("must be a positive number, got {}", self.street_width_m),
            ));
        }
        if self.geocoder_user_agent.trim().is_empty() {
            return Err(invalid("geocoder_user_agent", "must not be empty"));
        }
        Ok(())
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Provider construction options derived from this config.
    #[must_use]
    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            seed: self.seed,
            live_calls: self.enable_optional_live_calls,
            user_agent: self.geocoder_user_agent.clone(),
            timeout: self.request_timeout(),
            stac_url: self.stac_url.clone(),
            era5_url: self.era5_url.clone(),
            overpass_url: self.overpass_url.clone(),
            mapillary_url: self.mapillary_url.clone(),
            mapillary_access_token: self.mapillary_access_token.clone(),
        }
    }
}

fn override_parsed<T: std::str::FromStr>(
    target: &mut T,
    value: Option<String>,
    field: &'static str,
) -> Result<(), ConfigError>
where
    T::Err: std::fmt::Display,
{
    if let Some(value) = value {
        *target = value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(field, format!("'{value}': {e}")))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(
            "enable_optional_live_calls",
            format!("'{other}' is not a boolean"),
        )),
    }
}

fn check_range<T>(
    field: &'static str,
    value: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{value} is outside {}..={}", range.start(), range.end()),
        ))
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.tile_size_m, 300);
        assert_eq!(config.resolution_m, 10);
        assert!(!config.enable_optional_live_calls);
        assert!(config.cache_dir.ends_with("microclimate"));
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            seed = 7
            tile_size_m = 500
            mapillary_access_token = "MLY|abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.tile_size_m, 500);
        assert_eq!(config.resolution_m, 10);
        assert_eq!(config.mapillary_access_token.as_deref(), Some("MLY|abc"));
    }

    #[test]
    fn unknown_toml_fields_are_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("tile_size = 300"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = RuntimeConfig::from_toml_str("seed = 7").unwrap();
        config
            .apply_env(env(&[
                ("MICROCLIMATE_SEED", "99"),
                ("MICROCLIMATE_ENABLE_OPTIONAL_LIVE_CALLS", "true"),
                ("MICROCLIMATE_STAC_URL", "http://localhost:8080"),
                ("MICROCLIMATE_WORKERS", " "),
            ]))
            .unwrap();
        assert_eq!(config.seed, 99);
        assert!(config.enable_optional_live_calls);
        assert_eq!(config.stac_url, "http://localhost:8080");
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn unparsable_env_value_is_an_error() {
        let mut config = RuntimeConfig::default();
        let err = config
            .apply_env(env(&[("MICROCLIMATE_TILE_SIZE_M", "big")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tile_size_m", .. }));
    }

    #[test]
    fn validation_enforces_ranges() {
        let cases: [(&str, RuntimeConfig); 6] = [
            ("tile_size_m", RuntimeConfig { tile_size_m: 49, ..RuntimeConfig::default() }),
            ("tile_size_m", RuntimeConfig { tile_size_m: 2001, ..RuntimeConfig::default() }),
            ("resolution_m", RuntimeConfig { resolution_m: 0, ..RuntimeConfig::default() }),
            ("workers", RuntimeConfig { workers: 0, ..RuntimeConfig::default() }),
            ("k_neighbors", RuntimeConfig { k_neighbors: 0, ..RuntimeConfig::default() }),
            ("street_width_m", RuntimeConfig { street_width_m: f64::NAN, ..RuntimeConfig::default() }),
        ];
        for (expected, config) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("microclimate.toml");
        std::fs::write(&path, "resolution_m = 20\n").unwrap();
        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.resolution_m, 20);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RuntimeConfig::load(Some(Path::new("/nonexistent/microclimate.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn provider_options_follow_config() {
        let config = RuntimeConfig {
            seed: 5,
            request_timeout_secs: 3,
            ..RuntimeConfig::default()
        };
        let options = config.provider_options();
        assert_eq!(options.seed, 5);
        assert_eq!(options.timeout, Duration::from_secs(3));
        assert!(!options.live_calls);
    }
}
