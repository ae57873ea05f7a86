/// Configuration default values
///
/// All default values for configuration options live here.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Query service defaults
pub const DEFAULT_CHANNELS_PATH: &str = "./data/channels.parquet";
pub const DEFAULT_PROGRAMS_PATH: &str = "./data/programs.parquet";
pub const DEFAULT_DISPLAY_TIMEZONE: &str = "America/New_York";

// Output defaults
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
