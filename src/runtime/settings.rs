use crate::config;

/// Load settings, falling back to defaults on any problem.
///
/// Logging is configured from the result, so problems are returned as
/// messages for the caller to log once the subscriber is up.
pub fn load_settings() -> (config::Settings, Vec<String>) {
    match config::Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                (
                    config::Settings::default(),
                    vec![format!("invalid config, using defaults: {msg}")],
                )
            } else {
                (s, Vec::new())
            }
        }
        Err(e) => (
            // Config is optional; failures should not prevent the player from starting.
            config::Settings::default(),
            vec![format!("failed to load config, using defaults: {e}")],
        ),
    }
}
