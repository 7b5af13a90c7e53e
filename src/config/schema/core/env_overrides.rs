use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CONVO_ACTION_ENDPOINT_URL")
            && !url.is_empty()
        {
            self.action_endpoint.url = url;
        }

        if let Ok(timeout_str) = std::env::var("CONVO_ACTION_TIMEOUT_SECS")
            && let Ok(timeout) = timeout_str.parse::<u64>()
            && timeout > 0
        {
            self.action_endpoint.timeout_secs = timeout;
        }

        if let Ok(level) = std::env::var("CONVO_LOG_LEVEL")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }

        if let Ok(history_str) = std::env::var("CONVO_MAX_HISTORY")
            && let Ok(history) = history_str.parse::<usize>()
            && history > 0
        {
            self.validation.max_history = Some(history);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::core::test_env::{ENV_LOCK, EnvVarGuard};

    #[test]
    fn env_overrides_replace_file_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _url = EnvVarGuard::set("CONVO_ACTION_ENDPOINT_URL", "http://actions:5055/webhook");
        let _timeout = EnvVarGuard::set("CONVO_ACTION_TIMEOUT_SECS", "30");
        let _level = EnvVarGuard::set("CONVO_LOG_LEVEL", "debug");
        let _history = EnvVarGuard::set("CONVO_MAX_HISTORY", "4");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.action_endpoint.url, "http://actions:5055/webhook");
        assert_eq!(config.action_endpoint.timeout_secs, 30);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.validation.max_history, Some(4));
    }

    #[test]
    fn unparseable_or_empty_values_are_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _url = EnvVarGuard::set("CONVO_ACTION_ENDPOINT_URL", "");
        let _timeout = EnvVarGuard::set("CONVO_ACTION_TIMEOUT_SECS", "soon");
        let _level = EnvVarGuard::unset("CONVO_LOG_LEVEL");
        let _history = EnvVarGuard::set("CONVO_MAX_HISTORY", "0");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config, Config::default());
    }
}
