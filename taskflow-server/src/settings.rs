use std::time::Duration;

use clap::Parser;
use taskflow_resources::ResourceManagerConfig;

/// Environment-driven configuration (spec.md §6: "environment: DB URL/
/// credentials, per-pool limits, LLM endpoint+key, optional search API
/// key"). Mirrors `adk-cli`'s pattern of a `clap`-derived struct with `env`
/// attributes rather than a YAML/config-file loader.
#[derive(Debug, Clone, Parser)]
#[command(name = "taskflow-server", version, about = "Taskflow HTTP server")]
pub struct Settings {
    #[arg(long, env = "TASKFLOW_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    #[arg(long, env = "TASKFLOW_DATABASE_URL", default_value = "sqlite::memory:")]
    pub database_url: String,

    #[arg(long, env = "TASKFLOW_LLM_ENDPOINT", default_value = "https://api.openai.com/v1/responses")]
    pub llm_endpoint: String,

    #[arg(long, env = "TASKFLOW_LLM_API_KEY", default_value = "")]
    pub llm_api_key: String,

    #[arg(long, env = "TASKFLOW_SEARCH_API_KEY")]
    pub search_api_key: Option<String>,

    #[arg(long, env = "TASKFLOW_LLM_MAX_CONCURRENT", default_value_t = 10)]
    pub llm_max_concurrent: usize,

    #[arg(long, env = "TASKFLOW_LLM_RATE_LIMIT", default_value_t = 60)]
    pub llm_rate_limit: usize,

    #[arg(long, env = "TASKFLOW_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub database_max_connections: usize,

    #[arg(long, env = "TASKFLOW_WORKER_MAX_WORKERS", default_value_t = 8)]
    pub worker_max_workers: usize,

    #[arg(long, env = "TASKFLOW_MAX_STEPS", default_value_t = 50)]
    pub max_steps: usize,
}

impl Settings {
    /// spec.md §4.5's pool defaults, overridden by whichever of the above
    /// the environment set.
    pub fn resource_config(&self) -> ResourceManagerConfig {
        ResourceManagerConfig {
            llm_max_concurrent: self.llm_max_concurrent,
            llm_rate_limit: self.llm_rate_limit,
            llm_window: Duration::from_secs(60),
            database_max_connections: self.database_max_connections,
            worker_max_workers: self.worker_max_workers,
            worker_task_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_arguments() {
        let settings = Settings::parse_from(["taskflow-server"]);
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.max_steps, 50);
        assert!(settings.search_api_key.is_none());
    }

    #[test]
    fn resource_config_reflects_pool_overrides() {
        let settings = Settings::parse_from([
            "taskflow-server",
            "--llm-max-concurrent",
            "3",
            "--db-max-connections",
            "7",
        ]);
        let config = settings.resource_config();
        assert_eq!(config.llm_max_concurrent, 3);
        assert_eq!(config.database_max_connections, 7);
    }
}
