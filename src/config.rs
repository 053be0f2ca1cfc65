use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub recalibration: RecalibrationConfig,
    pub interactions: InteractionLogConfig,
    pub paths: PathConfig,
    pub workers: WorkerConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            host,
            port,
            log_level,
            recalibration: RecalibrationConfig::from_env(),
            interactions: InteractionLogConfig::from_env(),
            paths: PathConfig::from_env(),
            workers: WorkerConfig::from_env(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            recalibration: RecalibrationConfig::default(),
            interactions: InteractionLogConfig::default(),
            paths: PathConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecalibrationConfig {
    pub batch_size: u32,
    pub deploy_threshold: f64,
    pub auto_deploy: bool,
    pub schedule: String,
    pub trained_by: String,
}

impl RecalibrationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_u32("RETRAIN_BATCH_SIZE", defaults.batch_size).max(1),
            deploy_threshold: env_f64("RETRAIN_DEPLOY_THRESHOLD", defaults.deploy_threshold),
            auto_deploy: env_bool("RETRAIN_AUTO_DEPLOY", defaults.auto_deploy),
            schedule: std::env::var("RETRAIN_SCHEDULE").unwrap_or(defaults.schedule),
            trained_by: defaults.trained_by,
        }
    }
}

impl Default for RecalibrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            deploy_threshold: 0.75,
            auto_deploy: true,
            schedule: "0 0 3 * * 0".to_string(),
            trained_by: "automated_system".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionLogConfig {
    pub anonymization_salt: String,
    pub retention_days: i64,
    pub retention_schedule: String,
    pub export_batch_size: i64,
    pub max_page_size: i64,
}

impl InteractionLogConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            anonymization_salt: std::env::var("ANONYMIZATION_SALT").unwrap_or_default(),
            retention_days: env_i64("INTERACTION_RETENTION_DAYS", defaults.retention_days).max(1),
            retention_schedule: std::env::var("RETENTION_SCHEDULE")
                .unwrap_or(defaults.retention_schedule),
            export_batch_size: env_i64("EXPORT_BATCH_SIZE", defaults.export_batch_size).max(1),
            max_page_size: defaults.max_page_size,
        }
    }
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            anonymization_salt: String::new(),
            retention_days: 365,
            retention_schedule: "0 30 2 * * *".to_string(),
            export_batch_size: 10_000,
            max_page_size: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathConfig {
    pub recent_window_days: i64,
    pub weak_skill_threshold: f64,
    pub regenerate_every: u32,
}

impl PathConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            recent_window_days: env_i64("PATH_RECENT_WINDOW_DAYS", defaults.recent_window_days),
            weak_skill_threshold: env_f64("PATH_WEAK_SKILL_THRESHOLD", defaults.weak_skill_threshold),
            regenerate_every: env_u32("PATH_REGENERATE_EVERY", defaults.regenerate_every).max(1),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            recent_window_days: 30,
            weak_skill_threshold: 0.6,
            regenerate_every: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub leader: bool,
    pub recalibration_enabled: bool,
    pub retention_enabled: bool,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            leader: env_bool("WORKER_LEADER", false),
            recalibration_enabled: env_bool("ENABLE_RECALIBRATION_WORKER", true),
            retention_enabled: env_bool("ENABLE_RETENTION_WORKER", true),
        }
    }
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

pub(crate) fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}
