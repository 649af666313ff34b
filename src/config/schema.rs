//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Upstream address of every backend service.
    pub services: ServicesConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listening port.
    pub port: u16,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl ListenerConfig {
    /// `host:port` string suitable for parsing into a socket address.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// The backend services sitting behind the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    FaceRecognition,
    UserManagement,
    Auth,
    Attendance,
    Notification,
    Analytics,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::FaceRecognition,
        Service::UserManagement,
        Service::Auth,
        Service::Attendance,
        Service::Notification,
        Service::Analytics,
    ];

    /// Path prefix routed to this service.
    pub fn prefix(self) -> &'static str {
        match self {
            Service::FaceRecognition => "/face-recognition",
            Service::UserManagement => "/user-management",
            Service::Auth => "/auth",
            Service::Attendance => "/attendance",
            Service::Notification => "/notification",
            Service::Analytics => "/analytics",
        }
    }

    /// Short name used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            Service::FaceRecognition => "face_recognition",
            Service::UserManagement => "user_management",
            Service::Auth => "auth",
            Service::Attendance => "attendance",
            Service::Notification => "notification",
            Service::Analytics => "analytics",
        }
    }

    /// Environment variable that overrides the upstream address.
    pub fn env_var(self) -> &'static str {
        match self {
            Service::FaceRecognition => "FACE_RECOGNITION_URL",
            Service::UserManagement => "USER_MANAGEMENT_URL",
            Service::Auth => "AUTH_URL",
            Service::Attendance => "ATTENDANCE_URL",
            Service::Notification => "NOTIFICATION_URL",
            Service::Analytics => "ANALYTICS_URL",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Upstream address per service (e.g., "http://127.0.0.1:8001" or "auth:8000").
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub face_recognition: String,
    pub user_management: String,
    pub auth: String,
    pub attendance: String,
    pub notification: String,
    pub analytics: String,
}

impl ServicesConfig {
    /// Upstream address configured for `service`.
    pub fn address(&self, service: Service) -> &str {
        match service {
            Service::FaceRecognition => &self.face_recognition,
            Service::UserManagement => &self.user_management,
            Service::Auth => &self.auth,
            Service::Attendance => &self.attendance,
            Service::Notification => &self.notification,
            Service::Analytics => &self.analytics,
        }
    }

    /// Mutable access to the address of `service`.
    pub fn address_mut(&mut self, service: Service) -> &mut String {
        match service {
            Service::FaceRecognition => &mut self.face_recognition,
            Service::UserManagement => &mut self.user_management,
            Service::Auth => &mut self.auth,
            Service::Attendance => &mut self.attendance,
            Service::Notification => &mut self.notification,
            Service::Analytics => &mut self.analytics,
        }
    }

    /// Point every service at the same upstream.
    pub fn all(address: impl Into<String>) -> Self {
        let address = address.into();
        let mut services = Self::default();
        for service in Service::ALL {
            *services.address_mut(service) = address.clone();
        }
        services
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            face_recognition: "http://127.0.0.1:8001".to_string(),
            user_management: "http://127.0.0.1:8002".to_string(),
            auth: "http://127.0.0.1:8003".to_string(),
            attendance: "http://127.0.0.1:8004".to_string(),
            notification: "http://127.0.0.1:8005".to_string(),
            analytics: "http://127.0.0.1:8006".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Length of one fixed window in seconds.
    pub window_secs: u64,

    /// Maximum requests per client per window.
    pub max_requests: u64,

    /// How often expired counters are evicted, in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            sweep_interval_secs: 60,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce response headers, in seconds.
    pub upstream_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
