//! Core model types for the probing engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Unknown,
    Alive,
    Dead,
    Degraded,
    Checking,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Alive => "alive",
            ServiceStatus::Dead => "dead",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Checking => "checking",
        }
    }

    /// Parse a stored status tag. Anything unrecognized reads as `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "alive" => ServiceStatus::Alive,
            "dead" => ServiceStatus::Dead,
            "degraded" => ServiceStatus::Degraded,
            "checking" => ServiceStatus::Checking,
            _ => ServiceStatus::Unknown,
        }
    }
}

/// HTTP request method used by the HTTP/HTTPS probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Parse a stored method tag, defaulting to GET.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            _ => HttpMethod::Get,
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

/// DNS record type queried by the DNS probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsQueryType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Soa,
}

impl DnsQueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsQueryType::A => "A",
            DnsQueryType::Aaaa => "AAAA",
            DnsQueryType::Cname => "CNAME",
            DnsQueryType::Mx => "MX",
            DnsQueryType::Txt => "TXT",
            DnsQueryType::Ns => "NS",
            DnsQueryType::Soa => "SOA",
        }
    }

    /// Parse a stored query-type tag. Empty means the column default (A).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "" | "A" => Some(DnsQueryType::A),
            "AAAA" => Some(DnsQueryType::Aaaa),
            "CNAME" => Some(DnsQueryType::Cname),
            "MX" => Some(DnsQueryType::Mx),
            "TXT" => Some(DnsQueryType::Txt),
            "NS" => Some(DnsQueryType::Ns),
            "SOA" => Some(DnsQueryType::Soa),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOptions {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    pub expected_status: u16,
    #[serde(default)]
    pub status_mapping: HashMap<String, String>,
    pub ssl_verify: bool,
    pub follow_redirects: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpOptions {
    #[serde(default)]
    pub send_data: Option<String>,
    #[serde(default)]
    pub expect_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpOptions {
    /// Required; the probe fails before any I/O when empty.
    #[serde(default)]
    pub send_data: String,
    #[serde(default)]
    pub expect_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcmpOptions {
    /// Packets per probe; 0 means unset.
    pub packet_count: u32,
}

impl IcmpOptions {
    /// Packet count clamped to 1..=10, defaulting to 3 when unset.
    pub fn effective_count(&self) -> u32 {
        if self.packet_count == 0 {
            3
        } else {
            self.packet_count.clamp(1, 10)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsOptions {
    pub query_type: DnsQueryType,
    #[serde(default)]
    pub expected: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsOptions {
    pub path: String,
    pub ssl_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcOptions {
    /// Service name passed to the standard gRPC health check.
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresOptions {
    /// When set, its hostname replaces the spec host for the connection.
    #[serde(default)]
    pub frontend_host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaOptions {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Method-specific probe recipe. One variant per supported protocol tag;
/// methods read from storage that do not parse are preserved as
/// `Unsupported` so the failure is recorded as a result instead of being
/// dropped at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum ProbeSpec {
    Http(HttpOptions),
    Https(HttpOptions),
    Tcp(TcpOptions),
    Udp(UdpOptions),
    Icmp(IcmpOptions),
    Dns(DnsOptions),
    WebSocket(WsOptions),
    Wss(WsOptions),
    Grpc(GrpcOptions),
    Smtp,
    Ftp,
    Ssh,
    Redis,
    Mysql,
    Postgres(PostgresOptions),
    MongoDb,
    Kafka(KafkaOptions),
    Unsupported { requested: String },
}

impl ProbeSpec {
    /// The URL path (or gRPC service name) this method requires, if any.
    /// Methods returning `Some` are skipped by the scheduler while the
    /// value is empty.
    pub fn required_path(&self) -> Option<&str> {
        match self {
            ProbeSpec::Http(o) | ProbeSpec::Https(o) => Some(&o.path),
            ProbeSpec::WebSocket(o) | ProbeSpec::Wss(o) => Some(&o.path),
            ProbeSpec::Grpc(o) => Some(&o.service),
            _ => None,
        }
    }

    pub fn method_tag(&self) -> &str {
        match self {
            ProbeSpec::Http(_) => "HTTP",
            ProbeSpec::Https(_) => "HTTPS",
            ProbeSpec::Tcp(_) => "TCP",
            ProbeSpec::Udp(_) => "UDP",
            ProbeSpec::Icmp(_) => "ICMP",
            ProbeSpec::Dns(_) => "DNS",
            ProbeSpec::WebSocket(_) => "WEBSOCKET",
            ProbeSpec::Wss(_) => "WSS",
            ProbeSpec::Grpc(_) => "GRPC",
            ProbeSpec::Smtp => "SMTP",
            ProbeSpec::Ftp => "FTP",
            ProbeSpec::Ssh => "SSH",
            ProbeSpec::Redis => "REDIS",
            ProbeSpec::Mysql => "MYSQL",
            ProbeSpec::Postgres(_) => "POSTGRES",
            ProbeSpec::MongoDb => "MONGODB",
            ProbeSpec::Kafka(_) => "KAFKA",
            ProbeSpec::Unsupported { requested } => requested,
        }
    }
}

/// The probe recipe for one service: common envelope plus the
/// method-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub id: i64,
    pub host: String,
    pub port: u16,
    /// Seconds between probes.
    pub polling_interval: u32,
    /// Per-probe deadline, seconds.
    pub timeout: u32,
    pub probe: ProbeSpec,
}

/// A service row as seen by the scheduler: the spec plus its latest
/// projection.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub name: String,
    pub spec: ServiceSpec,
    pub current_status: ServiceStatus,
    pub last_checked: Option<DateTime<Utc>>,
}

/// One persisted probe outcome. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct HealthcheckResult {
    pub service_id: i64,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Real-time status transition broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub service_id: i64,
    pub status: ServiceStatus,
    pub timestamp: DateTime<Utc>,
}
