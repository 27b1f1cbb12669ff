//! SQLite-backed service store and result sink.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use super::models::*;
use super::{ResultSink, SpecStore};

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/0001_init.sql"))
            .map_err(|e| DbError::Migration(format!("schema init failed: {}", e)))?;
        Ok(())
    }

    /// Insert a service and return its id. The mutation surface proper lives
    /// with the editor backend; this exists for seeding and tests.
    pub fn add_service(&self, name: &str, spec: &ServiceSpec) -> Result<i64, DbError> {
        let cols = ProbeColumns::from_probe(&spec.probe);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO services (name, host, port, healthcheck_method, healthcheck_path, \
             polling_interval, request_timeout, expected_status, status_mapping, http_method, \
             headers, body, ssl_verify, follow_redirects, tcp_send_data, tcp_expect_data, \
             udp_send_data, udp_expect_data, icmp_packet_count, dns_query_type, \
             dns_expected_result, kafka_topic, kafka_client_id, frontend_host_url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                name,
                spec.host,
                spec.port as i64,
                spec.probe.method_tag(),
                cols.path,
                spec.polling_interval.max(1) as i64,
                spec.timeout.max(1) as i64,
                cols.expected_status as i64,
                cols.status_mapping,
                cols.http_method,
                cols.headers,
                cols.body,
                cols.ssl_verify,
                cols.follow_redirects,
                cols.tcp_send_data,
                cols.tcp_expect_data,
                cols.udp_send_data,
                cols.udp_expect_data,
                cols.icmp_packet_count as i64,
                cols.dns_query_type,
                cols.dns_expected_result,
                cols.kafka_topic,
                cols.kafka_client_id,
                cols.frontend_host_url,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent results for one service, newest first.
    pub fn recent_results(&self, service_id: i64, limit: u32) -> Result<Vec<HealthcheckResult>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT service_id, status, status_code, response_time, error, checked_at \
             FROM healthcheck_results WHERE service_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let results = stmt
            .query_map(params![service_id, limit], |row| {
                Ok(HealthcheckResult {
                    service_id: row.get(0)?,
                    status: ServiceStatus::from_tag(&row.get::<_, String>(1)?),
                    status_code: row.get::<_, Option<i64>>(2)?.map(|c| c as u16),
                    latency_ms: row.get::<_, i64>(3)?.max(0) as u64,
                    error: row.get(4)?,
                    checked_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }
}

impl SpecStore for Store {
    fn list_all(&self) -> Result<Vec<Service>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, host, port, healthcheck_method, healthcheck_path, \
             polling_interval, request_timeout, expected_status, status_mapping, http_method, \
             headers, body, ssl_verify, follow_redirects, tcp_send_data, tcp_expect_data, \
             udp_send_data, udp_expect_data, icmp_packet_count, dns_query_type, \
             dns_expected_result, kafka_topic, kafka_client_id, frontend_host_url, \
             current_status, last_checked FROM services ORDER BY id",
        )?;
        let services = stmt
            .query_map([], service_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(services)
    }

    fn update_latest(
        &self,
        service_id: i64,
        status: ServiceStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE services SET current_status = ?1, last_checked = ?2 WHERE id = ?3",
            params![status.as_str(), checked_at, service_id],
        )?;
        Ok(())
    }
}

impl ResultSink for Store {
    fn append_result(&self, result: &HealthcheckResult) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO healthcheck_results (service_id, status, status_code, response_time, \
             error, checked_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.service_id,
                result.status.as_str(),
                result.status_code.map(|c| c as i64),
                result.latency_ms as i64,
                result.error,
                result.checked_at,
            ],
        )?;
        Ok(())
    }
}

fn service_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    let method: String = row.get(4)?;
    let path: String = row.get(5)?;
    let expected_status: i64 = row.get(8)?;
    let status_mapping: String = row.get(9)?;
    let http_method: String = row.get(10)?;
    let headers: String = row.get(11)?;
    let body: String = row.get(12)?;
    let ssl_verify: bool = row.get(13)?;
    let follow_redirects: bool = row.get(14)?;
    let tcp_send: String = row.get(15)?;
    let tcp_expect: String = row.get(16)?;
    let udp_send: String = row.get(17)?;
    let udp_expect: String = row.get(18)?;
    let icmp_count: i64 = row.get(19)?;
    let dns_type: String = row.get(20)?;
    let dns_expected: String = row.get(21)?;
    let kafka_topic: String = row.get(22)?;
    let kafka_client_id: String = row.get(23)?;
    let frontend_host: String = row.get(24)?;

    let http_options = || HttpOptions {
        path: path.clone(),
        method: HttpMethod::from_tag(&http_method),
        headers: parse_json_map(&headers),
        body: body.clone(),
        expected_status: expected_status.clamp(0, u16::MAX as i64) as u16,
        status_mapping: parse_json_map(&status_mapping),
        ssl_verify,
        follow_redirects,
    };
    let ws_options = || WsOptions {
        path: path.clone(),
        ssl_verify,
    };

    let probe = match method.as_str() {
        "HTTP" => ProbeSpec::Http(http_options()),
        "HTTPS" => ProbeSpec::Https(http_options()),
        "TCP" => ProbeSpec::Tcp(TcpOptions {
            send_data: non_empty(tcp_send),
            expect_data: non_empty(tcp_expect),
        }),
        "UDP" => ProbeSpec::Udp(UdpOptions {
            send_data: udp_send,
            expect_data: non_empty(udp_expect),
        }),
        "ICMP" => ProbeSpec::Icmp(IcmpOptions {
            packet_count: icmp_count.clamp(0, 10) as u32,
        }),
        "DNS" => match DnsQueryType::from_tag(&dns_type) {
            Some(query_type) => ProbeSpec::Dns(DnsOptions {
                query_type,
                expected: non_empty(dns_expected),
            }),
            None => ProbeSpec::Unsupported {
                requested: format!("DNS:{}", dns_type),
            },
        },
        "WEBSOCKET" => ProbeSpec::WebSocket(ws_options()),
        "WSS" => ProbeSpec::Wss(ws_options()),
        "GRPC" => ProbeSpec::Grpc(GrpcOptions {
            service: path.clone(),
        }),
        "SMTP" => ProbeSpec::Smtp,
        "FTP" => ProbeSpec::Ftp,
        "SSH" => ProbeSpec::Ssh,
        "REDIS" => ProbeSpec::Redis,
        "MYSQL" => ProbeSpec::Mysql,
        "POSTGRES" => ProbeSpec::Postgres(PostgresOptions {
            frontend_host: non_empty(frontend_host),
        }),
        "MONGODB" => ProbeSpec::MongoDb,
        "KAFKA" => ProbeSpec::Kafka(KafkaOptions {
            topic: non_empty(kafka_topic),
            client_id: non_empty(kafka_client_id),
        }),
        other => ProbeSpec::Unsupported {
            requested: other.to_string(),
        },
    };

    Ok(Service {
        name: row.get(1)?,
        spec: ServiceSpec {
            id: row.get(0)?,
            host: row.get(2)?,
            port: row.get::<_, i64>(3)?.clamp(0, u16::MAX as i64) as u16,
            polling_interval: row.get::<_, i64>(6)?.max(1) as u32,
            timeout: row.get::<_, i64>(7)?.max(1) as u32,
            probe,
        },
        current_status: ServiceStatus::from_tag(&row.get::<_, String>(25)?),
        last_checked: row.get(26)?,
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_json_map(raw: &str) -> HashMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Flat column values for the method-specific part of a spec.
#[derive(Default)]
struct ProbeColumns {
    path: String,
    expected_status: u16,
    status_mapping: String,
    http_method: String,
    headers: String,
    body: String,
    ssl_verify: bool,
    follow_redirects: bool,
    tcp_send_data: String,
    tcp_expect_data: String,
    udp_send_data: String,
    udp_expect_data: String,
    icmp_packet_count: u32,
    dns_query_type: String,
    dns_expected_result: String,
    kafka_topic: String,
    kafka_client_id: String,
    frontend_host_url: String,
}

impl ProbeColumns {
    fn from_probe(probe: &ProbeSpec) -> Self {
        let mut cols = Self {
            status_mapping: "{}".to_string(),
            headers: "{}".to_string(),
            http_method: "GET".to_string(),
            ssl_verify: true,
            follow_redirects: true,
            dns_query_type: "A".to_string(),
            ..Self::default()
        };
        match probe {
            ProbeSpec::Http(o) | ProbeSpec::Https(o) => {
                cols.path = o.path.clone();
                cols.expected_status = o.expected_status;
                cols.status_mapping =
                    serde_json::to_string(&o.status_mapping).unwrap_or_else(|_| "{}".to_string());
                cols.http_method = o.method.as_str().to_string();
                cols.headers =
                    serde_json::to_string(&o.headers).unwrap_or_else(|_| "{}".to_string());
                cols.body = o.body.clone();
                cols.ssl_verify = o.ssl_verify;
                cols.follow_redirects = o.follow_redirects;
            }
            ProbeSpec::Tcp(o) => {
                cols.tcp_send_data = o.send_data.clone().unwrap_or_default();
                cols.tcp_expect_data = o.expect_data.clone().unwrap_or_default();
            }
            ProbeSpec::Udp(o) => {
                cols.udp_send_data = o.send_data.clone();
                cols.udp_expect_data = o.expect_data.clone().unwrap_or_default();
            }
            ProbeSpec::Icmp(o) => cols.icmp_packet_count = o.packet_count,
            ProbeSpec::Dns(o) => {
                cols.dns_query_type = o.query_type.as_str().to_string();
                cols.dns_expected_result = o.expected.clone().unwrap_or_default();
            }
            ProbeSpec::WebSocket(o) | ProbeSpec::Wss(o) => {
                cols.path = o.path.clone();
                cols.ssl_verify = o.ssl_verify;
            }
            ProbeSpec::Grpc(o) => cols.path = o.service.clone(),
            ProbeSpec::Postgres(o) => {
                cols.frontend_host_url = o.frontend_host.clone().unwrap_or_default();
            }
            ProbeSpec::Kafka(o) => {
                cols.kafka_topic = o.topic.clone().unwrap_or_default();
                cols.kafka_client_id = o.client_id.clone().unwrap_or_default();
            }
            ProbeSpec::Smtp
            | ProbeSpec::Ftp
            | ProbeSpec::Ssh
            | ProbeSpec::Redis
            | ProbeSpec::Mysql
            | ProbeSpec::MongoDb
            | ProbeSpec::Unsupported { .. } => {}
        }
        cols
    }
}
