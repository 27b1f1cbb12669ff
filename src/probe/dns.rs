//! DNS probe implementation.

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{Name, RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

use super::{ProbeError, ProbeOutcome};
use crate::db::{DnsOptions, DnsQueryType};

/// Resolve the host with the configured query type; when an expected value
/// is set, require at least one record to match it.
pub(super) async fn probe(
    host: &str,
    opts: &DnsOptions,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let mut resolver_opts = ResolverOpts::default();
    resolver_opts.timeout = deadline;
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), resolver_opts);

    let lookup = resolver
        .lookup(host, record_type(opts.query_type))
        .await
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    if let Some(expected) = opts.expected.as_deref().filter(|s| !s.is_empty()) {
        let matched = lookup
            .iter()
            .any(|rdata| rdata_matches(rdata, opts.query_type, expected));
        if !matched {
            return Err(ProbeError::Network(format!(
                "expected {} record '{}' not found in DNS response",
                opts.query_type.as_str(),
                expected
            )));
        }
    }

    Ok(ProbeOutcome::alive())
}

fn record_type(query_type: DnsQueryType) -> RecordType {
    match query_type {
        DnsQueryType::A => RecordType::A,
        DnsQueryType::Aaaa => RecordType::AAAA,
        DnsQueryType::Cname => RecordType::CNAME,
        DnsQueryType::Mx => RecordType::MX,
        DnsQueryType::Txt => RecordType::TXT,
        DnsQueryType::Ns => RecordType::NS,
        DnsQueryType::Soa => RecordType::SOA,
    }
}

/// Match one record against the expected value using the per-type rule:
/// exact IP for A/AAAA, name equality for CNAME/MX/NS (and the primary name
/// server for SOA), substring for TXT.
fn rdata_matches(rdata: &RData, query_type: DnsQueryType, expected: &str) -> bool {
    match (query_type, rdata) {
        (DnsQueryType::A, RData::A(a)) => ip_matches(IpAddr::V4(a.0), expected),
        (DnsQueryType::Aaaa, RData::AAAA(aaaa)) => ip_matches(IpAddr::V6(aaaa.0), expected),
        (DnsQueryType::Cname, RData::CNAME(cname)) => name_matches(&cname.0, expected),
        (DnsQueryType::Mx, RData::MX(mx)) => name_matches(mx.exchange(), expected),
        (DnsQueryType::Ns, RData::NS(ns)) => name_matches(&ns.0, expected),
        (DnsQueryType::Soa, RData::SOA(soa)) => name_matches(soa.mname(), expected),
        (DnsQueryType::Txt, RData::TXT(txt)) => txt
            .txt_data()
            .iter()
            .any(|chunk| String::from_utf8_lossy(chunk).contains(expected)),
        _ => false,
    }
}

fn ip_matches(ip: IpAddr, expected: &str) -> bool {
    match expected.parse::<IpAddr>() {
        Ok(want) => ip == want,
        Err(_) => false,
    }
}

fn name_matches(name: &Name, expected: &str) -> bool {
    let canonical = name.to_utf8();
    canonical
        .trim_end_matches('.')
        .eq_ignore_ascii_case(expected.trim_end_matches('.'))
}
