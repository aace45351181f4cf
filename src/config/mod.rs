mod resolve;

use crate::vector::Metric;
use std::net::{IpAddr, Ipv4Addr};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub data_dir: Option<String>,
    pub collection: String,
    pub metric: Metric,
    pub default_k: usize,
    pub max_k: usize,
    pub max_vector_dim: usize,
    pub max_id_len: usize,
    pub simd_enabled: bool,
    pub parallel_scan: bool,
    pub parallel_scan_min: usize,
    pub cors_allowed_origins: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            data_dir: None,
            collection: "default".to_string(),
            metric: Metric::Euclidean,
            default_k: 5,
            max_k: 256,
            max_vector_dim: 4096,
            max_id_len: 512,
            simd_enabled: true,
            parallel_scan: true,
            parallel_scan_min: 4096,
            cors_allowed_origins: None,
        }
    }
}

impl Config {
    /// Every knob resolves CLI flag, then environment, then default.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_raw = resolve::resolve_bind_addr();
        let bind_addr: IpAddr = bind_raw
            .parse()
            .map_err(|_| anyhow::anyhow!("BIND_ADDR is not a valid IP address: `{bind_raw}`"))?;
        let metric_raw = resolve::resolve_metric();
        let metric = Metric::parse(&metric_raw).ok_or_else(|| {
            anyhow::anyhow!("METRIC must be `euclidean` or `cosine`, got `{metric_raw}`")
        })?;
        Ok(Self {
            port: resolve::resolve_port(),
            bind_addr,
            data_dir: Some(resolve::resolve_data_dir()),
            collection: resolve::resolve_collection(),
            metric,
            default_k: resolve::resolve_default_k(),
            max_k: resolve::resolve_max_k(),
            max_vector_dim: resolve::resolve_max_vector_dim(),
            max_id_len: resolve::resolve_max_id_len(),
            simd_enabled: resolve::resolve_simd_enabled(),
            parallel_scan: resolve::resolve_parallel_scan(),
            parallel_scan_min: resolve::resolve_parallel_scan_min(),
            cors_allowed_origins: resolve::resolve_cors_allowed_origins(),
        })
    }
}
