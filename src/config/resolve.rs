pub fn resolve_port() -> u16 {
    resolve_u64("--port", "PORT", 8080) as u16
}

pub fn resolve_bind_addr() -> String {
    resolve_str("--bind", "BIND_ADDR", "0.0.0.0")
}

/// Container deployments mount a `/data` volume; everything else gets a
/// directory next to the binary.
pub fn resolve_data_dir() -> String {
    let default = if std::path::Path::new("/data").exists() {
        "/data/vecstored"
    } else {
        "./data/vecstored"
    };
    resolve_str("--data-dir", "DATA_DIR", default)
}

pub fn resolve_collection() -> String {
    resolve_str("--collection", "COLLECTION", "default")
}

pub fn resolve_metric() -> String {
    resolve_str("--metric", "METRIC", "euclidean")
}

pub fn resolve_default_k() -> usize {
    resolve_usize("--default-k", "DEFAULT_K", 5)
}

pub fn resolve_max_k() -> usize {
    resolve_usize("--max-k", "MAX_K", 256)
}

pub fn resolve_max_vector_dim() -> usize {
    resolve_usize("--max-vector-dim", "MAX_VECTOR_DIM", 4096)
}

pub fn resolve_max_id_len() -> usize {
    resolve_usize("--max-id-len", "MAX_ID_LEN", 512)
}

pub fn resolve_parallel_scan() -> bool {
    resolve_bool("--parallel-scan", "PARALLEL_SCAN", true)
}

pub fn resolve_parallel_scan_min() -> usize {
    resolve_usize("--parallel-scan-min", "PARALLEL_SCAN_MIN", 4096)
}

pub fn resolve_simd_enabled() -> bool {
    resolve_bool("--simd", "SIMD_ENABLED", true)
}

pub fn resolve_cors_allowed_origins() -> Option<String> {
    cli_arg("--cors-allowed-origins").or_else(|| std::env::var("CORS_ALLOWED_ORIGINS").ok())
}

// Helpers

fn cli_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn resolve_str(flag: &str, env: &str, default: &str) -> String {
    if let Some(val) = cli_arg(flag) {
        return val;
    }
    if let Ok(val) = std::env::var(env) {
        if !val.is_empty() {
            return val;
        }
    }
    default.to_string()
}

fn resolve_usize(flag: &str, env: &str, default: usize) -> usize {
    if let Some(val_str) = cli_arg(flag) {
        if let Ok(v) = val_str.parse::<usize>() {
            return v;
        }
    }
    if let Ok(val_str) = std::env::var(env) {
        if let Ok(v) = val_str.parse::<usize>() {
            return v;
        }
    }
    default
}

fn resolve_u64(flag: &str, env: &str, default: u64) -> u64 {
    if let Some(val_str) = cli_arg(flag) {
        if let Ok(v) = val_str.parse::<u64>() {
            return v;
        }
    }
    if let Ok(val_str) = std::env::var(env) {
        if let Ok(v) = val_str.parse::<u64>() {
            return v;
        }
    }
    default
}

fn resolve_bool(flag: &str, env: &str, default: bool) -> bool {
    if let Some(val_str) = cli_arg(flag) {
        if let Ok(v) = val_str.parse::<bool>() {
            return v;
        }
    }
    if let Ok(val_str) = std::env::var(env) {
        if let Ok(v) = val_str.parse::<bool>() {
            return v;
        }
    }
    default
}
