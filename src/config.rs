use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENTRIES_URL: &str = "https://localhost/api/edst/entries";
pub const DEFAULT_AAR_URL: &str = "https://localhost/api/aar";
pub const DEFAULT_AMEND_URL: &str = "https://localhost/api/edst/amend";
pub const DEFAULT_REFRESH_SECS: u64 = 5;
pub const DEFAULT_ALLOW_HTTP: bool = false;
pub const DEFAULT_API_KEY_HEADER: &str = "api-auth";
pub const DEFAULT_LOG_FILE: &str = "edst-sync.log";
pub const DEFAULT_SECTORS_FILE: &str = "edst-sectors.toml";
pub const DEFAULT_SHARED_STATE_ENABLED: bool = false;
pub const DEFAULT_EVICT_AFTER_POLLS: u32 = 0;
pub const DEFAULT_PLAN_TTL_SECS: u64 = 120;
pub const DEFAULT_AUTO_EXPIRE_PLANS: bool = false;
pub const DEFAULT_AAR_TIMEOUT_SECS: u64 = 6;
pub const DEFAULT_STATUS_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub entries_url: String,
    pub entries_urls: Vec<String>,
    pub aar_url: String,
    pub amend_url: String,
    pub refresh: Duration,
    pub insecure: bool,
    pub allow_http: bool,
    pub allow_insecure: bool,
    pub config_path: PathBuf,
    pub api_key: String,
    pub api_key_header: String,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
    pub artcc_id: String,
    pub sector_id: String,
    pub sectors_file: String,
    pub selected_sectors: Vec<String>,
    pub shared_state_enabled: bool,
    pub peer_listen: String,
    pub peers: Vec<String>,
    pub evict_after_polls: u32,
    pub plan_ttl_secs: u64,
    pub auto_expire_plans: bool,
    pub aar_timeout_secs: u64,
    pub status_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entries_url: DEFAULT_ENTRIES_URL.to_string(),
            entries_urls: Vec::new(),
            aar_url: DEFAULT_AAR_URL.to_string(),
            amend_url: DEFAULT_AMEND_URL.to_string(),
            refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
            insecure: false,
            allow_http: DEFAULT_ALLOW_HTTP,
            allow_insecure: false,
            config_path: PathBuf::from("edst-sync.toml"),
            api_key: String::new(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            log_enabled: false,
            log_level: "info".to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            artcc_id: String::new(),
            sector_id: String::new(),
            sectors_file: DEFAULT_SECTORS_FILE.to_string(),
            selected_sectors: Vec::new(),
            shared_state_enabled: DEFAULT_SHARED_STATE_ENABLED,
            peer_listen: String::new(),
            peers: Vec::new(),
            evict_after_polls: DEFAULT_EVICT_AFTER_POLLS,
            plan_ttl_secs: DEFAULT_PLAN_TTL_SECS,
            auto_expire_plans: DEFAULT_AUTO_EXPIRE_PLANS,
            aar_timeout_secs: DEFAULT_AAR_TIMEOUT_SECS,
            status_secs: DEFAULT_STATUS_SECS,
        }
    }
}

impl Config {
    pub fn plan_ttl(&self) -> Duration {
        Duration::from_secs(self.plan_ttl_secs)
    }

    pub fn aar_timeout(&self) -> Duration {
        Duration::from_secs(self.aar_timeout_secs)
    }

    /// Peer id stamped on outbound envelopes.
    pub fn origin(&self) -> String {
        let host = env::var("HOSTNAME").unwrap_or_else(|_| "edst".to_string());
        format!("{host}-{}", std::process::id())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    entries_url: Option<String>,
    entries_urls: Option<Vec<String>>,
    aar_url: Option<String>,
    amend_url: Option<String>,
    refresh_secs: Option<u64>,
    insecure: Option<bool>,
    allow_http: Option<bool>,
    allow_insecure: Option<bool>,
    api_key: Option<String>,
    api_key_header: Option<String>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
    artcc_id: Option<String>,
    sector_id: Option<String>,
    sectors_file: Option<String>,
    selected_sectors: Option<Vec<String>>,
    shared_state_enabled: Option<bool>,
    peer_listen: Option<String>,
    peers: Option<Vec<String>>,
    evict_after_polls: Option<u32>,
    plan_ttl_secs: Option<u64>,
    auto_expire_plans: Option<bool>,
    aar_timeout_secs: Option<u64>,
    status_secs: Option<u64>,
}

pub fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_from(&args)
}

fn parse_from(args: &[String]) -> Result<Config> {
    let mut explicit_config: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--config needs a value"))?;
            explicit_config = Some(PathBuf::from(value));
        }
    }

    let env_config = env::var("EDST_CONFIG").ok().map(PathBuf::from);
    let config_path = explicit_config
        .clone()
        .or(env_config)
        .unwrap_or_else(|| PathBuf::from("edst-sync.toml"));

    let mut config = Config {
        config_path: config_path.clone(),
        ..Config::default()
    };

    if config_path.exists() {
        if let Some(file_config) = load_file_config(&config_path)? {
            apply_file_config(&mut config, file_config);
        }
    } else if explicit_config.is_some() {
        return Err(anyhow!("Config file not found: {}", config_path.display()));
    }

    apply_env(&mut config);
    apply_cli(&mut config, args)?;
    normalize_urls(&mut config);
    validate_security(&config)?;
    Ok(config)
}

fn env_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes" | "on")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn apply_env(config: &mut Config) {
    if let Ok(url) = env::var("EDST_ENTRIES_URL") {
        config.entries_url = url;
    }
    if let Ok(value) = env::var("EDST_ENTRIES_URLS") {
        let urls = split_list(&value);
        if !urls.is_empty() {
            config.entries_urls = urls;
        }
    }
    if let Ok(url) = env::var("EDST_AAR_URL") {
        config.aar_url = url;
    }
    if let Ok(url) = env::var("EDST_AMEND_URL") {
        config.amend_url = url;
    }
    if let Ok(value) = env::var("EDST_REFRESH") {
        if let Ok(secs) = value.parse::<u64>() {
            config.refresh = Duration::from_secs(secs.max(1));
        }
    }
    if let Ok(value) = env::var("EDST_INSECURE") {
        config.insecure = env_flag(&value);
    }
    if let Ok(value) = env::var("EDST_ALLOW_HTTP") {
        config.allow_http = env_flag(&value);
    }
    if let Ok(value) = env::var("EDST_ALLOW_INSECURE") {
        config.allow_insecure = env_flag(&value);
    }
    if let Ok(value) = env::var("EDST_API_KEY") {
        config.api_key = value;
    }
    if let Ok(value) = env::var("EDST_API_KEY_HEADER") {
        config.api_key_header = value;
    }
    if let Ok(value) = env::var("EDST_LOG_ENABLED") {
        config.log_enabled = env_flag(&value);
    }
    if let Ok(value) = env::var("EDST_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Ok(value) = env::var("EDST_LOG_FILE") {
        config.log_file = value;
    }
    if let Ok(value) = env::var("EDST_ARTCC") {
        config.artcc_id = value.trim().to_ascii_uppercase();
    }
    if let Ok(value) = env::var("EDST_SECTOR") {
        config.sector_id = value.trim().to_string();
    }
    if let Ok(value) = env::var("EDST_SECTORS_FILE") {
        config.sectors_file = value;
    }
    if let Ok(value) = env::var("EDST_SELECTED_SECTORS") {
        config.selected_sectors = split_list(&value);
    }
    if let Ok(value) = env::var("EDST_SHARED_STATE") {
        config.shared_state_enabled = env_flag(&value);
    }
    if let Ok(value) = env::var("EDST_PEER_LISTEN") {
        config.peer_listen = value;
    }
    if let Ok(value) = env::var("EDST_PEERS") {
        config.peers = split_list(&value);
    }
    if let Ok(value) = env::var("EDST_EVICT_AFTER_POLLS") {
        if let Ok(val) = value.parse::<u32>() {
            config.evict_after_polls = val;
        }
    }
    if let Ok(value) = env::var("EDST_PLAN_TTL") {
        if let Ok(val) = value.parse::<u64>() {
            config.plan_ttl_secs = val.max(1);
        }
    }
    if let Ok(value) = env::var("EDST_AUTO_EXPIRE_PLANS") {
        config.auto_expire_plans = env_flag(&value);
    }
    if let Ok(value) = env::var("EDST_AAR_TIMEOUT") {
        if let Ok(val) = value.parse::<u64>() {
            config.aar_timeout_secs = val.clamp(1, 60);
        }
    }
    if let Ok(value) = env::var("EDST_STATUS_SECS") {
        if let Ok(val) = value.parse::<u64>() {
            config.status_secs = val;
        }
    }
}

fn next_value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a String> {
    iter.next().ok_or_else(|| anyhow!("{flag} needs a value"))
}

fn apply_cli(config: &mut Config, args: &[String]) -> Result<()> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                iter.next();
            }
            "--url" | "--entries-url" => {
                config.entries_url = next_value(&mut iter, arg)?.to_string();
            }
            "--aar-url" => {
                config.aar_url = next_value(&mut iter, arg)?.to_string();
            }
            "--amend-url" => {
                config.amend_url = next_value(&mut iter, arg)?.to_string();
            }
            "--refresh" => {
                let secs: u64 = next_value(&mut iter, arg)?
                    .parse()
                    .context("--refresh expects seconds")?;
                config.refresh = Duration::from_secs(secs.max(1));
            }
            "--insecure" => {
                config.insecure = true;
            }
            "--allow-http" => {
                config.allow_http = true;
            }
            "--allow-insecure" => {
                config.allow_insecure = true;
            }
            "--api-key" => {
                config.api_key = next_value(&mut iter, arg)?.to_string();
            }
            "--api-key-header" => {
                config.api_key_header = next_value(&mut iter, arg)?.to_string();
            }
            "--log" => {
                config.log_enabled = true;
            }
            "--no-log" => {
                config.log_enabled = false;
            }
            "--log-level" => {
                config.log_level = next_value(&mut iter, arg)?.to_string();
            }
            "--log-file" => {
                config.log_file = next_value(&mut iter, arg)?.to_string();
            }
            "--artcc" => {
                config.artcc_id = next_value(&mut iter, arg)?.trim().to_ascii_uppercase();
            }
            "--sector" => {
                config.sector_id = next_value(&mut iter, arg)?.trim().to_string();
            }
            "--sectors-file" => {
                config.sectors_file = next_value(&mut iter, arg)?.to_string();
            }
            "--select" => {
                config.selected_sectors = split_list(next_value(&mut iter, arg)?);
            }
            "--shared" => {
                config.shared_state_enabled = true;
            }
            "--no-shared" => {
                config.shared_state_enabled = false;
            }
            "--listen" => {
                config.peer_listen = next_value(&mut iter, arg)?.to_string();
            }
            "--peer" => {
                let value = next_value(&mut iter, arg)?;
                config.peers.extend(split_list(value));
            }
            "--evict-after" => {
                config.evict_after_polls = next_value(&mut iter, arg)?
                    .parse()
                    .context("--evict-after expects a poll count")?;
            }
            "--plan-ttl" => {
                let secs: u64 = next_value(&mut iter, arg)?
                    .parse()
                    .context("--plan-ttl expects seconds")?;
                config.plan_ttl_secs = secs.max(1);
            }
            "--auto-expire-plans" => {
                config.auto_expire_plans = true;
            }
            "--aar-timeout" => {
                let secs: u64 = next_value(&mut iter, arg)?
                    .parse()
                    .context("--aar-timeout expects seconds")?;
                config.aar_timeout_secs = secs.clamp(1, 60);
            }
            "--status-secs" => {
                config.status_secs = next_value(&mut iter, arg)?
                    .parse()
                    .context("--status-secs expects seconds")?;
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }
    Ok(())
}

/// The primary URL always leads the fallback list.
fn normalize_urls(config: &mut Config) {
    config.entries_urls.retain(|u| !u.trim().is_empty());
    if config.entries_url.trim().is_empty() {
        if let Some(first) = config.entries_urls.first() {
            config.entries_url = first.clone();
        }
    } else {
        config.entries_urls.retain(|u| u != &config.entries_url);
        config.entries_urls.insert(0, config.entries_url.clone());
    }
}

fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(cfg))
}

fn apply_file_config(target: &mut Config, file: FileConfig) {
    if let Some(url) = file.entries_url {
        target.entries_url = url;
    }
    if let Some(urls) = file.entries_urls {
        target.entries_urls = urls;
    }
    if let Some(url) = file.aar_url {
        target.aar_url = url;
    }
    if let Some(url) = file.amend_url {
        target.amend_url = url;
    }
    if let Some(refresh) = file.refresh_secs {
        target.refresh = Duration::from_secs(refresh.max(1));
    }
    if let Some(insecure) = file.insecure {
        target.insecure = insecure;
    }
    if let Some(allow_http) = file.allow_http {
        target.allow_http = allow_http;
    }
    if let Some(allow_insecure) = file.allow_insecure {
        target.allow_insecure = allow_insecure;
    }
    if let Some(api_key) = file.api_key {
        target.api_key = api_key;
    }
    if let Some(header) = file.api_key_header {
        target.api_key_header = header;
    }
    if let Some(log_enabled) = file.log_enabled {
        target.log_enabled = log_enabled;
    }
    if let Some(log_level) = file.log_level {
        target.log_level = log_level;
    }
    if let Some(log_file) = file.log_file {
        target.log_file = log_file;
    }
    if let Some(artcc_id) = file.artcc_id {
        target.artcc_id = artcc_id.trim().to_ascii_uppercase();
    }
    if let Some(sector_id) = file.sector_id {
        target.sector_id = sector_id.trim().to_string();
    }
    if let Some(sectors_file) = file.sectors_file {
        target.sectors_file = sectors_file;
    }
    if let Some(selected) = file.selected_sectors {
        target.selected_sectors = selected;
    }
    if let Some(shared) = file.shared_state_enabled {
        target.shared_state_enabled = shared;
    }
    if let Some(listen) = file.peer_listen {
        target.peer_listen = listen;
    }
    if let Some(peers) = file.peers {
        target.peers = peers;
    }
    if let Some(evict) = file.evict_after_polls {
        target.evict_after_polls = evict;
    }
    if let Some(ttl) = file.plan_ttl_secs {
        target.plan_ttl_secs = ttl.max(1);
    }
    if let Some(auto_expire) = file.auto_expire_plans {
        target.auto_expire_plans = auto_expire;
    }
    if let Some(timeout) = file.aar_timeout_secs {
        target.aar_timeout_secs = timeout.clamp(1, 60);
    }
    if let Some(status) = file.status_secs {
        target.status_secs = status;
    }
}

fn print_help() {
    println!("edst-sync");
    println!("Usage: edst-sync [--config PATH] [--url URL] [--refresh SECONDS]");
    println!("       [--aar-url URL] [--amend-url URL] [--aar-timeout SECS]");
    println!("       [--insecure] [--allow-http] [--allow-insecure]");
    println!("       [--api-key KEY] [--api-key-header NAME]");
    println!("       [--log] [--no-log] [--log-level LEVEL] [--log-file PATH]");
    println!("       [--artcc ID] [--sector ID] [--sectors-file PATH] [--select ID,ID]");
    println!("       [--shared] [--no-shared] [--listen ADDR] [--peer ADDR]");
    println!("       [--evict-after POLLS] [--plan-ttl SECS] [--auto-expire-plans]");
    println!("       [--status-secs SECS]");
    println!("Environment: EDST_CONFIG overrides config path");
    println!("Environment: EDST_ENTRIES_URL overrides the primary entries URL");
    println!("Environment: EDST_ENTRIES_URLS sets comma-separated fallback URLs");
    println!("Environment: EDST_AAR_URL/EDST_AMEND_URL set the AAR and amend endpoints");
    println!("Environment: EDST_INSECURE=1 enables invalid TLS certs");
    println!("Environment: EDST_ALLOW_HTTP=1 allows http:// URLs");
    println!("Environment: EDST_ALLOW_INSECURE=1 allows --insecure");
    println!("Environment: EDST_API_KEY/EDST_API_KEY_HEADER configure API auth header");
    println!("Environment: EDST_LOG_ENABLED/LEVEL/FILE configure logging");
    println!("Environment: EDST_ARTCC EDST_SECTOR EDST_SECTORS_FILE EDST_SELECTED_SECTORS");
    println!("Environment: EDST_SHARED_STATE EDST_PEER_LISTEN EDST_PEERS configure peers");
    println!("Environment: EDST_EVICT_AFTER_POLLS EDST_PLAN_TTL EDST_AUTO_EXPIRE_PLANS");
    println!("Environment: EDST_STATUS_SECS sets the status log interval (0 disables)");
}

fn validate_security(config: &Config) -> Result<()> {
    let urls = config
        .entries_urls
        .iter()
        .chain([&config.entries_url, &config.aar_url, &config.amend_url]);
    for url in urls {
        let trimmed = url.trim();
        if trimmed.to_ascii_lowercase().starts_with("http://") && !config.allow_http {
            return Err(anyhow!(
                "Refusing insecure http URL {trimmed} (set allow_http=true or EDST_ALLOW_HTTP=1 to override)"
            ));
        }
    }
    if config.insecure && !config.allow_insecure {
        return Err(anyhow!(
            "Refusing --insecure without explicit allow_insecure=true or EDST_ALLOW_INSECURE=1"
        ));
    }
    if config.shared_state_enabled && config.sector_id.trim().is_empty() {
        return Err(anyhow!("Shared state needs a sector id (--sector or sector_id)"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        dir.push(format!("edst-sync-config-test-{suffix}"));
        let _ = fs::create_dir_all(&dir);
        dir.push(name);
        dir
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_pass_security() {
        let cfg = Config::default();
        assert!(validate_security(&cfg).is_ok());
        assert_eq!(cfg.refresh, Duration::from_secs(5));
        assert_eq!(cfg.evict_after_polls, 0);
        assert!(!cfg.auto_expire_plans);
    }

    #[test]
    fn http_url_rejected_when_disabled() {
        let cfg = Config {
            aar_url: "http://localhost/aar".to_string(),
            ..Config::default()
        };
        let err = validate_security(&cfg).unwrap_err();
        assert!(err.to_string().contains("Refusing insecure http URL"));
    }

    #[test]
    fn insecure_needs_opt_in() {
        let mut cfg = Config {
            insecure: true,
            ..Config::default()
        };
        assert!(validate_security(&cfg).is_err());
        cfg.allow_insecure = true;
        assert!(validate_security(&cfg).is_ok());
    }

    #[test]
    fn shared_state_needs_sector() {
        let mut cfg = Config {
            shared_state_enabled: true,
            ..Config::default()
        };
        assert!(validate_security(&cfg).is_err());
        cfg.sector_id = "37".to_string();
        assert!(validate_security(&cfg).is_ok());
    }

    #[test]
    fn load_file_config_parses_values() {
        let path = temp_file("config.toml");
        let content = r#"
entries_url = "https://example.test/entries"
refresh_secs = 3
api_key = "abc123"
log_enabled = true
log_level = "debug"
artcc_id = "zbw"
sector_id = "37"
selected_sectors = ["37", "38"]
shared_state_enabled = true
peers = ["10.0.0.2:7400"]
evict_after_polls = 12
plan_ttl_secs = 90
auto_expire_plans = true
"#;
        fs::write(&path, content).unwrap();
        let cfg = load_file_config(&path).unwrap().unwrap();
        assert_eq!(cfg.entries_url.as_deref(), Some("https://example.test/entries"));
        assert_eq!(cfg.refresh_secs, Some(3));
        assert_eq!(cfg.api_key.as_deref(), Some("abc123"));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.selected_sectors.as_ref().map(Vec::len), Some(2));
        assert_eq!(cfg.peers.as_ref().map(Vec::len), Some(1));
        assert_eq!(cfg.evict_after_polls, Some(12));
        assert_eq!(cfg.auto_expire_plans, Some(true));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn apply_file_config_overrides_and_clamps() {
        let mut cfg = Config::default();
        let file = FileConfig {
            refresh_secs: Some(0),
            artcc_id: Some(" zbw ".to_string()),
            plan_ttl_secs: Some(0),
            aar_timeout_secs: Some(600),
            log_file: Some("trace.log".to_string()),
            ..Default::default()
        };
        apply_file_config(&mut cfg, file);
        assert_eq!(cfg.refresh, Duration::from_secs(1));
        assert_eq!(cfg.artcc_id, "ZBW");
        assert_eq!(cfg.plan_ttl_secs, 1);
        assert_eq!(cfg.aar_timeout_secs, 60);
        assert_eq!(cfg.log_file, "trace.log");
    }

    #[test]
    fn cli_flags_layer_over_file() {
        let mut cfg = Config::default();
        apply_cli(
            &mut cfg,
            &args(&[
                "--artcc", "zny", "--sector", "10", "--peer", "a:1,b:2", "--peer", "c:3",
                "--evict-after", "4", "--auto-expire-plans",
            ]),
        )
        .unwrap();
        assert_eq!(cfg.artcc_id, "ZNY");
        assert_eq!(cfg.sector_id, "10");
        assert_eq!(cfg.peers, vec!["a:1", "b:2", "c:3"]);
        assert_eq!(cfg.evict_after_polls, 4);
        assert!(cfg.auto_expire_plans);

        let err = apply_cli(&mut cfg, &args(&["--bogus"])).unwrap_err();
        assert!(err.to_string().contains("Unknown argument"));
        assert!(apply_cli(&mut cfg, &args(&["--refresh"])).is_err());
    }

    #[test]
    fn primary_url_leads_fallbacks() {
        let mut cfg = Config {
            entries_url: "https://b.test".to_string(),
            entries_urls: vec!["https://a.test".to_string(), "https://b.test".to_string()],
            ..Config::default()
        };
        normalize_urls(&mut cfg);
        assert_eq!(cfg.entries_urls, vec!["https://b.test", "https://a.test"]);
    }
}
