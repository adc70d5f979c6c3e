use anyhow::{Context, Result};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};

use edst_sync::aar::spawn_aar_fetcher;
use edst_sync::config::{parse_args, Config};
use edst_sync::filters::DefaultFilters;
use edst_sync::logging::init as init_logging;
use edst_sync::net::{spawn_amend_sender, spawn_fetcher, ApiAuth};
use edst_sync::peer::{spawn_peer_listener, TcpPeerChannel};
use edst_sync::refresh::RefreshCycle;
use edst_sync::runtime::{Channels, Runtime};
use edst_sync::sectors::{SectorData, SectorFile};
use edst_sync::shared::{Room, SharedUiBus};
use edst_sync::storage::{load_sector_file, save_sector_file};
use edst_sync::store::StateStore;

fn api_auth(config: &Config) -> ApiAuth {
    let non_empty = |value: &str| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    };
    ApiAuth {
        key: non_empty(&config.api_key),
        header: non_empty(&config.api_key_header),
    }
}

fn main() -> Result<()> {
    let config = parse_args()?;
    let _log_guard = init_logging(&config);
    info!("edst-sync starting");
    debug!("config path: {}", config.config_path.display());

    let sectors_path = Path::new(&config.sectors_file);
    let sector_file = load_sector_file(sectors_path)
        .with_context(|| format!("loading sectors from {}", config.sectors_file))?;
    if !sectors_path.exists() {
        let template = SectorFile {
            artcc_id: Some(config.artcc_id.clone()).filter(|id| !id.is_empty()),
            ..sector_file.clone()
        };
        match save_sector_file(sectors_path, &template) {
            Ok(()) => info!("wrote empty sector file to {}", sectors_path.display()),
            Err(err) => warn!("could not create sector file: {err:#}"),
        }
    }
    let sectors = SectorData::new(config.artcc_id.clone(), sector_file);
    if sectors.sectors().is_empty() {
        warn!("no sectors configured; nothing will qualify for the ACL");
    }
    let filters = DefaultFilters::from_sectors(&sectors);
    let auth = api_auth(&config);

    let (fetch_tx, fetch_rx) = mpsc::channel();
    spawn_fetcher(
        config.entries_urls.clone(),
        config.refresh,
        config.insecure,
        auth.clone(),
        fetch_tx,
    );

    let (aar_tx, aar_rx) = mpsc::channel();
    let (aar_req_tx, aar_req_rx) = mpsc::channel();
    spawn_aar_fetcher(
        config.aar_url.clone(),
        sectors.artcc_id.clone(),
        config.insecure,
        config.aar_timeout(),
        aar_tx,
        aar_req_rx,
    );

    let amend_tx = if config.amend_url.trim().is_empty() {
        None
    } else {
        let (tx, rx) = mpsc::channel();
        spawn_amend_sender(config.amend_url.clone(), config.insecure, auth, rx);
        Some(tx)
    };

    let mut bus = SharedUiBus::disabled();
    let mut peer_rx = None;
    if config.shared_state_enabled {
        let room = Room::new(&sectors.artcc_id, &config.sector_id);
        info!("sharing UI state in {}/{}", room.artcc_id, room.sector_id);
        bus = SharedUiBus::new(room, config.origin());
        if !config.peers.is_empty() {
            bus.attach(Box::new(TcpPeerChannel::new(config.peers.clone())));
        }
        if !config.peer_listen.trim().is_empty() {
            let (tx, rx) = mpsc::channel();
            spawn_peer_listener(config.peer_listen.trim(), tx)
                .with_context(|| format!("binding peer listener on {}", config.peer_listen))?;
            peer_rx = Some(rx);
        }
    }

    let mut store = StateStore::new(sectors, bus).with_plan_ttl(config.plan_ttl());
    if !config.selected_sectors.is_empty() {
        store.select_sectors(&config.selected_sectors);
    }
    let refresh = RefreshCycle::new(Box::new(filters), config.evict_after_polls);
    let channels = Channels {
        fetch_rx,
        aar_rx: Some(aar_rx),
        aar_req_tx: Some(aar_req_tx),
        peer_rx,
        amend_tx,
    };
    let runtime = Runtime::new(store, refresh, channels)
        .with_auto_expire(config.auto_expire_plans)
        .with_status_interval(Duration::from_secs(config.status_secs));

    let res = runtime.run(Duration::from_millis(50));
    if let Err(err) = &res {
        warn!("runtime error: {err}");
    }
    info!("edst-sync exited");
    res
}
