//! Startup announcement built from host and agent metadata

use crate::collector::Collector;
use crate::task::active_pipeline;
use collector_manager_core::Startup;
use serde_json::{Map, Value};
use sysinfo::{Networks, System};
use tracing::debug;

/// Placeholder used when no interface reports a hardware address
pub const UNKNOWN_MAC_ADDRESS: &str = "unknown";

/// Collect the startup announcement for this agent.
///
/// Every host lookup is best effort; a failed lookup falls back to a
/// placeholder instead of failing the announcement.
pub async fn new_startup(
    template_id: &str,
    agent_name: &str,
    collector: &dyn Collector,
) -> Startup {
    Startup {
        home_directory: home_directory(),
        agent_name: agent_name.to_string(),
        template_id: template_id.to_string(),
        mac_address: mac_address(),
        operating_system: operating_system(),
        pipeline: collector_pipeline(collector).await,
    }
}

fn home_directory() -> String {
    dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
}

/// First non-loopback interface with a non-zero hardware address.
pub fn mac_address() -> String {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<_> = networks.iter().collect();
    interfaces.sort_by(|a, b| a.0.cmp(b.0));

    interfaces
        .into_iter()
        .filter(|(name, _)| !name.starts_with("lo"))
        .map(|(_, data)| data.mac_address())
        .find(|mac| !mac.is_unspecified())
        .map(|mac| mac.to_string())
        .unwrap_or_else(|| UNKNOWN_MAC_ADDRESS.to_string())
}

fn operating_system() -> String {
    System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| std::env::consts::OS.to_string())
}

async fn collector_pipeline(collector: &dyn Collector) -> Value {
    let path = collector.config_path();
    match tokio::fs::read(&path).await {
        Ok(bytes) => active_pipeline(&bytes).unwrap_or_else(empty_pipeline),
        Err(e) => {
            debug!("Unable to read collector config {}: {}", path.display(), e);
            empty_pipeline()
        }
    }
}

fn empty_pipeline() -> Value {
    Value::Object(Map::new())
}
