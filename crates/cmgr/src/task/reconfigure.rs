//! Reconfigure task: replace the collector's log pipeline
//!
//! The new pipeline is spliced into the collector's YAML config at
//! [`PIPELINE_PATH`], validated with a dry run, and only then applied by
//! restarting the collector. A config that fails validation is rolled back.

use crate::collector::Collector;
use collector_manager_core::{Response, Task};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{error, info, warn};

/// Location of the log pipeline inside the collector config
pub const PIPELINE_PATH: [&str; 3] = ["receivers", "stanza", "pipeline"];

/// Step type of the legacy agent output, which the collector does not have
const LEGACY_OUTPUT_STEP: &str = "cabin_output";

/// Ordered list of log pipeline steps
pub type LogPipeline = Vec<Map<String, Value>>;

/// Parameters of a reconfigure task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconfigureParams {
    /// Missing config means an empty pipeline
    #[serde(default)]
    pub config: LogConfig,
}

/// Log pipeline description carried by a reconfigure task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub pipeline: LogPipeline,
}

impl ReconfigureParams {
    /// The requested pipeline in the form the collector accepts.
    ///
    /// Legacy `cabin_output` steps are dropped and `output` keys stripped from
    /// every remaining step. An empty result becomes a single `noop` step, since
    /// the collector refuses to start with no operators.
    pub fn sanitized_pipeline(&self) -> LogPipeline {
        let mut pipeline: LogPipeline = self
            .config
            .pipeline
            .iter()
            .filter(|step| step.get("type").and_then(Value::as_str) != Some(LEGACY_OUTPUT_STEP))
            .cloned()
            .map(|mut step| {
                step.remove("output");
                step
            })
            .collect();

        if pipeline.is_empty() {
            let mut noop = Map::new();
            noop.insert("type".to_string(), Value::String("noop".to_string()));
            pipeline.push(noop);
        }

        pipeline
    }
}

/// Execute a reconfigure task against `collector`.
pub async fn execute_reconfigure(task: &Task, collector: &dyn Collector) -> Response {
    let params: ReconfigureParams =
        match serde_json::from_value(Value::Object(task.parameters.clone())) {
            Ok(params) => params,
            Err(e) => return task.failure("unable to decode parameters", e),
        };

    let config_path = collector.config_path();
    let original = match tokio::fs::read(&config_path).await {
        Ok(bytes) => bytes,
        Err(e) => return task.failure("failed to read existing config", e),
    };

    let document: Mapping = match serde_yaml::from_slice(&original) {
        Ok(document) => document,
        Err(e) => return task.failure("failed to decode existing config", e),
    };

    let updated = match serde_yaml::to_value(params.sanitized_pipeline())
        .and_then(|pipeline| serde_yaml::to_string(&splice_pipeline(document, pipeline)))
    {
        Ok(updated) => updated,
        Err(e) => return task.failure("failed to convert new config to yaml", e),
    };

    if let Err(e) = tokio::fs::write(&config_path, updated).await {
        return task.failure("failed to write new config", e);
    }

    if let Err(e) = collector.validate_config().await {
        warn!(id = %task.id, "New config failed validation, restoring previous config: {}", e);
        if let Err(restore_err) = tokio::fs::write(&config_path, &original).await {
            error!(
                "Failed to restore previous config at {}: {}",
                config_path.display(),
                restore_err
            );
        }
        return task.failure("new config failed validation", e);
    }

    if let Err(e) = collector.restart().await {
        return task.failure("failed to restart collector", e);
    }

    info!(id = %task.id, "Collector reconfigured");
    task.success()
}

/// Extract the active log pipeline from a collector config document.
pub fn active_pipeline(document: &[u8]) -> Option<Value> {
    let mut node: YamlValue = serde_yaml::from_slice(document).ok()?;
    for key in PIPELINE_PATH {
        node = node.as_mapping_mut()?.remove(key)?;
    }
    serde_json::to_value(node).ok()
}

/// Replace the pipeline at [`PIPELINE_PATH`], creating missing sections.
fn splice_pipeline(mut document: Mapping, pipeline: YamlValue) -> Mapping {
    let [receivers_key, stanza_key, pipeline_key] = PIPELINE_PATH;

    let mut receivers = take_mapping(&mut document, receivers_key);
    let mut stanza = take_mapping(&mut receivers, stanza_key);
    stanza.insert(pipeline_key.into(), pipeline);
    receivers.insert(stanza_key.into(), YamlValue::Mapping(stanza));
    document.insert(receivers_key.into(), YamlValue::Mapping(receivers));
    document
}

/// Take the mapping stored under `key`, leaving its slot in place so the
/// re-inserted value keeps its position. Non-mapping values are discarded.
fn take_mapping(parent: &mut Mapping, key: &str) -> Mapping {
    match parent.get_mut(key).map(std::mem::take) {
        Some(YamlValue::Mapping(mapping)) => mapping,
        _ => Mapping::new(),
    }
}
