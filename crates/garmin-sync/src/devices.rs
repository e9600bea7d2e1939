//! Device discovery.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use garmin_core::error::AppError;
use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_core::types::state::StateObject;
use garmin_state::{FlattenOptions, JsonFlattener, keys};

use crate::client::ConnectClient;

const DEVICES_PATH: &str = "device-service/deviceregistration/devices";

/// Registered devices of the account, mirrored under `devices.<unitId>`.
#[derive(Debug)]
pub struct DeviceRegistry {
    tree: Arc<dyn StateTree>,
    /// Unit id to product name.
    known: DashMap<String, String>,
}

impl DeviceRegistry {
    pub fn new(tree: Arc<dyn StateTree>) -> Self {
        Self {
            tree,
            known: DashMap::new(),
        }
    }

    /// Fetch the device list and create one device node per unit.
    ///
    /// Returns the unit ids found.
    pub async fn discover(&self, client: &ConnectClient) -> AppResult<Vec<String>> {
        let Some(payload) = client.get_json(DEVICES_PATH).await? else {
            info!("No devices registered");
            return Ok(Vec::new());
        };
        let Value::Array(devices) = payload else {
            return Err(AppError::external("Device list is not an array"));
        };

        info!(count = devices.len(), "Found devices");
        self.tree
            .set_object(keys::DEVICES, StateObject::channel("Devices"))
            .await?;

        let mut ids = Vec::with_capacity(devices.len());
        for device in &devices {
            let Some(unit_id) = unit_id(device) else {
                warn!("Skipping device without unitId");
                continue;
            };
            let name = device
                .get("productDisplayName")
                .and_then(Value::as_str)
                .unwrap_or("Garmin device")
                .to_string();

            self.mirror(&unit_id, &name, device).await?;
            self.known.insert(unit_id.clone(), name);
            ids.push(unit_id);
        }
        Ok(ids)
    }

    async fn mirror(&self, unit_id: &str, name: &str, device: &Value) -> AppResult<()> {
        debug!(unit_id, name, "Mirroring device");
        self.tree
            .set_object(&keys::device(unit_id), StateObject::device(name))
            .await?;
        self.tree
            .set_object(&keys::device_remote(unit_id), StateObject::channel("Remote Controls"))
            .await?;

        let refresh = keys::device_refresh(unit_id);
        if self
            .tree
            .set_object(&refresh, StateObject::state("True = Refresh", "button", true))
            .await?
        {
            self.tree.set_state(&refresh, json!(false), true).await?;
        }

        JsonFlattener::new(self.tree.as_ref())
            .parse(&keys::device_general(unit_id), device, &FlattenOptions::indexed())
            .await?;
        Ok(())
    }

    /// Known unit ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.known.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Product name of a known unit.
    pub fn name(&self, unit_id: &str) -> Option<String> {
        self.known.get(unit_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

fn unit_id(device: &Value) -> Option<String> {
    match device.get("unitId")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
