use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::device::Manufacturer;
use crate::core::jobs::JobHandle;

/// One physical camera. The two `next_*` handles are soft locks: a non-empty
/// value means a future job already owns that camera's next transition/clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub manufacturer: Manufacturer,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub update_day_night_mode_enabled: bool,
    #[serde(default)]
    pub next_day_night_schedule_id: Option<JobHandle>,
    #[serde(default)]
    pub next_clear_overlay_schedule_id: Option<JobHandle>,
    #[serde(default)]
    pub plates_seen: i64,
    #[serde(default)]
    pub latest_processed_plate_uuid: Option<String>,
}

impl CameraRecord {
    pub fn new(id: impl Into<String>, manufacturer: Manufacturer) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            manufacturer,
            address: String::new(),
            username: String::new(),
            password: String::new(),
            update_day_night_mode_enabled: false,
            next_day_night_schedule_id: None,
            next_clear_overlay_schedule_id: None,
            plates_seen: 0,
            latest_processed_plate_uuid: None,
        }
    }

    /// Name for log lines, falling back to the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Configuration edit for one camera. Absent fields keep the stored value;
/// a missing or empty password never overwrites the stored one, since reads
/// never return it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CameraUpdate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<Manufacturer>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub update_day_night_mode_enabled: Option<bool>,
}

impl CameraUpdate {
    /// Merge onto the stored record, or onto a blank camera when new.
    pub fn apply(self, existing: Option<CameraRecord>) -> CameraRecord {
        let mut camera =
            existing.unwrap_or_else(|| CameraRecord::new(self.id.clone(), Manufacturer::default()));
        if let Some(name) = self.name {
            camera.name = name;
        }
        if let Some(manufacturer) = self.manufacturer {
            camera.manufacturer = manufacturer;
        }
        if let Some(address) = self.address {
            camera.address = address;
        }
        if let Some(username) = self.username {
            camera.username = username;
        }
        if let Some(password) = self.password.filter(|p| !p.is_empty()) {
            camera.password = password;
        }
        if let Some(enabled) = self.update_day_night_mode_enabled {
            camera.update_day_night_mode_enabled = enabled;
        }
        camera
    }
}

/// The deployment-wide singleton holding site coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub image_compression_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct PendingJobRecord {
    pub handle: JobHandle,
    pub spec: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateImageRecord {
    pub openalpr_uuid: String,
    pub plate_path: String,
    pub vehicle_path: String,
    pub is_compressed: bool,
    pub scraped_at: String,
}
