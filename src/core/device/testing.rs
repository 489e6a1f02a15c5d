//! Recording devices for engine tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::{CameraDevice, DeviceFactory};
use crate::core::engine::overlay::OverlayUpdateRequest;
use crate::core::error::CoreError;
use crate::core::solar::SunPhase;
use crate::core::store::types::CameraRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    DayNight { camera_id: String, phase: SunPhase },
    SetOverlay { camera_id: String, text: String },
    ClearOverlay { camera_id: String },
}

impl DeviceCall {
    pub fn camera_id(&self) -> &str {
        match self {
            DeviceCall::DayNight { camera_id, .. }
            | DeviceCall::SetOverlay { camera_id, .. }
            | DeviceCall::ClearOverlay { camera_id } => camera_id,
        }
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Succeed,
    Fail,
    Hang,
}

/// Hands out devices that record every call into one shared log. Cameras can
/// be told to fail or to hang forever.
#[derive(Default)]
pub struct RecordingFactory {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
}

impl RecordingFactory {
    pub fn fail_camera(&self, camera_id: &str) {
        self.failing.lock().unwrap().insert(camera_id.to_string());
    }

    pub fn hang_camera(&self, camera_id: &str) {
        self.hanging.lock().unwrap().insert(camera_id.to_string());
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, camera_id: &str) -> Vec<DeviceCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.camera_id() == camera_id)
            .collect()
    }
}

impl DeviceFactory for RecordingFactory {
    fn connect(&self, camera: &CameraRecord) -> Arc<dyn CameraDevice> {
        let behaviour = if self.hanging.lock().unwrap().contains(&camera.id) {
            Behaviour::Hang
        } else if self.failing.lock().unwrap().contains(&camera.id) {
            Behaviour::Fail
        } else {
            Behaviour::Succeed
        };
        Arc::new(RecordingDevice {
            camera_id: camera.id.clone(),
            calls: self.calls.clone(),
            behaviour,
        })
    }
}

struct RecordingDevice {
    camera_id: String,
    calls: Arc<Mutex<Vec<DeviceCall>>>,
    behaviour: Behaviour,
}

impl RecordingDevice {
    async fn record(&self, call: DeviceCall) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push(call);
        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(CoreError::DeviceUnreachable(format!(
                "{} is offline",
                self.camera_id
            ))),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl CameraDevice for RecordingDevice {
    async fn trigger_day_night_mode(&self, phase: SunPhase) -> Result<(), CoreError> {
        self.record(DeviceCall::DayNight {
            camera_id: self.camera_id.clone(),
            phase,
        })
        .await
    }

    async fn set_overlay_text(&self, request: &OverlayUpdateRequest) -> Result<(), CoreError> {
        self.record(DeviceCall::SetOverlay {
            camera_id: self.camera_id.clone(),
            text: request.overlay_text(),
        })
        .await
    }

    async fn clear_overlay_text(&self) -> Result<(), CoreError> {
        self.record(DeviceCall::ClearOverlay {
            camera_id: self.camera_id.clone(),
        })
        .await
    }
}
