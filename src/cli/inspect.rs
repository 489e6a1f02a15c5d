use anyhow::Result;
use chrono::Utc;
use console::style;
use std::path::Path;

use super::SunArgs;
use crate::core::config::{AppConfig, validate_coordinates};
use crate::core::solar::{self, SunPhase};
use crate::core::store::Store;
use crate::core::terminal::{self, GuideSection, MOON, SUN};

pub fn print_sun(args: &SunArgs) -> Result<()> {
    validate_coordinates(args.latitude, args.longitude)?;
    let at = args.at.unwrap_or_else(Utc::now);

    let sun_up = solar::is_sun_up(args.latitude, args.longitude, at);
    let (icon, state) = if sun_up {
        (SUN, style("up").yellow().bold())
    } else {
        (MOON, style("down").blue().bold())
    };
    println!(
        "{}Sun is {} at ({}, {}) on {}",
        icon,
        state,
        args.latitude,
        args.longitude,
        solar::local_display(at)
    );

    match solar::next_transition(args.latitude, args.longitude, at) {
        Ok(next) => {
            let label = match next.phase {
                SunPhase::Sunrise => "Next sunrise",
                SunPhase::Sunset => "Next sunset",
            };
            terminal::print_status(
                label,
                &format!("{} ({})", next.at.to_rfc3339(), solar::local_display(next.at)),
            );
        }
        Err(e) => terminal::print_warn(&e.to_string()),
    }
    Ok(())
}

pub async fn print_cameras(config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::load(config_path).await?;
    let store = Store::open(config.database_path()).await?;
    let cameras = store.list_cameras().await?;

    if cameras.is_empty() {
        terminal::print_info("No cameras configured.");
        return Ok(());
    }

    let mut section = GuideSection::new(&format!("Cameras ({})", cameras.len()));
    for camera in &cameras {
        let day_night = match (&camera.next_day_night_schedule_id, camera.update_day_night_mode_enabled) {
            (Some(handle), _) => format!("day/night job {}", handle),
            (None, true) => "day/night enabled, nothing pending".to_string(),
            (None, false) => "day/night off".to_string(),
        };
        let clear = camera
            .next_clear_overlay_schedule_id
            .as_ref()
            .map(|h| format!(", clear job {}", h))
            .unwrap_or_default();
        section = section.command(
            camera.label(),
            &format!(
                "{} [{}] {}{}, {} plates",
                camera.manufacturer.as_str(),
                camera.address,
                day_night,
                clear,
                camera.plates_seen
            ),
        );
    }
    section.print();
    Ok(())
}
