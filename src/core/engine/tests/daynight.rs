use super::*;
use crate::core::device::testing::DeviceCall;
use crate::core::error::CoreError;
use crate::core::jobs::JobSpec;
use crate::core::solar::SunPhase;

fn transition_phase(spec: &JobSpec) -> SunPhase {
    match spec {
        JobSpec::DayNightTransition {
            phase,
            schedule_next,
            ..
        } => {
            assert!(*schedule_next, "chain jobs always schedule a successor");
            *phase
        }
        other => panic!("expected a transition job, got {:?}", other),
    }
}

#[tokio::test]
async fn schedule_all_arms_every_enabled_camera_in_the_future() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.add_camera("b", false).await;
    h.add_camera("c", true).await;

    assert_eq!(h.service.schedule_all().await.unwrap(), 2);

    for id in ["a", "c"] {
        let handle = h.camera(id).await.next_day_night_schedule_id.unwrap();
        let job = h.scheduled(&handle);
        assert!(job.delay > Duration::ZERO);
        assert_eq!(transition_phase(&job.spec), SunPhase::Sunset);
    }
    assert!(h.camera("b").await.next_day_night_schedule_id.is_none());
    assert_eq!(h.jobs.pending_scheduled().len(), 2);
}

#[tokio::test]
async fn force_all_with_sun_up_flips_each_camera_to_day_once() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.add_camera("b", false).await;
    h.add_camera("c", true).await;

    assert_eq!(h.service.force_all().await.unwrap(), 2);
    assert_eq!(h.run_enqueued().await, 2);

    for id in ["a", "c"] {
        assert_eq!(
            h.devices.calls_for(id),
            vec![DeviceCall::DayNight {
                camera_id: id.to_string(),
                phase: SunPhase::Sunrise
            }]
        );
        assert!(h.camera(id).await.next_day_night_schedule_id.is_none());
    }
    assert!(h.devices.calls_for("b").is_empty());
    assert!(h.jobs.scheduled().is_empty());
}

#[tokio::test]
async fn force_all_after_dark_flips_to_night() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 23, 30)).await;
    h.add_camera("a", true).await;

    h.service.force_all().await.unwrap();
    h.run_enqueued().await;

    assert_eq!(
        h.devices.calls(),
        vec![DeviceCall::DayNight {
            camera_id: "a".to_string(),
            phase: SunPhase::Sunset
        }]
    );
}

#[tokio::test]
async fn chain_alternates_and_moves_forward() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.service.schedule_one("a").await.unwrap();

    let mut expected = SunPhase::Sunset;
    let mut last_fired = h.clock.now();
    for _ in 0..4 {
        let handle = h.camera("a").await.next_day_night_schedule_id.unwrap();
        assert_eq!(transition_phase(&h.scheduled(&handle).spec), expected);

        h.fire(&handle).await.unwrap();
        assert!(h.clock.now() > last_fired);
        last_fired = h.clock.now();

        let next = h.camera("a").await.next_day_night_schedule_id.unwrap();
        assert_ne!(next, handle);
        expected = expected.opposite();
    }

    let phases: Vec<SunPhase> = h
        .devices
        .calls()
        .into_iter()
        .map(|call| match call {
            DeviceCall::DayNight { phase, .. } => phase,
            other => panic!("unexpected device call {:?}", other),
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            SunPhase::Sunset,
            SunPhase::Sunrise,
            SunPhase::Sunset,
            SunPhase::Sunrise
        ]
    );
    assert_eq!(h.jobs.pending_scheduled().len(), 1);
}

#[tokio::test]
async fn device_failure_does_not_break_the_chain() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.devices.fail_camera("a");
    h.service.schedule_one("a").await.unwrap();

    let first = h.camera("a").await.next_day_night_schedule_id.unwrap();
    h.fire(&first).await.unwrap();

    let second = h.camera("a").await.next_day_night_schedule_id.unwrap();
    assert_ne!(first, second);
    assert_eq!(transition_phase(&h.scheduled(&second).spec), SunPhase::Sunrise);
}

#[tokio::test]
async fn hanging_device_times_out_and_the_chain_continues() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.devices.hang_camera("a");
    h.service.schedule_one("a").await.unwrap();

    let first = h.camera("a").await.next_day_night_schedule_id.unwrap();
    tokio::time::timeout(Duration::from_secs(5), h.fire(&first))
        .await
        .expect("device guard bounds the call")
        .unwrap();

    assert!(h.camera("a").await.next_day_night_schedule_id.is_some());
    assert_eq!(h.jobs.pending_scheduled().len(), 1);
}

#[tokio::test]
async fn cancelled_chain_is_not_rescheduled_by_a_running_job() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.service.schedule_one("a").await.unwrap();
    let handle = h.camera("a").await.next_day_night_schedule_id.unwrap();

    h.service.cancel_one("a").await.unwrap();
    assert!(h.camera("a").await.next_day_night_schedule_id.is_none());
    assert!(h.jobs.deleted().contains(&handle));

    // The job had already started when the cancel landed.
    h.fire(&handle).await.unwrap();
    assert_eq!(h.devices.calls().len(), 1);
    assert!(h.camera("a").await.next_day_night_schedule_id.is_none());
    assert!(h.jobs.pending_scheduled().is_empty());
}

#[tokio::test]
async fn disabling_day_night_ends_the_chain() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    let mut camera = h.add_camera("a", true).await;
    h.service.schedule_one("a").await.unwrap();
    let handle = h.camera("a").await.next_day_night_schedule_id.unwrap();

    camera.update_day_night_mode_enabled = false;
    h.store.upsert_camera(&camera).await.unwrap();
    h.fire(&handle).await.unwrap();

    assert!(h.camera("a").await.next_day_night_schedule_id.is_none());
    assert!(h.jobs.pending_scheduled().is_empty());
}

#[tokio::test]
async fn schedule_one_replaces_an_existing_chain() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;

    h.service.schedule_one("a").await.unwrap();
    let first = h.camera("a").await.next_day_night_schedule_id.unwrap();
    h.service.schedule_one("a").await.unwrap();
    let second = h.camera("a").await.next_day_night_schedule_id.unwrap();

    assert_ne!(first, second);
    assert_eq!(h.jobs.deleted(), vec![first]);
    assert_eq!(h.jobs.pending_scheduled().len(), 1);
}

#[tokio::test]
async fn polar_day_pauses_the_chain_until_the_next_sweep() {
    let h = Harness::new(TROMSO, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;

    let err = h.service.schedule_one("a").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::NoTransitionAvailable(_))
    ));
    assert!(h.camera("a").await.next_day_night_schedule_id.is_none());

    assert_eq!(h.service.schedule_all().await.unwrap(), 0);
    assert!(h.jobs.scheduled().is_empty());
}

#[tokio::test]
async fn cancel_one_rejects_unknown_camera() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    let err = h.service.cancel_one("ghost").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::UnknownCamera(id)) if id == "ghost"
    ));
}

#[tokio::test]
async fn manual_flip_does_not_touch_the_chain() {
    let h = Harness::new(LONDON, utc(2024, 6, 21, 12, 0)).await;
    h.add_camera("a", true).await;
    h.service.schedule_one("a").await.unwrap();
    let handle = h.camera("a").await.next_day_night_schedule_id.unwrap();

    h.service
        .enqueue_manual_flip("a", SunPhase::Sunset)
        .await
        .unwrap();
    h.run_enqueued().await;

    assert_eq!(h.camera("a").await.next_day_night_schedule_id, Some(handle));
    assert_eq!(h.jobs.pending_scheduled().len(), 1);
    assert!(h.service.enqueue_manual_flip("ghost", SunPhase::Sunrise).await.is_err());
}
