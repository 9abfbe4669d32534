//! End-to-end pipeline checks on scripted frames: detection, compliance
//! classification, zone handling and cooldown-gated incident creation,
//! without a camera or a model file.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use safeguard_vision::{
    render, AlertManager, BlobBackend, Classifier, Frame, FrameSlot, IncidentStore,
    InMemoryIncidentStore, MonitorState, PpeConfig, SharedIncidentStore, StreamOrchestrator,
    DEFAULT_ZONE_FRACTION,
};

/// Draw a person-shaped silhouette (head circle plus torso block) centered
/// at `center_x`, in the synthetic-camera geometry the blob detector is
/// tuned for.
fn person_frame(center_x: i32, head: render::Color, torso: render::Color, seq: u64) -> Frame {
    let mut frame = Frame::black(640, 480, seq);
    render::fill_circle(&mut frame, center_x, 200, 40, head);
    let x1 = (center_x - 40).max(0) as u32;
    let x2 = (center_x + 40).min(639) as u32;
    render::fill_rect(&mut frame, x1, 240, x2, 400, torso);
    frame
}

fn pipeline(cooldown: Duration) -> (StreamOrchestrator, Arc<FrameSlot>, Arc<MonitorState>, SharedIncidentStore) {
    let slot = Arc::new(FrameSlot::new());
    let state = MonitorState::new(true);
    let store: SharedIncidentStore = Arc::new(Mutex::new(InMemoryIncidentStore::new()));
    let dir = tempfile::tempdir().unwrap().keep();
    let alerts = Arc::new(Mutex::new(
        AlertManager::new(store.clone(), &dir, cooldown).unwrap(),
    ));
    let classifier = Classifier::new(
        Box::new(BlobBackend::new()),
        DEFAULT_ZONE_FRACTION,
        PpeConfig::default(),
    );
    let orchestrator = StreamOrchestrator::new(slot.clone(), state.clone(), classifier, alerts);
    (orchestrator, slot, state, store)
}

#[test]
fn compliant_person_outside_the_zone_is_safe() {
    let (mut orchestrator, slot, _state, store) = pipeline(Duration::from_secs(30));
    slot.publish(person_frame(320, render::WHITE, render::ORANGE, 1));

    let stats = orchestrator.process_once().expect("frame available");
    assert_eq!(stats.total_persons, 1);
    assert_eq!(stats.violations, 0);
    assert!(stats.alerts.is_empty());
    assert!(store.lock().unwrap().recent(10).unwrap().is_empty());
}

#[test]
fn missing_vest_raises_one_incident_per_cooldown_window() -> Result<()> {
    let (mut orchestrator, slot, _state, store) = pipeline(Duration::from_secs(30));

    // Many violating frames inside one window must collapse to one incident.
    for seq in 1..=5 {
        slot.publish(person_frame(320, render::WHITE, [100, 100, 100], seq));
        let stats = orchestrator.process_once().expect("frame available");
        assert_eq!(stats.total_persons, 1);
        assert_eq!(stats.violations, 1);
        assert_eq!(stats.alerts, vec!["Peligro: SIN CHALECO".to_string()]);
    }

    let incidents = store.lock().unwrap().recent(10)?;
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].kind, "SIN CHALECO");
    assert!(incidents[0].image_path.starts_with("captures/capture_"));
    Ok(())
}

#[test]
fn full_ppe_inside_the_danger_zone_is_a_warning() {
    let (mut orchestrator, slot, _state, store) = pipeline(Duration::from_secs(30));
    // Center at 90% of the width, past the 70% boundary.
    slot.publish(person_frame(576, render::WHITE, render::ORANGE, 1));

    let stats = orchestrator.process_once().expect("frame available");
    assert_eq!(stats.total_persons, 1);
    assert_eq!(stats.violations, 1);
    assert_eq!(stats.alerts, vec!["Aviso: ZONA PELIGROSA".to_string()]);
    // Warnings are violations too; the incident carries the zone reason.
    let incidents = store.lock().unwrap().recent(10).unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].kind, "ZONA PELIGROSA");
}

#[test]
fn alternating_compliance_tracks_the_current_frame() {
    let (mut orchestrator, slot, _state, _store) = pipeline(Duration::from_secs(30));

    for seq in 1..=6u64 {
        let compliant = seq % 2 == 0;
        let head = if compliant { render::WHITE } else { [50, 50, 50] };
        slot.publish(person_frame(320, head, render::ORANGE, seq));
        let stats = orchestrator.process_once().expect("frame available");
        if compliant {
            assert_eq!(stats.violations, 0, "seq {}", seq);
        } else {
            assert_eq!(stats.violations, 1, "seq {}", seq);
            assert!(stats.alerts[0].contains("SIN CASCO"), "seq {}", seq);
        }
    }
}

#[test]
fn paused_monitoring_never_produces_incidents() {
    let (mut orchestrator, slot, state, store) = pipeline(Duration::from_secs(30));
    state.set_active(false);
    slot.publish(person_frame(320, [50, 50, 50], [100, 100, 100], 1));

    for _ in 0..3 {
        assert!(orchestrator.process_once().is_none());
    }
    assert!(store.lock().unwrap().recent(10).unwrap().is_empty());
}

#[test]
fn frame_slot_always_serves_the_newest_frame() {
    let slot = Arc::new(FrameSlot::new());
    let writer_slot = slot.clone();
    let writer = std::thread::spawn(move || {
        for seq in 1..=200u64 {
            writer_slot.publish(Frame::black(8, 8, seq));
        }
    });

    // Sequence numbers observed by a concurrent reader never go backwards.
    let mut last_seen = 0u64;
    for _ in 0..500 {
        if let Some(frame) = slot.latest() {
            assert!(frame.seq >= last_seen, "slot went backwards");
            last_seen = frame.seq;
        }
    }
    writer.join().unwrap();
    assert_eq!(slot.latest().unwrap().seq, 200);
}
