//! End-to-end session scenarios against the offline host
//!
//! One session may be alive per process, so every test takes the shared
//! lock and scopes its session.

use std::sync::{Arc, Mutex};

use strata_core::error::EngineError;
use strata_core::host::Activation;
use strata_core::stems::{StemBundle, Track};
use strata_core::types::{DeckId, Stem, StereoBuffer, StereoSample};
use strata_gesture::landmarks::{
    HandFrame, HandObservation, Handedness, Point3, FINGERTIPS, FINGER_MCPS, FINGER_PIPS,
    INDEX_TIP, NUM_LANDMARKS, THUMB_TIP, WRIST,
};
use strata_session::{
    InitPhase, Session, SessionCommand, SessionConfig, SessionEvent, StemControl, SyncStatus,
};

static TEST_LOCK: Mutex<()> = Mutex::new(());

const RATE: u32 = 48_000;
const BLOCK: usize = 256;

fn lock() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn constant_buffer(level: f32, frames: usize) -> StereoBuffer {
    let mut buf = StereoBuffer::silence(frames);
    for s in buf.iter_mut() {
        *s = StereoSample::mono(level);
    }
    buf
}

/// Quiet levels keep the master chain linear (below the compressor knee)
fn bundle(drums: f32, bass: f32, melody: f32, vocals: f32) -> Arc<StemBundle> {
    let frames = RATE as usize * 4;
    StemBundle::new(
        [
            constant_buffer(drums, frames),
            constant_buffer(bass, frames),
            constant_buffer(melody, frames),
            constant_buffer(vocals, frames),
        ],
        constant_buffer(0.2, frames),
        RATE,
    )
    .unwrap()
}

fn ready_session() -> Session {
    let mut session = Session::new(SessionConfig::offline()).unwrap();
    session.ensure_ready(Activation::UserGesture).unwrap();
    session
}

fn load(session: &mut Session, deck: DeckId, bpm: Option<f64>, stems: Arc<StemBundle>) {
    let mut track = Track::new(format!("track-{}", deck.name()), 4.0);
    track.bpm = bpm;
    session
        .dispatch(SessionCommand::LoadTrack {
            deck,
            track,
            bundle: Some(stems),
        })
        .unwrap();
}

/// Record `seconds` of output and return the mean absolute level of the tail
fn recorded_level(session: &mut Session, seconds: f64) -> f32 {
    // Let parameter ramps settle before measuring
    session.render(RATE as usize / 4).unwrap();
    session.dispatch(SessionCommand::StartRecording).unwrap();
    session.render((seconds * RATE as f64) as usize).unwrap();
    let blob = session.stop_recording().unwrap();
    assert!(!blob.is_empty());

    let tail = &blob.frames[blob.frames.len() / 2..];
    tail.iter().map(|s| s.left.abs()).sum::<f32>() / tail.len() as f32
}

// ── Scenario 1: cold start requires activation ────────────────────

#[test]
fn cold_start_requires_user_activation() {
    let _guard = lock();
    let mut session = Session::new(SessionConfig::offline()).unwrap();
    let events = session.subscribe();

    let err = session.initialize(Activation::Programmatic).unwrap_err();
    assert_eq!(err, EngineError::UserActivationRequired);
    assert_eq!(session.phase(), InitPhase::Uninitialized);
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::InitializationError { .. }
    ));

    // Deck bring-up cannot run before the host
    assert_eq!(session.initialize_decks().unwrap_err(), EngineError::NotReady);

    // A user-activated path brings the whole chain up
    session.initialize(Activation::UserGesture).unwrap();
    assert_eq!(session.phase(), InitPhase::HostReady);
    session.initialize_decks().unwrap();
    assert_eq!(session.phase(), InitPhase::DecksReady);
    session.connect_master_bus().unwrap();
    assert_eq!(session.phase(), InitPhase::Ready);

    // Second initialize in Ready is a success no-op
    session.initialize(Activation::UserGesture).unwrap();
    assert_eq!(session.phase(), InitPhase::Ready);
}

#[test]
fn only_one_session_per_process() {
    let _guard = lock();
    let _session = Session::new(SessionConfig::offline()).unwrap();
    assert_eq!(
        Session::new(SessionConfig::offline()).unwrap_err(),
        EngineError::AlreadyInitialized
    );
}

#[test]
fn dispose_is_terminal() {
    let _guard = lock();
    let mut session = ready_session();
    session.dispose();
    session.dispose(); // idempotent
    assert_eq!(session.phase(), InitPhase::Disposed);
    assert_eq!(
        session.initialize(Activation::UserGesture).unwrap_err(),
        EngineError::Disposed
    );
    assert_eq!(
        session
            .dispatch(SessionCommand::Play { deck: DeckId::A })
            .unwrap_err(),
        EngineError::Disposed
    );
}

// ── Scenario 2: mute and solo ─────────────────────────────────────

#[test]
fn solo_and_mute_shape_the_mix() {
    let _guard = lock();
    let mut session = ready_session();
    load(&mut session, DeckId::A, Some(120.0), bundle(0.05, 0.05, 0.05, 0.1));

    session
        .dispatch(SessionCommand::SetCrossfader { position: 0.0 })
        .unwrap();
    session
        .dispatch(SessionCommand::SetStemSoloed {
            deck: DeckId::A,
            stem: Stem::Vocals,
            soloed: true,
        })
        .unwrap();
    session
        .dispatch(SessionCommand::SetStemMuted {
            deck: DeckId::A,
            stem: Stem::Drums,
            muted: true,
        })
        .unwrap();
    session.dispatch(SessionCommand::Play { deck: DeckId::A }).unwrap();

    // Only the soloed vocals (0.1) survive; the original stream stays out
    let level = recorded_level(&mut session, 0.5);
    assert!((level - 0.1).abs() < 0.01, "level {level}");

    // Un-solo: the mute still holds drums out of the mix
    session
        .dispatch(SessionCommand::SetStemSoloed {
            deck: DeckId::A,
            stem: Stem::Vocals,
            soloed: false,
        })
        .unwrap();
    let level = recorded_level(&mut session, 0.5);
    assert!((level - 0.2).abs() < 0.015, "level {level}");
}

// ── Scenario 3: crossfader law ────────────────────────────────────

#[test]
fn constant_power_crossfader_levels() {
    let _guard = lock();
    let mut session = ready_session();
    load(&mut session, DeckId::A, Some(120.0), bundle(0.05, 0.05, 0.05, 0.05));
    session.dispatch(SessionCommand::Play { deck: DeckId::A }).unwrap();

    // Hard to side A: deck A passes at unity
    session
        .dispatch(SessionCommand::SetCrossfader { position: 0.0 })
        .unwrap();
    let full = recorded_level(&mut session, 0.4);
    assert!((full - 0.2).abs() < 0.015, "full {full}");

    // Center: cos(π/4) ≈ 0.7071 of the side level
    session
        .dispatch(SessionCommand::SetCrossfader { position: 0.5 })
        .unwrap();
    let center = recorded_level(&mut session, 0.4);
    assert!((center - 0.2 * 0.7071).abs() < 0.015, "center {center}");

    // Hard to side B: deck A is cut
    session
        .dispatch(SessionCommand::SetCrossfader { position: 1.0 })
        .unwrap();
    let cut = recorded_level(&mut session, 0.4);
    assert!(cut < 0.01, "cut {cut}");
}

// ── Scenario 4: beat sync ─────────────────────────────────────────

#[test]
fn beat_sync_matches_slave_tempo() {
    let _guard = lock();
    let mut session = ready_session();
    let events = session.subscribe();
    load(&mut session, DeckId::A, Some(128.0), bundle(0.05, 0.05, 0.05, 0.05));
    load(&mut session, DeckId::B, Some(120.0), bundle(0.05, 0.05, 0.05, 0.05));

    session.dispatch(SessionCommand::Sync { master: DeckId::A }).unwrap();

    let engaged = events
        .try_iter()
        .find_map(|e| match e {
            SessionEvent::SyncEngaged { slave_pitch, .. } => Some(slave_pitch),
            _ => None,
        })
        .expect("sync:engaged event");
    assert!((engaged - 6.6667).abs() < 1e-3, "pitch {engaged}");

    let state = session.snapshot();
    assert_eq!(
        state.sync,
        SyncStatus::Synced {
            master: DeckId::A,
            slave: DeckId::B
        }
    );
    // Slave current BPM within 0.1% of the master's 128
    let slave_bpm = state.decks[DeckId::B.index()].bpm;
    assert!((slave_bpm - 128.0).abs() / 128.0 < 0.001, "bpm {slave_bpm}");

    // Master pitch moves: slave retunes in the same dispatch
    session
        .dispatch(SessionCommand::SetPitch {
            deck: DeckId::A,
            percent: -2.0,
        })
        .unwrap();
    let state = session.snapshot();
    let master_bpm = state.decks[DeckId::A.index()].bpm;
    let slave_bpm = state.decks[DeckId::B.index()].bpm;
    assert!(
        (master_bpm - slave_bpm).abs() / master_bpm < 0.001,
        "master {master_bpm} vs slave {slave_bpm}"
    );

    // Touching the slave's pitch directly disengages
    session
        .dispatch(SessionCommand::SetPitch {
            deck: DeckId::B,
            percent: 0.0,
        })
        .unwrap();
    assert_eq!(session.snapshot().sync, SyncStatus::None);
    assert!(events
        .try_iter()
        .any(|e| matches!(e, SessionEvent::SyncDisengaged)));
}

#[test]
fn sync_without_bpm_is_skipped() {
    let _guard = lock();
    let mut session = ready_session();
    let events = session.subscribe();
    load(&mut session, DeckId::A, Some(128.0), bundle(0.05, 0.05, 0.05, 0.05));
    load(&mut session, DeckId::B, None, bundle(0.05, 0.05, 0.05, 0.05));

    session.dispatch(SessionCommand::Sync { master: DeckId::A }).unwrap();

    assert!(events
        .try_iter()
        .any(|e| matches!(e, SessionEvent::SyncSkipped { .. })));
    assert_eq!(session.snapshot().sync, SyncStatus::None);
}

// ── Scenario 5: gesture pinch drives stem volume ──────────────────

fn pinch_frame(distance: f32, ts: f64) -> HandFrame {
    let mut landmarks = [Point3::new(0.5, 0.5, 0.0); NUM_LANDMARKS];
    landmarks[WRIST] = Point3::new(0.5, 0.8, 0.0);
    for (i, (&tip, &pip)) in FINGERTIPS.iter().zip(FINGER_PIPS.iter()).enumerate() {
        let x = 0.3 + i as f32 * 0.1;
        landmarks[tip] = Point3::new(x, 0.35, 0.0);
        landmarks[pip] = Point3::new(x, 0.55, 0.0);
    }
    for (i, &mcp) in FINGER_MCPS.iter().enumerate() {
        landmarks[mcp] = Point3::new(0.4 + i as f32 * 0.08, 0.65, 0.0);
    }
    landmarks[THUMB_TIP] = Point3::new(0.5, 0.45, 0.0);
    landmarks[INDEX_TIP] = Point3::new(0.5 + distance, 0.45, 0.0);
    HandFrame {
        left: None,
        right: Some(HandObservation {
            landmarks,
            handedness: Handedness::Right,
            confidence: 0.95,
            timestamp_ms: ts,
        }),
        timestamp_ms: ts,
    }
}

#[test]
fn pinch_rides_vocals_volume() {
    let _guard = lock();
    let mut session = ready_session();
    let events = session.subscribe();
    load(&mut session, DeckId::A, Some(120.0), bundle(0.05, 0.05, 0.05, 0.05));

    // Engage closed, open wide, then close down again. Several frames per
    // step keep the smoother settled and the tip velocity stable enough to
    // pass the gates.
    let mut steps = Vec::new();
    for distance in [0.04f32, 0.10, 0.16, 0.22, 0.28, 0.20, 0.12, 0.06] {
        for _ in 0..4 {
            steps.push(distance);
        }
    }
    for (i, distance) in steps.iter().enumerate() {
        session.push_hand_observation(pinch_frame(*distance, i as f64 * 33.0));
    }

    let volumes: Vec<f32> = events
        .try_iter()
        .filter_map(|e| match e {
            SessionEvent::StemControlChanged {
                deck: DeckId::A,
                stem: Some(Stem::Vocals),
                control: StemControl::Volume(v),
            } => Some(v),
            _ => None,
        })
        .collect();

    assert!(volumes.len() >= 2, "got {volumes:?}");
    let peak = volumes.iter().cloned().fold(0.0f32, f32::max);
    let last = *volumes.last().unwrap();
    assert!(last < peak, "volumes never came back down: {volumes:?}");
    assert!(last < 0.4, "ended high: {volumes:?}");
}

// ── Scenario 6: analyzer fallback feeds sync skip ─────────────────

#[test]
fn analyzer_fallback_means_no_sync() {
    let _guard = lock();
    let mut config = SessionConfig::offline();
    config.no_analysis_worker = true;
    let mut session = Session::new(config).unwrap();
    session.ensure_ready(Activation::UserGesture).unwrap();
    let events = session.subscribe();

    let pending = session.analyze(vec![0.1; 48_000], RATE, Default::default());
    let result = pending.blocking_wait().unwrap();
    let bpm = result.bpm.unwrap();
    assert_eq!(bpm.bpm, 0.0);
    assert_eq!(bpm.confidence, 0.0);

    // Confidence 0 means the track gets no BPM, so sync skips
    let track_bpm = if result.has_confident_bpm() {
        Some(bpm.bpm)
    } else {
        None
    };
    load(&mut session, DeckId::A, track_bpm, bundle(0.05, 0.05, 0.05, 0.05));
    load(&mut session, DeckId::B, Some(120.0), bundle(0.05, 0.05, 0.05, 0.05));
    session.dispatch(SessionCommand::Sync { master: DeckId::A }).unwrap();

    assert!(events
        .try_iter()
        .any(|e| matches!(e, SessionEvent::SyncSkipped { .. })));
    assert_eq!(session.snapshot().sync, SyncStatus::None);
}

// ── Recording round trip ──────────────────────────────────────────

#[test]
fn recording_duration_matches_elapsed() {
    let _guard = lock();
    let mut session = ready_session();
    load(&mut session, DeckId::A, Some(120.0), bundle(0.05, 0.05, 0.05, 0.05));
    session.dispatch(SessionCommand::Play { deck: DeckId::A }).unwrap();

    session.dispatch(SessionCommand::StartRecording).unwrap();
    let captured_frames = RATE as usize; // one second
    session.render(captured_frames).unwrap();
    let blob = session.stop_recording().unwrap();

    let expected = captured_frames as f64 / RATE as f64;
    let tolerance = BLOCK as f64 / RATE as f64; // ±1 block
    assert!(
        (blob.duration_seconds() - expected).abs() <= tolerance,
        "duration {} vs {expected}",
        blob.duration_seconds()
    );

    // Stop without a start returns an empty blob
    let empty = session.stop_recording().unwrap();
    assert!(empty.is_empty());
}

#[test]
fn start_recording_is_idempotent() {
    let _guard = lock();
    let mut session = ready_session();
    session.dispatch(SessionCommand::StartRecording).unwrap();
    session.dispatch(SessionCommand::StartRecording).unwrap();
    session.render(RATE as usize / 10).unwrap();
    let blob = session.stop_recording().unwrap();
    // One session's worth of frames, not two
    assert!(blob.duration_seconds() < 0.2);
}

// ── Events and snapshots ──────────────────────────────────────────

#[test]
fn position_updates_flow_to_subscribers() {
    let _guard = lock();
    let mut session = ready_session();
    let events = session.subscribe();
    load(&mut session, DeckId::A, Some(120.0), bundle(0.05, 0.05, 0.05, 0.05));
    session.dispatch(SessionCommand::Play { deck: DeckId::A }).unwrap();

    session.render(RATE as usize).unwrap(); // one second

    let updates = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::PositionUpdate { deck: DeckId::A, .. }))
        .count();
    assert!((15..=25).contains(&updates), "got {updates}");

    let state = session.snapshot();
    assert!(state.decks[0].playing);
    assert!(state.decks[0].position > 0.2);
}

#[test]
fn redundant_crossfader_sets_emit_once() {
    let _guard = lock();
    let mut session = ready_session();
    let events = session.subscribe();

    for _ in 0..5 {
        session
            .dispatch(SessionCommand::SetCrossfader { position: 0.25 })
            .unwrap();
    }

    let changes = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::CrossfaderChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn performance_updates_arrive_once_per_second() {
    let _guard = lock();
    let mut session = ready_session();
    let events = session.subscribe();

    // Three seconds of offline audio in block-sized steps
    for _ in 0..3 {
        session.render(RATE as usize).unwrap();
    }

    let perf = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::PerformanceUpdate { .. }))
        .count();
    assert!((2..=4).contains(&perf), "got {perf}");
}
