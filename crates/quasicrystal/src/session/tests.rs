use super::*;
use crate::structures::StructureKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const WAIT: Duration = Duration::from_secs(60);

fn icosahedral(target: usize) -> GenerationParams {
    GenerationParams {
        structure: StructureKind::Icosahedral,
        lattice_range: 10,
        perp_window: 1.5,
        clip_radius: 8.0,
        target_count: target,
        batch_size: 500,
        phason_offset: 0.0,
        concurrency: 2,
        colorize: true,
        seed: Some(2024),
    }
}

#[test]
fn icosahedral_end_to_end() {
    let mut gen = Generator::new();
    let params = icosahedral(5000);
    gen.configure(params.clone()).unwrap();
    gen.start().unwrap();
    assert!(gen.wait(WAIT));
    assert_eq!(gen.state(), SessionState::Complete);
    assert_eq!(gen.accepted_count(), 5000);
    assert!((gen.progress() - 1.0).abs() < 1e-12);

    let view = gen.points_view().unwrap();
    assert_eq!(view.valid_len(), 5000);
    assert_eq!(view.colors().unwrap().len(), 5000);
    for p in view.positions() {
        let r = nalgebra::Vector3::from(*p).norm();
        assert!(r <= params.clip_radius + 1e-5);
    }
    assert!(view.stats().max_radius <= params.clip_radius + 1e-5);
    assert_eq!(view.perp_distances().len(), 5000);
    assert!(view
        .perp_distances()
        .iter()
        .all(|&d| d <= params.perp_window + 1e-5));
}

#[test]
fn restart_allocates_a_fresh_buffer() {
    let mut gen = Generator::new();
    gen.configure(icosahedral(3000)).unwrap();
    let first = gen.start().unwrap();
    assert!(gen.wait(WAIT));
    let old = Arc::clone(gen.points().unwrap());

    gen.configure(GenerationParams {
        target_count: 1200,
        seed: Some(5),
        ..icosahedral(0)
    })
    .unwrap();
    let second = gen.start().unwrap();
    assert_ne!(first, second);
    let fresh = gen.points().unwrap();
    assert!(!Arc::ptr_eq(&old, fresh));
    assert_eq!(fresh.target(), 1200);
    assert_eq!(fresh.session(), second);
    assert!(fresh.view().capacity() == 1200);
    assert!(gen.wait(WAIT));
    assert_eq!(gen.accepted_count(), 1200);
    // the previous session's buffer is untouched by the new pool
    assert_eq!(old.accepted(), 3000);
}

#[test]
fn cancel_with_empty_window_is_prompt() {
    let mut gen = Generator::new();
    gen.configure(GenerationParams {
        perp_window: 0.0,
        concurrency: 4,
        target_count: 1_000_000,
        colorize: false,
        ..icosahedral(0)
    })
    .unwrap();
    gen.start().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(gen.state(), SessionState::Building);
    assert_eq!(gen.progress(), 0.0);
    let t0 = Instant::now();
    let stats = gen.cancel().unwrap();
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert_eq!(stats.workers, 4);
    assert_eq!(stats.accepted, 0);
    assert_eq!(gen.state(), SessionState::Idle);
    assert!(gen.points_view().is_none());
    assert!(!gen.wait(Duration::from_millis(1)));
}

#[test]
fn invalid_config_is_rejected_and_keeps_session() {
    let mut gen = Generator::new();
    assert_eq!(gen.start(), Err(GenerationError::NotConfigured));
    assert_eq!(gen.state(), SessionState::Idle);

    gen.configure(icosahedral(800)).unwrap();
    let id = gen.start().unwrap();
    let err = gen
        .configure(GenerationParams {
            batch_size: 0,
            ..icosahedral(800)
        })
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidConfig { .. }));
    assert_eq!(gen.session_id(), Some(id));
    assert_eq!(gen.params().unwrap().batch_size, 500);
    assert!(gen.wait(WAIT));
}

#[test]
fn completion_hook_fires_once_per_session() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let mut gen = Generator::new();
    gen.on_complete(move |s| {
        assert_eq!(s.accepted, s.target);
        counter.fetch_add(1, Ordering::SeqCst);
    });
    gen.configure(icosahedral(1000)).unwrap();
    gen.start().unwrap();
    assert!(gen.wait(WAIT));
    gen.start().unwrap();
    assert!(gen.wait(WAIT));
    gen.cancel();
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[test]
fn seeded_sessions_use_the_configured_seed() {
    let mut gen = Generator::new();
    gen.configure(GenerationParams {
        structure: StructureKind::Octagonal,
        lattice_range: 6,
        clip_radius: 5.0,
        ..icosahedral(400)
    })
    .unwrap();
    gen.start().unwrap();
    assert_eq!(gen.session_params().unwrap().1, 2024);
    assert!(gen.wait(WAIT));
    assert!(gen.points_view().unwrap().stats().max_radius <= 5.0 + 1e-9);
}

#[test]
fn oversized_batch_size_still_completes() {
    let mut gen = Generator::new();
    gen.configure(GenerationParams {
        batch_size: 40_000_000,
        target_count: 100,
        ..icosahedral(0)
    })
    .unwrap();
    gen.start().unwrap();
    assert!(gen.wait(WAIT));
    assert_eq!(gen.accepted_count(), 100);

    let err = gen
        .configure(GenerationParams {
            batch_size: 1 << 40,
            target_count: 100,
            ..icosahedral(0)
        })
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidConfig { .. }));
    assert_eq!(gen.state(), SessionState::Complete);
}

#[test]
fn rejected_restart_keeps_running_session_and_its_buffer() {
    let mut gen = Generator::new();
    gen.configure(icosahedral(600)).unwrap();
    let id = gen.start().unwrap();
    assert!(gen.wait(WAIT));
    let before = gen.points().unwrap().snapshot();

    // validation fails inside start, before any teardown
    gen.params = Some(GenerationParams {
        concurrency: 0,
        ..icosahedral(600)
    });
    assert!(matches!(
        gen.start(),
        Err(GenerationError::InvalidConfig { .. })
    ));
    assert_eq!(gen.session_id(), Some(id));
    assert_eq!(gen.points().unwrap().snapshot(), before);
}
