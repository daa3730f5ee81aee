// Scheduler integration tests
//
// Drive the scheduler with a scripted core on a manual clock and check the
// frame skip policy, buffer rotation, audio submission and session handling.

mod common;

use common::{Harness, MS};
use nes_runner::display::{ScreenshotError, UpdateKind};
use nes_runner::emulator::Region;
use nes_runner::input::{GamepadState, NesPad};
use nes_runner::scheduler::{Handlers, MenuRequest, StartAction};
use nes_runner::settings::{MemorySettingsStore, SettingKey, SettingsStore};
use nes_runner::Error;
use std::fs;
use std::path::Path;

fn pal() -> Harness {
    Harness::new(Region::Pal)
}

#[test]
fn test_first_frame_is_full_and_skips_one() {
    let mut h = pal();
    let first = h.scheduler.run_frame().unwrap();
    assert!(first.drew);
    assert_eq!(first.update, Some(UpdateKind::Full));
    assert_eq!(first.skip_frames, 1);

    let second = h.scheduler.run_frame().unwrap();
    assert!(!second.drew);
    assert_eq!(second.update, None);
    assert_eq!(second.skip_frames, 0);
}

#[test]
fn test_slow_frame_skips_the_next() {
    let mut h = pal();
    // Full first frame and its skip
    assert_eq!(h.run(2), vec![true, false]);

    h.scheduler
        .core_mut()
        .script(&[5 * MS, 5 * MS, 30 * MS, 5 * MS, 5 * MS]);
    assert_eq!(h.run(5), vec![true, true, true, false, true]);
}

#[test]
fn test_moving_dot_publishes_partial_updates() {
    let mut h = pal();
    h.run(4);

    let kinds = h.sink.kinds();
    assert_eq!(kinds.len(), 3);
    assert_eq!(kinds[0], UpdateKind::Full);
    for kind in &kinds[1..] {
        match kind {
            UpdateKind::Partial(rect) => assert_eq!(rect.height, 1),
            other => panic!("expected a partial update, got {:?}", other),
        }
    }
}

#[test]
fn test_frame_at_exact_duration_skips() {
    let mut h = pal();
    h.run(2);
    h.scheduler.core_mut().script(&[20 * MS]);
    let report = h.scheduler.run_frame().unwrap();
    assert!(report.drew);
    assert_eq!(report.elapsed_micros, 20 * MS);
    assert_eq!(report.skip_frames, 1);
}

#[test]
fn test_speedup_skips_twice_the_factor() {
    let mut h = pal();
    h.host.0.speedup.set(2);

    let report = h.scheduler.run_frame().unwrap();
    assert_eq!(report.skip_frames, 4);
    assert_eq!(h.run(4), vec![false, false, false, false]);
    assert!(h.scheduler.run_frame().unwrap().drew);
}

#[test]
fn test_no_audio_while_speeding_up() {
    let mut h = pal();
    h.host.0.speedup.set(1);
    h.run(6);
    assert!(h.audio.0.borrow().is_empty());

    h.host.0.speedup.set(0);
    h.run(1);
    assert_eq!(h.audio.0.borrow().len(), 1);
}

#[test]
fn test_audio_submitted_on_skipped_frames() {
    let mut h = pal();
    let drawn = h.run(4);
    assert!(drawn.contains(&false));

    let submitted = h.audio.0.borrow();
    assert_eq!(submitted.len(), 4);
    // 32 kHz at 50 Hz
    assert!(submitted.iter().all(|&n| n == 640));
}

#[test]
fn test_host_ticks_with_frame_time() {
    let mut h = pal();
    h.scheduler.core_mut().script(&[7 * MS, 12 * MS]);
    h.run(3);
    assert_eq!(*h.host.0.ticks.borrow(), vec![7 * MS, 12 * MS, 5 * MS]);
}

#[test]
fn test_buffers_alternate() {
    let mut h = pal();
    h.run(6);
    // Frame 2 is skipped after the full first frame
    assert_eq!(h.sink.buffers(), vec![0, 1, 0, 1, 0]);
    assert_eq!(h.scheduler.core().rendered, 5);
}

#[test]
fn test_start_warms_up_without_video() {
    let mut h = pal();
    h.scheduler.start(StartAction::NewGame).unwrap();

    let core = h.scheduler.core();
    assert_eq!(core.steps, 2);
    assert_eq!(core.rendered, 0);
    assert!(h.sink.log.borrow().is_empty());
    assert!(h.scheduler.clock().draw_next());
}

#[test]
fn test_resume_restores_slot_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = pal();
    h.scheduler = h
        .scheduler
        .with_storage(Some(Path::new("game.nes")), dir.path(), dir.path());

    h.scheduler.core_mut().steps = 42;
    h.scheduler.save_state(0).unwrap();
    assert!(h.scheduler.save_slots().path(0).exists());

    h.scheduler.start(StartAction::Resume).unwrap();
    assert_eq!(h.scheduler.core().steps, 42);
    assert_eq!(h.scheduler.core().hard_resets, 0);
}

#[test]
fn test_corrupt_state_hard_resets() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = pal();
    h.scheduler = h
        .scheduler
        .with_storage(Some(Path::new("game.nes")), dir.path(), dir.path());

    let path = h.scheduler.save_slots().path(0);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "garbage").unwrap();

    // Resume failure is not fatal
    h.scheduler.start(StartAction::Resume).unwrap();
    assert_eq!(h.scheduler.core().hard_resets, 1);

    assert!(h.scheduler.load_state(0).is_err());
    assert_eq!(h.scheduler.core().hard_resets, 2);
}

#[test]
fn test_missing_state_hard_resets() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = pal();
    h.scheduler = h
        .scheduler
        .with_storage(Some(Path::new("game.nes")), dir.path(), dir.path());

    assert!(h.scheduler.load_state(3).is_err());
    assert_eq!(h.scheduler.core().hard_resets, 1);
}

#[test]
fn test_reset_handler() {
    let mut h = pal();
    h.scheduler.reset(false);
    h.scheduler.reset(true);
    assert_eq!(h.scheduler.core().soft_resets, 1);
    assert_eq!(h.scheduler.core().hard_resets, 1);
}

#[test]
fn test_menu_buttons_raise_requests() {
    let mut h = pal();
    h.input.press(GamepadState::MENU | GamepadState::A);
    let report = h.scheduler.run_frame().unwrap();
    assert_eq!(report.menu, Some(MenuRequest::Game));
    // Menu buttons never reach the joypad
    assert_eq!(h.scheduler.core().pads[0], NesPad::A);

    h.input.press(GamepadState::OPTION);
    let report = h.scheduler.run_frame().unwrap();
    assert_eq!(report.menu, Some(MenuRequest::Settings));

    h.input.press(GamepadState::empty());
    assert_eq!(h.scheduler.run_frame().unwrap().menu, None);
}

#[test]
fn test_offline_input_drives_port_one() {
    let mut h = pal();
    h.input.press(GamepadState::START | GamepadState::LEFT);
    h.run(1);
    assert_eq!(h.scheduler.core().pads[0], NesPad::START | NesPad::LEFT);
    assert_eq!(h.scheduler.core().pads[1], NesPad::empty());
}

#[test]
fn test_run_until_menu_quit() {
    let mut h = pal();
    h.scheduler.run_frame().unwrap();
    h.input.press(GamepadState::MENU);

    let mut requests = Vec::new();
    h.scheduler
        .run(|scheduler, request| {
            requests.push(request);
            scheduler.shutdown_handle().request();
        })
        .unwrap();

    assert_eq!(requests, vec![MenuRequest::Game]);
    assert_eq!(h.scheduler.frames(), 2);
}

#[test]
fn test_core_failure_ends_run() {
    let mut h = pal();
    h.scheduler.core_mut().fail_at(3);
    let result = h.scheduler.run(|_, _| {});
    assert!(matches!(result, Err(Error::Core(_))));
    assert_eq!(h.scheduler.frames(), 2);
}

#[test]
fn test_screenshot_needs_a_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = pal();
    h.scheduler = h
        .scheduler
        .with_storage(Some(Path::new("game.nes")), dir.path(), dir.path());

    assert!(matches!(
        h.scheduler.take_screenshot(),
        Err(ScreenshotError::NoFrame)
    ));

    h.run(1);
    let path = h.scheduler.take_screenshot().unwrap();
    assert!(path.exists());
    assert!(path.starts_with(dir.path()));
}

#[test]
fn test_palette_change_forces_full_update() {
    let mut h = pal();
    h.run(4);
    let before = h.sink.log.borrow().len();
    let palette = h.scheduler.settings().palette.next();

    h.scheduler.set_palette(palette);
    assert_eq!(h.scheduler.settings().palette, palette);
    assert_eq!(
        h.scheduler.store().get_i32(SettingKey::Palette, -1),
        palette.index() as i32
    );

    // The last frame is presented again twice
    let kinds = h.sink.kinds();
    assert_eq!(kinds.len(), before + 2);
    assert!(kinds[before..].iter().all(UpdateKind::is_full));
    assert_eq!(h.sink.waits.get(), 1);

    let report = loop {
        let report = h.scheduler.run_frame().unwrap();
        if report.drew {
            break report;
        }
    };
    assert_eq!(report.update, Some(UpdateKind::Full));
}

#[test]
fn test_settings_loaded_from_store() {
    let mut store = MemorySettingsStore::new();
    store.set_i32(SettingKey::SpriteLimit, 0).unwrap();
    store.set_i32(SettingKey::CropMode, 2).unwrap();

    let h = Harness::with_store(Region::Ntsc, store);
    assert!(!h.scheduler.settings().sprite_limit);
    assert!(!h.scheduler.core().sprite_limit);
    assert_eq!(h.scheduler.clock().frame_duration_micros(), 16_666);
}
