//! Tests for the session controller, driven through the simulated device

use super::*;
use crate::device::{
    DriverCall, SimulatedController, X52Button, SOFT_BUTTON_DOWN, SOFT_BUTTON_SELECT,
    SOFT_BUTTON_UP,
};
use crate::error::{DriverError, DriverOp};
use crate::page::{LineBuffer, DISPLAY_ROWS};
use std::thread;
use std::time::{Duration, Instant};

fn open_simulated() -> (Session, SimulatedController) {
    let hw = SimulatedController::with_device(X52_PRO);
    let device = hw.device();
    let session = Session::open(SessionOptions::default(), move || device).unwrap();
    (session, hw)
}

fn rows(texts: [&str; DISPLAY_ROWS]) -> [String; DISPLAY_ROWS] {
    texts.map(str::to_string)
}

fn set_strings(calls: &[DriverCall], page: u32) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            DriverCall::SetString { page: p, text, .. } if *p == page => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn set_leds(calls: &[DriverCall], page: u32) -> Vec<(u32, bool)> {
    calls
        .iter()
        .filter_map(|call| match call {
            DriverCall::SetLed { page: p, led, on } if *p == page => Some((*led, *on)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_open_registers_callbacks() {
    let (session, hw) = open_simulated();

    assert_eq!(
        hw.calls()[..3],
        [
            DriverCall::Initialize {
                plugin_name: "Saitek".to_string()
            },
            DriverCall::Enumerate,
            DriverCall::DeviceType {
                device: session.device()
            },
        ]
    );
    assert!(hw.has_callbacks());
    assert_eq!(session.active_page().unwrap(), None);
    session.close().unwrap();
}

#[test]
fn test_end_to_end_scenario() {
    let (session, hw) = open_simulated();

    let first = session.add_page("First", 0).unwrap();
    assert_eq!(first.index(), 0);
    assert_eq!(session.active_page().unwrap(), Some(0));

    first.add_line("a").unwrap().add_line("b").unwrap();
    session.settle().unwrap();
    assert_eq!(first.snapshot().unwrap().unwrap().lines, vec!["b", "a"]);
    assert_eq!(hw.rows(0).unwrap(), rows(["b", "a", ""]));

    hw.clear_calls();
    let second = session.add_page("Second", 3).unwrap();
    session.settle().unwrap();
    assert_eq!(second.index(), 1);
    assert_eq!(session.active_page().unwrap(), Some(1));
    assert_eq!(
        hw.calls(),
        vec![DriverCall::AddPage {
            page: 1,
            title: "Second".to_string(),
            flags: crate::device::FLAG_SET_AS_ACTIVE,
        }]
    );

    hw.clear_calls();
    hw.select_page(0);
    session.settle().unwrap();
    assert_eq!(session.active_page().unwrap(), Some(0));
    assert_eq!(set_strings(&hw.calls(), 0), vec!["b", "a", ""]);
    assert!(set_strings(&hw.calls(), 1).is_empty());

    hw.press_soft_buttons(SOFT_BUTTON_DOWN);
    session.settle().unwrap();
    assert_eq!(first.snapshot().unwrap().unwrap().scroll_offset, 0);

    session.close().unwrap();
}

#[test]
fn test_background_page_is_never_drawn() {
    let (session, hw) = open_simulated();
    let first = session.add_page("First", 0).unwrap();
    let _second = session.add_page("Second", 0).unwrap();
    hw.clear_calls();

    first.add_line("hidden").unwrap();
    first.set_led(3, true).unwrap();
    first.scroll_down().unwrap();
    session.settle().unwrap();

    assert!(hw.output_calls().is_empty());
    session.close().unwrap();
}

#[test]
fn test_redraw_writes_exactly_three_rows() {
    let (session, hw) = open_simulated();
    let page = session.add_page("First", 0).unwrap();
    hw.clear_calls();

    page.update().unwrap();
    session.settle().unwrap();

    let calls = hw.calls();
    let rows: Vec<u32> = calls
        .iter()
        .filter_map(|call| match call {
            DriverCall::SetString { row, .. } => Some(*row),
            _ => None,
        })
        .collect();
    assert_eq!(rows, vec![0, 1, 2]);
    assert_eq!(set_strings(&calls, 0), vec!["", "", ""]);
    session.close().unwrap();
}

#[test]
fn test_repeated_led_write_flushes_once() {
    let (session, hw) = open_simulated();
    let page = session.add_page("First", 0).unwrap();
    let _front = session.add_page("Second", 0).unwrap();

    // Both markings land while the page is in the background
    page.set_led(4, true).unwrap().set_led(4, true).unwrap();
    session.settle().unwrap();
    assert!(hw.output_calls().is_empty());
    assert!(page.snapshot().unwrap().unwrap().dirty_leds.contains(&4));

    hw.clear_calls();
    hw.select_page(0);
    session.settle().unwrap();

    assert_eq!(set_leds(&hw.calls(), 0), vec![(4, true)]);
    let snapshot = page.snapshot().unwrap().unwrap();
    assert!(snapshot.dirty_leds.is_empty());
    assert_eq!(snapshot.leds.get(&4), Some(&true));
    session.close().unwrap();
}

#[test]
fn test_background_leds_catch_up_on_activation() {
    let (session, hw) = open_simulated();
    let first = session.add_page("First", 0).unwrap();
    let _second = session.add_page("Second", 0).unwrap();

    first.green(X52Button::FireA).unwrap();
    session.settle().unwrap();
    assert!(hw.output_calls().is_empty());
    let pending = first.snapshot().unwrap().unwrap().dirty_leds;
    assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec![1, 2]);

    hw.select_page(0);
    session.settle().unwrap();
    assert_eq!(hw.led(0, 1), Some(false));
    assert_eq!(hw.led(0, 2), Some(true));
    assert!(first.snapshot().unwrap().unwrap().dirty_leds.is_empty());
    session.close().unwrap();
}

#[test]
fn test_color_helpers_reach_hardware() {
    let (session, hw) = open_simulated();
    let page = session.add_page("Second", 20).unwrap();

    page.amber(X52Button::FireA)
        .unwrap()
        .red(X52Button::Toggle1_2)
        .unwrap()
        .green(X52Button::FireD)
        .unwrap()
        .off(X52Button::Clutch)
        .unwrap()
        .on(X52Button::Throttle)
        .unwrap()
        .on(X52Button::Toggle5_6)
        .unwrap()
        .amber(X52Button::Fire)
        .unwrap();
    session.settle().unwrap();

    assert_eq!((hw.led(0, 1), hw.led(0, 2)), (Some(true), Some(true)));
    assert_eq!((hw.led(0, 9), hw.led(0, 10)), (Some(true), Some(false)));
    assert_eq!((hw.led(0, 5), hw.led(0, 6)), (Some(false), Some(true)));
    assert_eq!((hw.led(0, 17), hw.led(0, 18)), (Some(false), Some(false)));
    assert_eq!(hw.led(0, 19), Some(true));
    // `on` does nothing for bicolor buttons, colours nothing for toggles
    assert_eq!((hw.led(0, 13), hw.led(0, 14)), (None, None));
    assert_eq!(hw.led(0, 0), None);
    session.close().unwrap();
}

#[test]
fn test_soft_button_up_wins_tie() {
    let (session, hw) = open_simulated();
    let page = session.add_page("First", 0).unwrap();
    for n in 0..6 {
        page.add_line(format!("line {n}")).unwrap();
    }
    page.scroll_down().unwrap().scroll_down().unwrap();
    session.settle().unwrap();
    assert_eq!(page.snapshot().unwrap().unwrap().scroll_offset, 2);

    hw.press_soft_buttons(SOFT_BUTTON_UP | SOFT_BUTTON_DOWN);
    session.settle().unwrap();
    assert_eq!(page.snapshot().unwrap().unwrap().scroll_offset, 1);
    assert_eq!(hw.rows(0).unwrap(), rows(["line 4", "line 3", "line 2"]));
    session.close().unwrap();
}

#[test]
fn test_select_button_and_empty_scroll_draw_nothing() {
    let (session, hw) = open_simulated();
    let page = session.add_page("Empty", 0).unwrap();
    hw.clear_calls();

    hw.press_soft_buttons(SOFT_BUTTON_DOWN);
    hw.press_soft_buttons(SOFT_BUTTON_SELECT);
    page.scroll_up().unwrap();
    session.settle().unwrap();

    assert!(hw.output_calls().is_empty());
    assert_eq!(page.snapshot().unwrap().unwrap().scroll_offset, 0);
    session.close().unwrap();
}

#[test]
fn test_deactivation_and_unknown_pages_are_ignored() {
    let (session, hw) = open_simulated();
    session.add_page("First", 0).unwrap();
    let mut events = session.subscribe();

    hw.fire_page_changed(0, false);
    hw.fire_page_changed(9, true);
    session.settle().unwrap();

    assert_eq!(session.active_page().unwrap(), Some(0));
    assert!(events.try_recv().is_err());
    session.close().unwrap();
}

#[test]
fn test_page_activation_event() {
    let (session, hw) = open_simulated();
    session.add_page("First", 0).unwrap();
    session.add_page("Second", 0).unwrap();
    let mut events = session.subscribe();

    hw.select_page(0);
    session.settle().unwrap();
    assert_eq!(events.try_recv().unwrap(), SessionEvent::PageActivated { page: 0 });
    session.close().unwrap();
}

#[test]
fn test_remove_page_keeps_indices() {
    let (session, hw) = open_simulated();
    let first = session.add_page("First", 0).unwrap();
    session.add_page("Second", 0).unwrap();

    session.remove_page(0).unwrap();
    session.settle().unwrap();
    assert!(hw.calls().contains(&DriverCall::RemovePage { page: 0 }));
    assert_eq!(first.snapshot().unwrap(), None);
    assert_eq!(session.active_page().unwrap(), Some(1));

    hw.fire_page_changed(0, true);
    session.settle().unwrap();
    assert_eq!(session.active_page().unwrap(), Some(1));

    let third = session.add_page("Third", 0).unwrap();
    assert_eq!(third.index(), 2);
    session.close().unwrap();
}

#[test]
fn test_driver_failure_is_reported_not_fatal() {
    let (session, hw) = open_simulated();
    let page = session.add_page("First", 0).unwrap();
    let mut events = session.subscribe();

    hw.fail(DriverOp::SetString);
    page.add_line("lost").unwrap();
    session.settle().unwrap();

    match events.try_recv().unwrap() {
        SessionEvent::DriverCallFailed { op, page, error } => {
            assert_eq!(op, DriverOp::SetString);
            assert_eq!(page, Some(0));
            assert!(matches!(error, DriverError::Status { .. }));
        }
        other => panic!("unexpected event {other:?}"),
    }
    // One attempt per row, no retries
    assert_eq!(set_strings(&hw.calls(), 0).len(), DISPLAY_ROWS);
    // The model keeps the line even though the device never showed it
    assert_eq!(page.snapshot().unwrap().unwrap().lines, vec!["lost"]);

    hw.heal(DriverOp::SetString);
    page.add_line("shown").unwrap();
    session.settle().unwrap();
    assert_eq!(hw.rows(0).unwrap(), rows(["shown", "lost", ""]));
    session.close().unwrap();
}

#[test]
fn test_failed_led_stays_dirty() {
    let (session, hw) = open_simulated();
    let page = session.add_page("First", 0).unwrap();

    hw.fail(DriverOp::SetLed);
    page.on(X52Button::Throttle).unwrap();
    session.settle().unwrap();
    assert!(page.snapshot().unwrap().unwrap().dirty_leds.contains(&19));

    hw.heal(DriverOp::SetLed);
    page.update().unwrap();
    session.settle().unwrap();
    assert_eq!(hw.led(0, 19), Some(true));
    assert!(page.snapshot().unwrap().unwrap().dirty_leds.is_empty());
    session.close().unwrap();
}

#[test]
fn test_device_not_found() {
    let hw = SimulatedController::new();
    let device = hw.device();

    let result = Session::open(SessionOptions::default(), move || device);
    assert!(matches!(
        result,
        Err(SessionError::DeviceNotFound { expected }) if expected == X52_PRO
    ));
    assert_eq!(hw.calls().last(), Some(&DriverCall::Deinitialize));
    assert!(!hw.is_initialized());
    assert!(!hw.has_callbacks());
}

#[test]
fn test_other_device_class_is_skipped() {
    let other: DeviceClassId = "{29DAD506-F93B-4F20-85FA-1E02C04FAC17}".parse().unwrap();
    let hw = SimulatedController::with_device(other);
    let wanted = hw.plug_in(X52_PRO);
    let device = hw.device();

    let session = Session::open(SessionOptions::default(), move || device).unwrap();
    assert_eq!(session.device(), wanted);
    session.close().unwrap();
}

#[test]
fn test_initialize_failure() {
    let hw = SimulatedController::with_device(X52_PRO);
    hw.fail(DriverOp::Initialize);
    let device = hw.device();

    let result = Session::open(SessionOptions::default(), move || device);
    assert!(matches!(
        result,
        Err(SessionError::DriverCallFailed {
            op: DriverOp::Initialize,
            ..
        })
    ));
    assert_eq!(hw.calls().len(), 1);
}

#[test]
fn test_close_releases_in_order() {
    let (session, hw) = open_simulated();
    let first = session.add_page("First", 0).unwrap();
    session.add_page("Second", 0).unwrap();
    let mut events = session.subscribe();
    hw.clear_calls();

    session.close().unwrap();

    assert_eq!(
        hw.calls(),
        vec![
            DriverCall::RemovePage { page: 0 },
            DriverCall::RemovePage { page: 1 },
            DriverCall::RegisterPageCallback { installed: false },
            DriverCall::RegisterSoftButtonCallback { installed: false },
            DriverCall::Deinitialize,
        ]
    );
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Closed);
    assert!(session.is_closed());
    assert!(matches!(first.add_line("late"), Err(SessionError::SessionClosed)));
    assert!(matches!(session.add_page("Late", 0), Err(SessionError::SessionClosed)));
    assert!(matches!(session.close(), Err(SessionError::SessionClosed)));

    // A callback arriving after close is dropped quietly
    hw.press_soft_buttons(SOFT_BUTTON_UP);
}

#[test]
fn test_close_drains_pending_updates() {
    let (session, hw) = open_simulated();
    let page = session.add_page("First", 0).unwrap();
    hw.clear_calls();

    page.add_line("last words").unwrap();
    session.close().unwrap();

    let calls = hw.calls();
    let drawn = calls
        .iter()
        .position(|c| matches!(c, DriverCall::SetString { text, .. } if text == "last words"))
        .expect("pending redraw should run before shutdown");
    let removed = calls
        .iter()
        .position(|c| *c == DriverCall::RemovePage { page: 0 })
        .unwrap();
    assert!(drawn < removed);
}

#[test]
fn test_drop_closes_session() {
    let (session, hw) = open_simulated();
    drop(session);

    let deadline = Instant::now() + Duration::from_secs(2);
    while hw.is_initialized() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!hw.is_initialized());
    assert!(!hw.has_callbacks());
}

#[test]
fn test_concurrent_lines_and_callbacks() {
    const THREADS: usize = 4;
    const LINES: usize = 50;
    const SEED_LINES: usize = 10;

    let (session, hw) = open_simulated();
    let page = session.add_page("Busy", 0).unwrap();
    for n in 0..SEED_LINES {
        page.add_line(format!("seed {n}")).unwrap();
    }
    session.settle().unwrap();

    // Ups at offset 0 are clamped, so only the submitted order gives this result
    let presses: Vec<u32> = (0..3)
        .flat_map(|_| {
            [SOFT_BUTTON_UP; 3]
                .into_iter()
                .chain([SOFT_BUTTON_DOWN; 4])
        })
        .collect();
    let mut model = LineBuffer::new(0);
    for n in 0..SEED_LINES {
        model.push(format!("seed {n}"));
    }
    for mask in &presses {
        if mask & SOFT_BUTTON_UP != 0 {
            model.scroll_up();
        } else {
            model.scroll_down();
        }
    }

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let page = page.clone();
            thread::spawn(move || {
                for n in 0..LINES {
                    page.add_line(format!("{t}:{n}")).unwrap();
                }
            })
        })
        .collect();
    let presser = {
        let hw = hw.clone();
        thread::spawn(move || {
            for mask in presses {
                hw.press_soft_buttons(mask);
                hw.select_page(0);
            }
        })
    };
    for writer in writers {
        writer.join().unwrap();
    }
    presser.join().unwrap();
    session.settle().unwrap();

    let snapshot = page.snapshot().unwrap().unwrap();
    assert_eq!(snapshot.lines.len(), THREADS * LINES + SEED_LINES);
    // New lines never move the offset and the bound only grows, so the
    // presses replay exactly as they would on the seeded page alone
    assert_eq!(snapshot.scroll_offset, model.scroll_offset());
    assert_eq!(snapshot.scroll_offset, 6);
    for t in 0..THREADS {
        // Newest first, so each writer's lines appear in reverse order
        let mine: Vec<usize> = snapshot
            .lines
            .iter()
            .filter_map(|line| line.strip_prefix(&format!("{t}:")))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(mine, (0..LINES).rev().collect::<Vec<_>>());
    }

    let expected: Vec<String> = snapshot.lines
        [snapshot.scroll_offset..snapshot.scroll_offset + DISPLAY_ROWS]
        .to_vec();
    assert_eq!(hw.rows(0).unwrap().to_vec(), expected);
    session.close().unwrap();
}

#[tokio::test]
async fn test_async_api() {
    let hw = SimulatedController::with_device(X52_PRO);
    let device = hw.device();
    let session = tokio::task::spawn_blocking(move || {
        Session::open(SessionOptions::default(), move || device)
    })
    .await
    .unwrap()
    .unwrap();

    let page = session.add_page_async("Async", 2).await.unwrap();
    page.add_line("one").unwrap().add_line("two").unwrap().add_line("three").unwrap();
    session.settle_async().await.unwrap();

    let snapshot = page.snapshot_async().await.unwrap().unwrap();
    assert_eq!(snapshot.lines, vec!["three", "two"]);
    assert_eq!(hw.rows(0).unwrap(), rows(["three", "two", ""]));

    session.close_async().await.unwrap();
    assert!(!hw.is_initialized());
}
