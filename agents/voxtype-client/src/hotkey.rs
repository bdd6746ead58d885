//! Global push-to-talk listener. rdev's listen loop runs on its own thread
//! and marshals press/release into the async event queue.

use rdev::{EventType, Key};
use tokio::sync::mpsc;
use tracing::error;

use crate::capture::CaptureEvent;
use crate::now_epoch;

/// Starts the global hotkey listener for `key_name`.
pub fn spawn_listener(key_name: &str, events: mpsc::Sender<CaptureEvent>) -> anyhow::Result<()> {
    let key = parse_key(key_name)?;

    std::thread::Builder::new()
        .name("hotkey".into())
        .spawn(move || {
            // Key auto-repeat fires repeated presses while held.
            let mut held = false;
            let result = rdev::listen(move |event| match event.event_type {
                EventType::KeyPress(k) if k == key => {
                    if !held {
                        held = true;
                        let _ = events.try_send(CaptureEvent::Begin { time: now_epoch() });
                    }
                }
                EventType::KeyRelease(k) if k == key => {
                    if held {
                        held = false;
                        let _ = events.try_send(CaptureEvent::Finish { time: now_epoch() });
                    }
                }
                _ => {}
            });
            if let Err(e) = result {
                error!(error = ?e, "hotkey listener failed");
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to spawn hotkey thread: {e}"))?;

    Ok(())
}

fn parse_key(name: &str) -> anyhow::Result<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "caps_lock" => Key::CapsLock,
        "left_ctrl" => Key::ControlLeft,
        "right_ctrl" => Key::ControlRight,
        "left_alt" => Key::Alt,
        "right_alt" => Key::AltGr,
        "left_shift" => Key::ShiftLeft,
        "right_shift" => Key::ShiftRight,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => anyhow::bail!(
            "unknown hotkey '{other}' (expected caps_lock, left/right_ctrl, \
             left/right_alt, left/right_shift or f1..f12)"
        ),
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        assert!(matches!(parse_key("caps_lock"), Ok(Key::CapsLock)));
        assert!(matches!(parse_key("F2"), Ok(Key::F2)));
        assert!(matches!(parse_key("right_ctrl"), Ok(Key::ControlRight)));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse_key("super_mega_key").is_err());
    }
}
