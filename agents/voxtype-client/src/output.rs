//! Where recognized text ends up: pasted through the clipboard or typed as
//! keystrokes. The core never touches a keyboard library outside this
//! module.

use std::sync::{Arc, Mutex};

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::warn;

use crate::config::ClientConfig;

/// Emits one transcript into the focused application. Implementations are
/// synchronous and are driven from a blocking task.
pub trait OutputDriver: Send {
    fn emit(&mut self, text: &str) -> anyhow::Result<()>;
}

pub type SharedOutput = Arc<Mutex<Box<dyn OutputDriver>>>;

pub fn build(config: &ClientConfig) -> SharedOutput {
    let driver: Box<dyn OutputDriver> = if config.paste {
        Box::new(ClipboardPaster {
            restore_clip: config.restore_clip,
        })
    } else {
        Box::new(KeystrokeTyper)
    };
    Arc::new(Mutex::new(driver))
}

/// Types the text as plain keystrokes.
pub struct KeystrokeTyper;

fn type_keystrokes(text: &str) -> anyhow::Result<()> {
    let mut enigo = Enigo::new(&Settings::default())
        .map_err(|e| anyhow::anyhow!("keyboard unavailable: {e}"))?;
    enigo
        .text(text)
        .map_err(|e| anyhow::anyhow!("failed to type text: {e}"))
}

impl OutputDriver for KeystrokeTyper {
    fn emit(&mut self, text: &str) -> anyhow::Result<()> {
        type_keystrokes(text)
    }
}

/// Copies the text to the clipboard and sends the paste chord, optionally
/// restoring the previous clipboard contents. Clipboard failures fall back
/// to the keystroke path.
pub struct ClipboardPaster {
    restore_clip: bool,
}

impl OutputDriver for ClipboardPaster {
    fn emit(&mut self, text: &str) -> anyhow::Result<()> {
        let mut clipboard = match Clipboard::new() {
            Ok(clipboard) => clipboard,
            Err(e) => {
                warn!(error = %e, "clipboard unavailable, typing instead");
                return type_keystrokes(text);
            }
        };

        let previous = clipboard.get_text().unwrap_or_default();
        if let Err(e) = clipboard.set_text(text.to_string()) {
            warn!(error = %e, "clipboard write failed, typing instead");
            return type_keystrokes(text);
        }

        send_paste_chord()?;

        if self.restore_clip {
            // Give the target application a moment to read the clipboard.
            std::thread::sleep(std::time::Duration::from_millis(100));
            if let Err(e) = clipboard.set_text(previous) {
                warn!(error = %e, "failed to restore clipboard");
            }
        }
        Ok(())
    }
}

fn send_paste_chord() -> anyhow::Result<()> {
    let mut enigo = Enigo::new(&Settings::default())
        .map_err(|e| anyhow::anyhow!("keyboard unavailable: {e}"))?;

    #[cfg(target_os = "macos")]
    let modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let modifier = Key::Control;

    enigo
        .key(modifier, Direction::Press)
        .and_then(|_| enigo.key(Key::Unicode('v'), Direction::Click))
        .and_then(|_| enigo.key(modifier, Direction::Release))
        .map_err(|e| anyhow::anyhow!("failed to send paste chord: {e}"))
}
