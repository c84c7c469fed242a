//! Win32 `SendInput` keyboard injection.
//!
//! Used by the command loop to replay key chords received from the
//! client.
//!
//! # Platform
//!
//! Windows-only. On other platforms the injector is defined but all
//! methods return an error.

use crate::command::{KeyAction, KeyStroke};
use crate::error::AppWatchError;
use crate::platform::KeyInjector;

/// Injects keyboard events into the OS input stream.
///
/// On Windows this uses `SendInput`, which requires the calling process
/// to run in the same desktop session as the foreground application.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputInjector;

impl InputInjector {
    /// Create a new injector (no initialisation cost).
    pub fn new() -> Self {
        Self
    }
}

impl KeyInjector for InputInjector {
    fn inject_key(&self, key_code: u32, action: KeyAction) -> Result<(), AppWatchError> {
        platform::send(&[KeyStroke { key_code, action }])
    }

    /// The whole chord goes out in one `SendInput` call so other input
    /// cannot interleave with it.
    fn inject_sequence(&self, strokes: &[KeyStroke]) -> Result<(), AppWatchError> {
        if strokes.is_empty() {
            return Ok(());
        }
        platform::send(strokes)
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use windows::Win32::UI::Input::KeyboardAndMouse::*;

    pub(super) fn send(strokes: &[KeyStroke]) -> Result<(), AppWatchError> {
        let inputs: Vec<INPUT> = strokes
            .iter()
            .map(|stroke| {
                let flags = match stroke.action {
                    KeyAction::Press => KEYBD_EVENT_FLAGS(0),
                    KeyAction::Release => KEYEVENTF_KEYUP,
                };
                INPUT {
                    r#type: INPUT_KEYBOARD,
                    Anonymous: INPUT_0 {
                        ki: KEYBDINPUT {
                            wVk: VIRTUAL_KEY(stroke.key_code as u16),
                            wScan: 0,
                            dwFlags: flags,
                            time: 0,
                            dwExtraInfo: 0,
                        },
                    },
                }
            })
            .collect();

        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(AppWatchError::Injection(format!(
                "SendInput accepted {sent} of {} events",
                inputs.len()
            )));
        }

        Ok(())
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::*;

    pub(super) fn send(_strokes: &[KeyStroke]) -> Result<(), AppWatchError> {
        Err(AppWatchError::Unsupported(
            "input injection is only available on Windows",
        ))
    }
}

// ── Tests ────────────────────────────────────────────────────────
