//! Enumeration of visible top-level windows and their owning processes.
//!
//! # Platform
//!
//! Windows-only. On other platforms the enumerator is defined but
//! [`ProcessSource::snapshot`] returns an error and no window is ever
//! in the foreground.

use crate::error::AppWatchError;
use crate::model::{Pid, Snapshot};
use crate::platform::ProcessSource;

/// Snapshots the applications that own at least one visible top-level
/// window.
///
/// Processes that cannot be opened or whose image path cannot be
/// queried (e.g. elevated processes) are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowEnumerator;

impl WindowEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSource for WindowEnumerator {
    fn snapshot(&self) -> Result<Snapshot, AppWatchError> {
        platform::snapshot()
    }

    fn foreground_pid(&self) -> Pid {
        platform::foreground_pid()
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use std::path::PathBuf;

    use windows::Win32::Foundation::{BOOL, CloseHandle, HWND, LPARAM, TRUE};
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
        QueryFullProcessImageNameW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetForegroundWindow, GetWindowThreadProcessId, IsWindowVisible,
    };
    use windows::core::PWSTR;

    use super::*;
    use crate::model::ApplicationRecord;

    /// Longest image path we accept, in UTF-16 units.
    const MAX_IMAGE_PATH: usize = 1024;

    pub(super) fn snapshot() -> Result<Snapshot, AppWatchError> {
        let mut snapshot = Snapshot::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut snapshot as *mut Snapshot as isize),
            )
        }
        .map_err(|e| AppWatchError::Enumeration(format!("EnumWindows: {e}")))?;
        Ok(snapshot)
    }

    pub(super) fn foreground_pid() -> Pid {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return 0;
        }
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        pid
    }

    /// `EnumWindows` callback: `lparam` points at the snapshot being built.
    unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
        // SAFETY: `snapshot()` passes a live `&mut Snapshot` for the whole
        // duration of the synchronous enumeration.
        let snapshot = unsafe { &mut *(lparam.0 as *mut Snapshot) };

        if !unsafe { IsWindowVisible(hwnd) }.as_bool() {
            return TRUE;
        }

        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        if pid == 0 || snapshot.contains(pid) {
            return TRUE;
        }

        if let Some(record) = image_path(pid).and_then(|p| ApplicationRecord::from_exec_path(pid, p)) {
            snapshot.insert(record);
        }
        TRUE
    }

    fn image_path(pid: u32) -> Option<PathBuf> {
        let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;

        let mut buf = [0u16; MAX_IMAGE_PATH];
        let mut len = buf.len() as u32;
        let queried = unsafe {
            QueryFullProcessImageNameW(
                process,
                PROCESS_NAME_WIN32,
                PWSTR(buf.as_mut_ptr()),
                &mut len,
            )
        };
        let _ = unsafe { CloseHandle(process) };
        queried.ok()?;

        Some(PathBuf::from(OsString::from_wide(&buf[..len as usize])))
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::*;

    pub(super) fn snapshot() -> Result<Snapshot, AppWatchError> {
        Err(AppWatchError::Unsupported(
            "window enumeration is only available on Windows",
        ))
    }

    pub(super) fn foreground_pid() -> Pid {
        0
    }
}

// ── Tests ────────────────────────────────────────────────────────
