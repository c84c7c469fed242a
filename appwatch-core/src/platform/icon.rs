//! Icon extraction from an executable's resources.
//!
//! Loads the image as a data file, takes its first `RT_GROUP_ICON`,
//! asks the OS which entry best fits 48×48 and returns that `RT_ICON`
//! resource verbatim. Any failure along the way means "no icon".

use std::path::Path;

use crate::platform::IconExtractor;

/// Desired icon edge in pixels.
pub const ICON_SIZE: i32 = 48;

/// Win32 resource-section icon extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceIconExtractor;

impl ResourceIconExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl IconExtractor for ResourceIconExtractor {
    fn extract_icon(&self, exec_path: &Path) -> Option<Vec<u8>> {
        let icon = platform::extract(exec_path);
        if icon.is_none() {
            tracing::debug!("no icon for {}", exec_path.display());
        }
        icon
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use std::os::windows::ffi::OsStrExt;

    use windows::Win32::Foundation::{BOOL, FALSE, FreeLibrary, HMODULE, TRUE};
    use windows::Win32::System::LibraryLoader::{
        EnumResourceNamesW, FindResourceW, LOAD_LIBRARY_AS_DATAFILE, LoadLibraryExW,
        LoadResource, LockResource, SizeofResource,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        LR_DEFAULTCOLOR, LookupIconIdFromDirectoryEx, RT_GROUP_ICON, RT_ICON,
    };
    use windows::core::PCWSTR;

    use super::*;

    /// A module mapped as a data file, unmapped on drop.
    struct DataModule(HMODULE);

    impl Drop for DataModule {
        fn drop(&mut self) {
            let _ = unsafe { FreeLibrary(self.0) };
        }
    }

    pub(super) fn extract(exec_path: &Path) -> Option<Vec<u8>> {
        let wide: Vec<u16> = exec_path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();
        let module = unsafe {
            LoadLibraryExW(PCWSTR(wide.as_ptr()), None, LOAD_LIBRARY_AS_DATAFILE)
        }
        .ok()
        .map(DataModule)?;

        let group = first_group_icon(&module)?;
        let directory = resource_bytes(&module, group, RT_GROUP_ICON)?;

        let id = unsafe {
            LookupIconIdFromDirectoryEx(
                directory.as_ptr(),
                TRUE,
                ICON_SIZE,
                ICON_SIZE,
                LR_DEFAULTCOLOR,
            )
        };
        if id == 0 {
            return None;
        }

        resource_bytes(&module, PCWSTR(id as usize as *const u16), RT_ICON)
    }

    /// Name (or integer id) of the first `RT_GROUP_ICON` in the module.
    fn first_group_icon(module: &DataModule) -> Option<PCWSTR> {
        unsafe extern "system" fn take_first(
            _module: HMODULE,
            _kind: PCWSTR,
            name: PCWSTR,
            lparam: isize,
        ) -> BOOL {
            if name.is_null() {
                return TRUE;
            }
            // SAFETY: `lparam` is the `&mut Option<PCWSTR>` passed below.
            unsafe { *(lparam as *mut Option<PCWSTR>) = Some(name) };
            FALSE
        }

        let mut found: Option<PCWSTR> = None;
        // Stopping early makes the call report an error; only `found` matters.
        let _ = unsafe {
            EnumResourceNamesW(
                module.0,
                RT_GROUP_ICON,
                Some(take_first),
                &mut found as *mut Option<PCWSTR> as isize,
            )
        };
        found
    }

    /// Copy a resource out of the mapped module.
    fn resource_bytes(module: &DataModule, name: PCWSTR, kind: PCWSTR) -> Option<Vec<u8>> {
        let info = unsafe { FindResourceW(module.0, name, kind) }.ok()?;
        let size = unsafe { SizeofResource(module.0, info) } as usize;
        if size == 0 {
            return None;
        }
        let handle = unsafe { LoadResource(module.0, info) }.ok()?;
        let ptr = unsafe { LockResource(handle) } as *const u8;
        if ptr.is_null() {
            return None;
        }
        // SAFETY: the resource is `size` bytes long and stays mapped while
        // `module` is alive.
        Some(unsafe { std::slice::from_raw_parts(ptr, size) }.to_vec())
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::*;

    pub(super) fn extract(_exec_path: &Path) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_has_no_icon() {
        let extractor = ResourceIconExtractor::new();
        assert!(extractor
            .extract_icon(Path::new("/definitely/not/here/app.exe"))
            .is_none());
    }
}
