use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use crate::error::{WasapiError, WinResultExt};

/// COM initialization for the current thread, undone on drop.
///
/// If the thread was already initialized in a different apartment, COM is
/// left as the caller set it up and nothing is undone.
pub(crate) struct ComScope {
    owned: bool,
}

impl ComScope {
    pub fn enter() -> Result<Self, WasapiError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owned: false });
        }
        hr.ok().context("CoInitializeEx")?;
        Ok(Self { owned: true })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
