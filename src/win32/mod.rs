//! Windows platform layer
//!
//! Native window, global mouse hook, D3D11 presentation chain, egui painter,
//! message pump and error dialog.

pub mod d3d11;
pub mod dialog;
pub mod hook;
pub mod painter;
pub mod pump;
pub mod window;

use tracing::warn;
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentThread, SetPriorityClass, SetThreadPriority,
    NORMAL_PRIORITY_CLASS, THREAD_PRIORITY_NORMAL,
};

pub use d3d11::D3d11Chain;
pub use hook::MouseHook;
pub use painter::D3d11Painter;
pub use pump::Win32Pump;
pub use window::{primary_screen_size, OverlayWindow};

/// Run at normal priority so the overlay neither starves nor dominates the
/// scheduler.
pub fn set_normal_priority() {
    unsafe {
        if let Err(e) = SetPriorityClass(GetCurrentProcess(), NORMAL_PRIORITY_CLASS) {
            warn!("SetPriorityClass failed: {}", e);
        }
        if let Err(e) = SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_NORMAL) {
            warn!("SetThreadPriority failed: {}", e);
        }
    }
}
