//! Error Dialog Module
//!
//! Blocking message box for fatal startup failures.

use windows::core::{w, HSTRING};
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR};

use crate::error::OverlayError;

/// Blocking error box for a fatal startup failure.
pub fn show_error(err: &OverlayError) {
    let text = HSTRING::from(err.dialog_text());
    unsafe {
        let _ = MessageBoxW(None, &text, w!("Error"), MB_ICONERROR);
    }
}
