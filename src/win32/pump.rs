//! Message Pump Module
//!
//! Drains the overlay thread's message queue without blocking, so the
//! render loop keeps its own pace.

use tracing::trace;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_QUIT,
};

use crate::render_loop::{MessagePump, PumpStatus};

/// Non-blocking pump for the calling thread's message queue.
#[derive(Debug, Default)]
pub struct Win32Pump;

impl MessagePump for Win32Pump {
    fn drain(&mut self) -> PumpStatus {
        let mut status = PumpStatus::Continue;
        let mut msg = MSG::default();

        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            if msg.message == WM_QUIT {
                trace!("WM_QUIT drained");
                status = PumpStatus::Quit;
            }
        }

        status
    }
}
