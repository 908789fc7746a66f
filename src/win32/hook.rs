//! Low-level mouse hook
//!
//! A `WH_MOUSE_LL` hook sees clicks system-wide, whether or not the overlay
//! has focus. It lives on its own thread with its own message loop so hook
//! callbacks never wait on the render loop's vsync-blocked present.

use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{info, trace, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, MSG,
    MSLLHOOKSTRUCT, PM_NOREMOVE, WH_MOUSE_LL, WM_LBUTTONDOWN, WM_QUIT,
};

use crate::error::{OverlayError, OverlayResult};
use crate::gesture::{ClickEvent, ClickOutcome};
use crate::route;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Installed hook. Dropping it unhooks and joins the hook thread.
#[derive(Debug)]
pub struct MouseHook {
    thread_id: u32,
    join: Option<JoinHandle<()>>,
}

impl MouseHook {
    /// Install the hook. Clicks are routed through [`route::primary_click`],
    /// so the input route must already be attached.
    pub fn install() -> OverlayResult<Self> {
        info!("Installing low-level mouse hook...");
        let (ready_tx, ready_rx) = sync_channel::<anyhow::Result<u32>>(1);

        let join = std::thread::Builder::new()
            .name("overlay-mouse-hook".to_string())
            .spawn(move || {
                let mut msg = MSG::default();
                // Forces creation of this thread's message queue before the
                // thread id is handed out for PostThreadMessageW.
                unsafe {
                    let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
                }

                let module = match unsafe { GetModuleHandleW(None) } {
                    Ok(module) => module,
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow!(e)));
                        return;
                    }
                };

                let hook = match unsafe {
                    SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), module, 0)
                } {
                    Ok(hook) if !hook.0.is_null() => hook,
                    Ok(_) => {
                        let _ = ready_tx.send(Err(anyhow!(windows::core::Error::from_win32())));
                        return;
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(anyhow!(e)));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));

                loop {
                    let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
                    if r.0 <= 0 {
                        break;
                    }
                    unsafe {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }

                unsafe {
                    if let Err(e) = UnhookWindowsHookEx(hook) {
                        warn!("UnhookWindowsHookEx failed: {}", e);
                    }
                }
                info!("Mouse hook thread exiting");
            })
            .map_err(OverlayError::hook_install)?;

        let thread_id = await_ready(&ready_rx, &join, READY_TIMEOUT, post_quit);
        let thread_id = match thread_id {
            Ok(thread_id) => thread_id,
            Err(e) => {
                if join.join().is_err() {
                    warn!("Mouse hook thread panicked");
                }
                return Err(e);
            }
        };

        info!("Mouse hook installed on thread {}", thread_id);
        Ok(Self {
            thread_id,
            join: Some(join),
        })
    }

    /// Unhook and wait for the hook thread. Runs once; later calls are no-ops.
    pub fn uninstall(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };

        post_quit(self.thread_id);
        if join.join().is_err() {
            warn!("Mouse hook thread panicked");
        }
        info!("Mouse hook uninstalled");
    }
}

fn post_quit(thread_id: u32) {
    unsafe {
        if let Err(e) = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
            warn!("Failed to stop mouse hook thread: {}", e);
        }
    }
}

/// Wait for the hook thread to report its thread id.
///
/// On timeout the thread is not abandoned: its late answer is awaited and,
/// if it did install the hook, `stop` is sent to it, so the caller can always
/// join the thread and no hook outlives the failed install.
fn await_ready(
    ready: &Receiver<anyhow::Result<u32>>,
    thread: &JoinHandle<()>,
    timeout: Duration,
    stop: impl Fn(u32),
) -> OverlayResult<u32> {
    match ready.recv_timeout(timeout) {
        Ok(Ok(thread_id)) => Ok(thread_id),
        Ok(Err(e)) => Err(OverlayError::hook_install(e)),
        Err(_) => {
            warn!(
                "Mouse hook thread {:?} missed its {:?} readiness deadline",
                thread.thread().name(),
                timeout
            );
            // A disconnected channel means the thread already ended.
            if let Ok(Ok(thread_id)) = ready.recv() {
                stop(thread_id);
            }
            Err(OverlayError::hook_install(
                "mouse hook thread did not signal readiness",
            ))
        }
    }
}

impl Drop for MouseHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 && w_param.0 as u32 == WM_LBUTTONDOWN {
        let info = unsafe { &*(l_param.0 as *const MSLLHOOKSTRUCT) };
        let event = ClickEvent {
            timestamp_ms: info.time,
        };
        trace!("Primary button down at {:?}", info.pt);

        if route::primary_click(event) == ClickOutcome::Terminate {
            // The terminating click must not reach the window underneath.
            return LRESULT(1);
        }
    }

    CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    const SHORT: Duration = Duration::from_millis(20);

    fn spawn_reporter(
        delay: Duration,
        answer: anyhow::Result<u32>,
    ) -> (Receiver<anyhow::Result<u32>>, JoinHandle<()>) {
        let (tx, rx) = sync_channel(1);
        let join = std::thread::spawn(move || {
            std::thread::sleep(delay);
            let _ = tx.send(answer);
        });
        (rx, join)
    }

    #[test]
    fn prompt_ready_returns_thread_id() {
        let (rx, join) = spawn_reporter(Duration::ZERO, Ok(42));
        let id = await_ready(&rx, &join, Duration::from_secs(5), |_| {
            panic!("stop sent to a healthy thread")
        });
        assert_eq!(id.unwrap(), 42);
        join.join().unwrap();
    }

    #[test]
    fn install_error_is_reported() {
        let (rx, join) = spawn_reporter(Duration::ZERO, Err(anyhow::anyhow!("denied")));
        let err = await_ready(&rx, &join, Duration::from_secs(5), |_| {}).unwrap_err();
        assert!(matches!(err, OverlayError::HookInstall(ref msg) if msg.contains("denied")));
        join.join().unwrap();
    }

    #[test]
    fn late_thread_is_stopped_after_timeout() {
        let (rx, join) = spawn_reporter(SHORT * 5, Ok(7));
        let (stopped_tx, stopped_rx) = channel();

        let result = await_ready(&rx, &join, SHORT, |id| stopped_tx.send(id).unwrap());

        assert!(matches!(result, Err(OverlayError::HookInstall(_))));
        assert_eq!(stopped_rx.try_recv(), Ok(7));
        join.join().unwrap();
    }

    #[test]
    fn late_failure_needs_no_stop() {
        let (rx, join) = spawn_reporter(SHORT * 5, Err(anyhow::anyhow!("gone")));
        let result = await_ready(&rx, &join, SHORT, |_| panic!("nothing to stop"));

        assert!(result.is_err());
        join.join().unwrap();
    }

    #[test]
    fn install_then_drop_unhooks() {
        let mut hook = MouseHook::install().unwrap();
        hook.uninstall();
        assert!(hook.join.is_none());
        hook.uninstall();
    }
}
