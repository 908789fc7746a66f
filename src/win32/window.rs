//! Overlay window
//!
//! Borderless, topmost, screen-sized popup. Escape raises the exit signal
//! through the input route; destroying the window posts the quit message.

use tracing::{debug, info, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{CreateSolidBrush, UpdateWindow};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::VK_ESCAPE;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetSystemMetrics, LoadCursorW,
    PostQuitMessage, RegisterClassExW, ShowWindow, UnregisterClassW, CS_HREDRAW, CS_VREDRAW,
    IDC_ARROW, SM_CXSCREEN, SM_CYSCREEN, SW_SHOW, WM_DESTROY, WM_KEYDOWN, WNDCLASSEXW,
    WS_EX_TOPMOST, WS_POPUP,
};

use crate::context::ScreenSize;
use crate::error::{OverlayError, OverlayResult};
use crate::route;

const WINDOW_CLASS: PCWSTR = w!("Overlay");
const WINDOW_TITLE: PCWSTR = w!("Overlay");

/// Resolution of the primary screen.
pub fn primary_screen_size() -> ScreenSize {
    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    ScreenSize::new(width.max(1) as u32, height.max(1) as u32)
}

/// Registered window class plus the window created from it.
pub struct OverlayWindow {
    hwnd: HWND,
    instance: HINSTANCE,
}

impl OverlayWindow {
    pub fn create(size: ScreenSize) -> OverlayResult<Self> {
        info!("Creating overlay window {}x{}", size.width, size.height);

        let instance: HINSTANCE = unsafe { GetModuleHandleW(None) }
            .map_err(OverlayError::window_creation)?
            .into();

        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_procedure),
            hInstance: instance,
            hCursor: unsafe { LoadCursorW(None, IDC_ARROW) }.unwrap_or_default(),
            // Owned by the class; the system deletes it on unregister.
            hbrBackground: unsafe { CreateSolidBrush(COLORREF(0)) },
            lpszClassName: WINDOW_CLASS,
            ..Default::default()
        };

        if unsafe { RegisterClassExW(&class) } == 0 {
            return Err(OverlayError::window_creation(
                windows::core::Error::from_win32(),
            ));
        }

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_TOPMOST,
                WINDOW_CLASS,
                WINDOW_TITLE,
                WS_POPUP,
                0,
                0,
                size.width as i32,
                size.height as i32,
                None,
                None,
                instance,
                None,
            )
        };

        let hwnd = match hwnd {
            Ok(hwnd) => hwnd,
            Err(e) => {
                unsafe {
                    let _ = UnregisterClassW(WINDOW_CLASS, instance);
                }
                return Err(OverlayError::window_creation(e));
            }
        };

        debug!("Overlay window created: {:?}", hwnd);
        Ok(Self { hwnd, instance })
    }

    pub fn show(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOW);
            let _ = UpdateWindow(self.hwnd);
        }
        info!("Overlay window shown");
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = DestroyWindow(self.hwnd) {
                warn!("DestroyWindow failed: {}", e);
            }
            if let Err(e) = UnregisterClassW(WINDOW_CLASS, self.instance) {
                warn!("UnregisterClassW failed: {}", e);
            }
        }
        info!("Overlay window destroyed");
    }
}

unsafe extern "system" fn window_procedure(
    window: HWND,
    message: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    match message {
        WM_KEYDOWN if w_param.0 == usize::from(VK_ESCAPE.0) => {
            info!("Escape pressed, requesting exit");
            route::request_exit();
            LRESULT(0)
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(window, message, w_param, l_param),
    }
}
