//! D3D11 Presentation Chain
//!
//! Device, immediate context, swap chain and back-buffer render target view
//! for the overlay window. The chain is only ever constructed complete.

use anyhow::anyhow;
use tracing::{debug, info};
use windows::Win32::Foundation::{BOOL, HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE_HARDWARE, D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_11_0,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDeviceAndSwapChain, ID3D11Device, ID3D11DeviceContext, ID3D11RenderTargetView,
    ID3D11Texture2D, D3D11_CREATE_DEVICE_FLAG, D3D11_SDK_VERSION, D3D11_VIEWPORT,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_MODE_DESC, DXGI_RATIONAL, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGISwapChain, DXGI_PRESENT, DXGI_SWAP_CHAIN_DESC, DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
    DXGI_SWAP_EFFECT_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

use crate::context::ScreenSize;
use crate::error::{OverlayError, OverlayResult};
use crate::presentation::{FeatureLevel, GraphicsChain};

/// Holds all D3D11 resources of the overlay
pub struct D3d11Chain {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    swap_chain: IDXGISwapChain,
    render_target_view: ID3D11RenderTargetView,
    feature_level: FeatureLevel,
    size: ScreenSize,
}

fn to_d3d(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
        FeatureLevel::Level10_0 => D3D_FEATURE_LEVEL_10_0,
    }
}

fn from_d3d(level: D3D_FEATURE_LEVEL) -> FeatureLevel {
    if level == D3D_FEATURE_LEVEL_11_0 {
        FeatureLevel::Level11_0
    } else {
        FeatureLevel::Level10_0
    }
}

impl D3d11Chain {
    /// Create device and swap chain for `window`, sized to `size`.
    pub fn create(window: HWND, size: ScreenSize) -> OverlayResult<Self> {
        info!("Creating D3D11 device and swap chain...");

        let desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: size.width,
                Height: size.height,
                RefreshRate: DXGI_RATIONAL {
                    Numerator: 60,
                    Denominator: 1,
                },
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 2,
            OutputWindow: window,
            Windowed: BOOL::from(true),
            SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
            Flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH.0 as u32,
        };

        let levels = FeatureLevel::REQUESTED.map(to_d3d);
        let mut swap_chain: Option<IDXGISwapChain> = None;
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;
        let mut level = D3D_FEATURE_LEVEL::default();

        unsafe {
            D3D11CreateDeviceAndSwapChain(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                HMODULE::default(),
                D3D11_CREATE_DEVICE_FLAG(0),
                Some(&levels),
                D3D11_SDK_VERSION,
                Some(&desc),
                Some(&mut swap_chain),
                Some(&mut device),
                Some(&mut level),
                Some(&mut context),
            )
        }
        .map_err(OverlayError::surface_init)?;

        let (Some(swap_chain), Some(device), Some(context)) = (swap_chain, device, context) else {
            return Err(OverlayError::surface_init(
                "D3D11CreateDeviceAndSwapChain returned no objects",
            ));
        };

        let back_buffer: ID3D11Texture2D =
            unsafe { swap_chain.GetBuffer(0) }.map_err(OverlayError::back_buffer)?;

        let mut render_target_view: Option<ID3D11RenderTargetView> = None;
        unsafe { device.CreateRenderTargetView(&back_buffer, None, Some(&mut render_target_view)) }
            .map_err(OverlayError::back_buffer)?;
        let render_target_view = render_target_view
            .ok_or_else(|| OverlayError::back_buffer("CreateRenderTargetView returned no view"))?;

        let feature_level = from_d3d(level);
        debug!("D3D11 feature level {:?}", feature_level);

        Ok(Self {
            device,
            context,
            swap_chain,
            render_target_view,
            feature_level,
            size,
        })
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }
}

impl GraphicsChain for D3d11Chain {
    fn feature_level(&self) -> FeatureLevel {
        self.feature_level
    }

    fn begin_frame(&mut self, color: [f32; 4]) {
        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: self.size.width_f32(),
            Height: self.size.height_f32(),
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        unsafe {
            self.context
                .OMSetRenderTargets(Some(&[Some(self.render_target_view.clone())]), None);
            self.context.RSSetViewports(Some(&[viewport]));
            self.context
                .ClearRenderTargetView(&self.render_target_view, &color);
        }
    }

    fn present(&mut self, sync_interval: u32) -> anyhow::Result<()> {
        let hr = unsafe { self.swap_chain.Present(sync_interval, DXGI_PRESENT(0)) };
        if hr.is_err() {
            return Err(anyhow!("IDXGISwapChain::Present failed: {}", hr.message()));
        }
        Ok(())
    }

    fn release(self) {
        let Self {
            device,
            context,
            swap_chain,
            render_target_view,
            ..
        } = self;

        unsafe { context.ClearState() };
        drop(render_target_view);
        debug!("Released render target view");
        drop(swap_chain);
        debug!("Released swap chain");
        drop(context);
        debug!("Released device context");
        drop(device);
        debug!("Released device");
    }
}
