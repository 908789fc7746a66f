//! Presentation Surface Module
//!
//! Owns the GPU presentation chain for the overlay window and sequences its
//! lifetime: creation, per-frame clear and present, ordered teardown.

use tracing::{debug, info, warn};

use crate::context::ScreenSize;
use crate::error::OverlayResult;

/// Sync intervals accepted by a vsync-throttled present. Zero would unthrottle
/// the loop and DXGI rejects anything above four.
pub const SYNC_INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=4;

/// Opaque black, the clear color of every frame.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Capability level negotiated with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLevel {
    Level11_0,
    Level10_0,
}

impl FeatureLevel {
    /// Levels requested at creation, most capable first.
    pub const REQUESTED: [FeatureLevel; 2] = [FeatureLevel::Level11_0, FeatureLevel::Level10_0];
}

/// A fully formed device + swap chain + render target.
///
/// Implementations only exist with every handle valid. `release` consumes
/// the chain and drops the render target view, swap chain, device context
/// and device in that order.
pub trait GraphicsChain {
    fn feature_level(&self) -> FeatureLevel;

    /// Bind the render target and clear it to `color`.
    fn begin_frame(&mut self, color: [f32; 4]);

    /// Submit the frame, blocking for `sync_interval` vertical blanks.
    fn present(&mut self, sync_interval: u32) -> anyhow::Result<()>;

    fn release(self);
}

/// Manages frame presentation
pub struct PresentationSurface<G: GraphicsChain> {
    chain: Option<G>,
    size: ScreenSize,
    sync_interval: u32,
    failed_presents: u64,
}

impl<G: GraphicsChain> PresentationSurface<G> {
    /// Build the chain with `create` and take ownership of it.
    pub fn initialize<F>(size: ScreenSize, sync_interval: u32, create: F) -> OverlayResult<Self>
    where
        F: FnOnce(ScreenSize) -> OverlayResult<G>,
    {
        let requested = sync_interval;
        let sync_interval =
            requested.clamp(*SYNC_INTERVAL_RANGE.start(), *SYNC_INTERVAL_RANGE.end());
        if sync_interval != requested {
            warn!(
                "sync_interval {} out of range, using {}",
                requested, sync_interval
            );
        }

        info!(
            "Creating presentation surface: {}x{} sync_interval={}",
            size.width, size.height, sync_interval
        );

        let chain = create(size)?;
        info!("Presentation surface ready at {:?}", chain.feature_level());

        Ok(Self {
            chain: Some(chain),
            size,
            sync_interval,
            failed_presents: 0,
        })
    }

    /// Bind and clear the back buffer to opaque black.
    pub fn begin_frame(&mut self) {
        if let Some(chain) = self.chain.as_mut() {
            chain.begin_frame(CLEAR_COLOR);
        }
    }

    /// Present the current frame. Failures are logged, never fatal.
    pub fn present(&mut self) {
        let Some(chain) = self.chain.as_mut() else {
            return;
        };

        if let Err(e) = chain.present(self.sync_interval) {
            self.failed_presents += 1;
            // One line per burst is enough; an occluded window fails every frame.
            if self.failed_presents.is_power_of_two() {
                warn!(
                    "Present failed ({} so far): {:#}",
                    self.failed_presents, e
                );
            }
        }
    }

    /// Release every GPU handle. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        match self.chain.take() {
            Some(chain) => {
                chain.release();
                info!("Presentation surface released");
            }
            None => debug!("Presentation surface already released"),
        }
    }

    pub fn is_live(&self) -> bool {
        self.chain.is_some()
    }

    pub fn chain(&self) -> Option<&G> {
        self.chain.as_ref()
    }

    /// Get current dimensions.
    pub fn dimensions(&self) -> ScreenSize {
        self.size
    }

    pub fn sync_interval(&self) -> u32 {
        self.sync_interval
    }

    pub fn failed_presents(&self) -> u64 {
        self.failed_presents
    }
}

impl<G: GraphicsChain> Drop for PresentationSurface<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log(Rc<RefCell<Vec<String>>>);

    struct FakeChain {
        log: Rc<RefCell<Vec<String>>>,
        fail_present: bool,
    }

    impl GraphicsChain for FakeChain {
        fn feature_level(&self) -> FeatureLevel {
            FeatureLevel::Level11_0
        }

        fn begin_frame(&mut self, color: [f32; 4]) {
            self.log.borrow_mut().push(format!("clear {color:?}"));
        }

        fn present(&mut self, sync_interval: u32) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("present {sync_interval}"));
            if self.fail_present {
                anyhow::bail!("DXGI_STATUS_OCCLUDED");
            }
            Ok(())
        }

        fn release(self) {
            let mut log = self.log.borrow_mut();
            log.push("release render_target_view".into());
            log.push("release swap_chain".into());
            log.push("release device_context".into());
            log.push("release device".into());
        }
    }

    fn surface(log: &Log, fail_present: bool) -> PresentationSurface<FakeChain> {
        let log = log.0.clone();
        PresentationSurface::initialize(ScreenSize::new(1920, 1080), 1, |_| {
            Ok(FakeChain { log, fail_present })
        })
        .unwrap()
    }

    #[test]
    fn out_of_range_sync_interval_is_clamped() {
        for (requested, used) in [(0, 1), (5, 4), (u32::MAX, 4), (2, 2)] {
            let log = Log::default();
            let chain_log = log.0.clone();
            let mut surface =
                PresentationSurface::initialize(ScreenSize::new(800, 600), requested, |_| {
                    Ok(FakeChain {
                        log: chain_log,
                        fail_present: false,
                    })
                })
                .unwrap();

            assert_eq!(surface.sync_interval(), used);
            surface.present();
            assert_eq!(*log.0.borrow(), vec![format!("present {used}")]);
        }
    }

    #[test]
    fn frame_clears_black_then_presents_with_vsync() {
        let log = Log::default();
        let mut surface = surface(&log, false);

        surface.begin_frame();
        surface.present();

        assert_eq!(
            *log.0.borrow(),
            vec!["clear [0.0, 0.0, 0.0, 1.0]".to_string(), "present 1".to_string()]
        );
    }

    #[test]
    fn shutdown_is_idempotent_and_ordered() {
        let log = Log::default();
        let mut surface = surface(&log, false);

        surface.shutdown();
        assert!(!surface.is_live());
        surface.shutdown();
        assert!(!surface.is_live());
        drop(surface);

        assert_eq!(
            *log.0.borrow(),
            vec![
                "release render_target_view",
                "release swap_chain",
                "release device_context",
                "release device",
            ]
        );
    }

    #[test]
    fn drop_releases_live_chain() {
        let log = Log::default();
        drop(surface(&log, false));
        assert_eq!(log.0.borrow().len(), 4);
    }

    #[test]
    fn released_surface_ignores_frames() {
        let log = Log::default();
        let mut surface = surface(&log, false);
        surface.shutdown();
        log.0.borrow_mut().clear();

        surface.begin_frame();
        surface.present();
        assert!(log.0.borrow().is_empty());
    }

    #[test]
    fn failed_present_is_counted_not_fatal() {
        let log = Log::default();
        let mut surface = surface(&log, true);

        surface.present();
        surface.present();

        assert_eq!(surface.failed_presents(), 2);
        assert!(surface.is_live());
    }

    #[test]
    fn creation_errors_propagate() {
        let result: OverlayResult<PresentationSurface<FakeChain>> =
            PresentationSurface::initialize(ScreenSize::new(800, 600), 1, |_| {
                Err(OverlayError::back_buffer("GetBuffer failed"))
            });

        assert!(matches!(result, Err(OverlayError::BackBuffer(_))));
    }
}
