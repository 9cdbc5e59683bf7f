use crate::kernel::Kernel;
use crate::server::{Connection, PictureFormat, PixmapId};
use crate::shadow::build_shadow;
use crate::tint::solid_tint;
use crate::{UmbraError, UmbraResult};

/// Shadow color in unit-range components. `alpha` doubles as the shadow opacity.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShadowColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl ShadowColor {
    pub fn validate(&self) -> UmbraResult<()> {
        for c in [self.red, self.green, self.blue, self.alpha] {
            if !c.is_finite() || !(0.0..=1.0).contains(&c) {
                return Err(UmbraError::validation(
                    "shadow color components must be in [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

/// Binds a server-side ARGB pixmap into a backend's generic texture representation.
///
/// The binder takes ownership of the pixmap; releasing it becomes the texture's
/// concern from then on.
pub trait TextureBinder<C: Connection + ?Sized> {
    type Texture;

    fn bind_pixmap(&mut self, conn: &C, pixmap: PixmapId) -> UmbraResult<Self::Texture>;
}

/// Render a window shadow end to end: tint source, mask synthesis, server-side
/// compositing, and binding into the backend's texture representation.
///
/// The tint is fully opaque; `color.alpha` is carried by the mask instead. All
/// intermediates, including the ARGB picture wrapping the bound pixmap, are released
/// before returning. Any failing step propagates its error with nothing left
/// allocated.
pub fn render_shadow<C, B>(
    conn: &C,
    binder: &mut B,
    width: u32,
    height: u32,
    kernel: &Kernel,
    color: ShadowColor,
) -> UmbraResult<B::Texture>
where
    C: Connection + ?Sized,
    B: TextureBinder<C>,
{
    color.validate()?;
    let tint = solid_tint(
        conn,
        PictureFormat::Argb32,
        1.0,
        color.red,
        color.green,
        color.blue,
    )?;
    let artifacts = build_shadow(conn, color.alpha, width, height, kernel, tint.id())?;
    drop(tint);

    let pixmap = artifacts.pixmap.into_id();
    let bound = binder.bind_pixmap(conn, pixmap);
    if bound.is_err() {
        conn.free_pixmap(pixmap);
    }
    // artifacts.picture drops here, releasing the intermediate ARGB picture.
    bound
}

/// Window body opacity modes, as computed by the window manager policy layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WindowMode {
    /// Fully opaque contents.
    Solid,
    /// Contents carry translucency.
    Trans,
    /// ARGB visual with per-pixel alpha.
    Argb,
}

/// Whether a window's body should be treated as visually transparent.
pub fn is_window_transparent(mode: WindowMode) -> bool {
    mode != WindowMode::Solid
}

/// Whether a window's frame should be treated as visually transparent.
pub fn is_frame_transparent(frame_opacity: f64) -> bool {
    frame_opacity != 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::software::{ConnectionStats, SoftwareConnection};

    /// A binder that owns the pixmap handle and frees it when the texture drops.
    struct CountingBinder {
        fail: bool,
        bound: Vec<PixmapId>,
    }

    impl CountingBinder {
        fn new() -> Self {
            Self {
                fail: false,
                bound: Vec::new(),
            }
        }
    }

    impl TextureBinder<SoftwareConnection> for CountingBinder {
        type Texture = PixmapId;

        fn bind_pixmap(
            &mut self,
            _conn: &SoftwareConnection,
            pixmap: PixmapId,
        ) -> UmbraResult<PixmapId> {
            if self.fail {
                return Err(UmbraError::allocation("texture bind refused"));
            }
            self.bound.push(pixmap);
            Ok(pixmap)
        }
    }

    fn black(alpha: f64) -> ShadowColor {
        ShadowColor {
            red: 0.0,
            green: 0.0,
            blue: 0.0,
            alpha,
        }
    }

    #[test]
    fn render_shadow_leaves_only_the_bound_pixmap() {
        let conn = SoftwareConnection::new();
        let mut binder = CountingBinder::new();
        let kernel = Kernel::gaussian(2).unwrap();

        let texture = render_shadow(&conn, &mut binder, 30, 30, &kernel, black(0.75)).unwrap();
        assert_eq!(binder.bound, vec![texture]);

        let stats = conn.stats();
        assert_eq!(stats.outstanding(), 1);
        conn.free_pixmap(texture);
        assert_eq!(conn.stats().outstanding(), 0);
    }

    #[test]
    fn render_shadow_twice_is_bit_identical() {
        let conn = SoftwareConnection::new();
        let mut binder = CountingBinder::new();
        let kernel = Kernel::gaussian(3).unwrap();

        let a = render_shadow(&conn, &mut binder, 25, 18, &kernel, black(0.6)).unwrap();
        let b = render_shadow(&conn, &mut binder, 25, 18, &kernel, black(0.6)).unwrap();
        assert_ne!(a, b);
        assert_eq!(conn.pixmap_data(a), conn.pixmap_data(b));
    }

    #[test]
    fn bind_failure_frees_the_shadow_pixmap() {
        let conn = SoftwareConnection::new();
        let mut binder = CountingBinder::new();
        binder.fail = true;
        let kernel = Kernel::gaussian(2).unwrap();

        assert!(render_shadow(&conn, &mut binder, 10, 10, &kernel, black(1.0)).is_err());
        assert_eq!(conn.stats().outstanding(), 0);
    }

    #[test]
    fn build_failure_propagates_with_nothing_allocated() {
        let conn = SoftwareConnection::new();
        let mut binder = CountingBinder::new();
        let kernel = Kernel::gaussian(2).unwrap();

        // Enough budget for the tint only; the shadow chain fails immediately.
        conn.set_alloc_budget(Some(2));
        assert!(render_shadow(&conn, &mut binder, 10, 10, &kernel, black(1.0)).is_err());
        assert!(binder.bound.is_empty());
        assert_eq!(conn.stats().outstanding(), 0);
    }

    #[test]
    fn rejects_invalid_color() {
        let conn = SoftwareConnection::new();
        let mut binder = CountingBinder::new();
        let kernel = Kernel::gaussian(2).unwrap();
        let bad = ShadowColor {
            red: 2.0,
            green: 0.0,
            blue: 0.0,
            alpha: 1.0,
        };
        assert!(render_shadow(&conn, &mut binder, 10, 10, &kernel, bad).is_err());
        assert_eq!(conn.stats(), ConnectionStats::default());
    }

    #[test]
    fn shadow_color_serde_round_trip() {
        let color = black(0.42);
        let json = serde_json::to_string(&color).unwrap();
        let back: ShadowColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
    }

    #[test]
    fn window_transparency_predicates() {
        assert!(!is_window_transparent(WindowMode::Solid));
        assert!(is_window_transparent(WindowMode::Trans));
        assert!(is_window_transparent(WindowMode::Argb));

        assert!(!is_frame_transparent(1.0));
        assert!(is_frame_transparent(0.9));
        assert!(is_frame_transparent(0.0));
    }
}
