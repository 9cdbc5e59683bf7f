use umbra::server::software::SoftwareConnection;
use umbra::{
    Kernel, PictureFormat, PixmapId, ShadowColor, TextureBinder, UmbraError, UmbraResult,
    build_shadow, render_shadow, solid_tint, synthesize_shadow_mask,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct PixmapBinder {
    bound: Vec<PixmapId>,
}

impl PixmapBinder {
    fn new() -> Self {
        Self { bound: Vec::new() }
    }
}

impl TextureBinder<SoftwareConnection> for PixmapBinder {
    type Texture = PixmapId;

    fn bind_pixmap(
        &mut self,
        _conn: &SoftwareConnection,
        pixmap: PixmapId,
    ) -> UmbraResult<PixmapId> {
        self.bound.push(pixmap);
        Ok(pixmap)
    }
}

struct RefusingBinder;

impl TextureBinder<SoftwareConnection> for RefusingBinder {
    type Texture = PixmapId;

    fn bind_pixmap(
        &mut self,
        _conn: &SoftwareConnection,
        _pixmap: PixmapId,
    ) -> UmbraResult<PixmapId> {
        Err(UmbraError::allocation("no texture slots left"))
    }
}

fn color(red: f64, green: f64, blue: f64, alpha: f64) -> ShadowColor {
    ShadowColor {
        red,
        green,
        blue,
        alpha,
    }
}

#[test]
fn full_pipeline_composites_tinted_mask() {
    init_tracing();
    let conn = SoftwareConnection::new();
    let mut binder = PixmapBinder::new();
    let kernel = Kernel::gaussian(2).unwrap();

    let texture = render_shadow(&conn, &mut binder, 100, 100, &kernel, color(0.2, 0.4, 0.6, 1.0))
        .unwrap();

    let mask = synthesize_shadow_mask(&kernel, 1.0, 100, 100).unwrap();
    assert_eq!(mask.width(), 104);
    assert_eq!(mask.height(), 104);

    let data = conn.pixmap_data(texture).unwrap();
    let sw = mask.width() as usize;
    let tint = [255u8, 51, 102, 153]; // from_unit(1.0, 0.2, 0.4, 0.6) high bytes

    // Interior pixels are fully covered: the tint shows through unscaled.
    for (x, y) in [(5u32, 5u32), (52, 52), (98, 98)] {
        assert_eq!(mask.pixel(x, y), 255);
        let idx = (y as usize * sw + x as usize) * 4;
        assert_eq!(&data[idx..idx + 4], &tint);
    }

    // Corner pixels are scaled by the corner ramp.
    let a = mask.pixel(0, 0);
    assert_eq!(a, (kernel.prefix_sums()[0] * 255.0) as u8);
    let scaled = |c: u8| ((u32::from(c) * u32::from(a) + 127) / 255) as u8;
    assert_eq!(
        &data[0..4],
        &[scaled(tint[0]), scaled(tint[1]), scaled(tint[2]), scaled(tint[3])]
    );
}

#[test]
fn repeated_renders_are_deterministic() {
    let conn = SoftwareConnection::new();
    let mut binder = PixmapBinder::new();
    let kernel = Kernel::gaussian(4).unwrap();
    let c = color(0.0, 0.0, 0.0, 0.55);

    let a = render_shadow(&conn, &mut binder, 37, 61, &kernel, c).unwrap();
    let b = render_shadow(&conn, &mut binder, 37, 61, &kernel, c).unwrap();
    assert_eq!(conn.pixmap_data(a), conn.pixmap_data(b));
}

#[test]
fn every_failure_point_leaves_the_server_clean() {
    // Full pipeline allocation count: 2 for the tint, then 5 for the build chain.
    // Failing at each point must leave zero outstanding resources.
    init_tracing();
    let kernel = Kernel::gaussian(3).unwrap();
    for budget in 0..7u64 {
        let conn = SoftwareConnection::new();
        let mut binder = PixmapBinder::new();
        conn.set_alloc_budget(Some(budget));

        let result = render_shadow(&conn, &mut binder, 24, 24, &kernel, color(0.0, 0.0, 0.0, 1.0));
        assert!(result.is_err(), "budget {budget} should fail");
        assert!(binder.bound.is_empty());
        assert_eq!(conn.stats().outstanding(), 0, "budget {budget} leaked");
    }

    // One more allocation and the pipeline goes through.
    let conn = SoftwareConnection::new();
    let mut binder = PixmapBinder::new();
    conn.set_alloc_budget(Some(7));
    assert!(render_shadow(&conn, &mut binder, 24, 24, &kernel, color(0.0, 0.0, 0.0, 1.0)).is_ok());
}

#[test]
fn refused_bind_releases_everything() {
    let conn = SoftwareConnection::new();
    let kernel = Kernel::gaussian(2).unwrap();
    let result = render_shadow(&conn, &mut RefusingBinder, 12, 12, &kernel, color(0.0, 0.0, 0.0, 1.0));
    assert!(result.is_err());
    assert_eq!(conn.stats().outstanding(), 0);
}

#[test]
fn build_shadow_against_narrow_window_matches_mask_regime() {
    // Window narrower than the kernel: the body columns carry the degenerate
    // per-column value, visible through the composited alpha channel.
    let conn = SoftwareConnection::new();
    let kernel = Kernel::from_weights(11, vec![1.0; 121]).unwrap();
    let tint = solid_tint(&conn, PictureFormat::Argb32, 1.0, 0.0, 0.0, 0.0).unwrap();
    let artifacts = build_shadow(&conn, 1.0, 3, 100, &kernel, tint.id()).unwrap();

    let mask = synthesize_shadow_mask(&kernel, 1.0, 3, 100).unwrap();
    assert_eq!(mask.width(), 13);
    let data = conn.pixmap_data(artifacts.pixmap.id()).unwrap();
    let sw = mask.width() as usize;

    let body = (3.0 * 11.0 / 121.0 * 255.0) as u8;
    for x in 5u32..8 {
        for y in [10u32, 50, 99] {
            assert_eq!(mask.pixel(x, y), body);
            let idx = (y as usize * sw + x as usize) * 4;
            assert_eq!(data[idx], body);
        }
    }
}
