use crate::server::{Color16, CompositeOp, Connection, OwnedPicture, OwnedPixmap, PictureFormat};
use crate::{UmbraError, UmbraResult};

/// Create a 1x1 repeat-sampling picture of a flat color, to serve as a tint source.
///
/// Components are unit-range, premultiplied-style. The backing pixmap is freed
/// before returning; the picture keeps the storage alive server-side. On partial
/// failure nothing leaks: the pixmap guard drops before the error propagates.
pub fn solid_tint<'c, C: Connection + ?Sized>(
    conn: &'c C,
    format: PictureFormat,
    alpha: f64,
    red: f64,
    green: f64,
    blue: f64,
) -> UmbraResult<OwnedPicture<'c, C>> {
    for c in [alpha, red, green, blue] {
        if !c.is_finite() || !(0.0..=1.0).contains(&c) {
            return Err(UmbraError::validation("tint components must be in [0, 1]"));
        }
    }

    let pixmap = OwnedPixmap::new(conn, conn.create_pixmap(format.depth(), 1, 1)?);
    let picture = OwnedPicture::new(conn, conn.create_picture(pixmap.id(), format, true)?);

    let color = Color16::from_unit(alpha, red, green, blue);
    conn.fill_rectangle(CompositeOp::Src, picture.id(), color, 0, 0, 1, 1)?;

    // The picture holds the storage; the pixmap handle itself is no longer needed.
    drop(pixmap);
    Ok(picture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::software::SoftwareConnection;

    #[test]
    fn tint_is_a_repeating_1x1_color() {
        let conn = SoftwareConnection::new();
        let tint = solid_tint(&conn, PictureFormat::Argb32, 1.0, 0.25, 0.5, 0.75).unwrap();
        let data = conn.picture_data(tint.id()).unwrap();
        let expected = Color16::from_unit(1.0, 0.25, 0.5, 0.75);
        assert_eq!(
            data,
            vec![
                (expected.alpha >> 8) as u8,
                (expected.red >> 8) as u8,
                (expected.green >> 8) as u8,
                (expected.blue >> 8) as u8,
            ]
        );
        // The backing pixmap was already released.
        assert_eq!(conn.stats().pixmaps_freed, 1);
    }

    #[test]
    fn alpha_only_tint_uses_depth_8() {
        let conn = SoftwareConnection::new();
        let tint = solid_tint(&conn, PictureFormat::A8, 0.5, 0.0, 0.0, 0.0).unwrap();
        let data = conn.picture_data(tint.id()).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0], (Color16::from_unit(0.5, 0.0, 0.0, 0.0).alpha >> 8) as u8);
    }

    #[test]
    fn rejects_out_of_range_components() {
        let conn = SoftwareConnection::new();
        assert!(solid_tint(&conn, PictureFormat::Argb32, 1.5, 0.0, 0.0, 0.0).is_err());
        assert!(solid_tint(&conn, PictureFormat::Argb32, 1.0, -0.1, 0.0, 0.0).is_err());
        assert!(solid_tint(&conn, PictureFormat::Argb32, f64::NAN, 0.0, 0.0, 0.0).is_err());
        assert_eq!(conn.stats().outstanding(), 0);
    }

    #[test]
    fn picture_wrap_failure_frees_the_pixmap() {
        let conn = SoftwareConnection::new();
        // One allocation allowed: the pixmap succeeds, the picture wrap fails.
        conn.set_alloc_budget(Some(1));
        assert!(solid_tint(&conn, PictureFormat::Argb32, 1.0, 0.0, 0.0, 0.0).is_err());
        let stats = conn.stats();
        assert_eq!(stats.pixmaps_created, 1);
        assert_eq!(stats.pixmaps_freed, 1);
        assert_eq!(stats.outstanding(), 0);
    }
}
