use tracing::error;

use crate::kernel::Kernel;
use crate::mask::synthesize_shadow_mask;
use crate::server::{
    CompositeOp, Connection, OwnedGcontext, OwnedPicture, OwnedPixmap, PictureFormat, PictureId,
};
use crate::UmbraResult;

/// The server-side pair produced by [`build_shadow`]: the ARGB pixmap holding the
/// tinted shadow and the picture wrapping it. Both are released on drop unless the
/// caller takes the handles out.
pub struct ShadowArtifacts<'c, C: Connection + ?Sized> {
    pub pixmap: OwnedPixmap<'c, C>,
    pub picture: OwnedPicture<'c, C>,
}

impl<C: Connection + ?Sized> std::fmt::Debug for ShadowArtifacts<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowArtifacts")
            .field("pixmap", &self.pixmap.id())
            .field("picture", &self.picture.id())
            .finish()
    }
}

/// Synthesize a shadow mask for a `width x height` window and materialize it
/// server-side as a tinted ARGB surface.
///
/// `tint` is sampled through the mask with the replace-where-covered operator. The
/// acquisition chain is linear: mask, A8 pixmap, ARGB pixmap, A8 picture, ARGB
/// picture, graphics context, upload, composite. A failure at any step unwinds every
/// resource acquired so far before the error returns; the caller never has cleanup
/// to do. On success the ARGB pair transfers out and the alpha-only intermediates
/// are freed here.
#[tracing::instrument(skip(conn, kernel, tint))]
pub fn build_shadow<'c, C: Connection + ?Sized>(
    conn: &'c C,
    opacity: f64,
    width: u32,
    height: u32,
    kernel: &Kernel,
    tint: PictureId,
) -> UmbraResult<ShadowArtifacts<'c, C>> {
    let mask = synthesize_shadow_mask(kernel, opacity, width, height).inspect_err(|err| {
        error!("failed to synthesize shadow mask: {err}");
    })?;
    let (sw, sh) = (mask.width(), mask.height());

    let create_shadow_pixmap = |depth: u8| {
        conn.create_pixmap(depth, sw, sh).inspect_err(|err| {
            error!("failed to create shadow pixmaps: {err}");
        })
    };
    let a8_pixmap = OwnedPixmap::new(conn, create_shadow_pixmap(8)?);
    let argb_pixmap = OwnedPixmap::new(conn, create_shadow_pixmap(32)?);

    let a8_picture = OwnedPicture::new(
        conn,
        conn.create_picture(a8_pixmap.id(), PictureFormat::A8, false)?,
    );
    let argb_picture = OwnedPicture::new(
        conn,
        conn.create_picture(argb_pixmap.id(), PictureFormat::Argb32, false)?,
    );

    let gc = OwnedGcontext::new(conn, conn.create_gc(a8_pixmap.id())?);
    conn.put_image(a8_pixmap.id(), gc.id(), sw, sh, mask.stride(), mask.data())?;
    conn.composite(
        CompositeOp::Src,
        tint,
        Some(a8_picture.id()),
        argb_picture.id(),
        sw,
        sh,
    )?;

    // The A8 intermediates and the gc drop here; only the ARGB pair moves out.
    Ok(ShadowArtifacts {
        pixmap: argb_pixmap,
        picture: argb_picture,
    })
}
