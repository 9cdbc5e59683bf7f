//! The rendering-server connection surface: handle types, the [`Connection`] trait
//! covering the server primitives this crate drives, and scoped owners that release
//! their server-side resource on drop.
//!
//! The model is single-threaded and blocking. A connection is an externally shared,
//! non-reentrant handle; callers must not drive the same connection from concurrent
//! invocations.

use crate::UmbraResult;

pub mod software;

/// Server-side pixel buffer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixmapId(pub u32);

/// Server-side drawable surface handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PictureId(pub u32);

/// Server-side graphics context handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GcontextId(pub u32);

/// Standard pixel formats a pixmap can be wrapped as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PictureFormat {
    /// Alpha-only, 8 bits per pixel.
    A8,
    /// 32-bit premultiplied ARGB.
    Argb32,
}

impl PictureFormat {
    /// Pixmap depth backing this format.
    pub fn depth(self) -> u8 {
        match self {
            PictureFormat::A8 => 8,
            PictureFormat::Argb32 => 32,
        }
    }
}

/// Compositing operators the core uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOp {
    /// Replace-where-covered: destination becomes source scaled by mask coverage,
    /// discarding prior destination content.
    Src,
}

/// A flat color in the server's native 16-bit-per-channel range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color16 {
    pub alpha: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Color16 {
    /// Scale unit-range components into the native channel range, truncating.
    pub fn from_unit(alpha: f64, red: f64, green: f64, blue: f64) -> Self {
        let scale = |c: f64| (c * f64::from(u16::MAX)) as u16;
        Self {
            alpha: scale(alpha),
            red: scale(red),
            green: scale(green),
            blue: scale(blue),
        }
    }
}

/// The rendering-server primitives this crate drives.
///
/// Every allocation is fallible; the server may refuse with resource exhaustion at
/// any point. Frees are fire-and-forget, so they can run from drop glue.
pub trait Connection {
    /// Allocate a `width x height` pixel buffer of the given depth.
    fn create_pixmap(&self, depth: u8, width: u32, height: u32) -> UmbraResult<PixmapId>;

    /// Wrap a pixmap as a drawable surface with a standard pixel format.
    ///
    /// With `repeat` set, sampling outside the surface wraps around instead of
    /// reading transparent.
    fn create_picture(
        &self,
        pixmap: PixmapId,
        format: PictureFormat,
        repeat: bool,
    ) -> UmbraResult<PictureId>;

    /// Allocate a graphics context for uploads into the given drawable.
    fn create_gc(&self, drawable: PixmapId) -> UmbraResult<GcontextId>;

    /// Fill a rectangular region of a surface with a flat color.
    fn fill_rectangle(
        &self,
        op: CompositeOp,
        picture: PictureId,
        color: Color16,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> UmbraResult<()>;

    /// Upload client-side pixel rows into a server-side pixmap, starting at the
    /// origin. `stride` is the client row pitch in bytes.
    fn put_image(
        &self,
        pixmap: PixmapId,
        gc: GcontextId,
        width: u32,
        height: u32,
        stride: usize,
        data: &[u8],
    ) -> UmbraResult<()>;

    /// Composite `src`, optionally modulated by `mask`, onto `dst` over the
    /// `width x height` rectangle at the origin.
    fn composite(
        &self,
        op: CompositeOp,
        src: PictureId,
        mask: Option<PictureId>,
        dst: PictureId,
        width: u32,
        height: u32,
    ) -> UmbraResult<()>;

    fn free_pixmap(&self, pixmap: PixmapId);
    fn free_picture(&self, picture: PictureId);
    fn free_gc(&self, gc: GcontextId);
}

/// A pixmap that is freed on drop unless ownership is taken with
/// [`OwnedPixmap::into_id`].
pub struct OwnedPixmap<'c, C: Connection + ?Sized> {
    conn: &'c C,
    id: Option<PixmapId>,
}

impl<'c, C: Connection + ?Sized> OwnedPixmap<'c, C> {
    pub fn new(conn: &'c C, id: PixmapId) -> Self {
        Self { conn, id: Some(id) }
    }

    pub fn id(&self) -> PixmapId {
        self.id.expect("pixmap already released")
    }

    /// Disarm the guard and transfer ownership of the handle to the caller.
    pub fn into_id(mut self) -> PixmapId {
        self.id.take().expect("pixmap already released")
    }
}

impl<C: Connection + ?Sized> Drop for OwnedPixmap<'_, C> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.conn.free_pixmap(id);
        }
    }
}

/// A picture that is freed on drop unless ownership is taken with
/// [`OwnedPicture::into_id`].
pub struct OwnedPicture<'c, C: Connection + ?Sized> {
    conn: &'c C,
    id: Option<PictureId>,
}

impl<'c, C: Connection + ?Sized> OwnedPicture<'c, C> {
    pub fn new(conn: &'c C, id: PictureId) -> Self {
        Self { conn, id: Some(id) }
    }

    pub fn id(&self) -> PictureId {
        self.id.expect("picture already released")
    }

    /// Disarm the guard and transfer ownership of the handle to the caller.
    pub fn into_id(mut self) -> PictureId {
        self.id.take().expect("picture already released")
    }
}

impl<C: Connection + ?Sized> Drop for OwnedPicture<'_, C> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.conn.free_picture(id);
        }
    }
}

/// A graphics context that is freed on drop.
pub struct OwnedGcontext<'c, C: Connection + ?Sized> {
    conn: &'c C,
    id: GcontextId,
}

impl<'c, C: Connection + ?Sized> OwnedGcontext<'c, C> {
    pub fn new(conn: &'c C, id: GcontextId) -> Self {
        Self { conn, id }
    }

    pub fn id(&self) -> GcontextId {
        self.id
    }
}

impl<C: Connection + ?Sized> Drop for OwnedGcontext<'_, C> {
    fn drop(&mut self) {
        self.conn.free_gc(self.id);
    }
}
