//! Umbra synthesizes soft drop-shadows for windows and materializes them inside a
//! remote rendering server's resource space.
//!
//! The pipeline is:
//!
//! - Build a [`Kernel`] (or receive one from an external kernel provider)
//! - Synthesize an 8-bit [`AlphaMask`] with [`synthesize_shadow_mask`]
//! - Upload, tint, and composite it server-side with [`build_shadow`], or drive the
//!   whole chain through [`render_shadow`] against a backend's texture binder
//!
//! Every server-side resource acquired along the way is either transferred to the
//! caller or released before the call returns, including on every error path.
#![forbid(unsafe_code)]

pub mod backend;
pub mod error;
pub mod kernel;
pub mod mask;
pub mod server;
pub mod shadow;
pub mod tint;

pub use backend::{
    ShadowColor, TextureBinder, WindowMode, is_frame_transparent, is_window_transparent,
    render_shadow,
};
pub use error::{UmbraError, UmbraResult};
pub use kernel::Kernel;
pub use mask::{AlphaMask, synthesize_shadow_mask};
pub use server::{
    Color16, CompositeOp, Connection, GcontextId, OwnedGcontext, OwnedPicture, OwnedPixmap,
    PictureFormat, PictureId, PixmapId,
};
pub use shadow::{ShadowArtifacts, build_shadow};
pub use tint::solid_tint;
