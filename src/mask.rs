use crate::kernel::Kernel;
use crate::{UmbraError, UmbraResult};

/// An 8-bit single-channel image holding per-pixel shadow opacity before tinting.
///
/// Rows are padded to a 4-byte stride to match the server's scanline alignment for
/// 8-bit uploads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl AlphaMask {
    fn new(width: u32, height: u32) -> UmbraResult<Self> {
        let stride = (width as usize)
            .checked_add(3)
            .map(|w| w & !3)
            .ok_or_else(|| UmbraError::client_buffer("mask stride overflow"))?;
        let len = stride
            .checked_mul(height as usize)
            .ok_or_else(|| UmbraError::client_buffer("mask buffer size overflow"))?;
        Ok(Self {
            width,
            height,
            stride,
            data: vec![0; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes; always `>= width()`.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Stride-padded bytes, row-major, ready for a server upload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y as usize * self.stride + x as usize]
    }

    fn set(&mut self, x: u32, y: u32, value: u8) {
        self.data[y as usize * self.stride + x as usize] = value;
    }

    fn fill_span(&mut self, x: u32, y: u32, len: u32, value: u8) {
        let start = y as usize * self.stride + x as usize;
        self.data[start..start + len as usize].fill(value);
    }
}

/// One cell of the nine-cell shadow canvas decomposition.
///
/// ```text
///          -r     r      width-r  width+r
///        -r +-----+---------+-----+
///           |  C  |    E    |  C  |
///         r +-----+---------+-----+
///           |  E  |    I    |  E  |
///  height-r +-----+---------+-----+
///           |  C  |    E    |  C  |
///  height+r +-----+---------+-----+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Region {
    Interior,
    Corner(Corner),
    Edge(Side),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Region {
    // The interior is filled first; the border cells overwrite the rows where the
    // saturated fill and the ramp overlap.
    const ALL: [Region; 9] = [
        Region::Interior,
        Region::Corner(Corner::TopLeft),
        Region::Corner(Corner::TopRight),
        Region::Corner(Corner::BottomLeft),
        Region::Corner(Corner::BottomRight),
        Region::Edge(Side::Top),
        Region::Edge(Side::Bottom),
        Region::Edge(Side::Left),
        Region::Edge(Side::Right),
    ];
}

/// Synthesize the alpha mask of a soft shadow for a `window_width x window_height`
/// window, `kernel.radius()` pixels of penumbra on every side.
///
/// The mask is `(window_width + 2r) x (window_height + 2r)`. Windows smaller than
/// the kernel in both dimensions are treated as clipped light occluders and computed
/// by direct clipped convolution; that regime models full occlusion and does not
/// apply `opacity`. Every float intermediate is truncated (not rounded) into the
/// 8-bit channel.
pub fn synthesize_shadow_mask(
    kernel: &Kernel,
    opacity: f64,
    window_width: u32,
    window_height: u32,
) -> UmbraResult<AlphaMask> {
    if window_width == 0 || window_height == 0 {
        return Err(UmbraError::validation("window dimensions must be non-zero"));
    }
    if !opacity.is_finite() {
        return Err(UmbraError::validation("shadow opacity must be finite"));
    }
    let opacity = opacity.clamp(0.0, 1.0);

    let d = kernel.diameter() as u32;
    let r = kernel.radius() as u32;
    let sw = window_width
        .checked_add(2 * r)
        .ok_or_else(|| UmbraError::client_buffer("mask width overflow"))?;
    let sh = window_height
        .checked_add(2 * r)
        .ok_or_else(|| UmbraError::client_buffer("mask height overflow"))?;
    let mut mask = AlphaMask::new(sw, sh)?;

    let clipped = |x: u32, y: u32, w: u32, h: u32| {
        kernel.sum_clipped(d as i32 - 1 - x as i32, d as i32 - 1 - y as i32, w, h)
    };

    // Window smaller than the kernel in both dimensions: direct clipped convolution.
    if window_width < 2 * r && window_height < 2 * r {
        for y in 0..sh {
            for x in 0..sw {
                let sum = clipped(x, y, window_width, window_height);
                mask.set(x, y, (sum * 255.0) as u8);
            }
        }
        return Ok(mask);
    }

    // Window shorter than the kernel: per-pixel ramp near the left and right ends
    // (mirrored), one repeated value per row across the middle.
    if window_height < 2 * r {
        for y in 0..sh {
            for x in 0..2 * r {
                let sum = clipped(x, y, d, window_height) * 255.0;
                mask.set(x, y, sum as u8);
                mask.set(sw - 1 - x, y, sum as u8);
            }
        }
        for y in 0..sh {
            let sum = kernel.sum_clipped(0, d as i32 - 1 - y as i32, d, window_height) * 255.0;
            mask.fill_span(2 * r, y, window_width - 2 * r, sum as u8);
        }
        return Ok(mask);
    }

    // Window narrower than the kernel: transpose of the above.
    if window_width < 2 * r {
        for y in 0..2 * r {
            for x in 0..sw {
                let sum = clipped(x, y, window_width, d) * 255.0;
                mask.set(x, y, sum as u8);
                mask.set(x, sh - 1 - y, sum as u8);
            }
        }
        for x in 0..sw {
            let sum =
                kernel.sum_clipped(d as i32 - 1 - x as i32, 0, window_width, d) * 255.0;
            for y in 2 * r..window_height {
                mask.set(x, y, sum as u8);
            }
        }
        return Ok(mask);
    }

    let prefix = kernel.prefix_sums();
    for region in Region::ALL {
        fill_region(
            &mut mask,
            region,
            prefix,
            d,
            r,
            opacity,
            window_width,
            window_height,
        );
    }
    Ok(mask)
}

#[allow(clippy::too_many_arguments)]
fn fill_region(
    mask: &mut AlphaMask,
    region: Region,
    prefix: &[f64],
    d: u32,
    r: u32,
    opacity: f64,
    window_width: u32,
    window_height: u32,
) {
    let sw = mask.width();
    let sh = mask.height();
    match region {
        Region::Interior => {
            let value = (255.0 * opacity) as u8;
            for y in r..window_height + r {
                mask.fill_span(r, y, window_width, value);
            }
        }
        Region::Corner(which) => {
            for y in 0..2 * r {
                for x in 0..2 * r {
                    let value = (prefix[(y * d + x) as usize] * opacity * 255.0) as u8;
                    let (cx, cy) = match which {
                        Corner::TopLeft => (x, y),
                        Corner::TopRight => (sw - 1 - x, y),
                        Corner::BottomLeft => (x, sh - 1 - y),
                        Corner::BottomRight => (sw - 1 - x, sh - 1 - y),
                    };
                    mask.set(cx, cy, value);
                }
            }
        }
        Region::Edge(Side::Top) | Region::Edge(Side::Bottom) => {
            for y in 0..2 * r {
                let value = (prefix[(y * d + d - 1) as usize] * opacity * 255.0) as u8;
                let row = match region {
                    Region::Edge(Side::Top) => y,
                    _ => sh - 1 - y,
                };
                mask.fill_span(2 * r, row, window_width - 2 * r, value);
            }
        }
        Region::Edge(Side::Left) | Region::Edge(Side::Right) => {
            for x in 0..2 * r {
                let value = (prefix[((d - 1) * d + x) as usize] * opacity * 255.0) as u8;
                let col = match region {
                    Region::Edge(Side::Left) => x,
                    _ => sw - 1 - x,
                };
                for y in 2 * r..window_height {
                    mask.set(col, y, value);
                }
            }
        }
    }
}
