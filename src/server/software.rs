//! An in-memory [`Connection`] that executes every primitive on CPU pixel buffers.
//!
//! It mirrors real server semantics where they matter to this crate: a picture keeps
//! its backing storage alive after the pixmap handle is freed, repeat-sampling wraps
//! coordinates, and every allocation is fallible. An optional allocation budget
//! models server-side resource exhaustion; the counters let callers audit that no
//! resource outlives an error path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::server::{
    Color16, CompositeOp, Connection, GcontextId, PictureFormat, PictureId, PixmapId,
};
use crate::{UmbraError, UmbraResult};

/// Allocation and free counters for every resource kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub pixmaps_created: u64,
    pub pixmaps_freed: u64,
    pub pictures_created: u64,
    pub pictures_freed: u64,
    pub gcs_created: u64,
    pub gcs_freed: u64,
}

impl ConnectionStats {
    /// Resources currently allocated and not yet freed.
    pub fn outstanding(&self) -> u64 {
        (self.pixmaps_created - self.pixmaps_freed)
            + (self.pictures_created - self.pictures_freed)
            + (self.gcs_created - self.gcs_freed)
    }
}

struct PixmapEntry {
    depth: u8,
    width: u32,
    height: u32,
    // Premultiplied ARGB byte order for depth 32, single alpha byte for depth 8.
    data: RefCell<Vec<u8>>,
}

impl PixmapEntry {
    fn bytes_per_pixel(&self) -> usize {
        usize::from(self.depth / 8)
    }
}

struct PictureEntry {
    format: PictureFormat,
    repeat: bool,
    target: Rc<PixmapEntry>,
}

#[derive(Default)]
struct State {
    next_id: u32,
    pixmaps: HashMap<u32, Rc<PixmapEntry>>,
    pictures: HashMap<u32, PictureEntry>,
    gcs: HashMap<u32, PixmapId>,
    stats: ConnectionStats,
    alloc_budget: Option<u64>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn charge_allocation(&mut self, what: &str) -> UmbraResult<()> {
        match self.alloc_budget {
            Some(0) => Err(UmbraError::allocation(format!(
                "server out of resources creating {what}"
            ))),
            Some(ref mut n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// A software rendering server living entirely in client memory.
pub struct SoftwareConnection {
    state: RefCell<State>,
}

impl SoftwareConnection {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
        }
    }

    /// Limit how many further allocations succeed; `None` removes the limit.
    ///
    /// With a budget of `n`, the next `n` `create_*` calls succeed and the one after
    /// fails with an allocation error.
    pub fn set_alloc_budget(&self, budget: Option<u64>) {
        self.state.borrow_mut().alloc_budget = budget;
    }

    pub fn stats(&self) -> ConnectionStats {
        self.state.borrow().stats
    }

    /// Snapshot a pixmap's raw bytes, for inspection.
    pub fn pixmap_data(&self, pixmap: PixmapId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .pixmaps
            .get(&pixmap.0)
            .map(|p| p.data.borrow().clone())
    }

    /// Snapshot the bytes behind a picture, for inspection. Works even after the
    /// underlying pixmap handle has been freed.
    pub fn picture_data(&self, picture: PictureId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .pictures
            .get(&picture.0)
            .map(|p| p.target.data.borrow().clone())
    }
}

impl Default for SoftwareConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn sample(entry: &PictureEntry, x: i64, y: i64) -> [u8; 4] {
    let t = &entry.target;
    let (w, h) = (i64::from(t.width), i64::from(t.height));
    let (sx, sy) = if entry.repeat {
        (x.rem_euclid(w), y.rem_euclid(h))
    } else if x < 0 || y < 0 || x >= w || y >= h {
        return [0; 4];
    } else {
        (x, y)
    };
    let data = t.data.borrow();
    let idx = (sy * w + sx) as usize * t.bytes_per_pixel();
    match entry.format {
        PictureFormat::A8 => [data[idx], 0, 0, 0],
        PictureFormat::Argb32 => [data[idx], data[idx + 1], data[idx + 2], data[idx + 3]],
    }
}

fn store(entry: &PictureEntry, x: i64, y: i64, px: [u8; 4]) {
    let t = &entry.target;
    let mut data = t.data.borrow_mut();
    let idx = (y * i64::from(t.width) + x) as usize * t.bytes_per_pixel();
    match entry.format {
        PictureFormat::A8 => data[idx] = px[0],
        PictureFormat::Argb32 => data[idx..idx + 4].copy_from_slice(&px),
    }
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

impl Connection for SoftwareConnection {
    fn create_pixmap(&self, depth: u8, width: u32, height: u32) -> UmbraResult<PixmapId> {
        if depth != 8 && depth != 32 {
            return Err(UmbraError::validation("pixmap depth must be 8 or 32"));
        }
        if width == 0 || height == 0 {
            return Err(UmbraError::validation("pixmap dimensions must be non-zero"));
        }
        let mut state = self.state.borrow_mut();
        state.charge_allocation("pixmap")?;
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(usize::from(depth / 8)))
            .ok_or_else(|| UmbraError::allocation("pixmap size overflow"))?;
        let id = state.next_id();
        state.pixmaps.insert(
            id,
            Rc::new(PixmapEntry {
                depth,
                width,
                height,
                data: RefCell::new(vec![0; len]),
            }),
        );
        state.stats.pixmaps_created += 1;
        Ok(PixmapId(id))
    }

    fn create_picture(
        &self,
        pixmap: PixmapId,
        format: PictureFormat,
        repeat: bool,
    ) -> UmbraResult<PictureId> {
        let mut state = self.state.borrow_mut();
        state.charge_allocation("picture")?;
        let target = state
            .pixmaps
            .get(&pixmap.0)
            .cloned()
            .ok_or_else(|| UmbraError::validation("picture references unknown pixmap"))?;
        if target.depth != format.depth() {
            return Err(UmbraError::validation("picture format does not match pixmap depth"));
        }
        let id = state.next_id();
        state.pictures.insert(
            id,
            PictureEntry {
                format,
                repeat,
                target,
            },
        );
        state.stats.pictures_created += 1;
        Ok(PictureId(id))
    }

    fn create_gc(&self, drawable: PixmapId) -> UmbraResult<GcontextId> {
        let mut state = self.state.borrow_mut();
        state.charge_allocation("graphics context")?;
        if !state.pixmaps.contains_key(&drawable.0) {
            return Err(UmbraError::validation("gc references unknown drawable"));
        }
        let id = state.next_id();
        state.gcs.insert(id, drawable);
        state.stats.gcs_created += 1;
        Ok(GcontextId(id))
    }

    fn fill_rectangle(
        &self,
        op: CompositeOp,
        picture: PictureId,
        color: Color16,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> UmbraResult<()> {
        let CompositeOp::Src = op;
        let state = self.state.borrow();
        let entry = state
            .pictures
            .get(&picture.0)
            .ok_or_else(|| UmbraError::validation("fill on unknown picture"))?;
        let px = [
            (color.alpha >> 8) as u8,
            (color.red >> 8) as u8,
            (color.green >> 8) as u8,
            (color.blue >> 8) as u8,
        ];
        let x1 = x.saturating_add(width).min(entry.target.width);
        let y1 = y.saturating_add(height).min(entry.target.height);
        for yy in y..y1 {
            for xx in x..x1 {
                store(entry, i64::from(xx), i64::from(yy), px);
            }
        }
        Ok(())
    }

    fn put_image(
        &self,
        pixmap: PixmapId,
        gc: GcontextId,
        width: u32,
        height: u32,
        stride: usize,
        data: &[u8],
    ) -> UmbraResult<()> {
        let state = self.state.borrow();
        if !state.gcs.contains_key(&gc.0) {
            return Err(UmbraError::validation("put_image with unknown gc"));
        }
        let entry = state
            .pixmaps
            .get(&pixmap.0)
            .ok_or_else(|| UmbraError::validation("put_image on unknown pixmap"))?;
        let bpp = entry.bytes_per_pixel();
        let row_bytes = width as usize * bpp;
        if width > entry.width || height > entry.height || stride < row_bytes {
            return Err(UmbraError::validation("put_image geometry mismatch"));
        }
        if data.len() < stride * (height as usize).saturating_sub(1) + row_bytes {
            return Err(UmbraError::validation("put_image data too short"));
        }
        let mut target = entry.data.borrow_mut();
        let dst_row = entry.width as usize * bpp;
        for y in 0..height as usize {
            let src = &data[y * stride..y * stride + row_bytes];
            target[y * dst_row..y * dst_row + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    fn composite(
        &self,
        op: CompositeOp,
        src: PictureId,
        mask: Option<PictureId>,
        dst: PictureId,
        width: u32,
        height: u32,
    ) -> UmbraResult<()> {
        let CompositeOp::Src = op;
        let state = self.state.borrow();
        let src_entry = state
            .pictures
            .get(&src.0)
            .ok_or_else(|| UmbraError::validation("composite from unknown source"))?;
        let mask_entry = match mask {
            Some(m) => Some(
                state
                    .pictures
                    .get(&m.0)
                    .ok_or_else(|| UmbraError::validation("composite with unknown mask"))?,
            ),
            None => None,
        };
        let dst_entry = state
            .pictures
            .get(&dst.0)
            .ok_or_else(|| UmbraError::validation("composite onto unknown destination"))?;

        let w = width.min(dst_entry.target.width);
        let h = height.min(dst_entry.target.height);
        for y in 0..i64::from(h) {
            for x in 0..i64::from(w) {
                let s = sample(src_entry, x, y);
                let out = match mask_entry {
                    Some(m) => {
                        let coverage = u16::from(sample(m, x, y)[0]);
                        [
                            mul_div255(u16::from(s[0]), coverage),
                            mul_div255(u16::from(s[1]), coverage),
                            mul_div255(u16::from(s[2]), coverage),
                            mul_div255(u16::from(s[3]), coverage),
                        ]
                    }
                    None => s,
                };
                store(dst_entry, x, y, out);
            }
        }
        Ok(())
    }

    fn free_pixmap(&self, pixmap: PixmapId) {
        let mut state = self.state.borrow_mut();
        if state.pixmaps.remove(&pixmap.0).is_some() {
            state.stats.pixmaps_freed += 1;
        }
    }

    fn free_picture(&self, picture: PictureId) {
        let mut state = self.state.borrow_mut();
        if state.pictures.remove(&picture.0).is_some() {
            state.stats.pictures_freed += 1;
        }
    }

    fn free_gc(&self, gc: GcontextId) {
        let mut state = self.state.borrow_mut();
        if state.gcs.remove(&gc.0).is_some() {
            state.stats.gcs_freed += 1;
        }
    }
}
