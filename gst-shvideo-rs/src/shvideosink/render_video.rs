//! Frame output through VEU memory.
//!
//! NV12 frames are restrided into the VEU's scratch memory, then the VEU
//! converts and scales them onto the framebuffer. A frame is finished once
//! the completion interrupt arrives.

// SPDX-FileCopyrightText: 2025 Contributors to the SH Mobile Video project.
// SPDX-License-Identifier: Apache-2.0

use gstreamer as gst;
use gstreamer_video as gst_video;
use gst::subclass::prelude::*;
use gst_video::prelude::*;
use tracing::trace;

use crate::shvideosink::imp::{CAT, ShVideoSink};
use crate::shvideosink::state::State;

/// NV12 placement in VEU memory: luma rows at `stride`, interleaved chroma
/// rows directly after `stride * height` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameLayout {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub chroma_offset: usize,
}

impl FrameLayout {
    pub fn new(width: u32, height: u32, stride: u32) -> Self {
        let (width, height, stride) = (width as usize, height as usize, stride as usize);
        FrameLayout {
            width,
            height,
            stride,
            chroma_offset: stride * height,
        }
    }

    /// Chroma rows, one per two luma rows.
    pub fn chroma_rows(&self) -> usize {
        self.height.div_ceil(2)
    }

    /// Bytes of an interleaved CbCr row.
    pub fn chroma_row_len(&self) -> usize {
        self.width.div_ceil(2) * 2
    }

    /// Bytes of VEU memory one frame occupies.
    pub fn len(&self) -> usize {
        self.chroma_offset + self.stride * self.chroma_rows()
    }
}

/// Copies `rows` rows of `row_len` bytes between buffers of different
/// strides. Rows missing from `src` are left untouched in `dst`.
fn copy_plane(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    row_len: usize,
    rows: usize,
) {
    for (dst_row, src_row) in dst
        .chunks_mut(dst_stride)
        .zip(src.chunks(src_stride))
        .take(rows)
    {
        let len = row_len.min(src_row.len()).min(dst_row.len());
        dst_row[..len].copy_from_slice(&src_row[..len]);
    }
}

pub(crate) fn video(
    imp: &ShVideoSink,
    state: &mut State,
    buffer: &gst::Buffer,
) -> Result<gst::FlowSuccess, gst::FlowError> {
    let video = state.video.as_ref().ok_or(gst::FlowError::NotNegotiated)?;
    let layout = video.layout;

    let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &video.info)
        .map_err(|_| gst::FlowError::Error)?;

    let mem = state.veu.mem_mut().as_mut_slice();
    if layout.len() > mem.len() {
        gst::element_imp_error!(
            imp,
            gst::ResourceError::NoSpaceLeft,
            [
                "Frame needs {} bytes, VEU memory has {}",
                layout.len(),
                mem.len()
            ]
        );
        return Err(gst::FlowError::Error);
    }

    let strides = frame.plane_stride();
    let (luma, chroma) = mem.split_at_mut(layout.chroma_offset);
    copy_plane(
        luma,
        layout.stride,
        frame.plane_data(0).map_err(|_| gst::FlowError::Error)?,
        strides[0] as usize,
        layout.width,
        layout.height,
    );
    copy_plane(
        chroma,
        layout.stride,
        frame.plane_data(1).map_err(|_| gst::FlowError::Error)?,
        strides[1] as usize,
        layout.chroma_row_len(),
        layout.chroma_rows(),
    );

    let base = state.veu.mem_address();
    let chroma_address = base + layout.chroma_offset as u32;
    state.veu.blit(base, chroma_address).map_err(|e| {
        gst::error!(CAT, imp = imp, "Failed to start VEU: {}", e);
        gst::FlowError::Error
    })?;
    state.veu.wait_irq().map_err(|e| match e {
        shvideo::Error::Cancelled => {
            gst::debug!(CAT, imp = imp, "VEU wait cancelled, flushing");
            gst::FlowError::Flushing
        }
        e => {
            gst::element_imp_error!(imp, gst::ResourceError::Failed, ["VEU did not complete: {}", e]);
            gst::FlowError::Error
        }
    })?;

    trace!("Rendered frame, pts {:?}", buffer.pts());
    Ok(gst::FlowSuccess::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_places_chroma_after_luma() {
        let layout = FrameLayout::new(720, 480, 720);
        assert_eq!(layout.chroma_offset, 720 * 480);
        assert_eq!(layout.chroma_rows(), 240);
        assert_eq!(layout.len(), 720 * 480 * 3 / 2);

        let layout = FrameLayout::new(100, 75, 112);
        assert_eq!(layout.chroma_offset, 112 * 75);
        assert_eq!(layout.chroma_rows(), 38);
        assert_eq!(layout.chroma_row_len(), 100);
        assert_eq!(layout.len(), 112 * 75 + 112 * 38);

        assert_eq!(FrameLayout::new(17, 16, 32).chroma_row_len(), 18);
    }

    #[test]
    fn copy_plane_restrides_rows() {
        // 3 rows of 4 bytes at stride 6 into stride 8
        let src: Vec<u8> = (0..18).collect();
        let mut dst = vec![0xffu8; 24];
        copy_plane(&mut dst, 8, &src, 6, 4, 3);
        assert_eq!(&dst[0..8], &[0, 1, 2, 3, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&dst[8..16], &[6, 7, 8, 9, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&dst[16..24], &[12, 13, 14, 15, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn copy_plane_tolerates_short_source() {
        // last source row stops at the row length, without stride padding
        let src: Vec<u8> = (1..=10).collect();
        let mut dst = vec![0u8; 16];
        copy_plane(&mut dst, 8, &src, 6, 4, 3);
        assert_eq!(&dst[0..4], &[1, 2, 3, 4]);
        assert_eq!(&dst[8..12], &[7, 8, 9, 10]);
        assert!(dst[4..8].iter().all(|&b| b == 0));
    }
}
