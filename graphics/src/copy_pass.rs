//! Copy pass recording scope.
//!
//! All uploads from transfer buffers into data buffers and textures are
//! recorded inside a [`CopyPass`]. Copy passes are cheap and not pooled.

use crate::backend::{BufferUpload, CopyPassHandle, TextureUpload};
use crate::command_buffer::{ActivePass, CommandRecording};
use crate::error::GpuError;
use crate::resources::{DataBuffer, Texture, TransferBuffer};
use crate::types::{TextureRegion, TransferBufferUsage};

/// An open copy pass.
///
/// Ends when [`end`](Self::end) is called or when dropped.
pub struct CopyPass<'a> {
    recording: &'a mut CommandRecording,
}

impl<'a> CopyPass<'a> {
    pub(crate) fn new(recording: &'a mut CommandRecording) -> Self {
        Self { recording }
    }

    /// Native handle of the pass.
    pub fn handle(&self) -> CopyPassHandle {
        match self.recording.active_pass() {
            Some(ActivePass::Copy(handle)) => *handle,
            _ => unreachable!("copy pass scope without an open copy pass"),
        }
    }

    /// Copy `size` bytes from `source` into `destination`.
    ///
    /// With `cycle` set, the driver may give `destination` fresh memory if
    /// the GPU is still reading the old contents.
    pub fn upload_to_buffer(
        &mut self,
        source: &TransferBuffer,
        source_offset: u64,
        destination: &DataBuffer,
        destination_offset: u64,
        size: u64,
        cycle: bool,
    ) -> Result<(), GpuError> {
        check_upload_source(source, source_offset, size)?;

        let in_bounds = destination_offset
            .checked_add(size)
            .is_some_and(|end| end <= destination.size());
        if !in_bounds {
            return Err(GpuError::InvalidParameter(format!(
                "range {destination_offset}+{size} exceeds buffer {:?} of {} bytes",
                destination.label(),
                destination.size()
            )));
        }

        let upload = BufferUpload {
            source: source.handle(),
            source_offset,
            destination: destination.handle(),
            destination_offset,
            size,
            cycle,
        };
        self.recording
            .backend()
            .upload_to_buffer(self.handle(), &upload);
        Ok(())
    }

    /// Copy texel data from `source` into a region of `destination`.
    ///
    /// The source must hold `region` tightly packed in the texture's format,
    /// one layer after another.
    pub fn upload_to_texture(
        &mut self,
        source: &TransferBuffer,
        source_offset: u64,
        destination: &Texture,
        region: &TextureRegion,
        cycle: bool,
    ) -> Result<(), GpuError> {
        check_texture_region(destination, region)?;
        let texel_size = u64::from(destination.format().bytes_per_texel());
        let size = region
            .texel_count()
            .and_then(|texels| texels.checked_mul(texel_size))
            .ok_or_else(|| {
                GpuError::InvalidParameter(format!("region {region:?} is too large to upload"))
            })?;
        check_upload_source(source, source_offset, size)?;

        let upload = TextureUpload {
            source: source.handle(),
            source_offset,
            destination: destination.handle(),
            region: *region,
            cycle,
        };
        self.recording
            .backend()
            .upload_to_texture(self.handle(), &upload);
        Ok(())
    }

    /// End the pass.
    pub fn end(self) {
        // Drop does the work.
    }
}

impl Drop for CopyPass<'_> {
    fn drop(&mut self) {
        self.recording.end_active_pass();
    }
}

impl std::fmt::Debug for CopyPass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyPass")
            .field("handle", &self.handle())
            .finish()
    }
}

fn check_upload_source(source: &TransferBuffer, offset: u64, size: u64) -> Result<(), GpuError> {
    if source.usage() != TransferBufferUsage::Upload {
        return Err(GpuError::InvalidParameter(
            "uploads need an upload transfer buffer".to_string(),
        ));
    }
    if size == 0 {
        return Err(GpuError::InvalidParameter("upload size is zero".to_string()));
    }
    source.check_range(offset, size)
}

fn check_texture_region(texture: &Texture, region: &TextureRegion) -> Result<(), GpuError> {
    if region.mip_level >= texture.mip_level_count() {
        return Err(GpuError::InvalidParameter(format!(
            "mip level {} out of range ({} levels)",
            region.mip_level,
            texture.mip_level_count()
        )));
    }

    let extent = texture.size().mip_level_size(region.mip_level);
    let fits = |offset: u32, len: u32, max: u32| {
        offset.checked_add(len).is_some_and(|end| end <= max)
    };
    if !fits(region.x, region.width, extent.width)
        || !fits(region.y, region.height, extent.height)
        || !fits(region.layer, region.layer_count, extent.depth)
    {
        return Err(GpuError::InvalidParameter(format!(
            "region {region:?} exceeds texture {:?} mip {} of {}x{} with {} layers",
            texture.label(),
            region.mip_level,
            extent.width,
            extent.height,
            extent.depth
        )));
    }
    Ok(())
}
