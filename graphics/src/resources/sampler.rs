//! GPU sampler resource.

use std::sync::Arc;

use crate::backend::{GpuBackend, NativeResource, SamplerHandle};
use crate::types::SamplerDescriptor;

/// A texture sampler, bound next to a texture with
/// [`RenderPass::bind_fragment_sampler`].
///
/// [`RenderPass::bind_fragment_sampler`]: crate::RenderPass::bind_fragment_sampler
pub struct Sampler {
    backend: Arc<dyn GpuBackend>,
    handle: SamplerHandle,
    descriptor: SamplerDescriptor,
}

impl Sampler {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        handle: SamplerHandle,
        descriptor: SamplerDescriptor,
    ) -> Self {
        Self {
            backend,
            handle,
            descriptor,
        }
    }

    pub fn handle(&self) -> SamplerHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    /// Whether this is a depth-compare sampler.
    pub fn is_comparison(&self) -> bool {
        self.descriptor.compare.is_some()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.backend
            .release_resource(NativeResource::Sampler(self.handle));
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("handle", &self.handle)
            .field("filter", &self.descriptor.filter)
            .field("compare", &self.descriptor.compare)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Sampler: Send, Sync);
