// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::device::ImageBarrier;
use crate::types::{AccessFlags, ImageLayout, PipelineStages};

/// Where a swapchain image sits in the acquire/present cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageState {
    /// Freshly created; contents are undefined.
    #[default]
    Undefined,
    /// Acquired and ready to be drawn into.
    ColorAttachment,
    /// Handed to the presentation engine.
    PresentSrc,
}

impl ImageState {
    pub fn layout(self) -> ImageLayout {
        match self {
            ImageState::Undefined => ImageLayout::Undefined,
            ImageState::ColorAttachment => ImageLayout::ColorAttachmentOptimal,
            ImageState::PresentSrc => ImageLayout::PresentSrc,
        }
    }

    pub fn stages(self) -> PipelineStages {
        match self {
            ImageState::Undefined => PipelineStages::TOP_OF_PIPE,
            ImageState::ColorAttachment => PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            ImageState::PresentSrc => PipelineStages::BOTTOM_OF_PIPE,
        }
    }

    pub fn access(self) -> AccessFlags {
        match self {
            ImageState::Undefined => AccessFlags::empty(),
            ImageState::ColorAttachment => AccessFlags::COLOR_ATTACHMENT_WRITE,
            ImageState::PresentSrc => AccessFlags::MEMORY_READ,
        }
    }

    pub fn can_transition_to(self, next: ImageState) -> bool {
        matches!(
            (self, next),
            (ImageState::Undefined | ImageState::PresentSrc, ImageState::ColorAttachment)
                | (ImageState::ColorAttachment, ImageState::PresentSrc)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("illegal image transition {from:?} -> {to:?}")]
    Illegal { from: ImageState, to: ImageState },
}

/// One swapchain-owned image plus its last committed state.
#[derive(Debug)]
pub struct PresentableImage<I> {
    handle: I,
    state: ImageState,
}

impl<I: Copy> PresentableImage<I> {
    pub fn new(handle: I) -> Self {
        Self {
            handle,
            state: ImageState::Undefined,
        }
    }

    pub fn raw_handle(&self) -> I {
        self.handle
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Barrier that moves the image from its tracked state to `next`.
    /// Nothing is committed until [`commit`](Self::commit).
    pub fn barrier_to(&self, next: ImageState) -> Result<ImageBarrier<I>, TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.state,
                to: next,
            });
        }
        Ok(ImageBarrier {
            image: self.handle,
            old_layout: self.state.layout(),
            new_layout: next.layout(),
            src_stages: self.state.stages(),
            dst_stages: next.stages(),
            src_access: self.state.access(),
            dst_access: next.access(),
        })
    }

    /// Record that a barrier to `next` was submitted.
    pub fn commit(&mut self, next: ImageState) {
        debug_assert!(self.state.can_transition_to(next));
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        use ImageState::*;
        assert!(Undefined.can_transition_to(ColorAttachment));
        assert!(ColorAttachment.can_transition_to(PresentSrc));
        assert!(PresentSrc.can_transition_to(ColorAttachment));

        assert!(!Undefined.can_transition_to(PresentSrc));
        assert!(!ColorAttachment.can_transition_to(ColorAttachment));
        assert!(!PresentSrc.can_transition_to(Undefined));
    }

    #[test]
    fn first_barrier_starts_from_top_of_pipe() {
        let image = PresentableImage::new(7u64);
        let barrier = image.barrier_to(ImageState::ColorAttachment).unwrap();

        assert_eq!(barrier.image, 7);
        assert_eq!(barrier.old_layout, ImageLayout::Undefined);
        assert_eq!(barrier.new_layout, ImageLayout::ColorAttachmentOptimal);
        assert_eq!(barrier.src_stages, PipelineStages::TOP_OF_PIPE);
        assert_eq!(barrier.dst_stages, PipelineStages::COLOR_ATTACHMENT_OUTPUT);
        assert!(barrier.src_access.is_empty());
        assert_eq!(barrier.dst_access, AccessFlags::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn present_barrier_uses_tracked_state() {
        let mut image = PresentableImage::new(1u64);
        image.commit(ImageState::ColorAttachment);

        let barrier = image.barrier_to(ImageState::PresentSrc).unwrap();
        assert_eq!(barrier.old_layout, ImageLayout::ColorAttachmentOptimal);
        assert_eq!(barrier.new_layout, ImageLayout::PresentSrc);
        assert_eq!(barrier.src_stages, PipelineStages::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barrier.dst_stages, PipelineStages::BOTTOM_OF_PIPE);
        assert_eq!(barrier.src_access, AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(barrier.dst_access, AccessFlags::MEMORY_READ);
    }

    #[test]
    fn illegal_barrier_leaves_state_alone() {
        let image = PresentableImage::new(1u64);
        let err = image.barrier_to(ImageState::PresentSrc).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: ImageState::Undefined,
                to: ImageState::PresentSrc
            }
        );
        assert_eq!(image.state(), ImageState::Undefined);
    }
}
