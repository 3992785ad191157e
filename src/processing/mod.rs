//! Photo post-processing: geometry normalization, the retro effect, and
//! output compression, sequenced by [`pipeline::PhotoPipeline`].

pub mod compress;
pub mod geometry;
pub mod pipeline;
pub mod retro;
