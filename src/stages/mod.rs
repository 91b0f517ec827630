pub mod stage0_triage;
pub mod stage1_batch_correct;
pub mod stage2_render;

pub use stage0_triage::*;
pub use stage1_batch_correct::*;
pub use stage2_render::*;
