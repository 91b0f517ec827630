pub mod correction;
pub mod segment;

pub use correction::*;
pub use segment::*;
