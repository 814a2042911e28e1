//! Distribution families and their data-validity transforms.

mod spec;
pub mod transform;

pub use spec::{FamilySpec, Support};
pub use transform::{transform, TransformedValues};
