//! Hit-test routing from 3D scene queries into retained UI content.

mod router;

pub use router::{HoverChange, HoverFlags, InteractionRouter, InteractionSource};
