//! Actor trait, lifecycle, context, and spawn properties.

pub mod context;
pub mod lifecycle;
pub mod props;
pub mod traits;

pub use context::ActorContext;
pub use lifecycle::{ActorLifecycle, ActorState};
pub use props::Props;
pub use traits::Actor;
