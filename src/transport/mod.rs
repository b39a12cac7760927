pub mod result_bus;

pub use result_bus::{ChangeKind, ResultBus, ResultChanged};
