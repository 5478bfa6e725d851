pub mod fields;
pub mod service;

pub use fields::{ControlField, ControlUpdate, ControlValue, FieldKind};
pub use service::ControlMutator;
