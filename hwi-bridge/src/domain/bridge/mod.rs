pub mod operation;
pub mod value_object;

pub use operation::{CommandRequest, Invocation, Operation, OperationScope};
pub use value_object::{DeviceHandle, Origin};
