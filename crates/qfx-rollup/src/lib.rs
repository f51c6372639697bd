pub mod bridge;
pub mod event_bus;
pub mod redaction;
pub mod triggered;

pub use bridge::{ChildTransactionIds, RollupBridge, RollupBridgeError, RollupEventName};
pub use event_bus::{BusMessage, EventBus, EventBusError};

#[cfg(any(test, feature = "test-util"))]
pub use bridge::MockRollupBridge;
