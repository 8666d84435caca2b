pub mod notification;
pub mod price;
pub mod trigger;

pub use notification::{ConditionKind, EmaCross, Notification, PercentBounds, RangeBounds};
pub use price::PriceSample;
pub use trigger::{TriggerEvent, TriggerKind};
