mod dispatch;
mod evaluator;
mod threshold;

pub use dispatch::{Alert, AlertCue, AlertFormatter, AlertSink, ChannelSink, Dispatcher, LogSink};
pub use evaluator::{evaluate, next_due};
pub use threshold::{AlertThreshold, ThresholdSet};
