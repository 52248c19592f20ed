//! # eventscope-stream
//!
//! Delivers log records from a node to the classification pipeline.
//!
//! Three transports share one [`EventPipeline`]:
//! - [`PushListener`]: callbacks from an in-process [`LogBus`](eventscope_core::LogBus)
//! - [`HistoricalPoller`]: one-shot `eth_getLogs` over the last N blocks
//! - [`LiveSubscriber`]: `eth_subscribe("logs")` until closed
//!
//! Results go to an [`EventSink`]; counters are available from
//! [`EventPipeline::metrics`].

pub mod bus;
pub mod config;
pub mod historical;
pub mod live;
pub mod pipeline;
pub mod push;
pub mod sink;

pub use bus::InProcessLogBus;
pub use config::{
    ConfigError, OutputFormat, PipelineConfig, PollConfig, RegistryConfig, RpcConfig,
    UnknownEventPolicy, WatchConfig,
};
pub use historical::{HistoricalPoller, PollSummary};
pub use live::{LiveHandle, LiveSubscriber, LiveSummary};
pub use pipeline::{EventPipeline, PipelineMetrics};
pub use push::PushListener;
pub use sink::{ChannelSink, EventSink, LineSink, MemorySink, SinkError};
