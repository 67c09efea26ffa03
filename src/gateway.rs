//! Start-up wiring.
//!
//! Builds the ring buffers, opens the byte source and the storage file,
//! resolves the collector and registers the tasks in their fixed order:
//! serial, framer, delivery, storage.

use crate::config::GatewayConfig;
use crate::data::PipelineBuffers;
use crate::delivery::transport::Transport;
use crate::delivery::{DeliveryTask, TcpTransport};
use crate::error::{AppResult, GatewayError};
use crate::framer::JsonFramer;
use crate::scheduler::{Pacing, Scheduler};
use crate::sink::{FileSink, RecordSink};
use crate::source::{ByteSource, SerialSourceBuilder};
use crate::tasks::{FramerTask, SerialTask, StorageTask};
use std::time::Duration;
use tracing::info;

/// Build a scheduler for `config` using the serial port, the TCP collector and
/// the storage file it names.
pub fn build(config: &GatewayConfig) -> AppResult<Scheduler> {
    config.validate().map_err(GatewayError::Configuration)?;

    let source = SerialSourceBuilder::new(config.serial.port.clone(), config.serial.baud_rate)
        .with_timeout(Duration::ZERO)
        .open()?;

    let transport = TcpTransport::resolve(&config.delivery.host, config.delivery.port)?;
    info!(
        host = %config.delivery.host,
        addr = %transport.addr(),
        path = %config.delivery.path,
        "collector resolved"
    );

    let sink = if config.storage.enabled {
        Some(FileSink::create(&config.storage.path)?)
    } else {
        info!("local storage disabled");
        None
    };

    assemble(config, source, transport, sink)
}

/// Build a scheduler from already opened endpoints.
///
/// `sink` is only used when `config.storage.enabled` is set.
pub fn assemble<S, T, K>(
    config: &GatewayConfig,
    source: S,
    transport: T,
    sink: Option<K>,
) -> AppResult<Scheduler>
where
    S: ByteSource + 'static,
    T: Transport + 'static,
    K: RecordSink + 'static,
{
    let buffers = PipelineBuffers::from_config(config)?;
    let store_locally = config.storage.enabled && sink.is_some();

    let framer = JsonFramer::new(config.framer.expected_depth, config.framer.max_object_len);

    let mut scheduler = Scheduler::new(buffers, Pacing::from(&config.scheduler))
        .with_task(Box::new(SerialTask::new(source, config.serial.chunk_size)))
        .with_task(Box::new(FramerTask::new(framer, store_locally)))
        .with_task(Box::new(DeliveryTask::new(transport, &config.delivery)));

    if let Some(sink) = sink.filter(|_| store_locally) {
        scheduler.add_task(Box::new(StorageTask::new(sink)));
    }

    info!(
        name = %config.application.name,
        tasks = ?scheduler.task_names(),
        short_sleep = ?config.scheduler.short_sleep,
        long_sleep = ?config.scheduler.long_sleep,
        "gateway initialised"
    );
    Ok(scheduler)
}
