//! # ESP3 Device Context
//!
//! Ties the accumulator and the parser of one gateway together.
//!
//! [`Esp3Device::on_byte_received`] is the producer side, meant to be called
//! for every byte the UART delivers. [`Esp3Device::process_ready_frame`] is
//! the consumer side, called whenever [`Esp3Device::is_ready`] reports a
//! completed chunk. Chunks are queued between the two so a slow consumer
//! never sees its bytes overwritten.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::accumulator::{FrameAccumulator, RawChunk, ReceiveState};
use super::parser::{PacketHandler, PacketParser};
use crate::error::{Esp3Error, Result};

/// Default number of completed chunks held for the consumer
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Receive counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Chunks decoded and dispatched
    pub dispatched: u64,

    /// Chunks rejected by the parser
    pub framing_errors: u64,

    /// Chunks dropped because the queue was full
    pub overruns: u64,
}

/// Receive context of one EnOcean gateway
#[derive(Debug)]
pub struct Esp3Device<H> {
    accumulator: FrameAccumulator,
    ready: VecDeque<RawChunk>,
    queue_depth: usize,
    parser: PacketParser,
    handler: H,
    stats: DeviceStats,
}

impl<H: PacketHandler> Esp3Device<H> {
    /// Create a device context dispatching to `handler`
    pub fn new(handler: H) -> Self {
        Self::with_queue_depth(handler, DEFAULT_QUEUE_DEPTH)
    }

    /// Create a device context holding at most `queue_depth` ready chunks
    pub fn with_queue_depth(handler: H, queue_depth: usize) -> Self {
        let queue_depth = queue_depth.max(1);
        Self {
            accumulator: FrameAccumulator::new(),
            ready: VecDeque::with_capacity(queue_depth),
            queue_depth,
            parser: PacketParser::new(),
            handler,
            stats: DeviceStats::default(),
        }
    }

    /// Feed one received byte
    pub fn on_byte_received(&mut self, byte: u8) {
        let Some(chunk) = self.accumulator.push_byte(byte) else {
            return;
        };

        if self.ready.len() >= self.queue_depth {
            self.stats.overruns += 1;
            warn!("Receive queue full, dropping {} byte chunk", chunk.bytes.len());
            return;
        }

        self.ready.push_back(chunk);
    }

    /// Feed a run of received bytes, stopping once the ready queue is full
    ///
    /// # Returns
    ///
    /// * `usize` - Number of bytes consumed. Feed the rest after draining
    ///   the queue with [`Self::process_ready_frame`].
    pub fn on_bytes_received(&mut self, bytes: &[u8]) -> usize {
        for (consumed, &byte) in bytes.iter().enumerate() {
            if self.ready.len() >= self.queue_depth {
                return consumed;
            }
            self.on_byte_received(byte);
        }
        bytes.len()
    }

    /// Whether a completed chunk is waiting for [`Self::process_ready_frame`]
    pub fn is_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Decode the oldest ready chunk and dispatch it to the handler
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if no chunk is waiting, otherwise any parser error.
    pub fn process_ready_frame(&mut self) -> Result<()> {
        let chunk = self.ready.pop_front().ok_or(Esp3Error::NotReady)?;

        match self.parser.process(&chunk, &mut self.handler) {
            Ok(()) => {
                self.stats.dispatched += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.framing_errors += 1;
                debug!("Dropping received frame: {}", e);
                Err(e)
            }
        }
    }

    /// Drop the partially received frame and wait for the next header
    ///
    /// Chunks already completed stay queued.
    pub fn resync(&mut self) {
        self.accumulator.reset();
        self.parser = PacketParser::new();
    }

    /// Accumulator counters
    pub fn receive_state(&self) -> ReceiveState {
        self.accumulator.state()
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
