//! Device-facing streaming: a background thread keeps a ring of PCM topped
//! up from a provider, and the device callback drains it through a `PcmSink`.

use crate::provider::StreamingDataProvider;
use crossbeam_channel::{Receiver, Sender, unbounded};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Samples pulled from the provider per refill.
    pub chunk_size: usize,
    /// Target amount of audio queued ahead of the device.
    pub buffered_samples: usize,
    pub poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            buffered_samples: 4096,
            poll_interval: Duration::from_millis(2),
        }
    }
}

impl StreamConfig {
    /// Ring capacity: a whole number of chunks covering `buffered_samples`.
    pub fn ring_capacity(&self) -> usize {
        self.buffered_samples.div_ceil(self.chunk_size.max(1)) * self.chunk_size.max(1)
    }
}

#[derive(Debug, Default)]
struct StreamCounters {
    played: AtomicU64,
    underruns: AtomicU64,
}

/// Consumer end, handed to the device callback.
pub struct PcmSink {
    consumer: HeapCons<i16>,
    counters: Arc<StreamCounters>,
}

impl PcmSink {
    /// Fills `out` with queued samples. A short read is padded with silence
    /// and counted as an underrun.
    pub fn fill(&mut self, out: &mut [i16]) -> usize {
        let n = self.consumer.pop_slice(out);
        if n < out.len() {
            out[n..].fill(0);
            self.counters.underruns.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.played.fetch_add(n as u64, Ordering::Relaxed);
        n
    }

    pub fn queued(&self) -> usize {
        self.consumer.occupied_len()
    }
}

/// Producer side state, moved onto the fill thread while playing.
struct FillLoop {
    producer: HeapProd<i16>,
    provider: Box<dyn StreamingDataProvider>,
    chunk: Vec<i16>,
    provider_rx: Receiver<Box<dyn StreamingDataProvider>>,
}

impl FillLoop {
    /// Pulls as many whole chunks as there is room for. Returns the count.
    fn fill_available(&mut self) -> usize {
        while let Ok(provider) = self.provider_rx.try_recv() {
            self.provider = provider;
        }
        let chunks = self.producer.vacant_len() / self.chunk.len();
        for _ in 0..chunks {
            self.provider.next_chunk(&mut self.chunk);
            self.producer.push_slice(&self.chunk);
        }
        chunks
    }

    fn run(
        mut self,
        running: Arc<AtomicBool>,
        counters: Arc<StreamCounters>,
        poll_interval: Duration,
    ) -> Self {
        let mut reported = counters.underruns.load(Ordering::Relaxed);
        let mut last_report = Instant::now();
        while running.load(Ordering::Acquire) {
            if self.fill_available() == 0 {
                thread::sleep(poll_interval);
            }
            // At most one report per second.
            let underruns = counters.underruns.load(Ordering::Relaxed);
            if underruns != reported && last_report.elapsed() >= Duration::from_secs(1) {
                tracing::warn!(
                    "[Stream] {} underrun(s), device outpaced the provider",
                    underruns - reported
                );
                reported = underruns;
                last_report = Instant::now();
            }
        }
        self
    }
}

/// Streams a provider to the device through a ring of preallocated samples.
/// In steady state neither side allocates.
pub struct StreamingAudioSource {
    config: StreamConfig,
    counters: Arc<StreamCounters>,
    running: Arc<AtomicBool>,
    provider_tx: Sender<Box<dyn StreamingDataProvider>>,
    idle: Option<FillLoop>,
    thread: Option<JoinHandle<FillLoop>>,
}

impl StreamingAudioSource {
    pub fn new(provider: Box<dyn StreamingDataProvider>, config: StreamConfig) -> (Self, PcmSink) {
        let chunk_size = config.chunk_size.max(1);
        let (producer, consumer) = HeapRb::<i16>::new(config.ring_capacity()).split();
        let (provider_tx, provider_rx) = unbounded();
        let counters = Arc::new(StreamCounters::default());

        let source = Self {
            config,
            counters: counters.clone(),
            running: Arc::new(AtomicBool::new(false)),
            provider_tx,
            idle: Some(FillLoop {
                producer,
                provider,
                chunk: vec![0; chunk_size],
                provider_rx,
            }),
            thread: None,
        };
        (source, PcmSink { consumer, counters })
    }

    pub fn is_playing(&self) -> bool {
        self.thread.is_some()
    }

    /// Pre-fills the ring and starts the fill thread.
    pub fn play(&mut self) -> anyhow::Result<()> {
        let Some(mut fill) = self.idle.take() else {
            return Ok(());
        };
        fill.fill_available();

        self.running.store(true, Ordering::Release);
        let running = self.running.clone();
        let counters = self.counters.clone();
        let poll_interval = self.config.poll_interval;
        let handle = thread::Builder::new()
            .name("stepwise-fill".to_string())
            .spawn(move || fill.run(running, counters, poll_interval))?;
        self.thread = Some(handle);
        tracing::info!(
            "[Stream] Playing ({} sample chunks, {} buffered)",
            self.config.chunk_size,
            self.config.ring_capacity()
        );
        Ok(())
    }

    /// Stops the fill thread and rewinds the provider.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        match handle.join() {
            Ok(mut fill) => {
                fill.provider.seek_to(0);
                self.idle = Some(fill);
                tracing::info!("[Stream] Stopped");
            }
            Err(_) => tracing::error!("[Stream] Fill thread panicked"),
        }
    }

    /// Swaps the provider; takes effect before the next refill.
    pub fn set_data_provider(&mut self, provider: Box<dyn StreamingDataProvider>) {
        match self.idle.as_mut() {
            Some(fill) => fill.provider = provider,
            None => {
                if self.provider_tx.send(provider).is_err() {
                    tracing::warn!("[Stream] Fill thread gone, provider dropped");
                }
            }
        }
    }

    /// Refills synchronously while stopped. Returns the chunks pulled.
    pub fn fill_now(&mut self) -> usize {
        self.idle.as_mut().map_or(0, FillLoop::fill_available)
    }

    /// Samples the device has consumed from the ring.
    pub fn samples_processed(&self) -> u64 {
        self.counters.played.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.counters.underruns.load(Ordering::Relaxed)
    }
}

impl Drop for StreamingAudioSource {
    fn drop(&mut self) {
        self.stop();
    }
}
