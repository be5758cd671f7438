// THEORY:
// Scans and fills are CPU work that must not run on the caller's task (typically a
// UI loop). The `WorkerPool` owns a fixed set of worker tasks; a dispatcher hands
// incoming requests to them round-robin and every request carries its own oneshot
// reply channel. Buffers are moved into a request and moved back in its response,
// so no two calls ever see the same bytes.
//
// `ParallelFillPipeline` is one animation's driver on top of the pool. Its
// `set_level` takes `&mut self`, so a second level change cannot be issued before
// the first has returned: requests for one animation are single-flight by
// construction. Several animations can share one pool.

use crate::core_modules::error::{Error, Result};
use crate::core_modules::incremental_filler::{FillOutcome, FillState};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::position_scanner::{PixelDescriptor, ScanResult};
use crate::pipeline::{self, PipelineConfig, Request, Response};
use futures::future::{join_all, try_join_all};
use log::{debug, trace, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct WorkTask {
    pub request: Request,
    pub result_sender: oneshot::Sender<Result<Response>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<WorkTask>,
    dispatcher: tokio::task::JoinHandle<()>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the dispatcher and `config.worker_count` workers on the current runtime.
    pub fn new(config: PipelineConfig) -> Self {
        let worker_count = config.worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<WorkTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<WorkTask>())
            .unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                trace!("dispatching {} request to worker {worker_idx}", task.request.op());
                if let Err(mpsc::error::SendError(task)) = worker_senders[worker_idx].send(task) {
                    warn!("worker {worker_idx} is gone, rejecting {} request", task.request.op());
                    let _ = task.result_sender.send(Err(Error::WorkerUnavailable));
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(id, mut worker_receiver)| {
                tokio::spawn(async move {
                    while let Some(task) = worker_receiver.recv().await {
                        let op = task.request.op();
                        let request = task.request;
                        // A panic stays inside the blocking task and never ends this loop.
                        let result = match tokio::task::spawn_blocking(move || pipeline::handle(request)).await {
                            Ok(result) => result,
                            Err(e) => {
                                warn!("worker {id}: {op} request panicked: {e}");
                                Err(Error::RequestPanicked { op })
                            }
                        };
                        trace!("worker {id} finished {op} request");
                        // The caller may have stopped waiting; its result is discarded.
                        let _ = task.result_sender.send(result);
                    }
                })
            })
            .collect();

        debug!("worker pool started with {worker_count} workers");

        Self {
            task_sender,
            dispatcher,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Runs one request on a worker and waits for its response.
    pub async fn process(&self, request: Request) -> Result<Response> {
        let (result_sender, result_receiver) = oneshot::channel();

        self.task_sender
            .send(WorkTask {
                request,
                result_sender,
            })
            .map_err(|_| Error::WorkerUnavailable)?;

        result_receiver.await.map_err(|_| Error::WorkerUnavailable)?
    }

    /// Runs independent requests concurrently, answering each in submission order.
    pub async fn process_all(&self, requests: Vec<Request>) -> Vec<Result<Response>> {
        join_all(requests.into_iter().map(|request| self.process(request))).await
    }

    pub async fn scan(&self, pixels: Vec<u8>, width: u32) -> Result<ScanResult> {
        match self.process(Request::Scan { pixels, width }).await? {
            Response::Scanned(result) => Ok(result),
            Response::Filled(_) => Err(Error::WorkerUnavailable),
        }
    }

    pub async fn fill(
        &self,
        pixels: Vec<u8>,
        descriptors: Arc<[PixelDescriptor]>,
        threshold: f64,
        cursor: usize,
    ) -> Result<FillOutcome> {
        let request = Request::Fill {
            pixels,
            descriptors,
            cursor,
            threshold,
        };
        match self.process(request).await? {
            Response::Filled(outcome) => Ok(outcome),
            Response::Scanned(_) => Err(Error::WorkerUnavailable),
        }
    }

    /// Stops accepting requests and waits for queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Drives one image's fill animation through a shared `WorkerPool`.
pub struct ParallelFillPipeline {
    pool: Arc<WorkerPool>,
    width: u32,
    pristine: Vec<u8>,
    /// `None` while a fill is in flight, or after one was abandoned or failed.
    pixels: Option<Vec<u8>>,
    descriptors: Arc<[PixelDescriptor]>,
    min_opaque_row: u32,
    state: FillState,
}

impl ParallelFillPipeline {
    /// Scans the image on the pool and prepares it for filling.
    pub async fn load(pool: Arc<WorkerPool>, pixels: PixelBuffer) -> Result<Self> {
        let width = pixels.width();
        let pristine = pixels.into_bytes();
        let scan = pool.scan(pristine.clone(), width).await?;
        debug!(
            "loaded {width}px wide image: {} fillable pixels from row {}",
            scan.descriptors.len(),
            scan.min_opaque_row
        );
        Ok(Self {
            pool,
            width,
            pixels: Some(pristine.clone()),
            pristine,
            descriptors: scan.descriptors.into(),
            min_opaque_row: scan.min_opaque_row,
            state: FillState::default(),
        })
    }

    /// Loads several images at once; each gets its own buffer and descriptor list.
    pub async fn load_all(pool: Arc<WorkerPool>, images: Vec<PixelBuffer>) -> Result<Vec<Self>> {
        try_join_all(
            images
                .into_iter()
                .map(|image| Self::load(Arc::clone(&pool), image)),
        )
        .await
    }

    /// Raises the fill level to `threshold` and returns the new cursor.
    ///
    /// When an earlier call never returned its buffer (its future was dropped, or the
    /// request failed) the fill is replayed from the original image up to the highest
    /// level already applied, so colour that was shown is never taken back.
    pub async fn set_level(&mut self, threshold: f64) -> Result<usize> {
        let (pixels, cursor, level) = match self.pixels.take() {
            Some(pixels) => (pixels, self.state.cursor, threshold),
            None => {
                let level = threshold.max(self.state.threshold);
                debug!("replaying fill to level {level} from the original image");
                (self.pristine.clone(), 0, level)
            }
        };

        let outcome = self
            .pool
            .fill(pixels, Arc::clone(&self.descriptors), level, cursor)
            .await?;

        self.pixels = Some(outcome.pixels);
        self.state = FillState {
            cursor: outcome.new_cursor,
            threshold: self.state.threshold.max(level),
        };
        Ok(self.state.cursor)
    }

    /// Restores the original image and rewinds the cursor.
    pub fn reset(&mut self) {
        self.pixels = Some(self.pristine.clone());
        self.state = FillState::default();
    }

    /// A copy of the current frame, if no fill has been lost since the last one.
    pub fn frame(&self) -> Option<PixelBuffer> {
        let pixels = self.pixels.as_ref()?;
        PixelBuffer::new(pixels.clone(), self.width).ok()
    }

    pub fn state(&self) -> FillState {
        self.state
    }

    pub fn min_opaque_row(&self) -> u32 {
        self.min_opaque_row
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// True once every fillable pixel has been coloured.
    pub fn is_full(&self) -> bool {
        self.state.cursor == self.descriptors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FillPipeline;
    use futures::FutureExt;

    fn pool(workers: usize) -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(PipelineConfig {
            worker_count: workers,
        }))
    }

    /// A cup: open top rows, walls on both sides and a solid base.
    fn cup(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let wall = x == 0 || x == width - 1 || y == height - 1;
                let alpha = if y >= 2 && wall { 255 } else { 0 };
                data.extend_from_slice(&[200, 180, (x * 7) as u8, alpha]);
            }
        }
        PixelBuffer::new(data, width).expect("valid test buffer")
    }

    #[tokio::test]
    async fn pool_answers_scan_and_fill() {
        let pool = pool(2);
        let image = cup(5, 6);

        let scan = pool
            .scan(image.as_bytes().to_vec(), image.width())
            .await
            .expect("scan");
        assert_eq!(scan.min_opaque_row, 2);

        let outcome = pool
            .fill(image.into_bytes(), scan.descriptors.clone().into(), 1.0, 0)
            .await
            .expect("fill");
        assert_eq!(outcome.new_cursor, scan.descriptors.len());
    }

    #[tokio::test]
    async fn pool_reports_rejected_requests() {
        let pool = pool(1);
        let result = pool.scan(vec![0u8; 5], 1).await;
        assert!(matches!(result, Err(Error::MalformedBuffer { len: 5 })));
    }

    #[tokio::test]
    async fn parallel_pipeline_matches_local_pipeline() {
        let pool = pool(3);
        let image = cup(9, 12);
        let mut local = FillPipeline::new(image.clone());
        let mut parallel = ParallelFillPipeline::load(pool, image).await.expect("load");

        for step in 0..=10 {
            let level = step as f64 / 10.0;
            let expected = local.set_level(level).expect("local level");
            let cursor = parallel.set_level(level).await.expect("parallel level");
            assert_eq!(cursor, expected);
            assert_eq!(parallel.frame().as_ref(), Some(local.pixels()));
        }
        assert!(parallel.is_full());
    }

    #[tokio::test]
    async fn abandoned_fill_is_replayed() {
        let pool = pool(2);
        let image = cup(6, 8);
        let mut expected = FillPipeline::new(image.clone());
        expected.set_level(0.7).expect("level");

        let mut parallel = ParallelFillPipeline::load(pool, image).await.expect("load");
        parallel.set_level(0.3).await.expect("level");
        // Polled once and dropped: the buffer in flight never comes back.
        assert!(parallel.set_level(0.5).now_or_never().is_none());
        assert!(parallel.frame().is_none());

        parallel.set_level(0.7).await.expect("replay");
        assert_eq!(parallel.state().cursor, expected.state().cursor);
        assert_eq!(parallel.frame().as_ref(), Some(expected.pixels()));
    }

    #[tokio::test]
    async fn replay_after_a_lost_fill_never_lowers_the_level() {
        let pool = pool(1);
        let image = PixelBuffer::new(vec![255u8; 4 * 4 * 4], 4).expect("valid buffer");
        let mut expected = FillPipeline::new(image.clone());
        expected.set_level(0.75).expect("level");

        let mut parallel = ParallelFillPipeline::load(pool, image).await.expect("load");
        assert_eq!(parallel.set_level(0.75).await.expect("level"), 12);
        assert!(parallel.set_level(0.8).now_or_never().is_none());

        assert_eq!(parallel.set_level(0.25).await.expect("replay"), 12);
        assert_eq!(parallel.state().threshold, 0.75);
        assert_eq!(parallel.frame().as_ref(), Some(expected.pixels()));
    }

    #[tokio::test]
    async fn pool_keeps_serving_after_a_bad_request() {
        let pool = pool(1);
        let bad = PixelDescriptor {
            fill_fraction: 0.5,
            byte_offset: usize::MAX - 1,
        };
        let rejected = pool.fill(vec![255u8; 16], vec![bad].into(), 1.0, 0).await;
        assert!(matches!(rejected, Err(Error::DescriptorOutOfBounds { index: 0, .. })));

        let scan = pool.scan(vec![255u8; 16], 2).await.expect("scan after rejection");
        assert_eq!(scan.descriptors.len(), 4);
    }

    #[tokio::test]
    async fn independent_animations_share_a_pool() {
        let pool = pool(2);
        let images = vec![cup(4, 4), cup(7, 5), PixelBuffer::new(vec![0u8; 64], 4).expect("blank")];
        let mut animations = ParallelFillPipeline::load_all(Arc::clone(&pool), images)
            .await
            .expect("load all");

        for animation in animations.iter_mut() {
            animation.set_level(1.0).await.expect("fill");
            assert!(animation.is_full());
        }
        assert_eq!(animations[2].descriptor_count(), 0);
        assert_eq!(animations[2].min_opaque_row(), 0);

        animations[0].reset();
        assert_eq!(animations[0].state(), FillState::default());
        assert_eq!(animations[0].frame(), Some(cup(4, 4)));
    }

    #[tokio::test]
    async fn process_all_keeps_submission_order() {
        let pool = pool(4);
        let requests = (1..=6u32)
            .map(|width| Request::Scan {
                pixels: vec![255u8; (width * 4 * 2) as usize],
                width,
            })
            .collect();
        let responses = pool.process_all(requests).await;

        for (n, response) in responses.into_iter().enumerate() {
            match response.expect("scan") {
                Response::Scanned(scan) => assert_eq!(scan.descriptors.len(), (n + 1) * 2),
                other => panic!("unexpected response {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn shut_down_pool_still_drains() {
        let pool = WorkerPool::new(PipelineConfig { worker_count: 2 });
        assert_eq!(pool.worker_count(), 2);
        let scan = pool.scan(vec![255u8; 16], 2).await.expect("scan");
        assert_eq!(scan.descriptors.len(), 4);
        pool.shutdown().await;
    }
}
