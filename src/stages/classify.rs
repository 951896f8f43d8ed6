use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::llm::{build_request, RatingClient, RatingTransport};
use crate::models::{
    ClassificationResult, EmpathyScale, Modality, SegmentSet,
};

/// Identity of one unit of work and one result row.
pub type PairKey = (String, Modality);

/// Configuration for the classification run
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Modalities to classify each segment under
    pub modalities: Vec<Modality>,
    /// Maximum simultaneous in-flight service calls
    pub concurrency: usize,
    /// Ordinal scale for prompts and parsing
    pub scale: EmpathyScale,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            modalities: Modality::ALL.to_vec(),
            concurrency: 4,
            scale: EmpathyScale::default(),
        }
    }
}

/// Execute the classification run: every requested (segment, modality) pair
/// yields exactly one result on the returned channel.
///
/// Pairs whose key is in `done` (terminal rows from an interrupted run) are
/// skipped without a service call. Pairs missing a required input become
/// `SkippedMissingInput` rows immediately. The rest go through a worker pool
/// bounded by `config.concurrency`; completions stream out as they land, in
/// no particular order, so the caller can persist rows incrementally.
///
/// Flipping `shutdown` stops dispatch of new pairs; in-flight calls finish
/// and their rows are still delivered.
pub fn execute_classify<T: RatingTransport + 'static>(
    client: Arc<RatingClient<T>>,
    segments: SegmentSet,
    config: ClassifyConfig,
    done: HashSet<PairKey>,
    shutdown: watch::Receiver<bool>,
) -> mpsc::Receiver<ClassificationResult> {
    let concurrency = config.concurrency.max(1);
    let (tx, rx) = mpsc::channel(concurrency * 2);

    tokio::spawn(async move {
        // Dedup modalities, preserving request order
        let mut modalities: Vec<Modality> = Vec::new();
        for modality in &config.modalities {
            if !modalities.contains(modality) {
                modalities.push(*modality);
            }
        }

        // Partition the worklist: already-done pairs drop out, pairs missing
        // inputs resolve without a call, the rest need the service.
        let mut skipped = Vec::new();
        let mut callable = Vec::new();
        let mut resumed = 0usize;

        for segment in &segments.segments {
            for &modality in &modalities {
                let key = (segment.segment_id.clone(), modality);
                if done.contains(&key) {
                    debug!(
                        segment = %key.0,
                        modality = %key.1,
                        "already classified, skipping"
                    );
                    resumed += 1;
                    continue;
                }
                match build_request(segment, modality, config.scale) {
                    Ok(request) => callable.push(request),
                    Err(err) => {
                        warn!("{}", err);
                        skipped.push(ClassificationResult::skipped_missing_input(
                            &segment.segment_id,
                            modality,
                        ));
                    }
                }
            }
        }

        info!(
            "Classifying {} pairs ({} skipped for missing input, {} already done)",
            callable.len(),
            skipped.len(),
            resumed
        );

        for result in skipped {
            if tx.send(result).await.is_err() {
                return;
            }
        }

        let mut queue = callable.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let dispatch = |request| {
            let client = Arc::clone(&client);
            async move { client.rate(&request).await }
        };

        if !*shutdown.borrow() {
            for request in queue.by_ref().take(concurrency) {
                in_flight.push(dispatch(request));
            }
        }

        let mut halted = false;
        while let Some(result) = in_flight.next().await {
            if tx.send(result).await.is_err() {
                // Receiver dropped; let in-flight calls lapse
                return;
            }
            if *shutdown.borrow() {
                if !halted {
                    warn!("shutdown requested, finishing in-flight calls only");
                    halted = true;
                }
                continue;
            }
            if let Some(request) = queue.next() {
                in_flight.push(dispatch(request));
            }
        }
    });

    rx
}
