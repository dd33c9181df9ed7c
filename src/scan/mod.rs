//! The scan engine: partitions a nonce range across worker threads, runs
//! each nonce through its game evaluator and predicate, and merges the
//! per-worker hit lists back into nonce order. This is the parallel-compute
//! heart of the system; everything else (stores, ingest server, binding
//! surface) is plumbing around it.

use crate::error::{ReplayError, Result};
use crate::games::{Game, Registry, Seeds};
use crate::predicate::Predicate;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Nonces are scanned in segments no larger than this per poll, to keep
/// cancellation and timeout latency bounded without paying a per-nonce
/// atomic load.
const POLL_INTERVAL: u64 = 1024;

/// A full scan may not span more than ten million nonces; beyond that the
/// caller should split the range into multiple runs.
pub const MAX_RANGE: u64 = 10_000_000;

pub struct ScanRequest<'a> {
    pub game: crate::games::GameId,
    pub seeds: Seeds<'a>,
    pub nonce_start: u64,
    pub nonce_end: u64,
    pub params: Value,
    pub predicate: Predicate,
    pub limit: u64,
    pub timeout_ms: u64,
}

impl<'a> ScanRequest<'a> {
    pub fn validate(&self) -> Result<()> {
        if self.nonce_start < 1 {
            return Err(
                ReplayError::validation("VALIDATION_ERROR", "nonceStart must be >= 1")
                    .with_field("nonceStart"),
            );
        }
        if self.nonce_end < self.nonce_start {
            return Err(ReplayError::validation(
                "VALIDATION_ERROR",
                "nonceEnd must be >= nonceStart",
            )
            .with_field("nonceEnd"));
        }
        if self.nonce_end - self.nonce_start + 1 > MAX_RANGE {
            return Err(ReplayError::domain(
                "RANGE_TOO_LARGE",
                format!("range exceeds {MAX_RANGE} nonces"),
            )
            .with_field("nonceEnd"));
        }
        self.predicate.validate()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub nonce: u64,
    pub metric: f64,
}

/// Normalizes the source's conflicting sum/mean/median summary definitions
/// to `{min, max, sum, count}`; mean is derived at presentation time.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub evaluated: u64,
    pub hit_count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: f64,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct ScanResult {
    pub hits: Vec<Hit>,
    pub summary: Summary,
    pub timed_out: bool,
    pub cancelled: bool,
}

struct Shared {
    hit_count: AtomicU64,
    stop: AtomicBool,
    limit: u64,
    deadline: Option<Instant>,
}

impl Shared {
    fn should_stop(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.stop.store(true, Ordering::Relaxed);
                return true;
            }
        }
        if self.limit > 0 && self.hit_count.load(Ordering::Relaxed) >= self.limit {
            self.stop.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }
}

/// Splits `[start, end]` into up to `workers` contiguous, roughly-equal
/// segments, in increasing order. Always returns at least one segment.
fn partition(start: u64, end: u64, workers: usize) -> Vec<(u64, u64)> {
    let total = end - start + 1;
    let workers = workers.max(1) as u64;
    let chunk = (total / workers).max(1);
    let mut segments = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let seg_end = (cursor + chunk - 1).min(end);
        segments.push((cursor, seg_end));
        cursor = seg_end + 1;
    }
    segments
}

/// Scans `request.nonce_start..=request.nonce_end`, calling `game.evaluate`
/// once per nonce and keeping every nonce whose metric matches the
/// predicate. `cancel` is polled alongside the request's own timeout and
/// hit limit; any caller (HTTP handler, binding) can flip it to abort an
/// in-flight run.
pub fn scan(
    request: &ScanRequest,
    registry: &Registry,
    cancel: Arc<AtomicBool>,
) -> Result<ScanResult> {
    request.validate()?;
    let game = registry.get(request.game)?;
    let floats_needed = game.floats_needed(&request.params)?;

    let workers = num_workers();
    let segments = partition(request.nonce_start, request.nonce_end, workers);

    let shared = Shared {
        hit_count: AtomicU64::new(0),
        stop: AtomicBool::new(false),
        limit: request.limit,
        deadline: (request.timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(request.timeout_ms)),
    };

    let per_segment: Vec<SegmentResult> = {
        use rayon::prelude::*;
        segments
            .into_par_iter()
            .map(|(seg_start, seg_end)| {
                scan_segment(
                    seg_start,
                    seg_end,
                    game,
                    &request.seeds,
                    &request.params,
                    &request.predicate,
                    floats_needed,
                    &shared,
                    &cancel,
                )
            })
            .collect()
    };

    let mut hits = Vec::new();
    let mut evaluated = 0u64;
    for seg in per_segment {
        evaluated += seg.evaluated;
        hits.extend(seg.hits);
    }

    // Truncate before computing the summary so min/max/sum/count describe
    // exactly the hits actually returned, matching the run store's
    // (summaryMin, summaryMax, summarySum, summaryCount) contract.
    if request.limit > 0 && hits.len() as u64 > request.limit {
        hits.truncate(request.limit as usize);
    }

    let cancelled = cancel.load(Ordering::Relaxed);
    let timed_out = !cancelled
        && shared
            .deadline
            .is_some_and(|d| Instant::now() >= d && shared.stop.load(Ordering::Relaxed));

    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    let mut sum = 0.0f64;
    for h in &hits {
        min = Some(min.map_or(h.metric, |m| m.min(h.metric)));
        max = Some(max.map_or(h.metric, |m| m.max(h.metric)));
        sum += h.metric;
    }

    Ok(ScanResult {
        summary: Summary {
            evaluated,
            hit_count: hits.len() as u64,
            min,
            max,
            sum,
            count: hits.len() as u64,
        },
        hits,
        timed_out,
        cancelled,
    })
}

struct SegmentResult {
    hits: Vec<Hit>,
    evaluated: u64,
}

#[allow(clippy::too_many_arguments)]
fn scan_segment(
    seg_start: u64,
    seg_end: u64,
    game: &dyn Game,
    seeds: &Seeds,
    params: &Value,
    predicate: &Predicate,
    floats_needed: usize,
    shared: &Shared,
    cancel: &AtomicBool,
) -> SegmentResult {
    let mut floats = vec![0.0; floats_needed.max(8)];
    let mut hits = Vec::new();
    let mut evaluated = 0u64;

    let mut nonce = seg_start;
    while nonce <= seg_end {
        if evaluated % POLL_INTERVAL == 0
            && (cancel.load(Ordering::Relaxed) || shared.should_stop())
        {
            break;
        }

        if let Err(e) = crate::floatstream::fill_buf(seeds.server, seeds.client, nonce, 0, &mut floats) {
            log::error!(
                "float stream error at nonce {nonce} (server_seed_hash={}): {e}",
                crate::hash_server_seed(seeds.server)
            );
            evaluated += 1;
            nonce += 1;
            continue;
        }

        match game.evaluate(&floats[..floats_needed], params, false) {
            Ok(result) => {
                if predicate.matches(result.metric) {
                    hits.push(Hit {
                        nonce,
                        metric: result.metric,
                    });
                    shared.hit_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                log::error!(
                    "evaluator error at nonce {nonce} (server_seed_hash={}): {e}",
                    crate::hash_server_seed(seeds.server)
                );
            }
        }
        evaluated += 1;
        nonce += 1;
    }

    SegmentResult { hits, evaluated }
}

fn num_workers() -> usize {
    num_cpus::get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameId;
    use crate::predicate::Op;

    fn seeds() -> (&'static [u8], &'static str) {
        (b"server-seed-123", "client-seed-abc")
    }

    #[test]
    fn partition_covers_the_whole_range_without_gaps() {
        let segments = partition(1, 100, 4);
        assert_eq!(segments.first().unwrap().0, 1);
        assert_eq!(segments.last().unwrap().1, 100);
        for w in segments.windows(2) {
            assert_eq!(w[0].1 + 1, w[1].0);
        }
    }

    #[test]
    fn partition_handles_ranges_smaller_than_worker_count() {
        let segments = partition(1, 3, 16);
        let total: u64 = segments.iter().map(|(s, e)| e - s + 1).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn scan_finds_deterministic_hits_and_preserves_nonce_order() {
        let (server, client) = seeds();
        let registry = Registry::default();
        let request = ScanRequest {
            game: GameId::Dice,
            seeds: Seeds {
                server,
                client,
            },
            nonce_start: 1,
            nonce_end: 5000,
            params: serde_json::json!({}),
            predicate: Predicate {
                op: Op::Lt,
                val: 2.0,
                val2: None,
                tolerance: None,
            },
            limit: 0,
            timeout_ms: 0,
        };
        let result = scan(&request, &registry, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(result.summary.evaluated, 5000);
        assert!(result.hits.windows(2).all(|w| w[0].nonce < w[1].nonce));
        assert!(!result.timed_out);
        assert!(!result.cancelled);
    }

    #[test]
    fn scan_truncates_to_limit_in_nonce_order() {
        let (server, client) = seeds();
        let registry = Registry::default();
        let request = ScanRequest {
            game: GameId::Dice,
            seeds: Seeds { server, client },
            nonce_start: 1,
            nonce_end: 50_000,
            params: serde_json::json!({}),
            predicate: Predicate {
                op: Op::Lt,
                val: 50.0,
                val2: None,
                tolerance: None,
            },
            limit: 3,
            timeout_ms: 0,
        };
        let result = scan(&request, &registry, Arc::new(AtomicBool::new(false))).unwrap();
        assert!(result.hits.len() <= 3);
        assert!(result.hits.windows(2).all(|w| w[0].nonce < w[1].nonce));
    }

    #[test]
    fn scan_rejects_oversized_ranges() {
        let (server, client) = seeds();
        let request = ScanRequest {
            game: GameId::Dice,
            seeds: Seeds { server, client },
            nonce_start: 1,
            nonce_end: MAX_RANGE + 10,
            params: serde_json::json!({}),
            predicate: Predicate {
                op: Op::Gt,
                val: 0.0,
                val2: None,
                tolerance: None,
            },
            limit: 0,
            timeout_ms: 0,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn scan_honors_pre_set_cancellation() {
        let (server, client) = seeds();
        let registry = Registry::default();
        let request = ScanRequest {
            game: GameId::Dice,
            seeds: Seeds { server, client },
            nonce_start: 1,
            nonce_end: 1_000_000,
            params: serde_json::json!({}),
            predicate: Predicate {
                op: Op::Ge,
                val: 0.0,
                val2: None,
                tolerance: None,
            },
            limit: 0,
            timeout_ms: 0,
        };
        let cancel = Arc::new(AtomicBool::new(true));
        let result = scan(&request, &registry, cancel).unwrap();
        assert!(result.cancelled);
        assert!(result.summary.evaluated < 1_000_000);
    }
}
