//! Timing harness.
//!
//! [`measure`] runs a closure under a [`LoopPolicy`] and returns the reported
//! duration together with the value of the last invocation. The closure owns
//! the inner/outer distinction: a fit closure builds a fresh estimator on each
//! call, a predict closure reuses the fitted model it borrows.

use crate::params::{TimeMethod, TimingParams};
use crate::report::Stage;
use std::time::{Duration, Instant};

/// Repetition policy of one measured stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopPolicy {
    /// Up to `measurements` single calls, averaged inside the 1.5 IQR fences.
    BoxFilter {
        measurements: usize,
        time_limit: Duration,
    },
    /// One untimed warm-up batch, then up to `outer` batches of `inner` calls.
    /// Reports the smallest per-call batch mean.
    MeanMin {
        inner: usize,
        outer: usize,
        goal_outer: usize,
        time_limit: Duration,
    },
    /// Up to `measurements` single calls; reports the median.
    Median {
        measurements: usize,
        time_limit: Duration,
    },
}

impl LoopPolicy {
    /// Policy for `stage`, applying the stage's loop overrides.
    pub fn for_stage(params: &TimingParams, stage: Stage) -> Self {
        let overrides = match stage {
            Stage::Training => params.fit,
            Stage::Prediction => params.predict,
        };
        let time_limit =
            Duration::try_from_secs_f64(params.time_limit_secs).unwrap_or(Duration::MAX);
        match params.method {
            TimeMethod::BoxFilter => Self::BoxFilter {
                measurements: overrides.outer_loops.unwrap_or(params.box_filter_measurements),
                time_limit,
            },
            TimeMethod::MeanMin => Self::MeanMin {
                inner: overrides.inner_loops.unwrap_or(params.inner_loops),
                outer: overrides.outer_loops.unwrap_or(params.outer_loops),
                goal_outer: params.goal_outer_loops,
                time_limit,
            },
            TimeMethod::Median => Self::Median {
                measurements: overrides.outer_loops.unwrap_or(params.box_filter_measurements),
                time_limit,
            },
        }
    }

    /// A single timed call with no warm-up.
    pub fn once() -> Self {
        Self::BoxFilter {
            measurements: 1,
            time_limit: Duration::MAX,
        }
    }
}

/// Outcome of a measured closure.
#[derive(Debug, Clone)]
pub struct TimingResult<T> {
    /// The statistic the policy reports.
    pub elapsed: Duration,
    /// Per-call durations that fed the statistic.
    pub samples: Vec<Duration>,
    /// Value returned by the last invocation.
    pub value: T,
}

impl<T> TimingResult<T> {
    pub fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Run `f` under `policy`. The first error returned by `f` aborts the
/// measurement and is propagated unchanged.
pub fn measure<T, E, F>(policy: &LoopPolicy, mut f: F) -> Result<TimingResult<T>, E>
where
    F: FnMut() -> Result<T, E>,
{
    match *policy {
        LoopPolicy::BoxFilter {
            measurements,
            time_limit,
        } => {
            let (samples, value) = sample_calls(&mut f, measurements, time_limit)?;
            Ok(TimingResult {
                elapsed: box_filter(&samples),
                samples,
                value,
            })
        }
        LoopPolicy::Median {
            measurements,
            time_limit,
        } => {
            let (samples, value) = sample_calls(&mut f, measurements, time_limit)?;
            Ok(TimingResult {
                elapsed: median(&samples),
                samples,
                value,
            })
        }
        LoopPolicy::MeanMin {
            inner,
            outer,
            goal_outer,
            time_limit,
        } => mean_min(&mut f, inner, outer, goal_outer, time_limit),
    }
}

fn timed<T, E>(f: &mut impl FnMut() -> Result<T, E>) -> Result<(Duration, T), E> {
    let start = Instant::now();
    let value = f()?;
    Ok((start.elapsed(), value))
}

fn sample_calls<T, E>(
    f: &mut impl FnMut() -> Result<T, E>,
    measurements: usize,
    time_limit: Duration,
) -> Result<(Vec<Duration>, T), E> {
    let (first, mut value) = timed(f)?;
    let mut samples = vec![first];
    let mut total = first;
    while samples.len() < measurements && total <= time_limit {
        let (t, v) = timed(f)?;
        samples.push(t);
        total += t;
        value = v;
    }
    tracing::trace!(calls = samples.len(), total_secs = total.as_secs_f64(), "Sampled calls");
    Ok((samples, value))
}

/// Time `inner` back-to-back calls and return the batch total with the
/// per-call mean.
fn run_batch<T, E>(
    f: &mut impl FnMut() -> Result<T, E>,
    inner: usize,
) -> Result<(Duration, Duration, T), E> {
    let start = Instant::now();
    let mut value = f()?;
    for _ in 1..inner {
        value = f()?;
    }
    let total = start.elapsed();
    Ok((total, per_call(total, inner), value))
}

fn per_call(total: Duration, calls: usize) -> Duration {
    match u32::try_from(calls) {
        Ok(n) => total / n.max(1),
        Err(_) => total.div_f64(calls as f64),
    }
}

fn mean_min<T, E>(
    f: &mut impl FnMut() -> Result<T, E>,
    inner: usize,
    outer: usize,
    goal_outer: usize,
    time_limit: Duration,
) -> Result<TimingResult<T>, E> {
    let inner = inner.max(1);

    // warm-up
    run_batch(f, inner)?;

    let mut samples = Vec::with_capacity(outer.max(1));
    let (mut total, t, mut value) = run_batch(f, inner)?;
    samples.push(t);
    while samples.len() < outer {
        if samples.len() >= goal_outer && total > time_limit {
            break;
        }
        let (batch, t, v) = run_batch(f, inner)?;
        samples.push(t);
        total += batch;
        value = v;
    }

    let elapsed = samples.iter().copied().min().unwrap_or_default();
    Ok(TimingResult {
        elapsed,
        samples,
        value,
    })
}

/// Mean of the samples strictly inside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`, with
/// quartiles taken at 25% and 75% of the sorted samples. When nothing falls
/// strictly inside the fences (all samples equal), Q1 is returned.
pub fn box_filter(samples: &[Duration]) -> Duration {
    let mut sorted = samples.to_vec();
    sorted.sort();
    let n = sorted.len();
    if n < 2 {
        return sorted.first().copied().unwrap_or_default();
    }
    let q1 = sorted[n / 4];
    let q3 = sorted[(n * 3) / 4];
    let iqr = (q3 - q1).as_secs_f64();
    let lower = q1.as_secs_f64() - 1.5 * iqr;
    let upper = q3.as_secs_f64() + 1.5 * iqr;
    let kept: Vec<Duration> = sorted
        .into_iter()
        .filter(|t| lower < t.as_secs_f64() && t.as_secs_f64() < upper)
        .collect();
    if kept.is_empty() {
        return q1;
    }
    kept.iter().sum::<Duration>() / kept.len() as u32
}

pub fn median(samples: &[Duration]) -> Duration {
    let mut sorted = samples.to_vec();
    sorted.sort();
    match sorted.len() {
        0 => Duration::ZERO,
        n if n % 2 == 1 => sorted[n / 2],
        n => (sorted[n / 2 - 1] + sorted[n / 2]) / 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StageLoops;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_per_call_splits_batch_total() {
        assert_eq!(per_call(ms(30), 3), ms(10));
        assert_eq!(per_call(ms(30), 0), ms(30));
        #[cfg(target_pointer_width = "64")]
        {
            let calls = u32::MAX as usize + 1;
            let total = Duration::from_secs(1 << 32);
            assert_eq!(per_call(total, calls), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_box_filter_drops_outlier() {
        let samples = vec![ms(10), ms(11), ms(10), ms(12), ms(11), ms(10), ms(11), ms(500)];
        let t = box_filter(&samples);
        assert!(t < ms(13), "outlier leaked into {t:?}");
        assert!(t >= ms(10));
    }

    #[test]
    fn test_box_filter_equal_samples() {
        assert_eq!(box_filter(&[ms(5), ms(5), ms(5)]), ms(5));
        assert_eq!(box_filter(&[ms(7)]), ms(7));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[ms(3), ms(1), ms(2)]), ms(2));
        assert_eq!(median(&[ms(4), ms(1), ms(2), ms(3)]), Duration::from_micros(2500));
    }

    #[test]
    fn test_call_counts_respect_policy() {
        let mut calls = 0;
        let policy = LoopPolicy::BoxFilter {
            measurements: 5,
            time_limit: Duration::from_secs(60),
        };
        let result = measure(&policy, || -> Result<usize, ()> {
            calls += 1;
            Ok(calls)
        })
        .unwrap();
        assert_eq!(calls, 5);
        assert_eq!(result.samples.len(), 5);
        assert_eq!(result.value, 5);
    }

    #[test]
    fn test_mean_min_runs_warm_up_and_batches() {
        let mut calls = 0;
        let policy = LoopPolicy::MeanMin {
            inner: 3,
            outer: 4,
            goal_outer: 2,
            time_limit: Duration::from_secs(60),
        };
        let result = measure(&policy, || -> Result<(), ()> {
            calls += 1;
            Ok(())
        })
        .unwrap();
        // one warm-up batch plus four timed batches
        assert_eq!(calls, 15);
        assert_eq!(result.samples.len(), 4);
        assert_eq!(result.elapsed, *result.samples.iter().min().unwrap());
    }

    #[test]
    fn test_once_calls_exactly_once() {
        let mut calls = 0;
        measure(&LoopPolicy::once(), || -> Result<(), ()> {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_time_limit_stops_sampling() {
        let policy = LoopPolicy::Median {
            measurements: 1000,
            time_limit: Duration::from_millis(5),
        };
        let result = measure(&policy, || -> Result<(), ()> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(())
        })
        .unwrap();
        assert!(result.samples.len() < 10);
    }

    #[test]
    fn test_error_propagates() {
        let mut calls = 0;
        let policy = LoopPolicy::BoxFilter {
            measurements: 10,
            time_limit: Duration::from_secs(60),
        };
        let err = measure(&policy, || {
            calls += 1;
            if calls == 3 { Err("boom") } else { Ok(()) }
        })
        .unwrap_err();
        assert_eq!(err, "boom");
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_stage_overrides() {
        let params = TimingParams {
            method: TimeMethod::MeanMin,
            inner_loops: 10,
            outer_loops: 20,
            predict: StageLoops {
                inner_loops: Some(2),
                outer_loops: None,
            },
            ..TimingParams::default()
        };
        match LoopPolicy::for_stage(&params, Stage::Prediction) {
            LoopPolicy::MeanMin { inner, outer, .. } => assert_eq!((inner, outer), (2, 20)),
            other => panic!("unexpected policy {other:?}"),
        }
        match LoopPolicy::for_stage(&params, Stage::Training) {
            LoopPolicy::MeanMin { inner, outer, .. } => assert_eq!((inner, outer), (10, 20)),
            other => panic!("unexpected policy {other:?}"),
        }
    }
}
