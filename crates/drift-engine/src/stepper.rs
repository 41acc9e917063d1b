//! The timestep loop driving every particle through its state machine.
//!
//! One outer timestep:
//!
//! 1. honour a pending [`StopHandle`] request,
//! 2. clip the target to the run end and the next output time,
//! 3. advance field windows (blocking reload),
//! 4. evaluate every particle behind the target, in parallel when enabled,
//! 5. remove deleted particles and write output if due.
//!
//! Each particle is evaluated on a working copy of its record. The copy is
//! committed only when an invocation succeeds, so an erroring particle
//! never advances for the failing step.

use std::sync::Arc;
use std::time::Instant;

use drift_core::{ErrorKind, Outcome, ParticleId, ParticleRecord, ParticleState, VariableSchema};
use drift_field::FieldSet;
use drift_kernel::{BoundKernel, Kernel, KernelCache, PrintSink, Scratch, TracingPrint};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ExecuteConfig;
use crate::error::ExecuteError;
use crate::metrics::RunSummary;
use crate::output::{frame, written_variables, OutputSink};
use crate::particleset::ParticleSet;
use crate::recovery::RecoveryMap;
use crate::stop::StopHandle;

// ── Stepper ────────────────────────────────────────────────────────

/// Runs kernels over a [`ParticleSet`].
///
/// The stepper borrows the [`KernelCache`] so artifacts outlive a single
/// run and are shared between stepper instances.
pub struct Stepper<'c> {
    cache: &'c KernelCache,
    recovery: RecoveryMap,
    print: Arc<dyn PrintSink>,
    stop: StopHandle,
}

impl<'c> Stepper<'c> {
    /// A stepper with no recovery handlers, printing through `tracing`.
    pub fn new(cache: &'c KernelCache) -> Self {
        Self {
            cache,
            recovery: RecoveryMap::default(),
            print: Arc::new(TracingPrint),
            stop: StopHandle::new(),
        }
    }

    /// Use these recovery handlers.
    pub fn with_recovery(mut self, recovery: RecoveryMap) -> Self {
        self.recovery = recovery;
        self
    }

    /// Send kernel `print` output here.
    pub fn with_print(mut self, print: Arc<dyn PrintSink>) -> Self {
        self.print = print;
        self
    }

    /// Share an existing stop flag.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// A handle that stops the run at the next timestep boundary.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The registered recovery handlers.
    pub fn recovery(&self) -> &RecoveryMap {
        &self.recovery
    }

    /// Advance `set` under `kernel` as configured by `config`.
    ///
    /// The run starts at the earliest particle time (latest when running
    /// backward); particles released later wait until the clock reaches
    /// them. Every particle's `dt` is reset to `config.dt` and leftover
    /// states from an earlier run return to `Evaluate`.
    ///
    /// Kernels are translated against the set's schema, built through the
    /// cache and bound to `fieldset` before the first timestep; any
    /// failure there leaves `set` untouched.
    pub fn execute(
        &self,
        set: &mut ParticleSet,
        fieldset: &FieldSet,
        kernel: &Kernel,
        config: &ExecuteConfig,
        output: Option<&mut dyn OutputSink>,
    ) -> Result<RunSummary, ExecuteError> {
        let started = Instant::now();
        let dir = config.direction();
        let start = start_time(set, dir).or(config.endtime).unwrap_or(0.0);
        let end = config.validate(start)?;

        let schema = set.schema().clone();
        let main = self.bind(kernel, &schema, fieldset)?;
        let mut handlers = IndexMap::with_capacity(self.recovery.len());
        for (kind, handler) in self.recovery.iter() {
            handlers.insert(kind, self.bind(handler, &schema, fieldset)?);
        }

        let mut summary = RunSummary {
            final_time: start,
            ..RunSummary::default()
        };
        summary.deleted += set.remove_deleted() as u64;
        for i in 0..set.len() {
            set.set_state(i, ParticleState::Evaluate);
            set.set_dt(i, config.dt);
        }

        let mut writer = Writer::new(output, config.output_dt, start, dir);
        if writer.begin(&schema, set, start)? {
            summary.outputs += 1;
        }

        info!(
            particles = set.len(),
            start,
            end,
            dt = config.dt,
            parallel = config.parallel,
            recovery = handlers.len(),
            "execution started"
        );

        let mut t = start;
        while (end - t) * dir > 0.0 {
            if self.stop.take() {
                summary.interrupted = true;
                info!(time = t, "stop requested");
                break;
            }

            let mut target = t + config.dt;
            if (target - end) * dir > 0.0 {
                target = end;
            }
            if let Some(next) = writer.next() {
                if (target - next) * dir > 0.0 {
                    target = next;
                }
            }

            summary.snapshots_loaded += fieldset.advance_window(t, target)? as u64;

            let ctx = StepContext {
                kernel: &main,
                recovery: &handlers,
                print: &*self.print,
                seed: config.seed,
                target,
                dir,
                min_dt: config.min_dt,
                max_attempts: config.max_recovery_attempts,
            };
            let report = step(set, &ctx, config.parallel);
            summary.invocations += report.invocations;
            summary.recoveries += report.recoveries;
            summary.timesteps += 1;
            t = target;

            let deleted = set.remove_deleted();
            summary.deleted += deleted as u64;
            if writer.due(t) {
                writer.write(set, t)?;
                summary.outputs += 1;
            }
            debug!(
                time = t,
                particles = set.len(),
                invocations = report.invocations,
                recoveries = report.recoveries,
                deleted,
                "timestep complete"
            );

            if let Some((particle, cause)) = report.stopped {
                writer.flush()?;
                summary.final_time = t;
                summary.elapsed_us = elapsed_us(started);
                warn!(
                    time = t,
                    particle = %particle,
                    cause = ?cause,
                    "particle escalated to StopExecution, stopping run"
                );
                return Err(ExecuteError::Stopped {
                    time: t,
                    particle,
                    cause,
                    summary: Box::new(summary),
                });
            }
        }

        writer.flush()?;
        summary.final_time = t;
        summary.elapsed_us = elapsed_us(started);
        info!(
            time = t,
            particles = set.len(),
            timesteps = summary.timesteps,
            invocations = summary.invocations,
            interrupted = summary.interrupted,
            elapsed_us = summary.elapsed_us,
            "execution finished"
        );
        Ok(summary)
    }

    fn bind<'fs>(
        &self,
        kernel: &Kernel,
        schema: &VariableSchema,
        fieldset: &'fs FieldSet,
    ) -> Result<BoundKernel<'fs>, ExecuteError> {
        let translated = kernel.translate(schema)?;
        let compiled = self.cache.get_or_build(&translated)?;
        Ok(BoundKernel::bind(compiled, fieldset)?)
    }
}

/// Earliest live particle time in the direction of the run.
fn start_time(set: &ParticleSet, dir: f64) -> Option<f64> {
    set.time()
        .iter()
        .zip(set.state())
        .filter(|(_, &s)| s != ParticleState::Delete)
        .map(|(&t, _)| t)
        .reduce(|a, b| if (b - a) * dir < 0.0 { b } else { a })
}

fn elapsed_us(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

// ── Per-particle evaluation ────────────────────────────────────────

struct StepContext<'a, 'fs> {
    kernel: &'a BoundKernel<'fs>,
    recovery: &'a IndexMap<ErrorKind, BoundKernel<'fs>>,
    print: &'a dyn PrintSink,
    seed: u64,
    target: f64,
    dir: f64,
    min_dt: f64,
    max_attempts: u32,
}

/// What one particle did during one timestep.
#[derive(Clone, Copy, Debug, Default)]
struct ParticleReport {
    invocations: u64,
    recoveries: u64,
    stopped: Option<Option<ErrorKind>>,
}

/// Aggregate over all particles of one timestep.
#[derive(Debug, Default)]
struct StepReport {
    invocations: u64,
    recoveries: u64,
    /// Lowest-id particle that escalated, with its unrecovered error.
    stopped: Option<(ParticleId, Option<ErrorKind>)>,
}

fn step(set: &mut ParticleSet, ctx: &StepContext<'_, '_>, parallel: bool) -> StepReport {
    let mut work: Vec<(usize, ParticleRecord)> = (0..set.len())
        .filter(|&i| {
            matches!(
                set.state()[i],
                ParticleState::Evaluate | ParticleState::Success
            ) && (ctx.target - set.time()[i]) * ctx.dir > 0.0
        })
        .map(|i| (i, set.record(i)))
        .collect();

    let reports: Vec<ParticleReport> = if parallel {
        work.par_iter_mut()
            .map_init(Scratch::new, |scratch, (_, rec)| evaluate(ctx, rec, scratch))
            .collect()
    } else {
        let mut scratch = Scratch::new();
        work.iter_mut()
            .map(|(_, rec)| evaluate(ctx, rec, &mut scratch))
            .collect()
    };

    let mut out = StepReport::default();
    for ((i, rec), report) in work.iter().zip(&reports) {
        set.store(*i, rec);
        out.invocations += report.invocations;
        out.recoveries += report.recoveries;
        if let (None, Some(cause)) = (out.stopped, report.stopped) {
            out.stopped = Some((rec.id, cause));
        }
    }
    out
}

/// Step one particle until it reaches the target or leaves `Evaluate`.
fn evaluate(
    ctx: &StepContext<'_, '_>,
    rec: &mut ParticleRecord,
    scratch: &mut Scratch,
) -> ParticleReport {
    let mut report = ParticleReport::default();
    let mut attempts = 0u32;
    rec.state = ParticleState::Evaluate;

    while rec.state == ParticleState::Evaluate && (ctx.target - rec.time) * ctx.dir > 0.0 {
        let planned = rec.dt;
        let clipped = (rec.time + planned - ctx.target) * ctx.dir > 0.0;
        let step = if clipped { ctx.target - rec.time } else { planned };

        let mut trial = rec.clone();
        trial.dt = step;
        report.invocations += 1;
        match ctx.kernel.run(&mut trial, ctx.seed, ctx.print, scratch) {
            Outcome::Success => {
                trial.time = if clipped { ctx.target } else { rec.time + step };
                trial.dt = if trial.dt == step {
                    planned
                } else {
                    clamp_dt(trial.dt, ctx)
                };
                trial.state = ParticleState::Evaluate;
                *rec = trial;
            }
            Outcome::Delete => rec.state = ParticleState::Delete,
            Outcome::StopExecution => {
                rec.state = ParticleState::StopExecution;
                report.stopped = Some(None);
            }
            Outcome::Error(kind) => {
                rec.state = kind.state();
                recover(ctx, rec, kind, step, planned, &mut attempts, &mut report, scratch);
            }
        }
    }

    if rec.state == ParticleState::Evaluate {
        rec.state = ParticleState::Success;
    }
    report
}

/// Route a particle in an `Error*` state through its recovery kernel.
#[allow(clippy::too_many_arguments)]
fn recover(
    ctx: &StepContext<'_, '_>,
    rec: &mut ParticleRecord,
    kind: ErrorKind,
    step: f64,
    planned: f64,
    attempts: &mut u32,
    report: &mut ParticleReport,
    scratch: &mut Scratch,
) {
    let Some(handler) = ctx.recovery.get(&kind) else {
        rec.state = ParticleState::StopExecution;
        report.stopped = Some(Some(kind));
        return;
    };
    if *attempts >= ctx.max_attempts {
        warn!(
            particle = %rec.id,
            time = rec.time,
            error = %kind,
            attempts = *attempts,
            "recovery budget exhausted"
        );
        rec.state = ParticleState::StopExecution;
        report.stopped = Some(Some(kind));
        return;
    }
    *attempts += 1;
    report.recoveries += 1;
    warn!(
        particle = %rec.id,
        time = rec.time,
        error = %kind,
        attempt = *attempts,
        "running recovery kernel"
    );

    let mut trial = rec.clone();
    trial.dt = step;
    match handler.run(&mut trial, ctx.seed, ctx.print, scratch) {
        Outcome::Success => {
            trial.dt = if trial.dt == step {
                planned
            } else {
                clamp_dt(trial.dt, ctx)
            };
            trial.state = ParticleState::Evaluate;
            *rec = trial;
        }
        Outcome::Delete => rec.state = ParticleState::Delete,
        Outcome::Error(_) | Outcome::StopExecution => {
            rec.state = ParticleState::StopExecution;
            report.stopped = Some(Some(kind));
        }
    }
}

/// A kernel-chosen dt keeps the run direction and never drops below
/// `min_dt` in magnitude.
fn clamp_dt(dt: f64, ctx: &StepContext<'_, '_>) -> f64 {
    if dt.is_finite() && dt * ctx.dir >= ctx.min_dt {
        dt
    } else {
        ctx.min_dt * ctx.dir
    }
}

// ── Output scheduling ──────────────────────────────────────────────

struct Writer<'o> {
    sink: Option<&'o mut dyn OutputSink>,
    every: Option<f64>,
    start: f64,
    dir: f64,
    written: u64,
}

impl<'o> Writer<'o> {
    fn new(sink: Option<&'o mut dyn OutputSink>, every: Option<f64>, start: f64, dir: f64) -> Self {
        Self {
            sink,
            every,
            start,
            dir,
            written: 0,
        }
    }

    /// Announce the variables and write the start frame.
    fn begin(
        &mut self,
        schema: &VariableSchema,
        set: &ParticleSet,
        t: f64,
    ) -> Result<bool, ExecuteError> {
        let Some(sink) = self.sink.as_deref_mut() else {
            return Ok(false);
        };
        sink.start(&written_variables(schema))?;
        sink.append(t, &frame(set, t, self.dir))?;
        self.written = 1;
        Ok(true)
    }

    /// Next output time. Multiples of the interval are taken from the
    /// start so they do not accumulate rounding.
    fn next(&self) -> Option<f64> {
        self.sink.as_ref()?;
        self.every
            .map(|every| self.start + self.written as f64 * every * self.dir)
    }

    fn due(&self, t: f64) -> bool {
        self.next() == Some(t)
    }

    fn write(&mut self, set: &ParticleSet, t: f64) -> Result<(), ExecuteError> {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.append(t, &frame(set, t, self.dir))?;
            self.written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExecuteError> {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::{VarType, Variable};

    fn ctx_for<'a, 'fs>(
        kernel: &'a BoundKernel<'fs>,
        recovery: &'a IndexMap<ErrorKind, BoundKernel<'fs>>,
        target: f64,
    ) -> StepContext<'a, 'fs> {
        StepContext {
            kernel,
            recovery,
            print: &TracingPrint,
            seed: 0,
            target,
            dir: 1.0,
            min_dt: 0.1,
            max_attempts: 3,
        }
    }

    fn bound<'fs>(src: &str, schema: &VariableSchema, fs: &'fs FieldSet) -> BoundKernel<'fs> {
        let cache = KernelCache::default();
        let translated = Kernel::new(src).translate(schema).unwrap();
        BoundKernel::bind(cache.get_or_build(&translated).unwrap(), fs).unwrap()
    }

    fn empty_fieldset() -> FieldSet {
        FieldSet::builder().build()
    }

    fn schema() -> VariableSchema {
        VariableSchema::builder()
            .variable(Variable::new("n", VarType::I32))
            .build()
            .unwrap()
    }

    fn record(schema: &VariableSchema, time: f64, dt: f64) -> ParticleRecord {
        let mut rec = ParticleRecord::new(ParticleId(0), 0.0, 0.0, 0.0, time, schema);
        rec.dt = dt;
        rec
    }

    #[test]
    fn substeps_until_the_target_and_restores_a_clipped_dt() {
        let s = schema();
        let fs = empty_fieldset();
        let k = bound("fn k(p, fs, t) { p.n += 1; p.lon += p.dt; }", &s, &fs);
        let none = IndexMap::new();
        let mut rec = record(&s, 0.0, 0.4);
        let report = evaluate(&ctx_for(&k, &none, 1.0), &mut rec, &mut Scratch::new());
        // 0.4 + 0.4 + clipped 0.2.
        assert_eq!(report.invocations, 3);
        assert_eq!(rec.time, 1.0);
        assert_eq!(rec.dt, 0.4);
        assert!((rec.lon - 1.0).abs() < 1e-12);
        assert_eq!(rec.vars[0], 3.0);
        assert_eq!(rec.state, ParticleState::Success);
    }

    #[test]
    fn a_kernel_chosen_dt_is_kept() {
        let s = schema();
        let fs = empty_fieldset();
        let k = bound("fn k(p, fs, t) { p.dt = 0.5; }", &s, &fs);
        let none = IndexMap::new();
        let mut rec = record(&s, 0.0, 1.0);
        let report = evaluate(&ctx_for(&k, &none, 2.0), &mut rec, &mut Scratch::new());
        // The first step advances by the dt it started with.
        assert_eq!(rec.time, 2.0);
        assert_eq!(report.invocations, 3);
        assert_eq!(rec.dt, 0.5);
    }

    #[test]
    fn errors_without_a_handler_stop_and_do_not_advance() {
        let s = schema();
        let fs = empty_fieldset();
        let k = bound("fn k(p, fs, t) { p.lon = 5; return Error; }", &s, &fs);
        let none = IndexMap::new();
        let mut rec = record(&s, 0.0, 1.0);
        let report = evaluate(&ctx_for(&k, &none, 1.0), &mut rec, &mut Scratch::new());
        assert_eq!(report.stopped, Some(Some(ErrorKind::Custom)));
        assert_eq!(rec.state, ParticleState::StopExecution);
        assert_eq!((rec.lon, rec.time), (0.0, 0.0));
    }

    #[test]
    fn recovery_shrinks_dt_down_to_the_floor_then_gives_up() {
        let s = schema();
        let fs = empty_fieldset();
        let k = bound("fn k(p, fs, t) { if p.dt > 0.3 { return Error; } }", &s, &fs);
        let halve = bound("fn halve(p, fs, t) { p.dt /= 2; p.n += 1; }", &s, &fs);
        let mut handlers = IndexMap::new();
        handlers.insert(ErrorKind::Custom, halve);

        let mut rec = record(&s, 0.0, 1.0);
        let report = evaluate(&ctx_for(&k, &handlers, 1.0), &mut rec, &mut Scratch::new());
        // 1.0 -> 0.5 -> 0.25, then four steps of 0.25.
        assert_eq!(report.recoveries, 2);
        assert_eq!(rec.vars[0], 2.0);
        assert_eq!(rec.dt, 0.25);
        assert_eq!(rec.time, 1.0);
        assert_eq!(rec.state, ParticleState::Success);

        let always = bound("fn k(p, fs, t) { return Error; }", &s, &fs);
        let mut rec = record(&s, 0.0, 1.0);
        let report = evaluate(&ctx_for(&always, &handlers, 1.0), &mut rec, &mut Scratch::new());
        assert_eq!(report.recoveries, 3);
        assert_eq!(rec.dt, 0.125);
        assert_eq!(rec.state, ParticleState::StopExecution);
    }

    #[test]
    fn clamp_keeps_direction_and_floor() {
        let s = schema();
        let fs = empty_fieldset();
        let k = bound("fn k(p, fs, t) { }", &s, &fs);
        let none = IndexMap::new();
        let ctx = ctx_for(&k, &none, 1.0);
        assert_eq!(clamp_dt(0.5, &ctx), 0.5);
        assert_eq!(clamp_dt(0.01, &ctx), 0.1);
        assert_eq!(clamp_dt(-0.5, &ctx), 0.1);
        assert_eq!(clamp_dt(f64::NAN, &ctx), 0.1);
    }
}
