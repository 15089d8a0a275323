//! Scan-cycle scheduler: the exclusive owner and caller of one POU instance.
//!
//! Per cycle:
//!   1. io.read_inputs
//!   2. reset VAR_TEMP, keep a shadow copy of the record
//!   3. body(cx); on fault restore the shadow and halt
//!   4. io.write_outputs
//!   5. watchdog check, periodic retain persistence
//!
//! A halted scheduler refuses to scan until `start` is called again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use pou_kernel::retain::{warm_init, RetainImage};
use pou_kernel::{CycleContext, Pou, RetainError};

use crate::config::RuntimeConfig;
use crate::error::SchedulerError;
use crate::io::{IoBinding, NoIo};
use crate::retain_store::{MemoryRetainStore, RetainStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Power-up without retained data: every variable takes its initializer.
    Cold,
    /// Restart keeping retain variables from the store.
    Warm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    /// A cycle faulted; the instance holds the state from before that cycle.
    Halted { cycle: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub faults: u64,
    pub overruns: u64,
    pub last: Duration,
    pub max: Duration,
}

pub struct Scheduler<P: Pou, B: IoBinding = NoIo> {
    instance: Box<P>,
    config: RuntimeConfig,
    io: B,
    store: Box<dyn RetainStore>,
    state: SchedulerState,
    stats: CycleStats,
}

impl<P: Pou> Scheduler<P, NoIo> {
    /// No external I/O, in-memory retain.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_parts(config, NoIo, Box::new(MemoryRetainStore::default()))
    }
}

impl<P: Pou, B: IoBinding> Scheduler<P, B> {
    /// Allocate the instance. It stays at this address until the scheduler drops.
    pub fn with_parts(config: RuntimeConfig, io: B, store: Box<dyn RetainStore>) -> Self {
        Self {
            instance: Box::default(),
            config,
            io,
            store,
            state: SchedulerState::Stopped,
            stats: CycleStats::default(),
        }
    }

    /// Initialize the instance. Returns the mode actually used: a warm
    /// start without a usable retain image degrades to cold.
    pub fn start(&mut self, mode: StartMode) -> Result<StartMode, SchedulerError> {
        let effective = match mode {
            StartMode::Cold => {
                self.instance.init(false);
                StartMode::Cold
            }
            StartMode::Warm => self.warm_start()?,
        };

        self.stats = CycleStats::default();
        self.state = SchedulerState::Running;
        tracing::info!(pou = P::NAME, requested = ?mode, mode = ?effective, "instance initialized");
        Ok(effective)
    }

    fn warm_start(&mut self) -> Result<StartMode, SchedulerError> {
        let Some(image) = self.store.load()? else {
            tracing::info!(pou = P::NAME, "no retained data, cold start");
            self.instance.init(false);
            return Ok(StartMode::Cold);
        };

        match warm_init(&mut *self.instance, &image) {
            Ok(()) => Ok(StartMode::Warm),
            Err(err @ RetainError::LayoutMismatch { .. }) => {
                tracing::warn!(pou = P::NAME, %err, "discarding retained data from another layout");
                self.instance.init(false);
                Ok(StartMode::Cold)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run exactly one scan cycle.
    pub fn scan(&mut self) -> Result<Duration, SchedulerError> {
        match self.state {
            SchedulerState::Running => {}
            SchedulerState::Stopped => return Err(SchedulerError::NotStarted),
            SchedulerState::Halted { cycle } => return Err(SchedulerError::Halted { cycle }),
        }

        let cycle = self.stats.cycles + 1;
        self.io.read_inputs(&mut *self.instance)?;
        self.instance.reset_temps();
        let shadow = P::clone(&self.instance);

        let cx = CycleContext::new(cycle, self.config.cycle_time(), self.config.fault_policy);
        let started = Instant::now();
        let outcome = self.instance.body(&cx);
        let elapsed = started.elapsed();

        if let Err(fault) = outcome {
            *self.instance = shadow;
            self.stats.faults += 1;
            self.state = SchedulerState::Halted { cycle };
            tracing::error!(pou = P::NAME, cycle, %fault, "cycle faulted, instance rolled back and halted");
            return Err(SchedulerError::Fault { cycle, fault });
        }

        self.io.write_outputs(&*self.instance)?;

        self.stats.cycles = cycle;
        self.stats.last = elapsed;
        self.stats.max = self.stats.max.max(elapsed);
        if elapsed > self.config.watchdog() {
            self.stats.overruns += 1;
            tracing::warn!(pou = P::NAME, cycle, ?elapsed, watchdog = ?self.config.watchdog(), "watchdog overrun");
        }

        let every = self.config.retain.persist_every;
        if every > 0 && cycle % every == 0 {
            self.persist_retain()?;
        }

        Ok(elapsed)
    }

    /// Scan at the configured period until `stop` is set or `max_cycles`
    /// cycles have run. `stop` is only looked at between cycles.
    pub fn run(&mut self, max_cycles: Option<u64>, stop: &AtomicBool) -> Result<u64, SchedulerError> {
        let period = self.config.cycle_time();
        let mut ran = 0;
        while !stop.load(Ordering::Relaxed) && max_cycles.map_or(true, |max| ran < max) {
            let elapsed = self.scan()?;
            ran += 1;
            if let Some(idle) = period.checked_sub(elapsed) {
                thread::sleep(idle);
            }
        }
        Ok(ran)
    }

    /// Save the current retain variables. No-op for POUs without any.
    pub fn persist_retain(&mut self) -> Result<(), SchedulerError> {
        if !P::has_retain() {
            return Ok(());
        }
        let image = RetainImage::capture(&*self.instance);
        self.store.save(&image, self.stats.cycles)?;
        tracing::debug!(pou = P::NAME, cycle = self.stats.cycles, vars = image.vars.len(), "retain persisted");
        Ok(())
    }

    /// Persist retained data and stop. A halted instance still holds the
    /// last consistent state, so it is persisted too.
    pub fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Stopped {
            self.persist_retain()?;
        }
        self.state = SchedulerState::Stopped;
        tracing::info!(pou = P::NAME, cycles = self.stats.cycles, "scheduler stopped");
        Ok(())
    }

    pub fn instance(&self) -> &P {
        &self.instance
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn io(&self) -> &B {
        &self.io
    }

    /// Change external inputs between cycles.
    pub fn io_mut(&mut self) -> &mut B {
        &mut self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pou_kernel::programs::{Main, Ratio};
    use pou_kernel::Fault;

    use crate::io::ProcessImage;

    pou_kernel::declare_pou! {
        program Sluggish("SLUGGISH") {
            var {
                done: u32 = 0;
            }
        }
    }

    impl Pou for Sluggish {
        fn body(&mut self, cx: &CycleContext) -> Result<(), Fault> {
            thread::sleep(Duration::from_millis(5));
            self.done = cx.add(self.done, 1)?;
            Ok(())
        }
    }

    #[test]
    fn scan_requires_start() {
        let mut s: Scheduler<Main> = Scheduler::new(RuntimeConfig::default());
        assert!(matches!(s.scan(), Err(SchedulerError::NotStarted)));
        assert_eq!(s.state(), SchedulerState::Stopped);
    }

    #[test]
    fn fault_rolls_back_and_halts() {
        let mut s = Scheduler::<Ratio, ProcessImage>::with_parts(
            RuntimeConfig::default(),
            ProcessImage::new(),
            Box::new(MemoryRetainStore::default()),
        );
        s.start(StartMode::Cold).unwrap();
        s.io_mut().set_input("num", 10i16);
        s.io_mut().set_input("den", 3i16);
        s.scan().unwrap();
        assert_eq!((s.instance().quotient, s.instance().evaluations), (3, 1));

        s.io_mut().set_input("den", 0i16);
        let err = s.scan().unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Fault { cycle: 2, fault: Fault::DivisionByZero { .. } }
        ));
        assert_eq!(s.instance().evaluations, 1, "partial cycle was rolled back");
        assert_eq!(s.state(), SchedulerState::Halted { cycle: 2 });
        assert!(matches!(s.scan(), Err(SchedulerError::Halted { cycle: 2 })));

        s.io_mut().set_input("den", 5i16);
        s.start(StartMode::Cold).unwrap();
        s.scan().unwrap();
        assert_eq!(s.instance().quotient, 2);
    }

    #[test]
    fn run_stops_at_cycle_limit() {
        let config = RuntimeConfig { cycle_time_ms: 1, watchdog_ms: 1000, ..RuntimeConfig::default() };
        let mut s: Scheduler<Main> = Scheduler::new(config);
        s.start(StartMode::Cold).unwrap();
        let ran = s.run(Some(3), &AtomicBool::new(false)).unwrap();
        assert_eq!(ran, 3);
        assert!(s.instance().x);
        assert_eq!(s.stats().cycles, 3);
    }

    #[test]
    fn preset_stop_flag_runs_nothing() {
        let mut s: Scheduler<Main> = Scheduler::new(RuntimeConfig::default());
        s.start(StartMode::Cold).unwrap();
        assert_eq!(s.run(None, &AtomicBool::new(true)).unwrap(), 0);
    }

    #[test]
    fn overrun_is_counted_not_faulted() {
        let config = RuntimeConfig { cycle_time_ms: 1, watchdog_ms: 1, ..RuntimeConfig::default() };
        let mut s: Scheduler<Sluggish> = Scheduler::new(config);
        s.start(StartMode::Cold).unwrap();

        let elapsed = s.scan().unwrap();
        assert!(elapsed > Duration::from_millis(1));
        s.scan().unwrap();

        let stats = s.stats();
        assert_eq!((stats.cycles, stats.overruns, stats.faults), (2, 2, 0));
        assert!(stats.max >= stats.last);
        assert_eq!(s.state(), SchedulerState::Running);
        assert_eq!(s.instance().done, 2);
    }

    #[test]
    fn stop_flag_ends_an_unbounded_run() {
        let config = RuntimeConfig { cycle_time_ms: 1, watchdog_ms: 1000, ..RuntimeConfig::default() };
        let mut s: Scheduler<Main> = Scheduler::new(config);
        s.start(StartMode::Cold).unwrap();
        let stop = AtomicBool::new(false);

        let ran = thread::scope(|scope| {
            let handle = scope.spawn(|| s.run(None, &stop));
            thread::sleep(Duration::from_millis(20));
            stop.store(true, Ordering::Relaxed);
            handle.join().unwrap()
        })
        .unwrap();

        assert!(ran > 0);
        assert_eq!(s.stats().cycles, ran);
        assert_eq!(s.state(), SchedulerState::Running);
    }
}
