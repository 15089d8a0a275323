//! Reference programs shipped with the kernel.
//!
//! `Main` is the canonical single-flag program; `BatchCounter` and
//! `Ratio` exercise interface variables, retain, temporaries and faults.

use crate::declare_pou;
use crate::error::Fault;
use crate::pou::{CycleContext, Pou};

declare_pou! {
    /// PROGRAM MAIN
    pub program Main("MAIN") {
        var {
            x: bool = false;
        }
    }
}

impl Pou for Main {
    fn body(&mut self, _cx: &CycleContext) -> Result<(), Fault> {
        self.x = !self.x;
        Ok(())
    }
}

declare_pou! {
    /// PROGRAM BATCH_COUNTER: counts rising edges of `start`.
    pub program BatchCounter("BATCH_COUNTER") {
        var_input {
            start: bool = false;
            reset: bool = false;
        }
        var_output {
            running: bool = false;
            count: i32 = 0;
        }
        var_retain {
            /// Lifetime batches, survives warm restarts.
            total: i64 = 0;
        }
        var {
            start_prev: bool = false;
        }
        var_temp {
            rising: bool = false;
        }
    }
}

impl Pou for BatchCounter {
    fn body(&mut self, cx: &CycleContext) -> Result<(), Fault> {
        self.rising = self.start && !self.start_prev;
        self.start_prev = self.start;

        if self.reset {
            self.count = 0;
        } else if self.rising {
            self.count = cx.add(self.count, 1)?;
            self.total = cx.add(self.total, 1)?;
        }
        self.running = self.start;
        Ok(())
    }
}

declare_pou! {
    /// PROGRAM RATIO: integer quotient of two inputs.
    pub program Ratio("RATIO") {
        var_input {
            num: i16 = 0;
            den: i16 = 1;
        }
        var_output {
            quotient: i16 = 0;
        }
        var {
            evaluations: u32 = 0;
        }
    }
}

impl Pou for Ratio {
    fn body(&mut self, cx: &CycleContext) -> Result<(), Fault> {
        // Counted before dividing so a faulted cycle is visible if not rolled back.
        self.evaluations = cx.add(self.evaluations, 1)?;
        self.quotient = cx.div(self.num, self.den)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::arithmetic::FaultPolicy;
    use crate::pou::PouLayout;
    use crate::vars::VarClass;

    fn cx(cycle: u64) -> CycleContext {
        CycleContext::new(cycle, Duration::from_millis(10), FaultPolicy::Trap)
    }

    #[test]
    fn main_toggles_and_cold_init_discards_history() {
        let mut m = Main { x: true };
        m.init(false);
        assert!(!m.x);
        for c in 1..=3 {
            m.body(&cx(c)).unwrap();
        }
        assert!(m.x);
        m.init(false);
        assert!(!m.x);
    }

    #[test]
    fn main_layout() {
        assert_eq!(Main::NAME, "MAIN");
        assert_eq!(Main::DECLARATIONS.len(), 1);
        assert_eq!(Main::DECLARATIONS[0].class, VarClass::Private);
        assert!(!Main::has_retain());
    }

    #[test]
    fn batch_counter_counts_rising_edges() {
        let mut b = BatchCounter::default();
        let pattern = [true, true, false, true, false, false, true];
        for (i, start) in pattern.into_iter().enumerate() {
            b.start = start;
            b.body(&cx(i as u64 + 1)).unwrap();
        }
        assert_eq!(b.count, 3);
        assert_eq!(b.total, 3);
        assert!(b.running);

        b.reset = true;
        b.body(&cx(8)).unwrap();
        assert_eq!((b.count, b.total), (0, 3));
    }

    #[test]
    fn ratio_traps_on_zero_divisor() {
        let mut r = Ratio { num: 9, den: 0, ..Ratio::default() };
        assert_eq!(r.body(&cx(1)), Err(Fault::DivisionByZero { op: "DIV" }));

        let sat = CycleContext { policy: FaultPolicy::Saturate, ..cx(1) };
        let mut r = Ratio { num: 9, den: 0, ..Ratio::default() };
        r.body(&sat).unwrap();
        assert_eq!(r.quotient, i16::MAX);
    }
}
