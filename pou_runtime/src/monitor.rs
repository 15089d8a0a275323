//! Monitoring: instance snapshots, state comparison, determinism replay.

use serde::Serialize;

use pou_kernel::hashing::{layout_fingerprint, state_hash};
use pou_kernel::vars::VarClass;
use pou_kernel::{Pou, PouLayout, Value};

use crate::config::RuntimeConfig;
use crate::error::SchedulerError;
use crate::io::ProcessImage;
use crate::retain_store::MemoryRetainStore;
use crate::scheduler::{Scheduler, StartMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarSample {
    pub name: &'static str,
    pub class: VarClass,
    pub retain: bool,
    pub value: Value,
}

/// Every variable of an instance at one point in time, in record order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub pou: &'static str,
    pub layout: String,
    pub cycle: u64,
    pub hash: String,
    pub vars: Vec<VarSample>,
}

impl InstanceSnapshot {
    pub fn capture<P: PouLayout>(instance: &P, cycle: u64) -> Self {
        let vars = P::DECLARATIONS
            .iter()
            .filter_map(|d| {
                instance.read(d.name).map(|value| VarSample {
                    name: d.name,
                    class: d.class,
                    retain: d.retain,
                    value,
                })
            })
            .collect();

        Self {
            pou: P::NAME,
            layout: layout_fingerprint::<P>(),
            cycle,
            hash: state_hash(instance),
            vars,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarChange {
    pub name: &'static str,
    pub before: Value,
    pub after: Value,
}

/// Variables whose value differs between two snapshots of the same layout.
/// Snapshots of different layouts are not comparable and yield `None`.
pub fn compare_snapshots(a: &InstanceSnapshot, b: &InstanceSnapshot) -> Option<Vec<VarChange>> {
    if a.layout != b.layout {
        return None;
    }
    Some(
        a.vars
            .iter()
            .zip(&b.vars)
            .filter(|(x, y)| x.value != y.value)
            .map(|(x, y)| VarChange {
                name: x.name,
                before: x.value,
                after: y.value,
            })
            .collect(),
    )
}

/// External input values applied before one cycle.
pub type InputFrame = Vec<(String, Value)>;

/// Cold-start a fresh instance and return its state hash after each frame.
pub fn replay_hashes<P: Pou>(config: &RuntimeConfig, frames: &[InputFrame]) -> Result<Vec<String>, SchedulerError> {
    let mut scheduler = Scheduler::<P, ProcessImage>::with_parts(
        config.clone(),
        ProcessImage::new(),
        Box::new(MemoryRetainStore::default()),
    );
    scheduler.start(StartMode::Cold)?;

    let mut hashes = Vec::with_capacity(frames.len());
    for frame in frames {
        for (name, value) in frame {
            scheduler.io_mut().set_input_value(name, *value);
        }
        scheduler.scan()?;
        hashes.push(state_hash(scheduler.instance()));
    }
    Ok(hashes)
}

/// Replay the same input frames twice and require identical state after
/// every cycle.
pub fn verify_determinism<P: Pou>(config: &RuntimeConfig, frames: &[InputFrame]) -> Result<Vec<String>, SchedulerError> {
    let first = replay_hashes::<P>(config, frames)?;
    let second = replay_hashes::<P>(config, frames)?;

    if let Some(i) = first.iter().zip(&second).position(|(a, b)| a != b) {
        tracing::error!(pou = P::NAME, cycle = i + 1, "replays diverged");
        return Err(SchedulerError::Nondeterministic { cycle: i as u64 + 1 });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pou_kernel::programs::{BatchCounter, Main};

    fn frame(start: bool) -> InputFrame {
        vec![("start".to_string(), Value::Bool(start))]
    }

    #[test]
    fn snapshot_lists_vars_in_record_order() {
        let snap = InstanceSnapshot::capture(&BatchCounter { total: 5, ..BatchCounter::default() }, 9);
        let names: Vec<&str> = snap.vars.iter().map(|v| v.name).collect();
        assert_eq!(names, ["start", "reset", "running", "count", "total", "start_prev", "rising"]);
        assert_eq!(snap.get("TOTAL"), Some(Value::Lint(5)));
        assert_eq!(snap.cycle, 9);
        assert_eq!(snap.pou, "BATCH_COUNTER");

        let json = snap.to_json().unwrap();
        assert!(json.contains(r#""kind": "LINT""#));
    }

    #[test]
    fn compare_reports_changed_vars_only() {
        let a = InstanceSnapshot::capture(&Main { x: false }, 0);
        let b = InstanceSnapshot::capture(&Main { x: true }, 1);
        assert_eq!(
            compare_snapshots(&a, &b),
            Some(vec![VarChange { name: "x", before: Value::Bool(false), after: Value::Bool(true) }])
        );
        assert_eq!(compare_snapshots(&a, &a), Some(vec![]));

        let other = InstanceSnapshot::capture(&BatchCounter::default(), 0);
        assert_eq!(compare_snapshots(&a, &other), None);
    }

    #[test]
    fn replay_is_deterministic() {
        let frames: Vec<InputFrame> = [true, false, true, true, false].into_iter().map(frame).collect();
        let hashes = verify_determinism::<BatchCounter>(&RuntimeConfig::default(), &frames).unwrap();
        assert_eq!(hashes.len(), 5);
        // running and start_prev drop in cycle 2
        assert_ne!(hashes[0], hashes[1]);
    }

    #[test]
    fn replay_surfaces_invalid_inputs() {
        let frames = vec![vec![("total".to_string(), Value::Lint(1))]];
        let err = replay_hashes::<BatchCounter>(&RuntimeConfig::default(), &frames).unwrap_err();
        assert!(matches!(err, SchedulerError::Io(_)));
    }
}
