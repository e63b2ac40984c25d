//! In-memory engine for tests.
//!
//! Probes are answered from canned reports, every invocation is recorded,
//! and successful invocations create an empty output file so later stages
//! and commits find it on disk. Outputs can be probed too: their report is
//! derived from the first input, with the geometry and rate of any `scale=`
//! and `fps=` filter and the `-t` bound applied.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::engine::{EngineFailure, Invocation, MediaEngine, ProbeReport, Stage};

#[derive(Debug, Clone)]
enum Fault {
    Exit { status: String, stderr: String },
    Timeout,
}

impl Fault {
    fn to_failure(&self) -> EngineFailure {
        match self {
            Fault::Exit { status, stderr } => EngineFailure::Exited {
                status: status.clone(),
                stderr: stderr.clone(),
            },
            Fault::Timeout => EngineFailure::TimedOut {
                timeout: Duration::from_secs(1),
            },
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    probes: HashMap<PathBuf, ProbeReport>,
    outputs: HashMap<PathBuf, ProbeReport>,
    stage_outputs: HashMap<Stage, ProbeReport>,
    stage_faults: HashMap<Stage, Fault>,
    input_faults: HashMap<(Stage, PathBuf), Fault>,
    invocations: Vec<Invocation>,
    probed: Vec<PathBuf>,
}

/// Recording [`MediaEngine`] double.
#[derive(Debug)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the recorded state from others.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answer probes of `path` with `report`.
    pub fn with_probe(self, path: impl Into<PathBuf>, report: ProbeReport) -> Self {
        self.lock().probes.insert(path.into(), report);
        self
    }

    /// Answer probes of every file produced by `stage` with `report`.
    pub fn with_stage_output(self, stage: Stage, report: ProbeReport) -> Self {
        self.lock().stage_outputs.insert(stage, report);
        self
    }

    /// Make every invocation of `stage` exit with `status`.
    pub fn fail_stage(self, stage: Stage, status: i32) -> Self {
        self.lock().stage_faults.insert(
            stage,
            Fault::Exit {
                status: status.to_string(),
                stderr: format!("simulated {stage} failure"),
            },
        );
        self
    }

    /// Make invocations of `stage` that read `input` exit with `status`.
    pub fn fail_input(self, stage: Stage, input: impl Into<PathBuf>, status: i32) -> Self {
        let input = input.into();
        self.lock().input_faults.insert(
            (stage, input.clone()),
            Fault::Exit {
                status: status.to_string(),
                stderr: format!("simulated {stage} failure for {}", input.display()),
            },
        );
        self
    }

    /// Make every invocation of `stage` time out.
    pub fn time_out_stage(self, stage: Stage) -> Self {
        self.lock().stage_faults.insert(stage, Fault::Timeout);
        self
    }

    /// All recorded invocations, in execution order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    pub fn invocations_for(&self, stage: Stage) -> Vec<Invocation> {
        self.lock()
            .invocations
            .iter()
            .filter(|inv| inv.stage == stage)
            .cloned()
            .collect()
    }

    /// Paths probed so far.
    pub fn probed(&self) -> Vec<PathBuf> {
        self.lock().probed.clone()
    }
}

impl MediaEngine for FakeEngine {
    fn probe(&self, path: &Path) -> Result<ProbeReport, EngineFailure> {
        let mut state = self.lock();
        state.probed.push(path.to_path_buf());
        state
            .lookup(path)
            .cloned()
            .ok_or_else(|| EngineFailure::Exited {
                status: "1".to_string(),
                stderr: format!("{}: Invalid data found when processing input", path.display()),
            })
    }

    fn execute(&self, invocation: &Invocation) -> Result<(), EngineFailure> {
        let fault = {
            let mut state = self.lock();
            state.invocations.push(invocation.clone());
            invocation
                .inputs
                .iter()
                .find_map(|input| {
                    state
                        .input_faults
                        .get(&(invocation.stage, input.clone()))
                        .cloned()
                })
                .or_else(|| state.stage_faults.get(&invocation.stage).cloned())
        };

        if let Some(fault) = fault {
            return Err(fault.to_failure());
        }

        std::fs::write(&invocation.output, b"").map_err(|source| EngineFailure::Spawn {
            binary: "fake".to_string(),
            source,
        })?;

        let mut state = self.lock();
        match state.simulated_output(invocation) {
            Some(report) => {
                state.outputs.insert(invocation.output.clone(), report);
            }
            None => {
                state.outputs.remove(&invocation.output);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }
}

impl FakeState {
    fn lookup(&self, path: &Path) -> Option<&ProbeReport> {
        self.probes.get(path).or_else(|| self.outputs.get(path))
    }

    /// What probing the output of `invocation` reports.
    fn simulated_output(&self, invocation: &Invocation) -> Option<ProbeReport> {
        if let Some(report) = self.stage_outputs.get(&invocation.stage) {
            return Some(report.clone());
        }

        let mut report = self.lookup(invocation.inputs.first()?)?.clone();
        let filter = invocation
            .arg_value("-vf")
            .or_else(|| invocation.arg_value("-filter_complex"))
            .unwrap_or_default();
        let size = filter_size(filter);
        let rate = filter_rate(filter);
        let bound = invocation.arg_value("-t").map(str::to_string);

        for stream in &mut report.streams {
            if stream.codec_type.as_deref() == Some("video") {
                if let Some((width, height)) = size {
                    stream.width = Some(width);
                    stream.height = Some(height);
                }
                if let Some(fps) = rate {
                    stream.r_frame_rate = Some(format!("{fps}/1"));
                    stream.avg_frame_rate = Some(format!("{fps}/1"));
                }
            }
            if bound.is_some() {
                stream.duration.clone_from(&bound);
            }
        }
        if let (Some(format), Some(_)) = (report.format.as_mut(), &bound) {
            format.duration.clone_from(&bound);
        }
        Some(report)
    }
}

fn filter_segments(filter: &str) -> impl Iterator<Item = &str> {
    filter.split([',', ';', ']'])
}

/// `W:H` of the first `scale=` filter.
fn filter_size(filter: &str) -> Option<(u32, u32)> {
    filter_segments(filter).find_map(|segment| {
        let mut dims = segment.strip_prefix("scale=")?.split(':');
        let width = dims.next()?.parse().ok()?;
        let height = dims.next()?.parse().ok()?;
        Some((width, height))
    })
}

/// Rate of the first `fps=` filter.
fn filter_rate(filter: &str) -> Option<u32> {
    filter_segments(filter).find_map(|segment| {
        let rest = segment.strip_prefix("fps=")?;
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    })
}
