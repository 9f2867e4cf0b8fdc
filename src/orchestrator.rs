//! Per-timestep control of the wrapped solver: stepping, synchronization gates
//! and field-file output.
//!
//! The driver works in dimensional time. Every call into the solver converts
//! times with the reference time scale `L_ref / U_ref`.

use crate::backend::{DriverClock, SolverRuntime};
use crate::config::{AppContext, ProblemConfig};
use crate::coupling_error::CouplingError;
use crate::transfer::scales::NondimensionalScales;

/// Where the orchestrator is within a coupling step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepState {
    #[default]
    Idle,
    Stepping,
    SyncingIn,
    SyncingOut,
    OutputCheck,
}

/// Drives one solver instance through the host's timesteps.
#[derive(Clone, Debug)]
pub struct TimestepOrchestrator {
    state: StepState,
    scales: NondimensionalScales,
    build_only: bool,
    is_top_level: bool,
    write_fld_files: bool,
    disable_fld_file_output: bool,
    minimize_transfers_in: bool,
    minimize_transfers_out: bool,
    min_dt: f64,
    prefix: String,
    time: f64,
    t_step: usize,
    first_sync_in: bool,
    is_output_step: bool,
    last_step_end: Option<f64>,
    last_written_step: Option<usize>,
}

impl TimestepOrchestrator {
    pub fn new(problem: &ProblemConfig, ctx: &AppContext) -> Result<Self, CouplingError> {
        problem.validate(ctx)?;
        let scales = problem.scales()?;
        scales.log_table();
        Ok(Self {
            state: StepState::Idle,
            scales,
            build_only: ctx.build_only,
            is_top_level: ctx.is_top_level,
            write_fld_files: problem.write_fld_files,
            disable_fld_file_output: problem.disable_fld_file_output,
            minimize_transfers_in: problem.minimize_transfers_in,
            minimize_transfers_out: problem.minimize_transfers_out,
            min_dt: problem.min_dt,
            prefix: ctx.field_file_prefix()?,
            time: 0.0,
            t_step: 0,
            first_sync_in: true,
            is_output_step: false,
            last_step_end: None,
            last_written_step: None,
        })
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn scales(&self) -> &NondimensionalScales {
        &self.scales
    }

    /// Current dimensional time (the start of the next step).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Index of the last completed step.
    pub fn t_step(&self) -> usize {
        self.t_step
    }

    pub fn is_output_step(&self) -> bool {
        self.is_output_step
    }

    /// Dimensional end time of the last completed step.
    pub fn last_step_end(&self) -> Option<f64> {
        self.last_step_end
    }

    pub fn field_file_prefix(&self) -> &str {
        &self.prefix
    }

    fn transition(&mut self, next: StepState) {
        log::debug!("step {}: {:?} -> {:?}", self.t_step, self.state, next);
        self.state = next;
    }

    /// Reconcile start times before the first step and run the user hook once.
    pub fn initial_setup<R, K>(&mut self, solver: &mut R, clock: &K) -> Result<(), CouplingError>
    where
        R: SolverRuntime + ?Sized,
        K: DriverClock + ?Sized,
    {
        let driver_start = clock.start_time();
        if driver_start != 0.0 {
            return Err(CouplingError::Config(format!(
                "You specified a start time of {driver_start}, but a non-zero start time is not supported!"
            )));
        }
        let solver_start = self.scales.to_dimensional_time(solver.start_time());
        if (solver_start - driver_start).abs() > f64::EPSILON {
            log::warn!(
                "The driver start time {driver_start} does not match the solver start time {solver_start}; \
                 this may happen when restarting the solver. Using {driver_start}."
            );
        }
        self.time = driver_start;
        if !self.build_only {
            solver.user_step(
                self.scales.to_nondimensional_time(self.time),
                self.t_step,
                false,
            );
        }
        Ok(())
    }

    /// Advance the solver over the driver's current step window
    /// `clock.time() - dt .. clock.time()`.
    pub fn external_solve<R, K>(&mut self, solver: &mut R, clock: &K) -> Result<(), CouplingError>
    where
        R: SolverRuntime + ?Sized,
        K: DriverClock + ?Sized,
    {
        if self.build_only {
            return Ok(());
        }
        let dt = clock.dt();
        if dt < self.min_dt {
            return Err(CouplingError::TimestepTooSmall {
                dt,
                min_dt: self.min_dt,
            });
        }

        self.transition(StepState::Stepping);
        let step = clock.t_step();
        let end = clock.time();
        let start = end - dt;
        let end_nd = self.scales.to_nondimensional_time(end);
        let ran = solver.run_step(
            self.scales.to_nondimensional_time(start),
            self.scales.to_nondimensional_time(dt),
            step,
        );
        if let Err(source) = ran {
            self.transition(StepState::Idle);
            return Err(CouplingError::backend(
                format!("In attempting to run step {step} from time {start}"),
                source,
            ));
        }
        solver.user_step(end_nd, step, self.output_decision(solver, end_nd, step));
        // Both the solver arrays and the legacy backend agree after this call.
        solver.copy_to_legacy(end_nd, step);

        self.transition(StepState::OutputCheck);
        self.t_step = step;
        self.time = end;
        self.last_step_end = Some(end);
        let written = if self.is_output_step {
            self.write_once(solver, end_nd)
        } else {
            Ok(())
        };
        self.transition(StepState::Idle);
        written
    }

    /// Top-level runs also write the solver's last step; sub-applications leave
    /// that to [`finish`](Self::finish).
    fn output_decision<R: SolverRuntime + ?Sized>(
        &mut self,
        solver: &R,
        time_nd: f64,
        step: usize,
    ) -> bool {
        self.is_output_step = if self.is_top_level {
            solver.is_last_step(time_nd, step) || solver.is_output_step(time_nd, step)
        } else {
            solver.is_output_step(time_nd, step)
        };
        self.is_output_step
    }

    /// Write the current step unless it was already written or output is off.
    fn write_once<R: SolverRuntime + ?Sized>(
        &mut self,
        solver: &mut R,
        time_nd: f64,
    ) -> Result<(), CouplingError> {
        if self.disable_fld_file_output || self.last_written_step == Some(self.t_step) {
            return Ok(());
        }
        let result = if self.write_fld_files {
            solver.write_field_file(&self.prefix, time_nd)
        } else {
            solver.write_output(time_nd)
        };
        result.map_err(|e| {
            CouplingError::backend(format!("In attempting to write output at step {}", self.t_step), e)
        })?;
        self.last_written_step = Some(self.t_step);
        Ok(())
    }

    /// Run `transfer` into the solver unless minimized incoming transfers say
    /// there is nothing new.
    ///
    /// `transfer_in` is the driver's flag announcing new data; it is consumed
    /// (reset to `false`) when a transfer runs. The very first call must see it
    /// set, otherwise the driver's default was wrong.
    pub fn sync_in<F>(&mut self, transfer_in: &mut bool, transfer: F) -> Result<bool, CouplingError>
    where
        F: FnOnce() -> Result<(), CouplingError>,
    {
        if self.build_only {
            return Ok(false);
        }
        let first = std::mem::replace(&mut self.first_sync_in, false);
        if self.minimize_transfers_in {
            if first && !*transfer_in {
                return Err(CouplingError::Config(
                    "The default value for the 'transfer_in' flag received from the parent \
                     application must not be false!"
                        .into(),
                ));
            }
            if !*transfer_in {
                log::debug!("step {}: skipping incoming transfer", self.t_step);
                return Ok(false);
            }
            *transfer_in = false;
        }
        self.transition(StepState::SyncingIn);
        let result = transfer();
        self.transition(StepState::Idle);
        result.map(|()| true)
    }

    /// Run `transfer` out of the solver unless minimized outgoing transfers say
    /// the driver's current time is not yet its target time.
    pub fn sync_out<K, F>(&mut self, clock: &K, transfer: F) -> Result<bool, CouplingError>
    where
        K: DriverClock + ?Sized,
        F: FnOnce() -> Result<(), CouplingError>,
    {
        if self.build_only {
            return Ok(false);
        }
        if self.minimize_transfers_out {
            let at_target = (clock.time() - clock.target_time()).abs() <= clock.timestep_tol();
            if !at_target {
                log::debug!("step {}: skipping outgoing transfer", self.t_step);
                return Ok(false);
            }
        }
        self.transition(StepState::SyncingOut);
        let result = transfer();
        self.transition(StepState::Idle);
        result.map(|()| true)
    }

    /// Write a final field file when the last step was not written.
    pub fn finish<R: SolverRuntime + ?Sized>(&mut self, solver: &mut R) -> Result<(), CouplingError> {
        if self.build_only {
            return Ok(());
        }
        let time_nd = self.scales.to_nondimensional_time(self.time);
        self.write_once(solver, time_nd)
    }
}
