//! Driver for a Monte Carlo transport solver run as a coupled application.
//!
//! The wrapper owns the backend, applies user overrides of the backend's own
//! settings once at construction and turns nonzero backend statuses into
//! [`CouplingError::Backend`] with a description of the attempted call.

use crate::backend::BackendError;
use crate::config::TransportConfig;
use crate::coupling_error::CouplingError;
use crate::host::HostField;

/// Operations consumed from the transport library.
pub trait TransportBackend {
    /// Run all batches.
    fn run(&mut self) -> Result<(), BackendError>;
    fn reset_timers(&mut self) -> Result<(), BackendError>;
    /// User-facing id of the cell at `index`.
    fn cell_id(&self, index: i32) -> Result<i32, BackendError>;
    /// User-facing id of the material at `index`.
    fn material_id(&self, index: i32) -> Result<i32, BackendError>;
    fn set_verbosity(&mut self, verbosity: u32);
    fn set_inactive_batches(&mut self, n: u32);
    fn set_particles(&mut self, n: i64);
    fn set_batches(&mut self, n: u32) -> Result<(), BackendError>;
    /// Particles per batch.
    fn n_particles(&self) -> i64;
    /// Number of instances of every cell.
    fn cell_instance_counts(&self) -> Vec<usize>;
}

/// A transport solve with user settings applied.
#[derive(Debug)]
pub struct TransportProblem<B> {
    backend: B,
    config: TransportConfig,
    fixed_point_iteration: i64,
    n_cell_instances: usize,
}

impl<B: TransportBackend> TransportProblem<B> {
    pub fn new(mut backend: B, config: TransportConfig) -> Result<Self, CouplingError> {
        config.validate()?;
        if let Some(v) = config.verbosity {
            backend.set_verbosity(v);
        }
        if let Some(n) = config.inactive_batches {
            backend.set_inactive_batches(n);
        }
        if let Some(n) = config.particles {
            backend.set_particles(n);
        }
        if let Some(n) = config.batches {
            backend
                .set_batches(n)
                .map_err(|e| CouplingError::backend("In attempting to set the number of batches", e))?;
        }
        let n_cell_instances = backend.cell_instance_counts().iter().sum();
        if config.verbose {
            log::info!("transport model has {n_cell_instances} cell instances");
        }
        Ok(Self {
            backend,
            config,
            fixed_point_iteration: -1,
            n_cell_instances,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn power(&self) -> f64 {
        self.config.power
    }

    /// Completed solves minus one; `-1` before the first solve.
    pub fn fixed_point_iteration(&self) -> i64 {
        self.fixed_point_iteration
    }

    /// Total number of cell instances in the model.
    pub fn n_cell_instances(&self) -> usize {
        self.n_cell_instances
    }

    pub fn n_particles(&self) -> i64 {
        self.backend.n_particles()
    }

    /// Run all batches and reset the backend timers.
    pub fn external_solve(&mut self) -> Result<(), CouplingError> {
        log::info!("Running transport with {} particles per batch...", self.n_particles());
        self.backend
            .run()
            .map_err(|e| CouplingError::backend("In attempting to run the transport solve", e))?;
        self.backend
            .reset_timers()
            .map_err(|e| CouplingError::backend("In attempting to reset the transport timers", e))?;
        self.fixed_point_iteration += 1;
        Ok(())
    }

    pub fn cell_id(&self, index: i32) -> Result<i32, CouplingError> {
        self.backend.cell_id(index).map_err(|e| {
            CouplingError::backend(format!("In attempting to get ID for cell with index {index}"), e)
        })
    }

    pub fn material_id(&self, index: i32) -> Result<i32, CouplingError> {
        self.backend.material_id(index).map_err(|e| {
            CouplingError::backend(
                format!("In attempting to get ID for material with index {index}"),
                e,
            )
        })
    }

    /// Human-readable material label.
    pub fn print_material(&self, index: i32) -> Result<String, CouplingError> {
        Ok(format!("material {}", self.material_id(index)?))
    }

    /// Set elemental `var` to `value` on every listed element local to this rank.
    /// Returns the number of elements written.
    pub fn fill_elemental_aux_variable<H: HostField + ?Sized>(
        &self,
        host: &mut H,
        var: usize,
        elems: &[usize],
        value: f64,
    ) -> usize {
        elems
            .iter()
            .filter(|&&e| host.set_element_dof(var, e, value))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeTransport {
        runs: usize,
        resets: usize,
        particles: i64,
        batches: Option<u32>,
        fail_run: bool,
    }

    impl TransportBackend for FakeTransport {
        fn run(&mut self) -> Result<(), BackendError> {
            if self.fail_run {
                return Err(BackendError::new(-3, "no fission source"));
            }
            self.runs += 1;
            Ok(())
        }
        fn reset_timers(&mut self) -> Result<(), BackendError> {
            self.resets += 1;
            Ok(())
        }
        fn cell_id(&self, index: i32) -> Result<i32, BackendError> {
            if index < 0 || index >= 3 {
                return Err(BackendError::new(-1, "Index in cells array is out of bounds."));
            }
            Ok(index + 10)
        }
        fn material_id(&self, index: i32) -> Result<i32, BackendError> {
            Ok(index + 100)
        }
        fn set_verbosity(&mut self, _verbosity: u32) {}
        fn set_inactive_batches(&mut self, _n: u32) {}
        fn set_particles(&mut self, n: i64) {
            self.particles = n;
        }
        fn set_batches(&mut self, n: u32) -> Result<(), BackendError> {
            self.batches = Some(n);
            Ok(())
        }
        fn n_particles(&self) -> i64 {
            self.particles
        }
        fn cell_instance_counts(&self) -> Vec<usize> {
            vec![1, 4, 2]
        }
    }

    fn config() -> TransportConfig {
        TransportConfig {
            power: 1.0e3,
            particles: Some(500),
            batches: Some(20),
            ..TransportConfig::default()
        }
    }

    #[test]
    fn settings_are_applied() {
        let problem = TransportProblem::new(FakeTransport::default(), config()).unwrap();
        assert_eq!(problem.n_particles(), 500);
        assert_eq!(problem.backend().batches, Some(20));
        assert_eq!(problem.n_cell_instances(), 7);
        assert_eq!(problem.fixed_point_iteration(), -1);
    }

    #[test]
    fn solves_count_fixed_point_iterations() {
        let mut problem = TransportProblem::new(FakeTransport::default(), config()).unwrap();
        problem.external_solve().unwrap();
        problem.external_solve().unwrap();
        assert_eq!(problem.fixed_point_iteration(), 1);
        assert_eq!(problem.backend().resets, 2);
    }

    #[test]
    fn backend_errors_carry_context() {
        let problem = TransportProblem::new(FakeTransport::default(), config()).unwrap();
        let err = problem.cell_id(7).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("In attempting to get ID for cell with index 7"));
        assert!(msg.contains("out of bounds"));
        assert_eq!(problem.print_material(2).unwrap(), "material 102");

        let backend = FakeTransport {
            fail_run: true,
            ..FakeTransport::default()
        };
        let mut failing = TransportProblem::new(backend, config()).unwrap();
        assert!(matches!(failing.external_solve(), Err(CouplingError::Backend { .. })));
        assert_eq!(failing.fixed_point_iteration(), -1);
    }
}
