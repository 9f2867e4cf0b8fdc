//! Reference scales between the solver's nondimensional units and physical units.

use super::field::{FieldKind, WriteField};
use crate::coupling_error::CouplingError;

/// `{U_ref, T_ref, dT_ref, L_ref, rho_0, Cp_0}`; the identity in dimensional runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NondimensionalScales {
    pub u_ref: f64,
    pub t_ref: f64,
    pub dt_ref: f64,
    pub l_ref: f64,
    pub rho_0: f64,
    pub cp_0: f64,
}

impl Default for NondimensionalScales {
    fn default() -> Self {
        Self::dimensional()
    }
}

impl NondimensionalScales {
    /// Scales leaving every value unchanged.
    pub const fn dimensional() -> Self {
        Self {
            u_ref: 1.0,
            t_ref: 0.0,
            dt_ref: 1.0,
            l_ref: 1.0,
            rho_0: 1.0,
            cp_0: 1.0,
        }
    }

    /// Range-checked construction.
    pub fn new(
        u_ref: f64,
        t_ref: f64,
        dt_ref: f64,
        l_ref: f64,
        rho_0: f64,
        cp_0: f64,
    ) -> Result<Self, CouplingError> {
        positive("U_ref", u_ref)?;
        if !(t_ref >= 0.0) {
            return Err(CouplingError::ScaleOutOfRange {
                name: "T_ref",
                value: t_ref,
                constraint: "T_ref >= 0.0",
            });
        }
        positive("dT_ref", dt_ref)?;
        positive("L_ref", l_ref)?;
        positive("rho_0", rho_0)?;
        positive("Cp_0", cp_0)?;
        Ok(Self {
            u_ref,
            t_ref,
            dt_ref,
            l_ref,
            rho_0,
            cp_0,
        })
    }

    /// Characteristic time `L_ref / U_ref`.
    pub fn time_scale(&self) -> f64 {
        self.l_ref / self.u_ref
    }

    pub fn to_dimensional_time(&self, t: f64) -> f64 {
        t * self.time_scale()
    }

    pub fn to_nondimensional_time(&self, t: f64) -> f64 {
        t / self.time_scale()
    }

    /// Solver value of `field` → physical value.
    pub fn dimensionalize(&self, field: FieldKind, value: f64) -> f64 {
        match field {
            FieldKind::Temperature => value * self.dt_ref + self.t_ref,
            FieldKind::Pressure => value * self.rho_0 * self.u_ref * self.u_ref,
            FieldKind::VelocityX | FieldKind::VelocityY | FieldKind::VelocityZ => {
                value * self.u_ref
            }
        }
    }

    /// Physical value of `field` → solver value.
    pub fn nondimensionalize(&self, field: WriteField, value: f64) -> f64 {
        let flux = self.rho_0 * self.cp_0 * self.u_ref * self.dt_ref;
        match field {
            WriteField::Temperature => (value - self.t_ref) / self.dt_ref,
            WriteField::HeatFlux => value / flux,
            WriteField::HeatSource => value / (flux / self.l_ref),
            WriteField::DisplacementX | WriteField::DisplacementY | WriteField::DisplacementZ => {
                value / self.l_ref
            }
        }
    }

    /// Log the active scales as a small table.
    pub fn log_table(&self) {
        log::info!(
            "reference scales: U_ref = {}, T_ref = {}, dT_ref = {}, L_ref = {}, rho_0 = {}, Cp_0 = {}, time = {}",
            self.u_ref,
            self.t_ref,
            self.dt_ref,
            self.l_ref,
            self.rho_0,
            self.cp_0,
            self.time_scale()
        );
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), CouplingError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(CouplingError::ScaleOutOfRange {
            name,
            value,
            constraint: "> 0.0",
        })
    }
}
