//! User-facing configuration, deserialized with `serde` and checked by `validate`.
//!
//! Validation happens once, before any collective work, so every rank fails the
//! same way on a bad input.

use crate::coupling_error::CouplingError;
use crate::mirror::MirrorOrder;
use crate::transfer::field::OutputField;
use crate::transfer::scales::NondimensionalScales;
use serde::Deserialize;

/// How this application instance is embedded in a coupled run.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppContext {
    /// No parent application drives this one.
    pub is_top_level: bool,
    /// Index among sibling sub-applications.
    pub subapp_index: usize,
    /// The solver only compiles its case.
    pub build_only: bool,
}

impl Default for AppContext {
    fn default() -> Self {
        Self {
            is_top_level: true,
            subapp_index: 0,
            build_only: false,
        }
    }
}

impl AppContext {
    /// Field file prefix for this sub-application: a letter per hundred, then
    /// the remainder zero-padded to two digits (`0 → "a00"`, `105 → "b05"`).
    pub fn field_file_prefix(&self) -> Result<String, CouplingError> {
        field_file_prefix(self.subapp_index)
    }
}

pub fn field_file_prefix(index: usize) -> Result<String, CouplingError> {
    let letter = index / 100;
    if letter >= 26 {
        return Err(CouplingError::Config(format!(
            "sub-application index {index} is too large for a field file prefix"
        )));
    }
    let letter = char::from(b'a' + letter as u8);
    Ok(format!("{letter}{:02}", index % 100))
}

/// Options of the coupled CFD problem.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemConfig {
    pub nondimensional: bool,
    #[serde(rename = "U_ref")]
    pub u_ref: Option<f64>,
    #[serde(rename = "T_ref")]
    pub t_ref: Option<f64>,
    #[serde(rename = "dT_ref")]
    pub dt_ref: Option<f64>,
    #[serde(rename = "L_ref")]
    pub l_ref: Option<f64>,
    pub rho_0: Option<f64>,
    #[serde(rename = "Cp_0")]
    pub cp_0: Option<f64>,
    pub output: Vec<OutputField>,
    pub write_fld_files: bool,
    pub disable_fld_file_output: bool,
    pub minimize_transfers_in: bool,
    pub minimize_transfers_out: bool,
    pub min_dt: f64,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            nondimensional: false,
            u_ref: None,
            t_ref: None,
            dt_ref: None,
            l_ref: None,
            rho_0: None,
            cp_0: None,
            output: Vec::new(),
            write_fld_files: false,
            disable_fld_file_output: false,
            minimize_transfers_in: false,
            minimize_transfers_out: false,
            min_dt: 1e-9,
        }
    }
}

impl ProblemConfig {
    fn named_scales(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("U_ref", self.u_ref),
            ("T_ref", self.t_ref),
            ("dT_ref", self.dt_ref),
            ("L_ref", self.l_ref),
            ("rho_0", self.rho_0),
            ("Cp_0", self.cp_0),
        ]
    }

    /// Reference scales for this run.
    ///
    /// Nondimensional runs need all six; dimensional runs ignore any that were set.
    pub fn scales(&self) -> Result<NondimensionalScales, CouplingError> {
        let named = self.named_scales();
        if !self.nondimensional {
            for (name, value) in named {
                if value.is_some() {
                    log::warn!("When solving in dimensional form, the '{name}' parameter is unused!");
                }
            }
            return Ok(NondimensionalScales::dimensional());
        }
        let missing: Vec<&'static str> = named
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(CouplingError::MissingScales { missing });
        }
        let [u, t, dt, l, rho, cp] = named.map(|(_, v)| v.unwrap_or_default());
        NondimensionalScales::new(u, t, dt, l, rho, cp)
    }

    /// Check option combinations against the application context.
    pub fn validate(&self, ctx: &AppContext) -> Result<(), CouplingError> {
        if ctx.is_top_level && (self.minimize_transfers_in || self.minimize_transfers_out) {
            return Err(CouplingError::Config(
                "The 'minimize_transfers_in' and 'minimize_transfers_out' capabilities require \
                 receiving and sending data to a parent application, but this is the top-level \
                 application."
                    .into(),
            ));
        }
        if self.disable_fld_file_output && self.write_fld_files {
            return Err(CouplingError::Config(
                "'write_fld_files' and 'disable_fld_file_output' cannot both be true!".into(),
            ));
        }
        if ctx.is_top_level && self.write_fld_files {
            return Err(CouplingError::Config(
                "The 'write_fld_files' setting should only be true when several solver instances \
                 run as sub-applications of a parent application."
                    .into(),
            ));
        }
        if !(self.min_dt >= 0.0) {
            return Err(CouplingError::Config(format!(
                "'min_dt' must be non-negative, got {}",
                self.min_dt
            )));
        }
        self.scales().map(|_| ())
    }
}

/// Options of the mirror mesh.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MeshConfig {
    /// Sideset ids coupled through the boundary mirror.
    pub boundary: Option<Vec<i32>>,
    /// Couple every solver element through a volume mirror.
    pub volume: bool,
    pub order: MirrorOrder,
    /// Factor applied to solver coordinates.
    pub scaling: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            boundary: None,
            volume: false,
            order: MirrorOrder::First,
            scaling: 1.0,
        }
    }
}

impl MeshConfig {
    pub fn validate(&self, ctx: &AppContext, problem: &ProblemConfig) -> Result<(), CouplingError> {
        if !ctx.build_only && self.boundary.is_none() && !self.volume {
            return Err(CouplingError::Config(
                "at least one of 'boundary' or 'volume' must be set for the mirror mesh".into(),
            ));
        }
        if let Some(ids) = &self.boundary {
            if ids.is_empty() {
                return Err(CouplingError::Config("'boundary' lists no sideset ids".into()));
            }
        }
        if !(self.scaling > 0.0) {
            return Err(CouplingError::ScaleOutOfRange {
                name: "scaling",
                value: self.scaling,
                constraint: "> 0.0",
            });
        }
        if problem.nondimensional {
            if let Some(l_ref) = problem.l_ref {
                if (self.scaling - l_ref).abs() > f64::EPSILON * l_ref.abs().max(1.0) {
                    return Err(CouplingError::ScalingMismatch {
                        scaling: self.scaling,
                        l_ref,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Options of the Monte Carlo transport wrapper.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Power (W) used to normalize tallies.
    pub power: f64,
    pub verbose: bool,
    pub verbosity: Option<u32>,
    pub inactive_batches: Option<u32>,
    pub particles: Option<i64>,
    pub batches: Option<u32>,
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), CouplingError> {
        if !(self.power >= 0.0) {
            return Err(CouplingError::ScaleOutOfRange {
                name: "power",
                value: self.power,
                constraint: ">= 0.0",
            });
        }
        if let Some(v) = self.verbosity {
            if !(1..=10).contains(&v) {
                return Err(CouplingError::Config(format!(
                    "'verbosity' must be between 1 and 10, got {v}"
                )));
            }
        }
        if self.inactive_batches == Some(0) {
            return Err(CouplingError::Config("'inactive_batches' must be positive".into()));
        }
        if self.batches == Some(0) {
            return Err(CouplingError::Config("'batches' must be positive".into()));
        }
        if matches!(self.particles, Some(p) if p <= 0) {
            return Err(CouplingError::Config("'particles' must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_app() -> AppContext {
        AppContext {
            is_top_level: false,
            ..AppContext::default()
        }
    }

    #[test]
    fn prefixes_roll_over_every_hundred() {
        assert_eq!(field_file_prefix(0).unwrap(), "a00");
        assert_eq!(field_file_prefix(7).unwrap(), "a07");
        assert_eq!(field_file_prefix(105).unwrap(), "b05");
        assert_eq!(field_file_prefix(2599).unwrap(), "z99");
        assert!(field_file_prefix(2600).is_err());
    }

    #[test]
    fn missing_scales_are_listed() {
        let cfg = ProblemConfig {
            nondimensional: true,
            u_ref: Some(1.0),
            l_ref: Some(1.0),
            rho_0: Some(1.0),
            ..ProblemConfig::default()
        };
        let err = cfg.scales().unwrap_err();
        assert_eq!(
            err,
            CouplingError::MissingScales {
                missing: vec!["T_ref", "dT_ref", "Cp_0"]
            }
        );
        assert!(err.to_string().contains("'T_ref', 'dT_ref', 'Cp_0'"));
    }

    #[test]
    fn dimensional_run_ignores_scales() {
        let cfg = ProblemConfig {
            u_ref: Some(3.0),
            ..ProblemConfig::default()
        };
        assert_eq!(cfg.scales().unwrap(), NondimensionalScales::dimensional());
    }

    #[test]
    fn conflicting_field_file_options() {
        let cfg = ProblemConfig {
            write_fld_files: true,
            disable_fld_file_output: true,
            ..ProblemConfig::default()
        };
        assert!(cfg.validate(&sub_app()).is_err());

        let top = ProblemConfig {
            write_fld_files: true,
            ..ProblemConfig::default()
        };
        assert!(top.validate(&AppContext::default()).is_err());
        assert!(top.validate(&sub_app()).is_ok());
    }

    #[test]
    fn minimized_transfers_need_a_parent() {
        let cfg = ProblemConfig {
            minimize_transfers_out: true,
            ..ProblemConfig::default()
        };
        assert!(cfg.validate(&AppContext::default()).is_err());
        assert!(cfg.validate(&sub_app()).is_ok());
    }

    #[test]
    fn mesh_needs_a_coupling() {
        let problem = ProblemConfig::default();
        let mesh = MeshConfig::default();
        assert!(mesh.validate(&AppContext::default(), &problem).is_err());
        let build_only = AppContext {
            build_only: true,
            ..AppContext::default()
        };
        assert!(mesh.validate(&build_only, &problem).is_ok());
    }

    #[test]
    fn nondimensional_scaling_must_match_length_scale() {
        let problem = ProblemConfig {
            nondimensional: true,
            l_ref: Some(0.5),
            ..ProblemConfig::default()
        };
        let mesh = MeshConfig {
            volume: true,
            ..MeshConfig::default()
        };
        assert!(matches!(
            mesh.validate(&AppContext::default(), &problem),
            Err(CouplingError::ScalingMismatch { .. })
        ));
    }

    #[test]
    fn transport_ranges() {
        let mut cfg = TransportConfig {
            power: 100.0,
            ..TransportConfig::default()
        };
        assert!(cfg.validate().is_ok());
        cfg.verbosity = Some(11);
        assert!(cfg.validate().is_err());
        cfg.verbosity = Some(3);
        cfg.particles = Some(0);
        assert!(cfg.validate().is_err());
    }
}
