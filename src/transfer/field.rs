//! Field identifiers crossing the coupling boundary.

use crate::coupling_error::CouplingError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A scalar solver field read during outgoing transfers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldKind {
    Temperature,
    Pressure,
    VelocityX,
    VelocityY,
    VelocityZ,
}

impl FieldKind {
    /// Name of the host variable receiving this field.
    pub fn variable_name(self) -> &'static str {
        match self {
            FieldKind::Temperature => "temp",
            FieldKind::Pressure => "P",
            FieldKind::VelocityX => "vel_x",
            FieldKind::VelocityY => "vel_y",
            FieldKind::VelocityZ => "vel_z",
        }
    }
}

/// A user-selectable output, expanding to one or more [`FieldKind`]s.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputField {
    Temperature,
    Pressure,
    Velocity,
}

impl OutputField {
    pub fn components(self) -> &'static [FieldKind] {
        match self {
            OutputField::Temperature => &[FieldKind::Temperature],
            OutputField::Pressure => &[FieldKind::Pressure],
            OutputField::Velocity => &[
                FieldKind::VelocityX,
                FieldKind::VelocityY,
                FieldKind::VelocityZ,
            ],
        }
    }
}

impl FromStr for OutputField {
    type Err = CouplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(OutputField::Temperature),
            "pressure" => Ok(OutputField::Pressure),
            "velocity" => Ok(OutputField::Velocity),
            _ => Err(CouplingError::UnhandledVariant {
                kind: "output field",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputField::Temperature => "temperature",
            OutputField::Pressure => "pressure",
            OutputField::Velocity => "velocity",
        };
        f.write_str(name)
    }
}

/// A solver field written during incoming transfers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum WriteField {
    Temperature,
    HeatFlux,
    HeatSource,
    DisplacementX,
    DisplacementY,
    DisplacementZ,
}

impl WriteField {
    pub fn displacement(component: usize) -> Result<Self, CouplingError> {
        match component {
            0 => Ok(WriteField::DisplacementX),
            1 => Ok(WriteField::DisplacementY),
            2 => Ok(WriteField::DisplacementZ),
            _ => Err(CouplingError::UnhandledVariant {
                kind: "displacement component",
                value: component.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_expands_to_three_variables() {
        let names: Vec<_> = OutputField::Velocity
            .components()
            .iter()
            .map(|f| f.variable_name())
            .collect();
        assert_eq!(names, ["vel_x", "vel_y", "vel_z"]);
    }

    #[test]
    fn unknown_output_is_fatal() {
        assert!(matches!(
            "vorticity".parse::<OutputField>(),
            Err(CouplingError::UnhandledVariant { kind: "output field", .. })
        ));
    }
}
