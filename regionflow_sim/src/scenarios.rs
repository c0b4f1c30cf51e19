//! Deterministic balancing scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// RF-001: the classic 3x3 RAS example
    Textbook,

    /// RF-002: synthetic survey seed balanced to known totals
    SurveyUpdate,

    /// RF-003: empty row with a zero target stays empty
    ZeroRow,

    /// RF-004: negative cells frozen and added back
    FrozenNegatives,

    /// RF-005: caller-chosen amounts kept out of scaling
    AdhocFreeze,

    /// RF-006: inconsistent border totals rejected, next job unaffected
    BorderMismatch,

    /// RF-007: virtual-clock timeout interrupts both engines
    Interrupted,

    /// RF-008: gravity shipments reproduce supply and demand
    GravityConservation,

    /// RF-009: unreachable place gets zero flow, no NaN
    IsolatedPlace,

    /// RF-010: fixed round count agrees with the convergence rule
    FixedPointAgreement,

    /// RF-011: impedance and supply lengths disagree
    DimensionMismatch,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Textbook,
            ScenarioId::SurveyUpdate,
            ScenarioId::ZeroRow,
            ScenarioId::FrozenNegatives,
            ScenarioId::AdhocFreeze,
            ScenarioId::BorderMismatch,
            ScenarioId::Interrupted,
            ScenarioId::GravityConservation,
            ScenarioId::IsolatedPlace,
            ScenarioId::FixedPointAgreement,
            ScenarioId::DimensionMismatch,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Textbook => "textbook",
            ScenarioId::SurveyUpdate => "survey_update",
            ScenarioId::ZeroRow => "zero_row",
            ScenarioId::FrozenNegatives => "frozen_negatives",
            ScenarioId::AdhocFreeze => "adhoc_freeze",
            ScenarioId::BorderMismatch => "border_mismatch",
            ScenarioId::Interrupted => "interrupted",
            ScenarioId::GravityConservation => "gravity_conservation",
            ScenarioId::IsolatedPlace => "isolated_place",
            ScenarioId::FixedPointAgreement => "fixed_point_agreement",
            ScenarioId::DimensionMismatch => "dimension_mismatch",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Textbook => "3x3 seed, rows [5,15,8], cols [11,9,8], must converge",
            ScenarioId::SurveyUpdate => "noisy seed balanced to totals of a known matrix, structure kept",
            ScenarioId::ZeroRow => "zero row with zero target stays zero, no NaN",
            ScenarioId::FrozenNegatives => "negative cells bypass scaling and come back unchanged",
            ScenarioId::AdhocFreeze => "ad-hoc frozen amounts bypass scaling, split invariant holds",
            ScenarioId::BorderMismatch => "rows [5,15,8] vs cols [11,9,9] fail QC; a good job still runs",
            ScenarioId::Interrupted => "budget of 5 checks stops RAS and gravity with best-effort output",
            ScenarioId::GravityConservation => "shipped supply and demand agree within tolerance",
            ScenarioId::IsolatedPlace => "unreachable place with no mass, all factors finite",
            ScenarioId::FixedPointAgreement => "fixed round count replays the converged fixed point exactly",
            ScenarioId::DimensionMismatch => "3x3 impedance with 4 supplies fails fast",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "textbook" | "rf-001" => Ok(ScenarioId::Textbook),
            "survey_update" | "surveyupdate" | "rf-002" => Ok(ScenarioId::SurveyUpdate),
            "zero_row" | "zerorow" | "rf-003" => Ok(ScenarioId::ZeroRow),
            "frozen_negatives" | "frozennegatives" | "rf-004" => Ok(ScenarioId::FrozenNegatives),
            "adhoc_freeze" | "adhocfreeze" | "rf-005" => Ok(ScenarioId::AdhocFreeze),
            "border_mismatch" | "bordermismatch" | "rf-006" => Ok(ScenarioId::BorderMismatch),
            "interrupted" | "rf-007" => Ok(ScenarioId::Interrupted),
            "gravity_conservation" | "gravityconservation" | "rf-008" => {
                Ok(ScenarioId::GravityConservation)
            }
            "isolated_place" | "isolatedplace" | "rf-009" => Ok(ScenarioId::IsolatedPlace),
            "fixed_point_agreement" | "fixedpointagreement" | "rf-010" => {
                Ok(ScenarioId::FixedPointAgreement)
            }
            "dimension_mismatch" | "dimensionmismatch" | "rf-011" => Ok(ScenarioId::DimensionMismatch),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("RF-004".parse::<ScenarioId>(), Ok(ScenarioId::FrozenNegatives));
        assert!("chaos".parse::<ScenarioId>().is_err());
    }
}
