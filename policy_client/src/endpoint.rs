use std::fmt;

/// The remote simulation API surface this client drives. All payloads are
/// opaque JSON; the simulation itself lives behind these paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Parameters,
    Entities,
    Variables,
    DefaultHousehold,
    Calculate,
    PopulationReform,
    HouseholdReform,
    PopulationBreakdown,
    AgeChart,
    CliffImpact,
    AutoUbi,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Parameters,
        Endpoint::Entities,
        Endpoint::Variables,
        Endpoint::DefaultHousehold,
        Endpoint::Calculate,
        Endpoint::PopulationReform,
        Endpoint::HouseholdReform,
        Endpoint::PopulationBreakdown,
        Endpoint::AgeChart,
        Endpoint::CliffImpact,
        Endpoint::AutoUbi,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Parameters => "/parameters",
            Endpoint::Entities => "/entities",
            Endpoint::Variables => "/variables",
            Endpoint::DefaultHousehold => "/default-household",
            Endpoint::Calculate => "/calculate",
            Endpoint::PopulationReform => "/population-reform",
            Endpoint::HouseholdReform => "/household-reform",
            Endpoint::PopulationBreakdown => "/population-breakdown",
            Endpoint::AgeChart => "/age-chart",
            Endpoint::CliffImpact => "/cliff-impact",
            Endpoint::AutoUbi => "/auto-ubi",
        }
    }

    /// Endpoints that take the household JSON body rather than a reform
    /// query string.
    pub fn takes_situation_body(self) -> bool {
        matches!(self, Endpoint::Calculate)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.path())
    }
}
