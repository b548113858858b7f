use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Phase {
    #[default]
    #[serde(rename = "phase_1_company_report")]
    CompanyReport,
    #[serde(rename = "phase_2_icp_report")]
    IcpReport,
    #[serde(rename = "phase_3_campaigns")]
    Campaigns,
    #[serde(rename = "phase_4_optimization")]
    Optimization,
    #[serde(rename = "phase_5_final_optimization")]
    FinalOptimization,
    #[serde(rename = "completed")]
    Completed,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::CompanyReport,
        Phase::IcpReport,
        Phase::Campaigns,
        Phase::Optimization,
        Phase::FinalOptimization,
        Phase::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompanyReport => "phase_1_company_report",
            Self::IcpReport => "phase_2_icp_report",
            Self::Campaigns => "phase_3_campaigns",
            Self::Optimization => "phase_4_optimization",
            Self::FinalOptimization => "phase_5_final_optimization",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == trimmed)
            .ok_or_else(|| format!("unknown workflow phase `{trimmed}`"))
    }

    /// Position in the fixed order, starting at 0.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Immediate successor; `None` only for `Completed`.
    pub fn successor(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Generating,
    Reviewing,
    CreatingReport,
    ValidatingReport,
    FindingCompetitors,
    Completed,
}

impl DisplayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Reviewing => "reviewing",
            Self::CreatingReport => "creating_report",
            Self::ValidatingReport => "validating_report",
            Self::FindingCompetitors => "finding_competitors",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn phase_status(phase: Phase) -> DisplayStatus {
    match phase {
        Phase::CompanyReport => DisplayStatus::Generating,
        Phase::IcpReport => DisplayStatus::CreatingReport,
        Phase::Campaigns => DisplayStatus::ValidatingReport,
        Phase::Optimization | Phase::FinalOptimization => DisplayStatus::FindingCompetitors,
        Phase::Completed => DisplayStatus::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_is_next_in_order() {
        for pair in Phase::ALL.windows(2) {
            assert_eq!(pair[0].successor(), Some(pair[1]));
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(Phase::Completed.successor(), None);
    }

    #[test]
    fn storage_names_round_trip_through_serde_and_parse() {
        for phase in Phase::ALL {
            let encoded = serde_json::to_value(phase).expect("encode");
            assert_eq!(encoded, serde_json::Value::String(phase.as_str().to_string()));
            assert_eq!(Phase::parse(phase.as_str()), Ok(phase));
        }
        assert!(Phase::parse("phase_6").is_err());
    }

    #[test]
    fn status_table_matches_phase_order() {
        assert_eq!(phase_status(Phase::CompanyReport).as_str(), "generating");
        assert_eq!(phase_status(Phase::IcpReport).as_str(), "creating_report");
        assert_eq!(phase_status(Phase::Campaigns).as_str(), "validating_report");
        assert_eq!(phase_status(Phase::FinalOptimization).as_str(), "finding_competitors");
        assert_eq!(phase_status(Phase::Completed).as_str(), "completed");
    }
}
