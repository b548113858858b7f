use super::error::PromptError;
use super::phase::Phase;
use super::prompts::{
    build_campaigns_prompt, build_company_report_prompt, build_completed_prompt,
    build_final_optimization_prompt, build_icp_report_prompt, build_optimization_prompt,
    PromptContext,
};

pub type PromptBuilder = fn(&PromptContext<'_>) -> Result<String, PromptError>;

#[derive(Clone, Copy)]
pub struct PhaseDefinition {
    pub phase: Phase,
    pub name: &'static str,
    pub description: &'static str,
    pub build_prompt: PromptBuilder,
    pub next_phase: Option<Phase>,
}

pub static PHASE_DEFINITIONS: [PhaseDefinition; 6] = [
    PhaseDefinition {
        phase: Phase::CompanyReport,
        name: "Company Report",
        description: "Strategic report on the client, its market and its value proposition",
        build_prompt: build_company_report_prompt,
        next_phase: Some(Phase::IcpReport),
    },
    PhaseDefinition {
        phase: Phase::IcpReport,
        name: "ICP Report",
        description: "Ideal customer profiles with actionable sub-niches",
        build_prompt: build_icp_report_prompt,
        next_phase: Some(Phase::Campaigns),
    },
    PhaseDefinition {
        phase: Phase::Campaigns,
        name: "Campaign Creation",
        description: "Cold email campaign blueprints for a target sub-niche",
        build_prompt: build_campaigns_prompt,
        next_phase: Some(Phase::Optimization),
    },
    PhaseDefinition {
        phase: Phase::Optimization,
        name: "Campaign Optimization",
        description: "Recommendations driven by campaign performance",
        build_prompt: build_optimization_prompt,
        next_phase: Some(Phase::FinalOptimization),
    },
    PhaseDefinition {
        phase: Phase::FinalOptimization,
        name: "Final Optimization",
        description: "Final campaign strategy and workflow summary",
        build_prompt: build_final_optimization_prompt,
        next_phase: Some(Phase::Completed),
    },
    PhaseDefinition {
        phase: Phase::Completed,
        name: "Completed",
        description: "Workflow finished",
        build_prompt: build_completed_prompt,
        next_phase: None,
    },
];

pub fn phase_definition(phase: Phase) -> &'static PhaseDefinition {
    &PHASE_DEFINITIONS[phase.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_are_indexed_by_phase_order() {
        for phase in Phase::ALL {
            let definition = phase_definition(phase);
            assert_eq!(definition.phase, phase);
            assert_eq!(definition.next_phase, phase.successor());
        }
    }

    #[test]
    fn completed_phase_builds_empty_prompt() {
        let data = Default::default();
        let extras = Default::default();
        let ctx = PromptContext::new(&data, &extras);
        let prompt = (phase_definition(Phase::Completed).build_prompt)(&ctx).expect("prompt");
        assert!(prompt.is_empty());
    }
}
