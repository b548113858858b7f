use super::error::PromptError;
use super::phase::Phase;
use crate::report::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_ICP_COUNT: u32 = 3;
pub const DEFAULT_ICP_CRITERIA: &str =
    "Focus on the segments with the highest urgency, budget authority and fit for the offer.";
pub const DEFAULT_ANGLE_COUNT: u32 = 3;
pub const DEFAULT_ANGLE_CRITERIA: &str =
    "Use clearly different psychological approaches such as pain, proof and opportunity.";

const PHASE_1_TEMPLATE: &str = include_str!("assets/phase_1_company_report.prompt.md");
const PHASE_2_TEMPLATE: &str = include_str!("assets/phase_2_icp_report.prompt.md");
const PHASE_3_TEMPLATE: &str = include_str!("assets/phase_3_campaigns.prompt.md");
const PHASE_4_TEMPLATE: &str = include_str!("assets/phase_4_optimization.prompt.md");
const PHASE_5_TEMPLATE: &str = include_str!("assets/phase_5_final_optimization.prompt.md");

const COMPANY_REPORT_SCHEMA: &str = include_str!("assets/company_report.schema.json");
const ICP_REPORT_SCHEMA: &str = include_str!("assets/icp_report.schema.json");
const CAMPAIGN_SCHEMA: &str = include_str!("assets/campaign_blueprints.schema.json");

/// Merge fields the AI service fills in per lead. They pass through
/// rendering untouched.
const PERSONALIZATION_TOKENS: [&str; 3] = ["first_name", "company_name", "sender_first_name"];

/// Operator-supplied description of the client, used by the phase 1 prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyBrief {
    pub client_name: String,
    pub domain: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub offer_service: Option<String>,
    #[serde(default)]
    pub pricing: Option<String>,
    #[serde(default)]
    pub target_market: Option<String>,
    #[serde(default)]
    pub goals: Option<String>,
    #[serde(default)]
    pub file_names: Vec<String>,
}

impl CompanyBrief {
    fn offer_description(&self) -> String {
        let mut parts = Vec::new();
        let labelled = [
            ("Industry", &self.industry),
            ("Offer/Service", &self.offer_service),
            ("Pricing", &self.pricing),
            ("Target Market", &self.target_market),
            ("Goals", &self.goals),
        ];
        for (label, value) in labelled {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                parts.push(format!("{label}: {value}"));
            }
        }
        if parts.is_empty() {
            "Not provided.".to_string()
        } else {
            parts.join(". ")
        }
    }
}

/// Operator inputs beyond the committed reports. Absent fields fall back
/// to the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseExtras {
    #[serde(default)]
    pub brief: Option<CompanyBrief>,
    #[serde(default)]
    pub icp_count: Option<u32>,
    #[serde(default)]
    pub icp_criteria: Option<String>,
    #[serde(default)]
    pub selected_icp_ids: Vec<String>,
    #[serde(default)]
    pub target_sub_niche_id: Option<String>,
    #[serde(default)]
    pub angle_count: Option<u32>,
    #[serde(default)]
    pub angle_criteria: Option<String>,
    #[serde(default)]
    pub campaign_performance: Option<Value>,
}

impl PhaseExtras {
    /// Fills unset counts and criteria from `fallback`, keeping anything
    /// already present.
    pub fn or_defaults(mut self, fallback: &PhaseExtras) -> Self {
        if self.icp_count.is_none() {
            self.icp_count = fallback.icp_count;
        }
        if self.icp_criteria.is_none() {
            self.icp_criteria = fallback.icp_criteria.clone();
        }
        if self.angle_count.is_none() {
            self.angle_count = fallback.angle_count;
        }
        if self.angle_criteria.is_none() {
            self.angle_criteria = fallback.angle_criteria.clone();
        }
        self
    }
}

/// Everything a prompt builder may read.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub phase_data: &'a BTreeMap<Phase, Report>,
    pub extras: &'a PhaseExtras,
}

impl<'a> PromptContext<'a> {
    pub fn new(phase_data: &'a BTreeMap<Phase, Report>, extras: &'a PhaseExtras) -> Self {
        Self { phase_data, extras }
    }

    /// Committed report of an earlier phase. Builders only reach prior
    /// reports through here, so a prompt can never depend on a later phase.
    pub fn prior_report(&self, own: Phase, wanted: Phase) -> Result<&'a Report, PromptError> {
        if wanted >= own {
            return Err(PromptError::ForwardReference {
                phase: own,
                referenced: wanted,
            });
        }
        self.phase_data
            .get(&wanted)
            .ok_or(PromptError::MissingPhaseReport {
                phase: own,
                missing: wanted,
            })
    }
}

pub fn build_company_report_prompt(ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    let phase = Phase::CompanyReport;
    let Some(brief) = ctx.extras.brief.as_ref() else {
        return Err(PromptError::MissingInput {
            phase,
            what: "a company brief".to_string(),
        });
    };
    if brief.client_name.trim().is_empty() || brief.domain.trim().is_empty() {
        return Err(PromptError::MissingInput {
            phase,
            what: "a company brief with client name and domain".to_string(),
        });
    }

    let attachments = if brief.file_names.is_empty() {
        String::new()
    } else {
        format!("* **Attached Files:** {}", brief.file_names.join(", "))
    };
    let values = BTreeMap::from([
        ("client_name", brief.client_name.trim().to_string()),
        ("domain", brief.domain.trim().to_string()),
        ("offer_description", brief.offer_description()),
        ("attachments", attachments),
        ("report_schema", COMPANY_REPORT_SCHEMA.trim().to_string()),
    ]);
    render_template(phase, PHASE_1_TEMPLATE, &values)
}

pub fn build_icp_report_prompt(ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    let phase = Phase::IcpReport;
    let company = ctx.prior_report(phase, Phase::CompanyReport)?;
    let extras = ctx.extras;

    let values = BTreeMap::from([
        ("company_report", pretty(phase, &company.to_value())?),
        (
            "icp_count",
            extras.icp_count.unwrap_or(DEFAULT_ICP_COUNT).to_string(),
        ),
        (
            "icp_criteria",
            non_blank(extras.icp_criteria.as_deref())
                .unwrap_or(DEFAULT_ICP_CRITERIA)
                .to_string(),
        ),
        ("icp_schema", ICP_REPORT_SCHEMA.trim().to_string()),
    ]);
    render_template(phase, PHASE_2_TEMPLATE, &values)
}

pub fn build_campaigns_prompt(ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    let phase = Phase::Campaigns;
    let company = ctx.prior_report(phase, Phase::CompanyReport)?;
    let icp = ctx.prior_report(phase, Phase::IcpReport)?;
    let extras = ctx.extras;

    let icp_context = select_icps(icp, &extras.selected_icp_ids);
    let target_sub_niche = non_blank(extras.target_sub_niche_id.as_deref())
        .map(str::to_string)
        .or_else(|| default_sub_niche(&icp_context, &extras.selected_icp_ids))
        .unwrap_or_else(|| "all sub-niches of the selected ICPs".to_string());

    let values = BTreeMap::from([
        ("company_report", pretty(phase, &company.to_value())?),
        ("icp_context", pretty(phase, &icp_context)?),
        ("target_sub_niche", target_sub_niche),
        (
            "angle_count",
            extras.angle_count.unwrap_or(DEFAULT_ANGLE_COUNT).to_string(),
        ),
        (
            "angle_criteria",
            non_blank(extras.angle_criteria.as_deref())
                .unwrap_or(DEFAULT_ANGLE_CRITERIA)
                .to_string(),
        ),
        ("campaign_schema", CAMPAIGN_SCHEMA.trim().to_string()),
    ]);
    render_template(phase, PHASE_3_TEMPLATE, &values)
}

pub fn build_optimization_prompt(ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    let phase = Phase::Optimization;
    let mut values = campaign_history(ctx, phase)?;
    values.insert(
        "campaign_performance",
        performance_text(phase, ctx.extras.campaign_performance.as_ref())?,
    );
    render_template(phase, PHASE_4_TEMPLATE, &values)
}

pub fn build_final_optimization_prompt(ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    let phase = Phase::FinalOptimization;
    let mut values = campaign_history(ctx, phase)?;
    let optimization = ctx.prior_report(phase, Phase::Optimization)?;
    values.insert(
        "campaign_performance",
        performance_text(phase, ctx.extras.campaign_performance.as_ref())?,
    );
    values.insert(
        "optimization_results",
        pretty(phase, &optimization.to_value())?,
    );
    render_template(phase, PHASE_5_TEMPLATE, &values)
}

pub fn build_completed_prompt(_ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    Ok(String::new())
}

fn campaign_history(
    ctx: &PromptContext<'_>,
    phase: Phase,
) -> Result<BTreeMap<&'static str, String>, PromptError> {
    let company = ctx.prior_report(phase, Phase::CompanyReport)?;
    let icp = ctx.prior_report(phase, Phase::IcpReport)?;
    let campaigns = ctx.prior_report(phase, Phase::Campaigns)?;
    Ok(BTreeMap::from([
        ("company_report", pretty(phase, &company.to_value())?),
        ("icp_report", pretty(phase, &icp.to_value())?),
        ("campaigns", pretty(phase, &campaigns.to_value())?),
    ]))
}

fn performance_text(phase: Phase, performance: Option<&Value>) -> Result<String, PromptError> {
    pretty(phase, performance.unwrap_or(&Value::Null))
}

/// ICP report narrowed to the selected ICP ids. An empty selection, or one
/// matching nothing, keeps every ICP.
fn select_icps(icp: &Report, selected: &[String]) -> Value {
    let mut body = icp.body().clone();
    if selected.is_empty() {
        return Value::Object(body);
    }
    if let Some(reports) = icp.get("icp_reports").and_then(Value::as_array) {
        let filtered = reports
            .iter()
            .filter(|entry| {
                entry
                    .get("icp_id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| selected.iter().any(|wanted| wanted == id))
            })
            .cloned()
            .collect::<Vec<_>>();
        if !filtered.is_empty() {
            body.insert("icp_reports".to_string(), Value::Array(filtered));
        }
    }
    Value::Object(body)
}

/// First sub-niche of the first selected ICP, or of the first ICP when
/// nothing is selected.
fn default_sub_niche(icp_context: &Value, selected: &[String]) -> Option<String> {
    let reports = icp_context.get("icp_reports")?.as_array()?;
    let chosen = selected
        .first()
        .and_then(|wanted| {
            reports
                .iter()
                .find(|entry| entry.get("icp_id").and_then(Value::as_str) == Some(wanted))
        })
        .or_else(|| reports.first())?;
    chosen
        .get("sub_niches")?
        .as_array()?
        .first()?
        .get("sub_niche_id")?
        .as_str()
        .map(str::to_string)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn pretty(phase: Phase, value: &Value) -> Result<String, PromptError> {
    serde_json::to_string_pretty(value).map_err(|err| PromptError::Render {
        phase,
        reason: err.to_string(),
    })
}

fn render_template(
    phase: Phase,
    template: &str,
    values: &BTreeMap<&str, String>,
) -> Result<String, PromptError> {
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = template;

    while let Some(start) = cursor.find("{{") {
        rendered.push_str(&cursor[..start]);
        let after_open = &cursor[start + 2..];
        let Some(close_offset) = after_open.find("}}") else {
            return Err(PromptError::Render {
                phase,
                reason: "unclosed placeholder in template".to_string(),
            });
        };
        let token = after_open[..close_offset].trim();
        if let Some(value) = values.get(token) {
            rendered.push_str(value);
        } else if PERSONALIZATION_TOKENS.contains(&token) {
            rendered.push_str("{{");
            rendered.push_str(token);
            rendered.push_str("}}");
        } else {
            return Err(PromptError::Render {
                phase,
                reason: format!("unknown placeholder `{token}`"),
            });
        }
        cursor = &after_open[close_offset + 2..];
    }

    rendered.push_str(cursor);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brief() -> CompanyBrief {
        CompanyBrief {
            client_name: "Northwind".to_string(),
            domain: "northwind.example".to_string(),
            offer_service: Some("Managed outbound".to_string()),
            file_names: vec!["deck.pdf".to_string()],
            ..CompanyBrief::default()
        }
    }

    fn report(value: Value) -> Report {
        Report::from_value(value).expect("report shape")
    }

    fn icp_report() -> Report {
        report(json!({
            "icp_reports": [
                {"icp_id": "icp_alpha", "sub_niches": [{"sub_niche_id": "sub_alpha_1"}]},
                {"icp_id": "icp_beta", "sub_niches": [{"sub_niche_id": "sub_beta_1"}]}
            ]
        }))
    }

    #[test]
    fn company_prompt_renders_brief_and_schema() {
        let extras = PhaseExtras {
            brief: Some(brief()),
            ..PhaseExtras::default()
        };
        let data = BTreeMap::new();
        let prompt = build_company_report_prompt(&PromptContext::new(&data, &extras))
            .expect("prompt");
        assert!(prompt.contains("**Company Name:** Northwind"));
        assert!(prompt.contains("Offer/Service: Managed outbound"));
        assert!(prompt.contains("deck.pdf"));
        assert!(prompt.contains("\"client_offer_brief\""));
        assert!(!prompt.contains("{{client_name}}"));
    }

    #[test]
    fn company_prompt_requires_brief() {
        let extras = PhaseExtras::default();
        let data = BTreeMap::new();
        let err = build_company_report_prompt(&PromptContext::new(&data, &extras))
            .expect_err("missing brief");
        assert!(matches!(err, PromptError::MissingInput { .. }));
    }

    #[test]
    fn icp_prompt_requires_company_report() {
        let extras = PhaseExtras::default();
        let data = BTreeMap::new();
        let err = build_icp_report_prompt(&PromptContext::new(&data, &extras))
            .expect_err("missing report");
        assert_eq!(
            err,
            PromptError::MissingPhaseReport {
                phase: Phase::IcpReport,
                missing: Phase::CompanyReport,
            }
        );
    }

    #[test]
    fn icp_prompt_applies_count_default() {
        let extras = PhaseExtras::default();
        let data = BTreeMap::from([(
            Phase::CompanyReport,
            report(json!({"client_offer_brief": {"company_name": "Northwind"}})),
        )]);
        let prompt = build_icp_report_prompt(&PromptContext::new(&data, &extras))
            .expect("prompt");
        assert!(prompt.contains("Generate **3** distinct"));
        assert!(prompt.contains("\"company_name\": \"Northwind\""));
    }

    #[test]
    fn campaigns_prompt_filters_icps_and_picks_sub_niche() {
        let extras = PhaseExtras {
            selected_icp_ids: vec!["icp_beta".to_string()],
            ..PhaseExtras::default()
        };
        let data = BTreeMap::from([
            (
                Phase::CompanyReport,
                report(json!({"client_offer_brief": {"title": "Brief"}})),
            ),
            (Phase::IcpReport, icp_report()),
        ]);
        let prompt =
            build_campaigns_prompt(&PromptContext::new(&data, &extras)).expect("prompt");
        assert!(prompt.contains("**Target sub-niche:** sub_beta_1"));
        assert!(!prompt.contains("icp_alpha"));
        assert!(prompt.contains("{{first_name}}"));
    }

    #[test]
    fn campaigns_prompt_defaults_to_first_icp() {
        let extras = PhaseExtras::default();
        let data = BTreeMap::from([
            (
                Phase::CompanyReport,
                report(json!({"client_offer_brief": {"title": "Brief"}})),
            ),
            (Phase::IcpReport, icp_report()),
        ]);
        let prompt =
            build_campaigns_prompt(&PromptContext::new(&data, &extras)).expect("prompt");
        assert!(prompt.contains("**Target sub-niche:** sub_alpha_1"));
        assert!(prompt.contains("icp_beta"));
    }

    #[test]
    fn optimization_prompt_renders_null_performance_when_absent() {
        let extras = PhaseExtras::default();
        let data = BTreeMap::from([
            (
                Phase::CompanyReport,
                report(json!({"client_offer_brief": {"title": "Brief"}})),
            ),
            (Phase::IcpReport, icp_report()),
            (
                Phase::Campaigns,
                report(json!({"campaign_blueprints": [{"angle_id": "angle_under_test"}]})),
            ),
        ]);
        let prompt =
            build_optimization_prompt(&PromptContext::new(&data, &extras)).expect("prompt");
        assert!(prompt.contains("**Campaign Performance Data:**\nnull"));
        assert!(prompt.contains("angle_under_test"));
    }

    #[test]
    fn builders_never_see_later_phase_reports() {
        let data = BTreeMap::from([
            (
                Phase::CompanyReport,
                report(json!({"client_offer_brief": {"marker": "SENTINEL_PHASE_1"}})),
            ),
            (
                Phase::IcpReport,
                report(json!({"icp_reports": [{"icp_id": "SENTINEL_PHASE_2"}]})),
            ),
            (
                Phase::Campaigns,
                report(json!({"campaign_blueprints": [{"angle_id": "SENTINEL_PHASE_3"}]})),
            ),
            (
                Phase::Optimization,
                report(json!({"recommendations": ["SENTINEL_PHASE_4"]})),
            ),
            (
                Phase::FinalOptimization,
                report(json!({"final_campaign_strategy": "SENTINEL_PHASE_5"})),
            ),
        ]);
        let extras = PhaseExtras {
            brief: Some(brief()),
            ..PhaseExtras::default()
        };
        let ctx = PromptContext::new(&data, &extras);
        let builders: [(Phase, fn(&PromptContext<'_>) -> Result<String, PromptError>); 5] = [
            (Phase::CompanyReport, build_company_report_prompt),
            (Phase::IcpReport, build_icp_report_prompt),
            (Phase::Campaigns, build_campaigns_prompt),
            (Phase::Optimization, build_optimization_prompt),
            (Phase::FinalOptimization, build_final_optimization_prompt),
        ];
        for (phase, build) in builders {
            let prompt = build(&ctx).expect("prompt");
            for later in Phase::ALL.into_iter().filter(|p| *p >= phase) {
                let marker = format!("SENTINEL_PHASE_{}", later.index() + 1);
                assert!(!prompt.contains(&marker), "{phase} leaked {marker}");
            }
        }
    }

    #[test]
    fn prior_report_rejects_forward_reference() {
        let data = BTreeMap::new();
        let extras = PhaseExtras::default();
        let ctx = PromptContext::new(&data, &extras);
        assert_eq!(
            ctx.prior_report(Phase::IcpReport, Phase::Campaigns),
            Err(PromptError::ForwardReference {
                phase: Phase::IcpReport,
                referenced: Phase::Campaigns,
            })
        );
    }

    #[test]
    fn unknown_placeholder_is_a_render_error() {
        let err = render_template(Phase::IcpReport, "hi {{nope}}", &BTreeMap::new())
            .expect_err("unknown");
        assert!(matches!(err, PromptError::Render { .. }));
    }
}
