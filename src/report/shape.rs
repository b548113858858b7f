use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

const COMPANY_KEYS: &[&str] = &[
    "client_offer_brief",
    "market_competitive_analysis",
    "core_value_proposition",
];

const LEGACY_COMPANY_KEYS: &[&str] = &[
    "company_overview",
    "target_market_analysis",
    "competitive_landscape",
    "overview",
    "targetMarket",
    "valueProposition",
    "pricing",
];

const OPTIMIZATION_KEYS: &[&str] = &[
    "recommendations",
    "strategic_recommendations",
    "marketing_and_sales_recommendations",
    "optimization_recommendations",
    "performance_analysis",
    "final_campaign_strategy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Company,
    Icp,
    Campaign,
    Optimization,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Icp => "icp",
            Self::Campaign => "campaign",
            Self::Optimization => "optimization",
        }
    }

    /// Classifies a candidate by its top-level keys only. Predicates are
    /// evaluated in declaration order and the first match wins, so a legacy
    /// payload carrying keys of two shapes resolves deterministically.
    pub fn classify(value: &Value) -> Option<Self> {
        Self::classify_map(value.as_object()?)
    }

    pub fn classify_map(map: &Map<String, Value>) -> Option<Self> {
        if has_any_truthy(map, COMPANY_KEYS) || has_any_truthy(map, LEGACY_COMPANY_KEYS) {
            return Some(Self::Company);
        }
        if map.get("icp_reports").is_some_and(Value::is_array) {
            return Some(Self::Icp);
        }
        if map.get("campaign_blueprints").is_some_and(Value::is_array)
            || map.get("target_profile").is_some_and(is_truthy)
        {
            return Some(Self::Campaign);
        }
        if has_any_truthy(map, OPTIMIZATION_KEYS) {
            return Some(Self::Optimization);
        }
        None
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn is_report_shaped(value: &Value) -> bool {
    ReportKind::classify(value).is_some()
}

fn has_any_truthy(map: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| map.get(*key).is_some_and(is_truthy))
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A shape-accepted report object. Serializes as its raw body so the
/// persisted phase bucket holds exactly what the task service produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    kind: ReportKind,
    body: Map<String, Value>,
}

impl Report {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(body) => Self::from_map(body),
            _ => None,
        }
    }

    pub fn from_map(body: Map<String, Value>) -> Option<Self> {
        let kind = ReportKind::classify_map(&body)?;
        Some(Self { kind, body })
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Conversation role carried on the report object itself, if any.
    pub fn role(&self) -> Option<&str> {
        self.body.get("role").and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl Serialize for Report {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.body.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Report {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let body = Map::deserialize(deserializer)?;
        Self::from_map(body)
            .ok_or_else(|| D::Error::custom("stored report does not match any known report shape"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_objects() {
        assert!(!is_report_shaped(&Value::Null));
        assert!(!is_report_shaped(&json!("client_offer_brief")));
        assert!(!is_report_shaped(&json!([{"icp_reports": []}])));
        assert!(!is_report_shaped(&json!(42)));
    }

    #[test]
    fn classifies_each_phase_shape() {
        assert_eq!(
            ReportKind::classify(&json!({"client_offer_brief": {"title": "x"}})),
            Some(ReportKind::Company)
        );
        assert_eq!(
            ReportKind::classify(&json!({"company_overview": "legacy"})),
            Some(ReportKind::Company)
        );
        assert_eq!(
            ReportKind::classify(&json!({"icp_reports": []})),
            Some(ReportKind::Icp)
        );
        assert_eq!(
            ReportKind::classify(&json!({"campaign_blueprints": [{"angle_id": "a"}]})),
            Some(ReportKind::Campaign)
        );
        assert_eq!(
            ReportKind::classify(&json!({"target_profile": {"icp_id": "icp_001"}})),
            Some(ReportKind::Campaign)
        );
        assert_eq!(
            ReportKind::classify(&json!({"recommendations": ["scale angle 2"]})),
            Some(ReportKind::Optimization)
        );
    }

    #[test]
    fn falsy_and_mistyped_keys_do_not_count() {
        assert!(!is_report_shaped(&json!({"client_offer_brief": null})));
        assert!(!is_report_shaped(&json!({"client_offer_brief": ""})));
        assert!(!is_report_shaped(&json!({"icp_reports": {"icp_id": "x"}})));
        assert!(!is_report_shaped(&json!({"campaign_blueprints": "none"})));
        assert!(!is_report_shaped(&json!({"message": "task still running"})));
        assert!(!is_report_shaped(&json!({})));
    }

    #[test]
    fn overlapping_keys_resolve_in_predicate_order() {
        let both = json!({"icp_reports": [], "pricing": "flat"});
        assert_eq!(ReportKind::classify(&both), Some(ReportKind::Company));
    }

    #[test]
    fn report_serializes_as_raw_body_and_revalidates_on_decode() {
        let report = Report::from_value(json!({"icp_reports": [{"icp_id": "icp_001"}]}))
            .expect("icp report");
        let encoded = serde_json::to_value(&report).expect("encode");
        assert_eq!(encoded, json!({"icp_reports": [{"icp_id": "icp_001"}]}));

        let decoded: Report = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded.kind(), ReportKind::Icp);

        let err = serde_json::from_value::<Report>(json!({"note": "plain"}))
            .expect_err("unshaped body must not decode");
        assert!(err.to_string().contains("known report shape"));
    }
}
