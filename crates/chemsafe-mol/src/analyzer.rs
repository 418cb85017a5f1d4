//! Hazard-structure scanning and derived safety metrics.
//!
//! The hazard library is a flat, data-driven table of named substructure
//! queries evaluated by one generic matcher; there is no per-pattern logic.
//! A pattern whose expression fails to compile is logged and skipped so a
//! bad table entry degrades coverage instead of taking the analyzer down.

use std::sync::OnceLock;

use serde::Serialize;

use crate::smarts::Query;
use crate::smiles::{self, SmilesError};
use crate::substruct;

/// A named substructure query from the fixed hazard library.
#[derive(Debug, Clone, Copy)]
pub struct HazardPattern {
    /// Stable display name; doubles as the report label and dedup key.
    pub name: &'static str,
    pub smarts: &'static str,
}

pub const NITRO: &str = "nitro (-NO2)";
pub const AZIDE: &str = "azide (-N3)";
pub const PEROXIDE: &str = "peroxide (-O-O-)";
pub const RATIO_KEY: &str = "(C+O)/N ratio";
pub const OXYGEN_BALANCE_KEY: &str = "oxygen balance (OB%)";

/// Fixed hazard library, defined once at process start and never mutated.
pub const HAZARD_PATTERNS: &[HazardPattern] = &[
    HazardPattern { name: NITRO, smarts: "[N+](=O)[O-]" },
    HazardPattern { name: AZIDE, smarts: "[N-]=[N+]=[N-]" },
    HazardPattern { name: PEROXIDE, smarts: "[O]-[O]" },
    HazardPattern { name: "nitrate ester (-ONO2)", smarts: "[O][N+](=O)[O-]" },
    HazardPattern { name: "nitramine (N-NO2)", smarts: "[N][N+](=O)[O-]" },
    HazardPattern { name: "diazonium (-N2+)", smarts: "[N+]#N" },
    HazardPattern { name: "isocyanate (-NCO)", smarts: "[N]=[C]=[O]" },
    HazardPattern { name: "hydrazine (-NHNH-)", smarts: "[NH]-[NH]" },
    HazardPattern { name: "gem-dinitro (C(NO2)2)", smarts: "[C]([N+](=O)[O-])[N+](=O)[O-]" },
];

/// Elements the simplified oxygen-balance formula can account for. Any
/// other element present suppresses the metric entirely.
const OXYGEN_BALANCE_ELEMENTS: &[&str] = &["C", "H", "O", "N", "F", "Cl"];

fn compiled_patterns() -> &'static [(HazardPattern, Query)] {
    static COMPILED: OnceLock<Vec<(HazardPattern, Query)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        HAZARD_PATTERNS
            .iter()
            .filter_map(|&pattern| match Query::compile(pattern.smarts) {
                Ok(query) => Some((pattern, query)),
                Err(e) => {
                    tracing::warn!(
                        pattern = pattern.name,
                        smarts = pattern.smarts,
                        error = %e,
                        "skipping hazard pattern that failed to compile"
                    );
                    None
                }
            })
            .collect()
    })
}

/// A per-pattern match count or a derived numeric metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailValue {
    Count(usize),
    Metric(f64),
}

/// Output of one structural scan. `valid = false` results carry only the
/// error message and summary; formula, weight and details stay empty.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub valid: bool,
    pub smiles: String,
    pub formula: Option<String>,
    pub weight: Option<f64>,
    /// Hazard-label → count-or-metric, in evaluation order.
    pub details: Vec<(String, DetailValue)>,
    pub warnings: Vec<String>,
    pub summary: String,
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn detail(&self, name: &str) -> Option<DetailValue> {
        self.details.iter().find(|(n, _)| n == name).map(|&(_, v)| v)
    }

    pub fn count(&self, name: &str) -> usize {
        match self.detail(name) {
            Some(DetailValue::Count(n)) => n,
            _ => 0,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        match self.detail(name) {
            Some(DetailValue::Metric(v)) => Some(v),
            _ => None,
        }
    }

    fn invalid(smiles: &str, error: &SmilesError) -> Self {
        let message = format!("invalid SMILES {smiles:?}: {error}");
        AnalysisResult {
            valid: false,
            smiles: smiles.to_string(),
            formula: None,
            weight: None,
            details: Vec::new(),
            warnings: Vec::new(),
            summary: "the SMILES string could not be parsed as a valid molecule; \
                      check the notation"
                .to_string(),
            error: Some(message),
        }
    }
}

/// Whether `smiles` decodes to a valid molecular graph. Never panics on
/// malformed input; malformed input is a normal, expected case.
pub fn validate(smiles: &str) -> bool {
    smiles::is_valid(smiles)
}

/// Structural safety scan of a single molecule.
pub fn analyze(smiles: &str) -> AnalysisResult {
    let mol = match smiles::parse(smiles) {
        Ok(mol) => mol,
        Err(e) => return AnalysisResult::invalid(smiles, &e),
    };

    let weight = mol.weight();
    let mut result = AnalysisResult {
        valid: true,
        smiles: smiles.to_string(),
        formula: Some(mol.formula()),
        weight: Some(round2(weight)),
        details: Vec::new(),
        warnings: Vec::new(),
        summary: String::new(),
        error: None,
    };

    for (pattern, query) in compiled_patterns() {
        let count = substruct::count_disjoint_matches(&mol, query);
        result.details.push((pattern.name.to_string(), DetailValue::Count(count)));
        if count > 0 {
            result.warnings.push(format!("detected {count} × {}", pattern.name));
        }
    }

    // Composite rule: three or more nitro groups make a high-energy material
    // regardless of the rest of the scaffold.
    let nitro_count = result.count(NITRO);
    if nitro_count >= 3 {
        result.warnings.push(format!(
            "high-energy material: {nitro_count} nitro groups present; \
             treat as high-hazard energetic material"
        ));
    }

    let counts = mol.element_counts();
    let c = counts.get("C").copied().unwrap_or(0);
    let h = counts.get("H").copied().unwrap_or(0);
    let o = counts.get("O").copied().unwrap_or(0);
    let n = counts.get("N").copied().unwrap_or(0);

    // Stability heuristic for nitrogen-rich scaffolds.
    if n > 0 {
        let ratio = round2((c + o) as f64 / n as f64);
        result.details.push((RATIO_KEY.to_string(), DetailValue::Metric(ratio)));
        if ratio < 3.0 && result.count(AZIDE) > 0 {
            result.warnings.push(format!(
                "critical instability: (C+O)/N = {ratio:.2} < 3 with azide present"
            ));
        }
    }

    // Oxygen balance only applies when the simplified CHNO(F,Cl) formula
    // fully characterizes the molecule; otherwise omit, never approximate.
    if counts.keys().all(|sym| OXYGEN_BALANCE_ELEMENTS.contains(sym)) {
        let ob = ((o as f64 - 2.0 * c as f64 - h as f64 / 2.0) / weight) * 1600.0;
        result
            .details
            .push((OXYGEN_BALANCE_KEY.to_string(), DetailValue::Metric(round1(ob))));
    }

    result.summary = render_summary(&result);
    result
}

fn render_summary(result: &AnalysisResult) -> String {
    let mut lines = vec![format!(
        "formula: {}, molecular weight: {}",
        result.formula.as_deref().unwrap_or("?"),
        result.weight.unwrap_or(0.0),
    )];
    if result.warnings.is_empty() {
        lines.push("no known hazard features detected".to_string());
    } else {
        lines.push("--- structural warnings ---".to_string());
        for warning in &result.warnings {
            lines.push(format!("  • {warning}"));
        }
    }
    if let Some(ob) = result.metric(OXYGEN_BALANCE_KEY) {
        lines.push(format!("oxygen balance: {ob}%"));
    }
    lines.join("\n")
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    const TNT: &str = "Cc1c(cc(cc1[N+](=O)[O-])[N+](=O)[O-])[N+](=O)[O-]";
    const DADP: &str = "CC1(OOC(C)(OO1)C)C";
    const NITROGLYCERIN: &str = "[O-][N+](=O)OCC(CO[N+](=O)[O-])O[N+](=O)[O-]";

    #[test]
    fn tnt_scan() {
        let r = analyze(TNT);
        assert!(r.valid);
        assert_eq!(r.formula.as_deref(), Some("C7H5N3O6"));
        assert_abs_diff_eq!(r.weight.unwrap(), 227.13, epsilon = 0.05);
        assert_eq!(r.count(NITRO), 3);
        assert!(r.warnings.iter().any(|w| w.contains("high-energy material")));
        assert_abs_diff_eq!(r.metric(OXYGEN_BALANCE_KEY).unwrap(), -74.0, epsilon = 0.2);
        assert_abs_diff_eq!(r.metric(RATIO_KEY).unwrap(), 4.33, epsilon = 0.01);
    }

    #[test]
    fn peroxide_scan_has_no_nitro_warning() {
        let r = analyze(DADP);
        assert!(r.valid);
        assert!(r.count(PEROXIDE) >= 1);
        assert_eq!(r.count(NITRO), 0);
        assert!(!r.warnings.iter().any(|w| w.contains("high-energy material")));
    }

    #[test]
    fn nitroglycerin_triggers_nitrate_ester_and_composite() {
        let r = analyze(NITROGLYCERIN);
        assert!(r.valid);
        assert_eq!(r.count("nitrate ester (-ONO2)"), 3);
        // Each nitrate ester embeds a nitro group, so the composite fires.
        assert_eq!(r.count(NITRO), 3);
        assert!(r.warnings.iter().any(|w| w.contains("high-energy material")));
    }

    #[test]
    fn azide_instability_warning() {
        let r = analyze("[N-]=[N+]=[N-]");
        assert!(r.valid);
        assert_eq!(r.count(AZIDE), 1);
        assert_eq!(r.metric(RATIO_KEY), Some(0.0));
        assert!(r.warnings.iter().any(|w| w.contains("critical instability")));
    }

    #[test]
    fn azide_warning_needs_low_ratio() {
        // Plenty of carbon: ratio well above 3, so only the per-pattern
        // warning fires.
        let r = analyze("CCCCCCCCCCN=[N+]=[N-]");
        assert!(r.valid);
        assert!(!r.warnings.iter().any(|w| w.contains("critical instability")));
    }

    #[test]
    fn nitro_below_three_has_no_composite_warning() {
        let r = analyze("c1ccc(cc1)[N+](=O)[O-]");
        assert_eq!(r.count(NITRO), 1);
        assert!(!r.warnings.iter().any(|w| w.contains("high-energy material")));
    }

    #[test]
    fn oxygen_balance_present_iff_chno() {
        assert!(analyze("CCO").metric(OXYGEN_BALANCE_KEY).is_some());
        assert!(analyze("ClCCl").metric(OXYGEN_BALANCE_KEY).is_some());
        // Sulfur puts the molecule outside the simplified formula.
        assert!(analyze("CCS").metric(OXYGEN_BALANCE_KEY).is_none());
    }

    #[test]
    fn invalid_input_is_a_normal_result() {
        for bad in ["", "   ", "C1CC", "[Xx]", "not a molecule"] {
            assert!(!validate(bad), "{bad:?} should be invalid");
            let r = analyze(bad);
            assert!(!r.valid);
            assert!(r.formula.is_none());
            assert!(r.weight.is_none());
            assert!(r.details.is_empty());
            assert!(r.error.is_some());
        }
    }

    #[test]
    fn analyze_is_deterministic() {
        let a = analyze(TNT);
        let b = analyze(TNT);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.warnings, b.warnings);
        assert_eq!(format!("{:?}", a.details), format!("{:?}", b.details));
    }

    #[test]
    fn benign_molecule_summary_mentions_no_hazards() {
        let r = analyze("CCO");
        assert!(r.warnings.is_empty());
        assert!(r.summary.contains("no known hazard features detected"));
    }

    #[test]
    fn all_patterns_compile() {
        assert_eq!(compiled_patterns().len(), HAZARD_PATTERNS.len());
    }
}
