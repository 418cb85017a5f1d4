//! The graded review entry point.
//!
//! `review` wires the three evidence sources into one bounded prompt: the
//! submitted plan (verbatim), an optional structural scan of the target
//! molecule, and the top-k retrieved safety rules. Section order and
//! delimiters are fixed so the backend can tell user input from retrieved
//! evidence from derived structure facts.

use std::sync::Arc;

use chemsafe_index::{IndexError, RuleIndex};
use chemsafe_mol::AnalysisResult;

use crate::config::Config;
use crate::llm::{BackendError, ChatBackend};

/// Grading rubric and reporting obligations, fixed for every review.
pub const SYSTEM_PROMPT: &str = "\
你是一个化工安全专家。请根据【检索到的知识库规则】和【分子结构分析结果】，审查用户的合成方案。

你的职责：
1. 仔细分析检索到的每一条规则，判断是否与用户的方案相关
2. 结合分子结构分析结果（如硝基数量、叠氮基团、过氧键等），评估风险等级
3. 如果发现违规或高风险，必须直接给出判定：
   - 🔴 红牌拦截：存在严重安全隐患，必须立即停止
   - 🟡 黄牌警告：存在潜在风险，需要采取额外防护措施
   - 🟢 绿色通过：未发现明显安全问题
4. 必须引用知识库原文作为依据
5. 给出具体的安全建议

请用中文回复，格式化输出审查报告。";

const PASS_MARKER: &str = "🟢";
const BLOCK_MARKER: &str = "🔴";
const WARN_MARKER: &str = "🟡";

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("synthesis plan is empty")]
    EmptyPlan,
    #[error("knowledge base has not been built; run a rebuild before reviewing")]
    IndexUnavailable,
    #[error("rule retrieval failed: {0}")]
    Retrieval(#[from] IndexError),
    #[error("reasoning backend failed: {0}")]
    Backend(#[from] BackendError),
}

pub struct ReviewAgent {
    index: Arc<RuleIndex>,
    backend: Arc<dyn ChatBackend>,
    config: Config,
}

impl ReviewAgent {
    pub fn new(index: Arc<RuleIndex>, backend: Arc<dyn ChatBackend>, config: Config) -> Self {
        Self {
            index,
            backend,
            config,
        }
    }

    /// Review a synthesis plan, optionally grounded by the target
    /// molecule's notation. Returns the backend's report verbatim (plus an
    /// advisory note when the opt-in consistency check trips).
    pub fn review(&self, plan_text: &str, smiles: Option<&str>) -> Result<String, ReviewError> {
        let plan = plan_text.trim();
        if plan.is_empty() {
            return Err(ReviewError::EmptyPlan);
        }
        let plan = truncate_chars(plan, self.config.max_plan_chars);

        // Gate before any backend traffic: a review against an empty
        // knowledge base would grade on nothing.
        if self.index.count() == 0 {
            return Err(ReviewError::IndexUnavailable);
        }

        let analysis = smiles.map(chemsafe_mol::analyze);

        let mut query = plan.to_string();
        if let Some(s) = smiles {
            query.push_str(&format!(" (分子SMILES: {s})"));
        }
        let hits = self.index.search(&query, self.config.top_k)?;
        let rendered_rules = hits
            .iter()
            .enumerate()
            .map(|(i, h)| format!("规则{}: {}", i + 1, h.rule.text()))
            .collect::<Vec<_>>()
            .join("\n");

        let user_message = assemble_user_message(plan, analysis.as_ref(), &rendered_rules);
        tracing::debug!(
            rules = hits.len(),
            has_structure = analysis.is_some(),
            "submitting review prompt"
        );

        let mut report = self.backend.complete(SYSTEM_PROMPT, &user_message)?;

        if self.config.verdict_consistency_check {
            if let Some(result) = analysis.as_ref() {
                if let Some(note) = consistency_note(result, &report) {
                    report.push_str(&note);
                }
            }
        }
        Ok(report)
    }
}

fn assemble_user_message(
    plan: &str,
    analysis: Option<&AnalysisResult>,
    rendered_rules: &str,
) -> String {
    let mut msg = String::new();
    msg.push_str("## 用户提交的合成方案\n\n");
    msg.push_str(plan);
    msg.push('\n');
    if let Some(result) = analysis {
        msg.push_str("\n【分子结构分析结果】\n");
        msg.push_str(&result.summary);
        msg.push('\n');
    }
    msg.push_str("\n## 检索到的知识库规则\n\n");
    msg.push_str(rendered_rules);
    msg.push_str("\n\n---\n请根据以上信息，生成安全审查报告。\n");
    msg
}

/// Advisory-only cross-check: a pass verdict next to a critical structural
/// finding gets a visible discrepancy note. The verdict itself is never
/// rewritten.
fn consistency_note(result: &AnalysisResult, report: &str) -> Option<String> {
    let critical = result
        .warnings
        .iter()
        .any(|w| w.starts_with("high-energy material") || w.starts_with("critical instability"));
    if !critical {
        return None;
    }
    let passed = report.contains(PASS_MARKER)
        && !report.contains(BLOCK_MARKER)
        && !report.contains(WARN_MARKER);
    if !passed {
        return None;
    }
    tracing::warn!("review verdict contradicts critical structural findings");
    Some(
        "\n\n---\n⚠️ 一致性提示：结构分析检出高危特征，但报告判定为通过。\
         请人工复核以下结构警告：\n"
            .to_string()
            + &result
                .warnings
                .iter()
                .map(|w| format!("- {w}"))
                .collect::<Vec<_>>()
                .join("\n"),
    )
}

/// Truncate at a char boundary, never mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
