use risk_core::{FeatureVector, ResolvedFigures, RiskLevel};
use std::fmt::Write;

use crate::survival::SurvivalEstimate;

/// Everything the generator is told about one assessment
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub score: u8,
    pub level: RiskLevel,
    pub figures: &'a ResolvedFigures,
    pub features: &'a FeatureVector,
    pub survival: &'a SurvivalEstimate,
    pub reasons: &'a [String],
    pub actions: &'a [String],
}

fn bullet_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        out.push_str("- none\n");
    }
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

/// Prompt asking for the JSON shape `ExplanationComposer` parses.
pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let f = ctx.figures;
    let v = ctx.features;
    let mut out = String::with_capacity(1024);

    out.push_str(
        "You are advising the owner of a small business. Explain their financial \
         distress risk in plain language, without jargon.\n\n",
    );
    let _ = writeln!(out, "Risk score: {}/100 ({})", ctx.score, ctx.level);

    out.push_str("\nMonthly figures:\n");
    let _ = writeln!(out, "- sales: {:.2}", f.sales);
    let _ = writeln!(out, "- expenses: {:.2}", f.expenses);
    let _ = writeln!(out, "- pending customer payments: {:.2}", f.receivables);
    let _ = writeln!(out, "- loan payments: {:.2}", f.loan_emi);
    let _ = writeln!(out, "- cash balance: {:.2}", f.cash_balance);

    out.push_str("\nRatios:\n");
    let _ = writeln!(out, "- profit margin: {:.1}%", v.profit_margin * 100.0);
    let _ = writeln!(out, "- pending payments to sales: {:.1}%", v.receivables_ratio * 100.0);
    let _ = writeln!(out, "- loan payments to sales: {:.1}%", v.emi_ratio * 100.0);
    let _ = writeln!(out, "- cash buffer: {:.2} months of expenses", v.cash_buffer_months);
    let _ = writeln!(out, "- sales growth vs prior period: {:.1}%", v.sales_growth_rate * 100.0);
    let _ = writeln!(out, "- expense growth vs prior period: {:.1}%", v.expense_growth_rate * 100.0);

    out.push_str("\nCash runway:\n");
    if ctx.survival.runway_is_capped {
        out.push_str("- not losing money this month\n");
    } else {
        let _ = writeln!(
            out,
            "- losing {:.2} per month, about {:.0} days of cash left",
            ctx.survival.monthly_loss, ctx.survival.estimated_days_left
        );
    }
    let _ = writeln!(
        out,
        "- top fix: {} (target {:.2})",
        ctx.survival.priority_action.top_fix, ctx.survival.priority_action.target_amount
    );

    out.push_str("\nWarning signs found:\n");
    bullet_list(&mut out, ctx.reasons);
    out.push_str("\nSuggested actions:\n");
    bullet_list(&mut out, ctx.actions);

    out.push_str(
        "\nReply with JSON only, exactly in this shape:\n\
         {\"summary\": \"2 sentences that quote at least one number above\", \
         \"key_drivers\": [\"2 to 4 short causes\"], \
         \"immediate_actions\": [\"2 to 4 concrete steps for this week\"]}\n",
    );
    out
}
