use crate::domain::context::CalculationContext;
use crate::domain::rule::CommissionRule;
use crate::error::{CommissionError, Result};
use std::cmp::Ordering;

/// Points an alliance-scoped rule earns. Exceeds both optional filters
/// combined, so an alliance rule outranks every global one.
const ALLIANCE_WEIGHT: u8 = 3;
const FILTER_WEIGHT: u8 = 1;

/// How specific a rule is for a context, or `None` when it does not apply.
pub fn specificity(rule: &CommissionRule, ctx: &CalculationContext) -> Option<u8> {
    if !rule.matches(ctx) {
        return None;
    }
    let mut score = 0;
    if rule.scope.is_alliance() {
        score += ALLIANCE_WEIGHT;
    }
    if rule.project_type.is_specific() {
        score += FILTER_WEIGHT;
    }
    if rule.product.is_specific() {
        score += FILTER_WEIGHT;
    }
    Some(score)
}

/// Orders two scored candidates so that the preferred one compares `Greater`:
/// higher score, then newer `created_at`, then lower id.
fn preference(a: (u8, &CommissionRule), b: (u8, &CommissionRule)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.created_at.cmp(&b.1.created_at))
        .then_with(|| b.1.id.cmp(&a.1.id))
}

/// Picks the single best rule for `ctx`.
///
/// Pure: the answer depends only on the context and the rule set, not on the
/// order the rules are supplied in. Inactive rules never win.
pub fn resolve<'a, I>(ctx: &CalculationContext, rules: I) -> Result<&'a CommissionRule>
where
    I: IntoIterator<Item = &'a CommissionRule>,
{
    rules
        .into_iter()
        .filter_map(|rule| specificity(rule, ctx).map(|score| (score, rule)))
        .max_by(|a, b| preference(*a, *b))
        .map(|(_, rule)| rule)
        .ok_or_else(|| CommissionError::NoMatchingRule {
            context: ctx.clone(),
        })
}
