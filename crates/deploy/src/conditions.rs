//! `if` conditions of standalone steps.
//!
//! A condition is a `[left, operator, right]` triple. Terms are `balance(<address>)`,
//! `iscontract(<address>)`, `true`, `false`, unsigned integers or plain strings.

use std::{cmp::Ordering, str::FromStr};

use alloy_core::primitives::U256;
use strum::{Display, EnumString};

use crate::{
    chain::ChainClient,
    project::{Condition, Project},
    resolver::Resolver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Operator {
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessOrEqual,
    #[strum(serialize = "==")]
    Equal,
}

impl Operator {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (_, None) => false,
            (Operator::Greater, Some(o)) => o.is_gt(),
            (Operator::GreaterOrEqual, Some(o)) => o.is_ge(),
            (Operator::Less, Some(o)) => o.is_lt(),
            (Operator::LessOrEqual, Some(o)) => o.is_le(),
            (Operator::Equal, Some(o)) => o.is_eq(),
        }
    }
}

/// An evaluated condition term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Bool(bool),
    Number(U256),
    Text(String),
}

impl Term {
    /// Terms of different kinds are unordered.
    fn compare(&self, other: &Term) -> Option<Ordering> {
        match (self, other) {
            (Term::Bool(a), Term::Bool(b)) => Some(a.cmp(b)),
            (Term::Number(a), Term::Number(b)) => Some(a.cmp(b)),
            (Term::Text(a), Term::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Evaluate a single term, querying the chain for function terms.
pub async fn evaluate_term<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    term: &str,
) -> anyhow::Result<Term> {
    let term = term.trim();

    if let Some((function, argument)) = term.strip_suffix(')').and_then(|t| t.split_once('(')) {
        let client = resolver.client();
        return match function.trim() {
            "balance" => {
                let address = resolver.resolve_address(project, argument.trim()).await?;
                Ok(Term::Number(client.balance(address).await?))
            }
            "iscontract" => {
                let address = resolver.resolve_address(project, argument.trim()).await?;
                Ok(Term::Bool(!client.code(address).await?.is_empty()))
            }
            other => anyhow::bail!("Invalid condition function `{}`", other),
        };
    }

    Ok(match term {
        "true" => Term::Bool(true),
        "false" => Term::Bool(false),
        _ if !term.is_empty() && term.bytes().all(|b| b.is_ascii_digit()) => {
            Term::Number(U256::from_str_radix(term, 10)?)
        }
        _ => Term::Text(term.to_string()),
    })
}

/// Check whether all conditions hold.
///
/// An invalid operator or term makes the condition fail.
pub async fn check_conditions<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    conditions: &[Condition],
) -> bool {
    for Condition(left, operator, right) in conditions {
        let Ok(op) = Operator::from_str(operator.trim()) else {
            tracing::error!(
                project = %project.name(),
                operator = %operator,
                "Invalid condition operator"
            );
            return false;
        };

        let terms = futures::try_join!(
            evaluate_term(resolver, project, left),
            evaluate_term(resolver, project, right),
        );
        let (left_term, right_term) = match terms {
            Ok(terms) => terms,
            Err(err) => {
                tracing::error!(project = %project.name(), error = %err, "Invalid condition term");
                return false;
            }
        };

        if !op.holds(left_term.compare(&right_term)) {
            tracing::debug!(%left, %op, %right, "Condition not met");
            return false;
        }
    }

    true
}
