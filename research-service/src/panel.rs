//! Supervisor-routed specialist panel: one supervisor call picks the lead
//! specialist, then every specialist answers the query concurrently.

use std::sync::Arc;

use agent_flow::{AgentGateway, CallPolicy, GenerateOptions, Result, generate_with_policy};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

const SUPERVISOR_PREAMBLE: &str = "You are a supervisor agent.";

const SUPERVISOR_TASK: &str = "You are a supervisor agent managing a team of specialized AI assistants for drug discovery. Your team consists of: Bioinformatics, Pharmacokinetics, Pharmacodynamics, Clinical Trials, Toxicology, and Regulatory Affairs. Based on the user's query, your task is to identify and respond with ONLY the name of the single most relevant agent to handle the query (e.g., respond with 'Bioinformatics').";

/// A fixed member of the specialist panel
pub struct Specialist {
    pub name: &'static str,
    preamble: &'static str,
    task: &'static str,
}

pub const SPECIALISTS: [Specialist; 6] = [
    Specialist {
        name: "Bioinformatics",
        preamble: "You are a bioinformatics assistant.",
        task: "Your expertise includes gene target identification, sequence analysis, and structural bioinformatics. Provide a detailed analysis based on the user's query.",
    },
    Specialist {
        name: "Pharmacokinetics",
        preamble: "You are a pharmacokinetics (ADME) assistant.",
        task: "Your expertise includes modeling drug Absorption, Distribution, Metabolism, and Excretion. Analyze the query from an ADME perspective.",
    },
    Specialist {
        name: "Pharmacodynamics",
        preamble: "You are a pharmacodynamics assistant.",
        task: "Your expertise includes receptor binding, dose-response relationships, and mechanism of action. Address the query based on these principles.",
    },
    Specialist {
        name: "Clinical Trials",
        preamble: "You are a clinical trials assistant.",
        task: "Your expertise includes trial design, patient recruitment, statistical analysis, and regulatory phases. Frame your response in the context of clinical trials.",
    },
    Specialist {
        name: "Toxicology",
        preamble: "You are a toxicology assistant.",
        task: "Your expertise includes evaluating toxicity profiles, identifying potential adverse effects, and risk assessment. Analyze the query for toxicological relevance.",
    },
    Specialist {
        name: "Regulatory Affairs",
        preamble: "You are a regulatory affairs assistant.",
        task: "Your expertise includes navigating FDA/EMA guidelines, submission processes, and compliance. Provide insights on the regulatory aspects of the query.",
    },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistAnswer {
    pub specialist: String,
    pub answer: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelReview {
    pub lead_specialist: String,
    pub answers: Vec<SpecialistAnswer>,
}

/// Run the full panel for one query.
///
/// The supervisor call happens first and its failure aborts the panel. The
/// specialist calls are a fan-out/fan-in: all issued concurrently, all
/// awaited before returning, and a failing specialist's slot holds its error
/// text without blocking the rest.
pub async fn run_panel(
    gateway: &Arc<dyn AgentGateway>,
    policy: CallPolicy,
    question: &str,
) -> Result<PanelReview> {
    let decision = generate_with_policy(
        gateway.as_ref(),
        SUPERVISOR_PREAMBLE,
        &task_query(SUPERVISOR_TASK, question),
        GenerateOptions::text(800, 0.2),
        policy,
    )
    .await?;

    let lead_specialist = resolve_lead(&decision);
    info!("Supervisor routed query to: {}", lead_specialist);

    let calls = SPECIALISTS.iter().map(|specialist| async move {
        let outcome = generate_with_policy(
            gateway.as_ref(),
            specialist.preamble,
            &task_query(specialist.task, question),
            GenerateOptions::text(800, 0.2),
            policy,
        )
        .await;

        match outcome {
            Ok(answer) => SpecialistAnswer {
                specialist: specialist.name.to_string(),
                answer,
                is_error: false,
            },
            Err(e) => SpecialistAnswer {
                specialist: specialist.name.to_string(),
                answer: e.to_string(),
                is_error: true,
            },
        }
    });

    let answers = join_all(calls).await;

    Ok(PanelReview {
        lead_specialist,
        answers,
    })
}

fn task_query(task: &str, question: &str) -> String {
    format!("{}\n\nUser Query: '{}'", task, question)
}

/// Map the supervisor's free-text decision onto the roster. An unrecognized
/// name falls back to the first specialist, matching the long-standing
/// behavior callers depend on.
fn resolve_lead(decision: &str) -> String {
    let cleaned = decision.replace('.', "");
    let cleaned = cleaned.trim();

    SPECIALISTS
        .iter()
        .find(|specialist| specialist.name == cleaned)
        .unwrap_or(&SPECIALISTS[0])
        .name
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGateway;
    use agent_flow::GatewayError;

    fn all_specialists_reply(mut gateway: StubGateway) -> StubGateway {
        for specialist in &SPECIALISTS {
            gateway = gateway.reply(specialist.preamble, "specialist answer");
        }
        gateway
    }

    #[tokio::test]
    async fn supervisor_decision_selects_lead() {
        let gateway = all_specialists_reply(
            StubGateway::new().reply("supervisor agent managing", "Toxicology."),
        );
        let gateway: Arc<dyn AgentGateway> = Arc::new(gateway);

        let review = run_panel(&gateway, CallPolicy::default(), "Is compound X hepatotoxic?")
            .await
            .unwrap();

        assert_eq!(review.lead_specialist, "Toxicology");
        assert_eq!(review.answers.len(), SPECIALISTS.len());
        assert!(review.answers.iter().all(|a| !a.is_error));
    }

    #[tokio::test]
    async fn unrecognized_decision_falls_back_to_first_specialist() {
        let gateway = all_specialists_reply(
            StubGateway::new().reply("supervisor agent managing", "General Chemistry"),
        );
        let gateway: Arc<dyn AgentGateway> = Arc::new(gateway);

        let review = run_panel(&gateway, CallPolicy::default(), "query")
            .await
            .unwrap();

        assert_eq!(review.lead_specialist, SPECIALISTS[0].name);
    }

    #[tokio::test]
    async fn failing_specialist_slot_holds_error_without_blocking_others() {
        let mut gateway = StubGateway::new()
            .reply("supervisor agent managing", "Bioinformatics")
            .fail(
                "pharmacokinetics (ADME) assistant",
                GatewayError::Api("rate limited".to_string()),
            );
        for specialist in &SPECIALISTS {
            if specialist.name != "Pharmacokinetics" {
                gateway = gateway.reply(specialist.preamble, "fine");
            }
        }
        let gateway: Arc<dyn AgentGateway> = Arc::new(gateway);

        let review = run_panel(&gateway, CallPolicy::default(), "query")
            .await
            .unwrap();

        let failed: Vec<&SpecialistAnswer> =
            review.answers.iter().filter(|a| a.is_error).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].specialist, "Pharmacokinetics");
        assert!(failed[0].answer.contains("rate limited"));
    }

    #[tokio::test]
    async fn supervisor_failure_aborts_panel() {
        let gateway = StubGateway::new().fail(
            "supervisor agent managing",
            GatewayError::Api("down".to_string()),
        );
        let gateway: Arc<dyn AgentGateway> = Arc::new(gateway);

        let result = run_panel(&gateway, CallPolicy::default(), "query").await;
        assert!(result.is_err());
    }
}
