//! Simulated team meeting: a fixed roster of personas takes turns round-robin
//! for a bounded number of rounds, each turn seeing only the most recent
//! prior message.

use agent_flow::{AgentGateway, CallPolicy, FlowError, GenerateOptions, Result, generate_with_policy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A fixed role used to frame a prompt; never mutated.
pub struct AgentPersona {
    pub title: &'static str,
    pub expertise: &'static str,
    pub goal: &'static str,
    pub role: &'static str,
}

impl AgentPersona {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a {}. Your expertise is in {}. Your goal is to {}. Your role is to {}.",
            self.title, self.expertise, self.goal, self.role
        )
    }
}

pub const PRINCIPAL_INVESTIGATOR: AgentPersona = AgentPersona {
    title: "Principal Investigator",
    expertise: "applying artificial intelligence to biomedical research",
    goal: "perform research in your area of expertise that maximizes the scientific impact of the work",
    role: "lead a team of experts to solve an important problem in artificial intelligence for biomedicine, make key decisions about the project direction based on team member input, and manage the project timeline and resources",
};

pub const TEAM_MEMBERS: [AgentPersona; 3] = [
    AgentPersona {
        title: "Immunologist",
        expertise: "antibody engineering and immune response characterization",
        goal: "guide the development of antibodies/nanobodies that elicit a strong and broad immune response",
        role: "advise on immunogenicity, cross-reactivity with other variants, and potential for therapeutic application",
    },
    AgentPersona {
        title: "Machine Learning Specialist",
        expertise: "developing algorithms for protein-ligand interactions and optimization",
        goal: "create and apply machine learning models to predict antibody efficacy and optimize binding affinity",
        role: "lead the development of AI tools for predicting interactions and refining antibody designs",
    },
    AgentPersona {
        title: "Computational Biologist",
        expertise: "protein structure prediction and molecular dynamics simulations",
        goal: "develop predictive models to identify potential antibody/nanobody candidates and simulate interactions",
        role: "provide insights into structural dynamics and validate computational predictions",
    },
];

/// Fixed speaking order: the Principal Investigator opens every round.
pub fn roster() -> Vec<&'static AgentPersona> {
    std::iter::once(&PRINCIPAL_INVESTIGATOR)
        .chain(TEAM_MEMBERS.iter())
        .collect()
}

/// Speaker for a zero-indexed turn
pub fn speaker_for_turn(turn: usize) -> &'static AgentPersona {
    let roster = roster();
    roster[turn % roster.len()]
}

/// One message in the transcript; appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionTurn {
    pub agent: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub agenda: String,
    pub rounds: usize,
    pub transcript: Vec<DiscussionTurn>,
}

impl Discussion {
    pub fn new(agenda: impl Into<String>, rounds: usize) -> Self {
        Self {
            agenda: agenda.into(),
            rounds,
            transcript: Vec::new(),
        }
    }

    pub fn total_turns(&self) -> usize {
        self.rounds * roster().len()
    }

    pub fn is_complete(&self) -> bool {
        self.transcript.len() >= self.total_turns()
    }

    /// One-based round number for a zero-indexed turn
    pub fn round_for_turn(&self, turn: usize) -> usize {
        turn / roster().len() + 1
    }
}

/// Kick off the meeting with the Principal Investigator's opening statement.
pub async fn initialize_discussion(
    gateway: &Arc<dyn AgentGateway>,
    policy: CallPolicy,
    discussion: &mut Discussion,
) -> Result<()> {
    if !discussion.transcript.is_empty() {
        return Err(FlowError::InvalidTransition(
            "discussion is already initialized".to_string(),
        ));
    }

    let prompt = format!(
        "As the Principal Investigator, you are starting a team meeting. The research agenda is: '{}'. Please provide your opening statement to the team. Outline the project's direction, key challenges, and your initial goals.",
        discussion.agenda
    );

    let message = speak(gateway, policy, &PRINCIPAL_INVESTIGATOR, &prompt, 0.7).await;
    discussion.transcript.push(DiscussionTurn {
        agent: PRINCIPAL_INVESTIGATOR.title.to_string(),
        message,
    });

    Ok(())
}

/// Advance the meeting by one turn for the next persona in line.
///
/// Returns whether the discussion is complete after this call. A gateway
/// failure becomes that turn's message; the turn counter always moves
/// forward.
pub async fn advance_discussion(
    gateway: &Arc<dyn AgentGateway>,
    policy: CallPolicy,
    discussion: &mut Discussion,
) -> Result<bool> {
    if discussion.transcript.is_empty() {
        return Err(FlowError::InvalidTransition(
            "discussion must be initialized before advancing".to_string(),
        ));
    }

    if discussion.is_complete() {
        return Ok(true);
    }

    let turn = discussion.transcript.len();
    let speaker = speaker_for_turn(turn);
    let round = discussion.round_for_turn(turn);
    let last = &discussion.transcript[turn - 1];

    info!(
        "Discussion turn {} of {}: {} (round {})",
        turn + 1,
        discussion.total_turns(),
        speaker.title,
        round
    );

    let prompt = format!(
        "The research agenda is: '{}'.\n\nThis is a multi-turn team discussion. Here is the most recent contribution:\n'{} said: {}'\n\nNow, as the {}, it is your turn to speak. Please provide your input for Round {} of {}. Build upon the previous points and offer your unique perspective.",
        discussion.agenda, last.agent, last.message, speaker.title, round, discussion.rounds
    );

    let message = speak(gateway, policy, speaker, &prompt, 0.7).await;
    discussion.transcript.push(DiscussionTurn {
        agent: speaker.title.to_string(),
        message,
    });

    Ok(discussion.is_complete())
}

async fn speak(
    gateway: &Arc<dyn AgentGateway>,
    policy: CallPolicy,
    persona: &AgentPersona,
    prompt: &str,
    temperature: f64,
) -> String {
    let outcome = generate_with_policy(
        gateway.as_ref(),
        &persona.system_prompt(),
        prompt,
        GenerateOptions::text(800, temperature),
        policy,
    )
    .await;

    match outcome {
        Ok(message) => message,
        Err(e) => format!("Error generating {} response: {}", persona.title, e),
    }
}
