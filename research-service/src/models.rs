use serde::{Deserialize, Serialize};

use crate::discussion::{Discussion, DiscussionTurn};
use crate::report::{Outline, ReportStage, ReportWorkflow, render_outline};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateReportResponse {
    pub session_id: String,
    pub stage: ReportStage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportStateResponse {
    pub session_id: String,
    pub stage: ReportStage,
    pub research_question: Option<String>,
    pub outline: Option<Outline>,
    pub outline_preview: Option<String>,
    pub research_data: Option<String>,
    pub draft_report: Option<String>,
    pub final_report: Option<String>,
}

impl ReportStateResponse {
    pub fn from_workflow(session_id: String, workflow: &ReportWorkflow) -> Self {
        Self {
            session_id,
            stage: workflow.stage,
            research_question: workflow.research_question.clone(),
            outline_preview: workflow.outline.as_ref().map(render_outline),
            outline: workflow.outline.clone(),
            research_data: workflow.research_data.clone(),
            draft_report: workflow.draft_report.clone(),
            final_report: workflow.final_report.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutlineRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendReportRequest {
    pub recipient: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PanelRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscussionRequest {
    pub agenda: String,
    pub rounds: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscussionStateResponse {
    pub discussion_id: String,
    pub agenda: String,
    pub rounds: usize,
    pub total_turns: usize,
    pub is_complete: bool,
    pub transcript: Vec<DiscussionTurn>,
}

impl DiscussionStateResponse {
    pub fn from_discussion(discussion_id: String, discussion: &Discussion) -> Self {
        Self {
            discussion_id,
            agenda: discussion.agenda.clone(),
            rounds: discussion.rounds,
            total_turns: discussion.total_turns(),
            is_complete: discussion.is_complete(),
            transcript: discussion.transcript.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DesignRequest {
    pub nanobody: String,
    pub design_goal: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub sequences: Vec<String>,
    pub wildtype: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetsRequest {
    pub disease: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
