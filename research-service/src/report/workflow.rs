use std::sync::Arc;

use agent_flow::{
    AgentGateway, CallPolicy, FlowError, GatewayError, GenerateOptions, Result, extract_json,
    generate_with_policy,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::outline::Outline;

const WEB_RESEARCH_PREAMBLE: &str = "You are a web research assistant. Your goal is to provide a concise summary of the most important, recent findings and key concepts related to the user's query. Focus on information that would be relevant for a scientific report.";

const REPORT_AGENT_PREAMBLE: &str = "You are a scientific report assistant for life-sciences research.";

/// One discrete position in the report workflow's fixed linear sequence.
///
/// Variant order is the stage order; the derived `Ord` is the transition
/// order, so monotonicity is checkable with `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    Start,
    OutlineGenerated,
    ResearchGathered,
    WritingComplete,
    EditingComplete,
}

/// One user's in-progress report generation.
///
/// Each transition takes the current value and returns the next one; a failed
/// transition returns an error and the caller keeps the value it passed in,
/// so the stored workflow only ever reflects completed transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportWorkflow {
    #[serde(rename = "report_generation_stage")]
    pub stage: ReportStage,
    pub research_question: Option<String>,
    #[serde(rename = "report_outline")]
    pub outline: Option<Outline>,
    pub research_data: Option<String>,
    pub draft_report: Option<String>,
    pub final_report: Option<String>,
}

impl ReportWorkflow {
    pub fn new() -> Self {
        Self {
            stage: ReportStage::Start,
            research_question: None,
            outline: None,
            research_data: None,
            draft_report: None,
            final_report: None,
        }
    }

    /// Unconditional backward transition: clears every artifact and returns
    /// to the initial stage.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ReportWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the five-stage report workflow: each method performs exactly one
/// transition backed by one (or, for drafting, one-per-section) gateway call.
#[derive(Clone)]
pub struct ReportController {
    gateway: Arc<dyn AgentGateway>,
    policy: CallPolicy,
}

impl ReportController {
    pub fn new(gateway: Arc<dyn AgentGateway>, policy: CallPolicy) -> Self {
        Self { gateway, policy }
    }

    async fn generate(&self, system: &str, user: &str, options: GenerateOptions) -> Result<String> {
        generate_with_policy(self.gateway.as_ref(), system, user, options, self.policy)
            .await
            .map_err(FlowError::from)
    }

    /// `start → outline_generated`: summarize the current state of knowledge
    /// for the question, then request a structured outline informed by it.
    pub async fn generate_outline(
        &self,
        workflow: &ReportWorkflow,
        question: &str,
    ) -> Result<ReportWorkflow> {
        require_stage(workflow, ReportStage::Start, "generate_outline")?;

        let question = question.trim();
        if question.is_empty() {
            return Err(FlowError::InvalidInput(
                "Research question must not be empty".to_string(),
            ));
        }

        info!("Generating report outline for: {}", question);

        let research_summary = self
            .generate(WEB_RESEARCH_PREAMBLE, question, GenerateOptions::text(1000, 0.3))
            .await?;

        let outline_response = self
            .generate(
                REPORT_AGENT_PREAMBLE,
                &outline_prompt(question, &research_summary),
                GenerateOptions::json(2000, 0.2),
            )
            .await?;

        let outline = parse_outline(&outline_response)?;

        let mut next = workflow.clone();
        next.research_question = Some(question.to_string());
        next.outline = Some(outline);
        next.stage = ReportStage::OutlineGenerated;
        Ok(next)
    }

    /// `outline_generated → research_gathered`: one call gathering cited
    /// research text across the whole outline.
    pub async fn gather_research(&self, workflow: &ReportWorkflow) -> Result<ReportWorkflow> {
        require_stage(workflow, ReportStage::OutlineGenerated, "gather_research")?;
        let question = required_artifact(workflow.research_question.as_deref(), "research question")?;
        let outline = required_outline(workflow)?;

        info!("Gathering cited research for: {}", question);

        let outline_json = serde_json::to_string(outline)
            .map_err(|e| FlowError::StorageError(format!("Failed to serialize outline: {}", e)))?;

        let research_data = self
            .generate(
                REPORT_AGENT_PREAMBLE,
                &research_prompt(question, &outline_json),
                GenerateOptions::text(4000, 0.3),
            )
            .await?;

        let mut next = workflow.clone();
        next.research_data = Some(research_data);
        next.stage = ReportStage::ResearchGathered;
        Ok(next)
    }

    /// `research_gathered → writing_complete`: one gateway call per section,
    /// in outline order. Any section failure aborts the whole loop and
    /// discards all partial content; a draft only exists once every section
    /// has been written.
    ///
    /// `progress` is invoked with (zero-based section index, total) before
    /// each section is written.
    pub async fn write_draft<F>(
        &self,
        workflow: &ReportWorkflow,
        mut progress: F,
    ) -> Result<ReportWorkflow>
    where
        F: FnMut(usize, usize) + Send,
    {
        require_stage(workflow, ReportStage::ResearchGathered, "write_draft")?;
        let outline = required_outline(workflow)?;
        let research_data = required_artifact(workflow.research_data.as_deref(), "research data")?;

        let total = outline.sections.len();
        let mut draft = String::new();

        for (index, section) in outline.sections.iter().enumerate() {
            progress(index, total);
            info!("Writing section {} of {}: {}", index + 1, total, section);

            let section_view = outline.section_view(section);
            let content = self
                .generate(
                    REPORT_AGENT_PREAMBLE,
                    &writer_prompt(section, &section_view.to_string(), research_data),
                    GenerateOptions::text(4000, 0.5),
                )
                .await?;

            draft.push_str(&format!("\n\n## {}\n\n{}", section, content));
        }

        let mut next = workflow.clone();
        next.draft_report = Some(draft);
        next.stage = ReportStage::WritingComplete;
        Ok(next)
    }

    /// `writing_complete → editing_complete`: one call polishing the full
    /// draft into the final report.
    pub async fn edit_report(&self, workflow: &ReportWorkflow) -> Result<ReportWorkflow> {
        require_stage(workflow, ReportStage::WritingComplete, "edit_report")?;
        let question = required_artifact(workflow.research_question.as_deref(), "research question")?;
        let draft = required_artifact(workflow.draft_report.as_deref(), "draft report")?;

        info!("Editing final report for: {}", question);

        let final_report = self
            .generate(
                REPORT_AGENT_PREAMBLE,
                &editor_prompt(question, draft),
                GenerateOptions::text(4000, 0.3),
            )
            .await?;

        let mut next = workflow.clone();
        next.final_report = Some(final_report);
        next.stage = ReportStage::EditingComplete;
        Ok(next)
    }
}

fn require_stage(workflow: &ReportWorkflow, expected: ReportStage, transition: &str) -> Result<()> {
    if workflow.stage != expected {
        return Err(FlowError::InvalidTransition(format!(
            "{} requires stage {:?}, current stage is {:?}",
            transition, expected, workflow.stage
        )));
    }
    Ok(())
}

fn required_artifact<'a>(artifact: Option<&'a str>, name: &str) -> Result<&'a str> {
    artifact.ok_or_else(|| FlowError::InvalidTransition(format!("{} is missing", name)))
}

fn required_outline(workflow: &ReportWorkflow) -> Result<&Outline> {
    workflow
        .outline
        .as_ref()
        .ok_or_else(|| FlowError::InvalidTransition("outline is missing".to_string()))
}

fn parse_outline(response: &str) -> Result<Outline> {
    let value = extract_json(response);
    let outline: Outline = serde_json::from_value(value).map_err(|e| {
        FlowError::Gateway(GatewayError::MalformedResponse(format!(
            "Outline response did not match the expected shape: {}",
            e
        )))
    })?;

    if outline.sections.is_empty() {
        return Err(FlowError::Gateway(GatewayError::MalformedResponse(
            "Outline response contained no sections".to_string(),
        )));
    }

    Ok(outline)
}

fn outline_prompt(question: &str, research_summary: &str) -> String {
    format!(
        r#"Create a detailed outline for an interdisciplinary research report on: {question}.
Return a JSON object with 'sections' as a list of section titles, 'subsections' mapping each section title to its key points, and 'descriptions' mapping each section title to a mapping from subsection title to the purpose of that subsection.
Integrate expertise from the scientific fields that relate to the research question, specifying analytical approaches, cross-disciplinary integration points, and mechanistic pathways.
Include the following sections at minimum: Introduction, Literature Review, Methods, Results, Discussion, and Conclusion.
The outline should be precise and specific to the research question, with no placeholder content.
Structure your response as a valid JSON object.

The outline should also use this additional web research to help inform it:
{research_summary}"#
    )
}

fn research_prompt(question: &str, outline_json: &str) -> String {
    format!(
        r#"You respond in markdown. Conduct comprehensive interdisciplinary research on: {question}.
For each subsection in the provided outline, gather key facts, definitions, and recent findings from reliable scientific sources.
For each piece of information, you MUST provide an in-text citation formatted as a clickable markdown link: `[Author, Year](URL)`. The URL must be a direct, public link to the source.
Return a structured summary organized by the outline's subsections, ending with a 'References' section listing the full citation and URL for every source used.
Prioritize peer-reviewed research published in the last 5 years.

Here's the outline for your reference:
{outline_json}"#
    )
}

fn writer_prompt(section: &str, section_outline: &str, research_data: &str) -> String {
    format!(
        r#"You respond in markdown. Act as a scientific writer and generate a verbose, detailed, and comprehensive report section for '{section}'.
Use the supplied research data to produce multi-paragraph content for each subsection; depth and full explanation are the priority.
You MUST preserve the clickable in-text citations provided in the research data, in the format `[Author, Year](URL)`.
Your output should ONLY be the content for the requested '{section}' section. Do not add titles or content for other sections.

Here's the outline for your section:
{section_outline}

Here's the research data, including clickable citations, for you to use:
{research_data}"#
    )
}

fn editor_prompt(question: &str, draft_report: &str) -> String {
    format!(
        r#"You respond in markdown. Review and edit the complete research report for: {question}.
Ensure logical flow, consistency, clarity, grammar, and scientific accuracy, and strengthen the integration between sections.
Verify that all clickable in-text citations `[Author, Year](URL)` are preserved and correctly formatted.
Return the polished report in markdown format.

Here's the draft report:
{draft_report}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGateway;
    use std::sync::Mutex;

    fn controller(gateway: StubGateway) -> ReportController {
        ReportController::new(Arc::new(gateway), CallPolicy::default())
    }

    fn outline_json(sections: &[&str]) -> String {
        serde_json::json!({
            "sections": sections,
            "subsections": {},
            "descriptions": {},
        })
        .to_string()
    }

    fn workflow_at_research_gathered(sections: &[&str]) -> ReportWorkflow {
        let mut workflow = ReportWorkflow::new();
        workflow.stage = ReportStage::ResearchGathered;
        workflow.research_question = Some("What drives neuroinflammation?".to_string());
        workflow.outline = Some(Outline {
            sections: sections.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        });
        workflow.research_data = Some("Research corpus".to_string());
        workflow
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_any_call() {
        let controller = controller(StubGateway::new());
        let workflow = ReportWorkflow::new();

        let result = controller.generate_outline(&workflow, "   ").await;

        assert!(matches!(result, Err(FlowError::InvalidInput(_))));
        assert_eq!(workflow.stage, ReportStage::Start);
    }

    #[tokio::test]
    async fn generate_outline_stores_question_and_outline() {
        let gateway = StubGateway::new()
            .reply("web research assistant", "Summary of recent findings")
            .reply(
                "Create a detailed outline",
                &format!("Here you go: {}", outline_json(&["Introduction", "Methods"])),
            );
        let controller = controller(gateway);

        let workflow = ReportWorkflow::new();
        let next = controller
            .generate_outline(&workflow, "What drives neuroinflammation?")
            .await
            .unwrap();

        assert_eq!(next.stage, ReportStage::OutlineGenerated);
        assert_eq!(
            next.research_question.as_deref(),
            Some("What drives neuroinflammation?")
        );
        assert_eq!(
            next.outline.unwrap().sections,
            vec!["Introduction", "Methods"]
        );
        // Input value untouched
        assert_eq!(workflow.stage, ReportStage::Start);
    }

    #[tokio::test]
    async fn outline_without_sections_fails_transition() {
        let gateway = StubGateway::new()
            .reply("web research assistant", "Summary")
            .reply("Create a detailed outline", "no json in this answer");
        let controller = controller(gateway);

        let workflow = ReportWorkflow::new();
        let result = controller.generate_outline(&workflow, "question").await;

        assert!(matches!(
            result,
            Err(FlowError::Gateway(GatewayError::MalformedResponse(_)))
        ));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_stage_unchanged() {
        let gateway = StubGateway::new().fail(
            "web research assistant",
            GatewayError::Api("quota exhausted".to_string()),
        );
        let controller = controller(gateway);

        let workflow = ReportWorkflow::new();
        let result = controller.generate_outline(&workflow, "question").await;

        assert!(result.is_err());
        assert_eq!(workflow.stage, ReportStage::Start);
        assert!(workflow.outline.is_none());
    }

    #[tokio::test]
    async fn gather_research_advances_with_artifact() {
        let gateway =
            StubGateway::new().reply("comprehensive interdisciplinary research", "Cited findings");
        let controller = controller(gateway);

        let mut workflow = ReportWorkflow::new();
        workflow.stage = ReportStage::OutlineGenerated;
        workflow.research_question = Some("question".to_string());
        workflow.outline = Some(Outline {
            sections: vec!["Introduction".to_string()],
            ..Default::default()
        });

        let next = controller.gather_research(&workflow).await.unwrap();
        assert_eq!(next.stage, ReportStage::ResearchGathered);
        assert_eq!(next.research_data.as_deref(), Some("Cited findings"));
    }

    #[tokio::test]
    async fn draft_concatenation_matches_exact_format() {
        let gateway = StubGateway::new()
            .reply("'Intro'", "IntroBody")
            .reply("'Methods'", "MethodsBody");
        let controller = controller(gateway);

        let workflow = workflow_at_research_gathered(&["Intro", "Methods"]);
        let next = controller.write_draft(&workflow, |_, _| {}).await.unwrap();

        assert_eq!(next.stage, ReportStage::WritingComplete);
        assert_eq!(
            next.draft_report.as_deref(),
            Some("\n\n## Intro\n\nIntroBody\n\n## Methods\n\nMethodsBody")
        );
    }

    #[tokio::test]
    async fn failing_section_discards_all_partial_content() {
        let gateway = StubGateway::new()
            .reply("'A'", "ContentA")
            .fail("'B'", GatewayError::Api("model unavailable".to_string()))
            .reply("'C'", "ContentC");
        let controller = controller(gateway);

        let workflow = workflow_at_research_gathered(&["A", "B", "C"]);
        let result = controller.write_draft(&workflow, |_, _| {}).await;

        assert!(result.is_err());
        assert_eq!(workflow.stage, ReportStage::ResearchGathered);
        assert!(workflow.draft_report.is_none());
    }

    #[tokio::test]
    async fn progress_is_reported_per_section() {
        let gateway = StubGateway::new()
            .reply("'One'", "a")
            .reply("'Two'", "b")
            .reply("'Three'", "c");
        let controller = controller(gateway);

        let workflow = workflow_at_research_gathered(&["One", "Two", "Three"]);
        let seen = Mutex::new(Vec::new());
        controller
            .write_draft(&workflow, |index, total| {
                seen.lock().unwrap().push((index, total));
            })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn edit_report_reaches_terminal_stage() {
        let gateway = StubGateway::new().reply("Review and edit", "Polished report");
        let controller = controller(gateway);

        let mut workflow = workflow_at_research_gathered(&["Intro"]);
        workflow.stage = ReportStage::WritingComplete;
        workflow.draft_report = Some("\n\n## Intro\n\nBody".to_string());

        let next = controller.edit_report(&workflow).await.unwrap();
        assert_eq!(next.stage, ReportStage::EditingComplete);
        assert_eq!(next.final_report.as_deref(), Some("Polished report"));
    }

    #[tokio::test]
    async fn transitions_require_their_predecessor_stage() {
        let controller = controller(StubGateway::new());
        let workflow = ReportWorkflow::new();

        assert!(matches!(
            controller.gather_research(&workflow).await,
            Err(FlowError::InvalidTransition(_))
        ));
        assert!(matches!(
            controller.write_draft(&workflow, |_, _| {}).await,
            Err(FlowError::InvalidTransition(_))
        ));
        assert!(matches!(
            controller.edit_report(&workflow).await,
            Err(FlowError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn stage_is_monotonic_across_successful_transitions() {
        let gateway = StubGateway::new()
            .reply("web research assistant", "Summary")
            .reply(
                "Create a detailed outline",
                &outline_json(&["Intro", "Methods"]),
            )
            .reply("comprehensive interdisciplinary research", "Findings")
            .reply("'Intro'", "IntroBody")
            .reply("'Methods'", "MethodsBody")
            .reply("Review and edit", "Final");
        let controller = controller(gateway);

        let mut stages = vec![ReportStage::Start];
        let workflow = ReportWorkflow::new();

        let workflow = controller
            .generate_outline(&workflow, "question")
            .await
            .unwrap();
        stages.push(workflow.stage);
        let workflow = controller.gather_research(&workflow).await.unwrap();
        stages.push(workflow.stage);
        let workflow = controller.write_draft(&workflow, |_, _| {}).await.unwrap();
        stages.push(workflow.stage);
        let workflow = controller.edit_report(&workflow).await.unwrap();
        stages.push(workflow.stage);

        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(workflow.stage, ReportStage::EditingComplete);
    }

    #[test]
    fn reset_from_any_stage_matches_fresh_workflow() {
        let mut workflow = workflow_at_research_gathered(&["Intro"]);
        workflow.stage = ReportStage::EditingComplete;
        workflow.draft_report = Some("draft".to_string());
        workflow.final_report = Some("final".to_string());

        workflow.reset();

        assert_eq!(workflow, ReportWorkflow::new());
    }

    #[test]
    fn stage_serializes_to_session_key_values() {
        let json = serde_json::to_string(&ReportStage::OutlineGenerated).unwrap();
        assert_eq!(json, "\"outline_generated\"");

        let workflow = serde_json::to_value(ReportWorkflow::new()).unwrap();
        assert_eq!(workflow["report_generation_stage"], "start");
        assert!(workflow.get("report_outline").is_some());
    }
}
