//! Protein target lookup: UniProt IDs associated with a disease.

use std::sync::Arc;

use agent_flow::{
    AgentGateway, CallPolicy, FlowError, GatewayError, GenerateOptions, Result, extract_json,
    generate_with_policy,
};
use tracing::info;

const TARGET_PREAMBLE: &str = "You are a biomedical research assistant. Your task is to identify key proteins associated with a given disease. For each protein, you must provide its standard UniProt ID. Return a single JSON object with one key: `proteins`, which should be a list of strings (the UniProt IDs).";

pub async fn fetch_targets(
    gateway: &Arc<dyn AgentGateway>,
    policy: CallPolicy,
    disease: &str,
) -> Result<Vec<String>> {
    let disease = disease.trim();
    if disease.is_empty() {
        return Err(FlowError::InvalidInput(
            "Disease name must not be empty".to_string(),
        ));
    }

    info!("Looking up protein targets for: {}", disease);

    let response = generate_with_policy(
        gateway.as_ref(),
        TARGET_PREAMBLE,
        &format!("Disease: {}", disease),
        GenerateOptions::json(800, 0.1),
        policy,
    )
    .await?;

    let value = extract_json(&response);
    let proteins: Vec<String> = value
        .get("proteins")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    if proteins.is_empty() {
        return Err(FlowError::Gateway(GatewayError::MalformedResponse(
            "Target response contained no UniProt IDs".to_string(),
        )));
    }

    Ok(proteins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGateway;

    #[tokio::test]
    async fn parses_uniprot_ids_out_of_prose() {
        let gateway: Arc<dyn AgentGateway> = Arc::new(StubGateway::new().reply(
            "Disease: ALS",
            r#"here is data {"proteins":["P1","P2"]} end"#,
        ));

        let targets = fetch_targets(&gateway, CallPolicy::default(), "ALS")
            .await
            .unwrap();
        assert_eq!(targets, vec!["P1", "P2"]);
    }

    #[tokio::test]
    async fn empty_disease_is_rejected() {
        let gateway: Arc<dyn AgentGateway> = Arc::new(StubGateway::new());
        let result = fetch_targets(&gateway, CallPolicy::default(), "  ").await;
        assert!(matches!(result, Err(FlowError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn response_without_proteins_is_malformed() {
        let gateway: Arc<dyn AgentGateway> =
            Arc::new(StubGateway::new().reply("Disease: ALS", "no structure here"));
        let result = fetch_targets(&gateway, CallPolicy::default(), "ALS").await;
        assert!(matches!(
            result,
            Err(FlowError::Gateway(GatewayError::MalformedResponse(_)))
        ));
    }
}
