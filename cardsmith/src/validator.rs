//! Card validation seam
//!
//! Validators report problems as text. An empty string means the card is
//! valid. `Err` is reserved for failures to look things up, not for invalid
//! cards.

use async_trait::async_trait;
use cardsmith_store::Card;

use crate::error::Result;
use crate::project::Project;

/// Checks a card before it is written
#[async_trait]
pub trait CardValidator: Send + Sync {
    /// Problems with `card`, one per line; empty when valid
    async fn validate_card(&self, project: &Project, card: &Card) -> Result<String>;
}

/// Checks the structural contract: no structural fields in metadata, the card
/// type and its workflow resolve, and the workflow knows the card's state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

#[async_trait]
impl CardValidator for StructuralValidator {
    async fn validate_card(&self, project: &Project, card: &Card) -> Result<String> {
        let Some(metadata) = &card.metadata else {
            return Ok(String::new());
        };

        let mut problems: Vec<String> = metadata
            .structural_fields()
            .into_iter()
            .map(|field| format!("metadata contains structural field '{field}'"))
            .collect();

        match project.resolver().card_type(&metadata.card_type).await? {
            None => problems.push(format!("card type '{}' not found", metadata.card_type)),
            Some(card_type) => match project.resolver().workflow(&card_type.workflow).await? {
                None => problems.push(format!(
                    "workflow '{}' of card type '{}' not found",
                    card_type.workflow, card_type.name
                )),
                Some(workflow) if !workflow.has_state(&metadata.workflow_state) => {
                    problems.push(format!(
                        "state '{}' is not a state of workflow '{}'",
                        metadata.workflow_state, workflow.name
                    ))
                }
                Some(_) => {}
            },
        }

        Ok(problems.join("\n"))
    }
}
