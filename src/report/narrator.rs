//! SITREP generation from a recent-window snapshot.
//!
//! The reporter never fails: collaborator errors become a fixed fallback
//! string, and an empty store short-circuits before any prompt is built.

use crate::analysis::RecentSnapshot;
use crate::report::completion::CompletionClient;
use tracing::{debug, warn};

/// Returned when the collaborator cannot produce a report.
pub const FALLBACK_REPORT: &str = "AI CONNECTION OFFLINE. MANUAL ANALYSIS REQUIRED.";

/// Returned when there are no active events to analyze.
pub const INSUFFICIENT_DATA: &str = "INSUFFICIENT DATA. NO ACTIVE THREATS TO ANALYZE.";

/// Entries of each ranking embedded in the prompt.
const PROMPT_TOP: usize = 3;

pub struct NarrativeReporter {
    client: CompletionClient,
}

impl NarrativeReporter {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Produce a SITREP, the insufficient-data message or the fallback.
    pub async fn generate_report(&self, snapshot: &RecentSnapshot) -> String {
        if snapshot.total_active == 0 {
            debug!("No active events, skipping report generation");
            return INSUFFICIENT_DATA.to_string();
        }

        let prompt = build_prompt(snapshot);
        match self.client.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(kind = e.kind(), "Report generation failed: {}", e);
                FALLBACK_REPORT.to_string()
            }
        }
    }
}

/// Fill the fixed SITREP template.
pub fn build_prompt(snapshot: &RecentSnapshot) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are a cyber threat intelligence analyst writing a short SITREP ");
    prompt.push_str("for a security operations dashboard.\n\n");
    prompt.push_str(&format!(
        "Total active threats: {}\n",
        snapshot.total_active
    ));
    prompt.push_str(&format!(
        "Top attack vectors (last {} events): {}\n",
        snapshot.window_size,
        format_ranking(&snapshot.top_vectors)
    ));
    prompt.push_str(&format!(
        "Top source countries: {}\n\n",
        format_ranking(&snapshot.top_countries)
    ));
    prompt.push_str("Write 3-4 sentences in a terse military briefing style. ");
    prompt.push_str("Name the dominant threat, where it originates and one recommended action. ");
    prompt.push_str("Plain text only, no markdown.");

    prompt
}

fn format_ranking(ranking: &[(String, usize)]) -> String {
    if ranking.is_empty() {
        return "none".to_string();
    }

    ranking
        .iter()
        .take(PROMPT_TOP)
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}
