//! HTTP client for the campaign list and PDF import endpoints.

use std::path::Path;

use log::info;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityCounts {
    #[serde(default)]
    pub npcs: u32,
    #[serde(default)]
    pub locations: u32,
    #[serde(default)]
    pub items: u32,
    #[serde(default)]
    pub plots: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub entity_counts: Option<EntityCounts>,
    #[serde(default)]
    pub has_character: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportAccepted {
    pub status: String,
    pub filename: String,
}

/// Talks to `GET /campaigns/` and `POST /campaigns/import`.
#[derive(Debug, Clone)]
pub struct CampaignDirectory {
    client: reqwest::Client,
    base: String,
}

impl CampaignDirectory {
    pub fn new(server: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: server.trim().trim_end_matches('/').to_string(),
        }
    }

    pub async fn list(&self) -> Result<Vec<CampaignSummary>, SessionError> {
        let url = format!("{}/campaigns/", self.base);
        let campaigns = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<CampaignSummary>>()
            .await?;
        Ok(campaigns)
    }

    /// Upload a campaign PDF; progress reporting is the server's business.
    pub async fn import(&self, path: &Path) -> Result<ImportAccepted, SessionError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "campaign.pdf".to_string());
        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        info!("uploading {} for import", filename);
        let accepted = self
            .client
            .post(format!("{}/campaigns/import", self.base))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<ImportAccepted>()
            .await?;
        Ok(accepted)
    }
}

impl std::fmt::Display for CampaignSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  {}", self.id, self.name)?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        if let Some(counts) = &self.entity_counts {
            write!(
                f,
                " [{} npcs, {} locations, {} items, {} plots]",
                counts.npcs, counts.locations, counts.items, counts.plots
            )?;
        }
        if self.has_character {
            write!(f, " *")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_campaign_list() {
        let raw = r#"[
            {"id":"c1","name":"Lost Mine","source":"lmop.pdf","entityCounts":{"npcs":4,"locations":2,"items":1,"plots":3},"hasCharacter":true},
            {"id":"c2","name":"Blank"}
        ]"#;
        let campaigns: Vec<CampaignSummary> = serde_json::from_str(raw).unwrap();
        assert_eq!(campaigns[0].entity_counts.unwrap().plots, 3);
        assert!(campaigns[0].has_character);
        assert!(!campaigns[1].has_character);
        assert_eq!(
            campaigns[0].to_string(),
            "c1  Lost Mine (lmop.pdf) [4 npcs, 2 locations, 1 items, 3 plots] *"
        );
        assert_eq!(campaigns[1].to_string(), "c2  Blank");
    }
}
