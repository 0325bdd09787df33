use super::Reconciler;
use crate::error::Result;
use crate::models::ObjectId;

/// Templates found on the server, and the requested names that were not
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateResolution {
    pub ids: Vec<ObjectId>,
    pub missing: Vec<String>,
}

impl Reconciler<'_> {
    /// Resolve template names to ids with a single search call.
    ///
    /// The search is a substring match on the server side; only exact name
    /// matches are kept. Missing templates are warnings, never errors.
    pub async fn resolve_templates(&mut self, names: &[String]) -> Result<TemplateResolution> {
        if names.is_empty() {
            self.report.warn(
                "No templates configured, the host will be created without templates".into(),
            );
            return Ok(TemplateResolution::default());
        }

        let found = self.api.template_search(names).await?;

        let mut resolution = TemplateResolution::default();
        for name in names {
            match found.iter().find(|t| &t.name == name) {
                Some(template) if !resolution.ids.contains(&template.templateid) => {
                    resolution.ids.push(template.templateid.clone());
                }
                Some(_) => {}
                None => {
                    self.report
                        .warn(format!("Template '{}' not found (check the name)", name));
                    resolution.missing.push(name.clone());
                }
            }
        }

        if resolution.ids.is_empty() {
            self.report
                .warn("No template found, the host will be created without templates".into());
        } else {
            tracing::info!(
                "Templates resolved: {}",
                names
                    .iter()
                    .filter(|n| !resolution.missing.contains(n))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(resolution)
    }
}
