//! Service implementation for the static access resolver plugin.

use std::collections::BTreeMap;

use access_resolver_sdk::{AccessResolverError, EvaluationRequest, EvaluationResponse, Rule};

use crate::config::StaticAccessPluginConfig;

/// Static access resolver service.
///
/// Holds an immutable rule table, validated on construction. Evaluation is a
/// pure function of the table and the (resource, action, role) of a request.
#[derive(Debug, Clone)]
pub struct Service {
    rules: BTreeMap<String, Vec<Rule>>,
}

impl Service {
    /// Build the service, checking every rule's column attributes.
    ///
    /// # Errors
    ///
    /// [`AccessResolverError::MisconfiguredRule`] for the first rule that
    /// declares both column lists or neither.
    pub fn new(config: StaticAccessPluginConfig) -> Result<Self, AccessResolverError> {
        for (resource, rules) in &config.resources {
            for (index, rule) in rules.iter().enumerate() {
                rule.attributes.to_policy().map_err(|source| {
                    tracing::error!(%resource, index, error = %source, "invalid access rule");
                    AccessResolverError::MisconfiguredRule {
                        resource: resource.clone(),
                        index,
                        source,
                    }
                })?;
            }
        }
        tracing::info!(
            vendor = %config.vendor,
            resources = config.resources.len(),
            "static access rules loaded"
        );
        Ok(Self {
            rules: config.resources,
        })
    }

    /// Evaluate a request: the first matching rule decides; no match denies.
    ///
    /// # Errors
    ///
    /// [`AccessResolverError::UnknownResource`] when the resource has no rules.
    pub fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResponse, AccessResolverError> {
        let rules = self.rules.get(&request.resource).ok_or_else(|| {
            tracing::error!(resource = %request.resource, "no access rules for resource");
            AccessResolverError::UnknownResource(request.resource.clone())
        })?;

        let role = request.subject.role;
        match rules.iter().find(|rule| rule.matches(request.action, role)) {
            Some(rule) => Ok(EvaluationResponse::allow(rule)),
            None => {
                tracing::debug!(
                    resource = %request.resource,
                    action = %request.action,
                    role = ?role,
                    "no access rule matched"
                );
                Ok(EvaluationResponse::deny())
            }
        }
    }

    #[must_use]
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}
