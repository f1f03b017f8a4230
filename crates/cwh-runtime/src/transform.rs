use tracing::info;

use crate::error::TransformationError;

/// The warehouse-side procedure that parses staged rows into the
/// dimensional tables. Parameterless; called at most once per invocation.
#[async_trait::async_trait]
pub trait TransformProcedure: Send + Sync {
    fn procedure_name(&self) -> &str;

    async fn call(&self) -> anyhow::Result<()>;
}

pub struct TransformationTrigger<'a> {
    procedure: &'a dyn TransformProcedure,
}

impl<'a> TransformationTrigger<'a> {
    pub fn new(procedure: &'a dyn TransformProcedure) -> Self {
        Self { procedure }
    }

    /// Invoke the procedure once. Never retried.
    pub async fn trigger(&self) -> Result<(), TransformationError> {
        let name = self.procedure.procedure_name();
        info!(procedure = name, "triggering transformation");

        self.procedure
            .call()
            .await
            .map_err(|e| TransformationError::Failed {
                procedure: name.to_string(),
                message: format!("{e:#}"),
            })?;

        info!(procedure = name, "transformation complete");
        Ok(())
    }
}
