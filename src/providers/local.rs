use super::{AuthTarget, AuthTargetRequest, CallbackContext, ProviderDelegate};
use crate::models::{ExternalIdentity, ProviderError, ProviderKind, LOCAL_PROVIDER};
use async_trait::async_trait;

/// Completion through this service's own login page
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProvider;

#[async_trait]
impl ProviderDelegate for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn build_auth_target(
        &self,
        request: &AuthTargetRequest<'_>,
    ) -> Result<AuthTarget, ProviderError> {
        Ok(AuthTarget {
            auth_url: format!(
                "{}/login?source=vscode&session_id={}",
                request.server_base_url,
                urlencoding::encode(request.session_id)
            ),
            callback_url: None,
        })
    }

    async fn resolve_identity(
        &self,
        _provider_url: Option<&str>,
        _callback: &CallbackContext,
    ) -> Result<ExternalIdentity, ProviderError> {
        Err(ProviderError::NotApplicable(LOCAL_PROVIDER.to_string()))
    }
}
