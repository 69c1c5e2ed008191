use crate::config::schema::{
    AppConfig, FormConfig, FormStep, LlmConfig, MemoryConfig, ProviderConfig,
};
use crate::error::{CrewError, Result};
use std::path::Path;

/// Validate Chrome executable path
pub fn validate_chrome_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CrewError::Validation(format!(
            "Chrome executable not found at {:?}",
            path
        )));
    }

    if !path.is_file() {
        return Err(CrewError::Validation(format!(
            "Chrome path {:?} is not a file",
            path
        )));
    }

    // On Unix systems, check if executable
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = path.metadata().map_err(|e| {
            CrewError::Validation(format!("Cannot read Chrome file metadata: {}", e))
        })?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(CrewError::Validation(format!(
                "Chrome executable {:?} is not executable",
                path
            )));
        }
    }

    Ok(())
}

pub fn validate_provider(provider: &ProviderConfig) -> Result<()> {
    if provider.id.trim().is_empty() {
        return Err(CrewError::Validation(
            "Provider id cannot be empty".to_string(),
        ));
    }

    if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://") {
        return Err(CrewError::Validation(format!(
            "Invalid base URL for provider '{}': {}",
            provider.id, provider.base_url
        )));
    }

    if provider.model.trim().is_empty() {
        return Err(CrewError::Validation(format!(
            "Provider '{}' has no model",
            provider.id
        )));
    }

    if provider.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        return Err(CrewError::Validation(format!(
            "Provider '{}' has no API key",
            provider.id
        )));
    }

    Ok(())
}

pub fn validate_memory(memory: &MemoryConfig) -> Result<()> {
    if memory.max_items < 2 {
        return Err(CrewError::Validation(format!(
            "memory.max_items must be at least 2, got {}",
            memory.max_items
        )));
    }
    if memory.max_tokens == 0 {
        return Err(CrewError::Validation(
            "memory.max_tokens must be positive".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_form(form: &FormConfig) -> Result<()> {
    if !form.url.starts_with("http://") && !form.url.starts_with("https://") {
        return Err(CrewError::Validation(format!(
            "Invalid form URL: {}. Must start with http:// or https://",
            form.url
        )));
    }

    for (i, step) in form.steps.iter().enumerate() {
        let selector = match step {
            FormStep::Fill { selector, .. }
            | FormStep::Click { selector, .. }
            | FormStep::Select { selector, .. } => selector,
        };
        if selector.trim().is_empty() {
            return Err(CrewError::Validation(format!(
                "Form step {} has an empty selector",
                i
            )));
        }
    }

    if let Some(selector) = &form.download_selector {
        if selector.trim().is_empty() {
            return Err(CrewError::Validation(
                "form.download_selector cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate the LLM providers. Only LLM-mode runs need them.
pub fn validate_llm(llm: &LlmConfig) -> Result<()> {
    for provider in &llm.providers {
        validate_provider(provider)?;
    }
    Ok(())
}

/// Validate the settings every run uses. The Chrome path is checked at
/// launch and the providers by [`validate_llm`].
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_memory(&config.memory)?;
    validate_form(&config.form)?;
    Ok(())
}
