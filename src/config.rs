//! Page-wide configuration, fixed when the page is built.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::page::ScopeView;

/// Plain-data settings; loadable from JSON with camelCase keys.
///
/// A header name of `null` disables that header's side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ScopeSettings {
    pub debug: bool,
    pub debounce_time: i64,
    pub active_class: String,
    pub reload_header: Option<String>,
    pub title_header: Option<String>,
    pub css_header: Option<String>,
    pub js_header: Option<String>,
    pub status_header: Option<String>,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            debug: false,
            debounce_time: 300,
            active_class: "active".to_string(),
            reload_header: Some("X-Reload".to_string()),
            title_header: Some("X-Title".to_string()),
            css_header: Some("x-include-css".to_string()),
            js_header: Some("x-include-js".to_string()),
            status_header: Some("X-Status".to_string()),
        }
    }
}

impl ScopeSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.debounce_time < 0 {
            return Err(crate::Error::Config(format!(
                "debounceTime must be non-negative, got {}",
                self.debounce_time
            )));
        }
        if self.active_class.split_whitespace().count() != 1 {
            return Err(crate::Error::Config(format!(
                "activeClass must be a single class token, got {:?}",
                self.active_class
            )));
        }
        Ok(())
    }
}

/// Outcome of a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Declined,
}

impl From<bool> for Confirmation {
    fn from(accepted: bool) -> Self {
        if accepted {
            Confirmation::Accepted
        } else {
            Confirmation::Declined
        }
    }
}

pub type ConfirmHandler = Rc<dyn Fn(&str) -> Confirmation>;
pub type StatusHandler = Rc<dyn Fn(&str, u16)>;
pub type LoadHook = Rc<dyn Fn(&mut ScopeView<'_>) -> Result<()>>;

/// Settings plus the host-supplied handlers.
///
/// Without a confirm handler the page's mocked confirm queue answers; without
/// a status handler status messages are recorded as alerts.
#[derive(Clone, Default)]
pub struct ScopeConfig {
    pub settings: ScopeSettings,
    pub(crate) confirm_handler: Option<ConfirmHandler>,
    pub(crate) status_handler: Option<StatusHandler>,
    pub(crate) on_load: Option<LoadHook>,
}

impl ScopeConfig {
    pub fn new(settings: ScopeSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_confirm_handler(mut self, handler: impl Fn(&str) -> Confirmation + 'static) -> Self {
        self.confirm_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_status_handler(mut self, handler: impl Fn(&str, u16) + 'static) -> Self {
        self.status_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_on_load(
        mut self,
        hook: impl Fn(&mut ScopeView<'_>) -> Result<()> + 'static,
    ) -> Self {
        self.on_load = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for ScopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeConfig")
            .field("settings", &self.settings)
            .field("confirm_handler", &self.confirm_handler.is_some())
            .field("status_handler", &self.status_handler.is_some())
            .field("on_load", &self.on_load.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_overrides_merge_with_defaults() -> Result<()> {
        let settings =
            ScopeSettings::from_json(r#"{"debug": true, "debounceTime": 50, "titleHeader": null}"#)?;
        assert!(settings.debug);
        assert_eq!(settings.debounce_time, 50);
        assert_eq!(settings.title_header, None);
        assert_eq!(settings.reload_header.as_deref(), Some("X-Reload"));
        assert_eq!(settings.active_class, "active");
        Ok(())
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            ScopeSettings::from_json(r#"{"debounce": 1}"#),
            Err(crate::Error::Config(_))
        ));
        assert!(matches!(
            ScopeSettings::from_json(r#"{"debounceTime": -1}"#),
            Err(crate::Error::Config(_))
        ));
        assert!(matches!(
            ScopeSettings::from_json(r#"{"activeClass": "a b"}"#),
            Err(crate::Error::Config(_))
        ));
    }
}
