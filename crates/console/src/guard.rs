//! Rendering gate for tenant-scoped pages.
//!
//! Branches only on already-resolved store state; never fetches.

use std::sync::Arc;

use condo_core::TenantId;

use crate::routes::{Navigator, Route};
use crate::tenant::TenantSelectionStore;

/// Text of the interim prompt shown while the redirect is pending.
pub const SELECTION_PROMPT: &str = "Select a condominium to continue.";

/// Interim content rendered in place of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPrompt {
    pub message: &'static str,
    pub link: Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    RenderChildren,
    /// Children are withheld; render the prompt and redirect to `link`.
    SelectionRequired(SelectionPrompt),
}

impl GuardDecision {
    pub fn renders_children(&self) -> bool {
        matches!(self, GuardDecision::RenderChildren)
    }

    pub fn redirects(&self) -> bool {
        matches!(self, GuardDecision::SelectionRequired(_))
    }
}

/// Pure decision table.
///
/// | selector shown | tenant selected | children | redirect |
/// |---|---|---|---|
/// | no  | any  | yes | no  |
/// | yes | some | yes | no  |
/// | yes | none | no  | yes |
pub fn evaluate(should_show_selector: bool, selected: Option<&TenantId>) -> GuardDecision {
    if !should_show_selector || selected.is_some() {
        return GuardDecision::RenderChildren;
    }
    GuardDecision::SelectionRequired(SelectionPrompt {
        message: SELECTION_PROMPT,
        link: Route::TenantHome,
    })
}

pub struct TenantGuard {
    tenants: Arc<TenantSelectionStore>,
    navigator: Arc<dyn Navigator>,
}

impl TenantGuard {
    pub fn new(tenants: Arc<TenantSelectionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { tenants, navigator }
    }

    /// Decide without side effects.
    pub fn decide(&self) -> GuardDecision {
        let selected = self.tenants.selected_tenant_id();
        evaluate(self.tenants.should_show_selector(), selected.as_ref())
    }

    /// Decide for this render pass.
    ///
    /// When selection is required the redirect is issued here and the
    /// returned prompt is still rendered: navigation may land after this
    /// render completes.
    pub fn render(&self) -> GuardDecision {
        let decision = self.decide();
        if let GuardDecision::SelectionRequired(prompt) = decision {
            tracing::debug!(target_path = prompt.link.path(), "tenant selection required");
            self.navigator.navigate(prompt.link);
        }
        decision
    }
}
