//! Migration identity: a stable name for a logical migrated change
//!
//! Destinations use the identity to recognise re-migrations of the same
//! change (e.g. to update an existing review instead of opening a new one),
//! so the output depends only on the inputs below. No clock, randomness,
//! environment, or hash-map ordering is involved.
//!
//! Two algorithms exist:
//!
//! 1. **Default**: BLAKE3 over the reference component, workflow name,
//!    config identifier and identity owner.
//! 2. **Custom template**: the template is rendered to text, then the text
//!    is hashed together with the identity owner. A template naming a
//!    label the change does not carry falls back to the default algorithm.

use portage_types::{IdentityToken, LabelSource, Revision, WorkflowMode};

const DOMAIN_TAG: &[u8] = b"portage-identity-v1:";
const DEFAULT_IDENTITY_TYPE: &str = "ChangeIdentity";
const CUSTOM_IDENTITY_TYPE: &str = "custom_identity";

/// Inputs shared by both identity algorithms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityInputs<'a> {
    /// Context reference or canonical revision, see [`reference_component`]
    pub reference: &'a str,
    pub workflow_name: &'a str,
    /// Identifier of the main config file
    pub config_path: &'a str,
    pub identity_owner: Option<&'a str>,
}

/// Outcome of rendering a custom template
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedIdentity {
    Text(String),
    /// The template references a label the change does not carry
    MissingLabel(String),
}

/// Pick the reference that identifies `revision` under `mode`
///
/// Iterative mode always uses the canonical revision so that commits
/// sharing a context reference still map to one destination entry each.
pub fn reference_component<R: Revision>(revision: &R, mode: WorkflowMode) -> String {
    match revision.context_reference() {
        Some(context) if !mode.uses_canonical_identity() => context.to_string(),
        _ => revision.as_string(),
    }
}

/// Default identity algorithm
pub fn default_identity(inputs: &IdentityInputs<'_>) -> String {
    hash_identity(
        DEFAULT_IDENTITY_TYPE,
        &[
            ("ref", inputs.reference),
            ("workflow", inputs.workflow_name),
            ("config", inputs.config_path),
        ],
        inputs.identity_owner,
    )
}

/// Render a custom template into the text that gets hashed
pub fn render_template(
    tokens: &[IdentityToken],
    inputs: &IdentityInputs<'_>,
    labels: &dyn LabelSource,
) -> RenderedIdentity {
    let mut text = String::new();
    for token in tokens {
        match token {
            IdentityToken::Literal(literal) => text.push_str(literal),
            IdentityToken::ConfigPath => text.push_str(inputs.config_path),
            IdentityToken::WorkflowName => text.push_str(inputs.workflow_name),
            IdentityToken::Reference => text.push_str(inputs.reference),
            IdentityToken::Label(name) => match labels.label(name) {
                Some(value) => text.push_str(&value),
                None => return RenderedIdentity::MissingLabel(name.clone()),
            },
        }
    }
    RenderedIdentity::Text(text)
}

/// Hash rendered template text with the identity owner
pub fn custom_identity(text: &str, identity_owner: Option<&str>) -> String {
    hash_identity(CUSTOM_IDENTITY_TYPE, &[("text", text)], identity_owner)
}

/// Compute an identity, using `tokens` when non-empty
///
/// A missing label is logged and answered with the default identity.
pub fn compute_identity(
    tokens: &[IdentityToken],
    inputs: &IdentityInputs<'_>,
    labels: &dyn LabelSource,
    on_missing_label: impl FnOnce(&str),
) -> String {
    if tokens.is_empty() {
        return default_identity(inputs);
    }
    match render_template(tokens, inputs, labels) {
        RenderedIdentity::Text(text) => custom_identity(&text, inputs.identity_owner),
        RenderedIdentity::MissingLabel(label) => {
            tracing::warn!(
                label = %label,
                workflow = %inputs.workflow_name,
                "Identity label not found, using the default identity algorithm"
            );
            on_missing_label(&label);
            default_identity(inputs)
        }
    }
}

fn hash_identity(kind: &str, fields: &[(&str, &str)], owner: Option<&str>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN_TAG);
    update_field(&mut hasher, "type", kind);
    for (name, value) in fields {
        update_field(&mut hasher, name, value);
    }
    match owner {
        Some(owner) => update_field(&mut hasher, "owner", owner),
        None => {
            hasher.update(b"no-owner");
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Length-prefixed so that ("ab", "c") and ("a", "bc") never collide
fn update_field(hasher: &mut blake3::Hasher, name: &str, value: &str) {
    hasher.update(name.as_bytes());
    hasher.update(b"=");
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
    hasher.update(b";");
}
