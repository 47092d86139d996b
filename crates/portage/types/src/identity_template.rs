//! Custom migration identity templates
//!
//! A template is an ordered list of tokens. Its text form uses `${...}`
//! for variables:
//!
//! ```text
//! ${workflow_name}-${reference}
//! ${config_path}:${label:Topic}
//! ```

use crate::{PortageError, PortageResult};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_VAR: &str = "config_path";
pub const WORKFLOW_NAME_VAR: &str = "workflow_name";
pub const REFERENCE_VAR: &str = "reference";
pub const LABEL_VAR_PREFIX: &str = "label:";

/// One piece of an identity template
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdentityToken {
    Literal(String),
    /// Identifier of the main config file
    ConfigPath,
    WorkflowName,
    /// Context reference, or canonical revision in iterative mode
    Reference,
    /// Value of a metadata label on the change being identified
    Label(String),
}

impl std::fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityToken::Literal(text) => f.write_str(&text.replace('$', "$$")),
            IdentityToken::ConfigPath => write!(f, "${{{}}}", CONFIG_PATH_VAR),
            IdentityToken::WorkflowName => write!(f, "${{{}}}", WORKFLOW_NAME_VAR),
            IdentityToken::Reference => write!(f, "${{{}}}", REFERENCE_VAR),
            IdentityToken::Label(name) => write!(f, "${{{}{}}}", LABEL_VAR_PREFIX, name),
        }
    }
}

/// Ordered identity tokens. Empty means "use the default identity".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityTemplate {
    tokens: Vec<IdentityToken>,
}

impl IdentityTemplate {
    pub fn new(tokens: Vec<IdentityToken>) -> Self {
        Self { tokens }
    }

    /// Parse `${var}` placeholders; `$$` is a literal dollar sign
    pub fn parse(template: &str) -> PortageResult<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }
            match chars.peek() {
                Some((_, '$')) => {
                    chars.next();
                    literal.push('$');
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(PortageError::Validation(format!(
                            "Unterminated variable at position {} in identity template '{}'",
                            pos, template
                        )));
                    }
                    if !literal.is_empty() {
                        tokens.push(IdentityToken::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(variable(&name, template)?);
                }
                _ => {
                    return Err(PortageError::Validation(format!(
                        "Stray '$' at position {} in identity template '{}'",
                        pos, template
                    )))
                }
            }
        }
        if !literal.is_empty() {
            tokens.push(IdentityToken::Literal(literal));
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[IdentityToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn variable(name: &str, template: &str) -> PortageResult<IdentityToken> {
    match name {
        CONFIG_PATH_VAR => Ok(IdentityToken::ConfigPath),
        WORKFLOW_NAME_VAR => Ok(IdentityToken::WorkflowName),
        REFERENCE_VAR => Ok(IdentityToken::Reference),
        _ => match name.strip_prefix(LABEL_VAR_PREFIX) {
            Some(label) if !label.is_empty() => Ok(IdentityToken::Label(label.to_string())),
            _ => Err(PortageError::Validation(format!(
                "Unknown variable '{}' in identity template '{}'",
                name, template
            ))),
        },
    }
}

impl std::fmt::Display for IdentityTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for IdentityTemplate {
    type Error = PortageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IdentityTemplate> for String {
    fn from(template: IdentityTemplate) -> Self {
        template.to_string()
    }
}
