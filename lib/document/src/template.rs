//! Literal `{key}` substitution.
//!
//! Variables come from `key=value` arguments and are applied in argument
//! order, each as one textual replacement pass over the text produced so
//! far. There is no escaping and no iteration to a fixpoint; placeholders
//! with no matching variable are left untouched.

use crate::error::TemplateError;
use serde::Serialize;

/// Ordered template variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateVariables {
    entries: Vec<(String, String)>,
}

impl TemplateVariables {
    /// Creates an empty variable set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` arguments.
    ///
    /// The value is everything after the first `=`, so it may itself
    /// contain `=`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a token without `=` or with an empty key.
    pub fn parse<I, S>(arguments: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = arguments
            .into_iter()
            .map(|argument| {
                let token = argument.as_ref();
                match token.split_once('=') {
                    Some((key, value)) if !key.is_empty() => {
                        Ok((key.to_string(), value.to_string()))
                    }
                    _ => Err(TemplateError::InvalidArgument {
                        token: token.to_string(),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Adds a variable after the existing ones.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Substitutes every variable into `text`.
    #[must_use]
    pub fn resolve(&self, text: &str) -> String {
        self.entries
            .iter()
            .fold(text.to_string(), |resolved, (key, value)| {
                resolved.replace(&format!("{{{key}}}"), value)
            })
    }

    /// Returns the variables in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses `variables` and substitutes them into `text`.
///
/// # Errors
///
/// Returns `InvalidArgument` if any variable is malformed.
pub fn resolve<S: AsRef<str>>(text: &str, variables: &[S]) -> Result<String, TemplateError> {
    Ok(TemplateVariables::parse(variables)?.resolve(text))
}
