//! Expression parsing for the in-memory store.
//!
//! Covers the subset the access layer emits: update expressions made of a
//! `SET` clause of `path = :value` assignments and a `REMOVE` clause of paths,
//! and key conditions of the form `path = :value`. Paths are top-level
//! attribute names, either literal or `#placeholder`. Keywords are
//! case-insensitive.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use tablegate_model::{AttributeValue, Item};

/// Errors raised while parsing or resolving an expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression was empty.
    #[error("invalid expression: the expression is empty")]
    Empty,
    /// An unexpected token was found.
    #[error("invalid expression: unexpected token '{token}'")]
    UnexpectedToken {
        /// The offending token.
        token: String,
    },
    /// The expression ended early.
    #[error("invalid expression: unexpected end of expression")]
    UnexpectedEnd,
    /// A clause keyword appeared twice.
    #[error("invalid expression: the {clause} section can only be used once")]
    DuplicateClause {
        /// The repeated clause keyword.
        clause: String,
    },
    /// A name placeholder has no entry in the name map.
    #[error("an expression attribute name used in the expression is not defined: {name}")]
    UnresolvedName {
        /// The placeholder.
        name: String,
    },
    /// A value placeholder has no entry in the value map.
    #[error("an expression attribute value used in the expression is not defined: {name}")]
    UnresolvedValue {
        /// The placeholder.
        name: String,
    },
    /// The name map holds a placeholder the expression never uses.
    #[error("value provided in expression attribute names unused in expressions: {name}")]
    UnusedName {
        /// The placeholder.
        name: String,
    },
    /// The value map holds a placeholder the expression never uses.
    #[error("value provided in expression attribute values unused in expressions: {name}")]
    UnusedValue {
        /// The placeholder.
        name: String,
    },
    /// The same attribute is targeted more than once.
    #[error("two document paths overlap with each other: {attr}")]
    OverlappingPaths {
        /// The attribute name.
        attr: String,
    },
}

/// A single resolved update action.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Assign a value to an attribute.
    Set(String, AttributeValue),
    /// Remove an attribute.
    Remove(String),
}

impl UpdateAction {
    /// The attribute the action targets.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Set(name, _) | Self::Remove(name) => name,
        }
    }
}

/// Parse and resolve an update expression.
///
/// # Errors
///
/// Fails on syntax errors, unresolved or unused placeholders, and overlapping
/// attribute paths.
pub fn parse_update_expression(
    expression: &str,
    names: &BTreeMap<String, String>,
    values: &BTreeMap<String, AttributeValue>,
) -> Result<Vec<UpdateAction>, ExpressionError> {
    let tokens = tokenize(expression);
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut resolver = Resolver::new(names, values);
    let mut actions = Vec::new();
    let mut seen_clauses = BTreeSet::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let keyword = tokens[pos].to_ascii_uppercase();
        if keyword != "SET" && keyword != "REMOVE" {
            return Err(ExpressionError::UnexpectedToken {
                token: tokens[pos].to_owned(),
            });
        }
        if !seen_clauses.insert(keyword.clone()) {
            return Err(ExpressionError::DuplicateClause { clause: keyword });
        }
        pos += 1;

        loop {
            let path = tokens.get(pos).ok_or(ExpressionError::UnexpectedEnd)?;
            let attr = resolver.name(path)?;
            pos += 1;

            if keyword == "SET" {
                expect(&tokens, pos, "=")?;
                let placeholder = tokens.get(pos + 1).ok_or(ExpressionError::UnexpectedEnd)?;
                let value = resolver.value(placeholder)?;
                actions.push(UpdateAction::Set(attr, value));
                pos += 2;
            } else {
                actions.push(UpdateAction::Remove(attr));
            }

            if tokens.get(pos) == Some(&",") {
                pos += 1;
            } else {
                break;
            }
        }
    }

    resolver.finish()?;

    let mut targets = BTreeSet::new();
    for action in &actions {
        if !targets.insert(action.attribute()) {
            return Err(ExpressionError::OverlappingPaths {
                attr: action.attribute().to_owned(),
            });
        }
    }
    Ok(actions)
}

/// Parse and resolve a `path = :value` key condition.
///
/// # Errors
///
/// Fails on syntax errors and unresolved or unused placeholders.
pub fn parse_key_condition(
    expression: &str,
    names: &BTreeMap<String, String>,
    values: &BTreeMap<String, AttributeValue>,
) -> Result<(String, AttributeValue), ExpressionError> {
    let tokens = tokenize(expression);
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut resolver = Resolver::new(names, values);
    let attr = resolver.name(tokens[0])?;
    expect(&tokens, 1, "=")?;
    let placeholder = tokens.get(2).ok_or(ExpressionError::UnexpectedEnd)?;
    let value = resolver.value(placeholder)?;
    if let Some(extra) = tokens.get(3) {
        return Err(ExpressionError::UnexpectedToken {
            token: (*extra).to_owned(),
        });
    }
    resolver.finish()?;
    Ok((attr, value))
}

/// Apply resolved actions to `item`.
pub fn apply_update(item: &mut Item, actions: Vec<UpdateAction>) {
    for action in actions {
        match action {
            UpdateAction::Set(name, value) => {
                item.insert(name, value);
            }
            UpdateAction::Remove(name) => {
                item.remove(&name);
            }
        }
    }
}

/// Split into words, treating `,` and `=` as standalone tokens.
fn tokenize(expression: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for word in expression.split_whitespace() {
        let mut rest = word;
        while let Some(idx) = rest.find([',', '=']) {
            if idx > 0 {
                tokens.push(&rest[..idx]);
            }
            tokens.push(&rest[idx..=idx]);
            rest = &rest[idx + 1..];
        }
        if !rest.is_empty() {
            tokens.push(rest);
        }
    }
    tokens
}

fn expect(tokens: &[&str], pos: usize, want: &str) -> Result<(), ExpressionError> {
    match tokens.get(pos) {
        Some(token) if *token == want => Ok(()),
        Some(token) => Err(ExpressionError::UnexpectedToken {
            token: (*token).to_owned(),
        }),
        None => Err(ExpressionError::UnexpectedEnd),
    }
}

/// Resolves placeholders and tracks which ones were used.
struct Resolver<'a> {
    names: &'a BTreeMap<String, String>,
    values: &'a BTreeMap<String, AttributeValue>,
    used_names: BTreeSet<&'a str>,
    used_values: BTreeSet<&'a str>,
}

impl<'a> Resolver<'a> {
    fn new(
        names: &'a BTreeMap<String, String>,
        values: &'a BTreeMap<String, AttributeValue>,
    ) -> Self {
        Self {
            names,
            values,
            used_names: BTreeSet::new(),
            used_values: BTreeSet::new(),
        }
    }

    fn name(&mut self, token: &str) -> Result<String, ExpressionError> {
        if token.starts_with('#') {
            let names: &'a BTreeMap<String, String> = self.names;
            let (key, attr) = names.get_key_value(token).ok_or_else(|| {
                ExpressionError::UnresolvedName {
                    name: token.to_owned(),
                }
            })?;
            self.used_names.insert(key.as_str());
            Ok(attr.clone())
        } else if token.starts_with(':') || token == "," || token == "=" {
            Err(ExpressionError::UnexpectedToken {
                token: token.to_owned(),
            })
        } else {
            Ok(token.to_owned())
        }
    }

    fn value(&mut self, token: &str) -> Result<AttributeValue, ExpressionError> {
        if !token.starts_with(':') {
            return Err(ExpressionError::UnexpectedToken {
                token: token.to_owned(),
            });
        }
        let values: &'a BTreeMap<String, AttributeValue> = self.values;
        let (key, value) =
            values
                .get_key_value(token)
                .ok_or_else(|| ExpressionError::UnresolvedValue {
                    name: token.to_owned(),
                })?;
        self.used_values.insert(key.as_str());
        Ok(value.clone())
    }

    fn finish(self) -> Result<(), ExpressionError> {
        if let Some(name) = self
            .names
            .keys()
            .find(|k| !self.used_names.contains(k.as_str()))
        {
            return Err(ExpressionError::UnusedName { name: name.clone() });
        }
        if let Some(name) = self
            .values
            .keys()
            .find(|k| !self.used_values.contains(k.as_str()))
        {
            return Err(ExpressionError::UnusedValue { name: name.clone() });
        }
        Ok(())
    }
}
