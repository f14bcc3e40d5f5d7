//! External collaborator interfaces for template expansion, and their default
//! implementations.

use super::{Result, State, stack::Frame};
use crate::{
    common::{lcfirst, ucfirst},
    wikitext::{ParamKey, Params},
};
use std::{cell::RefCell, collections::HashMap, hash::BuildHasher};

/// A source of template text.
pub trait ContentSource: Send + Sync {
    /// Returns the raw text of the page with the given full title (e.g.
    /// `Template:Foo`), or `None` if the page does not exist.
    fn get_template(&self, title: &str) -> Option<String>;
}

impl<S: BuildHasher + Send + Sync> ContentSource for HashMap<String, String, S> {
    fn get_template(&self, title: &str) -> Option<String> {
        self.get(title).cloned()
    }
}

/// Parser function arguments, expanded on demand.
///
/// The text after the colon in the function name is argument 0 and positional
/// argument 1. The template parameters follow in source order, with
/// positional parameters numbered onwards from 2. Named parameters are keyed
/// by their expanded name and have their values trimmed.
///
/// Nothing is expanded until a function asks for it, so a branch which is not
/// taken cannot transclude anything or add to the outline.
#[derive(Debug)]
pub struct FunctionArgs<'call, 'sp> {
    /// The frame the call was written in.
    sp: &'call Frame<'sp>,
    /// The expanded text after the colon, trimmed.
    first: &'call str,
    /// The raw template parameters.
    params: &'call Params,
    /// Expanded values, by argument index.
    values: RefCell<HashMap<usize, String>>,
}

impl<'call, 'sp> FunctionArgs<'call, 'sp> {
    /// Creates arguments for a call written in frame `sp`.
    pub fn new(sp: &'call Frame<'sp>, first: &'call str, params: &'call Params) -> Self {
        Self {
            sp,
            first,
            params,
            values: RefCell::default(),
        }
    }

    /// Returns the key of the argument at `index`, expanding its name if it is
    /// named, or `None` past the last argument.
    pub fn key(&self, state: &mut State<'_>, index: usize) -> Result<Option<ParamKey>> {
        let Some(offset) = index.checked_sub(1) else {
            return Ok(Some(ParamKey::Positional(1)));
        };
        let Some((key, _)) = self.params.get_index(offset) else {
            return Ok(None);
        };

        Ok(Some(match key {
            ParamKey::Positional(position) => ParamKey::Positional(position + 1),
            ParamKey::Named(name) => {
                ParamKey::Named(self.sp.expand_text(state, name)?.trim().to_string())
            }
        }))
    }

    /// Expands the value of the argument at `index`, or returns `None` past
    /// the last argument.
    pub fn value(&self, state: &mut State<'_>, index: usize) -> Result<Option<String>> {
        let Some(offset) = index.checked_sub(1) else {
            return Ok(Some(self.first.to_string()));
        };
        let Some((key, raw)) = self.params.get_index(offset) else {
            return Ok(None);
        };

        if let Some(value) = self.values.borrow().get(&index) {
            return Ok(Some(value.clone()));
        }

        let value = self.sp.expand_text(state, raw)?;
        let value = match key {
            ParamKey::Positional(_) => value,
            ParamKey::Named(_) => value.trim().to_string(),
        };
        self.values.borrow_mut().insert(index, value.clone());
        Ok(Some(value))
    }

    /// Expands positional argument `position`, numbered from 1.
    pub fn positional(&self, state: &mut State<'_>, position: usize) -> Result<Option<String>> {
        let index = match position {
            0 => None,
            1 => Some(0),
            _ => self
                .params
                .get_index_of(&ParamKey::Positional(position - 1))
                .map(|offset| offset + 1),
        };
        match index {
            Some(index) => self.value(state, index),
            None => Ok(None),
        }
    }
}

/// Parser function implementations.
pub trait ParserFunctions: Send + Sync {
    /// Calls the parser function `name` (lowercased, including any leading
    /// `#`). Returns `None` if the function is not handled, in which case the
    /// expression is treated as a normal template.
    fn call_parser_function(
        &self,
        state: &mut State<'_>,
        name: &str,
        args: &FunctionArgs<'_, '_>,
    ) -> Result<Option<String>>;
}

/// Magic variable implementations.
pub trait MagicVariables: Send + Sync {
    /// Returns the value of the variable `id` (lowercased), or `None` if it is
    /// not handled, in which case the expression is treated as a normal
    /// template.
    fn expand_variable(&self, id: &str) -> Option<String>;
}

impl<S: BuildHasher + Send + Sync> MagicVariables for HashMap<String, String, S> {
    fn expand_variable(&self, id: &str) -> Option<String> {
        self.get(id).cloned()
    }
}

/// A parser function table with no functions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFunctions;

impl ParserFunctions for NoFunctions {
    fn call_parser_function(
        &self,
        _state: &mut State<'_>,
        _name: &str,
        _args: &FunctionArgs<'_, '_>,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A magic variable table with no variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoVariables;

impl MagicVariables for NoVariables {
    fn expand_variable(&self, _id: &str) -> Option<String> {
        None
    }
}

/// The core string and conditional parser functions.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoreFunctions;

impl ParserFunctions for CoreFunctions {
    fn call_parser_function(
        &self,
        state: &mut State<'_>,
        name: &str,
        args: &FunctionArgs<'_, '_>,
    ) -> Result<Option<String>> {
        let value = match name {
            "lc" => arg(state, args, 1)?.to_lowercase(),
            "uc" => arg(state, args, 1)?.to_uppercase(),
            "lcfirst" => lcfirst(&arg(state, args, 1)?).into_owned(),
            "ucfirst" => ucfirst(&arg(state, args, 1)?).into_owned(),
            "#if" => {
                let position = if arg(state, args, 1)?.is_empty() { 3 } else { 2 };
                arg(state, args, position)?
            }
            "#ifeq" => {
                let lhs = arg(state, args, 1)?;
                let rhs = arg(state, args, 2)?;
                let position = if loose_eq(&lhs, &rhs) { 3 } else { 4 };
                arg(state, args, position)?
            }
            "#switch" => switch(state, args)?,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Expands positional argument `position`, trimmed. A missing argument is
/// empty.
fn arg(state: &mut State<'_>, args: &FunctionArgs<'_, '_>, position: usize) -> Result<String> {
    Ok(args
        .positional(state, position)?
        .map(|value| value.trim().to_string())
        .unwrap_or_default())
}

/// Compares two parser function values, numerically if both are numbers.
fn loose_eq(lhs: &str, rhs: &str) -> bool {
    match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => lhs == rhs,
    }
}

/// Implements `#switch`.
///
/// A case without a value falls through to the next case with a value. If
/// nothing matches, the last case is the default if it has no value;
/// otherwise, any `#default` case is the default.
///
/// Case names are expanded in order until one matches, but only the value
/// which is returned is expanded.
fn switch(state: &mut State<'_>, args: &FunctionArgs<'_, '_>) -> Result<String> {
    let primary = arg(state, args, 1)?;
    let mut found = false;
    let mut default = None;
    let mut last_unnamed = None;

    let mut index = 1;
    while let Some(key) = args.key(state, index)? {
        match key {
            ParamKey::Positional(_) => {
                let value = args.value(state, index)?.unwrap_or_default();
                let value = value.trim();
                if loose_eq(value, &primary) || value == "#default" {
                    found = true;
                }
                last_unnamed = Some(value.to_string());
            }
            ParamKey::Named(key) => {
                last_unnamed = None;
                if found || loose_eq(&key, &primary) {
                    return trimmed_value(state, args, index);
                } else if key == "#default" {
                    default = Some(index);
                }
            }
        }
        index += 1;
    }

    match (last_unnamed, default) {
        (Some(value), _) => Ok(value),
        (None, Some(index)) => trimmed_value(state, args, index),
        (None, None) => Ok(String::new()),
    }
}

/// Expands the argument at `index`, trimmed.
fn trimmed_value(state: &mut State<'_>, args: &FunctionArgs<'_, '_>, index: usize) -> Result<String> {
    Ok(args
        .value(state, index)?
        .map(|value| value.trim().to_string())
        .unwrap_or_default())
}
