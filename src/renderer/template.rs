//! Template rendering types and functions.

use super::{
    Error, Result, State,
    hooks::FunctionArgs,
    stack::{Arguments, Frame},
};
use crate::{
    common::escape_construct,
    title::{Namespace, Title},
    wikitext::{Template, TemplateArgument},
};
use core::fmt::Write as _;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::borrow::Cow;

/// Renders a template argument.
///
/// The argument is looked up in the current frame. If it is unbound, the
/// default is used instead. A default which is just another argument is
/// followed iteratively, so long chains of defaults cannot overflow the stack.
pub(super) fn call_argument(
    out: &mut String,
    state: &mut State<'_>,
    sp: &Frame<'_>,
    argument: &TemplateArgument,
) -> Result {
    let mut argument = Cow::Borrowed(argument);
    loop {
        let key = sp.expand_text(state, &argument.name)?;

        if let Some(value) = sp.argument(state, key.trim())? {
            out.push_str(&value);
            return Ok(());
        }

        let Some(default) = &argument.default else {
            // This cannot simply expand the name because the whole expression
            // is supposed to come out unchanged
            write!(out, "{{{{{{{}}}}}}}", argument.name)?;
            return Ok(());
        };

        let default = state.parser.parse_fragment(default);
        if let Some(next) = default.as_argument() {
            argument = Cow::Owned(next.clone());
        } else {
            out.push_str(&sp.expand(state, &default)?);
            return Ok(());
        }
    }
}

/// Renders a template expression.
///
/// Whilst the documentation at
/// <https://www.mediawiki.org/wiki/Special:MyLanguage/Manual:Magic_words#How_magic_words_work>
/// makes claims about the order of operations of magic words, they are
/// actually processed thus:
///
/// 1. If there is a `subst:` or `safesubst:` prefix, drop it.
/// 2. If no args, try to match as a variable, and expand the variable if so.
/// 3. Is there a ':' in the name? If so, assume it is a parser function,
///    try to call the parser function, and allow processing to continue
///    if the parser function does not match.
/// 4. Check if it is a template, and if so, process the template, with
///    stack recursion limits.
/// 5. Emit as text.
pub(super) fn call_template(
    out: &mut String,
    state: &mut State<'_>,
    sp: &Frame<'_>,
    template: &Template,
) -> Result {
    state.expansions += 1;

    let name = sp.expand_text(state, &template.name)?;
    let name = strip_subst(name.trim());

    if template.params.is_empty()
        && !name.contains(':')
        && state.context.config.is_variable(name)
        && let Some(value) = state.context.variables.expand_variable(&name.to_lowercase())
    {
        out.push_str(&value);
        return Ok(());
    }

    if let Some((callee, first)) = name.split_once(':')
        && state.context.config.is_function_hook(callee.trim())
    {
        let callee = callee.trim().to_lowercase();
        let arguments = FunctionArgs::new(sp, first.trim(), &template.params);
        let functions = state.context.functions;
        if let Some(value) = functions.call_parser_function(state, &callee, &arguments)? {
            log::trace!("called {callee} with {} parameters", template.params.len());
            out.push_str(&value);
            return Ok(());
        }
    }

    let title = match Title::new(name, Namespace::TEMPLATE, state.context.config) {
        Ok(title) => title,
        Err(err) => {
            log::debug!("{err}: {name:?}; emitting template as text");
            out.push_str(&escape_construct(&template.source));
            return Ok(());
        }
    };

    let Some(body) = state.context.content.get_template(title.key()) else {
        log::warn!("No template found for '{title}'");
        write_redlink(out, state, &title)?;
        return Ok(());
    };

    let arguments = Arguments::bind(state, sp, &template.params)?;
    let sp = match sp.chain(state, title.clone(), arguments) {
        Ok(sp) => sp,
        Err(Error::TemplateRecursion(_)) => {
            let href = state.context.config.article_url(title.key());
            write!(
                out,
                r#"<span class="error">Template loop detected: <a href="{}" title="{}">{}</a></span>"#,
                encode_double_quoted_attribute(&href),
                encode_double_quoted_attribute(title.key()),
                encode_text(title.key())
            )?;
            return Ok(());
        }
        Err(Error::StackOverflow(_)) => {
            write!(
                out,
                r#"<span class="error">Template recursion depth limit exceeded ({})</span>"#,
                state.context.config.limits.max_depth
            )?;
            return Ok(());
        }
        Err(Error::Timeout(_)) => {
            out.push_str(r#"<span class="error">Template expansion time limit exceeded</span>"#);
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    log::trace!("Expanding {title} at depth {}", sp.depth());

    let document = state.parser.preprocess_to_obj(&body, true);
    let expansion = sp.expand(state, &document)?;

    // “T2529: if the template begins with a table or block-level
    //  element, it should be treated as beginning a new line.
    //  This behavior is somewhat controversial.”
    if !template.line_start
        && (expansion.starts_with("{|") || expansion.starts_with([':', ';', '#', '*']))
    {
        out.push('\n');
    }
    out.push_str(&expansion);

    Ok(())
}

/// Removes a case-insensitive `subst:` or `safesubst:` prefix from a template
/// name.
fn strip_subst(name: &str) -> &str {
    for prefix in ["subst:", "safesubst:"] {
        if let Some(head) = name.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            return name[prefix.len()..].trim_start();
        }
    }
    name
}

/// Writes a link to a missing template.
fn write_redlink(out: &mut String, state: &State<'_>, title: &Title) -> Result {
    let href = state.context.config.article_url(title.key());
    let key = title.key();
    write!(
        out,
        r#"<a href="{}?action=edit&redlink=1" class="new" title="{} (page does not exist)">{}</a>"#,
        encode_double_quoted_attribute(&href),
        encode_double_quoted_attribute(key),
        encode_text(key)
    )?;
    Ok(())
}
