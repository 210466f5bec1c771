use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal && self.tag.is_none() && self.classes.is_empty() && self.attrs.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let groups = split_selector_groups(selector)?;
    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        parsed.push(parse_selector_chain(&group)?);
    }
    Ok(parsed)
}

pub(crate) fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut parts = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        if token == ">" {
            if pending_combinator.is_some() || parts.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(SelectorCombinator::Child);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(
                pending_combinator
                    .take()
                    .unwrap_or(SelectorCombinator::Descendant),
            )
        };
        parts.push(SelectorPart { step, combinator });
    }

    if parts.is_empty() || pending_combinator.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    Ok(parts)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            '>' if bracket_depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            ch if ch.is_whitespace() && bracket_depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_selector_step(token: &str) -> Result<SelectorStep> {
    let mut step = SelectorStep::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (ident, next) = read_identifier(&chars, i + 1);
                if ident.is_empty() || step.id.is_some() {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.id = Some(ident);
                i = next;
            }
            '.' => {
                let (ident, next) = read_identifier(&chars, i + 1);
                if ident.is_empty() {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.classes.push(ident);
                i = next;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| Error::UnsupportedSelector(token.into()))?;
                let body: String = chars[i + 1..close].iter().collect();
                step.attrs.push(parse_attr_condition(&body, token)?);
                i = close + 1;
            }
            '*' if i == 0 => {
                step.universal = true;
                i += 1;
            }
            _ => {
                if i != 0 || step.universal {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                let (ident, next) = read_identifier(&chars, i);
                if ident.is_empty() {
                    return Err(Error::UnsupportedSelector(token.into()));
                }
                step.tag = Some(ident.to_ascii_lowercase());
                i = next;
            }
        }
    }

    if step.tag.is_none()
        && !step.universal
        && step.id.is_none()
        && step.classes.is_empty()
        && step.attrs.is_empty()
    {
        return Err(Error::UnsupportedSelector(token.into()));
    }

    Ok(step)
}

fn read_identifier(chars: &[char], from: usize) -> (String, usize) {
    let mut out = String::new();
    let mut i = from;
    while i < chars.len() {
        let ch = chars[i];
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
            i += 1;
        } else {
            break;
        }
    }
    (out, i)
}

fn parse_attr_condition(body: &str, token: &str) -> Result<SelectorAttrCondition> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::UnsupportedSelector(token.into()));
    }

    if let Some((key, value)) = body.split_once("^=") {
        return finish_attr_condition(key, value, token, |key, value| {
            SelectorAttrCondition::StartsWith { key, value }
        });
    }
    if let Some((key, value)) = body.split_once("$=") {
        return finish_attr_condition(key, value, token, |key, value| {
            SelectorAttrCondition::EndsWith { key, value }
        });
    }
    if let Some((key, value)) = body.split_once("*=") {
        return finish_attr_condition(key, value, token, |key, value| {
            SelectorAttrCondition::Contains { key, value }
        });
    }
    if let Some((key, value)) = body.split_once('=') {
        return finish_attr_condition(key, value, token, |key, value| {
            SelectorAttrCondition::Eq { key, value }
        });
    }

    let key = body.trim();
    if !is_valid_attr_key(key) {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    Ok(SelectorAttrCondition::Exists { key: key.into() })
}

fn finish_attr_condition(
    key: &str,
    value: &str,
    token: &str,
    build: impl FnOnce(String, String) -> SelectorAttrCondition,
) -> Result<SelectorAttrCondition> {
    let key = key.trim();
    if !is_valid_attr_key(key) {
        return Err(Error::UnsupportedSelector(token.into()));
    }
    Ok(build(key.to_string(), unquote_attr_value(value)))
}

fn is_valid_attr_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

fn unquote_attr_value(value: &str) -> String {
    let value = value.trim();
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

impl SelectorAttrCondition {
    fn matches(&self, element: &Element) -> bool {
        match self {
            Self::Exists { key } => element.attrs.contains_key(key),
            Self::Eq { key, value } => element.attrs.get(key).is_some_and(|v| v == value),
            Self::StartsWith { key, value } => {
                !value.is_empty() && element.attrs.get(key).is_some_and(|v| v.starts_with(value))
            }
            Self::EndsWith { key, value } => {
                !value.is_empty() && element.attrs.get(key).is_some_and(|v| v.ends_with(value))
            }
            Self::Contains { key, value } => {
                !value.is_empty() && element.attrs.get(key).is_some_and(|v| v.contains(value))
            }
        }
    }
}

pub(crate) fn step_matches(dom: &Dom, node_id: NodeId, step: &SelectorStep) -> bool {
    let Some(element) = dom.element(node_id) else {
        return false;
    };

    if let Some(tag) = &step.tag {
        if !element.tag_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if element.attrs.get("id") != Some(id) {
            return false;
        }
    }
    for class_name in &step.classes {
        if !has_class(element, class_name) {
            return false;
        }
    }
    step.attrs
        .iter()
        .all(|condition| condition.matches(element))
}

pub(crate) fn chain_matches(dom: &Dom, node_id: NodeId, parts: &[SelectorPart]) -> bool {
    let Some((last, prefix)) = parts.split_last() else {
        return false;
    };
    if !step_matches(dom, node_id, &last.step) {
        return false;
    }
    if prefix.is_empty() {
        return true;
    }

    match last.combinator {
        Some(SelectorCombinator::Child) => dom
            .parent_element(node_id)
            .is_some_and(|parent| chain_matches(dom, parent, prefix)),
        Some(SelectorCombinator::Descendant) | None => {
            let mut cursor = dom.parent_element(node_id);
            while let Some(ancestor) = cursor {
                if chain_matches(dom, ancestor, prefix) {
                    return true;
                }
                cursor = dom.parent_element(ancestor);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_step_with_attr_prefix() -> Result<()> {
        let parts = parse_selector_chain("a[href^=\"#\"]")?;
        assert_eq!(parts.len(), 1);
        let step = &parts[0].step;
        assert_eq!(step.tag.as_deref(), Some("a"));
        assert_eq!(
            step.attrs,
            vec![SelectorAttrCondition::StartsWith {
                key: "href".into(),
                value: "#".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn parses_descendant_and_child_combinators() -> Result<()> {
        let parts = parse_selector_chain("#navMenu > a.active")?;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].combinator, None);
        assert_eq!(parts[1].combinator, Some(SelectorCombinator::Child));

        let parts = parse_selector_chain("#navMenu a")?;
        assert_eq!(parts[1].combinator, Some(SelectorCombinator::Descendant));
        Ok(())
    }

    #[test]
    fn splits_groups_outside_brackets_only() -> Result<()> {
        let groups = split_selector_groups("a[href], button, select")?;
        assert_eq!(groups, vec!["a[href]", "button", "select"]);
        Ok(())
    }

    #[test]
    fn rejects_trailing_combinator_and_empty_group() {
        assert!(parse_selector_chain("#navMenu >").is_err());
        assert!(split_selector_groups("a,,b").is_err());
        assert!(parse_selector_chain("a[href").is_err());
    }

    #[test]
    fn id_only_fast_path_detected() -> Result<()> {
        let parts = parse_selector_chain("#carousel")?;
        assert_eq!(parts[0].step.id_only(), Some("carousel"));
        let parts = parse_selector_chain("div#carousel")?;
        assert_eq!(parts[0].step.id_only(), None);
        Ok(())
    }
}
