//! Ordered element locators for third-party pages.
//!
//! Each locator is a pure predicate over an [`ElementInfo`] snapshot. A
//! chain evaluates them most-specific first and accepts the first visible,
//! interactable match. The needles come from [`LocatorConfig`], since they
//! follow the destination page's markup.

use crate::config::LocatorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    TextArea,
    TextInput,
    ContentEditable,
    Button,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// What the page agent can observe about one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub id: ElementId,
    pub kind: ElementKind,
    pub role: Option<String>,
    /// aria-label, or the computed accessible name.
    pub label: Option<String>,
    pub placeholder: Option<String>,
    /// The `type` attribute (`submit`, `text`, ...).
    pub type_attr: Option<String>,
    pub disabled: bool,
    pub read_only: bool,
    pub bounds: Bounds,
    /// Identity of the enclosing form, if any.
    pub form: Option<u32>,
}

impl ElementInfo {
    pub fn new(id: u64, kind: ElementKind, width: f64, height: f64) -> Self {
        Self {
            id: ElementId(id),
            kind,
            role: None,
            label: None,
            placeholder: None,
            type_attr: None,
            disabled: false,
            read_only: false,
            bounds: Bounds { width, height },
            form: None,
        }
    }

    pub fn is_text_entry(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::TextArea | ElementKind::TextInput | ElementKind::ContentEditable
        ) || self.has_role("textbox")
    }

    pub fn is_interactable(&self) -> bool {
        !self.disabled && !self.read_only
    }

    fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(role))
    }

    fn name_contains(&self, needles: &[String]) -> bool {
        [self.label.as_deref(), self.placeholder.as_deref()]
            .into_iter()
            .flatten()
            .map(str::to_lowercase)
            .any(|name| needles.iter().any(|n| name.contains(&n.to_lowercase())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    First,
    Largest,
}

type Predicate = Box<dyn Fn(&ElementInfo) -> bool + Send + Sync>;

pub struct Locator {
    pub name: &'static str,
    pick: Pick,
    predicate: Predicate,
}

impl Locator {
    fn first(
        name: &'static str,
        predicate: impl Fn(&ElementInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            pick: Pick::First,
            predicate: Box::new(predicate),
        }
    }

    fn largest(
        name: &'static str,
        predicate: impl Fn(&ElementInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            pick: Pick::Largest,
            predicate: Box::new(predicate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located<'a> {
    pub element: &'a ElementInfo,
    pub strategy: &'static str,
}

pub struct LocatorChain {
    locators: Vec<Locator>,
    min_width: f64,
    min_height: f64,
}

impl LocatorChain {
    /// accessible name → editable role → largest visible text entry.
    pub fn input(config: &LocatorConfig) -> Self {
        let names = config.input_names.clone();
        Self {
            locators: vec![
                Locator::first("accessible-name", move |e| {
                    e.is_text_entry() && e.name_contains(&names)
                }),
                Locator::first("editable-role", |e| {
                    matches!(e.kind, ElementKind::TextArea | ElementKind::ContentEditable)
                        || e.has_role("textbox")
                }),
                Locator::largest("largest-text-entry", ElementInfo::is_text_entry),
            ],
            min_width: config.min_input_width,
            min_height: config.min_input_height,
        }
    }

    /// accessible name → `type=submit` → enabled button in the input's form.
    pub fn submit(config: &LocatorConfig, input_form: Option<u32>) -> Self {
        let names = config.submit_names.clone();
        Self {
            locators: vec![
                Locator::first("submit-name", move |e| {
                    is_button(e) && e.name_contains(&names)
                }),
                Locator::first("submit-type", |e| {
                    e.type_attr
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case("submit"))
                }),
                Locator::first("form-button", move |e| {
                    is_button(e) && input_form.is_some() && e.form == input_form
                }),
            ],
            min_width: 1.0,
            min_height: 1.0,
        }
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.locators.iter().map(|l| l.name).collect()
    }

    pub fn locate<'a>(&self, elements: &'a [ElementInfo]) -> Option<Located<'a>> {
        self.locators.iter().find_map(|locator| {
            let mut candidates = elements
                .iter()
                .filter(|&e| self.is_visible(e) && e.is_interactable() && (locator.predicate)(e));
            let element = match locator.pick {
                Pick::First => candidates.next(),
                Pick::Largest => candidates.max_by(|a, b| {
                    a.bounds
                        .area()
                        .partial_cmp(&b.bounds.area())
                        .unwrap_or(std::cmp::Ordering::Equal)
                }),
            }?;
            Some(Located {
                element,
                strategy: locator.name,
            })
        })
    }

    fn is_visible(&self, e: &ElementInfo) -> bool {
        e.bounds.width >= self.min_width && e.bounds.height >= self.min_height
    }
}

fn is_button(e: &ElementInfo) -> bool {
    e.kind == ElementKind::Button || e.has_role("button")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textarea(id: u64, w: f64, h: f64) -> ElementInfo {
        ElementInfo::new(id, ElementKind::TextArea, w, h)
    }

    fn labelled(mut e: ElementInfo, label: &str) -> ElementInfo {
        e.label = Some(label.into());
        e
    }

    #[test]
    fn prefers_accessible_name_over_position() {
        let doc = vec![
            textarea(1, 600.0, 200.0),
            labelled(textarea(2, 400.0, 40.0), "Message Gemini"),
        ];
        let found = LocatorChain::input(&LocatorConfig::default())
            .locate(&doc)
            .unwrap();
        assert_eq!(found.element.id, ElementId(2));
        assert_eq!(found.strategy, "accessible-name");
    }

    #[test]
    fn skips_hidden_and_disabled_candidates() {
        let mut disabled = labelled(textarea(1, 400.0, 40.0), "Message");
        disabled.disabled = true;
        let tiny = labelled(textarea(2, 400.0, 5.0), "Message");
        let mut readonly = textarea(3, 400.0, 40.0);
        readonly.read_only = true;
        let ok = textarea(4, 300.0, 40.0);

        let candidates = [disabled, tiny, readonly, ok];
        let found = LocatorChain::input(&LocatorConfig::default())
            .locate(&candidates)
            .unwrap();
        assert_eq!(found.element.id, ElementId(4));
        assert_eq!(found.strategy, "editable-role");
    }

    #[test]
    fn falls_back_to_largest_text_entry() {
        let doc = vec![
            ElementInfo::new(1, ElementKind::TextInput, 150.0, 32.0),
            ElementInfo::new(2, ElementKind::TextInput, 500.0, 40.0),
            ElementInfo::new(3, ElementKind::Other, 900.0, 900.0),
        ];
        let found = LocatorChain::input(&LocatorConfig::default())
            .locate(&doc)
            .unwrap();
        assert_eq!(found.element.id, ElementId(2));
        assert_eq!(found.strategy, "largest-text-entry");
    }

    #[test]
    fn nothing_usable_is_none() {
        let doc = vec![ElementInfo::new(1, ElementKind::Button, 80.0, 30.0)];
        assert!(LocatorChain::input(&LocatorConfig::default())
            .locate(&doc)
            .is_none());
    }

    #[test]
    fn submit_chain_order() {
        let config = LocatorConfig::default();
        let mut in_form = ElementInfo::new(1, ElementKind::Button, 30.0, 30.0);
        in_form.form = Some(7);
        let mut typed = ElementInfo::new(2, ElementKind::Button, 30.0, 30.0);
        typed.type_attr = Some("submit".into());
        let named = labelled(ElementInfo::new(3, ElementKind::Button, 30.0, 30.0), "Send message");

        let all = vec![in_form.clone(), typed.clone(), named];
        assert_eq!(
            LocatorChain::submit(&config, Some(7)).locate(&all).unwrap().strategy,
            "submit-name"
        );

        let no_name = vec![in_form.clone(), typed];
        assert_eq!(
            LocatorChain::submit(&config, Some(7)).locate(&no_name).unwrap().strategy,
            "submit-type"
        );

        let only_form = vec![in_form.clone()];
        assert_eq!(
            LocatorChain::submit(&config, Some(7)).locate(&only_form).unwrap().strategy,
            "form-button"
        );
        assert!(LocatorChain::submit(&config, None).locate(&only_form).is_none());
    }
}
