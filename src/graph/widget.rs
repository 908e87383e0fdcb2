//! Widget types
//!
//! A widget is a recorded on-screen element: the template image that finds
//! it, where it was last seen and the action performed on it.

use serde::{Deserialize, Serialize};

use crate::recognition::{Rect, TemplateId};

/// Number of left clicks used to focus a text field before typing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ClickCount {
    #[default]
    One = 1,
    Two = 2,
    Three = 3,
}

impl ClickCount {
    pub fn get(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ClickCount {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ClickCount::One),
            2 => Ok(ClickCount::Two),
            3 => Ok(ClickCount::Three),
            _ => Err(()),
        }
    }
}

/// Interaction recorded for a widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetAction {
    /// Left mouse click
    LeftClick,
    /// Right mouse click
    RightClick,
    /// Two left clicks in quick succession
    DoubleClick,
    /// Focus a field with one to three clicks, then type text
    Type {
        text: Option<String>,
        clicks: ClickCount,
    },
    /// Click, wait for a menu, then click a second template
    TwoStepMenu {
        second_template: Option<TemplateId>,
    },
    /// Presence check only, never performed
    Check,
}

impl WidgetAction {
    /// A typing action with no text committed yet
    pub fn pending_type() -> Self {
        WidgetAction::Type {
            text: None,
            clicks: ClickCount::One,
        }
    }

    /// A menu action with no second template yet
    pub fn pending_menu() -> Self {
        WidgetAction::TwoStepMenu {
            second_template: None,
        }
    }

    /// The same action kind with its per-widget data cleared
    pub fn kind_only(&self) -> Self {
        match self {
            WidgetAction::Type { .. } => WidgetAction::pending_type(),
            WidgetAction::TwoStepMenu { .. } => WidgetAction::pending_menu(),
            other => other.clone(),
        }
    }

    pub fn widget_type(&self) -> WidgetType {
        match self {
            WidgetAction::Check => WidgetType::Check,
            _ => WidgetType::Action,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, WidgetAction::Type { .. })
    }

    pub fn is_menu(&self) -> bool {
        matches!(self, WidgetAction::TwoStepMenu { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            WidgetAction::LeftClick => "left click",
            WidgetAction::RightClick => "right click",
            WidgetAction::DoubleClick => "double click",
            WidgetAction::Type { .. } => "type",
            WidgetAction::TwoStepMenu { .. } => "menu action",
            WidgetAction::Check => "check",
        }
    }
}

/// Coarse widget classification derived from the action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetType {
    Action,
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Location progress of a widget within the current visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WidgetStatus {
    /// Not matched yet
    #[default]
    Unlocated,
    /// Matched on screen
    Located,
    /// Action performed, or check satisfied
    Valid,
}

/// A recorded widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub action: WidgetAction,
    pub visibility: Visibility,
    pub status: WidgetStatus,
    /// Last observed rectangle, relative to the captured screen area
    pub location: Rect,
    pub template: TemplateId,
}

impl Widget {
    pub fn new(action: WidgetAction, template: TemplateId, location: Rect) -> Self {
        Self {
            action,
            visibility: Visibility::Visible,
            status: WidgetStatus::Unlocated,
            location,
            template,
        }
    }

    pub fn widget_type(&self) -> WidgetType {
        self.action.widget_type()
    }

    pub fn is_action(&self) -> bool {
        self.widget_type() == WidgetType::Action
    }

    pub fn is_check(&self) -> bool {
        self.widget_type() == WidgetType::Check
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    /// Record a successful match. Check widgets are satisfied by presence alone.
    pub fn mark_located(&mut self, location: Rect) {
        self.location = location;
        self.status = if self.is_check() {
            WidgetStatus::Valid
        } else {
            WidgetStatus::Located
        };
    }

    pub fn mark_valid(&mut self) {
        self.status = WidgetStatus::Valid;
    }

    pub fn second_template(&self) -> Option<&TemplateId> {
        match &self.action {
            WidgetAction::TwoStepMenu { second_template } => second_template.as_ref(),
            _ => None,
        }
    }

    /// Attach the second template of a menu action.
    ///
    /// Returns the template it replaced. Non-menu widgets are left untouched
    /// and hand the template back as `Err`.
    pub fn set_second_template(
        &mut self,
        template: TemplateId,
    ) -> Result<Option<TemplateId>, TemplateId> {
        match &mut self.action {
            WidgetAction::TwoStepMenu { second_template } => {
                Ok(second_template.replace(template))
            }
            _ => Err(template),
        }
    }

    /// Every template this widget owns
    pub fn templates(&self) -> impl Iterator<Item = &TemplateId> {
        std::iter::once(&self.template).chain(self.second_template())
    }
}
