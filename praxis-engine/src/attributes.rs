//! Explicit inherit-or-override attribute cells.
//!
//! Steps inherit difficulty and stat from their parent raid unless an
//! override is set. "Inherited" is a first-class variant rather than a
//! sentinel value, so resolution is always live: clearing an override
//! returns to whatever the parent holds *now*, never a snapshot.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "Option<T>", into = "Option<T>")]
pub enum Attribute<T: Clone> {
    #[default]
    Inherited,
    Override(T),
}

impl<T: Clone> Attribute<T> {
    #[must_use]
    pub const fn is_inherited(&self) -> bool {
        matches!(self, Self::Inherited)
    }

    #[must_use]
    pub const fn as_override(&self) -> Option<&T> {
        match self {
            Self::Inherited => None,
            Self::Override(value) => Some(value),
        }
    }

    /// Resolve against the parent's current value.
    #[must_use]
    pub fn resolve(&self, parent: T) -> T {
        match self {
            Self::Inherited => parent,
            Self::Override(value) => value.clone(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::Inherited;
    }
}

impl<T: Clone + PartialEq> Attribute<T> {
    /// Edit-UI semantics: selecting the value already overriding clears the
    /// cell back to inherit; anything else sets the override.
    pub fn toggle(&mut self, value: T) {
        if self.as_override() == Some(&value) {
            *self = Self::Inherited;
        } else {
            *self = Self::Override(value);
        }
    }
}

impl<T: Clone> From<Option<T>> for Attribute<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Inherited, Self::Override)
    }
}

impl<T: Clone> From<Attribute<T>> for Option<T> {
    fn from(value: Attribute<T>) -> Self {
        match value {
            Attribute::Inherited => None,
            Attribute::Override(inner) => Some(inner),
        }
    }
}
