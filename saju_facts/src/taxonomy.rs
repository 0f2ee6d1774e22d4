//! Domain taxonomies: elements, ten gods, roles, gyeok patterns, grades.
//!
//! These enumerations are the dimensions rule macros iterate over. Iteration
//! order is declaration order and is part of the compiled output, so new
//! variants go at the end.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The five elements (ohaeng).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Element {
    Wood,
    Fire,
    Earth,
    Metal,
    Water,
}

impl Element {
    /// The element this one generates (wood feeds fire, ...).
    pub fn generates(&self) -> Element {
        match self {
            Element::Wood => Element::Fire,
            Element::Fire => Element::Earth,
            Element::Earth => Element::Metal,
            Element::Metal => Element::Water,
            Element::Water => Element::Wood,
        }
    }

    /// The element this one controls (wood parts earth, ...).
    pub fn controls(&self) -> Element {
        match self {
            Element::Wood => Element::Earth,
            Element::Fire => Element::Metal,
            Element::Earth => Element::Water,
            Element::Metal => Element::Wood,
            Element::Water => Element::Fire,
        }
    }
}

/// How an element relates to the day master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Same element.
    Peer,
    /// Day master generates it.
    Output,
    /// Day master controls it.
    Wealth,
    /// It controls the day master.
    Officer,
    /// It generates the day master.
    Resource,
}

/// The ten gods (sipseong).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TenGod {
    Bigyeon,
    Geopjae,
    Siksin,
    Sanggwan,
    Pyeonjae,
    Jeongjae,
    Pyeongwan,
    Jeonggwan,
    Pyeonin,
    Jeongin,
}

impl TenGod {
    /// The relation to the day master this ten god expresses.
    pub fn relation(&self) -> Relation {
        match self {
            TenGod::Bigyeon | TenGod::Geopjae => Relation::Peer,
            TenGod::Siksin | TenGod::Sanggwan => Relation::Output,
            TenGod::Pyeonjae | TenGod::Jeongjae => Relation::Wealth,
            TenGod::Pyeongwan | TenGod::Jeonggwan => Relation::Officer,
            TenGod::Pyeonin | TenGod::Jeongin => Relation::Resource,
        }
    }

    /// The element carrying this ten god for a given day-master element.
    pub fn element_for(&self, day_master: Element) -> Element {
        match self.relation() {
            Relation::Peer => day_master,
            Relation::Output => day_master.generates(),
            Relation::Wealth => day_master.controls(),
            Relation::Officer => day_master.generates().generates().generates(),
            Relation::Resource => day_master.generates().generates().generates().generates(),
        }
    }
}

/// Roles an element can play in a chart (yongsin and friends).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Useful god.
    Yongsin,
    /// Favorable god.
    Huisin,
    /// Unfavorable god.
    Gisin,
    /// Enemy god.
    Gusin,
    /// Idle god.
    Hansin,
}

/// Gyeok (structure) patterns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Pattern {
    // Regular
    Jeonggwan,
    Pyeongwan,
    Jeongin,
    Pyeonin,
    Siksin,
    Sanggwan,
    Jeongjae,
    Pyeonjae,
    Geonrok,
    Yangin,

    // Special
    Jongwang,
    Jongsal,
    Jongjae,
    Jonga,
    Hwagi,
}

impl Pattern {
    /// Whether this is one of the special (follow/transformation) patterns.
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            Pattern::Jongwang | Pattern::Jongsal | Pattern::Jongjae | Pattern::Jonga | Pattern::Hwagi
        )
    }
}

/// Qualitative grade of a detected pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Grade {
    Top,
    High,
    Mid,
    Low,
}

/// A taxonomy a macro can enumerate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Element,
    TenGod,
    Role,
    Pattern,
    Grade,
}

impl Dimension {
    /// The enumeration keys in stable declaration order.
    pub fn keys(&self) -> Vec<&'static str> {
        match self {
            Dimension::Element => Element::iter().map(|e| e.into()).collect(),
            Dimension::TenGod => TenGod::iter().map(|t| t.into()).collect(),
            Dimension::Role => Role::iter().map(|r| r.into()).collect(),
            Dimension::Pattern => Pattern::iter().map(|p| p.into()).collect(),
            Dimension::Grade => Grade::iter().map(|g| g.into()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_element_cycles() {
        for element in Element::iter() {
            // Five steps around either cycle return to the start.
            let mut generated = element;
            let mut controlled = element;
            for _ in 0..5 {
                generated = generated.generates();
                controlled = controlled.controls();
            }
            assert_eq!(generated, element);
            assert_eq!(controlled, element);
        }
        assert_eq!(Element::Wood.controls(), Element::Earth);
    }

    #[test]
    fn test_ten_god_elements() {
        // Gap wood day master.
        assert_eq!(TenGod::Siksin.element_for(Element::Wood), Element::Fire);
        assert_eq!(TenGod::Jeongjae.element_for(Element::Wood), Element::Earth);
        assert_eq!(TenGod::Jeonggwan.element_for(Element::Wood), Element::Metal);
        assert_eq!(TenGod::Jeongin.element_for(Element::Wood), Element::Water);
        assert_eq!(TenGod::Bigyeon.element_for(Element::Wood), Element::Wood);
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(TenGod::Jeonggwan.to_string(), "jeonggwan");
        assert_eq!(Role::from_str("yongsin").unwrap(), Role::Yongsin);
        let name: &str = Dimension::TenGod.as_ref();
        assert_eq!(name, "ten_god");
        assert!(Pattern::from_str("unknown").is_err());
    }

    #[test]
    fn test_dimension_keys() {
        assert_eq!(
            Dimension::Element.keys(),
            vec!["wood", "fire", "earth", "metal", "water"]
        );
        assert_eq!(Dimension::TenGod.keys().len(), 10);
        assert_eq!(Dimension::Pattern.keys().len(), 15);
        assert_eq!(Dimension::Grade.keys(), vec!["top", "high", "mid", "low"]);
    }

    #[test]
    fn test_special_patterns() {
        assert!(Pattern::Hwagi.is_special());
        assert!(!Pattern::Jeonggwan.is_special());
        assert_eq!(Pattern::iter().filter(|p| p.is_special()).count(), 5);
    }
}
